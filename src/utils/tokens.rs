use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use rand_core::RngCore;
use sha2::{Digest, Sha256};

/// 256-bit URL-safe token, sent to the user and never stored as is.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand_core::OsRng.fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest stored in the database in place of the raw token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.trim().as_bytes()))
}

/// Throwaway password for accounts created by provisioning; the owner
/// replaces it through the password-setup email.
pub fn temporary_password() -> String {
    generate_token()
}
