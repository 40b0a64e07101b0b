use std::collections::HashSet;

use jsonwebtoken::{decode, encode, errors::Error, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::config::Config;
use crate::routes::auth::claims::Claims;

pub const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_DISTINCT_SECRET_BYTES: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtSecretError {
    #[error("JWT_SECRET must be at least 32 bytes (got {0})")]
    TooShort(usize),
    #[error("JWT_SECRET must contain at least 8 distinct bytes (got {0})")]
    LowEntropy(usize),
}

/// HS256 signer for session cookies, pinned to one issuer and audience.
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    validation: Validation,
}

impl SessionSigner {
    pub fn new(secret: &str, issuer: &str, audience: &str) -> Result<Self, JwtSecretError> {
        let bytes = secret.as_bytes();
        if bytes.len() < MIN_JWT_SECRET_LENGTH {
            return Err(JwtSecretError::TooShort(bytes.len()));
        }
        let distinct = bytes.iter().collect::<HashSet<_>>().len();
        if distinct < MIN_DISTINCT_SECRET_BYTES {
            return Err(JwtSecretError::LowEntropy(distinct));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(&[audience]);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            validation,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, JwtSecretError> {
        Self::new(&config.jwt_secret, &config.jwt_issuer, &config.jwt_audience)
    }

    /// Stamps issuer and audience onto the claims before signing.
    pub fn sign(&self, mut claims: Claims) -> Result<String, Error> {
        claims.iss = self.issuer.clone();
        claims.aud = self.audience.clone();
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}
