pub mod claims;
pub mod login;
pub mod logout;
pub mod otp;
pub mod password;
pub mod session;

pub use login::{handle_login, handle_me};
pub use logout::handle_logout;
pub use otp::{handle_send_otp, handle_verify_otp};
pub use password::{handle_forgot_password, handle_set_password};
