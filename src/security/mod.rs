//! Security module - Log sanitization and zeroizing secret containers
//!
//! - Sanitizing redirect URLs and handles before they reach logs
//! - Secure string/byte handling with zeroization

mod sanitizer;
mod secure_string;

pub use sanitizer::{Sanitizer, SanitizerError, MAX_HANDLE_LEN};
pub use secure_string::{SecureBytes, SecureString};
