//! Sanitization of values that end up in logs or notices
//!
//! Redirect URLs from the identity provider carry tokens in their fragment,
//! and account handles are typed by the user. Both pass through here.

use thiserror::Error;

/// Longest accepted account handle (game name is 16 chars, tag 5, plus '#')
pub const MAX_HANDLE_LEN: usize = 22;

/// Reasons an account handle is rejected
#[derive(Debug, Error, PartialEq)]
pub enum SanitizerError {
    /// Handle contains control characters
    #[error("Invalid handle: contains control characters")]
    InvalidInput,

    /// Handle is empty
    #[error("Handle cannot be empty")]
    EmptyInput,

    /// Handle is missing the `name#tag` separator
    #[error("Handle must have the form name#tag")]
    MissingTag,

    /// Handle exceeds the maximum length
    #[error("Handle exceeds maximum length of {0}")]
    TooLong(usize),
}

/// Static helpers for log-safe rendering
pub struct Sanitizer;

impl Sanitizer {
    /// Strips the query string and fragment from a URL
    ///
    /// Implicit-grant redirects carry `access_token` in the fragment, so every
    /// navigation URL is logged through this.
    ///
    /// # Examples
    ///
    /// ```
    /// use vshop_lib::security::Sanitizer;
    ///
    /// assert_eq!(
    ///     Sanitizer::sanitize_url("https://playvalorant.com/opt_in#access_token=secret"),
    ///     "https://playvalorant.com/opt_in"
    /// );
    /// ```
    pub fn sanitize_url(url: &str) -> String {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        url[..end].to_string()
    }

    /// Validates a `name#tag` account handle
    pub fn validate_handle(handle: &str) -> Result<(), SanitizerError> {
        if handle.trim().is_empty() {
            return Err(SanitizerError::EmptyInput);
        }

        if handle.chars().count() > MAX_HANDLE_LEN {
            return Err(SanitizerError::TooLong(MAX_HANDLE_LEN));
        }

        if handle.chars().any(|c| c.is_control()) {
            return Err(SanitizerError::InvalidInput);
        }

        match handle.split_once('#') {
            Some((name, tag)) if !name.is_empty() && !tag.is_empty() => Ok(()),
            _ => Err(SanitizerError::MissingTag),
        }
    }

    /// Masks a string, showing only the first and last `visible_chars`
    ///
    /// # Examples
    ///
    /// ```
    /// use vshop_lib::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::mask_string("abcdefghij", 2), "ab...ij");
    /// assert_eq!(Sanitizer::mask_string("tiny", 3), "****");
    /// ```
    pub fn mask_string(s: &str, visible_chars: usize) -> String {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() <= visible_chars * 2 {
            "****".to_string()
        } else {
            let head: String = chars[..visible_chars].iter().collect();
            let tail: String = chars[chars.len() - visible_chars..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }
}
