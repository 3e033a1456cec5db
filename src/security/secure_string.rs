//! Zeroizing containers for tokens, cookies and key material
//!
//! Bearer tokens, identity tokens and the long-lived `ssid` cookie pass
//! through these types while they live in memory outside the vault.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// A string whose memory is cleared when dropped
///
/// `Debug` never prints the content, so a `SecureString` can sit inside
/// structs that are traced without leaking the secret.
///
/// # Example
///
/// ```
/// use vshop_lib::security::SecureString;
///
/// let token = SecureString::from("eyJhbGciOi.payload.signature");
/// assert_eq!(token.expose(), "eyJhbGciOi.payload.signature");
/// assert!(!format!("{:?}", token).contains("payload"));
/// ```
#[derive(Clone, Default)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Wraps an owned string without copying it
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    /// Returns the secret for use in a header or request body
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Length of the secret in bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Formats the value as an `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.inner)
    }

    /// Copies the secret into a plain `String` for persistence in the vault
    ///
    /// The copy is not zeroized; it should go straight to the store.
    pub fn to_plain(&self) -> String {
        self.inner.clone()
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl Zeroize for SecureString {
    fn zeroize(&mut self) {
        self.inner.zeroize();
    }
}

impl Deref for SecureString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AsRef<str> for SecureString {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureString")
            .field("len", &self.inner.len())
            .field("content", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.inner.as_bytes())
    }
}

impl Eq for SecureString {}

impl PartialEq<&str> for SecureString {
    fn eq(&self, other: &&str) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.as_bytes())
    }
}

// The scratch slot is serialized into the secure store, so the value itself
// round-trips through serde. Debug output stays redacted.
impl Serialize for SecureString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inner)
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Byte buffer cleared on drop, used for the vault file encryption key
#[derive(Clone)]
pub struct SecureBytes {
    inner: Vec<u8>,
}

impl SecureBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { inner: bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            inner: bytes.to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for SecureBytes {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureBytes")
            .field("len", &self.inner.len())
            .field("content", &"[REDACTED]")
            .finish()
    }
}
