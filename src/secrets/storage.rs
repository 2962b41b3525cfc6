//! In-memory secret holder
//!
//! `SecureString` zeroes its buffer on drop and never prints its contents
//! through `Debug` or `Display`.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secure string that zeros memory on drop and prevents accidental exposure
pub struct SecureString {
    data: String,
}

impl SecureString {
    pub fn new(data: String) -> Self {
        Self { data }
    }

    /// Expose the string data (use with caution)
    pub fn expose(&self) -> &str {
        &self.data
    }

    /// Raw bytes, used as HMAC key material
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString([REDACTED {} bytes])", self.data.len())
    }
}

impl std::fmt::Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl ZeroizeOnDrop for SecureString {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_string_never_prints_value() {
        let secret = SecureString::new("hunter2-hunter2".to_string());
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(format!("{:?}", secret), "SecureString([REDACTED 15 bytes])");
        assert_eq!(secret.expose(), "hunter2-hunter2");
        assert_eq!(secret.as_bytes(), b"hunter2-hunter2");
        assert_eq!(secret.len(), 15);
        assert!(!secret.is_empty());
    }

    #[test]
    fn test_empty_secure_string() {
        let secret = SecureString::new(String::new());
        assert!(secret.is_empty());
        assert_eq!(secret.len(), 0);
    }
}
