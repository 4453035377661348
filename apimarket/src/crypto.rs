//! API key generation and hashing.
//!
//! Buyer keys are shown exactly once. Only a SHA-256 digest and a short preview are stored, so
//! the gateway verifies a presented key by hashing it and looking the digest up.

use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;
use sha2::{Digest, Sha256};

/// Generates a cryptographically secure API key with 256 bits of entropy.
///
/// The key is formatted as `{prefix}{base64url_encoded_random_bytes}` where the random bytes
/// are 32 bytes of cryptographically secure random data (43 base64url characters).
///
/// ```
/// use apimarket::crypto::generate_api_key;
///
/// let api_key = generate_api_key("mk_live_");
/// assert!(api_key.starts_with("mk_live_"));
/// assert_eq!(api_key.len(), 8 + 43);
/// ```
pub fn generate_api_key(prefix: &str) -> String {
    let mut key_bytes = [0u8; 32];
    rng().fill(&mut key_bytes);

    format!("{prefix}{}", general_purpose::URL_SAFE_NO_PAD.encode(key_bytes))
}

/// Lowercase hex SHA-256 digest of a key, as stored in `api_keys.key_hash`
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Display form of a key: the prefix, the first `visible` characters of the secret part and
/// an ellipsis.
pub fn key_preview(key: &str, prefix: &str, visible: usize) -> String {
    let secret = key.strip_prefix(prefix).unwrap_or(key);
    let shown: String = secret.chars().take(visible).collect();
    format!("{prefix}{shown}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_unique_and_url_safe() {
        let a = generate_api_key("mk_");
        let b = generate_api_key("mk_");
        assert_ne!(a, b);
        assert!(
            a["mk_".len()..]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let hash = hash_api_key("abc");
        assert_eq!(hash, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(hash, hash_api_key("abc"));
    }

    #[test]
    fn test_preview_hides_secret() {
        let key = "mk_live_ABCDEFGHIJKLMNOP";
        assert_eq!(key_preview(key, "mk_live_", 6), "mk_live_ABCDEF…");
    }
}
