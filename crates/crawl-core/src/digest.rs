//! Deterministic review identity, per spec.md §3/§9: a 16-hex-character
//! SHA-256 prefix over `author || ":" || content[:100]`.
//!
//! The source language exhibits both this corrected form and a bug-prone
//! process-keyed default hash in a separate collector (spec.md §9); only
//! the SHA-256 form is implemented here, since it is the authoritative one
//! and identity must be stable across processes.

use sha2::{Digest, Sha256};

/// Computes the stable review digest. `content` is the review body before
/// any 5000-character ingest truncation is applied to the stored field —
/// only the first 100 characters participate in identity.
pub fn review_digest(author: &str, content: &str) -> String {
    let prefix: String = content.chars().take(100).collect();
    let mut hasher = Sha256::new();
    hasher.update(author.as_bytes());
    hasher.update(b":");
    hasher.update(prefix.as_bytes());
    let full = hasher.finalize();
    hex::encode(full)[..16].to_string()
}

/// Truncated SHA-256 used for cache-key parameter hashing (`[:md5(...)[:8]]`
/// in spec.md §3, substituted with SHA-256 here — see DESIGN.md). `params`
/// should already be canonical JSON.
pub fn cache_param_hash(params: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(params.as_bytes());
    hex::encode(hasher.finalize())[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_16_hex_chars() {
        let d = review_digest("alice", "great app, highly recommend it to everyone I know");
        assert_eq!(d.len(), 16);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_deterministic() {
        let a = review_digest("bob", "works great");
        let b = review_digest("bob", "works great");
        assert_eq!(a, b);
    }

    #[test]
    fn digest_only_considers_first_100_chars_of_content() {
        let long_content = "x".repeat(200);
        let mut longer_but_same_prefix = "x".repeat(100);
        longer_but_same_prefix.push_str("different tail that should not matter at all here");
        let a = review_digest("carol", &long_content);
        let b = review_digest("carol", &longer_but_same_prefix);
        assert_eq!(a, b);
    }

    #[test]
    fn digest_differs_on_author() {
        let a = review_digest("dave", "same content");
        let b = review_digest("erin", "same content");
        assert_ne!(a, b);
    }
}
