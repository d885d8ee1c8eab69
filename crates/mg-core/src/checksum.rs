//! SHA-256 checksum utility for migration drift detection.

use sha2::{Digest, Sha256};

/// Compute the hex-encoded SHA-256 checksum of a migration body
pub fn compute_checksum(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_stable_hex() {
        let a = compute_checksum("create table {schema}.t (id int)");
        let b = compute_checksum("create table {schema}.t (id int)");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_checksum_changes_with_content() {
        assert_ne!(compute_checksum("select 1"), compute_checksum("select 2"));
    }
}
