/// BLAKE3 hex digest of a string (asset identities, folder paths).
pub fn hash_str(value: &str) -> String {
    blake3::hash(value.as_bytes()).to_hex().to_string()
}

/// Generate a shorter hash for cache keys (first 16 chars)
pub fn short_hash(full_hash: &str) -> String {
    full_hash.chars().take(16).collect()
}
