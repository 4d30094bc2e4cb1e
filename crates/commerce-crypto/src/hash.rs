use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Truncate a hash to `len` bytes and base58-encode it. Used for
/// deterministic settlement handle ids.
pub fn truncate_b58(hash: &[u8], len: usize) -> String {
    bs58::encode(&hash[..len.min(hash.len())]).into_string()
}

/// `sha256(intent_id || ":" || idempotency_key)`, truncated and base58
/// encoded. Same inputs always produce the same handle id.
pub fn handle_id(intent_id: &str, idempotency_key: &str) -> String {
    let mut buf = Vec::with_capacity(intent_id.len() + 1 + idempotency_key.len());
    buf.extend_from_slice(intent_id.as_bytes());
    buf.push(b':');
    buf.extend_from_slice(idempotency_key.as_bytes());
    truncate_b58(&sha256(&buf), commerce_core::constants::HANDLE_ID_HASH_LEN)
}

/// Commit-reveal binding: `sha256(payload_b64 || nonce_b64)` as lowercase hex.
pub fn compute_commit_hash(payload_b64: &str, nonce_b64: &str) -> String {
    let mut buf = Vec::with_capacity(payload_b64.len() + nonce_b64.len());
    buf.extend_from_slice(payload_b64.as_bytes());
    buf.extend_from_slice(nonce_b64.as_bytes());
    sha256_hex(&buf)
}

/// Case-insensitive equality check between a computed hash and the
/// previously committed hash.
pub fn verify_reveal(commit_hash_hex: &str, payload_b64: &str, nonce_b64: &str) -> bool {
    compute_commit_hash(payload_b64, nonce_b64).eq_ignore_ascii_case(commit_hash_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_roundtrip_succeeds() {
        let hash = compute_commit_hash("cGF5bG9hZA==", "bm9uY2U=");
        assert!(verify_reveal(&hash, "cGF5bG9hZA==", "bm9uY2U="));
    }

    #[test]
    fn reveal_fails_on_tamper() {
        let hash = compute_commit_hash("cGF5bG9hZA==", "bm9uY2U=");
        assert!(!verify_reveal(&hash, "dGFtcGVyZWQ=", "bm9uY2U="));
    }

    #[test]
    fn handle_id_is_deterministic() {
        let a = handle_id("intent-1", "key-1");
        let b = handle_id("intent-1", "key-1");
        assert_eq!(a, b);
        let c = handle_id("intent-1", "key-2");
        assert_ne!(a, c);
    }
}
