pub mod envelope;
pub mod hash;
pub mod keypair;

pub use envelope::{canonical_bytes, parse, sign, verify};
pub use hash::{compute_commit_hash, handle_id, sha256, sha256_hex, truncate_b58, verify_reveal};
pub use keypair::{verify as verify_raw, KeyPair};
