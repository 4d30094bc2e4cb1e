//! Canonical hashing and signing for a dispute `Decision` (ch.4.6). Mirrors
//! `commerce_crypto::envelope::canonical_bytes` (sorted-key JSON) but is
//! generic over any `Serialize` payload rather than tied to `Message`.

use commerce_core::dispute::Decision;
use commerce_core::types::{PublicKeyHex, SignatureHex};
use commerce_crypto::KeyPair;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    let json = serde_json::to_value(value).expect("Decision is always serializable");
    serde_json::to_vec(&canonicalize(&json)).expect("canonical value is always serializable")
}

/// A decision plus the arbiter's signature over its canonical hash.
pub struct SignedDecisionMaterial {
    pub decision_hash_hex: String,
    pub arbiter_pubkey: PublicKeyHex,
    pub signature: SignatureHex,
}

/// Hash `decision`'s canonical encoding and sign the hash with `arbiter`.
pub fn sign_decision(decision: &Decision, arbiter: &KeyPair) -> SignedDecisionMaterial {
    let hash = commerce_crypto::sha256(&canonical_bytes(decision));
    let decision_hash_hex = hex::encode(hash);
    let signature = arbiter.sign(&hash);
    SignedDecisionMaterial {
        decision_hash_hex,
        arbiter_pubkey: arbiter.public_key_hex(),
        signature,
    }
}

/// Verify a signed decision's hash and signature independent of any
/// registry state — used by the transcript replay verifier (C7).
pub fn verify_decision(decision: &Decision, decision_hash_hex: &str, arbiter_pubkey: &PublicKeyHex, signature: &SignatureHex) -> bool {
    let hash = commerce_crypto::sha256(&canonical_bytes(decision));
    if !hex::encode(hash).eq_ignore_ascii_case(decision_hash_hex) {
        return false;
    }
    commerce_crypto::verify_raw(arbiter_pubkey, &hash, signature)
}
