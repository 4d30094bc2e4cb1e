use crate::keypair::{verify as verify_sig, KeyPair};
use commerce_core::{CoreError, Envelope, Message};

/// Canonical byte encoding of a message: serde_json with sorted keys and
/// no insignificant whitespace. Both sides of an exchange must agree on
/// this encoding for signatures to interoperate.
pub fn canonical_bytes(msg: &Message) -> Result<Vec<u8>, CoreError> {
    let value = serde_json::to_value(msg).map_err(|e| CoreError::Serialization(e.to_string()))?;
    let canonical = canonicalize(&value);
    serde_json::to_vec(&canonical).map_err(|e| CoreError::Serialization(e.to_string()))
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: std::collections::BTreeMap<String, serde_json::Value> =
                std::collections::BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k.clone(), canonicalize(v));
            }
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// Sign `msg` with `keypair`, producing a complete envelope.
pub fn sign(msg: Message, keypair: &KeyPair) -> Result<Envelope, CoreError> {
    let bytes = canonical_bytes(&msg)?;
    let signature = keypair.sign(&bytes);
    Ok(Envelope {
        message: msg,
        sender_pubkey: keypair.public_key_hex(),
        signature,
    })
}

/// Verify an envelope's signature against its own message and sender key.
/// Pure: consults no external state.
pub fn verify(env: &Envelope) -> bool {
    match canonical_bytes(&env.message) {
        Ok(bytes) => verify_sig(&env.sender_pubkey, &bytes, &env.signature),
        Err(_) => false,
    }
}

/// Parse raw canonical JSON bytes into a `Message`.
pub fn parse(raw: &[u8]) -> Result<Message, CoreError> {
    serde_json::from_slice(raw).map_err(|e| CoreError::MalformedMessage(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_core::message::IntentMsg;
    use commerce_core::types::{Chain, IntentId};

    fn sample_intent() -> Message {
        Message::Intent(IntentMsg {
            intent_id: IntentId::from("intent-1"),
            max_price: 1000,
            asset: "USDC".into(),
            chain: Chain::Evm,
            urgent: false,
            sent_at_ms: 0,
            expires_at_ms: 60_000,
        })
    }

    #[test]
    fn sign_then_verify_roundtrips() {
        let kp = KeyPair::generate();
        let env = sign(sample_intent(), &kp).unwrap();
        assert!(verify(&env));
    }

    #[test]
    fn tampered_envelope_fails_verify() {
        let kp = KeyPair::generate();
        let mut env = sign(sample_intent(), &kp).unwrap();
        if let Message::Intent(ref mut m) = env.message {
            m.max_price = 999_999;
        }
        assert!(!verify(&env));
    }
}
