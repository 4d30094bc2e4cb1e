//! Round-linking for the negotiation transcript: every round after round
//! 0 must reference the previous round's envelope hash (ch.3 invariant,
//! SPEC_FULL 10.6 "counter-offer round tracking"). The hash here binds
//! the message's canonical bytes plus the detached signature, so two
//! envelopes carrying the same message but different signers hash
//! differently.

use commerce_core::Envelope;

pub fn envelope_hash_hex(env: &Envelope) -> String {
    let mut buf = commerce_crypto::canonical_bytes(&env.message).unwrap_or_default();
    buf.extend_from_slice(env.sender_pubkey.0.as_bytes());
    buf.extend_from_slice(env.signature.0.as_bytes());
    commerce_crypto::sha256_hex(&buf)
}
