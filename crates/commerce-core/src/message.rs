use crate::types::{Amount, Chain, IntentId, PublicKeyHex, SignatureHex, Timestamp};
use serde::{Deserialize, Serialize};

/// Tagged union of every message a negotiation session can receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "INTENT")]
    Intent(IntentMsg),
    #[serde(rename = "ASK")]
    Ask(QuoteMsg),
    #[serde(rename = "BID")]
    Bid(QuoteMsg),
    #[serde(rename = "ACCEPT")]
    Accept(AcceptMsg),
    #[serde(rename = "REJECT")]
    Reject(RejectMsg),
    #[serde(rename = "COMMIT")]
    Commit(CommitMsg),
    #[serde(rename = "REVEAL")]
    Reveal(RevealMsg),
}

impl Message {
    pub fn intent_id(&self) -> &IntentId {
        match self {
            Message::Intent(m) => &m.intent_id,
            Message::Ask(m) => &m.intent_id,
            Message::Bid(m) => &m.intent_id,
            Message::Accept(m) => &m.intent_id,
            Message::Reject(m) => &m.intent_id,
            Message::Commit(m) => &m.intent_id,
            Message::Reveal(m) => &m.intent_id,
        }
    }

    pub fn sent_at_ms(&self) -> Timestamp {
        match self {
            Message::Intent(m) => m.sent_at_ms,
            Message::Ask(m) => m.sent_at_ms,
            Message::Bid(m) => m.sent_at_ms,
            Message::Accept(m) => m.sent_at_ms,
            Message::Reject(m) => m.sent_at_ms,
            Message::Commit(m) => m.sent_at_ms,
            Message::Reveal(m) => m.sent_at_ms,
        }
    }

    pub fn expires_at_ms(&self) -> Timestamp {
        match self {
            Message::Intent(m) => m.expires_at_ms,
            Message::Ask(m) => m.expires_at_ms,
            Message::Bid(m) => m.expires_at_ms,
            Message::Accept(m) => m.expires_at_ms,
            Message::Reject(m) => m.expires_at_ms,
            Message::Commit(m) => m.expires_at_ms,
            Message::Reveal(m) => m.expires_at_ms,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Message::Intent(_) => "INTENT",
            Message::Ask(_) => "ASK",
            Message::Bid(_) => "BID",
            Message::Accept(_) => "ACCEPT",
            Message::Reject(_) => "REJECT",
            Message::Commit(_) => "COMMIT",
            Message::Reveal(_) => "REVEAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentMsg {
    pub intent_id: IntentId,
    pub max_price: Amount,
    pub asset: String,
    #[serde(default)]
    pub chain: Chain,
    #[serde(default)]
    pub urgent: bool,
    pub sent_at_ms: Timestamp,
    pub expires_at_ms: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteMsg {
    pub intent_id: IntentId,
    pub price: Amount,
    pub valid_for_ms: i64,
    pub sent_at_ms: Timestamp,
    pub expires_at_ms: Timestamp,
    /// Hash of the previous round's envelope; absent only at round 0.
    #[serde(default)]
    pub prev_hash_hex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptMsg {
    pub intent_id: IntentId,
    pub agreed_price: Amount,
    pub seller_bond: Amount,
    pub sent_at_ms: Timestamp,
    pub expires_at_ms: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectMsg {
    pub intent_id: IntentId,
    pub reason: Option<String>,
    pub sent_at_ms: Timestamp,
    pub expires_at_ms: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitMsg {
    pub intent_id: IntentId,
    pub commit_hash_hex: String,
    pub sent_at_ms: Timestamp,
    pub expires_at_ms: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealMsg {
    pub intent_id: IntentId,
    pub payload_b64: String,
    pub nonce_b64: String,
    pub sent_at_ms: Timestamp,
    pub expires_at_ms: Timestamp,
}

/// A message plus the sender's public key and a detached signature over
/// the canonical encoding of the message. Verification is pure — it
/// consults no external state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub message: Message,
    pub sender_pubkey: PublicKeyHex,
    pub signature: SignatureHex,
}
