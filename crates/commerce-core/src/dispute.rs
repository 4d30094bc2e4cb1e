use crate::types::{AgentId, Amount, DecisionId, DisputeId, PublicKeyHex, ReceiptId, SignatureHex, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeOutcome {
    NoRefund,
    RefundPartial,
    RefundFull,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeRecord {
    pub dispute_id: DisputeId,
    pub receipt_id: ReceiptId,
    pub intent_id: crate::types::IntentId,
    pub buyer_id: AgentId,
    pub seller_id: AgentId,
    pub opened_at_ms: Timestamp,
    pub deadline_at_ms: Timestamp,
    pub reason: String,
    pub status: DisputeStatus,
    pub outcome: Option<DisputeOutcome>,
    pub refund_amount: Option<Amount>,
    pub decision_hash_hex: Option<String>,
    pub arbiter_pubkey: Option<PublicKeyHex>,
    pub decision_signature: Option<SignatureHex>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionPolicySnapshot {
    pub max_refund_pct: f64,
    pub allow_partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: DecisionId,
    pub dispute_id: DisputeId,
    pub receipt_id: ReceiptId,
    pub outcome: DisputeOutcome,
    pub refund_amount: Amount,
    pub issued_at_ms: Timestamp,
    pub notes: Option<String>,
    pub policy_snapshot: DecisionPolicySnapshot,
}

/// A decision plus its hash and the arbiter's signature over that hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedDecision {
    pub decision: Decision,
    pub decision_hash_hex: String,
    pub arbiter_pubkey: PublicKeyHex,
    pub signature: SignatureHex,
}
