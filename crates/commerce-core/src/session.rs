use crate::types::{AgentId, Amount, HandleId, IntentId, ReceiptId, Round, Timestamp};
use serde::{Deserialize, Serialize};

/// Negotiation session status. Once a session reaches a terminal status it
/// never changes status or transcript again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Idle,
    IntentOpen,
    Negotiating,
    Locked,
    Exchanging,
    Accepted,
    Rejected,
    Timeout,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Accepted
                | SessionStatus::Rejected
                | SessionStatus::Timeout
                | SessionStatus::Failed
        )
    }
}

/// The ch.4.4 terminal-outcome classification. Finer-grained than
/// `SessionStatus`, which only distinguishes `Accepted | Rejected |
/// Timeout | Failed`: a transcript reader needs the fault category
/// (identity, admission, escrow, proof, SLA, budget, policy, timeout)
/// to assign responsibility without re-deriving it from whatever
/// `FailureCode` happened to trigger termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalOutcome {
    Accepted,
    Rejected,
    FailedIdentity,
    FailedAdmission,
    FailedEscrow,
    FailedProof,
    FailedSla,
    FailedBudget,
    FailedPolicy,
    FailedNegotiationTimeout,
}

/// The contract created at ACCEPT, defining the obligations being escrowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agreement {
    pub intent_id: IntentId,
    pub buyer_id: AgentId,
    pub seller_id: AgentId,
    pub agreed_price: Amount,
    pub seller_bond: Amount,
    pub challenge_window_ms: i64,
    pub delivery_deadline_ms: Timestamp,
    pub status: AgreementStatus,
    pub commit_hash_hex: Option<String>,
    pub revealed_payload_b64: Option<String>,
    pub revealed_nonce_b64: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementStatus {
    Locked,
    Completed,
    Slashed,
}

/// The canonical, replayable record of an exchange outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: ReceiptId,
    pub intent_id: IntentId,
    pub buyer_id: AgentId,
    pub seller_id: AgentId,
    pub agreed_price: Amount,
    pub paid_amount: Amount,
    pub fulfilled: bool,
    pub timestamp_ms: Timestamp,
    pub latency_ms: Option<i64>,
    pub failure_code: Option<crate::error::FailureCode>,
    pub handle_id: Option<HandleId>,
}

/// A single negotiation round kept in the session transcript for the
/// round-linking invariant: every round after 0 links to the previous
/// round's envelope hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRound {
    pub round: Round,
    pub envelope_hash_hex: String,
    pub variant: String,
    pub at_ms: Timestamp,
}
