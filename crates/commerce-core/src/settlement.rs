use crate::types::{AgentId, Amount, Chain, HandleId, IntentId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMode {
    HashReveal,
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleStatus {
    Prepared,
    Pending,
    Committed,
    Aborted,
    Failed,
}

/// Request to lock funds for an exchange. `idempotency_key` combined with
/// `intent_id` determines the deterministic handle id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementIntent {
    pub intent_id: IntentId,
    pub from: AgentId,
    pub to: AgentId,
    pub amount: Amount,
    pub mode: SettlementMode,
    pub idempotency_key: Option<String>,
    pub chain: Option<Chain>,
    pub asset: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandleMeta {
    pub from: Option<AgentId>,
    pub to: Option<AgentId>,
    pub chain: Option<Chain>,
    pub asset: Option<String>,
    pub auth_id: Option<String>,
    pub capture_id: Option<String>,
    pub abort_reason: Option<String>,
}

/// Provider-issued reference to a specific locked settlement attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementHandle {
    pub handle_id: HandleId,
    pub intent_id: IntentId,
    pub status: HandleStatus,
    pub locked_amount: Amount,
    pub created_at_ms: Timestamp,
    pub meta: HandleMeta,
    pub attempts: u32,
    pub last_attempt_ms: Option<Timestamp>,
    pub failure_code: Option<crate::error::FailureCode>,
}

/// Result of a `commit` or `poll` call against a settlement provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub status: HandleStatus,
    pub paid_amount: Amount,
    pub committed_at_ms: Option<Timestamp>,
    pub failure_code: Option<crate::error::FailureCode>,
}

/// Result of a `refund` call against a settlement provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub ok: bool,
    pub refunded_amount: Amount,
    pub code: Option<crate::error::FailureCode>,
}

/// One segment of a split settlement across multiple provider candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSegment {
    pub segment_id: u32,
    pub provider_name: String,
    pub amount: Amount,
    pub handle_id: Option<HandleId>,
    pub status: HandleStatus,
}
