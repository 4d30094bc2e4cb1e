use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable failure codes surfaced across policy checks, settlement, and
/// replay. External callers (CLIs, replay tools) must see these verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCode {
    // ── Identity ─────────────────────────────────────────────────────────
    FailedIdentity,

    // ── Admission ────────────────────────────────────────────────────────
    FailedAdmission,

    // ── Escrow / settlement ──────────────────────────────────────────────
    FailedEscrow,
    BondInsufficient,
    SettlementFailed,
    SettlementPollTimeout,
    SettlementPendingUnresolved,
    SettlementSlaViolation,
    SettlementProviderNotImplemented,

    // ── Proof ────────────────────────────────────────────────────────────
    FailedProof,

    // ── SLA ──────────────────────────────────────────────────────────────
    LatencyBreach,
    FreshnessBreach,

    // ── Budget ───────────────────────────────────────────────────────────
    StreamingSpendCapExceeded,

    // ── Policy ───────────────────────────────────────────────────────────
    FailedPolicy,
    FailedReferenceBand,
    QuoteOutOfBand,
    SettlementModeNotAllowed,

    // ── Timeout ──────────────────────────────────────────────────────────
    FailedNegotiationTimeout,

    // ── Dispute ──────────────────────────────────────────────────────────
    DisputeNotFound,
    DisputeNotOpen,
    DisputesNotEnabled,
    PartialRefundNotAllowed,
    RefundExceedsPaid,
    RefundExceedsMaxPct,
    RefundInsufficientFunds,
    RefundNotSupported,
}

impl FailureCode {
    /// True for codes a fallback-settlement router should retry against
    /// the next provider candidate rather than treat as final.
    pub fn is_retryable_settlement_failure(&self) -> bool {
        matches!(
            self,
            FailureCode::SettlementFailed
                | FailureCode::SettlementPollTimeout
                | FailureCode::SettlementPendingUnresolved
                | FailureCode::SettlementProviderNotImplemented
        )
    }
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Envelope / codec ─────────────────────────────────────────────────
    #[error("invalid signature on envelope")]
    InvalidSignature,

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("message type does not match expected variant")]
    UnexpectedMessageType,

    // ── Asset registry ───────────────────────────────────────────────────
    #[error("unknown asset symbol: {0}")]
    UnknownAsset(String),

    // ── General ──────────────────────────────────────────────────────────
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}
