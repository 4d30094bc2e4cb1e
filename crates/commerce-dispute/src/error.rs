use commerce_core::error::FailureCode;
use thiserror::Error;

/// Errors `open`/`resolve` can return before even reaching the settlement
/// rail. A rejected refund from the provider instead surfaces through
/// `DisputeOutcomeError::Settlement` carrying the provider's code.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DisputeError {
    #[error("disputes are not enabled by policy")]
    DisputesNotEnabled,

    #[error("dispute window has elapsed for this receipt")]
    WindowElapsed,

    #[error("receipt was not fulfilled; nothing to dispute")]
    ReceiptNotFulfilled,

    #[error("dispute {0} not found")]
    NotFound(String),

    #[error("dispute is not open")]
    NotOpen,

    #[error("policy does not allow partial refunds")]
    PartialRefundNotAllowed,

    #[error("refund_amount must be within (0, paid_amount * max_refund_pct]")]
    RefundExceedsMaxPct,

    #[error("refund_amount exceeds paid_amount")]
    RefundExceedsPaid,

    #[error("refund_amount must be positive for a partial refund")]
    ZeroRefund,

    #[error("settlement refund failed: {0:?}")]
    Settlement(FailureCode),
}

impl DisputeError {
    pub fn code(&self) -> FailureCode {
        match self {
            DisputeError::DisputesNotEnabled => FailureCode::DisputesNotEnabled,
            DisputeError::WindowElapsed | DisputeError::ReceiptNotFulfilled => FailureCode::FailedPolicy,
            DisputeError::NotFound(_) => FailureCode::DisputeNotFound,
            DisputeError::NotOpen => FailureCode::DisputeNotOpen,
            DisputeError::PartialRefundNotAllowed => FailureCode::PartialRefundNotAllowed,
            DisputeError::RefundExceedsMaxPct => FailureCode::RefundExceedsMaxPct,
            DisputeError::RefundExceedsPaid | DisputeError::ZeroRefund => FailureCode::RefundExceedsPaid,
            DisputeError::Settlement(code) => *code,
        }
    }
}
