use commerce_core::error::FailureCode;
use commerce_core::session::{SessionStatus, TerminalOutcome};
use thiserror::Error;

/// Errors a session driver can return from an `open`/`quote`/`accept`/
/// `reject`/`commit`/`reveal` call. Distinct from [`FailureCode`]: this
/// enum is the Rust-level `Result` error for a call that could not even
/// be attempted (session already terminal, message/intent-id mismatch);
/// an in-band negotiation failure instead terminates the session and is
/// read back via the session's `outcome` field.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("session has already reached a terminal status and accepts no further events")]
    AlreadyTerminal,

    #[error("envelope intent_id does not match this session")]
    IntentIdMismatch,

    #[error("message type does not match the event being applied")]
    UnexpectedMessageType,

    #[error("envelope failed signature verification")]
    BadSignature,

    #[error("quote.expires_at_ms must equal quote.sent_at_ms + quote.valid_for_ms")]
    QuoteValidityInvariantViolated,

    #[error("quote round does not chain to the transcript head")]
    BrokenRoundChain,

    #[error("event is not valid from the session's current status")]
    WrongStatus,

    #[error("settlement provider error: {0}")]
    Settlement(String),
}

/// Maps a policy failure code to the ch.4.4 terminal-outcome category:
/// admission-family codes to `FailedAdmission`, bond/settlement codes to
/// `FailedEscrow`, schema/proof codes to `FailedProof`, latency/freshness
/// to `FailedSla`, the streaming cap to `FailedBudget`,
/// round/duration/intent-expiry codes to `FailedNegotiationTimeout`, and
/// everything else (reference-band and misc policy codes) to
/// `FailedPolicy`.
pub fn terminal_outcome_for(code: FailureCode) -> TerminalOutcome {
    use FailureCode::*;
    match code {
        FailedIdentity => TerminalOutcome::FailedIdentity,
        FailedAdmission => TerminalOutcome::FailedAdmission,
        FailedEscrow
        | BondInsufficient
        | SettlementFailed
        | SettlementPollTimeout
        | SettlementPendingUnresolved
        | SettlementSlaViolation
        | SettlementProviderNotImplemented
        | SettlementModeNotAllowed => TerminalOutcome::FailedEscrow,
        FailedProof => TerminalOutcome::FailedProof,
        LatencyBreach | FreshnessBreach => TerminalOutcome::FailedSla,
        StreamingSpendCapExceeded => TerminalOutcome::FailedBudget,
        FailedNegotiationTimeout => TerminalOutcome::FailedNegotiationTimeout,
        _ => TerminalOutcome::FailedPolicy,
    }
}

/// Maps a policy failure code to the terminal `SessionStatus` it drives:
/// `terminal_outcome_for`'s `FailedNegotiationTimeout` category normalises
/// to a `TIMEOUT` status; every other category is `FAILED`.
pub fn terminal_status_for(code: FailureCode) -> SessionStatus {
    match terminal_outcome_for(code) {
        TerminalOutcome::FailedNegotiationTimeout => SessionStatus::Timeout,
        _ => SessionStatus::Failed,
    }
}
