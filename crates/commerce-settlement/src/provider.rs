use async_trait::async_trait;
use commerce_core::error::FailureCode;
use commerce_core::types::{AgentId, Amount, Chain};
use commerce_core::{RefundResult, SettlementHandle, SettlementIntent, SettlementResult};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("insufficient available balance: need {need}, have {have}")]
    InsufficientAvailable { need: Amount, have: Amount },
    #[error("insufficient locked balance: need {need}, have {have}")]
    InsufficientLocked { need: Amount, have: Amount },
    #[error("unknown handle: {0}")]
    UnknownHandle(String),
    #[error("handle {0} is not in a state that permits this operation")]
    InvalidHandleState(String),
    #[error("{code}: {reason}")]
    Failed { code: FailureCode, reason: String },
    #[error("settlement provider not configured for this rail")]
    NotConfigured,
}

impl SettlementError {
    pub fn code(&self) -> FailureCode {
        match self {
            SettlementError::InsufficientAvailable { .. } => FailureCode::BondInsufficient,
            SettlementError::InsufficientLocked { .. } => FailureCode::SettlementFailed,
            SettlementError::UnknownHandle(_) => FailureCode::SettlementFailed,
            SettlementError::InvalidHandleState(_) => FailureCode::SettlementFailed,
            SettlementError::Failed { code, .. } => *code,
            SettlementError::NotConfigured => FailureCode::SettlementProviderNotImplemented,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RefundRequest<'a> {
    pub dispute_id: &'a str,
    pub from: &'a AgentId,
    pub to: &'a AgentId,
    pub amount: Amount,
    pub idempotency_key: Option<&'a str>,
}

/// The settlement rail contract (ch.4.3). All amounts are non-negative.
/// Implementations may back this with an in-memory ledger, a card-style
/// authorize/capture/void rail, or a disabled stub.
#[async_trait]
pub trait SettlementProvider: Send + Sync {
    async fn balance(&self, account: &AgentId, chain: Option<Chain>, asset: Option<&str>) -> Amount;
    async fn locked(&self, account: &AgentId, chain: Option<Chain>, asset: Option<&str>) -> Amount;

    async fn lock(
        &self,
        account: &AgentId,
        amount: Amount,
        chain: Option<Chain>,
        asset: Option<&str>,
    ) -> Result<(), SettlementError>;

    async fn release(
        &self,
        account: &AgentId,
        amount: Amount,
        chain: Option<Chain>,
        asset: Option<&str>,
    ) -> Result<(), SettlementError>;

    async fn pay(
        &self,
        from: &AgentId,
        to: &AgentId,
        amount: Amount,
        chain: Option<Chain>,
        asset: Option<&str>,
    ) -> Result<(), SettlementError>;

    async fn slash_bond(
        &self,
        provider_account: &AgentId,
        amount: Amount,
        beneficiary: &AgentId,
        chain: Option<Chain>,
        asset: Option<&str>,
    ) -> Result<(), SettlementError>;

    async fn prepare(&self, intent: SettlementIntent) -> Result<SettlementHandle, SettlementError>;

    async fn commit(&self, handle_id: &str) -> Result<SettlementResult, SettlementError>;

    async fn poll(&self, handle_id: &str) -> Result<SettlementResult, SettlementError>;

    async fn abort(&self, handle_id: &str, reason: Option<&str>) -> Result<(), SettlementError>;

    async fn refund(&self, req: RefundRequest<'_>) -> Result<RefundResult, SettlementError>;
}
