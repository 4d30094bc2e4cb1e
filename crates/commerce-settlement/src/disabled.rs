//! A settlement provider stub for a live rail that is not configured at
//! runtime (no API key, no sandbox credentials, etc). Every mutating
//! operation returns `SettlementError::NotConfigured`; balance reads
//! return zero rather than panicking, so a session that merely inspects
//! balances before choosing a provider candidate does not need to know
//! which candidates are live.

use crate::provider::{RefundRequest, SettlementError, SettlementProvider};
use async_trait::async_trait;
use commerce_core::types::{AgentId, Amount, Chain};
use commerce_core::{RefundResult, SettlementHandle, SettlementIntent, SettlementResult};

#[derive(Debug, Default)]
pub struct DisabledSettlementProvider;

impl DisabledSettlementProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SettlementProvider for DisabledSettlementProvider {
    async fn balance(&self, _account: &AgentId, _chain: Option<Chain>, _asset: Option<&str>) -> Amount {
        0
    }

    async fn locked(&self, _account: &AgentId, _chain: Option<Chain>, _asset: Option<&str>) -> Amount {
        0
    }

    async fn lock(
        &self,
        _account: &AgentId,
        _amount: Amount,
        _chain: Option<Chain>,
        _asset: Option<&str>,
    ) -> Result<(), SettlementError> {
        Err(SettlementError::NotConfigured)
    }

    async fn release(
        &self,
        _account: &AgentId,
        _amount: Amount,
        _chain: Option<Chain>,
        _asset: Option<&str>,
    ) -> Result<(), SettlementError> {
        Err(SettlementError::NotConfigured)
    }

    async fn pay(
        &self,
        _from: &AgentId,
        _to: &AgentId,
        _amount: Amount,
        _chain: Option<Chain>,
        _asset: Option<&str>,
    ) -> Result<(), SettlementError> {
        Err(SettlementError::NotConfigured)
    }

    async fn slash_bond(
        &self,
        _provider_account: &AgentId,
        _amount: Amount,
        _beneficiary: &AgentId,
        _chain: Option<Chain>,
        _asset: Option<&str>,
    ) -> Result<(), SettlementError> {
        Err(SettlementError::NotConfigured)
    }

    async fn prepare(&self, _intent: SettlementIntent) -> Result<SettlementHandle, SettlementError> {
        Err(SettlementError::NotConfigured)
    }

    async fn commit(&self, _handle_id: &str) -> Result<SettlementResult, SettlementError> {
        Err(SettlementError::NotConfigured)
    }

    async fn poll(&self, _handle_id: &str) -> Result<SettlementResult, SettlementError> {
        Err(SettlementError::NotConfigured)
    }

    async fn abort(&self, _handle_id: &str, _reason: Option<&str>) -> Result<(), SettlementError> {
        Err(SettlementError::NotConfigured)
    }

    async fn refund(&self, _req: RefundRequest<'_>) -> Result<RefundResult, SettlementError> {
        Err(SettlementError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_mutation_reports_not_configured() {
        let provider = DisabledSettlementProvider::new();
        let buyer = AgentId::from("buyer");
        assert_eq!(provider.balance(&buyer, None, None).await, 0);
        let err = provider.lock(&buyer, 10, None, None).await.unwrap_err();
        assert!(matches!(err, SettlementError::NotConfigured));
        assert_eq!(err.code(), commerce_core::error::FailureCode::SettlementProviderNotImplemented);
    }
}
