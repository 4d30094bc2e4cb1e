//! In-memory reference settlement ledger. Used by the demo binary and by
//! the test suite; a production deployment would swap this for an
//! external-rail adapter behind the same `SettlementProvider` contract.

use crate::provider::{RefundRequest, SettlementError, SettlementProvider};
use async_trait::async_trait;
use commerce_core::error::FailureCode;
use commerce_core::settlement::{HandleMeta, HandleStatus};
use commerce_core::types::{AgentId, Amount, Chain, HandleId, IntentId};
use commerce_core::{RefundResult, SettlementHandle, SettlementIntent, SettlementResult};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy)]
struct AccountLedger {
    balance: Amount,
    locked: Amount,
}

fn account_key(account: &AgentId, chain: Option<Chain>, asset: Option<&str>) -> String {
    format!(
        "{}:{:?}:{}",
        account.as_str(),
        chain.unwrap_or(Chain::Unknown),
        asset.unwrap_or("")
    )
}

/// Deterministic in-memory ledger with a prepare/commit/abort/poll/refund
/// lifecycle. Commits synchronously unless `fail_commit` or
/// `pending_commit` is set on construction, which exercise the
/// asynchronous and failure paths in the session state machine.
pub struct MockSettlementProvider {
    accounts: Mutex<HashMap<String, AccountLedger>>,
    handles: Mutex<HashMap<String, SettlementHandle>>,
    idempotency: Mutex<HashMap<(String, String), String>>,
    refunds: Mutex<HashMap<String, RefundResult>>,
    fail_commit: bool,
    pending_commit: bool,
}

impl MockSettlementProvider {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
            idempotency: Mutex::new(HashMap::new()),
            refunds: Mutex::new(HashMap::new()),
            fail_commit: false,
            pending_commit: false,
        }
    }

    /// Construct a provider whose `commit` always fails synchronously.
    pub fn failing() -> Self {
        Self {
            fail_commit: true,
            ..Self::new()
        }
    }

    /// Construct a provider whose `commit` returns `pending` and only
    /// resolves on an explicit `poll`.
    pub fn asynchronous() -> Self {
        Self {
            pending_commit: true,
            ..Self::new()
        }
    }

    pub fn seed_balance(&self, account: &AgentId, chain: Option<Chain>, asset: Option<&str>, amount: Amount) {
        let mut accounts = self.accounts.lock().unwrap();
        accounts.entry(account_key(account, chain, asset)).or_default().balance = amount;
    }

    fn get_ledger(&self, key: &str) -> AccountLedger {
        self.accounts.lock().unwrap().get(key).copied().unwrap_or_default()
    }
}

impl Default for MockSettlementProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettlementProvider for MockSettlementProvider {
    async fn balance(&self, account: &AgentId, chain: Option<Chain>, asset: Option<&str>) -> Amount {
        self.get_ledger(&account_key(account, chain, asset)).balance
    }

    async fn locked(&self, account: &AgentId, chain: Option<Chain>, asset: Option<&str>) -> Amount {
        self.get_ledger(&account_key(account, chain, asset)).locked
    }

    async fn lock(
        &self,
        account: &AgentId,
        amount: Amount,
        chain: Option<Chain>,
        asset: Option<&str>,
    ) -> Result<(), SettlementError> {
        let key = account_key(account, chain, asset);
        let mut accounts = self.accounts.lock().unwrap();
        let ledger = accounts.entry(key).or_default();
        if ledger.balance < amount {
            return Err(SettlementError::InsufficientAvailable {
                need: amount,
                have: ledger.balance,
            });
        }
        ledger.balance -= amount;
        ledger.locked += amount;
        Ok(())
    }

    async fn release(
        &self,
        account: &AgentId,
        amount: Amount,
        chain: Option<Chain>,
        asset: Option<&str>,
    ) -> Result<(), SettlementError> {
        let key = account_key(account, chain, asset);
        let mut accounts = self.accounts.lock().unwrap();
        let ledger = accounts.entry(key).or_default();
        if ledger.locked < amount {
            return Err(SettlementError::InsufficientLocked {
                need: amount,
                have: ledger.locked,
            });
        }
        ledger.locked -= amount;
        ledger.balance += amount;
        Ok(())
    }

    async fn pay(
        &self,
        from: &AgentId,
        to: &AgentId,
        amount: Amount,
        chain: Option<Chain>,
        asset: Option<&str>,
    ) -> Result<(), SettlementError> {
        let from_key = account_key(from, chain, asset);
        let to_key = account_key(to, chain, asset);
        let mut accounts = self.accounts.lock().unwrap();
        let from_ledger = accounts.entry(from_key).or_default();
        if from_ledger.balance < amount {
            return Err(SettlementError::InsufficientAvailable {
                need: amount,
                have: from_ledger.balance,
            });
        }
        from_ledger.balance -= amount;
        accounts.entry(to_key).or_default().balance += amount;
        Ok(())
    }

    async fn slash_bond(
        &self,
        provider_account: &AgentId,
        amount: Amount,
        beneficiary: &AgentId,
        chain: Option<Chain>,
        asset: Option<&str>,
    ) -> Result<(), SettlementError> {
        let provider_key = account_key(provider_account, chain, asset);
        let beneficiary_key = account_key(beneficiary, chain, asset);
        let mut accounts = self.accounts.lock().unwrap();
        let provider_ledger = accounts.entry(provider_key).or_default();
        let from_locked = amount.min(provider_ledger.locked);
        provider_ledger.locked -= from_locked;
        let remainder = amount - from_locked;
        if remainder > 0 {
            if provider_ledger.balance < remainder {
                return Err(SettlementError::InsufficientAvailable {
                    need: remainder,
                    have: provider_ledger.balance,
                });
            }
            provider_ledger.balance -= remainder;
        }
        accounts.entry(beneficiary_key).or_default().balance += amount;
        warn!(provider = %provider_account, %beneficiary, amount = %amount, "bond slashed");
        Ok(())
    }

    async fn prepare(&self, intent: SettlementIntent) -> Result<SettlementHandle, SettlementError> {
        let idem_key = intent.idempotency_key.clone().unwrap_or_else(|| "default".to_string());
        let dedup_key = (intent.intent_id.as_str().to_string(), idem_key.clone());

        {
            let idempotency = self.idempotency.lock().unwrap();
            if let Some(existing_handle_id) = idempotency.get(&dedup_key) {
                let handles = self.handles.lock().unwrap();
                if let Some(h) = handles.get(existing_handle_id) {
                    debug!(handle_id = %existing_handle_id, "prepare idempotent replay, no re-lock");
                    return Ok(h.clone());
                }
            }
        }

        self.lock(&intent.from, intent.amount, intent.chain, intent.asset.as_deref())
            .await?;

        let handle_id = commerce_crypto::handle_id(intent.intent_id.as_str(), &idem_key);
        let handle = SettlementHandle {
            handle_id: HandleId(handle_id.clone()),
            intent_id: intent.intent_id.clone(),
            status: HandleStatus::Prepared,
            locked_amount: intent.amount,
            created_at_ms: 0,
            meta: HandleMeta {
                from: Some(intent.from.clone()),
                to: Some(intent.to.clone()),
                chain: intent.chain,
                asset: intent.asset.clone(),
                auth_id: None,
                capture_id: None,
                abort_reason: None,
            },
            attempts: 0,
            last_attempt_ms: None,
            failure_code: None,
        };

        self.handles.lock().unwrap().insert(handle_id.clone(), handle.clone());
        self.idempotency.lock().unwrap().insert(dedup_key, handle_id.clone());
        info!(handle_id = %handle_id, intent_id = %handle.intent_id, "settlement prepared");
        Ok(handle)
    }

    async fn commit(&self, handle_id: &str) -> Result<SettlementResult, SettlementError> {
        let mut handles = self.handles.lock().unwrap();
        let handle = handles
            .get_mut(handle_id)
            .ok_or_else(|| SettlementError::UnknownHandle(handle_id.to_string()))?;

        if handle.status == HandleStatus::Committed {
            return Ok(SettlementResult {
                status: HandleStatus::Committed,
                paid_amount: handle.locked_amount,
                committed_at_ms: Some(0),
                failure_code: None,
            });
        }
        if handle.status != HandleStatus::Prepared {
            return Err(SettlementError::InvalidHandleState(handle_id.to_string()));
        }

        handle.attempts += 1;

        if self.fail_commit {
            let from = handle.meta.from.clone().expect("prepared handle always has from");
            let amount = handle.locked_amount;
            let chain = handle.meta.chain;
            let asset = handle.meta.asset.clone();
            handle.status = HandleStatus::Failed;
            handle.failure_code = Some(FailureCode::SettlementFailed);
            drop(handles);
            self.release(&from, amount, chain, asset.as_deref()).await.ok();
            return Err(SettlementError::Failed {
                code: FailureCode::SettlementFailed,
                reason: "commit failed".to_string(),
            });
        }

        if self.pending_commit {
            handle.status = HandleStatus::Pending;
            return Ok(SettlementResult {
                status: HandleStatus::Pending,
                paid_amount: 0,
                committed_at_ms: None,
                failure_code: None,
            });
        }

        let from = handle.meta.from.clone().expect("prepared handle always has from");
        let to = handle.meta.to.clone().expect("prepared handle always has to");
        let amount = handle.locked_amount;
        let chain = handle.meta.chain;
        let asset = handle.meta.asset.clone();
        handle.status = HandleStatus::Committed;
        drop(handles);

        {
            let mut accounts = self.accounts.lock().unwrap();
            let from_ledger = accounts.entry(account_key(&from, chain, asset.as_deref())).or_default();
            from_ledger.locked = from_ledger.locked.saturating_sub(amount);
            accounts.entry(account_key(&to, chain, asset.as_deref())).or_default().balance += amount;
        }

        info!(handle_id, "settlement committed");
        Ok(SettlementResult {
            status: HandleStatus::Committed,
            paid_amount: amount,
            committed_at_ms: Some(0),
            failure_code: None,
        })
    }

    async fn poll(&self, handle_id: &str) -> Result<SettlementResult, SettlementError> {
        let mut handles = self.handles.lock().unwrap();
        let handle = handles
            .get_mut(handle_id)
            .ok_or_else(|| SettlementError::UnknownHandle(handle_id.to_string()))?;

        match handle.status {
            HandleStatus::Pending => {
                // The reference provider resolves a pending handle on the
                // first poll after construction with `asynchronous()`.
                let from = handle.meta.from.clone().expect("pending handle always has from");
                let to = handle.meta.to.clone().expect("pending handle always has to");
                let amount = handle.locked_amount;
                let chain = handle.meta.chain;
                let asset = handle.meta.asset.clone();
                handle.status = HandleStatus::Committed;
                drop(handles);
                let mut accounts = self.accounts.lock().unwrap();
                let from_ledger = accounts.entry(account_key(&from, chain, asset.as_deref())).or_default();
                from_ledger.locked = from_ledger.locked.saturating_sub(amount);
                accounts.entry(account_key(&to, chain, asset.as_deref())).or_default().balance += amount;
                Ok(SettlementResult {
                    status: HandleStatus::Committed,
                    paid_amount: amount,
                    committed_at_ms: Some(0),
                    failure_code: None,
                })
            }
            HandleStatus::Committed => Ok(SettlementResult {
                status: HandleStatus::Committed,
                paid_amount: handle.locked_amount,
                committed_at_ms: Some(0),
                failure_code: None,
            }),
            other => Ok(SettlementResult {
                status: other,
                paid_amount: 0,
                committed_at_ms: None,
                failure_code: handle.failure_code,
            }),
        }
    }

    async fn abort(&self, handle_id: &str, reason: Option<&str>) -> Result<(), SettlementError> {
        let mut handles = self.handles.lock().unwrap();
        let handle = handles
            .get_mut(handle_id)
            .ok_or_else(|| SettlementError::UnknownHandle(handle_id.to_string()))?;

        if handle.status == HandleStatus::Committed {
            return Err(SettlementError::InvalidHandleState(
                "cannot abort a committed handle".to_string(),
            ));
        }
        if matches!(handle.status, HandleStatus::Prepared | HandleStatus::Pending) {
            let from = handle.meta.from.clone();
            let amount = handle.locked_amount;
            let chain = handle.meta.chain;
            let asset = handle.meta.asset.clone();
            handle.status = HandleStatus::Aborted;
            handle.meta.abort_reason = reason.map(str::to_string);
            drop(handles);
            if let Some(from) = from {
                let mut accounts = self.accounts.lock().unwrap();
                let ledger = accounts.entry(account_key(&from, chain, asset.as_deref())).or_default();
                ledger.locked = ledger.locked.saturating_sub(amount);
                ledger.balance += amount;
            }
        }
        Ok(())
    }

    async fn refund(&self, req: RefundRequest<'_>) -> Result<RefundResult, SettlementError> {
        let key = req.idempotency_key.unwrap_or(req.dispute_id).to_string();
        {
            let refunds = self.refunds.lock().unwrap();
            if let Some(existing) = refunds.get(&key) {
                return Ok(existing.clone());
            }
        }

        let from_balance = self.balance(req.from, None, None).await;
        if from_balance < req.amount {
            return Err(SettlementError::Failed {
                code: FailureCode::RefundInsufficientFunds,
                reason: "refund exceeds available balance".to_string(),
            });
        }
        self.pay(req.from, req.to, req.amount, None, None).await?;

        let result = RefundResult {
            ok: true,
            refunded_amount: req.amount,
            code: None,
        };
        self.refunds.lock().unwrap().insert(key, result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_core::settlement::SettlementMode;

    fn agent(s: &str) -> AgentId {
        AgentId::from(s)
    }

    #[tokio::test]
    async fn lock_then_release_restores_balance() {
        let provider = MockSettlementProvider::new();
        let buyer = agent("buyer");
        provider.seed_balance(&buyer, None, None, 1000);
        provider.lock(&buyer, 400, None, None).await.unwrap();
        assert_eq!(provider.balance(&buyer, None, None).await, 600);
        assert_eq!(provider.locked(&buyer, None, None).await, 400);
        provider.release(&buyer, 400, None, None).await.unwrap();
        assert_eq!(provider.balance(&buyer, None, None).await, 1000);
        assert_eq!(provider.locked(&buyer, None, None).await, 0);
    }

    #[tokio::test]
    async fn prepare_is_idempotent_under_same_key() {
        let provider = MockSettlementProvider::new();
        let buyer = agent("buyer");
        let seller = agent("seller");
        provider.seed_balance(&buyer, None, None, 1000);
        let intent = SettlementIntent {
            intent_id: IntentId::from("intent-1"),
            from: buyer.clone(),
            to: seller.clone(),
            amount: 100,
            mode: SettlementMode::HashReveal,
            idempotency_key: Some("key-1".to_string()),
            chain: None,
            asset: None,
        };
        let h1 = provider.prepare(intent.clone()).await.unwrap();
        let h2 = provider.prepare(intent).await.unwrap();
        assert_eq!(h1.handle_id, h2.handle_id);
        assert_eq!(provider.locked(&buyer, None, None).await, 100);
    }

    #[tokio::test]
    async fn commit_moves_funds_exactly_once() {
        let provider = MockSettlementProvider::new();
        let buyer = agent("buyer");
        let seller = agent("seller");
        provider.seed_balance(&buyer, None, None, 1000);
        let intent = SettlementIntent {
            intent_id: IntentId::from("intent-1"),
            from: buyer.clone(),
            to: seller.clone(),
            amount: 100,
            mode: SettlementMode::HashReveal,
            idempotency_key: Some("key-1".to_string()),
            chain: None,
            asset: None,
        };
        let handle = provider.prepare(intent).await.unwrap();
        let result = provider.commit(&handle.handle_id.0).await.unwrap();
        assert_eq!(result.status, HandleStatus::Committed);
        assert_eq!(provider.balance(&seller, None, None).await, 100);
        assert_eq!(provider.balance(&buyer, None, None).await, 900);
        assert_eq!(provider.locked(&buyer, None, None).await, 0);
    }

    #[tokio::test]
    async fn abort_after_commit_fails() {
        let provider = MockSettlementProvider::new();
        let buyer = agent("buyer");
        let seller = agent("seller");
        provider.seed_balance(&buyer, None, None, 1000);
        let intent = SettlementIntent {
            intent_id: IntentId::from("intent-1"),
            from: buyer,
            to: seller,
            amount: 100,
            mode: SettlementMode::HashReveal,
            idempotency_key: Some("key-1".to_string()),
            chain: None,
            asset: None,
        };
        let handle = provider.prepare(intent).await.unwrap();
        provider.commit(&handle.handle_id.0).await.unwrap();
        assert!(provider.abort(&handle.handle_id.0, None).await.is_err());
    }
}
