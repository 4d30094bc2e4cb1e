//! A settlement provider shaped like a card-present payment rail:
//! `prepare` authorizes (places a hold, assigns `auth_id`), `commit`
//! captures (assigns `capture_id`, moves funds), and `abort` voids an
//! uncaptured authorization. This demonstrates how the same
//! `SettlementProvider` contract maps onto a rail that speaks
//! authorize/capture/void rather than lock/pay directly; the ledger
//! bookkeeping mirrors `MockSettlementProvider` but the handle metadata
//! carries the rail-specific ids a real adapter would also surface.

use crate::provider::{RefundRequest, SettlementError, SettlementProvider};
use async_trait::async_trait;
use commerce_core::error::FailureCode;
use commerce_core::settlement::{HandleMeta, HandleStatus};
use commerce_core::types::{AgentId, Amount, Chain, HandleId};
use commerce_core::{RefundResult, SettlementHandle, SettlementIntent, SettlementResult};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

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

/// Authorize/capture/void settlement rail. Every authorization captures
/// synchronously on `commit`; there is no asynchronous settlement path
/// here (that is exercised by `MockSettlementProvider::asynchronous`).
pub struct AuthCaptureSettlementProvider {
    accounts: Mutex<HashMap<String, AccountLedger>>,
    handles: Mutex<HashMap<String, SettlementHandle>>,
    idempotency: Mutex<HashMap<(String, String), String>>,
    refunds: Mutex<HashMap<String, RefundResult>>,
    auth_seq: Mutex<u64>,
}

impl AuthCaptureSettlementProvider {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
            idempotency: Mutex::new(HashMap::new()),
            refunds: Mutex::new(HashMap::new()),
            auth_seq: Mutex::new(0),
        }
    }

    pub fn seed_balance(&self, account: &AgentId, chain: Option<Chain>, asset: Option<&str>, amount: Amount) {
        let mut accounts = self.accounts.lock().unwrap();
        accounts.entry(account_key(account, chain, asset)).or_default().balance = amount;
    }

    fn next_auth_id(&self) -> String {
        let mut seq = self.auth_seq.lock().unwrap();
        *seq += 1;
        format!("auth_{:08x}", *seq)
    }
}

impl Default for AuthCaptureSettlementProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettlementProvider for AuthCaptureSettlementProvider {
    async fn balance(&self, account: &AgentId, chain: Option<Chain>, asset: Option<&str>) -> Amount {
        self.accounts
            .lock()
            .unwrap()
            .get(&account_key(account, chain, asset))
            .map(|l| l.balance)
            .unwrap_or(0)
    }

    async fn locked(&self, account: &AgentId, chain: Option<Chain>, asset: Option<&str>) -> Amount {
        self.accounts
            .lock()
            .unwrap()
            .get(&account_key(account, chain, asset))
            .map(|l| l.locked)
            .unwrap_or(0)
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
                    return Ok(h.clone());
                }
            }
        }

        self.lock(&intent.from, intent.amount, intent.chain, intent.asset.as_deref())
            .await?;

        let handle_id = commerce_crypto::handle_id(intent.intent_id.as_str(), &idem_key);
        let auth_id = self.next_auth_id();
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
                auth_id: Some(auth_id.clone()),
                capture_id: None,
                abort_reason: None,
            },
            attempts: 0,
            last_attempt_ms: None,
            failure_code: None,
        };

        self.handles.lock().unwrap().insert(handle_id.clone(), handle.clone());
        self.idempotency.lock().unwrap().insert(dedup_key, handle_id.clone());
        info!(handle_id = %handle_id, auth_id = %auth_id, "authorization placed");
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
        let from = handle.meta.from.clone().expect("authorized handle always has from");
        let to = handle.meta.to.clone().expect("authorized handle always has to");
        let amount = handle.locked_amount;
        let chain = handle.meta.chain;
        let asset = handle.meta.asset.clone();
        let capture_id = format!("cap_{}", handle_id);
        handle.meta.capture_id = Some(capture_id.clone());
        handle.status = HandleStatus::Committed;
        drop(handles);

        {
            let mut accounts = self.accounts.lock().unwrap();
            let from_ledger = accounts.entry(account_key(&from, chain, asset.as_deref())).or_default();
            from_ledger.locked = from_ledger.locked.saturating_sub(amount);
            accounts.entry(account_key(&to, chain, asset.as_deref())).or_default().balance += amount;
        }

        info!(handle_id = %handle_id, capture_id = %capture_id, "authorization captured");
        Ok(SettlementResult {
            status: HandleStatus::Committed,
            paid_amount: amount,
            committed_at_ms: Some(0),
            failure_code: None,
        })
    }

    async fn poll(&self, handle_id: &str) -> Result<SettlementResult, SettlementError> {
        let handles = self.handles.lock().unwrap();
        let handle = handles
            .get(handle_id)
            .ok_or_else(|| SettlementError::UnknownHandle(handle_id.to_string()))?;
        Ok(SettlementResult {
            status: handle.status,
            paid_amount: if handle.status == HandleStatus::Committed {
                handle.locked_amount
            } else {
                0
            },
            committed_at_ms: if handle.status == HandleStatus::Committed { Some(0) } else { None },
            failure_code: handle.failure_code,
        })
    }

    async fn abort(&self, handle_id: &str, reason: Option<&str>) -> Result<(), SettlementError> {
        let mut handles = self.handles.lock().unwrap();
        let handle = handles
            .get_mut(handle_id)
            .ok_or_else(|| SettlementError::UnknownHandle(handle_id.to_string()))?;

        if handle.status == HandleStatus::Committed {
            return Err(SettlementError::InvalidHandleState(
                "cannot void a captured authorization".to_string(),
            ));
        }
        if handle.status == HandleStatus::Prepared {
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
    use commerce_core::types::IntentId;

    fn agent(s: &str) -> AgentId {
        AgentId::from(s)
    }

    #[tokio::test]
    async fn authorize_then_capture_assigns_both_ids() {
        let provider = AuthCaptureSettlementProvider::new();
        let buyer = agent("buyer");
        let seller = agent("seller");
        provider.seed_balance(&buyer, None, None, 500);
        let handle = provider
            .prepare(SettlementIntent {
                intent_id: IntentId::from("intent-1"),
                from: buyer,
                to: seller.clone(),
                amount: 200,
                mode: SettlementMode::HashReveal,
                idempotency_key: Some("key-1".into()),
                chain: None,
                asset: None,
            })
            .await
            .unwrap();
        assert!(handle.meta.auth_id.is_some());
        let result = provider.commit(&handle.handle_id.0).await.unwrap();
        assert_eq!(result.status, HandleStatus::Committed);
        assert_eq!(provider.balance(&seller, None, None).await, 200);
    }

    #[tokio::test]
    async fn void_after_capture_is_rejected() {
        let provider = AuthCaptureSettlementProvider::new();
        let buyer = agent("buyer");
        let seller = agent("seller");
        provider.seed_balance(&buyer, None, None, 500);
        let handle = provider
            .prepare(SettlementIntent {
                intent_id: IntentId::from("intent-1"),
                from: buyer,
                to: seller,
                amount: 200,
                mode: SettlementMode::HashReveal,
                idempotency_key: Some("key-1".into()),
                chain: None,
                asset: None,
            })
            .await
            .unwrap();
        provider.commit(&handle.handle_id.0).await.unwrap();
        assert!(provider.abort(&handle.handle_id.0, None).await.is_err());
    }
}
