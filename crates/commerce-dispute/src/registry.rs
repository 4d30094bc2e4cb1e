//! Dispute registry (C6): bounded post-settlement refund window, idempotent
//! resolution, and an optional signed decision artifact. Mirrors the
//! settlement layer's "frozen policy, stateless collaborators, mutable
//! record" shape (`commerce_session::session::SessionDriver`).

use crate::decision::{sign_decision, SignedDecisionMaterial};
use crate::error::DisputeError;
use commerce_core::dispute::{Decision, DecisionPolicySnapshot, DisputeOutcome, DisputeRecord, DisputeStatus, SignedDecision};
use commerce_core::session::Receipt;
use commerce_core::types::{Amount, DecisionId, DisputeId, Timestamp};
use commerce_core::RefundResult;
use commerce_crypto::KeyPair;
use commerce_policy::CompiledPolicy;
use commerce_settlement::{RefundRequest, SettlementProvider};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// A dispute plus the receipt amounts it was opened against. The core
/// `DisputeRecord` has no amount fields of its own (ch.3's dispute-record
/// tuple is id/time/status/outcome only), so `resolve`'s refund-cap
/// arithmetic needs this alongside it.
struct OpenDispute {
    record: DisputeRecord,
    paid_amount: Amount,
    agreed_price: Amount,
}

/// Result of a successful `resolve`: the updated record and, if an
/// arbiter keypair was supplied, the signed decision artifact.
pub struct ResolveOutcome {
    pub record: DisputeRecord,
    pub refund: RefundResult,
    pub decision: Option<SignedDecision>,
}

pub struct DisputeRegistry {
    policy: Arc<CompiledPolicy>,
    provider: Arc<dyn SettlementProvider>,
    disputes: Mutex<HashMap<String, OpenDispute>>,
}

impl DisputeRegistry {
    pub fn new(policy: Arc<CompiledPolicy>, provider: Arc<dyn SettlementProvider>) -> Self {
        Self {
            policy,
            provider,
            disputes: Mutex::new(HashMap::new()),
        }
    }

    /// Open a dispute against a settled receipt. Fails if disputes are
    /// disabled by policy, the window is non-positive, or `now_ms` is past
    /// `receipt.timestamp_ms + window_ms`.
    pub fn open(&self, receipt: &Receipt, reason: String, now_ms: Timestamp) -> Result<DisputeRecord, DisputeError> {
        let policy = self.policy.disputes();
        if !policy.enabled {
            return Err(DisputeError::DisputesNotEnabled);
        }
        if policy.window_ms <= 0 {
            return Err(DisputeError::DisputesNotEnabled);
        }
        if now_ms - receipt.timestamp_ms > policy.window_ms {
            return Err(DisputeError::WindowElapsed);
        }

        let suffix: u32 = rand::thread_rng().gen();
        let dispute_id = DisputeId::from(format!("{}-{:08x}", receipt.receipt_id, suffix));
        let record = DisputeRecord {
            dispute_id: dispute_id.clone(),
            receipt_id: receipt.receipt_id.clone(),
            intent_id: receipt.intent_id.clone(),
            buyer_id: receipt.buyer_id.clone(),
            seller_id: receipt.seller_id.clone(),
            opened_at_ms: now_ms,
            deadline_at_ms: receipt.timestamp_ms + policy.window_ms,
            reason,
            status: DisputeStatus::Open,
            outcome: None,
            refund_amount: None,
            decision_hash_hex: None,
            arbiter_pubkey: None,
            decision_signature: None,
        };

        self.disputes.lock().unwrap().insert(
            dispute_id.as_str().to_string(),
            OpenDispute {
                record: record.clone(),
                paid_amount: receipt.paid_amount,
                agreed_price: receipt.agreed_price,
            },
        );
        info!(dispute_id = %record.dispute_id, receipt_id = %record.receipt_id, "dispute opened");
        Ok(record)
    }

    pub fn get(&self, dispute_id: &DisputeId) -> Option<DisputeRecord> {
        self.disputes.lock().unwrap().get(dispute_id.as_str()).map(|d| d.record.clone())
    }

    /// Resolve an open dispute. A second resolve on the same id always
    /// returns `NotOpen` with no further balance change (ch.4.6 idempotency).
    pub async fn resolve(
        &self,
        dispute_id: &DisputeId,
        outcome: DisputeOutcome,
        refund_amount: Option<Amount>,
        arbiter: Option<&KeyPair>,
        now_ms: Timestamp,
    ) -> Result<ResolveOutcome, DisputeError> {
        let (paid_amount, agreed_price, buyer_id, seller_id, receipt_id) = {
            let disputes = self.disputes.lock().unwrap();
            let open = disputes
                .get(dispute_id.as_str())
                .ok_or_else(|| DisputeError::NotFound(dispute_id.as_str().to_string()))?;
            if open.record.status != DisputeStatus::Open {
                return Err(DisputeError::NotOpen);
            }
            (
                open.paid_amount,
                open.agreed_price,
                open.record.buyer_id.clone(),
                open.record.seller_id.clone(),
                open.record.receipt_id.clone(),
            )
        };

        let policy = self.policy.disputes();
        let refund = match outcome {
            DisputeOutcome::NoRefund => 0,
            DisputeOutcome::RefundFull => {
                let pct_cap = (paid_amount as f64 * policy.max_refund_pct) as Amount;
                paid_amount.min(agreed_price).min(pct_cap)
            }
            DisputeOutcome::RefundPartial => {
                if !policy.allow_partial {
                    return Err(DisputeError::PartialRefundNotAllowed);
                }
                let amount = refund_amount.unwrap_or(0);
                if amount == 0 {
                    return Err(DisputeError::ZeroRefund);
                }
                let pct_cap = (paid_amount as f64 * policy.max_refund_pct) as Amount;
                if amount > pct_cap {
                    return Err(DisputeError::RefundExceedsMaxPct);
                }
                if amount > paid_amount {
                    return Err(DisputeError::RefundExceedsPaid);
                }
                amount
            }
        };

        let refund_result = if refund > 0 {
            self.provider
                .refund(RefundRequest {
                    dispute_id: dispute_id.as_str(),
                    from: &seller_id,
                    to: &buyer_id,
                    amount: refund,
                    idempotency_key: Some(dispute_id.as_str()),
                })
                .await
                .map_err(|e| DisputeError::Settlement(e.code()))?
        } else {
            RefundResult { ok: true, refunded_amount: 0, code: None }
        };

        if !refund_result.ok {
            let code = refund_result.code.unwrap_or(commerce_core::error::FailureCode::SettlementFailed);
            warn!(dispute_id = %dispute_id, ?code, "dispute refund rejected by settlement provider");
            return Err(DisputeError::Settlement(code));
        }

        let mut decision_material: Option<SignedDecisionMaterial> = None;
        let mut signed_decision: Option<SignedDecision> = None;
        if let Some(keypair) = arbiter {
            let decision = Decision {
                decision_id: DecisionId::from(format!("dec-{}", dispute_id)),
                dispute_id: dispute_id.clone(),
                receipt_id: receipt_id.clone(),
                outcome,
                refund_amount: refund,
                issued_at_ms: now_ms,
                notes: None,
                policy_snapshot: DecisionPolicySnapshot {
                    max_refund_pct: policy.max_refund_pct,
                    allow_partial: policy.allow_partial,
                },
            };
            let material = sign_decision(&decision, keypair);
            signed_decision = Some(SignedDecision {
                decision,
                decision_hash_hex: material.decision_hash_hex.clone(),
                arbiter_pubkey: material.arbiter_pubkey.clone(),
                signature: material.signature.clone(),
            });
            decision_material = Some(material);
        }

        let mut disputes = self.disputes.lock().unwrap();
        let open = disputes.get_mut(dispute_id.as_str()).expect("checked open above");
        open.record.status = DisputeStatus::Resolved;
        open.record.outcome = Some(outcome);
        open.record.refund_amount = Some(refund);
        if let Some(material) = &decision_material {
            open.record.decision_hash_hex = Some(material.decision_hash_hex.clone());
            open.record.arbiter_pubkey = Some(material.arbiter_pubkey.clone());
            open.record.decision_signature = Some(material.signature.clone());
        }
        let record = open.record.clone();
        drop(disputes);

        info!(dispute_id = %dispute_id, ?outcome, refund = %refund, "dispute resolved");
        Ok(ResolveOutcome { record, refund: refund_result, decision: signed_decision })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_core::types::{AgentId, IntentId, ReceiptId};
    use commerce_policy::PolicySpec;
    use commerce_settlement::MockSettlementProvider;

    fn sample_receipt() -> Receipt {
        Receipt {
            receipt_id: ReceiptId::from("rcpt-1"),
            intent_id: IntentId::from("intent-1"),
            buyer_id: AgentId::from("buyer-1"),
            seller_id: AgentId::from("seller-1"),
            agreed_price: 100_000,
            paid_amount: 100_000,
            fulfilled: true,
            timestamp_ms: 1_000,
            latency_ms: Some(200),
            failure_code: None,
            handle_id: None,
        }
    }

    #[tokio::test]
    async fn full_refund_moves_funds_and_resolve_is_once_only() {
        let policy = Arc::new(CompiledPolicy::compile(PolicySpec::sample()).unwrap());
        let provider = MockSettlementProvider::new();
        provider.seed_balance(&AgentId::from("seller-1"), None, None, 100_000);
        let provider: Arc<dyn SettlementProvider> = Arc::new(provider);
        let registry = DisputeRegistry::new(policy, provider.clone());

        let receipt = sample_receipt();
        let record = registry.open(&receipt, "item not as described".to_string(), 2_000).unwrap();
        assert_eq!(record.status, DisputeStatus::Open);

        let outcome = registry
            .resolve(&record.dispute_id, DisputeOutcome::RefundFull, None, None, 3_000)
            .await
            .unwrap();
        assert_eq!(outcome.refund.refunded_amount, 100_000);
        assert_eq!(outcome.record.status, DisputeStatus::Resolved);

        let buyer_balance = provider.balance(&AgentId::from("buyer-1"), None, None).await;
        let seller_balance = provider.balance(&AgentId::from("seller-1"), None, None).await;
        assert_eq!(buyer_balance, 100_000);
        assert_eq!(seller_balance, 0);

        let second = registry
            .resolve(&record.dispute_id, DisputeOutcome::RefundFull, None, None, 3_100)
            .await;
        assert_eq!(second.unwrap_err(), DisputeError::NotOpen);
    }

    #[test]
    fn open_fails_once_window_has_elapsed() {
        let policy = Arc::new(CompiledPolicy::compile(PolicySpec::sample()).unwrap());
        let provider: Arc<dyn SettlementProvider> = Arc::new(MockSettlementProvider::new());
        let registry = DisputeRegistry::new(policy, provider);
        let receipt = sample_receipt();
        let far_future = receipt.timestamp_ms + 86_400_000 + 1;
        let err = registry.open(&receipt, "late".to_string(), far_future).unwrap_err();
        assert_eq!(err, DisputeError::WindowElapsed);
    }

    #[tokio::test]
    async fn partial_refund_respects_max_pct_cap() {
        let mut spec = PolicySpec::sample();
        spec.disputes.max_refund_pct = 0.5;
        let policy = Arc::new(CompiledPolicy::compile(spec).unwrap());
        let provider = MockSettlementProvider::new();
        provider.seed_balance(&AgentId::from("seller-1"), None, None, 100_000);
        let provider: Arc<dyn SettlementProvider> = Arc::new(provider);
        let registry = DisputeRegistry::new(policy, provider);

        let receipt = sample_receipt();
        let record = registry.open(&receipt, "partial issue".to_string(), 2_000).unwrap();

        let err = registry
            .resolve(&record.dispute_id, DisputeOutcome::RefundPartial, Some(60_000), None, 3_000)
            .await
            .unwrap_err();
        assert_eq!(err, DisputeError::RefundExceedsMaxPct);

        let ok = registry
            .resolve(&record.dispute_id, DisputeOutcome::RefundPartial, Some(40_000), None, 3_100)
            .await
            .unwrap();
        assert_eq!(ok.refund.refunded_amount, 40_000);
    }
}
