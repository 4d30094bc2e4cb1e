//! commerce-reconciler
//!
//! Periodic sweep (ch.4.8): a stateless operation over a collection of
//! open transcripts that polls each one's pending settlement handle and
//! records what it found. It never re-opens a transcript whose session
//! already reached a terminal, non-pending outcome — the sweep only acts
//! on the *last* lifecycle event, and if that isn't `Pending` there is
//! nothing to reconcile.

use commerce_core::settlement::HandleStatus;
use commerce_core::types::{HandleId, Timestamp};
use commerce_settlement::SettlementProvider;
use commerce_transcript::{LifecycleEvent, ReconcileEvent, Transcript};
use std::sync::Arc;
use tracing::{info, warn};

/// One transcript's outcome from a single sweep pass.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub handle_id: HandleId,
    pub from_status: HandleStatus,
    pub to_status: HandleStatus,
    pub resolved: bool,
}

pub struct Reconciler {
    provider: Arc<dyn SettlementProvider>,
}

impl Reconciler {
    pub fn new(provider: Arc<dyn SettlementProvider>) -> Self {
        Self { provider }
    }

    /// Reconcile a single transcript, appending a `reconcile_event` and,
    /// if the provider now reports a terminal status, a matching
    /// `settlement_lifecycle` entry. Returns `None` if the transcript has
    /// no pending handle to act on.
    pub async fn reconcile_one(&self, transcript: &mut Transcript, now_ms: Timestamp) -> Option<ReconcileOutcome> {
        let last = transcript.settlement_lifecycle.last()?;
        if last.status != HandleStatus::Pending {
            return None;
        }
        let handle_id = last.handle_id.clone()?;
        let from_status = last.status;
        let prepared_at_ms = last.prepared_at_ms;

        match self.provider.poll(handle_id.as_str()).await {
            Ok(result) => {
                let to_status = result.status;
                transcript.reconcile_events.push(ReconcileEvent {
                    ts_ms: now_ms,
                    handle_id: handle_id.clone(),
                    from_status,
                    to_status,
                    note: None,
                });
                let resolved = to_status != HandleStatus::Pending;
                if resolved {
                    transcript.settlement_lifecycle.push(LifecycleEvent {
                        ts_ms: now_ms,
                        status: to_status,
                        handle_id: Some(handle_id.clone()),
                        paid_amount: if result.paid_amount > 0 { Some(result.paid_amount) } else { None },
                        prepared_at_ms,
                        committed_at_ms: result.committed_at_ms,
                        failure_code: result.failure_code,
                    });
                    info!(handle_id = %handle_id, ?from_status, ?to_status, "reconciler resolved pending handle");
                } else {
                    info!(handle_id = %handle_id, "reconciler polled handle, still pending");
                }
                Some(ReconcileOutcome { handle_id, from_status, to_status, resolved })
            }
            Err(err) => {
                warn!(handle_id = %handle_id, error = %err, "reconciler poll failed");
                transcript.reconcile_events.push(ReconcileEvent {
                    ts_ms: now_ms,
                    handle_id: handle_id.clone(),
                    from_status,
                    to_status: from_status,
                    note: Some(err.to_string()),
                });
                None
            }
        }
    }

    /// Sweep every transcript in `transcripts`, in order. Transcripts
    /// without a pending handle are skipped at no cost beyond the status
    /// check, so this is safe to call on a mixed batch of open and closed
    /// exchanges.
    pub async fn sweep(&self, transcripts: &mut [Transcript], now_ms: Timestamp) -> Vec<ReconcileOutcome> {
        let mut outcomes = Vec::new();
        for transcript in transcripts.iter_mut() {
            if let Some(outcome) = self.reconcile_one(transcript, now_ms).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_core::types::{AgentId, IntentId};
    use commerce_settlement::MockSettlementProvider;

    fn pending_transcript(handle_id: &str) -> Transcript {
        let mut transcript = Transcript::new(IntentId::from("intent-1"));
        transcript.settlement_lifecycle.push(LifecycleEvent {
            ts_ms: 1_000,
            status: HandleStatus::Pending,
            handle_id: Some(HandleId::from(handle_id)),
            paid_amount: None,
            prepared_at_ms: Some(1_000),
            committed_at_ms: None,
            failure_code: None,
        });
        transcript
    }

    #[tokio::test]
    async fn pending_handle_that_committed_appends_lifecycle_and_reconcile_events() {
        let provider = MockSettlementProvider::new();
        provider.seed_balance(&AgentId::from("buyer-1"), None, None, 1_000);
        let intent = commerce_core::settlement::SettlementIntent {
            intent_id: IntentId::from("intent-1"),
            from: AgentId::from("buyer-1"),
            to: AgentId::from("seller-1"),
            amount: 500,
            mode: commerce_core::settlement::SettlementMode::HashReveal,
            idempotency_key: Some("key-1".to_string()),
            chain: None,
            asset: None,
        };
        let handle = provider.prepare(intent).await.unwrap();
        provider.commit(handle.handle_id.as_str()).await.unwrap();

        let provider: Arc<dyn SettlementProvider> = Arc::new(provider);
        let reconciler = Reconciler::new(provider);
        let mut transcript = pending_transcript(handle.handle_id.as_str());

        let outcome = reconciler.reconcile_one(&mut transcript, 2_000).await.unwrap();
        assert!(outcome.resolved);
        assert_eq!(outcome.to_status, HandleStatus::Committed);
        assert_eq!(transcript.reconcile_events.len(), 1);
        assert_eq!(transcript.settlement_lifecycle.len(), 2);
        assert_eq!(transcript.settlement_lifecycle.last().unwrap().status, HandleStatus::Committed);
    }

    #[tokio::test]
    async fn non_pending_transcript_is_skipped() {
        let provider: Arc<dyn SettlementProvider> = Arc::new(MockSettlementProvider::new());
        let reconciler = Reconciler::new(provider);
        let mut transcript = Transcript::new(IntentId::from("intent-1"));
        transcript.settlement_lifecycle.push(LifecycleEvent {
            ts_ms: 1_000,
            status: HandleStatus::Committed,
            handle_id: Some(HandleId::from("handle-1")),
            paid_amount: Some(500),
            prepared_at_ms: Some(500),
            committed_at_ms: Some(1_000),
            failure_code: None,
        });

        let outcome = reconciler.reconcile_one(&mut transcript, 2_000).await;
        assert!(outcome.is_none());
        assert!(transcript.reconcile_events.is_empty());
    }
}
