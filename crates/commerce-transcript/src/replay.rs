//! Replay verifier (ch.4.7): a pure function over a `Transcript` that
//! recomputes every check the live session made and reports whether the
//! transcript is internally consistent. Unlike the session's own guards,
//! replay never short-circuits on the first failure — it accumulates every
//! mismatch it finds so a caller gets the full picture in one pass.

use crate::model::Transcript;
use commerce_core::message::Message;
use commerce_core::session::TerminalOutcome;
use commerce_core::types::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayFailureCode {
    CredentialExpired,
    CredentialSignerMismatch,
    QuoteSignerMismatch,
    CommitRevealMismatch,
    MissingCommitRevealArtifact,
    EnvelopeVerificationFailed,
    LifecycleInvariantViolated,
    OutcomeInconsistentWithReceipt,
    MissingOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFailure {
    pub code: ReplayFailureCode,
    pub reason: String,
}

impl ReplayFailure {
    fn new(code: ReplayFailureCode, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayCounters {
    pub envelopes_checked: usize,
    pub credential_checks_checked: usize,
    pub quote_entries_checked: usize,
    pub lifecycle_events_checked: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub ok: bool,
    pub failures: Vec<ReplayFailure>,
    pub counters: ReplayCounters,
}

/// Re-verify a transcript against `now_ms`, the instant replay is being
/// performed at (credential expiry is evaluated against it, not against
/// any timestamp recorded in the transcript).
pub fn replay(transcript: &Transcript, now_ms: Timestamp) -> ReplaySummary {
    let mut failures = Vec::new();
    let mut counters = ReplayCounters::default();

    for env in &transcript.envelopes {
        counters.envelopes_checked += 1;
        if !commerce_crypto::verify(env) {
            failures.push(ReplayFailure::new(
                ReplayFailureCode::EnvelopeVerificationFailed,
                format!("envelope for {} fails signature verification", env.message.variant_name()),
            ));
        }
    }

    for check in &transcript.credential_checks {
        counters.credential_checks_checked += 1;
        if let Some(expires_at_ms) = check.expires_at_ms {
            if now_ms > expires_at_ms {
                failures.push(ReplayFailure::new(
                    ReplayFailureCode::CredentialExpired,
                    format!("credential for {} expired at {}", check.subject, expires_at_ms),
                ));
            }
        }
        if let (Some(expected), Some(actual)) = (&check.signer_pubkey, &check.provider_pubkey) {
            if expected.0 != actual.0 {
                failures.push(ReplayFailure::new(
                    ReplayFailureCode::CredentialSignerMismatch,
                    format!("credential for {} signed by an unexpected key", check.subject),
                ));
            }
        }
    }

    for quote in &transcript.quote_entries {
        counters.quote_entries_checked += 1;
        if let (Some(expected), Some(actual)) = (&quote.expected_signer_pubkey, &quote.actual_signer_pubkey) {
            if expected.0 != actual.0 {
                failures.push(ReplayFailure::new(
                    ReplayFailureCode::QuoteSignerMismatch,
                    format!("round {} signed by an unexpected key", quote.round),
                ));
            }
        }
    }

    if transcript.envelopes.iter().any(|e| matches!(e.message, Message::Commit(_))) {
        let artifact = &transcript.commit_reveal;
        match (&artifact.commit_hash_hex, &artifact.payload_b64, &artifact.nonce_b64) {
            (Some(commit_hash_hex), Some(payload_b64), Some(nonce_b64)) => {
                if !commerce_crypto::verify_reveal(commit_hash_hex, payload_b64, nonce_b64) {
                    failures.push(ReplayFailure::new(
                        ReplayFailureCode::CommitRevealMismatch,
                        "recomputed commit hash does not match the committed hash",
                    ));
                }
            }
            (Some(_), None, None) => {
                // COMMIT without a REVEAL: the exchange never completed, not a
                // replay failure on its own.
            }
            _ => {
                failures.push(ReplayFailure::new(
                    ReplayFailureCode::MissingCommitRevealArtifact,
                    "a COMMIT envelope exists but the transcript is missing its reveal artifact",
                ));
            }
        }
    }

    let mut prev_status = None;
    for event in &transcript.settlement_lifecycle {
        counters.lifecycle_events_checked += 1;
        if let Some(prev) = prev_status {
            if !lifecycle_transition_is_plausible(prev, event.status) {
                failures.push(ReplayFailure::new(
                    ReplayFailureCode::LifecycleInvariantViolated,
                    format!("settlement status regressed from {:?} to {:?}", prev, event.status),
                ));
            }
        }
        prev_status = Some(event.status);
    }

    match &transcript.outcome {
        None => {
            if transcript.receipt.is_some() {
                failures.push(ReplayFailure::new(
                    ReplayFailureCode::MissingOutcome,
                    "transcript carries a receipt but no recorded terminal outcome",
                ));
            }
        }
        Some(outcome) => {
            if !outcome_matches_receipt(*outcome, transcript.receipt.as_ref()) {
                failures.push(ReplayFailure::new(
                    ReplayFailureCode::OutcomeInconsistentWithReceipt,
                    format!("outcome {outcome:?} is inconsistent with the transcript's receipt"),
                ));
            }
        }
    }

    ReplaySummary { ok: failures.is_empty(), failures, counters }
}

/// The only outcome that issues a *fulfilled* receipt is `Accepted`; the
/// only failure outcome that issues any receipt at all is `FailedProof`
/// (the commit-reveal slash path), and that receipt is always unfulfilled.
/// Every other terminal outcome must leave `receipt` unset.
fn outcome_matches_receipt(outcome: TerminalOutcome, receipt: Option<&commerce_core::session::Receipt>) -> bool {
    match outcome {
        TerminalOutcome::Accepted => matches!(receipt, Some(r) if r.fulfilled),
        TerminalOutcome::FailedProof => matches!(receipt, Some(r) if !r.fulfilled),
        _ => receipt.is_none(),
    }
}

/// Terminal statuses never transition onward; everything else may advance
/// to any later status, including straight to a terminal one.
fn lifecycle_transition_is_plausible(
    prev: commerce_core::settlement::HandleStatus,
    next: commerce_core::settlement::HandleStatus,
) -> bool {
    use commerce_core::settlement::HandleStatus::*;
    match prev {
        Committed | Aborted | Failed => next == prev,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommitRevealArtifact;
    use commerce_core::message::{CommitMsg, IntentMsg, Message, RevealMsg};
    use commerce_core::settlement::HandleStatus;
    use commerce_core::types::IntentId;
    use commerce_crypto::KeyPair;

    fn intent_envelope(keypair: &KeyPair, intent_id: &IntentId) -> commerce_core::message::Envelope {
        let msg = Message::Intent(IntentMsg {
            intent_id: intent_id.clone(),
            max_price: 10_000,
            asset: "USDC".to_string(),
            chain: Default::default(),
            urgent: false,
            sent_at_ms: 0,
            expires_at_ms: 60_000,
        });
        commerce_crypto::sign(msg, keypair).unwrap()
    }

    #[test]
    fn clean_transcript_replays_ok() {
        let keypair = KeyPair::generate();
        let intent_id = IntentId::from("intent-1");
        let mut transcript = Transcript::new(intent_id.clone());
        transcript.envelopes.push(intent_envelope(&keypair, &intent_id));
        transcript.settlement_lifecycle.push(crate::model::LifecycleEvent {
            ts_ms: 1_000,
            status: HandleStatus::Prepared,
            handle_id: None,
            paid_amount: None,
            prepared_at_ms: Some(1_000),
            committed_at_ms: None,
            failure_code: None,
        });
        transcript.settlement_lifecycle.push(crate::model::LifecycleEvent {
            ts_ms: 2_000,
            status: HandleStatus::Committed,
            handle_id: None,
            paid_amount: Some(10_000),
            prepared_at_ms: Some(1_000),
            committed_at_ms: Some(2_000),
            failure_code: None,
        });

        let summary = replay(&transcript, 5_000);
        assert!(summary.ok);
        assert!(summary.failures.is_empty());
        assert_eq!(summary.counters.envelopes_checked, 1);
        assert_eq!(summary.counters.lifecycle_events_checked, 2);
    }

    #[test]
    fn tampered_envelope_fails_verification() {
        let keypair = KeyPair::generate();
        let intent_id = IntentId::from("intent-1");
        let mut envelope = intent_envelope(&keypair, &intent_id);
        if let Message::Intent(m) = &mut envelope.message {
            m.max_price = 999_999;
        }
        let mut transcript = Transcript::new(intent_id);
        transcript.envelopes.push(envelope);

        let summary = replay(&transcript, 0);
        assert!(!summary.ok);
        assert_eq!(summary.failures[0].code, ReplayFailureCode::EnvelopeVerificationFailed);
    }

    #[test]
    fn commit_reveal_mismatch_is_detected() {
        let keypair = KeyPair::generate();
        let intent_id = IntentId::from("intent-1");
        let commit_hash_hex = commerce_crypto::compute_commit_hash("cGF5bG9hZA==", "bm9uY2U=");
        let commit_msg = Message::Commit(CommitMsg {
            intent_id: intent_id.clone(),
            commit_hash_hex: commit_hash_hex.clone(),
            sent_at_ms: 0,
            expires_at_ms: 60_000,
        });
        let reveal_msg = Message::Reveal(RevealMsg {
            intent_id: intent_id.clone(),
            payload_b64: "dGFtcGVyZWQ=".to_string(),
            nonce_b64: "bm9uY2U=".to_string(),
            sent_at_ms: 1,
            expires_at_ms: 60_000,
        });

        let mut transcript = Transcript::new(intent_id);
        transcript.envelopes.push(commerce_crypto::sign(commit_msg, &keypair).unwrap());
        transcript.envelopes.push(commerce_crypto::sign(reveal_msg, &keypair).unwrap());
        transcript.commit_reveal = CommitRevealArtifact {
            commit_hash_hex: Some(commit_hash_hex),
            payload_b64: Some("dGFtcGVyZWQ=".to_string()),
            nonce_b64: Some("bm9uY2U=".to_string()),
        };

        let summary = replay(&transcript, 0);
        assert!(!summary.ok);
        assert!(summary.failures.iter().any(|f| f.code == ReplayFailureCode::CommitRevealMismatch));
    }

    #[test]
    fn accepted_outcome_without_fulfilled_receipt_is_inconsistent() {
        let intent_id = IntentId::from("intent-1");
        let mut transcript = Transcript::new(intent_id);
        transcript.outcome = Some(commerce_core::session::TerminalOutcome::Accepted);

        let summary = replay(&transcript, 0);
        assert!(!summary.ok);
        assert!(summary.failures.iter().any(|f| f.code == ReplayFailureCode::OutcomeInconsistentWithReceipt));
    }

    #[test]
    fn failed_policy_outcome_with_no_receipt_is_consistent() {
        let intent_id = IntentId::from("intent-1");
        let mut transcript = Transcript::new(intent_id);
        transcript.outcome = Some(commerce_core::session::TerminalOutcome::FailedPolicy);

        let summary = replay(&transcript, 0);
        assert!(summary.ok);
    }

    #[test]
    fn receipt_without_recorded_outcome_is_inconsistent() {
        let intent_id = IntentId::from("intent-1");
        let mut transcript = Transcript::new(intent_id);
        transcript.receipt = Some(commerce_core::session::Receipt {
            receipt_id: commerce_core::types::ReceiptId::from("rcpt-1"),
            intent_id: IntentId::from("intent-1"),
            buyer_id: commerce_core::types::AgentId::from("buyer-1"),
            seller_id: commerce_core::types::AgentId::from("seller-1"),
            agreed_price: 100,
            paid_amount: 100,
            fulfilled: true,
            timestamp_ms: 0,
            latency_ms: None,
            failure_code: None,
            handle_id: None,
        });

        let summary = replay(&transcript, 0);
        assert!(!summary.ok);
        assert!(summary.failures.iter().any(|f| f.code == ReplayFailureCode::MissingOutcome));
    }
}
