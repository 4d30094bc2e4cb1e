//! Incremental assembly of a `Transcript`. A caller driving a negotiation
//! and settlement (the demo binary, eventually any integrator) pushes
//! envelopes and events in as they happen; `build()` hands back the
//! finished, serializable document.

use crate::model::{
    CommitRevealArtifact, CredentialCheckEntry, DisputeEvent, DisputeEventKind, LifecycleEvent, QuoteEntry,
    ReconcileEvent, SettlementAttempt, Transcript,
};
use commerce_core::dispute::DisputeOutcome;
use commerce_core::message::Envelope;
use commerce_core::session::{Receipt, TerminalOutcome};
use commerce_core::settlement::{HandleStatus, SettlementSegment};
use commerce_core::types::{DisputeId, HandleId, IntentId, PublicKeyHex, SignatureHex, Timestamp};
use commerce_core::FailureCode;

pub struct TranscriptBuilder {
    transcript: Transcript,
}

impl TranscriptBuilder {
    pub fn new(intent_id: IntentId) -> Self {
        Self { transcript: Transcript::new(intent_id) }
    }

    pub fn record_envelope(&mut self, envelope: Envelope) -> &mut Self {
        self.transcript.envelopes.push(envelope);
        self
    }

    pub fn record_credential_check(
        &mut self,
        subject: impl Into<String>,
        signer_pubkey: Option<PublicKeyHex>,
        provider_pubkey: Option<PublicKeyHex>,
        expires_at_ms: Option<Timestamp>,
    ) -> &mut Self {
        self.transcript.credential_checks.push(CredentialCheckEntry {
            subject: subject.into(),
            signer_pubkey,
            provider_pubkey,
            expires_at_ms,
        });
        self
    }

    pub fn record_quote(
        &mut self,
        round: u32,
        expected_signer_pubkey: Option<PublicKeyHex>,
        actual_signer_pubkey: Option<PublicKeyHex>,
    ) -> &mut Self {
        self.transcript.quote_entries.push(QuoteEntry { round, expected_signer_pubkey, actual_signer_pubkey });
        self
    }

    pub fn set_commit_reveal(&mut self, artifact: CommitRevealArtifact) -> &mut Self {
        self.transcript.commit_reveal = artifact;
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_lifecycle_event(
        &mut self,
        ts_ms: Timestamp,
        status: HandleStatus,
        handle_id: Option<HandleId>,
        paid_amount: Option<u128>,
        prepared_at_ms: Option<Timestamp>,
        committed_at_ms: Option<Timestamp>,
        failure_code: Option<FailureCode>,
    ) -> &mut Self {
        self.transcript.settlement_lifecycle.push(LifecycleEvent {
            ts_ms,
            status,
            handle_id,
            paid_amount,
            prepared_at_ms,
            committed_at_ms,
            failure_code,
        });
        self
    }

    pub fn record_settlement_attempt(
        &mut self,
        provider_name: impl Into<String>,
        outcome: HandleStatus,
        failure_code: Option<FailureCode>,
    ) -> &mut Self {
        self.transcript.settlement_attempts.push(SettlementAttempt {
            provider_name: provider_name.into(),
            outcome,
            failure_code,
        });
        self
    }

    pub fn record_settlement_segment(&mut self, segment: SettlementSegment) -> &mut Self {
        self.transcript.settlement_segments.push(segment);
        self
    }

    pub fn record_dispute_opened(&mut self, dispute_id: DisputeId, ts_ms: Timestamp) -> &mut Self {
        self.transcript.dispute_events.push(DisputeEvent {
            dispute_id,
            ts_ms,
            kind: DisputeEventKind::Opened,
            outcome: None,
            decision_hash_hex: None,
            arbiter_pubkey: None,
            decision_signature: None,
        });
        self
    }

    pub fn record_dispute_resolved(
        &mut self,
        dispute_id: DisputeId,
        ts_ms: Timestamp,
        outcome: DisputeOutcome,
        decision_hash_hex: Option<String>,
        arbiter_pubkey: Option<PublicKeyHex>,
        decision_signature: Option<SignatureHex>,
    ) -> &mut Self {
        self.transcript.dispute_events.push(DisputeEvent {
            dispute_id,
            ts_ms,
            kind: DisputeEventKind::Resolved,
            outcome: Some(outcome),
            decision_hash_hex,
            arbiter_pubkey,
            decision_signature,
        });
        self
    }

    pub fn record_reconcile_event(
        &mut self,
        ts_ms: Timestamp,
        handle_id: HandleId,
        from_status: HandleStatus,
        to_status: HandleStatus,
        note: Option<String>,
    ) -> &mut Self {
        self.transcript.reconcile_events.push(ReconcileEvent { ts_ms, handle_id, from_status, to_status, note });
        self
    }

    pub fn set_receipt(&mut self, receipt: Receipt) -> &mut Self {
        self.transcript.receipt = Some(receipt);
        self
    }

    pub fn set_outcome(&mut self, outcome: TerminalOutcome) -> &mut Self {
        self.transcript.outcome = Some(outcome);
        self
    }

    pub fn build(self) -> Transcript {
        self.transcript
    }
}
