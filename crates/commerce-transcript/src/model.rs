//! Transcript data model (ch.3, ch.4.7): a versioned, append-only document
//! of every decision made for one exchange. Readers must ignore unknown
//! fields, so every entry here derives `Serialize`/`Deserialize` with
//! forward-compatible defaults where plausible.

use commerce_core::dispute::DisputeOutcome;
use commerce_core::message::Envelope;
use commerce_core::session::{Receipt, TerminalOutcome};
use commerce_core::settlement::{HandleStatus, SettlementSegment};
use commerce_core::types::{DisputeId, HandleId, IntentId, PublicKeyHex, SignatureHex, Timestamp};
use commerce_core::FailureCode;
use serde::{Deserialize, Serialize};

pub const TRANSCRIPT_VERSION: &str = "1";

/// One credential verification the negotiation consulted (directory entry,
/// trust database lookup, etc). Both pubkeys are optional: a transcript
/// produced without a directory integration simply omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialCheckEntry {
    pub subject: String,
    pub signer_pubkey: Option<PublicKeyHex>,
    pub provider_pubkey: Option<PublicKeyHex>,
    pub expires_at_ms: Option<Timestamp>,
}

/// One ASK/BID round, carrying the pubkey the session expected to see sign
/// it (from the counterparty directory) against the pubkey that actually
/// signed the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteEntry {
    pub round: u32,
    pub expected_signer_pubkey: Option<PublicKeyHex>,
    pub actual_signer_pubkey: Option<PublicKeyHex>,
}

/// One state change of the settlement handle over its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub ts_ms: Timestamp,
    pub status: HandleStatus,
    pub handle_id: Option<HandleId>,
    pub paid_amount: Option<u128>,
    pub prepared_at_ms: Option<Timestamp>,
    pub committed_at_ms: Option<Timestamp>,
    pub failure_code: Option<FailureCode>,
}

/// One candidate tried by the settlement fallback chain (ch.4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementAttempt {
    pub provider_name: String,
    pub outcome: HandleStatus,
    pub failure_code: Option<FailureCode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeEventKind {
    Opened,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeEvent {
    pub dispute_id: DisputeId,
    pub ts_ms: Timestamp,
    pub kind: DisputeEventKind,
    pub outcome: Option<DisputeOutcome>,
    pub decision_hash_hex: Option<String>,
    pub arbiter_pubkey: Option<PublicKeyHex>,
    pub decision_signature: Option<SignatureHex>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileEvent {
    pub ts_ms: Timestamp,
    pub handle_id: HandleId,
    pub from_status: HandleStatus,
    pub to_status: HandleStatus,
    pub note: Option<String>,
}

/// Binds a REVEAL's payload/nonce to the commit hash it must satisfy, so
/// replay can recompute and compare without access to the live session.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommitRevealArtifact {
    pub commit_hash_hex: Option<String>,
    pub payload_b64: Option<String>,
    pub nonce_b64: Option<String>,
}

/// The full append-only record of one exchange (ch.3). `envelopes` is the
/// "explain log": every signed envelope the session applied, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default = "default_version")]
    pub version: String,
    pub intent_id: IntentId,
    #[serde(default)]
    pub envelopes: Vec<Envelope>,
    #[serde(default)]
    pub credential_checks: Vec<CredentialCheckEntry>,
    #[serde(default)]
    pub quote_entries: Vec<QuoteEntry>,
    #[serde(default)]
    pub commit_reveal: CommitRevealArtifact,
    #[serde(default)]
    pub settlement_lifecycle: Vec<LifecycleEvent>,
    #[serde(default)]
    pub settlement_attempts: Vec<SettlementAttempt>,
    #[serde(default)]
    pub settlement_segments: Vec<SettlementSegment>,
    #[serde(default)]
    pub dispute_events: Vec<DisputeEvent>,
    #[serde(default)]
    pub reconcile_events: Vec<ReconcileEvent>,
    pub receipt: Option<Receipt>,
    /// The ch.4.4 terminal-outcome category the session reached. Set for
    /// every terminated session, including ones that failed before a
    /// receipt was ever issued, so a third party can re-derive the
    /// outcome and assign fault without a receipt to read.
    #[serde(default)]
    pub outcome: Option<TerminalOutcome>,
}

fn default_version() -> String {
    TRANSCRIPT_VERSION.to_string()
}

impl Transcript {
    pub fn new(intent_id: IntentId) -> Self {
        Self {
            version: TRANSCRIPT_VERSION.to_string(),
            intent_id,
            envelopes: Vec::new(),
            credential_checks: Vec::new(),
            quote_entries: Vec::new(),
            commit_reveal: CommitRevealArtifact::default(),
            settlement_lifecycle: Vec::new(),
            settlement_attempts: Vec::new(),
            settlement_segments: Vec::new(),
            dispute_events: Vec::new(),
            reconcile_events: Vec::new(),
            receipt: None,
            outcome: None,
        }
    }
}
