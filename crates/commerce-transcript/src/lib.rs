//! commerce-transcript
//!
//! The append-only exchange record (ch.3) and the replay verifier that
//! re-checks it offline (ch.4.7): every credential lookup, quote round,
//! commit/reveal artifact, settlement lifecycle transition, and dispute
//! event, in one serializable document a counterparty or auditor can
//! independently verify without access to the live session.

pub mod builder;
pub mod model;
pub mod replay;

pub use builder::TranscriptBuilder;
pub use model::{
    CommitRevealArtifact, CredentialCheckEntry, DisputeEvent, DisputeEventKind, LifecycleEvent, QuoteEntry,
    ReconcileEvent, SettlementAttempt, Transcript, TRANSCRIPT_VERSION,
};
pub use replay::{replay, ReplayCounters, ReplayFailure, ReplayFailureCode, ReplaySummary};
