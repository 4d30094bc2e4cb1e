//! commerce-session
//!
//! The negotiation session state machine (C4), the commit-reveal
//! exchange it drives at ACCEPT-time (C5), settlement fallback/split
//! routing, and the streaming settlement mode. This is the crate that
//! glues the envelope codec, policy guard, and settlement provider
//! contracts into one state machine per intent.

pub mod clock;
pub mod error;
pub mod receipt_store;
pub mod session;
pub mod settlement_router;
pub mod streaming;
pub mod transcript_chain;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use receipt_store::ReceiptStore;
pub use session::{AcceptOptions, Session, SessionDriver};
pub use settlement_router::{CommitFailure, ProviderCandidate};
pub use streaming::{StreamStatus, StreamingSession};
