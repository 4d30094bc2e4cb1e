//! commerce-dispute
//!
//! Post-settlement dispute lifecycle (C6): a bounded resolution window,
//! full/partial refund with policy-capped amounts, and an optional signed
//! decision artifact an arbiter can attach to the outcome.

pub mod decision;
pub mod error;
pub mod registry;

pub use decision::{sign_decision, verify_decision, SignedDecisionMaterial};
pub use error::DisputeError;
pub use registry::{DisputeRegistry, ResolveOutcome};
