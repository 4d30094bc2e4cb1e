//! commerce-settlement
//!
//! The settlement provider contract (C3): balance accounting, lock/release/
//! pay/slash, and the prepare/commit/poll/abort/refund lifecycle. This
//! crate defines the trait plus three implementations: an in-memory
//! reference ledger used by tests and the demo, a card-rail-shaped
//! authorize/capture/void adapter, and a disabled stub for a live rail
//! that has not been configured at runtime.

pub mod authcapture;
pub mod disabled;
pub mod mock;
pub mod provider;

pub use authcapture::AuthCaptureSettlementProvider;
pub use disabled::DisabledSettlementProvider;
pub use mock::MockSettlementProvider;
pub use provider::{RefundRequest, SettlementError, SettlementProvider};
