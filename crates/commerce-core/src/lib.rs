pub mod asset;
pub mod constants;
pub mod dispute;
pub mod error;
pub mod message;
pub mod session;
pub mod settlement;
pub mod types;

pub use asset::{Asset, AssetRegistry};
pub use dispute::{Decision, DecisionPolicySnapshot, DisputeOutcome, DisputeRecord, DisputeStatus, SignedDecision};
pub use error::{CoreError, FailureCode};
pub use message::{AcceptMsg, CommitMsg, Envelope, IntentMsg, Message, QuoteMsg, RejectMsg, RevealMsg};
pub use session::{Agreement, AgreementStatus, Receipt, SessionStatus, TerminalOutcome, TranscriptRound};
pub use settlement::{
    HandleMeta, HandleStatus, RefundResult, SettlementHandle, SettlementIntent, SettlementMode,
    SettlementResult, SettlementSegment,
};
pub use types::{AgentId, Amount, BundleId, Chain, DecisionId, DisputeId, HandleId, IntentId, PublicKeyHex, ReceiptId, Round, SignatureHex, Timestamp};
