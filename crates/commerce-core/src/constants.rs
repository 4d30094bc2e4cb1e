//! Protocol-wide constants.

/// Byte length of a truncated settlement handle id hash, before base58 encoding.
pub const HANDLE_ID_HASH_LEN: usize = 16;

/// Default reference-price band, as a fraction, when a policy omits one.
pub const DEFAULT_BAND_PCT: f64 = 0.2;

/// Reference trade value used to normalise reputation weighting
/// (`weight = sqrt(value * REPUTATION_WEIGHT_SCALE)`).
pub const REPUTATION_WEIGHT_SCALE: f64 = 0.01;

/// Receipts below this value contribute zero weight to reputation scoring.
pub const REPUTATION_DUST_THRESHOLD: f64 = 1e-6;

/// Minimum substantial-receipt count before clique dampening can apply.
pub const CLIQUE_MIN_RECEIPTS: usize = 5;

/// Counterparty concentration above which clique dampening applies.
pub const CLIQUE_SHARE_THRESHOLD: f64 = 0.6;

/// Multiplier applied to reputation when clique dampening triggers.
pub const CLIQUE_DAMPENING_FACTOR: f64 = 0.5;

/// Maximum credential-driven multiplicative bonus to reputation.
pub const CREDENTIAL_BONUS_MAX: f64 = 0.05;

/// Reputation assigned to an agent with no trade history.
pub const DEFAULT_REPUTATION: f64 = 0.5;

/// Evidence bundle manifest schema version.
pub const EVIDENCE_BUNDLE_VERSION: &str = "4.0";

/// Transcript schema version.
pub const TRANSCRIPT_VERSION: &str = "1";
