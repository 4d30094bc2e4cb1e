use serde::{Deserialize, Serialize};
use std::fmt;

/// Base-unit amount. Non-negative by convention; the settlement provider
/// and policy guard are responsible for rejecting negative deltas.
pub type Amount = u128;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// 0-based negotiation round counter.
pub type Round = u32;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_newtype!(AgentId);
id_newtype!(IntentId);
id_newtype!(HandleId);
id_newtype!(ReceiptId);
id_newtype!(DisputeId);
id_newtype!(DecisionId);
id_newtype!(BundleId);

/// Chain identifiers asset settlement may be scoped to. `Unknown` covers
/// off-chain / provider-internal settlement where no chain applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Evm,
    Solana,
    Bitcoin,
    Unknown,
}

impl Default for Chain {
    fn default() -> Self {
        Chain::Unknown
    }
}

/// An Ed25519 public key, hex-encoded for transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyHex(pub String);

impl fmt::Display for PublicKeyHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A detached Ed25519 signature, hex-encoded for transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureHex(pub String);
