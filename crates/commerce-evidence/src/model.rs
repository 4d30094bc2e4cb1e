//! Evidence bundle data model (ch.6, ch.10.6): a manifest of hashed
//! entries plus the (possibly redacted) content each entry hashes, so a
//! third party can verify the bundle without a filesystem round-trip.

use commerce_core::types::BundleId;
use serde::{Deserialize, Serialize};

pub const BUNDLE_VERSION: &str = "4.0";

/// Who the bundle was produced for. `Auditor` and `Partner` redact raw
/// signature/payload bytes from embedded envelopes; `Internal` carries
/// the transcript unredacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Auditor,
    Partner,
    Internal,
}

impl View {
    pub fn redacts(&self) -> bool {
        !matches!(self, View::Internal)
    }
}

/// Manifest-level metadata for one packaged entry (mirrors the directory
/// bundle's `{type, path, content_hash}` tuple).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryManifest {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub path: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub bundle_version: String,
    pub bundle_id: BundleId,
    pub transcript_hash: String,
    pub entries: Vec<EntryManifest>,
    pub view: View,
    #[serde(default)]
    pub redacted_fields: Option<Vec<String>>,
    pub integrity: String,
}

/// One packaged entry, manifest metadata plus the bytes it hashes.
#[derive(Debug, Clone)]
pub struct EvidenceEntry {
    pub entry_type: String,
    pub path: String,
    pub content: Vec<u8>,
    pub content_hash: String,
}

#[derive(Debug, Clone)]
pub struct EvidenceBundle {
    pub manifest: Manifest,
    pub entries: Vec<EvidenceEntry>,
}
