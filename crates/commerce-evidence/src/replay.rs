//! Bundle replay: re-hash every packaged entry and the integrity root,
//! independent of however the bundle was produced.

use crate::bundle::compute_integrity;
use crate::model::EvidenceBundle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleReplayFailure {
    pub entry_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleReplaySummary {
    pub ok: bool,
    pub failures: Vec<BundleReplayFailure>,
}

pub fn replay_bundle(bundle: &EvidenceBundle) -> BundleReplaySummary {
    let mut failures = Vec::new();

    for entry in &bundle.entries {
        let recomputed = commerce_crypto::sha256_hex(&entry.content);
        if !recomputed.eq_ignore_ascii_case(&entry.content_hash) {
            failures.push(BundleReplayFailure {
                entry_type: entry.entry_type.clone(),
                reason: "content hash does not match manifest".to_string(),
            });
        }
    }

    let recomputed_integrity = compute_integrity(&bundle.manifest.entries);
    if !recomputed_integrity.eq_ignore_ascii_case(&bundle.manifest.integrity) {
        failures.push(BundleReplayFailure {
            entry_type: "manifest".to_string(),
            reason: "integrity root does not match recomputed entry hashes".to_string(),
        });
    }

    BundleReplaySummary { ok: failures.is_empty(), failures }
}
