//! Bundle assembly (ch.6, ch.10.6): hash the transcript and an optional
//! signed decision into a manifest, redacting raw payload/signature bytes
//! for non-internal views.

use crate::error::EvidenceError;
use crate::model::{EntryManifest, EvidenceBundle, EvidenceEntry, Manifest, View, BUNDLE_VERSION};
use commerce_core::dispute::SignedDecision;
use commerce_core::message::Message;
use commerce_core::types::{BundleId, SignatureHex};
use commerce_transcript::Transcript;

const REDACTED: &str = "REDACTED";

fn redact_transcript(transcript: &Transcript) -> Transcript {
    let mut redacted = transcript.clone();

    for envelope in &mut redacted.envelopes {
        envelope.signature = SignatureHex(REDACTED.to_string());
        if let Message::Reveal(reveal) = &mut envelope.message {
            reveal.payload_b64 = REDACTED.to_string();
            reveal.nonce_b64 = REDACTED.to_string();
        }
    }

    if redacted.commit_reveal.payload_b64.is_some() {
        redacted.commit_reveal.payload_b64 = Some(REDACTED.to_string());
    }
    if redacted.commit_reveal.nonce_b64.is_some() {
        redacted.commit_reveal.nonce_b64 = Some(REDACTED.to_string());
    }

    for event in &mut redacted.dispute_events {
        if event.decision_signature.is_some() {
            event.decision_signature = Some(SignatureHex(REDACTED.to_string()));
        }
    }

    redacted
}

fn redacted_field_names() -> Vec<String> {
    vec!["envelope.signature".to_string(), "payload_b64".to_string(), "nonce_b64".to_string()]
}

/// Package `transcript` (plus an optional signed decision) into an
/// evidence bundle for `view`. `transcript_hash` always anchors the
/// original, unredacted transcript; the packaged transcript *entry*
/// reflects the view's redaction.
pub fn build_bundle(
    transcript: &Transcript,
    decision: Option<&SignedDecision>,
    view: View,
    bundle_id: BundleId,
) -> Result<EvidenceBundle, EvidenceError> {
    let transcript_bytes =
        serde_json::to_vec(transcript).map_err(|e| EvidenceError::Serialization("transcript", e.to_string()))?;
    let transcript_hash = commerce_crypto::sha256_hex(&transcript_bytes);

    let view_transcript = if view.redacts() { redact_transcript(transcript) } else { transcript.clone() };
    let view_transcript_bytes = serde_json::to_vec(&view_transcript)
        .map_err(|e| EvidenceError::Serialization("transcript", e.to_string()))?;
    let view_transcript_hash = commerce_crypto::sha256_hex(&view_transcript_bytes);

    let mut entries = vec![EvidenceEntry {
        entry_type: "transcript".to_string(),
        path: "transcript.json".to_string(),
        content: view_transcript_bytes,
        content_hash: view_transcript_hash,
    }];

    if let Some(decision) = decision {
        let decision_bytes =
            serde_json::to_vec(decision).map_err(|e| EvidenceError::Serialization("decision", e.to_string()))?;
        let decision_hash = commerce_crypto::sha256_hex(&decision_bytes);
        entries.push(EvidenceEntry {
            entry_type: "decision".to_string(),
            path: "decision.json".to_string(),
            content: decision_bytes,
            content_hash: decision_hash,
        });
    }

    let entry_manifests: Vec<EntryManifest> = entries
        .iter()
        .map(|e| EntryManifest { entry_type: e.entry_type.clone(), path: e.path.clone(), content_hash: e.content_hash.clone() })
        .collect();

    let integrity = compute_integrity(&entry_manifests);

    let manifest = Manifest {
        bundle_version: BUNDLE_VERSION.to_string(),
        bundle_id,
        transcript_hash,
        entries: entry_manifests,
        view,
        redacted_fields: if view.redacts() { Some(redacted_field_names()) } else { None },
        integrity,
    };

    Ok(EvidenceBundle { manifest, entries })
}

/// SHA-256 over the entry content hashes, in manifest order — a single
/// root hash a caller can compare without re-hashing every entry.
pub fn compute_integrity(entries: &[EntryManifest]) -> String {
    let mut buf = String::new();
    for entry in entries {
        buf.push_str(&entry.content_hash);
    }
    commerce_crypto::sha256_hex(buf.as_bytes())
}
