//! commerce-evidence
//!
//! Evidence bundle packaging (C11): a hash-manifest of a transcript (and
//! an optional signed decision) redacted per audience, plus a replay
//! function that re-verifies every entry and the bundle's integrity root.

pub mod bundle;
pub mod error;
pub mod model;
pub mod replay;

pub use bundle::build_bundle;
pub use error::EvidenceError;
pub use model::{EntryManifest, EvidenceBundle, EvidenceEntry, Manifest, View, BUNDLE_VERSION};
pub use replay::{replay_bundle, BundleReplayFailure, BundleReplaySummary};

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_core::dispute::{Decision, DecisionPolicySnapshot, DisputeOutcome, SignedDecision};
    use commerce_core::message::{Envelope, Message, RevealMsg};
    use commerce_core::types::{BundleId, DecisionId, DisputeId, IntentId, PublicKeyHex, ReceiptId, SignatureHex};
    use commerce_transcript::Transcript;

    fn transcript_with_reveal() -> Transcript {
        let mut transcript = Transcript::new(IntentId::from("intent-1"));
        transcript.envelopes.push(Envelope {
            message: Message::Reveal(RevealMsg {
                intent_id: IntentId::from("intent-1"),
                payload_b64: "cGF5bG9hZA==".to_string(),
                nonce_b64: "bm9uY2U=".to_string(),
                sent_at_ms: 0,
                expires_at_ms: 60_000,
            }),
            sender_pubkey: PublicKeyHex("abcd".to_string()),
            signature: SignatureHex("deadbeef".to_string()),
        });
        transcript
    }

    #[test]
    fn auditor_view_redacts_payload_and_signature() {
        let transcript = transcript_with_reveal();
        let bundle = build_bundle(&transcript, None, View::Auditor, BundleId::from("bundle-1")).unwrap();
        let content = std::str::from_utf8(&bundle.entries[0].content).unwrap();
        assert!(!content.contains("cGF5bG9hZA=="));
        assert!(!content.contains("deadbeef"));
        assert!(bundle.manifest.redacted_fields.is_some());
    }

    #[test]
    fn internal_view_keeps_full_transcript() {
        let transcript = transcript_with_reveal();
        let bundle = build_bundle(&transcript, None, View::Internal, BundleId::from("bundle-1")).unwrap();
        let content = std::str::from_utf8(&bundle.entries[0].content).unwrap();
        assert!(content.contains("cGF5bG9hZA=="));
        assert!(bundle.manifest.redacted_fields.is_none());
    }

    #[test]
    fn clean_bundle_replays_ok() {
        let transcript = transcript_with_reveal();
        let bundle = build_bundle(&transcript, None, View::Internal, BundleId::from("bundle-1")).unwrap();
        let summary = replay_bundle(&bundle);
        assert!(summary.ok);
    }

    #[test]
    fn tampered_entry_fails_replay() {
        let transcript = transcript_with_reveal();
        let mut bundle = build_bundle(&transcript, None, View::Internal, BundleId::from("bundle-1")).unwrap();
        bundle.entries[0].content.push(b'!');
        let summary = replay_bundle(&bundle);
        assert!(!summary.ok);
    }

    #[test]
    fn bundle_with_decision_packages_both_entries() {
        let transcript = transcript_with_reveal();
        let decision = SignedDecision {
            decision: Decision {
                decision_id: DecisionId::from("dec-1"),
                dispute_id: DisputeId::from("dispute-1"),
                receipt_id: ReceiptId::from("rcpt-1"),
                outcome: DisputeOutcome::RefundFull,
                refund_amount: 100,
                issued_at_ms: 0,
                notes: None,
                policy_snapshot: DecisionPolicySnapshot { max_refund_pct: 1.0, allow_partial: true },
            },
            decision_hash_hex: "abc".to_string(),
            arbiter_pubkey: PublicKeyHex("arbiter-pubkey".to_string()),
            signature: SignatureHex("sig".to_string()),
        };
        let bundle = build_bundle(&transcript, Some(&decision), View::Partner, BundleId::from("bundle-1")).unwrap();
        assert_eq!(bundle.entries.len(), 2);
        assert_eq!(bundle.manifest.entries.len(), 2);
        let summary = replay_bundle(&bundle);
        assert!(summary.ok);
    }
}
