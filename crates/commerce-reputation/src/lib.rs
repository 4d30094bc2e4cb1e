//! commerce-reputation
//!
//! Receipt-driven agent scoring (ch.4.9): volume-weighted success rate,
//! credential-aware trust bonus, and a clique-dampening penalty for
//! counterparties that concentrate too much of an agent's trade volume.
//! Scoring is a pure function of the receipts handed in — it keeps no
//! state of its own.

use commerce_core::error::FailureCode;
use commerce_core::session::Receipt;
use commerce_core::types::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Receipts below this value contribute no weight — dust trades can't be
/// farmed for reputation.
const SUBSTANTIAL_VALUE_THRESHOLD: f64 = 1e-6;

/// Reference trade value the weight curve is centered on.
const WEIGHT_REFERENCE_VALUE: f64 = 0.01;

/// Counterparty concentration above this share of weighted volume triggers
/// the clique-dampening penalty.
const CLIQUE_SHARE_THRESHOLD: f64 = 0.6;

/// Minimum number of substantial receipts before clique dampening can fire.
const CLIQUE_MIN_RECEIPTS: usize = 5;

/// External inputs scoring needs beyond the receipt list itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringContext {
    /// A directory/credential-issuer trust score in `[0, 1]`, if one was
    /// resolved for this agent. Grants at most a 5%-per-point multiplier.
    pub trust_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Penalties {
    /// Share of this agent's seller-side trades that ended `FAILED_PROOF`.
    pub failed_proof: f64,
    /// Share of this agent's buyer-side trades that the agent itself
    /// stalled out (every non-proof failure on the buyer side, since a
    /// buyer has no delivery obligation to fail at).
    pub buyer_stopped: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentScore {
    pub reputation: f64,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub avg_latency_ms: Option<f64>,
    pub weighted_volume: f64,
    pub trades: usize,
    pub penalties: Penalties,
    pub notes: Vec<String>,
}

fn receipt_value(receipt: &Receipt) -> f64 {
    receipt.paid_amount as f64
}

fn receipt_weight(value: f64) -> f64 {
    (value * WEIGHT_REFERENCE_VALUE).max(0.0).sqrt()
}

/// Score `agent_id` against its receipts (every receipt the agent appears
/// in as buyer or seller). Receipts belonging to other agents are ignored.
pub fn agent_score_v2(agent_id: &AgentId, receipts: &[Receipt], ctx: &ScoringContext) -> AgentScore {
    let mut notes = Vec::new();

    let relevant: Vec<&Receipt> = receipts
        .iter()
        .filter(|r| &r.buyer_id == agent_id || &r.seller_id == agent_id)
        .collect();

    if relevant.is_empty() {
        notes.push("no trades on record".to_string());
        return AgentScore {
            reputation: 0.5,
            success_rate: 0.0,
            failure_rate: 0.0,
            avg_latency_ms: None,
            weighted_volume: 0.0,
            trades: 0,
            penalties: Penalties::default(),
            notes,
        };
    }

    let trades = relevant.len();
    let fulfilled = relevant.iter().filter(|r| r.fulfilled).count();
    let success_rate = fulfilled as f64 / trades as f64;
    let failure_rate = 1.0 - success_rate;

    let latencies: Vec<f64> = relevant.iter().filter_map(|r| r.latency_ms).map(|ms| ms as f64).collect();
    let avg_latency_ms = if latencies.is_empty() {
        None
    } else {
        Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
    };

    let mut weighted_volume = 0.0;
    let mut counterparty_weight: HashMap<&AgentId, f64> = HashMap::new();
    let mut substantial_count = 0usize;
    let mut seller_trades = 0usize;
    let mut buyer_trades = 0usize;
    let mut failed_proof_count = 0usize;
    let mut buyer_stopped_count = 0usize;

    for receipt in &relevant {
        let is_seller = &receipt.seller_id == agent_id;
        if is_seller {
            seller_trades += 1;
        } else {
            buyer_trades += 1;
        }

        let value = receipt_value(receipt);
        if value >= SUBSTANTIAL_VALUE_THRESHOLD {
            substantial_count += 1;
            let weight = receipt_weight(value);
            weighted_volume += weight;
            let counterparty = if is_seller { &receipt.buyer_id } else { &receipt.seller_id };
            *counterparty_weight.entry(counterparty).or_insert(0.0) += weight;
        }

        if !receipt.fulfilled {
            match (is_seller, receipt.failure_code) {
                (true, Some(FailureCode::FailedProof)) => failed_proof_count += 1,
                (false, Some(FailureCode::FailedProof)) => {}
                (false, Some(_)) => buyer_stopped_count += 1,
                (false, None) => buyer_stopped_count += 1,
                _ => {}
            }
        }
    }

    let penalties = Penalties {
        failed_proof: if seller_trades > 0 { failed_proof_count as f64 / seller_trades as f64 } else { 0.0 },
        buyer_stopped: if buyer_trades > 0 { buyer_stopped_count as f64 / buyer_trades as f64 } else { 0.0 },
    };

    let mut reputation = 0.2 + 0.8 * success_rate;
    reputation *= 1.0 - 0.5 * failure_rate;
    if seller_trades > 0 {
        reputation *= 1.0 - 0.8 * penalties.failed_proof;
    }
    if buyer_trades > 0 {
        reputation *= 1.0 - 0.3 * penalties.buyer_stopped;
    }

    if substantial_count >= CLIQUE_MIN_RECEIPTS && weighted_volume > 0.0 {
        let max_share = counterparty_weight.values().cloned().fold(0.0_f64, f64::max) / weighted_volume;
        if max_share > CLIQUE_SHARE_THRESHOLD {
            reputation *= 0.5;
            notes.push(format!("clique dampening applied: one counterparty is {:.0}% of volume", max_share * 100.0));
        }
    }

    reputation = reputation.clamp(0.0, 1.0);

    if let Some(trust_score) = ctx.trust_score {
        if reputation < 1.0 {
            let multiplier = 1.0 + 0.05 * trust_score.clamp(0.0, 1.0);
            let boosted = (reputation * multiplier).min(1.0);
            if boosted > reputation {
                notes.push("credential trust bonus applied".to_string());
            }
            reputation = boosted;
        }
    }

    AgentScore {
        reputation,
        success_rate,
        failure_rate,
        avg_latency_ms,
        weighted_volume,
        trades,
        penalties,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_core::types::{IntentId, ReceiptId};

    fn receipt(
        buyer: &str,
        seller: &str,
        paid: u128,
        fulfilled: bool,
        failure_code: Option<FailureCode>,
        latency_ms: Option<i64>,
    ) -> Receipt {
        Receipt {
            receipt_id: ReceiptId::from(format!("r-{buyer}-{seller}")),
            intent_id: IntentId::from("intent"),
            buyer_id: AgentId::from(buyer),
            seller_id: AgentId::from(seller),
            agreed_price: paid,
            paid_amount: paid,
            fulfilled,
            timestamp_ms: 0,
            latency_ms,
            failure_code,
            handle_id: None,
        }
    }

    #[test]
    fn no_trades_scores_neutral() {
        let score = agent_score_v2(&AgentId::from("ghost"), &[], &ScoringContext::default());
        assert_eq!(score.reputation, 0.5);
        assert_eq!(score.trades, 0);
    }

    #[test]
    fn all_fulfilled_seller_trades_score_high() {
        let receipts: Vec<Receipt> = (0..10)
            .map(|i| receipt(&format!("buyer-{i}"), "seller-1", 1_000_000, true, None, Some(200 + i)))
            .collect();
        let score = agent_score_v2(&AgentId::from("seller-1"), &receipts, &ScoringContext::default());
        assert_eq!(score.success_rate, 1.0);
        assert!(score.reputation > 0.9);
        assert_eq!(score.penalties.failed_proof, 0.0);
    }

    #[test]
    fn failed_proof_trades_penalize_seller_more_than_buyer() {
        let mut receipts = Vec::new();
        for _ in 0..5 {
            receipts.push(receipt("buyer-1", "seller-1", 1_000_000, true, None, Some(100)));
        }
        for _ in 0..5 {
            receipts.push(receipt("buyer-1", "seller-1", 1_000_000, false, Some(FailureCode::FailedProof), None));
        }
        let seller_score = agent_score_v2(&AgentId::from("seller-1"), &receipts, &ScoringContext::default());
        let buyer_score = agent_score_v2(&AgentId::from("buyer-1"), &receipts, &ScoringContext::default());
        assert_eq!(seller_score.penalties.failed_proof, 0.5);
        assert_eq!(buyer_score.penalties.failed_proof, 0.0);
        assert!(seller_score.reputation < buyer_score.reputation);
    }

    #[test]
    fn concentrated_counterparty_triggers_clique_dampening() {
        let receipts: Vec<Receipt> = (0..6)
            .map(|_| receipt("buyer-1", "seller-1", 1_000_000, true, None, Some(100)))
            .collect();
        let undampened = agent_score_v2(&AgentId::from("seller-1"), &receipts[..1], &ScoringContext::default());
        let dampened = agent_score_v2(&AgentId::from("seller-1"), &receipts, &ScoringContext::default());
        assert!(dampened.reputation < undampened.reputation);
        assert!(!dampened.notes.is_empty());
    }

    #[test]
    fn credential_bonus_lifts_a_below_perfect_score() {
        let mut receipts: Vec<Receipt> = (0..3)
            .map(|_| receipt("buyer-1", "seller-1", 1_000_000, true, None, Some(100)))
            .collect();
        receipts.push(receipt("buyer-1", "seller-1", 1_000_000, false, Some(FailureCode::FailedProof), None));
        let without = agent_score_v2(&AgentId::from("seller-1"), &receipts, &ScoringContext::default());
        assert!(without.reputation < 1.0);
        let with = agent_score_v2(
            &AgentId::from("seller-1"),
            &receipts,
            &ScoringContext { trust_score: Some(1.0) },
        );
        assert!(with.reputation >= without.reputation);
    }
}
