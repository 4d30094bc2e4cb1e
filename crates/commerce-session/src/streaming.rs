//! Streaming settlement (GLOSSARY: "pay-as-you-go per tick"). SPEC_FULL
//! 10.6 fixes its semantics: no bond is posted for a stream, each tick
//! pays the provider directly, and a per-minute spend cap terminates the
//! stream (without slashing) when exceeded.

use crate::clock::Clock;
use commerce_core::error::FailureCode;
use commerce_core::types::{AgentId, Amount, Chain, Timestamp};
use commerce_settlement::SettlementProvider;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Active,
    Ended,
    CapExceeded,
}

/// One metered buyer->seller stream. `spend_cap_per_minute` is `None`
/// for an uncapped stream.
pub struct StreamingSession {
    pub buyer_id: AgentId,
    pub seller_id: AgentId,
    pub chain: Option<Chain>,
    pub asset: Option<String>,
    pub spend_cap_per_minute: Option<Amount>,
    pub status: StreamStatus,
    pub total_paid: Amount,
    window_start_ms: Timestamp,
    window_spent: Amount,
}

impl StreamingSession {
    pub fn new(
        buyer_id: AgentId,
        seller_id: AgentId,
        chain: Option<Chain>,
        asset: Option<String>,
        spend_cap_per_minute: Option<Amount>,
        now_ms: Timestamp,
    ) -> Self {
        Self {
            buyer_id,
            seller_id,
            chain,
            asset,
            spend_cap_per_minute,
            status: StreamStatus::Active,
            total_paid: 0,
            window_start_ms: now_ms,
            window_spent: 0,
        }
    }

    fn roll_window(&mut self, now_ms: Timestamp) {
        if now_ms - self.window_start_ms >= 60_000 {
            self.window_start_ms = now_ms;
            self.window_spent = 0;
        }
    }

    /// Pay `amount` for this tick. Returns `Ok(())` if the tick settled,
    /// or the failure code if the per-minute cap was exceeded (the
    /// stream ends without slashing — there is no bond to slash).
    pub async fn tick(
        &mut self,
        provider: &Arc<dyn SettlementProvider>,
        amount: Amount,
        now_ms: Timestamp,
        clock: &dyn Clock,
    ) -> Result<(), FailureCode> {
        if self.status != StreamStatus::Active {
            return Err(FailureCode::StreamingSpendCapExceeded);
        }
        let _ = clock;
        self.roll_window(now_ms);

        if let Some(cap) = self.spend_cap_per_minute {
            if self.window_spent + amount > cap {
                self.status = StreamStatus::CapExceeded;
                warn!(buyer = %self.buyer_id, seller = %self.seller_id, cap = %cap, "streaming spend cap exceeded");
                return Err(FailureCode::StreamingSpendCapExceeded);
            }
        }

        provider
            .pay(&self.buyer_id, &self.seller_id, amount, self.chain, self.asset.as_deref())
            .await
            .map_err(|_| FailureCode::SettlementFailed)?;

        self.window_spent += amount;
        self.total_paid += amount;
        info!(buyer = %self.buyer_id, seller = %self.seller_id, amount = %amount, total = %self.total_paid, "stream tick settled");
        Ok(())
    }

    pub fn end(&mut self) {
        if self.status == StreamStatus::Active {
            self.status = StreamStatus::Ended;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use commerce_settlement::MockSettlementProvider;

    #[tokio::test]
    async fn ticks_below_cap_succeed() {
        let buyer = AgentId::from("buyer");
        let seller = AgentId::from("seller");
        let clock = ManualClock::new(0);
        let mut stream = StreamingSession::new(buyer.clone(), seller.clone(), None, None, Some(100), 0);
        let seeded = MockSettlementProvider::new();
        seeded.seed_balance(&buyer, None, None, 1000);
        let provider: Arc<dyn SettlementProvider> = Arc::new(seeded);
        assert!(stream.tick(&provider, 30, 0, &clock).await.is_ok());
        assert!(stream.tick(&provider, 30, 0, &clock).await.is_ok());
        assert_eq!(stream.total_paid, 60);
    }

    #[tokio::test]
    async fn exceeding_cap_ends_stream_without_slash() {
        let seeded = MockSettlementProvider::new();
        let buyer = AgentId::from("buyer");
        let seller = AgentId::from("seller");
        seeded.seed_balance(&buyer, None, None, 1000);
        let provider: Arc<dyn SettlementProvider> = Arc::new(seeded);
        let clock = ManualClock::new(0);
        let mut stream = StreamingSession::new(buyer, seller, None, None, Some(50), 0);
        assert!(stream.tick(&provider, 30, 0, &clock).await.is_ok());
        let err = stream.tick(&provider, 30, 0, &clock).await.unwrap_err();
        assert_eq!(err, FailureCode::StreamingSpendCapExceeded);
        assert_eq!(stream.status, StreamStatus::CapExceeded);
    }
}
