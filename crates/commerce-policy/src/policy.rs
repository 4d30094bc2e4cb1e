//! Compiled policy: frozen configuration surface for the negotiation and
//! settlement layers. A raw `PolicySpec` is validated once via
//! `CompiledPolicy::compile` and then never mutated for the lifetime of
//! any session that references it.

use commerce_core::settlement::SettlementMode;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimePolicy {
    pub max_clock_skew_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionRequirement {
    Bond,
    Credential,
    Sponsor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionPolicy {
    pub requirements: Vec<AdmissionRequirement>,
    pub max_concurrent_sessions: u32,
    pub rate_limit_per_minute: u32,
    pub kill_switch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationPolicy {
    pub max_rounds: u32,
    pub max_total_duration_ms: i64,
    pub firm_quote_valid_for_ms_min: i64,
    pub firm_quote_valid_for_ms_max: i64,
    pub allowed_actions: Vec<String>,
}

impl NegotiationPolicy {
    pub fn firm_quote_valid_for_range(&self) -> Range<i64> {
        self.firm_quote_valid_for_ms_min..self.firm_quote_valid_for_ms_max
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterpartyPolicy {
    pub min_reputation: f64,
    pub min_age_ms: i64,
    pub max_failure_rate: f64,
    pub required_credentials: Vec<String>,
    pub allowed_regions: Option<Vec<String>>,
    pub denied_regions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub max_latency_ms: Option<i64>,
    pub max_freshness_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencePriceEconomics {
    pub band_pct: f64,
    pub allow_band_override_if_urgent: bool,
    pub use_receipt_history: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BondingEconomics {
    pub min_seller_bond_pct: f64,
    pub streaming_spend_cap_per_minute: Option<u128>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicsPolicy {
    pub reference_price: ReferencePriceEconomics,
    pub bonding: BondingEconomics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSla {
    pub max_pending_ms: i64,
    pub max_poll_attempts: u32,
    pub poll_interval_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPolicy {
    pub allowed_modes: Vec<SettlementMode>,
    pub default_mode: SettlementMode,
    pub challenge_window_ms: i64,
    pub sla: SettlementSla,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AntiGamingPolicy {
    pub max_sessions_per_counterparty_per_hour: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputePolicy {
    pub enabled: bool,
    pub window_ms: i64,
    pub allow_partial: bool,
    pub max_refund_pct: f64,
}

/// Raw, not-yet-validated policy input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySpec {
    pub time: TimePolicy,
    pub admission: AdmissionPolicy,
    pub negotiation: NegotiationPolicy,
    pub counterparty: CounterpartyPolicy,
    pub sla: SlaPolicy,
    pub economics: EconomicsPolicy,
    pub settlement: SettlementPolicy,
    pub anti_gaming: AntiGamingPolicy,
    pub disputes: DisputePolicy,
}

#[derive(Debug, Error)]
pub enum PolicyCompileError {
    #[error("max_rounds must be greater than zero")]
    ZeroMaxRounds,
    #[error("firm_quote_valid_for_ms_min must be <= firm_quote_valid_for_ms_max")]
    InvalidValidForRange,
    #[error("settlement.allowed_modes must contain settlement.default_mode")]
    DefaultModeNotAllowed,
    #[error("disputes.max_refund_pct must be within (0.0, 1.0]")]
    InvalidMaxRefundPct,
    #[error("economics.reference_price.band_pct must be >= 0.0")]
    NegativeBandPct,
}

/// Frozen, validated policy. Never mutated once a session references it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledPolicy {
    spec: PolicySpec,
}

impl CompiledPolicy {
    /// Validate a raw spec and freeze it. The only place policy errors
    /// can occur; after this, sessions treat the policy as infallible.
    pub fn compile(spec: PolicySpec) -> Result<Self, PolicyCompileError> {
        if spec.negotiation.max_rounds == 0 {
            return Err(PolicyCompileError::ZeroMaxRounds);
        }
        if spec.negotiation.firm_quote_valid_for_ms_min > spec.negotiation.firm_quote_valid_for_ms_max {
            return Err(PolicyCompileError::InvalidValidForRange);
        }
        if !spec.settlement.allowed_modes.contains(&spec.settlement.default_mode) {
            return Err(PolicyCompileError::DefaultModeNotAllowed);
        }
        if spec.disputes.enabled
            && (spec.disputes.max_refund_pct <= 0.0 || spec.disputes.max_refund_pct > 1.0)
        {
            return Err(PolicyCompileError::InvalidMaxRefundPct);
        }
        if spec.economics.reference_price.band_pct < 0.0 {
            return Err(PolicyCompileError::NegativeBandPct);
        }
        Ok(Self { spec })
    }

    pub fn time(&self) -> &TimePolicy {
        &self.spec.time
    }
    pub fn admission(&self) -> &AdmissionPolicy {
        &self.spec.admission
    }
    pub fn negotiation(&self) -> &NegotiationPolicy {
        &self.spec.negotiation
    }
    pub fn counterparty(&self) -> &CounterpartyPolicy {
        &self.spec.counterparty
    }
    pub fn sla(&self) -> &SlaPolicy {
        &self.spec.sla
    }
    pub fn economics(&self) -> &EconomicsPolicy {
        &self.spec.economics
    }
    pub fn settlement(&self) -> &SettlementPolicy {
        &self.spec.settlement
    }
    pub fn anti_gaming(&self) -> &AntiGamingPolicy {
        &self.spec.anti_gaming
    }
    pub fn disputes(&self) -> &DisputePolicy {
        &self.spec.disputes
    }
}

impl PolicySpec {
    /// A permissive, internally-consistent policy for tests and the demo
    /// binary: generous rounds/duration, a wide reference-price band, and
    /// disputes enabled. Not meant as a production default.
    pub fn sample() -> Self {
        PolicySpec {
            time: TimePolicy { max_clock_skew_ms: 5_000 },
            admission: AdmissionPolicy {
                requirements: vec![],
                max_concurrent_sessions: 10,
                rate_limit_per_minute: 100,
                kill_switch: false,
            },
            negotiation: NegotiationPolicy {
                max_rounds: 8,
                max_total_duration_ms: 60_000,
                firm_quote_valid_for_ms_min: 50,
                firm_quote_valid_for_ms_max: 30_000,
                allowed_actions: vec![],
            },
            counterparty: CounterpartyPolicy::default(),
            sla: SlaPolicy::default(),
            economics: EconomicsPolicy {
                reference_price: ReferencePriceEconomics {
                    band_pct: 0.35,
                    allow_band_override_if_urgent: true,
                    use_receipt_history: true,
                },
                bonding: BondingEconomics::default(),
            },
            settlement: SettlementPolicy {
                allowed_modes: vec![SettlementMode::HashReveal, SettlementMode::Streaming],
                default_mode: SettlementMode::HashReveal,
                challenge_window_ms: 10_000,
                sla: SettlementSla {
                    max_pending_ms: 30_000,
                    max_poll_attempts: 5,
                    poll_interval_ms: 1_000,
                },
            },
            anti_gaming: AntiGamingPolicy::default(),
            disputes: DisputePolicy {
                enabled: true,
                window_ms: 86_400_000,
                allow_partial: true,
                max_refund_pct: 1.0,
            },
        }
    }
}
