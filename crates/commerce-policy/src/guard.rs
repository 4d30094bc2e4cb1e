//! Phase-keyed policy guard. `check` consumes only its phase's sub-policy
//! and the typed context handed in — no I/O, no clock beyond `ctx.now_ms`.

use crate::policy::CompiledPolicy;
use commerce_core::error::FailureCode;
use commerce_core::settlement::SettlementMode;
use commerce_core::types::Round;

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyOutcome {
    Pass,
    Fail { code: FailureCode, reason: String },
}

impl PolicyOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, PolicyOutcome::Pass)
    }

    fn fail(code: FailureCode, reason: impl Into<String>) -> Self {
        PolicyOutcome::Fail {
            code,
            reason: reason.into(),
        }
    }
}

pub struct IntentContext {
    pub now_ms: i64,
    pub intent_expires_at_ms: i64,
    pub has_bond: bool,
    pub has_credential: bool,
    pub has_sponsor: bool,
    pub concurrent_sessions: u32,
    pub requests_this_minute: u32,
}

pub struct NegotiationContext {
    pub now_ms: i64,
    pub round: Round,
    pub session_start_ms: i64,
    pub quote_valid_for_ms: i64,
    pub quote_price: u128,
    pub urgent: bool,
    pub reference_price_p50: Option<u128>,
}

pub struct CounterpartyContext {
    pub reputation: f64,
    pub age_ms: i64,
    pub failure_rate: f64,
    pub credentials: Vec<String>,
    pub region: Option<String>,
}

pub struct SettlementContext {
    pub mode: SettlementMode,
}

pub struct PolicyGuard<'a> {
    policy: &'a CompiledPolicy,
}

impl<'a> PolicyGuard<'a> {
    pub fn new(policy: &'a CompiledPolicy) -> Self {
        Self { policy }
    }

    /// Evaluates in a fixed order, short-circuiting at the first failure.
    pub fn check_intent(&self, ctx: &IntentContext) -> PolicyOutcome {
        if self.policy.admission().kill_switch {
            return PolicyOutcome::fail(FailureCode::FailedAdmission, "kill switch active");
        }
        if ctx.intent_expires_at_ms <= ctx.now_ms {
            return PolicyOutcome::fail(FailureCode::FailedNegotiationTimeout, "intent already expired");
        }
        if ctx.concurrent_sessions > self.policy.admission().max_concurrent_sessions {
            return PolicyOutcome::fail(FailureCode::FailedAdmission, "too many concurrent sessions");
        }
        if ctx.requests_this_minute > self.policy.admission().rate_limit_per_minute {
            return PolicyOutcome::fail(FailureCode::FailedAdmission, "rate limit exceeded");
        }
        for req in &self.policy.admission().requirements {
            use crate::policy::AdmissionRequirement::*;
            let satisfied = match req {
                Bond => ctx.has_bond,
                Credential => ctx.has_credential,
                Sponsor => ctx.has_sponsor,
            };
            if !satisfied {
                return PolicyOutcome::fail(FailureCode::FailedAdmission, format!("missing {req:?}"));
            }
        }
        PolicyOutcome::Pass
    }

    pub fn check_negotiation(&self, ctx: &NegotiationContext) -> PolicyOutcome {
        let neg = self.policy.negotiation();
        if ctx.round > neg.max_rounds {
            return PolicyOutcome::fail(FailureCode::FailedNegotiationTimeout, "round cap exceeded");
        }
        let elapsed = ctx.now_ms - ctx.session_start_ms;
        if elapsed > neg.max_total_duration_ms {
            return PolicyOutcome::fail(FailureCode::FailedNegotiationTimeout, "duration cap exceeded");
        }
        if !neg.firm_quote_valid_for_range().contains(&ctx.quote_valid_for_ms) {
            return PolicyOutcome::fail(FailureCode::FailedPolicy, "quote validity window out of range");
        }
        if self.policy.economics().reference_price.use_receipt_history {
            if let Some(p50) = ctx.reference_price_p50 {
                let band = self.policy.economics().reference_price.band_pct;
                let lower = (p50 as f64 * (1.0 - band)).max(0.0) as u128;
                let upper = (p50 as f64 * (1.0 + band)) as u128;
                let in_band = ctx.quote_price >= lower && ctx.quote_price <= upper;
                let override_allowed =
                    ctx.urgent && self.policy.economics().reference_price.allow_band_override_if_urgent;
                if !in_band && !override_allowed {
                    return PolicyOutcome::fail(FailureCode::FailedReferenceBand, "quote out of reference band");
                }
            }
        }
        PolicyOutcome::Pass
    }

    pub fn check_counterparty(&self, ctx: &CounterpartyContext) -> PolicyOutcome {
        let cp = self.policy.counterparty();
        if ctx.reputation < cp.min_reputation {
            return PolicyOutcome::fail(FailureCode::FailedPolicy, "reputation below floor");
        }
        if ctx.age_ms < cp.min_age_ms {
            return PolicyOutcome::fail(FailureCode::FailedPolicy, "counterparty too new");
        }
        if ctx.failure_rate > cp.max_failure_rate {
            return PolicyOutcome::fail(FailureCode::FailedPolicy, "failure rate above ceiling");
        }
        for required in &cp.required_credentials {
            if !ctx.credentials.iter().any(|c| c == required) {
                return PolicyOutcome::fail(FailureCode::FailedPolicy, format!("missing credential {required}"));
            }
        }
        if let Some(region) = &ctx.region {
            if cp.denied_regions.iter().any(|r| r == region) {
                return PolicyOutcome::fail(FailureCode::FailedPolicy, "region denied");
            }
            if let Some(allowed) = &cp.allowed_regions {
                if !allowed.iter().any(|r| r == region) {
                    return PolicyOutcome::fail(FailureCode::FailedPolicy, "region not allowed");
                }
            }
        }
        PolicyOutcome::Pass
    }

    pub fn check_settlement(&self, ctx: &SettlementContext) -> PolicyOutcome {
        if !self.policy.settlement().allowed_modes.contains(&ctx.mode) {
            return PolicyOutcome::fail(FailureCode::SettlementModeNotAllowed, "settlement mode not allowed");
        }
        PolicyOutcome::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::*;

    fn sample_policy_spec() -> PolicySpec {
        PolicySpec {
            time: TimePolicy { max_clock_skew_ms: 5_000 },
            admission: AdmissionPolicy {
                requirements: vec![],
                max_concurrent_sessions: 10,
                rate_limit_per_minute: 100,
                kill_switch: false,
            },
            negotiation: NegotiationPolicy {
                max_rounds: 3,
                max_total_duration_ms: 60_000,
                firm_quote_valid_for_ms_min: 50,
                firm_quote_valid_for_ms_max: 5_000,
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
                allowed_modes: vec![SettlementMode::HashReveal],
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

    fn sample_policy() -> CompiledPolicy {
        CompiledPolicy::compile(sample_policy_spec()).unwrap()
    }

    #[test]
    fn out_of_band_quote_fails_reference_band() {
        let policy = sample_policy();
        let guard = PolicyGuard::new(&policy);
        let ctx = NegotiationContext {
            now_ms: 0,
            round: 1,
            session_start_ms: 0,
            quote_valid_for_ms: 100,
            quote_price: 5000,
            urgent: false,
            reference_price_p50: Some(1000),
        };
        assert_eq!(
            guard.check_negotiation(&ctx),
            PolicyOutcome::Fail {
                code: FailureCode::FailedReferenceBand,
                reason: "quote out of reference band".into()
            }
        );
    }

    #[test]
    fn reference_history_disabled_skips_band_check() {
        let mut spec = sample_policy_spec();
        spec.economics.reference_price.use_receipt_history = false;
        let policy = CompiledPolicy::compile(spec).unwrap();
        let guard = PolicyGuard::new(&policy);
        let ctx = NegotiationContext {
            now_ms: 0,
            round: 1,
            session_start_ms: 0,
            quote_valid_for_ms: 100,
            quote_price: 5000,
            urgent: false,
            reference_price_p50: Some(1000),
        };
        assert!(guard.check_negotiation(&ctx).is_pass());
    }

    #[test]
    fn urgent_override_passes() {
        let policy = sample_policy();
        let guard = PolicyGuard::new(&policy);
        let ctx = NegotiationContext {
            now_ms: 0,
            round: 1,
            session_start_ms: 0,
            quote_valid_for_ms: 100,
            quote_price: 5000,
            urgent: true,
            reference_price_p50: Some(1000),
        };
        assert!(guard.check_negotiation(&ctx).is_pass());
    }

    #[test]
    fn round_cap_exceeded_times_out() {
        let policy = sample_policy();
        let guard = PolicyGuard::new(&policy);
        let ctx = NegotiationContext {
            now_ms: 0,
            round: 4,
            session_start_ms: 0,
            quote_valid_for_ms: 100,
            quote_price: 100,
            urgent: false,
            reference_price_p50: None,
        };
        assert_eq!(
            guard.check_negotiation(&ctx),
            PolicyOutcome::Fail {
                code: FailureCode::FailedNegotiationTimeout,
                reason: "round cap exceeded".into()
            }
        );
    }
}
