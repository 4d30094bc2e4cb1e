pub mod guard;
pub mod policy;

pub use guard::{CounterpartyContext, IntentContext, NegotiationContext, PolicyGuard, PolicyOutcome, SettlementContext};
pub use policy::{
    AdmissionPolicy, AdmissionRequirement, AntiGamingPolicy, BondingEconomics, CompiledPolicy,
    CounterpartyPolicy, DisputePolicy, EconomicsPolicy, NegotiationPolicy, PolicyCompileError,
    PolicySpec, ReferencePriceEconomics, SettlementPolicy, SettlementSla, SlaPolicy, TimePolicy,
};
