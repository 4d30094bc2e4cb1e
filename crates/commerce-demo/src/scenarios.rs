//! The seven end-to-end scenarios (ch.8): each wires a fresh
//! `SessionDriver` against a `ManualClock` and a `MockSettlementProvider`,
//! drives one negotiation to its documented outcome, and reports what
//! happened. Every scenario is deterministic — no real time, no network.

use std::sync::Arc;

use clap::ValueEnum;
use commerce_core::message::{AcceptMsg, CommitMsg, IntentMsg, Message, QuoteMsg, RevealMsg};
use commerce_core::session::Receipt;
use commerce_core::types::{AgentId, Chain, IntentId};
use commerce_crypto::KeyPair;
use commerce_dispute::DisputeRegistry;
use commerce_policy::{CompiledPolicy, IntentContext, PolicySpec};
use commerce_session::{AcceptOptions, ManualClock, ReceiptStore, Session, SessionDriver};
use commerce_session::settlement_router::ProviderCandidate;
use commerce_settlement::MockSettlementProvider;
use commerce_settlement::SettlementProvider as _;
use commerce_transcript::{CommitRevealArtifact, TranscriptBuilder};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    HappyHashReveal,
    OutOfBandQuote,
    UrgentOverride,
    RoundsExceeded,
    AsyncSettlementFailure,
    DisputeRefund,
    CommitRevealSlash,
}

impl Scenario {
    pub fn all() -> &'static [Scenario] {
        &[
            Scenario::HappyHashReveal,
            Scenario::OutOfBandQuote,
            Scenario::UrgentOverride,
            Scenario::RoundsExceeded,
            Scenario::AsyncSettlementFailure,
            Scenario::DisputeRefund,
            Scenario::CommitRevealSlash,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::HappyHashReveal => "happy_hash_reveal",
            Scenario::OutOfBandQuote => "out_of_band_quote",
            Scenario::UrgentOverride => "urgent_override",
            Scenario::RoundsExceeded => "rounds_exceeded",
            Scenario::AsyncSettlementFailure => "async_settlement_failure",
            Scenario::DisputeRefund => "dispute_refund_within_window",
            Scenario::CommitRevealSlash => "commit_reveal_slash",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub final_status: String,
    pub final_outcome: Option<String>,
    pub buyer_balance: Option<u128>,
    pub seller_balance: Option<u128>,
    pub receipt: Option<Receipt>,
    pub replay_ok: Option<bool>,
    pub notes: Vec<String>,
}

fn policy(spec: PolicySpec) -> Arc<CompiledPolicy> {
    Arc::new(CompiledPolicy::compile(spec).expect("sample-derived policy is valid"))
}

fn sign(keypair: &KeyPair, message: Message) -> commerce_core::Envelope {
    commerce_crypto::sign(message, keypair).expect("signing a freshly built message never fails")
}

fn driver(
    policy: Arc<CompiledPolicy>,
    provider: MockSettlementProvider,
    clock: Arc<ManualClock>,
) -> SessionDriver {
    let candidate = ProviderCandidate {
        name: "mock".to_string(),
        provider: Arc::new(provider),
    };
    SessionDriver::new(policy, vec![candidate], Arc::new(ReceiptStore::new()), clock)
}

async fn provider_balance(driver: &SessionDriver, agent: &AgentId) -> commerce_core::Amount {
    driver.candidates[0].provider.balance(agent, None, None).await
}

fn intent_context(clock: &ManualClock, expires_at_ms: i64) -> IntentContext {
    IntentContext {
        now_ms: clock.now_ms(),
        intent_expires_at_ms: expires_at_ms,
        has_bond: true,
        has_credential: true,
        has_sponsor: true,
        concurrent_sessions: 0,
        requests_this_minute: 0,
    }
}

/// 1. Happy hash_reveal: full lifecycle to ACCEPTED, then a clean replay
/// of the transcript assembled alongside the session.
pub async fn happy_hash_reveal() -> ScenarioReport {
    let policy = policy(PolicySpec::sample());
    let clock = Arc::new(ManualClock::new(1_000));
    let buyer = AgentId::from("buyer-1");
    let seller = AgentId::from("seller-1");
    let provider = MockSettlementProvider::new();
    provider.seed_balance(&buyer, None, None, 1_000_000);
    provider.seed_balance(&seller, None, None, 0);
    let driver = driver(policy, provider, clock.clone());

    let buyer_key = KeyPair::generate();
    let seller_key = KeyPair::generate();
    let intent_id = IntentId::from("I1");
    let mut session = Session::new(intent_id.clone(), buyer.clone(), seller.clone(), clock.now_ms());
    let mut transcript = TranscriptBuilder::new(intent_id.clone());

    let intent = IntentMsg {
        intent_id: intent_id.clone(),
        max_price: 100,
        asset: "USDC".to_string(),
        chain: Chain::default(),
        urgent: false,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    let env = sign(&buyer_key, Message::Intent(intent.clone()));
    driver.open(&mut session, env.clone(), intent_context(&clock, intent.expires_at_ms)).unwrap();
    transcript.record_envelope(env);

    let ask = QuoteMsg {
        intent_id: intent_id.clone(),
        price: 80,
        valid_for_ms: 100,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 100,
        prev_hash_hex: None,
    };
    let env = sign(&seller_key, Message::Ask(ask));
    driver.quote(&mut session, env.clone(), false, None, None).unwrap();
    transcript.record_envelope(env);

    let accept = AcceptMsg {
        intent_id: intent_id.clone(),
        agreed_price: 75,
        seller_bond: 10,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    let env = sign(&buyer_key, Message::Accept(accept));
    driver.accept(&mut session, env.clone(), AcceptOptions::default()).await.unwrap();
    transcript.record_envelope(env);

    let commit_hash = commerce_crypto::compute_commit_hash("cGF5bG9hZA==", "bm9uY2U=");
    let commit = CommitMsg {
        intent_id: intent_id.clone(),
        commit_hash_hex: commit_hash.clone(),
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    let env = sign(&seller_key, Message::Commit(commit));
    driver.commit_reveal_commit(&mut session, env.clone()).unwrap();
    transcript.record_envelope(env);

    let reveal = RevealMsg {
        intent_id: intent_id.clone(),
        payload_b64: "cGF5bG9hZA==".to_string(),
        nonce_b64: "bm9uY2U=".to_string(),
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    let env = sign(&seller_key, Message::Reveal(reveal));
    driver.commit_reveal_reveal(&mut session, env.clone()).await.unwrap();
    transcript.record_envelope(env);
    transcript.set_commit_reveal(CommitRevealArtifact {
        commit_hash_hex: Some(commit_hash),
        payload_b64: Some("cGF5bG9hZA==".to_string()),
        nonce_b64: Some("bm9uY2U=".to_string()),
    });
    if let Some(outcome) = session.outcome {
        transcript.set_outcome(outcome);
    }

    let buyer_balance = provider_balance(&driver, &buyer).await;
    let seller_balance = provider_balance(&driver, &seller).await;

    let built = transcript.build();
    let replay = commerce_transcript::replay(&built, clock.now_ms());
    info!(status = ?session.status, replay_ok = replay.ok, "happy_hash_reveal finished");

    ScenarioReport {
        name: Scenario::HappyHashReveal.name().to_string(),
        final_status: format!("{:?}", session.status),
        final_outcome: session.outcome.map(|o| format!("{o:?}")),
        buyer_balance: Some(buyer_balance),
        seller_balance: Some(seller_balance),
        receipt: session.receipt,
        replay_ok: Some(replay.ok),
        notes: vec![],
    }
}

/// 2. Out-of-band quote: a quote far outside the reference band, no
/// urgency flag, is rejected for policy.
pub async fn out_of_band_quote() -> ScenarioReport {
    let (session, _clock) = negotiate_reference_band(false).await;
    ScenarioReport {
        name: Scenario::OutOfBandQuote.name().to_string(),
        final_status: format!("{:?}", session.status),
        final_outcome: session.outcome.map(|o| format!("{o:?}")),
        buyer_balance: None,
        seller_balance: None,
        receipt: None,
        replay_ok: None,
        notes: vec!["policy.economics.reference_price.band_pct = 0.35, p50 = 1000, ask.price = 5000".to_string()],
    }
}

/// 3. Urgent override: same out-of-band quote, but `urgent=true` lets it
/// through per `allow_band_override_if_urgent`.
pub async fn urgent_override() -> ScenarioReport {
    let (session, _clock) = negotiate_reference_band(true).await;
    ScenarioReport {
        name: Scenario::UrgentOverride.name().to_string(),
        final_status: format!("{:?}", session.status),
        final_outcome: session.outcome.map(|o| format!("{o:?}")),
        buyer_balance: None,
        seller_balance: None,
        receipt: None,
        replay_ok: None,
        notes: vec!["same quote as out_of_band_quote, urgent=true".to_string()],
    }
}

async fn negotiate_reference_band(urgent: bool) -> (Session, Arc<ManualClock>) {
    let policy = policy(PolicySpec::sample());
    let clock = Arc::new(ManualClock::new(1_000));
    let buyer = AgentId::from("buyer-2");
    let seller = AgentId::from("seller-2");
    let provider = MockSettlementProvider::new();
    provider.seed_balance(&buyer, None, None, 1_000_000);
    let driver = driver(policy, provider, clock.clone());

    let buyer_key = KeyPair::generate();
    let seller_key = KeyPair::generate();
    let intent_id = IntentId::from("I2");
    let mut session = Session::new(intent_id.clone(), buyer.clone(), seller.clone(), clock.now_ms());

    let intent = IntentMsg {
        intent_id: intent_id.clone(),
        max_price: 10_000,
        asset: "USDC".to_string(),
        chain: Chain::default(),
        urgent,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    driver
        .open(&mut session, sign(&buyer_key, Message::Intent(intent.clone())), intent_context(&clock, intent.expires_at_ms))
        .unwrap();

    let ask = QuoteMsg {
        intent_id: intent_id.clone(),
        price: 5_000,
        valid_for_ms: 100,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 100,
        prev_hash_hex: None,
    };
    driver
        .quote(&mut session, sign(&seller_key, Message::Ask(ask)), urgent, Some(1_000), None)
        .unwrap();

    (session, clock)
}

/// 4. Rounds exceeded: `max_rounds=3`, a fourth quote round is refused by
/// policy and the session times out.
pub async fn rounds_exceeded() -> ScenarioReport {
    let mut spec = PolicySpec::sample();
    spec.negotiation.max_rounds = 3;
    let policy = policy(spec);
    let clock = Arc::new(ManualClock::new(1_000));
    let buyer = AgentId::from("buyer-3");
    let seller = AgentId::from("seller-3");
    let provider = MockSettlementProvider::new();
    provider.seed_balance(&buyer, None, None, 1_000_000);
    let driver = driver(policy, provider, clock.clone());

    let buyer_key = KeyPair::generate();
    let seller_key = KeyPair::generate();
    let intent_id = IntentId::from("I3");
    let mut session = Session::new(intent_id.clone(), buyer.clone(), seller.clone(), clock.now_ms());

    let intent = IntentMsg {
        intent_id: intent_id.clone(),
        max_price: 1_000,
        asset: "USDC".to_string(),
        chain: Chain::default(),
        urgent: false,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    driver
        .open(&mut session, sign(&buyer_key, Message::Intent(intent.clone())), intent_context(&clock, intent.expires_at_ms))
        .unwrap();

    let mut prev_hash_hex = None;
    for round in 0..4u32 {
        let ask = QuoteMsg {
            intent_id: intent_id.clone(),
            price: 900 - round as u128 * 10,
            valid_for_ms: 100,
            sent_at_ms: clock.now_ms(),
            expires_at_ms: clock.now_ms() + 100,
            prev_hash_hex: prev_hash_hex.clone(),
        };
        let env = sign(&seller_key, Message::Ask(ask));
        prev_hash_hex = Some(commerce_session::transcript_chain::envelope_hash_hex(&env));
        driver.quote(&mut session, env, false, None, None).ok();
    }

    ScenarioReport {
        name: Scenario::RoundsExceeded.name().to_string(),
        final_status: format!("{:?}", session.status),
        final_outcome: session.outcome.map(|o| format!("{o:?}")),
        buyer_balance: None,
        seller_balance: None,
        receipt: None,
        replay_ok: None,
        notes: vec![format!("rounds completed before termination: {}", session.round)],
    }
}

/// 5. Async settlement failure: the provider's `commit` always fails; the
/// accept is refused with `SETTLEMENT_FAILED` and locked funds are
/// released back to the buyer.
pub async fn async_settlement_failure() -> ScenarioReport {
    let policy = policy(PolicySpec::sample());
    let clock = Arc::new(ManualClock::new(1_000));
    let buyer = AgentId::from("buyer-4");
    let seller = AgentId::from("seller-4");
    let provider = MockSettlementProvider::failing();
    provider.seed_balance(&buyer, None, None, 1_000_000);
    provider.seed_balance(&seller, None, None, 100_000);
    let driver = driver(policy, provider, clock.clone());

    let buyer_key = KeyPair::generate();
    let seller_key = KeyPair::generate();
    let intent_id = IntentId::from("I5");
    let mut session = Session::new(intent_id.clone(), buyer.clone(), seller.clone(), clock.now_ms());

    let intent = IntentMsg {
        intent_id: intent_id.clone(),
        max_price: 1_000_000,
        asset: "USDC".to_string(),
        chain: Chain::default(),
        urgent: false,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    driver
        .open(&mut session, sign(&buyer_key, Message::Intent(intent.clone())), intent_context(&clock, intent.expires_at_ms))
        .unwrap();

    let ask = QuoteMsg {
        intent_id: intent_id.clone(),
        price: 500_000,
        valid_for_ms: 100,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 100,
        prev_hash_hex: None,
    };
    driver.quote(&mut session, sign(&seller_key, Message::Ask(ask)), false, None, None).unwrap();

    let accept = AcceptMsg {
        intent_id: intent_id.clone(),
        agreed_price: 500_000,
        seller_bond: 50_000,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    driver.accept(&mut session, sign(&buyer_key, Message::Accept(accept)), AcceptOptions::default()).await.unwrap();

    let buyer_balance = provider_balance(&driver, &buyer).await;
    let seller_balance = provider_balance(&driver, &seller).await;

    ScenarioReport {
        name: Scenario::AsyncSettlementFailure.name().to_string(),
        final_status: format!("{:?}", session.status),
        final_outcome: session.outcome.map(|o| format!("{o:?}")),
        buyer_balance: Some(buyer_balance),
        seller_balance: Some(seller_balance),
        receipt: session.receipt,
        replay_ok: None,
        notes: vec![],
    }
}

/// 6. Dispute refund within window: a completed exchange, a full refund
/// resolved inside the dispute window, and an idempotent second resolve.
pub async fn dispute_refund_within_window() -> ScenarioReport {
    let policy = policy(PolicySpec::sample());
    let clock = Arc::new(ManualClock::new(1_000));
    let buyer = AgentId::from("buyer-6");
    let seller = AgentId::from("seller-6");
    let provider = Arc::new(MockSettlementProvider::new());
    provider.seed_balance(&buyer, None, None, 1_000_000);
    provider.seed_balance(&seller, None, None, 0);
    let candidate = ProviderCandidate {
        name: "mock".to_string(),
        provider: provider.clone() as Arc<dyn commerce_settlement::SettlementProvider>,
    };
    let driver = SessionDriver::new(policy.clone(), vec![candidate], Arc::new(ReceiptStore::new()), clock.clone());

    let buyer_key = KeyPair::generate();
    let seller_key = KeyPair::generate();
    let intent_id = IntentId::from("I6");
    let mut session = Session::new(intent_id.clone(), buyer.clone(), seller.clone(), clock.now_ms());

    let intent = IntentMsg {
        intent_id: intent_id.clone(),
        max_price: 100,
        asset: "USDC".to_string(),
        chain: Chain::default(),
        urgent: false,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    driver
        .open(&mut session, sign(&buyer_key, Message::Intent(intent.clone())), intent_context(&clock, intent.expires_at_ms))
        .unwrap();

    let ask = QuoteMsg {
        intent_id: intent_id.clone(),
        price: 80,
        valid_for_ms: 100,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 100,
        prev_hash_hex: None,
    };
    driver.quote(&mut session, sign(&seller_key, Message::Ask(ask)), false, None, None).unwrap();

    let accept = AcceptMsg {
        intent_id: intent_id.clone(),
        agreed_price: 75,
        seller_bond: 10,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    driver.accept(&mut session, sign(&buyer_key, Message::Accept(accept)), AcceptOptions::default()).await.unwrap();

    let commit_hash = commerce_crypto::compute_commit_hash("cGF5bG9hZA==", "bm9uY2U=");
    let commit = CommitMsg {
        intent_id: intent_id.clone(),
        commit_hash_hex: commit_hash,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    driver.commit_reveal_commit(&mut session, sign(&seller_key, Message::Commit(commit))).unwrap();

    let reveal = RevealMsg {
        intent_id: intent_id.clone(),
        payload_b64: "cGF5bG9hZA==".to_string(),
        nonce_b64: "bm9uY2U=".to_string(),
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    driver.commit_reveal_reveal(&mut session, sign(&seller_key, Message::Reveal(reveal))).await.unwrap();

    let receipt = session.receipt.clone().expect("happy path always issues a receipt");

    let registry = DisputeRegistry::new(policy, provider.clone() as Arc<dyn commerce_settlement::SettlementProvider>);
    let record = registry.open(&receipt, "item not as described".to_string(), clock.now_ms() + 1_000).unwrap();
    let first = registry
        .resolve(&record.dispute_id, commerce_core::dispute::DisputeOutcome::RefundFull, None, None, clock.now_ms() + 2_000)
        .await
        .unwrap();
    let second = registry
        .resolve(&record.dispute_id, commerce_core::dispute::DisputeOutcome::RefundFull, None, None, clock.now_ms() + 3_000)
        .await;

    let buyer_balance = provider.balance(&buyer, None, None).await;
    let seller_balance = provider.balance(&seller, None, None).await;

    ScenarioReport {
        name: Scenario::DisputeRefund.name().to_string(),
        final_status: format!("{:?}", first.record.status),
        final_outcome: session.outcome.map(|o| format!("{o:?}")),
        buyer_balance: Some(buyer_balance),
        seller_balance: Some(seller_balance),
        receipt: Some(receipt),
        replay_ok: None,
        notes: vec![
            format!("first resolve refunded {}", first.refund.refunded_amount),
            format!("second resolve: {:?}", second.err()),
        ],
    }
}

/// 7. Commit-reveal slash: the seller's reveal arrives after
/// `delivery_deadline_ms`, so the buyer's bond demand slashes the seller.
pub async fn commit_reveal_slash() -> ScenarioReport {
    let policy = policy(PolicySpec::sample());
    let clock = Arc::new(ManualClock::new(1_000));
    let buyer = AgentId::from("buyer-7");
    let seller = AgentId::from("seller-7");
    let provider = MockSettlementProvider::new();
    provider.seed_balance(&buyer, None, None, 1_000_000);
    provider.seed_balance(&seller, None, None, 0);
    let driver = driver(policy, provider, clock.clone());

    let buyer_key = KeyPair::generate();
    let seller_key = KeyPair::generate();
    let intent_id = IntentId::from("I7");
    let mut session = Session::new(intent_id.clone(), buyer.clone(), seller.clone(), clock.now_ms());

    let intent = IntentMsg {
        intent_id: intent_id.clone(),
        max_price: 100,
        asset: "USDC".to_string(),
        chain: Chain::default(),
        urgent: false,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    driver
        .open(&mut session, sign(&buyer_key, Message::Intent(intent.clone())), intent_context(&clock, intent.expires_at_ms))
        .unwrap();

    let ask = QuoteMsg {
        intent_id: intent_id.clone(),
        price: 80,
        valid_for_ms: 100,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 100,
        prev_hash_hex: None,
    };
    driver.quote(&mut session, sign(&seller_key, Message::Ask(ask)), false, None, None).unwrap();

    let accept = AcceptMsg {
        intent_id: intent_id.clone(),
        agreed_price: 75,
        seller_bond: 10,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 5_000,
    };
    driver.accept(&mut session, sign(&buyer_key, Message::Accept(accept)), AcceptOptions::default()).await.unwrap();

    let commit_hash = commerce_crypto::compute_commit_hash("cGF5bG9hZA==", "bm9uY2U=");
    let commit = CommitMsg {
        intent_id: intent_id.clone(),
        commit_hash_hex: commit_hash,
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 5_000,
    };
    driver.commit_reveal_commit(&mut session, sign(&seller_key, Message::Commit(commit))).unwrap();

    clock.advance(10_000);

    let reveal = RevealMsg {
        intent_id: intent_id.clone(),
        payload_b64: "cGF5bG9hZA==".to_string(),
        nonce_b64: "bm9uY2U=".to_string(),
        sent_at_ms: clock.now_ms(),
        expires_at_ms: clock.now_ms() + 60_000,
    };
    driver.commit_reveal_reveal(&mut session, sign(&seller_key, Message::Reveal(reveal))).await.unwrap();

    let buyer_balance = provider_balance(&driver, &buyer).await;
    let seller_balance = provider_balance(&driver, &seller).await;

    ScenarioReport {
        name: Scenario::CommitRevealSlash.name().to_string(),
        final_status: format!("{:?}", session.status),
        final_outcome: session.outcome.map(|o| format!("{o:?}")),
        buyer_balance: Some(buyer_balance),
        seller_balance: Some(seller_balance),
        receipt: session.receipt,
        replay_ok: None,
        notes: vec![],
    }
}

pub async fn run(scenario: Scenario) -> ScenarioReport {
    match scenario {
        Scenario::HappyHashReveal => happy_hash_reveal().await,
        Scenario::OutOfBandQuote => out_of_band_quote().await,
        Scenario::UrgentOverride => urgent_override().await,
        Scenario::RoundsExceeded => rounds_exceeded().await,
        Scenario::AsyncSettlementFailure => async_settlement_failure().await,
        Scenario::DisputeRefund => dispute_refund_within_window().await,
        Scenario::CommitRevealSlash => commit_reveal_slash().await,
    }
}
