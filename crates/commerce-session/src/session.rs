//! The negotiation session state machine (C4): drives a single exchange
//! from `IDLE` to a terminal outcome, gluing the envelope codec (C1),
//! the policy guard (C2), and the settlement provider (C3). `Session` is
//! a plain data record — serializable, no embedded collaborators — so it
//! can sit in a transcript or be rebuilt from one; `SessionDriver` holds
//! the collaborators (policy, settlement candidates, clock, receipt
//! store) and implements `apply`-shaped transition methods against it.

use crate::clock::Clock;
#[cfg(test)]
use crate::clock::ManualClock;
use crate::error::{terminal_outcome_for, terminal_status_for, SessionError};
use crate::receipt_store::ReceiptStore;
use crate::settlement_router::{
    fallback_chain, partition_amount, split_chain, split_meets_target, ProviderCandidate,
};
use crate::transcript_chain::envelope_hash_hex;
use commerce_core::error::FailureCode;
use commerce_core::message::{AcceptMsg, CommitMsg, IntentMsg, QuoteMsg, RejectMsg, RevealMsg};
use commerce_core::session::{Agreement, AgreementStatus, Receipt, SessionStatus, TerminalOutcome, TranscriptRound};
use commerce_core::settlement::{SettlementMode, SettlementSegment};
use commerce_core::types::{AgentId, Amount, Chain, HandleId, IntentId, ReceiptId, Round, Timestamp};
use commerce_core::{Envelope, Message};
use commerce_policy::{CompiledPolicy, CounterpartyContext, IntentContext, NegotiationContext, PolicyGuard, PolicyOutcome, SettlementContext};
use commerce_settlement::SettlementProvider as _;
use std::sync::Arc;
use tracing::{info, warn};

/// Options governing a single ACCEPT's settlement attempt.
#[derive(Debug, Clone, Default)]
pub struct AcceptOptions {
    pub idempotency_key: Option<String>,
    pub auto_poll: bool,
    pub split: bool,
    pub chain: Option<Chain>,
    pub asset: Option<String>,
}

/// Plain-data negotiation record for one intent. Append-only transcript;
/// never mutated once `status.is_terminal()`.
#[derive(Debug, Clone)]
pub struct Session {
    pub intent_id: IntentId,
    pub buyer_id: AgentId,
    pub seller_id: AgentId,
    pub status: SessionStatus,
    /// Set exactly when `status.is_terminal()`: the ch.4.4 fault category,
    /// distinct from `status` itself, that a transcript reader needs to
    /// assign responsibility without re-deriving it from a `FailureCode`.
    pub outcome: Option<TerminalOutcome>,
    pub round: Round,
    pub start_ms: Timestamp,
    pub intent: Option<IntentMsg>,
    pub latest_ask: Option<QuoteMsg>,
    pub latest_bid: Option<QuoteMsg>,
    /// `urgent`/`reference_price_p50` passed to the most recent `quote()`
    /// call, re-applied by `accept()` so ACCEPT is checked against the
    /// same reference band the quote itself was.
    pub last_urgent: bool,
    pub last_reference_price_p50: Option<Amount>,
    pub rounds: Vec<TranscriptRound>,
    pub agreement: Option<Agreement>,
    pub receipt: Option<Receipt>,
    pub handle_id: Option<HandleId>,
    pub settlement_provider_name: Option<String>,
    pub split_segments: Option<Vec<SettlementSegment>>,
    pub sla_violations: Vec<String>,
}

impl Session {
    pub fn new(intent_id: IntentId, buyer_id: AgentId, seller_id: AgentId, start_ms: Timestamp) -> Self {
        Self {
            intent_id,
            buyer_id,
            seller_id,
            status: SessionStatus::Idle,
            outcome: None,
            round: 0,
            start_ms,
            intent: None,
            latest_ask: None,
            latest_bid: None,
            last_urgent: false,
            last_reference_price_p50: None,
            rounds: Vec::new(),
            agreement: None,
            receipt: None,
            handle_id: None,
            settlement_provider_name: None,
            split_segments: None,
            sla_violations: Vec::new(),
        }
    }

    fn push_round(&mut self, env: &Envelope, variant: &'static str, at_ms: Timestamp) {
        self.rounds.push(TranscriptRound {
            round: self.round,
            envelope_hash_hex: envelope_hash_hex(env),
            variant: variant.to_string(),
            at_ms,
        });
    }

    fn head_hash(&self) -> Option<&str> {
        self.rounds.last().map(|r| r.envelope_hash_hex.as_str())
    }

    fn require_live(&self) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            Err(SessionError::AlreadyTerminal)
        } else {
            Ok(())
        }
    }

    fn require_intent_match(&self, msg_intent_id: &IntentId) -> Result<(), SessionError> {
        if msg_intent_id != &self.intent_id {
            Err(SessionError::IntentIdMismatch)
        } else {
            Ok(())
        }
    }

    fn terminate(&mut self, status: SessionStatus, outcome: TerminalOutcome) {
        self.status = status;
        self.outcome = Some(outcome);
    }
}

/// Holds the session's collaborators: compiled policy, settlement
/// candidates (fallback/split order), the fingerprint table, and the
/// clock. Stateless itself; every method takes the `Session` it drives.
pub struct SessionDriver {
    pub policy: Arc<CompiledPolicy>,
    pub candidates: Vec<ProviderCandidate>,
    pub receipt_store: Arc<ReceiptStore>,
    pub clock: Arc<dyn Clock>,
}

impl SessionDriver {
    pub fn new(
        policy: Arc<CompiledPolicy>,
        candidates: Vec<ProviderCandidate>,
        receipt_store: Arc<ReceiptStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy,
            candidates,
            receipt_store,
            clock,
        }
    }

    fn guard(&self) -> PolicyGuard<'_> {
        PolicyGuard::new(&self.policy)
    }

    fn now(&self) -> Timestamp {
        self.clock.now_ms()
    }

    fn primary(&self) -> &ProviderCandidate {
        &self.candidates[0]
    }

    fn fail_policy(&self, session: &mut Session, code: FailureCode, reason: &str) {
        warn!(intent_id = %session.intent_id, ?code, reason, "session terminating on policy failure");
        session.terminate(terminal_status_for(code), terminal_outcome_for(code));
    }

    /// IDLE -> INTENT_OPEN.
    pub fn open(&self, session: &mut Session, env: Envelope, ctx: IntentContext) -> Result<(), SessionError> {
        session.require_live()?;
        if !commerce_crypto::verify(&env) {
            session.terminate(SessionStatus::Failed, TerminalOutcome::FailedIdentity);
            return Err(SessionError::BadSignature);
        }
        let msg = match &env.message {
            Message::Intent(m) => m.clone(),
            _ => return Err(SessionError::UnexpectedMessageType),
        };
        session.require_intent_match(&msg.intent_id)?;

        match self.guard().check_intent(&ctx) {
            PolicyOutcome::Pass => {}
            PolicyOutcome::Fail { code, reason } => {
                self.fail_policy(session, code, &reason);
                return Ok(());
            }
        }

        session.push_round(&env, "INTENT", ctx.now_ms);
        session.intent = Some(msg);
        session.status = SessionStatus::IntentOpen;
        info!(intent_id = %session.intent_id, "intent opened");
        Ok(())
    }

    /// INTENT_OPEN/NEGOTIATING -> NEGOTIATING on a verified ASK/BID.
    pub fn quote(
        &self,
        session: &mut Session,
        env: Envelope,
        urgent: bool,
        reference_price_p50: Option<Amount>,
        counterparty: Option<&CounterpartyContext>,
    ) -> Result<(), SessionError> {
        session.require_live()?;
        if !matches!(session.status, SessionStatus::IntentOpen | SessionStatus::Negotiating) {
            return Err(SessionError::WrongStatus);
        }
        if !commerce_crypto::verify(&env) {
            session.terminate(SessionStatus::Failed, TerminalOutcome::FailedIdentity);
            return Err(SessionError::BadSignature);
        }
        let (msg, variant): (QuoteMsg, &'static str) = match &env.message {
            Message::Ask(m) => (m.clone(), "ASK"),
            Message::Bid(m) => (m.clone(), "BID"),
            _ => return Err(SessionError::UnexpectedMessageType),
        };
        session.require_intent_match(&msg.intent_id)?;

        if msg.expires_at_ms != msg.sent_at_ms + msg.valid_for_ms {
            return Err(SessionError::QuoteValidityInvariantViolated);
        }
        if session.round > 0 {
            let head = session.head_hash().map(str::to_string);
            if msg.prev_hash_hex != head {
                return Err(SessionError::BrokenRoundChain);
            }
        }

        let now = self.now();
        let next_round = session.round + 1;
        let ctx = NegotiationContext {
            now_ms: now,
            round: next_round,
            session_start_ms: session.start_ms,
            quote_valid_for_ms: msg.valid_for_ms,
            quote_price: msg.price,
            urgent,
            reference_price_p50,
        };
        match self.guard().check_negotiation(&ctx) {
            PolicyOutcome::Pass => {}
            PolicyOutcome::Fail { code, reason } => {
                self.fail_policy(session, code, &reason);
                return Ok(());
            }
        }
        if let Some(cp_ctx) = counterparty {
            match self.guard().check_counterparty(cp_ctx) {
                PolicyOutcome::Pass => {}
                PolicyOutcome::Fail { code, reason } => {
                    self.fail_policy(session, code, &reason);
                    return Ok(());
                }
            }
        }

        session.round = next_round;
        session.push_round(&env, variant, now);
        session.last_urgent = urgent;
        session.last_reference_price_p50 = reference_price_p50;
        match variant {
            "ASK" => session.latest_ask = Some(msg),
            _ => session.latest_bid = Some(msg),
        }
        session.status = SessionStatus::Negotiating;
        Ok(())
    }

    /// Any live status -> REJECTED.
    pub fn reject(&self, session: &mut Session, env: Envelope) -> Result<(), SessionError> {
        session.require_live()?;
        if !commerce_crypto::verify(&env) {
            session.terminate(SessionStatus::Failed, TerminalOutcome::FailedIdentity);
            return Err(SessionError::BadSignature);
        }
        let msg: RejectMsg = match &env.message {
            Message::Reject(m) => m.clone(),
            _ => return Err(SessionError::UnexpectedMessageType),
        };
        session.require_intent_match(&msg.intent_id)?;
        let now = self.now();
        session.push_round(&env, "REJECT", now);
        session.terminate(SessionStatus::Rejected, TerminalOutcome::Rejected);
        Ok(())
    }

    /// NEGOTIATING -> LOCKED. Prepares and commits settlement, locks the
    /// seller bond, and creates the agreement. On any escrow failure the
    /// session terminates `FAILED` carrying the settlement failure code.
    pub async fn accept(
        &self,
        session: &mut Session,
        env: Envelope,
        opts: AcceptOptions,
    ) -> Result<(), SessionError> {
        session.require_live()?;
        if session.status != SessionStatus::Negotiating {
            return Err(SessionError::WrongStatus);
        }
        if !commerce_crypto::verify(&env) {
            session.terminate(SessionStatus::Failed, TerminalOutcome::FailedIdentity);
            return Err(SessionError::BadSignature);
        }
        let msg: AcceptMsg = match &env.message {
            Message::Accept(m) => m.clone(),
            _ => return Err(SessionError::UnexpectedMessageType),
        };
        session.require_intent_match(&msg.intent_id)?;

        let now = self.now();
        if now > msg.expires_at_ms {
            self.fail_policy(session, FailureCode::FailedNegotiationTimeout, "accept envelope expired");
            return Ok(());
        }

        let neg = self.policy.negotiation();
        let ctx = NegotiationContext {
            now_ms: now,
            round: session.round,
            session_start_ms: session.start_ms,
            quote_valid_for_ms: neg.firm_quote_valid_for_ms_min,
            quote_price: msg.agreed_price,
            urgent: session.last_urgent,
            reference_price_p50: session.last_reference_price_p50,
        };
        match self.guard().check_negotiation(&ctx) {
            PolicyOutcome::Pass => {}
            PolicyOutcome::Fail { code, reason } => {
                self.fail_policy(session, code, &reason);
                return Ok(());
            }
        }

        let mode = self.policy.settlement().default_mode;
        match self.guard().check_settlement(&SettlementContext { mode }) {
            PolicyOutcome::Pass => {}
            PolicyOutcome::Fail { code, reason } => {
                self.fail_policy(session, code, &reason);
                return Ok(());
            }
        }

        if !self.receipt_store.reserve(&session.intent_id) {
            self.fail_policy(session, FailureCode::FailedEscrow, "intent fingerprint already committed");
            return Ok(());
        }

        let idempotency_key = opts.idempotency_key.clone().unwrap_or_else(|| "accept".to_string());
        let sla = &self.policy.settlement().sla;

        let (provider_name, handle_id, result, segments) = if opts.split && mode == SettlementMode::HashReveal {
            let outcome = split_chain(
                &self.candidates,
                &session.buyer_id,
                &session.seller_id,
                &session.intent_id,
                msg.agreed_price,
                opts.chain,
                opts.asset.as_deref(),
                opts.auto_poll,
                sla.max_pending_ms,
                sla.max_poll_attempts,
                self.clock.as_ref(),
            )
            .await;
            if !split_meets_target(outcome.committed_total, msg.agreed_price) {
                self.receipt_store.release(&session.intent_id);
                session.split_segments = Some(outcome.segments);
                self.fail_policy(session, FailureCode::SettlementFailed, "split settlement below target");
                return Ok(());
            }
            ("split".to_string(), None, None, Some(outcome.segments))
        } else {
            let buyer = session.buyer_id.clone();
            let seller = session.seller_id.clone();
            let intent_id = session.intent_id.clone();
            let amount = msg.agreed_price;
            let chain = opts.chain;
            let asset = opts.asset.clone();
            let build_intent = move |candidate: &ProviderCandidate| commerce_core::settlement::SettlementIntent {
                intent_id: intent_id.clone(),
                from: buyer.clone(),
                to: seller.clone(),
                amount,
                mode,
                idempotency_key: Some(format!("{}-{}", candidate.name, idempotency_key)),
                chain,
                asset: asset.clone(),
            };
            match fallback_chain(
                &self.candidates,
                build_intent,
                opts.auto_poll,
                sla.max_pending_ms,
                sla.max_poll_attempts,
                self.clock.as_ref(),
            )
            .await
            {
                Ok((name, handle_id, result, violation)) => {
                    if let Some(v) = violation {
                        session.sla_violations.push(v);
                        self.receipt_store.release(&session.intent_id);
                        session.handle_id = Some(handle_id);
                        session.settlement_provider_name = Some(name);
                        self.fail_policy(session, FailureCode::SettlementSlaViolation, "settlement SLA breached while pending");
                        return Ok(());
                    }
                    (name, Some(handle_id), Some(result), None)
                }
                Err(failure) => {
                    self.receipt_store.release(&session.intent_id);
                    self.fail_policy(session, failure.code, &failure.reason);
                    return Ok(());
                }
            }
        };

        // Legacy seller bond lock, always against the primary ledger.
        if let Err(e) = self.primary().provider.lock(&session.seller_id, msg.seller_bond, opts.chain, opts.asset.as_deref()).await {
            self.receipt_store.release(&session.intent_id);
            if let Some(hid) = &handle_id {
                let _ = self.primary().provider.abort(&hid.0, Some("bond lock failed")).await;
            }
            self.fail_policy(session, FailureCode::BondInsufficient, &e.to_string());
            return Ok(());
        }

        session.handle_id = handle_id;
        session.settlement_provider_name = Some(provider_name);
        session.split_segments = segments;
        let _ = result;

        session.agreement = Some(Agreement {
            intent_id: session.intent_id.clone(),
            buyer_id: session.buyer_id.clone(),
            seller_id: session.seller_id.clone(),
            agreed_price: msg.agreed_price,
            seller_bond: msg.seller_bond,
            challenge_window_ms: self.policy.settlement().challenge_window_ms,
            delivery_deadline_ms: msg.expires_at_ms,
            status: AgreementStatus::Locked,
            commit_hash_hex: None,
            revealed_payload_b64: None,
            revealed_nonce_b64: None,
        });
        session.push_round(&env, "ACCEPT", now);
        session.status = SessionStatus::Locked;
        info!(intent_id = %session.intent_id, agreed_price = %msg.agreed_price, "agreement locked");
        Ok(())
    }

    /// LOCKED -> EXCHANGING.
    pub fn commit_reveal_commit(&self, session: &mut Session, env: Envelope) -> Result<(), SessionError> {
        session.require_live()?;
        if session.status != SessionStatus::Locked {
            return Err(SessionError::WrongStatus);
        }
        if !commerce_crypto::verify(&env) {
            session.terminate(SessionStatus::Failed, TerminalOutcome::FailedIdentity);
            return Err(SessionError::BadSignature);
        }
        let msg: CommitMsg = match &env.message {
            Message::Commit(m) => m.clone(),
            _ => return Err(SessionError::UnexpectedMessageType),
        };
        session.require_intent_match(&msg.intent_id)?;

        let now = self.now();
        let deadline = session.agreement.as_ref().map(|a| a.delivery_deadline_ms).unwrap_or(i64::MAX);
        if now > deadline {
            self.fail_policy(session, FailureCode::FailedNegotiationTimeout, "commit arrived past delivery deadline");
            return Ok(());
        }

        if let Some(agreement) = session.agreement.as_mut() {
            agreement.commit_hash_hex = Some(msg.commit_hash_hex.clone());
        }
        session.push_round(&env, "COMMIT", now);
        session.status = SessionStatus::Exchanging;
        Ok(())
    }

    /// EXCHANGING -> ACCEPTED (success) or FAILED (hash mismatch / deadline miss, seller slashed).
    pub async fn commit_reveal_reveal(&self, session: &mut Session, env: Envelope) -> Result<(), SessionError> {
        session.require_live()?;
        if session.status != SessionStatus::Exchanging {
            return Err(SessionError::WrongStatus);
        }
        if !commerce_crypto::verify(&env) {
            session.terminate(SessionStatus::Failed, TerminalOutcome::FailedIdentity);
            return Err(SessionError::BadSignature);
        }
        let msg: RevealMsg = match &env.message {
            Message::Reveal(m) => m.clone(),
            _ => return Err(SessionError::UnexpectedMessageType),
        };
        session.require_intent_match(&msg.intent_id)?;

        let now = self.now();
        let agreement = session
            .agreement
            .as_ref()
            .expect("EXCHANGING implies an agreement was created at ACCEPT")
            .clone();
        let commit_hash = agreement.commit_hash_hex.clone().unwrap_or_default();

        let past_deadline = now > agreement.delivery_deadline_ms;
        let hash_ok = commerce_crypto::verify_reveal(&commit_hash, &msg.payload_b64, &msg.nonce_b64);

        if past_deadline || !hash_ok {
            let reason = if past_deadline { "delivery deadline missed" } else { "commit/reveal hash mismatch" };
            self.slash_seller(session, reason).await;
            return Ok(());
        }

        self.primary()
            .provider
            .release(&session.seller_id, agreement.seller_bond, None, None)
            .await
            .ok();

        if let Some(a) = session.agreement.as_mut() {
            a.revealed_payload_b64 = Some(msg.payload_b64.clone());
            a.revealed_nonce_b64 = Some(msg.nonce_b64.clone());
            a.status = AgreementStatus::Completed;
        }
        session.push_round(&env, "REVEAL", now);

        let latency_ms = now - session.start_ms;
        let receipt = Receipt {
            receipt_id: ReceiptId::from(format!("rcpt-{}", session.intent_id)),
            intent_id: session.intent_id.clone(),
            buyer_id: session.buyer_id.clone(),
            seller_id: session.seller_id.clone(),
            agreed_price: agreement.agreed_price,
            paid_amount: agreement.agreed_price,
            fulfilled: true,
            timestamp_ms: now,
            latency_ms: Some(latency_ms),
            failure_code: None,
            handle_id: session.handle_id.clone(),
        };
        self.receipt_store.commit(&session.intent_id);
        session.receipt = Some(receipt);
        session.status = SessionStatus::Accepted;
        session.outcome = Some(TerminalOutcome::Accepted);
        info!(intent_id = %session.intent_id, "exchange accepted, receipt issued");
        Ok(())
    }

    /// Seller slash: abort the escrow handle if it's still abortable,
    /// otherwise reverse the already-committed transfer; slash the
    /// seller bond to the buyer; emit an unfulfilled receipt.
    async fn slash_seller(&self, session: &mut Session, reason: &str) {
        let agreement = session.agreement.clone().expect("slash only reachable with an agreement");

        let mut reversed = false;
        if let Some(handle_id) = &session.handle_id {
            if self.primary().provider.abort(&handle_id.0, Some(reason)).await.is_err() {
                // Already committed: undo the transfer explicitly.
                if self
                    .primary()
                    .provider
                    .pay(&session.seller_id, &session.buyer_id, agreement.agreed_price, None, None)
                    .await
                    .is_ok()
                {
                    reversed = true;
                }
            }
        }
        let _ = reversed;

        self.primary()
            .provider
            .slash_bond(&session.seller_id, agreement.seller_bond, &session.buyer_id, None, None)
            .await
            .ok();

        if let Some(a) = session.agreement.as_mut() {
            a.status = AgreementStatus::Slashed;
        }

        let now = self.now();
        let receipt = Receipt {
            receipt_id: ReceiptId::from(format!("rcpt-{}", session.intent_id)),
            intent_id: session.intent_id.clone(),
            buyer_id: session.buyer_id.clone(),
            seller_id: session.seller_id.clone(),
            agreed_price: agreement.agreed_price,
            paid_amount: 0,
            fulfilled: false,
            timestamp_ms: now,
            latency_ms: Some(now - session.start_ms),
            failure_code: Some(FailureCode::FailedProof),
            handle_id: session.handle_id.clone(),
        };
        self.receipt_store.release(&session.intent_id);
        session.receipt = Some(receipt);
        session.terminate(SessionStatus::Failed, TerminalOutcome::FailedProof);
        warn!(intent_id = %session.intent_id, reason, "seller slashed");
    }

    /// Idempotent: observes the clock and promotes the session to
    /// `TIMEOUT` or a seller slash if a deadline has passed. A no-op on
    /// a terminal session.
    pub async fn tick(&self, session: &mut Session, now_ms: Timestamp) {
        if session.status.is_terminal() {
            return;
        }
        if let (SessionStatus::Locked | SessionStatus::Exchanging, Some(agreement)) =
            (session.status, session.agreement.clone())
        {
            if now_ms > agreement.delivery_deadline_ms {
                self.slash_seller(session, "delivery deadline missed (tick)").await;
                return;
            }
        }
        let intent_expired = session
            .intent
            .as_ref()
            .map(|i| now_ms > i.expires_at_ms)
            .unwrap_or(false);
        let duration_exceeded = now_ms - session.start_ms > self.policy.negotiation().max_total_duration_ms;
        let rounds_exceeded = session.round > self.policy.negotiation().max_rounds;
        if intent_expired || duration_exceeded || rounds_exceeded {
            if session.agreement.is_none() {
                self.receipt_store.release(&session.intent_id);
            }
            session.terminate(SessionStatus::Timeout, TerminalOutcome::FailedNegotiationTimeout);
        }
    }
}

/// Partition helper exposed for callers constructing bespoke split
/// scenarios outside `accept`'s default even split.
pub fn even_split(total: Amount, n: usize) -> Vec<Amount> {
    partition_amount(total, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_core::message::{AcceptMsg, CommitMsg, IntentMsg, QuoteMsg, RevealMsg};
    use commerce_crypto::KeyPair;
    use commerce_policy::{IntentContext, PolicySpec};
    use commerce_settlement::MockSettlementProvider;

    fn policy() -> Arc<CompiledPolicy> {
        Arc::new(CompiledPolicy::compile(PolicySpec::sample()).unwrap())
    }

    fn envelope(keypair: &KeyPair, message: Message) -> Envelope {
        commerce_crypto::sign(message, keypair).unwrap()
    }

    fn driver(policy: Arc<CompiledPolicy>, balance: Amount) -> (SessionDriver, AgentId, AgentId, Arc<ManualClock>) {
        let buyer = AgentId::from("buyer-1");
        let seller = AgentId::from("seller-1");
        let provider = MockSettlementProvider::new();
        provider.seed_balance(&buyer, None, None, balance);
        provider.seed_balance(&seller, None, None, 0);
        let clock = Arc::new(ManualClock::new(1_000));
        let candidate = ProviderCandidate {
            name: "mock".to_string(),
            provider: Arc::new(provider),
        };
        let d = SessionDriver::new(policy, vec![candidate], Arc::new(ReceiptStore::new()), clock.clone());
        (d, buyer, seller, clock)
    }

    #[tokio::test]
    async fn happy_path_hash_reveal_reaches_accepted_with_receipt() {
        let policy = policy();
        let (driver, buyer, seller, clock) = driver(policy.clone(), 10_000);
        let buyer_key = KeyPair::generate();
        let seller_key = KeyPair::generate();
        let intent_id = IntentId::from("intent-1");
        let mut session = Session::new(intent_id.clone(), buyer.clone(), seller.clone(), clock.now_ms());

        let intent_msg = IntentMsg {
            intent_id: intent_id.clone(),
            max_price: 1_000,
            asset: "USDC".to_string(),
            chain: Chain::default(),
            urgent: false,
            sent_at_ms: clock.now_ms(),
            expires_at_ms: clock.now_ms() + 60_000,
        };
        let intent_ctx = IntentContext {
            now_ms: clock.now_ms(),
            intent_expires_at_ms: intent_msg.expires_at_ms,
            has_bond: true,
            has_credential: true,
            has_sponsor: true,
            concurrent_sessions: 0,
            requests_this_minute: 0,
        };
        driver.open(&mut session, envelope(&buyer_key, Message::Intent(intent_msg)), intent_ctx).unwrap();
        assert_eq!(session.status, SessionStatus::IntentOpen);

        let ask = QuoteMsg {
            intent_id: intent_id.clone(),
            price: 900,
            valid_for_ms: 30_000,
            sent_at_ms: clock.now_ms(),
            expires_at_ms: clock.now_ms() + 30_000,
            prev_hash_hex: None,
        };
        driver
            .quote(&mut session, envelope(&seller_key, Message::Ask(ask)), false, None, None)
            .unwrap();
        assert_eq!(session.status, SessionStatus::Negotiating);

        let accept = AcceptMsg {
            intent_id: intent_id.clone(),
            agreed_price: 900,
            seller_bond: 50,
            sent_at_ms: clock.now_ms(),
            expires_at_ms: clock.now_ms() + 60_000,
        };
        driver
            .accept(&mut session, envelope(&buyer_key, Message::Accept(accept)), AcceptOptions::default())
            .await
            .unwrap();
        assert_eq!(session.status, SessionStatus::Locked);
        assert!(session.agreement.is_some());

        let commit_hash = commerce_crypto::compute_commit_hash("cGF5bG9hZA==", "bm9uY2U=");
        let commit = CommitMsg {
            intent_id: intent_id.clone(),
            commit_hash_hex: commit_hash,
            sent_at_ms: clock.now_ms(),
            expires_at_ms: clock.now_ms() + 60_000,
        };
        driver.commit_reveal_commit(&mut session, envelope(&seller_key, Message::Commit(commit))).unwrap();
        assert_eq!(session.status, SessionStatus::Exchanging);

        let reveal = RevealMsg {
            intent_id: intent_id.clone(),
            payload_b64: "cGF5bG9hZA==".to_string(),
            nonce_b64: "bm9uY2U=".to_string(),
            sent_at_ms: clock.now_ms(),
            expires_at_ms: clock.now_ms() + 60_000,
        };
        driver
            .commit_reveal_reveal(&mut session, envelope(&seller_key, Message::Reveal(reveal)))
            .await
            .unwrap();

        assert_eq!(session.status, SessionStatus::Accepted);
        let receipt = session.receipt.expect("receipt issued on success");
        assert!(receipt.fulfilled);
        assert_eq!(receipt.paid_amount, 900);
        assert!(driver.receipt_store.is_committed(&intent_id));
    }

    #[tokio::test]
    async fn reveal_hash_mismatch_slashes_seller_and_terminates_failed() {
        let policy = policy();
        let (driver, buyer, seller, clock) = driver(policy.clone(), 10_000);
        let buyer_key = KeyPair::generate();
        let seller_key = KeyPair::generate();
        let intent_id = IntentId::from("intent-2");
        let mut session = Session::new(intent_id.clone(), buyer.clone(), seller.clone(), clock.now_ms());

        let intent_msg = IntentMsg {
            intent_id: intent_id.clone(),
            max_price: 1_000,
            asset: "USDC".to_string(),
            chain: Chain::default(),
            urgent: false,
            sent_at_ms: clock.now_ms(),
            expires_at_ms: clock.now_ms() + 60_000,
        };
        let intent_ctx = IntentContext {
            now_ms: clock.now_ms(),
            intent_expires_at_ms: intent_msg.expires_at_ms,
            has_bond: true,
            has_credential: true,
            has_sponsor: true,
            concurrent_sessions: 0,
            requests_this_minute: 0,
        };
        driver.open(&mut session, envelope(&buyer_key, Message::Intent(intent_msg)), intent_ctx).unwrap();

        let ask = QuoteMsg {
            intent_id: intent_id.clone(),
            price: 900,
            valid_for_ms: 30_000,
            sent_at_ms: clock.now_ms(),
            expires_at_ms: clock.now_ms() + 30_000,
            prev_hash_hex: None,
        };
        driver.quote(&mut session, envelope(&seller_key, Message::Ask(ask)), false, None, None).unwrap();

        let accept = AcceptMsg {
            intent_id: intent_id.clone(),
            agreed_price: 900,
            seller_bond: 50,
            sent_at_ms: clock.now_ms(),
            expires_at_ms: clock.now_ms() + 60_000,
        };
        driver
            .accept(&mut session, envelope(&buyer_key, Message::Accept(accept)), AcceptOptions::default())
            .await
            .unwrap();

        let commit_hash = commerce_crypto::compute_commit_hash("cGF5bG9hZA==", "bm9uY2U=");
        let commit = CommitMsg {
            intent_id: intent_id.clone(),
            commit_hash_hex: commit_hash,
            sent_at_ms: clock.now_ms(),
            expires_at_ms: clock.now_ms() + 60_000,
        };
        driver.commit_reveal_commit(&mut session, envelope(&seller_key, Message::Commit(commit))).unwrap();

        let bad_reveal = RevealMsg {
            intent_id: intent_id.clone(),
            payload_b64: "d3JvbmctcGF5bG9hZA==".to_string(),
            nonce_b64: "bm9uY2U=".to_string(),
            sent_at_ms: clock.now_ms(),
            expires_at_ms: clock.now_ms() + 60_000,
        };
        driver
            .commit_reveal_reveal(&mut session, envelope(&seller_key, Message::Reveal(bad_reveal)))
            .await
            .unwrap();

        assert_eq!(session.status, SessionStatus::Failed);
        let receipt = session.receipt.expect("unfulfilled receipt issued on slash");
        assert!(!receipt.fulfilled);
        assert_eq!(receipt.paid_amount, 0);
        assert!(!driver.receipt_store.is_committed(&intent_id));
    }

    #[test]
    fn tick_times_out_a_session_stuck_in_negotiating() {
        let policy = policy();
        let (driver, buyer, seller, clock) = driver(policy.clone(), 10_000);
        let intent_id = IntentId::from("intent-3");
        let mut session = Session::new(intent_id.clone(), buyer, seller, clock.now_ms());
        session.status = SessionStatus::Negotiating;
        session.round = policy.negotiation().max_rounds + 1;

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(driver.tick(&mut session, clock.now_ms()));
        assert_eq!(session.status, SessionStatus::Timeout);
    }
}
