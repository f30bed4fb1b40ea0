// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hand-written doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use relational_wallet_connect::connections::{ConnectedWallet, SessionRegistry, Token};
use relational_wallet_connect::context::RequestContext;
use relational_wallet_connect::interaction::{
    ErrorType, FailedTransaction, InteractionError, Interactor, LogType, ReviewKind,
    ReviewRequest, SelectedWallet, SuccessfulTransaction, Workflow,
};
use relational_wallet_connect::node::{
    LastBlock, Node, NodeError, NodeSelector, PowBlockState, PowStatistics, ReportingHook,
    SendingMode, SpamStatistic, SpamStatistics,
};
use relational_wallet_connect::pipeline::{RequestController, TransactionAuthorizationPipeline};
use relational_wallet_connect::spam::{ProofOfWorkSolution, SpamError, SpamGuard, SpamPolicy};
use relational_wallet_connect::state::AppState;
use relational_wallet_connect::transaction::{Command, Transaction};
use relational_wallet_connect::wallet::{
    InMemoryTokenStore, InMemoryWalletStore, Permissions, WalletStore,
};

pub const HOST: &str = "app.example.com";
pub const WALLET: &str = "main";
pub const PASSPHRASE: &str = "correct horse";
pub const CHAIN_ID: &str = "test-chain";
pub const MAX_TTL: u64 = 10;

/// What the front-end saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SessionBegan(Workflow),
    SessionEnded,
    RequestSucceeded(u8, String),
    TransactionSucceeded(String),
    TransactionFailed(String),
    Error(ErrorType, String),
    Log(LogType, String),
    WalletConnectionReview(String),
    WalletSelection(Vec<String>),
    Passphrase(String),
    PermissionsReview(String, String),
    TransactionReview(ReviewKind),
}

/// Interactor answering from a script and recording everything it is sent.
pub struct RecordingInteractor {
    events: Mutex<Vec<Event>>,
    review: Mutex<Result<bool, InteractionError>>,
    selections: Mutex<VecDeque<SelectedWallet>>,
    passphrases: Mutex<VecDeque<String>>,
}

impl RecordingInteractor {
    /// Approves every review.
    pub fn approving() -> Self {
        Self::answering(Ok(true))
    }

    pub fn rejecting() -> Self {
        Self::answering(Ok(false))
    }

    pub fn answering(review: Result<bool, InteractionError>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            review: Mutex::new(review),
            selections: Mutex::new(VecDeque::new()),
            passphrases: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_selection(self, wallet: &str, passphrase: &str) -> Self {
        self.selections.lock().unwrap().push_back(SelectedWallet {
            wallet: wallet.to_string(),
            passphrase: passphrase.to_string(),
        });
        self
    }

    pub fn with_passphrase(self, passphrase: &str) -> Self {
        self.passphrases
            .lock()
            .unwrap()
            .push_back(passphrase.to_string());
        self
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn review_answer(&self) -> Result<bool, InteractionError> {
        self.review.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    pub fn sessions_ended(&self) -> usize {
        self.count(|e| *e == Event::SessionEnded)
    }
}

#[async_trait]
impl Interactor for RecordingInteractor {
    async fn notify_interaction_session_began(
        &self,
        _ctx: &RequestContext,
        workflow: Workflow,
        _total_steps: u8,
    ) -> Result<(), InteractionError> {
        self.record(Event::SessionBegan(workflow));
        Ok(())
    }

    fn notify_interaction_session_ended(&self, _trace_id: &str) {
        self.record(Event::SessionEnded);
    }

    fn notify_successful_request(&self, _trace_id: &str, step: u8, message: &str) {
        self.record(Event::RequestSucceeded(step, message.to_string()));
    }

    fn notify_successful_transaction(
        &self,
        _trace_id: &str,
        _step: u8,
        transaction: SuccessfulTransaction,
    ) {
        self.record(Event::TransactionSucceeded(transaction.tx_hash));
    }

    fn notify_failed_transaction(&self, _trace_id: &str, _step: u8, transaction: FailedTransaction) {
        self.record(Event::TransactionFailed(transaction.error));
    }

    fn notify_error(&self, _trace_id: &str, error_type: ErrorType, error: &str) {
        self.record(Event::Error(error_type, error.to_string()));
    }

    fn log(&self, _trace_id: &str, log_type: LogType, message: &str) {
        self.record(Event::Log(log_type, message.to_string()));
    }

    async fn request_wallet_connection_review(
        &self,
        _ctx: &RequestContext,
        _step: u8,
        hostname: &str,
    ) -> Result<bool, InteractionError> {
        self.record(Event::WalletConnectionReview(hostname.to_string()));
        self.review_answer()
    }

    async fn request_wallet_selection(
        &self,
        _ctx: &RequestContext,
        _step: u8,
        _hostname: &str,
        available_wallets: &[String],
    ) -> Result<SelectedWallet, InteractionError> {
        self.record(Event::WalletSelection(available_wallets.to_vec()));
        self.selections
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(InteractionError::UserClosedConnection)
    }

    async fn request_passphrase(
        &self,
        _ctx: &RequestContext,
        _step: u8,
        wallet: &str,
        _reason: &str,
    ) -> Result<String, InteractionError> {
        self.record(Event::Passphrase(wallet.to_string()));
        self.passphrases
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(InteractionError::UserClosedConnection)
    }

    async fn request_permissions_review(
        &self,
        _ctx: &RequestContext,
        _step: u8,
        hostname: &str,
        wallet: &str,
        _permissions: &BTreeMap<String, String>,
    ) -> Result<bool, InteractionError> {
        self.record(Event::PermissionsReview(
            hostname.to_string(),
            wallet.to_string(),
        ));
        self.review_answer()
    }

    async fn request_transaction_review(
        &self,
        _ctx: &RequestContext,
        review: &ReviewRequest,
    ) -> Result<bool, InteractionError> {
        self.record(Event::TransactionReview(review.kind));
        self.review_answer()
    }
}

/// Spam statistics with room left in every quota and a cheap proof-of-work.
pub fn spam_statistics() -> SpamStatistics {
    SpamStatistics {
        chain_id: CHAIN_ID.to_string(),
        last_block_height: 100,
        max_ttl: MAX_TTL,
        transfers: Some(SpamStatistic {
            count_for_epoch: 0,
            max_for_epoch: 10,
            banned_until: None,
        }),
        pow: PowStatistics {
            block_states: vec![PowBlockState {
                block_height: 100,
                block_hash: "ABCDEF0123".to_string(),
                transactions_seen: 0,
                expected_difficulty: None,
                hash_function: "sha256".to_string(),
                difficulty: 2,
                tx_per_block: 10,
                increasing_difficulty: false,
            }],
            banned_until: None,
            past_blocks: 1,
        },
        ..SpamStatistics::default()
    }
}

/// Node answering from a script and recording the calls it receives.
pub struct ScriptedNode {
    host: String,
    pub stats: Mutex<SpamStatistics>,
    pub check_result: Mutex<Result<(), NodeError>>,
    pub send_result: Mutex<Result<String, NodeError>>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedNode {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            stats: Mutex::new(spam_statistics()),
            check_result: Mutex::new(Ok(())),
            send_result: Mutex::new(Ok("TXHASH".to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Node for ScriptedNode {
    fn host(&self) -> &str {
        &self.host
    }

    async fn last_block(&self) -> Result<LastBlock, NodeError> {
        self.record("last_block");
        let stats = self.stats.lock().unwrap().clone();
        Ok(LastBlock {
            chain_id: stats.chain_id,
            block_height: stats.last_block_height,
        })
    }

    async fn spam_statistics(&self, _public_key: &str) -> Result<SpamStatistics, NodeError> {
        self.record("spam_statistics");
        Ok(self.stats.lock().unwrap().clone())
    }

    async fn check_transaction(&self, _tx: &Transaction) -> Result<(), NodeError> {
        self.record("check_transaction");
        self.check_result.lock().unwrap().clone()
    }

    async fn send_transaction(
        &self,
        _tx: &Transaction,
        _mode: SendingMode,
    ) -> Result<String, NodeError> {
        self.record("send_transaction");
        self.send_result.lock().unwrap().clone()
    }
}

/// Selector handing out one scripted node, or none at all.
pub struct ScriptedSelector {
    node: Option<Arc<ScriptedNode>>,
    selections: AtomicUsize,
}

impl ScriptedSelector {
    pub fn selections(&self) -> usize {
        self.selections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeSelector for ScriptedSelector {
    async fn node(
        &self,
        _ctx: &RequestContext,
        report: ReportingHook<'_>,
    ) -> Result<Arc<dyn Node>, NodeError> {
        self.selections.fetch_add(1, Ordering::SeqCst);
        match &self.node {
            Some(node) => {
                report(LogType::Success, format!("Using node {}", node.host()));
                Ok(node.clone())
            }
            None => {
                report(LogType::Error, "No healthy node available".to_string());
                Err(NodeError::NoHealthyNode)
            }
        }
    }
}

/// [`SpamPolicy`] that counts how often it is consulted.
#[derive(Default)]
pub struct CountingSpamGuard {
    policy: SpamPolicy,
    checks: AtomicUsize,
    proofs: AtomicUsize,
}

impl CountingSpamGuard {
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn proofs(&self) -> usize {
        self.proofs.load(Ordering::SeqCst)
    }
}

impl SpamGuard for CountingSpamGuard {
    fn check_submission(&self, command: &Command, stats: &SpamStatistics) -> Result<(), SpamError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.policy.check_submission(command, stats)
    }

    fn generate_proof_of_work(
        &self,
        public_key: &str,
        stats: &SpamStatistics,
        cancellation: &CancellationToken,
    ) -> Result<ProofOfWorkSolution, SpamError> {
        self.proofs.fetch_add(1, Ordering::SeqCst);
        self.policy
            .generate_proof_of_work(public_key, stats, cancellation)
    }
}

/// Everything a pipeline test needs, wired together.
pub struct Harness {
    pub store: Arc<InMemoryWalletStore>,
    pub tokens: Arc<InMemoryTokenStore>,
    pub interactor: Arc<RecordingInteractor>,
    pub node: Arc<ScriptedNode>,
    pub selector: Arc<ScriptedSelector>,
    pub spam_guard: Arc<CountingSpamGuard>,
    pub registry: Arc<SessionRegistry>,
    pub pipeline: Arc<TransactionAuthorizationPipeline>,
}

impl Harness {
    pub fn new(interactor: RecordingInteractor) -> Self {
        Self::build(interactor, true)
    }

    /// A harness whose selector never finds a healthy node.
    pub fn without_node(interactor: RecordingInteractor) -> Self {
        Self::build(interactor, false)
    }

    fn build(interactor: RecordingInteractor, with_node: bool) -> Self {
        let store = Arc::new(InMemoryWalletStore::new());
        let tokens = Arc::new(InMemoryTokenStore::new());
        let interactor = Arc::new(interactor);
        let node = Arc::new(ScriptedNode::new("http://node-1:3007"));
        let selector = Arc::new(ScriptedSelector {
            node: with_node.then(|| node.clone()),
            selections: AtomicUsize::new(0),
        });
        let spam_guard = Arc::new(CountingSpamGuard::default());
        let registry = Arc::new(SessionRegistry::new(
            store.clone(),
            tokens.clone(),
            interactor.clone(),
            Duration::from_secs(3600),
        ));
        let pipeline = Arc::new(TransactionAuthorizationPipeline::new(
            store.clone(),
            interactor.clone(),
            selector.clone(),
            spam_guard.clone(),
            RequestController::new(1, Duration::ZERO),
            registry.clone(),
        ));
        Self {
            store,
            tokens,
            interactor,
            node,
            selector,
            spam_guard,
            registry,
            pipeline,
        }
    }

    /// Creates the test wallet, unlocked, with one key. Returns its public key.
    pub fn create_wallet(&self) -> String {
        let wallet = self.store.create_wallet(WALLET, PASSPHRASE).unwrap();
        wallet.list_key_pairs()[0].public_key().to_string()
    }

    /// Creates the test wallet, lets [`HOST`] read its keys and connects it.
    pub async fn connected(&self) -> (Token, ConnectedWallet, String) {
        let public_key = self.create_wallet();
        let mut wallet = self.store.get_wallet(WALLET).await.unwrap();
        wallet
            .update_permissions(HOST, Permissions::read_all_keys())
            .unwrap();
        self.store.update_wallet(&wallet).await.unwrap();

        let token = self.registry.connect(HOST, &wallet).unwrap();
        let connected_wallet = self.registry.get_connected_wallet(&token).unwrap();
        (token, connected_wallet, public_key)
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.pipeline.clone(),
            "testnet",
            CancellationToken::new(),
        )
    }

    /// True when nothing reached the network or the spam guard.
    pub fn untouched_downstream(&self) -> bool {
        self.selector.selections() == 0
            && self.node.calls().is_empty()
            && self.spam_guard.checks() == 0
            && self.spam_guard.proofs() == 0
    }
}
