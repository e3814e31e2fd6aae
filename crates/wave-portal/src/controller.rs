use std::sync::Arc;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    config::WavePortalConfig,
    contract::ContractBinder,
    error::WaveError,
    gateway::{ContractGateway, GatewayLimits, Subscription},
    ledger::{SharedLedger, WaveLedger},
    provider::WalletProvider,
    tracker::TransactionTracker,
    types::{Account, SessionState, TransactionHandle, TxState, WaveRecord},
    wallet::WalletSession,
};

/// Something the user asked the renderer to do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message", rename_all = "camelCase")]
pub enum UserIntent {
    ConnectRequested,
    SubmitRequested(String),
    RefreshRequested,
    DisconnectRequested,
}

/// Point-in-time view of the session, for rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub waves: Vec<WaveRecord>,
    pub pending: Option<TransactionHandle>,
    pub last_error: Option<String>,
}

/// Drives a wave session: wallet connection, history loading, the live feed and submissions.
///
/// All mutation goes through `&mut self`; the only state touched from elsewhere is the ledger,
/// which the live subscription appends to.
#[derive(Debug)]
pub struct SessionController {
    wallet: WalletSession,
    binder: Arc<dyn ContractBinder>,
    limits: GatewayLimits,
    gateway: Option<ContractGateway>,
    ledger: SharedLedger,
    subscription: Option<Subscription>,
    tracker: TransactionTracker,
    total_wave_count: Option<u64>,
    last_error: Option<WaveError>,
    revision: Arc<watch::Sender<u64>>,
}

impl SessionController {
    pub fn new(wallet: WalletSession, binder: Arc<dyn ContractBinder>, limits: GatewayLimits) -> Self {
        Self {
            wallet,
            binder,
            limits,
            gateway: None,
            ledger: WaveLedger::shared(),
            subscription: None,
            tracker: TransactionTracker::new(),
            total_wave_count: None,
            last_error: None,
            revision: Arc::new(watch::Sender::new(0)),
        }
    }

    pub fn from_config(
        provider: Arc<dyn WalletProvider>,
        binder: Arc<dyn ContractBinder>,
        config: &WavePortalConfig,
    ) -> Self {
        let wallet = WalletSession::new(provider)
            .with_request_timeout(config.request_timeout())
            .with_prompt_timeout(config.prompt_timeout());
        Self::new(wallet, binder, GatewayLimits::from(config))
    }

    /// Picks up a wallet the user authorized in an earlier visit, without prompting.
    pub async fn startup(&mut self) {
        if let Some(account) = self.wallet.check_existing_authorization().await {
            self.attach(account).await;
        }
        self.bump();
    }

    /// Prompts the user to connect, then loads history and starts the live feed.
    ///
    /// Connecting again with the same account keeps the binding and only reloads what failed to
    /// load before.
    pub async fn connect(&mut self) -> Result<Account, WaveError> {
        self.last_error = None;
        match self.wallet.request_connection().await {
            Ok(account) => {
                match self.gateway.clone() {
                    Some(gateway) if gateway.account() == account => {
                        if self.is_incomplete() {
                            let _ = self.load(&gateway).await;
                        }
                    }
                    _ => self.attach(account).await,
                }
                self.bump();
                Ok(account)
            }
            Err(err) => Err(self.record(err)),
        }
    }

    /// Reloads history and the wave count, and restarts the live feed if it is down.
    pub async fn reload(&mut self) -> Result<(), WaveError> {
        let Some(gateway) = self.gateway.clone() else {
            return Err(self.record(WaveError::NotConnected));
        };
        self.last_error = None;
        let result = self.load(&gateway).await;
        self.bump();
        result
    }

    /// Releases the live feed and the contract binding and forgets the account.
    pub fn disconnect(&mut self) {
        self.detach();
        self.tracker.abandon();
        self.wallet.disconnect();
        self.total_wave_count = None;
        info!("disconnected");
        self.bump();
    }

    /// Reacts to the wallet switching or revoking accounts.
    pub async fn accounts_changed(&mut self, accounts: &[Address]) {
        let previous = self.wallet.account();
        match self.wallet.accounts_changed(accounts) {
            None => self.disconnect(),
            Some(account) if Some(account) != previous || self.gateway.is_none() => {
                self.tracker.abandon();
                self.attach(account).await;
                self.bump();
            }
            Some(_) => {}
        }
    }

    /// Sends a wave and follows it until it is mined.
    ///
    /// On confirmation the wave is appended to the ledger straight from the transaction's own
    /// receipt, so the sender sees it even if the live feed is slow or down.
    pub async fn submit_wave(&mut self, message: &str) -> Result<TransactionHandle, WaveError> {
        self.last_error = None;
        let Some(gateway) = self.gateway.clone() else {
            return Err(self.record(WaveError::NotConnected));
        };

        let snapshot = self.refresh_count(&gateway).await;
        self.tracker.begin(snapshot);

        let handle = match gateway.submit_wave(message).await {
            Ok(handle) => handle,
            Err(err) => {
                self.tracker.abandon();
                return Err(self.record(err));
            }
        };
        self.tracker.track(handle);
        if let Err(err) = self.tracker.mining() {
            return Err(self.record(err));
        }
        self.bump();

        self.confirm_pending(&gateway).await
    }

    /// Waits again for a transaction whose confirmation previously timed out.
    ///
    /// Returns `Ok(None)` if nothing is pending.
    pub async fn await_pending(&mut self) -> Result<Option<TransactionHandle>, WaveError> {
        let Some(gateway) = self.gateway.clone() else {
            return Err(self.record(WaveError::NotConnected));
        };
        if self.tracker.pending().is_none() {
            return Ok(None);
        }
        self.last_error = None;
        self.confirm_pending(&gateway).await.map(Some)
    }

    /// Applies a renderer intent. Failures end up in [`last_error`](Self::last_error).
    pub async fn handle_intent(&mut self, intent: UserIntent) {
        debug!(?intent, "handling user intent");
        match intent {
            UserIntent::ConnectRequested => {
                let _ = self.connect().await;
            }
            UserIntent::SubmitRequested(message) => {
                let _ = self.submit_wave(&message).await;
            }
            UserIntent::RefreshRequested => {
                let _ = self.reload().await;
            }
            UserIntent::DisconnectRequested => self.disconnect(),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            account: self.wallet.account(),
            connection_phase: self.wallet.phase(),
            total_wave_count: self.total_wave_count,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            waves: self.ledger.read().all().to_vec(),
            pending: self.tracker.pending().cloned(),
            last_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }

    /// The ledger of the current connection. A new connection gets a new ledger.
    pub fn ledger(&self) -> SharedLedger {
        Arc::clone(&self.ledger)
    }

    /// Ticks whenever the session or its ledger changes.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn last_error(&self) -> Option<&WaveError> {
        self.last_error.as_ref()
    }

    pub fn tracker(&self) -> &TransactionTracker {
        &self.tracker
    }

    pub fn gateway(&self) -> Option<&ContractGateway> {
        self.gateway.as_ref()
    }

    /// Whether live events are currently being delivered.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    /// Binds a fresh gateway and ledger to `account`, then loads everything the session shows.
    async fn attach(&mut self, account: Account) {
        self.detach();

        let gateway =
            ContractGateway::new(self.binder.bind(account.address()), account, self.limits);
        self.ledger = WaveLedger::shared();
        self.total_wave_count = None;
        self.gateway = Some(gateway.clone());

        let _ = self.load(&gateway).await;
    }

    /// Subscribes to live events unless already subscribed, then seeds the ledger with history
    /// and reads the wave count.
    ///
    /// A failed subscription is recorded but does not stop history from loading.
    async fn load(&mut self, gateway: &ContractGateway) -> Result<(), WaveError> {
        // subscribe first: anything emitted while history loads must not be lost
        if !self.is_subscribed() {
            let on_wave = {
                let ledger = Arc::clone(&self.ledger);
                let revision = Arc::clone(&self.revision);
                move |wave: WaveRecord| {
                    if ledger.write().append(wave) {
                        revision.send_modify(|rev| *rev += 1);
                    }
                }
            };
            match gateway.subscribe_to_new_waves(on_wave).await {
                Ok(subscription) => self.subscription = Some(subscription),
                Err(err) => {
                    self.record(err);
                }
            }
        }

        match gateway.fetch_history().await {
            Ok(history) => self.ledger.write().seed(history),
            Err(err) => return Err(self.record(err)),
        }

        self.read_count(gateway).await.map(drop)
    }

    /// Whether history, the wave count or the live feed failed to load.
    fn is_incomplete(&self) -> bool {
        !self.ledger.read().is_seeded() || self.total_wave_count.is_none() || !self.is_subscribed()
    }

    fn detach(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.gateway = None;
    }

    async fn confirm_pending(
        &mut self,
        gateway: &ContractGateway,
    ) -> Result<TransactionHandle, WaveError> {
        let Some(handle) = self.tracker.pending().cloned() else {
            return Err(self.record(WaveError::NotConnected));
        };

        match gateway.await_confirmation(handle).await {
            Ok(handle) if handle.state() == TxState::Confirmed => {
                let count = self.refresh_count(gateway).await;
                match handle.related_wave() {
                    Some(wave) => {
                        self.ledger.write().append(wave.clone());
                    }
                    // without a record of its own the wave arrives through the live feed, or
                    // through history when the feed is down
                    None if !self.is_subscribed() => {
                        let _ = self.load(gateway).await;
                    }
                    None => {}
                }
                let handle = self.tracker.settle(handle, count);
                self.bump();
                Ok(handle)
            }
            Ok(handle) => {
                let handle = self.tracker.settle(handle, None);
                Err(self.record(WaveError::SubmissionFailed(format!(
                    "transaction {} reverted",
                    handle.id()
                ))))
            }
            // the transaction may still land; keep it tracked as pending
            Err(err @ WaveError::ConfirmationTimeout { .. }) => Err(self.record(err)),
            Err(err) => {
                self.tracker.fail(&err.to_string());
                Err(self.record(err))
            }
        }
    }

    async fn refresh_count(&mut self, gateway: &ContractGateway) -> Option<u64> {
        self.read_count(gateway).await.ok()
    }

    async fn read_count(&mut self, gateway: &ContractGateway) -> Result<u64, WaveError> {
        match gateway.get_total_count().await {
            Ok(count) => {
                info!(count, "retrieved total wave count");
                self.total_wave_count = Some(count);
                Ok(count)
            }
            Err(err) => Err(self.record(err)),
        }
    }

    fn record(&mut self, err: WaveError) -> WaveError {
        warn!(%err, "wave session error");
        self.last_error = Some(err.clone());
        self.bump();
        err
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}
