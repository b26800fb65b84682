use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use centavo_billpay::{BillPayment, BillPaymentProcessor, Reconciler, ReconcilerHandle};
use centavo_core::{AccountId, Currency, InstrumentId, LedgerResult, OwnerId, ProviderId};
use centavo_events::{EventEnvelope, InMemoryEventBus};
use centavo_gateway::GatewaySettlementAdapter;
use centavo_infra::{
    BalancesProjection, InMemoryBillPaymentStore, InMemoryEventStore, InMemoryHoldingsStore,
    InMemoryTransferStore, InMemoryWalletDirectory, ProjectionWorker, TracingNotificationSink,
    WorkerHandle,
};
use centavo_ledger::{LedgerEntry, LedgerStore};
use centavo_trading::{Holding, Trade, TradeExecutionEngine, TradeSide};
use centavo_transfers::{Transfer, TransferProcessor};
use centavo_wallets::{AccountView, WalletAccountService};

use crate::config::AppConfig;

type Store = Arc<InMemoryEventStore>;
type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Sink = Arc<TracingNotificationSink>;
type Directory = Arc<InMemoryWalletDirectory>;
type Holdings = Arc<InMemoryHoldingsStore>;
type Transfers = Arc<InMemoryTransferStore>;
type Payments = Arc<InMemoryBillPaymentStore>;

/// The wired service graph. All services share one event store and one
/// bus; the ledger inside each is the same single write path.
pub struct AppServices<G> {
    config: AppConfig,
    wallets: WalletAccountService<Store, Bus, Directory>,
    trading: TradeExecutionEngine<Store, Bus, Holdings, Sink>,
    transfers: TransferProcessor<Store, Bus, Transfers, Sink>,
    billpay: Arc<BillPaymentProcessor<Store, Bus, Payments, Arc<G>, Sink>>,
    payments: Payments,
    balances_projection: Arc<BalancesProjection>,
    projection_worker: Option<WorkerHandle>,
}

impl<G> AppServices<G>
where
    G: GatewaySettlementAdapter + Send + Sync + 'static,
{
    pub fn new(config: AppConfig, gateway: Arc<G>) -> Self {
        let store: Store = Arc::new(InMemoryEventStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let sink: Sink = Arc::new(TracingNotificationSink::new());

        let ledger = |store: &Store, bus: &Bus| {
            LedgerStore::new(store.clone(), bus.clone(), config.retry.clone())
        };

        let balances_projection = Arc::new(BalancesProjection::new());
        let worker_projection = balances_projection.clone();
        let projection_worker = ProjectionWorker::spawn("balances", bus.clone(), move |env| {
            worker_projection.apply_envelope(&env)
        });

        let payments: Payments = Arc::new(InMemoryBillPaymentStore::new());

        Self {
            wallets: WalletAccountService::new(
                ledger(&store, &bus),
                Arc::new(InMemoryWalletDirectory::new()),
            ),
            trading: TradeExecutionEngine::new(
                ledger(&store, &bus),
                Arc::new(InMemoryHoldingsStore::new()),
                sink.clone(),
            ),
            transfers: TransferProcessor::new(
                ledger(&store, &bus),
                Arc::new(InMemoryTransferStore::new()),
                sink.clone(),
                config.fees.clone(),
                config.limits.clone(),
            ),
            billpay: Arc::new(BillPaymentProcessor::new(
                ledger(&store, &bus),
                payments.clone(),
                gateway,
                sink,
                config.fees.clone(),
                config.limits.clone(),
                config.gateway.clone(),
            )),
            payments,
            balances_projection,
            projection_worker: Some(projection_worker),
            config,
        }
    }

    // --- client-facing operations ---

    pub fn create_wallet(&self, owner_id: OwnerId, currency: Currency) -> LedgerResult<AccountView> {
        self.wallets.create_wallet(owner_id, currency)
    }

    pub fn deposit(
        &self,
        account_id: AccountId,
        amount: i64,
        reference: Option<&str>,
    ) -> LedgerResult<LedgerEntry> {
        self.wallets.deposit(account_id, amount, reference)
    }

    pub fn get_balance(&self, account_id: AccountId) -> LedgerResult<AccountView> {
        self.wallets.wallet(account_id)
    }

    pub fn list_wallets(&self, owner_id: OwnerId) -> LedgerResult<Vec<AccountView>> {
        self.wallets.wallets_for(owner_id)
    }

    pub fn statement(&self, account_id: AccountId) -> LedgerResult<Vec<LedgerEntry>> {
        self.wallets.statement(account_id)
    }

    pub fn freeze_wallet(&self, account_id: AccountId, reason: Option<String>) -> LedgerResult<()> {
        self.wallets.freeze(account_id, reason)
    }

    pub fn unfreeze_wallet(&self, account_id: AccountId) -> LedgerResult<()> {
        self.wallets.unfreeze(account_id)
    }

    pub fn execute_trade(
        &self,
        account_id: AccountId,
        instrument_id: InstrumentId,
        side: TradeSide,
        quantity: Decimal,
        price: i64,
    ) -> LedgerResult<Trade> {
        match side {
            TradeSide::Buy => self.trading.buy(account_id, instrument_id, quantity, price),
            TradeSide::Sell => self.trading.sell(account_id, instrument_id, quantity, price),
        }
    }

    pub fn positions(&self, account_id: AccountId) -> LedgerResult<Vec<Holding>> {
        self.trading.positions(account_id)
    }

    pub fn send_money(
        &self,
        sender_account_id: AccountId,
        recipient_account_id: AccountId,
        amount: i64,
        reference: Option<&str>,
    ) -> LedgerResult<Transfer> {
        self.transfers
            .transfer(sender_account_id, recipient_account_id, amount, reference)
    }

    pub async fn pay_bill(
        &self,
        account_id: AccountId,
        provider_id: ProviderId,
        account_number: &str,
        amount: i64,
    ) -> LedgerResult<BillPayment> {
        self.billpay
            .pay_bill(account_id, provider_id, account_number, amount)
            .await
    }

    /// Entry point for the rail's signed confirmation callbacks.
    pub fn apply_gateway_webhook(&self, body: &[u8], signature: &str) -> LedgerResult<BillPayment> {
        self.billpay.apply_webhook(body, signature)
    }

    /// Start the background sweep over stuck settlements.
    pub fn spawn_reconciler(&self, interval: Duration) -> ReconcilerHandle {
        Reconciler::new(self.billpay.clone(), self.payments.clone(), interval).spawn()
    }

    pub fn balances_projection(&self) -> &BalancesProjection {
        &self.balances_projection
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Stop background workers and drop the graph.
    pub fn shutdown(mut self) {
        if let Some(worker) = self.projection_worker.take() {
            worker.shutdown();
        }
    }
}
