//! Integration tests for the full ledger/settlement pipeline.
//!
//! Command → LedgerStore → EventStore → EventBus → Projection, plus the
//! orchestrators (trades, transfers, bill payments) end to end against the
//! in-memory backends and the mock rail.

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::Value as JsonValue;

    use centavo_billpay::{
        BillPayment, BillPaymentProcessor, BillPaymentState, BillPaymentStore, Reconciler,
    };
    use centavo_core::{
        AccountId, Currency, FeePolicy, GatewayConfig, InstrumentId, LedgerError, Limits,
        NotificationKind, OwnerId, ProviderId, RetryPolicy,
    };
    use centavo_events::{EventEnvelope, InMemoryEventBus};
    use centavo_gateway::{SettlementStatus, WebhookPayload, sign_body};
    use centavo_ledger::{EntryKind, LedgerStore};
    use centavo_trading::{HoldingsStore, TradeExecutionEngine};
    use centavo_transfers::{TransferProcessor, TransferState};
    use centavo_wallets::WalletAccountService;

    use crate::event_store::InMemoryEventStore;
    use crate::gateway::{MockGateway, MockInitiate};
    use crate::notify::RecordingNotificationSink;
    use crate::projections::balances::BalancesProjection;
    use crate::projections::worker::ProjectionWorker;
    use crate::stores::{
        InMemoryBillPaymentStore, InMemoryHoldingsStore, InMemoryTransferStore,
        InMemoryWalletDirectory,
    };

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Store = Arc<InMemoryEventStore>;

    const WEBHOOK_SECRET: &str = "integration-test-secret";

    fn backends() -> (Store, Bus) {
        (
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::new()),
        )
    }

    fn ledger(store: &Store, bus: &Bus) -> LedgerStore<Store, Bus> {
        LedgerStore::new(store.clone(), bus.clone(), RetryPolicy::default())
    }

    fn funded_account(ledger: &LedgerStore<Store, Bus>, amount: i64) -> AccountId {
        let account_id = AccountId::new();
        ledger
            .open_account(account_id, OwnerId::new(), Currency::Ngn)
            .unwrap();
        if amount > 0 {
            ledger
                .post(account_id, amount, EntryKind::Deposit, "SEED-1")
                .unwrap();
        }
        account_id
    }

    fn gateway_config(call_timeout_ms: u64) -> GatewayConfig {
        GatewayConfig {
            call_timeout_ms,
            stuck_after_secs: 0,
            give_up_after_secs: 24 * 60 * 60,
            webhook_secret: WEBHOOK_SECRET.to_string(),
        }
    }

    // --- ledger ---

    #[test]
    fn balance_always_equals_sum_of_entries() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);

        ledger
            .post(account_id, -3_000, EntryKind::TransferOut, "T-1")
            .unwrap();
        ledger
            .post(account_id, 1_500, EntryKind::TransferIn, "T-2")
            .unwrap();

        let account = ledger.account(account_id).unwrap();
        let sum: i64 = account.entries().iter().map(|e| e.amount).sum();
        assert_eq!(account.balance(), sum);
        assert_eq!(account.balance(), 8_500);
    }

    #[test]
    fn reposting_a_reference_returns_the_original_entry() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 5_000);

        let first = ledger
            .post(account_id, -1_000, EntryKind::BillPayment, "B-1")
            .unwrap();
        let second = ledger
            .post(account_id, -1_000, EntryKind::BillPayment, "B-1")
            .unwrap();

        assert_eq!(first.entry_id, second.entry_id);
        assert_eq!(ledger.balance(account_id).unwrap().balance, 4_000);
        // One deposit, one debit; no second debit.
        assert_eq!(ledger.account(account_id).unwrap().entries().len(), 2);
    }

    #[test]
    fn concurrent_debits_never_overdraw() {
        let (store, bus) = backends();
        // Heavy contention needs a deeper retry budget than the default.
        let ledger = Arc::new(LedgerStore::new(
            store.clone(),
            bus.clone(),
            RetryPolicy {
                max_attempts: 500,
                backoff_ms: 1,
            },
        ));
        let account_id = funded_account(&ledger, 50);

        let mut handles = Vec::new();
        for i in 0..100 {
            let ledger = ledger.clone();
            handles.push(std::thread::spawn(move || {
                ledger.post(account_id, -1, EntryKind::TransferOut, &format!("C-{i}"))
            }));
        }

        let mut succeeded = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => succeeded += 1,
                Err(LedgerError::InsufficientFunds { .. }) => insufficient += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        // Exactly the affordable subset lands.
        assert_eq!(succeeded, 50);
        assert_eq!(insufficient, 50);
        assert_eq!(ledger.balance(account_id).unwrap().balance, 0);
    }

    #[test]
    fn version_counts_every_successful_mutation() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 1_000);

        let before = ledger.balance(account_id).unwrap().version;
        ledger
            .post(account_id, -100, EntryKind::Fee, "F-1")
            .unwrap();
        // Duplicate is a no-op and must not bump the version.
        ledger
            .post(account_id, -100, EntryKind::Fee, "F-1")
            .unwrap();
        assert_eq!(ledger.balance(account_id).unwrap().version, before + 1);
    }

    // --- wallets ---

    #[test]
    fn wallet_lifecycle_create_deposit_freeze_close() {
        let (store, bus) = backends();
        let directory = Arc::new(InMemoryWalletDirectory::new());
        let wallets = WalletAccountService::new(ledger(&store, &bus), directory.clone());

        let owner = OwnerId::new();
        let view = wallets.create_wallet(owner, Currency::Kes).unwrap();
        wallets.deposit(view.account_id, 2_500, None).unwrap();

        let listed = wallets.wallets_for(owner).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].balance, 2_500);

        wallets.freeze(view.account_id, Some("review".into())).unwrap();
        assert!(matches!(
            wallets.deposit(view.account_id, 100, None),
            Err(LedgerError::AccountFrozen)
        ));
        wallets.unfreeze(view.account_id).unwrap();

        // Closing requires an empty wallet.
        assert!(wallets.close(view.account_id).is_err());
        let ledger = wallets.ledger();
        ledger
            .post(view.account_id, -2_500, EntryKind::TransferOut, "DRAIN-1")
            .unwrap();
        wallets.close(view.account_id).unwrap();
    }

    #[test]
    fn holds_move_money_between_available_and_reserved() {
        let (store, bus) = backends();
        let directory = Arc::new(InMemoryWalletDirectory::new());
        let wallets = WalletAccountService::new(ledger(&store, &bus), directory);

        let view = wallets.create_wallet(OwnerId::new(), Currency::Ngn).unwrap();
        wallets.deposit(view.account_id, 5_000, None).unwrap();

        let held = wallets.reserve(view.account_id, 3_000, "HOLD-1").unwrap();
        assert_eq!(held.balance, 2_000);
        assert_eq!(held.reserved_balance, 3_000);

        // Held funds are not spendable.
        assert!(matches!(
            wallets.ledger().post(view.account_id, -2_500, EntryKind::TransferOut, "T-1"),
            Err(LedgerError::InsufficientFunds { .. })
        ));

        let released = wallets.release(view.account_id, "HOLD-1").unwrap();
        assert_eq!(released.balance, 5_000);
        assert_eq!(released.reserved_balance, 0);

        // A hold can only be released once.
        assert!(wallets.release(view.account_id, "HOLD-1").is_err());
    }

    // --- trading ---

    fn trading_setup(
        store: &Store,
        bus: &Bus,
    ) -> (
        TradeExecutionEngine<
            Store,
            Bus,
            Arc<InMemoryHoldingsStore>,
            Arc<RecordingNotificationSink>,
        >,
        Arc<InMemoryHoldingsStore>,
        Arc<RecordingNotificationSink>,
    ) {
        let holdings = Arc::new(InMemoryHoldingsStore::new());
        let sink = Arc::new(RecordingNotificationSink::new());
        let engine = TradeExecutionEngine::new(ledger(store, bus), holdings.clone(), sink.clone());
        (engine, holdings, sink)
    }

    #[test]
    fn buy_then_buy_then_sell_tracks_cost_basis() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);
        let (engine, holdings, _) = trading_setup(&store, &bus);
        let instrument = InstrumentId::from_str("SAFCOM").unwrap();

        engine
            .buy(account_id, instrument.clone(), dec!(100), 10)
            .unwrap();
        engine
            .buy(account_id, instrument.clone(), dec!(100), 20)
            .unwrap();

        let holding = holdings.get(account_id, &instrument).unwrap().unwrap();
        assert_eq!(holding.quantity, dec!(200));
        assert_eq!(holding.average_cost, dec!(15));

        let sale = engine
            .sell(account_id, instrument.clone(), dec!(50), 25)
            .unwrap();
        assert_eq!(sale.total, 1_250);
        // 50 * (25 - 15)
        assert_eq!(sale.realized_pnl, Some(500));

        let holding = holdings.get(account_id, &instrument).unwrap().unwrap();
        assert_eq!(holding.quantity, dec!(150));
        assert_eq!(holding.average_cost, dec!(15));

        // 10_000 - 1_000 - 2_000 + 1_250
        assert_eq!(ledger.balance(account_id).unwrap().balance, 8_250);
    }

    #[test]
    fn unaffordable_buy_leaves_no_trace() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 100);
        let (engine, holdings, _) = trading_setup(&store, &bus);
        let instrument = InstrumentId::from_str("SAFCOM").unwrap();

        let err = engine
            .buy(account_id, instrument.clone(), dec!(10), 50)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert!(holdings.get(account_id, &instrument).unwrap().is_none());
        assert_eq!(ledger.balance(account_id).unwrap().balance, 100);
    }

    #[test]
    fn oversell_is_rejected_without_posting() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);
        let (engine, _, _) = trading_setup(&store, &bus);
        let instrument = InstrumentId::from_str("SAFCOM").unwrap();

        engine
            .buy(account_id, instrument.clone(), dec!(5), 100)
            .unwrap();
        let entries_before = ledger.account(account_id).unwrap().entries().len();

        let err = engine
            .sell(account_id, instrument, dec!(6), 100)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientPosition { .. }));
        assert_eq!(
            ledger.account(account_id).unwrap().entries().len(),
            entries_before
        );
    }

    #[test]
    fn selling_everything_clears_the_position() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);
        let (engine, holdings, _) = trading_setup(&store, &bus);
        let instrument = InstrumentId::from_str("KCB").unwrap();

        engine
            .buy(account_id, instrument.clone(), dec!(20), 100)
            .unwrap();
        engine
            .sell(account_id, instrument.clone(), dec!(20), 110)
            .unwrap();

        assert!(holdings.get(account_id, &instrument).unwrap().is_none());
    }

    // --- transfers ---

    fn transfer_setup(
        store: &Store,
        bus: &Bus,
        fees: FeePolicy,
    ) -> (
        TransferProcessor<Store, Bus, Arc<InMemoryTransferStore>, Arc<RecordingNotificationSink>>,
        Arc<RecordingNotificationSink>,
    ) {
        let transfers = Arc::new(InMemoryTransferStore::new());
        let sink = Arc::new(RecordingNotificationSink::new());
        let processor = TransferProcessor::new(
            ledger(store, bus),
            transfers,
            sink.clone(),
            fees,
            Limits::default(),
        );
        (processor, sink)
    }

    #[test]
    fn transfer_debits_sender_and_credits_recipient() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let sender = funded_account(&ledger, 10_000);
        let recipient = funded_account(&ledger, 0);
        let fees = FeePolicy {
            flat: 25,
            bps: 0,
            cap: None,
        };
        let (processor, sink) = transfer_setup(&store, &bus, fees);

        let transfer = processor.transfer(sender, recipient, 4_000, None).unwrap();
        assert_eq!(transfer.state, TransferState::Completed);
        assert_eq!(transfer.fee, 25);

        assert_eq!(ledger.balance(sender).unwrap().balance, 10_000 - 4_000 - 25);
        assert_eq!(ledger.balance(recipient).unwrap().balance, 4_000);

        let kinds: Vec<NotificationKind> =
            sink.delivered().iter().map(|n| n.kind).collect();
        assert!(kinds.contains(&NotificationKind::TransferCompleted));
        assert!(kinds.contains(&NotificationKind::MoneyReceived));
    }

    #[test]
    fn failed_credit_reverses_the_debit() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let sender = funded_account(&ledger, 10_000);
        let recipient = funded_account(&ledger, 0);
        ledger.freeze(recipient, Some("kyc".into())).unwrap();
        let (processor, sink) = transfer_setup(&store, &bus, FeePolicy::free());

        let err = processor
            .transfer(sender, recipient, 2_000, Some("TRF-X1"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::RecipientUnavailable(_)));

        // Sender made whole, recipient untouched.
        assert_eq!(ledger.balance(sender).unwrap().balance, 10_000);
        assert_eq!(ledger.balance(recipient).unwrap().balance, 0);

        let transfer = processor.find_by_reference("TRF-X1").unwrap().unwrap();
        assert_eq!(transfer.state, TransferState::Reversed);

        let kinds: Vec<NotificationKind> =
            sink.delivered().iter().map(|n| n.kind).collect();
        assert!(kinds.contains(&NotificationKind::TransferReversed));
    }

    #[test]
    fn reinvoking_a_completed_transfer_is_a_no_op() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let sender = funded_account(&ledger, 10_000);
        let recipient = funded_account(&ledger, 0);
        let (processor, _) = transfer_setup(&store, &bus, FeePolicy::free());

        let first = processor
            .transfer(sender, recipient, 1_000, Some("TRF-X2"))
            .unwrap();
        let second = processor
            .transfer(sender, recipient, 1_000, Some("TRF-X2"))
            .unwrap();

        assert_eq!(first.transfer_id, second.transfer_id);
        assert_eq!(ledger.balance(sender).unwrap().balance, 9_000);
        assert_eq!(ledger.balance(recipient).unwrap().balance, 1_000);
    }

    #[test]
    fn transfer_validation_rejects_before_any_posting() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let sender = funded_account(&ledger, 10_000);
        let recipient = funded_account(&ledger, 0);
        let (processor, _) = transfer_setup(&store, &bus, FeePolicy::free());

        assert!(matches!(
            processor.transfer(sender, sender, 100, None),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            processor.transfer(sender, recipient, 0, None),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            processor.transfer(sender, recipient, Limits::default().per_transaction_max + 1, None),
            Err(LedgerError::LimitExceeded(_))
        ));
        assert_eq!(ledger.balance(sender).unwrap().balance, 10_000);
    }

    #[test]
    fn daily_outbound_ceiling_counts_the_whole_window() {
        let (store, bus) = backends();
        let transfers = Arc::new(InMemoryTransferStore::new());
        let sink = Arc::new(RecordingNotificationSink::new());
        let processor = TransferProcessor::new(
            ledger(&store, &bus),
            transfers,
            sink,
            FeePolicy::free(),
            Limits {
                per_transaction_max: 10_000,
                per_day_max: 3_000,
            },
        );

        let ledger = ledger(&store, &bus);
        let sender = funded_account(&ledger, 10_000);
        let recipient = funded_account(&ledger, 0);

        processor.transfer(sender, recipient, 2_000, None).unwrap();
        // 2_000 already sent today; another 2_000 would breach 3_000.
        assert!(matches!(
            processor.transfer(sender, recipient, 2_000, None),
            Err(LedgerError::LimitExceeded(_))
        ));
        // Room for 1_000 remains.
        processor.transfer(sender, recipient, 1_000, None).unwrap();

        assert_eq!(ledger.balance(sender).unwrap().balance, 7_000);
        assert_eq!(ledger.balance(recipient).unwrap().balance, 3_000);
    }

    // --- bill payments ---

    #[allow(clippy::type_complexity)]
    fn billpay_setup(
        store: &Store,
        bus: &Bus,
        config: GatewayConfig,
    ) -> (
        Arc<
            BillPaymentProcessor<
                Store,
                Bus,
                Arc<InMemoryBillPaymentStore>,
                Arc<MockGateway>,
                Arc<RecordingNotificationSink>,
            >,
        >,
        Arc<InMemoryBillPaymentStore>,
        Arc<MockGateway>,
        Arc<RecordingNotificationSink>,
    ) {
        let payments = Arc::new(InMemoryBillPaymentStore::new());
        let gateway = Arc::new(MockGateway::new());
        let sink = Arc::new(RecordingNotificationSink::new());
        let processor = Arc::new(BillPaymentProcessor::new(
            ledger(store, bus),
            payments.clone(),
            gateway.clone(),
            sink.clone(),
            FeePolicy::free(),
            Limits::default(),
            config,
        ));
        (processor, payments, gateway, sink)
    }

    fn provider() -> ProviderId {
        ProviderId::from_str("dstv").unwrap()
    }

    #[tokio::test]
    async fn bill_payment_completes_via_signed_webhook() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);
        let (processor, _, _, sink) = billpay_setup(&store, &bus, gateway_config(1_000));

        let payment = processor
            .pay_bill(account_id, provider(), "4040", 3_000)
            .await
            .unwrap();
        assert_eq!(payment.state, BillPaymentState::Settling);
        assert_eq!(ledger.balance(account_id).unwrap().balance, 7_000);

        let body = serde_json::to_vec(&WebhookPayload {
            pending_ref: payment.pending_ref.clone().unwrap(),
            reference: payment.reference.clone(),
            status: SettlementStatus::Success,
            amount: payment.amount,
        })
        .unwrap();
        let signature = sign_body(WEBHOOK_SECRET, &body).unwrap();

        let confirmed = processor.apply_webhook(&body, &signature).unwrap();
        assert_eq!(confirmed.state, BillPaymentState::Completed);
        assert_eq!(ledger.balance(account_id).unwrap().balance, 7_000);

        let kinds: Vec<NotificationKind> =
            sink.delivered().iter().map(|n| n.kind).collect();
        assert!(kinds.contains(&NotificationKind::BillPaymentCompleted));
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_changes_nothing() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);
        let (processor, payments, _, _) = billpay_setup(&store, &bus, gateway_config(1_000));

        let payment = processor
            .pay_bill(account_id, provider(), "4040", 3_000)
            .await
            .unwrap();

        let body = serde_json::to_vec(&WebhookPayload {
            pending_ref: payment.pending_ref.clone().unwrap(),
            reference: payment.reference.clone(),
            status: SettlementStatus::Success,
            amount: payment.amount,
        })
        .unwrap();
        let forged = sign_body("wrong-secret", &body).unwrap();

        assert!(processor.apply_webhook(&body, &forged).is_err());
        let stored = payments.get(payment.payment_id).unwrap().unwrap();
        assert_eq!(stored.state, BillPaymentState::Settling);
    }

    #[tokio::test]
    async fn provider_rejection_compensates_immediately() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);
        let (processor, payments, gateway, _) =
            billpay_setup(&store, &bus, gateway_config(1_000));
        gateway.script_initiate(MockInitiate::Reject("unknown biller account".into()));

        let err = processor
            .pay_bill(account_id, provider(), "9999", 3_000)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ProviderError(_)));

        // Debit reversed; record terminal.
        assert_eq!(ledger.balance(account_id).unwrap().balance, 10_000);
        let stored = payments.unresolved(chrono::Utc::now()).unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn timed_out_settlement_parks_in_settling_with_debit_standing() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);
        let (processor, _, gateway, _) = billpay_setup(&store, &bus, gateway_config(50));
        gateway.script_initiate(MockInitiate::Hang);

        let payment = processor
            .pay_bill(account_id, provider(), "4040", 2_000)
            .await
            .unwrap();

        assert_eq!(payment.state, BillPaymentState::Settling);
        assert!(payment.pending_ref.is_none());
        // Ambiguity never triggers an immediate reversal.
        assert_eq!(ledger.balance(account_id).unwrap().balance, 8_000);
    }

    #[tokio::test]
    async fn failed_verification_compensates_exactly_once() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);
        let (processor, payments, gateway, _) =
            billpay_setup(&store, &bus, gateway_config(1_000));

        let payment = processor
            .pay_bill(account_id, provider(), "4040", 2_000)
            .await
            .unwrap();
        let pending_ref = payment.pending_ref.clone().unwrap();
        gateway.script_verify(pending_ref, SettlementStatus::Failed);

        let reconciler = Reconciler::new(
            processor.clone(),
            payments.clone(),
            Duration::from_secs(60),
        );

        // stuck_after is zero in the test config, so the payment is
        // eligible on the first pass.
        assert_eq!(reconciler.reconcile_once().await.unwrap(), 1);
        assert_eq!(ledger.balance(account_id).unwrap().balance, 10_000);
        let stored = payments.get(payment.payment_id).unwrap().unwrap();
        assert_eq!(stored.state, BillPaymentState::Compensated);

        // Running reconciliation again must not refund twice.
        assert_eq!(reconciler.reconcile_once().await.unwrap(), 0);
        assert_eq!(ledger.balance(account_id).unwrap().balance, 10_000);
    }

    #[tokio::test]
    async fn unresolvable_payment_past_the_give_up_window_is_compensated() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);

        let mut config = gateway_config(50);
        config.give_up_after_secs = 0;
        let (processor, payments, gateway, _) = billpay_setup(&store, &bus, config);
        gateway.script_initiate(MockInitiate::TransportError);

        // Ambiguous transport failure: parked, debit standing.
        let payment = processor
            .pay_bill(account_id, provider(), "4040", 2_000)
            .await
            .unwrap();
        assert_eq!(payment.state, BillPaymentState::Settling);
        assert_eq!(ledger.balance(account_id).unwrap().balance, 8_000);

        // With the give-up window at zero, the sweep compensates.
        let reconciler =
            Reconciler::new(processor, payments.clone(), Duration::from_secs(60));
        assert_eq!(reconciler.reconcile_once().await.unwrap(), 1);
        assert_eq!(ledger.balance(account_id).unwrap().balance, 10_000);
        let stored = payments.get(payment.payment_id).unwrap().unwrap();
        assert_eq!(stored.state, BillPaymentState::Compensated);
    }

    #[tokio::test]
    async fn rail_stuck_on_pending_past_give_up_is_compensated() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);

        let mut config = gateway_config(1_000);
        config.give_up_after_secs = 0;
        let (processor, payments, gateway, _) = billpay_setup(&store, &bus, config);

        let payment = processor
            .pay_bill(account_id, provider(), "4040", 2_000)
            .await
            .unwrap();
        assert_eq!(payment.state, BillPaymentState::Settling);
        assert_eq!(ledger.balance(account_id).unwrap().balance, 8_000);

        // The rail keeps answering `Pending`; past the give-up window
        // that is no better than silence.
        let pending_ref = payment.pending_ref.clone().unwrap();
        gateway.script_verify(pending_ref, SettlementStatus::Pending);

        let reconciler =
            Reconciler::new(processor, payments.clone(), Duration::from_secs(60));
        assert_eq!(reconciler.reconcile_once().await.unwrap(), 1);
        assert_eq!(ledger.balance(account_id).unwrap().balance, 10_000);
        let stored = payments.get(payment.payment_id).unwrap().unwrap();
        assert_eq!(stored.state, BillPaymentState::Compensated);
    }

    #[tokio::test]
    async fn owed_reversal_is_retried_by_the_sweep() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let account_id = funded_account(&ledger, 10_000);
        let (processor, payments, _, _) = billpay_setup(&store, &bus, gateway_config(1_000));

        // A payment that failed after its debit but whose reversal never
        // landed: the record sits in `Failed` still holding the entry.
        let mut payment = BillPayment::new(
            account_id,
            provider(),
            "4040".to_string(),
            2_000,
            0,
            "BIL-OWED".to_string(),
        );
        let debit = ledger
            .post(account_id, -2_000, EntryKind::BillPayment, &payment.reference)
            .unwrap();
        payment.debit_entry_id = Some(debit.entry_id);
        payment.transition(BillPaymentState::Debited).unwrap();
        payment.transition(BillPaymentState::Failed).unwrap();
        payments.save(&payment).unwrap();
        assert_eq!(ledger.balance(account_id).unwrap().balance, 8_000);

        // The sweep owes no rail round-trip here, only the reversal.
        let reconciler =
            Reconciler::new(processor, payments.clone(), Duration::from_secs(60));
        assert_eq!(reconciler.reconcile_once().await.unwrap(), 1);
        assert_eq!(ledger.balance(account_id).unwrap().balance, 10_000);
        let stored = payments.get(payment.payment_id).unwrap().unwrap();
        assert_eq!(stored.state, BillPaymentState::Compensated);
    }

    // --- projection pipeline ---

    #[test]
    fn postings_flow_through_the_bus_into_the_balances_projection() {
        let (store, bus) = backends();
        let ledger = ledger(&store, &bus);
        let projection = Arc::new(BalancesProjection::new());

        let worker_projection = projection.clone();
        let worker = ProjectionWorker::spawn("balances", bus.clone(), move |env| {
            worker_projection.apply_envelope(&env)
        });

        let account_id = funded_account(&ledger, 1_000);
        ledger
            .post(account_id, -400, EntryKind::BillPayment, "B-1")
            .unwrap();

        // Subscriber thread drains the bus asynchronously.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(model) = projection.get(account_id)
                && model.balance == 600
            {
                assert_eq!(model.entry_count, 2);
                break;
            }
            assert!(std::time::Instant::now() < deadline, "projection never caught up");
            std::thread::sleep(Duration::from_millis(10));
        }

        worker.shutdown();
    }

    // --- end to end ---

    #[test]
    fn funded_wallet_trades_then_transfers() {
        let (store, bus) = backends();
        let directory = Arc::new(InMemoryWalletDirectory::new());
        let wallets = WalletAccountService::new(ledger(&store, &bus), directory);
        let (engine, holdings, _) = trading_setup(&store, &bus);
        let (transfers, _) = transfer_setup(&store, &bus, FeePolicy::free());

        let sender = wallets
            .create_wallet(OwnerId::new(), Currency::Ngn)
            .unwrap()
            .account_id;
        let recipient = wallets
            .create_wallet(OwnerId::new(), Currency::Ngn)
            .unwrap()
            .account_id;
        wallets.deposit(sender, 1_000, None).unwrap();

        let instrument = InstrumentId::from_str("X").unwrap();
        engine.buy(sender, instrument.clone(), dec!(10), 50).unwrap();
        assert_eq!(wallets.wallet(sender).unwrap().balance, 500);
        let holding = holdings.get(sender, &instrument).unwrap().unwrap();
        assert_eq!(holding.quantity, dec!(10));
        assert_eq!(holding.average_cost, Decimal::from(50));

        transfers.transfer(sender, recipient, 100, None).unwrap();
        assert_eq!(wallets.wallet(sender).unwrap().balance, 400);
        assert_eq!(wallets.wallet(recipient).unwrap().balance, 100);

        // Statement shows the full audit trail on the sender.
        let statement = wallets.statement(sender).unwrap();
        assert_eq!(statement.len(), 3);
    }
}
