use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use centavo_core::{
    AccountId, FeePolicy, GatewayConfig, LedgerError, LedgerResult, Limits, Notification,
    NotificationKind, NotificationSink, ProviderId, ReferenceGenerator,
};
use centavo_events::{EventBus, EventEnvelope, EventStore};
use centavo_gateway::{
    GatewaySettlementAdapter, SettlementStatus, WebhookPayload, parse_webhook, verify_signature,
};
use centavo_ledger::{EntryKind, LedgerStore};

use crate::payment::{BillPayment, BillPaymentState, BillPaymentStore};

/// Orchestrates bill payments: debit, call the rail, and resolve the
/// outcome through webhooks or reconciliation.
pub struct BillPaymentProcessor<S, B, P, G, N> {
    ledger: LedgerStore<S, B>,
    payments: P,
    gateway: G,
    notifications: N,
    fees: FeePolicy,
    limits: Limits,
    config: GatewayConfig,
    bill_refs: ReferenceGenerator,
}

impl<S, B, P, G, N> BillPaymentProcessor<S, B, P, G, N>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    P: BillPaymentStore,
    G: GatewaySettlementAdapter,
    N: NotificationSink,
{
    pub fn new(
        ledger: LedgerStore<S, B>,
        payments: P,
        gateway: G,
        notifications: N,
        fees: FeePolicy,
        limits: Limits,
        config: GatewayConfig,
    ) -> Self {
        Self {
            ledger,
            payments,
            gateway,
            notifications,
            fees,
            limits,
            config,
            bill_refs: ReferenceGenerator::new("BIL"),
        }
    }

    pub fn gateway_config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Pay a bill. A rail that answers with a pending reference, errors
    /// ambiguously or times out leaves the payment in `Settling` with the
    /// debit standing; only a definitive provider rejection compensates
    /// immediately.
    pub async fn pay_bill(
        &self,
        account_id: AccountId,
        provider_id: ProviderId,
        account_number: &str,
        amount: i64,
    ) -> LedgerResult<BillPayment> {
        if amount <= 0 {
            return Err(LedgerError::invalid_argument("amount must be positive"));
        }
        if account_number.is_empty() {
            return Err(LedgerError::invalid_argument(
                "biller account number must not be empty",
            ));
        }
        if amount > self.limits.per_transaction_max {
            return Err(LedgerError::limit_exceeded(format!(
                "amount {amount} exceeds per-transaction limit {}",
                self.limits.per_transaction_max
            )));
        }

        let fee = self.fees.fee_for(amount);
        let outgoing = amount
            .checked_add(fee)
            .ok_or_else(|| LedgerError::internal("debit amount overflow"))?;
        self.check_day_limit(account_id, outgoing)?;

        let reference = self.bill_refs.generate();
        let mut payment = BillPayment::new(
            account_id,
            provider_id,
            account_number.to_string(),
            amount,
            fee,
            reference,
        );
        self.payments.save(&payment)?;

        let debit_total = amount
            .checked_add(fee)
            .ok_or_else(|| LedgerError::internal("debit amount overflow"))?;
        let debit = match self.ledger.post(
            account_id,
            -debit_total,
            EntryKind::BillPayment,
            &payment.reference,
        ) {
            Ok(entry) => entry,
            Err(e) => {
                // No money moved; the record fails in place.
                payment.transition(BillPaymentState::Failed)?;
                self.payments.save(&payment)?;
                return Err(e);
            }
        };
        payment.debit_entry_id = Some(debit.entry_id);
        payment.transition(BillPaymentState::Debited)?;
        self.payments.save(&payment)?;

        let initiation = tokio::time::timeout(
            self.config.call_timeout(),
            self.gateway
                .initiate(&payment.reference, amount, payment.provider_id.as_str()),
        )
        .await;

        match initiation {
            Ok(Ok(pending_ref)) => {
                payment.pending_ref = Some(pending_ref);
                payment.transition(BillPaymentState::Settling)?;
                self.payments.save(&payment)?;
                Ok(payment)
            }
            // The rail answered and said no; that is a confirmed failure.
            Ok(Err(LedgerError::ProviderError(detail))) => {
                payment.transition(BillPaymentState::Failed)?;
                self.payments.save(&payment)?;
                self.compensate(&mut payment)?;
                Err(LedgerError::provider(detail))
            }
            // Transport error or timeout: the rail may have the money.
            // Park in `Settling` for the webhook or the reconciler.
            Ok(Err(ambiguous)) => {
                warn!(
                    payment_id = %payment.payment_id,
                    error = %ambiguous,
                    "settlement call errored ambiguously, awaiting confirmation"
                );
                payment.transition(BillPaymentState::Settling)?;
                self.payments.save(&payment)?;
                Ok(payment)
            }
            Err(_elapsed) => {
                warn!(
                    payment_id = %payment.payment_id,
                    timeout_ms = self.config.call_timeout_ms,
                    "settlement call timed out, awaiting confirmation"
                );
                payment.transition(BillPaymentState::Settling)?;
                self.payments.save(&payment)?;
                Ok(payment)
            }
        }
    }

    /// Rolling-day outbound ceiling, checked before any record or posting
    /// exists. Reversed debits do not count against the window.
    fn check_day_limit(&self, account_id: AccountId, outgoing: i64) -> LedgerResult<()> {
        let account = self.ledger.account(account_id)?;
        let window_start = Utc::now() - Duration::hours(24);
        let spent = account.outbound_since(window_start);
        if spent.saturating_add(outgoing) > self.limits.per_day_max {
            return Err(LedgerError::limit_exceeded(format!(
                "daily outbound limit {} reached ({spent} already sent)",
                self.limits.per_day_max
            )));
        }
        Ok(())
    }

    /// Apply a signed confirmation callback from the rail. The signature
    /// is checked against the raw body before anything is parsed.
    pub fn apply_webhook(&self, body: &[u8], signature: &str) -> LedgerResult<BillPayment> {
        verify_signature(&self.config.webhook_secret, body, signature)?;
        let payload = parse_webhook(body)?;
        self.apply_confirmation(&payload)
    }

    fn apply_confirmation(&self, payload: &WebhookPayload) -> LedgerResult<BillPayment> {
        let payment = match self.payments.find_by_pending_ref(&payload.pending_ref)? {
            Some(p) => p,
            None => self
                .payments
                .find_by_reference(&payload.reference)?
                .ok_or(LedgerError::NotFound)?,
        };
        self.resolve(payment, payload.status)
    }

    /// Drive a payment to its outcome given a definitive (or pending)
    /// status from the rail. Safe to call repeatedly: terminal payments
    /// are returned untouched and compensation dedupes on the reversal
    /// reference.
    pub(crate) fn resolve(
        &self,
        mut payment: BillPayment,
        status: SettlementStatus,
    ) -> LedgerResult<BillPayment> {
        if payment.state.is_terminal() {
            return Ok(payment);
        }

        match status {
            SettlementStatus::Success => {
                if payment.state == BillPaymentState::Debited {
                    payment.transition(BillPaymentState::Settling)?;
                }
                payment.transition(BillPaymentState::Completed)?;
                self.payments.save(&payment)?;
                info!(payment_id = %payment.payment_id, "bill payment completed");
                self.notifications.notify(Notification::new(
                    payment.account_id,
                    NotificationKind::BillPaymentCompleted,
                    payment.reference.clone(),
                    format!("bill payment of {} confirmed", payment.amount),
                ));
                Ok(payment)
            }
            SettlementStatus::Failed => {
                if payment.state != BillPaymentState::Failed {
                    payment.transition(BillPaymentState::Failed)?;
                    self.payments.save(&payment)?;
                }
                self.compensate(&mut payment)?;
                Ok(payment)
            }
            // Still in flight; leave the record alone.
            SettlementStatus::Pending => Ok(payment),
        }
    }

    /// Reverse the debit of a confirmed-failed payment, exactly once.
    pub(crate) fn compensate(&self, payment: &mut BillPayment) -> LedgerResult<()> {
        let debit_entry_id = payment
            .debit_entry_id
            .ok_or_else(|| LedgerError::internal("failed payment missing debit entry"))?;

        match self.ledger.reverse(payment.account_id, debit_entry_id) {
            Ok(reversal) => {
                info!(
                    payment_id = %payment.payment_id,
                    reversal_id = %reversal.entry_id,
                    "bill payment debit reversed"
                );
                payment.transition(BillPaymentState::Compensated)?;
                self.payments.save(payment)?;
                self.notifications.notify(Notification::new(
                    payment.account_id,
                    NotificationKind::BillPaymentFailed,
                    payment.reference.clone(),
                    "bill payment failed, your money was returned",
                ));
                Ok(())
            }
            Err(e) => {
                // Record stays `Failed`; the reconciler retries the
                // reversal on its next pass.
                error!(
                    payment_id = %payment.payment_id,
                    error = %e,
                    "bill payment reversal failed, will retry"
                );
                Err(LedgerError::internal(format!(
                    "compensation did not land: {e}"
                )))
            }
        }
    }

    /// Re-check one stuck payment against the rail. Ambiguity within the
    /// give-up window leaves the payment as-is; beyond the window the
    /// debit is reversed rather than held forever.
    pub(crate) async fn verify_stuck(&self, payment: BillPayment) -> LedgerResult<BillPayment> {
        let status = match &payment.pending_ref {
            Some(pending_ref) => {
                match tokio::time::timeout(
                    self.config.call_timeout(),
                    self.gateway.verify(pending_ref),
                )
                .await
                {
                    Ok(Ok(status)) => Some(status),
                    Ok(Err(e)) => {
                        warn!(
                            payment_id = %payment.payment_id,
                            error = %e,
                            "verification errored, payment stays in settling"
                        );
                        None
                    }
                    Err(_elapsed) => {
                        warn!(
                            payment_id = %payment.payment_id,
                            "verification timed out, payment stays in settling"
                        );
                        None
                    }
                }
            }
            // Initiation never yielded a rail reference; there is nothing
            // to verify against.
            None => None,
        };

        match status {
            Some(SettlementStatus::Success) => self.resolve(payment, SettlementStatus::Success),
            Some(SettlementStatus::Failed) => self.resolve(payment, SettlementStatus::Failed),
            // A `Pending` answer is no more definitive than no answer: the
            // rail still has not settled. Both age against the give-up
            // window so the customer's debit cannot be held forever.
            Some(SettlementStatus::Pending) | None => {
                let age = Utc::now() - payment.created_at;
                if age.num_seconds() >= self.config.give_up_after_secs {
                    warn!(
                        payment_id = %payment.payment_id,
                        age_secs = age.num_seconds(),
                        "unresolvable payment past give-up window, compensating"
                    );
                    self.resolve(payment, SettlementStatus::Failed)
                } else {
                    Ok(payment)
                }
            }
        }
    }
}
