use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use centavo_core::LedgerResult;
use centavo_events::{EventBus, EventEnvelope, EventStore};
use centavo_gateway::{GatewaySettlementAdapter, SettlementStatus};

use crate::payment::{BillPaymentState, BillPaymentStore};
use crate::processor::BillPaymentProcessor;

/// Handle to stop and join the background reconciliation task.
pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl ReconcilerHandle {
    /// Request graceful shutdown and wait for the task to stop.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

/// Background sweep over unresolved payments.
///
/// Each pass re-verifies every `Settling` payment whose last update is
/// older than the stuck threshold and retries the debit reversal of
/// `Failed` payments whose compensation did not land. Confirmed outcomes
/// are applied; ambiguity is left for the next pass until the give-up
/// window expires.
pub struct Reconciler<S, B, P, G, N> {
    processor: Arc<BillPaymentProcessor<S, B, P, G, N>>,
    payments: P,
    interval: Duration,
}

impl<S, B, P, G, N> Reconciler<S, B, P, G, N>
where
    S: EventStore + Send + Sync + 'static,
    B: EventBus<EventEnvelope<JsonValue>> + Send + Sync + 'static,
    P: BillPaymentStore + Clone + Send + Sync + 'static,
    G: GatewaySettlementAdapter + Send + Sync + 'static,
    N: centavo_core::NotificationSink + Send + Sync + 'static,
{
    pub fn new(
        processor: Arc<BillPaymentProcessor<S, B, P, G, N>>,
        payments: P,
        interval: Duration,
    ) -> Self {
        Self {
            processor,
            payments,
            interval,
        }
    }

    /// One reconciliation pass. Returns how many payments reached a
    /// terminal state. Running passes back-to-back is safe: resolution is
    /// idempotent and compensation dedupes on the reversal reference.
    pub async fn reconcile_once(&self) -> LedgerResult<usize> {
        let stuck_after =
            ChronoDuration::seconds(self.processor.gateway_config().stuck_after_secs);
        let cutoff = Utc::now() - stuck_after;

        let stuck = self.payments.unresolved(cutoff)?;
        if stuck.is_empty() {
            return Ok(0);
        }
        info!(count = stuck.len(), "reconciling stuck payments");

        let mut resolved = 0;
        for payment in stuck {
            let payment_id = payment.payment_id;
            // Already-failed payments need no rail round-trip; only their
            // debit reversal is outstanding.
            let outcome = if payment.state == BillPaymentState::Failed {
                self.processor.resolve(payment, SettlementStatus::Failed)
            } else {
                self.processor.verify_stuck(payment).await
            };
            match outcome {
                Ok(after) if after.state.is_terminal() => resolved += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(payment_id = %payment_id, error = %e, "reconciliation pass failed");
                }
            }
        }
        Ok(resolved)
    }

    /// Spawn the periodic reconciliation task.
    pub fn spawn(self) -> ReconcilerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.interval);
            // First tick fires immediately; skip it so a fresh start does
            // not race payments still inside their call timeout.
            tick.tick().await;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if let Err(e) = self.reconcile_once().await {
                            warn!(error = %e, "reconciliation sweep failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("reconciler shutting down");
                            break;
                        }
                    }
                }
            }
        });

        ReconcilerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}
