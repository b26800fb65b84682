use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use centavo_core::{LedgerError, LedgerResult};
use centavo_gateway::{GatewaySettlementAdapter, PendingRef, SettlementStatus};

/// How the mock rail answers the next `initiate` calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockInitiate {
    /// Accept and hand back a pending reference.
    Accept,
    /// Definitive synchronous rejection.
    Reject(String),
    /// Transport-level failure (connection dropped mid-call).
    TransportError,
    /// Never answer; the caller's timeout fires first.
    Hang,
}

/// Scriptable settlement rail for tests and local runs.
///
/// `initiate` behavior and per-reference `verify` answers are set by the
/// test; unscripted verifications answer `Pending`, matching a rail that
/// has not made its mind up yet.
#[derive(Debug)]
pub struct MockGateway {
    initiate_behavior: Mutex<MockInitiate>,
    verify_answers: Mutex<HashMap<PendingRef, SettlementStatus>>,
    initiated: Mutex<Vec<(String, i64, String)>>,
    next_ref: AtomicU64,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            initiate_behavior: Mutex::new(MockInitiate::Accept),
            verify_answers: Mutex::new(HashMap::new()),
            initiated: Mutex::new(Vec::new()),
            next_ref: AtomicU64::new(1),
        }
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_initiate(&self, behavior: MockInitiate) {
        if let Ok(mut current) = self.initiate_behavior.lock() {
            *current = behavior;
        }
    }

    pub fn script_verify(&self, pending_ref: PendingRef, status: SettlementStatus) {
        if let Ok(mut answers) = self.verify_answers.lock() {
            answers.insert(pending_ref, status);
        }
    }

    /// Every `(reference, amount, channel)` the rail was asked to settle.
    pub fn initiated(&self) -> Vec<(String, i64, String)> {
        self.initiated
            .lock()
            .map(|i| i.clone())
            .unwrap_or_default()
    }

    /// The pending reference the next accepted `initiate` will return.
    pub fn peek_next_ref(&self) -> PendingRef {
        PendingRef::new(format!("GW-{}", self.next_ref.load(Ordering::SeqCst)))
    }
}

#[async_trait]
impl GatewaySettlementAdapter for MockGateway {
    async fn initiate(
        &self,
        reference: &str,
        amount: i64,
        channel: &str,
    ) -> LedgerResult<PendingRef> {
        let behavior = self
            .initiate_behavior
            .lock()
            .map_err(|_| LedgerError::internal("mock gateway lock poisoned"))?
            .clone();

        if let Ok(mut initiated) = self.initiated.lock() {
            initiated.push((reference.to_string(), amount, channel.to_string()));
        }

        match behavior {
            MockInitiate::Accept => {
                let n = self.next_ref.fetch_add(1, Ordering::SeqCst);
                Ok(PendingRef::new(format!("GW-{n}")))
            }
            MockInitiate::Reject(detail) => Err(LedgerError::provider(detail)),
            MockInitiate::TransportError => {
                Err(LedgerError::internal("connection reset by rail"))
            }
            MockInitiate::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(LedgerError::internal("unreachable: hang elapsed"))
            }
        }
    }

    async fn verify(&self, pending_ref: &PendingRef) -> LedgerResult<SettlementStatus> {
        let answers = self
            .verify_answers
            .lock()
            .map_err(|_| LedgerError::internal("mock gateway lock poisoned"))?;

        Ok(answers
            .get(pending_ref)
            .copied()
            .unwrap_or(SettlementStatus::Pending))
    }
}
