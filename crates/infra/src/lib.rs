//! Infrastructure layer: in-memory backends, the mock settlement rail,
//! notification sinks and read-model projections.
//!
//! Everything here implements a contract defined by a domain crate; a
//! durable backend slots in behind the same traits.

pub mod event_store;
pub mod gateway;
pub mod notify;
pub mod projections;
pub mod stores;

mod integration_tests;

pub use event_store::InMemoryEventStore;
pub use gateway::{MockGateway, MockInitiate};
pub use notify::{RecordingNotificationSink, TracingNotificationSink};
pub use projections::balances::{BalanceReadModel, BalancesProjection};
pub use projections::worker::{ProjectionWorker, WorkerHandle};
pub use stores::{
    InMemoryBillPaymentStore, InMemoryHoldingsStore, InMemoryTransferStore,
    InMemoryWalletDirectory,
};
