//! Read-model projections fed from the event bus.

pub mod balances;
pub mod worker;

pub use balances::{BalanceReadModel, BalancesProjection};
pub use worker::{ProjectionWorker, WorkerHandle};
