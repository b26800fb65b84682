//! `centavo-events` — event plumbing for the ledger core.
//!
//! Mechanics only, no business rules: the `Event` contract, envelopes,
//! the pub/sub bus, and the append-only event store contract that backs
//! every balance mutation.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod store;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
