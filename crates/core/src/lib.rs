//! `centavo-core` — domain foundation for the ledger/settlement core.
//!
//! Pure domain primitives only (ids, money, errors, aggregate contracts,
//! policy configuration). No IO, no persistence concerns.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod id;
pub mod money;
pub mod notify;
pub mod reference;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use config::{FeePolicy, GatewayConfig, Limits, RetryPolicy};
pub use error::{LedgerError, LedgerResult};
pub use id::{AccountId, EntryId, InstrumentId, OwnerId, PaymentId, ProviderId, TradeId, TransferId};
pub use money::Currency;
pub use notify::{Notification, NotificationKind, NotificationSink};
pub use reference::ReferenceGenerator;
