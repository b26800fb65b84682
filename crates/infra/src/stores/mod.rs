//! In-memory keyed stores backing the domain store traits.

pub mod directory;
pub mod holdings;
pub mod payments;
pub mod transfers;

pub use directory::InMemoryWalletDirectory;
pub use holdings::InMemoryHoldingsStore;
pub use payments::InMemoryBillPaymentStore;
pub use transfers::InMemoryTransferStore;
