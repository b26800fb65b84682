//! `centavo-wallets` — account lifecycle on top of the ledger.
//!
//! Thin service layer: opening wallets, cash deposits, freeze/unfreeze from
//! the compliance gate, and owner-scoped lookups. All money movement is
//! delegated to `centavo_ledger::LedgerStore`.

pub mod directory;
pub mod service;

pub use directory::WalletDirectory;
pub use service::{AccountView, WalletAccountService};
