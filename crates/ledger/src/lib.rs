//! `centavo-ledger` — the source of truth for money.
//!
//! An account is an event-sourced aggregate: its balance, reserved balance,
//! status and version are a fold over an append-only stream of postings.
//! `LedgerStore` is the only component in the system allowed to mutate
//! balances; everything else posts through it.

pub mod account;
pub mod entry;
pub mod store;

pub use account::{
    Account, AccountCommand, AccountEvent, AccountStatus, CloseAccount, FreezeAccount,
    OpenAccount, PostEntry, ReleaseReservation, ReserveFunds, ReverseEntry, UnfreezeAccount,
};
pub use entry::{EntryKind, LedgerEntry};
pub use store::{BalanceView, LedgerStore, reversal_reference};
