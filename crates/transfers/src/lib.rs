//! `centavo-transfers` — peer-to-peer money movement.
//!
//! A transfer is two postings under one reference: debit the sender for
//! amount plus fee, credit the recipient for the amount. If the credit
//! side fails the debit is reversed automatically; the sender is never
//! left short.

pub mod processor;
pub mod transfer;

pub use processor::TransferProcessor;
pub use transfer::{Transfer, TransferState, TransferStore};
