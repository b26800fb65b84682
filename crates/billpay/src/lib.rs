//! `centavo-billpay` — bill settlement over external payment rails.
//!
//! The hard part of paying a bill is that the rail can go silent after
//! taking the money. The processor never guesses: an ambiguous settlement
//! parks in `settling` with the debit standing, and only a confirmed
//! failure (webhook or verify) triggers the one-and-only compensation.
//! A background reconciler sweeps payments the rail never confirmed.

pub mod payment;
pub mod processor;
pub mod reconciler;

pub use payment::{BillPayment, BillPaymentState, BillPaymentStore};
pub use processor::BillPaymentProcessor;
pub use reconciler::{Reconciler, ReconcilerHandle};
