//! `centavo-trading` — buy/sell execution against the cash wallet.
//!
//! Cost basis is tracked as a quantity-weighted average in exact decimal
//! arithmetic; cash legs post through the ledger in integer minor units.
//! A trade is one debit or credit entry plus one holding mutation, applied
//! as a unit: if the holding side fails after the cash side landed, the
//! cash entry is reversed before the error surfaces.

pub mod engine;
pub mod holding;

pub use engine::{Trade, TradeExecutionEngine, TradeSide};
pub use holding::{Holding, HoldingsStore};
