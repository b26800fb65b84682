//! `centavo-app` — wiring and the client-facing operation surface.
//!
//! Everything a client calls (create wallet, trade, send money, pay a
//! bill, read a balance) enters through [`AppServices`], which owns the
//! wired-together service graph over shared in-memory backends.

pub mod config;
pub mod services;

pub use config::AppConfig;
pub use services::AppServices;
