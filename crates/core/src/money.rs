//! Money representation.
//!
//! Ledger amounts are `i64` minor units (cents, kobo, …); negative means
//! debit, positive means credit. Each account carries exactly one currency
//! and cross-currency postings are rejected at the service layer.

use serde::{Deserialize, Serialize};

/// ISO-4217-style currency tag for an account.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Ngn,
    Kes,
    Ghs,
    Usd,
}

impl Currency {
    /// Minor units per major unit (all supported currencies are 2-decimal).
    pub fn minor_units(&self) -> i64 {
        100
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ngn => "NGN",
            Currency::Kes => "KES",
            Currency::Ghs => "GHS",
            Currency::Usd => "USD",
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}
