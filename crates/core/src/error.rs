//! Error taxonomy for the ledger/settlement core.

use thiserror::Error;

/// Result type used across the ledger core.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// Deterministic business failures (validation, funds, limits) plus the
/// small set of operational outcomes the processors need to branch on
/// (conflict, provider failure). Transport/infrastructure concerns stay
/// behind their own error types and are mapped into `Internal` at the seam.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed input; rejected before any ledger write.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A debit would drive the available balance below zero.
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    /// A sell exceeds the held quantity.
    #[error("insufficient position: held {held}, requested {requested}")]
    InsufficientPosition { held: String, requested: String },

    /// Optimistic-concurrency conflict; retried internally, surfaced only
    /// once the retry budget is exhausted.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The credit side of a transfer could not be applied (frozen, closed
    /// or missing recipient). The debit has been reversed.
    #[error("recipient unavailable: {0}")]
    RecipientUnavailable(String),

    /// The external settlement rail reported a definitive failure.
    #[error("provider error: {0}")]
    ProviderError(String),

    /// A configured per-transaction or per-period ceiling was exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// The account exists but is frozen (compliance gate).
    #[error("account frozen")]
    AccountFrozen,

    /// The account has been closed; only reads are allowed.
    #[error("account closed")]
    AccountClosed,

    /// A referenced record does not exist.
    #[error("not found")]
    NotFound,

    /// Unexpected failure after a posting was applied; any applied effect
    /// has been compensated before this surfaced.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn recipient_unavailable(msg: impl Into<String>) -> Self {
        Self::RecipientUnavailable(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::ProviderError(msg.into())
    }

    pub fn limit_exceeded(msg: impl Into<String>) -> Self {
        Self::LimitExceeded(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// True for errors a bounded retry of the same operation may resolve.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
