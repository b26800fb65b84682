use chrono::{DateTime, Utc};

/// A fact recorded on an account stream.
///
/// Ledger events are append-only and never edited after commit: a wrong
/// posting is corrected by a compensating entry, not by rewriting history.
/// `event_type` names the fact and `version` tags its schema so old
/// streams stay readable as the payload evolves.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name of the fact, e.g. "ledger.account.entry_posted".
    fn event_type(&self) -> &'static str;

    /// Schema version of the payload for this event type.
    fn version(&self) -> u32;

    /// Business time: when the fact happened, not when it was stored.
    fn occurred_at(&self) -> DateTime<Utc>;
}
