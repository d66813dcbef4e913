//! Quote domain — streaming per-symbol field updates.

pub mod wire;

pub use wire::{QuoteStatus, QuoteUpdate, QuoteValues};

/// Fields requested with `quote_set_fields` when the caller does not choose
/// their own set. Matches what the platform's own watchlist asks for.
pub const DEFAULT_QUOTE_FIELDS: &[&str] = &[
    "ch",
    "chp",
    "current_session",
    "description",
    "local_description",
    "language",
    "exchange",
    "fractional",
    "is_tradable",
    "lp",
    "lp_time",
    "minmov",
    "minmove2",
    "original_name",
    "pricescale",
    "pro_name",
    "short_name",
    "type",
    "update_mode",
    "volume",
    "currency_code",
    "rchp",
    "rtc",
];
