// In crates/core-types/src/error.rs

use thiserror::Error;

use crate::types::Symbol;

/// The failures a trade, tick or XP award can report to its caller.
///
/// None of these are partial: when an operation returns one of them,
/// the stored state is exactly what it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid order: {reason}")]
    InvalidOrder { reason: String },

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(Symbol),

    #[error("Not enough shares of {symbol}: requested {requested}, held {held}")]
    InsufficientHoldings {
        symbol: Symbol,
        requested: i64,
        held: i64,
    },

    #[error("Login required")]
    NotAuthenticated,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl Error {
    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Error::InvalidOrder {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
