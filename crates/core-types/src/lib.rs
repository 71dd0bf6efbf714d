// In crates/core-types/src/lib.rs

pub mod error;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use error::{Error, Result};
pub use types::{
    level_for_xp, Holding, Instrument, InstrumentCategory, InstrumentSnapshot, Progression,
    Symbol, TradeAction, TradeOrder, UserId, MAX_XP, XP_PER_LEVEL,
};
