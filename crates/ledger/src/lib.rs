// In crates/ledger/src/lib.rs

pub mod locks;
pub mod portfolio;
pub mod progression;
pub mod types;

// Re-export public types
pub use locks::KeyedLocks;
pub use portfolio::Ledger;
pub use progression::ProgressionTracker;
pub use types::{PortfolioValuation, PositionValuation};
