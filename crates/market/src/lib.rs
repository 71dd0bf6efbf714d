// In crates/market/src/lib.rs

pub mod catalog;
pub mod error;
pub mod feed;
pub mod volatility;

// Re-export public types
pub use catalog::default_catalog;
pub use error::{Error, Result};
pub use feed::PriceFeed;
pub use volatility::VolatilityModel;
