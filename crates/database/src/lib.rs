// In crates/database/src/lib.rs

use app_config::types::DatabaseSettings;
use async_trait::async_trait;
use core_types::{Holding, Instrument, Symbol, UserId};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

pub mod error;
pub mod memory;
pub mod postgres;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use postgres::Db;

/// A change to one (user, symbol) holding row.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldingWrite {
    /// Creates the holding or overwrites its quantity and average price.
    /// `display_name` is only recorded when the holding is created.
    Put {
        quantity: i64,
        avg_price: Decimal,
        display_name: String,
    },
    Remove,
}

/// The persistence contract the ledger, price feed and progression tracker run against.
///
/// Plain methods are single, self-contained reads or writes. Read-modify-write
/// callers use the conditional methods (`apply_holding_write`,
/// `replace_instrument_price`), which fail with [`Error::Conflict`] instead of
/// overwriting a row another writer changed in the meantime.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the user's holding in `symbol`, if they own any shares.
    async fn get_holding(&self, user: UserId, symbol: &Symbol) -> Result<Option<Holding>>;

    /// Creates the holding or overwrites its quantity and average price.
    ///
    /// `display_name` is only recorded when the holding is created.
    async fn upsert_holding(
        &self,
        user: UserId,
        symbol: &Symbol,
        quantity: i64,
        avg_price: Decimal,
        display_name: &str,
    ) -> Result<()>;

    async fn delete_holding(&self, user: UserId, symbol: &Symbol) -> Result<()>;

    /// Applies `write` only if the holding still has the quantity and average
    /// price of `expected` (or is still absent when `expected` is `None`), and
    /// returns the user's holdings after the write.
    ///
    /// The check, the write and the listing are one atomic step: on any error,
    /// [`Error::Conflict`] included, nothing was written.
    async fn apply_holding_write(
        &self,
        user: UserId,
        symbol: &Symbol,
        expected: Option<&Holding>,
        write: &HoldingWrite,
    ) -> Result<Vec<Holding>>;

    /// All of the user's holdings, in the order they were first bought.
    async fn list_holdings(&self, user: UserId) -> Result<Vec<Holding>>;

    async fn get_instrument(&self, symbol: &Symbol) -> Result<Option<Instrument>>;

    /// The full catalog, in seed order.
    async fn list_instruments(&self) -> Result<Vec<Instrument>>;

    /// Fails with [`Error::NotFound`] if the symbol is not in the catalog.
    async fn set_instrument_price(&self, symbol: &Symbol, new_price: Decimal) -> Result<()>;

    /// Sets the price only if it is still `expected`.
    ///
    /// Fails with [`Error::Conflict`] if another writer moved the price first,
    /// and with [`Error::NotFound`] if the symbol is not in the catalog.
    async fn replace_instrument_price(&self, symbol: &Symbol, expected: Decimal, new_price: Decimal) -> Result<()>;

    /// Inserts the instruments that are not in the catalog yet and returns
    /// how many were added. Existing rows, and their base prices, are left alone.
    async fn seed_instruments(&self, instruments: &[Instrument]) -> Result<u64>;

    /// Experience points for the user, zero if they have never been awarded any.
    async fn get_xp(&self, user: UserId) -> Result<u64>;

    async fn set_xp_and_level(&self, user: UserId, xp: u64, level: u64) -> Result<()>;
}

/// The store shared by every component of a running application.
pub type SharedStore = Arc<dyn Store>;

/// Establishes a connection pool to the PostgreSQL database and runs migrations.
///
/// # Arguments
///
/// * `settings`: The database configuration settings.
///
/// # Returns
///
/// A `Result` containing the `Db` wrapper on success, or an `Error` on failure.
pub async fn connect(settings: &DatabaseSettings) -> Result<Db> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        // The `?` operator uses the `#[from]` attribute in our error enum
        // to automatically convert the `sqlx::Error` into a `database::Error`.
        .connect(&settings.url)
        .await?;

    // Run database migrations. This ensures the database schema is up-to-date.
    sqlx::migrate!("../../migrations").run(&pool).await?;

    tracing::info!(max_connections = settings.max_connections, "Connected to PostgreSQL");

    Ok(Db::new(pool))
}
