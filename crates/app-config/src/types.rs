// In crates/app-config/src/types.rs

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Settings for the database connection.
    pub database: DatabaseSettings,
    pub server: ServerSettings,
    /// Price feed tuning. Every field has a default, so the section is optional.
    #[serde(default)]
    pub market: MarketSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseSettings {
    /// The connection URL for the PostgreSQL database.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Volatility per instrument category, as a fraction of the base price
/// that a single tick may move the current price by.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MarketSettings {
    #[serde(default = "default_equity_volatility")]
    pub equity_volatility: f64,
    #[serde(default = "default_fund_volatility")]
    pub fund_volatility: f64,
    #[serde(default = "default_fund_volatility")]
    pub etf_volatility: f64,
    /// Floor applied after each tick so prices stay strictly positive.
    #[serde(default = "default_min_price")]
    pub min_price: f64,
    /// Insert the default catalog on startup when instruments are missing.
    #[serde(default = "default_seed_on_start")]
    pub seed_on_start: bool,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            equity_volatility: default_equity_volatility(),
            fund_volatility: default_fund_volatility(),
            etf_volatility: default_fund_volatility(),
            min_price: default_min_price(),
            seed_on_start: default_seed_on_start(),
        }
    }
}

/// Helper functions for serde defaults
fn default_max_connections() -> u32 { 5 }
fn default_equity_volatility() -> f64 { 0.015 }
fn default_fund_volatility() -> f64 { 0.005 }
fn default_min_price() -> f64 { 0.01 }
fn default_seed_on_start() -> bool { true }
