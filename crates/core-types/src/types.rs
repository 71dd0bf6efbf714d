// In crates/core-types/src/types.rs

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Experience points needed to advance one level.
pub const XP_PER_LEVEL: u64 = 500;

/// The largest xp total any store can hold (a signed 64-bit column).
pub const MAX_XP: u64 = i64::MAX as u64;

/// Identifies the player whose holdings and progression are being touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ticker symbol in the simulated market (e.g., "RELIANCE").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Symbol(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentCategory {
    Equity,
    Fund,
    Etf,
}

impl InstrumentCategory {
    /// The label used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentCategory::Equity => "equity",
            InstrumentCategory::Fund => "fund",
            InstrumentCategory::Etf => "etf",
        }
    }
}

impl fmt::Display for InstrumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "equity" => Ok(InstrumentCategory::Equity),
            "fund" => Ok(InstrumentCategory::Fund),
            "etf" => Ok(InstrumentCategory::Etf),
            other => Err(format!("unknown instrument category '{other}'")),
        }
    }
}

/// A tradable entry in the simulated market catalog.
///
/// `base_price` is the reference price fixed at seeding; `current_price`
/// is what the price feed walks on every tick. Both are always positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: Symbol,
    pub name: String,
    pub category: InstrumentCategory,
    pub sector: Option<String>,
    pub base_price: Decimal,
    pub current_price: Decimal,
}

impl Instrument {
    /// A freshly seeded instrument trades at its base price.
    pub fn seeded(
        symbol: &str,
        name: &str,
        base_price: Decimal,
        category: InstrumentCategory,
        sector: Option<&str>,
    ) -> Self {
        Self {
            symbol: Symbol::from(symbol),
            name: name.to_string(),
            category,
            sector: sector.map(str::to_string),
            base_price,
            current_price: base_price,
        }
    }
}

/// Point-in-time view of an instrument as reported by the price feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSnapshot {
    pub symbol: Symbol,
    pub name: String,
    pub category: InstrumentCategory,
    /// Current price rounded to 2 decimals.
    pub price: Decimal,
    /// Absolute change versus the base price, rounded to 2 decimals.
    pub change: Decimal,
    /// Percentage change versus the base price, rounded to 2 decimals.
    pub change_pct: Decimal,
}

impl From<&Instrument> for InstrumentSnapshot {
    fn from(instrument: &Instrument) -> Self {
        let delta = instrument.current_price - instrument.base_price;
        let change_pct = if instrument.base_price.is_zero() {
            Decimal::ZERO
        } else {
            delta / instrument.base_price * dec!(100)
        };

        Self {
            symbol: instrument.symbol.clone(),
            name: instrument.name.clone(),
            category: instrument.category,
            price: instrument.current_price.round_dp(2),
            change: delta.round_dp(2),
            change_pct: change_pct.round_dp(2),
        }
    }
}

/// A user's position in one instrument.
///
/// A stored holding always has `quantity > 0`; fully sold positions are deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: Symbol,
    /// Instrument display name captured on the first buy.
    pub name: String,
    pub quantity: i64,
    /// Quantity-weighted average price paid for the shares currently held.
    pub avg_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => f.write_str("buy"),
            TradeAction::Sell => f.write_str("sell"),
        }
    }
}

/// A buy or sell instruction against a user's holdings.
///
/// The execution `price` is supplied by the caller, typically from the last
/// price-feed snapshot it rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrder {
    pub symbol: Symbol,
    pub action: TradeAction,
    pub quantity: i64,
    pub price: Decimal,
}

impl TradeOrder {
    pub fn buy(symbol: impl Into<Symbol>, quantity: i64, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            action: TradeAction::Buy,
            quantity,
            price,
        }
    }

    pub fn sell(symbol: impl Into<Symbol>, quantity: i64, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            action: TradeAction::Sell,
            quantity,
            price,
        }
    }

    /// Rejects orders that must never reach the ledger.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.as_str().trim().is_empty() {
            return Err(Error::invalid_order("symbol must not be empty"));
        }
        if self.quantity <= 0 {
            return Err(Error::invalid_order(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        if self.price <= Decimal::ZERO {
            return Err(Error::invalid_order(format!(
                "price must be positive, got {}",
                self.price
            )));
        }
        Ok(())
    }
}

/// Experience points and the level derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub xp: u64,
    pub level: u64,
}

impl Progression {
    pub fn from_xp(xp: u64) -> Self {
        Self {
            xp,
            level: level_for_xp(xp),
        }
    }
}

/// Levels start at 1 and advance every [`XP_PER_LEVEL`] points.
pub fn level_for_xp(xp: u64) -> u64 {
    xp / XP_PER_LEVEL + 1
}
