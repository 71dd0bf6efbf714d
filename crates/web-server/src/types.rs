// In crates/web-server/src/types.rs

use chrono::{DateTime, Utc};
use core_types::{Holding, InstrumentCategory, InstrumentSnapshot, Progression, Symbol, TradeAction, TradeOrder};
use ledger::{PortfolioValuation, PositionValuation};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Prices go out as JSON numbers; the presentation layer formats them.

/// Body of `POST /api/trade`.
#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub symbol: Symbol,
    pub action: TradeAction,
    pub quantity: i64,
    pub price: Decimal,
}

impl From<TradeRequest> for TradeOrder {
    fn from(request: TradeRequest) -> Self {
        TradeOrder {
            symbol: request.symbol,
            action: request.action,
            quantity: request.quantity,
            price: request.price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HoldingView {
    pub symbol: Symbol,
    pub name: String,
    pub qty: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg: Decimal,
}

impl From<Holding> for HoldingView {
    fn from(holding: Holding) -> Self {
        Self {
            symbol: holding.symbol,
            name: holding.name,
            qty: holding.quantity,
            avg: holding.avg_price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TradeResponse {
    pub success: bool,
    pub portfolio: Vec<HoldingView>,
}

#[derive(Debug, Serialize)]
pub struct AssetView {
    pub symbol: Symbol,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(rename = "type")]
    pub category: InstrumentCategory,
    #[serde(with = "rust_decimal::serde::float")]
    pub change: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub change_pct: Decimal,
}

impl From<InstrumentSnapshot> for AssetView {
    fn from(snapshot: InstrumentSnapshot) -> Self {
        Self {
            symbol: snapshot.symbol,
            name: snapshot.name,
            price: snapshot.price,
            category: snapshot.category,
            change: snapshot.change,
            change_pct: snapshot.change_pct,
        }
    }
}

/// Response of `GET /api/market-data` and `GET /api/instruments`.
#[derive(Debug, Serialize)]
pub struct MarketDataResponse {
    pub assets: Vec<AssetView>,
}

impl From<Vec<InstrumentSnapshot>> for MarketDataResponse {
    fn from(snapshots: Vec<InstrumentSnapshot>) -> Self {
        Self {
            assets: snapshots.into_iter().map(AssetView::from).collect(),
        }
    }
}

/// Body of `POST /api/earn-xp`. A missing amount awards nothing.
#[derive(Debug, Deserialize)]
pub struct EarnXpRequest {
    #[serde(default)]
    pub amount: u64,
}

#[derive(Debug, Serialize)]
pub struct ProgressionResponse {
    pub success: bool,
    pub xp: u64,
    pub level: u64,
}

impl From<Progression> for ProgressionResponse {
    fn from(progression: Progression) -> Self {
        Self {
            success: true,
            xp: progression.xp,
            level: progression.level,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PositionView {
    pub symbol: Symbol,
    pub name: String,
    pub qty: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub avg: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub market_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unrealized_pnl: Decimal,
}

impl From<PositionValuation> for PositionView {
    fn from(position: PositionValuation) -> Self {
        Self {
            symbol: position.symbol,
            name: position.name,
            qty: position.quantity,
            avg: position.avg_price,
            price: position.current_price,
            market_value: position.market_value,
            unrealized_pnl: position.unrealized_pnl,
        }
    }
}

/// Response of `GET /api/portfolio`.
#[derive(Debug, Serialize)]
pub struct PortfolioResponse {
    pub as_of: DateTime<Utc>,
    pub positions: Vec<PositionView>,
    #[serde(with = "rust_decimal::serde::float")]
    pub invested: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub market_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unrealized_pnl: Decimal,
}

impl From<PortfolioValuation> for PortfolioResponse {
    fn from(valuation: PortfolioValuation) -> Self {
        Self {
            as_of: valuation.as_of,
            positions: valuation.positions.into_iter().map(PositionView::from).collect(),
            invested: valuation.total_cost,
            market_value: valuation.total_market_value,
            unrealized_pnl: valuation.total_unrealized_pnl,
        }
    }
}
