// In crates/ledger/src/types.rs

use chrono::{DateTime, Utc};
use core_types::{Holding, Symbol};
use rust_decimal::Decimal;
use serde::Serialize;

/// One holding priced at the instrument's current market price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionValuation {
    pub symbol: Symbol,
    pub name: String,
    pub quantity: i64,
    pub avg_price: Decimal,
    pub current_price: Decimal,
    /// quantity × avg_price
    pub cost_basis: Decimal,
    /// quantity × current_price
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
}

impl PositionValuation {
    pub fn new(holding: &Holding, current_price: Decimal) -> Self {
        let quantity = Decimal::from(holding.quantity);
        let cost_basis = quantity * holding.avg_price;
        let market_value = quantity * current_price;
        Self {
            symbol: holding.symbol.clone(),
            name: holding.name.clone(),
            quantity: holding.quantity,
            avg_price: holding.avg_price,
            current_price,
            cost_basis,
            market_value,
            unrealized_pnl: market_value - cost_basis,
        }
    }
}

/// The user's whole simulated portfolio marked to market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioValuation {
    pub as_of: DateTime<Utc>,
    pub positions: Vec<PositionValuation>,
    pub total_cost: Decimal,
    pub total_market_value: Decimal,
    pub total_unrealized_pnl: Decimal,
}

impl PortfolioValuation {
    pub fn new(as_of: DateTime<Utc>, positions: Vec<PositionValuation>) -> Self {
        let total_cost: Decimal = positions.iter().map(|p| p.cost_basis).sum();
        let total_market_value: Decimal = positions.iter().map(|p| p.market_value).sum();
        Self {
            as_of,
            total_unrealized_pnl: total_market_value - total_cost,
            total_cost,
            total_market_value,
            positions,
        }
    }
}
