// In crates/market/src/volatility.rs

use crate::{Error, Result};
use app_config::MarketSettings;
use core_types::{Instrument, InstrumentCategory};
use num_traits::FromPrimitive;
use rand::Rng;
use rust_decimal::Decimal;

/// How far a single tick may move each category of instrument.
///
/// Each tick adds `uniform(-v, +v) × base_price` to the current price. The
/// result feeds the next tick, so this is an unbounded random walk: over
/// many ticks a price can wander arbitrarily far from its base. Only the
/// `min_price` floor keeps it strictly positive. A price already below the
/// floor is never pushed up to it, so no step exceeds `v × base_price`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityModel {
    equity: f64,
    fund: f64,
    etf: f64,
    min_price: Decimal,
}

impl VolatilityModel {
    pub fn from_settings(settings: &MarketSettings) -> Result<Self> {
        let check = |name: &str, value: f64| {
            if value.is_finite() && (0.0..1.0).contains(&value) {
                Ok(value)
            } else {
                Err(Error::InvalidSettings(format!("{name} must be in [0, 1), got {value}")))
            }
        };

        let min_price = Decimal::from_f64(settings.min_price)
            .filter(|price| *price > Decimal::ZERO)
            .ok_or_else(|| {
                Error::InvalidSettings(format!("min_price must be positive, got {}", settings.min_price))
            })?;

        Ok(Self {
            equity: check("equity_volatility", settings.equity_volatility)?,
            fund: check("fund_volatility", settings.fund_volatility)?,
            etf: check("etf_volatility", settings.etf_volatility)?,
            min_price,
        })
    }

    pub fn volatility(&self, category: InstrumentCategory) -> f64 {
        match category {
            InstrumentCategory::Equity => self.equity,
            InstrumentCategory::Fund => self.fund,
            InstrumentCategory::Etf => self.etf,
        }
    }

    pub fn min_price(&self) -> Decimal {
        self.min_price
    }

    /// Draws the instrument's next price.
    pub fn next_price<R: Rng + ?Sized>(&self, instrument: &Instrument, rng: &mut R) -> Decimal {
        let volatility = self.volatility(instrument.category);
        let draw = if volatility > 0.0 {
            rng.gen_range(-volatility..=volatility)
        } else {
            0.0
        };
        let shift = Decimal::from_f64(draw).unwrap_or(Decimal::ZERO) * instrument.base_price;

        let floor = self.min_price.min(instrument.current_price);
        (instrument.current_price + shift).max(floor)
    }
}

impl Default for VolatilityModel {
    fn default() -> Self {
        Self {
            equity: 0.015,
            fund: 0.005,
            etf: 0.005,
            min_price: Decimal::new(1, 2),
        }
    }
}
