// In crates/database/src/memory.rs

use crate::{Error, HoldingWrite, Result, Store};
use async_trait::async_trait;
use core_types::{Holding, Instrument, Symbol, UserId};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// An in-process [`Store`] for tests and for running the game without PostgreSQL.
///
/// State is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    // Vectors keep seed order and first-buy order respectively.
    instruments: Vec<Instrument>,
    holdings: HashMap<UserId, Vec<Holding>>,
    xp: HashMap<UserId, (u64, u64)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose catalog is already seeded with `instruments`.
    pub fn with_instruments(instruments: Vec<Instrument>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                instruments,
                ..MemoryState::default()
            }),
        }
    }

    /// The stored level for a user, as last written by `set_xp_and_level`.
    pub async fn stored_level(&self, user: UserId) -> Option<u64> {
        self.state.read().await.xp.get(&user).map(|(_, level)| *level)
    }
}

/// Whether a stored holding still has the quantity and average price a writer read.
fn holding_unchanged(stored: Option<&Holding>, expected: Option<&Holding>) -> bool {
    match (stored, expected) {
        (None, None) => true,
        (Some(stored), Some(expected)) => {
            stored.quantity == expected.quantity && stored.avg_price == expected.avg_price
        }
        _ => false,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_holding(&self, user: UserId, symbol: &Symbol) -> Result<Option<Holding>> {
        let state = self.state.read().await;
        Ok(state
            .holdings
            .get(&user)
            .and_then(|holdings| holdings.iter().find(|h| &h.symbol == symbol))
            .cloned())
    }

    async fn upsert_holding(
        &self,
        user: UserId,
        symbol: &Symbol,
        quantity: i64,
        avg_price: Decimal,
        display_name: &str,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let holdings = state.holdings.entry(user).or_default();

        match holdings.iter_mut().find(|h| &h.symbol == symbol) {
            Some(existing) => {
                existing.quantity = quantity;
                existing.avg_price = avg_price;
            }
            None => holdings.push(Holding {
                symbol: symbol.clone(),
                name: display_name.to_string(),
                quantity,
                avg_price,
            }),
        }
        Ok(())
    }

    async fn delete_holding(&self, user: UserId, symbol: &Symbol) -> Result<()> {
        let mut state = self.state.write().await;
        let emptied = match state.holdings.get_mut(&user) {
            Some(holdings) => {
                holdings.retain(|h| &h.symbol != symbol);
                holdings.is_empty()
            }
            None => false,
        };
        if emptied {
            state.holdings.remove(&user);
        }
        Ok(())
    }

    async fn apply_holding_write(
        &self,
        user: UserId,
        symbol: &Symbol,
        expected: Option<&Holding>,
        write: &HoldingWrite,
    ) -> Result<Vec<Holding>> {
        let mut state = self.state.write().await;

        let stored = state
            .holdings
            .get(&user)
            .and_then(|holdings| holdings.iter().find(|h| &h.symbol == symbol));
        if !holding_unchanged(stored, expected) {
            return Err(Error::Conflict(format!("holding {symbol} of user {user}")));
        }

        let holdings = state.holdings.entry(user).or_default();
        let position = holdings.iter().position(|h| &h.symbol == symbol);
        match (write, position) {
            (HoldingWrite::Put { quantity, avg_price, .. }, Some(index)) => {
                holdings[index].quantity = *quantity;
                holdings[index].avg_price = *avg_price;
            }
            (HoldingWrite::Put { quantity, avg_price, display_name }, None) => holdings.push(Holding {
                symbol: symbol.clone(),
                name: display_name.clone(),
                quantity: *quantity,
                avg_price: *avg_price,
            }),
            (HoldingWrite::Remove, Some(index)) => {
                holdings.remove(index);
            }
            (HoldingWrite::Remove, None) => {}
        }

        let after = holdings.clone();
        if after.is_empty() {
            state.holdings.remove(&user);
        }
        Ok(after)
    }

    async fn list_holdings(&self, user: UserId) -> Result<Vec<Holding>> {
        let state = self.state.read().await;
        Ok(state.holdings.get(&user).cloned().unwrap_or_default())
    }

    async fn get_instrument(&self, symbol: &Symbol) -> Result<Option<Instrument>> {
        let state = self.state.read().await;
        Ok(state.instruments.iter().find(|i| &i.symbol == symbol).cloned())
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        Ok(self.state.read().await.instruments.clone())
    }

    async fn set_instrument_price(&self, symbol: &Symbol, new_price: Decimal) -> Result<()> {
        let mut state = self.state.write().await;
        let instrument = state
            .instruments
            .iter_mut()
            .find(|i| &i.symbol == symbol)
            .ok_or_else(|| Error::NotFound(format!("instrument {symbol}")))?;
        instrument.current_price = new_price;
        Ok(())
    }

    async fn replace_instrument_price(&self, symbol: &Symbol, expected: Decimal, new_price: Decimal) -> Result<()> {
        let mut state = self.state.write().await;
        let instrument = state
            .instruments
            .iter_mut()
            .find(|i| &i.symbol == symbol)
            .ok_or_else(|| Error::NotFound(format!("instrument {symbol}")))?;
        if instrument.current_price != expected {
            return Err(Error::Conflict(format!("price of {symbol}")));
        }
        instrument.current_price = new_price;
        Ok(())
    }

    async fn seed_instruments(&self, instruments: &[Instrument]) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut inserted = 0;
        for instrument in instruments {
            if state.instruments.iter().any(|i| i.symbol == instrument.symbol) {
                continue;
            }
            state.instruments.push(instrument.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn get_xp(&self, user: UserId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.xp.get(&user).map(|(xp, _)| *xp).unwrap_or(0))
    }

    async fn set_xp_and_level(&self, user: UserId, xp: u64, level: u64) -> Result<()> {
        self.state.write().await.xp.insert(user, (xp, level));
        Ok(())
    }
}
