// In crates/market/src/feed.rs

use crate::volatility::VolatilityModel;
use core_types::{InstrumentSnapshot, Result};
use database::SharedStore;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, RwLock};

/// Advances the simulated market one tick at a time.
///
/// There is no background clock: prices only move when [`PriceFeed::tick`]
/// is called. Ticks run one after another, never interleaved, and
/// [`PriceFeed::catalog`] never sees one half applied.
pub struct PriceFeed {
    store: SharedStore,
    model: VolatilityModel,
    // Written for the whole tick, read for a catalog view.
    gate: RwLock<()>,
    rng: Mutex<StdRng>,
}

impl PriceFeed {
    pub fn new(store: SharedStore, model: VolatilityModel) -> Self {
        Self::with_rng(store, model, StdRng::from_entropy())
    }

    /// A feed driven by a caller-supplied generator, for reproducible runs.
    pub fn with_rng(store: SharedStore, model: VolatilityModel, rng: StdRng) -> Self {
        Self {
            store,
            model,
            gate: RwLock::new(()),
            rng: Mutex::new(rng),
        }
    }

    /// Moves every instrument in the catalog and returns the new prices.
    ///
    /// Each instrument is written on its own, and only if its price is still
    /// the one this tick read. If a write fails, or another process moved the
    /// price first, the instrument keeps that price and is left out of the
    /// result while the rest of the catalog still moves.
    pub async fn tick(&self) -> Result<Vec<InstrumentSnapshot>> {
        let _gate = self.gate.write().await;
        let mut rng = self.rng.lock().await;

        let instruments = self.store.list_instruments().await?;
        let mut snapshots = Vec::with_capacity(instruments.len());
        let mut failed = 0usize;

        for mut instrument in instruments {
            let new_price = self.model.next_price(&instrument, &mut *rng);

            if let Err(err) = self
                .store
                .replace_instrument_price(&instrument.symbol, instrument.current_price, new_price)
                .await
            {
                tracing::warn!(symbol = %instrument.symbol, error = %err, "Failed to update instrument price");
                failed += 1;
                continue;
            }

            instrument.current_price = new_price;
            snapshots.push(InstrumentSnapshot::from(&instrument));
        }

        tracing::debug!(updated = snapshots.len(), failed, "Price feed ticked");

        Ok(snapshots)
    }

    /// The catalog at its current prices, without advancing the market.
    pub async fn catalog(&self) -> Result<Vec<InstrumentSnapshot>> {
        let _gate = self.gate.read().await;
        let instruments = self.store.list_instruments().await?;
        Ok(instruments.iter().map(InstrumentSnapshot::from).collect())
    }
}
