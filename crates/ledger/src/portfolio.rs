// In crates/ledger/src/portfolio.rs

use crate::locks::KeyedLocks;
use crate::types::{PortfolioValuation, PositionValuation};
use chrono::Utc;
use core_types::{Error, Holding, Result, Symbol, TradeAction, TradeOrder, UserId};
use database::{HoldingWrite, SharedStore};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// How often a trade is re-read and retried when another writer changes the holding first.
const MAX_WRITE_ATTEMPTS: u32 = 5;

/// What a trade does to the holding it touches.
#[derive(Debug, Clone, PartialEq)]
enum PositionChange {
    /// First buy of an instrument.
    Open { quantity: i64, avg_price: Decimal },
    Update { quantity: i64, avg_price: Decimal },
    /// Sold down to zero.
    Close,
}

/// Applies buy and sell orders to users' simulated holdings.
///
/// Orders against the same (user, symbol) are applied one at a time, so a
/// holding is never read by one order while another is rewriting it.
pub struct Ledger {
    store: SharedStore,
    locks: KeyedLocks<(UserId, Symbol)>,
}

impl Ledger {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Executes `order` for `user` and returns their holdings after the trade.
    ///
    /// The write and the returned holdings come from one atomic store step, so
    /// `Ok` always means the order executed and any `Err` means it did not. A
    /// rejected order (`InvalidOrder`, `UnknownInstrument`,
    /// `InsufficientHoldings`) leaves the stored holdings untouched.
    pub async fn place_trade(&self, user: UserId, order: &TradeOrder) -> Result<Vec<Holding>> {
        order.validate()?;

        let key = (user, order.symbol.clone());
        let _guard = self.locks.lock(&key).await;

        // The lock only covers this process; the store's conditional write
        // catches other writers to the same row, and the order is re-priced
        // against what they left behind.
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let existing = self.store.get_holding(user, &order.symbol).await?;
            let change = next_position(existing.as_ref(), order)?;
            let write = self.holding_write(&change, existing.as_ref(), &order.symbol).await?;

            match self
                .store
                .apply_holding_write(user, &order.symbol, existing.as_ref(), &write)
                .await
            {
                Ok(holdings) => {
                    log_change(user, order, &change);
                    return Ok(holdings);
                }
                Err(database::Error::Conflict(what)) => {
                    tracing::debug!(%user, symbol = %order.symbol, attempt, %what, "Holding changed underneath trade, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::warn!(%user, symbol = %order.symbol, "Giving up on trade after repeated concurrent updates");
        Err(Error::StorageUnavailable(format!(
            "holding {} kept changing during the trade",
            order.symbol
        )))
    }

    /// The store write for `change`. Opening a holding records the instrument's display name.
    async fn holding_write(
        &self,
        change: &PositionChange,
        existing: Option<&Holding>,
        symbol: &Symbol,
    ) -> Result<HoldingWrite> {
        Ok(match *change {
            PositionChange::Open { quantity, avg_price } => {
                let instrument = self
                    .store
                    .get_instrument(symbol)
                    .await?
                    .ok_or_else(|| Error::UnknownInstrument(symbol.clone()))?;
                HoldingWrite::Put {
                    quantity,
                    avg_price,
                    display_name: instrument.name,
                }
            }
            PositionChange::Update { quantity, avg_price } => HoldingWrite::Put {
                quantity,
                avg_price,
                // The display name is only written when the row is created.
                display_name: existing.map(|h| h.name.clone()).unwrap_or_default(),
            },
            PositionChange::Close => HoldingWrite::Remove,
        })
    }

    /// The user's current holdings, in first-buy order.
    pub async fn holdings(&self, user: UserId) -> Result<Vec<Holding>> {
        Ok(self.store.list_holdings(user).await?)
    }

    /// Marks every holding to the instrument's current price.
    ///
    /// A holding whose instrument is no longer in the catalog is valued at its
    /// average price.
    pub async fn valuation(&self, user: UserId) -> Result<PortfolioValuation> {
        let holdings = self.store.list_holdings(user).await?;
        let prices: HashMap<Symbol, Decimal> = self
            .store
            .list_instruments()
            .await?
            .into_iter()
            .map(|instrument| (instrument.symbol, instrument.current_price))
            .collect();

        let positions = holdings
            .iter()
            .map(|holding| {
                let current_price = match prices.get(&holding.symbol) {
                    Some(price) => *price,
                    None => {
                        tracing::warn!(%user, symbol = %holding.symbol, "Holding has no catalog price");
                        holding.avg_price
                    }
                };
                PositionValuation::new(holding, current_price)
            })
            .collect();

        Ok(PortfolioValuation::new(Utc::now(), positions))
    }
}

fn log_change(user: UserId, order: &TradeOrder, change: &PositionChange) {
    match *change {
        PositionChange::Open { quantity, avg_price } => {
            tracing::info!(%user, symbol = %order.symbol, quantity, %avg_price, "Opened holding");
        }
        PositionChange::Update { quantity, avg_price } => {
            tracing::info!(
                %user,
                symbol = %order.symbol,
                action = %order.action,
                traded = order.quantity,
                price = %order.price,
                quantity,
                %avg_price,
                "Updated holding"
            );
        }
        PositionChange::Close => {
            tracing::info!(%user, symbol = %order.symbol, traded = order.quantity, "Closed holding");
        }
    }
}

/// Computes the holding that results from applying `order` to `existing`.
fn next_position(existing: Option<&Holding>, order: &TradeOrder) -> Result<PositionChange> {
    match (order.action, existing) {
        (TradeAction::Buy, None) => Ok(PositionChange::Open {
            quantity: order.quantity,
            avg_price: order.price,
        }),
        (TradeAction::Buy, Some(held)) => {
            let quantity = held
                .quantity
                .checked_add(order.quantity)
                .ok_or_else(|| Error::invalid_order("resulting quantity is too large"))?;
            let avg_price = weighted_average(held.quantity, held.avg_price, order.quantity, order.price)?;
            Ok(PositionChange::Update { quantity, avg_price })
        }
        (TradeAction::Sell, held) => {
            let held_quantity = held.map(|h| h.quantity).unwrap_or(0);
            if held_quantity < order.quantity {
                return Err(Error::InsufficientHoldings {
                    symbol: order.symbol.clone(),
                    requested: order.quantity,
                    held: held_quantity,
                });
            }
            match held {
                Some(held) if held.quantity > order.quantity => Ok(PositionChange::Update {
                    quantity: held.quantity - order.quantity,
                    // Selling never changes the cost basis of what remains.
                    avg_price: held.avg_price,
                }),
                _ => Ok(PositionChange::Close),
            }
        }
    }
}

/// Quantity-weighted cost basis after adding `added_qty` shares at `price`.
fn weighted_average(held_qty: i64, held_avg: Decimal, added_qty: i64, price: Decimal) -> Result<Decimal> {
    let overflow = || Error::invalid_order("cost basis exceeds representable range");

    let held_cost = Decimal::from(held_qty).checked_mul(held_avg).ok_or_else(overflow)?;
    let added_cost = Decimal::from(added_qty).checked_mul(price).ok_or_else(overflow)?;
    let total_cost = held_cost.checked_add(added_cost).ok_or_else(overflow)?;
    let total_qty = Decimal::from(held_qty) + Decimal::from(added_qty);

    total_cost.checked_div(total_qty).ok_or_else(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_types::{Instrument, InstrumentCategory};
    use database::{MemoryStore, Store};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    const USER: UserId = UserId(1);

    fn catalog() -> Vec<Instrument> {
        vec![
            Instrument::seeded("RELIANCE", "Reliance Industries", dec!(2911.22), InstrumentCategory::Equity, Some("Energy")),
            Instrument::seeded("ITC", "ITC Limited", dec!(430.50), InstrumentCategory::Equity, Some("FMCG")),
            Instrument::seeded("GOLDBEES", "Nippon India Gold", dec!(56.80), InstrumentCategory::Etf, Some("Gold")),
        ]
    }

    fn ledger() -> (Arc<MemoryStore>, Ledger) {
        let store = Arc::new(MemoryStore::with_instruments(catalog()));
        let ledger = Ledger::new(store.clone());
        (store, ledger)
    }

    #[tokio::test]
    async fn buy_buy_sell_scenario() {
        let (_, ledger) = ledger();

        let after_first = ledger
            .place_trade(USER, &TradeOrder::buy("RELIANCE", 10, dec!(2911.22)))
            .await
            .unwrap();
        assert_eq!(after_first.len(), 1);
        assert_eq!(after_first[0].quantity, 10);
        assert_eq!(after_first[0].avg_price, dec!(2911.22));
        assert_eq!(after_first[0].name, "Reliance Industries");

        let after_second = ledger
            .place_trade(USER, &TradeOrder::buy("RELIANCE", 5, dec!(3000.00)))
            .await
            .unwrap();
        assert_eq!(after_second[0].quantity, 15);
        assert_eq!(after_second[0].avg_price.round_dp(2), dec!(2940.81));

        let after_sell = ledger
            .place_trade(USER, &TradeOrder::sell("RELIANCE", 15, dec!(2950)))
            .await
            .unwrap();
        assert!(after_sell.is_empty());
        assert!(ledger.holdings(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn average_price_is_quantity_weighted_and_order_independent() {
        let buys = [(3, dec!(100)), (7, dec!(130.5)), (1, dec!(95.25)), (9, dec!(101))];
        let expected = dec!(2217.75) / dec!(20); // (300 + 913.5 + 95.25 + 909) / 20

        let (_, forward) = ledger();
        for (qty, price) in buys {
            forward.place_trade(USER, &TradeOrder::buy("ITC", qty, price)).await.unwrap();
        }
        let (_, backward) = ledger();
        for (qty, price) in buys.iter().rev() {
            backward.place_trade(USER, &TradeOrder::buy("ITC", *qty, *price)).await.unwrap();
        }

        let forward = forward.holdings(USER).await.unwrap();
        let backward = backward.holdings(USER).await.unwrap();
        assert_eq!(forward[0].quantity, 20);
        assert_eq!(forward[0].avg_price.round_dp(10), expected.round_dp(10));
        assert_eq!(backward[0].avg_price.round_dp(10), expected.round_dp(10));
    }

    #[tokio::test]
    async fn partial_sell_keeps_average_price() {
        let (_, ledger) = ledger();
        ledger.place_trade(USER, &TradeOrder::buy("ITC", 4, dec!(400))).await.unwrap();
        ledger.place_trade(USER, &TradeOrder::buy("ITC", 4, dec!(500))).await.unwrap();

        let holdings = ledger
            .place_trade(USER, &TradeOrder::sell("ITC", 5, dec!(1)))
            .await
            .unwrap();
        assert_eq!(holdings[0].quantity, 3);
        assert_eq!(holdings[0].avg_price, dec!(450));
    }

    #[tokio::test]
    async fn oversell_is_rejected_and_holding_unchanged() {
        let (_, ledger) = ledger();
        ledger.place_trade(USER, &TradeOrder::buy("ITC", 2, dec!(430))).await.unwrap();

        let err = ledger
            .place_trade(USER, &TradeOrder::sell("ITC", 3, dec!(430)))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientHoldings { symbol: "ITC".into(), requested: 3, held: 2 }
        );

        let holdings = ledger.holdings(USER).await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].quantity, 2);
    }

    #[tokio::test]
    async fn selling_without_a_holding_is_rejected() {
        let (_, ledger) = ledger();
        ledger.place_trade(USER, &TradeOrder::buy("ITC", 1, dec!(430))).await.unwrap();

        let err = ledger
            .place_trade(USER, &TradeOrder::sell("RELIANCE", 5, dec!(2900)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientHoldings { held: 0, .. }));

        let symbols: Vec<_> = ledger.holdings(USER).await.unwrap().into_iter().map(|h| h.symbol).collect();
        assert_eq!(symbols, vec![Symbol::from("ITC")]);
    }

    #[tokio::test]
    async fn first_buy_of_unknown_symbol_is_rejected() {
        let (_, ledger) = ledger();
        let err = ledger
            .place_trade(USER, &TradeOrder::buy("NOPE", 1, dec!(10)))
            .await
            .unwrap_err();
        assert_eq!(err, Error::UnknownInstrument("NOPE".into()));
        assert!(ledger.holdings(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_orders_never_touch_the_store() {
        let (_, ledger) = ledger();
        for order in [
            TradeOrder::buy("ITC", 0, dec!(10)),
            TradeOrder::buy("ITC", 1, dec!(-1)),
            TradeOrder::sell("ITC", -1, dec!(10)),
        ] {
            let err = ledger.place_trade(USER, &order).await.unwrap_err();
            assert!(matches!(err, Error::InvalidOrder { .. }), "{order:?} gave {err:?}");
        }
        assert!(ledger.holdings(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn holdings_are_isolated_per_user() {
        let (_, ledger) = ledger();
        ledger.place_trade(UserId(1), &TradeOrder::buy("ITC", 1, dec!(430))).await.unwrap();
        ledger.place_trade(UserId(2), &TradeOrder::buy("GOLDBEES", 3, dec!(56))).await.unwrap();

        let first = ledger.holdings(UserId(1)).await.unwrap();
        let second = ledger.holdings(UserId(2)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].symbol.as_str(), "ITC");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].symbol.as_str(), "GOLDBEES");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_orders_on_one_holding_do_not_lose_updates() {
        let (_, ledger) = ledger();
        let ledger = Arc::new(ledger);
        ledger.place_trade(USER, &TradeOrder::buy("ITC", 100, dec!(400))).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..40 {
            let ledger = ledger.clone();
            tasks.push(tokio::spawn(async move {
                let order = if i % 2 == 0 {
                    TradeOrder::buy("ITC", 3, dec!(410))
                } else {
                    TradeOrder::sell("ITC", 1, dec!(410))
                };
                ledger.place_trade(USER, &order).await
            }));
        }
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        // 100 + 20 × 3 − 20 × 1
        let holdings = ledger.holdings(USER).await.unwrap();
        assert_eq!(holdings[0].quantity, 140);
    }

    #[tokio::test]
    async fn valuation_marks_holdings_to_current_price() {
        let (store, ledger) = ledger();
        ledger.place_trade(USER, &TradeOrder::buy("ITC", 10, dec!(400))).await.unwrap();
        ledger.place_trade(USER, &TradeOrder::buy("GOLDBEES", 4, dec!(50))).await.unwrap();
        store.set_instrument_price(&"ITC".into(), dec!(420)).await.unwrap();

        let valuation = ledger.valuation(USER).await.unwrap();
        assert_eq!(valuation.positions.len(), 2);
        assert_eq!(valuation.positions[0].market_value, dec!(4200));
        assert_eq!(valuation.positions[0].unrealized_pnl, dec!(200));
        // GOLDBEES still at its 56.80 seed price.
        assert_eq!(valuation.positions[1].market_value, dec!(227.20));
        assert_eq!(valuation.total_cost, dec!(4200));
        assert_eq!(valuation.total_unrealized_pnl, dec!(227.20));
    }

    /// Delegates to a `MemoryStore` but can be told to fail writes or listings,
    /// or to let another writer change the holding just before the next write.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: AtomicBool,
        fail_listing: AtomicBool,
        interfere: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::with_instruments(catalog()),
                ..Self::default()
            }
        }

        fn check_writes(&self) -> database::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(database::Error::Corrupt("disk on fire".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn get_holding(&self, user: UserId, symbol: &Symbol) -> database::Result<Option<Holding>> {
            self.inner.get_holding(user, symbol).await
        }
        async fn upsert_holding(&self, user: UserId, symbol: &Symbol, quantity: i64, avg_price: Decimal, name: &str) -> database::Result<()> {
            self.check_writes()?;
            self.inner.upsert_holding(user, symbol, quantity, avg_price, name).await
        }
        async fn delete_holding(&self, user: UserId, symbol: &Symbol) -> database::Result<()> {
            self.check_writes()?;
            self.inner.delete_holding(user, symbol).await
        }
        async fn apply_holding_write(&self, user: UserId, symbol: &Symbol, expected: Option<&Holding>, write: &HoldingWrite) -> database::Result<Vec<Holding>> {
            self.check_writes()?;
            if self.interfere.swap(false, Ordering::SeqCst) {
                // Another process buys 10 more at the same price.
                if let Some(held) = self.inner.get_holding(user, symbol).await? {
                    self.inner.upsert_holding(user, symbol, held.quantity + 10, held.avg_price, &held.name).await?;
                }
            }
            self.inner.apply_holding_write(user, symbol, expected, write).await
        }
        async fn list_holdings(&self, user: UserId) -> database::Result<Vec<Holding>> {
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(database::Error::Corrupt("down".into()));
            }
            self.inner.list_holdings(user).await
        }
        async fn get_instrument(&self, symbol: &Symbol) -> database::Result<Option<Instrument>> {
            self.inner.get_instrument(symbol).await
        }
        async fn list_instruments(&self) -> database::Result<Vec<Instrument>> {
            self.inner.list_instruments().await
        }
        async fn set_instrument_price(&self, symbol: &Symbol, new_price: Decimal) -> database::Result<()> {
            self.inner.set_instrument_price(symbol, new_price).await
        }
        async fn replace_instrument_price(&self, symbol: &Symbol, expected: Decimal, new_price: Decimal) -> database::Result<()> {
            self.inner.replace_instrument_price(symbol, expected, new_price).await
        }
        async fn seed_instruments(&self, instruments: &[Instrument]) -> database::Result<u64> {
            self.inner.seed_instruments(instruments).await
        }
        async fn get_xp(&self, user: UserId) -> database::Result<u64> {
            self.inner.get_xp(user).await
        }
        async fn set_xp_and_level(&self, user: UserId, xp: u64, level: u64) -> database::Result<()> {
            self.inner.set_xp_and_level(user, xp, level).await
        }
    }

    #[tokio::test]
    async fn storage_failures_surface_as_storage_unavailable() {
        let store = Arc::new(FlakyStore::new());
        let ledger = Ledger::new(store.clone());
        ledger.place_trade(USER, &TradeOrder::buy("ITC", 5, dec!(400))).await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = ledger
            .place_trade(USER, &TradeOrder::sell("ITC", 5, dec!(400)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));

        store.fail_writes.store(false, Ordering::SeqCst);
        let holdings = ledger.holdings(USER).await.unwrap();
        assert_eq!(holdings[0].quantity, 5);
    }

    #[tokio::test]
    async fn executed_trade_reports_success_even_if_listing_is_down() {
        let store = Arc::new(FlakyStore::new());
        let ledger = Ledger::new(store.clone());
        store.fail_listing.store(true, Ordering::SeqCst);

        let holdings = ledger
            .place_trade(USER, &TradeOrder::buy("ITC", 5, dec!(430)))
            .await
            .unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].quantity, 5);

        let stored = store.inner.get_holding(USER, &"ITC".into()).await.unwrap().unwrap();
        assert_eq!(stored, holdings[0]);
    }

    #[tokio::test]
    async fn trade_is_reapplied_over_a_concurrent_writer() {
        let store = Arc::new(FlakyStore::new());
        let ledger = Ledger::new(store.clone());
        ledger.place_trade(USER, &TradeOrder::buy("ITC", 10, dec!(400))).await.unwrap();

        store.interfere.store(true, Ordering::SeqCst);
        let holdings = ledger
            .place_trade(USER, &TradeOrder::sell("ITC", 5, dec!(410)))
            .await
            .unwrap();

        // 10 + 10 from the other writer − 5, not 10 − 5.
        assert_eq!(holdings[0].quantity, 15);
        assert_eq!(holdings[0].avg_price, dec!(400));
    }

    #[test]
    fn weighted_average_matches_formula() {
        let avg = weighted_average(10, dec!(2911.22), 5, dec!(3000.00)).unwrap();
        assert_eq!(avg.round_dp(2), dec!(2940.81));
        assert_eq!(weighted_average(1, dec!(10), 1, dec!(20)).unwrap(), dec!(15));
    }
}
