// In crates/database/src/postgres.rs

use crate::{Error, HoldingWrite, Result, Store};
use async_trait::async_trait;
use core_types::{Holding, Instrument, InstrumentCategory, Symbol, UserId};
use rust_decimal::Decimal;
use sqlx::PgPool;

/// A wrapper around the `sqlx` connection pool.
#[derive(Debug, Clone)]
pub struct Db(PgPool);

impl Db {
    pub fn new(pool: PgPool) -> Self {
        Db(pool)
    }

    pub fn pool(&self) -> &PgPool {
        &self.0
    }
}

#[derive(sqlx::FromRow)]
struct HoldingRow {
    symbol: String,
    company_name: String,
    quantity: i64,
    avg_price: Decimal,
}

impl From<HoldingRow> for Holding {
    fn from(row: HoldingRow) -> Self {
        Holding {
            symbol: Symbol(row.symbol),
            name: row.company_name,
            quantity: row.quantity,
            avg_price: row.avg_price,
        }
    }
}

#[derive(sqlx::FromRow)]
struct InstrumentRow {
    symbol: String,
    name: String,
    category: String,
    sector: Option<String>,
    base_price: Decimal,
    current_price: Decimal,
}

impl TryFrom<InstrumentRow> for Instrument {
    type Error = Error;

    fn try_from(row: InstrumentRow) -> Result<Self> {
        let category = row
            .category
            .parse::<InstrumentCategory>()
            .map_err(|reason| Error::Corrupt(format!("instrument {}: {reason}", row.symbol)))?;

        Ok(Instrument {
            symbol: Symbol(row.symbol),
            name: row.name,
            category,
            sector: row.sector,
            base_price: row.base_price,
            current_price: row.current_price,
        })
    }
}

const LIST_HOLDINGS: &str = r#"
    SELECT symbol, company_name, quantity, avg_price
    FROM game_portfolio
    WHERE user_id = $1
    ORDER BY id
"#;

fn to_db_counter(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::Corrupt(format!("{field} {value} exceeds BIGINT")))
}

#[async_trait]
impl Store for Db {
    async fn get_holding(&self, user: UserId, symbol: &Symbol) -> Result<Option<Holding>> {
        let row = sqlx::query_as::<_, HoldingRow>(
            r#"
            SELECT symbol, company_name, quantity, avg_price
            FROM game_portfolio
            WHERE user_id = $1 AND symbol = $2
            "#,
        )
        .bind(user.0)
        .bind(symbol.as_str())
        .fetch_optional(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(row.map(Holding::from))
    }

    async fn upsert_holding(
        &self,
        user: UserId,
        symbol: &Symbol,
        quantity: i64,
        avg_price: Decimal,
        display_name: &str,
    ) -> Result<()> {
        // Updating in place keeps the row id, which is what `list_holdings` orders by.
        sqlx::query(
            r#"
            INSERT INTO game_portfolio (user_id, symbol, company_name, quantity, avg_price)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, symbol)
            DO UPDATE SET quantity = EXCLUDED.quantity, avg_price = EXCLUDED.avg_price
            "#,
        )
        .bind(user.0)
        .bind(symbol.as_str())
        .bind(display_name)
        .bind(quantity)
        .bind(avg_price)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(())
    }

    async fn delete_holding(&self, user: UserId, symbol: &Symbol) -> Result<()> {
        sqlx::query("DELETE FROM game_portfolio WHERE user_id = $1 AND symbol = $2")
            .bind(user.0)
            .bind(symbol.as_str())
            .execute(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        Ok(())
    }

    async fn apply_holding_write(
        &self,
        user: UserId,
        symbol: &Symbol,
        expected: Option<&Holding>,
        write: &HoldingWrite,
    ) -> Result<Vec<Holding>> {
        let mut tx = self.0.begin().await.map_err(Error::OperationFailed)?;

        // Every statement matches the row as the caller read it, so zero
        // affected rows means another writer got there first.
        let applied = match (expected, write) {
            (None, HoldingWrite::Put { quantity, avg_price, display_name }) => {
                sqlx::query(
                    r#"
                    INSERT INTO game_portfolio (user_id, symbol, company_name, quantity, avg_price)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (user_id, symbol) DO NOTHING
                    "#,
                )
                .bind(user.0)
                .bind(symbol.as_str())
                .bind(display_name.as_str())
                .bind(*quantity)
                .bind(*avg_price)
                .execute(&mut *tx)
                .await
                .map_err(Error::OperationFailed)?
                .rows_affected()
                    == 1
            }
            (Some(held), HoldingWrite::Put { quantity, avg_price, .. }) => {
                sqlx::query(
                    r#"
                    UPDATE game_portfolio
                    SET quantity = $3, avg_price = $4
                    WHERE user_id = $1 AND symbol = $2 AND quantity = $5 AND avg_price = $6
                    "#,
                )
                .bind(user.0)
                .bind(symbol.as_str())
                .bind(*quantity)
                .bind(*avg_price)
                .bind(held.quantity)
                .bind(held.avg_price)
                .execute(&mut *tx)
                .await
                .map_err(Error::OperationFailed)?
                .rows_affected()
                    == 1
            }
            (Some(held), HoldingWrite::Remove) => {
                sqlx::query(
                    r#"
                    DELETE FROM game_portfolio
                    WHERE user_id = $1 AND symbol = $2 AND quantity = $3 AND avg_price = $4
                    "#,
                )
                .bind(user.0)
                .bind(symbol.as_str())
                .bind(held.quantity)
                .bind(held.avg_price)
                .execute(&mut *tx)
                .await
                .map_err(Error::OperationFailed)?
                .rows_affected()
                    == 1
            }
            (None, HoldingWrite::Remove) => {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM game_portfolio WHERE user_id = $1 AND symbol = $2)",
                )
                .bind(user.0)
                .bind(symbol.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::OperationFailed)?;
                !exists
            }
        };

        if !applied {
            // Dropping `tx` rolls it back.
            return Err(Error::Conflict(format!("holding {symbol} of user {user}")));
        }

        let rows = sqlx::query_as::<_, HoldingRow>(LIST_HOLDINGS)
            .bind(user.0)
            .fetch_all(&mut *tx)
            .await
            .map_err(Error::OperationFailed)?;

        tx.commit().await.map_err(Error::OperationFailed)?;

        Ok(rows.into_iter().map(Holding::from).collect())
    }

    async fn list_holdings(&self, user: UserId) -> Result<Vec<Holding>> {
        let rows = sqlx::query_as::<_, HoldingRow>(LIST_HOLDINGS)
            .bind(user.0)
            .fetch_all(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        Ok(rows.into_iter().map(Holding::from).collect())
    }

    async fn get_instrument(&self, symbol: &Symbol) -> Result<Option<Instrument>> {
        let row = sqlx::query_as::<_, InstrumentRow>(
            r#"
            SELECT symbol, name, category, sector, base_price, current_price
            FROM stock_market
            WHERE symbol = $1
            "#,
        )
        .bind(symbol.as_str())
        .fetch_optional(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        row.map(Instrument::try_from).transpose()
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        let rows = sqlx::query_as::<_, InstrumentRow>(
            r#"
            SELECT symbol, name, category, sector, base_price, current_price
            FROM stock_market
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        rows.into_iter().map(Instrument::try_from).collect()
    }

    async fn set_instrument_price(&self, symbol: &Symbol, new_price: Decimal) -> Result<()> {
        let result = sqlx::query("UPDATE stock_market SET current_price = $1 WHERE symbol = $2")
            .bind(new_price)
            .bind(symbol.as_str())
            .execute(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("instrument {symbol}")));
        }
        Ok(())
    }

    async fn replace_instrument_price(&self, symbol: &Symbol, expected: Decimal, new_price: Decimal) -> Result<()> {
        let result = sqlx::query(
            "UPDATE stock_market SET current_price = $1 WHERE symbol = $2 AND current_price = $3",
        )
        .bind(new_price)
        .bind(symbol.as_str())
        .bind(expected)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM stock_market WHERE symbol = $1)")
            .bind(symbol.as_str())
            .fetch_one(&self.0)
            .await
            .map_err(Error::OperationFailed)?;
        if exists {
            Err(Error::Conflict(format!("price of {symbol}")))
        } else {
            Err(Error::NotFound(format!("instrument {symbol}")))
        }
    }

    async fn seed_instruments(&self, instruments: &[Instrument]) -> Result<u64> {
        let mut tx = self.0.begin().await.map_err(Error::OperationFailed)?;
        let mut inserted = 0;

        for instrument in instruments {
            let result = sqlx::query(
                r#"
                INSERT INTO stock_market (symbol, name, category, sector, base_price, current_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (symbol) DO NOTHING
                "#,
            )
            .bind(instrument.symbol.as_str())
            .bind(&instrument.name)
            .bind(instrument.category.as_str())
            .bind(instrument.sector.as_deref())
            .bind(instrument.base_price)
            .bind(instrument.current_price)
            .execute(&mut *tx)
            .await
            .map_err(Error::OperationFailed)?;

            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(Error::OperationFailed)?;

        Ok(inserted)
    }

    async fn get_xp(&self, user: UserId) -> Result<u64> {
        let xp: Option<i64> = sqlx::query_scalar("SELECT xp FROM user_progress WHERE user_id = $1")
            .bind(user.0)
            .fetch_optional(&self.0)
            .await
            .map_err(Error::OperationFailed)?;

        match xp {
            None => Ok(0),
            Some(xp) => u64::try_from(xp)
                .map_err(|_| Error::Corrupt(format!("negative xp {xp} for user {user}"))),
        }
    }

    async fn set_xp_and_level(&self, user: UserId, xp: u64, level: u64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_progress (user_id, xp, level)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id)
            DO UPDATE SET xp = EXCLUDED.xp, level = EXCLUDED.level
            "#,
        )
        .bind(user.0)
        .bind(to_db_counter(xp, "xp")?)
        .bind(to_db_counter(level, "level")?)
        .execute(&self.0)
        .await
        .map_err(Error::OperationFailed)?;

        Ok(())
    }
}
