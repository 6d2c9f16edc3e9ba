//! PostgreSQL implementation of the product ledger.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::ProductStore;
use super::models::{LedgerRow, ProductKey};
use crate::config::{ServiceConfig, validate_table_name};
use crate::domain::ProductListing;
use crate::error::{ConfigError, ShopwatchError};

type RowTuple = (
    String,
    String,
    Option<i64>,
    i64,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    bool,
);

/// PostgreSQL-backed ledger using `sqlx::PgPool`.
///
/// The table name is configurable so that test runs can use throwaway
/// tables; it is validated as a plain identifier before it is ever
/// interpolated into SQL.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    table: String,
}

impl PostgresStore {
    /// Creates a store over an existing pool.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTableName`] if `table` is not a plain
    /// SQL identifier.
    pub fn new(pool: PgPool, table: &str) -> Result<Self, ConfigError> {
        validate_table_name(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    /// Opens a connection pool sized from the service configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ShopwatchError::PersistenceError`] if the database is
    /// unreachable, or [`ShopwatchError::Configuration`] for a bad table
    /// name.
    pub async fn connect(config: &ServiceConfig) -> Result<Self, ShopwatchError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(StdDuration::from_secs(config.database_connect_timeout_secs))
            .max_lifetime(StdDuration::from_secs(5 * 60))
            .connect(&config.database_url)
            .await?;
        tracing::info!(table = %config.table_name, "connected to database");
        Ok(Self::new(pool, &config.table_name)?)
    }

    /// Returns the ledger table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn select_columns(&self) -> String {
        format!(
            "SELECT name, shop, previous_price, price, link, first_seen, last_seen, notified FROM {}",
            self.table
        )
    }

    async fn fetch_rows(&self, sql: &str) -> Result<Vec<LedgerRow>, ShopwatchError> {
        let rows = sqlx::query_as::<_, RowTuple>(sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(name, shop, previous_price, price, link, first_seen, last_seen, notified)| {
                    LedgerRow {
                        name,
                        shop,
                        previous_price,
                        price,
                        link,
                        first_seen,
                        last_seen,
                        notified,
                    }
                },
            )
            .collect())
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn ensure_schema(&self) -> Result<(), ShopwatchError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ( \
                name TEXT NOT NULL, \
                shop TEXT NOT NULL, \
                previous_price BIGINT, \
                price BIGINT NOT NULL, \
                link TEXT NOT NULL, \
                first_seen TIMESTAMPTZ NOT NULL, \
                last_seen TIMESTAMPTZ NOT NULL, \
                notified BOOLEAN NOT NULL DEFAULT FALSE, \
                UNIQUE (name, shop, link) \
            )",
            self.table
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn drop_schema(&self) -> Result<(), ShopwatchError> {
        let sql = format!("DROP TABLE IF EXISTS {}", self.table);
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn merge(&self, batch: &[ProductListing]) -> Result<Vec<ProductListing>, ShopwatchError> {
        // `xmax = 0` only holds for a row version created by this INSERT.
        let sql = format!(
            "INSERT INTO {t} (name, shop, price, link, first_seen, last_seen, notified) \
             VALUES ($1, $2, $3, $4, $5, $5, $6) \
             ON CONFLICT (name, shop, link) DO UPDATE SET \
                price = EXCLUDED.price, \
                previous_price = CASE WHEN {t}.price <> EXCLUDED.price \
                    THEN {t}.price ELSE {t}.previous_price END, \
                last_seen = EXCLUDED.last_seen, \
                notified = CASE WHEN {t}.price <> EXCLUDED.price \
                    THEN FALSE ELSE {t}.notified END \
             RETURNING (xmax = 0) AS inserted",
            t = self.table
        );

        let mut created = Vec::new();
        for listing in batch {
            let inserted = sqlx::query_scalar::<_, bool>(&sql)
                .bind(&listing.name)
                .bind(&listing.shop)
                .bind(listing.price)
                .bind(&listing.link)
                .bind(listing.observed_at)
                .bind(listing.notified)
                .fetch_one(&self.pool)
                .await?;

            if inserted {
                created.push(listing.clone());
            }
        }

        Ok(created)
    }

    async fn reap(&self, older_than: Duration) -> Result<u64, ShopwatchError> {
        let cutoff = Utc::now() - older_than;
        let sql = format!("DELETE FROM {} WHERE last_seen < $1", self.table);

        let result = sqlx::query(&sql)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_all(&self) -> Result<Vec<LedgerRow>, ShopwatchError> {
        let sql = format!("{} ORDER BY shop, name, link", self.select_columns());
        self.fetch_rows(&sql).await
    }

    async fn list_unnotified(&self) -> Result<Vec<LedgerRow>, ShopwatchError> {
        let sql = format!(
            "{} WHERE notified = FALSE ORDER BY shop, name, link",
            self.select_columns()
        );
        self.fetch_rows(&sql).await
    }

    async fn mark_notified(&self, keys: &[ProductKey]) -> Result<u64, ShopwatchError> {
        let sql = format!(
            "UPDATE {} SET notified = TRUE WHERE name = $1 AND shop = $2 AND link = $3",
            self.table
        );

        let mut tx = self.pool.begin().await?;
        let mut updated = 0;
        for key in keys {
            let result = sqlx::query(&sql)
                .bind(&key.name)
                .bind(&key.shop)
                .bind(&key.link)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected();
        }
        tx.commit().await?;

        Ok(updated)
    }

    async fn mark_reported(&self, rows: &[LedgerRow]) -> Result<u64, ShopwatchError> {
        let sql = format!(
            "UPDATE {} SET notified = TRUE \
             WHERE name = $1 AND shop = $2 AND link = $3 AND price = $4",
            self.table
        );

        let mut tx = self.pool.begin().await?;
        let mut updated = 0;
        for row in rows {
            let result = sqlx::query(&sql)
                .bind(&row.name)
                .bind(&row.shop)
                .bind(&row.link)
                .bind(row.price)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected();
        }
        tx.commit().await?;

        Ok(updated)
    }
}
