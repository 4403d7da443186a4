//! Local order mirror.
//!
//! Every order placed through the gateway is recorded here before the
//! provider call, then stamped with the provider-assigned order id on
//! acknowledgement. An order that never received a provider id exists
//! only locally and cannot be cancelled upstream.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// A mirrored order row.
#[derive(Clone, Debug)]
pub struct OrderRecord {
    /// Local database id (never sent to the provider)
    pub id: i64,
    pub user_id: i64,
    /// Compound instrument identifier, "EXCHANGE:TRADINGSYMBOL"
    pub instrument: String,
    pub transaction_type: String,
    pub order_type: String,
    pub quantity: u32,
    pub price: Option<f64>,
    pub product: String,
    pub validity: String,
    pub status: String,
    /// Provider-assigned order id; `None` until the provider
    /// acknowledges the order.
    pub provider_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed order mirror, keyed by local id.
pub struct OrderStore {
    conn: Mutex<Connection>,
}

impl OrderStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                instrument TEXT NOT NULL,
                transaction_type TEXT NOT NULL,
                order_type TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price REAL,
                product TEXT NOT NULL,
                validity TEXT NOT NULL,
                status TEXT NOT NULL,
                provider_order_id TEXT,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create orders table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts a new local order row and returns its local id.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &self,
        user_id: i64,
        instrument: &str,
        transaction_type: &str,
        order_type: &str,
        quantity: u32,
        price: Option<f64>,
        product: &str,
        validity: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO orders (
                user_id, instrument, transaction_type, order_type,
                quantity, price, product, validity, status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'PENDING', ?9)
            "#,
            params![
                user_id,
                instrument,
                transaction_type,
                order_type,
                quantity,
                price,
                product,
                validity,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to insert order")?;

        Ok(conn.last_insert_rowid())
    }

    /// Fetches a local order belonging to a user.
    pub fn get(&self, user_id: i64, local_id: i64) -> Result<Option<OrderRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, user_id, instrument, transaction_type, order_type,
                       quantity, price, product, validity, status,
                       provider_order_id, created_at
                FROM orders
                WHERE id = ?1 AND user_id = ?2
                "#,
            )
            .context("Failed to prepare query")?;

        let row = stmt
            .query_row(params![local_id, user_id], |row| {
                Ok(OrderRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    instrument: row.get(2)?,
                    transaction_type: row.get(3)?,
                    order_type: row.get(4)?,
                    quantity: row.get(5)?,
                    price: row.get(6)?,
                    product: row.get(7)?,
                    validity: row.get(8)?,
                    status: row.get(9)?,
                    provider_order_id: row.get(10)?,
                    created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(11)?)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .optional()
            .context("Failed to read order row")?;

        Ok(row)
    }

    /// Records the provider-assigned id once the provider acknowledges
    /// the order, moving it to OPEN.
    pub fn mark_acknowledged(&self, local_id: i64, provider_order_id: &str) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE orders SET provider_order_id = ?1, status = 'OPEN' WHERE id = ?2",
                params![provider_order_id, local_id],
            )
            .context("Failed to mark order acknowledged")?;
        Ok(())
    }

    pub fn mark_cancelled(&self, local_id: i64) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE orders SET status = 'CANCELLED' WHERE id = ?1",
                params![local_id],
            )
            .context("Failed to mark order cancelled")?;
        Ok(())
    }
}
