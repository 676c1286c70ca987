//! SQLite document store keyed by collection and scrape date.
//!
//! Every product snapshot is one row; the full stamped record is kept as
//! JSON in `data`, with the columns the history queries need pulled out.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{read_artifact, stamp, Destination, Sink, SinkError, DATE_FORMAT};
use crate::extract::fields::parse_price;
use crate::extract::RawProductRecord;

/// One month of a product's price history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    /// `YYYY-MM`
    pub month: String,
    pub price: Option<f64>,
}

/// Name and price of a stored product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredProduct {
    pub name: String,
    pub new_price: f64,
}

/// SQLite-backed product store.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    db_path: PathBuf,
}

impl SqliteSink {
    /// Open (creating if needed) the store at `db_path`.
    pub fn new(db_path: &Path) -> Result<Self, SinkError> {
        let sink = Self {
            db_path: db_path.to_path_buf(),
        };
        sink.init_schema()?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection, SinkError> {
        connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<(), SinkError> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                category TEXT NOT NULL,
                scraped_date TEXT NOT NULL,
                name TEXT,
                new_price REAL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_products_collection_date
                ON products(collection, scraped_date);
            CREATE INDEX IF NOT EXISTS idx_products_collection_name
                ON products(collection, name);
        "#,
        )?;
        Ok(())
    }

    /// Insert stamped documents in one transaction.
    fn insert_documents(
        &self,
        collection: &str,
        documents: &[Map<String, Value>],
    ) -> Result<usize, SinkError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO products (id, collection, category, scraped_date, name, new_price, data)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for doc in documents {
                stmt.execute(params![
                    uuid::Uuid::new_v4().to_string(),
                    collection,
                    doc.get("category").and_then(Value::as_str).unwrap_or_default(),
                    doc.get("scraped_date").and_then(Value::as_str).unwrap_or_default(),
                    doc.get("name").and_then(Value::as_str),
                    doc.get("new_price").and_then(price_value),
                    serde_json::to_string(doc)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(documents.len())
    }

    /// Import a JSON artifact into `collection`, stamping every document
    /// with `date`. Empty artifacts are skipped; malformed ones are rejected
    /// before anything is written.
    pub async fn import_file(
        &self,
        path: &Path,
        collection: &str,
        date: NaiveDate,
    ) -> Result<usize, SinkError> {
        let mut documents = read_artifact(path).await?;
        if documents.is_empty() {
            tracing::warn!("No data found in {}, skipping", path.display());
            return Ok(0);
        }

        let date = date.format(DATE_FORMAT).to_string();
        for doc in &mut documents {
            doc.insert("scraped_date".to_string(), Value::String(date.clone()));
            doc.entry("category")
                .or_insert_with(|| Value::String(String::new()));
        }

        let sink = self.clone();
        let collection = collection.to_string();
        run_blocking(move || sink.insert_documents(&collection, &documents)).await
    }

    /// Distinct scrape dates per collection, ascending.
    pub fn scraped_dates(&self) -> Result<BTreeMap<String, Vec<String>>, SinkError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT collection, scraped_date FROM products ORDER BY collection, scraped_date",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut dates: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (collection, date) in rows {
            dates.entry(collection).or_default().push(date);
        }
        Ok(dates)
    }

    /// Products with a price scraped into `collection` on `date`.
    pub fn products_on(
        &self,
        collection: &str,
        date: NaiveDate,
    ) -> Result<Vec<StoredProduct>, SinkError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT name, new_price FROM products
            WHERE collection = ?1 AND scraped_date = ?2
              AND name IS NOT NULL AND new_price IS NOT NULL
            ORDER BY rowid
            "#,
        )?;
        let products = stmt
            .query_map(
                params![collection, date.format(DATE_FORMAT).to_string()],
                |row| {
                    Ok(StoredProduct {
                        name: row.get(0)?,
                        new_price: row.get(1)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// Monthly price history of `name` in `collection`.
    ///
    /// The latest observation in a month wins. The month of `today` is always
    /// present and holds today's price, or `None` when the product was not
    /// scraped today.
    pub fn price_history(
        &self,
        collection: &str,
        name: &str,
        today: NaiveDate,
    ) -> Result<Vec<PricePoint>, SinkError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT scraped_date, new_price FROM products
            WHERE collection = ?1 AND name = ?2
            ORDER BY scraped_date, rowid
            "#,
        )?;
        let rows = stmt
            .query_map(params![collection, name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let today_str = today.format(DATE_FORMAT).to_string();
        let mut months: BTreeMap<String, Option<f64>> = BTreeMap::new();
        for (date, price) in &rows {
            months.insert(month_of(date), *price);
        }
        let todays_price = rows
            .iter()
            .find(|(date, _)| *date == today_str)
            .and_then(|(_, price)| *price);
        months.insert(month_of(&today_str), todays_price);

        Ok(months
            .into_iter()
            .map(|(month, price)| PricePoint { month, price })
            .collect())
    }

    /// Number of stored rows in `collection`.
    pub fn count(&self, collection: &str) -> Result<u64, SinkError> {
        let conn = self.connect()?;
        let count: Option<i64> = conn
            .query_row(
                "SELECT COUNT(*) FROM products WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0) as u64)
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn write(
        &self,
        records: &[RawProductRecord],
        destination: &Destination,
    ) -> Result<usize, SinkError> {
        let documents: Vec<_> = records.iter().map(|r| stamp(r, destination)).collect();
        let sink = self.clone();
        let collection = destination.collection.clone();
        run_blocking(move || sink.insert_documents(&collection, &documents)).await
    }
}

fn connect(path: &Path) -> Result<Connection, SinkError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 30000;
    "#,
    )?;
    Ok(conn)
}

async fn run_blocking<T, F>(f: F) -> Result<T, SinkError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SinkError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SinkError::Task(e.to_string()))?
}

/// Stored price: numbers as-is, rupee strings parsed.
fn price_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_price(s).ok(),
        _ => None,
    }
}

fn month_of(date: &str) -> String {
    date.chars().take(7).collect()
}
