//! Record sinks.
//!
//! A sink receives the records collected for one URL together with a
//! [`Destination`] and persists them. Sinks own the stamping of `category`
//! and `scraped_date`; the collector never sees either field.

mod json_file;
mod sqlite;

pub use json_file::{merge_partials, read_artifact, recover_partials, JsonFileSink};
pub use sqlite::{PricePoint, SqliteSink, StoredProduct};

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::extract::RawProductRecord;

/// Date format of the `scraped_date` stamp.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed artifact {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Sink task failed: {0}")]
    Task(String),
}

impl SinkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Where a batch of records belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Store collection, one per site.
    pub collection: String,
    pub category: String,
    pub scraped_date: NaiveDate,
}

impl Destination {
    pub fn new(collection: impl Into<String>, category: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            collection: collection.into(),
            category: category.into(),
            scraped_date: date,
        }
    }

    /// Destination stamped with today's UTC date.
    pub fn today(collection: impl Into<String>, category: impl Into<String>) -> Self {
        Self::new(collection, category, Utc::now().date_naive())
    }

    pub fn date_string(&self) -> String {
        self.scraped_date.format(DATE_FORMAT).to_string()
    }
}

/// Record as persisted: `category` first, then the extracted fields, then
/// `scraped_date`.
pub fn stamp(record: &RawProductRecord, destination: &Destination) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert(
        "category".to_string(),
        Value::String(destination.category.clone()),
    );
    for (name, value) in record.fields() {
        if name == "category" || name == "scraped_date" {
            continue;
        }
        out.insert(name.to_string(), value.to_json());
    }
    out.insert(
        "scraped_date".to_string(),
        Value::String(destination.date_string()),
    );
    out
}

/// Persists collected records.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Write `records` to `destination`; returns how many were written.
    async fn write(
        &self,
        records: &[RawProductRecord],
        destination: &Destination,
    ) -> Result<usize, SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_orders_category_first_and_date_last() {
        let record = RawProductRecord::new()
            .with("name", "Ghee")
            .with("category", "stale")
            .with("new_price", 610.0);
        let destination = Destination::new(
            "bigbasket",
            "dairy",
            NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
        );

        let stamped = stamp(&record, &destination);
        let keys: Vec<&str> = stamped.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["category", "name", "new_price", "scraped_date"]);
        assert_eq!(stamped["category"], "dairy");
        assert_eq!(stamped["scraped_date"], "2025-02-03");
    }
}
