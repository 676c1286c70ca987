//! Database commands: import, scrape dates, price history and listings.

use std::path::Path;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use console::style;

use crate::cli::icons;
use kirana::config::Settings;
use kirana::extract::SiteId;
use kirana::sink::{SqliteSink, DATE_FORMAT};

/// Open the store, refusing to create one for read-only commands.
fn open_existing(settings: &Settings) -> anyhow::Result<Option<SqliteSink>> {
    if !settings.database_exists() {
        println!(
            "{} No database at {}. Run 'kirana scrape --store' or 'kirana store' first.",
            icons::warn(),
            settings.database_path().display()
        );
        return Ok(None);
    }
    let sink = SqliteSink::new(&settings.database_path())
        .with_context(|| format!("Failed to open {}", settings.database_path().display()))?;
    Ok(Some(sink))
}

/// Import a JSON artifact with today's date.
pub async fn cmd_store(settings: &Settings, file: &Path, collection: SiteId) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }
    let sink = SqliteSink::new(&settings.database_path())
        .with_context(|| format!("Failed to open {}", settings.database_path().display()))?;

    let stored = sink
        .import_file(file, collection.as_str(), today())
        .await?;
    if stored == 0 {
        println!("{} No data found in {}", icons::warn(), file.display());
    } else {
        println!(
            "{} Stored {} records from {} in collection {}",
            icons::success(),
            stored,
            file.display(),
            style(collection).cyan()
        );
    }
    Ok(())
}

pub async fn cmd_dates(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let Some(sink) = open_existing(settings)? else {
        return Ok(());
    };
    let dates = sink.scraped_dates()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&dates)?);
        return Ok(());
    }
    if dates.is_empty() {
        println!("{} No scrapes stored yet", icons::warn());
        return Ok(());
    }
    for (collection, days) in &dates {
        println!(
            "{} {} ({} dates)",
            icons::info(),
            style(collection).bold(),
            days.len()
        );
        for day in days {
            println!("  {} {}", icons::dim_arrow(), day);
        }
    }
    Ok(())
}

pub async fn cmd_prices(
    settings: &Settings,
    name: &str,
    collection: SiteId,
    json: bool,
) -> anyhow::Result<()> {
    let Some(sink) = open_existing(settings)? else {
        return Ok(());
    };
    let history = sink.price_history(collection.as_str(), name, today())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    println!(
        "{} Price history for {} on {}",
        icons::info(),
        style(name).bold(),
        collection.display_name()
    );
    for point in &history {
        match point.price {
            Some(price) => println!("  {}  ₹{:.2}", point.month, price),
            None => println!("  {}  {}", point.month, style("-").dim()),
        }
    }
    Ok(())
}

pub async fn cmd_list(
    settings: &Settings,
    collection: SiteId,
    date: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let date = match date {
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))?,
        None => today(),
    };
    let Some(sink) = open_existing(settings)? else {
        return Ok(());
    };
    let products = sink.products_on(collection.as_str(), date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&products)?);
        return Ok(());
    }
    if products.is_empty() {
        println!(
            "{} No priced products in {} for {}",
            icons::warn(),
            collection,
            date.format(DATE_FORMAT)
        );
        return Ok(());
    }

    println!(
        "{} {} products in {} for {}",
        icons::info(),
        products.len(),
        collection.display_name(),
        date.format(DATE_FORMAT)
    );
    for product in &products {
        println!("  {:>10}  {}", format!("₹{:.2}", product.new_price), product.name);
    }
    Ok(())
}

/// Scrape dates are stamped in UTC.
fn today() -> NaiveDate {
    Utc::now().date_naive()
}
