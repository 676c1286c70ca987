//! JSON artifacts flowing into the SQLite store.

use chrono::NaiveDate;
use kirana::extract::RawProductRecord;
use kirana::sink::{
    merge_partials, read_artifact, Destination, JsonFileSink, PricePoint, Sink, SinkError,
    SqliteSink,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn milk(price: f64) -> RawProductRecord {
    RawProductRecord::new()
        .with("name", "Amul Taaza")
        .with("new_price", price)
}

#[tokio::test]
async fn merged_artifact_imports_with_store_date() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output");
    std::fs::create_dir_all(&output).unwrap();

    let scraped = Destination::new("blinkit", "dairy", day(2025, 3, 9));
    JsonFileSink::partial(&output, "blinkit", 0)
        .write(&[milk(27.0)], &scraped)
        .await
        .unwrap();
    JsonFileSink::partial(&output, "blinkit", 1)
        .write(&[RawProductRecord::new().with("name", "Paneer")], &scraped)
        .await
        .unwrap();

    let artifact = output.join("blinkit_products.json");
    assert_eq!(merge_partials(&output, "blinkit", &artifact).await.unwrap(), 2);

    let store = SqliteSink::new(&dir.path().join("kirana.db")).unwrap();
    let stored = store
        .import_file(&artifact, "blinkit", day(2025, 3, 10))
        .await
        .unwrap();
    assert_eq!(stored, 2);

    let dates = store.scraped_dates().unwrap();
    assert_eq!(dates["blinkit"], vec!["2025-03-10"]);

    // Only the priced product is listed.
    let listed = store.products_on("blinkit", day(2025, 3, 10)).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Amul Taaza");
    assert_eq!(listed[0].new_price, 27.0);
}

#[tokio::test]
async fn empty_artifact_is_skipped_and_malformed_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteSink::new(&dir.path().join("kirana.db")).unwrap();

    let empty = dir.path().join("empty.json");
    std::fs::write(&empty, "").unwrap();
    assert_eq!(
        store.import_file(&empty, "zepto", day(2025, 1, 1)).await.unwrap(),
        0
    );

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, r#"[{"name": "Ghee"}, 42]"#).unwrap();
    let err = store
        .import_file(&broken, "zepto", day(2025, 1, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::Malformed { .. }));
    assert_eq!(store.count("zepto").unwrap(), 0);
}

#[tokio::test]
async fn price_history_keeps_latest_per_month_and_current_month() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteSink::new(&dir.path().join("kirana.db")).unwrap();

    for (date, price) in [
        (day(2025, 1, 3), 26.0),
        (day(2025, 1, 28), 27.0),
        (day(2025, 3, 14), 29.0),
    ] {
        store
            .write(&[milk(price)], &Destination::new("blinkit", "dairy", date))
            .await
            .unwrap();
    }

    let history = store
        .price_history("blinkit", "Amul Taaza", day(2025, 4, 2))
        .unwrap();
    assert_eq!(
        history,
        vec![
            PricePoint {
                month: "2025-01".to_string(),
                price: Some(27.0)
            },
            PricePoint {
                month: "2025-03".to_string(),
                price: Some(29.0)
            },
            PricePoint {
                month: "2025-04".to_string(),
                price: None
            },
        ]
    );

    // Scraped today: the current month carries today's price.
    let history = store
        .price_history("blinkit", "Amul Taaza", day(2025, 3, 14))
        .unwrap();
    assert_eq!(history.last().unwrap().price, Some(29.0));
}

#[tokio::test]
async fn json_sink_stamps_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonFileSink::new(dir.path().join("zepto_products.json"));
    sink.write(
        &[milk(30.0), milk(31.0)],
        &Destination::new("zepto", "milk", day(2025, 6, 1)),
    )
    .await
    .unwrap();

    let items = read_artifact(sink.path()).await.unwrap();
    assert!(items
        .iter()
        .all(|item| item["category"] == "milk" && item["scraped_date"] == "2025-06-01"));
}
