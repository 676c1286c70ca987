//! Scroll collector properties against scripted feeds and the real site
//! extractors.

use std::collections::HashSet;
use std::time::Duration;

use kirana::collector::{ScrollBudget, ScrollCollector, StopReason};
use kirana::driver::scripted::{ScriptedCard, ScriptedDriver, ScriptedStep};
use kirana::extract::{extractor_for, SiteId, SiteProfile};

fn blinkit_card(n: usize) -> ScriptedCard {
    ScriptedCard::linked(
        format!("https://blinkit.com/prn/item-{}/prid/{}", n, n),
        format!(
            r#"<a data-test-id="plp-product">
                 <div class="Product__UpdatedTitle-sc-11dk8zk-9">Item {n}</div>
                 <div class="Product__UpdatedPriceAndAtcContainer-sc-11dk8zk-10">
                   <div style="color: rgb(31, 31, 31);">₹{price}</div>
                 </div>
               </a>"#,
            n = n,
            price = 10 + n
        ),
    )
}

/// Step `i` renders `per_step * (i + 1)` cards; the height grows with it.
fn feed(steps: usize, per_step: usize) -> Vec<ScriptedStep> {
    (0..steps)
        .map(|i| {
            let count = per_step * (i + 1);
            ScriptedStep::new(500 * (i as u64 + 1), (0..count).map(blinkit_card).collect())
        })
        .collect()
}

fn budget(max_records: usize) -> ScrollBudget {
    ScrollBudget::new(max_records).with_settle_delay(Duration::ZERO)
}

fn names(records: &[kirana::extract::RawProductRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.text("name").map(str::to_string))
        .collect()
}

#[tokio::test]
async fn record_count_never_exceeds_budget() {
    let profile = SiteProfile::defaults(SiteId::Blinkit);
    let extractor = extractor_for(&profile);

    for max in [1, 4, 5, 11, 40] {
        let mut driver = ScriptedDriver::new(feed(6, 5));
        let collector = ScrollCollector::new(budget(max), &profile.card_selector);
        let outcome = collector
            .collect(&mut driver, extractor.as_ref())
            .await
            .unwrap();

        assert!(outcome.records.len() <= max, "budget {}", max);
        // The feed holds 30 distinct cards.
        assert_eq!(outcome.records.len(), max.min(30), "budget {}", max);
    }
}

#[tokio::test]
async fn scrolls_never_exceed_attempt_limit() {
    for limit in [1, 2, 7] {
        let mut driver = ScriptedDriver::new(feed(20, 2));
        let collector =
            ScrollCollector::new(budget(1000).with_max_scroll_attempts(limit), ".card");
        let extractor = extractor_for(&SiteProfile::defaults(SiteId::Blinkit));
        let outcome = collector
            .collect(&mut driver, extractor.as_ref())
            .await
            .unwrap();

        assert_eq!(outcome.stop, StopReason::AttemptsExhausted);
        assert!(driver.scrolls() <= limit);
        assert_eq!(outcome.attempts, limit);
    }
}

#[tokio::test]
async fn records_are_unique_and_in_first_seen_order() {
    let mut driver = ScriptedDriver::new(feed(4, 3));
    let collector = ScrollCollector::new(budget(100), ".card");
    let extractor = extractor_for(&SiteProfile::defaults(SiteId::Blinkit));
    let outcome = collector
        .collect(&mut driver, extractor.as_ref())
        .await
        .unwrap();

    let names = names(&outcome.records);
    let unique: HashSet<&String> = names.iter().collect();
    assert_eq!(unique.len(), names.len());
    assert_eq!(
        names,
        (0..12).map(|n| format!("Item {}", n)).collect::<Vec<_>>()
    );
    assert_eq!(outcome.stop, StopReason::HeightStable);
    assert_eq!(outcome.cards_seen, 12);
}

#[tokio::test]
async fn broken_cards_are_skipped_without_stopping_the_loop() {
    let broken = ScriptedCard::linked("https://blinkit.com/prn/broken", "<a>no title</a>");
    let steps = vec![
        ScriptedStep::new(100, vec![blinkit_card(0), broken.clone()]),
        ScriptedStep::new(200, vec![blinkit_card(0), broken, blinkit_card(1)]),
    ];
    let mut driver = ScriptedDriver::new(steps);
    let collector = ScrollCollector::new(budget(10), ".card");
    let extractor = extractor_for(&SiteProfile::defaults(SiteId::Blinkit));
    let outcome = collector
        .collect(&mut driver, extractor.as_ref())
        .await
        .unwrap();

    assert_eq!(names(&outcome.records), vec!["Item 0", "Item 1"]);
    // The broken card is retried on every pass.
    assert_eq!(outcome.skipped_extractions, 2);
}

#[tokio::test]
async fn extracted_prices_are_numbers() {
    let mut driver = ScriptedDriver::new(feed(1, 2));
    let collector = ScrollCollector::new(budget(2), ".card");
    let extractor = extractor_for(&SiteProfile::defaults(SiteId::Blinkit));
    let outcome = collector
        .collect(&mut driver, extractor.as_ref())
        .await
        .unwrap();

    let prices: Vec<Option<f64>> = outcome
        .records
        .iter()
        .map(|r| r.get("new_price").and_then(|v| v.as_number()))
        .collect();
    assert_eq!(prices, vec![Some(10.0), Some(11.0)]);
    assert_eq!(outcome.records[0].text("discount"), Some("No discount"));
}
