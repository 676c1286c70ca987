//! Swiggy Instamart search results.
//!
//! Instamart ships hashed class names that rotate between deploys, so each
//! field is tried against a short list of selectors, most specific first.
//! Cards carry no product link; the collector keys them by image instead.

use crate::driver::CardHandle;
use crate::extract::fields::{parse_price, stock_label, CardDom};
use crate::extract::{ExtractError, FieldError, FieldExtractor, RawProductRecord};

const NAME: &str = r#"div[class*="novMV"], div[class*="styles_item"]"#;
const IMAGES: &[&str] = &[
    "img.sc-iGgWBj.bnWvUc._1NxA5",
    r#"img[class*="bnWvUc"]"#,
    r#"img[src*="media-assets.swiggy.com"]"#,
];
const DISCOUNTS: &[&str] = &[
    r#"[data-testid="item-offer-label-discount-text"]"#,
    r#"div[class*="styles_offer"]"#,
    r#"span[class*="discount"]"#,
];
const DELIVERY: &[&str] = &[r#"div[class*="GOJ8s"]"#, r#"div[class*="styles_delivery"]"#];
const WEIGHTS: &[&str] = &[
    r#"div[class*="entQHA"]"#,
    r#"div[class*="styles_weight"]"#,
    r#"div[class*="weight"]"#,
];
const PRICE_CONTAINERS: &[&str] = &[
    r#"[data-testid="itemMRPPrice"]"#,
    r#"div[class*="styles_price"]"#,
    r#"div[class*="price-container"]"#,
];
const NEW_PRICES: &[&str] = &[
    r#"[data-testid="itemOfferPrice"]"#,
    r#"span[class*="discounted"]"#,
    r#"div[class*="final"]"#,
];
const OLD_PRICES: &[&str] = &[
    r#"div[class*="JZGfZ"]"#,
    r#"span[class*="original"]"#,
    r#"div[class*="strike"]"#,
];
const AD_BADGES: &[&str] = &[r#"[data-testid="badge-wrapper"]"#, r#"div[class*="ad-badge"]"#];
const SOLD_OUT: &[&str] = &["Out of stock", "Sold out"];

#[derive(Debug, Clone, Copy, Default)]
pub struct SwiggyExtractor;

impl FieldExtractor for SwiggyExtractor {
    fn extract(&self, card: &CardHandle) -> Result<RawProductRecord, ExtractError> {
        let dom = CardDom::parse(card.html());
        let mut record = RawProductRecord::new();

        record.require("name", dom.text(NAME))?;

        let (image_url, image_alt) = image(&dom);
        record.record("image_url", image_url);
        record.record("image_alt", image_alt);

        record.record_or("discount", dom.first_text(DISCOUNTS), "No discount");
        record.record("delivery_time", dom.first_text(DELIVERY));
        record.record("weight", dom.first_text(WEIGHTS));

        let (new_price, old_price) = prices(&dom);
        record.record("new_price", new_price);
        record.record("old_price", old_price);

        record.insert("in_stock", stock_label(dom.contains_text(SOLD_OUT)));
        record.insert("is_advertisement", is_advertisement(&dom));

        Ok(record)
    }
}

/// Image source (with the CDN's mangled transform fixed) and alt text.
fn image(dom: &CardDom) -> (Result<String, FieldError>, Result<String, FieldError>) {
    for css in IMAGES {
        if let Ok(src) = dom.attr(css, "src") {
            return (Ok(src.replace("fl*lossy", "fl_lossy")), dom.attr(css, "alt"));
        }
    }
    let missing = FieldError::Missing(IMAGES.join(", "));
    (Err(missing.clone()), Err(missing))
}

/// New and old price from the first price container present.
fn prices(dom: &CardDom) -> (Result<f64, FieldError>, Result<f64, FieldError>) {
    let Some(container) = PRICE_CONTAINERS.iter().find(|css| dom.exists(css)) else {
        let missing = FieldError::Missing(PRICE_CONTAINERS.join(", "));
        return (Err(missing.clone()), Err(missing));
    };
    (
        price_within(dom, container, NEW_PRICES),
        price_within(dom, container, OLD_PRICES),
    )
}

fn price_within(dom: &CardDom, container: &str, candidates: &[&str]) -> Result<f64, FieldError> {
    let mut last = FieldError::Missing(candidates.join(", "));
    for css in candidates {
        let scoped = format!("{} {}", container, css);
        match dom
            .attr_or_text(&scoped, "aria-label")
            .and_then(|raw| parse_price(&raw))
        {
            Ok(price) => return Ok(price),
            Err(e) => last = e,
        }
    }
    Err(last)
}

fn is_advertisement(dom: &CardDom) -> bool {
    AD_BADGES.iter().any(|css| {
        dom.text(css)
            .map(|t| t.eq_ignore_ascii_case("ad"))
            .unwrap_or(false)
    })
}
