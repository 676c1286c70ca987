use crate::driver::CardHandle;
use crate::extract::fields::{parse_price, stock_label, CardDom};
use crate::extract::{ExtractError, FieldError, FieldExtractor, RawProductRecord};

const NAME: &str = "[data-testid='product-card-name']";
const IMAGE: &str = "[data-testid='product-card-image']";
const QUANTITY: &str = "[data-testid='product-card-quantity']";
const PRICE: &str = "[data-testid='product-card-price']";
const OLD_PRICE: &str = ".line-through";
const DISCOUNT: &str = ".absolute.top-0.text-center.font-title.text-white";
const UNAVAILABLE: &str = ".bg-opacity-50";

/// Zepto search result cards.
#[derive(Debug, Clone)]
pub struct ZeptoExtractor {
    search_url: String,
}

impl ZeptoExtractor {
    /// `search_url` builds the fallback product link for cards rendered
    /// outside an anchor; it must contain `{query}`.
    pub fn new(search_url: impl Into<String>) -> Self {
        Self {
            search_url: search_url.into(),
        }
    }

    fn search_link(&self, name: &str) -> String {
        self.search_url
            .replace("{query}", &urlencoding::encode(name))
    }
}

impl FieldExtractor for ZeptoExtractor {
    fn extract(&self, card: &CardHandle) -> Result<RawProductRecord, ExtractError> {
        let dom = CardDom::parse(card.html());
        let mut record = RawProductRecord::new();

        let name = dom.text(NAME);
        record.require("name", name.clone())?;
        record.record("image_url", dom.first_attr(IMAGE, &["srcset", "data-src", "src"]));

        let product_url = match card.link() {
            Some(link) => link.to_string(),
            None => self.search_link(name.as_deref().unwrap_or_default()),
        };
        record.insert("product_url", product_url);
        record.record("quantity", dom.text(QUANTITY));

        match dom.text(PRICE).and_then(|p| parse_price(&p)) {
            Ok(new) => {
                record.insert("new_price", new);
                record.record("old_price", dom.text(OLD_PRICE).and_then(|p| parse_price(&p)));
            }
            Err(e) => {
                record.record::<f64>("new_price", Err(e));
                record.record::<f64>(
                    "old_price",
                    Err(FieldError::Missing(format!("{} (no selling price)", OLD_PRICE))),
                );
            }
        }

        record.record_or("discount", dom.text(DISCOUNT), "No discount");
        record.insert("in_stock", stock_label(dom.exists(UNAVAILABLE)));

        Ok(record)
    }
}
