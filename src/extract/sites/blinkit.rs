use crate::driver::CardHandle;
use crate::extract::fields::{discount_percent, element_text, parse_price, stock_label, CardDom};
use crate::extract::{ExtractError, FieldError, FieldExtractor, RawProductRecord};

const NAME: &str = ".Product__UpdatedTitle-sc-11dk8zk-9";
const WEIGHT: &str = ".bff_variant_text_only";
const PRICES: &str = ".Product__UpdatedPriceAndAtcContainer-sc-11dk8zk-10 div[style*='color']";
const OUT_OF_STOCK: &str = ".AddToCart__UpdatedOutOfStockTag-sc-17ig0e3-4";

/// Blinkit search result cards.
///
/// Price labels carry no distinguishing classes; the struck-through one is
/// the MRP and the dark one is the selling price.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlinkitExtractor;

impl FieldExtractor for BlinkitExtractor {
    fn extract(&self, card: &CardHandle) -> Result<RawProductRecord, ExtractError> {
        let dom = CardDom::parse(card.html());
        let mut record = RawProductRecord::new();

        record.require("name", dom.text(NAME))?;
        record.record("image_url", dom.first_attr("img", &["srcset", "data-src", "src"]));
        record.record(
            "product_url",
            card.link()
                .map(str::to_string)
                .ok_or_else(|| FieldError::Missing("a[href]".to_string())),
        );
        record.record("weight", dom.text(WEIGHT));

        let (new_price, old_price) = styled_prices(&dom);
        let new_price = new_price.and_then(|p| parse_price(&p));
        let old_price = old_price.and_then(|p| parse_price(&p));

        let discount = match (&old_price, &new_price) {
            (Ok(old), Ok(new)) => discount_percent(*old, *new),
            _ => None,
        };

        record.record("new_price", new_price);
        record.record("old_price", old_price);
        record.insert("discount", discount.unwrap_or_else(|| "No discount".to_string()));
        record.insert("in_stock", stock_label(dom.exists(OUT_OF_STOCK)));

        Ok(record)
    }
}

/// Selling and struck-through price labels, told apart by inline style.
fn styled_prices(dom: &CardDom) -> (Result<String, FieldError>, Result<String, FieldError>) {
    let mut new_price = Err(FieldError::Missing(format!("{} (selling)", PRICES)));
    let mut old_price = Err(FieldError::Missing(format!("{} (line-through)", PRICES)));

    let elements = match dom.elements(PRICES) {
        Ok(elements) => elements,
        Err(e) => return (Err(e.clone()), Err(e)),
    };

    for element in elements {
        let style = element.value().attr("style").unwrap_or_default();
        let text = element_text(&element);
        if text.is_empty() {
            continue;
        }
        if style.contains("line-through") {
            old_price = Ok(text);
        } else if style.contains("color: rgb(31, 31, 31)") {
            new_price = Ok(text);
        }
    }

    (new_price, old_price)
}
