use crate::driver::CardHandle;
use crate::extract::fields::{parse_price, stock_label, CardDom};
use crate::extract::{ExtractError, FieldError, FieldExtractor, FieldValue, RawProductRecord};

const BRAND: &str = ".BrandName___StyledLabel2-sc-hssfrl-1";
const NAME: &str = "h3.line-clamp-2";
const UNAVAILABLE: &str = "div.bg-opacity-50";
const PACK_SIZE: &str = ".PackSelector___StyledLabel-sc-1lmu4hv-0";
const PRICE_NEW: &str = ".Pricing___StyledDiv-sc-pldi2d-0 .Pricing___StyledLabel-sc-pldi2d-1";
const PRICE_OLD: &str = ".Pricing___StyledDiv-sc-pldi2d-0 .Pricing___StyledLabel2-sc-pldi2d-2";
const PRICE_SINGLE: &str = ".Pricing___StyledLabel2-sc-pldi2d-2";
const DISCOUNT: &str = ".Tags___StyledLabel2-sc-aeruf4-1";
const RATING: &str = ".ReviewsAndRatings___StyledDiv-sc-2rprpc-0 span.Label-sc-15v1nk5-0.Badges___StyledLabel-sc-1k3p1ug-0 span";
const REVIEWS: &str = ".ReviewsAndRatings___StyledDiv-sc-2rprpc-0 .ReviewsAndRatings___StyledLabel-sc-2rprpc-1";
const OFFER: &str = ".OfferCommunication___StyledDiv-sc-zgmi5i-0";

/// BigBasket category listing cards.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigBasketExtractor;

impl FieldExtractor for BigBasketExtractor {
    fn extract(&self, card: &CardHandle) -> Result<RawProductRecord, ExtractError> {
        let dom = CardDom::parse(card.html());
        let mut record = RawProductRecord::new();

        record.record("brand", dom.text(BRAND));
        record.require("name", dom.text(NAME))?;
        record.record("image_url", dom.attr("img", "src"));
        record.insert("in_stock", stock_label(dom.exists(UNAVAILABLE)));
        record.record(
            "product_url",
            card.link()
                .map(str::to_string)
                .ok_or_else(|| FieldError::Missing("a".to_string()))
                .or_else(|_| dom.attr("a", "href")),
        );
        record.record_or("pack_size", dom.text(PACK_SIZE), "N/A");

        // Cards without a strike price show only the single label.
        match dom.text(PRICE_NEW) {
            Ok(new) => {
                record.record("new_price", parse_price(&new));
                record.record("old_price", dom.text(PRICE_OLD).and_then(|p| parse_price(&p)));
            }
            Err(_) => {
                record.record("new_price", dom.text(PRICE_SINGLE).and_then(|p| parse_price(&p)));
                record.insert("old_price", FieldValue::Null);
            }
        }

        record.record_or("discount", dom.text(DISCOUNT), "No discount");
        record.record_or("rating", dom.text(RATING).and_then(|r| parse_rating(&r)), 0.0);
        record.record_or("review_count", dom.text(REVIEWS), "0 Ratings");
        record.record("special_offer", dom.text(OFFER));

        Ok(record)
    }
}

fn parse_rating(raw: &str) -> Result<f64, FieldError> {
    raw.trim()
        .parse()
        .map_err(|_| FieldError::BadNumber(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISCOUNTED: &str = r#"
    <div class="SKUDeck___StyledDiv-sc-1e5d9gk-0">
      <a href="/pd/10000148/fresho-onion-1-kg/"><img src="https://www.bbassets.com/onion.jpg"></a>
      <span class="BrandName___StyledLabel2-sc-hssfrl-1">fresho!</span>
      <h3 class="line-clamp-2">Onion (Loose)</h3>
      <span class="PackSelector___StyledLabel-sc-1lmu4hv-0"> 1 kg </span>
      <div class="Pricing___StyledDiv-sc-pldi2d-0">
        <span class="Pricing___StyledLabel-sc-pldi2d-1">₹38.5</span>
        <span class="Pricing___StyledLabel2-sc-pldi2d-2">₹48.13</span>
      </div>
      <span class="Tags___StyledLabel2-sc-aeruf4-1">20% OFF</span>
      <div class="ReviewsAndRatings___StyledDiv-sc-2rprpc-0">
        <span class="Label-sc-15v1nk5-0 Badges___StyledLabel-sc-1k3p1ug-0"><span>4.1</span></span>
        <span class="ReviewsAndRatings___StyledLabel-sc-2rprpc-1">36,512 Ratings</span>
      </div>
    </div>"#;

    const SINGLE_PRICE_SOLD_OUT: &str = r#"
    <div class="SKUDeck___StyledDiv-sc-1e5d9gk-0">
      <h3 class="line-clamp-2">Organic Turmeric</h3>
      <div class="bg-opacity-50"></div>
      <span class="Pricing___StyledLabel2-sc-pldi2d-2">₹1,020</span>
    </div>"#;

    #[test]
    fn extracts_discounted_card() {
        let card = CardHandle::new(
            0,
            DISCOUNTED,
            Some("https://www.bigbasket.com/pd/10000148/fresho-onion-1-kg/".into()),
            None,
        );
        let record = BigBasketExtractor.extract(&card).unwrap();

        assert_eq!(record.text("brand"), Some("fresho!"));
        assert_eq!(record.text("name"), Some("Onion (Loose)"));
        assert_eq!(record.text("in_stock"), Some("Yes"));
        assert_eq!(
            record.text("product_url"),
            Some("https://www.bigbasket.com/pd/10000148/fresho-onion-1-kg/")
        );
        assert_eq!(record.text("pack_size"), Some("1 kg"));
        assert_eq!(record.get("new_price"), Some(&FieldValue::Number(38.5)));
        assert_eq!(record.get("old_price"), Some(&FieldValue::Number(48.13)));
        assert_eq!(record.text("discount"), Some("20% OFF"));
        assert_eq!(record.get("rating"), Some(&FieldValue::Number(4.1)));
        assert_eq!(record.text("review_count"), Some("36,512 Ratings"));
        assert_eq!(record.get("special_offer"), Some(&FieldValue::Null));
    }

    #[test]
    fn single_price_and_defaults() {
        let card = CardHandle::new(0, SINGLE_PRICE_SOLD_OUT, None, None);
        let record = BigBasketExtractor.extract(&card).unwrap();

        assert_eq!(record.text("in_stock"), Some("No"));
        assert_eq!(record.get("new_price"), Some(&FieldValue::Number(1020.0)));
        assert_eq!(record.get("old_price"), Some(&FieldValue::Null));
        assert_eq!(record.text("pack_size"), Some("N/A"));
        assert_eq!(record.text("discount"), Some("No discount"));
        assert_eq!(record.get("rating"), Some(&FieldValue::Number(0.0)));
        assert_eq!(record.text("review_count"), Some("0 Ratings"));
        assert!(record.issues().iter().any(|i| i.field == "brand"));
        assert!(record.issues().iter().any(|i| i.field == "product_url"));
    }

    #[test]
    fn missing_name_fails_card() {
        let card = CardHandle::new(0, "<div><span>loading</span></div>", None, None);
        assert!(matches!(
            BigBasketExtractor.extract(&card),
            Err(ExtractError::Required { field: "name", .. })
        ));
    }
}
