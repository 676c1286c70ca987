//! DOM lookups over a card snapshot.

use scraper::{ElementRef, Html, Selector};

use super::FieldError;

/// Parsed outer HTML of one card.
///
/// `Html` is not `Send`, so a `CardDom` is built, queried and dropped inside
/// a single synchronous `extract` call.
pub struct CardDom {
    html: Html,
}

impl CardDom {
    pub fn parse(fragment: &str) -> Self {
        Self {
            html: Html::parse_fragment(fragment),
        }
    }

    fn selector(css: &str) -> Result<Selector, FieldError> {
        Selector::parse(css).map_err(|_| FieldError::BadSelector(css.to_string()))
    }

    fn first(&self, css: &str) -> Result<ElementRef<'_>, FieldError> {
        let selector = Self::selector(css)?;
        self.html
            .select(&selector)
            .next()
            .ok_or_else(|| FieldError::Missing(css.to_string()))
    }

    /// Every element matching `css`, in document order.
    pub fn elements(&self, css: &str) -> Result<Vec<ElementRef<'_>>, FieldError> {
        let selector = Self::selector(css)?;
        Ok(self.html.select(&selector).collect())
    }

    /// Whether any element matches `css`. Invalid selectors match nothing.
    pub fn exists(&self, css: &str) -> bool {
        self.first(css).is_ok()
    }

    /// Trimmed, whitespace-collapsed text of the first match.
    pub fn text(&self, css: &str) -> Result<String, FieldError> {
        let text = element_text(&self.first(css)?);
        if text.is_empty() {
            Err(FieldError::Empty(css.to_string()))
        } else {
            Ok(text)
        }
    }

    /// Text of the first selector in `candidates` that yields non-empty text.
    pub fn first_text(&self, candidates: &[&str]) -> Result<String, FieldError> {
        let mut last = FieldError::Missing(candidates.join(", "));
        for css in candidates {
            match self.text(css) {
                Ok(text) => return Ok(text),
                Err(err) => last = err,
            }
        }
        Err(last)
    }

    /// Attribute of the first match.
    pub fn attr(&self, css: &str, attribute: &str) -> Result<String, FieldError> {
        self.first(css)?
            .value()
            .attr(attribute)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| FieldError::MissingAttribute {
                selector: css.to_string(),
                attribute: attribute.to_string(),
            })
    }

    /// First non-empty attribute among `attributes` on the first match.
    pub fn first_attr(&self, css: &str, attributes: &[&str]) -> Result<String, FieldError> {
        let element = self.first(css)?;
        attributes
            .iter()
            .filter_map(|a| element.value().attr(a))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| FieldError::MissingAttribute {
                selector: css.to_string(),
                attribute: attributes.join("|"),
            })
    }

    /// `attribute` of the first match if set, else its text.
    pub fn attr_or_text(&self, css: &str, attribute: &str) -> Result<String, FieldError> {
        let element = self.first(css)?;
        let value = element
            .value()
            .attr(attribute)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| element_text(&element));
        if value.is_empty() {
            Err(FieldError::Empty(css.to_string()))
        } else {
            Ok(value)
        }
    }

    /// Whether any text node in the card contains one of `needles`.
    pub fn contains_text(&self, needles: &[&str]) -> bool {
        self.html
            .root_element()
            .text()
            .any(|t| needles.iter().any(|n| t.contains(n)))
    }
}

/// Text content of an element with runs of whitespace collapsed.
pub fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a rupee amount such as `₹1,299` or ` 45.50 `.
pub fn parse_price(raw: &str) -> Result<f64, FieldError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '₹' && *c != ',' && !c.is_whitespace())
        .collect();
    let cleaned = cleaned.strip_prefix("Rs.").unwrap_or(&cleaned);
    cleaned
        .parse::<f64>()
        .map_err(|_| FieldError::BadPrice(raw.trim().to_string()))
}

/// `in_stock` value as written to artifacts.
pub fn stock_label(out_of_stock: bool) -> &'static str {
    if out_of_stock {
        "No"
    } else {
        "Yes"
    }
}

/// Rounded percentage saved going from `old` to `new`, e.g. `"20%"`.
pub fn discount_percent(old: f64, new: f64) -> Option<String> {
    if old <= 0.0 {
        return None;
    }
    Some(format!("{}%", (((old - new) / old) * 100.0).round() as i64))
}
