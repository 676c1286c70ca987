//! JavaScript snippets evaluated in the page by the Chromium driver.

#![cfg_attr(not(feature = "browser"), allow(dead_code))]

/// Document height, whichever of body/documentElement is taller.
pub const CONTENT_HEIGHT: &str = r#"
    Math.max(
        document.body ? document.body.scrollHeight : 0,
        document.documentElement ? document.documentElement.scrollHeight : 0
    )
"#;

pub const SCROLL_TO_BOTTOM: &str = r#"
    window.scrollTo(0, Math.max(
        document.body ? document.body.scrollHeight : 0,
        document.documentElement ? document.documentElement.scrollHeight : 0
    ));
    true
"#;

/// Wait for the page to reach a ready state.
pub const WAIT_FOR_READY: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Quote a value as a JavaScript string literal.
///
/// JSON string syntax is a subset of JS string syntax, so serde_json does the
/// escaping.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub fn selector_present(selector: &str) -> String {
    format!("document.querySelector({}) !== null", js_string(selector))
}

pub fn scroll_by(pixels: i64) -> String {
    format!("window.scrollBy(0, {}); true", pixels)
}

pub fn scroll_last_into_view(selector: &str) -> String {
    format!(
        r#"(() => {{
            const cards = document.querySelectorAll({});
            if (cards.length === 0) {{ return false; }}
            cards[cards.length - 1].scrollIntoView();
            return true;
        }})()"#,
        js_string(selector)
    )
}

/// Snapshot every matching card as `{ html, link, image }`.
///
/// The link is the card's own href, else a descendant anchor, else the
/// closest ancestor anchor. The image prefers `srcset`, then `data-src`,
/// then `src`.
pub fn snapshot_cards(selector: &str) -> String {
    format!(
        r#"Array.from(document.querySelectorAll({})).map((el) => {{
            const anchor = el.matches('a[href]')
                ? el
                : (el.querySelector('a[href]') || el.closest('a[href]'));
            const img = el.querySelector('img');
            const image = img
                ? (img.getAttribute('srcset') || img.getAttribute('data-src') || img.src || null)
                : null;
            return {{ html: el.outerHTML, link: anchor ? anchor.href : null, image: image }};
        }})"#,
        js_string(selector)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_quoted_as_js_strings() {
        let script = selector_present(r#"a[data-test-id='plp-product']"#);
        assert_eq!(
            script,
            r#"document.querySelector("a[data-test-id='plp-product']") !== null"#
        );
    }

    #[test]
    fn double_quotes_in_selectors_are_escaped() {
        let script = snapshot_cards(r#"div[data-testid="default_container_ux4"]"#);
        assert!(script.contains(r#""div[data-testid=\"default_container_ux4\"]""#));
    }

    #[test]
    fn scroll_by_embeds_pixels() {
        assert_eq!(scroll_by(600), "window.scrollBy(0, 600); true");
    }
}
