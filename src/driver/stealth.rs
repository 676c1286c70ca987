//! Evasion snippets applied after navigation.
//! Grocery storefronts fingerprint headless Chrome before rendering the feed.

pub const STEALTH_SCRIPTS: &[&str] = &[
    // Hide the webdriver flag
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Headless Chrome ships without window.chrome
    r#"
    if (!window.chrome) {
        window.chrome = { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
    }
    "#,
    // Storefronts localize from navigator.languages
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-IN', 'en', 'hi'],
        configurable: true
    });
    "#,
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' }
        ],
        configurable: true
    });
    "#,
    r#"
    const kiranaQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications' ?
        Promise.resolve({ state: Notification.permission }) :
        kiranaQuery(parameters)
    );
    "#,
];
