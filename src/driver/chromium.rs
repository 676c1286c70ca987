//! Chromium page driver over CDP.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::scripts;
use super::stealth::STEALTH_SCRIPTS;
use super::{CardHandle, DriverError, DriverFactory, PageDriver, WaitOutcome};
use crate::config::{BrowserEngineConfig, BrowserEngineType};

/// Default user agent for browser sessions.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// How often `wait_for_selector` re-checks the DOM.
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

#[derive(Debug, Deserialize)]
struct CardSnapshot {
    html: String,
    link: Option<String>,
    image: Option<String>,
}

/// One Chromium tab owned by a single worker.
pub struct ChromiumDriver {
    config: BrowserEngineConfig,
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    /// False when attached to a remote browser we must not shut down.
    owns_browser: bool,
}

impl ChromiumDriver {
    /// Launch a local browser, or attach to `remote_url` when given.
    pub async fn launch(
        config: BrowserEngineConfig,
        remote_url: Option<String>,
        worker: usize,
    ) -> Result<Self, DriverError> {
        let owns_browser = remote_url.is_none();
        let (browser, handler) = match remote_url {
            Some(ref url) => connect_remote(url, config.timeout).await?,
            None => launch_local(&config, worker).await?,
        };

        let handler = spawn_handler(handler);

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(format!("Failed to open tab: {}", e)))?;

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| BROWSER_USER_AGENT.to_string());
        page.execute(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(|e| DriverError::Launch(format!("Failed to set user agent: {}", e)))?;

        Ok(Self {
            config,
            browser,
            page,
            handler,
            owns_browser,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, DriverError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|e| DriverError::Script(format!("Unexpected script result: {}", e)))
    }

    async fn wait_for_page_ready(&self) {
        let timeout = Duration::from_secs(self.config.timeout);
        match tokio::time::timeout(timeout, self.eval::<String>(scripts::WAIT_FOR_READY.to_string()))
            .await
        {
            Ok(Ok(state)) => debug!("Page ready state: {}", state),
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }
    }

    async fn apply_stealth(&self) {
        debug!("Applying stealth scripts");
        for script in STEALTH_SCRIPTS {
            if let Err(e) = self.page.evaluate(script.to_string()).await {
                debug!("Stealth script injection skipped: {}", e);
            }
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        info!("Navigating to {}", url);
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: format!("Invalid URL: {}", e),
            })?;

        let nav_timeout = Duration::from_secs(self.config.timeout);
        tokio::time::timeout(nav_timeout, self.page.execute(nav_params))
            .await
            .map_err(|_| DriverError::Navigation {
                url: url.to_string(),
                reason: format!("timed out after {}s", self.config.timeout),
            })?
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        self.wait_for_page_ready().await;

        if self.config.engine == BrowserEngineType::Stealth {
            self.apply_stealth().await;
        }

        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, DriverError> {
        debug!("Waiting for selector: {}", selector);
        let deadline = Instant::now() + timeout;
        let script = scripts::selector_present(selector);
        loop {
            if self.eval::<bool>(script.clone()).await? {
                return Ok(WaitOutcome::Present);
            }
            if Instant::now() >= deadline {
                return Ok(WaitOutcome::TimedOut);
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn find_all(&mut self, selector: &str) -> Result<Vec<CardHandle>, DriverError> {
        let snapshots: Vec<CardSnapshot> = self.eval(scripts::snapshot_cards(selector)).await?;
        Ok(snapshots
            .into_iter()
            .enumerate()
            .map(|(position, s)| CardHandle::new(position, s.html, s.link, s.image))
            .collect())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        self.eval::<bool>(scripts::SCROLL_TO_BOTTOM.to_string())
            .await
            .map(|_| ())
    }

    async fn scroll_by(&mut self, pixels: i64) -> Result<(), DriverError> {
        self.eval::<bool>(scripts::scroll_by(pixels)).await.map(|_| ())
    }

    async fn scroll_last_into_view(&mut self, selector: &str) -> Result<(), DriverError> {
        let scrolled: bool = self.eval(scripts::scroll_last_into_view(selector)).await?;
        if !scrolled {
            debug!("No cards to scroll into view, scrolling to bottom");
            self.scroll_to_bottom().await?;
        }
        Ok(())
    }

    async fn current_content_height(&mut self) -> Result<u64, DriverError> {
        let height: f64 = self.eval(scripts::CONTENT_HEIGHT.to_string()).await?;
        Ok(height.max(0.0) as u64)
    }

    async fn close(&mut self) {
        let _ = self.page.clone().close().await;
        if self.owns_browser {
            if let Err(e) = self.browser.close().await {
                debug!("Browser close failed: {}", e);
            }
        }
        self.handler.abort();
    }
}

/// Launches one Chromium session per worker.
#[derive(Debug, Clone)]
pub struct ChromiumFactory {
    config: BrowserEngineConfig,
}

impl ChromiumFactory {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for ChromiumFactory {
    type Driver = ChromiumDriver;

    async fn launch(&self, worker: usize) -> Result<ChromiumDriver, DriverError> {
        ChromiumDriver::launch(
            self.config.clone(),
            self.config.remote_for_worker(worker),
            worker,
        )
        .await
    }
}

fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    })
}

/// Find a Chrome executable.
fn find_chrome() -> Result<PathBuf, DriverError> {
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in CHROME_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            info!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(DriverError::Launch(
        "Chrome/Chromium not found. Please install it:\n\
         - Arch/Manjaro: sudo pacman -S chromium\n\
         - Ubuntu/Debian: sudo apt install chromium-browser\n\
         - Fedora: sudo dnf install chromium\n\
         - Or set BROWSER_URL to a running DevTools endpoint"
            .to_string(),
    ))
}

async fn launch_local(
    config: &BrowserEngineConfig,
    worker: usize,
) -> Result<(Browser, Handler), DriverError> {
    info!(
        "Launching browser for worker {} (headless={})",
        worker, config.headless
    );

    let chrome_path = find_chrome()?;

    // Concurrent sessions must not share a profile directory
    let profile_dir = std::env::temp_dir().join(format!(
        "kirana-{}-worker-{}",
        std::process::id(),
        worker
    ));

    let mut builder = BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .user_data_dir(profile_dir);

    // with_head means NOT headless
    if !config.headless {
        builder = builder.with_head();
    }

    if let Some(ref proxy) = config.proxy {
        builder = builder.arg(format!("--proxy-server={}", proxy));
    }

    builder = builder
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-translate")
        .arg("--no-sandbox")
        .arg("--disable-gpu")
        .arg("--window-size=1366,2400");

    if config.block_images {
        builder = builder.arg("--blink-settings=imagesEnabled=false");
    }

    for arg in &config.chrome_args {
        builder = builder.arg(arg.clone());
    }

    let browser_config = builder
        .build()
        .map_err(|e| DriverError::Launch(format!("Failed to build browser config: {}", e)))?;

    Browser::launch(browser_config)
        .await
        .map_err(|e| DriverError::Launch(e.to_string()))
}

/// Connect to a remote Chrome instance.
async fn connect_remote(url: &str, timeout_secs: u64) -> Result<(Browser, Handler), DriverError> {
    info!(
        "Connecting to remote browser at {} (timeout: {}s)",
        url, timeout_secs
    );

    // Get WebSocket URL from the /json/version endpoint
    let http_url = url
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .get(&version_url)
        .send()
        .await
        .map_err(|e| DriverError::Launch(format!("Failed to reach remote browser: {}", e)))?
        .json()
        .await
        .map_err(|e| DriverError::Launch(format!("Failed to parse browser version info: {}", e)))?;

    let ws_url = resp
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DriverError::Launch("No webSocketDebuggerUrl in response".to_string()))?;

    debug!("Connecting to WebSocket: {}", ws_url);

    let handler_config = HandlerConfig {
        request_timeout: Duration::from_secs(timeout_secs),
        ..Default::default()
    };

    Browser::connect_with_config(ws_url, handler_config)
        .await
        .map_err(|e| DriverError::Launch(format!("Failed to connect to remote browser: {}", e)))
}
