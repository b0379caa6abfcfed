use crate::browser::{stealth::build_chrome_arguments, tab::BrowserTab};
use anyhow::{Context, Result};
use fantoccini::wd::{TimeoutConfiguration, WindowHandle};
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use webdriver::capabilities::Capabilities;

/// Overrides the configured endpoint, e.g. for Gecko or remote grids.
pub const WEBDRIVER_URL_ENV: &str = "GALLERY_WEBDRIVER_URL";

/// Launch parameters for a [`BrowserSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: String,
    pub window_size: (u32, u32),
    pub page_load_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            window_size: (1440, 900),
            page_load_timeout: Duration::from_secs(60),
        }
    }
}

impl SessionOptions {
    fn endpoint(&self) -> String {
        std::env::var(WEBDRIVER_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.webdriver_url.clone())
    }
}

/// One WebDriver session shared by every rendered extraction in a run.
///
/// Tabs are opened one at a time with [`BrowserSession::open_tab`]; the
/// session's first window stays open so closing a tab never ends the session.
pub struct BrowserSession {
    client: Client,
    base_window: WindowHandle,
}

impl BrowserSession {
    /// Connect to a running WebDriver service (Chromedriver by default).
    pub async fn launch(options: SessionOptions) -> Result<Self> {
        let endpoint = options.endpoint();
        Url::parse(&endpoint).with_context(|| format!("invalid WebDriver URL: {endpoint}"))?;

        let mut caps = Capabilities::new();
        let mut chrome_opts = HashMap::new();
        chrome_opts.insert("args".to_string(), json!(build_chrome_arguments(&options)));
        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&endpoint)
            .await
            .with_context(|| format!("failed to start WebDriver session at {endpoint}"))?;

        client
            .update_timeouts(TimeoutConfiguration::new(
                None,
                Some(options.page_load_timeout),
                None,
            ))
            .await
            .context("failed to configure page load timeout")?;

        let base_window = client
            .window()
            .await
            .context("failed to read initial window handle")?;

        info!(
            target: "browser.session",
            %endpoint,
            headless = options.headless,
            page_load_timeout_ms = options.page_load_timeout.as_millis() as u64,
            "browser session started"
        );

        Ok(Self {
            client,
            base_window,
        })
    }

    /// Open a fresh tab and focus it. The caller must [`BrowserTab::close`] it.
    pub async fn open_tab(&self) -> Result<BrowserTab<'_>> {
        let created = self
            .client
            .new_window(true)
            .await
            .context("failed to open a new tab")?;
        if let Err(e) = self.client.switch_to_window(created.handle.clone()).await {
            self.discard_window(created.handle).await;
            return Err(anyhow::Error::from(e).context("failed to focus the new tab"));
        }
        debug!(target: "browser.session", "tab opened");
        Ok(BrowserTab::new(&self.client, created.handle, &self.base_window))
    }

    /// Best-effort close of a window that never became a [`BrowserTab`].
    ///
    /// `close_window` acts on the focused window, so it only runs once the
    /// stray window holds focus; focus always goes back to the base window.
    async fn discard_window(&self, handle: WindowHandle) {
        match self.client.switch_to_window(handle.clone()).await {
            Ok(()) => {
                if let Err(e) = self.client.close_window().await {
                    warn!(target: "browser.session", ?handle, error = %e, "failed to close stray tab");
                }
            }
            Err(e) => {
                warn!(target: "browser.session", ?handle, error = %e, "stray tab left open");
            }
        }
        if let Err(e) = self.client.switch_to_window(self.base_window.clone()).await {
            warn!(target: "browser.session", error = %e, "failed to refocus base window");
        }
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        info!(target: "browser.session", "browser session closed");
        Ok(())
    }
}
