use crate::browser::stealth::StealthScripts;
use anyhow::{anyhow, Context, Result};
use fantoccini::wd::WindowHandle;
use fantoccini::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Returns the resolved source of every image element, lazy attributes included.
const IMAGE_SOURCES_SCRIPT: &str = r#"
    const out = [];
    for (const img of Array.from(document.images)) {
        const lazy = img.getAttribute('data-src')
            || img.getAttribute('data-lazy-src')
            || img.getAttribute('data-original');
        for (const raw of [img.currentSrc, img.src, lazy]) {
            if (!raw) continue;
            try { out.push(new URL(raw, document.baseURI).href); } catch (e) {}
        }
    }
    return out;
"#;

/// A single browser tab borrowed from a [`super::session::BrowserSession`].
pub struct BrowserTab<'s> {
    client: &'s Client,
    handle: WindowHandle,
    base_window: &'s WindowHandle,
}

impl<'s> BrowserTab<'s> {
    pub(crate) fn new(client: &'s Client, handle: WindowHandle, base_window: &'s WindowHandle) -> Self {
        Self {
            client,
            handle,
            base_window,
        }
    }

    /// Navigate to `url`; returns once the document has loaded or the
    /// session's page-load timeout fires.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.client.goto(url).await.map_err(anyhow::Error::from)?;
        self.client
            .execute(StealthScripts::core_evasions(), vec![])
            .await?;
        Ok(())
    }

    /// Give late scripts a fixed window to finish inserting content.
    pub async fn settle(&self, delay: Duration) {
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    /// Return the full rendered HTML source.
    pub async fn get_content(&self) -> Result<String> {
        self.client.source().await.map_err(anyhow::Error::msg)
    }

    /// Return the document title.
    pub async fn get_title(&self) -> Result<String> {
        self.client.title().await.map_err(anyhow::Error::msg)
    }

    /// Return the current page URL (after redirects).
    pub async fn get_url(&self) -> Result<String> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(anyhow::Error::msg)
    }

    /// Run a script in the page and return its JSON result.
    pub async fn run_script(&self, script: &str) -> Result<Value> {
        self.client
            .execute(script, vec![])
            .await
            .map_err(anyhow::Error::from)
    }

    /// Absolute image sources as the live DOM resolves them.
    pub async fn image_sources(&self) -> Result<Vec<String>> {
        let value = self.run_script(IMAGE_SOURCES_SCRIPT).await?;
        match value {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()),
            Value::Null => Ok(Vec::new()),
            other => Err(anyhow!("unexpected image source payload: {other}")),
        }
    }

    /// Close this tab and refocus the session's base window.
    ///
    /// Refocus is attempted even when the close fails.
    pub async fn close(self) -> Result<()> {
        let closed = self.client.close_window().await;
        let refocused = self.client.switch_to_window(self.base_window.clone()).await;
        debug!(
            target: "browser.session",
            handle = ?self.handle,
            closed = closed.is_ok(),
            refocused = refocused.is_ok(),
            "tab closed"
        );
        closed.context("failed to close tab")?;
        refocused.context("failed to refocus base window")?;
        Ok(())
    }
}
