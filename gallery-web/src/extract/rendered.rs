use anyhow::Result;
use async_trait::async_trait;
use gallery_common::ExtractedMeta;
use gallery_drivers::browser::session::BrowserSession;
use gallery_drivers::browser::tab::BrowserTab;
use scraper::Html;
use tracing::{debug, warn};
use url::Url;

use super::{ExtractSettings, MetaExtractor};
use crate::dom;

/// Everything read from a tab once the page has settled.
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
    pub document_title: Option<String>,
    pub image_sources: Vec<String>,
}

/// Renders pages in the shared browser session.
///
/// Only worth its cost when the static pass found no image, so the
/// orchestrator calls it conditionally.
pub struct RenderedExtractor<'s> {
    session: &'s BrowserSession,
    settings: ExtractSettings,
}

impl<'s> RenderedExtractor<'s> {
    pub fn new(session: &'s BrowserSession, settings: ExtractSettings) -> Self {
        Self { session, settings }
    }

    async fn capture(&self, tab: &BrowserTab<'_>, url: &str) -> Result<RenderedPage> {
        tab.goto(url).await?;
        tab.settle(self.settings.settle_delay).await;

        let html = tab.get_content().await?;
        let document_title = tab.get_title().await.ok().filter(|t| !t.trim().is_empty());
        let image_sources = tab.image_sources().await.unwrap_or_default();
        let final_url = tab.get_url().await.unwrap_or_else(|_| url.to_string());

        Ok(RenderedPage {
            url: final_url,
            html,
            document_title,
            image_sources,
        })
    }
}

#[async_trait]
impl MetaExtractor for RenderedExtractor<'_> {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn extract(&self, url: &str) -> ExtractedMeta {
        let tab = match self.session.open_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                warn!(target: "extract.rendered", %url, error = %e, "could not open tab");
                return self.settings.fallback_meta();
            }
        };

        let captured = self.capture(&tab, url).await;

        // The tab goes away on every path before the result is inspected.
        if let Err(e) = tab.close().await {
            warn!(target: "extract.rendered", %url, error = %e, "failed to close tab");
        }

        match captured {
            Ok(page) => {
                let meta = meta_from_rendered_page(&page, &self.settings);
                debug!(
                    target: "extract.rendered",
                    %url,
                    has_title = meta.title.is_some(),
                    has_image = meta.image.is_some(),
                    sources = page.image_sources.len(),
                    "rendered extraction finished"
                );
                meta
            }
            Err(e) => {
                warn!(target: "extract.rendered", %url, error = %e, "rendered navigation failed");
                self.settings.fallback_meta()
            }
        }
    }
}

/// Apply the rendered-page heuristics.
///
/// Title: first `h1`, `og:title`, document title. Description:
/// `meta[name=description]`, `og:description`, then the "About" section.
/// Image: `og:image`, a live image source under the uploads path, then the
/// first absolute http(s) live source.
pub fn meta_from_rendered_page(page: &RenderedPage, settings: &ExtractSettings) -> ExtractedMeta {
    let doc = Html::parse_document(&page.html);
    let base = Url::parse(&page.url).ok();

    let title = dom::first_text(&doc, "h1")
        .or_else(|| dom::meta_property(&doc, "og:title"))
        .or_else(|| page.document_title.clone())
        .or_else(|| dom::title_tag(&doc));

    let description = dom::meta_name(&doc, "description")
        .or_else(|| dom::meta_property(&doc, "og:description"))
        .or_else(|| dom::about_section_text(&doc));

    let image = dom::meta_property(&doc, "og:image")
        .and_then(|src| dom::normalize_image_url(&src, base.as_ref()))
        .or_else(|| {
            page.image_sources
                .iter()
                .filter(|src| settings.images.is_uploads(src))
                .find_map(|src| dom::normalize_image_url(src, base.as_ref()))
        })
        .or_else(|| {
            page.image_sources
                .iter()
                .filter(|src| dom::is_absolute_http(src))
                .find_map(|src| dom::normalize_image_url(src, base.as_ref()))
        });

    ExtractedMeta {
        title,
        description: settings.finish_description(description),
        image,
    }
}
