use async_trait::async_trait;
use gallery_common::ExtractedMeta;
use gallery_http::{HttpClient, HttpError, RequestOpts};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::Html;
use tracing::{debug, warn};
use url::Url;

use super::{ExtractSettings, MetaExtractor};
use crate::dom;

/// Fetches raw HTML over plain HTTP; no scripts run.
pub struct StaticExtractor {
    client: HttpClient,
    settings: ExtractSettings,
}

impl StaticExtractor {
    pub fn new(settings: ExtractSettings) -> Result<Self, HttpError> {
        let client = HttpClient::new(&settings.user_agent)?.with_timeout(settings.static_timeout);
        Ok(Self { client, settings })
    }

    async fn fetch(&self, url: &str) -> Result<String, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        self.client
            .get_text(
                url,
                RequestOpts {
                    headers: Some(headers),
                    ..Default::default()
                },
            )
            .await
    }
}

#[async_trait]
impl MetaExtractor for StaticExtractor {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn extract(&self, url: &str) -> ExtractedMeta {
        match self.fetch(url).await {
            Ok(html) => {
                let meta = meta_from_static_html(&html, url, &self.settings);
                debug!(
                    target: "extract.static",
                    %url,
                    has_title = meta.title.is_some(),
                    has_image = meta.image.is_some(),
                    "static extraction finished"
                );
                meta
            }
            Err(e) => {
                warn!(target: "extract.static", %url, error = %e, "static fetch failed");
                self.settings.fallback_meta()
            }
        }
    }
}

/// Apply the static-page heuristics to an HTML document fetched from `page_url`.
///
/// Title: first `h1`, `og:title`, `<title>`. Description: the "About"
/// section, `meta[name=description]`, `og:description`. Image: `og:image`,
/// `link[rel=image_src]`, then the first acceptable `<img>`.
pub fn meta_from_static_html(html: &str, page_url: &str, settings: &ExtractSettings) -> ExtractedMeta {
    let doc = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let title = dom::first_text(&doc, "h1")
        .or_else(|| dom::meta_property(&doc, "og:title"))
        .or_else(|| dom::title_tag(&doc));

    let description = dom::about_section_text(&doc)
        .or_else(|| dom::meta_name(&doc, "description"))
        .or_else(|| dom::meta_property(&doc, "og:description"));

    let image = dom::meta_property(&doc, "og:image")
        .and_then(|src| dom::normalize_image_url(&src, base.as_ref()))
        .or_else(|| {
            dom::link_image_src(&doc).and_then(|src| dom::normalize_image_url(&src, base.as_ref()))
        })
        .or_else(|| dom::first_image_candidate(&doc, &settings.images, base.as_ref()));

    ExtractedMeta {
        title,
        description: settings.finish_description(description),
        image,
    }
}
