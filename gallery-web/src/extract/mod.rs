//! Page metadata extraction.
//!
//! Two strategies share one result type: [`StaticExtractor`] parses the raw
//! HTTP response, [`RenderedExtractor`] reads the DOM after a real browser has
//! run the page's scripts. Both always return an [`ExtractedMeta`]; failures
//! degrade to [`ExtractedMeta::fallback`] and are only logged.

use async_trait::async_trait;
use gallery_common::ExtractedMeta;
use gallery_common::text::shorten;
use std::time::Duration;

use crate::dom::ImageMatcher;

pub mod rendered;
pub mod static_page;

pub use rendered::RenderedExtractor;
pub use static_page::StaticExtractor;

/// One way of turning a URL into [`ExtractedMeta`].
#[async_trait]
pub trait MetaExtractor: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Extract metadata for `url`. Never fails; unusable pages yield fallback meta.
    async fn extract(&self, url: &str) -> ExtractedMeta;
}

/// Knobs shared by both extractors.
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub user_agent: String,
    pub static_timeout: Duration,
    pub settle_delay: Duration,
    pub description_limit: usize,
    pub default_description: String,
    pub images: ImageMatcher,
}

impl ExtractSettings {
    pub fn fallback_meta(&self) -> ExtractedMeta {
        ExtractedMeta::fallback(&self.default_description)
    }

    /// Shorten the first non-blank candidate, or fall back to the default sentence.
    pub(crate) fn finish_description(&self, candidate: Option<String>) -> String {
        candidate
            .map(|d| shorten(&d, self.description_limit))
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| self.default_description.clone())
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> ExtractSettings {
    ExtractSettings {
        user_agent: "gallery-test/1.0".into(),
        static_timeout: Duration::from_secs(5),
        settle_delay: Duration::ZERO,
        description_limit: 120,
        default_description: "No description available.".into(),
        images: ImageMatcher::new("/wp-content/uploads/").unwrap(),
    }
}
