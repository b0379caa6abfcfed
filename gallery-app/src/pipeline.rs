//! Link-by-link orchestration.
//!
//! Static extraction always runs; the browser pass only runs when it found
//! no image. Whatever image survives is rehosted, and the host's placeholder
//! stands in when that fails. Items come out in input order.

use anyhow::Result;
use gallery_common::{ExtractedMeta, GalleryError, GalleryItem, SourceLink};
use gallery_drivers::browser::session::BrowserSession;
use gallery_web::extract::{MetaExtractor, RenderedExtractor, StaticExtractor};
use gallery_web::hosting::{CloudinaryHost, ImageHost};
use tracing::{debug, info, warn};
use url::Url;

use crate::settings::AppSettings;

/// The collaborators one run is wired with.
pub struct Stages<'a> {
    pub static_pass: &'a dyn MetaExtractor,
    pub rendered_pass: &'a dyn MetaExtractor,
    pub host: &'a dyn ImageHost,
    pub default_description: &'a str,
}

/// Launch the shared browser session, process every link, close the session.
pub async fn run(links: &[SourceLink], settings: &AppSettings) -> Result<Vec<GalleryItem>> {
    if links.is_empty() {
        return Err(GalleryError::EmptyInput.into());
    }

    let static_pass = StaticExtractor::new(settings.extract.clone())?;
    let host = CloudinaryHost::new(settings.hosting.clone())?;
    let session = BrowserSession::launch(settings.session.clone())
        .await
        .map_err(GalleryError::Driver)?;

    let outcome = {
        let rendered_pass = RenderedExtractor::new(&session, settings.extract.clone());
        let stages = Stages {
            static_pass: &static_pass,
            rendered_pass: &rendered_pass,
            host: &host,
            default_description: &settings.extract.default_description,
        };
        process_links(links, &stages).await
    };

    if let Err(e) = session.close().await {
        warn!(target: "pipeline", error = %e, "failed to close browser session");
    }
    Ok(outcome?)
}

/// Build one item per link, strictly in sequence.
pub async fn process_links(
    links: &[SourceLink],
    stages: &Stages<'_>,
) -> Result<Vec<GalleryItem>, GalleryError> {
    if links.is_empty() {
        return Err(GalleryError::EmptyInput);
    }

    let mut items = Vec::with_capacity(links.len());
    for (idx, url) in links.iter().enumerate() {
        info!(target: "pipeline", index = idx + 1, total = links.len(), %url, "processing link");
        items.push(build_item(url, stages).await);
    }

    let placeholders = items
        .iter()
        .filter(|item| item.image == stages.host.placeholder_url())
        .count();
    info!(target: "pipeline", items = items.len(), placeholders, "all links processed");
    Ok(items)
}

async fn build_item(url: &str, stages: &Stages<'_>) -> GalleryItem {
    let mut meta = stages.static_pass.extract(url).await;
    if !meta.has_image() {
        debug!(target: "pipeline", %url, fallback = stages.rendered_pass.name(), "no image from static pass");
        let rendered = stages.rendered_pass.extract(url).await;
        meta = prefer_rendered(meta, rendered, stages.default_description);
    }

    let hosted = match meta.image.as_deref() {
        Some(src) => stages.host.rehost(src).await,
        None => None,
    };
    let image = hosted.unwrap_or_else(|| {
        warn!(target: "pipeline", %url, "no hosted image; using placeholder");
        stages.host.placeholder_url()
    });

    let title = meta
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| title_from_url(url));

    GalleryItem::new(title, meta.description, image, url.to_string())
}

/// Rendered values win; static ones fill whatever the browser pass lacked.
fn prefer_rendered(static_meta: ExtractedMeta, rendered: ExtractedMeta, default_description: &str) -> ExtractedMeta {
    let description = if rendered.description == default_description {
        static_meta.description
    } else {
        rendered.description
    };
    ExtractedMeta {
        title: rendered.title.or(static_meta.title),
        description,
        image: rendered.image.filter(|s| !s.trim().is_empty()),
    }
}

/// Readable title from the last path segment, or the host for bare domains.
pub fn title_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let segment = parsed
        .path_segments()
        .and_then(|segs| segs.filter(|s| !s.is_empty()).next_back())
        .map(|s| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_else(|_| s.to_string()))
        .map(|s| s.replace(['-', '_'], " ").split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty());

    segment
        .or_else(|| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
