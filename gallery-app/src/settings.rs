//! Translates the loaded configuration into per-component settings.

use anyhow::{Context, Result};
use gallery_config::GalleryConfig;
use gallery_drivers::browser::session::SessionOptions;
use gallery_web::dom::ImageMatcher;
use gallery_web::extract::ExtractSettings;
use gallery_web::hosting::{CloudinarySettings, DeliveryTransform};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub extract: ExtractSettings,
    pub hosting: CloudinarySettings,
    pub session: SessionOptions,
    pub page: PageSettings,
}

/// What the HTML renderer needs beyond the items themselves.
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub out_dir: PathBuf,
    pub title: String,
    pub cta_label: String,
    pub delivery: DeliveryTransform,
}

impl AppSettings {
    /// Expects a config that already passed [`GalleryConfig::validate`].
    pub fn from_config(cfg: &GalleryConfig) -> Result<Self> {
        let images = ImageMatcher::new(&cfg.scrape.uploads_pattern)
            .context("scrape.uploads_pattern is not a valid regex")?;

        let extract = ExtractSettings {
            user_agent: cfg.scrape.user_agent.clone(),
            static_timeout: Duration::from_secs(cfg.scrape.static_timeout_secs),
            settle_delay: Duration::from_millis(cfg.browser.settle_delay_ms),
            description_limit: cfg.scrape.description_limit,
            default_description: cfg.scrape.default_description.clone(),
            images,
        };

        let hosting = CloudinarySettings {
            cloud_name: cfg.hosting.cloud_name.clone(),
            api_key: cfg.hosting.api_key.clone(),
            api_secret: cfg.hosting.api_secret.clone(),
            folder: cfg.hosting.folder.clone(),
            api_base: cfg.hosting.api_base.clone(),
            delivery_base: cfg.hosting.delivery_base.clone(),
            placeholder_public_id: cfg.hosting.placeholder_public_id.clone(),
            width: cfg.hosting.width,
            height: cfg.hosting.height,
            upload_timeout: Duration::from_secs(cfg.hosting.upload_timeout_secs),
            user_agent: cfg.scrape.user_agent.clone(),
        };

        let session = SessionOptions {
            webdriver_url: cfg.browser.webdriver_url.clone(),
            headless: cfg.browser.headless,
            user_agent: cfg.scrape.user_agent.clone(),
            page_load_timeout: Duration::from_secs(cfg.browser.page_load_timeout_secs),
            ..SessionOptions::default()
        };

        let page = PageSettings {
            out_dir: cfg.output.dir.clone(),
            title: cfg.output.page_title.clone(),
            cta_label: cfg.output.cta_label.clone(),
            delivery: DeliveryTransform::new(
                &cfg.hosting.delivery_base,
                &cfg.hosting.cloud_name,
                &hosting.transformation(),
            ),
        };

        Ok(Self {
            extract,
            hosting,
            session,
            page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_and_user_agent_flow_into_every_component() {
        let mut cfg = GalleryConfig::default();
        cfg.hosting.cloud_name = "demo".into();
        cfg.scrape.user_agent = "ua/1".into();
        cfg.browser.settle_delay_ms = 750;
        cfg.browser.headless = false;

        let s = AppSettings::from_config(&cfg).unwrap();
        assert_eq!(s.extract.settle_delay, Duration::from_millis(750));
        assert_eq!(s.extract.static_timeout, Duration::from_secs(30));
        assert_eq!(s.hosting.user_agent, "ua/1");
        assert_eq!(s.session.user_agent, "ua/1");
        assert!(!s.session.headless);
        assert_eq!(s.session.page_load_timeout, Duration::from_secs(60));
        assert_eq!(
            s.page.delivery.apply("https://res.cloudinary.com/demo/image/upload/v1/a.jpg"),
            "https://res.cloudinary.com/demo/image/upload/c_fill,h_800,w_1200/f_auto,q_auto/v1/a.jpg"
        );
    }

    #[test]
    fn bad_uploads_pattern_is_rejected() {
        let mut cfg = GalleryConfig::default();
        cfg.scrape.uploads_pattern = "(".into();
        assert!(AppSettings::from_config(&cfg).is_err());
    }
}
