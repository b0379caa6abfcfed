//! Loader for gallery configuration with YAML + environment overlays.
//!
//! Sources are merged in order: an optional `gallery.yaml` (or any file the
//! `config` crate can infer from its suffix), inline YAML snippets, and
//! finally `GALLERY__`-prefixed environment variables using `__` as the
//! nesting separator (`GALLERY__HOSTING__API_KEY` sets `hosting.api_key`).
//! After merging, `${VAR}` placeholders anywhere in the tree are expanded
//! from the process environment.
//!
//! ```yaml
//! hosting:
//!   cloud_name: "${CLOUDINARY_CLOUD_NAME}"
//!   api_key: "${CLOUDINARY_API_KEY}"
//!   api_secret: "${CLOUDINARY_API_SECRET}"
//!   folder: "gallery"
//! scrape:
//!   uploads_pattern: "/wp-content/uploads/"
//! browser:
//!   webdriver_url: "http://localhost:9515"
//! output:
//!   dir: "dist"
//! ```
use config::{Config, ConfigError, Environment, File, FileFormat};
use gallery_common::observability::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
pub const DEFAULT_DESCRIPTION: &str = "Explore this resource to learn more.";
pub const DEFAULT_UPLOADS_PATTERN: &str = "/wp-content/uploads/";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub hosting: HostingConfig,
    pub scrape: ScrapeConfig,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Image hosting provider credentials and upload shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostingConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// `cloudinary://<key>:<secret>@<cloud>`; fills any credential left empty.
    pub url: Option<String>,
    pub folder: String,
    pub api_base: String,
    pub delivery_base: String,
    pub placeholder_public_id: String,
    pub width: u32,
    pub height: u32,
    pub upload_timeout_secs: u64,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            url: None,
            folder: "gallery".into(),
            api_base: "https://api.cloudinary.com/v1_1".into(),
            delivery_base: "https://res.cloudinary.com".into(),
            placeholder_public_id: "sample".into(),
            width: 1200,
            height: 800,
            upload_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub user_agent: String,
    pub static_timeout_secs: u64,
    pub description_limit: usize,
    pub default_description: String,
    /// Regex matched against image sources that live in a CMS uploads area.
    pub uploads_pattern: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.into(),
            static_timeout_secs: 30,
            description_limit: gallery_common::text::DEFAULT_LIMIT,
            default_description: DEFAULT_DESCRIPTION.into(),
            uploads_pattern: DEFAULT_UPLOADS_PATTERN.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub page_load_timeout_secs: u64,
    pub settle_delay_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: true,
            page_load_timeout_secs: 60,
            settle_delay_ms: 2500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub page_title: String,
    pub cta_label: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("dist"),
            page_title: "Resource Gallery".into(),
            cta_label: "Download".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub emit_stderr: bool,
    pub dir: Option<PathBuf>,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            emit_stderr: true,
            dir: None,
            filter: "info".into(),
        }
    }
}

impl GalleryConfig {
    /// Fill credentials from `hosting.url` and check that every required
    /// value is present and fully expanded.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if let Some(raw) = self.hosting.url.clone().filter(|u| !u.trim().is_empty()) {
            self.hosting.apply_provider_url(&raw)?;
        }

        for (name, value) in [
            ("hosting.cloud_name", &self.hosting.cloud_name),
            ("hosting.api_key", &self.hosting.api_key),
            ("hosting.api_secret", &self.hosting.api_secret),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("{name} is required")));
            }
            if value.contains("${") {
                return Err(ConfigError::Message(format!(
                    "{name} references an unset environment variable"
                )));
            }
        }

        if self.hosting.width == 0 || self.hosting.height == 0 {
            return Err(ConfigError::Message(
                "hosting.width and hosting.height must be positive".into(),
            ));
        }

        regex::Regex::new(&self.scrape.uploads_pattern).map_err(|e| {
            ConfigError::Message(format!("scrape.uploads_pattern is not a valid regex: {e}"))
        })?;

        if self.scrape.default_description.trim().is_empty() {
            self.scrape.default_description = DEFAULT_DESCRIPTION.into();
        }
        Ok(())
    }
}

impl HostingConfig {
    fn apply_provider_url(&mut self, raw: &str) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(raw.trim())
            .map_err(|e| ConfigError::Message(format!("hosting.url is invalid: {e}")))?;
        if parsed.scheme() != "cloudinary" {
            return Err(ConfigError::Message(
                "hosting.url must use the cloudinary:// scheme".into(),
            ));
        }
        if self.api_key.is_empty() {
            self.api_key = parsed.username().to_string();
        }
        if self.api_secret.is_empty() {
            self.api_secret = parsed.password().unwrap_or_default().to_string();
        }
        if self.cloud_name.is_empty() {
            self.cloud_name = parsed.host_str().unwrap_or_default().to_string();
        }
        Ok(())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct GalleryConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for GalleryConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GalleryConfigLoader {
    /// Start with `GALLERY__` environment overrides and built-in defaults.
    ///
    /// ```
    /// use gallery_config::GalleryConfigLoader;
    ///
    /// let config = GalleryConfigLoader::new()
    ///     .with_yaml_str("hosting:\n  folder: 'portfolio'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.hosting.folder, "portfolio");
    /// assert_eq!(config.hosting.width, 1200);
    /// assert_eq!(config.browser.webdriver_url, "http://localhost:9515");
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder();
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may not exist, so env-only deployments still load.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// Environment variables are layered last so they win over files.
    ///
    /// ```
    /// use gallery_config::GalleryConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOC_CLOUD_NAME", "demo-cloud"); }
    ///
    /// let config = GalleryConfigLoader::new()
    ///     .with_yaml_str("hosting:\n  cloud_name: '${DOC_CLOUD_NAME}'")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.hosting.cloud_name, "demo-cloud");
    ///
    /// unsafe { std::env::remove_var("DOC_CLOUD_NAME"); }
    /// ```
    pub fn load(self) -> Result<GalleryConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(Environment::with_prefix("GALLERY").separator("__"))
            .build()?;

        // Expansion runs on a JSON view of the merged tree.
        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        // Re-read through `config` so string values from env/YAML coerce into
        // numbers and booleans the same way the first pass would.
        let json = serde_json::to_string(&v).map_err(|e| ConfigError::Message(e.to_string()))?;
        Config::builder()
            .add_source(File::from_str(&json, FileFormat::Json))
            .build()?
            .try_deserialize()
    }
}
