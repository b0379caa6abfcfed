//! Cloudinary-compatible signed uploads.
//!
//! Uploads go to `{api_base}/{cloud_name}/image/upload`. Every request is
//! signed: the non-credential parameters are sorted, joined as `k=v&k=v`,
//! suffixed with the API secret and hashed with SHA-1.

use async_trait::async_trait;
use gallery_http::{HttpClient, HttpError, RequestOpts};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use super::ImageHost;

/// Length of the hex digest used as upload identity.
const PUBLIC_ID_LEN: usize = 24;

#[derive(Debug, Clone)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    pub api_base: String,
    pub delivery_base: String,
    pub placeholder_public_id: String,
    pub width: u32,
    pub height: u32,
    pub upload_timeout: Duration,
    pub user_agent: String,
}

impl CloudinarySettings {
    /// `c_fill,h_<h>,w_<w>/f_auto,q_auto`
    pub fn transformation(&self) -> String {
        format!("c_fill,h_{},w_{}/f_auto,q_auto", self.height, self.width)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Rewrites delivery URLs from one cloud so they carry a display transformation.
#[derive(Debug, Clone)]
pub struct DeliveryTransform {
    prefix: String,
    transformation: String,
}

impl DeliveryTransform {
    pub fn new(delivery_base: &str, cloud_name: &str, transformation: &str) -> Self {
        Self {
            prefix: format!(
                "{}/{}/image/upload/",
                delivery_base.trim_end_matches('/'),
                cloud_name
            ),
            transformation: transformation.to_string(),
        }
    }

    /// Insert the transformation unless `url` is foreign or already transformed.
    pub fn apply(&self, url: &str) -> String {
        let Some(rest) = url.strip_prefix(&self.prefix) else {
            return url.to_string();
        };
        let first = rest.split('/').next().unwrap_or_default();
        if looks_like_transformation(first) {
            return url.to_string();
        }
        format!("{}{}/{}", self.prefix, self.transformation, rest)
    }
}

fn looks_like_transformation(segment: &str) -> bool {
    !segment.is_empty()
        && segment.split(',').all(|part| {
            part.split_once('_').is_some_and(|(key, _)| {
                !key.is_empty() && key.len() <= 3 && key.chars().all(|c| c.is_ascii_lowercase())
            })
        })
}

/// Sign upload parameters: sorted `k=v` pairs joined by `&`, then the secret, SHA-1 hex.
pub fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stable upload identity for a source image, so re-runs overwrite instead of duplicating.
pub fn public_id_for(image_url: &str) -> String {
    let digest = blake3::hash(image_url.trim().as_bytes()).to_hex();
    digest.as_str()[..PUBLIC_ID_LEN].to_string()
}

pub struct CloudinaryHost {
    settings: CloudinarySettings,
    api: HttpClient,
    fetcher: HttpClient,
}

impl CloudinaryHost {
    pub fn new(settings: CloudinarySettings) -> Result<Self, HttpError> {
        let api = HttpClient::new(&settings.user_agent)?
            .with_base(&settings.api_base)?
            .with_timeout(settings.upload_timeout);
        let fetcher = HttpClient::new(&settings.user_agent)?.with_timeout(settings.upload_timeout);
        Ok(Self {
            settings,
            api,
            fetcher,
        })
    }

    /// Transformation applied to this cloud's URLs at render time.
    pub fn delivery_transform(&self) -> DeliveryTransform {
        DeliveryTransform::new(
            &self.settings.delivery_base,
            &self.settings.cloud_name,
            &self.settings.transformation(),
        )
    }

    fn upload_path(&self) -> String {
        format!("{}/image/upload", self.settings.cloud_name)
    }

    /// Signed parameter list; `api_key` and `signature` are appended last.
    fn signed_params(
        &self,
        public_id: &str,
        transformation: Option<String>,
        timestamp: i64,
    ) -> Vec<(&'static str, String)> {
        let mut params: BTreeMap<&'static str, String> = BTreeMap::new();
        params.insert("folder", self.settings.folder.clone());
        params.insert("overwrite", "true".to_string());
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", timestamp.to_string());
        if let Some(t) = transformation {
            params.insert("transformation", t);
        }
        let signature = sign_params(&params, &self.settings.api_secret);

        let mut out: Vec<(&'static str, String)> = params.into_iter().collect();
        out.push(("api_key", self.settings.api_key.clone()));
        out.push(("signature", signature));
        out
    }

    /// Ask the provider to fetch the remote URL itself and transform on ingest.
    async fn upload_remote(&self, image_url: &str) -> Result<String, HttpError> {
        let mut form = self.signed_params(
            &public_id_for(image_url),
            Some(self.settings.transformation()),
            chrono::Utc::now().timestamp(),
        );
        form.push(("file", image_url.to_string()));
        let uploaded: UploadResponse = self
            .api
            .post_form_json(&self.upload_path(), &form, RequestOpts::default())
            .await?;
        Ok(uploaded.secure_url)
    }

    /// Fetch the bytes ourselves (looking like a browser) and stream them up raw.
    async fn upload_fetched(&self, image_url: &str) -> Result<String, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("image/avif,image/webp,image/apng,image/*,*/*;q=0.8"),
        );
        if let Some(origin) = origin_of(image_url) {
            if let Ok(value) = HeaderValue::from_str(&origin) {
                headers.insert(REFERER, value);
            }
        }
        let fetched = self
            .fetcher
            .get_bytes(
                image_url,
                RequestOpts {
                    headers: Some(headers),
                    ..Default::default()
                },
            )
            .await?;

        let mut part = Part::bytes(fetched.bytes.to_vec()).file_name(file_name_of(image_url));
        if let Some(ct) = fetched.content_type.as_deref() {
            part = part
                .mime_str(ct)
                .map_err(|e| HttpError::Build(format!("invalid content type {ct}: {e}")))?;
        }

        let params = self.signed_params(
            &public_id_for(image_url),
            None,
            chrono::Utc::now().timestamp(),
        );
        let form = params
            .into_iter()
            .fold(Form::new(), |form, (k, v)| form.text(k, v))
            .part("file", part);

        let uploaded: UploadResponse = self
            .api
            .post_multipart_json(&self.upload_path(), form, RequestOpts::default())
            .await?;
        Ok(uploaded.secure_url)
    }
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn rehost(&self, image_url: &str) -> Option<String> {
        let image_url = image_url.trim();
        if image_url.is_empty() {
            return None;
        }

        match self.upload_remote(image_url).await {
            Ok(hosted) => {
                info!(target: "rehost.primary", source = %image_url, %hosted, "image rehosted");
                return Some(hosted);
            }
            Err(e) => {
                warn!(target: "rehost.primary", source = %image_url, error = %e, "remote upload rejected; fetching directly");
            }
        }

        match self.upload_fetched(image_url).await {
            Ok(hosted) => {
                info!(target: "rehost.fallback", source = %image_url, %hosted, "image rehosted from fetched bytes");
                Some(hosted)
            }
            Err(e) => {
                warn!(target: "rehost.fallback", source = %image_url, error = %e, "direct fetch upload failed");
                None
            }
        }
    }

    fn placeholder_url(&self) -> String {
        format!(
            "{}/{}/image/upload/{}/{}",
            self.settings.delivery_base.trim_end_matches('/'),
            self.settings.cloud_name,
            self.settings.transformation(),
            self.settings.placeholder_public_id
        )
    }
}

fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}/", parsed.scheme(), host, port),
        None => format!("{}://{}/", parsed.scheme(), host),
    })
}

fn file_name_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segs| segs.next_back().map(|s| s.to_string()))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string())
}
