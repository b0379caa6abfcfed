//! Minimal HTTP client with safe logging and per-request options.
//!
//! - Request options: headers, timeout
//! - Text bodies decoded by the response's declared charset
//! - Text, bytes, form and multipart helpers over one send path
//! - Redacts sensitive query params and form values in logs
//! - Optional *raw* request/response logging via `GALLERY_HTTP_RAW=1`
//!
//! No retries; callers own their fallback policy.
//!
//! Example (no_run):
//! ```rust,no_run
//! # async fn demo() -> Result<(), gallery_http::HttpError> {
//! let client = gallery_http::HttpClient::new("gallery-bot/1.0")?;
//! let html = client
//!     .get_text("https://example.com/", gallery_http::RequestOpts::default())
//!     .await?;
//! # let _ = html;
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), final errors, and (optionally)
//! raw request/response lines (target `http.raw`).

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "GALLERY_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_key(key: &str) -> bool {
    matches!(
        key.to_ascii_lowercase().as_str(),
        "access_token"
            | "authorization"
            | "auth"
            | "key"
            | "api_key"
            | "api_secret"
            | "signature"
            | "token"
            | "secret"
            | "client_secret"
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in headers.iter() {
        let mut v = val.to_str().unwrap_or("").to_string();
        if name.as_str().eq_ignore_ascii_case("authorization") {
            v = "<redacted>".into();
        }
        parts.push(format!(
            "-H '{}: {}'",
            name.as_str(),
            v.replace('\'', r"'\''")
        ));
    }
    let (host_path, query) = redact_query(url);
    let query = query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let shown = if query.is_empty() {
        format!("{}://{}", url.scheme(), host_path)
    } else {
        format!("{}://{}?{}", url.scheme(), host_path, query)
    };
    parts.push(format!("'{shown}'"));
    parts.join(" ")
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

// ==============================
// Request Options
// ==============================

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use gallery_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts {
    pub timeout: Option<Duration>,
    pub headers: Option<HeaderMap>,
}

/// Body and content type of a successful binary fetch.
#[derive(Clone, Debug)]
pub struct Fetched {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

enum Payload<'f> {
    Empty,
    Form(&'f [(&'f str, String)]),
    Multipart(Form),
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Option<Url>,
    inner: Client,
    pub default_timeout: Duration,
}

impl HttpClient {
    /// Construct a client that sends `user_agent` on every request.
    ///
    /// ```no_run
    /// use gallery_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("gallery-bot/1.0")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(30));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(user_agent: &str) -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base: None,
            inner,
            default_timeout: Duration::from_secs(30),
        })
    }

    /// Anchor relative paths to `base`. Absolute URLs are always used as-is.
    pub fn with_base(mut self, base: &str) -> Result<Self, HttpError> {
        let mut base = base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        self.base = Some(Url::parse(&base).map_err(|e| HttpError::Url(e.to_string()))?);
        Ok(self)
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// GET a resource and return its body decoded as text.
    ///
    /// The `charset` of the response's content type picks the decoder; a BOM
    /// wins over it and UTF-8 is assumed when neither is present.
    pub async fn get_text(&self, path: &str, opts: RequestOpts) -> Result<String, HttpError> {
        let (headers, bytes) = self.send(Method::GET, path, Payload::Empty, opts).await?;
        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        Ok(decode_text(&bytes, content_type))
    }

    /// GET a resource and return the raw body with its content type.
    pub async fn get_bytes(&self, path: &str, opts: RequestOpts) -> Result<Fetched, HttpError> {
        let (headers, bytes) = self.send(Method::GET, path, Payload::Empty, opts).await?;
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        Ok(Fetched {
            bytes,
            content_type,
        })
    }

    /// POST an urlencoded form and decode a JSON response.
    pub async fn post_form_json<T>(
        &self,
        path: &str,
        form: &[(&str, String)],
        opts: RequestOpts,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let (_, bytes) = self.send(Method::POST, path, Payload::Form(form), opts).await?;
        decode_json(&bytes)
    }

    /// POST a multipart form and decode a JSON response.
    pub async fn post_multipart_json<T>(
        &self,
        path: &str,
        form: Form,
        opts: RequestOpts,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let (_, bytes) = self
            .send(Method::POST, path, Payload::Multipart(form), opts)
            .await?;
        decode_json(&bytes)
    }

    fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        if let Ok(abs) = Url::parse(path) {
            return Ok(abs);
        }
        match &self.base {
            Some(base) => base
                .join(path.trim_start_matches('/'))
                .map_err(|e| HttpError::Url(e.to_string())),
            None => Err(HttpError::Url(format!("relative URL without base: {path}"))),
        }
    }

    // ==============================
    // Core request implementation
    // ==============================

    async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Payload<'_>,
        opts: RequestOpts,
    ) -> Result<(HeaderMap, Bytes), HttpError> {
        let url = self.resolve(path)?;
        let timeout = opts.timeout.unwrap_or(self.default_timeout);

        let mut rb: RequestBuilder = self.inner.request(method.clone(), url.clone());
        rb = rb.timeout(timeout);

        if let Some(hdrs) = &opts.headers {
            rb = rb.headers(hdrs.clone());
        }

        let body_kind = match &payload {
            Payload::Empty => "none",
            Payload::Form(_) => "form",
            Payload::Multipart(_) => "multipart",
        };
        let form_fields: Vec<(String, String)> = match &payload {
            Payload::Form(fields) => fields
                .iter()
                .map(|(k, v)| {
                    let shown = if is_secret_key(k) {
                        "<redacted>".to_string()
                    } else {
                        v.clone()
                    };
                    ((*k).to_string(), shown)
                })
                .collect(),
            _ => Vec::new(),
        };
        rb = match payload {
            Payload::Empty => rb,
            Payload::Form(fields) => rb.form(fields),
            Payload::Multipart(form) => rb.multipart(form),
        };

        let (_, redacted_q) = redact_query(&url);

        let req_id = format!("r{}", REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(
            req_id=%req_id,
            method=%method,
            host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
            query=?redacted_q,
            form=?form_fields,
            timeout_ms=timeout.as_millis() as u64,
            body_kind,
            "http.request.start"
        );

        if raw_enabled() {
            let merged = opts.headers.clone().unwrap_or_default();
            let curl = make_curl(&method, &url, &merged);
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        // ----- Send -----
        let t0 = std::time::Instant::now();
        let resp = rb.send().await.map_err(|err| {
            let message = describe_reqwest_error(&err);
            tracing::warn!(req_id=%req_id, message=%message, "http.network_error.send");
            HttpError::Network(message)
        })?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.map_err(|err| {
            let message = describe_reqwest_error(&err);
            tracing::warn!(req_id=%req_id, message=%message, "http.network_error.body");
            HttpError::Network(message)
        })?;
        let dur_ms = t0.elapsed().as_millis() as u64;

        let req_hdr_id = headers
            .get("x-request-id")
            .or_else(|| headers.get("x-correlation-id"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        tracing::debug!(
            req_id=%req_id,
            %status,
            duration_ms=dur_ms,
            body_len=bytes.len(),
            x_request_id=%req_hdr_id,
            content_type=?headers.get(CONTENT_TYPE).and_then(|v: &HeaderValue| v.to_str().ok()),
            "http.response.headers"
        );

        if raw_enabled() {
            let mut body_snip = bytes.to_vec();
            let truncated = body_snip.len() > RAW_MAX_BODY;
            if truncated {
                body_snip.truncate(RAW_MAX_BODY);
            }
            let text = String::from_utf8_lossy(&body_snip);
            tracing::info!(
                target:"http.raw",
                %req_id,
                status=%status,
                duration_ms=dur_ms,
                body=%text,
                truncated
            );
        }

        if status.is_success() {
            return Ok((headers, bytes));
        }

        let snippet = snip_body(&bytes);
        let message = extract_error_message(&bytes);
        tracing::warn!(
            req_id=%req_id,
            %status,
            message=%message,
            x_request_id=%req_hdr_id,
            body_snippet=%snippet,
            "http.error"
        );
        Err(HttpError::Api {
            status,
            message,
            request_id: req_hdr_id,
        })
    }
}

// ==============================
// Helpers
// ==============================

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(bytes).map_err(|e| {
        let snippet = snip_body(bytes);
        tracing::warn!(
            serde_line=%e.line(),
            serde_col=%e.column(),
            serde_err=%e.to_string(),
            body_snippet=%snippet,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

fn decode_text(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// `text/html; charset="windows-1252"` -> `windows-1252`
fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timeout: {err}")
    } else {
        err.to_string()
    }
}

fn extract_error_message(body: &[u8]) -> String {
    // {"error":{"message":"..."}}
    #[derive(Deserialize)]
    struct Nested {
        error: NestedDetail,
    }
    #[derive(Deserialize)]
    struct NestedDetail {
        message: String,
    }

    // {"message":"..."} or {"detail":"..."} or {"error":"..."}
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<Nested>(body) {
        return env.error.message;
    }
    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        if !m.message.is_empty() {
            return m.message;
        }
        if !m.detail.is_empty() {
            return m.detail;
        }
        if !m.error.is_empty() {
            return m.error;
        }
    }
    snip_body(body)
}

fn snip_body(body: &[u8]) -> String {
    let snip = String::from_utf8_lossy(body);
    if snip.chars().count() > 500 {
        let mut s: String = snip.chars().take(500).collect();
        s.push_str("...");
        s
    } else {
        snip.into_owned()
    }
}

fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let k = k.to_string();
            let v = if is_secret_key(&k) {
                "<redacted>".into()
            } else {
                v.to_string()
            };
            (k, v)
        })
        .collect::<Vec<_>>();
    (host_path, redacted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_error_message_is_extracted() {
        let body = br#"{"error":{"message":"Invalid image file"}}"#;
        assert_eq!(extract_error_message(body), "Invalid image file");
    }

    #[test]
    fn flat_error_shapes_are_extracted() {
        assert_eq!(extract_error_message(br#"{"detail":"nope"}"#), "nope");
        assert_eq!(extract_error_message(br#"{"error":"bad"}"#), "bad");
        assert_eq!(extract_error_message(b"plain text"), "plain text");
    }

    #[test]
    fn snip_body_truncates_on_char_boundary() {
        let body = "é".repeat(600);
        let snip = snip_body(body.as_bytes());
        assert!(snip.ends_with("..."));
        assert_eq!(snip.chars().count(), 503);
    }

    #[test]
    fn curl_redacts_secret_query_params() {
        let url = Url::parse("https://api.example.com/v1/upload?signature=abc&folder=x").unwrap();
        let curl = make_curl(&Method::POST, &url, &HeaderMap::new());
        assert!(curl.contains("signature=<redacted>"));
        assert!(curl.contains("folder=x"));
        assert!(!curl.contains("abc"));
    }

    #[test]
    fn text_is_decoded_with_declared_charset() {
        let latin1 = b"Caf\xE9 Menu";
        assert_eq!(
            decode_text(latin1, Some("text/html; charset=windows-1252")),
            "Café Menu"
        );
        assert_eq!(
            decode_text(latin1, Some("text/html; Charset=\"ISO-8859-1\"")),
            "Café Menu"
        );
        assert_eq!(decode_text("Café".as_bytes(), Some("text/html")), "Café");
        assert_eq!(decode_text("Café".as_bytes(), None), "Café");
        assert_eq!(decode_text("Café".as_bytes(), Some("text/html; charset=bogus")), "Café");
    }

    #[test]
    fn charset_label_ignores_other_params() {
        assert_eq!(charset_label("text/html; q=1; charset=utf-8"), Some("utf-8"));
        assert_eq!(charset_label("text/html"), None);
        assert_eq!(charset_label("charset=utf-8"), None);
    }

    #[test]
    fn relative_paths_need_a_base() {
        let client = HttpClient::new("test").unwrap();
        assert!(matches!(client.resolve("v1/x"), Err(HttpError::Url(_))));

        let client = client.with_base("https://api.example.com/v1_1").unwrap();
        assert_eq!(
            client.resolve("demo/image/upload").unwrap().as_str(),
            "https://api.example.com/v1_1/demo/image/upload"
        );
        assert_eq!(
            client.resolve("https://other.example/x").unwrap().as_str(),
            "https://other.example/x"
        );
    }
}
