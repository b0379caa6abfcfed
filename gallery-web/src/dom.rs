//! DOM heuristics shared by the static and rendered extractors.
//!
//! Everything here works on a parsed [`scraper::Html`] and is synchronous;
//! callers parse after their last `.await` since `Html` is not `Send`.

use gallery_common::text::collapse_whitespace;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const HEADINGS: &str = "h1, h2, h3, h4, h5, h6";
/// "About" as a whole word, any case.
const ABOUT_HEADING: &str = r"(?i)\babout\b";

/// Upper bound on siblings visited while collecting a section.
const MAX_SIBLING_STEPS: usize = 64;
/// How many ancestors a section anchor may climb when the heading is wrapped.
const MAX_ANCHOR_CLIMB: usize = 3;

/// Attributes checked on `<img>`, in order; lazy loaders park the real URL in `data-*`.
const IMAGE_ATTRS: [&str; 4] = ["src", "data-src", "data-lazy-src", "data-original"];

/// Decides which image sources are worth keeping.
#[derive(Debug, Clone)]
pub struct ImageMatcher {
    uploads: Regex,
}

impl ImageMatcher {
    pub fn new(uploads_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            uploads: Regex::new(uploads_pattern)?,
        })
    }

    /// Source lives under the configured CMS uploads path.
    pub fn is_uploads(&self, src: &str) -> bool {
        self.uploads.is_match(src)
    }

    /// Absolute http(s), protocol-relative, or an uploads path.
    pub fn is_candidate(&self, src: &str) -> bool {
        is_absolute_http(src) || self.is_uploads(src)
    }
}

pub fn is_absolute_http(src: &str) -> bool {
    let lower = src.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

/// Turn a raw image reference into an absolute https/http URL.
///
/// Protocol-relative references get `https:`; relative ones are joined onto
/// `base`. `data:` URIs and anything that does not end up http(s) are dropped.
pub fn normalize_image_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.to_ascii_lowercase().starts_with("data:") {
        return None;
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    let resolved = match Url::parse(raw) {
        Ok(abs) => abs,
        Err(_) => base?.join(raw).ok()?,
    };
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Collapsed text of an element, or `None` when blank.
pub fn element_text(el: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "));
    (!text.is_empty()).then_some(text)
}

/// Text of the first element matching `selector`.
pub fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector).find_map(element_text)
}

/// `content` of `<meta property=…>` (or `name=…`, which some sites use for OG tags).
pub fn meta_property(doc: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!(
        r#"meta[property="{property}"], meta[name="{property}"]"#
    ))
    .ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
}

/// `content` of `<meta name=…>`.
pub fn meta_name(doc: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[name="{name}"]"#)).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
}

pub fn title_tag(doc: &Html) -> Option<String> {
    first_text(doc, "title")
}

/// `href` of `<link rel="image_src">`.
pub fn link_image_src(doc: &Html) -> Option<String> {
    let selector = Selector::parse(r#"link[rel="image_src"]"#).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// First `<img>` source the matcher accepts, normalized.
pub fn first_image_candidate(doc: &Html, matcher: &ImageMatcher, base: Option<&Url>) -> Option<String> {
    let selector = Selector::parse("img").ok()?;
    doc.select(&selector).find_map(|img| {
        IMAGE_ATTRS
            .iter()
            .filter_map(|attr| img.value().attr(attr))
            .filter(|src| matcher.is_candidate(src))
            .find_map(|src| normalize_image_url(src, base))
    })
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Text of the section introduced by the first heading with the word "about".
///
/// Siblings after the heading are collected until one is (or contains) a
/// heading at the same or a higher level. When the heading sits alone inside
/// a wrapper, the walk restarts from the wrapper, up to a few levels.
pub fn about_section_text(doc: &Html) -> Option<String> {
    let headings = Selector::parse(HEADINGS).ok()?;
    let about = Regex::new(ABOUT_HEADING).ok()?;
    let heading = doc
        .select(&headings)
        .find(|h| element_text(*h).is_some_and(|t| about.is_match(&t)))?;
    let level = heading_level(heading.value().name())?;

    let mut anchor = heading;
    for _ in 0..=MAX_ANCHOR_CLIMB {
        let text = collect_until_heading(anchor, level, &headings);
        if !text.is_empty() {
            return Some(text);
        }
        match anchor.parent().and_then(ElementRef::wrap) {
            Some(parent) if !matches!(parent.value().name(), "body" | "html") => {
                anchor = parent;
            }
            _ => break,
        }
    }
    None
}

fn collect_until_heading(start: ElementRef<'_>, level: u8, headings: &Selector) -> String {
    let closes_section = |name: &str| heading_level(name).is_some_and(|l| l <= level);

    let mut parts: Vec<String> = Vec::new();
    let mut cursor = start.next_sibling();
    let mut steps = 0usize;
    while let Some(node) = cursor {
        if steps >= MAX_SIBLING_STEPS {
            break;
        }
        steps += 1;

        if let Some(el) = ElementRef::wrap(node) {
            let name = el.value().name();
            if closes_section(name) || el.select(headings).any(|h| closes_section(h.value().name())) {
                break;
            }
            if !matches!(name, "script" | "style" | "noscript" | "template") {
                if let Some(text) = element_text(el) {
                    parts.push(text);
                }
            }
        } else if let Some(text) = node.value().as_text() {
            let text = collapse_whitespace(&text.text);
            if !text.is_empty() {
                parts.push(text);
            }
        }
        cursor = node.next_sibling();
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> ImageMatcher {
        ImageMatcher::new("/wp-content/uploads/").unwrap()
    }

    #[test]
    fn about_section_stops_at_next_peer_heading() {
        let doc = Html::parse_document(
            r#"<body>
                <h2>About this resource</h2>
                <p>First paragraph.</p>
                <h3>Details</h3>
                <p>Second   paragraph.</p>
                <h2>Pricing</h2>
                <p>Not included.</p>
            </body>"#,
        );
        assert_eq!(
            about_section_text(&doc).as_deref(),
            Some("First paragraph. Details Second paragraph.")
        );
    }

    #[test]
    fn about_section_stops_at_wrapped_heading() {
        let doc = Html::parse_document(
            r#"<h2>About</h2><p>Keep me.</p><section><h2>Next</h2><p>Drop me.</p></section>"#,
        );
        assert_eq!(about_section_text(&doc).as_deref(), Some("Keep me."));
    }

    #[test]
    fn about_section_climbs_out_of_wrapper() {
        let doc = Html::parse_document(
            r#"<body><div class="widget"><h2>About Us</h2></div>
               <div class="widget"><p>We build templates.</p></div></body>"#,
        );
        assert_eq!(about_section_text(&doc).as_deref(), Some("We build templates."));
    }

    #[test]
    fn about_must_be_a_whole_word() {
        let doc = Html::parse_document(
            r#"<h2>Roundabout routes</h2><p>Wrong section.</p>
               <h2>What it's ABOUT:</h2><p>Right section.</p>"#,
        );
        assert_eq!(about_section_text(&doc).as_deref(), Some("Right section."));
    }

    #[test]
    fn about_section_skips_scripts() {
        let doc = Html::parse_document(
            r#"<h2>About</h2><script>var x = 1;</script><p>Visible.</p>"#,
        );
        assert_eq!(about_section_text(&doc).as_deref(), Some("Visible."));
    }

    #[test]
    fn about_section_walk_is_bounded() {
        let filler = "<span>x</span>".repeat(500);
        let html = format!("<h2>About</h2>{filler}");
        let doc = Html::parse_document(&html);
        let text = about_section_text(&doc).unwrap();
        assert_eq!(text.split(' ').count(), MAX_SIBLING_STEPS);
    }

    #[test]
    fn no_about_heading_yields_none() {
        let doc = Html::parse_document("<h1>Home</h1><p>text</p>");
        assert!(about_section_text(&doc).is_none());
    }

    #[test]
    fn normalizes_protocol_relative_and_relative_urls() {
        let base = Url::parse("https://site.example/blog/post").unwrap();
        assert_eq!(
            normalize_image_url("//cdn.example/a.jpg", None).as_deref(),
            Some("https://cdn.example/a.jpg")
        );
        assert_eq!(
            normalize_image_url("/wp-content/uploads/a.jpg", Some(&base)).as_deref(),
            Some("https://site.example/wp-content/uploads/a.jpg")
        );
        assert!(normalize_image_url("data:image/gif;base64,R0l", Some(&base)).is_none());
        assert!(normalize_image_url("relative.jpg", None).is_none());
    }

    #[test]
    fn first_image_prefers_lazy_attribute_over_placeholder() {
        let doc = Html::parse_document(
            r#"<img src="data:image/gif;base64,R0l" data-src="https://cdn.example/real.jpg">"#,
        );
        assert_eq!(
            first_image_candidate(&doc, &matcher(), None).as_deref(),
            Some("https://cdn.example/real.jpg")
        );
    }

    #[test]
    fn first_image_accepts_uploads_paths() {
        let base = Url::parse("https://site.example/").unwrap();
        let doc = Html::parse_document(
            r#"<img src="icons/logo.png"><img src="/wp-content/uploads/2024/cover.png">"#,
        );
        assert_eq!(
            first_image_candidate(&doc, &matcher(), Some(&base)).as_deref(),
            Some("https://site.example/wp-content/uploads/2024/cover.png")
        );
    }

    #[test]
    fn meta_lookups_ignore_blank_content() {
        let doc = Html::parse_document(
            r#"<head>
                <meta property="og:title" content="  ">
                <meta name="og:title" content="Named OG">
                <meta name="description" content=" A  description ">
            </head>"#,
        );
        assert_eq!(meta_property(&doc, "og:title").as_deref(), Some("Named OG"));
        assert_eq!(meta_name(&doc, "description").as_deref(), Some("A description"));
    }
}
