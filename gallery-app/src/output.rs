//! Writes the gallery artifacts: `gallery.json`, `gallery.csv`, `index.html`.
//!
//! Everything is rendered in memory first so a failure leaves no partial set.

use gallery_common::{GalleryError, GalleryItem};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::settings::PageSettings;

pub const JSON_FILE: &str = "gallery.json";
pub const CSV_FILE: &str = "gallery.csv";
pub const HTML_FILE: &str = "index.html";

const CSV_HEADER: [&str; 4] = ["Name", "Description", "Image URL", "Download Link"];

const STYLE: &str = r#"
*{box-sizing:border-box}
body{margin:0;font-family:system-ui,-apple-system,"Segoe UI",Roboto,sans-serif;background:#f6f6f4;color:#1d1d1f}
header{padding:2.5rem 1.5rem 1rem;text-align:center}
h1{margin:0;font-size:2rem}
.grid{display:grid;grid-template-columns:repeat(2,minmax(0,1fr));gap:1.5rem;max-width:1100px;margin:0 auto;padding:1.5rem}
@media (max-width:700px){.grid{grid-template-columns:1fr}}
.card{background:#fff;border-radius:12px;overflow:hidden;box-shadow:0 1px 4px rgba(0,0,0,.08);display:flex;flex-direction:column}
.card img{width:100%;aspect-ratio:3/2;object-fit:cover;display:block;background:#e8e8e8}
.card .body{padding:1rem 1.25rem 1.25rem;display:flex;flex-direction:column;gap:.6rem;flex:1}
.card h2{margin:0;font-size:1.15rem}
.card p{margin:0;color:#555;line-height:1.45;flex:1}
.cta{align-self:flex-start;padding:.55rem 1.1rem;border-radius:8px;background:#1d1d1f;color:#fff;text-decoration:none;font-weight:600}
.cta:hover{background:#3a3a3c}
"#;

/// Paths of the files written by [`write_all`].
#[derive(Debug, Clone)]
pub struct Written {
    pub json: PathBuf,
    pub csv: PathBuf,
    pub html: PathBuf,
}

pub fn write_all(items: &[GalleryItem], page: &PageSettings) -> Result<Written, GalleryError> {
    let json = to_json(items)?;
    let csv = to_csv(items);
    let markup = render_page(items, page).into_string();

    let dir = &page.out_dir;
    fs::create_dir_all(dir)
        .map_err(|e| GalleryError::Output(format!("cannot create {}: {e}", dir.display())))?;

    let files = [(JSON_FILE, json), (CSV_FILE, csv), (HTML_FILE, markup)];

    // Stage every file first; only a complete set is moved into place.
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
    for (name, contents) in &files {
        let tmp = dir.join(format!(".{name}.tmp"));
        if let Err(e) = fs::write(&tmp, contents) {
            discard(staged.iter().map(|(tmp, _)| tmp));
            return Err(GalleryError::Output(format!("cannot write {}: {e}", tmp.display())));
        }
        staged.push((tmp, dir.join(name)));
    }

    for (idx, (tmp, path)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, path) {
            discard(staged[..idx].iter().map(|(_, path)| path));
            discard(staged[idx..].iter().map(|(tmp, _)| tmp));
            return Err(GalleryError::Output(format!("cannot write {}: {e}", path.display())));
        }
    }

    let written = Written {
        json: dir.join(JSON_FILE),
        csv: dir.join(CSV_FILE),
        html: dir.join(HTML_FILE),
    };
    info!(target: "output", dir = %dir.display(), items = items.len(), "gallery written");
    Ok(written)
}

fn discard<'a>(paths: impl Iterator<Item = &'a PathBuf>) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            warn!(target: "output", path = %path.display(), error = %e, "failed to remove partial output");
        }
    }
}

pub fn to_json(items: &[GalleryItem]) -> Result<String, GalleryError> {
    serde_json::to_string_pretty(items).map_err(|e| GalleryError::Output(e.to_string()))
}

/// Every field quoted; embedded quotes doubled.
pub fn to_csv(items: &[GalleryItem]) -> String {
    let mut out = csv_row(&CSV_HEADER);
    for item in items {
        out.push_str(&csv_row(&[&item.title, &item.description, &item.image, &item.url]));
    }
    out
}

fn csv_row(fields: &[&str]) -> String {
    let quoted: Vec<String> = fields
        .iter()
        .map(|f| format!("\"{}\"", f.replace('"', "\"\"")))
        .collect();
    format!("{}\n", quoted.join(","))
}

pub fn render_page(items: &[GalleryItem], page: &PageSettings) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (page.title) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                header { h1 { (page.title) } }
                main class="grid" {
                    @for item in items {
                        (card(item, page))
                    }
                }
            }
        }
    }
}

fn card(item: &GalleryItem, page: &PageSettings) -> Markup {
    html! {
        article class="card" {
            img src=(page.delivery.apply(&item.image)) alt=(item.title) loading="lazy";
            div class="body" {
                h2 { (item.title) }
                p { (item.description) }
                a class="cta" href=(item.url) target="_blank" rel="noopener noreferrer" {
                    (page.cta_label)
                }
            }
        }
    }
}
