//! Link list reader.
//!
//! The input is a CSV file whose header names a `Link` or `URL` column
//! (any case). Other columns are ignored.

use gallery_common::{GalleryError, SourceLink};
use indexmap::IndexSet;
use std::path::Path;

const LINK_HEADERS: [&str; 2] = ["link", "url"];

pub fn read_links(path: &Path) -> Result<Vec<SourceLink>, GalleryError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| GalleryError::Input(format!("cannot read {}: {e}", path.display())))?;
    parse_links(&text)
}

/// Trimmed, non-empty links in first-seen order with exact duplicates removed.
pub fn parse_links(text: &str) -> Result<Vec<SourceLink>, GalleryError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = parse_records(text)
        .into_iter()
        .filter(|r| r.iter().any(|cell| !cell.trim().is_empty()));

    let header = records
        .next()
        .ok_or_else(|| GalleryError::Input("input has no header row".into()))?;
    let column = header
        .iter()
        .position(|h| LINK_HEADERS.contains(&h.trim().to_ascii_lowercase().as_str()))
        .ok_or_else(|| {
            GalleryError::Input(format!(
                "no Link or URL column in header: {}",
                header.join(",")
            ))
        })?;

    let links: IndexSet<SourceLink> = records
        .filter_map(|r| r.get(column).map(|cell| cell.trim().to_string()))
        .filter(|link| !link.is_empty())
        .collect();
    Ok(links.into_iter().collect())
}

/// Split CSV text into records. Quoted fields may hold commas, newlines and `""`.
fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}
