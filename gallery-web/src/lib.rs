//! Page scraping and image rehosting.
//!
//! - HTML helpers shared by both extraction passes (`dom`)
//! - Static and browser-rendered metadata extractors (`extract`)
//! - Signed uploads to the image host (`hosting`)

pub mod dom;
pub mod extract;
pub mod hosting;
