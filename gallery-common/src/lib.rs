//! Common types and utilities shared across the gallery crates.
//!
//! This crate defines the item model that flows through the pipeline, the
//! text normalizer, observability helpers, and the shared error type. It is
//! dependency‑minimal so that every crate can depend on it.
//!
//! # Overview
//!
//! - [`SourceLink`], [`ExtractedMeta`], [`GalleryItem`]: pipeline data model
//! - [`text::shorten`]: word‑boundary truncation for descriptions
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`GalleryError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use gallery_common::{ExtractedMeta, GalleryItem};
//!
//! let meta = ExtractedMeta::fallback("No description available.");
//! assert!(meta.title.is_none());
//! assert!(meta.image.is_none());
//!
//! let item = GalleryItem::new(
//!     "Lake District".into(),
//!     meta.description,
//!     "https://res.cloudinary.com/demo/image/upload/sample".into(),
//!     "https://example.com/lake-district".into(),
//! );
//! assert_eq!(item.title, "Lake District");
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;
pub mod text;

/// A single input URL. Order of links determines gallery display order.
pub type SourceLink = String;

/// Fields scraped from one page, before rehosting.
///
/// `description` is never empty: extractors substitute the configured
/// default sentence when nothing usable was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMeta {
    pub title: Option<String>,
    pub description: String,
    pub image: Option<String>,
}

impl ExtractedMeta {
    /// Meta returned when a page could not be fetched or parsed.
    pub fn fallback(default_description: &str) -> Self {
        Self {
            title: None,
            description: default_description.to_string(),
            image: None,
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// One rendered gallery entry. `image` is always a hosted URL or the
/// hosting provider's placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub title: String,
    pub description: String,
    pub image: String,
    pub url: SourceLink,
}

impl GalleryItem {
    pub fn new(title: String, description: String, image: String, url: SourceLink) -> Self {
        Self {
            title,
            description,
            image,
            url,
        }
    }
}

/// Error types used across the gallery workspace.
#[derive(thiserror::Error, Debug)]
pub enum GalleryError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The input list could not be read or had no usable link column.
    #[error("Input error: {0}")]
    Input(String),

    /// The input contained no links at all.
    #[error("No links found in input")]
    EmptyInput,

    /// A driver (browser, network, etc.) reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),

    /// Writing one of the output artifacts failed.
    #[error("Output error: {0}")]
    Output(String),
}

/// Convenient alias for results that use [`GalleryError`].
pub type Result<T> = std::result::Result<T, GalleryError>;
