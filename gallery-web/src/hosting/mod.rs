//! Image rehosting.
//!
//! Source images are copied to the hosting provider so the gallery never
//! hotlinks third-party assets. [`ImageHost::rehost`] returns `None` on any
//! failure; the orchestrator substitutes [`ImageHost::placeholder_url`].

use async_trait::async_trait;

pub mod cloudinary;

pub use cloudinary::{CloudinaryHost, CloudinarySettings, DeliveryTransform};

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload `image_url` and return the hosted URL, or `None` when every attempt failed.
    async fn rehost(&self, image_url: &str) -> Option<String>;

    /// Image used when nothing could be hosted; served by the same provider.
    fn placeholder_url(&self) -> String;
}
