//! External collaborators the coordinator loads from
//!
//! Decoding and rendering live outside this crate; these traits are the only
//! contract. Loads are cancelled by dropping their futures, so
//! implementations should not rely on running to completion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;

use crate::cache::ContentSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LoadPriority {
    Low,
    #[default]
    Normal,
    /// A user is hovering the item right now
    High,
}

/// Decode request handed to a [`ThumbnailSource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub path: PathBuf,
    pub priority: LoadPriority,
    /// Longest side to decode at, from the render plan; `None` for native size
    pub max_pixel_size: Option<u32>,
}

/// Thumbnail / image decode pipeline
#[async_trait]
pub trait ThumbnailSource: Send + Sync {
    /// Non-blocking lookup in the source's own cache
    fn cached_image(&self, path: &Path) -> Option<Arc<DynamicImage>>;

    /// Decode an image. `None` means the load failed; failures are silent.
    async fn load_image(&self, request: ImageRequest) -> Option<Arc<DynamicImage>>;
}

/// Markdown to HTML renderer and its layout measurement
#[async_trait]
pub trait MarkdownRenderer: Send + Sync {
    async fn render_html(&self, markdown: &str) -> anyhow::Result<String>;

    /// Lay out rendered HTML at `content_width` and report the used size
    async fn measure(
        &self,
        html: &str,
        markdown: &str,
        content_width: f64,
    ) -> anyhow::Result<ContentSize>;
}
