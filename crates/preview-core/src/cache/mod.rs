//! Preview caches
//!
//! Both caches are built on [`BoundedStore`], the shared LRU primitive with
//! count and cost ceilings.

mod bounded;
mod markdown;
mod preview_image;

pub use bounded::BoundedStore;
pub use markdown::{html_cost, ContentSize, MarkdownArtifactCache};
pub use preview_image::{image_cost, CacheStats, PreviewImageCache};
