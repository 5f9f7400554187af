//! Preview Core
//!
//! Hover-preview rendering caches and sizing engine for the clipboard history UI.
//!
//! ## Module Structure
//! - `cache`: bounded LRU store, decoded image cache (sliding TTL), markdown artifacts
//! - `policy`: pure image downscale planning and popover sizing
//! - `coordinator`: resolves hover targets against the caches, drives cancellable loads
//! - `config`: TOML-loadable tunables validated at construction
//!
//! Everything here degrades gracefully: misses, expirations and rejected inserts
//! are reported as "no value", never as errors. Only configuration is fallible.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod key;
pub mod policy;

pub use cache::{
    BoundedStore, CacheStats, ContentSize, MarkdownArtifactCache, PreviewImageCache,
};
pub use config::{
    ImageCacheConfig, ImageCostModel, MarkdownCacheConfig, PreviewConfig, ScaleConfig,
    SizingConfig,
};
pub use coordinator::{
    CommonMarkRenderer, HoverOutcome, HoverTarget, ImageRequest, LoadPriority, MarkdownRenderer,
    PopoverBounds, PreviewContent, PreviewCoordinator, PreviewEvent, ThumbnailSource,
};
pub use error::ConfigError;
pub use key::CacheKey;
pub use policy::{
    plan, plan_with_limits, preferred_text_height, preferred_width, MonospaceFont, RenderPlan,
    ScaleLimits, SizingPolicy, TextMeasure,
};
