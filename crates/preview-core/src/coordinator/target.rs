//! Hover targets and what the coordinator hands back for them

use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;

use crate::cache::ContentSize;
use crate::key::CacheKey;
use crate::policy::RenderPlan;

/// The item under the pointer
#[derive(Debug, Clone)]
pub enum HoverTarget {
    Image {
        key: CacheKey,
        path: PathBuf,
        /// Native pixel size, when the host already knows it
        source_size: Option<(f64, f64)>,
        /// Width the popover wants to display the image at
        ideal_width: f64,
    },
    Markdown {
        key: CacheKey,
        source: String,
        /// Layout width for measurement; defaults to the popover content width
        content_width: Option<f64>,
    },
    Text {
        key: CacheKey,
        text: String,
    },
}

impl HoverTarget {
    /// Image target keyed by its path
    pub fn image(path: impl Into<PathBuf>, ideal_width: f64) -> Self {
        let path = path.into();
        Self::Image {
            key: CacheKey::from(path.as_path()),
            path,
            source_size: None,
            ideal_width,
        }
    }

    /// Markdown target keyed by a digest of its source
    pub fn markdown(source: impl Into<String>) -> Self {
        let source = source.into();
        Self::Markdown {
            key: CacheKey::for_content(&source),
            source,
            content_width: None,
        }
    }

    pub fn text(key: impl Into<CacheKey>, text: impl Into<String>) -> Self {
        Self::Text {
            key: key.into(),
            text: text.into(),
        }
    }

    pub fn with_source_size(mut self, width: f64, height: f64) -> Self {
        if let Self::Image { source_size, .. } = &mut self {
            *source_size = Some((width, height));
        }
        self
    }

    pub fn with_content_width(mut self, width: f64) -> Self {
        if let Self::Markdown { content_width, .. } = &mut self {
            *content_width = Some(width);
        }
        self
    }

    pub fn key(&self) -> &CacheKey {
        match self {
            Self::Image { key, .. } | Self::Markdown { key, .. } | Self::Text { key, .. } => key,
        }
    }
}

/// A preview ready to display
#[derive(Debug, Clone)]
pub enum PreviewContent {
    Image {
        bitmap: Arc<DynamicImage>,
        /// Downscale plan, when the source size was known
        plan: Option<RenderPlan>,
    },
    Markdown {
        html: String,
        size: ContentSize,
    },
    Text {
        size: ContentSize,
    },
}

/// Immediate answer to a hover
#[derive(Debug, Clone)]
pub enum HoverOutcome {
    /// Served from cache or computed synchronously
    Ready(PreviewContent),
    /// A load is running; its result arrives as a [`PreviewEvent`]
    Pending,
    /// Nothing to preview
    Empty,
}

impl HoverOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Completion of a load started by a hover
#[derive(Debug, Clone)]
pub enum PreviewEvent {
    Loaded {
        key: CacheKey,
        content: PreviewContent,
    },
    Failed {
        key: CacheKey,
    },
}

impl PreviewEvent {
    pub fn key(&self) -> &CacheKey {
        match self {
            Self::Loaded { key, .. } | Self::Failed { key } => key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_image_target_keyed_by_path() {
        let target = HoverTarget::image("/tmp/a.png", 300.0).with_source_size(10.0, 20.0);
        assert_eq!(target.key(), &CacheKey::from(Path::new("/tmp/a.png")));
        assert!(matches!(
            target,
            HoverTarget::Image {
                source_size: Some((w, h)),
                ..
            } if w == 10.0 && h == 20.0
        ));
    }

    #[test]
    fn test_markdown_target_keyed_by_content() {
        let a = HoverTarget::markdown("# hi");
        let b = HoverTarget::markdown("# hi");
        let c = HoverTarget::markdown("# bye");
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_builders_ignore_other_variants() {
        let target = HoverTarget::text("k", "body").with_source_size(1.0, 1.0);
        assert!(matches!(target, HoverTarget::Text { .. }));
    }
}
