//! Preview coordinator
//!
//! Resolves a hover target against the caches and, on a miss, drives a
//! cancellable load through the external collaborators. Only one target is
//! active at a time; hovering something else cancels the previous load, and a
//! load that finishes after losing the target writes nothing.

mod cancellation;
mod commonmark;
mod sources;
mod target;

pub use cancellation::{ActiveTarget, LoadTicket};
pub use commonmark::{plain_text, render_html, CommonMarkRenderer};
pub use sources::{ImageRequest, LoadPriority, MarkdownRenderer, ThumbnailSource};
pub use target::{HoverOutcome, HoverTarget, PreviewContent, PreviewEvent};

use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cache::{ContentSize, MarkdownArtifactCache, PreviewImageCache};
use crate::config::PreviewConfig;
use crate::error::ConfigError;
use crate::key::CacheKey;
use crate::policy::{
    plan_with_limits, MonospaceFont, RenderPlan, ScaleLimits, SizingPolicy, TextMeasure,
};

/// Outer geometry of the hover popover, in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopoverBounds {
    pub max_width: f64,
    pub max_height: f64,
    /// Inset on each side of the content
    pub padding: f64,
}

impl Default for PopoverBounds {
    fn default() -> Self {
        Self {
            max_width: 600.0,
            max_height: 480.0,
            padding: 12.0,
        }
    }
}

impl PopoverBounds {
    /// Width available to content inside the padding
    pub fn content_width(&self) -> f64 {
        (self.max_width - 2.0 * self.padding).max(1.0)
    }
}

pub struct PreviewCoordinator {
    images: Arc<PreviewImageCache>,
    markdown: Arc<MarkdownArtifactCache>,
    thumbnails: Arc<dyn ThumbnailSource>,
    renderer: Arc<dyn MarkdownRenderer>,
    font: Arc<dyn TextMeasure + Send + Sync>,
    sizing: SizingPolicy,
    limits: ScaleLimits,
    bounds: PopoverBounds,
    active: Arc<ActiveTarget>,
    events: mpsc::UnboundedSender<PreviewEvent>,
}

impl PreviewCoordinator {
    /// Build the caches from `config` and wire them to the collaborators.
    ///
    /// Load results arrive on the returned receiver. Loads run on the Tokio
    /// runtime current at hover time; a miss outside any runtime is `Empty`.
    pub fn new(
        config: &PreviewConfig,
        thumbnails: Arc<dyn ThumbnailSource>,
        renderer: Arc<dyn MarkdownRenderer>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PreviewEvent>), ConfigError> {
        config.validate()?;
        let (events, rx) = mpsc::unbounded_channel();

        let coordinator = Self {
            images: Arc::new(PreviewImageCache::new(&config.image_cache)?),
            markdown: Arc::new(MarkdownArtifactCache::new(&config.markdown_cache)?),
            thumbnails,
            renderer,
            font: Arc::new(MonospaceFont::from_point_size(13.0)),
            sizing: config.sizing.policy(),
            limits: config.scale.limits(),
            bounds: PopoverBounds::default(),
            active: Arc::new(ActiveTarget::new()),
            events,
        };
        Ok((coordinator, rx))
    }

    /// Measure text previews with `font` instead of the built-in estimate
    pub fn with_font(mut self, font: Arc<dyn TextMeasure + Send + Sync>) -> Self {
        self.font = font;
        self
    }

    pub fn with_bounds(mut self, bounds: PopoverBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn images(&self) -> &Arc<PreviewImageCache> {
        &self.images
    }

    pub fn markdown(&self) -> &Arc<MarkdownArtifactCache> {
        &self.markdown
    }

    pub fn bounds(&self) -> PopoverBounds {
        self.bounds
    }

    /// Make `target` the active hover target.
    ///
    /// Cached artifacts are returned immediately; otherwise a load is started
    /// (or an identical one already running is kept) and `Pending` returned.
    pub fn hover(&self, target: HoverTarget) -> HoverOutcome {
        if target.key().is_empty() {
            self.active.activate(None);
            return HoverOutcome::Empty;
        }

        match target {
            HoverTarget::Image {
                key,
                path,
                source_size,
                ideal_width,
            } => self.hover_image(key, path, source_size, ideal_width),
            HoverTarget::Markdown {
                key,
                source,
                content_width,
            } => {
                let width = content_width.unwrap_or_else(|| self.bounds.content_width());
                self.hover_markdown(key, source, width)
            }
            HoverTarget::Text { key, text } => {
                self.active.activate(Some(key));
                self.size_text(&text)
            }
        }
    }

    /// The pointer left every item; cancel any running load
    pub fn clear_hover(&self) {
        self.active.activate(None);
    }

    /// Cancel the active load and stop the image cache sweep
    pub fn shutdown(&self) {
        self.active.shutdown();
        self.images.shutdown();
    }

    fn size_text(&self, text: &str) -> HoverOutcome {
        if text.is_empty() {
            return HoverOutcome::Empty;
        }

        let font = &*self.font;
        let padding = self.bounds.padding;
        let width = self
            .sizing
            .preferred_width(text, font, padding, self.bounds.max_width);
        let text_height = self.sizing.preferred_text_height(
            text,
            font,
            width - 2.0 * padding,
            self.bounds.max_height,
        );
        let height = (text_height + 2.0 * padding).min(self.bounds.max_height);

        HoverOutcome::Ready(PreviewContent::Text {
            size: ContentSize::new(width, height),
        })
    }

    fn hover_image(
        &self,
        key: CacheKey,
        path: PathBuf,
        source_size: Option<(f64, f64)>,
        ideal_width: f64,
    ) -> HoverOutcome {
        let plan = source_size.map(|(w, h)| plan_with_limits(w, h, ideal_width, self.limits));

        if let Some(bitmap) = self.images.get(&key) {
            self.active.activate(Some(key));
            return HoverOutcome::Ready(PreviewContent::Image { bitmap, plan });
        }

        if let Some(bitmap) = self.thumbnails.cached_image(&path) {
            self.images.put(key.clone(), bitmap.clone());
            self.active.activate(Some(key));
            return HoverOutcome::Ready(PreviewContent::Image { bitmap, plan });
        }

        let Some(runtime) = load_runtime(&key) else {
            self.active.activate(None);
            return HoverOutcome::Empty;
        };
        let Some(ticket) = self.active.begin_load(&key) else {
            return HoverOutcome::Pending;
        };

        let request = ImageRequest {
            path,
            priority: LoadPriority::High,
            max_pixel_size: plan.map(|p| p.max_pixel_size),
        };
        debug!(key = %key, path = %request.path.display(), "Loading preview image");

        let load = ImageLoad {
            key,
            ideal_width,
            plan,
            limits: self.limits,
            images: Arc::clone(&self.images),
            thumbnails: Arc::clone(&self.thumbnails),
            active: Arc::clone(&self.active),
            events: self.events.clone(),
        };
        runtime.spawn(async move {
            load.run(&ticket, request).await;
            load.active.finish(&ticket);
        });

        HoverOutcome::Pending
    }

    fn hover_markdown(&self, key: CacheKey, source: String, content_width: f64) -> HoverOutcome {
        if source.is_empty() {
            self.active.activate(None);
            return HoverOutcome::Empty;
        }

        // Measurements depend on the layout width; HTML does not
        let metrics_key = key.at_width(content_width);
        let html = self.markdown.get_html(&key);
        let size = self.markdown.get_metrics(&metrics_key);
        if let (Some(html), Some(size)) = (html.clone(), size) {
            self.active.activate(Some(metrics_key));
            return HoverOutcome::Ready(PreviewContent::Markdown { html, size });
        }

        let Some(runtime) = load_runtime(&key) else {
            self.active.activate(None);
            return HoverOutcome::Empty;
        };
        let Some(ticket) = self.active.begin_load(&metrics_key) else {
            return HoverOutcome::Pending;
        };
        debug!(
            key = %key,
            content_width = content_width,
            cached_html = html.is_some(),
            "Rendering markdown preview"
        );

        let load = MarkdownLoad {
            key,
            metrics_key,
            source,
            content_width,
            cached_html: html,
            markdown: Arc::clone(&self.markdown),
            renderer: Arc::clone(&self.renderer),
            active: Arc::clone(&self.active),
            events: self.events.clone(),
        };
        runtime.spawn(async move {
            load.run(&ticket).await;
            load.active.finish(&ticket);
        });

        HoverOutcome::Pending
    }
}

fn load_runtime(key: &CacheKey) -> Option<Handle> {
    let runtime = Handle::try_current().ok();
    if runtime.is_none() {
        warn!(key = %key, "No tokio runtime, preview load skipped");
    }
    runtime
}

/// Everything an image load task needs, moved into the task
struct ImageLoad {
    key: CacheKey,
    ideal_width: f64,
    plan: Option<RenderPlan>,
    limits: ScaleLimits,
    images: Arc<PreviewImageCache>,
    thumbnails: Arc<dyn ThumbnailSource>,
    active: Arc<ActiveTarget>,
    events: mpsc::UnboundedSender<PreviewEvent>,
}

impl ImageLoad {
    async fn run(&self, ticket: &LoadTicket, request: ImageRequest) {
        let loaded = tokio::select! {
            _ = ticket.cancelled() => {
                debug!(key = %self.key, "Image load cancelled");
                return;
            }
            loaded = self.thumbnails.load_image(request) => loaded,
        };

        let Some(bitmap) = loaded else {
            self.commit_failure(ticket);
            return;
        };

        let plan = self.plan.unwrap_or_else(|| {
            plan_with_limits(
                f64::from(bitmap.width()),
                f64::from(bitmap.height()),
                self.ideal_width,
                self.limits,
            )
        });

        let bitmap = if bitmap.width().max(bitmap.height()) > plan.max_pixel_size {
            let source = Arc::clone(&bitmap);
            let resized = tokio::select! {
                _ = ticket.cancelled() => return,
                resized = tokio::task::spawn_blocking(move || plan.resize(&source)) => resized,
            };
            match resized {
                Ok(resized) => Arc::new(resized),
                Err(e) => {
                    warn!(key = %self.key, error = %e, "Image downscale task failed");
                    self.commit_failure(ticket);
                    return;
                }
            }
        } else {
            bitmap
        };

        self.commit_loaded(ticket, bitmap, plan);
    }

    fn commit_loaded(&self, ticket: &LoadTicket, bitmap: Arc<DynamicImage>, plan: RenderPlan) {
        let committed = self.active.commit(ticket, || {
            self.images.put(self.key.clone(), Arc::clone(&bitmap));
            let _ = self.events.send(PreviewEvent::Loaded {
                key: self.key.clone(),
                content: PreviewContent::Image {
                    bitmap,
                    plan: Some(plan),
                },
            });
        });
        if committed.is_none() {
            debug!(key = %self.key, "Discarding stale image load");
        }
    }

    fn commit_failure(&self, ticket: &LoadTicket) {
        debug!(key = %self.key, "Image load returned nothing");
        self.active.commit(ticket, || {
            let _ = self.events.send(PreviewEvent::Failed {
                key: self.key.clone(),
            });
        });
    }
}

/// Everything a markdown render task needs, moved into the task
struct MarkdownLoad {
    key: CacheKey,
    /// Content key qualified by the layout width
    metrics_key: CacheKey,
    source: String,
    content_width: f64,
    cached_html: Option<String>,
    markdown: Arc<MarkdownArtifactCache>,
    renderer: Arc<dyn MarkdownRenderer>,
    active: Arc<ActiveTarget>,
    events: mpsc::UnboundedSender<PreviewEvent>,
}

impl MarkdownLoad {
    async fn run(&self, ticket: &LoadTicket) {
        let html = match &self.cached_html {
            Some(html) => html.clone(),
            None => {
                let rendered = tokio::select! {
                    _ = ticket.cancelled() => return,
                    rendered = self.renderer.render_html(&self.source) => rendered,
                };
                let html = match rendered {
                    Ok(html) => html,
                    Err(e) => {
                        warn!(key = %self.key, error = %e, "Markdown render failed");
                        self.commit_failure(ticket);
                        return;
                    }
                };
                let stored = self.active.commit(ticket, || {
                    self.markdown.set_html(self.key.clone(), html.clone());
                });
                if stored.is_none() {
                    debug!(key = %self.key, "Discarding stale markdown render");
                    return;
                }
                html
            }
        };

        let measured = tokio::select! {
            _ = ticket.cancelled() => return,
            measured = self.renderer.measure(&html, &self.source, self.content_width) => measured,
        };
        let size = match measured {
            Ok(size) => size,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Markdown measurement failed");
                self.commit_failure(ticket);
                return;
            }
        };

        let committed = self.active.commit(ticket, || {
            self.markdown.set_metrics(self.metrics_key.clone(), size);
            let _ = self.events.send(PreviewEvent::Loaded {
                key: self.key.clone(),
                content: PreviewContent::Markdown { html, size },
            });
        });
        if committed.is_none() {
            debug!(key = %self.key, "Discarding stale markdown measurement");
        }
    }

    fn commit_failure(&self, ticket: &LoadTicket) {
        self.active.commit(ticket, || {
            let _ = self.events.send(PreviewEvent::Failed {
                key: self.key.clone(),
            });
        });
    }
}
