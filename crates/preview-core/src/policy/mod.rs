//! Pure preview policies
//!
//! No state and no I/O: every result is derived from its inputs alone, so
//! callers may cache or recompute freely.

mod font;
mod scale;
mod sizing;

pub use font::{MonospaceFont, TextMeasure};
pub use scale::{plan, plan_with_limits, RenderPlan, ScaleLimits};
pub use sizing::{preferred_text_height, preferred_width, SizingPolicy};
