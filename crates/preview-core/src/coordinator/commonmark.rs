//! CommonMark renderer using pulldown-cmark
//!
//! Default [`MarkdownRenderer`] for hosts without an embedded web view. HTML
//! comes straight from pulldown-cmark; the measured size is an estimate from
//! the rendered plain text under the sizing policy.

use async_trait::async_trait;
use pulldown_cmark::{html, Event, Options, Parser, TagEnd};

use super::sources::MarkdownRenderer;
use crate::cache::ContentSize;
use crate::policy::{MonospaceFont, SizingPolicy};

fn parser_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

/// Render markdown to an HTML fragment
pub fn render_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, parser_options());
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Visible text of a markdown document, one block per line
pub fn plain_text(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());

    for event in Parser::new_ext(markdown, parser_options()) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak
            | Event::Rule
            | Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::TableRow)
            | Event::End(TagEnd::TableHead) => out.push('\n'),
            Event::End(TagEnd::TableCell) => out.push('\t'),
            _ => {}
        }
    }

    let trimmed = out.trim_end_matches('\n').len();
    out.truncate(trimmed);
    out
}

pub struct CommonMarkRenderer {
    font: MonospaceFont,
    sizing: SizingPolicy,
    /// Reported height never exceeds this
    max_height: f64,
}

impl Default for CommonMarkRenderer {
    fn default() -> Self {
        Self::new(MonospaceFont::from_point_size(13.0), SizingPolicy::default())
    }
}

impl CommonMarkRenderer {
    pub fn new(font: MonospaceFont, sizing: SizingPolicy) -> Self {
        Self {
            font,
            sizing,
            max_height: 10_000.0,
        }
    }

    pub fn with_max_height(mut self, max_height: f64) -> Self {
        self.max_height = max_height;
        self
    }
}

#[async_trait]
impl MarkdownRenderer for CommonMarkRenderer {
    async fn render_html(&self, markdown: &str) -> anyhow::Result<String> {
        Ok(render_html(markdown))
    }

    async fn measure(
        &self,
        _html: &str,
        markdown: &str,
        content_width: f64,
    ) -> anyhow::Result<ContentSize> {
        let text = plain_text(markdown);
        let width = self
            .sizing
            .preferred_width(&text, &self.font, 0.0, content_width);
        let height = self
            .sizing
            .preferred_text_height(&text, &self.font, width, self.max_height);
        Ok(ContentSize::new(width, height))
    }
}
