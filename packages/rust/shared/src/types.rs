//! The content model: a source-agnostic representation of a document.
//!
//! The parser produces a [`ContentModel`], plugins transform it, and the
//! Markdown converter serializes it. Nothing in the model records whether the
//! HTML came from a URL or was supplied inline.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ContentModel
// ---------------------------------------------------------------------------

/// A parsed document: title plus blocks in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentModel {
    /// Document title.
    pub title: String,
    /// Blocks in depth-first document order.
    pub content: Vec<ContentBlock>,
    /// The URL the content was resolved against.
    pub source_url: String,
}

impl ContentModel {
    /// Create an empty model for the given title and source URL.
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: Vec::new(),
            source_url: source_url.into(),
        }
    }

    /// Visit every block, including blocks nested in quotes and list items.
    pub fn visit_blocks(&self, f: &mut impl FnMut(&ContentBlock)) {
        for block in &self.content {
            block.visit(f);
        }
    }

    /// Mutably visit every block, including nested ones. Parents are visited
    /// before their children.
    pub fn visit_blocks_mut(&mut self, f: &mut impl FnMut(&mut ContentBlock)) {
        for block in &mut self.content {
            block.visit_mut(f);
        }
    }
}

// ---------------------------------------------------------------------------
// ContentBlock
// ---------------------------------------------------------------------------

/// One typed unit of a [`ContentModel`].
///
/// Every variant carries everything needed to render it as Markdown without
/// going back to the DOM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Paragraph text. Inline formatting is embedded as Markdown markers.
    Text { text: String },
    /// Section heading, level 1–6.
    Heading { level: u8, text: String },
    /// Ordered or unordered list.
    List { ordered: bool, items: Vec<ListItem> },
    /// Preformatted code; `code` is kept byte-for-byte.
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        code: String,
    },
    /// Table rows; the first row is the header.
    Table { rows: Vec<Vec<String>> },
    /// Image with an absolute source URL and an optional local copy.
    Image {
        src: String,
        alt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        local_path: Option<String>,
    },
    /// A standalone link.
    Link { href: String, text: String },
    /// Block quote wrapping nested blocks.
    Quote { blocks: Vec<ContentBlock> },
    /// Pre-rendered Markdown emitted verbatim.
    Markdown { content: String },
}

impl ContentBlock {
    /// Shorthand for a [`ContentBlock::Text`] block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Shorthand for a [`ContentBlock::Heading`] block. Levels are clamped to 1–6.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::Heading {
            level: level.clamp(1, 6),
            text: text.into(),
        }
    }

    /// Shorthand for a remote [`ContentBlock::Image`] block.
    pub fn image(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self::Image {
            src: src.into(),
            alt: alt.into(),
            local_path: None,
        }
    }

    /// Stable kind name, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Heading { .. } => "heading",
            Self::List { .. } => "list",
            Self::Code { .. } => "code",
            Self::Table { .. } => "table",
            Self::Image { .. } => "image",
            Self::Link { .. } => "link",
            Self::Quote { .. } => "quote",
            Self::Markdown { .. } => "markdown",
        }
    }

    fn visit(&self, f: &mut impl FnMut(&ContentBlock)) {
        f(self);
        match self {
            Self::Quote { blocks } => {
                for block in blocks {
                    block.visit(f);
                }
            }
            Self::List { items, .. } => {
                for item in items {
                    for block in &item.children {
                        block.visit(f);
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_mut(&mut self, f: &mut impl FnMut(&mut ContentBlock)) {
        f(self);
        match self {
            Self::Quote { blocks } => {
                for block in blocks {
                    block.visit_mut(f);
                }
            }
            Self::List { items, .. } => {
                for item in items {
                    for block in &mut item.children {
                        block.visit_mut(f);
                    }
                }
            }
            _ => {}
        }
    }
}

/// A single list entry: its own text plus any nested blocks (sub-lists etc.).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    /// Item text with inline markers.
    pub text: String,
    /// Nested blocks rendered under the item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentBlock>,
}

impl ListItem {
    /// A leaf item with no nested blocks.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            children: Vec::new(),
        }
    }
}
