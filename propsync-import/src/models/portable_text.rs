//! Portable Text document model
//!
//! Rich text as a flat, ordered sequence of blocks, each holding an ordered
//! sequence of spans. Never a DOM: produced once per legacy description and
//! not mutated afterwards.

use serde::{Deserialize, Serialize};

/// One span of text within a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "_type")]
    pub kind: SpanType,
    pub text: String,
    /// Decorator marks ("strong", "em")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<String>,
}

/// Span type tag (the format only defines one)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanType {
    #[serde(rename = "span")]
    Span,
}

/// One block of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "_type")]
    pub kind: BlockType,
    pub style: String,
    pub children: Vec<Span>,
}

/// Block type tag (the format only defines one)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    #[serde(rename = "block")]
    Block,
}

/// A complete Portable Text document
///
/// Invariant: always at least one block, and every block has at least one
/// span (possibly with empty text). Downstream consumers rely on this.
pub type PortableTextDocument = Vec<Block>;

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: SpanType::Span,
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn marked(text: impl Into<String>, marks: Vec<String>) -> Self {
        Self {
            kind: SpanType::Span,
            text: text.into(),
            marks,
        }
    }
}

impl Block {
    /// Normal-style block wrapping the given spans
    ///
    /// An empty span list is padded with one empty span to preserve the
    /// document invariant.
    pub fn normal(spans: Vec<Span>) -> Self {
        Self::styled("normal", spans)
    }

    pub fn styled(style: impl Into<String>, mut spans: Vec<Span>) -> Self {
        if spans.is_empty() {
            spans.push(Span::plain(""));
        }
        Self {
            kind: BlockType::Block,
            style: style.into(),
            children: spans,
        }
    }

    /// Single block with one empty span ("no description")
    pub fn empty() -> Self {
        Self::normal(vec![Span::plain("")])
    }

    /// Concatenated text of all spans
    pub fn text(&self) -> String {
        self.children.iter().map(|s| s.text.as_str()).collect()
    }
}
