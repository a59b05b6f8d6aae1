//! Legacy HTML description normalizer
//!
//! Converts the HTML stored in the legacy description field into a Portable
//! Text document. The function is total: malformed markup, parser panics and
//! garbage sentinels all degrade to plainer output, never to an error.
//!
//! Fallback ladder:
//! 1. structural parse into styled blocks with strong/em spans;
//! 2. zero blocks from the parse → plain text split on blank lines;
//! 3. parser panic → regex tag stripping + blank-line paragraph split.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::models::{Block, PortableTextDocument, Span};

static BR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static P_BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</p>\s*<p[^>]*>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static PARA_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Normalize a legacy HTML description into a Portable Text document
///
/// Always returns at least one block, and every block carries at least one
/// span. Empty input and the legacy `"0"` placeholder both produce a single
/// empty block.
pub fn normalize_description(html: &str) -> PortableTextDocument {
    let trimmed = html.trim();
    if trimmed.is_empty() || trimmed == "0" {
        return vec![Block::empty()];
    }

    let prepared = prepare_html(trimmed);

    // html5ever is robust against bad markup but the legacy corpus has
    // produced surprises before; contain a panic and fall back to stripping.
    let structural = catch_unwind(AssertUnwindSafe(|| parse_blocks(&prepared)));

    let blocks = match structural {
        Ok(blocks) if !blocks.is_empty() => blocks,
        Ok(_) => {
            let text = decode_entities(&TAG_RE.replace_all(&prepared, " "));
            blocks_from_plain_text(&text)
        }
        Err(_) => {
            tracing::warn!("HTML parser panicked; falling back to tag stripping");
            let text = decode_entities(&TAG_RE.replace_all(&prepared, " "));
            blocks_from_plain_text(&text)
        }
    };

    if blocks.is_empty() {
        vec![Block::empty()]
    } else {
        blocks
    }
}

/// Line breaks and paragraph boundaries become newlines before parsing
fn prepare_html(html: &str) -> String {
    let html = BR_RE.replace_all(html, "\n");
    let html = P_BREAK_RE.replace_all(&html, "</p>\n\n<p>");
    html.into_owned()
}

/// Decode the handful of entities the legacy editor emitted
///
/// `&amp;` goes last so double-encoded text decodes one level, not two.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace('\u{a0}', " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn parse_blocks(html: &str) -> Vec<Block> {
    let fragment = Html::parse_fragment(html);
    let selector =
        Selector::parse("p, h1, h2, h3, h4, h5, h6, li").expect("static selector is valid");

    let mut blocks = Vec::new();
    for element in fragment.select(&selector) {
        let style = match element.value().name() {
            "h1" => "h1",
            "h2" => "h2",
            "h3" => "h3",
            "h4" => "h4",
            "h5" => "h5",
            "h6" => "h6",
            _ => "normal",
        };

        let mut spans = Vec::new();
        collect_spans(*element, &[], &mut spans);

        let block = Block::styled(style, spans);
        if !block.text().trim().is_empty() {
            blocks.push(block);
        }
    }

    if blocks.is_empty() {
        // No block-level elements; treat the fragment as loose text
        let text: String = fragment.root_element().text().collect();
        return blocks_from_plain_text(&decode_entities(&text));
    }

    blocks
}

/// Walk child nodes, turning text into spans and b/strong/i/em into marks
fn collect_spans(node: ego_tree::NodeRef<'_, Node>, marks: &[String], spans: &mut Vec<Span>) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                let text = normalize_whitespace(text);
                if !text.trim().is_empty() {
                    if marks.is_empty() {
                        spans.push(Span::plain(text));
                    } else {
                        spans.push(Span::marked(text, marks.to_vec()));
                    }
                }
            }
            Node::Element(element) => {
                let mut child_marks = marks.to_vec();
                match element.name() {
                    "strong" | "b" => push_mark(&mut child_marks, "strong"),
                    "em" | "i" => push_mark(&mut child_marks, "em"),
                    _ => {}
                }
                collect_spans(child, &child_marks, spans);
            }
            _ => {}
        }
    }
}

fn push_mark(marks: &mut Vec<String>, mark: &str) {
    if !marks.iter().any(|m| m == mark) {
        marks.push(mark.to_string());
    }
}

/// Collapse horizontal whitespace runs, keeping newlines from `<br>`
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.replace('\u{a0}', " ").chars() {
        if ch == ' ' || ch == '\t' || ch == '\r' {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            in_space = false;
            out.push(ch);
        }
    }
    out
}

/// Blank-line paragraph split for the non-structural fallbacks
fn blocks_from_plain_text(text: &str) -> Vec<Block> {
    PARA_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|para| !para.is_empty())
        .map(|para| Block::normal(vec![Span::plain(normalize_whitespace(para).trim())]))
        .collect()
}
