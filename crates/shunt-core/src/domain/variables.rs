//! Free-variable (template placeholder) detection.
//!
//! A string has free variables when it contains an opening `{{` with a
//! closing `}}` somewhere after it. A lone marker is not a usable
//! placeholder and is left alone.

use crate::domain::node::Node;

pub const PLACEHOLDER_START: &str = "{{";
pub const PLACEHOLDER_END: &str = "}}";

/// Opening and closing delimiters of every kind of template markup.
const MARKUP_DELIMITERS: [(&str, &str); 3] = [
    (PLACEHOLDER_START, PLACEHOLDER_END),
    ("{%", "%}"),
    ("{#", "#}"),
];

/// `true` iff `text` holds at least one `{{ ... }}` placeholder.
pub fn contains_placeholder(text: &str) -> bool {
    text.find(PLACEHOLDER_START)
        .is_some_and(|start| text[start + PLACEHOLDER_START.len()..].contains(PLACEHOLDER_END))
}

/// `true` iff any string reachable from `node` contains a placeholder.
///
/// Map keys count as reachable strings. Empty containers are free of
/// variables.
pub fn has_free_variables(node: &Node) -> bool {
    match node {
        Node::String(s) => contains_placeholder(s),
        Node::Sequence(items) => items.iter().any(has_free_variables),
        Node::Map(map) => map
            .iter()
            .any(|(key, value)| contains_placeholder(key) || has_free_variables(value)),
        Node::Null | Node::Bool(_) | Node::Integer(_) | Node::Float(_) => false,
    }
}

/// A run of text between or inside placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece<'a> {
    Literal(&'a str),
    /// The trimmed expression between `{{` and `}}`.
    Expression(&'a str),
}

/// Split `text` into literal runs and placeholder expressions, in order.
///
/// An unterminated `{{` is kept as literal text.
pub fn split_placeholders(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(PLACEHOLDER_START) {
        let after = &rest[start + PLACEHOLDER_START.len()..];
        let Some(end) = after.find(PLACEHOLDER_END) else {
            break;
        };
        if start > 0 {
            pieces.push(Piece::Literal(&rest[..start]));
        }
        pieces.push(Piece::Expression(after[..end].trim()));
        rest = &after[end + PLACEHOLDER_END.len()..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }
    pieces
}

/// A run of template source, delimiters included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup<'a> {
    Text(&'a str),
    /// `{{ ... }}`
    Output(&'a str),
    /// `{% ... %}` or `{# ... #}`
    Tag(&'a str),
}

impl Markup<'_> {
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

/// Split `text` into plain text and template markup, in order.
///
/// An opener without a matching closer is plain text.
pub fn split_markup(text: &str) -> Vec<Markup<'_>> {
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;

    while let Some((start, open, close)) = next_opener(text, cursor) {
        let body = start + open.len();
        let Some(length) = text[body..].find(close) else {
            cursor = body;
            continue;
        };
        let end = body + length + close.len();
        if start > text_start {
            pieces.push(Markup::Text(&text[text_start..start]));
        }
        let markup = &text[start..end];
        pieces.push(if open == PLACEHOLDER_START {
            Markup::Output(markup)
        } else {
            Markup::Tag(markup)
        });
        text_start = end;
        cursor = end;
    }

    if text_start < text.len() {
        pieces.push(Markup::Text(&text[text_start..]));
    }
    pieces
}

/// `true` iff `text` holds any complete template markup.
pub fn contains_markup(text: &str) -> bool {
    split_markup(text).iter().any(|piece| !piece.is_text())
}

fn next_opener(text: &str, from: usize) -> Option<(usize, &'static str, &'static str)> {
    MARKUP_DELIMITERS
        .iter()
        .filter_map(|&(open, close)| text[from..].find(open).map(|at| (from + at, open, close)))
        .min_by_key(|&(at, _, _)| at)
}

/// Remove the first `{{` and the last `}}` from `text`, if present.
pub fn discard_handlebars(text: &str) -> String {
    let mut out = text.to_string();
    if let Some(start) = out.find(PLACEHOLDER_START) {
        out.replace_range(start..start + PLACEHOLDER_START.len(), "");
    }
    if let Some(end) = out.rfind(PLACEHOLDER_END) {
        out.replace_range(end..end + PLACEHOLDER_END.len(), "");
    }
    out
}
