//! Document identities consumed from collaborators

use std::cell::Cell;
use std::fmt;

use crate::types::{Range, SymbolId};

/// A text-bearing document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    pub uri: String,
    pub text: String,
    pub version: i32,
}

impl TextDocument {
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            text: text.into(),
            version: 0,
        }
    }

    /// Text covered by `range`, if it lies on character boundaries
    pub fn slice(&self, range: Range) -> Option<&str> {
        self.text.get(range.start..range.end)
    }
}

/// Either a full document (precise ranges are recorded) or a bare URI
/// (every range collapses to `Range::empty()`).
#[derive(Debug, Clone, Copy)]
pub enum DocumentRef<'d> {
    Text(&'d TextDocument),
    Uri(&'d str),
}

impl<'d> DocumentRef<'d> {
    pub fn uri(&self) -> &'d str {
        match *self {
            DocumentRef::Text(doc) => &doc.uri,
            DocumentRef::Uri(uri) => uri,
        }
    }

    pub fn has_text(&self) -> bool {
        matches!(self, DocumentRef::Text(_))
    }
}

impl<'d> From<&'d TextDocument> for DocumentRef<'d> {
    fn from(doc: &'d TextDocument) -> Self {
        DocumentRef::Text(doc)
    }
}

impl<'d> From<&'d str> for DocumentRef<'d> {
    fn from(uri: &'d str) -> Self {
        DocumentRef::Uri(uri)
    }
}

impl<'d> From<&'d String> for DocumentRef<'d> {
    fn from(uri: &'d String) -> Self {
        DocumentRef::Uri(uri.as_str())
    }
}

/// Parse-tree node a usage can be anchored to.
///
/// The node supplies the usage range and receives the resolved symbol once
/// the usage is recorded, so later passes (go-to-definition, hover) can jump
/// from the node to the symbol.
pub trait SyntaxNode: fmt::Debug {
    fn range(&self) -> Range;

    fn attach_symbol(&self, symbol: SymbolId);
}

/// Minimal node handle for collaborators without their own tree type
#[derive(Debug, Default)]
pub struct AnchorNode {
    range: Range,
    symbol: Cell<Option<SymbolId>>,
}

impl AnchorNode {
    pub fn new(range: impl Into<Range>) -> Self {
        Self {
            range: range.into(),
            symbol: Cell::new(None),
        }
    }

    pub fn symbol(&self) -> Option<SymbolId> {
        self.symbol.get()
    }
}

impl SyntaxNode for AnchorNode {
    fn range(&self) -> Range {
        self.range
    }

    fn attach_symbol(&self, symbol: SymbolId) {
        self.symbol.set(Some(symbol));
    }
}
