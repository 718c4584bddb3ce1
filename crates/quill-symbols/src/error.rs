//! Symbol table errors

use thiserror::Error;

use crate::types::{StorageTier, SymbolId};

/// Errors raised by the symbol table.
///
/// Every variant is a contract violation on the caller's side; expected
/// absence (unknown paths, unresolved aliases, restricted visibility) is
/// reported through query results instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SymbolError {
    /// E-SYM-001: the map that should receive a new symbol cannot be materialized
    #[error("cannot enter '{category}' symbol '{path}': its parent symbol does not exist")]
    MissingContainer { category: String, path: String },

    /// E-SYM-002: an operation required a known symbol
    #[error("'{category}' symbol '{path}' is unknown")]
    UnknownSymbol { category: String, path: String },

    /// E-SYM-003: attempted to pop the file scope of a document
    #[error("cannot pop the file scope of '{uri}'")]
    OutermostFrame { uri: String },

    /// E-SYM-004: amendment would move a symbol to another storage tier
    #[error("cannot change visibility of '{path}' from the {from:?} tier to the {to:?} tier")]
    VisibilityTierChange {
        path: String,
        from: StorageTier,
        to: StorageTier,
    },

    /// E-SYM-005: alias chain loops back on itself
    #[error("alias chain starting at '{path}' forms a cycle")]
    AliasCycle { path: String },

    /// E-SYM-006: handle refers to a symbol that has been removed
    #[error("symbol handle {0} is stale")]
    StaleHandle(SymbolId),

    /// E-SYM-007: a document was re-entered while its own check was running
    #[error("document '{uri}' is already being checked (cycle: {})", .chain.join(" -> "))]
    CheckCycle { uri: String, chain: Vec<String> },

    /// E-SYM-008: the document loader failed
    #[error("failed to load '{uri}': {message}")]
    Load { uri: String, message: String },

    /// E-SYM-009: queries need at least one path segment
    #[error("empty symbol path for category '{category}'")]
    EmptyPath { category: String },
}

impl SymbolError {
    /// Get the error code for display
    pub fn code(&self) -> &'static str {
        match self {
            SymbolError::MissingContainer { .. } => "E-SYM-001",
            SymbolError::UnknownSymbol { .. } => "E-SYM-002",
            SymbolError::OutermostFrame { .. } => "E-SYM-003",
            SymbolError::VisibilityTierChange { .. } => "E-SYM-004",
            SymbolError::AliasCycle { .. } => "E-SYM-005",
            SymbolError::StaleHandle(_) => "E-SYM-006",
            SymbolError::CheckCycle { .. } => "E-SYM-007",
            SymbolError::Load { .. } => "E-SYM-008",
            SymbolError::EmptyPath { .. } => "E-SYM-009",
        }
    }
}

pub type SymbolResult<T> = Result<T, SymbolError>;
