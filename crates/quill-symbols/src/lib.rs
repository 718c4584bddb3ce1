//! quill-symbols: Symbol table core for language tooling
//!
//! This crate keeps track of every named entity a language server or
//! compiler front-end discovers while binding documents:
//! - `SymbolStore`: global table, per-document scope stacks and lookup
//! - Lifecycle: create, amend, trim and invalidate symbols and locations
//! - `EventBus`: notifications for every lifecycle change
//! - `Query`: fluent per-path builder used by language binders
//! - `CheckSession`: cross-document checking with cycle detection
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐      ┌──────────────────────────────────────┐
//! │  Query          │─────▶│  SymbolStore                         │
//! │  (per path)     │      │                                      │
//! └─────────────────┘      │  global table     document stacks    │
//!                          │  ┌────────────┐   ┌────────────────┐ │
//! ┌─────────────────┐      │  │ category → │   │ frame 0 (file) │ │
//! │  CheckSession   │─────▶│  │ name → id  │   │ frame 1..n     │ │
//! │  (per pass)     │      │  └────────────┘   └────────────────┘ │
//! └─────────────────┘      │          │ handles                   │
//!                          │          ▼                           │
//!                          │  SymbolArena ──▶ EventBus ──▶ listeners
//!                          └──────────────────────────────────────┘
//! ```

mod arena;
mod config;
mod document;
mod error;
mod events;
mod format;
mod lifecycle;
mod query;
mod session;
mod store;
mod types;

pub use arena::SymbolArena;
pub use config::{deny_restricted, AliasCyclePolicy, RestrictedPolicy, StoreConfig};
pub use document::{AnchorNode, DocumentRef, SyntaxNode, TextDocument};
pub use error::{SymbolError, SymbolResult};
pub use events::{AliasCounter, EventBus, EventKind, SubscriptionId, SymbolEvent};
pub use format::{
    dump_store, dump_table, snapshot, snapshot_json, DumpFormat, LocationSnapshot, SymbolSnapshot,
};
pub use query::{AdditionData, Query, SymbolAddition, UsageAnchor, UsageInfo};
pub use session::{CheckContext, CheckSession, DocumentChecker, DocumentLoader};
pub use store::{LookupResult, SymbolStore};
pub use types::{
    AccessType, LocationMeta, MapRef, Range, StorageTier, Symbol, SymbolId, SymbolLocation,
    SymbolMap, SymbolStack, SymbolTable, TableRef, UsageKind, Usages, Visibility,
};
