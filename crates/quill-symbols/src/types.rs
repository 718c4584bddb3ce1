//! Core symbol types

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Handles and ranges
// ============================================================================

/// Generational handle to a symbol owned by the store's arena.
///
/// A handle outlives the symbol it names; once the symbol is removed the
/// slot's generation moves on and every lookup through the old handle fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId {
    index: u32,
    generation: u32,
}

impl SymbolId {
    pub const fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Half-open byte range `[start, end)` inside a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero-length range at offset 0, used for documents without text
    pub const fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(range: std::ops::Range<usize>) -> Self {
        Range::new(range.start, range.end)
    }
}

impl From<[usize; 2]> for Range {
    fn from([start, end]: [usize; 2]) -> Self {
        Range::new(start, end)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Visibility
// ============================================================================

/// Declared visibility of a symbol. Absent visibility means `Public`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Innermost lexical scope of the declaring document
    Block,
    /// Whole declaring document
    File,
    /// Workspace-root gated
    Restricted,
    /// Everywhere
    Public,
}

impl Visibility {
    /// The table a symbol with this visibility is stored in
    pub fn tier(self) -> StorageTier {
        match self {
            Visibility::Block => StorageTier::Block,
            Visibility::File => StorageTier::File,
            Visibility::Restricted | Visibility::Public => StorageTier::Global,
        }
    }

    pub fn tier_of(visibility: Option<Visibility>) -> StorageTier {
        visibility.map_or(StorageTier::Global, Visibility::tier)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Block => "block",
            Visibility::File => "file",
            Visibility::Restricted => "restricted",
            Visibility::Public => "public",
        }
    }
}

/// Where a symbol lives: the global table, frame 0 of a document stack, or
/// the innermost frame of a document stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageTier {
    Block,
    File,
    Global,
}

// ============================================================================
// Locations
// ============================================================================

/// Why a location was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UsageKind {
    Declaration,
    Definition,
    Implementation,
    Reference,
    TypeDefinition,
}

impl UsageKind {
    pub const ALL: [UsageKind; 5] = [
        UsageKind::Declaration,
        UsageKind::Definition,
        UsageKind::Implementation,
        UsageKind::Reference,
        UsageKind::TypeDefinition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Declaration => "declaration",
            UsageKind::Definition => "definition",
            UsageKind::Implementation => "implementation",
            UsageKind::Reference => "reference",
            UsageKind::TypeDefinition => "typeDefinition",
        }
    }
}

impl Default for UsageKind {
    fn default() -> Self {
        UsageKind::Reference
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationMeta {
    pub access_type: Option<AccessType>,
    pub from_default_library: bool,
}

/// One recorded usage of a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub uri: String,
    /// Range of the identifier itself
    pub range: Option<Range>,
    /// Range of the enclosing construct
    pub full_range: Option<Range>,
    /// Recorded by an implicit binding pass rather than by source syntax
    pub is_uri_bound: bool,
    pub meta: LocationMeta,
}

/// Ordered location lists, one per usage kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usages {
    pub declaration: Vec<SymbolLocation>,
    pub definition: Vec<SymbolLocation>,
    pub implementation: Vec<SymbolLocation>,
    pub reference: Vec<SymbolLocation>,
    pub type_definition: Vec<SymbolLocation>,
}

impl Usages {
    pub fn get(&self, kind: UsageKind) -> &[SymbolLocation] {
        match kind {
            UsageKind::Declaration => &self.declaration,
            UsageKind::Definition => &self.definition,
            UsageKind::Implementation => &self.implementation,
            UsageKind::Reference => &self.reference,
            UsageKind::TypeDefinition => &self.type_definition,
        }
    }

    pub fn get_mut(&mut self, kind: UsageKind) -> &mut Vec<SymbolLocation> {
        match kind {
            UsageKind::Declaration => &mut self.declaration,
            UsageKind::Definition => &mut self.definition,
            UsageKind::Implementation => &mut self.implementation,
            UsageKind::Reference => &mut self.reference,
            UsageKind::TypeDefinition => &mut self.type_definition,
        }
    }

    pub fn has(&self, kind: UsageKind) -> bool {
        !self.get(kind).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        UsageKind::ALL.iter().all(|kind| !self.has(*kind))
    }

    pub fn len(&self) -> usize {
        UsageKind::ALL.iter().map(|kind| self.get(*kind).len()).sum()
    }

    /// Iterate all locations tagged with their usage kind
    pub fn iter(&self) -> impl Iterator<Item = (UsageKind, &SymbolLocation)> {
        UsageKind::ALL
            .into_iter()
            .flat_map(move |kind| self.get(kind).iter().map(move |loc| (kind, loc)))
    }

    /// Remove every location matching `predicate`, returning what was removed
    pub fn extract_matching<F>(&mut self, mut predicate: F) -> Vec<(UsageKind, SymbolLocation)>
    where
        F: FnMut(&SymbolLocation) -> bool,
    {
        let mut removed = Vec::new();
        for kind in UsageKind::ALL {
            let list = self.get_mut(kind);
            let (drop, keep): (Vec<_>, Vec<_>) = list.drain(..).partition(|loc| predicate(loc));
            *list = keep;
            removed.extend(drop.into_iter().map(|loc| (kind, loc)));
        }
        removed
    }
}

// ============================================================================
// Symbols and maps
// ============================================================================

/// Identifier -> symbol handle
pub type SymbolMap = HashMap<String, SymbolId>;

/// Category -> symbol map
pub type SymbolTable = HashMap<String, SymbolMap>;

/// Names a symbol map owned by the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapRef {
    /// Category slot of the global table
    Global { category: String },
    /// Category slot of one frame of a document stack
    Frame { uri: String, depth: usize, category: String },
    /// Member map of a symbol
    Members { parent: SymbolId },
}

/// Names a whole table owned by the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableRef {
    Global,
    Frame { uri: String, depth: usize },
}

impl TableRef {
    pub fn map(&self, category: &str) -> MapRef {
        match self {
            TableRef::Global => MapRef::Global { category: category.to_string() },
            TableRef::Frame { uri, depth } => MapRef::Frame {
                uri: uri.clone(),
                depth: *depth,
                category: category.to_string(),
            },
        }
    }
}

/// A named, categorized entity with usage history and optional members
#[derive(Debug, Clone)]
pub struct Symbol {
    pub category: String,
    pub identifier: String,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub visibility_restriction: Option<Vec<String>>,
    /// Non-owning alias target
    pub alias_of: Option<SymbolId>,
    pub usages: Usages,
    pub members: Option<SymbolMap>,
    pub parent: Option<SymbolId>,
    pub(crate) tier: StorageTier,
    pub(crate) container: MapRef,
}

impl Symbol {
    pub(crate) fn new(category: &str, identifier: &str, tier: StorageTier, container: MapRef) -> Self {
        let parent = match &container {
            MapRef::Members { parent } => Some(*parent),
            _ => None,
        };
        Self {
            category: category.to_string(),
            identifier: identifier.to_string(),
            subcategory: None,
            description: None,
            visibility: None,
            visibility_restriction: None,
            alias_of: None,
            usages: Usages::default(),
            members: None,
            parent,
            tier,
            container,
        }
    }

    /// Table tier this symbol was created in
    pub fn tier(&self) -> StorageTier {
        self.tier
    }

    /// Map that directly holds this symbol
    pub fn container(&self) -> &MapRef {
        &self.container
    }

    pub fn is_declared(&self) -> bool {
        self.usages.has(UsageKind::Declaration)
    }

    pub fn is_defined(&self) -> bool {
        self.usages.has(UsageKind::Definition)
    }

    pub fn is_implemented(&self) -> bool {
        self.usages.has(UsageKind::Implementation)
    }

    pub fn is_referenced(&self) -> bool {
        self.usages.has(UsageKind::Reference)
    }

    pub fn is_type_defined(&self) -> bool {
        self.usages.has(UsageKind::TypeDefinition)
    }

    pub fn has_members(&self) -> bool {
        self.members.as_ref().is_some_and(|m| !m.is_empty())
    }

    /// No usages and no members. Alias references are tracked by the store.
    pub fn is_unreachable(&self) -> bool {
        self.usages.is_empty() && !self.has_members()
    }

    pub fn has_locations_from(&self, uri: &str) -> bool {
        self.usages.iter().any(|(_, loc)| loc.uri == uri)
    }
}

/// Per-document scope frames. Frame 0 is the file scope.
#[derive(Debug, Clone)]
pub struct SymbolStack {
    frames: Vec<SymbolTable>,
}

impl SymbolStack {
    pub fn new() -> Self {
        Self { frames: vec![SymbolTable::new()] }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Index of the innermost frame
    pub fn innermost(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub fn frame(&self, depth: usize) -> Option<&SymbolTable> {
        self.frames.get(depth)
    }

    pub fn frame_mut(&mut self, depth: usize) -> Option<&mut SymbolTable> {
        self.frames.get_mut(depth)
    }

    pub fn frames(&self) -> &[SymbolTable] {
        &self.frames
    }

    pub(crate) fn push(&mut self) {
        self.frames.push(SymbolTable::new());
    }

    /// Pop the innermost frame, never the file scope
    pub(crate) fn pop(&mut self) -> Option<SymbolTable> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    pub(crate) fn into_frames(self) -> Vec<SymbolTable> {
        self.frames
    }
}

impl Default for SymbolStack {
    fn default() -> Self {
        Self::new()
    }
}
