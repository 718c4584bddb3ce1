//! Query Façade - per-call builder bound to one symbol path.
//!
//! A query resolves its path once, on construction. Collaborators then
//! branch on what was found and optionally enter or amend the symbol:
//!
//! ```ignore
//! store
//!     .query(&doc, "type", &["Foo"])?
//!     .if_declared(|q| report_duplicate(q))?
//!     .otherwise_enter(
//!         SymbolAddition::new()
//!             .with_data(AdditionData::new().visibility(Visibility::Public))
//!             .with_usage(UsageInfo::new(UsageKind::Declaration).range(0..3)),
//!     )?;
//! ```
//!
//! At most one conditional branch fires per query: once an `if_*` or
//! `otherwise*` branch has been taken, the remaining ones are skipped.

use std::collections::HashMap;
use std::rc::Rc;

use crate::document::{DocumentRef, SyntaxNode};
use crate::error::{SymbolError, SymbolResult};
use crate::lifecycle::{EnterRequest, Placement};
use crate::store::SymbolStore;
use crate::types::{AccessType, Range, Symbol, SymbolId, UsageKind, Visibility};

// ============================================================================
// Additions
// ============================================================================

/// Metadata merged into a symbol on `enter`. Present fields overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionData {
    pub description: Option<String>,
    pub subcategory: Option<String>,
    pub visibility: Option<Visibility>,
    pub alias_of: Option<SymbolId>,
    pub visibility_restriction: Option<Vec<String>>,
}

impl AdditionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn alias_of(mut self, target: SymbolId) -> Self {
        self.alias_of = Some(target);
        self
    }

    pub fn restrict_to(mut self, roots: Vec<String>) -> Self {
        self.visibility_restriction = Some(roots);
        self
    }
}

/// What a usage is anchored to
#[derive(Debug, Clone)]
pub enum UsageAnchor {
    Range(Range),
    /// Parse-tree node; receives the symbol once the usage is recorded
    Node(Rc<dyn SyntaxNode>),
}

/// A usage to record on `enter`
#[derive(Debug, Clone, Default)]
pub struct UsageInfo {
    pub kind: UsageKind,
    pub anchor: Option<UsageAnchor>,
    pub full_range: Option<Range>,
    pub access_type: Option<AccessType>,
    pub from_default_library: bool,
}

impl UsageInfo {
    pub fn new(kind: UsageKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn range(mut self, range: impl Into<Range>) -> Self {
        self.anchor = Some(UsageAnchor::Range(range.into()));
        self
    }

    pub fn node(mut self, node: Rc<dyn SyntaxNode>) -> Self {
        self.anchor = Some(UsageAnchor::Node(node));
        self
    }

    pub fn full_range(mut self, range: impl Into<Range>) -> Self {
        self.full_range = Some(range.into());
        self
    }

    pub fn access(mut self, access_type: AccessType) -> Self {
        self.access_type = Some(access_type);
        self
    }

    pub fn from_default_library(mut self) -> Self {
        self.from_default_library = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SymbolAddition {
    pub data: Option<AdditionData>,
    pub usage: Option<UsageInfo>,
}

impl SymbolAddition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(mut self, data: AdditionData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_usage(mut self, usage: UsageInfo) -> Self {
        self.usage = Some(usage);
        self
    }
}

// ============================================================================
// Query
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Unknown,
    Known(SymbolId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    /// No conditional has fired yet
    Open,
    Taken,
}

/// Builder bound to one `(document, category, path)` triple
pub struct Query<'s> {
    store: &'s mut SymbolStore,
    uri: String,
    has_text: bool,
    category: String,
    path: Vec<String>,
    placement: Placement,
    resolution: Resolution,
    branch: Branch,
}

impl SymbolStore {
    /// Start a query for `path` in `category`, as seen from `doc`
    pub fn query<'d, S: AsRef<str>>(
        &mut self,
        doc: impl Into<DocumentRef<'d>>,
        category: &str,
        path: &[S],
    ) -> SymbolResult<Query<'_>> {
        if path.is_empty() {
            return Err(SymbolError::EmptyPath {
                category: category.to_string(),
            });
        }
        let doc = doc.into();
        let uri = doc.uri();
        self.stack_mut(uri);

        let lookup = self.lookup(category, path, Some(uri));
        let placement = if path.len() == 1 {
            Placement::TopLevel
        } else {
            Placement::Member(lookup.parent)
        };

        Ok(Query {
            uri: uri.to_string(),
            has_text: doc.has_text(),
            category: category.to_string(),
            path: path.iter().map(|s| s.as_ref().to_string()).collect(),
            placement,
            resolution: lookup.symbol.map_or(Resolution::Unknown, Resolution::Known),
            branch: Branch::Open,
            store: self,
        })
    }
}

impl<'s> Query<'s> {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn store(&self) -> &SymbolStore {
        self.store
    }

    pub fn symbol_id(&self) -> Option<SymbolId> {
        match self.resolution {
            Resolution::Known(id) => Some(id),
            Resolution::Unknown => None,
        }
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        self.symbol_id().and_then(|id| self.store.get(id))
    }

    pub fn is_known(&self) -> bool {
        self.symbol().is_some()
    }

    /// Visibility gate for the bound document; `None` if unresolved
    pub fn visible(&self) -> Option<bool> {
        self.symbol_id()
            .and_then(|id| self.store.is_visible(id, Some(&self.uri)))
    }

    /// True once a conditional branch has fired
    pub fn branch_taken(&self) -> bool {
        self.branch == Branch::Taken
    }

    fn check(&self, predicate: impl Fn(&Symbol) -> bool) -> bool {
        self.symbol().is_some_and(predicate)
    }

    fn when<F>(&mut self, condition: bool, f: F) -> SymbolResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> SymbolResult<()>,
    {
        if self.branch == Branch::Open && condition {
            self.branch = Branch::Taken;
            f(self)?;
        }
        Ok(self)
    }

    // ========================================================================
    // Conditionals
    // ========================================================================

    pub fn if_unknown<F>(&mut self, f: F) -> SymbolResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> SymbolResult<()>,
    {
        let condition = !self.is_known();
        self.when(condition, f)
    }

    pub fn if_known<F>(&mut self, f: F) -> SymbolResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> SymbolResult<()>,
    {
        let condition = self.is_known();
        self.when(condition, f)
    }

    pub fn if_declared<F>(&mut self, f: F) -> SymbolResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> SymbolResult<()>,
    {
        let condition = self.check(Symbol::is_declared);
        self.when(condition, f)
    }

    pub fn if_defined<F>(&mut self, f: F) -> SymbolResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> SymbolResult<()>,
    {
        let condition = self.check(Symbol::is_defined);
        self.when(condition, f)
    }

    pub fn if_implemented<F>(&mut self, f: F) -> SymbolResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> SymbolResult<()>,
    {
        let condition = self.check(Symbol::is_implemented);
        self.when(condition, f)
    }

    pub fn if_referenced<F>(&mut self, f: F) -> SymbolResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> SymbolResult<()>,
    {
        let condition = self.check(Symbol::is_referenced);
        self.when(condition, f)
    }

    pub fn if_type_defined<F>(&mut self, f: F) -> SymbolResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> SymbolResult<()>,
    {
        let condition = self.check(Symbol::is_type_defined);
        self.when(condition, f)
    }

    /// Fires only if no earlier conditional in this chain fired
    pub fn otherwise<F>(&mut self, f: F) -> SymbolResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> SymbolResult<()>,
    {
        self.when(true, f)
    }

    pub fn otherwise_enter(&mut self, addition: SymbolAddition) -> SymbolResult<&mut Self> {
        self.when(true, |q| q.enter(addition).map(|_| ()))
    }

    pub fn otherwise_resolve_alias(&mut self) -> SymbolResult<&mut Self> {
        self.when(true, |q| q.resolve_alias().map(|_| ()))
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Create or amend the symbol at this query's path
    pub fn enter(&mut self, addition: SymbolAddition) -> SymbolResult<&mut Self> {
        let existing = self.symbol_id();
        let request = EnterRequest {
            uri: &self.uri,
            has_text: self.has_text,
            category: &self.category,
            path: &self.path,
            existing,
            placement: self.placement,
        };
        let id = self.store.enter(request, addition)?;
        self.resolution = Resolution::Known(id);
        Ok(self)
    }

    /// Enter only if the symbol already exists
    pub fn amend(&mut self, addition: SymbolAddition) -> SymbolResult<&mut Self> {
        if self.is_known() {
            self.enter(addition)?;
        }
        Ok(self)
    }

    /// Replace the resolved symbol with its transitive alias target
    pub fn resolve_alias(&mut self) -> SymbolResult<&mut Self> {
        if let Some(id) = self.symbol_id() {
            let target = self.store.resolve_alias(id)?;
            self.resolution = Resolution::Known(target);
        }
        Ok(self)
    }

    /// Run `f` with a query for member `identifier` of the resolved symbol
    pub fn query_member<F>(&mut self, identifier: &str, f: F) -> SymbolResult<&mut Self>
    where
        F: FnOnce(&mut Query<'_>) -> SymbolResult<()>,
    {
        let parent = match self.symbol_id() {
            Some(id) if self.store.contains(id) => id,
            _ => {
                return Err(SymbolError::UnknownSymbol {
                    category: self.category.clone(),
                    path: self.path.join("."),
                });
            }
        };

        let category = self.store.get(parent).map(|s| s.category.clone()).unwrap_or_default();
        let mut path = self.store.path_of(parent).unwrap_or_default();
        path.push(identifier.to_string());
        let existing = self
            .store
            .get(parent)
            .and_then(|s| s.members.as_ref())
            .and_then(|members| members.get(identifier))
            .copied();

        let mut member = Query {
            store: &mut *self.store,
            uri: self.uri.clone(),
            has_text: self.has_text,
            category,
            path,
            placement: Placement::Member(Some(parent)),
            resolution: existing.map_or(Resolution::Unknown, Resolution::Known),
            branch: Branch::Open,
        };
        f(&mut member)?;
        Ok(self)
    }

    /// Members of the resolved symbol that pass the visibility gate
    pub fn visible_members(&self) -> HashMap<String, SymbolId> {
        match self.symbol_id() {
            Some(id) => self.store.visible_members(id, Some(&self.uri)),
            None => HashMap::new(),
        }
    }
}
