//! Lifecycle Engine - create, amend and remove symbols and locations.
//!
//! Every mutation of the store funnels through here. This is the one place
//! that enforces storage tiers, and the one place that publishes events.

use std::collections::HashSet;

use tracing::{debug, error};

use crate::error::{SymbolError, SymbolResult};
use crate::events::SymbolEvent;
use crate::query::{AdditionData, SymbolAddition, UsageAnchor, UsageInfo};
use crate::store::SymbolStore;
use crate::types::{
    LocationMeta, MapRef, Range, StorageTier, Symbol, SymbolId, SymbolLocation, SymbolTable,
    TableRef, Visibility,
};

/// Where a symbol that does not exist yet would be created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Table slot chosen by category and visibility tier
    TopLevel,
    /// Member map of the given parent, if the parent exists
    Member(Option<SymbolId>),
}

pub(crate) struct EnterRequest<'a> {
    pub uri: &'a str,
    pub has_text: bool,
    pub category: &'a str,
    pub path: &'a [String],
    pub existing: Option<SymbolId>,
    pub placement: Placement,
}

impl SymbolStore {
    // ========================================================================
    // Enter
    // ========================================================================

    /// Create or amend the symbol named by `request`, then record its usage
    pub(crate) fn enter(&mut self, request: EnterRequest<'_>, addition: SymbolAddition) -> SymbolResult<SymbolId> {
        let SymbolAddition { data, usage } = addition;
        let id = match request.existing {
            Some(id) => {
                self.amend_symbol(id, data.as_ref())?;
                id
            }
            None => self.create_symbol(&request, data.as_ref())?,
        };
        if let Some(usage) = usage {
            self.record_usage(id, request.uri, request.has_text, usage)?;
        }
        Ok(id)
    }

    fn create_symbol(&mut self, request: &EnterRequest<'_>, data: Option<&AdditionData>) -> SymbolResult<SymbolId> {
        let identifier = request.path.last().ok_or_else(|| SymbolError::EmptyPath {
            category: request.category.to_string(),
        })?;

        let (container, tier) = match request.placement {
            Placement::TopLevel => {
                let tier = Visibility::tier_of(data.and_then(|d| d.visibility));
                let table = match tier {
                    StorageTier::Global => TableRef::Global,
                    StorageTier::File => TableRef::Frame {
                        uri: request.uri.to_string(),
                        depth: 0,
                    },
                    StorageTier::Block => TableRef::Frame {
                        uri: request.uri.to_string(),
                        depth: self.stack_mut(request.uri).innermost(),
                    },
                };
                (table.map(request.category), tier)
            }
            Placement::Member(Some(parent)) => {
                let parent_symbol = self.symbols.get(parent).ok_or(SymbolError::StaleHandle(parent))?;
                (MapRef::Members { parent }, parent_symbol.tier)
            }
            Placement::Member(None) => {
                return Err(SymbolError::MissingContainer {
                    category: request.category.to_string(),
                    path: request.path.join("."),
                });
            }
        };

        if let Some(target) = data.and_then(|d| d.alias_of) {
            self.ensure_live(target)?;
        }

        let mut symbol = Symbol::new(request.category, identifier, tier, container.clone());
        if let Some(data) = data {
            apply_data(&mut symbol, data);
        }
        let alias_target = symbol.alias_of;

        let id = self.symbols.insert(symbol);
        match self.map_mut(&container) {
            Ok(map) => {
                map.insert(identifier.clone(), id);
            }
            Err(err) => {
                self.symbols.remove(id);
                return Err(err);
            }
        }

        debug!(category = request.category, path = %request.path.join("."), ?tier, "symbol created");
        self.emit(SymbolEvent::SymbolCreated {
            symbol: id,
            category: request.category.to_string(),
            identifier: identifier.clone(),
        });
        if let Some(target) = alias_target {
            self.emit(SymbolEvent::AliasCreated { alias: id, target });
        }
        Ok(id)
    }

    fn amend_symbol(&mut self, id: SymbolId, data: Option<&AdditionData>) -> SymbolResult<()> {
        let symbol = self.symbols.get(id).ok_or(SymbolError::StaleHandle(id))?;

        if let Some(data) = data {
            // Checked before anything changes so a rejected amendment leaves no trace.
            // Members live in their parent's table whatever their visibility says.
            if let Some(visibility) = data.visibility.filter(|_| symbol.parent.is_none()) {
                let from = symbol.tier;
                let to = visibility.tier();
                if from != to {
                    return Err(SymbolError::VisibilityTierChange {
                        path: self.display_path(id),
                        from,
                        to,
                    });
                }
            }

            let previous_target = symbol.alias_of;
            if let Some(target) = data.alias_of.filter(|t| previous_target != Some(*t)) {
                self.ensure_live(target)?;
                self.ensure_acyclic(id, target)?;
                if let Some(old) = previous_target {
                    self.emit(SymbolEvent::AliasRemoved { alias: id, target: old });
                }
                self.emit(SymbolEvent::AliasCreated { alias: id, target });
            }

            if let Some(symbol) = self.symbols.get_mut(id) {
                apply_data(symbol, data);
            }
        }

        self.emit(SymbolEvent::SymbolAmended { symbol: id });
        Ok(())
    }

    fn record_usage(&mut self, id: SymbolId, uri: &str, has_text: bool, usage: UsageInfo) -> SymbolResult<()> {
        let UsageInfo {
            kind,
            anchor,
            full_range,
            access_type,
            from_default_library,
        } = usage;

        let (range, node) = match anchor {
            Some(UsageAnchor::Range(range)) => (Some(range), None),
            Some(UsageAnchor::Node(node)) => (Some(node.range()), Some(node)),
            None => (None, None),
        };
        let (range, full_range) = if has_text {
            (range, full_range)
        } else {
            (Some(Range::empty()), Some(Range::empty()))
        };

        let location = SymbolLocation {
            uri: uri.to_string(),
            range,
            full_range,
            is_uri_bound: self.uri_binding,
            meta: LocationMeta {
                access_type,
                from_default_library,
            },
        };

        let symbol = self.symbols.get_mut(id).ok_or(SymbolError::StaleHandle(id))?;
        symbol.usages.get_mut(kind).push(location.clone());
        self.emit(SymbolEvent::LocationCreated { symbol: id, kind, location });

        if let Some(node) = node {
            node.attach_symbol(id);
        }
        Ok(())
    }

    fn ensure_live(&self, id: SymbolId) -> SymbolResult<()> {
        if self.symbols.contains(id) {
            Ok(())
        } else {
            Err(SymbolError::StaleHandle(id))
        }
    }

    /// Reject `alias -> target` when `target` already leads back to `alias`
    fn ensure_acyclic(&self, alias: SymbolId, target: SymbolId) -> SymbolResult<()> {
        let mut seen = HashSet::new();
        let mut current = Some(target);
        while let Some(id) = current {
            if id == alias {
                return Err(SymbolError::AliasCycle {
                    path: self.display_path(alias),
                });
            }
            if !seen.insert(id) {
                break;
            }
            current = self.symbols.get(id).and_then(|s| s.alias_of);
        }
        Ok(())
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Free a symbol and its members. The caller detaches it from its map.
    pub(crate) fn drop_symbol(&mut self, id: SymbolId) {
        let members: Vec<SymbolId> = self
            .symbols
            .get(id)
            .and_then(|s| s.members.as_ref())
            .map(|m| m.values().copied().collect())
            .unwrap_or_default();
        for member in members {
            self.drop_symbol(member);
        }

        let Some(symbol) = self.symbols.remove(id) else {
            return;
        };
        for (kind, location) in symbol.usages.iter() {
            self.emit(SymbolEvent::LocationRemoved {
                symbol: id,
                kind,
                location: location.clone(),
            });
        }
        if let Some(target) = symbol.alias_of {
            self.emit(SymbolEvent::AliasRemoved { alias: id, target });
        }
        debug!(category = %symbol.category, identifier = %symbol.identifier, "symbol removed");
        self.emit(SymbolEvent::SymbolRemoved {
            symbol: id,
            category: symbol.category,
            identifier: symbol.identifier,
        });
    }

    fn drop_table(&mut self, table: SymbolTable) {
        for map in table.into_values() {
            for id in map.into_values() {
                self.drop_symbol(id);
            }
        }
    }

    // ========================================================================
    // Trimming
    // ========================================================================

    /// Delete unreachable symbols from a table until nothing else qualifies.
    ///
    /// Returns the number of symbols removed, members included.
    pub fn trim(&mut self, table: &TableRef) -> usize {
        let mut total = 0;
        loop {
            let removed = self.trim_pass(table);
            if removed == 0 {
                break;
            }
            total += removed;
        }
        if total > 0 {
            debug!(?table, removed = total, "trimmed symbols");
        }
        total
    }

    /// Trim every table; removing an alias in one table may free a target in another
    pub fn trim_all(&mut self) -> usize {
        let mut total = 0;
        loop {
            let removed: usize = self
                .all_tables()
                .iter()
                .map(|table| self.trim(table))
                .sum();
            if removed == 0 {
                break;
            }
            total += removed;
        }
        total
    }

    fn trim_pass(&mut self, table: &TableRef) -> usize {
        let Some(roots) = self.table(table).map(|t| {
            t.iter()
                .flat_map(|(category, map)| {
                    map.iter().map(move |(name, id)| (category.clone(), name.clone(), *id))
                })
                .collect::<Vec<_>>()
        }) else {
            return 0;
        };

        let mut removed = 0;
        for (category, name, id) in roots {
            if self.trim_symbol(id, &mut removed) {
                if let Some(map) = self.table_mut(table).and_then(|t| t.get_mut(&category)) {
                    map.remove(&name);
                }
            }
        }
        if let Some(t) = self.table_mut(table) {
            t.retain(|_, map| !map.is_empty());
        }
        removed
    }

    /// Trim the subtree at `id`, members first. Returns true if `id` itself went.
    fn trim_symbol(&mut self, id: SymbolId, removed: &mut usize) -> bool {
        let members: Vec<(String, SymbolId)> = self
            .symbols
            .get(id)
            .and_then(|s| s.members.as_ref())
            .map(|m| m.iter().map(|(name, member)| (name.clone(), *member)).collect())
            .unwrap_or_default();
        for (name, member) in members {
            if self.trim_symbol(member, removed) {
                if let Some(map) = self.symbols.get_mut(id).and_then(|s| s.members.as_mut()) {
                    map.remove(&name);
                }
            }
        }

        let Some(symbol) = self.symbols.get_mut(id) else {
            // Dangling handle: let the caller drop the map entry
            return true;
        };
        if symbol.members.as_ref().is_some_and(|m| m.is_empty()) {
            symbol.members = None;
        }
        if !symbol.is_unreachable() || self.aliases.is_aliased(id) {
            return false;
        }
        self.drop_symbol(id);
        *removed += 1;
        true
    }

    // ========================================================================
    // Partial invalidation
    // ========================================================================

    /// Remove locations matching `predicate` from every symbol of one table
    pub fn remove_locations_in<F>(&mut self, table: &TableRef, mut predicate: F) -> usize
    where
        F: FnMut(&SymbolLocation) -> bool,
    {
        let removed = self.strip_locations(table, &mut predicate);
        if self.config.trim_after_removal {
            self.trim(table);
        }
        removed
    }

    /// Remove locations matching `predicate` workspace-wide
    pub fn remove_locations<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&SymbolLocation) -> bool,
    {
        let mut removed = 0;
        for table in self.all_tables() {
            removed += self.strip_locations(&table, &mut predicate);
        }
        if self.config.trim_after_removal {
            self.trim_all();
        }
        removed
    }

    fn strip_locations<F>(&mut self, table: &TableRef, predicate: &mut F) -> usize
    where
        F: FnMut(&SymbolLocation) -> bool,
    {
        let mut events = Vec::new();
        for id in self.collect_symbols(table) {
            if let Some(symbol) = self.symbols.get_mut(id) {
                for (kind, location) in symbol.usages.extract_matching(&mut *predicate) {
                    events.push(SymbolEvent::LocationRemoved { symbol: id, kind, location });
                }
            }
        }
        let removed = events.len();
        for event in events {
            self.emit(event);
        }
        removed
    }

    /// Forget a document: drop its scope stack and retract the locations it
    /// contributed elsewhere. URI-bound locations survive; they belong to the
    /// implicit binding pass.
    pub fn clear(&mut self, uri: &str) {
        if let Some(stack) = self.stacks.remove(uri) {
            for frame in stack.into_frames() {
                self.drop_table(frame);
            }
        }
        let removed = self.remove_locations(|loc| loc.uri == uri && !loc.is_uri_bound);
        debug!(uri, removed, "document cleared");
    }

    // ========================================================================
    // Block scopes
    // ========================================================================

    /// Open a block scope in `uri`. Returns the new frame's depth.
    pub fn push_block(&mut self, uri: &str) -> usize {
        let stack = self.stack_mut(uri);
        stack.push();
        stack.innermost()
    }

    /// Close the innermost block scope of `uri`, dropping its symbols
    pub fn pop_block(&mut self, uri: &str) -> SymbolResult<()> {
        let frame = self
            .stacks
            .get_mut(uri)
            .and_then(|stack| stack.pop())
            .ok_or_else(|| SymbolError::OutermostFrame { uri: uri.to_string() })?;
        self.drop_table(frame);
        Ok(())
    }

    /// Run `f` inside a fresh block scope, closing it however `f` exits
    pub fn with_block<R, F>(&mut self, uri: &str, f: F) -> SymbolResult<R>
    where
        F: FnOnce(&mut Self) -> SymbolResult<R>,
    {
        self.push_block(uri);
        let result = f(self);
        let popped = self.pop_block(uri);
        let value = result?;
        popped?;
        Ok(value)
    }

    // ========================================================================
    // URI binding
    // ========================================================================

    /// True while an implicit binding pass is running
    pub fn is_uri_binding(&self) -> bool {
        self.uri_binding
    }

    /// Re-run an implicit binding pass.
    ///
    /// All locations from the previous pass are retracted first, every
    /// location entered by `f` is tagged URI-bound, and an error from `f` is
    /// logged instead of returned so the rest of the workspace keeps binding.
    pub fn with_uri_binding<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self) -> SymbolResult<()>,
    {
        let retracted = self.remove_locations(|loc| loc.is_uri_bound);
        debug!(retracted, "retracted uri-bound locations");

        let previous = std::mem::replace(&mut self.uri_binding, true);
        if let Err(err) = f(self) {
            error!(code = err.code(), error = %err, "uri binding failed");
        }
        self.uri_binding = previous;
    }
}

fn apply_data(symbol: &mut Symbol, data: &AdditionData) {
    if let Some(description) = &data.description {
        symbol.description = Some(description.clone());
    }
    if let Some(subcategory) = &data.subcategory {
        symbol.subcategory = Some(subcategory.clone());
    }
    if let Some(visibility) = data.visibility {
        symbol.visibility = Some(visibility);
    }
    if let Some(restriction) = &data.visibility_restriction {
        symbol.visibility_restriction = Some(restriction.clone());
    }
    if let Some(target) = data.alias_of {
        symbol.alias_of = Some(target);
    }
}
