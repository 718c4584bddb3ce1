//! Integration tests for the symbol table
//!
//! Drives the store through the query façade the way a language binder does:
//! declare, reference, alias, invalidate, then check what is left.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use quill_symbols::{
    AdditionData, EventKind, Range, SymbolAddition, SymbolError, SymbolEvent, SymbolId, SymbolStore,
    TableRef, TextDocument, UsageInfo, UsageKind, Visibility,
};

/// Helper to enter a usage of `path` with optional metadata
fn enter(store: &mut SymbolStore, uri: &str, path: &[&str], data: Option<AdditionData>, kind: UsageKind) -> SymbolId {
    let mut addition = SymbolAddition::new().with_usage(UsageInfo::new(kind));
    if let Some(data) = data {
        addition = addition.with_data(data);
    }
    store
        .query(uri, "type", path)
        .expect("query failed")
        .enter(addition)
        .expect("enter failed")
        .symbol_id()
        .expect("entered symbol has an id")
}

fn public() -> Option<AdditionData> {
    Some(AdditionData::new().visibility(Visibility::Public))
}

/// Recount aliases from scratch by scanning every live symbol
fn recount_aliases(store: &SymbolStore) -> HashMap<SymbolId, u32> {
    let mut counts = HashMap::new();
    for table in store.all_tables() {
        store.for_each_symbol(&table, |_, symbol| {
            if let Some(target) = symbol.alias_of {
                if store.contains(target) {
                    *counts.entry(target).or_insert(0) += 1;
                }
            }
        });
    }
    counts
}

fn assert_alias_invariant(store: &SymbolStore) {
    let counts = recount_aliases(store);
    for table in store.all_tables() {
        store.for_each_symbol(&table, |id, _| {
            let expected = counts.get(&id).copied().unwrap_or(0);
            assert_eq!(
                store.alias_amount(id).unwrap_or(0),
                expected,
                "alias amount of {} out of sync",
                store.path_of(id).unwrap_or_default().join(".")
            );
        });
    }
}

// === Declaring ===

#[test]
fn test_declare_then_report_duplicate() {
    let mut store = SymbolStore::new();
    let doc = TextDocument::new("file:///shapes.q", "Foo Foo");
    let duplicates = Rc::new(RefCell::new(0));

    for range in [0..3, 4..7] {
        let duplicates = Rc::clone(&duplicates);
        store
            .query(&doc, "type", &["Foo"])
            .unwrap()
            .if_declared(move |_| {
                *duplicates.borrow_mut() += 1;
                Ok(())
            })
            .unwrap()
            .otherwise_enter(
                SymbolAddition::new()
                    .with_data(AdditionData::new().visibility(Visibility::Public))
                    .with_usage(UsageInfo::new(UsageKind::Declaration).range(range)),
            )
            .unwrap();
    }

    assert_eq!(*duplicates.borrow(), 1);
    assert_eq!(store.len(), 1);
    let id = store.lookup("type", &["Foo"], None).symbol.unwrap();
    let symbol = store.get(id).unwrap();
    assert_eq!(symbol.visibility, Some(Visibility::Public));
    assert_eq!(symbol.usages.declaration.len(), 1);
    assert_eq!(symbol.usages.declaration[0].range, Some(Range::new(0, 3)));
}

#[test]
fn test_repeated_enter_amends() {
    let mut store = SymbolStore::new();
    let first = enter(&mut store, "file:///a", &["Foo"], public(), UsageKind::Declaration);
    let second = enter(&mut store, "file:///a", &["Foo"], public(), UsageKind::Definition);
    let third = enter(&mut store, "file:///b", &["Foo"], None, UsageKind::Reference);

    assert_eq!(first, second);
    assert_eq!(first, third);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(first).unwrap().usages.len(), 3);
}

#[test]
fn test_block_symbol_shadows_only_inside_its_frame() {
    let mut store = SymbolStore::new();
    enter(&mut store, "file:///lib", &["a"], public(), UsageKind::Declaration);
    let global_b = enter(&mut store, "file:///lib", &["a", "b"], None, UsageKind::Declaration);

    store
        .with_block("file:///main", |store| {
            let block_b = enter(
                store,
                "file:///main",
                &["b"],
                Some(AdditionData::new().visibility(Visibility::Block)),
                UsageKind::Declaration,
            );
            assert_eq!(store.lookup("type", &["b"], Some("file:///main")).symbol, Some(block_b));
            assert_eq!(store.lookup("type", &["a", "b"], Some("file:///main")).symbol, Some(global_b));
            assert_eq!(store.lookup("type", &["b"], Some("file:///other")).symbol, None);
            assert_eq!(store.lookup("type", &["a", "b"], Some("file:///other")).symbol, Some(global_b));
            Ok(())
        })
        .unwrap();

    // The frame is gone, and its symbol with it
    assert_eq!(store.lookup("type", &["b"], Some("file:///main")).symbol, None);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_public_to_block_is_fatal() {
    let mut store = SymbolStore::new();
    let id = enter(&mut store, "file:///a", &["Foo"], public(), UsageKind::Declaration);

    let err = store
        .query("file:///a", "type", &["Foo"])
        .unwrap()
        .amend(SymbolAddition::new().with_data(AdditionData::new().visibility(Visibility::Block)))
        .map(|_| ())
        .unwrap_err();

    assert!(matches!(err, SymbolError::VisibilityTierChange { .. }));
    assert_eq!(store.get(id).unwrap().visibility, Some(Visibility::Public));
    assert_eq!(store.global_table()["type"]["Foo"], id);
}

// === Invalidation ===

#[test]
fn test_partial_invalidation() {
    let mut store = SymbolStore::new();
    let id = enter(&mut store, "A", &["Shared"], public(), UsageKind::Declaration);
    enter(&mut store, "B", &["Shared"], None, UsageKind::Declaration);

    store.remove_locations(|loc| loc.uri == "A");
    let symbol = store.get(id).expect("still justified by B");
    assert_eq!(symbol.usages.len(), 1);
    assert_eq!(symbol.usages.declaration[0].uri, "B");

    store.remove_locations(|loc| loc.uri == "B");
    assert!(!store.contains(id));
    assert!(store.is_empty());
}

#[test]
fn test_trimming_twice_equals_once() {
    let mut store = SymbolStore::new();
    let target = enter(&mut store, "A", &["Target"], public(), UsageKind::Declaration);
    enter(&mut store, "A", &["Alias"], public().map(|d| d.alias_of(target)), UsageKind::Declaration);
    enter(&mut store, "A", &["Target", "member"], None, UsageKind::Definition);
    enter(&mut store, "B", &["Kept"], public(), UsageKind::Declaration);

    let removed = Rc::new(RefCell::new(0));
    {
        let removed = Rc::clone(&removed);
        store.on(EventKind::SymbolRemoved, move |_| *removed.borrow_mut() += 1);
    }
    store.remove_locations(|loc| loc.uri == "A");
    assert_eq!(*removed.borrow(), 3);

    let before = quill_symbols::snapshot_json(&store, &TableRef::Global);
    assert_eq!(store.trim(&TableRef::Global), 0);
    assert_eq!(quill_symbols::snapshot_json(&store, &TableRef::Global), before);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_alias_invariant_holds_through_churn() {
    let mut store = SymbolStore::new();
    let base = enter(&mut store, "A", &["Base"], public(), UsageKind::Declaration);
    let other = enter(&mut store, "A", &["Other"], public(), UsageKind::Declaration);
    enter(&mut store, "B", &["One"], public().map(|d| d.alias_of(base)), UsageKind::Declaration);
    enter(&mut store, "C", &["Two"], public().map(|d| d.alias_of(base)), UsageKind::Declaration);
    enter(&mut store, "C", &["Three"], public().map(|d| d.alias_of(other)), UsageKind::Declaration);
    assert_alias_invariant(&store);
    assert_eq!(store.alias_amount(base), Some(2));

    // Retarget one alias
    enter(&mut store, "B", &["One"], Some(AdditionData::new().alias_of(other)), UsageKind::Reference);
    assert_alias_invariant(&store);
    assert_eq!(store.alias_amount(base), Some(1));
    assert_eq!(store.alias_amount(other), Some(2));

    store.clear("C");
    assert_alias_invariant(&store);
    assert_eq!(store.alias_amount(base), Some(0));

    store.clear("A");
    assert_alias_invariant(&store);
    assert!(!store.contains(base));
    assert!(store.contains(other));

    store.clear("B");
    assert!(store.is_empty());
}

#[test]
fn test_event_stream_for_one_symbol() {
    let mut store = SymbolStore::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    for kind in [
        EventKind::SymbolCreated,
        EventKind::SymbolAmended,
        EventKind::SymbolRemoved,
        EventKind::LocationCreated,
        EventKind::LocationRemoved,
    ] {
        let log = Rc::clone(&log);
        store.on(kind, move |event: &SymbolEvent| log.borrow_mut().push(event.kind()));
    }

    enter(&mut store, "A", &["Foo"], public(), UsageKind::Declaration);
    enter(&mut store, "A", &["Foo"], None, UsageKind::Reference);
    store.clear("A");

    assert_eq!(
        *log.borrow(),
        vec![
            EventKind::SymbolCreated,
            EventKind::LocationCreated,
            EventKind::SymbolAmended,
            EventKind::LocationCreated,
            EventKind::LocationRemoved,
            EventKind::LocationRemoved,
            EventKind::SymbolRemoved,
        ]
    );
}

// === Queries ===

#[test]
fn test_member_queries_and_alias_resolution() {
    let mut store = SymbolStore::new();
    let doc = TextDocument::new("file:///geo.q", "struct Point { x }\nuse P = Point");

    let point = store
        .query(&doc, "type", &["Point"])
        .unwrap()
        .enter(
            SymbolAddition::new()
                .with_data(AdditionData::new().visibility(Visibility::Public))
                .with_usage(UsageInfo::new(UsageKind::Declaration).range(7..12)),
        )
        .unwrap()
        .query_member("x", |member| {
            member.enter(SymbolAddition::new().with_usage(UsageInfo::new(UsageKind::Declaration).range(15..16)))?;
            Ok(())
        })
        .unwrap()
        .symbol_id()
        .unwrap();

    store
        .query(&doc, "type", &["P"])
        .unwrap()
        .enter(
            SymbolAddition::new()
                .with_data(AdditionData::new().visibility(Visibility::File).alias_of(point))
                .with_usage(UsageInfo::new(UsageKind::Declaration).range(23..24)),
        )
        .unwrap();

    let mut query = store.query(&doc, "type", &["P"]).unwrap();
    query.if_unknown(|_| panic!("alias should resolve")).unwrap();
    query.resolve_alias().unwrap();
    assert_eq!(query.symbol_id(), Some(point));
    assert!(query.visible_members().contains_key("x"));
    assert_eq!(query.visible(), Some(true));
}

#[test]
fn test_visible_symbols_from_two_documents() {
    let mut store = SymbolStore::new();
    enter(&mut store, "file:///a", &["Shared"], public(), UsageKind::Declaration);
    enter(
        &mut store,
        "file:///a",
        &["Private"],
        Some(AdditionData::new().visibility(Visibility::File)),
        UsageKind::Declaration,
    );

    let from_a = store.get_visible_symbols(Some("file:///a"), "type");
    let from_b = store.get_visible_symbols(Some("file:///b"), "type");
    let from_nowhere = store.get_visible_symbols(None, "type");

    assert_eq!(from_a.len(), 2);
    assert_eq!(from_b.len(), 1);
    assert!(from_b.contains_key("Shared"));
    assert_eq!(from_nowhere.len(), 1);
}
