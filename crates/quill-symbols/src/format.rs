//! Render tables for debugging and snapshot tests

use serde::{Deserialize, Serialize};

use crate::store::SymbolStore;
use crate::types::{Range, StorageTier, SymbolId, TableRef, UsageKind, Visibility};

/// Output format for dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DumpFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for DumpFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(DumpFormat::Text),
            "json" => Ok(DumpFormat::Json),
            _ => Err(format!("Unknown format: {}. Expected: text or json", s)),
        }
    }
}

/// Serializable view of one symbol and its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub category: String,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    pub tier: StorageTier,
    /// Dotted path of the alias target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_amount: Option<u32>,
    pub usages: Vec<LocationSnapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub members: Vec<SymbolSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSnapshot {
    pub kind: UsageKind,
    pub uri: String,
    pub range: Option<Range>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_uri_bound: bool,
}

/// Snapshot every top-level symbol of a table, sorted by category then name
pub fn snapshot(store: &SymbolStore, table: &TableRef) -> Vec<SymbolSnapshot> {
    let Some(symbols) = store.table(table) else {
        return Vec::new();
    };
    let mut roots: Vec<SymbolId> = symbols.values().flat_map(|map| map.values().copied()).collect();
    sort_by_name(store, &mut roots);
    roots.into_iter().filter_map(|id| snapshot_symbol(store, id)).collect()
}

pub fn snapshot_json(store: &SymbolStore, table: &TableRef) -> String {
    serde_json::to_string_pretty(&snapshot(store, table)).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

fn snapshot_symbol(store: &SymbolStore, id: SymbolId) -> Option<SymbolSnapshot> {
    let symbol = store.get(id)?;

    let usages = symbol
        .usages
        .iter()
        .map(|(kind, location)| LocationSnapshot {
            kind,
            uri: location.uri.clone(),
            range: location.range,
            is_uri_bound: location.is_uri_bound,
        })
        .collect();

    let mut members: Vec<SymbolId> = symbol
        .members
        .as_ref()
        .map(|m| m.values().copied().collect())
        .unwrap_or_default();
    sort_by_name(store, &mut members);

    Some(SymbolSnapshot {
        category: symbol.category.clone(),
        identifier: symbol.identifier.clone(),
        subcategory: symbol.subcategory.clone(),
        visibility: symbol.visibility,
        tier: symbol.tier(),
        alias_of: symbol
            .alias_of
            .and_then(|target| store.path_of(target))
            .map(|path| path.join(".")),
        alias_amount: store.alias_amount(id),
        usages,
        members: members.into_iter().filter_map(|m| snapshot_symbol(store, m)).collect(),
    })
}

fn sort_by_name(store: &SymbolStore, ids: &mut [SymbolId]) {
    ids.sort_by_key(|id| {
        store
            .get(*id)
            .map(|s| (s.category.clone(), s.identifier.clone()))
            .unwrap_or_default()
    });
}

/// Format one table
pub fn dump_table(store: &SymbolStore, table: &TableRef, format: DumpFormat) -> String {
    match format {
        DumpFormat::Text => format_text(table, &snapshot(store, table)),
        DumpFormat::Json => snapshot_json(store, table),
    }
}

/// Format every table of the store, global first, documents in URI order
pub fn dump_store(store: &SymbolStore, format: DumpFormat) -> String {
    let mut tables = store.all_tables();
    tables.sort_by_key(|table| match table {
        TableRef::Global => (String::new(), 0),
        TableRef::Frame { uri, depth } => (uri.clone(), depth + 1),
    });

    match format {
        DumpFormat::Text => tables
            .iter()
            .map(|table| format_text(table, &snapshot(store, table)))
            .collect(),
        DumpFormat::Json => {
            let dump: Vec<_> = tables
                .iter()
                .map(|table| {
                    serde_json::json!({
                        "table": table_label(table),
                        "symbols": snapshot(store, table),
                    })
                })
                .collect();
            serde_json::to_string_pretty(&dump).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        }
    }
}

fn table_label(table: &TableRef) -> String {
    match table {
        TableRef::Global => "global".to_string(),
        TableRef::Frame { uri, depth } => format!("{}#{}", uri, depth),
    }
}

fn format_text(table: &TableRef, symbols: &[SymbolSnapshot]) -> String {
    let mut output = format!("=== {} ===\n", table_label(table));
    if symbols.is_empty() {
        output.push_str("  (empty)\n");
    }
    for symbol in symbols {
        format_symbol(&mut output, symbol, 1);
    }
    output
}

fn format_symbol(output: &mut String, symbol: &SymbolSnapshot, indent: usize) {
    let pad = "  ".repeat(indent);
    output.push_str(&format!("{}{} {}", pad, symbol.category, symbol.identifier));
    if let Some(visibility) = symbol.visibility {
        output.push_str(&format!(" [{}]", visibility.as_str()));
    }
    if let Some(target) = &symbol.alias_of {
        output.push_str(&format!(" -> {}", target));
    }
    if let Some(amount) = symbol.alias_amount {
        output.push_str(&format!(" (aliased {}x)", amount));
    }
    output.push('\n');

    for usage in &symbol.usages {
        let range = usage.range.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string());
        let bound = if usage.is_uri_bound { " (uri-bound)" } else { "" };
        output.push_str(&format!("{}  {} {} {}{}\n", pad, usage.kind.as_str(), usage.uri, range, bound));
    }
    for member in &symbol.members {
        format_symbol(output, member, indent + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{AdditionData, SymbolAddition, UsageInfo};

    fn populated() -> SymbolStore {
        let mut store = SymbolStore::new();
        store
            .query("file:///a", "type", &["Shape"])
            .unwrap()
            .enter(
                SymbolAddition::new()
                    .with_data(AdditionData::new().visibility(Visibility::Public))
                    .with_usage(UsageInfo::new(UsageKind::Declaration)),
            )
            .unwrap();
        store
            .query("file:///a", "type", &["Shape", "area"])
            .unwrap()
            .enter(SymbolAddition::new().with_usage(UsageInfo::new(UsageKind::Definition)))
            .unwrap();
        store
    }

    #[test]
    fn test_snapshot_nests_members() {
        let store = populated();
        let snap = snapshot(&store, &TableRef::Global);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].identifier, "Shape");
        assert_eq!(snap[0].members.len(), 1);
        assert_eq!(snap[0].members[0].identifier, "area");
        assert_eq!(snap[0].members[0].tier, StorageTier::Global);
    }

    #[test]
    fn test_text_dump() {
        let store = populated();
        let text = dump_table(&store, &TableRef::Global, DumpFormat::Text);
        assert!(text.starts_with("=== global ===\n"));
        assert!(text.contains("  type Shape [public]\n"));
        assert!(text.contains("    declaration file:///a [0, 0)\n"));
        assert!(text.contains("    type area\n"));
    }

    #[test]
    fn test_json_dump_is_parseable() {
        let store = populated();
        let json = dump_table(&store, &TableRef::Global, DumpFormat::Json);
        let parsed: Vec<SymbolSnapshot> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot(&store, &TableRef::Global));
    }

    #[test]
    fn test_dump_store_lists_document_frames() {
        let store = populated();
        let text = dump_store(&store, DumpFormat::Text);
        assert!(text.contains("=== global ==="));
        assert!(text.contains("=== file:///a#0 ===\n  (empty)\n"));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<DumpFormat>(), Ok(DumpFormat::Json));
        assert!("yaml".parse::<DumpFormat>().is_err());
    }
}
