//! Store configuration

use serde::{Deserialize, Serialize};

use crate::types::Symbol;

/// What `resolve_alias` does when an alias chain revisits a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasCyclePolicy {
    /// Fail with `SymbolError::AliasCycle`
    Error,
    /// Stop at the first symbol seen twice
    FirstInCycle,
}

/// Configuration for a symbol store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub alias_cycle: AliasCyclePolicy,
    /// Trim tables right after locations are removed from them.
    /// Bulk pipelines may turn this off and call `trim_all` once at the end.
    pub trim_after_removal: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl StoreConfig {
    /// Default configuration: cycles are errors, trim eagerly
    pub fn default_config() -> Self {
        Self {
            alias_cycle: AliasCyclePolicy::Error,
            trim_after_removal: true,
        }
    }

    /// Lenient configuration: cycles resolve to the first repeated symbol
    pub fn lenient() -> Self {
        Self {
            alias_cycle: AliasCyclePolicy::FirstInCycle,
            ..Self::default_config()
        }
    }
}

/// Decides whether a `Restricted` symbol is visible to a requesting document
pub type RestrictedPolicy = Box<dyn Fn(&Symbol, Option<&str>) -> bool>;

/// Placeholder until workspace-root access control exists: nothing restricted is visible
pub fn deny_restricted() -> RestrictedPolicy {
    Box::new(|_, _| false)
}
