//! Cross-document check sessions.
//!
//! Resolving a `use`/import path can require checking another document
//! first. A `CheckSession` remembers which documents are done and which are
//! in progress, so a cycle of mutual imports fails with
//! `SymbolError::CheckCycle` instead of recursing forever.
//!
//! The store is single-threaded; checks may suspend on document loading,
//! but all table mutations happen synchronously between suspension points.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::future::{FutureExt, LocalBoxFuture};
use tracing::{debug, warn};

use crate::document::TextDocument;
use crate::error::{SymbolError, SymbolResult};
use crate::store::SymbolStore;
use crate::types::SymbolId;

/// Loads documents by URI
#[async_trait(?Send)]
pub trait DocumentLoader {
    async fn load(&self, uri: &str) -> SymbolResult<TextDocument>;
}

/// Language-specific binder run once per document
#[async_trait(?Send)]
pub trait DocumentChecker {
    async fn check(&self, document: &TextDocument, cx: &mut CheckContext<'_>) -> SymbolResult<()>;
}

/// Documents checked or being checked during one workspace pass
#[derive(Debug, Default)]
pub struct CheckSession {
    in_progress: Vec<String>,
    checked: HashSet<String>,
}

impl CheckSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_checked(&self, uri: &str) -> bool {
        self.checked.contains(uri)
    }

    pub fn is_in_progress(&self, uri: &str) -> bool {
        self.in_progress.iter().any(|u| u == uri)
    }

    pub fn checked_count(&self) -> usize {
        self.checked.len()
    }

    /// Check `uri` (and whatever it pulls in) against `store`
    pub async fn check_document(
        &mut self,
        store: &mut SymbolStore,
        loader: &dyn DocumentLoader,
        checker: &dyn DocumentChecker,
        uri: &str,
    ) -> SymbolResult<()> {
        let mut cx = CheckContext {
            store,
            session: self,
            loader,
            checker,
        };
        cx.ensure_checked(uri).await
    }

    /// Check every document in `uris`, collecting failures instead of stopping
    pub async fn check_workspace(
        &mut self,
        store: &mut SymbolStore,
        loader: &dyn DocumentLoader,
        checker: &dyn DocumentChecker,
        uris: &[String],
    ) -> Vec<SymbolError> {
        let mut errors = Vec::new();
        for uri in uris {
            if let Err(err) = self.check_document(store, loader, checker, uri).await {
                errors.push(err);
            }
        }
        errors
    }
}

/// Handed to a `DocumentChecker` while it binds one document
pub struct CheckContext<'a> {
    store: &'a mut SymbolStore,
    session: &'a mut CheckSession,
    loader: &'a dyn DocumentLoader,
    checker: &'a dyn DocumentChecker,
}

impl<'a> CheckContext<'a> {
    pub fn store(&mut self) -> &mut SymbolStore {
        &mut *self.store
    }

    pub fn session(&self) -> &CheckSession {
        &*self.session
    }

    /// Make sure `uri` has been checked, checking it now if needed
    pub fn ensure_checked<'c>(&'c mut self, uri: &'c str) -> LocalBoxFuture<'c, SymbolResult<()>> {
        async move {
            if self.session.is_checked(uri) {
                return Ok(());
            }
            if self.session.is_in_progress(uri) {
                let mut chain = self.session.in_progress.clone();
                chain.push(uri.to_string());
                warn!(uri, chain = %chain.join(" -> "), "document check cycle");
                return Err(SymbolError::CheckCycle {
                    uri: uri.to_string(),
                    chain,
                });
            }

            self.session.in_progress.push(uri.to_string());
            let result = self.run_check(uri).await;
            self.session.in_progress.pop();

            if result.is_ok() {
                self.session.checked.insert(uri.to_string());
                debug!(uri, "document checked");
            }
            result
        }
        .boxed_local()
    }

    async fn run_check(&mut self, uri: &str) -> SymbolResult<()> {
        let loader = self.loader;
        let checker = self.checker;
        let document = loader.load(uri).await?;
        // Re-checking replaces whatever the previous check contributed
        self.store.clear(&document.uri);
        checker.check(&document, self).await
    }

    /// Check `uri` if needed, then resolve a public symbol path
    pub async fn resolve_external(
        &mut self,
        uri: &str,
        category: &str,
        path: &[String],
    ) -> SymbolResult<Option<SymbolId>> {
        self.ensure_checked(uri).await?;
        Ok(self.store.lookup(category, path, None).symbol)
    }
}
