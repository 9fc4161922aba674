use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use curriculum_core::types::{OrderableItem, ScopeId};
use tracing::debug;

use crate::persistence::PersistenceClient;
use crate::Result;

/// Process-wide read-through cache of scope contents, keyed by [`ScopeId`].
///
/// Successful mutations invalidate exactly the scope they touched: an order
/// commit invalidates its own scope, a finalized upload invalidates the
/// item's owning scope.
#[derive(Debug, Default)]
pub struct ScopeCache {
    entries: Mutex<HashMap<ScopeId, Vec<OrderableItem>>>,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-known contents of `scope`, fetching through `client` on a miss.
    pub async fn get(
        &self,
        client: &dyn PersistenceClient,
        scope: &ScopeId,
    ) -> Result<Vec<OrderableItem>> {
        if let Some(hit) = self.peek(scope) {
            return Ok(hit);
        }
        debug!(scope = %scope, "scope cache miss");
        // The lock is not held across the fetch; two concurrent misses both
        // fetch and the later one wins.
        let items = client.fetch_scope(scope).await?;
        self.put(scope.clone(), items.clone());
        Ok(items)
    }

    pub fn peek(&self, scope: &ScopeId) -> Option<Vec<OrderableItem>> {
        self.lock().get(scope).cloned()
    }

    pub fn put(&self, scope: ScopeId, items: Vec<OrderableItem>) {
        self.lock().insert(scope, items);
    }

    /// Returns whether an entry was dropped.
    pub fn invalidate(&self, scope: &ScopeId) -> bool {
        let removed = self.lock().remove(scope).is_some();
        if removed {
            debug!(scope = %scope, "scope cache invalidated");
        }
        removed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ScopeId, Vec<OrderableItem>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
