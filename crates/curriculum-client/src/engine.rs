//! Optimistic ordering for any number of scopes.
//!
//! Each scope keeps two copies of its children: the `snapshot` the server
//! last confirmed and the `working` copy the UI renders. Gestures edit
//! `working` immediately; [`OrderingEngine::commit`] persists it and either
//! promotes it to the new snapshot or throws it away.
//!
//! Persistence is serialized per scope. A commit requested while another is
//! in flight is folded into that one: when the first save resolves, the
//! engine sends the latest working order before releasing the scope, so the
//! last network call always carries the most recent full ordering.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use curriculum_core::gesture::MoveIntent;
use curriculum_core::ordering;
use curriculum_core::state::ScopePhase;
use curriculum_core::types::{OrderableItem, OrderedScope, SaveOrderRequest, ScopeId};
use curriculum_core::CurriculumError;
use tracing::{debug, info, warn};

use crate::cache::ScopeCache;
use crate::persistence::PersistenceClient;
use crate::{ClientError, Result};

/// What a call to [`OrderingEngine::commit`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The working order is now the snapshot.
    Persisted,
    /// Another commit for this scope is in flight; it will send the latest
    /// order when it resolves.
    Deferred,
    /// Working and snapshot already agree. No request was made.
    Unchanged,
}

enum CommitStart {
    Deferred,
    Unchanged,
    Send(Vec<OrderableItem>),
}

#[derive(Debug)]
struct ScopeState {
    working: Vec<OrderableItem>,
    snapshot: Vec<OrderableItem>,
    phase: ScopePhase,
    in_flight: bool,
    pending: bool,
}

impl ScopeState {
    fn new(items: Vec<OrderableItem>) -> Self {
        let items = ordering::normalize(items);
        Self {
            working: items.clone(),
            snapshot: items,
            phase: ScopePhase::Idle,
            in_flight: false,
            pending: false,
        }
    }

    /// Where the scope sits once no gesture is active.
    fn resting_phase(&self) -> ScopePhase {
        if self.in_flight {
            ScopePhase::Persisting
        } else if self.working != self.snapshot {
            ScopePhase::OptimisticallyApplied
        } else {
            ScopePhase::Idle
        }
    }

    fn set_phase(&mut self, scope: &ScopeId, next: ScopePhase) -> Result<()> {
        if self.phase == next {
            return Ok(());
        }
        let prev = self.phase;
        self.phase = prev.transition(next)?;
        debug!(scope = %scope, from = %prev, to = %next, "scope phase");
        Ok(())
    }

    fn settle(&mut self, scope: &ScopeId) -> Result<()> {
        let next = self.resting_phase();
        self.set_phase(scope, next)
    }
}

pub struct OrderingEngine {
    client: Arc<dyn PersistenceClient>,
    scopes: Mutex<HashMap<ScopeId, ScopeState>>,
    cache: Option<Arc<ScopeCache>>,
}

impl OrderingEngine {
    pub fn new(client: Arc<dyn PersistenceClient>) -> Self {
        Self {
            client,
            scopes: Mutex::new(HashMap::new()),
            cache: None,
        }
    }

    /// Read scopes through `cache` and invalidate it on successful commits.
    pub fn with_cache(mut self, cache: Arc<ScopeCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ScopeId, ScopeState>> {
        self.scopes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_scope<T>(
        &self,
        scope: &ScopeId,
        f: impl FnOnce(&mut ScopeState) -> Result<T>,
    ) -> Result<T> {
        let mut scopes = self.lock();
        let state = scopes
            .get_mut(scope)
            .ok_or_else(|| CurriculumError::ScopeNotLoaded(scope.to_string()))?;
        f(state)
    }

    // ── Loading ───────────────────────────────────────────────────────────

    /// Install server-confirmed contents as both snapshot and working copy.
    /// Replaces whatever the engine held for that scope.
    pub fn load(&self, scope: OrderedScope) -> Vec<OrderableItem> {
        let state = ScopeState::new(scope.items);
        let rendered = state.working.clone();
        debug!(scope = %scope.id, items = rendered.len(), "scope loaded");
        self.lock().insert(scope.id, state);
        rendered
    }

    /// Fetch `scope` (through the cache when one is attached) and load it.
    pub async fn open(&self, scope: &ScopeId) -> Result<Vec<OrderableItem>> {
        let items = match &self.cache {
            Some(cache) => cache.get(self.client.as_ref(), scope).await?,
            None => self.client.fetch_scope(scope).await?,
        };
        Ok(self.load(OrderedScope::new(scope.clone(), items)))
    }

    // ── Gestures ──────────────────────────────────────────────────────────

    pub fn begin_drag(&self, scope: &ScopeId) -> Result<()> {
        self.with_scope(scope, |state| state.set_phase(scope, ScopePhase::Dragging))
    }

    /// Abandon a drag without moving anything.
    pub fn cancel_drag(&self, scope: &ScopeId) -> Result<()> {
        self.with_scope(scope, |state| state.settle(scope))
    }

    /// Apply a move produced by the drag layer. The id is authoritative: if
    /// `from_index` no longer matches (the list changed under the gesture)
    /// the item is moved from where it actually is.
    pub fn apply_intent(&self, scope: &ScopeId, intent: &MoveIntent) -> Result<Vec<OrderableItem>> {
        self.with_scope(scope, |state| {
            let actual = ordering::position_of(&state.working, &intent.moved_id)
                .map_err(|_| item_not_found(scope, &intent.moved_id))?;
            if actual != intent.from_index {
                warn!(
                    scope = %scope,
                    item = %intent.moved_id,
                    expected = intent.from_index,
                    actual,
                    "stale move intent, using current position"
                );
            }
            apply_move(state, scope, &intent.moved_id, intent.to_index)
        })
    }

    /// Move `moved_id` to `target_index` in the working copy. Nothing is
    /// persisted until [`commit`](Self::commit).
    pub fn reorder(
        &self,
        scope: &ScopeId,
        moved_id: &str,
        target_index: usize,
    ) -> Result<Vec<OrderableItem>> {
        self.with_scope(scope, |state| apply_move(state, scope, moved_id, target_index))
    }

    /// Replace the working order with an explicit permutation of its ids.
    pub fn set_order(&self, scope: &ScopeId, ids: &[&str]) -> Result<Vec<OrderableItem>> {
        self.with_scope(scope, |state| {
            state.working = ordering::set_order(&state.working, ids)?;
            state.settle(scope)?;
            Ok(state.working.clone())
        })
    }

    // ── Persistence ───────────────────────────────────────────────────────

    /// Persist the working order.
    ///
    /// On failure the working copy is replaced by the snapshot and the
    /// save error is returned wrapped in [`ClientError::OrderPersist`].
    pub async fn commit(&self, scope: &ScopeId) -> Result<CommitOutcome> {
        let start = self.with_scope(scope, |state| {
            if state.in_flight {
                state.pending = true;
                debug!(scope = %scope, "commit deferred behind in-flight save");
                return Ok(CommitStart::Deferred);
            }
            if state.working == state.snapshot {
                state.settle(scope)?;
                return Ok(CommitStart::Unchanged);
            }
            state.in_flight = true;
            state.set_phase(scope, ScopePhase::Persisting)?;
            Ok(CommitStart::Send(state.working.clone()))
        })?;

        let mut items = match start {
            CommitStart::Deferred => return Ok(CommitOutcome::Deferred),
            CommitStart::Unchanged => return Ok(CommitOutcome::Unchanged),
            CommitStart::Send(items) => items,
        };

        loop {
            let request = SaveOrderRequest {
                scope_id: scope.wire_id().to_string(),
                items: ordering::order_entries(&items),
            };
            let result = self.client.save_order(scope, &request).await;

            let mut scopes = self.lock();
            let Some(state) = scopes.get_mut(scope) else {
                // Scope was dropped while the save was in flight.
                return result.map(|_| CommitOutcome::Persisted);
            };

            match result {
                Ok(()) => {
                    state.snapshot = items;
                    if state.pending && state.working != state.snapshot {
                        state.pending = false;
                        items = state.working.clone();
                        debug!(scope = %scope, "sending newer order queued during save");
                        continue;
                    }
                    state.pending = false;
                    state.in_flight = false;
                    if state.phase != ScopePhase::Dragging {
                        state.settle(scope)?;
                    }
                    drop(scopes);

                    info!(scope = %scope, items = request.items.len(), "order saved");
                    if let Some(cache) = &self.cache {
                        cache.invalidate(scope);
                    }
                    return Ok(CommitOutcome::Persisted);
                }
                Err(err) => {
                    state.in_flight = false;
                    state.pending = false;
                    state.working = state.snapshot.clone();
                    // A gesture in progress keeps going over the restored order.
                    if state.phase != ScopePhase::Dragging {
                        if state.phase == ScopePhase::Persisting {
                            state.set_phase(scope, ScopePhase::RollingBack)?;
                        }
                        state.set_phase(scope, ScopePhase::Idle)?;
                    }
                    warn!(scope = %scope, error = %err, "order save failed, rolled back");
                    return Err(ClientError::OrderPersist {
                        scope: scope.to_string(),
                        source: Box::new(err),
                    });
                }
            }
        }
    }

    /// `reorder` followed by `commit`.
    pub async fn move_item(
        &self,
        scope: &ScopeId,
        moved_id: &str,
        target_index: usize,
    ) -> Result<CommitOutcome> {
        self.reorder(scope, moved_id, target_index)?;
        self.commit(scope).await
    }

    // ── Inspection ────────────────────────────────────────────────────────

    /// The working copy, i.e. what the UI shows.
    pub fn rendered(&self, scope: &ScopeId) -> Result<Vec<OrderableItem>> {
        self.with_scope(scope, |state| Ok(state.working.clone()))
    }

    /// The last server-confirmed order.
    pub fn snapshot(&self, scope: &ScopeId) -> Result<Vec<OrderableItem>> {
        self.with_scope(scope, |state| Ok(state.snapshot.clone()))
    }

    pub fn phase(&self, scope: &ScopeId) -> Result<ScopePhase> {
        self.with_scope(scope, |state| Ok(state.phase))
    }
}

fn item_not_found(scope: &ScopeId, item: &str) -> ClientError {
    CurriculumError::ItemNotFound {
        scope: scope.to_string(),
        item: item.to_string(),
    }
    .into()
}

fn apply_move(
    state: &mut ScopeState,
    scope: &ScopeId,
    moved_id: &str,
    target_index: usize,
) -> Result<Vec<OrderableItem>> {
    let next = ordering::reorder(&state.working, moved_id, target_index).map_err(|e| match e {
        CurriculumError::ItemNotFound { item, .. } => item_not_found(scope, &item),
        CurriculumError::EmptyScope(_) => CurriculumError::EmptyScope(scope.to_string()).into(),
        other => other.into(),
    })?;
    state.working = next;
    state.settle(scope)?;
    Ok(state.working.clone())
}
