//! Pure ordering math for one scope.
//!
//! Nothing here touches the network. The functions take a slice, return a
//! fresh `Vec`, and leave the caller's copy alone so it can serve as the
//! rollback snapshot.

use std::collections::HashSet;

use crate::error::{CurriculumError, Result};
use crate::types::{OrderEntry, OrderableItem};

/// Move `moved_id` to `target_index` and renumber.
///
/// The move is a stable remove-then-insert: every other element keeps its
/// relative order. `target_index` is clamped to `[0, len - 1]`. When the
/// resulting id sequence equals the current one the input is returned
/// unchanged, `order` fields included.
pub fn reorder(
    items: &[OrderableItem],
    moved_id: &str,
    target_index: usize,
) -> Result<Vec<OrderableItem>> {
    let from = position_of(items, moved_id)?;
    let last = items.len() - 1;
    let to = target_index.min(last);

    if from == to {
        return Ok(items.to_vec());
    }

    let mut next = items.to_vec();
    let item = next.remove(from);
    next.insert(to, item);
    renumber(&mut next);
    Ok(next)
}

/// Replace the sequence with the permutation named by `ordered`. Every id in
/// `items` must appear exactly once.
pub fn set_order(items: &[OrderableItem], ordered: &[&str]) -> Result<Vec<OrderableItem>> {
    let mut seen = HashSet::new();
    for &id in ordered {
        if !seen.insert(id) {
            return Err(CurriculumError::InvalidOrder(format!(
                "duplicate id in order list: '{id}'"
            )));
        }
    }

    let existing: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
    for &id in ordered {
        if !existing.contains(id) {
            return Err(CurriculumError::InvalidOrder(format!(
                "'{id}' is not in this scope"
            )));
        }
    }
    for item in items {
        if !seen.contains(item.id.as_str()) {
            return Err(CurriculumError::InvalidOrder(format!(
                "missing id in order list: '{}'",
                item.id
            )));
        }
    }

    let mut next: Vec<OrderableItem> = ordered
        .iter()
        .filter_map(|&id| items.iter().find(|i| i.id == id).cloned())
        .collect();
    renumber(&mut next);
    Ok(next)
}

/// Rewrite every `order` to its 1-based index.
pub fn renumber(items: &mut [OrderableItem]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.order = index as u32 + 1;
    }
}

/// Sort by the server-provided `order` (stable, so ties keep arrival order)
/// and renumber, so gaps or duplicates from the backend never reach the view.
pub fn normalize(mut items: Vec<OrderableItem>) -> Vec<OrderableItem> {
    items.sort_by_key(|i| i.order);
    renumber(&mut items);
    items
}

/// `true` when the `order` fields are exactly `1..=N` in index order.
pub fn is_contiguous(items: &[OrderableItem]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.order == index as u32 + 1)
}

/// Two sequences render identically when the same id sits at every index.
pub fn same_sequence(a: &[OrderableItem], b: &[OrderableItem]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id == y.id)
}

/// The full-replace payload for a save.
pub fn order_entries(items: &[OrderableItem]) -> Vec<OrderEntry> {
    items.iter().map(OrderEntry::from).collect()
}

pub fn position_of(items: &[OrderableItem], id: &str) -> Result<usize> {
    items
        .iter()
        .position(|i| i.id == id)
        .ok_or_else(|| CurriculumError::ItemNotFound {
            scope: String::new(),
            item: id.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
