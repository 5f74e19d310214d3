//! Ordered summary lists with tombstones.
//!
//! The Catalog index and each series' EntriesMetadata index are stored as a
//! sequence of optional slots. Deleting an item nulls its slot in place;
//! `compact` removes the holes and reassigns contiguous 1-based orders. The
//! stored order inside each namespace only agrees with the index right after
//! a compaction.

use bindery_common::{EntrySummary, SeriesSummary};
use serde::{Deserialize, Serialize};

/// An item that knows its id and 1-based position
pub trait Indexed {
    fn id(&self) -> &str;
    fn order(&self) -> usize;
    fn set_order(&mut self, order: usize);
}

impl Indexed for SeriesSummary {
    fn id(&self) -> &str {
        &self.hash
    }

    fn order(&self) -> usize {
        self.order
    }

    fn set_order(&mut self, order: usize) {
        self.order = order;
    }
}

impl Indexed for EntrySummary {
    fn id(&self) -> &str {
        &self.hash
    }

    fn order(&self) -> usize {
        self.order
    }

    fn set_order(&mut self, order: usize) {
        self.order = order;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedIndex<T> {
    slots: Vec<Option<T>>,
}

impl<T> Default for OrderedIndex<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T: Indexed> OrderedIndex<T> {
    /// Build a settled index, assigning orders from position
    #[must_use]
    pub fn from_items(items: Vec<T>) -> Self {
        let mut index = Self {
            slots: items.into_iter().map(Some).collect(),
        };
        index.compact();
        index
    }

    /// Number of slots, including tombstones
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of live items
    #[must_use]
    pub fn live(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Item stored at a 1-based order
    #[must_use]
    pub fn get(&self, order: usize) -> Option<&T> {
        order
            .checked_sub(1)
            .and_then(|i| self.slots.get(i))
            .and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, order: usize) -> Option<&mut T> {
        order
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(i))
            .and_then(Option::as_mut)
    }

    /// Whether the slot at `order` still references `id`
    #[must_use]
    pub fn slot_matches(&self, order: usize, id: &str) -> bool {
        self.get(order).is_some_and(|item| item.id() == id)
    }

    /// Null the slot at `order` if it still references `id`
    pub fn tombstone(&mut self, order: usize, id: &str) -> bool {
        if !self.slot_matches(order, id) {
            return false;
        }
        self.slots[order - 1] = None;
        true
    }

    /// Tombstone every live item the predicate rejects. Returns how many
    /// slots were nulled.
    pub fn tombstone_where(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let mut nulled = 0;
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|item| !keep(item)) {
                *slot = None;
                nulled += 1;
            }
        }
        nulled
    }

    /// Replace the slot at `order`. Fails if `order` is out of range.
    pub fn set(&mut self, order: usize, item: T) -> bool {
        match order.checked_sub(1).and_then(|i| self.slots.get_mut(i)) {
            Some(slot) => {
                *slot = Some(item);
                true
            }
            None => false,
        }
    }

    /// Drop tombstones and renumber the survivors from 1, keeping relative
    /// order. Returns `(id, new order)` for every survivor.
    pub fn compact(&mut self) -> Vec<(String, usize)> {
        self.slots.retain(Option::is_some);
        self.slots
            .iter_mut()
            .flatten()
            .enumerate()
            .map(|(i, item)| {
                item.set_order(i + 1);
                (item.id().to_string(), i + 1)
            })
            .collect()
    }

    /// No tombstones and every item's order equals its position
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.slots
            .iter()
            .enumerate()
            .all(|(i, slot)| slot.as_ref().is_some_and(|item| item.order() == i + 1))
    }

    /// Live items in slot order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().flatten()
    }

    /// Live items in slot order
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.slots.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Item {
        id: String,
        order: usize,
    }

    impl Indexed for Item {
        fn id(&self) -> &str {
            &self.id
        }
        fn order(&self) -> usize {
            self.order
        }
        fn set_order(&mut self, order: usize) {
            self.order = order;
        }
    }

    fn items(ids: &[&str]) -> OrderedIndex<Item> {
        OrderedIndex::from_items(
            ids.iter()
                .map(|id| Item {
                    id: (*id).to_string(),
                    order: 0,
                })
                .collect(),
        )
    }

    #[test]
    fn test_from_items_is_settled() {
        let index = items(&["a", "b", "c"]);
        assert!(index.is_settled());
        assert_eq!(index.get(1).unwrap().id, "a");
        assert_eq!(index.get(3).unwrap().order, 3);
        assert!(index.get(0).is_none());
        assert!(index.get(4).is_none());
    }

    #[test]
    fn test_tombstone_only_when_slot_matches() {
        let mut index = items(&["a", "b", "c"]);
        assert!(!index.tombstone(2, "a"));
        assert!(index.tombstone(2, "b"));
        assert!(!index.tombstone(2, "b"));
        assert_eq!(index.len(), 3);
        assert_eq!(index.live(), 2);
        assert!(!index.is_settled());
    }

    #[test]
    fn test_batched_tombstones_then_compact() {
        let mut index = items(&["a", "b", "c", "d", "e"]);
        index.tombstone(1, "a");
        index.tombstone(4, "d");
        let survivors = index.compact();
        assert_eq!(
            survivors,
            vec![
                ("b".to_string(), 1),
                ("c".to_string(), 2),
                ("e".to_string(), 3)
            ]
        );
        assert!(index.is_settled());
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_tombstone_where() {
        let mut index = items(&["a", "b", "c"]);
        assert_eq!(index.tombstone_where(|item| item.id != "b"), 1);
        assert_eq!(index.live(), 2);
        assert!(index.get(2).is_none());
        index.compact();
        assert_eq!(index.get(2).unwrap().id, "c");
    }

    #[test]
    fn test_set_out_of_range() {
        let mut index = items(&["a"]);
        let item = Item {
            id: "z".into(),
            order: 2,
        };
        assert!(!index.set(2, item.clone()));
        assert!(index.set(1, item));
        assert_eq!(index.get(1).unwrap().id, "z");
    }
}
