// ── Keyed slot store with atomic snapshot publication ──
//
// Each key owns a slot in a `DashMap`, so writers for different
// controllers lock different shards. Publication rebuilds the consumer
// snapshot inside `watch::send_modify`, which serializes publishers: the
// last publisher always copies the latest slot values, and readers only
// ever see whole snapshots.

use std::collections::BTreeMap;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;

/// Published record for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry<V> {
    pub available: bool,
    /// Present only while `available`.
    pub value: Option<V>,
    /// Time of the last successful update.
    pub updated: Option<DateTime<Utc>>,
}

impl<V> Default for Entry<V> {
    fn default() -> Self {
        Self {
            available: false,
            value: None,
            updated: None,
        }
    }
}

impl<V> Entry<V> {
    pub fn available(value: V) -> Self {
        Self {
            available: true,
            value: Some(value),
            updated: Some(Utc::now()),
        }
    }

    /// Mark unavailable, keeping the time of the last success.
    pub fn unavailable(updated: Option<DateTime<Utc>>) -> Self {
        Self {
            available: false,
            value: None,
            updated,
        }
    }
}

/// Immutable keyed snapshot handed to consumers.
pub type Snapshot<K, V> = Arc<BTreeMap<K, Entry<V>>>;

/// Slot contents that can be projected into a published entry.
pub(crate) trait Publish: Default + Send + Sync + 'static {
    type View: Clone + Send + Sync + 'static;

    fn view(&self) -> Entry<Self::View>;
}

impl<V: Clone + Send + Sync + 'static> Publish for Entry<V> {
    type View = V;

    fn view(&self) -> Entry<V> {
        self.clone()
    }
}

pub(crate) struct SlotStore<K, S>
where
    K: Ord + Hash + Copy + Send + Sync + 'static,
    S: Publish,
{
    slots: DashMap<K, S>,
    snapshot: watch::Sender<Snapshot<K, S::View>>,
}

impl<K, S> SlotStore<K, S>
where
    K: Ord + Hash + Copy + Send + Sync + 'static,
    S: Publish,
{
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(BTreeMap::new()));
        Self {
            slots: DashMap::new(),
            snapshot,
        }
    }

    /// Create default (unavailable) slots for unseen keys and publish them.
    /// Returns the number of keys added.
    pub(crate) fn seed(&self, keys: impl IntoIterator<Item = K>) -> usize {
        let added: Vec<K> = keys
            .into_iter()
            .filter(|key| {
                let mut inserted = false;
                self.slots.entry(*key).or_insert_with(|| {
                    inserted = true;
                    S::default()
                });
                inserted
            })
            .collect();

        if !added.is_empty() {
            self.publish(added.iter().copied());
        }
        added.len()
    }

    /// Read a slot.
    pub(crate) fn read<R>(&self, key: &K, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.slots.get(key).map(|slot| f(slot.value()))
    }

    /// Mutate an existing slot under its shard lock. Returns `None` if the
    /// key has no slot; removed keys are never recreated here, only by
    /// [`seed`](Self::seed). Nothing is published until
    /// [`publish`](Self::publish).
    pub(crate) fn update<R>(&self, key: K, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        self.slots.get_mut(&key).map(|mut slot| f(slot.value_mut()))
    }

    /// Copy the current contents of `keys` into a new snapshot.
    pub(crate) fn publish(&self, keys: impl IntoIterator<Item = K>) {
        self.snapshot.send_modify(|snap| {
            let mut next = (**snap).clone();
            for key in keys {
                match self.slots.get(&key) {
                    Some(slot) => {
                        next.insert(key, slot.view());
                    }
                    None => {
                        next.remove(&key);
                    }
                }
            }
            *snap = Arc::new(next);
        });
    }

    /// Drop a slot and publish its removal.
    pub(crate) fn remove(&self, key: &K) -> bool {
        let removed = self.slots.remove(key).is_some();
        if removed {
            self.publish([*key]);
        }
        removed
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn get(&self, key: &K) -> Option<Entry<S::View>> {
        self.snapshot.borrow().get(key).cloned()
    }

    pub(crate) fn snapshot(&self) -> Snapshot<K, S::View> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<K, S::View>> {
        self.snapshot.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    type Store = SlotStore<u32, Entry<String>>;

    #[test]
    fn seed_publishes_unavailable_entries_once() {
        let store = Store::new();
        assert_eq!(store.seed([1, 2]), 2);
        assert_eq!(store.seed([2, 3]), 1);

        let snap = store.snapshot();
        assert_eq!(snap.len(), 3);
        assert!(snap.values().all(|e| !e.available && e.value.is_none()));
    }

    #[test]
    fn update_is_invisible_until_published() {
        let store = Store::new();
        store.seed([1]);
        store.update(1, |e| *e = Entry::available("open".to_owned()));

        assert!(!store.get(&1).unwrap().available);
        store.publish([1]);
        assert_eq!(store.get(&1).unwrap().value.as_deref(), Some("open"));
    }

    #[test]
    fn publish_replaces_snapshot_atomically() {
        let store = Store::new();
        store.seed([1, 2]);
        let before = store.snapshot();

        store.update(1, |e| *e = Entry::available("a".to_owned()));
        store.update(2, |e| *e = Entry::available("b".to_owned()));
        store.publish([1, 2]);

        // An earlier snapshot is never mutated in place.
        assert!(before.values().all(|e| !e.available));
        let after = store.snapshot();
        assert!(after.values().all(|e| e.available));
    }

    #[test]
    fn remove_drops_key_from_snapshot() {
        let store = Store::new();
        store.seed([1, 2]);
        assert!(store.remove(&1));
        assert!(!store.remove(&1));
        assert!(!store.contains(&1));
        assert_eq!(store.snapshot().keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn update_after_remove_does_not_resurrect_slot() {
        let store = Store::new();
        store.seed([1, 2]);
        store.remove(&1);

        assert_eq!(store.update(1, |e| *e = Entry::available("late".to_owned())), None);
        store.publish([1, 2]);
        assert!(!store.contains(&1));
        assert_eq!(store.snapshot().keys().copied().collect::<Vec<_>>(), vec![2]);

        assert_eq!(store.update(2, |e| e.available), Some(false));
    }

    #[tokio::test]
    async fn subscribers_are_notified_on_publish() {
        let store = Store::new();
        let mut rx = store.subscribe();
        store.seed([7]);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().contains_key(&7));
    }
}
