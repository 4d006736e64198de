// ── Subscription contexts ──
//
// The set of controller and door identities consumers are interested in.
// Readers take a cheap `Arc` of the whole set; writers swap in a new set.

use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::model::{ContextKey, DoorId};

pub(crate) struct Contexts {
    set: ArcSwap<BTreeSet<ContextKey>>,
}

impl Contexts {
    pub(crate) fn new() -> Self {
        Self {
            set: ArcSwap::from_pointee(BTreeSet::new()),
        }
    }

    /// Add keys. Returns the keys that were not already present.
    pub(crate) fn extend(&self, keys: impl IntoIterator<Item = ContextKey>) -> Vec<ContextKey> {
        let keys: Vec<ContextKey> = keys.into_iter().collect();
        let previous = self.set.rcu(|current| {
            let mut next = BTreeSet::clone(current);
            next.extend(keys.iter().copied());
            next
        });
        keys.into_iter()
            .filter(|k| !previous.contains(k))
            .collect()
    }

    pub(crate) fn insert(&self, key: ContextKey) -> bool {
        !self.extend([key]).is_empty()
    }

    pub(crate) fn remove(&self, key: &ContextKey) -> bool {
        let previous = self.set.rcu(|current| {
            let mut next = BTreeSet::clone(current);
            next.remove(key);
            next
        });
        previous.contains(key)
    }

    pub(crate) fn contains(&self, key: &ContextKey) -> bool {
        self.set.load().contains(key)
    }

    pub(crate) fn all(&self) -> Arc<BTreeSet<ContextKey>> {
        self.set.load_full()
    }

    /// Controller contexts.
    pub(crate) fn controllers(&self) -> BTreeSet<u32> {
        self.set
            .load()
            .iter()
            .filter_map(|k| match k {
                ContextKey::Controller(serial) => Some(*serial),
                ContextKey::Door(_) => None,
            })
            .collect()
    }

    /// Door contexts.
    pub(crate) fn doors(&self) -> BTreeSet<DoorId> {
        self.set
            .load()
            .iter()
            .filter_map(|k| match k {
                ContextKey::Door(door) => Some(*door),
                ContextKey::Controller(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_reports_only_new_keys() {
        let contexts = Contexts::new();
        assert!(contexts.insert(ContextKey::Controller(1)));
        assert!(!contexts.insert(ContextKey::Controller(1)));

        let added = contexts.extend([
            ContextKey::Controller(1),
            ContextKey::Door(DoorId::new(1, 2)),
        ]);
        assert_eq!(added, vec![ContextKey::Door(DoorId::new(1, 2))]);
        assert_eq!(contexts.all().len(), 2);
    }

    #[test]
    fn filters_by_kind() {
        let contexts = Contexts::new();
        contexts.extend([
            ContextKey::Controller(7),
            ContextKey::Door(DoorId::new(1, 2)),
            ContextKey::Door(DoorId::new(1, 4)),
        ]);
        assert_eq!(contexts.controllers().into_iter().collect::<Vec<_>>(), vec![7]);
        assert_eq!(contexts.doors().len(), 2);
    }

    #[test]
    fn remove_reports_presence() {
        let contexts = Contexts::new();
        contexts.insert(ContextKey::Controller(1));
        assert!(contexts.remove(&ContextKey::Controller(1)));
        assert!(!contexts.remove(&ContextKey::Controller(1)));
        assert!(!contexts.contains(&ContextKey::Controller(1)));
    }
}
