// Fixed-capacity recent-event buffer. The front is the newest entry; pushing
// past capacity evicts from the back.

use std::collections::VecDeque;

use crate::model::Event;

#[derive(Debug, Clone)]
pub(crate) struct RecentEvents {
    events: VecDeque<Event>,
    capacity: usize,
}

impl RecentEvents {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Change the capacity, evicting the oldest entries if it shrinks.
    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.events.truncate(self.capacity);
    }

    /// Add `event` as the newest entry.
    pub(crate) fn push(&mut self, event: Event) {
        if self.events.len() == self.capacity {
            self.events.pop_back();
        }
        self.events.push_front(event);
    }

    /// `true` if a logged event with this index is still buffered.
    pub(crate) fn contains_index(&self, index: u32) -> bool {
        self.events.iter().any(|e| e.index == Some(index))
    }

    /// Newest first.
    pub(crate) fn to_vec(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }
}

impl Default for RecentEvents {
    fn default() -> Self {
        Self::new(16)
    }
}
