use atropos_types::{Event, EventId};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Upstream, LRU-bounded staging area that releases events to the engine
/// only once all of their parents have already been released.
///
/// This sits outside the core proper (the design treats ordering as a
/// host concern) but every deployment needs one, since `Engine::process_event`
/// requires topological delivery and gossip never guarantees it.
pub struct OrderingBuffer {
    /// Events waiting on at least one unresolved parent, with a count of
    /// how many parents remain outstanding.
    pending: HashMap<EventId, (Event, usize)>,
    /// For each missing parent, the children blocked on it.
    waiting_on: HashMap<EventId, Vec<EventId>>,
    /// Ids already released, bounded so forever-missing parents can't leak
    /// memory; eviction here just stops deduplicating re-delivery, it never
    /// drops a still-pending event.
    released: LruCache<EventId, ()>,
}

impl OrderingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: HashMap::new(),
            waiting_on: HashMap::new(),
            released: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
        }
    }

    /// Submit an event. Returns every event (possibly several, possibly
    /// `event` itself) that is now ready for `Engine::process_event`, in
    /// an order that respects parent-before-child.
    pub fn push(&mut self, event: Event, has_parent: impl Fn(EventId) -> bool) -> Vec<Event> {
        if self.released.contains(&event.id) || self.pending.contains_key(&event.id) {
            return Vec::new();
        }

        let missing: Vec<EventId> = event
            .parents
            .iter()
            .copied()
            .filter(|p| !self.released.contains(p) && !has_parent(*p))
            .collect();

        if missing.is_empty() {
            return self.release(event);
        }

        let remaining = missing.len();
        for parent in &missing {
            self.waiting_on.entry(*parent).or_default().push(event.id);
        }
        self.pending.insert(event.id, (event, remaining));
        Vec::new()
    }

    fn release(&mut self, event: Event) -> Vec<Event> {
        let mut ready = vec![event];
        let mut out = Vec::new();

        while let Some(event) = ready.pop() {
            let id = event.id;
            self.released.put(id, ());
            out.push(event);

            if let Some(children) = self.waiting_on.remove(&id) {
                for child_id in children {
                    let Some((_, remaining)) = self.pending.get_mut(&child_id) else {
                        continue;
                    };
                    *remaining -= 1;
                    if *remaining == 0 {
                        if let Some((child, _)) = self.pending.remove(&child_id) {
                            ready.push(child);
                        }
                    }
                }
            }
        }

        out
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
