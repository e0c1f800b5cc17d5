//! Listener registration.

use std::sync::Arc;

use crate::events::Event;

/// Callback invoked once per event of a subscribed service.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by `subscribe`, used to remove that listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// Listeners of one subscription, in registration order.
#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: Vec<(ListenerId, Listener)>,
}

impl ListenerSet {
    /// Id of `listener` if this exact `Arc` is already registered.
    pub fn find(&self, listener: &Listener) -> Option<ListenerId> {
        self.entries
            .iter()
            .find(|(_, existing)| same_listener(existing, listener))
            .map(|(id, _)| *id)
    }

    pub fn insert(&mut self, id: ListenerId, listener: Listener) {
        self.entries.push((id, listener));
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clone the listeners so they can run without holding any lock.
    pub fn snapshot(&self) -> Vec<Listener> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }
}

// Data pointers only; vtable pointers are not unique per type.
fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Listener {
        Arc::new(|_: &Event| {})
    }

    #[test]
    fn test_find_by_identity() {
        let a = noop();
        let b = noop();
        let mut set = ListenerSet::default();
        set.insert(ListenerId(1), a.clone());

        assert_eq!(set.find(&a), Some(ListenerId(1)));
        assert_eq!(set.find(&a.clone()), Some(ListenerId(1)));
        assert_eq!(set.find(&b), None);
    }

    #[test]
    fn test_remove() {
        let mut set = ListenerSet::default();
        set.insert(ListenerId(1), noop());
        set.insert(ListenerId(2), noop());

        assert!(set.remove(ListenerId(1)));
        assert!(!set.remove(ListenerId(1)));
        assert_eq!(set.len(), 1);
        assert!(set.remove(ListenerId(2)));
        assert!(set.is_empty());
    }
}
