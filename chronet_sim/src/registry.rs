//! Registry of live simulable entities.
//!
//! The registry is the source of truth for "everything currently alive".
//! It holds non-owning references, so an entity that is dropped by its
//! owner disappears from the next [`Registry::snapshot`] without any
//! explicit unregistration.

use chronet_env::{EntityKey, EntityRef, Simulable, WeakEntityRef};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// Coarse lifecycle flag of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryState {
    /// Freshly created or cleared; nothing has run against it yet.
    #[default]
    New,
    /// A consumer has observed the fresh state and zeroed its time.
    Active,
}

/// Entry count below which `register` never prunes.
const MIN_PRUNE_THRESHOLD: usize = 64;

#[derive(Default)]
struct RegistryInner {
    entries: IndexMap<EntityKey, WeakEntityRef>,
    state: RegistryState,
    prune_threshold: usize,
}

impl RegistryInner {
    /// Drops entries whose entity no longer exists. Returns how many.
    fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        self.prune_threshold = (self.entries.len() * 2).max(MIN_PRUNE_THRESHOLD);
        before - self.entries.len()
    }
}

/// Ordered set of live entities plus a [`RegistryState`].
///
/// `Registry` is a cheap handle: clones share the same underlying set.
/// Iteration follows insertion order.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Rc<RefCell<RegistryInner>>,
}

thread_local! {
    static DEFAULT_REGISTRY: Registry = Registry::new();
}

impl Registry {
    /// Creates an empty registry in the `New` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default registry read by the global `run`/`reinit` entry points.
    ///
    /// Built on first use and kept for the lifetime of the thread. Entities
    /// are single-threaded, so each thread sees its own default.
    pub fn global() -> Self {
        DEFAULT_REGISTRY.with(Registry::clone)
    }

    /// Whether two handles refer to the same registry.
    pub fn ptr_eq(&self, other: &Registry) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Wraps `entity` in a shared handle and registers it.
    pub fn spawn<T: Simulable + 'static>(&self, entity: T) -> Rc<RefCell<T>> {
        let shared = Rc::new(RefCell::new(entity));
        let handle: EntityRef = shared.clone();
        self.register(&handle);
        shared
    }

    /// Adds `entity` to the live set.
    ///
    /// Returns false, leaving the registry untouched, if it was already present.
    /// Entries of dropped entities are pruned whenever the set has doubled
    /// since the last prune, which keeps it bounded.
    pub fn register(&self, entity: &EntityRef) -> bool {
        let key = EntityKey::of(entity);
        let mut inner = self.inner.borrow_mut();
        if inner.entries.len() >= inner.prune_threshold {
            let pruned = inner.prune();
            if pruned > 0 {
                trace!(pruned, "Pruned dead registry entries");
            }
        }
        if inner.entries.contains_key(&key) {
            trace!(%key, "Entity already registered");
            return false;
        }
        inner.entries.insert(key, Rc::downgrade(entity));
        debug!(%key, live = inner.entries.len(), "Registered entity");
        true
    }

    /// Removes `entity` if present. Returns whether it was.
    pub fn unregister(&self, entity: &EntityRef) -> bool {
        let key = EntityKey::of(entity);
        let removed = self.inner.borrow_mut().entries.shift_remove(&key).is_some();
        if removed {
            debug!(%key, "Unregistered entity");
        }
        removed
    }

    /// Whether `entity` is registered.
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.inner
            .borrow()
            .entries
            .contains_key(&EntityKey::of(entity))
    }

    /// Live entities in insertion order.
    pub fn snapshot(&self) -> Vec<EntityRef> {
        self.inner
            .borrow()
            .entries
            .values()
            .filter_map(|weak| weak.upgrade())
            .collect()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.inner
            .borrow()
            .entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries whose entity no longer exists. Returns how many.
    pub fn prune(&self) -> usize {
        let pruned = self.inner.borrow_mut().prune();
        if pruned > 0 {
            trace!(pruned, "Pruned dead registry entries");
        }
        pruned
    }

    pub fn state(&self) -> RegistryState {
        self.inner.borrow().state
    }

    /// Moves the registry from `New` to `Active`. No-op when already `Active`.
    pub fn mark_active(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == RegistryState::New {
            inner.state = RegistryState::Active;
            debug!("Registry marked active");
        }
    }

    /// Forgets every entity and returns to the `New` state.
    pub fn clear_all(&self) {
        let mut inner = self.inner.borrow_mut();
        let dropped = inner.entries.len();
        inner.entries.clear();
        inner.state = RegistryState::New;
        debug!(dropped, "Registry cleared");
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.len())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::TickCounter;
    use chronet_env::{Clock, SimTime};

    fn counter(registry: &Registry, name: &str) -> EntityRef {
        let clock = Clock::shared(SimTime::from_millis(1.0)).unwrap();
        registry.spawn(TickCounter::new(name, clock))
    }

    fn names(entities: &[EntityRef]) -> Vec<String> {
        entities
            .iter()
            .map(|e| e.borrow().name().to_string())
            .collect()
    }

    #[test]
    fn test_snapshot_keeps_insertion_order() {
        let registry = Registry::new();
        let _a = counter(&registry, "a");
        let _b = counter(&registry, "b");
        let _c = counter(&registry, "c");

        assert_eq!(names(&registry.snapshot()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = Registry::new();
        let a = counter(&registry, "a");

        assert!(!registry.register(&a));
        assert!(!registry.register(&Rc::clone(&a)));
        assert_eq!(registry.len(), 1);
        assert_eq!(names(&registry.snapshot()), vec!["a"]);
    }

    #[test]
    fn test_unregister_preserves_remaining_order() {
        let registry = Registry::new();
        let a = counter(&registry, "a");
        let b = counter(&registry, "b");
        let _c = counter(&registry, "c");

        assert!(registry.unregister(&b));
        assert!(!registry.unregister(&b));
        assert!(!registry.contains(&b));
        assert!(registry.contains(&a));
        assert_eq!(names(&registry.snapshot()), vec!["a", "c"]);

        // Re-registering appends at the end
        assert!(registry.register(&b));
        assert_eq!(names(&registry.snapshot()), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_dropped_entities_leave_snapshot() {
        let registry = Registry::new();
        let a = counter(&registry, "a");
        let b = counter(&registry, "b");

        drop(a);
        assert_eq!(registry.len(), 1);
        assert_eq!(names(&registry.snapshot()), vec!["b"]);

        assert_eq!(registry.prune(), 1);
        assert_eq!(registry.prune(), 0);
        drop(b);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dead_entries_stay_bounded() {
        let registry = Registry::new();
        let _keep = counter(&registry, "keep");
        for i in 0..1000 {
            drop(counter(&registry, &format!("temp_{}", i)));
        }

        let entries = registry.inner.borrow().entries.len();
        assert!(entries <= MIN_PRUNE_THRESHOLD + 1, "{} entries", entries);
        assert_eq!(registry.len(), 1);
        assert_eq!(names(&registry.snapshot()), vec!["keep"]);
    }

    #[test]
    fn test_state_transitions() {
        let registry = Registry::new();
        assert_eq!(registry.state(), RegistryState::New);

        registry.mark_active();
        registry.mark_active();
        assert_eq!(registry.state(), RegistryState::Active);

        let _a = counter(&registry, "a");
        registry.clear_all();
        assert_eq!(registry.state(), RegistryState::New);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = Registry::new();
        let other = registry.clone();
        let _a = counter(&other, "a");

        assert!(registry.ptr_eq(&other));
        assert!(!registry.ptr_eq(&Registry::new()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_global_registry_is_per_thread_singleton() {
        let a = Registry::global();
        let b = Registry::global();
        assert!(a.ptr_eq(&b));

        let other_thread = std::thread::spawn(|| Registry::global().len())
            .join()
            .unwrap();
        assert_eq!(other_thread, 0);
    }
}
