//! Observer registry and subscription handles.
//!
//! Observers are kept in registration order. A notification pass works on
//! a snapshot of the registry taken when the pass starts, so observers
//! added during the pass wait for the next dispatch, and observers removed
//! during the pass still receive the current one.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Shared, individually borrowable observer callback
pub(crate) type Observer<S> = Rc<RefCell<dyn FnMut(&Arc<S>)>>;

/// Identifies one registration within a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Ordered set of observers owned by a store
pub(crate) struct ObserverRegistry<S> {
    store: String,
    next_id: Cell<u64>,
    entries: RefCell<Vec<(SubscriptionId, Observer<S>)>>,
}

impl<S: 'static> ObserverRegistry<S> {
    pub(crate) fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            next_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, observer: Observer<S>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.entries.borrow_mut().push((id, observer));
        self.report();
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        drop(entries);

        if removed {
            self.report();
        }
        removed
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.borrow().iter().any(|(entry_id, _)| *entry_id == id)
    }

    /// Observers in registration order, detached from the registry
    pub(crate) fn snapshot(&self) -> Vec<Observer<S>> {
        self.entries
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub(crate) fn clear(&self) {
        // Drop the observers outside the borrow; their captures may touch the store.
        let drained = std::mem::take(&mut *self.entries.borrow_mut());
        drop(drained);
        self.report();
    }

    fn report(&self) {
        // Observer counts are small, well within f64's exact range
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(crate::metrics::OBSERVERS, "store" => self.store.clone())
            .set(self.len() as f64);
    }
}

/// Handle to a registered observer
///
/// Calling [`Subscription::unsubscribe`] removes the observer. Dropping the
/// handle does not; an observer lives until it is unsubscribed or its store
/// is disposed.
pub struct Subscription<S: 'static> {
    id: SubscriptionId,
    registry: Weak<ObserverRegistry<S>>,
}

impl<S: 'static> Subscription<S> {
    pub(crate) const fn new(id: SubscriptionId, registry: Weak<ObserverRegistry<S>>) -> Self {
        Self { id, registry }
    }

    /// This registration's id
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the observer from its store
    ///
    /// Idempotent. If called while a notification pass is running, the
    /// observer still receives that pass.
    ///
    /// # Returns
    ///
    /// `true` if this call removed the observer
    pub fn unsubscribe(&self) -> bool {
        let removed = self
            .registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id));

        if removed {
            tracing::debug!(subscription = %self.id, "Observer unsubscribed");
        }
        removed
    }

    /// Returns true while the observer is still registered
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(self.id))
    }
}

impl<S: 'static> fmt::Debug for Subscription<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
