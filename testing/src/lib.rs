//! # Unistore Testing
//!
//! Testing utilities and helpers for the unistore state container.
//!
//! This crate provides:
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//! - Observers that record what they were notified with
//! - Property-based testing utilities
//!
//! ## Example
//!
//! ```ignore
//! use unistore_testing::mocks::RecordingObserver;
//! use unistore_runtime::Store;
//!
//! #[test]
//! fn test_name_flow() {
//!     let store = Store::new(NameState::default(), NameReducer, env);
//!     let recorder = RecordingObserver::new();
//!     let _sub = store.subscribe(recorder.observer()).unwrap();
//!
//!     store.dispatch(NameAction::SetName("Ada".into())).unwrap();
//!
//!     assert_eq!(recorder.len(), 1);
//!     assert_eq!(recorder.last().unwrap().name, "Ada");
//! }
//! ```


/// Recording observers for asserting notifications
pub mod mocks {
    use std::cell::RefCell;
    use std::fmt;
    use std::rc::Rc;
    use std::sync::Arc;

    /// Observer that records every state it is notified with
    ///
    /// Clones share the same recording, so one clone can be handed to a
    /// store while the test keeps the other.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use unistore_testing::mocks::RecordingObserver;
    ///
    /// let recorder = RecordingObserver::new();
    /// let mut observer = recorder.observer();
    /// observer(&Arc::new(1));
    /// observer(&Arc::new(2));
    ///
    /// assert_eq!(recorder.values(), vec![1, 2]);
    /// ```
    pub struct RecordingObserver<S> {
        states: Rc<RefCell<Vec<Arc<S>>>>,
    }

    impl<S: 'static> RecordingObserver<S> {
        /// Create an empty recording
        #[must_use]
        pub fn new() -> Self {
            Self {
                states: Rc::new(RefCell::new(Vec::new())),
            }
        }

        /// A callback suitable for `Store::subscribe` that appends to this recording
        pub fn observer(&self) -> impl FnMut(&Arc<S>) + use<S> {
            let states = Rc::clone(&self.states);
            move |state| states.borrow_mut().push(Arc::clone(state))
        }

        /// Every recorded state, oldest first
        #[must_use]
        pub fn states(&self) -> Vec<Arc<S>> {
            self.states.borrow().clone()
        }

        /// Recorded states as owned values
        #[must_use]
        pub fn values(&self) -> Vec<S>
        where
            S: Clone,
        {
            self.states.borrow().iter().map(|s| S::clone(s)).collect()
        }

        /// The most recent notification
        #[must_use]
        pub fn last(&self) -> Option<Arc<S>> {
            self.states.borrow().last().cloned()
        }

        /// Number of notifications received
        #[must_use]
        pub fn len(&self) -> usize {
            self.states.borrow().len()
        }

        /// Returns true if no notification was received
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.states.borrow().is_empty()
        }
    }

    impl<S: 'static> Default for RecordingObserver<S> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<S> Clone for RecordingObserver<S> {
        fn clone(&self) -> Self {
            Self {
                states: Rc::clone(&self.states),
            }
        }
    }

    impl<S> fmt::Debug for RecordingObserver<S> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("RecordingObserver")
                .field("notifications", &self.states.borrow().len())
                .finish()
        }
    }

    /// Shared, ordered log of labelled calls
    ///
    /// Used to check the order in which several observers ran.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use unistore_testing::mocks::CallLog;
    ///
    /// let log = CallLog::new();
    /// let mut first = log.observer::<u8>("first");
    /// let mut second = log.observer::<u8>("second");
    /// second(&Arc::new(0));
    /// first(&Arc::new(0));
    ///
    /// assert_eq!(log.entries(), ["second", "first"]);
    /// ```
    #[derive(Debug, Clone, Default)]
    pub struct CallLog {
        entries: Rc<RefCell<Vec<String>>>,
    }

    impl CallLog {
        /// Create an empty log
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Append an entry
        pub fn record(&self, entry: impl Into<String>) {
            self.entries.borrow_mut().push(entry.into());
        }

        /// An observer that records `label` each time it is called
        pub fn observer<S>(&self, label: &str) -> impl FnMut(&Arc<S>) + use<S> {
            let entries = Rc::clone(&self.entries);
            let label = label.to_owned();
            move |_| entries.borrow_mut().push(label.clone())
        }

        /// All entries, oldest first
        #[must_use]
        pub fn entries(&self) -> Vec<String> {
            self.entries.borrow().clone()
        }

        /// Number of entries
        #[must_use]
        pub fn len(&self) -> usize {
            self.entries.borrow().len()
        }

        /// Returns true if nothing was recorded
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.entries.borrow().is_empty()
        }

        /// Forget every entry
        pub fn clear(&self) {
            self.entries.borrow_mut().clear();
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    use tracing_subscriber::EnvFilter;

    /// Install a test-friendly tracing subscriber
    ///
    /// Honors `RUST_LOG` and falls back to `debug`. Safe to call from every
    /// test; only the first call installs anything.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities
///
/// Helpers for the two laws every reducer should satisfy: unrecognized
/// actions are the identity, and a dispatch sequence equals the left fold
/// of the reducer over it.
pub mod properties {
    use proptest::collection;
    use proptest::strategy::Strategy;
    use unistore_core::{Reducer, Reduction};

    /// Left fold of `reducer` over `actions`, starting at `initial`
    ///
    /// # Errors
    ///
    /// Stops at, and returns, the first reducer error.
    pub fn fold_reduce<R, I>(
        reducer: &R,
        initial: R::State,
        actions: I,
        env: &R::Environment,
    ) -> Result<R::State, R::Error>
    where
        R: Reducer,
        I: IntoIterator<Item = R::Action>,
    {
        actions.into_iter().try_fold(initial, |state, action| {
            let reduction = reducer.reduce(&state, action, env)?;
            Ok(match reduction {
                Reduction::Unchanged => state,
                Reduction::Next(next) => next,
            })
        })
    }

    /// Returns true if `action` leaves `state` untouched
    pub fn is_identity<R: Reducer>(
        reducer: &R,
        state: &R::State,
        action: R::Action,
        env: &R::Environment,
    ) -> bool {
        matches!(reducer.reduce(state, action, env), Ok(Reduction::Unchanged))
    }

    /// Strategy for action sequences of up to `max_len` elements
    pub fn action_sequence<T: Strategy>(
        element: T,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<T::Value>> {
        collection::vec(element, 0..=max_len)
    }
}

// Re-export commonly used items
pub use mocks::{CallLog, RecordingObserver};
pub use reducer_test::ReducerTest;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::properties::{fold_reduce, is_identity};
    use super::*;
    use std::convert::Infallible;
    use std::sync::Arc;
    use unistore_core::{Reduction, reducer_fn};

    #[test]
    fn test_recording_observer_shares_recording() {
        let recorder = RecordingObserver::new();
        let mut observer = recorder.clone().observer();

        observer(&Arc::new("a"));
        observer(&Arc::new("b"));

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.last().as_deref(), Some(&"b"));
    }

    #[test]
    fn test_call_log_order() {
        let log = CallLog::new();
        log.record("setup");
        let mut observer = log.observer::<i32>("observer");
        observer(&Arc::new(1));

        assert_eq!(log.entries(), ["setup", "observer"]);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_fold_and_identity() {
        let adder = reducer_fn(|state: &i32, by: i32, _env: &()| {
            Ok::<_, Infallible>(if by == 0 {
                Reduction::Unchanged
            } else {
                Reduction::Next(state + by)
            })
        });

        assert_eq!(fold_reduce(&adder, 0, [1, 2, 0, 3], &()).unwrap(), 6);
        assert!(is_identity(&adder, &5, 0, &()));
        assert!(!is_identity(&adder, &5, 1, &()));
    }
}
