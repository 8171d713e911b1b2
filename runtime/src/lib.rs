//! # Unistore Runtime
//!
//! Runtime implementation for the unistore state container.
//!
//! This crate provides the [`Store`]: the single owner of an application's
//! state tree, which it replaces only by running dispatched actions through
//! the registered reducer.
//!
//! ## Core Components
//!
//! - **Store**: Holds the current state and mediates reads, dispatches and subscriptions
//! - **Subscription**: Handle that detaches an observer from its store
//! - **Dead Letter Queue**: Failed queued actions, kept for inspection
//! - **Configuration**: Reentrancy policy, limits and naming (`StoreConfig`)
//!
//! ## Execution Model
//!
//! Everything is synchronous and single-threaded. `dispatch` runs the
//! reducer, commits the result and notifies observers before it returns.
//! An observer that dispatches again is queued (or rejected, depending on
//! [`ReentrancyPolicy`]), so actions always reduce in one total order.
//!
//! ## Example
//!
//! ```ignore
//! use unistore_runtime::Store;
//!
//! let store = Store::new(NameState::default(), NameReducer, env);
//!
//! let subscription = store.subscribe(|state| println!("Hello {}", state.name))?;
//!
//! store.dispatch(NameAction::SetName("Ada".into()))?;
//! assert_eq!(store.get_state().name, "Ada");
//!
//! subscription.unsubscribe();
//! store.dispose();
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Store configuration (reentrancy, limits, naming)
pub mod config;

/// Metric names and the Prometheus recorder
pub mod metrics;

/// Observer registry and subscription handles
pub mod subscription;

mod store;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    ///
    /// `E` is the reducer's own error type, carried unchanged in
    /// [`StoreError::Reducer`].
    #[derive(Error, Debug)]
    pub enum StoreError<E> {
        /// The store has been disposed and accepts no further dispatches
        #[error("Store has been disposed")]
        Disposed,

        /// The reducer rejected the action; state is left as it was
        #[error("Reducer failed on action `{action}`: {source}")]
        Reducer {
            /// Tag of the failed action
            action: String,
            /// The reducer's error, unchanged
            #[source]
            source: E,
        },

        /// The reducer panicked; state is left as it was
        #[error("Reducer panicked on action `{action}`: {message}")]
        ReducerPanicked {
            /// Tag of the failed action
            action: String,
            /// Panic payload, if it was a string
            message: String,
        },

        /// A dispatch was attempted from inside a dispatch under the reject policy
        #[error("Dispatch of `{action}` rejected: store is already dispatching")]
        ReentrantDispatch {
            /// Tag of the rejected action
            action: String,
        },

        /// Too many reentrant actions are waiting
        #[error("Dispatch queue is full ({capacity} pending actions)")]
        QueueFull {
            /// Configured queue limit
            capacity: usize,
        },
    }

    impl<E> StoreError<E> {
        /// The reducer's error, if this is a reducer failure
        #[must_use]
        pub const fn reducer_error(&self) -> Option<&E> {
            match self {
                Self::Reducer { source, .. } => Some(source),
                _ => None,
            }
        }

        /// Returns true if the store had been disposed
        #[must_use]
        pub const fn is_disposed(&self) -> bool {
            matches!(self, Self::Disposed)
        }
    }
}

/// Dead letter queue entry
///
/// A queued action that failed after the call that queued it had already
/// returned `Dispatched::Queued`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// Tag of the failed action
    pub action: String,

    /// The error message from the failure
    pub error_message: String,

    /// When the failure was recorded
    pub failed_at: chrono::DateTime<chrono::Utc>,
}

impl DeadLetter {
    /// Create a new dead letter entry stamped with the current time
    fn new(action: String, error_message: String) -> Self {
        Self {
            action,
            error_message,
            failed_at: chrono::Utc::now(),
        }
    }
}

/// Dead Letter Queue for failed queued actions
///
/// # Features
///
/// - Bounded queue with configurable max size (at least one entry)
/// - FIFO ordering (oldest entries dropped when full)
/// - Cheap to clone; clones share the same entries
/// - Metrics tracking for queue size and operations, labelled by store
#[derive(Debug, Clone)]
pub struct DeadLetterQueue {
    queue: Rc<RefCell<VecDeque<DeadLetter>>>,
    store: String,
    max_size: usize,
}

impl DeadLetterQueue {
    /// Create a new dead letter queue for `store` with the given max size
    ///
    /// A `max_size` of zero is raised to one.
    #[must_use]
    pub fn new(store: impl Into<String>, max_size: usize) -> Self {
        Self {
            queue: Rc::new(RefCell::new(VecDeque::new())),
            store: store.into(),
            max_size: max_size.max(1),
        }
    }

    /// Record a failed action
    ///
    /// If the queue is full, the oldest entry is dropped.
    pub fn push(&self, action: impl Into<String>, error_message: impl Into<String>) {
        let mut queue = self.queue.borrow_mut();

        if queue.len() >= self.max_size {
            queue.pop_front();
            ::metrics::counter!(metrics::DLQ_DROPPED_TOTAL, "store" => self.store.clone())
                .increment(1);
            tracing::warn!(
                store = %self.store,
                max_size = self.max_size,
                "DLQ at capacity, dropping oldest entry"
            );
        }

        let entry = DeadLetter::new(action.into(), error_message.into());
        tracing::warn!(
            store = %self.store,
            action = %entry.action,
            error = %entry.error_message,
            queue_size = queue.len() + 1,
            "Action added to dead letter queue"
        );
        queue.push_back(entry);

        // Queue size is bounded by max_size, well within f64's exact range
        #[allow(clippy::cast_precision_loss)]
        ::metrics::gauge!(metrics::DLQ_SIZE, "store" => self.store.clone())
            .set(queue.len() as f64);
        ::metrics::counter!(metrics::DLQ_PUSHED_TOTAL, "store" => self.store.clone())
            .increment(1);
    }

    /// Get the current queue size
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Check if the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Drain all entries from the queue
    pub fn drain(&self) -> Vec<DeadLetter> {
        let entries: Vec<_> = self.queue.borrow_mut().drain(..).collect();
        ::metrics::gauge!(metrics::DLQ_SIZE, "store" => self.store.clone()).set(0.0);
        tracing::debug!(store = %self.store, count = entries.len(), "Drained dead letter queue");
        entries
    }

    /// Peek at the oldest entry without removing it
    #[must_use]
    pub fn peek(&self) -> Option<DeadLetter> {
        self.queue.borrow().front().cloned()
    }

    /// Name of the store this queue belongs to
    #[must_use]
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Get the maximum queue size
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for DeadLetterQueue {
    fn default() -> Self {
        Self::new("default", 100)
    }
}

pub use config::{ConfigError, ReentrancyPolicy, StoreConfig};
pub use error::StoreError;
pub use store::{Dispatched, Lifecycle, Store, WeakStore};
pub use subscription::{Subscription, SubscriptionId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dlq_drops_oldest_when_full() {
        let dlq = DeadLetterQueue::new("names", 2);
        dlq.push("A", "first");
        dlq.push("B", "second");
        dlq.push("C", "third");

        assert_eq!(dlq.len(), 2);
        assert_eq!(dlq.peek().map(|d| d.action), Some("B".to_string()));

        let drained = dlq.drain();
        let actions: Vec<_> = drained.iter().map(|d| d.action.as_str()).collect();
        assert_eq!(actions, ["B", "C"]);
        assert!(dlq.is_empty());
    }

    #[test]
    fn test_dlq_clones_share_entries() {
        let dlq = DeadLetterQueue::default();
        let clone = dlq.clone();
        clone.push("SET_NAME", "too long");

        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq.max_size(), 100);
        assert_eq!(dlq.store(), "default");
    }

    #[test]
    fn test_dlq_zero_capacity_holds_one_entry() {
        let dlq = DeadLetterQueue::new("names", 0);
        assert_eq!(dlq.max_size(), 1);

        dlq.push("A", "first");
        dlq.push("B", "second");

        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq.peek().map(|d| d.action), Some("B".to_string()));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_dlq_metrics_are_labelled_by_store() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            let names = DeadLetterQueue::new("names", 10);
            let todos = DeadLetterQueue::new("todos", 10);
            names.push("SET_NAME", "too long");
            names.push("SET_NAME", "too long");
            todos.push("ADD_TODO", "disposed");
        });

        let rendered = handle.render();
        let size_of = |store: &str| {
            rendered
                .lines()
                .find(|line| {
                    line.starts_with(metrics::DLQ_SIZE)
                        && line.contains(&format!("store=\"{store}\""))
                })
                .and_then(|line| line.rsplit(' ').next())
                .and_then(|value| value.parse::<f64>().ok())
        };
        assert_eq!(size_of("names"), Some(2.0));
        assert_eq!(size_of("todos"), Some(1.0));
    }

    #[test]
    fn test_store_error_accessors() {
        let error: StoreError<std::fmt::Error> = StoreError::Reducer {
            action: "BOOM".to_string(),
            source: std::fmt::Error,
        };
        assert!(error.reducer_error().is_some());
        assert!(!error.is_disposed());
        assert_eq!(
            error.to_string(),
            "Reducer failed on action `BOOM`: an error occurred when formatting an argument"
        );

        let disposed: StoreError<std::fmt::Error> = StoreError::Disposed;
        assert!(disposed.is_disposed());
        assert!(disposed.reducer_error().is_none());
    }
}
