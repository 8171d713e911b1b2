//! The Store: owner of the state tree.

use crate::config::{ConfigError, ReentrancyPolicy, StoreConfig};
use crate::error::StoreError;
use crate::metrics::{
    DISPATCH_FAILED_TOTAL, DISPATCH_QUEUED_TOTAL, DISPATCH_TOTAL, DISPOSED_TOTAL,
    REDUCE_DURATION_SECONDS, STATE_COMMITTED_TOTAL, UNRECOGNIZED_ACTION,
};
use crate::subscription::{ObserverRegistry, Subscription};
use crate::DeadLetterQueue;
use metrics::{counter, histogram};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Instant;
use unistore_core::{Action, Reducer, Reduction};

/// Store lifecycle
///
/// A store starts `Initialized` and moves to `Disposed` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Accepting dispatches and subscriptions
    Initialized,
    /// Shut down; only reads succeed
    Disposed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// Outcome of a successful [`Store::dispatch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dispatched {
    /// The reducer produced a new state, which was committed and broadcast
    Applied,
    /// The reducer left the state as it was
    Unchanged,
    /// Dispatched from inside a dispatch; will be reduced before the
    /// outermost `dispatch` call returns
    Queued,
}

struct Inner<S, A, E, R> {
    state: RefCell<Arc<S>>,
    reducer: RefCell<R>,
    environment: E,
    observers: Rc<ObserverRegistry<S>>,
    lifecycle: Cell<Lifecycle>,
    dispatching: Cell<bool>,
    queue: RefCell<VecDeque<A>>,
    dead_letters: DeadLetterQueue,
    config: StoreConfig,
}

/// The Store - holds the current state and runs actions through the reducer
///
/// # Type Parameters
///
/// - `S`: State type
/// - `A`: Action type
/// - `E`: Environment type
/// - `R`: Reducer type
///
/// `Store` is a cheap handle: clones share the same state, observers and
/// reducer. It is single-threaded (`!Send`); observers that need to reach
/// back into the store should capture a [`WeakStore`].
pub struct Store<S, A, E, R> {
    inner: Rc<Inner<S, A, E, R>>,
}

impl<S, A, E, R> Store<S, A, E, R>
where
    S: 'static,
    A: Action,
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new store with the default configuration
    ///
    /// # Arguments
    ///
    /// - `initial_state`: The starting state
    /// - `reducer`: The reducer implementation
    /// - `environment`: Injected dependencies
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::build(initial_state, reducer, environment, StoreConfig::default())
    }

    /// Create a new store with an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `config` fails
    /// [`StoreConfig::validate`].
    pub fn with_config(
        initial_state: S,
        reducer: R,
        environment: E,
        config: StoreConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(initial_state, reducer, environment, config))
    }

    fn build(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
        tracing::debug!(store = %config.name, reentrancy = %config.reentrancy, "Store initialized");

        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(Arc::new(initial_state)),
                reducer: RefCell::new(reducer),
                environment,
                observers: Rc::new(ObserverRegistry::new(config.name.clone())),
                lifecycle: Cell::new(Lifecycle::Initialized),
                dispatching: Cell::new(false),
                queue: RefCell::new(VecDeque::new()),
                dead_letters: DeadLetterQueue::new(config.name.clone(), config.dlq_max_size),
                config,
            }),
        }
    }

    /// Dispatch an action
    ///
    /// Runs the reducer against the current state. A new state is committed
    /// and then passed to every current observer, in subscription order,
    /// before this returns.
    ///
    /// Called from an observer, the action is handled according to
    /// [`ReentrancyPolicy`]: queued behind the running dispatch (and reduced
    /// before the outermost `dispatch` returns) or rejected.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Disposed`] after [`Store::dispose`]
    /// - [`StoreError::Reducer`] if the reducer returned an error
    /// - [`StoreError::ReducerPanicked`] if the reducer panicked
    /// - [`StoreError::ReentrantDispatch`] / [`StoreError::QueueFull`] for
    ///   dispatches made during a dispatch
    ///
    /// The committed state is untouched on every error path.
    #[tracing::instrument(
        skip_all,
        name = "store_dispatch",
        fields(store = %self.inner.config.name, action = %action.tag())
    )]
    pub fn dispatch(&self, action: A) -> Result<Dispatched, StoreError<R::Error>> {
        if self.is_disposed() {
            tracing::warn!("Rejected action: store is disposed");
            self.record_failure("disposed");
            return Err(StoreError::Disposed);
        }

        if self.inner.dispatching.get() {
            return self.enqueue(action);
        }

        let _guard = DispatchGuard::enter(
            &self.inner.dispatching,
            &self.inner.queue,
            &self.inner.dead_letters,
        );

        let outcome = self.reduce_and_notify(action);
        self.drain_queue();
        outcome
    }

    /// Current state
    ///
    /// Cheap: clones the `Arc`, never the state. Still answers after disposal.
    #[must_use]
    pub fn get_state(&self) -> Arc<S> {
        Arc::clone(&self.inner.state.borrow())
    }

    /// Read the current state through a closure
    ///
    /// # Example
    ///
    /// ```ignore
    /// let name = store.state(|s| s.name.clone());
    /// ```
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.get_state();
        f(&state)
    }

    /// Register an observer
    ///
    /// The observer is called after every committed state change, with the
    /// new state. Registering during a notification pass takes effect from
    /// the next dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Disposed`] after [`Store::dispose`].
    pub fn subscribe<F>(&self, observer: F) -> Result<Subscription<S>, StoreError<R::Error>>
    where
        F: FnMut(&Arc<S>) + 'static,
    {
        if self.is_disposed() {
            return Err(StoreError::Disposed);
        }

        let id = self.inner.observers.add(Rc::new(RefCell::new(observer)));
        tracing::debug!(store = %self.inner.config.name, subscription = %id, "Observer subscribed");

        Ok(Subscription::new(id, Rc::downgrade(&self.inner.observers)))
    }

    /// Register an observer of a projection of the state
    ///
    /// `observer` receives `selector(state)` after a commit only when it
    /// differs from the last value delivered. The projection at
    /// subscription time counts as delivered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Disposed`] after [`Store::dispose`].
    pub fn subscribe_selector<T, Sel, F>(
        &self,
        selector: Sel,
        mut observer: F,
    ) -> Result<Subscription<S>, StoreError<R::Error>>
    where
        T: PartialEq + 'static,
        Sel: Fn(&S) -> T + 'static,
        F: FnMut(&T) + 'static,
    {
        let mut last = self.state(&selector);

        self.subscribe(move |state| {
            let next = selector(state);
            if next != last {
                observer(&next);
                last = next;
            }
        })
    }

    /// Swap the active reducer, returning the previous one
    ///
    /// State is left as it is; the next dispatch uses the new reducer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Disposed`] after [`Store::dispose`].
    pub fn replace_reducer(&self, reducer: R) -> Result<R, StoreError<R::Error>> {
        if self.is_disposed() {
            return Err(StoreError::Disposed);
        }

        let previous = self.inner.reducer.replace(reducer);
        tracing::info!(store = %self.inner.config.name, "Reducer replaced");
        Ok(previous)
    }

    /// Dispose the store
    ///
    /// Drops every observer. Actions still queued are recorded as dead
    /// letters. Later dispatches, subscriptions and reducer replacements
    /// fail with [`StoreError::Disposed`]. Calling this twice is a no-op.
    pub fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        self.inner.lifecycle.set(Lifecycle::Disposed);

        let abandoned = std::mem::take(&mut *self.inner.queue.borrow_mut());
        for action in &abandoned {
            self.inner
                .dead_letters
                .push(action.tag(), "store disposed before the action was reduced");
        }
        drop(abandoned);

        let observers = self.inner.observers.len();
        self.inner.observers.clear();

        counter!(DISPOSED_TOTAL, "store" => self.inner.config.name.clone()).increment(1);
        tracing::info!(store = %self.inner.config.name, observers, "Store disposed");
    }

    /// Current lifecycle state
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.get()
    }

    /// Returns true once [`Store::dispose`] has run
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle() == Lifecycle::Disposed
    }

    /// Number of registered observers
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    /// Failed queued actions
    ///
    /// The returned queue shares its entries with the store.
    #[must_use]
    pub fn dead_letters(&self) -> DeadLetterQueue {
        self.inner.dead_letters.clone()
    }

    /// The store's configuration
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// The environment handed to the reducer
    #[must_use]
    pub fn environment(&self) -> &E {
        &self.inner.environment
    }

    /// Snapshot of the current state as JSON
    ///
    /// # Errors
    ///
    /// Returns the serde error if the state fails to serialize.
    pub fn state_json(&self) -> serde_json::Result<serde_json::Value>
    where
        S: serde::Serialize,
    {
        serde_json::to_value(&*self.get_state())
    }

    /// A non-owning handle, for observers that dispatch back into the store
    #[must_use]
    pub fn downgrade(&self) -> WeakStore<S, A, E, R> {
        WeakStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn enqueue(&self, action: A) -> Result<Dispatched, StoreError<R::Error>> {
        let config = &self.inner.config;

        match config.reentrancy {
            ReentrancyPolicy::Reject => {
                tracing::warn!("Rejected reentrant dispatch");
                self.record_failure("reentrant");
                Err(StoreError::ReentrantDispatch {
                    action: action.tag().to_owned(),
                })
            },
            ReentrancyPolicy::Queue => {
                let mut queue = self.inner.queue.borrow_mut();
                if queue.len() >= config.max_queued_actions {
                    tracing::warn!(capacity = config.max_queued_actions, "Dispatch queue full");
                    drop(queue);
                    self.record_failure("queue_full");
                    return Err(StoreError::QueueFull {
                        capacity: config.max_queued_actions,
                    });
                }

                queue.push_back(action);
                tracing::debug!(pending = queue.len(), "Queued reentrant dispatch");
                counter!(DISPATCH_QUEUED_TOTAL, "store" => config.name.clone()).increment(1);
                Ok(Dispatched::Queued)
            },
        }
    }

    /// Reduce queued actions in FIFO order until none are left
    fn drain_queue(&self) {
        loop {
            let next = self.inner.queue.borrow_mut().pop_front();
            let Some(action) = next else {
                break;
            };

            let tag = action.tag().to_owned();
            let span = tracing::debug_span!("store_queued", action = %tag);
            let _entered = span.enter();

            if let Err(error) = self.reduce_and_notify(action) {
                tracing::error!(error = %error, "Queued action failed");
                self.inner.dead_letters.push(tag, error.to_string());
            }
        }
    }

    fn reduce_and_notify(&self, action: A) -> Result<Dispatched, StoreError<R::Error>> {
        let inner = &*self.inner;
        let tag = action.tag().to_owned();
        let label = if inner.reducer.borrow().recognizes(&action) {
            tag.clone()
        } else {
            UNRECOGNIZED_ACTION.to_owned()
        };
        counter!(DISPATCH_TOTAL, "store" => inner.config.name.clone(), "action" => label)
            .increment(1);

        let current = self.get_state();
        let started = Instant::now();
        let result = self.reduce(&current, action, &tag);
        histogram!(REDUCE_DURATION_SECONDS, "store" => inner.config.name.clone())
            .record(started.elapsed().as_secs_f64());

        let reduction = match result {
            Ok(reduction) => reduction,
            Err(error) => {
                tracing::warn!(error = %error, "Reducer failed, state unchanged");
                self.record_failure(match error {
                    StoreError::ReducerPanicked { .. } => "panic",
                    _ => "reducer",
                });
                return Err(error);
            },
        };

        let dispatched = match reduction {
            Reduction::Unchanged => {
                tracing::trace!("Reducer left state unchanged");
                if !inner.config.notify_on_unchanged {
                    return Ok(Dispatched::Unchanged);
                }
                Dispatched::Unchanged
            },
            Reduction::Next(next) => {
                *inner.state.borrow_mut() = Arc::new(next);
                counter!(STATE_COMMITTED_TOTAL, "store" => inner.config.name.clone())
                    .increment(1);
                tracing::debug!("State committed");
                Dispatched::Applied
            },
        };

        self.notify();
        Ok(dispatched)
    }

    fn reduce(
        &self,
        current: &S,
        action: A,
        tag: &str,
    ) -> Result<Reduction<S>, StoreError<R::Error>> {
        let reducer = self.inner.reducer.borrow();
        let env = &self.inner.environment;

        let result = if self.inner.config.catch_reducer_panics {
            panic::catch_unwind(AssertUnwindSafe(|| reducer.reduce(current, action, env))).map_err(
                |payload| StoreError::ReducerPanicked {
                    action: tag.to_owned(),
                    message: panic_message(payload.as_ref()),
                },
            )?
        } else {
            reducer.reduce(current, action, env)
        };

        result.map_err(|source| StoreError::Reducer {
            action: tag.to_owned(),
            source,
        })
    }

    /// One notification pass over the observers registered right now
    fn notify(&self) {
        let state = self.get_state();
        let observers = self.inner.observers.snapshot();
        tracing::trace!(observers = observers.len(), "Notifying observers");

        for observer in observers {
            // An observer may dispose the store mid-pass
            if self.is_disposed() {
                break;
            }
            (&mut *observer.borrow_mut())(&state);
        }
    }

    fn record_failure(&self, reason: &'static str) {
        counter!(
            DISPATCH_FAILED_TOTAL,
            "store" => self.inner.config.name.clone(),
            "reason" => reason
        )
        .increment(1);
    }
}

impl<S, A, E, R> Clone for Store<S, A, E, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S, A, E, R> fmt::Debug for Store<S, A, E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.config.name)
            .field("lifecycle", &self.inner.lifecycle.get())
            .field("dispatching", &self.inner.dispatching.get())
            .finish_non_exhaustive()
    }
}

/// Non-owning handle to a [`Store`]
///
/// Created by [`Store::downgrade`].
pub struct WeakStore<S, A, E, R> {
    inner: Weak<Inner<S, A, E, R>>,
}

impl<S, A, E, R> WeakStore<S, A, E, R> {
    /// The store, if any strong handle is still alive
    #[must_use]
    pub fn upgrade(&self) -> Option<Store<S, A, E, R>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl<S, A, E, R> Clone for WeakStore<S, A, E, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S, A, E, R> fmt::Debug for WeakStore<S, A, E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Marks a dispatch in progress
///
/// Clears the flag on every exit, unwinding included. Actions still queued
/// at that point belong to a dispatch that panicked; they are recorded as
/// dead letters.
struct DispatchGuard<'a, A: Action> {
    dispatching: &'a Cell<bool>,
    queue: &'a RefCell<VecDeque<A>>,
    dead_letters: &'a DeadLetterQueue,
}

impl<'a, A: Action> DispatchGuard<'a, A> {
    fn enter(
        dispatching: &'a Cell<bool>,
        queue: &'a RefCell<VecDeque<A>>,
        dead_letters: &'a DeadLetterQueue,
    ) -> Self {
        dispatching.set(true);
        Self {
            dispatching,
            queue,
            dead_letters,
        }
    }
}

impl<A: Action> Drop for DispatchGuard<'_, A> {
    fn drop(&mut self) {
        self.dispatching.set(false);

        let abandoned = std::mem::take(&mut *self.queue.borrow_mut());
        if abandoned.is_empty() {
            return;
        }

        tracing::error!(
            count = abandoned.len(),
            "Dispatch aborted by a panic with actions still queued"
        );
        for action in &abandoned {
            self.dead_letters.push(
                action.tag(),
                "dispatch aborted by a panic before the action was reduced",
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
