//! # Unistore Core
//!
//! Core traits and types for the unistore state container.
//!
//! This crate provides the fundamental abstractions for building applications
//! around a single, immutable state tree that changes only through actions
//! passed to pure reducers.
//!
//! ## Core Concepts
//!
//! - **State**: Immutable value tree owned by a store
//! - **Action**: Tagged description of an intended state change
//! - **Reducer**: Pure function `(State, Action, Environment) → Reduction`
//! - **Reduction**: Either the next state or "unchanged"
//! - **Environment**: Injected dependencies handed to the reducer
//!
//! ## Architecture Principles
//!
//! - Unidirectional Data Flow
//! - Immutable state, replaced rather than mutated
//! - Dependency Injection via Environment
//! - Unrecognized actions are no-ops, not errors
//!
//! ## Example
//!
//! ```
//! use unistore_core::{Action, Reducer, Reduction};
//! use std::convert::Infallible;
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct NameState {
//!     name: String,
//! }
//!
//! enum NameAction {
//!     SetName(String),
//! }
//!
//! impl Action for NameAction {
//!     fn tag(&self) -> &str {
//!         "SET_NAME"
//!     }
//! }
//!
//! struct NameReducer;
//!
//! impl Reducer for NameReducer {
//!     type State = NameState;
//!     type Action = NameAction;
//!     type Environment = ();
//!     type Error = Infallible;
//!
//!     fn reduce(
//!         &self,
//!         _state: &NameState,
//!         action: NameAction,
//!         _env: &(),
//!     ) -> Result<Reduction<NameState>, Infallible> {
//!         match action {
//!             NameAction::SetName(name) => Ok(Reduction::Next(NameState { name })),
//!         }
//!     }
//! }
//!
//! let next = NameReducer
//!     .reduce(&NameState::default(), NameAction::SetName("Ada".into()), &())
//!     .map(|r| r.resolve(&NameState::default()));
//! assert_eq!(next.ok(), Some(NameState { name: "Ada".into() }));
//! ```

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};

/// Reducer composition utilities (combine, scope)
pub mod composition;

/// Reducer over serialized `{ "type", "payload" }` actions
pub mod decoding;

/// Action module - Tagged descriptions of intended state changes
///
/// Every action exposes a tag (its discriminant). Typed action enums usually
/// derive their tags with `#[derive(Action)]` from `unistore-macros`; the
/// serialized form used at process boundaries is [`action::AnyAction`].
pub mod action {
    use serde::{Deserialize, Serialize, de::DeserializeOwned};

    /// An action - a tagged value identifying an intent
    ///
    /// The tag is the discriminant used for logging, metrics and for
    /// decoding serialized actions. Payload lives in the implementing type.
    pub trait Action {
        /// The action's type tag, e.g. `"SET_NAME"`
        fn tag(&self) -> &str;
    }

    /// The complete, declared set of tags an action type can carry
    ///
    /// Implemented by `#[derive(Action)]`. Used to tell an unrecognized
    /// serialized action (a no-op) apart from a malformed one (an error).
    pub trait ActionVocabulary: Action + Sized {
        /// Every tag this action type declares
        const TAGS: &'static [&'static str];

        /// Check whether `tag` belongs to this vocabulary
        #[must_use]
        fn recognizes(tag: &str) -> bool {
            Self::TAGS.contains(&tag)
        }
    }

    /// Serialized action: a type tag plus an optional payload
    ///
    /// ```
    /// use unistore_core::action::AnyAction;
    ///
    /// let action: AnyAction = serde_json::from_str(r#"{"type":"SET_NAME","payload":"Ada"}"#)?;
    /// assert_eq!(action.kind, "SET_NAME");
    /// # Ok::<(), serde_json::Error>(())
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct AnyAction {
        /// The action's type tag
        #[serde(rename = "type")]
        pub kind: String,

        /// Optional payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub payload: Option<serde_json::Value>,
    }

    impl AnyAction {
        /// Create an action without payload
        #[must_use]
        pub fn new(kind: impl Into<String>) -> Self {
            Self {
                kind: kind.into(),
                payload: None,
            }
        }

        /// Create an action carrying a payload
        #[must_use]
        pub fn with_payload(kind: impl Into<String>, payload: serde_json::Value) -> Self {
            Self {
                kind: kind.into(),
                payload: Some(payload),
            }
        }

        /// Decode into a typed action
        ///
        /// The typed action must be serde-tagged with `type`/`payload`
        /// (`#[serde(tag = "type", content = "payload")]`).
        ///
        /// # Returns
        ///
        /// - `Ok(None)` if the tag is not part of `A`'s vocabulary
        /// - `Ok(Some(action))` if it decoded
        ///
        /// # Errors
        ///
        /// Returns the serde error if the tag is known but the payload does
        /// not match the variant.
        pub fn decode<A>(&self) -> Result<Option<A>, serde_json::Error>
        where
            A: ActionVocabulary + DeserializeOwned,
        {
            if !A::recognizes(&self.kind) {
                return Ok(None);
            }

            let mut object = serde_json::Map::new();
            object.insert("type".to_string(), serde_json::Value::String(self.kind.clone()));
            if let Some(payload) = &self.payload {
                object.insert("payload".to_string(), payload.clone());
            }

            serde_json::from_value(serde_json::Value::Object(object)).map(Some)
        }
    }

    impl Action for AnyAction {
        fn tag(&self) -> &str {
            &self.kind
        }
    }
}

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → Reduction`
///
/// They read the current state by reference and return a new value, so a
/// failing reducer can never leave a half-updated state behind.
pub mod reducer {
    use std::sync::Arc;

    /// Outcome of a single reduction
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Reduction<S> {
        /// The input state is the result (reference-equal, nothing to commit)
        Unchanged,

        /// A new state value replaces the input
        Next(S),
    }

    impl<S> Reduction<S> {
        /// Returns true if the reduction left the state untouched
        #[must_use]
        pub const fn is_unchanged(&self) -> bool {
            matches!(self, Self::Unchanged)
        }

        /// The new state, if any
        #[must_use]
        pub fn into_next(self) -> Option<S> {
            match self {
                Self::Unchanged => None,
                Self::Next(state) => Some(state),
            }
        }

        /// Map the new state, keeping `Unchanged` as is
        #[must_use]
        pub fn map<T>(self, f: impl FnOnce(S) -> T) -> Reduction<T> {
            match self {
                Self::Unchanged => Reduction::Unchanged,
                Self::Next(state) => Reduction::Next(f(state)),
            }
        }

        /// Resolve against the input state, cloning it when unchanged
        #[must_use]
        pub fn resolve(self, current: &S) -> S
        where
            S: Clone,
        {
            match self {
                Self::Unchanged => current.clone(),
                Self::Next(state) => state,
            }
        }

        /// Resolve against a shared state without cloning the value
        ///
        /// `Unchanged` hands back the same allocation, so
        /// `Arc::ptr_eq(&current, &result)` holds.
        #[must_use]
        pub fn apply(self, current: &Arc<S>) -> Arc<S> {
            match self {
                Self::Unchanged => Arc::clone(current),
                Self::Next(state) => Arc::new(state),
            }
        }
    }

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state tree this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Error`: Why a reduction can fail (`Infallible` for total reducers)
    ///
    /// # Contract
    ///
    /// - Deterministic: same input, same output
    /// - Total over the declared actions; anything it does not handle
    ///   returns `Ok(Reduction::Unchanged)`
    /// - No side effects
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// The error type returned when a reduction fails
        type Error: std::error::Error + Send + Sync + 'static;

        /// Reduce an action against the current state
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action cannot be applied. The
        /// caller keeps the input state in that case.
        fn reduce(
            &self,
            state: &Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<Reduction<Self::State>, Self::Error>;

        /// Whether `action` belongs to the vocabulary this reducer handles
        ///
        /// Reducers over open-ended action types (serialized actions) use
        /// this to tell callers which tags they will ignore. Defaults to `true`.
        fn recognizes(&self, _action: &Self::Action) -> bool {
            true
        }
    }

    impl<R> Reducer for Box<R>
    where
        R: Reducer + ?Sized,
    {
        type State = R::State;
        type Action = R::Action;
        type Environment = R::Environment;
        type Error = R::Error;

        fn reduce(
            &self,
            state: &Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<Reduction<Self::State>, Self::Error> {
            (**self).reduce(state, action, env)
        }

        fn recognizes(&self, action: &Self::Action) -> bool {
            (**self).recognizes(action)
        }
    }

    /// Boxed reducer, handy when the concrete reducer is swapped at runtime
    pub type BoxedReducer<S, A, E, Err> =
        Box<dyn Reducer<State = S, Action = A, Environment = E, Error = Err>>;

    /// A reducer backed by a closure
    ///
    /// Created by [`reducer_fn`].
    pub struct FnReducer<S, A, E, Err, F> {
        f: F,
        _phantom: std::marker::PhantomData<fn(&S, A, &E) -> Result<Reduction<S>, Err>>,
    }

    /// Turn a closure into a reducer
    ///
    /// ```
    /// use unistore_core::{Reducer, Reduction, reducer_fn};
    /// use std::convert::Infallible;
    ///
    /// let doubler = reducer_fn(|state: &i64, by: i64, _env: &()| {
    ///     Ok::<_, Infallible>(Reduction::Next(state * by))
    /// });
    ///
    /// assert_eq!(doubler.reduce(&21, 2, &()).ok(), Some(Reduction::Next(42)));
    /// ```
    pub const fn reducer_fn<S, A, E, Err, F>(f: F) -> FnReducer<S, A, E, Err, F>
    where
        F: Fn(&S, A, &E) -> Result<Reduction<S>, Err>,
        Err: std::error::Error + Send + Sync + 'static,
    {
        FnReducer {
            f,
            _phantom: std::marker::PhantomData,
        }
    }

    impl<S, A, E, Err, F> Reducer for FnReducer<S, A, E, Err, F>
    where
        F: Fn(&S, A, &E) -> Result<Reduction<S>, Err>,
        Err: std::error::Error + Send + Sync + 'static,
    {
        type State = S;
        type Action = A;
        type Environment = E;
        type Error = Err;

        fn reduce(&self, state: &S, action: A, env: &E) -> Result<Reduction<S>, Err> {
            (self.f)(state, action, env)
        }
    }

    impl<S, A, E, Err, F: Clone> Clone for FnReducer<S, A, E, Err, F> {
        fn clone(&self) -> Self {
            Self {
                f: self.f.clone(),
                _phantom: std::marker::PhantomData,
            }
        }
    }

    impl<S, A, E, Err, F> std::fmt::Debug for FnReducer<S, A, E, Err, F> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("FnReducer").finish_non_exhaustive()
        }
    }
}

pub use action::{Action, ActionVocabulary, AnyAction};
pub use reducer::{BoxedReducer, FnReducer, Reducer, Reduction, reducer_fn};
