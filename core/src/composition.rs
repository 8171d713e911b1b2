//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers in various ways:
//! - **`combine_reducers`**: Run multiple reducers on the same state/action
//! - **`scope_reducer`**: Focus a reducer on a subset of state
//!
//! Scoping is how a root state is assembled from feature slices, each
//! owned by its own reducer, the way a keyed root reducer map would.
//!
//! # Examples
//!
//! ## Combining Reducers
//!
//! ```
//! use unistore_core::{Reducer, Reduction};
//! use unistore_core::composition::combine_reducers;
//! use std::convert::Infallible;
//!
//! #[derive(Clone, Default)]
//! struct AppState {
//!     counter: i32,
//!     logged: bool,
//! }
//!
//! #[derive(Clone)]
//! enum AppAction {
//!     Increment,
//!     Log,
//! }
//!
//! struct CounterReducer;
//! struct LoggingReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = AppState;
//!     type Action = AppAction;
//!     type Environment = ();
//!     type Error = Infallible;
//!
//!     fn reduce(&self, state: &AppState, action: AppAction, _env: &()) -> Result<Reduction<AppState>, Infallible> {
//!         Ok(match action {
//!             AppAction::Increment => Reduction::Next(AppState { counter: state.counter + 1, ..state.clone() }),
//!             AppAction::Log => Reduction::Unchanged,
//!         })
//!     }
//! }
//!
//! impl Reducer for LoggingReducer {
//!     type State = AppState;
//!     type Action = AppAction;
//!     type Environment = ();
//!     type Error = Infallible;
//!
//!     fn reduce(&self, state: &AppState, action: AppAction, _env: &()) -> Result<Reduction<AppState>, Infallible> {
//!         Ok(match action {
//!             AppAction::Log => Reduction::Next(AppState { logged: true, ..state.clone() }),
//!             AppAction::Increment => Reduction::Unchanged,
//!         })
//!     }
//! }
//!
//! let combined = combine_reducers(vec![Box::new(CounterReducer), Box::new(LoggingReducer)]);
//!
//! let state = AppState::default();
//! let next = combined.reduce(&state, AppAction::Increment, &()).map(|r| r.resolve(&state));
//! assert_eq!(next.map(|s| s.counter).ok(), Some(1));
//! ```

use crate::reducer::{BoxedReducer, Reducer, Reduction};

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer runs in sequence and sees the state produced by the one
/// before it. The combined result is `Unchanged` only when every reducer
/// left the state alone. The first error aborts the whole reduction, so
/// partial results are never committed.
///
/// # Type Parameters
///
/// - `S`: The state type
/// - `A`: The action type
/// - `E`: The environment type
/// - `Err`: The shared error type
#[must_use]
pub fn combine_reducers<S, A, E, Err>(
    reducers: Vec<BoxedReducer<S, A, E, Err>>,
) -> CombinedReducer<S, A, E, Err>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
    Err: std::error::Error + Send + Sync + 'static,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A, E, Err>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
    Err: std::error::Error + Send + Sync + 'static,
{
    reducers: Vec<BoxedReducer<S, A, E, Err>>,
}

impl<S, A, E, Err> CombinedReducer<S, A, E, Err>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
    Err: std::error::Error + Send + Sync + 'static,
{
    /// Number of reducers in the chain
    #[must_use]
    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    /// Returns true if no reducers were combined
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S, A, E, Err> Reducer for CombinedReducer<S, A, E, Err>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
    Err: std::error::Error + Send + Sync + 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;
    type Error = Err;

    fn reduce(
        &self,
        state: &Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Reduction<Self::State>, Self::Error> {
        let mut latest: Option<S> = None;

        for reducer in &self.reducers {
            let input = latest.as_ref().unwrap_or(state);
            if let Reduction::Next(next) = reducer.reduce(input, action.clone(), env)? {
                latest = Some(next);
            }
        }

        Ok(latest.map_or(Reduction::Unchanged, Reduction::Next))
    }
}

/// Scopes a reducer to operate on a subset of a larger state.
///
/// This allows you to reuse reducers designed for smaller state types
/// within a larger application state.
///
/// # Arguments
///
/// - `reducer`: The child reducer
/// - `get_state`: Borrow the child's slice out of the parent
/// - `set_state`: Build a new parent with the child's slice replaced
/// - `extract_action`: Map a parent action to a child action; `None` means
///   the child does not handle it and the parent stays `Unchanged`
///
/// # Examples
///
/// ```
/// use unistore_core::{Reducer, Reduction};
/// use unistore_core::composition::scope_reducer;
/// use std::convert::Infallible;
///
/// #[derive(Clone, Default)]
/// struct CounterState {
///     count: i32,
/// }
///
/// struct CounterReducer;
///
/// impl Reducer for CounterReducer {
///     type State = CounterState;
///     type Action = i32;
///     type Environment = ();
///     type Error = Infallible;
///
///     fn reduce(&self, state: &CounterState, by: i32, _env: &()) -> Result<Reduction<CounterState>, Infallible> {
///         Ok(Reduction::Next(CounterState { count: state.count + by }))
///     }
/// }
///
/// #[derive(Clone, Default)]
/// struct AppState {
///     counter: CounterState,
///     title: String,
/// }
///
/// enum AppAction {
///     Add(i32),
///     Rename(String),
/// }
///
/// let scoped = scope_reducer(
///     CounterReducer,
///     |app: &AppState| &app.counter,
///     |app: &AppState, counter: CounterState| AppState { counter, ..app.clone() },
///     |action: AppAction| match action {
///         AppAction::Add(by) => Some(by),
///         AppAction::Rename(_) => None,
///     },
/// );
///
/// let state = AppState::default();
/// let next = scoped.reduce(&state, AppAction::Add(3), &()).map(|r| r.resolve(&state));
/// assert_eq!(next.map(|s| s.counter.count).ok(), Some(3));
/// ```
pub fn scope_reducer<S, SubS, A, SubA, E, R>(
    reducer: R,
    get_state: fn(&S) -> &SubS,
    set_state: fn(&S, SubS) -> S,
    extract_action: fn(A) -> Option<SubA>,
) -> ScopedReducer<S, SubS, A, SubA, E, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
{
    ScopedReducer {
        reducer,
        get_state,
        set_state,
        extract_action,
        _phantom: std::marker::PhantomData,
    }
}

/// A scoped reducer that operates on a subset of state.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, SubS, A, SubA, E, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
{
    reducer: R,
    get_state: fn(&S) -> &SubS,
    set_state: fn(&S, SubS) -> S,
    extract_action: fn(A) -> Option<SubA>,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<S, SubS, A, SubA, E, R> Reducer for ScopedReducer<S, SubS, A, SubA, E, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
{
    type State = S;
    type Action = A;
    type Environment = E;
    type Error = R::Error;

    fn reduce(
        &self,
        state: &Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Reduction<Self::State>, Self::Error> {
        let Some(local) = (self.extract_action)(action) else {
            return Ok(Reduction::Unchanged);
        };

        let reduction = self.reducer.reduce((self.get_state)(state), local, env)?;
        Ok(reduction.map(|sub| (self.set_state)(state, sub)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct TestState {
        counter: i32,
        name: String,
    }

    #[derive(Clone)]
    enum TestAction {
        Increment,
        Decrement,
        SetName(String),
    }

    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();
        type Error = Infallible;

        fn reduce(
            &self,
            state: &Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> Result<Reduction<Self::State>, Self::Error> {
            Ok(match action {
                TestAction::Increment => Reduction::Next(TestState {
                    counter: state.counter + 1,
                    ..state.clone()
                }),
                TestAction::Decrement => Reduction::Next(TestState {
                    counter: state.counter - 1,
                    ..state.clone()
                }),
                TestAction::SetName(_) => Reduction::Unchanged,
            })
        }
    }

    struct NameReducer;

    impl Reducer for NameReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();
        type Error = Infallible;

        fn reduce(
            &self,
            state: &Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> Result<Reduction<Self::State>, Self::Error> {
            Ok(match action {
                TestAction::SetName(name) => Reduction::Next(TestState {
                    name,
                    ..state.clone()
                }),
                _ => Reduction::Unchanged,
            })
        }
    }

    fn settle<S: Clone>(state: &S, result: Result<Reduction<S>, Infallible>) -> S {
        match result {
            Ok(reduction) => reduction.resolve(state),
            Err(never) => match never {},
        }
    }

    fn run<R>(reducer: &R, state: &TestState, action: TestAction) -> TestState
    where
        R: Reducer<State = TestState, Action = TestAction, Environment = (), Error = Infallible>,
    {
        settle(state, reducer.reduce(state, action, &()))
    }

    #[test]
    fn test_combine_reducers() {
        let combined = combine_reducers(vec![Box::new(CounterReducer), Box::new(NameReducer)]);
        assert_eq!(combined.len(), 2);

        let state = TestState::default();

        let state = run(&combined, &state, TestAction::Increment);
        assert_eq!(state.counter, 1);

        let state = run(&combined, &state, TestAction::SetName("Alice".to_string()));
        assert_eq!(state.name, "Alice");

        let state = run(&combined, &state, TestAction::Decrement);
        assert_eq!(state.counter, 0);
        assert_eq!(state.name, "Alice");
    }

    #[test]
    fn test_combined_reducers_chain_intermediate_state() {
        // Both reducers move the counter; the second must see the first's output.
        let combined = combine_reducers(vec![Box::new(CounterReducer), Box::new(CounterReducer)]);

        let state = run(&combined, &TestState::default(), TestAction::Increment);
        assert_eq!(state.counter, 2);
    }

    #[test]
    fn test_combined_unchanged_when_no_reducer_handles_action() {
        let combined: CombinedReducer<TestState, TestAction, (), Infallible> =
            combine_reducers(vec![Box::new(CounterReducer)]);

        let result = combined.reduce(&TestState::default(), TestAction::SetName("x".into()), &());
        assert!(matches!(result, Ok(Reduction::Unchanged)));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("refused")]
    struct Refused;

    #[test]
    fn test_combined_first_error_aborts() {
        let counting = crate::reducer_fn(|s: &i32, _a: (), _e: &()| {
            Ok::<_, Refused>(Reduction::Next(s + 1))
        });
        let refusing = crate::reducer_fn(|_s: &i32, _a: (), _e: &()| Err::<Reduction<i32>, _>(Refused));

        let combined = combine_reducers::<i32, (), (), Refused>(vec![
            Box::new(counting),
            Box::new(refusing),
        ]);

        assert!(combined.reduce(&0, (), &()).is_err());
    }

    // Scoped reducer tests
    #[derive(Clone, Debug, Default, PartialEq)]
    struct SubState {
        value: i32,
    }

    #[derive(Clone)]
    enum SubAction {
        Add(i32),
        Multiply(i32),
    }

    struct SubReducer;

    impl Reducer for SubReducer {
        type State = SubState;
        type Action = SubAction;
        type Environment = ();
        type Error = Infallible;

        fn reduce(
            &self,
            state: &Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> Result<Reduction<Self::State>, Self::Error> {
            Ok(match action {
                SubAction::Add(n) => Reduction::Next(SubState { value: state.value + n }),
                SubAction::Multiply(n) => Reduction::Next(SubState { value: state.value * n }),
            })
        }
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    struct ParentState {
        sub: SubState,
        other: String,
    }

    enum ParentAction {
        Sub(SubAction),
        Unrelated,
    }

    #[test]
    fn test_scope_reducer() {
        let scoped = scope_reducer(
            SubReducer,
            |parent: &ParentState| &parent.sub,
            |parent: &ParentState, sub: SubState| ParentState {
                sub,
                ..parent.clone()
            },
            |action: ParentAction| match action {
                ParentAction::Sub(sub) => Some(sub),
                ParentAction::Unrelated => None,
            },
        );

        let state = ParentState {
            sub: SubState { value: 5 },
            other: "test".to_string(),
        };

        let state = settle(&state, scoped.reduce(&state, ParentAction::Sub(SubAction::Add(3)), &()));
        assert_eq!(state.sub.value, 8);
        assert_eq!(state.other, "test"); // Other state unchanged

        let state = settle(
            &state,
            scoped.reduce(&state, ParentAction::Sub(SubAction::Multiply(2)), &()),
        );
        assert_eq!(state.sub.value, 16);
        assert_eq!(state.other, "test");

        let unrelated = scoped.reduce(&state, ParentAction::Unrelated, &());
        assert!(matches!(unrelated, Ok(Reduction::Unchanged)));
    }
}
