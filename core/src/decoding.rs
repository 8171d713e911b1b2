//! Reducer over serialized actions.
//!
//! Actions crossing a process or language boundary arrive as
//! `{ "type": ..., "payload": ... }` objects. [`DecodingReducer`] wraps a
//! typed reducer so it can be driven by [`AnyAction`] values directly:
//! tags outside the typed vocabulary are ignored, known tags are decoded
//! and handed to the inner reducer.

use crate::action::{ActionVocabulary, AnyAction};
use crate::reducer::{Reducer, Reduction};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from a [`DecodingReducer`]
#[derive(Error, Debug)]
pub enum DecodingError<E> {
    /// The tag is known but the payload does not fit the variant
    #[error("invalid payload for action `{tag}`: {source}")]
    Payload {
        /// The action tag
        tag: String,
        /// The decode failure
        #[source]
        source: serde_json::Error,
    },

    /// The inner reducer failed
    #[error(transparent)]
    Reducer(E),
}

/// Wraps a typed reducer so it accepts [`AnyAction`]
///
/// # Example
///
/// ```ignore
/// let reducer = DecodingReducer::new(NameReducer);
/// let action: AnyAction = serde_json::from_str(r#"{"type":"SET_NAME","payload":"Ada"}"#)?;
/// let next = reducer.reduce(&state, action, &env)?;
/// ```
#[derive(Debug, Clone)]
pub struct DecodingReducer<R> {
    inner: R,
}

impl<R> DecodingReducer<R> {
    /// Wrap a typed reducer
    #[must_use]
    pub const fn new(inner: R) -> Self {
        Self { inner }
    }

    /// The wrapped reducer
    #[must_use]
    pub const fn inner(&self) -> &R {
        &self.inner
    }

    /// Unwrap into the typed reducer
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> Reducer for DecodingReducer<R>
where
    R: Reducer,
    R::Action: ActionVocabulary + DeserializeOwned,
{
    type State = R::State;
    type Action = AnyAction;
    type Environment = R::Environment;
    type Error = DecodingError<R::Error>;

    fn reduce(
        &self,
        state: &Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Reduction<Self::State>, Self::Error> {
        let decoded = action
            .decode::<R::Action>()
            .map_err(|source| DecodingError::Payload {
                tag: action.kind.clone(),
                source,
            })?;

        let Some(typed) = decoded else {
            tracing::trace!(action = %action.kind, "Unrecognized action tag, state unchanged");
            return Ok(Reduction::Unchanged);
        };

        self.inner
            .reduce(state, typed, env)
            .map_err(DecodingError::Reducer)
    }

    fn recognizes(&self, action: &AnyAction) -> bool {
        <R::Action as ActionVocabulary>::recognizes(&action.kind)
    }
}
