//! # Hello World Demo
//!
//! A greeting bound to a text input, driven through a unistore [`Store`].
//!
//! This demo showcases:
//! - A reducer with an injected environment and a typed error
//! - `#[derive(Action)]` and serde-tagged actions
//! - A view that re-renders on every store notification
//! - Decoding JSON actions at the process boundary
//!
//! ## Example
//!
//! ```
//! use hello_world::{HelloWorldComponent, NameEnvironment, NameReducer, NameState};
//! use unistore_runtime::Store;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::new(NameState::default(), NameReducer, NameEnvironment::default());
//! let component = HelloWorldComponent::new(store.clone())?;
//!
//! component.on_input("Ada")?;
//! assert_eq!(component.view(), "Hello Ada");
//! assert_eq!(component.input_value(), "Ada");
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use unistore_core::action::AnyAction;
use unistore_core::{Reducer, Reduction};
use unistore_macros::Action;
use unistore_runtime::{Dispatched, Store, StoreError, Subscription};

/// Demo state: the name shown in the greeting and held by the input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameState {
    /// Current name
    pub name: String,
}

/// Demo actions
///
/// Serialized as `{"type": "SET_NAME", "payload": "Ada"}` and `{"type": "CLEAR"}`.
#[derive(Action, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NameAction {
    /// Replace the name
    SetName(String),
    /// Reset the name to the empty string
    Clear,
}

/// Injected limits for [`NameReducer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameEnvironment {
    /// Longest accepted name, in characters
    pub max_len: usize,
}

impl NameEnvironment {
    /// Create an environment with the given name limit
    #[must_use]
    pub const fn new(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl Default for NameEnvironment {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Why [`NameReducer`] rejected an action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The name exceeds [`NameEnvironment::max_len`]
    #[error("name is {len} characters long, the limit is {max}")]
    TooLong {
        /// Length of the rejected name
        len: usize,
        /// Configured limit
        max: usize,
    },
}

/// Name reducer
///
/// Setting the name it already holds, or clearing an empty name, leaves
/// the state unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameReducer;

impl Reducer for NameReducer {
    type State = NameState;
    type Action = NameAction;
    type Environment = NameEnvironment;
    type Error = NameError;

    fn reduce(
        &self,
        state: &Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<Reduction<Self::State>, Self::Error> {
        match action {
            NameAction::SetName(name) => {
                let len = name.chars().count();
                if len > env.max_len {
                    return Err(NameError::TooLong {
                        len,
                        max: env.max_len,
                    });
                }
                if name == state.name {
                    return Ok(Reduction::Unchanged);
                }
                Ok(Reduction::Next(NameState { name }))
            },
            NameAction::Clear if state.name.is_empty() => Ok(Reduction::Unchanged),
            NameAction::Clear => Ok(Reduction::Next(NameState::default())),
        }
    }
}

/// The demo's store type
pub type NameStore = Store<NameState, NameAction, NameEnvironment, NameReducer>;

/// Render the greeting for a state
#[must_use]
pub fn render(state: &NameState) -> String {
    format!("Hello {}", state.name)
}

/// The greeting view bound to a [`NameStore`]
///
/// Re-renders on every store notification. Dropping the component
/// unsubscribes it.
pub struct HelloWorldComponent {
    store: NameStore,
    rendered: Rc<RefCell<String>>,
    subscription: Subscription<NameState>,
}

impl HelloWorldComponent {
    /// Render the current state and subscribe to later changes
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Disposed`] if the store was already disposed.
    pub fn new(store: NameStore) -> Result<Self, StoreError<NameError>> {
        let rendered = Rc::new(RefCell::new(store.state(render)));

        let target = Rc::clone(&rendered);
        let subscription = store.subscribe(move |state| {
            *target.borrow_mut() = render(state);
        })?;

        Ok(Self {
            store,
            rendered,
            subscription,
        })
    }

    /// The last rendered greeting
    #[must_use]
    pub fn view(&self) -> String {
        self.rendered.borrow().clone()
    }

    /// The value the input box shows
    #[must_use]
    pub fn input_value(&self) -> String {
        self.store.state(|s| s.name.clone())
    }

    /// Handle an input event
    ///
    /// # Errors
    ///
    /// Returns the store's error if the name is rejected or the store is disposed.
    pub fn on_input(&self, value: impl Into<String>) -> Result<Dispatched, StoreError<NameError>> {
        self.store.dispatch(NameAction::SetName(value.into()))
    }
}

impl Drop for HelloWorldComponent {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

/// One line of demo input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A JSON action this demo understands
    Action(NameAction),
    /// A JSON action with a tag outside [`NameAction`]'s vocabulary
    Unrecognized(String),
    /// Text typed into the input box
    Text(String),
}

/// Classify a line of input
///
/// Lines starting with `{` are JSON actions; anything else is typed text.
///
/// # Errors
///
/// Returns the serde error for malformed JSON, or for a known tag with a
/// payload of the wrong shape.
pub fn parse_line(line: &str) -> Result<Input, serde_json::Error> {
    if !line.trim_start().starts_with('{') {
        return Ok(Input::Text(line.to_owned()));
    }

    let action: AnyAction = serde_json::from_str(line)?;
    Ok(match action.decode::<NameAction>()? {
        Some(action) => Input::Action(action),
        None => Input::Unrecognized(action.kind),
    })
}
