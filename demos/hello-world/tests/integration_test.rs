//! End-to-end tests: component, store and reducer wired together.

#![allow(clippy::unwrap_used)]

use hello_world::{
    HelloWorldComponent, NameAction, NameEnvironment, NameError, NameReducer, NameState, NameStore,
};
use proptest::prelude::*;
use unistore_core::action::AnyAction;
use unistore_core::decoding::DecodingReducer;
use unistore_runtime::{Dispatched, Store, StoreError};
use unistore_testing::RecordingObserver;
use unistore_testing::properties::{action_sequence, fold_reduce, is_identity};

fn name_store() -> NameStore {
    Store::new(NameState::default(), NameReducer, NameEnvironment::default())
}

#[test]
fn test_component_renders_initial_state() {
    let store = Store::new(
        NameState {
            name: "world".into(),
        },
        NameReducer,
        NameEnvironment::default(),
    );
    let component = HelloWorldComponent::new(store).unwrap();

    assert_eq!(component.view(), "Hello world");
    assert_eq!(component.input_value(), "world");
}

#[test]
fn test_input_updates_view() {
    let store = name_store();
    let component = HelloWorldComponent::new(store.clone()).unwrap();

    assert_eq!(component.on_input("Ada").unwrap(), Dispatched::Applied);
    assert_eq!(component.view(), "Hello Ada");
    assert_eq!(store.get_state().name, "Ada");

    // Dispatching from outside the component also re-renders it
    store.dispatch(NameAction::Clear).unwrap();
    assert_eq!(component.view(), "Hello ");
    assert_eq!(component.input_value(), "");
}

#[test]
fn test_rejected_input_keeps_view() {
    let store = Store::new(NameState::default(), NameReducer, NameEnvironment::new(4));
    let component = HelloWorldComponent::new(store.clone()).unwrap();
    component.on_input("Ada").unwrap();

    let error = component.on_input("Grace Hopper").unwrap_err();
    assert_eq!(
        error.reducer_error(),
        Some(&NameError::TooLong { len: 12, max: 4 })
    );
    assert_eq!(component.view(), "Hello Ada");
    assert_eq!(store.get_state().name, "Ada");
}

#[test]
fn test_dropping_component_unsubscribes() {
    let store = name_store();
    let component = HelloWorldComponent::new(store.clone()).unwrap();
    assert_eq!(store.observer_count(), 1);

    drop(component);
    assert_eq!(store.observer_count(), 0);
}

#[test]
fn test_component_on_disposed_store() {
    let store = name_store();
    let component = HelloWorldComponent::new(store.clone()).unwrap();
    component.on_input("Ada").unwrap();

    store.dispose();

    assert!(component.on_input("Grace").unwrap_err().is_disposed());
    assert_eq!(component.view(), "Hello Ada");
    assert!(matches!(
        HelloWorldComponent::new(store),
        Err(StoreError::Disposed)
    ));
}

#[test]
fn test_json_actions_through_decoding_store() {
    let store = Store::new(
        NameState::default(),
        DecodingReducer::new(NameReducer),
        NameEnvironment::default(),
    );
    let recorder = RecordingObserver::<NameState>::new();
    let _sub = store.subscribe(recorder.observer()).unwrap();

    let set: AnyAction = serde_json::from_str(r#"{"type":"SET_NAME","payload":"Ada"}"#).unwrap();
    let unknown = AnyAction::with_payload("ADD_TODO", serde_json::json!("milk"));

    assert_eq!(store.dispatch(set).unwrap(), Dispatched::Applied);
    assert_eq!(store.dispatch(unknown).unwrap(), Dispatched::Unchanged);

    assert_eq!(recorder.len(), 1);
    assert_eq!(store.state_json().unwrap(), serde_json::json!({ "name": "Ada" }));
}

fn name_action() -> impl Strategy<Value = NameAction> {
    prop_oneof![
        "[a-z]{0,8}".prop_map(NameAction::SetName),
        Just(NameAction::Clear),
    ]
}

proptest! {
    #[test]
    fn prop_store_matches_fold(actions in action_sequence(name_action(), 16)) {
        let store = name_store();
        for action in actions.clone() {
            store.dispatch(action).unwrap();
        }

        let expected = fold_reduce(
            &NameReducer,
            NameState::default(),
            actions,
            &NameEnvironment::default(),
        )
        .unwrap();
        prop_assert_eq!(&*store.get_state(), &expected);
    }

    #[test]
    fn prop_repeating_current_name_is_identity(name in "[a-z]{0,8}") {
        let state = NameState { name: name.clone() };
        prop_assert!(is_identity(
            &NameReducer,
            &state,
            NameAction::SetName(name),
            &NameEnvironment::default(),
        ));
    }
}
