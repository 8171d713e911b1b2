//! Hello world demo binary
//!
//! Reads lines from stdin. JSON lines (`{"type": "SET_NAME", "payload": "Ada"}`)
//! are dispatched as actions; any other line is treated as text typed into
//! the input box. The rendered greeting is printed after every line.
//!
//! Pass `--metrics` to print the Prometheus metrics at exit.

use anyhow::Context;
use hello_world::{HelloWorldComponent, Input, NameEnvironment, NameReducer, NameState, NameStore};
use std::io::{self, BufRead};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unistore_runtime::metrics::PrometheusRecorder;
use unistore_runtime::{Store, StoreConfig};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hello_world=info,unistore_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let show_metrics = std::env::args().skip(1).any(|arg| arg == "--metrics");
    let recorder = if show_metrics {
        Some(PrometheusRecorder::install().context("installing metrics recorder")?)
    } else {
        None
    };

    let config = StoreConfig::from_env().context("loading store configuration")?;
    tracing::info!(store = %config.name, reentrancy = %config.reentrancy, "Starting hello-world");

    let store = Store::with_config(
        NameState::default(),
        NameReducer,
        NameEnvironment::default(),
        config,
    )
    .context("building store")?;
    let component = HelloWorldComponent::new(store.clone())?;
    println!("{}", component.view());

    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        handle_line(&store, &component, &line);
        println!("{}", component.view());
    }

    drop(component);
    store.dispose();

    if let Some(recorder) = recorder {
        println!("{}", recorder.render());
    }

    Ok(())
}

fn handle_line(store: &NameStore, component: &HelloWorldComponent, line: &str) {
    let result = match hello_world::parse_line(line) {
        Ok(Input::Text(value)) => component.on_input(value),
        Ok(Input::Action(action)) => store.dispatch(action),
        Ok(Input::Unrecognized(tag)) => {
            tracing::info!(action = %tag, "Ignoring unrecognized action");
            return;
        },
        Err(error) => {
            tracing::warn!(error = %error, "Malformed action");
            return;
        },
    };

    if let Err(error) = result {
        tracing::warn!(error = %error, "Dispatch failed");
    }
}
