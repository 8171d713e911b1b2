//! Store dispatch benchmarks
//!
//! Measures the synchronous dispatch path:
//! - Reducer plus commit with no observers
//! - Unchanged reductions (no commit, no notification)
//! - Notification fan-out to many observers
//! - Reentrant dispatches drained from the queue
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::unwrap_used)] // Benchmarks can unwrap during setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::convert::Infallible;
use unistore_core::{Action, Reducer, Reduction};
use unistore_runtime::Store;

#[derive(Clone, Debug)]
struct BenchState {
    counter: i64,
    data: Vec<u8>, // For testing state size impact
}

impl Default for BenchState {
    fn default() -> Self {
        Self {
            counter: 0,
            data: vec![0; 1024], // 1KB of data
        }
    }
}

#[derive(Clone, Debug)]
enum BenchAction {
    Increment,
    NoOp,
}

impl Action for BenchAction {
    fn tag(&self) -> &str {
        match self {
            Self::Increment => "INCREMENT",
            Self::NoOp => "NO_OP",
        }
    }
}

#[derive(Clone, Copy)]
struct BenchReducer;

impl Reducer for BenchReducer {
    type State = BenchState;
    type Action = BenchAction;
    type Environment = ();
    type Error = Infallible;

    fn reduce(
        &self,
        state: &BenchState,
        action: BenchAction,
        _env: &(),
    ) -> Result<Reduction<BenchState>, Infallible> {
        match action {
            BenchAction::Increment => Ok(Reduction::Next(BenchState {
                counter: state.counter + 1,
                data: state.data.clone(),
            })),
            BenchAction::NoOp => Ok(Reduction::Unchanged),
        }
    }
}

type BenchStore = Store<BenchState, BenchAction, (), BenchReducer>;

fn bench_store() -> BenchStore {
    Store::new(BenchState::default(), BenchReducer, ())
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    let store = bench_store();
    group.bench_function("applied", |b| {
        b.iter(|| store.dispatch(black_box(BenchAction::Increment)).unwrap());
    });

    let store = bench_store();
    group.bench_function("unchanged", |b| {
        b.iter(|| store.dispatch(black_box(BenchAction::NoOp)).unwrap());
    });

    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for observers in [1_usize, 10, 100] {
        let store = bench_store();
        let handles: Vec<_> = (0..observers)
            .map(|_| {
                store
                    .subscribe(|state| {
                        black_box(state.counter);
                    })
                    .unwrap()
            })
            .collect();

        group.throughput(Throughput::Elements(observers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(observers), &observers, |b, _| {
            b.iter(|| store.dispatch(BenchAction::Increment).unwrap());
        });

        drop(handles);
    }

    group.finish();
}

fn bench_reentrant(c: &mut Criterion) {
    let store = bench_store();
    let weak = store.downgrade();
    let _echo = store
        .subscribe(move |state| {
            // One queued follow-up per outer dispatch
            if state.counter % 2 == 1 {
                if let Some(store) = weak.upgrade() {
                    store.dispatch(BenchAction::Increment).unwrap();
                }
            }
        })
        .unwrap();

    c.bench_function("reentrant_queued", |b| {
        b.iter(|| store.dispatch(BenchAction::Increment).unwrap());
    });
}

criterion_group!(benches, bench_dispatch, bench_fan_out, bench_reentrant);
criterion_main!(benches);
