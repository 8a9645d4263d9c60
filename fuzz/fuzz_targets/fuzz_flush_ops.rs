#![no_main]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ripple_core::{
    Duration, Observable, Reaction, Runtime, RuntimeConfig, RunnerStatus, Unsubscribe,
};

const OBSERVABLES: usize = 6;

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Mutate(u8),
    Subscribe(u8),
    /// Reaction on `from` that mutates `to` when run.
    Link { from: u8, to: u8 },
    Unsubscribe(u8),
    DisposeReaction(u8),
    DisposeObservable(u8),
    Advance(u8),
    FlushNow,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    loop_limit: u8,
    ops: Vec<FuzzOp>,
}

/// (callback key, cycle) -> number of runs.
type RunLog = Rc<RefCell<HashMap<(usize, u64), u32>>>;

fn callback(
    rt: &Runtime,
    runs: &RunLog,
    key: usize,
    target: Option<Observable>,
) -> impl Fn() + use<> {
    let weak = rt.downgrade();
    let runs = Rc::clone(runs);
    move || {
        if let Some(rt) = weak.upgrade() {
            let cycle = rt.context().current_cycle();
            *runs.borrow_mut().entry((key, cycle)).or_default() += 1;
        }
        if let Some(target) = &target {
            target.mutate();
        }
    }
}

fn pick(observables: &[Observable], i: u8) -> &Observable {
    &observables[usize::from(i) % OBSERVABLES]
}

fuzz_target!(|input: FuzzInput| {
    let limit = u32::from(input.loop_limit % 8) + 1;
    let config = RuntimeConfig::default().with_loop_limits(limit - 1, limit);
    let Ok((rt, timers)) = Runtime::lab(config) else {
        return;
    };
    let observables: Vec<Observable> = (0..OBSERVABLES)
        .map(|i| rt.observable(format!("ob{i}")))
        .collect();

    let runs: RunLog = Rc::default();
    let mut next_key = 0usize;
    let mut reactions: Vec<Reaction> = Vec::new();
    let mut subscriptions: Vec<Unsubscribe> = Vec::new();

    for op in input.ops.into_iter().take(256) {
        match op {
            FuzzOp::Mutate(i) => pick(&observables, i).mutate(),
            FuzzOp::Subscribe(i) => {
                next_key += 1;
                let unsub = pick(&observables, i).subscribe(callback(&rt, &runs, next_key, None));
                subscriptions.push(unsub);
            }
            FuzzOp::Link { from, to } => {
                next_key += 1;
                let target = pick(&observables, to).clone();
                let reaction = Reaction::new(callback(&rt, &runs, next_key, Some(target)));
                pick(&observables, from).add_dependent(&reaction);
                reactions.push(reaction);
            }
            FuzzOp::Unsubscribe(i) => {
                if !subscriptions.is_empty() {
                    subscriptions[usize::from(i) % subscriptions.len()].unsubscribe();
                }
            }
            FuzzOp::DisposeReaction(i) => {
                if !reactions.is_empty() {
                    reactions[usize::from(i) % reactions.len()].dispose();
                }
            }
            FuzzOp::DisposeObservable(i) => pick(&observables, i).dispose(),
            FuzzOp::Advance(ms) => {
                timers.advance(Duration::from_millis(u64::from(ms)));
            }
            FuzzOp::FlushNow => {
                rt.flush_now();
            }
        }
        assert_ne!(rt.status(), RunnerStatus::Flushing);
    }

    timers.run_until_idle(10_000);
    let status = rt.status();
    assert!(matches!(status, RunnerStatus::Idle | RunnerStatus::LoopAborted));
    assert!(runs.borrow().values().all(|&n| n == 1));
    assert!(rt.stats().loop_passes <= limit);
    if status == RunnerStatus::Idle {
        assert!(observables.iter().all(|ob| ob.is_disposed() || !ob.is_pending()));
    }

    // Linked reactions hold their targets; disposal breaks the cycles.
    for ob in &observables {
        ob.dispose();
    }
});
