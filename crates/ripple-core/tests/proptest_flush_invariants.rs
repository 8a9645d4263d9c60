//! Property-based invariants for the batching scheduler.
//!
//! Random dependency graphs (observables × reactions) are built on a lab
//! runtime, a random multiset of observables is mutated, and one flush is
//! driven to completion. Verified:
//!
//! 1. A reaction runs iff it depends on at least one mutated observable
//! 2. No reaction runs more than once per flush
//! 3. Run order is: queued observables in first-mutation order, each one's
//!    dependents in registration order, skipping reactions that already ran
//! 4. Disposed reactions never run
//! 5. Nothing runs before the timer fires
//! 6. A mutation cycle of any length aborts after exactly `loop_limit` passes

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use ripple_core::{
    DeferredQueue, Duration, Observable, Reaction, Runtime, RunnerStatus, RuntimeConfig,
};

const SETTLE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
struct Graph {
    observables: usize,
    /// `deps[r]` is the set of observables reaction `r` depends on.
    deps: Vec<Vec<usize>>,
}

fn arb_graph() -> impl Strategy<Value = Graph> {
    (1usize..=6, 1usize..=8).prop_flat_map(|(obs, reactions)| {
        proptest::collection::vec(proptest::collection::btree_set(0..obs, 0..=obs), reactions)
            .prop_map(move |deps| Graph {
                observables: obs,
                deps: deps.into_iter().map(|s| s.into_iter().collect()).collect(),
            })
    })
}

fn build(
    graph: &Graph,
) -> (
    Runtime,
    Rc<DeferredQueue>,
    Vec<Observable>,
    Vec<Reaction>,
    Rc<RefCell<Vec<usize>>>,
) {
    let (rt, timers) = Runtime::lab(RuntimeConfig::default()).expect("valid config");
    let observables: Vec<Observable> = (0..graph.observables)
        .map(|i| rt.observable(format!("ob{i}")))
        .collect();
    let log = Rc::new(RefCell::new(Vec::new()));
    let reactions: Vec<Reaction> = (0..graph.deps.len())
        .map(|r| {
            let log = Rc::clone(&log);
            rt.reaction(move || log.borrow_mut().push(r))
        })
        .collect();
    for (r, deps) in graph.deps.iter().enumerate() {
        for &o in deps {
            observables[o].add_dependent(&reactions[r]);
        }
    }
    (rt, timers, observables, reactions, log)
}

fn expected_order(graph: &Graph, mutated: &[usize], disposed: &[bool]) -> Vec<usize> {
    let mut queue: Vec<usize> = Vec::new();
    for &o in mutated {
        if !queue.contains(&o) {
            queue.push(o);
        }
    }
    let mut ran = Vec::new();
    for o in queue {
        for (r, deps) in graph.deps.iter().enumerate() {
            if deps.contains(&o) && !disposed[r] && !ran.contains(&r) {
                ran.push(r);
            }
        }
    }
    ran
}

// ═════════════════════════════════════════════════════════════════════════
// 1-3, 5. One flush runs each affected reaction once, in queue order
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn flush_runs_each_dependent_once_in_order(
        (graph, mutated) in arb_graph().prop_flat_map(|g| {
            let n = g.observables;
            (Just(g), proptest::collection::vec(0..n, 1..=12))
        })
    ) {
        let (rt, timers, observables, _reactions, log) = build(&graph);
        for &o in &mutated {
            observables[o].mutate();
        }
        prop_assert!(log.borrow().is_empty());
        prop_assert_eq!(rt.status(), RunnerStatus::Pending);

        timers.advance(SETTLE);
        let disposed = vec![false; graph.deps.len()];
        let expected = expected_order(&graph, &mutated, &disposed);
        prop_assert_eq!(log.borrow().clone(), expected);
        prop_assert_eq!(rt.status(), RunnerStatus::Idle);
        for ob in &observables {
            prop_assert!(!ob.is_pending());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Disposed reactions never run and are pruned
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn disposed_reactions_never_run(
        (graph, dispose_mask) in arb_graph().prop_flat_map(|g| {
            let n = g.deps.len();
            (Just(g), proptest::collection::vec(any::<bool>(), n))
        })
    ) {
        let (_rt, timers, observables, reactions, log) = build(&graph);
        for (r, reaction) in reactions.iter().enumerate() {
            if dispose_mask[r] {
                reaction.dispose();
            }
        }
        let all: Vec<usize> = (0..graph.observables).collect();
        for ob in &observables {
            ob.mutate();
        }
        timers.advance(SETTLE);

        prop_assert_eq!(log.borrow().clone(), expected_order(&graph, &all, &dispose_mask));
        for (o, ob) in observables.iter().enumerate() {
            let live = graph
                .deps
                .iter()
                .enumerate()
                .filter(|(r, deps)| deps.contains(&o) && !dispose_mask[*r])
                .count();
            prop_assert_eq!(ob.dependent_count(), live);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Mutation cycles are cut off at the loop limit
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn mutation_cycles_abort_at_limit(
        ring in 1usize..=5,
        (warn_after, limit) in (1u32..=12).prop_flat_map(|limit| (0..limit, Just(limit))),
    ) {
        let config = RuntimeConfig::default().with_loop_limits(warn_after, limit);
        let (rt, timers) = Runtime::lab(config).expect("valid config");
        let observables: Vec<Observable> =
            (0..ring).map(|i| rt.observable(format!("ring{i}"))).collect();
        let runs = Rc::new(RefCell::new(0u32));
        for i in 0..ring {
            let next = observables[(i + 1) % ring].clone();
            let runs = Rc::clone(&runs);
            observables[i].subscribe(move || {
                *runs.borrow_mut() += 1;
                next.mutate();
            });
        }

        observables[0].mutate();
        timers.advance(Duration::from_secs(10));

        prop_assert_eq!(*runs.borrow(), limit);
        prop_assert_eq!(rt.status(), RunnerStatus::LoopAborted);
        prop_assert_eq!(rt.stats().flush_passes, u64::from(limit));
        prop_assert_eq!(rt.context().diagnostics().total(), u64::from(limit - warn_after) + 1);
    }
}
