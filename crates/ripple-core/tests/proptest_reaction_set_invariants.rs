//! Property-based model check for `ReactionSet`.
//!
//! Random sequences of add / remove / dispose / prune / clear are applied to
//! a `ReactionSet` and to a plain `Vec<usize>` model. After every step:
//!
//! 1. Iteration order equals the model's insertion order
//! 2. No identity appears twice
//! 3. `len()` and `contains()` agree with the model
//! 4. `add` reports `true` exactly when the identity was absent
//! 5. `prune_disposed` removes exactly the disposed members

use proptest::prelude::*;
use ripple_core::{Reaction, ReactionSet};

const POOL: usize = 8;

#[derive(Debug, Clone)]
enum Op {
    Add(usize),
    Remove(usize),
    Dispose(usize),
    Prune,
    Clear,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..POOL).prop_map(Op::Add),
        2 => (0..POOL).prop_map(Op::Remove),
        1 => (0..POOL).prop_map(Op::Dispose),
        1 => Just(Op::Prune),
        1 => Just(Op::Clear),
    ]
}

fn pool() -> Vec<Reaction> {
    (0..POOL).map(|_| Reaction::new(|| {})).collect()
}

fn order(set: &ReactionSet, pool: &[Reaction]) -> Vec<usize> {
    set.iter()
        .map(|r| {
            pool.iter()
                .position(|p| p == r)
                .expect("set only holds pool reactions")
        })
        .collect()
}

// ═════════════════════════════════════════════════════════════════════════
// 1-5. Set matches an ordered Vec model
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn matches_vec_model(ops in proptest::collection::vec(arb_op(), 0..=64)) {
        let pool = pool();
        let mut set = ReactionSet::new();
        let mut model: Vec<usize> = Vec::new();

        for op in ops {
            match op {
                Op::Add(i) => {
                    let absent = !model.contains(&i);
                    prop_assert_eq!(set.add(&pool[i]), absent);
                    if absent {
                        model.push(i);
                    }
                }
                Op::Remove(i) => {
                    let present = model.contains(&i);
                    prop_assert_eq!(set.remove_id(pool[i].id()), present);
                    model.retain(|&m| m != i);
                }
                Op::Dispose(i) => pool[i].dispose(),
                Op::Prune => {
                    let before = model.len();
                    model.retain(|&m| !pool[m].is_disposed());
                    prop_assert_eq!(set.prune_disposed(), before - model.len());
                }
                Op::Clear => {
                    set.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(order(&set, &pool), model.clone());
            prop_assert_eq!(set.len(), model.len());
            for (i, reaction) in pool.iter().enumerate() {
                prop_assert_eq!(set.contains(reaction), model.contains(&i));
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Predicate removal keeps survivors in relative order
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn predicate_removal_is_stable(
        picks in proptest::collection::vec(0..POOL, 0..=32),
        drop_mask in any::<u8>(),
    ) {
        let pool = pool();
        let mut set = ReactionSet::new();
        for &i in &picks {
            set.add(&pool[i]);
        }
        let before = order(&set, &pool);

        let removed = set.remove(|r| {
            let i = pool.iter().position(|p| p == r).unwrap_or(0);
            drop_mask & (1 << i) != 0
        });

        let expected: Vec<usize> = before
            .iter()
            .copied()
            .filter(|&i| drop_mask & (1 << i) == 0)
            .collect();
        prop_assert_eq!(removed, before.len() - expected.len());
        prop_assert_eq!(order(&set, &pool), expected);
    }
}
