#![cfg(test)]

// Property tests for PairKeyedMap kept inside the crate so they can also
// check the outer map directly.

use crate::pair_keyed_map::PairKeyedMap;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Reference model: groups in first-insertion order, pairs in insertion
/// order, empty groups removed.
#[derive(Default, Debug)]
struct Model {
    groups: Vec<(Key, Vec<(u8, i32)>)>,
}

impl Model {
    fn set(&mut self, k1: &Key, k2: u8, v: i32) -> Option<i32> {
        let gi = match self.groups.iter().position(|(k, _)| k == k1) {
            Some(gi) => gi,
            None => {
                self.groups.push((k1.clone(), Vec::new()));
                self.groups.len() - 1
            }
        };
        let pairs = &mut self.groups[gi].1;
        match pairs.iter_mut().find(|(k, _)| *k == k2) {
            Some((_, slot)) => Some(std::mem::replace(slot, v)),
            None => {
                pairs.push((k2, v));
                None
            }
        }
    }

    fn remove(&mut self, k1: &str, k2: u8) -> Option<i32> {
        let gi = self.groups.iter().position(|(k, _)| k.0 == k1)?;
        let pi = self.groups[gi].1.iter().position(|(k, _)| *k == k2)?;
        let (_, v) = self.groups[gi].1.remove(pi);
        if self.groups[gi].1.is_empty() {
            self.groups.remove(gi);
        }
        Some(v)
    }

    fn get(&self, k1: &str, k2: u8) -> Option<i32> {
        self.groups
            .iter()
            .find(|(k, _)| k.0 == k1)
            .and_then(|(_, pairs)| pairs.iter().find(|(k, _)| *k == k2))
            .map(|(_, v)| *v)
    }

    fn get_mut(&mut self, k1: &str, k2: u8) -> Option<&mut i32> {
        self.groups
            .iter_mut()
            .find(|(k, _)| k.0 == k1)
            .and_then(|(_, pairs)| pairs.iter_mut().find(|(k, _)| *k == k2))
            .map(|(_, v)| v)
    }

    fn len(&self) -> usize {
        self.groups.iter().map(|(_, pairs)| pairs.len()).sum()
    }

    fn triples(&self) -> Vec<(Key, u8, i32)> {
        self.groups
            .iter()
            .flat_map(|(k1, pairs)| pairs.iter().map(move |(k2, v)| (k1.clone(), *k2, *v)))
            .collect()
    }
}

// Pool-indexed operations so shrinking moves towards earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Set(usize, u8, i32),
    Insert(usize, u8, i32),
    Delete(usize, u8),
    Get(usize, u8),
    Has(String, u8),
    Mutate(usize, u8, i32),
    Iterate,
    ForEach,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=6).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let k2 = 0u8..4;
        let has_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), k2.clone(), any::<i32>()).prop_map(|(i, b, v)| Op::Set(i, b, v)),
            3 => (idx.clone(), k2.clone(), any::<i32>()).prop_map(|(i, b, v)| Op::Insert(i, b, v)),
            5 => (idx.clone(), k2.clone()).prop_map(|(i, b)| Op::Delete(i, b)),
            3 => (idx.clone(), k2.clone()).prop_map(|(i, b)| Op::Get(i, b)),
            2 => (
                prop_oneof![
                    has_pool.prop_map(|s: String| s),
                    "[a-z]{0,4}".prop_map(|s| s)
                ],
                k2.clone(),
            )
                .prop_map(|(s, b)| Op::Has(s, b)),
            2 => (idx.clone(), k2.clone(), any::<i32>()).prop_map(|(i, b, d)| Op::Mutate(i, b, d)),
            2 => Just(Op::Iterate),
            1 => Just(Op::ForEach),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// State-machine equivalence against `Model`, checked after every operation:
// - `get`/`has` agree with the model and with each other;
// - `set`/`insert`/`delete` report the same outcome as the model;
// - `len` equals the model's pair count and the number of `for_each` visits;
// - `entries` yields exactly the model's triples in the model's order;
// - `outer_len` equals the number of non-empty groups.
fn run_scenario<S>(
    mut sut: PairKeyedMap<Key, u8, i32, S>,
    pool: &[String],
    ops: Vec<Op>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher + Clone,
{
    let mut model = Model::default();
    for op in ops {
        match op {
            Op::Set(i, b, v) => {
                let k1 = Key(pool[i].clone());
                let existed = model.get(&k1.0, b).is_some();
                let before = sut.len();
                model.set(&k1, b, v);
                sut.set(k1, b, v);
                let expected = if existed { before } else { before + 1 };
                prop_assert_eq!(sut.len(), expected);
            }
            Op::Insert(i, b, v) => {
                let k1 = Key(pool[i].clone());
                let expected = model.set(&k1, b, v);
                prop_assert_eq!(sut.insert(k1, b, v), expected);
            }
            Op::Delete(i, b) => {
                let k1 = pool[i].as_str();
                let expected = model.remove(k1, b);
                let before = sut.len();
                prop_assert_eq!(sut.delete(k1, &b), expected.is_some());
                prop_assert!(!sut.has(k1, &b));
                let delta = usize::from(expected.is_some());
                prop_assert_eq!(sut.len() + delta, before);
            }
            Op::Get(i, b) => {
                let k1 = pool[i].as_str();
                let got = sut.get(k1, &b).copied();
                prop_assert_eq!(got, model.get(k1, b));
                prop_assert_eq!(sut.has(k1, &b), got.is_some());
            }
            Op::Has(s, b) => {
                prop_assert_eq!(sut.has(s.as_str(), &b), model.get(&s, b).is_some());
            }
            Op::Mutate(i, b, d) => {
                let k1 = pool[i].as_str();
                match (sut.get_mut(k1, &b), model.get_mut(k1, b)) {
                    (Some(sv), Some(mv)) => {
                        *sv = sv.wrapping_add(d);
                        *mv = mv.wrapping_add(d);
                    }
                    (None, None) => {}
                    (s, m) => prop_assert!(false, "presence mismatch: {:?} vs {:?}", s, m),
                }
            }
            Op::Iterate => {
                let seen: Vec<_> = sut.entries().map(|(a, b, v)| (a.clone(), *b, *v)).collect();
                prop_assert_eq!(seen, model.triples());
            }
            Op::ForEach => {
                let mut seen = Vec::new();
                sut.for_each(|v, a, b| seen.push((a.clone(), *b, *v)));
                prop_assert_eq!(seen, model.triples());
            }
            Op::Clear => {
                sut.clear();
                model = Model::default();
            }
        }

        // Post-conditions after each op
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.len() == 0);
        prop_assert_eq!(sut.outer_len(), model.groups.len());
        prop_assert_eq!(sut.entries().len(), sut.len());
        let mut visited = 0usize;
        sut.for_each(|_, _, _| visited += 1);
        prop_assert_eq!(visited, sut.len());
        // No inner map is left empty.
        prop_assert!(sut.outer_len() <= sut.len());
    }
    let final_keys: Vec<_> = sut.keys().map(|(a, b)| (a.clone(), *b)).collect();
    let model_keys: Vec<_> = model.triples().into_iter().map(|(a, b, _)| (a, b)).collect();
    prop_assert_eq!(final_keys, model_keys);
    Ok(())
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(PairKeyedMap::with_hasher(RandomState::new()), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(PairKeyedMap::with_hasher(ConstBuildHasher), &pool, ops)?;
    }

    // Property: rebuilding from `entries()` gives an equal map with the same
    // iteration order.
    #[test]
    fn prop_rebuild_from_entries(
        triples in proptest::collection::vec(("[a-c]", 0u8..3, any::<i32>()), 0..40),
        deletes in proptest::collection::vec(("[a-c]", 0u8..3), 0..20),
    ) {
        let mut a: PairKeyedMap<String, u8, i32> = triples.into_iter().collect();
        for (k1, k2) in &deletes {
            a.delete(k1.as_str(), k2);
        }
        let b: PairKeyedMap<String, u8, i32> =
            a.entries().map(|(k1, k2, v)| (k1.clone(), *k2, *v)).collect();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.outer_len(), b.outer_len());
        let ao: Vec<_> = a.keys().collect();
        let bo: Vec<_> = b.keys().collect();
        prop_assert_eq!(ao, bo);
    }
}
