//! Node selection policy.
//!
//! Picks nodes uniformly at random without replacement, so a request for
//! `count` nodes always gets `count` distinct names.

use rand::Rng;
use rand::seq::SliceRandom;

/// Draw `count` distinct entries from `candidates`.
///
/// Returns fewer than `count` only if `candidates` is shorter; callers
/// check availability first.
pub fn sample<R: Rng + ?Sized>(candidates: &[String], count: usize, rng: &mut R) -> Vec<String> {
    debug_assert!(count <= candidates.len(), "sampling more nodes than available");
    candidates.choose_multiple(rng, count).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::{BTreeSet, HashMap};

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("node{i}")).collect()
    }

    #[test]
    fn picks_distinct_nodes() {
        let candidates = names(10);
        let mut rng = StdRng::seed_from_u64(7);
        for count in 0..=10 {
            let picked = sample(&candidates, count, &mut rng);
            assert_eq!(picked.len(), count);
            let unique: BTreeSet<_> = picked.iter().collect();
            assert_eq!(unique.len(), count, "duplicate in {picked:?}");
            assert!(picked.iter().all(|p| candidates.contains(p)));
        }
    }

    #[test]
    fn full_draw_returns_every_candidate() {
        let candidates = names(5);
        let picked: BTreeSet<String> = sample(&candidates, 5, &mut StdRng::seed_from_u64(1))
            .into_iter()
            .collect();
        assert_eq!(picked, candidates.into_iter().collect());
    }

    #[test]
    fn every_candidate_gets_picked_eventually() {
        let candidates = names(4);
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen: HashMap<String, u32> = HashMap::new();
        for _ in 0..400 {
            for name in sample(&candidates, 1, &mut rng) {
                *seen.entry(name).or_insert(0) += 1;
            }
        }
        assert_eq!(seen.len(), 4);
        assert!(seen.values().all(|&hits| hits > 50), "skewed draw: {seen:?}");
    }
}
