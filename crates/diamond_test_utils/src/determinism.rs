//! Determinism testing utilities.
//!
//! A match is a pure function of its [`MatchSetup`]. These helpers re-run
//! setups and compare event-log hashes to catch anything that breaks that.
//!
//! # Sources of non-determinism
//!
//! - **Hash map iteration order**: the default hasher is randomized. Match
//!   state iterates `BTreeMap`s only.
//! - **System randomness**: every roll comes from the match's own seeded
//!   generator.
//! - **Shared state between matches**: matches on different threads share
//!   nothing but the immutable data tables.

use std::sync::Arc;
use std::thread;

use diamond_core::controller::{simulate, MatchResult, MatchSetup};
use diamond_core::data::GameData;
use diamond_core::events::MatchEvent;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical logs.
    pub is_deterministic: bool,
    /// Log hash from each run.
    pub hashes: Vec<u64>,
    /// Events in the first run's log.
    pub events: usize,
}

impl DeterminismResult {
    fn from_results(results: &[MatchResult]) -> Self {
        let hashes: Vec<u64> = results.iter().map(|r| r.log_hash).collect();
        Self {
            is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
            events: results.first().map_or(0, |r| r.log.len()),
            hashes,
        }
    }

    /// All distinct hashes (one for a deterministic match).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert the runs agreed, with a detailed message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Match is non-deterministic!\n\
                 Runs: {}\n\
                 Events: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.events,
                unique.len(),
                self.hashes
            );
        }
    }
}

fn play(setup: &MatchSetup, data: &Arc<GameData>) -> MatchResult {
    simulate(setup.clone(), Arc::clone(data)).expect("fixture setup plays")
}

/// Play the same setup `runs` times in sequence.
///
/// # Panics
///
/// Panics if the setup is rejected.
#[must_use]
pub fn verify_determinism(runs: usize, setup: &MatchSetup, data: &Arc<GameData>) -> DeterminismResult {
    let results: Vec<MatchResult> = (0..runs).map(|_| play(setup, data)).collect();
    DeterminismResult::from_results(&results)
}

/// Play the same setup on `num` scoped threads at once.
///
/// Catches anything that leaks between concurrently running matches.
///
/// # Panics
///
/// Panics if the setup is rejected or a worker panics.
#[must_use]
pub fn run_parallel_scoped(num: usize, setup: &MatchSetup, data: &Arc<GameData>) -> DeterminismResult {
    let results: Vec<MatchResult> = thread::scope(|s| {
        let handles: Vec<_> = (0..num).map(|_| s.spawn(|| play(setup, data))).collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("match worker panicked"))
            .collect()
    });
    DeterminismResult::from_results(&results)
}

/// Index of the first event where two logs differ.
///
/// A log that is a strict prefix of the other diverges at its length.
#[must_use]
pub fn first_divergent_event(a: &[MatchEvent], b: &[MatchEvent]) -> Option<usize> {
    if let Some(index) = a.iter().zip(b).position(|(x, y)| x != y) {
        return Some(index);
    }
    (a.len() != b.len()).then(|| a.len().min(b.len()))
}

/// Play a setup twice and locate the first divergent event.
///
/// # Panics
///
/// Panics if the setup is rejected.
#[must_use]
pub fn find_first_divergence(setup: &MatchSetup, data: &Arc<GameData>) -> Option<usize> {
    let first = play(setup, data);
    let second = play(setup, data);
    first_divergent_event(&first.log, &second.log)
}

/// Whether a result survives a bincode round trip unchanged.
#[must_use]
pub fn verify_serialization_round_trip(result: &MatchResult) -> bool {
    let Ok(bytes) = bincode::serialize(result) else {
        return false;
    };
    match bincode::deserialize::<MatchResult>(&bytes) {
        Ok(restored) => restored == *result,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{exhibition_setup, game_data};
    use diamond_core::state::Half;

    #[test]
    fn test_first_divergent_event() {
        let a = vec![
            MatchEvent::HalfInningStarted { inning: 1, half: Half::Top },
            MatchEvent::HalfInningStarted { inning: 1, half: Half::Bottom },
        ];
        let mut b = a.clone();
        assert_eq!(first_divergent_event(&a, &b), None);

        b.push(MatchEvent::HalfInningStarted { inning: 2, half: Half::Top });
        assert_eq!(first_divergent_event(&a, &b), Some(2));

        b[1] = MatchEvent::HalfInningStarted { inning: 3, half: Half::Bottom };
        assert_eq!(first_divergent_event(&a, &b), Some(1));
    }

    #[test]
    fn test_sequential_runs_agree() {
        let result = verify_determinism(3, &exhibition_setup(11), &game_data());
        result.assert_deterministic();
        assert_eq!(result.unique_hashes().len(), 1);
        assert!(result.events > 0);
    }

    #[test]
    fn test_scoped_threads_agree() {
        run_parallel_scoped(4, &exhibition_setup(12), &game_data()).assert_deterministic();
    }

    #[test]
    fn test_no_divergence_and_round_trip() {
        let data = game_data();
        let setup = exhibition_setup(13);
        assert_eq!(find_first_divergence(&setup, &data), None);
        let result = simulate(setup, data).unwrap();
        assert!(verify_serialization_round_trip(&result));
    }
}
