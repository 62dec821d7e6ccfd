//! Batch match runner.
//!
//! Runs many independent matches in parallel using rayon. Each worker owns
//! its match outright; only the immutable data tables are shared. Seeds are
//! `seed_start + i`, so a batch is reproducible game for game.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use diamond_core::data::GameData;

use crate::game_runner::{run_game, GameConfig, RunError};
use crate::metrics::{BatchSummary, GameMetrics};
use crate::scenario::Scenario;

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario name (for the report).
    pub scenario: String,
    /// Number of games to run.
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default).
    pub parallel_games: u32,
    /// Output directory for results.
    pub output_dir: PathBuf,
    /// First seed.
    pub seed_start: u64,
    /// Write one JSON result per game into `output_dir/games`.
    pub save_games: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "Exhibition".to_string(),
            game_count: 100,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            save_games: false,
        }
    }
}

impl BatchConfig {
    /// Config for a named scenario.
    pub fn new(scenario: &str, game_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory.
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Per-game metrics in seed order.
    pub games: Vec<GameMetrics>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
    /// Games that failed.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// A game that did not finish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index.
    pub game_index: u32,
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Completion counter shared by the workers.
#[derive(Debug)]
pub struct BatchProgress {
    /// Total games.
    pub total: u32,
    completed: AtomicU32,
    started: Instant,
}

impl BatchProgress {
    /// Tracker for `total` games.
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            started: Instant::now(),
        }
    }

    /// Count one finished game; returns the new total.
    pub fn record_completion(&self) -> u32 {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Games finished so far.
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Completion percentage.
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Wall-clock seconds since the batch began.
    pub fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

fn play_all(config: &BatchConfig, scenario: &Scenario, data: &Arc<GameData>) -> Vec<Result<GameMetrics, BatchError>> {
    let progress = BatchProgress::new(config.game_count);
    let games_dir = config.save_games.then(|| config.output_dir.join("games"));
    (0..config.game_count)
        .into_par_iter()
        .map(|i| -> Result<GameMetrics, BatchError> {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            let mut game = GameConfig::new(scenario.clone(), seed);
            game.result_dir.clone_from(&games_dir);
            let outcome = run_game(&game, Arc::clone(data)).map_err(|e| {
                warn!(game = i, seed, error = %e, "Game failed");
                BatchError {
                    game_index: i,
                    seed,
                    message: e.to_string(),
                }
            })?;
            let done = progress.record_completion();
            if done % 100 == 0 {
                info!(
                    "Progress: {}/{} ({:.0}%)",
                    done,
                    progress.total,
                    progress.percentage()
                );
            } else if done % 10 == 0 {
                debug!("Progress: {}/{}", done, progress.total);
            }
            Ok(outcome.metrics)
        })
        .collect()
}

/// Run a batch of games.
pub fn run_batch(config: BatchConfig, scenario: &Scenario, data: Arc<GameData>) -> BatchResults {
    let start = Instant::now();
    info!(
        "Starting batch run: {} games of '{}' from seed {}",
        config.game_count, config.scenario, config.seed_start
    );

    let results = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build()
        {
            Ok(pool) => pool.install(|| play_all(&config, scenario, &data)),
            Err(e) => {
                warn!(error = %e, "Could not build thread pool; using the global pool");
                play_all(&config, scenario, &data)
            }
        }
    } else {
        play_all(&config, scenario, &data)
    };

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let games: Vec<GameMetrics> = games.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_games(&games, scenario.config.regulation_innings);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        "Batch complete: {} games in {:.1}s ({:.1} games/sec)",
        games.len(),
        duration_seconds,
        games.len() as f64 / duration_seconds.max(f64::EPSILON)
    );

    BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    }
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismReport {
    /// Seed checked.
    pub seed: u64,
    /// Log hash per run.
    pub hashes: Vec<u64>,
}

impl DeterminismReport {
    /// Every run produced the same log.
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Play the same seed `runs` times on the rayon pool and compare hashes.
pub fn verify_determinism(
    scenario: &Scenario,
    data: &Arc<GameData>,
    seed: u64,
    runs: u32,
) -> Result<DeterminismReport, RunError> {
    let hashes = (0..runs)
        .into_par_iter()
        .map(|_| {
            run_game(&GameConfig::new(scenario.clone(), seed), Arc::clone(data))
                .map(|outcome| outcome.result.log_hash)
        })
        .collect::<Result<Vec<u64>, _>>()?;
    Ok(DeterminismReport { seed, hashes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Arc<GameData> {
        Arc::new(GameData::builtin().unwrap())
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new("custom", 500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345);
        assert_eq!(config.scenario, "custom");
        assert_eq!(config.game_count, 500);
        assert_eq!(config.seed_start, 12345);
    }

    #[test]
    fn test_progress_tracking() {
        let progress = BatchProgress::new(4);
        assert_eq!(progress.current(), 0);
        progress.record_completion();
        assert_eq!(progress.record_completion(), 2);
        assert!((progress.percentage() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_batch_small() {
        let config = BatchConfig::new("Exhibition", 8).with_seed(40);
        let results = run_batch(config, &Scenario::exhibition(), data());
        assert_eq!(results.games.len(), 8);
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_games, 8);
        let seeds: Vec<u64> = results.games.iter().map(|g| g.seed).collect();
        assert_eq!(seeds, (40..48).collect::<Vec<u64>>());
    }

    #[test]
    fn test_batch_matches_sequential_runs() {
        let mut config = BatchConfig::new("Exhibition", 4);
        config.parallel_games = 2;
        let results = run_batch(config, &Scenario::exhibition(), data());
        for game in &results.games {
            let solo = run_game(&GameConfig::new(Scenario::exhibition(), game.seed), data()).unwrap();
            assert_eq!(solo.result.log_hash, game.log_hash);
        }
    }

    #[test]
    fn test_failed_games_are_collected() {
        let mut scenario = Scenario::exhibition();
        scenario.umpire = Some("nobody".into());
        let results = run_batch(BatchConfig::new("broken", 3), &scenario, data());
        assert!(results.games.is_empty());
        assert_eq!(results.errors.len(), 3);
        assert_eq!(results.summary.total_games, 0);
    }

    #[test]
    fn test_verify_determinism() {
        let report = verify_determinism(&Scenario::exhibition(), &data(), 12345, 3).unwrap();
        assert_eq!(report.hashes.len(), 3);
        assert!(report.is_deterministic());
    }

    #[test]
    fn test_batch_results_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BatchConfig::new("Exhibition", 3).with_output(dir.path().to_path_buf());
        config.save_games = true;
        let results = run_batch(config, &Scenario::exhibition(), data());

        let path = dir.path().join("batch.json");
        results.save(&path).unwrap();
        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games.len(), 3);
        assert_eq!(loaded.config.scenario, "Exhibition");
        assert_eq!(loaded.summary.total_games, results.summary.total_games);
        assert!(dir.path().join("games").join("match_0.json").exists());
    }
}
