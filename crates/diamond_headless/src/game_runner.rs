//! Single-match execution for headless runs.
//!
//! Wires the optional listeners (telemetry to a JSON-lines file, dugout
//! chatter) onto a [`Match`], plays it, and hands the result to any
//! result sinks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};

use diamond_core::controller::{hand_back, Match, MatchResult, ResultSink};
use diamond_core::data::GameData;
use diamond_core::dugout::{DugoutListener, DUGOUT_TOPICS};
use diamond_core::error::SimError;
use diamond_core::replay::MatchReplay;
use diamond_core::telemetry::TelemetryCollector;

use crate::metrics::GameMetrics;
use crate::scenario::Scenario;
use crate::sinks::{JsonLinesSink, JsonResultSink};

/// Errors from running one match.
#[derive(Debug, Error)]
pub enum RunError {
    /// The match could not start or be encoded.
    #[error(transparent)]
    Sim(#[from] SimError),
    /// An output file could not be opened.
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for a single match run.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Scenario to play.
    pub scenario: Scenario,
    /// Match seed.
    pub seed: u64,
    /// JSON-lines telemetry file.
    pub telemetry: Option<PathBuf>,
    /// Directory for the JSON match result.
    pub result_dir: Option<PathBuf>,
    /// Attach the dugout chatter listener.
    pub chatter: bool,
}

impl GameConfig {
    /// Plain run of a scenario under one seed.
    #[must_use]
    pub fn new(scenario: Scenario, seed: u64) -> Self {
        Self {
            scenario,
            seed,
            telemetry: None,
            result_dir: None,
            chatter: false,
        }
    }
}

/// Outcome of one match run.
#[derive(Debug, Clone)]
pub struct GameOutcome {
    /// Full result.
    pub result: MatchResult,
    /// Condensed metrics.
    pub metrics: GameMetrics,
    /// Replay fingerprint.
    pub replay: MatchReplay,
    /// Result sinks that failed.
    pub sink_failures: usize,
}

/// Play one match.
pub fn run_game(config: &GameConfig, data: Arc<GameData>) -> Result<GameOutcome, RunError> {
    let started = Instant::now();
    let setup = config.scenario.to_setup(config.seed);
    let home_ids: Vec<u32> = setup.home.players().map(|p| p.id).collect();
    let mut game = Match::new(setup.clone(), data)?;

    if let Some(path) = &config.telemetry {
        let sink = JsonLinesSink::create(path)?;
        let threshold = setup.config.telemetry_flush_threshold;
        game.subscribe(
            Box::new(TelemetryCollector::new(threshold).with_sink(Box::new(sink))),
            &[],
        );
    }
    if config.chatter {
        game.subscribe(
            Box::new(DugoutListener::new(&setup.home, &setup.away)),
            DUGOUT_TOPICS,
        );
    }

    let result = game.play()?;
    let replay = MatchReplay::record(&setup, &result)?;

    let mut sinks: Vec<Box<dyn ResultSink>> = Vec::new();
    if let Some(dir) = &config.result_dir {
        sinks.push(Box::new(JsonResultSink::new(dir)));
    }
    let sink_failures = hand_back(&result, &mut sinks);
    if sink_failures > 0 {
        warn!(seed = config.seed, sink_failures, "Result sinks failed");
    }

    let metrics = GameMetrics::from_result(&result, &home_ids);
    info!(
        seed = config.seed,
        home = result.home_score,
        away = result.away_score,
        termination = ?result.termination,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Game finished"
    );
    Ok(GameOutcome {
        result,
        metrics,
        replay,
        sink_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_core::events::MatchEvent;

    fn data() -> Arc<GameData> {
        Arc::new(GameData::builtin().unwrap())
    }

    #[test]
    fn test_run_exhibition() {
        let outcome = run_game(&GameConfig::new(Scenario::exhibition(), 3), data()).unwrap();
        assert_eq!(outcome.metrics.seed, 3);
        assert_eq!(outcome.replay.final_hash, outcome.result.log_hash);
        assert_eq!(outcome.sink_failures, 0);
        outcome.replay.verify(data()).unwrap();
    }

    #[test]
    fn test_outputs_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GameConfig::new(Scenario::exhibition(), 8);
        config.telemetry = Some(dir.path().join("telemetry.jsonl"));
        config.result_dir = Some(dir.path().join("results"));
        config.chatter = true;
        let outcome = run_game(&config, data()).unwrap();

        let records = crate::sinks::read_json_lines(dir.path().join("telemetry.jsonl")).unwrap();
        assert!(!records.is_empty());
        assert!(dir.path().join("results").join("match_8.json").exists());
        assert!(outcome
            .result
            .log
            .iter()
            .all(|e| !matches!(e, MatchEvent::TelemetryFlushed { .. })));
    }

    #[test]
    fn test_invalid_scenario_is_rejected() {
        let mut scenario = Scenario::exhibition();
        scenario.home.lineup.pop();
        let err = run_game(&GameConfig::new(scenario, 1), data()).unwrap_err();
        assert!(matches!(err, RunError::Sim(SimError::InvalidRoster { .. })));
    }
}
