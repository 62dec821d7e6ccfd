//! Headless match runner for batch simulation and CI verification.
//!
//! This crate drives `diamond_core` matches without any presentation
//! layer:
//!
//! - **Single runs**: play one scenario under one seed, writing the result
//!   and telemetry as JSON
//! - **Batches**: play many seeds in parallel and aggregate win rates,
//!   scoring and finish types
//! - **Verification**: re-run seeds and replays and compare event-log
//!   hashes
//! - **Validation**: check data-table overrides and scenario files
//!
//! Logs go to stderr; stdout carries only JSON.
//!
//! # Example
//!
//! ```bash
//! # Play the built-in exhibition
//! cargo run -p diamond_headless -- run --seed 7
//!
//! # Run a batch
//! cargo run -p diamond_headless -- batch --count 1000 --output results/
//!
//! # Verify a recorded replay
//! cargo run -p diamond_headless -- replay --file match.replay
//! ```

pub mod batch;
pub mod data_loader;
pub mod game_runner;
pub mod metrics;
pub mod scenario;
pub mod sinks;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, DeterminismReport};
pub use data_loader::{load_game_data, scenario_issues, DataLoadError};
pub use game_runner::{run_game, GameConfig, GameOutcome, RunError};
pub use metrics::{BatchSummary, GameMetrics, SideMetrics};
pub use scenario::{Scenario, ScenarioError};
pub use sinks::{JsonLinesSink, JsonResultSink};
