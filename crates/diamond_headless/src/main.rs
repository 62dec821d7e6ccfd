//! Headless baseball match runner.
//!
//! # Usage
//!
//! ```bash
//! # Play one match and print its metrics as JSON
//! cargo run -p diamond_headless -- run --seed 42 --telemetry out/telemetry.jsonl
//!
//! # Run a batch of matches in parallel
//! cargo run -p diamond_headless -- batch --count 1000 --output results/
//!
//! # Verify determinism of one seed
//! cargo run -p diamond_headless -- verify --seed 12345 --runs 5
//!
//! # Verify a recorded replay
//! cargo run -p diamond_headless -- replay --file out/match.replay
//!
//! # Validate data overrides and a scenario
//! cargo run -p diamond_headless -- validate --data data/ --scenario scenarios/derby.ron
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use diamond_core::data::GameData;
use diamond_core::player::TeamSide;
use diamond_core::replay::MatchReplay;
use diamond_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    data_loader::{load_game_data, scenario_issues},
    game_runner::{run_game, GameConfig},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "diamond_headless")]
#[command(about = "Headless baseball match runner for batch simulation and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single match
    Run {
        /// Scenario file (defaults to the built-in exhibition)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Match seed
        #[arg(long, default_value = "1")]
        seed: u64,

        /// Directory with data-table overrides
        #[arg(long)]
        data: Option<PathBuf>,

        /// JSON-lines telemetry output file
        #[arg(long)]
        telemetry: Option<PathBuf>,

        /// Directory for the full JSON match result
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a replay file
        #[arg(long)]
        record: Option<PathBuf>,

        /// Attach dugout chatter
        #[arg(long)]
        chatter: bool,
    },

    /// Run a batch of matches in parallel
    Batch {
        /// Scenario file (defaults to the built-in exhibition)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of matches to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel matches (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Directory with data-table overrides
        #[arg(long)]
        data: Option<PathBuf>,

        /// Save every match result as JSON
        #[arg(long)]
        save_games: bool,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        /// Scenario file (defaults to the built-in exhibition)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Directory with data-table overrides
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Re-run a recorded match and check it reproduces
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Directory with data-table overrides
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Validate data tables and a scenario
    Validate {
        /// Directory with data-table overrides
        #[arg(long)]
        data: Option<PathBuf>,

        /// Scenario file to check against the tables
        #[arg(short, long)]
        scenario: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs to stderr; stdout is reserved for JSON
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            seed,
            data,
            telemetry,
            output,
            record,
            chatter,
        } => {
            let config = GameConfig {
                scenario: load_scenario(scenario.as_deref()),
                seed,
                telemetry,
                result_dir: output,
                chatter,
            };
            cmd_run(&config, load_data(data.as_deref()), record.as_deref());
        }
        Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            data,
            save_games,
        } => {
            let scenario = load_scenario(scenario.as_deref());
            let config = BatchConfig {
                scenario: scenario.name.clone(),
                game_count: count,
                parallel_games: parallel,
                output_dir: output,
                seed_start: seed,
                save_games,
            };
            cmd_batch(config, &scenario, load_data(data.as_deref()));
        }
        Commands::Verify {
            scenario,
            seed,
            runs,
            data,
        } => cmd_verify(
            &load_scenario(scenario.as_deref()),
            &load_data(data.as_deref()),
            seed,
            runs,
        ),
        Commands::Replay { file, data } => cmd_replay(&file, load_data(data.as_deref())),
        Commands::Validate { data, scenario } => cmd_validate(data.as_deref(), scenario.as_deref()),
    }
}

fn fail(message: &str) -> ! {
    tracing::error!("{message}");
    eprintln!("FATAL: {message}");
    std::process::exit(1);
}

fn load_scenario(path: Option<&Path>) -> Scenario {
    match path {
        Some(path) => {
            tracing::info!("Loading scenario: {}", path.display());
            Scenario::load(path).unwrap_or_else(|e| fail(&e.to_string()))
        }
        None => Scenario::exhibition(),
    }
}

fn load_data(dir: Option<&Path>) -> Arc<GameData> {
    let data = load_game_data(dir).unwrap_or_else(|e| fail(&e.to_string()));
    for issue in data.validate() {
        tracing::warn!("Data issue: {issue}");
    }
    Arc::new(data)
}

fn cmd_run(config: &GameConfig, data: Arc<GameData>, record: Option<&Path>) {
    tracing::info!(
        "Playing '{}' with seed {}",
        config.scenario.name,
        config.seed
    );
    let outcome = run_game(config, data).unwrap_or_else(|e| fail(&e.to_string()));
    let result = &outcome.result;

    eprintln!("\n{} at {} ({:?})", result.away, result.home, result.termination);
    for (side, name, runs) in [
        (TeamSide::Away, &result.away, result.away_score),
        (TeamSide::Home, &result.home, result.home_score),
    ] {
        let line: Vec<String> = result.line_score(side).iter().map(u32::to_string).collect();
        eprintln!("  {:<16} {}  - {}", name, line.join(" "), runs);
    }
    eprintln!("  Umpire: {}  Weather: {}", result.umpire, result.weather);

    if let Some(path) = record {
        let bytes = outcome
            .replay
            .to_bytes()
            .unwrap_or_else(|e| fail(&e.to_string()));
        if let Err(e) = std::fs::write(path, bytes) {
            fail(&format!("Failed to write replay {}: {e}", path.display()));
        }
        eprintln!("  Replay saved to: {}", path.display());
    }

    match serde_json::to_string_pretty(&outcome.metrics) {
        Ok(json) => println!("{json}"),
        Err(e) => fail(&format!("Failed to encode metrics: {e}")),
    }
}

fn cmd_batch(config: BatchConfig, scenario: &Scenario, data: Arc<GameData>) {
    if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
        fail(&format!(
            "Cannot create output directory {}: {e}",
            config.output_dir.display()
        ));
    }
    let results_path = config.output_dir.join("batch.json");
    let results = run_batch(config, scenario, data);

    if let Err(e) = results.save(&results_path) {
        fail(&format!("Failed to save results: {e}"));
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprint!("{}", results.summary.report());
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    if !results.errors.is_empty() {
        eprintln!("\nGames FAILED: {}", results.errors.len());
        for err in results.errors.iter().take(10) {
            eprintln!("  game {} (seed {}): {}", err.game_index, err.seed, err.message);
        }
        if results.errors.len() > 10 {
            eprintln!("  ... and {} more failures", results.errors.len() - 10);
        }
    }
    eprintln!("\nResults saved to: {}", results_path.display());
}

fn cmd_verify(scenario: &Scenario, data: &Arc<GameData>, seed: u64, runs: u32) {
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );
    let report = verify_determinism(scenario, data, seed, runs).unwrap_or_else(|e| fail(&e.to_string()));
    if report.is_deterministic() {
        eprintln!("PASS: All {runs} runs produced identical event logs");
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (i, hash) in report.hashes.iter().enumerate() {
            eprintln!("  run {i}: {hash:016x}");
        }
        std::process::exit(1);
    }
}

fn cmd_replay(file: &Path, data: Arc<GameData>) {
    tracing::info!("Verifying replay: {}", file.display());
    let bytes = std::fs::read(file)
        .unwrap_or_else(|e| fail(&format!("Failed to read replay {}: {e}", file.display())));
    let replay = MatchReplay::from_bytes(&bytes).unwrap_or_else(|e| fail(&e.to_string()));

    eprintln!("Loaded replay:");
    eprintln!("  Seed: {}", replay.seed);
    eprintln!("  Events: {}", replay.event_count);

    match replay.verify(data) {
        Ok(result) => {
            eprintln!("PASS: Replay verification successful");
            eprintln!("  Hash: {:016x}", result.log_hash);
            eprintln!(
                "  Final: {} {} - {} {}",
                result.away, result.away_score, result.home, result.home_score
            );
        }
        Err(e) => {
            eprintln!("FAIL: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_validate(data_dir: Option<&Path>, scenario: Option<&Path>) {
    let data = load_game_data(data_dir).unwrap_or_else(|e| fail(&e.to_string()));
    let mut issues = data.validate();
    if let Some(path) = scenario {
        match Scenario::load(path) {
            Ok(scenario) => issues.extend(scenario_issues(&scenario, &data)),
            Err(e) => issues.push(e.to_string()),
        }
    }
    if issues.is_empty() {
        eprintln!("OK: data tables{} valid", if scenario.is_some() { " and scenario" } else { "" });
    } else {
        eprintln!("Found {} issue(s):", issues.len());
        for issue in &issues {
            eprintln!("  - {issue}");
        }
        std::process::exit(1);
    }
}
