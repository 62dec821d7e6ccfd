//! Data table loading for headless runs.
//!
//! The core ships its tables compiled in. A data directory may override
//! any of them with a file of the same name; missing files fall back to
//! the built-in table.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use diamond_core::data::{GameData, PitchTable, TraitTable, UmpireTable, WeatherTable};
use diamond_core::error::SimError;

use crate::scenario::Scenario;

/// Trait table file name.
pub const TRAITS_FILE: &str = "traits.ron";
/// Umpire table file name.
pub const UMPIRES_FILE: &str = "umpires.ron";
/// Weather table file name.
pub const WEATHER_FILE: &str = "weather.ron";
/// Pitch table file name.
pub const PITCHES_FILE: &str = "pitches.ron";

/// Errors from loading data tables.
#[derive(Debug, Error)]
pub enum DataLoadError {
    /// Data directory does not exist.
    #[error("Data directory not found: {0}")]
    DirectoryNotFound(String),
    /// A table file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// A table failed to parse.
    #[error(transparent)]
    Parse(#[from] SimError),
}

fn read_override(dir: &Path, file: &str) -> Result<Option<String>, DataLoadError> {
    let path: PathBuf = dir.join(file);
    if !path.exists() {
        debug!(file, "No override; using built-in table");
        return Ok(None);
    }
    fs::read_to_string(&path)
        .map(Some)
        .map_err(|source| DataLoadError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Built-in tables with any overrides found in `dir`.
pub fn load_game_data(dir: Option<&Path>) -> Result<GameData, DataLoadError> {
    let mut data = GameData::builtin()?;
    let Some(dir) = dir else {
        return Ok(data);
    };
    if !dir.is_dir() {
        return Err(DataLoadError::DirectoryNotFound(dir.display().to_string()));
    }
    if let Some(text) = read_override(dir, TRAITS_FILE)? {
        data.traits = TraitTable::from_ron(&text)?;
    }
    if let Some(text) = read_override(dir, UMPIRES_FILE)? {
        data.umpires = UmpireTable::from_ron(&text)?;
    }
    if let Some(text) = read_override(dir, WEATHER_FILE)? {
        data.weather = WeatherTable::from_ron(&text)?;
    }
    if let Some(text) = read_override(dir, PITCHES_FILE)? {
        data.pitches = PitchTable::from_ron(&text)?;
    }
    info!(
        dir = %dir.display(),
        traits = data.traits.traits.len(),
        umpires = data.umpires.umpires.len(),
        weather = data.weather.archetypes.len(),
        "Loaded data tables"
    );
    Ok(data)
}

/// Problems a scenario would hit against the given tables.
///
/// Unknown skills are ignored by the engine, so they are reported here
/// rather than failing a match.
#[must_use]
pub fn scenario_issues(scenario: &Scenario, data: &GameData) -> Vec<String> {
    let mut issues = Vec::new();
    if let Err(err) = scenario.validate() {
        issues.push(err.to_string());
    }
    for team in [&scenario.home, &scenario.away] {
        for player in team.players() {
            for skill in &player.skills {
                if data.traits.get(skill).is_none() {
                    issues.push(format!(
                        "{}: {} has unknown skill '{skill}'",
                        team.name, player.name
                    ));
                }
            }
        }
    }
    if let Some(key) = &scenario.umpire {
        if data.umpires.get(key).is_none() {
            issues.push(format!("unknown umpire '{key}'"));
        }
    }
    if let Some(key) = &scenario.weather {
        if data.weather.get(key).is_none() {
            issues.push(format!("unknown weather '{key}'"));
        }
    }
    issues
}
