//! Data-driven lookup tables.
//!
//! Traits, umpires, weather archetypes and pitch physics are described in
//! RON and parsed once into immutable tables. New traits are data, not new
//! code paths: their requirements and conditions run through a small
//! predicate interpreter in [`trait_data`].
//!
//! **Note:** This module does no file IO. Built-in tables are compiled in
//! with `include_str!`; callers that load overrides from disk hand the text
//! to the `from_ron` constructors.

mod pitch_data;
mod trait_data;
mod umpire_data;
mod weather_data;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

pub use pitch_data::{ArmSlotProfile, BreakPlane, PitchProfile, PitchTable};
pub use trait_data::{
    Condition, Requirement, RollDelta, RollKind, StatDelta, TraitDef, TraitFlag, TraitKind,
    TraitTable,
};
pub use umpire_data::{UmpireProfile, UmpireTable};
pub use weather_data::{Precipitation, WeatherProfile, WeatherTable};

const BUILTIN_TRAITS: &str = include_str!("../../data/traits.ron");
const BUILTIN_UMPIRES: &str = include_str!("../../data/umpires.ron");
const BUILTIN_WEATHER: &str = include_str!("../../data/weather.ron");
const BUILTIN_PITCHES: &str = include_str!("../../data/pitches.ron");

/// Parse a RON document, tagging failures with the table name.
pub(crate) fn parse_ron<T: DeserializeOwned>(source_name: &str, text: &str) -> Result<T> {
    ron::from_str(text).map_err(|e| SimError::DataParse {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}

/// Every table the engine consults during a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    /// Skills and traits.
    pub traits: TraitTable,
    /// Plate umpire presets.
    pub umpires: UmpireTable,
    /// Weather archetypes.
    pub weather: WeatherTable,
    /// Pitch physics and arm slots.
    pub pitches: PitchTable,
}

impl GameData {
    /// Tables compiled into the crate.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DataParse`] if a built-in table is malformed,
    /// which the test suite guards against.
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            traits: TraitTable::from_ron(BUILTIN_TRAITS)?,
            umpires: UmpireTable::from_ron(BUILTIN_UMPIRES)?,
            weather: WeatherTable::from_ron(BUILTIN_WEATHER)?,
            pitches: PitchTable::from_ron(BUILTIN_PITCHES)?,
        })
    }

    /// Cross-table consistency problems, one message per issue.
    ///
    /// An empty list means the data is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut issues = self.traits.validate();
        issues.extend(self.umpires.validate());
        issues.extend(self.weather.validate());
        issues.extend(self.pitches.validate());
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_parse() {
        let data = GameData::builtin().unwrap();
        assert!(data.traits.get("mental_wall").is_some());
        assert_eq!(data.umpires.umpires.len(), 5);
        assert_eq!(data.weather.archetypes.len(), 6);
        assert_eq!(data.pitches.pitches.len(), 14);
    }

    #[test]
    fn test_builtin_tables_validate_clean() {
        let data = GameData::builtin().unwrap();
        assert!(data.validate().is_empty(), "{:?}", data.validate());
    }

    #[test]
    fn test_parse_error_names_source() {
        let err = parse_ron::<TraitTable>("traits", "TraitTable(traits: [oops])").unwrap_err();
        match err {
            SimError::DataParse { source_name, .. } => assert_eq!(source_name, "traits"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
