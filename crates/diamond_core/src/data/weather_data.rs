//! Weather archetypes.

use serde::{Deserialize, Serialize};

use super::parse_ron;
use crate::error::Result;
use crate::rng::MatchRng;

/// Precipitation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Precipitation {
    /// No rain.
    #[default]
    Dry,
    /// Light rain.
    Drizzle,
    /// Steady rain.
    Steady,
}

/// Environmental modifiers applied for the whole match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherProfile {
    /// Lookup key.
    pub key: String,
    /// Display label.
    pub label: String,
    /// Precipitation level.
    #[serde(default)]
    pub precipitation: Precipitation,
    /// Fractional change to batted-ball carry.
    #[serde(default)]
    pub carry: f64,
    /// Additive fielding-error probability.
    #[serde(default)]
    pub error: f64,
    /// Additive wild-pitch probability; also erodes control.
    #[serde(default)]
    pub wild_pitch: f64,
    /// Multiplier on per-pitch stamina cost.
    #[serde(default = "default_stamina_scalar")]
    pub stamina_scalar: f64,
    /// Launch-angle shift toward the ground (degrees).
    #[serde(default)]
    pub ground_ball_bonus: f64,
    /// Relative draw weight.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Broadcast line.
    #[serde(default)]
    pub commentary: String,
}

const fn default_stamina_scalar() -> f64 {
    1.0
}

const fn default_weight() -> f64 {
    1.0
}

impl WeatherProfile {
    /// Calm conditions with no modifiers.
    #[must_use]
    pub fn calm() -> Self {
        Self {
            key: "calm".into(),
            label: "Calm".into(),
            precipitation: Precipitation::Dry,
            carry: 0.0,
            error: 0.0,
            wild_pitch: 0.0,
            stamina_scalar: 1.0,
            ground_ball_bonus: 0.0,
            weight: 1.0,
            commentary: String::new(),
        }
    }

    /// Whether any rain is falling.
    #[must_use]
    pub fn is_wet(&self) -> bool {
        self.precipitation != Precipitation::Dry
    }
}

/// Weighted list of weather archetypes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherTable {
    /// All archetypes.
    pub archetypes: Vec<WeatherProfile>,
}

impl WeatherTable {
    /// Parse a table from RON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SimError::DataParse`] on malformed input.
    pub fn from_ron(text: &str) -> Result<Self> {
        parse_ron("weather", text)
    }

    /// Look up an archetype by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&WeatherProfile> {
        self.archetypes.iter().find(|w| w.key.eq_ignore_ascii_case(key))
    }

    /// Weighted draw; calm conditions if the table is empty.
    pub fn pick(&self, rng: &mut MatchRng) -> WeatherProfile {
        let weights: Vec<f64> = self.archetypes.iter().map(|w| w.weight).collect();
        rng.pick_weighted(&weights)
            .and_then(|i| self.archetypes.get(i))
            .cloned()
            .unwrap_or_else(WeatherProfile::calm)
    }

    pub(crate) fn validate(&self) -> Vec<String> {
        self.archetypes
            .iter()
            .filter_map(|w| {
                if w.stamina_scalar <= 0.0 {
                    Some(format!("weather '{}' stamina_scalar must be positive", w.key))
                } else if w.carry <= -1.0 {
                    Some(format!("weather '{}' carry would erase all distance", w.key))
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rain_is_wet() {
        let table = WeatherTable::from_ron(include_str!("../../data/weather.ron")).unwrap();
        assert!(table.get("steady_rain").unwrap().is_wet());
        assert!(!table.get("crisp_calm").unwrap().is_wet());
    }

    #[test]
    fn test_empty_table_is_calm() {
        let mut rng = MatchRng::new(5);
        let weather = WeatherTable::default().pick(&mut rng);
        assert_eq!(weather.carry, 0.0);
        assert_eq!(weather.stamina_scalar, 1.0);
    }
}
