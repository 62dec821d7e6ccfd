//! Plate umpire presets.

use serde::{Deserialize, Serialize};

use super::parse_ron;
use crate::error::Result;
use crate::rng::MatchRng;

/// Tendencies of one plate umpire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmpireProfile {
    /// Lookup key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Flavour text.
    #[serde(default)]
    pub description: String,
    /// Positive squeezes the zone, negative widens it.
    #[serde(default)]
    pub zone_bias: f64,
    /// Positive favours home pitchers, negative favours home batters.
    #[serde(default)]
    pub home_bias: f64,
    /// Emotional swing on borderline calls (0-1).
    #[serde(default)]
    pub temperament: f64,
    /// 0 wide zone, 1 very tight.
    #[serde(default = "default_strictness")]
    pub strictness: f64,
    /// 0 chaotic, 1 repeatable.
    #[serde(default = "default_consistency")]
    pub consistency: f64,
    /// How far catcher receiving moves borderline calls.
    #[serde(default = "default_framing_factor")]
    pub framing_factor: f64,
    /// Relative draw weight.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

const fn default_strictness() -> f64 {
    0.5
}

const fn default_consistency() -> f64 {
    0.7
}

const fn default_framing_factor() -> f64 {
    0.35
}

const fn default_weight() -> f64 {
    1.0
}

impl UmpireProfile {
    /// A perfectly neutral umpire, used when the table is empty.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            key: "neutral".into(),
            name: "Neutral Umpire".into(),
            description: String::new(),
            zone_bias: 0.0,
            home_bias: 0.0,
            temperament: 0.0,
            strictness: default_strictness(),
            consistency: default_consistency(),
            framing_factor: default_framing_factor(),
            weight: default_weight(),
        }
    }
}

/// Weighted list of umpire presets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UmpireTable {
    /// All presets.
    pub umpires: Vec<UmpireProfile>,
}

impl UmpireTable {
    /// Parse a table from RON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SimError::DataParse`] on malformed input.
    pub fn from_ron(text: &str) -> Result<Self> {
        parse_ron("umpires", text)
    }

    /// Look up a preset by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&UmpireProfile> {
        self.umpires.iter().find(|u| u.key.eq_ignore_ascii_case(key))
    }

    /// Weighted draw; the neutral umpire if the table is empty.
    pub fn pick(&self, rng: &mut MatchRng) -> UmpireProfile {
        let weights: Vec<f64> = self.umpires.iter().map(|u| u.weight).collect();
        rng.pick_weighted(&weights)
            .and_then(|i| self.umpires.get(i))
            .cloned()
            .unwrap_or_else(UmpireProfile::neutral)
    }

    pub(crate) fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for ump in &self.umpires {
            for (field, value) in [
                ("temperament", ump.temperament),
                ("strictness", ump.strictness),
                ("consistency", ump.consistency),
                ("framing_factor", ump.framing_factor),
            ] {
                if !(0.0..=1.0).contains(&value) {
                    issues.push(format!("umpire '{}' {field} {value} outside [0, 1]", ump.key));
                }
            }
            if ump.weight < 0.0 {
                issues.push(format!("umpire '{}' has a negative weight", ump.key));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let table = UmpireTable::from_ron(r#"UmpireTable(umpires: [(key: "x", name: "X")])"#).unwrap();
        let ump = table.get("X").unwrap();
        assert_eq!(ump.strictness, 0.5);
        assert_eq!(ump.consistency, 0.7);
        assert_eq!(ump.framing_factor, 0.35);
    }

    #[test]
    fn test_pick_from_empty_is_neutral() {
        let mut rng = MatchRng::new(1);
        assert_eq!(UmpireTable::default().pick(&mut rng).key, "neutral");
    }

    #[test]
    fn test_pick_is_seeded() {
        let table = UmpireTable::from_ron(include_str!("../../data/umpires.ron")).unwrap();
        let a = table.pick(&mut MatchRng::new(99)).key;
        let b = table.pick(&mut MatchRng::new(99)).key;
        assert_eq!(a, b);
    }

    #[test]
    fn test_out_of_range_reported() {
        let mut table = UmpireTable::default();
        let mut ump = UmpireProfile::neutral();
        ump.consistency = 1.4;
        table.umpires.push(ump);
        assert_eq!(table.validate().len(), 1);
    }
}
