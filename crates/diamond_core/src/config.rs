//! Match configuration and tuning knobs.
//!
//! [`MatchConfig`] covers the rules of a single match. [`Tuning`] holds
//! every numeric threshold that shapes outcomes without being a rule:
//! batted-ball classification cutoffs, contact cutoffs, fatigue
//! thresholds and the like. Both deserialize from RON with every field
//! optional.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Early-termination rule for lopsided games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MercyRule {
    /// Lead (in runs) that ends the game.
    pub run_margin: u32,
    /// First inning after which the rule applies.
    pub from_inning: u32,
}

/// Rules for a single match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Innings in a regulation game.
    pub regulation_innings: u32,
    /// Final inning before a tied game is recorded as a draw.
    pub max_innings: u32,
    /// Optional mercy rule.
    pub mercy: Option<MercyRule>,
    /// Shake-offs allowed before the catcher's sign is forced.
    pub shake_cap: u8,
    /// Minimum absolute confidence change that is published as an event.
    pub confidence_materiality: i32,
    /// Buffered telemetry records that trigger a flush.
    pub telemetry_flush_threshold: usize,
    /// Pitch count at which the starter is pulled, if any.
    pub pitcher_pull_count: Option<u32>,
    /// Whether pitchers can be injured by high pitch counts.
    pub injuries_enabled: bool,
    /// Numeric tuning.
    pub tuning: Tuning,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            regulation_innings: 9,
            max_innings: 12,
            mercy: None,
            shake_cap: 3,
            confidence_materiality: 5,
            telemetry_flush_threshold: 64,
            pitcher_pull_count: Some(115),
            injuries_enabled: false,
            tuning: Tuning::default(),
        }
    }
}

impl MatchConfig {
    /// Parse a configuration from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DataParse`] on malformed RON and
    /// [`SimError::InvalidConfig`] if the values are out of range.
    pub fn from_ron(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| SimError::DataParse {
            source_name: "match config".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the rules describe a playable match.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.regulation_innings == 0 {
            return Err(SimError::InvalidConfig(
                "regulation_innings must be at least 1".into(),
            ));
        }
        if self.max_innings < self.regulation_innings {
            return Err(SimError::InvalidConfig(format!(
                "max_innings ({}) is shorter than regulation ({})",
                self.max_innings, self.regulation_innings
            )));
        }
        if self.shake_cap == 0 {
            return Err(SimError::InvalidConfig("shake_cap must be at least 1".into()));
        }
        if let Some(mercy) = self.mercy {
            if mercy.run_margin == 0 {
                return Err(SimError::InvalidConfig(
                    "mercy run_margin must be positive".into(),
                ));
            }
        }
        if self.telemetry_flush_threshold == 0 {
            return Err(SimError::InvalidConfig(
                "telemetry_flush_threshold must be positive".into(),
            ));
        }
        self.tuning.validate()
    }
}

/// Numeric thresholds that shape outcomes.
///
/// None of these are rules of the game; they are balance knobs and carry
/// no guarantee of being balanced out of the box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Launch angles below this are ground balls (degrees).
    pub ground_ball_max_angle: f64,
    /// Launch angles below this (and above the ground cutoff) are line drives.
    pub line_drive_max_angle: f64,
    /// Contact quality below this is a swinging miss.
    pub miss_below: f64,
    /// Contact quality below this (and at or above the miss cutoff) is a foul.
    pub foul_below: f64,
    /// Fence distance in feet.
    pub fence_distance_ft: f64,
    /// Divisor applied to vacuum carry distance for air resistance.
    pub air_resistance: f64,
    /// Average ground-ball transit speed in feet per second.
    pub ground_ball_speed_fps: f64,
    /// Pitch count after which velocity starts to fade.
    pub velocity_fatigue_start: u32,
    /// Pitch count after which control starts to fade.
    pub control_fatigue_start: u32,
    /// Pitch count after which velocity fades steeply.
    pub steep_fatigue_start: u32,
    /// Floor for effective control.
    pub control_floor: f64,
    /// Hard cap on wild-pitch probability.
    pub wild_pitch_cap: f64,
    /// Share of a positive swing pulled into loyal teammates.
    pub loyalty_pull: f64,
    /// Share of a negative swing dragged into volatile teammates.
    pub volatility_drag: f64,
    /// Momentum meter bound (symmetric).
    pub momentum_bound: i32,
    /// Momentum value at which a team is "in the zone".
    pub momentum_zone: i32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            ground_ball_max_angle: 10.0,
            line_drive_max_angle: 25.0,
            miss_below: 0.0,
            foul_below: 20.0,
            fence_distance_ft: 330.0,
            air_resistance: 1.58,
            ground_ball_speed_fps: 95.0,
            velocity_fatigue_start: 80,
            control_fatigue_start: 90,
            steep_fatigue_start: 100,
            control_floor: 5.0,
            wild_pitch_cap: 0.35,
            loyalty_pull: 0.18,
            volatility_drag: 0.2,
            momentum_bound: 20,
            momentum_zone: 10,
        }
    }
}

impl Tuning {
    fn validate(&self) -> Result<()> {
        if self.ground_ball_max_angle >= self.line_drive_max_angle {
            return Err(SimError::InvalidConfig(
                "ground-ball cutoff must be below the line-drive cutoff".into(),
            ));
        }
        if self.miss_below > self.foul_below {
            return Err(SimError::InvalidConfig(
                "miss cutoff must not exceed the foul cutoff".into(),
            ));
        }
        if self.fence_distance_ft <= 0.0 || self.air_resistance <= 0.0 {
            return Err(SimError::InvalidConfig(
                "fence distance and air resistance must be positive".into(),
            ));
        }
        if self.ground_ball_speed_fps <= 0.0 {
            return Err(SimError::InvalidConfig(
                "ground-ball speed must be positive".into(),
            ));
        }
        if self.momentum_bound <= 0 || self.momentum_zone > self.momentum_bound {
            return Err(SimError::InvalidConfig(
                "momentum zone must sit inside a positive bound".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.shake_cap, 3);
        assert_eq!(config.pitcher_pull_count, Some(115));
    }

    #[test]
    fn test_partial_ron_fills_defaults() {
        let config = MatchConfig::from_ron(
            "(regulation_innings: 7, mercy: Some((run_margin: 10, from_inning: 5)))",
        )
        .unwrap();
        assert_eq!(config.regulation_innings, 7);
        assert_eq!(config.max_innings, 12);
        assert_eq!(
            config.mercy,
            Some(MercyRule {
                run_margin: 10,
                from_inning: 5
            })
        );
        assert_eq!(config.tuning.fence_distance_ft, 330.0);
    }

    #[test]
    fn test_invalid_innings_rejected() {
        let config = MatchConfig {
            regulation_innings: 9,
            max_innings: 6,
            ..MatchConfig::default()
        };
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_inverted_cutoffs_rejected() {
        let mut config = MatchConfig::default();
        config.tuning.miss_below = 30.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_ron_is_parse_error() {
        let err = MatchConfig::from_ron("(shake_cap: \"three\")").unwrap_err();
        assert!(matches!(err, SimError::DataParse { .. }));
    }
}
