//! Team momentum meters.
//!
//! Momentum is a tug-of-war: every weighted key pushes the credited team's
//! meter up and the opponent's down by the same amount, so the two meters
//! always mirror each other. There is no timer. A meter only comes back
//! toward zero when the other side earns momentum, and it never leaves
//! `[-bound, bound]`.
//!
//! Physics and fielding read [`MomentumMeters::modifier`]; nothing outside
//! this module writes a meter.

use serde::{Deserialize, Serialize};

use crate::config::Tuning;
use crate::player::TeamSide;

/// Multiplier gained per positive momentum point.
const POINT_SCALAR: f64 = 0.01;
/// Extra multiplier while a side is in the zone.
const ZONE_BONUS: f64 = 0.05;

/// Discrete events that move momentum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MomentumKey {
    /// Pitching side records a strikeout.
    Strikeout,
    /// Fielding side turns two.
    DoublePlay,
    /// Fielding side commits an error.
    Error,
    /// Batting side singles.
    Single,
    /// Batting side doubles.
    Double,
    /// Batting side triples.
    Triple,
    /// Batting side homers.
    HomeRun,
}

impl MomentumKey {
    /// Points credited to the side the key belongs to.
    #[must_use]
    pub const fn weight(self) -> i32 {
        match self {
            MomentumKey::Strikeout => 2,
            MomentumKey::DoublePlay => 4,
            MomentumKey::Error => -2,
            MomentumKey::Single => 1,
            MomentumKey::Double => 2,
            MomentumKey::Triple => 3,
            MomentumKey::HomeRun => 5,
        }
    }
}

/// A recorded change to one side's meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MomentumChange {
    /// Side credited.
    pub side: TeamSide,
    /// Key that fired.
    pub key: MomentumKey,
    /// Meter before.
    pub old: i32,
    /// Meter after.
    pub new: i32,
    /// Whether the side is in the zone after the change.
    pub in_zone: bool,
}

/// Both teams' meters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MomentumMeters {
    values: [i32; 2],
    bound: i32,
    zone: i32,
}

impl MomentumMeters {
    /// Meters at zero with bounds from tuning.
    #[must_use]
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            values: [0; 2],
            bound: tuning.momentum_bound.max(1),
            zone: tuning.momentum_zone,
        }
    }

    /// Current meter for a side.
    #[must_use]
    pub const fn value(&self, side: TeamSide) -> i32 {
        self.values[side.index()]
    }

    /// Whether a side is in the zone.
    #[must_use]
    pub const fn in_zone(&self, side: TeamSide) -> bool {
        self.values[side.index()] >= self.zone
    }

    /// Probability multiplier for a side: 1.0 when even or behind.
    #[must_use]
    pub fn modifier(&self, side: TeamSide) -> f64 {
        let value = self.value(side);
        if value <= 0 {
            return 1.0;
        }
        let mut modifier = 1.0 + f64::from(value) * POINT_SCALAR;
        if self.in_zone(side) {
            modifier += ZONE_BONUS;
        }
        modifier
    }

    /// Credit a key to a side. Returns `None` when the clamp swallows it.
    pub fn record(&mut self, side: TeamSide, key: MomentumKey) -> Option<MomentumChange> {
        let old = self.value(side);
        let new = (old + key.weight()).clamp(-self.bound, self.bound);
        if new == old {
            return None;
        }
        self.values[side.index()] = new;
        self.values[side.opponent().index()] = -new;
        Some(MomentumChange {
            side,
            key,
            old,
            new,
            in_zone: self.in_zone(side),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_meter_is_neutral() {
        let meters = MomentumMeters::new(&Tuning::default());
        assert_eq!(meters.modifier(TeamSide::Home), 1.0);
        assert_eq!(meters.modifier(TeamSide::Away), 1.0);
    }

    #[test]
    fn test_mirrors_opponent() {
        let mut meters = MomentumMeters::new(&Tuning::default());
        let change = meters.record(TeamSide::Home, MomentumKey::HomeRun).unwrap();
        assert_eq!((change.old, change.new), (0, 5));
        assert_eq!(meters.value(TeamSide::Away), -5);
        assert!((meters.modifier(TeamSide::Home) - 1.05).abs() < 1e-9);
        assert_eq!(meters.modifier(TeamSide::Away), 1.0);
    }

    #[test]
    fn test_zone_bonus() {
        let mut meters = MomentumMeters::new(&Tuning::default());
        meters.record(TeamSide::Away, MomentumKey::HomeRun);
        let change = meters.record(TeamSide::Away, MomentumKey::HomeRun).unwrap();
        assert!(change.in_zone);
        assert!((meters.modifier(TeamSide::Away) - 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_swallows() {
        let mut meters = MomentumMeters::new(&Tuning::default());
        for _ in 0..10 {
            meters.record(TeamSide::Home, MomentumKey::DoublePlay);
        }
        assert_eq!(meters.value(TeamSide::Home), 20);
        assert!(meters.record(TeamSide::Home, MomentumKey::Single).is_none());
        let change = meters.record(TeamSide::Home, MomentumKey::Error).unwrap();
        assert_eq!(change.new, 18);
    }
}
