//! Pitch-type physics and arm-slot geometry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::parse_ron;
use crate::error::Result;
use crate::player::{ArmSlot, PitchKind};

/// Dominant plane of a pitch's break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakPlane {
    /// Rise or drop.
    Vertical,
    /// Run or sweep.
    Horizontal,
    /// Both planes.
    Diagonal,
    /// Drop with arm-side sink.
    DropSink,
    /// Fade with speed change.
    Offspeed,
    /// Unpredictable.
    Erratic,
}

/// Physics multipliers for one pitch type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchProfile {
    /// Pitch type.
    pub kind: PitchKind,
    /// Share of top velocity.
    pub velocity_mod: f64,
    /// Scale on the grip's break level.
    pub break_mod: f64,
    /// Fatigue cost per pitch.
    pub stamina_cost: f64,
    /// Break plane.
    pub plane: BreakPlane,
}

impl PitchProfile {
    /// Neutral profile used for kinds missing from the table.
    #[must_use]
    pub const fn neutral(kind: PitchKind) -> Self {
        Self {
            kind,
            velocity_mod: 1.0,
            break_mod: 0.5,
            stamina_cost: 1.0,
            plane: BreakPlane::Diagonal,
        }
    }
}

/// Multipliers for one arm slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmSlotProfile {
    /// Arm slot.
    pub slot: ArmSlot,
    /// Scale on vertical break.
    pub vertical_mult: f64,
    /// Scale on horizontal break.
    pub horizontal_mult: f64,
    /// Scale on effective control.
    pub control_mult: f64,
    /// Scale on stamina cost.
    pub stamina_cost_mult: f64,
}

impl ArmSlotProfile {
    /// Neutral three-quarters geometry.
    #[must_use]
    pub const fn neutral(slot: ArmSlot) -> Self {
        Self {
            slot,
            vertical_mult: 1.0,
            horizontal_mult: 1.0,
            control_mult: 1.0,
            stamina_cost_mult: 1.0,
        }
    }

    /// Movement multiplier for a break plane.
    #[must_use]
    pub fn plane_multiplier(&self, plane: BreakPlane) -> f64 {
        match plane {
            BreakPlane::Vertical => self.vertical_mult,
            BreakPlane::Horizontal => self.horizontal_mult,
            BreakPlane::Diagonal => (self.vertical_mult + self.horizontal_mult) / 2.0,
            BreakPlane::DropSink => self.vertical_mult * 0.6 + self.horizontal_mult * 0.4,
            BreakPlane::Offspeed => 1.0,
            BreakPlane::Erratic => 1.0,
        }
    }
}

/// Pitch and arm-slot lookup table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchTable {
    /// Per-kind profiles.
    pub pitches: Vec<PitchProfile>,
    /// Per-slot profiles.
    pub arm_slots: Vec<ArmSlotProfile>,
}

impl PitchTable {
    /// Parse a table from RON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SimError::DataParse`] on malformed input.
    pub fn from_ron(text: &str) -> Result<Self> {
        parse_ron("pitches", text)
    }

    /// Profile for a pitch kind, neutral when absent.
    #[must_use]
    pub fn profile(&self, kind: PitchKind) -> PitchProfile {
        self.pitches
            .iter()
            .find(|p| p.kind == kind)
            .copied()
            .unwrap_or(PitchProfile::neutral(kind))
    }

    /// Profile for an arm slot, neutral when absent.
    #[must_use]
    pub fn slot(&self, slot: ArmSlot) -> ArmSlotProfile {
        self.arm_slots
            .iter()
            .find(|s| s.slot == slot)
            .copied()
            .unwrap_or(ArmSlotProfile::neutral(slot))
    }

    pub(crate) fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut seen = BTreeSet::new();
        for p in &self.pitches {
            if !seen.insert(p.kind) {
                issues.push(format!("pitch {:?} is defined twice", p.kind));
            }
            if p.velocity_mod <= 0.0 {
                issues.push(format!("pitch {:?} velocity_mod must be positive", p.kind));
            }
        }
        for s in &self.arm_slots {
            if s.control_mult <= 0.0 {
                issues.push(format!("arm slot {:?} control_mult must be positive", s.slot));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PitchTable {
        PitchTable::from_ron(include_str!("../../data/pitches.ron")).unwrap()
    }

    #[test]
    fn test_submarine_flattens_vertical_break() {
        let t = table();
        let sub = t.slot(ArmSlot::Submarine);
        let curve = t.profile(PitchKind::Curveball);
        let slider = t.profile(PitchKind::Slider);
        assert!(sub.plane_multiplier(curve.plane) < 0.5);
        assert!(sub.plane_multiplier(slider.plane) > 1.5);
    }

    #[test]
    fn test_missing_entries_fall_back() {
        let t = PitchTable::default();
        assert_eq!(t.profile(PitchKind::Sinker).velocity_mod, 1.0);
        assert_eq!(t.slot(ArmSlot::Overhand).control_mult, 1.0);
    }
}
