//! Short-term mental states for pitchers and batters.
//!
//! Pitchers carry focus, trauma and intimidation. Batters carry confidence,
//! fear and poise. Every pitch and every plate-appearance outcome nudges
//! them, scaled by the leverage of the moment. The engine reads them back
//! as small control, movement and velocity bonuses for pitchers and as eye
//! and contact scalars for batters.
//!
//! These states are separate from the [`crate::confidence`] ledger: they
//! swing faster, are never handed back at match end, and have no
//! teammate propagation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::physics::{PitchDescription, PitchResolution};
use crate::player::PlayerId;

/// Contact quality at which a ball in play rattles the pitcher.
const HARD_CONTACT: f64 = 35.0;

/// Published mental state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Mood {
    /// Pitcher state.
    Pitcher {
        /// Locked-in level.
        focus: f64,
        /// Accumulated damage.
        trauma: f64,
        /// Presence on the mound.
        intimidation: f64,
    },
    /// Batter state.
    Batter {
        /// Swagger at the plate.
        confidence: f64,
        /// Jitters.
        fear: f64,
        /// Composure in long at-bats.
        poise: f64,
    },
}

/// Plate-appearance outcomes the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateOutcome {
    /// Strikeout.
    Strikeout,
    /// Base hit.
    Hit,
    /// Runs scored without a hit.
    RunsScored,
    /// Double play turned behind the pitcher.
    DoublePlay,
    /// Walk or hit batter.
    Walk,
    /// Any other out.
    Out,
}

/// Pitcher mental state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PitcherMind {
    /// Locked-in level in `[-7, 8.5]`.
    pub focus: f64,
    /// Accumulated damage in `[0, 10]`.
    pub trauma: f64,
    /// Presence in `[-4, 6.5]`.
    pub intimidation: f64,
}

/// Batter mental state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatterMind {
    /// Swagger in `[-7, 8]`.
    pub confidence: f64,
    /// Jitters in `[0, 8.5]`.
    pub fear: f64,
    /// Composure in `[0, 5]`.
    pub poise: f64,
}

/// Pitcher modifiers read by physics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PitcherEdge {
    /// Additive control.
    pub control_bonus: f64,
    /// Additive movement.
    pub movement_bonus: f64,
    /// Additive velocity (km/h).
    pub velocity_bonus: f64,
    /// Current focus.
    pub focus: f64,
    /// Current trauma.
    pub trauma: f64,
}

impl From<PitcherMind> for PitcherEdge {
    fn from(mind: PitcherMind) -> Self {
        Self {
            control_bonus: mind.focus * 0.35 - mind.trauma * 0.45,
            movement_bonus: mind.focus * 0.15 - mind.trauma * 0.15,
            velocity_bonus: mind.intimidation * 0.4,
            focus: mind.focus,
            trauma: mind.trauma,
        }
    }
}

/// Batter modifiers read by physics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatterEdge {
    /// Scale on eye in `[0.7, 1.35]`.
    pub eye_scalar: f64,
    /// Scale on contact in `[0.7, 1.35]`.
    pub contact_scalar: f64,
    /// Current confidence.
    pub confidence: f64,
    /// Current fear.
    pub fear: f64,
}

impl Default for BatterEdge {
    fn default() -> Self {
        BatterMind::default().into()
    }
}

impl From<BatterMind> for BatterEdge {
    fn from(mind: BatterMind) -> Self {
        let eye = 1.0 + mind.confidence * 0.015 - mind.fear * 0.02 + mind.poise * 0.01;
        let contact = 1.0 + mind.confidence * 0.02 - mind.fear * 0.015;
        Self {
            eye_scalar: eye.clamp(0.7, 1.35),
            contact_scalar: contact.clamp(0.7, 1.35),
            confidence: mind.confidence,
            fear: mind.fear,
        }
    }
}

/// Drama multiplier for plate outcomes: 1, 2 or 3.
#[must_use]
pub fn drama(leverage: f64) -> f64 {
    let mut level = 1.0;
    if leverage >= 1.5 {
        level += 1.0;
    }
    if leverage >= 2.0 {
        level += 1.0;
    }
    level
}

/// Mental states for everyone who has thrown or faced a pitch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PsychologyEngine {
    pitchers: BTreeMap<PlayerId, PitcherMind>,
    batters: BTreeMap<PlayerId, BatterMind>,
}

impl PsychologyEngine {
    /// React to one pitch.
    ///
    /// `two_strikes` is the count before the pitch; fouling off a
    /// two-strike pitch builds poise.
    pub fn record_pitch(
        &mut self,
        pitcher: PlayerId,
        batter: PlayerId,
        resolution: PitchResolution,
        description: PitchDescription,
        contact_quality: Option<f64>,
        two_strikes: bool,
        leverage: f64,
    ) {
        let leverage = leverage.clamp(0.5, 2.5);
        let swinging = description == PitchDescription::SwingingMiss;
        let hard = contact_quality.is_some_and(|q| q >= HARD_CONTACT);

        let p = self.pitchers.entry(pitcher).or_default();
        match resolution {
            PitchResolution::Strike => {
                let delta = if swinging { 0.65 } else { 0.35 };
                p.focus = (p.focus + delta * leverage).clamp(-6.0, 8.0);
                p.trauma = (p.trauma - 0.25).clamp(0.0, 8.0);
                p.intimidation = (p.intimidation + 0.2 * leverage).clamp(-4.0, 6.0);
            }
            PitchResolution::Ball => {
                p.focus = (p.focus - 0.45 * leverage).clamp(-7.0, 8.0);
                p.intimidation = (p.intimidation - 0.3).clamp(-4.0, 6.0);
            }
            PitchResolution::Foul => p.focus = (p.focus + 0.1).clamp(-7.0, 8.0),
            PitchResolution::InPlay if hard => {
                p.trauma = (p.trauma + 0.9 * leverage).clamp(0.0, 10.0);
                p.focus = (p.focus - 0.4 * leverage).clamp(-7.0, 8.0);
            }
            PitchResolution::InPlay => p.focus = (p.focus + 0.2).clamp(-7.0, 8.0),
        }

        let b = self.batters.entry(batter).or_default();
        match resolution {
            PitchResolution::Strike => {
                let delta = if swinging { 0.4 } else { 0.25 };
                b.fear = (b.fear + delta * leverage).clamp(0.0, 8.5);
                b.confidence = (b.confidence - 0.3).clamp(-6.0, 7.0);
            }
            PitchResolution::Ball => {
                b.fear = (b.fear - 0.35).clamp(0.0, 8.5);
                b.confidence = (b.confidence + 0.4).clamp(-6.0, 7.0);
            }
            PitchResolution::Foul => {
                b.confidence = (b.confidence + 0.15).clamp(-6.0, 7.0);
                if two_strikes {
                    b.poise = (b.poise + 0.3).clamp(0.0, 5.0);
                }
            }
            PitchResolution::InPlay if hard => {
                b.confidence = (b.confidence + 0.9).clamp(-6.0, 7.0);
                b.fear = (b.fear - 0.5).clamp(0.0, 8.5);
            }
            PitchResolution::InPlay => b.confidence = (b.confidence + 0.3).clamp(-6.0, 7.0),
        }
    }

    /// React to the end of a plate appearance.
    pub fn record_plate_outcome(
        &mut self,
        pitcher: PlayerId,
        batter: PlayerId,
        outcome: PlateOutcome,
        leverage: f64,
    ) {
        let drama = drama(leverage);

        let p = self.pitchers.entry(pitcher).or_default();
        match outcome {
            PlateOutcome::Strikeout => {
                p.focus = (p.focus + 0.9 * drama).clamp(-6.0, 8.5);
                p.intimidation = (p.intimidation + 0.6 * drama).clamp(-4.0, 6.5);
            }
            PlateOutcome::Hit | PlateOutcome::RunsScored => {
                p.focus = (p.focus - 0.6 * drama).clamp(-7.0, 8.5);
                p.trauma = (p.trauma + 0.5 * (drama - 1.0).max(1.0)).clamp(0.0, 10.0);
            }
            PlateOutcome::DoublePlay => {
                p.focus = (p.focus + 0.4).clamp(-7.0, 8.5);
            }
            PlateOutcome::Walk | PlateOutcome::Out => {}
        }

        let b = self.batters.entry(batter).or_default();
        match outcome {
            PlateOutcome::Hit => {
                b.confidence = (b.confidence + 1.1 * drama).clamp(-6.0, 8.0);
                b.fear = (b.fear - 0.6).clamp(0.0, 8.5);
            }
            PlateOutcome::Strikeout => {
                b.confidence = (b.confidence - drama).clamp(-7.0, 8.0);
                b.fear = (b.fear + 0.7 * drama).clamp(0.0, 8.5);
            }
            PlateOutcome::Walk => b.poise = (b.poise + 0.5).clamp(0.0, 5.0),
            PlateOutcome::RunsScored | PlateOutcome::DoublePlay | PlateOutcome::Out => {}
        }
    }

    /// Pitcher modifiers; neutral for a pitcher not yet seen.
    #[must_use]
    pub fn pitcher_edge(&self, pitcher: PlayerId) -> PitcherEdge {
        self.pitchers
            .get(&pitcher)
            .copied()
            .map(PitcherEdge::from)
            .unwrap_or_default()
    }

    /// Batter modifiers; neutral for a batter not yet seen.
    #[must_use]
    pub fn batter_edge(&self, batter: PlayerId) -> BatterEdge {
        self.batters
            .get(&batter)
            .copied()
            .map(BatterEdge::from)
            .unwrap_or_default()
    }

    /// Published pitcher state.
    #[must_use]
    pub fn pitcher_mood(&self, pitcher: PlayerId) -> Mood {
        let m = self.pitchers.get(&pitcher).copied().unwrap_or_default();
        Mood::Pitcher {
            focus: m.focus,
            trauma: m.trauma,
            intimidation: m.intimidation,
        }
    }

    /// Published batter state.
    #[must_use]
    pub fn batter_mood(&self, batter: PlayerId) -> Mood {
        let m = self.batters.get(&batter).copied().unwrap_or_default();
        Mood::Batter {
            confidence: m.confidence,
            fear: m.fear,
            poise: m.poise,
        }
    }

    /// Raw pitcher state, if the pitcher has thrown.
    #[must_use]
    pub fn pitcher(&self, pitcher: PlayerId) -> Option<&PitcherMind> {
        self.pitchers.get(&pitcher)
    }

    /// Raw batter state, if the batter has batted.
    #[must_use]
    pub fn batter(&self, batter: PlayerId) -> Option<&BatterMind> {
        self.batters.get(&batter)
    }
}
