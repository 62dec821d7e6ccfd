//! Pitch physics, fatigue and swing resolution.
//!
//! Every function here is a pure transform of its inputs plus draws from
//! the caller's [`MatchRng`]. Nothing reads or writes [`crate::state::MatchState`]
//! directly; the at-bat machine assembles the inputs and applies the results.
//!
//! # Numeric semantics
//!
//! Rolls are real-valued. Outcomes are discretised only at the thresholds in
//! [`Tuning`], and every outcome is monotonic in the skill differential that
//! feeds it: more control never widens the miss window, more contact never
//! lowers contact quality.

use serde::{Deserialize, Serialize};

use crate::config::Tuning;
use crate::data::{ArmSlotProfile, PitchProfile, WeatherProfile};
use crate::player::{PitchGrip, PitchKind};
use crate::rng::MatchRng;

/// Velocity above which hitters lose extra reaction time (km/h).
pub const HIGH_HEAT_KMH: f64 = 150.0;

/// Constant shaved off every swing so average matchups produce a spread of
/// misses, fouls and balls in play.
const SWING_SHADE: f64 = 15.0;

/// Where the pitch is aimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchLocation {
    /// In the strike zone.
    Zone,
    /// Just off the plate, inviting a chase.
    Chase,
}

/// How a single pitch resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchResolution {
    /// Ball added to the count.
    Ball,
    /// Strike added to the count.
    Strike,
    /// Foul ball.
    Foul,
    /// Ball put in play.
    InPlay,
}

/// Descriptive tag for commentary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchDescription {
    /// Taken and called a ball.
    CalledBall,
    /// Taken and called a strike.
    CalledStrike,
    /// Swung through.
    SwingingMiss,
    /// Fouled off.
    Foul,
    /// Put in play.
    BallInPlay,
    /// Hit the batter.
    HitByPitch,
}

/// Severity of a pitcher injury.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InjurySeverity {
    /// Day-to-day.
    Minor,
    /// Short stint on the shelf.
    Moderate,
    /// Long-term.
    Severe,
}

/// Batter's swing intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SwingApproach {
    /// Balanced swing.
    #[default]
    Normal,
    /// Shortened swing, more contact and less power.
    Contact,
    /// Full swing, more power and less contact.
    Power,
}

impl SwingApproach {
    /// Additive contact bonus.
    #[must_use]
    pub const fn contact_bonus(self) -> f64 {
        match self {
            SwingApproach::Normal => 0.0,
            SwingApproach::Contact => 15.0,
            SwingApproach::Power => -15.0,
        }
    }

    /// Additive power bonus.
    #[must_use]
    pub const fn power_bonus(self) -> f64 {
        match self {
            SwingApproach::Normal => 0.0,
            SwingApproach::Contact => -10.0,
            SwingApproach::Power => 25.0,
        }
    }
}

/// Field direction the batter is trying to hit toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Aim {
    /// Pull side.
    Pull,
    /// Up the middle.
    #[default]
    Center,
    /// Opposite field.
    Opposite,
}

impl Aim {
    /// Spray-angle shift in degrees. Negative is toward left field.
    #[must_use]
    pub const fn spray_shift(self) -> f64 {
        match self {
            Aim::Pull => -15.0,
            Aim::Center => 0.0,
            Aim::Opposite => 15.0,
        }
    }
}

/// A batter's decision on one pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SwingChoice {
    /// Whether the batter swings.
    pub swing: bool,
    /// Swing intent.
    pub approach: SwingApproach,
    /// Field direction.
    pub aim: Aim,
}

impl SwingChoice {
    /// Take the pitch.
    #[must_use]
    pub const fn take() -> Self {
        Self {
            swing: false,
            approach: SwingApproach::Normal,
            aim: Aim::Center,
        }
    }

    /// Swing with the given intent.
    #[must_use]
    pub const fn swing(approach: SwingApproach, aim: Aim) -> Self {
        Self {
            swing: true,
            approach,
            aim,
        }
    }
}

// ============================================================================
// Fatigue
// ============================================================================

/// Penalties from accumulated pitches.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FatigueEffect {
    /// Velocity lost (km/h).
    pub velocity_drop: f64,
    /// Control points lost.
    pub control_drop: f64,
}

/// Multiplier on fatigue penalties.
///
/// High drive relieves fatigue, high leverage pushes it, and trait fatigue
/// modifiers add directly. Clamped to `[0.55, 1.6]`.
#[must_use]
pub fn fatigue_scale(drive: f64, leverage: f64, trait_modifier: f64) -> f64 {
    let drive_relief = ((drive - 50.0) / 50.0).clamp(0.0, 1.0);
    let pressure_push = ((leverage - 1.0) / 1.5).clamp(0.0, 1.0);
    (1.0 - drive_relief * 0.35 + pressure_push * 0.45 + trait_modifier).clamp(0.55, 1.6)
}

/// Velocity and control penalties at a pitch count.
///
/// Stamina shifts every threshold by `(stamina - 50) / 2` pitches, and the
/// weather's stamina scalar inflates the effective count. Velocity fades
/// past the velocity threshold and again, more steeply, past the steep
/// threshold. Control fades past its own threshold and steepens ten
/// pitches after the steep threshold.
#[must_use]
pub fn fatigue_effect(
    pitch_count: u32,
    stamina: f64,
    stamina_scalar: f64,
    scale: f64,
    tuning: &Tuning,
) -> FatigueEffect {
    let pitches = f64::from(pitch_count) * stamina_scalar;
    let shift = (stamina - 50.0) * 0.5;
    let velocity_start = f64::from(tuning.velocity_fatigue_start) + shift;
    let control_start = f64::from(tuning.control_fatigue_start) + shift;
    let steep_start = f64::from(tuning.steep_fatigue_start) + shift;

    let velocity_drop =
        (pitches - velocity_start).max(0.0) * 0.2 + (pitches - steep_start).max(0.0) * 0.5;
    let control_drop = (pitches - control_start).max(0.0) * 0.5
        + (pitches - (steep_start + 10.0)).max(0.0) * 0.5;

    FatigueEffect {
        velocity_drop: velocity_drop * scale,
        control_drop: control_drop * scale,
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// Everything that shapes a pitch out of the hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeliveryInputs {
    /// Grip thrown.
    pub grip: PitchGrip,
    /// Pitch-type multipliers.
    pub profile: PitchProfile,
    /// Arm-slot multipliers.
    pub slot: ArmSlotProfile,
    /// Trait-adjusted top velocity (km/h).
    pub velocity_kmh: f64,
    /// Trait-adjusted control.
    pub control: f64,
    /// Fatigue penalties.
    pub fatigue: FatigueEffect,
    /// Pitcher confidence.
    pub confidence: f64,
    /// Psychology control bonus.
    pub control_bonus: f64,
    /// Psychology movement bonus.
    pub movement_bonus: f64,
    /// Psychology velocity bonus.
    pub velocity_bonus: f64,
    /// Fielding side momentum multiplier.
    pub momentum: f64,
    /// Weather wild-pitch modifier; also erodes control.
    pub weather_wild: f64,
    /// Slide-step velocity penalty.
    pub slide_velocity: f64,
    /// Slide-step control penalty.
    pub slide_control: f64,
}

/// A pitch in flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrownPitch {
    /// Pitch type.
    pub kind: PitchKind,
    /// Target location.
    pub location: PitchLocation,
    /// Velocity (km/h).
    pub velocity_kmh: f64,
    /// Movement score.
    pub movement: f64,
    /// Effective control after every modifier.
    pub control: f64,
}

/// Combine delivery inputs into a thrown pitch.
///
/// Control never falls below [`Tuning::control_floor`], so a pitcher with
/// zero control still produces valid probabilities.
#[must_use]
pub fn deliver(inputs: &DeliveryInputs, location: PitchLocation, tuning: &Tuning) -> ThrownPitch {
    let quality = f64::from(inputs.grip.quality);
    let control = (inputs.control * inputs.slot.control_mult + (quality - 50.0) * 0.1
        - inputs.fatigue.control_drop
        - inputs.slide_control
        - inputs.weather_wild * 60.0
        + inputs.confidence * 0.25
        + inputs.control_bonus)
        * inputs.momentum;
    let control = if control.is_nan() {
        tuning.control_floor
    } else {
        control.max(tuning.control_floor)
    };

    let velocity = (inputs.velocity_kmh * inputs.profile.velocity_mod - inputs.fatigue.velocity_drop
        + inputs.velocity_bonus
        + inputs.confidence * 0.05
        - inputs.slide_velocity)
        .max(40.0);

    let movement = (f64::from(inputs.grip.break_level)
        * inputs.profile.break_mod
        * inputs.slot.plane_multiplier(inputs.profile.plane)
        + inputs.movement_bonus)
        .max(0.0);

    ThrownPitch {
        kind: inputs.grip.kind,
        location,
        velocity_kmh: velocity,
        movement,
        control,
    }
}

/// Stamina cost of one pitch of this kind from this slot.
#[must_use]
pub fn stamina_cost(profile: &PitchProfile, slot: &ArmSlotProfile, weather: &WeatherProfile) -> f64 {
    profile.stamina_cost * slot.stamina_cost_mult * weather.stamina_scalar
}

// ============================================================================
// Swing
// ============================================================================

/// Batter inputs for one swing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatterInputs {
    /// Trait-adjusted contact.
    pub contact: f64,
    /// Trait-adjusted power.
    pub power: f64,
    /// Trait-adjusted eye.
    pub eye: f64,
    /// Psychology eye scalar.
    pub eye_scalar: f64,
    /// Psychology contact scalar.
    pub contact_scalar: f64,
    /// Batter confidence.
    pub confidence: f64,
    /// Batting side momentum multiplier.
    pub momentum: f64,
}

/// Result of a swing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwingOutcome {
    /// Swung through.
    Miss,
    /// Fouled off.
    Foul,
    /// Put in play with this contact quality.
    InPlay(f64),
}

/// AI swing decision.
///
/// Zone pitches are swung at more often as strikes mount. Chase pitches
/// are swung at when the batter's eye loses to the pitch's movement.
pub fn ai_should_swing(
    rng: &mut MatchRng,
    pitch: &ThrownPitch,
    batter: &BatterInputs,
    strikes: u8,
) -> bool {
    match pitch.location {
        PitchLocation::Zone => rng.chance(0.55 + f64::from(strikes) * 0.15),
        PitchLocation::Chase => {
            batter.eye * batter.eye_scalar + rng.uniform(0.0, 40.0) < 50.0 + pitch.movement / 2.0
        }
    }
}

/// Difficulty of squaring up a pitch.
///
/// A mistake pitch (the control roll fails) drifts over the heart of the
/// plate and is easier to hit.
#[must_use]
pub fn pitch_difficulty(pitch: &ThrownPitch, mistake: bool) -> f64 {
    let mut difficulty = pitch.movement + (pitch.velocity_kmh - 110.0) * 0.5;
    if pitch.velocity_kmh > HIGH_HEAT_KMH {
        difficulty += 10.0;
    }
    if pitch.location == PitchLocation::Chase {
        difficulty += 30.0;
    }
    if mistake {
        difficulty -= 20.0;
    }
    difficulty
}

/// Contact quality of a swing: bat control minus difficulty plus noise.
pub fn contact_quality(
    rng: &mut MatchRng,
    pitch: &ThrownPitch,
    batter: &BatterInputs,
    approach: SwingApproach,
) -> f64 {
    let mistake = rng.uniform(0.0, 100.0) > pitch.control + 25.0;
    let bat_control = batter.contact * batter.contact_scalar * batter.momentum
        + approach.contact_bonus()
        + batter.confidence * 0.3
        + rng.uniform(-15.0, 15.0);
    bat_control - pitch_difficulty(pitch, mistake) + rng.uniform(0.0, 20.0) - SWING_SHADE
}

/// Map contact quality onto the miss/foul/in-play thresholds.
#[must_use]
pub fn classify_contact(quality: f64, tuning: &Tuning) -> SwingOutcome {
    if quality < tuning.miss_below {
        SwingOutcome::Miss
    } else if quality < tuning.foul_below {
        SwingOutcome::Foul
    } else {
        SwingOutcome::InPlay(quality)
    }
}

/// Raw batted-ball inputs leaving the bat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactProfile {
    /// Exit velocity (mph).
    pub exit_velocity: f64,
    /// Launch angle (degrees).
    pub launch_angle: f64,
    /// Spray angle (degrees, negative toward left field).
    pub spray_angle: f64,
}

/// Turn contact quality and power into exit velocity, launch and spray.
pub fn launch(
    rng: &mut MatchRng,
    quality: f64,
    power: f64,
    swing: SwingChoice,
    weather: &WeatherProfile,
) -> ContactProfile {
    let power = power + swing.approach.power_bonus();
    let exit_velocity =
        (60.0 + quality * 0.6 + (power - 50.0) * 0.25 + rng.uniform(-6.0, 6.0)).clamp(35.0, 120.0);
    let launch_angle =
        rng.uniform(-15.0, 45.0) + (quality - 40.0) * 0.1 - weather.ground_ball_bonus;
    let spray_angle = (rng.uniform(-40.0, 40.0) + swing.aim.spray_shift()).clamp(-45.0, 45.0);
    ContactProfile {
        exit_velocity,
        launch_angle,
        spray_angle,
    }
}

// ============================================================================
// Incidental chances
// ============================================================================

/// Probability a called ball gets past the catcher.
///
/// Poor control, fatigue past 85 pitches and wet weather raise it. Weather
/// that steadies the ball (negative modifier) counts at reduced weight.
#[must_use]
pub fn wild_pitch_chance(control: f64, pitch_count: u32, weather_wild: f64, cap: f64) -> f64 {
    let fatigue = (f64::from(pitch_count) - 85.0).max(0.0) * 0.001;
    let weather = if weather_wild >= 0.0 {
        weather_wild * 1.2
    } else {
        weather_wild * 0.6
    };
    ((60.0 - control) * 0.0025 + fatigue + weather).clamp(0.0, cap)
}

/// Probability a taken chase pitch hits the batter.
#[must_use]
pub fn hit_by_pitch_chance(control: f64) -> f64 {
    0.008 + (50.0 - control).max(0.0) * 0.0004
}

/// Per-pitch injury probability.
///
/// Zero through 80 pitches, then rising, with a jump past 110. Trait
/// injury modifiers scale the result.
#[must_use]
pub fn injury_chance(pitch_count: u32, trait_modifier: f64) -> f64 {
    if pitch_count <= 80 {
        return 0.0;
    }
    let mut chance = f64::from(pitch_count - 80) * 0.0005;
    if pitch_count > 110 {
        chance += 0.02;
    }
    (chance * (1.0 + trait_modifier).max(0.0)).clamp(0.0, 1.0)
}

/// Severity for a uniform roll in `[0, 1)`.
#[must_use]
pub fn injury_severity(roll: f64) -> InjurySeverity {
    if roll > 0.9 {
        InjurySeverity::Severe
    } else if roll > 0.7 {
        InjurySeverity::Moderate
    } else {
        InjurySeverity::Minor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BreakPlane;
    use crate::player::ArmSlot;

    fn inputs(control: f64) -> DeliveryInputs {
        DeliveryInputs {
            grip: PitchGrip::new(PitchKind::FourSeam, 50, 10),
            profile: PitchProfile::neutral(PitchKind::FourSeam),
            slot: ArmSlotProfile::neutral(ArmSlot::ThreeQuarters),
            velocity_kmh: 140.0,
            control,
            fatigue: FatigueEffect::default(),
            confidence: 0.0,
            control_bonus: 0.0,
            movement_bonus: 0.0,
            velocity_bonus: 0.0,
            momentum: 1.0,
            weather_wild: 0.0,
            slide_velocity: 0.0,
            slide_control: 0.0,
        }
    }

    fn batter() -> BatterInputs {
        BatterInputs {
            contact: 50.0,
            power: 50.0,
            eye: 50.0,
            eye_scalar: 1.0,
            contact_scalar: 1.0,
            confidence: 0.0,
            momentum: 1.0,
        }
    }

    #[test]
    fn test_zero_control_floors() {
        let tuning = Tuning::default();
        let mut i = inputs(0.0);
        i.confidence = -100.0;
        i.weather_wild = 0.1;
        let pitch = deliver(&i, PitchLocation::Zone, &tuning);
        assert_eq!(pitch.control, tuning.control_floor);
        let wp = wild_pitch_chance(pitch.control, 0, 0.0, tuning.wild_pitch_cap);
        assert!((0.0..=tuning.wild_pitch_cap).contains(&wp));
    }

    #[test]
    fn test_no_fatigue_below_thresholds() {
        let effect = fatigue_effect(60, 50.0, 1.0, 1.0, &Tuning::default());
        assert_eq!(effect, FatigueEffect::default());
    }

    #[test]
    fn test_fatigue_steepens() {
        let tuning = Tuning::default();
        let at_95 = fatigue_effect(95, 50.0, 1.0, 1.0, &tuning);
        let at_120 = fatigue_effect(120, 50.0, 1.0, 1.0, &tuning);
        assert!((at_95.velocity_drop - 3.0).abs() < 1e-9);
        assert!((at_95.control_drop - 2.5).abs() < 1e-9);
        // 40 * 0.2 + 20 * 0.5
        assert!((at_120.velocity_drop - 18.0).abs() < 1e-9);
        // 30 * 0.5 + 10 * 0.5
        assert!((at_120.control_drop - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_stamina_delays_fatigue() {
        let tuning = Tuning::default();
        let tired = fatigue_effect(100, 30.0, 1.0, 1.0, &tuning);
        let fresh = fatigue_effect(100, 80.0, 1.0, 1.0, &tuning);
        assert!(tired.velocity_drop > fresh.velocity_drop);
        assert!(tired.control_drop > fresh.control_drop);
    }

    #[test]
    fn test_fatigue_scale_bounds() {
        assert!((fatigue_scale(50.0, 1.0, 0.0) - 1.0).abs() < 1e-9);
        assert_eq!(fatigue_scale(100.0, 0.5, -1.0), 0.55);
        assert_eq!(fatigue_scale(0.0, 2.5, 1.0), 1.6);
    }

    #[test]
    fn test_submarine_curve_loses_movement() {
        let tuning = Tuning::default();
        let mut i = inputs(50.0);
        i.grip = PitchGrip::new(PitchKind::Curveball, 50, 50);
        i.profile = PitchProfile {
            kind: PitchKind::Curveball,
            velocity_mod: 0.8,
            break_mod: 1.0,
            stamina_cost: 1.0,
            plane: BreakPlane::Vertical,
        };
        let neutral = deliver(&i, PitchLocation::Zone, &tuning);
        i.slot.vertical_mult = 0.1;
        let sub = deliver(&i, PitchLocation::Zone, &tuning);
        assert!(sub.movement < neutral.movement);
    }

    #[test]
    fn test_more_contact_never_lowers_quality() {
        let tuning = Tuning::default();
        let pitch = deliver(&inputs(50.0), PitchLocation::Zone, &tuning);
        let mut strong = batter();
        strong.contact = 80.0;
        for seed in 0..50 {
            let weak_q = contact_quality(&mut MatchRng::new(seed), &pitch, &batter(), SwingApproach::Normal);
            let strong_q = contact_quality(&mut MatchRng::new(seed), &pitch, &strong, SwingApproach::Normal);
            assert!(strong_q > weak_q);
        }
    }

    #[test]
    fn test_classify_thresholds() {
        let tuning = Tuning::default();
        assert_eq!(classify_contact(-1.0, &tuning), SwingOutcome::Miss);
        assert_eq!(classify_contact(0.0, &tuning), SwingOutcome::Foul);
        assert_eq!(classify_contact(19.9, &tuning), SwingOutcome::Foul);
        assert_eq!(classify_contact(20.0, &tuning), SwingOutcome::InPlay(20.0));
    }

    #[test]
    fn test_chase_is_harder() {
        let tuning = Tuning::default();
        let zone = deliver(&inputs(50.0), PitchLocation::Zone, &tuning);
        let chase = deliver(&inputs(50.0), PitchLocation::Chase, &tuning);
        assert!(pitch_difficulty(&chase, false) > pitch_difficulty(&zone, false));
        assert!(pitch_difficulty(&zone, true) < pitch_difficulty(&zone, false));
    }

    #[test]
    fn test_wild_pitch_capped() {
        assert_eq!(wild_pitch_chance(5.0, 130, 0.2, 0.35), 0.35);
        assert_eq!(wild_pitch_chance(90.0, 10, -0.05, 0.35), 0.0);
    }

    #[test]
    fn test_injury_curve() {
        assert_eq!(injury_chance(80, 0.0), 0.0);
        assert!(injury_chance(111, 0.0) > injury_chance(110, 0.0) + 0.02);
        assert!(injury_chance(100, 0.22) > injury_chance(100, 0.0));
        assert_eq!(injury_severity(0.95), InjurySeverity::Severe);
        assert_eq!(injury_severity(0.8), InjurySeverity::Moderate);
        assert_eq!(injury_severity(0.1), InjurySeverity::Minor);
    }

    #[test]
    fn test_launch_is_bounded() {
        let weather = WeatherProfile::calm();
        let mut rng = MatchRng::new(3);
        for _ in 0..200 {
            let c = launch(&mut rng, 90.0, 99.0, SwingChoice::swing(SwingApproach::Power, Aim::Pull), &weather);
            assert!((35.0..=120.0).contains(&c.exit_velocity));
            assert!((-45.0..=45.0).contains(&c.spray_angle));
        }
    }
}
