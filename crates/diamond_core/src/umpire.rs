//! Ball/strike call model for taken pitches.
//!
//! The plate umpire calls a taken pitch with a biased coin. The bias comes
//! from the pitch location, the umpire's zone tendency and strictness, a
//! home lean, catcher framing and a short-lived mood. A bounded jitter
//! sits on top, widened by inconsistency and by poor framing.
//!
//! # Tilt
//!
//! A call "favours" the pitching side when a chase pitch is rung up and
//! "squeezes" it when a zone pitch is called a ball. Both are counted per
//! side and reported at every half-inning boundary.

use serde::{Deserialize, Serialize};

use crate::data::UmpireProfile;
use crate::physics::PitchLocation;
use crate::player::{PlayerSnapshot, TeamSide};
use crate::rng::MatchRng;
use crate::state::{CallTilt, TiltReport};

/// Base strike probability for a taken zone pitch.
const ZONE_STRIKE_BASE: f64 = 0.88;
/// Base strike probability for a taken chase pitch.
const CHASE_STRIKE_BASE: f64 = 0.12;

/// Catcher receiving skill in `[0, 100]`.
///
/// Weighted from fielding, leadership and plate discipline. A missing
/// catcher counts as a league-average receiver.
#[must_use]
pub fn framing_skill(catcher: Option<&PlayerSnapshot>) -> f64 {
    catcher.map_or(50.0, |c| {
        f64::from(c.fielding.fielding) * 0.45
            + f64::from(c.fielding.leadership) * 0.35
            + f64::from(c.batting.discipline) * 0.2
    })
}

/// Inputs for a single call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallContext {
    /// Side whose pitcher threw the pitch.
    pub pitching: TeamSide,
    /// Catcher receiving skill.
    pub framing: f64,
    /// Balls before the pitch.
    pub balls: u8,
    /// Strikes before the pitch.
    pub strikes: u8,
}

/// Outcome of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    /// Called a strike.
    pub strike: bool,
    /// The call went against the pitch's true location.
    pub against_location: bool,
}

/// Live umpire state for one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmpireState {
    profile: UmpireProfile,
    mood: f64,
    tilt: TiltReport,
    calls: u32,
}

impl UmpireState {
    /// Fresh state for a preset.
    #[must_use]
    pub fn new(profile: UmpireProfile) -> Self {
        Self {
            profile,
            mood: 0.0,
            tilt: TiltReport::default(),
            calls: 0,
        }
    }

    /// The preset in use.
    #[must_use]
    pub const fn profile(&self) -> &UmpireProfile {
        &self.profile
    }

    /// Current mood in `[-1, 1]`. Positive leans toward strikes.
    #[must_use]
    pub const fn mood(&self) -> f64 {
        self.mood
    }

    /// Tilt counters so far.
    #[must_use]
    pub const fn tilt(&self) -> TiltReport {
        self.tilt
    }

    /// Number of taken pitches called.
    #[must_use]
    pub const fn calls(&self) -> u32 {
        self.calls
    }

    /// Strike probability before jitter.
    #[must_use]
    pub fn strike_probability(&self, location: PitchLocation, ctx: &CallContext) -> f64 {
        let ump = &self.profile;
        let base = match location {
            PitchLocation::Zone => ZONE_STRIKE_BASE,
            PitchLocation::Chase => CHASE_STRIKE_BASE,
        };
        let zone = -ump.zone_bias * 0.12 - (ump.strictness - 0.5) * 0.2;
        let home = match ctx.pitching {
            TeamSide::Home => ump.home_bias * 0.05,
            TeamSide::Away => -ump.home_bias * 0.05,
        };
        let framing = (ctx.framing - 50.0) / 50.0 * ump.framing_factor * 0.15;
        // Three-ball counts get a slightly wider zone, two-strike counts a tighter one.
        let count = if ctx.balls == 3 && ctx.strikes < 2 {
            0.03
        } else if ctx.strikes == 2 && ctx.balls < 2 {
            -0.03
        } else {
            0.0
        };
        let mood = self.mood * ump.temperament * 0.05;
        base + zone + home + framing + count + mood
    }

    /// Half-width of the random jitter on the strike probability.
    #[must_use]
    pub fn jitter_width(&self, framing: f64) -> f64 {
        let framing_spread = 1.5 - (framing / 100.0).clamp(0.0, 1.0);
        (1.0 - self.profile.consistency).max(0.0) * 0.3 * framing_spread
    }

    /// Call a taken pitch and update mood and tilt.
    pub fn call(&mut self, rng: &mut MatchRng, location: PitchLocation, ctx: &CallContext) -> Call {
        let width = self.jitter_width(ctx.framing);
        let jitter = rng.uniform(-width, width);
        let p = (self.strike_probability(location, ctx) + jitter).clamp(0.02, 0.98);
        let strike = rng.unit() < p;

        let against_location = match location {
            PitchLocation::Zone => !strike,
            PitchLocation::Chase => strike,
        };
        if against_location {
            let tilt = self.tilt_mut(ctx.pitching);
            if strike {
                tilt.favored += 1;
            } else {
                tilt.squeezed += 1;
            }
            let nudge = if strike { 0.2 } else { -0.2 };
            self.mood += nudge * self.profile.temperament;
        }
        self.mood = (self.mood * 0.9).clamp(-1.0, 1.0);
        self.calls += 1;
        Call {
            strike,
            against_location,
        }
    }

    fn tilt_mut(&mut self, side: TeamSide) -> &mut CallTilt {
        match side {
            TeamSide::Away => &mut self.tilt.away,
            TeamSide::Home => &mut self.tilt.home,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Position;

    fn ctx(framing: f64) -> CallContext {
        CallContext {
            pitching: TeamSide::Home,
            framing,
            balls: 1,
            strikes: 1,
        }
    }

    fn steady() -> UmpireProfile {
        let mut ump = UmpireProfile::neutral();
        ump.framing_factor = 0.65;
        ump.consistency = 0.9;
        ump
    }

    #[test]
    fn test_framing_skill_weights() {
        let mut catcher = PlayerSnapshot::league_average(2, "C", Position::Catcher);
        assert!((framing_skill(Some(&catcher)) - 50.0).abs() < 1e-9);
        catcher.fielding.fielding = 90;
        assert!(framing_skill(Some(&catcher)) > 60.0);
        assert!((framing_skill(None) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_framing_helps_borderline_calls() {
        let ump = UmpireState::new(steady());
        let good = ump.strike_probability(PitchLocation::Chase, &ctx(85.0));
        let poor = ump.strike_probability(PitchLocation::Chase, &ctx(35.0));
        assert!(good > poor);
    }

    #[test]
    fn test_consistency_limits_jitter() {
        let mut noisy = steady();
        noisy.consistency = 0.25;
        let mut calm = steady();
        calm.consistency = 0.98;
        let noisy = UmpireState::new(noisy);
        let calm = UmpireState::new(calm);
        assert!(noisy.jitter_width(50.0) > calm.jitter_width(50.0) * 10.0);
        assert!(calm.jitter_width(20.0) > calm.jitter_width(90.0));
    }

    #[test]
    fn test_squeeze_lowers_zone_strikes() {
        let mut tight = UmpireProfile::neutral();
        tight.zone_bias = 0.5;
        tight.strictness = 0.9;
        let tight = UmpireState::new(tight);
        let neutral = UmpireState::new(UmpireProfile::neutral());
        assert!(
            tight.strike_probability(PitchLocation::Zone, &ctx(50.0))
                < neutral.strike_probability(PitchLocation::Zone, &ctx(50.0))
        );
    }

    #[test]
    fn test_tilt_counts_against_location_calls() {
        let mut ump = UmpireState::new(UmpireProfile::neutral());
        let mut rng = MatchRng::new(8);
        let mut against = 0;
        for _ in 0..500 {
            if ump.call(&mut rng, PitchLocation::Chase, &ctx(50.0)).against_location {
                against += 1;
            }
        }
        let tilt = ump.tilt();
        assert_eq!(tilt.home.favored, against);
        assert_eq!(tilt.home.squeezed, 0);
        assert_eq!(tilt.away, CallTilt::default());
        assert_eq!(ump.calls(), 500);
        assert!(ump.mood().abs() <= 1.0);
    }

    #[test]
    fn test_zone_mostly_strikes() {
        let mut ump = UmpireState::new(UmpireProfile::neutral());
        let mut rng = MatchRng::new(21);
        let strikes = (0..1000)
            .filter(|_| ump.call(&mut rng, PitchLocation::Zone, &ctx(50.0)).strike)
            .count();
        assert!(strikes > 750, "zone strikes {strikes}");
    }
}
