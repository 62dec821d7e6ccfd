//! Runner threat model: leads, steals, pickoffs, slide steps, bunts and
//! runner advancement.
//!
//! Each runner gets a [`ThreatState`] the first time it is needed in a
//! plate appearance. The snapshot holds the lead distance, the jump
//! quality and the raw sprint time, and pickoff throws shrink the lead in
//! place. [`ThreatCache::clear`] discards every snapshot at the start of
//! the next plate appearance.
//!
//! A steal is a race: the pitcher's delivery plus the catcher's pop time
//! against the runner's sprint minus his lead advantage. Defense slower
//! than offense means the runner is safe.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fielding::{BattedBall, DefenseProfile, FielderSnapshot, PlayResult, HOME_PLATE, MPH_TO_FTPS};
use crate::player::{PlayerId, PlayerSnapshot};
use crate::rng::MatchRng;
use crate::state::{Base, Bases};

/// Smallest lead a runner keeps after pickoff throws (ft).
pub const MIN_LEAD: f64 = 2.0;
/// Floor on jump quality.
pub const MIN_JUMP: f64 = -3.0;

// ============================================================================
// Threat snapshots
// ============================================================================

/// Lead, jump and sprint snapshot for one runner on one base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreatState {
    /// Runner.
    pub runner: PlayerId,
    /// Base the runner leads off from.
    pub base: Base,
    /// Lead-off distance (ft).
    pub lead: f64,
    /// Jump quality; higher is a better break.
    pub jump: f64,
    /// Raw sprint time to the next base (s).
    pub sprint_time: f64,
    /// Crowd and situation pressure on the runner.
    pub pressure: f64,
}

impl ThreatState {
    /// Shorten (or lengthen) the lead, never below [`MIN_LEAD`].
    pub fn adjust_lead(&mut self, delta: f64) {
        self.lead = (self.lead + delta).max(MIN_LEAD);
    }

    /// Adjust the jump, never below [`MIN_JUMP`].
    pub fn adjust_jump(&mut self, delta: f64) {
        self.jump = (self.jump + delta).max(MIN_JUMP);
    }

    /// Seconds the lead and jump take off the sprint.
    #[must_use]
    pub fn lead_advantage(&self) -> f64 {
        self.lead * 0.02 + self.jump * 0.03 - self.pressure * 0.02
    }

    /// Sprint time after the lead advantage.
    #[must_use]
    pub fn offense_time(&self) -> f64 {
        self.sprint_time - self.lead_advantage()
    }
}

/// Raw sprint time between bases for a speed rating.
#[must_use]
pub fn sprint_time(speed: f64) -> f64 {
    (3.75 - (speed - 50.0) * 0.015).max(3.0)
}

/// Per-plate-appearance cache of runner threats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreatCache {
    entries: BTreeMap<(PlayerId, Base), ThreatState>,
}

impl ThreatCache {
    /// Drop every snapshot.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached snapshot, if one was prepared.
    #[must_use]
    pub fn get(&self, runner: PlayerId, base: Base) -> Option<&ThreatState> {
        self.entries.get(&(runner, base))
    }

    /// Mutable snapshot, if one was prepared.
    pub fn get_mut(&mut self, runner: PlayerId, base: Base) -> Option<&mut ThreatState> {
        self.entries.get_mut(&(runner, base))
    }

    /// Snapshot for a runner, computing it on first use.
    ///
    /// `speed_demon` runners take a bigger lead. `pressure` is the ambient
    /// crowd and situation scalar.
    pub fn prepare(
        &mut self,
        rng: &mut MatchRng,
        runner: &PlayerSnapshot,
        base: Base,
        speed: f64,
        speed_demon: bool,
        pressure: f64,
    ) -> &mut ThreatState {
        self.entries.entry((runner.id, base)).or_insert_with(|| {
            let mut lead = 7.0 + rng.uniform(-0.4, 1.2);
            if speed_demon {
                lead += 1.0;
            }
            let awareness = f64::from(runner.personality.awareness);
            let jump = 1.5 + (awareness - 50.0) * 0.03 + rng.uniform(-1.0, 1.25);
            ThreatState {
                runner: runner.id,
                base,
                lead: lead.max(4.5),
                jump: jump.max(-1.5),
                sprint_time: sprint_time(speed),
                pressure,
            }
        })
    }
}

// ============================================================================
// Battery timing
// ============================================================================

/// Pitcher's time to the plate from the stretch (s).
#[must_use]
pub fn delivery_time(control: f64, athleticism: f64) -> f64 {
    (1.55 - (control - 50.0) * 0.002 - (athleticism - 50.0) * 0.0015).max(1.2)
}

/// Catcher's pop time to second (s). A missing catcher pops at 2.05.
#[must_use]
pub fn pop_time(catcher: Option<&PlayerSnapshot>) -> f64 {
    catcher.map_or(2.05, |c| {
        let arm = f64::from(c.fielding.throwing);
        let release = f64::from(c.fielding.fielding);
        (2.05 - (arm - 50.0) * 0.003 - (release - 50.0) * 0.002).max(1.75)
    })
}

/// Effect of delivering from a slide step (or not).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideStep {
    /// Slide step used.
    pub used: bool,
    /// Time to the plate (s).
    pub delivery_time: f64,
    /// Control lost on this pitch.
    pub control_penalty: f64,
    /// Velocity lost on this pitch (km/h).
    pub velocity_penalty: f64,
    /// Extra stamina spent.
    pub stamina_cost: f64,
}

/// Quicken the delivery at a control and velocity cost.
///
/// `fatigue` is in `[0, 1]`, the share of the pitcher's stamina spent.
#[must_use]
pub fn slide_step(base_delivery: f64, used: bool, fatigue: f64) -> SlideStep {
    let fatigue = fatigue.max(0.0);
    if !used {
        return SlideStep {
            used,
            delivery_time: base_delivery + fatigue * 0.02,
            control_penalty: 0.0,
            velocity_penalty: 0.0,
            stamina_cost: if fatigue > 0.5 { 0.25 } else { 0.0 },
        };
    }
    SlideStep {
        used,
        delivery_time: (base_delivery - 0.18).max(1.0),
        control_penalty: 4.0 + fatigue * 1.5,
        velocity_penalty: 1.5 + fatigue * 0.5,
        stamina_cost: 1.0 + fatigue * 0.25,
    }
}

// ============================================================================
// Steals and pickoffs
// ============================================================================

/// Result of a stolen-base attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StealOutcome {
    /// Runner safe.
    pub success: bool,
    /// Defense time minus offense time (s).
    pub margin: f64,
}

/// Time the defense saves on a steal of home: the catcher tags instead of throwing.
const HOME_STEAL_TAG: f64 = -1.6;

/// Race the battery against the runner.
pub fn resolve_steal(
    rng: &mut MatchRng,
    threat: &ThreatState,
    delivery: f64,
    pop: f64,
) -> StealOutcome {
    let tag = if threat.base == Base::Third {
        HOME_STEAL_TAG
    } else {
        0.0
    };
    let defense = delivery + pop + tag + rng.uniform(-0.05, 0.05);
    let margin = defense - threat.offense_time();
    StealOutcome {
        success: margin > 0.0,
        margin,
    }
}

/// Whether an AI runner breaks for the next base on this pitch.
pub fn ai_wants_steal(rng: &mut MatchRng, threat: &ThreatState, delivery: f64, pop: f64, outs: u8) -> bool {
    if threat.base == Base::Third {
        return false;
    }
    let expected = delivery + pop - threat.offense_time();
    let aggression = if outs == 2 { 0.3 } else { 0.2 };
    expected > 0.08 && rng.chance(aggression)
}

/// Result of a pickoff throw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickoffOutcome {
    /// Runner tagged out.
    pub picked: bool,
    /// Stamina the throw cost the pitcher.
    pub stamina_cost: f64,
    /// Lead after the throw (ft).
    pub lead_after: f64,
}

/// Pickoff probability from skill and lead, in `[0.02, 0.35]`.
#[must_use]
pub fn pickoff_chance(pickoff: f64, lead: f64) -> f64 {
    (0.05 + (pickoff - 50.0) * 0.004 + (lead - 7.0) * 0.02).clamp(0.02, 0.35)
}

/// Throw over. A miss still backs the runner off.
pub fn resolve_pickoff(rng: &mut MatchRng, threat: &mut ThreatState, pickoff: f64) -> PickoffOutcome {
    let picked = rng.chance(pickoff_chance(pickoff, threat.lead));
    threat.adjust_lead(if picked { -1.0 } else { -0.5 });
    PickoffOutcome {
        picked,
        stamina_cost: 0.75 + (pickoff - 50.0).max(0.0) * 0.01,
        lead_after: threat.lead,
    }
}

/// Whether an AI pitcher throws over before this pitch.
pub fn ai_wants_pickoff(rng: &mut MatchRng, threat: &ThreatState, pickoff: f64) -> bool {
    threat.lead >= 7.5 && rng.chance(0.1 + (pickoff - 50.0).max(0.0) * 0.003)
}

// ============================================================================
// Bunts
// ============================================================================

/// Kind of bunt called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuntKind {
    /// Give up the batter to move runners.
    Sacrifice,
    /// Runner from third breaks with the pitch.
    Squeeze,
}

/// Inputs for a bunt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuntInputs {
    /// Batter's effective contact.
    pub contact: f64,
    /// Batter's speed.
    pub speed: f64,
    /// Holds the bunt-specialist trait.
    pub bunt_master: bool,
    /// Defense drawn in.
    pub infield_in: bool,
}

/// Raw bunt roll before runners move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuntRoll {
    /// Ball put in play.
    pub contact: bool,
    /// Defense fumbled and everyone was safe.
    pub collapse: bool,
    /// Squeeze runner cut down at the plate.
    pub runner_out_at_home: bool,
}

/// Roll a bunt. Power plays no part.
pub fn roll_bunt(rng: &mut MatchRng, kind: BuntKind, inputs: &BuntInputs) -> BuntRoll {
    let specialist = if inputs.bunt_master { 0.15 } else { 0.0 };
    let contact_chance = (0.55 + (inputs.contact - 50.0) * 0.006 + specialist).clamp(0.3, 0.95);
    if !rng.chance(contact_chance) {
        return BuntRoll {
            contact: false,
            collapse: false,
            runner_out_at_home: false,
        };
    }
    let drawn_in = if inputs.infield_in { 0.05 } else { 0.0 };
    let collapse_chance =
        (0.08 + specialist * 0.5 + (inputs.speed - 50.0) * 0.002 - drawn_in).clamp(0.01, 0.3);
    let collapse = rng.chance(collapse_chance);
    let runner_out_at_home = kind == BuntKind::Squeeze
        && !collapse
        && rng.chance(if inputs.infield_in { 0.4 } else { 0.25 });
    BuntRoll {
        contact: true,
        collapse,
        runner_out_at_home,
    }
}

/// Where everyone ended up after a bunt in play.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuntAdvance {
    /// Runners who scored.
    pub scored: Vec<PlayerId>,
    /// Outs recorded.
    pub outs: u8,
    /// Batter reached base.
    pub batter_safe: bool,
}

/// Move runners for a bunt in play.
///
/// A collapse puts everyone on, forcing runners up one base. A clean
/// sacrifice retires the batter and moves every runner up one base (a
/// runner on third only scores on a squeeze). A defended squeeze cuts the
/// runner down at the plate and leaves the batter on first.
pub fn advance_on_bunt(bases: &mut Bases, batter: PlayerId, kind: BuntKind, roll: BuntRoll) -> BuntAdvance {
    let mut advance = BuntAdvance::default();
    if roll.collapse {
        advance.scored.extend(bases.advance_all());
        bases.set(Base::First, batter);
        advance.batter_safe = true;
        return advance;
    }
    if roll.runner_out_at_home {
        bases.clear(Base::Third);
        advance.outs = 1;
        if let Some(second) = bases.clear(Base::Second) {
            bases.set(Base::Third, second);
        }
        if let Some(first) = bases.clear(Base::First) {
            bases.set(Base::Second, first);
        }
        bases.set(Base::First, batter);
        advance.batter_safe = true;
        return advance;
    }
    advance.outs = 1;
    if kind == BuntKind::Squeeze || (bases.is_occupied(Base::Second) && bases.is_occupied(Base::First)) {
        advance.scored.extend(bases.advance_all());
    } else {
        if let Some(second) = bases.clear(Base::Second) {
            if bases.is_occupied(Base::Third) {
                bases.set(Base::Second, second);
            } else {
                bases.set(Base::Third, second);
            }
        }
        if let Some(first) = bases.clear(Base::First) {
            if bases.is_occupied(Base::Second) {
                bases.set(Base::First, first);
            } else {
                bases.set(Base::Second, first);
            }
        }
    }
    advance
}

// ============================================================================
// Advancement on balls in play
// ============================================================================

/// Extra aggression with two outs.
fn aggression(outs: u8) -> f64 {
    if outs == 2 {
        0.15
    } else {
        0.0
    }
}

/// Move runners on a clean hit and place the batter.
///
/// Runners on third always score. Runners on second score on a single
/// by a speed roll, runners on first may go first-to-third, and score
/// from first on a double by a speed roll. Returns runners who scored,
/// lead runner first; the batter is included on a home run.
pub fn advance_on_hit<F>(
    rng: &mut MatchRng,
    bases: &mut Bases,
    hit: PlayResult,
    batter: PlayerId,
    outs: u8,
    speed_of: F,
) -> Vec<PlayerId>
where
    F: Fn(PlayerId) -> f64,
{
    let r1 = bases.clear(Base::First);
    let r2 = bases.clear(Base::Second);
    let r3 = bases.clear(Base::Third);
    let mut scored = Vec::new();

    match hit {
        PlayResult::Out => {
            // Nothing moves on an out here; callers handle forces.
            for (base, runner) in [(Base::First, r1), (Base::Second, r2), (Base::Third, r3)] {
                if let Some(runner) = runner {
                    bases.set(base, runner);
                }
            }
        }
        PlayResult::Single => {
            scored.extend(r3);
            if let Some(runner) = r2 {
                let chance =
                    (0.45 + (speed_of(runner) - 50.0) * 0.01 + aggression(outs)).clamp(0.25, 0.95);
                if rng.chance(chance) {
                    scored.push(runner);
                } else {
                    bases.set(Base::Third, runner);
                }
            }
            if let Some(runner) = r1 {
                let chance = (0.25 + (speed_of(runner) - 50.0) * 0.008 + aggression(outs) * 0.5)
                    .clamp(0.05, 0.8);
                if !bases.is_occupied(Base::Third) && rng.chance(chance) {
                    bases.set(Base::Third, runner);
                } else {
                    bases.set(Base::Second, runner);
                }
            }
            bases.set(Base::First, batter);
        }
        PlayResult::Double => {
            scored.extend(r3);
            scored.extend(r2);
            if let Some(runner) = r1 {
                let chance =
                    (0.55 + (speed_of(runner) - 50.0) * 0.01 + aggression(outs)).clamp(0.3, 0.97);
                if rng.chance(chance) {
                    scored.push(runner);
                } else {
                    bases.set(Base::Third, runner);
                }
            }
            bases.set(Base::Second, batter);
        }
        PlayResult::Triple => {
            scored.extend(r3);
            scored.extend(r2);
            scored.extend(r1);
            bases.set(Base::Third, batter);
        }
        PlayResult::HomeRun => {
            scored.extend(r3);
            scored.extend(r2);
            scored.extend(r1);
            scored.push(batter);
        }
    }
    scored
}

/// Batter reaches on an error: every runner moves up one base.
pub fn advance_on_error(bases: &mut Bases, batter: PlayerId) -> Vec<PlayerId> {
    let scored = bases.advance_all();
    bases.set(Base::First, batter);
    scored
}

/// Ground out to first: forced runners move up, the rest hold.
pub fn advance_on_ground_out(bases: &mut Bases) -> Vec<PlayerId> {
    let mut scored = Vec::new();
    if !bases.is_occupied(Base::First) {
        return scored;
    }
    if bases.is_occupied(Base::Second) {
        if bases.is_occupied(Base::Third) {
            scored.extend(bases.clear(Base::Third));
        }
        if let Some(second) = bases.clear(Base::Second) {
            bases.set(Base::Third, second);
        }
    }
    if let Some(first) = bases.clear(Base::First) {
        bases.set(Base::Second, first);
    }
    scored
}

/// Double play: the runner from first is forced at second and the batter
/// is out at first. Other forced runners move up. Returns runners who
/// scored and the runner retired at second.
pub fn advance_on_double_play(bases: &mut Bases) -> (Vec<PlayerId>, Option<PlayerId>) {
    let retired = bases.clear(Base::First);
    let mut scored = Vec::new();
    if retired.is_some() && bases.is_occupied(Base::Second) {
        if bases.is_occupied(Base::Third) {
            scored.extend(bases.clear(Base::Third));
        }
        if let Some(second) = bases.clear(Base::Second) {
            bases.set(Base::Third, second);
        }
    }
    (scored, retired)
}

/// Whether a runner tagging from third beats the throw home on a caught fly.
///
/// Outfield throws travel at three quarters of the fielder's arm speed
/// after a short crow hop.
pub fn tag_up_scores(
    rng: &mut MatchRng,
    ball: &BattedBall,
    fielder: &FielderSnapshot,
    profile: &DefenseProfile,
    runner_speed: f64,
) -> bool {
    if !fielder.position.is_outfield() {
        return false;
    }
    let arm = ((75.0 + (fielder.arm - 50.0) * 0.9 + profile.arm_bonus) * MPH_TO_FTPS).max(70.0);
    let throw_distance = (ball.landing_x - HOME_PLATE.0).hypot(ball.landing_y - HOME_PLATE.1);
    let throw = throw_distance / (arm * 0.75) + 0.6 + rng.uniform(-0.2, 0.2);
    let runner = (3.3 - (runner_speed - 50.0) * 0.012).max(2.8);
    throw > runner
}
