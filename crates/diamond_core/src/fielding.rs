//! Batted-ball flight and fielding geometry.
//!
//! A ball leaves the bat with exit velocity, launch angle and spray angle.
//! [`BattedBall::simulate`] turns those into a landing point with a damped
//! projectile model, classifies it by launch angle and flags home runs
//! that clear the fence. [`resolve_play`] then races the nearest eligible
//! defender against the ball (hang time for air balls, ground transit for
//! grounders) and, on grounders, the throw against the batter.
//!
//! Coordinates are feet with home plate at the origin, first base up the
//! positive x axis and second base straight out along y.
//!
//! # Determinism
//!
//! Flight is a pure function of its inputs. Error rolls draw from the
//! match RNG in a fixed order: fielding error, then throwing error.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Tuning;
use crate::context::SituationContext;
use crate::data::{RollKind, TraitTable, WeatherProfile};
use crate::player::{PlayerId, PlayerSnapshot, Position};
use crate::rng::MatchRng;
use crate::state::TeamState;

const GRAVITY_FTPS2: f64 = 32.174;
/// Miles per hour to feet per second.
pub const MPH_TO_FTPS: f64 = 1.466_67;

/// First base bag.
pub const FIRST_BASE: (f64, f64) = (63.5, 63.5);
/// Second base bag.
pub const SECOND_BASE: (f64, f64) = (0.0, 127.0);
/// Home plate.
pub const HOME_PLATE: (f64, f64) = (0.0, 0.0);

/// Rating used for a defender nobody is assigned to.
const FILL_IN_RATING: f64 = 55.0;

// ============================================================================
// Alignment
// ============================================================================

/// Live defensive shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Shift {
    /// Standard depth.
    #[default]
    None,
    /// Middle infielders cheat toward second.
    DoublePlay,
    /// Infield drawn in to cut down a run at the plate.
    InfieldIn,
    /// Outfield backed up against extra-base hits.
    DeepOutfield,
}

impl Shift {
    /// Offset applied to a position's standard spot.
    #[must_use]
    pub const fn offset(self, position: Position) -> (f64, f64) {
        match (self, position) {
            (Shift::DoublePlay, Position::SecondBase | Position::Shortstop) => (0.0, -10.0),
            (
                Shift::InfieldIn,
                Position::FirstBase | Position::SecondBase | Position::Shortstop | Position::ThirdBase,
            ) => (0.0, -18.0),
            (
                Shift::DeepOutfield,
                Position::LeftField | Position::CenterField | Position::RightField,
            ) => (0.0, 20.0),
            _ => (0.0, 0.0),
        }
    }
}

/// Pick a shift for an AI-managed defense.
///
/// Drawn in with a runner on third in a late, close game; double-play
/// depth with a force at second; deep against a slugger; otherwise none.
#[must_use]
pub fn choose_shift(batter: &PlayerSnapshot, ctx: &SituationContext, third_occupied: bool) -> Shift {
    if ctx.outs < 2 && third_occupied && ctx.is_clutch() {
        Shift::InfieldIn
    } else if ctx.outs < 2 && ctx.runner_on_first {
        Shift::DoublePlay
    } else if batter.batting.power >= 75 {
        Shift::DeepOutfield
    } else {
        Shift::None
    }
}

/// Team-level defensive tendencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefenseProfile {
    /// Display name.
    pub name: String,
    /// Sprint speed and reaction multiplier.
    pub range_multiplier: f64,
    /// Added to every reliability rating.
    pub reliability_bonus: f64,
    /// Added to throw velocity (mph).
    pub arm_bonus: f64,
    /// Multiplier on error chance.
    pub error_rate: f64,
}

impl Default for DefenseProfile {
    fn default() -> Self {
        Self {
            name: "Neutral Defense".into(),
            range_multiplier: 1.0,
            reliability_bonus: 0.0,
            arm_bonus: 0.0,
            error_rate: 1.0,
        }
    }
}

impl DefenseProfile {
    fn sprint_speed(&self, rating: f64) -> f64 {
        ((20.5 + (rating - 50.0) * 0.22) * self.range_multiplier).max(14.0)
    }

    fn reaction_delay(&self, rating: f64) -> f64 {
        let delay = 0.38 - (rating - 50.0) * 0.0042;
        (delay / self.range_multiplier.max(0.6)).clamp(0.06, 0.48)
    }

    fn reliability(&self, rating: f64) -> f64 {
        (rating + self.reliability_bonus).clamp(25.0, 99.0)
    }

    fn arm_velocity(&self, rating: f64) -> f64 {
        ((75.0 + (rating - 50.0) * 0.9 + self.arm_bonus) * MPH_TO_FTPS).max(70.0)
    }
}

/// Standard spot for a defensive position.
#[must_use]
pub const fn standard_spot(position: Position) -> (f64, f64) {
    match position {
        Position::Pitcher => (0.0, 57.5),
        Position::Catcher => (0.0, -8.0),
        Position::FirstBase => (63.5, 63.5),
        Position::SecondBase => (0.0, 127.0),
        Position::Shortstop => (-35.0, 115.0),
        Position::ThirdBase => (-63.5, 63.5),
        Position::LeftField => (-185.0, 215.0),
        Position::CenterField => (0.0, 250.0),
        Position::RightField => (185.0, 215.0),
        Position::DesignatedHitter => (0.0, 0.0),
    }
}

/// One defender on the field.
#[derive(Debug, Clone, PartialEq)]
pub struct FielderSnapshot {
    /// Player, or `None` for a league-average fill-in.
    pub player: Option<PlayerId>,
    /// Position played.
    pub position: Position,
    /// Field x (ft).
    pub x: f64,
    /// Field y (ft).
    pub y: f64,
    /// Sprint rating.
    pub speed: f64,
    /// Reaction rating.
    pub reaction: f64,
    /// Glove reliability rating.
    pub reliability: f64,
    /// Arm rating.
    pub arm: f64,
    /// Additive error probability from traits.
    pub error_modifier: f64,
}

impl FielderSnapshot {
    fn at(position: Position, shift: Shift) -> (f64, f64) {
        let (x, y) = standard_spot(position);
        let (dx, dy) = shift.offset(position);
        (x + dx, y + dy)
    }

    /// Snapshot of a rostered player.
    #[must_use]
    pub fn of(
        player: &PlayerSnapshot,
        position: Position,
        shift: Shift,
        traits: &TraitTable,
        ctx: Option<&SituationContext>,
    ) -> Self {
        let (x, y) = Self::at(position, shift);
        Self {
            player: Some(player.id),
            position,
            x,
            y,
            speed: f64::from(player.batting.speed),
            reaction: f64::from(player.personality.awareness),
            reliability: f64::from(player.fielding.fielding),
            arm: f64::from(player.fielding.throwing),
            error_modifier: traits.roll_modifier(player, RollKind::Error, ctx),
        }
    }

    /// League-average stand-in for an unmanned position.
    #[must_use]
    pub fn fill_in(position: Position, shift: Shift) -> Self {
        let (x, y) = Self::at(position, shift);
        Self {
            player: None,
            position,
            x,
            y,
            speed: FILL_IN_RATING,
            reaction: FILL_IN_RATING,
            reliability: FILL_IN_RATING,
            arm: FILL_IN_RATING,
            error_modifier: 0.0,
        }
    }

    fn distance_to(&self, point: (f64, f64)) -> f64 {
        distance((self.x, self.y), point)
    }
}

/// The fielding side's nine defenders, unmanned spots filled with
/// league-average stand-ins.
#[must_use]
pub fn build_alignment(
    team: &TeamState,
    shift: Shift,
    traits: &TraitTable,
    ctx: Option<&SituationContext>,
) -> Vec<FielderSnapshot> {
    Position::FIELD
        .iter()
        .map(|position| match team.fielder_at(*position) {
            Some(player) => FielderSnapshot::of(player, *position, shift, traits, ctx),
            None => {
                warn!(team = %team.roster().name, position = position.abbreviation(), "No fielder assigned; using a league-average defender");
                FielderSnapshot::fill_in(*position, shift)
            }
        })
        .collect()
}

/// Fielding error environment scalar from the weather, in `[0.5, 1.8]`.
#[must_use]
pub fn environment_error_scalar(weather: &WeatherProfile) -> f64 {
    let wet = if weather.is_wet() { 0.3 } else { 0.0 };
    (1.0 + weather.error * 10.0 + wet).clamp(0.5, 1.8)
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

// ============================================================================
// Flight
// ============================================================================

/// Trajectory class by launch angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BallType {
    /// On the ground.
    Ground,
    /// Line drive.
    Line,
    /// Fly ball.
    Fly,
}

/// A batted ball in flight. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BattedBall {
    /// Exit velocity (mph).
    pub exit_velocity: f64,
    /// Launch angle (degrees).
    pub launch_angle: f64,
    /// Spray angle (degrees, negative toward left field).
    pub spray_angle: f64,
    /// Time in the air (s).
    pub hang_time: f64,
    /// Distance from home to the landing point (ft).
    pub landing_distance: f64,
    /// Landing x (ft).
    pub landing_x: f64,
    /// Landing y (ft).
    pub landing_y: f64,
    /// Peak height (ft).
    pub apex_height: f64,
    /// Time until a fielder can first touch it (s).
    pub ground_time: f64,
    /// Trajectory class.
    pub ball_type: BallType,
    /// Cleared the fence.
    pub is_home_run: bool,
}

impl BattedBall {
    /// Fly a ball with the given launch parameters.
    ///
    /// `carry` is the weather's fractional change to air-ball distance.
    #[must_use]
    pub fn simulate(
        exit_velocity: f64,
        launch_angle: f64,
        spray_angle: f64,
        carry: f64,
        tuning: &Tuning,
    ) -> Self {
        let velocity = exit_velocity * MPH_TO_FTPS;
        let angle = launch_angle.clamp(-5.0, 75.0).to_radians();
        let vertical = velocity * angle.sin();
        let ball_type = if launch_angle < tuning.ground_ball_max_angle {
            BallType::Ground
        } else if launch_angle < tuning.line_drive_max_angle {
            BallType::Line
        } else {
            BallType::Fly
        };

        let (hang_time, landing_distance, ground_time) = match ball_type {
            BallType::Ground => {
                let hang = (0.35 + launch_angle / 35.0).max(0.18);
                let distance = (100.0 + (exit_velocity - 80.0) * 1.8).clamp(85.0, 170.0);
                (hang, distance, hang + distance / tuning.ground_ball_speed_fps)
            }
            BallType::Line | BallType::Fly => {
                let hang = (2.0 * vertical / GRAVITY_FTPS2).max(0.6);
                let vacuum = velocity.powi(2) * (2.0 * angle).sin() / GRAVITY_FTPS2;
                let distance = (vacuum / tuning.air_resistance * (1.0 + carry)).max(70.0);
                (hang, distance, hang)
            }
        };

        let spray = spray_angle.to_radians();
        Self {
            exit_velocity,
            launch_angle,
            spray_angle,
            hang_time,
            landing_distance,
            landing_x: landing_distance * spray.sin(),
            landing_y: landing_distance * spray.cos(),
            apex_height: vertical.max(0.0).powi(2) / (2.0 * GRAVITY_FTPS2),
            ground_time,
            ball_type,
            is_home_run: ball_type != BallType::Ground && landing_distance >= tuning.fence_distance_ft,
        }
    }

    /// Landing point.
    #[must_use]
    pub const fn landing(&self) -> (f64, f64) {
        (self.landing_x, self.landing_y)
    }

    /// Bases earned when nobody makes the play.
    #[must_use]
    pub fn bases_if_missed(&self) -> PlayResult {
        match self.ball_type {
            BallType::Ground if self.landing_distance < 140.0 => PlayResult::Single,
            BallType::Ground => PlayResult::Double,
            _ if self.landing_distance >= 300.0 => PlayResult::Triple,
            _ if self.landing_distance >= 240.0 => PlayResult::Double,
            _ => PlayResult::Single,
        }
    }
}

// ============================================================================
// Play resolution
// ============================================================================

/// Result of a ball in play, before baserunning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayResult {
    /// Batter retired.
    Out,
    /// Batter to first.
    Single,
    /// Batter to second.
    Double,
    /// Batter to third.
    Triple,
    /// Over the fence.
    HomeRun,
}

impl PlayResult {
    /// Bases the batter takes.
    #[must_use]
    pub const fn bases(self) -> u8 {
        match self {
            PlayResult::Out => 0,
            PlayResult::Single => 1,
            PlayResult::Double => 2,
            PlayResult::Triple => 3,
            PlayResult::HomeRun => 4,
        }
    }

    /// Scorebook tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            PlayResult::Out => "Out",
            PlayResult::Single => "1B",
            PlayResult::Double => "2B",
            PlayResult::Triple => "3B",
            PlayResult::HomeRun => "HR",
        }
    }
}

/// Error sub-tag on a play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Booted or dropped.
    Fielding,
    /// Throw went wide.
    Throwing,
}

/// Outcome of the defense's attempt on a ball in play.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldingPlay {
    /// Result for the batter.
    pub result: PlayResult,
    /// Defender who made (or missed) the play.
    pub fielder: Option<Position>,
    /// Player at that position, if rostered.
    pub fielder_id: Option<PlayerId>,
    /// Error charged, if any.
    pub error: Option<ErrorKind>,
    /// Caught on the fly.
    pub caught: bool,
    /// Fielded without a bobble.
    pub fielded_clean: bool,
    /// Throw to first completed in time.
    pub throw_completed: bool,
    /// Time the fielder needed to reach the ball (s).
    pub time_to_ball: f64,
    /// Narrative line.
    pub description: String,
}

impl FieldingPlay {
    fn new(result: PlayResult, fielder: Option<&FielderSnapshot>, description: impl Into<String>) -> Self {
        Self {
            result,
            fielder: fielder.map(|f| f.position),
            fielder_id: fielder.and_then(|f| f.player),
            error: None,
            caught: false,
            fielded_clean: false,
            throw_completed: false,
            time_to_ball: 0.0,
            description: description.into(),
        }
    }
}

/// Everything the defense brings to one play beyond the alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayContext<'a> {
    /// Team profile.
    pub profile: &'a DefenseProfile,
    /// Weather error scalar, clamped to `[0.5, 1.8]` on use.
    pub environment: f64,
    /// Fielding side's momentum multiplier; steadies the glove.
    pub momentum: f64,
    /// Batter's speed rating.
    pub runner_speed: f64,
}

/// Seconds for a batter to reach first.
#[must_use]
pub fn runner_time_to_first(speed: f64) -> f64 {
    (4.35 - (speed - 50.0) * 0.022).clamp(3.55, 4.6)
}

fn transfer_time(reliability: f64) -> f64 {
    (0.42 - (reliability - 50.0) * 0.0025).clamp(0.18, 0.45)
}

fn error_occurs(
    rng: &mut MatchRng,
    fielder: &FielderSnapshot,
    reliability: f64,
    play: &PlayContext<'_>,
    rate: f64,
) -> bool {
    let environment = play.environment.clamp(0.5, 1.8);
    let chance = ((70.0 - reliability) / 170.0).max(0.01) * play.profile.error_rate * rate * environment
        / play.momentum.max(1.0)
        + fielder.error_modifier;
    rng.chance(chance.clamp(0.0, 1.0))
}

/// Closest defender allowed to field this ball. Grounders are infield-only.
#[must_use]
pub fn pick_fielder<'a>(ball: &BattedBall, defenders: &'a [FielderSnapshot]) -> Option<&'a FielderSnapshot> {
    let landing = ball.landing();
    defenders
        .iter()
        .filter(|f| ball.ball_type != BallType::Ground || !f.position.is_outfield())
        .min_by(|a, b| a.distance_to(landing).total_cmp(&b.distance_to(landing)))
}

/// Resolve the defense's attempt on a ball in play.
pub fn resolve_play(
    rng: &mut MatchRng,
    ball: &BattedBall,
    defenders: &[FielderSnapshot],
    play: &PlayContext<'_>,
) -> FieldingPlay {
    if ball.is_home_run {
        return FieldingPlay::new(PlayResult::HomeRun, None, "Launched over the wall!");
    }

    let Some(fielder) = pick_fielder(ball, defenders) else {
        return FieldingPlay::new(ball.bases_if_missed(), None, "No defender nearby; it rolls to the wall.");
    };

    let profile = play.profile;
    let reliability = profile.reliability(fielder.reliability);
    let mut reaction = profile.reaction_delay(fielder.reaction);
    if ball.ball_type == BallType::Ground {
        reaction *= 0.7;
    }
    let time_to_ball =
        reaction + fielder.distance_to(ball.landing()) / profile.sprint_speed(fielder.speed);

    let mut result = if ball.ball_type == BallType::Ground {
        resolve_grounder(rng, ball, fielder, reliability, time_to_ball, play)
    } else {
        resolve_air_ball(rng, ball, fielder, reliability, time_to_ball, play)
    };
    result.time_to_ball = time_to_ball;
    result
}

fn resolve_air_ball(
    rng: &mut MatchRng,
    ball: &BattedBall,
    fielder: &FielderSnapshot,
    reliability: f64,
    time_to_ball: f64,
    play: &PlayContext<'_>,
) -> FieldingPlay {
    let pos = fielder.position.abbreviation();
    if time_to_ball <= ball.hang_time {
        if error_occurs(rng, fielder, reliability, play, 1.0) {
            let mut result =
                FieldingPlay::new(PlayResult::Single, Some(fielder), format!("{pos} drops the easy fly!"));
            result.error = Some(ErrorKind::Fielding);
            return result;
        }
        let mut result =
            FieldingPlay::new(PlayResult::Out, Some(fielder), format!("{pos} camps under it for the out."));
        result.caught = true;
        result.fielded_clean = true;
        return result;
    }
    let hit = ball.bases_if_missed();
    let line = if hit == PlayResult::Single {
        "Falls in front of the outfield for a single."
    } else {
        "Drifts into the gap for extra bases."
    };
    FieldingPlay::new(hit, Some(fielder), line)
}

fn resolve_grounder(
    rng: &mut MatchRng,
    ball: &BattedBall,
    fielder: &FielderSnapshot,
    reliability: f64,
    time_to_ball: f64,
    play: &PlayContext<'_>,
) -> FieldingPlay {
    let pos = fielder.position.abbreviation();
    if time_to_ball > ball.ground_time + 0.2 {
        let hit = ball.bases_if_missed();
        let line = if hit == PlayResult::Single {
            "Grounder sneaks through the hole."
        } else {
            "Smoked past the infield!"
        };
        return FieldingPlay::new(hit, Some(fielder), line);
    }

    let throw = fielder.distance_to(FIRST_BASE) / play.profile.arm_velocity(fielder.arm);
    let defense_time = time_to_ball + transfer_time(reliability) + throw;

    if error_occurs(rng, fielder, reliability, play, 0.9) {
        let mut result = FieldingPlay::new(PlayResult::Single, Some(fielder), format!("{pos} boots it!"));
        result.error = Some(ErrorKind::Fielding);
        return result;
    }
    if defense_time <= runner_time_to_first(play.runner_speed) {
        if error_occurs(rng, fielder, reliability, play, 1.05) {
            let mut result = FieldingPlay::new(
                PlayResult::Single,
                Some(fielder),
                "Throw pulls the first baseman off the bag!",
            );
            result.error = Some(ErrorKind::Throwing);
            result.fielded_clean = true;
            return result;
        }
        let mut result = FieldingPlay::new(
            PlayResult::Out,
            Some(fielder),
            format!("{pos} makes the play and beats him by a step."),
        );
        result.fielded_clean = true;
        result.throw_completed = true;
        return result;
    }
    let mut result = FieldingPlay::new(PlayResult::Single, Some(fielder), "Beats it out for an infield single.");
    result.fielded_clean = true;
    result
}

// ============================================================================
// Double plays
// ============================================================================

/// Whether a clean ground out with a force at second turns two.
///
/// The fielder throws to the pivot man at second, who relays to first.
/// The lead runner is forced if the first throw beats him; the batter is
/// doubled up if the relay also beats him.
#[must_use]
pub fn turns_double_play(
    play: &FieldingPlay,
    defenders: &[FielderSnapshot],
    context: &PlayContext<'_>,
    lead_runner_speed: f64,
) -> bool {
    let Some(position) = play.fielder else {
        return false;
    };
    if play.result != PlayResult::Out || !play.fielded_clean || play.caught {
        return false;
    }
    let Some(fielder) = defenders.iter().find(|f| f.position == position) else {
        return false;
    };
    let pivot_position = if position == Position::SecondBase {
        Position::Shortstop
    } else {
        Position::SecondBase
    };
    let Some(pivot) = defenders.iter().find(|f| f.position == pivot_position) else {
        return false;
    };

    let profile = context.profile;
    let feed = if fielder.distance_to(SECOND_BASE) < 15.0 {
        // Unassisted: the fielder steps on the bag himself.
        fielder.distance_to(SECOND_BASE) / profile.sprint_speed(fielder.speed)
    } else {
        transfer_time(profile.reliability(fielder.reliability))
            + fielder.distance_to(SECOND_BASE) / profile.arm_velocity(fielder.arm)
    };
    let force_time = play.time_to_ball + feed;
    // Runner from first takes roughly the steal sprint with a short secondary lead.
    let lead_runner = (3.75 - (lead_runner_speed - 50.0) * 0.015).max(3.0) + 0.25;
    if force_time > lead_runner {
        return false;
    }
    let relay = transfer_time(profile.reliability(pivot.reliability)) + 0.15
        + distance(SECOND_BASE, FIRST_BASE) / profile.arm_velocity(pivot.arm);
    force_time + relay <= runner_time_to_first(context.runner_speed)
}
