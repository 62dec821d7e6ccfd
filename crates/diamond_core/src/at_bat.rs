//! The plate-appearance state machine.
//!
//! [`run_plate_appearance`] drives one batter's turn from the first sign to
//! a terminal result. Each pass through the loop:
//!
//! 1. the battery settles on a sign (AI negotiation or a human choice);
//! 2. the pitcher decides whether to hold runners with a slide step;
//! 3. an optional special action (pickoff, steal, bunt) is checked and
//!    resolved, possibly ending the plate appearance;
//! 4. the pitch is delivered and either called by the umpire or swung at;
//! 5. counts, confidence, momentum and psychology are updated, and a ball in
//!    play goes to the fielding and baserunning engines.
//!
//! Events are published at fixed checkpoints (sign, pitch thrown, pitch
//! resolved, play resolved, plate appearance ended), always after the state
//! they describe has been applied.
//!
//! # Human input
//!
//! When the batting or fielding side is human-controlled, the swing or pitch
//! choice comes from a [`DecisionProvider`] instead of the AI path. The call
//! is synchronous: the simulation waits on the provider's answer.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::baserunning::{
    advance_on_bunt, advance_on_double_play, advance_on_error, advance_on_ground_out,
    advance_on_hit, ai_wants_pickoff, ai_wants_steal, delivery_time, pop_time, resolve_pickoff,
    resolve_steal, roll_bunt, slide_step, tag_up_scores, BuntInputs, BuntKind, BuntRoll,
    PickoffOutcome, SlideStep, StealOutcome,
};
use crate::battery::{BatterRead, NegotiationStep, Sign, SignInputs, SignOutcome};
use crate::config::Tuning;
use crate::confidence::{BatteryCushion, ConfidenceChange, ConfidenceEvent};
use crate::context::SituationContext;
use crate::data::{GameData, RollKind, TraitFlag};
use crate::error::{Result, SimError};
use crate::events::{EventBus, MatchEvent};
use crate::fielding::{
    build_alignment, choose_shift, environment_error_scalar, resolve_play, turns_double_play,
    BallType, BattedBall, PlayContext, PlayResult, Shift,
};
use crate::momentum::MomentumKey;
use crate::physics::{
    ai_should_swing, classify_contact, contact_quality, deliver, fatigue_effect, fatigue_scale,
    hit_by_pitch_chance, injury_chance, injury_severity, launch, stamina_cost, wild_pitch_chance,
    Aim, BatterInputs, DeliveryInputs, PitchDescription, PitchLocation, PitchResolution,
    SwingApproach, SwingChoice, SwingOutcome, ThrownPitch,
};
use crate::player::{
    Controller, PitchGrip, PitchKind, PlayerId, PlayerSnapshot, Position, Stat, TeamSide,
};
use crate::psychology::PlateOutcome;
use crate::state::{Base, Bases, Count, MatchState};
use crate::umpire::{framing_skill, CallContext};

/// Pickoff throws allowed per plate appearance.
pub const MAX_PICKOFFS: u8 = 3;

/// Consecutive reaching batters that set off a rally.
pub const RALLY_STREAK: u32 = 3;

/// Contact quality the catcher logs as hard contact.
const HARD_CONTACT: f64 = 35.0;

// ============================================================================
// Results
// ============================================================================

/// How a plate appearance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlateAppearanceResult {
    /// Third strike.
    Strikeout,
    /// Ball four.
    Walk,
    /// Plunked.
    HitByPitch,
    /// Clean single.
    Single,
    /// Clean double.
    Double,
    /// Clean triple.
    Triple,
    /// Over the fence.
    HomeRun,
    /// Retired on a ball in play.
    Out,
    /// Grounded into a double play.
    DoublePlay,
    /// Caught fly that scored the runner from third.
    SacrificeFly,
    /// Reached because the defense erred.
    ReachedOnError,
    /// Gave himself up to move runners.
    SacrificeBunt,
    /// Bunt the defense could not handle.
    BuntSingle,
    /// Reached while the lead runner was cut down.
    FieldersChoice,
    /// Third out made on the bases; the batter leads off next half.
    RetiredOnBases,
    /// The winning run scored before the plate appearance finished.
    GameDecided,
}

impl PlateAppearanceResult {
    /// Counts as a hit.
    #[must_use]
    pub const fn is_hit(self) -> bool {
        matches!(
            self,
            Self::Single | Self::Double | Self::Triple | Self::HomeRun | Self::BuntSingle
        )
    }

    /// Batter ended up on base (or scored).
    #[must_use]
    pub const fn reached_base(self) -> bool {
        self.is_hit()
            || matches!(
                self,
                Self::Walk | Self::HitByPitch | Self::ReachedOnError | Self::FieldersChoice
            )
    }

    /// The batter completed the plate appearance and the lineup turns over.
    #[must_use]
    pub const fn batter_finished(self) -> bool {
        !matches!(self, Self::RetiredOnBases | Self::GameDecided)
    }

    /// Charged as an official at-bat.
    #[must_use]
    pub const fn counts_as_at_bat(self) -> bool {
        self.batter_finished()
            && !matches!(
                self,
                Self::Walk | Self::HitByPitch | Self::SacrificeBunt | Self::SacrificeFly
            )
    }

    /// Scorebook abbreviation.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Strikeout => "K",
            Self::Walk => "BB",
            Self::HitByPitch => "HBP",
            Self::Single => "1B",
            Self::Double => "2B",
            Self::Triple => "3B",
            Self::HomeRun => "HR",
            Self::Out => "OUT",
            Self::DoublePlay => "GIDP",
            Self::SacrificeFly => "SF",
            Self::ReachedOnError => "ROE",
            Self::SacrificeBunt => "SH",
            Self::BuntSingle => "1B (bunt)",
            Self::FieldersChoice => "FC",
            Self::RetiredOnBases => "RET",
            Self::GameDecided => "WO",
        }
    }

    fn from_hit(hit: PlayResult) -> Self {
        match hit {
            PlayResult::Out => Self::Out,
            PlayResult::Single => Self::Single,
            PlayResult::Double => Self::Double,
            PlayResult::Triple => Self::Triple,
            PlayResult::HomeRun => Self::HomeRun,
        }
    }
}

// ============================================================================
// Special actions
// ============================================================================

/// A non-pitch action called before the pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialAction {
    /// The runner on this base breaks for the next one.
    Steal(Base),
    /// The pitcher throws over to this base.
    Pickoff(Base),
    /// The batter squares to bunt.
    Bunt(BuntKind),
}

/// Why a requested action was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Nobody on the base the action needs.
    NoRunner(Base),
    /// The base the runner would take is occupied.
    TargetOccupied,
    /// A sacrifice with nobody to move up.
    NothingToAdvance,
    /// Pickoff throws used up for this plate appearance.
    PickoffLimit,
    /// Only one bunt attempt per plate appearance.
    BuntAlreadyTried,
    /// The action belongs to the other side.
    WrongSide,
}

/// Result of a special action that was attempted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionResult {
    /// Steal race.
    Steal {
        /// Runner.
        runner: PlayerId,
        /// Base the runner left.
        from: Base,
        /// Race result.
        outcome: StealOutcome,
    },
    /// Pickoff throw.
    Pickoff {
        /// Runner.
        runner: PlayerId,
        /// Base thrown to.
        base: Base,
        /// Throw result.
        outcome: PickoffOutcome,
    },
    /// Bunt roll.
    Bunt {
        /// Bunt called.
        kind: BuntKind,
        /// Roll.
        roll: BuntRoll,
    },
}

/// Explicit outcome of a pre-pitch action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionOutcome<T> {
    /// Nobody called an action.
    NotAttempted,
    /// An action was called but its preconditions failed.
    Skipped(SkipReason),
    /// The action was carried out.
    Resolved(T),
}

impl<T> ActionOutcome<T> {
    /// Whether the action ran.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// The resolved value, if any.
    pub fn resolved(self) -> Option<T> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::NotAttempted | Self::Skipped(_) => None,
        }
    }
}

/// Check an action against the bases.
///
/// # Errors
///
/// Returns the [`SkipReason`] when the action cannot be attempted.
pub fn check_action(
    action: SpecialAction,
    bases: &Bases,
    pickoffs: u8,
    bunt_tried: bool,
) -> std::result::Result<(), SkipReason> {
    match action {
        SpecialAction::Steal(base) => {
            if !bases.is_occupied(base) {
                return Err(SkipReason::NoRunner(base));
            }
            if base.next().is_some_and(|next| bases.is_occupied(next)) {
                return Err(SkipReason::TargetOccupied);
            }
        }
        SpecialAction::Pickoff(base) => {
            if !bases.is_occupied(base) {
                return Err(SkipReason::NoRunner(base));
            }
            if pickoffs >= MAX_PICKOFFS {
                return Err(SkipReason::PickoffLimit);
            }
        }
        SpecialAction::Bunt(kind) => {
            if bunt_tried {
                return Err(SkipReason::BuntAlreadyTried);
            }
            match kind {
                BuntKind::Squeeze if !bases.is_occupied(Base::Third) => {
                    return Err(SkipReason::NoRunner(Base::Third));
                }
                BuntKind::Sacrifice if bases.is_empty() => {
                    return Err(SkipReason::NothingToAdvance);
                }
                _ => {}
            }
        }
    }
    Ok(())
}

// ============================================================================
// Human input seam
// ============================================================================

/// What a human pitcher sees before choosing a pitch.
#[derive(Debug, Clone, Copy)]
pub struct PitchPrompt<'a> {
    /// Pitcher.
    pub pitcher: PlayerId,
    /// Batter.
    pub batter: PlayerId,
    /// Count before the pitch.
    pub count: Count,
    /// Outs.
    pub outs: u8,
    /// Runners.
    pub bases: Bases,
    /// Catcher's sign.
    pub suggestion: Sign,
    /// Grips available.
    pub repertoire: &'a [PitchGrip],
}

/// What a human batter sees before deciding to swing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPrompt {
    /// Batter.
    pub batter: PlayerId,
    /// Pitcher.
    pub pitcher: PlayerId,
    /// Count before the pitch.
    pub count: Count,
    /// Outs.
    pub outs: u8,
    /// Pitch type.
    pub pitch: PitchKind,
    /// Where it is headed.
    pub location: PitchLocation,
    /// Velocity (km/h).
    pub velocity_kmh: f64,
}

/// What a human manager sees before calling an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPrompt {
    /// Side being asked.
    pub side: TeamSide,
    /// Whether that side is batting.
    pub batting: bool,
    /// Count.
    pub count: Count,
    /// Outs.
    pub outs: u8,
    /// Runners.
    pub bases: Bases,
}

/// Source of choices for human-controlled sides.
pub trait DecisionProvider: Send {
    /// Pick the pitch. `None` accepts the catcher's sign.
    fn choose_pitch(&mut self, prompt: &PitchPrompt<'_>) -> Option<Sign>;

    /// Swing or take.
    fn choose_swing(&mut self, prompt: &SwingPrompt) -> SwingChoice;

    /// Call a special action before the pitch.
    fn choose_action(&mut self, _prompt: &ActionPrompt) -> Option<SpecialAction> {
        None
    }
}

/// Provider that replays queued choices, then takes every pitch and
/// accepts every sign.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDecisions {
    /// Swings, consumed in order.
    pub swings: VecDeque<SwingChoice>,
    /// Pitches, consumed in order.
    pub pitches: VecDeque<Sign>,
    /// Actions, consumed in order; `None` entries pass.
    pub actions: VecDeque<Option<SpecialAction>>,
}

impl DecisionProvider for ScriptedDecisions {
    fn choose_pitch(&mut self, _prompt: &PitchPrompt<'_>) -> Option<Sign> {
        self.pitches.pop_front()
    }

    fn choose_swing(&mut self, _prompt: &SwingPrompt) -> SwingChoice {
        self.swings.pop_front().unwrap_or_else(SwingChoice::take)
    }

    fn choose_action(&mut self, _prompt: &ActionPrompt) -> Option<SpecialAction> {
        self.actions.pop_front().flatten()
    }
}

// ============================================================================
// Plate appearance
// ============================================================================

/// What the controller learns about a finished plate appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateAppearanceSummary {
    /// Batter.
    pub batter: PlayerId,
    /// Pitcher.
    pub pitcher: PlayerId,
    /// Terminal result.
    pub result: PlateAppearanceResult,
    /// Pitches thrown.
    pub pitches: u32,
    /// Runs that scored during the plate appearance.
    pub runs: u32,
    /// Special actions requested, in order.
    pub actions: Vec<ActionOutcome<ActionResult>>,
}

/// Participants captured when the batter steps in.
struct Matchup {
    batting: TeamSide,
    fielding: TeamSide,
    batter: PlayerSnapshot,
    pitcher: PlayerSnapshot,
    catcher: PlayerSnapshot,
    repertoire: Vec<PitchGrip>,
    lineup_slot: usize,
    shift: Shift,
    human_batting: bool,
    human_pitching: bool,
    clutch: bool,
    leverage: f64,
}

impl Matchup {
    fn capture(state: &MatchState) -> Result<Self> {
        let batting = state.half().batting();
        let fielding = batting.opponent();
        let offense = state.team(batting);
        let defense = state.team(fielding);

        let batter_id = offense.current_batter();
        let batter = offense
            .player(batter_id)
            .cloned()
            .ok_or(SimError::UnknownPlayer(batter_id))?;
        let pitcher = defense
            .player(defense.pitcher())
            .cloned()
            .ok_or(SimError::UnknownPlayer(defense.pitcher()))?;
        let catcher = defense
            .catcher()
            .cloned()
            .ok_or_else(|| SimError::InvalidRoster {
                team: defense.roster().name.clone(),
                reason: "no catcher and an empty lineup".into(),
            })?;

        let repertoire = if pitcher.pitching.arsenal.is_empty() {
            warn!(pitcher = pitcher.id, "Pitcher has no arsenal; using the default repertoire");
            PitchGrip::default_repertoire()
        } else {
            pitcher.pitching.arsenal.clone()
        };

        let ctx = SituationContext::capture(state);
        let human_pitching = defense.roster().controller == Controller::Human;
        let shift = match defense.roster().shift {
            Shift::None if !human_pitching => {
                choose_shift(&batter, &ctx, state.bases().is_occupied(Base::Third))
            }
            fixed => fixed,
        };

        Ok(Self {
            batting,
            fielding,
            lineup_slot: offense.lineup_index() + 1,
            human_batting: offense.roster().controller == Controller::Human,
            human_pitching,
            shift,
            clutch: ctx.is_clutch(),
            leverage: ctx.leverage(),
            batter,
            pitcher,
            catcher,
            repertoire,
        })
    }
}

/// Per-plate-appearance bookkeeping.
#[derive(Default)]
struct Tally {
    pitches: u32,
    pickoffs: u8,
    bunt_tried: bool,
    runs: u32,
    actions: Vec<ActionOutcome<ActionResult>>,
}

/// What the loop does after the pre-pitch phase.
enum Flow {
    /// Throw the pitch, carrying a called bunt.
    Pitch(Option<BuntKind>),
    /// Start over with a new sign.
    Restart,
    /// The plate appearance is over.
    End(PlateAppearanceResult),
}

/// Ledger confidence as a physics input.
fn composure(value: i32) -> f64 {
    f64::from(value) * 0.25
}

/// Play one plate appearance to its terminal result.
///
/// # Errors
///
/// Returns [`SimError::UnknownPlayer`] if the batter or pitcher on record is
/// not rostered, which roster validation rules out before a match starts.
pub fn run_plate_appearance(
    state: &mut MatchState,
    bus: &mut EventBus,
    decisions: &mut Option<Box<dyn DecisionProvider>>,
) -> Result<PlateAppearanceSummary> {
    let data = Arc::clone(&state.data);
    let tuning = state.config.tuning.clone();
    let m = Matchup::capture(state)?;

    state.begin_plate_appearance();
    state.threats.clear();
    let outs = state.outs();
    state.emit(
        bus,
        MatchEvent::PlateAppearanceStarted {
            batter: m.batter.id,
            pitcher: m.pitcher.id,
            lineup_slot: m.lineup_slot,
            outs,
        },
    );

    let mut tally = Tally::default();
    // A sign stays agreed across pickoff throws until it is delivered.
    let mut agreed: Option<Sign> = None;
    let result = loop {
        let ctx = SituationContext::capture(state);
        prepare_threats(state, &data, &ctx);
        let sign = match agreed {
            Some(sign) => sign,
            None => *agreed.insert(call_pitch(state, bus, decisions, &m, &data, &ctx)),
        };
        let hold = plan_hold(state, &m, &data, &ctx);

        let bunt = match pre_pitch(state, bus, decisions, &m, &data, &hold, &mut tally) {
            Flow::Pitch(bunt) => bunt,
            Flow::Restart => continue,
            Flow::End(result) => break result,
        };

        agreed = None;
        if let Some(result) =
            throw_pitch(state, bus, decisions, &m, &data, &tuning, sign, &hold, bunt, &mut tally)
        {
            break result;
        }
    };

    finish(state, bus, &m, result, &mut tally);
    Ok(PlateAppearanceSummary {
        batter: m.batter.id,
        pitcher: m.pitcher.id,
        result,
        pitches: tally.pitches,
        runs: tally.runs,
        actions: tally.actions,
    })
}

// ----------------------------------------------------------------------------
// Signs and holding runners
// ----------------------------------------------------------------------------

fn call_pitch(
    state: &mut MatchState,
    bus: &mut EventBus,
    decisions: &mut Option<Box<dyn DecisionProvider>>,
    m: &Matchup,
    data: &GameData,
    ctx: &SituationContext,
) -> Sign {
    let count = state.count();
    let inputs = SignInputs {
        catcher: m.catcher.id,
        pitcher: m.pitcher.id,
        batter: BatterRead::of(&m.batter),
        repertoire: &m.repertoire,
        pitches: &data.pitches,
        pitch_count: state.pitch_count(m.pitcher.id),
        stamina: data.traits.effective_stat(&m.pitcher, Stat::Stamina, Some(ctx)),
        balls: count.balls,
        strikes: count.strikes,
    };

    if m.human_pitching {
        if let Some(provider) = decisions.as_deref_mut() {
            let suggestion = state.battery.suggest(&mut state.rng, &inputs, None);
            state.emit(
                bus,
                MatchEvent::SignCalled {
                    pitcher: m.pitcher.id,
                    catcher: m.catcher.id,
                    pitch: suggestion.grip.kind,
                    location: suggestion.location,
                    shakes: 0,
                },
            );
            let prompt = PitchPrompt {
                pitcher: m.pitcher.id,
                batter: m.batter.id,
                count,
                outs: state.outs(),
                bases: *state.bases(),
                suggestion,
                repertoire: &m.repertoire,
            };
            let chosen = provider.choose_pitch(&prompt).unwrap_or(suggestion);
            if chosen.grip.kind != suggestion.grip.kind {
                state.emit(
                    bus,
                    MatchEvent::SignShaken {
                        pitcher: m.pitcher.id,
                        catcher: m.catcher.id,
                        pitch: suggestion.grip.kind,
                        shakes: 1,
                    },
                );
            }
            return chosen;
        }
        debug!(pitcher = m.pitcher.id, "No decision provider attached; AI calls the pitch");
    }

    let shake_cap = state.config.shake_cap;
    let negotiation =
        state
            .battery
            .negotiate(&mut state.rng, &inputs, m.pitcher.pitching.personality, shake_cap);
    for step in &negotiation.steps {
        let event = match *step {
            NegotiationStep::Called { sign, shakes } => MatchEvent::SignCalled {
                pitcher: m.pitcher.id,
                catcher: m.catcher.id,
                pitch: sign.grip.kind,
                location: sign.location,
                shakes,
            },
            NegotiationStep::Shaken { sign, shakes } => MatchEvent::SignShaken {
                pitcher: m.pitcher.id,
                catcher: m.catcher.id,
                pitch: sign.grip.kind,
                shakes,
            },
            NegotiationStep::Forced { sign } => MatchEvent::SignForced {
                pitcher: m.pitcher.id,
                catcher: m.catcher.id,
                pitch: sign.grip.kind,
                location: sign.location,
            },
        };
        state.emit(bus, event);
    }
    negotiation.sign
}

/// Build threat snapshots for every runner aboard. Existing snapshots are kept.
fn prepare_threats(state: &mut MatchState, data: &GameData, ctx: &SituationContext) {
    let runners: Vec<(Base, PlayerSnapshot)> = state
        .bases()
        .occupied()
        .filter_map(|(base, id)| state.player(id).cloned().map(|p| (base, p)))
        .collect();
    let pressure = ctx.leverage();
    for (base, runner) in runners {
        let speed = data.traits.effective_stat(&runner, Stat::Speed, Some(ctx));
        let demon = data.traits.has_flag(&runner, TraitFlag::SpeedDemon);
        state
            .threats
            .prepare(&mut state.rng, &runner, base, speed, demon, pressure);
    }
}

/// Share of the pitcher's stamina already spent, in `[0, 1]`.
fn spent(state: &MatchState, m: &Matchup, data: &GameData, ctx: &SituationContext) -> f64 {
    let stamina = data.traits.effective_stat(&m.pitcher, Stat::Stamina, Some(ctx));
    (state.workload(m.pitcher.id) / (60.0 + stamina)).clamp(0.0, 1.0)
}

/// Slide step when a runner with a big lead can take an open base.
fn plan_hold(state: &MatchState, m: &Matchup, data: &GameData, ctx: &SituationContext) -> SlideStep {
    let control = data.traits.effective_stat(&m.pitcher, Stat::Control, Some(ctx));
    let athleticism = data.traits.effective_stat(&m.pitcher, Stat::Athleticism, Some(ctx));
    let base_delivery = delivery_time(control, athleticism);
    let bases = state.bases();
    let threatened = [Base::First, Base::Second].iter().any(|base| {
        let Some(runner) = bases.get(*base) else {
            return false;
        };
        let open = base.next().is_some_and(|next| !bases.is_occupied(next));
        open && state
            .threats
            .get(runner, *base)
            .is_some_and(|t| t.lead >= 7.5)
    });
    slide_step(base_delivery, threatened, spent(state, m, data, ctx))
}

// ----------------------------------------------------------------------------
// Special actions
// ----------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn pre_pitch(
    state: &mut MatchState,
    bus: &mut EventBus,
    decisions: &mut Option<Box<dyn DecisionProvider>>,
    m: &Matchup,
    data: &GameData,
    hold: &SlideStep,
    tally: &mut Tally,
) -> Flow {
    let defense_call = if m.human_pitching {
        ask(state, decisions, m.fielding, false)
    } else {
        ai_defense_call(state, m, data)
    };
    if let Some(action) = defense_call {
        match attempt(state, bus, m, data, hold, tally, action, false) {
            ActionOutcome::Resolved(ActionResult::Pickoff { outcome, .. }) => {
                return if outcome.picked && state.outs() == 3 {
                    Flow::End(PlateAppearanceResult::RetiredOnBases)
                } else {
                    Flow::Restart
                };
            }
            ActionOutcome::Resolved(_) | ActionOutcome::Skipped(_) | ActionOutcome::NotAttempted => {}
        }
    }

    let offense_call = if m.human_batting {
        ask(state, decisions, m.batting, true)
    } else {
        ai_offense_call(state, m, data, hold, tally)
    };
    let Some(action) = offense_call else {
        return Flow::Pitch(None);
    };
    match attempt(state, bus, m, data, hold, tally, action, true) {
        ActionOutcome::Resolved(ActionResult::Steal { .. }) => {
            if state.outs() == 3 {
                Flow::End(PlateAppearanceResult::RetiredOnBases)
            } else if state.is_walk_off() {
                Flow::End(PlateAppearanceResult::GameDecided)
            } else {
                Flow::Pitch(None)
            }
        }
        ActionOutcome::Resolved(ActionResult::Bunt { kind, .. }) => Flow::Pitch(Some(kind)),
        ActionOutcome::Resolved(ActionResult::Pickoff { .. })
        | ActionOutcome::Skipped(_)
        | ActionOutcome::NotAttempted => Flow::Pitch(None),
    }
}

fn ask(
    state: &MatchState,
    decisions: &mut Option<Box<dyn DecisionProvider>>,
    side: TeamSide,
    batting: bool,
) -> Option<SpecialAction> {
    let provider = decisions.as_deref_mut()?;
    provider.choose_action(&ActionPrompt {
        side,
        batting,
        count: state.count(),
        outs: state.outs(),
        bases: *state.bases(),
    })
}

fn ai_defense_call(state: &mut MatchState, m: &Matchup, data: &GameData) -> Option<SpecialAction> {
    let pickoff = data.traits.effective_stat(&m.pitcher, Stat::Pickoff, None);
    for base in [Base::First, Base::Second] {
        let Some(runner) = state.bases().get(base) else {
            continue;
        };
        let Some(threat) = state.threats.get(runner, base).copied() else {
            continue;
        };
        if ai_wants_pickoff(&mut state.rng, &threat, pickoff) {
            return Some(SpecialAction::Pickoff(base));
        }
    }
    None
}

fn ai_offense_call(
    state: &mut MatchState,
    m: &Matchup,
    data: &GameData,
    hold: &SlideStep,
    tally: &Tally,
) -> Option<SpecialAction> {
    let ctx = SituationContext::capture(state);
    let bases = *state.bases();
    let power = data.traits.effective_stat(&m.batter, Stat::Power, Some(&ctx));
    let contact = data.traits.effective_stat(&m.batter, Stat::Contact, Some(&ctx));

    if !tally.bunt_tried && ctx.strikes < 2 && ctx.outs < 2 {
        let squeeze = bases.is_occupied(Base::Third) && ctx.is_clutch() && contact >= power;
        if squeeze && state.rng.chance(0.3) {
            return Some(SpecialAction::Bunt(BuntKind::Squeeze));
        }
        let sacrifice = ctx.outs == 0
            && !bases.is_occupied(Base::Third)
            && !bases.is_empty()
            && ctx.late
            && ctx.close
            && power < 45.0;
        if sacrifice && state.rng.chance(0.35) {
            return Some(SpecialAction::Bunt(BuntKind::Sacrifice));
        }
    }

    let pop = pop_time(Some(&m.catcher));
    for base in [Base::Second, Base::First] {
        let Some(runner) = bases.get(base) else {
            continue;
        };
        if base.next().is_some_and(|next| bases.is_occupied(next)) {
            continue;
        }
        let Some(threat) = state.threats.get(runner, base).copied() else {
            continue;
        };
        if ai_wants_steal(&mut state.rng, &threat, hold.delivery_time, pop, ctx.outs) {
            return Some(SpecialAction::Steal(base));
        }
    }
    None
}

#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
fn attempt(
    state: &mut MatchState,
    bus: &mut EventBus,
    m: &Matchup,
    data: &GameData,
    hold: &SlideStep,
    tally: &mut Tally,
    action: SpecialAction,
    batting: bool,
) -> ActionOutcome<ActionResult> {
    let side_ok = match action {
        SpecialAction::Steal(_) | SpecialAction::Bunt(_) => batting,
        SpecialAction::Pickoff(_) => !batting,
    };
    let checked = if side_ok {
        check_action(action, state.bases(), tally.pickoffs, tally.bunt_tried)
    } else {
        Err(SkipReason::WrongSide)
    };
    if let Err(reason) = checked {
        debug!(?action, ?reason, "Special action skipped");
        tally.actions.push(ActionOutcome::Skipped(reason));
        return ActionOutcome::Skipped(reason);
    }

    let outcome = match action {
        SpecialAction::Pickoff(base) => {
            let Some(runner) = state.bases().get(base) else {
                return ActionOutcome::Skipped(SkipReason::NoRunner(base));
            };
            tally.pickoffs += 1;
            let pickoff = data.traits.effective_stat(&m.pitcher, Stat::Pickoff, None);
            let Some(threat) = state.threats.get_mut(runner, base) else {
                return ActionOutcome::Skipped(SkipReason::NoRunner(base));
            };
            let outcome = resolve_pickoff(&mut state.rng, threat, pickoff);
            state.add_workload(m.pitcher.id, outcome.stamina_cost);
            if outcome.picked {
                state.bases_mut().clear(base);
                state.stats_mut(runner).caught_stealing += 1;
                state.record_out();
            }
            state.emit(
                bus,
                MatchEvent::PickoffResolved {
                    pitcher: m.pitcher.id,
                    runner,
                    base,
                    picked: outcome.picked,
                    lead_after: outcome.lead_after,
                },
            );
            ActionResult::Pickoff {
                runner,
                base,
                outcome,
            }
        }
        SpecialAction::Steal(base) => {
            let Some(runner) = state.bases().get(base) else {
                return ActionOutcome::Skipped(SkipReason::NoRunner(base));
            };
            let Some(threat) = state.threats.get(runner, base).copied() else {
                return ActionOutcome::Skipped(SkipReason::NoRunner(base));
            };
            let pop = pop_time(Some(&m.catcher));
            let outcome = resolve_steal(&mut state.rng, &threat, hold.delivery_time, pop);
            state.bases_mut().clear(base);
            let target = base.next();
            if outcome.success {
                state.stats_mut(runner).stolen_bases += 1;
                match target {
                    Some(next) => state.bases_mut().set(next, runner),
                    None => {
                        state.score_run(runner);
                        tally.runs += 1;
                    }
                }
            } else {
                state.stats_mut(runner).caught_stealing += 1;
                state.record_out();
            }
            state.emit(
                bus,
                MatchEvent::StealResolved {
                    runner,
                    target,
                    success: outcome.success,
                    margin: outcome.margin,
                },
            );
            if outcome.success && target.is_none() {
                state.emit(
                    bus,
                    MatchEvent::RunScored {
                        runner,
                        side: m.batting,
                        rbi: None,
                    },
                );
            }
            ActionResult::Steal {
                runner,
                from: base,
                outcome,
            }
        }
        SpecialAction::Bunt(kind) => {
            tally.bunt_tried = true;
            ActionResult::Bunt {
                kind,
                roll: BuntRoll {
                    contact: false,
                    collapse: false,
                    runner_out_at_home: false,
                },
            }
        }
    };
    tally.actions.push(ActionOutcome::Resolved(outcome));
    ActionOutcome::Resolved(outcome)
}

// ----------------------------------------------------------------------------
// The pitch
// ----------------------------------------------------------------------------

#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
fn throw_pitch(
    state: &mut MatchState,
    bus: &mut EventBus,
    decisions: &mut Option<Box<dyn DecisionProvider>>,
    m: &Matchup,
    data: &GameData,
    tuning: &Tuning,
    sign: Sign,
    hold: &SlideStep,
    bunt: Option<BuntKind>,
    tally: &mut Tally,
) -> Option<PlateAppearanceResult> {
    let ctx = SituationContext::capture(state);
    let traits = &data.traits;
    let pitcher = &m.pitcher;
    let count_before = state.count();

    // Delivery.
    let profile = data.pitches.profile(sign.grip.kind);
    let slot = data.pitches.slot(pitcher.pitching.arm_slot);
    let fatigue_mod = traits.roll_modifier(pitcher, RollKind::Fatigue, Some(&ctx));
    let scale = fatigue_scale(pitcher.stat(Stat::Drive), ctx.leverage(), fatigue_mod);
    let stamina = traits.effective_stat(pitcher, Stat::Stamina, Some(&ctx));
    // Weather is already priced into the workload.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let load = state.workload(pitcher.id).round() as u32;
    let fatigue = fatigue_effect(load, stamina, 1.0, scale, tuning);
    let edge = state.psychology.pitcher_edge(pitcher.id);
    let inputs = DeliveryInputs {
        grip: sign.grip,
        profile,
        slot,
        velocity_kmh: traits.effective_stat(pitcher, Stat::Velocity, Some(&ctx)),
        control: traits.effective_stat(pitcher, Stat::Control, Some(&ctx)),
        fatigue,
        confidence: composure(state.confidence.get(pitcher.id)),
        control_bonus: edge.control_bonus,
        movement_bonus: edge.movement_bonus,
        velocity_bonus: edge.velocity_bonus,
        momentum: state.momentum.modifier(m.fielding),
        weather_wild: state.weather.wild_pitch,
        slide_velocity: hold.velocity_penalty,
        slide_control: hold.control_penalty,
    };
    let pitch = deliver(&inputs, sign.location, tuning);
    let pitch_count = state.record_pitch(pitcher.id);
    let cost = stamina_cost(&profile, &slot, &state.weather) + hold.stamina_cost;
    state.add_workload(pitcher.id, cost);
    state.battery.note_thrown(pitcher.id, sign.grip.kind);
    tally.pitches += 1;
    state.emit(
        bus,
        MatchEvent::PitchThrown {
            pitcher: pitcher.id,
            batter: m.batter.id,
            pitch: pitch.kind,
            location: pitch.location,
            velocity_kmh: pitch.velocity_kmh,
            pitch_count,
            slide_step: hold.used,
        },
    );
    check_injury(state, bus, m, data, &ctx, pitch_count);

    // A sacrifice bunter pulls back on a pitch off the plate. A squeeze
    // bunter has to offer at anything.
    let pulled_back = match bunt {
        Some(BuntKind::Sacrifice) if pitch.location == PitchLocation::Chase => {
            debug!(batter = m.batter.id, "Bunter pulls back");
            true
        }
        Some(kind) => return lay_down_bunt(state, bus, m, data, &ctx, kind, tally),
        None => false,
    };

    // Swing decision.
    let batter_edge = state.psychology.batter_edge(m.batter.id);
    let batter = BatterInputs {
        contact: traits.effective_stat(&m.batter, Stat::Contact, Some(&ctx)),
        power: traits.effective_stat(&m.batter, Stat::Power, Some(&ctx)),
        eye: traits.effective_stat(&m.batter, Stat::Eye, Some(&ctx)),
        eye_scalar: batter_edge.eye_scalar,
        contact_scalar: batter_edge.contact_scalar,
        confidence: composure(state.confidence.get(m.batter.id)) + batter_edge.confidence,
        momentum: state.momentum.modifier(m.batting),
    };
    let swing = match decisions.as_deref_mut() {
        _ if pulled_back => SwingChoice::take(),
        Some(provider) if m.human_batting => provider.choose_swing(&SwingPrompt {
            batter: m.batter.id,
            pitcher: pitcher.id,
            count: count_before,
            outs: state.outs(),
            pitch: pitch.kind,
            location: pitch.location,
            velocity_kmh: pitch.velocity_kmh,
        }),
        _ => ai_swing(state, &pitch, &batter, count_before),
    };

    let (resolution, description, quality) = if swing.swing {
        let q = contact_quality(&mut state.rng, &pitch, &batter, swing.approach);
        match classify_contact(q, tuning) {
            SwingOutcome::Miss => {
                state.add_strike();
                (PitchResolution::Strike, PitchDescription::SwingingMiss, None)
            }
            SwingOutcome::Foul => {
                state.add_foul();
                (PitchResolution::Foul, PitchDescription::Foul, None)
            }
            SwingOutcome::InPlay(q) => (PitchResolution::InPlay, PitchDescription::BallInPlay, Some(q)),
        }
    } else if pitch.location == PitchLocation::Chase
        && state.rng.chance(hit_by_pitch_chance(pitch.control))
    {
        (PitchResolution::Ball, PitchDescription::HitByPitch, None)
    } else {
        let call = state.umpire.call(
            &mut state.rng,
            pitch.location,
            &CallContext {
                pitching: m.fielding,
                framing: framing_skill(Some(&m.catcher)),
                balls: count_before.balls,
                strikes: count_before.strikes,
            },
        );
        if call.strike {
            state.add_strike();
            (PitchResolution::Strike, PitchDescription::CalledStrike, None)
        } else {
            state.add_ball();
            (PitchResolution::Ball, PitchDescription::CalledBall, None)
        }
    };

    let count = state.count();
    debug!(
        pitcher = pitcher.id,
        batter = m.batter.id,
        pitch = pitch.kind.name(),
        ?resolution,
        balls = count.balls,
        strikes = count.strikes,
        "Pitch resolved"
    );
    state.emit(
        bus,
        MatchEvent::PitchResolved {
            batter: m.batter.id,
            pitcher: pitcher.id,
            resolution,
            description,
            balls: count.balls,
            strikes: count.strikes,
            contact_quality: quality,
        },
    );
    state.psychology.record_pitch(
        pitcher.id,
        m.batter.id,
        resolution,
        description,
        quality,
        count_before.strikes >= 2,
        ctx.leverage(),
    );
    let memory = match (resolution, quality) {
        (PitchResolution::Strike, _) => SignOutcome::Win,
        (PitchResolution::InPlay, Some(q)) if q >= HARD_CONTACT => SignOutcome::HardContact,
        _ => SignOutcome::Neutral,
    };
    state
        .battery
        .record_outcome(m.catcher.id, m.batter.id, pitch.kind, pitch.location, memory);

    match description {
        PitchDescription::HitByPitch => {
            let forced = state.bases_mut().force_advance(m.batter.id);
            tally.runs += score(state, bus, m, forced.as_slice(), Some(m.batter.id));
            return Some(PlateAppearanceResult::HitByPitch);
        }
        PitchDescription::BallInPlay => {
            let q = quality.unwrap_or(0.0);
            return Some(put_in_play(state, bus, m, data, tuning, &ctx, swing, q, batter.power, tally));
        }
        _ => {}
    }

    if count.balls >= 4 {
        let forced = state.bases_mut().force_advance(m.batter.id);
        tally.runs += score(state, bus, m, forced.as_slice(), Some(m.batter.id));
        return Some(PlateAppearanceResult::Walk);
    }
    if count.strikes >= 3 {
        state.record_out();
        return Some(PlateAppearanceResult::Strikeout);
    }
    if resolution == PitchResolution::Ball && !state.bases().is_empty() {
        let chance = wild_pitch_chance(
            pitch.control,
            pitch_count,
            state.weather.wild_pitch,
            tuning.wild_pitch_cap,
        );
        if state.rng.chance(chance) {
            wild_pitch(state, bus, m, tally);
            if state.is_walk_off() {
                return Some(PlateAppearanceResult::GameDecided);
            }
        }
    }
    None
}

fn ai_swing(
    state: &mut MatchState,
    pitch: &ThrownPitch,
    batter: &BatterInputs,
    count: Count,
) -> SwingChoice {
    if !ai_should_swing(&mut state.rng, pitch, batter, count.strikes) {
        return SwingChoice::take();
    }
    let approach = if count.strikes == 2 {
        SwingApproach::Contact
    } else if count.balls >= 2 && count.balls > count.strikes {
        SwingApproach::Power
    } else {
        SwingApproach::Normal
    };
    let aim = if batter.power >= 65.0 { Aim::Pull } else { Aim::Center };
    SwingChoice::swing(approach, aim)
}

fn check_injury(
    state: &mut MatchState,
    bus: &mut EventBus,
    m: &Matchup,
    data: &GameData,
    ctx: &SituationContext,
    pitch_count: u32,
) {
    if !state.config.injuries_enabled || state.injured_pitcher().is_some() {
        return;
    }
    let modifier = data.traits.roll_modifier(&m.pitcher, RollKind::Injury, Some(ctx));
    if !state.rng.chance(injury_chance(pitch_count, modifier)) {
        return;
    }
    let severity = injury_severity(state.rng.unit());
    warn!(pitcher = m.pitcher.id, ?severity, pitch_count, "Pitcher injured");
    state.flag_injury(m.pitcher.id);
    state.emit(
        bus,
        MatchEvent::PitcherInjured {
            pitcher: m.pitcher.id,
            severity,
            pitch_count,
        },
    );
}

fn wild_pitch(state: &mut MatchState, bus: &mut EventBus, m: &Matchup, tally: &mut Tally) {
    let advanced = u8::try_from(state.bases().count()).unwrap_or(u8::MAX);
    let scored = state.bases_mut().advance_all();
    state.stats_mut(m.pitcher.id).wild_pitches += 1;
    state.emit(
        bus,
        MatchEvent::WildPitch {
            pitcher: m.pitcher.id,
            advanced,
            runs: u8::try_from(scored.len()).unwrap_or(u8::MAX),
        },
    );
    tally.runs += score(state, bus, m, &scored, None);
    let cushion = battery_cushion(state, m);
    adjust_confidence(state, bus, m.pitcher.id, ConfidenceEvent::WildPitch, Some(cushion));
}

#[allow(clippy::too_many_arguments)]
fn lay_down_bunt(
    state: &mut MatchState,
    bus: &mut EventBus,
    m: &Matchup,
    data: &GameData,
    ctx: &SituationContext,
    kind: BuntKind,
    tally: &mut Tally,
) -> Option<PlateAppearanceResult> {
    let inputs = BuntInputs {
        contact: data.traits.effective_stat(&m.batter, Stat::Contact, Some(ctx)),
        speed: data.traits.effective_stat(&m.batter, Stat::Speed, Some(ctx)),
        bunt_master: data.traits.has_flag(&m.batter, TraitFlag::BuntMaster),
        infield_in: m.shift == Shift::InfieldIn,
    };
    let roll = roll_bunt(&mut state.rng, kind, &inputs);
    if let Some(ActionOutcome::Resolved(ActionResult::Bunt { roll: slot, .. })) = tally
        .actions
        .iter_mut()
        .rev()
        .find(|a| matches!(a, ActionOutcome::Resolved(ActionResult::Bunt { .. })))
    {
        *slot = roll;
    }

    if !roll.contact {
        // A bunt fouled off is a strike at any count.
        let strikes = state.add_strike();
        let count = state.count();
        state.emit(
            bus,
            MatchEvent::PitchResolved {
                batter: m.batter.id,
                pitcher: m.pitcher.id,
                resolution: PitchResolution::Strike,
                description: PitchDescription::Foul,
                balls: count.balls,
                strikes: count.strikes,
                contact_quality: None,
            },
        );
        state.emit(
            bus,
            MatchEvent::BuntResolved {
                batter: m.batter.id,
                kind,
                contact: false,
                collapse: false,
                runs: 0,
            },
        );
        if strikes < 3 {
            return None;
        }
        state.record_out();
        return Some(PlateAppearanceResult::Strikeout);
    }

    let count = state.count();
    state.emit(
        bus,
        MatchEvent::PitchResolved {
            batter: m.batter.id,
            pitcher: m.pitcher.id,
            resolution: PitchResolution::InPlay,
            description: PitchDescription::BallInPlay,
            balls: count.balls,
            strikes: count.strikes,
            contact_quality: None,
        },
    );

    let mut bases = *state.bases();
    let advance = advance_on_bunt(&mut bases, m.batter.id, kind, roll);
    let mut half_over = false;
    for _ in 0..advance.outs {
        half_over = state.record_out();
    }
    let mut runs = 0;
    if !half_over {
        *state.bases_mut() = bases;
        let rbi = (!roll.collapse).then_some(m.batter.id);
        runs = score(state, bus, m, &advance.scored, rbi);
        tally.runs += runs;
    }
    state.emit(
        bus,
        MatchEvent::BuntResolved {
            batter: m.batter.id,
            kind,
            contact: true,
            collapse: roll.collapse,
            runs: u8::try_from(runs).unwrap_or(u8::MAX),
        },
    );

    Some(if roll.collapse {
        PlateAppearanceResult::BuntSingle
    } else if roll.runner_out_at_home {
        PlateAppearanceResult::FieldersChoice
    } else {
        PlateAppearanceResult::SacrificeBunt
    })
}

// ----------------------------------------------------------------------------
// Ball in play
// ----------------------------------------------------------------------------

#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
fn put_in_play(
    state: &mut MatchState,
    bus: &mut EventBus,
    m: &Matchup,
    data: &GameData,
    tuning: &Tuning,
    ctx: &SituationContext,
    swing: SwingChoice,
    quality: f64,
    power: f64,
    tally: &mut Tally,
) -> PlateAppearanceResult {
    let contact = launch(&mut state.rng, quality, power, swing, &state.weather);
    let ball = BattedBall::simulate(
        contact.exit_velocity,
        contact.launch_angle,
        contact.spray_angle,
        state.weather.carry,
        tuning,
    );

    let defense = state.team(m.fielding);
    let defenders = build_alignment(defense, m.shift, &data.traits, Some(ctx));
    let profile = defense.roster().defense.clone();
    let batter_speed = data.traits.effective_stat(&m.batter, Stat::Speed, Some(ctx));
    let play_ctx = PlayContext {
        profile: &profile,
        environment: environment_error_scalar(&state.weather),
        momentum: state.momentum.modifier(m.fielding),
        runner_speed: batter_speed,
    };
    let play = resolve_play(&mut state.rng, &ball, &defenders, &play_ctx);

    let speeds: BTreeMap<PlayerId, f64> = state
        .bases()
        .occupied()
        .map(|(_, id)| {
            let speed = state
                .player(id)
                .map_or(50.0, |p| data.traits.effective_stat(p, Stat::Speed, Some(ctx)));
            (id, speed)
        })
        .collect();
    let speed_of = |id: PlayerId| speeds.get(&id).copied().unwrap_or(50.0);

    let outs_before = state.outs();
    let mut bases = *state.bases();
    let mut description = play.description.clone();
    let mut outs_on_play = 0u8;
    let mut scored: Vec<PlayerId> = Vec::new();
    let mut rbi = Some(m.batter.id);

    let result = if let Some(kind) = play.error {
        rbi = None;
        scored = advance_on_error(&mut bases, m.batter.id);
        state.charge_error(play.fielder_id);
        if let Some(fielder) = play.fielder_id {
            let neighbours: Vec<PlayerId> = play
                .fielder
                .map(|pos| {
                    pos.adjacent()
                        .iter()
                        .filter_map(|adj| defense_player(state, m.fielding, *adj))
                        .collect()
                })
                .unwrap_or_default();
            let changes = state
                .confidence
                .fielding_error(fielder, &neighbours, &state.config.tuning);
            publish_confidence(state, bus, changes);
        }
        record_momentum(state, bus, m.fielding, MomentumKey::Error);
        debug!(?kind, fielder = ?play.fielder, "Error on the play");
        PlateAppearanceResult::ReachedOnError
    } else if play.result != PlayResult::Out {
        scored = advance_on_hit(
            &mut state.rng,
            &mut bases,
            play.result,
            m.batter.id,
            outs_before,
            speed_of,
        );
        PlateAppearanceResult::from_hit(play.result)
    } else {
        let lead_runner = bases.get(Base::First);
        let double_play = ball.ball_type == BallType::Ground
            && outs_before < 2
            && lead_runner.is_some_and(|runner| {
                turns_double_play(&play, &defenders, &play_ctx, speed_of(runner))
            });
        if double_play {
            rbi = None;
            let (runs, retired) = advance_on_double_play(&mut bases);
            scored = runs;
            outs_on_play = 2;
            description = "Around the horn for two!".into();
            debug!(retired = ?retired, "Double play");
            PlateAppearanceResult::DoublePlay
        } else {
            outs_on_play = 1;
            let fielder = defenders.iter().find(|f| Some(f.position) == play.fielder);
            let tag_up = play.caught
                && outs_before < 2
                && fielder.is_some_and(|f| f.position.is_outfield())
                && bases.get(Base::Third).is_some_and(|runner| {
                    fielder.is_some_and(|f| {
                        tag_up_scores(&mut state.rng, &ball, f, &profile, speed_of(runner))
                    })
                });
            if tag_up {
                scored.extend(bases.clear(Base::Third));
                description.push_str(" The runner tags and scores.");
                PlateAppearanceResult::SacrificeFly
            } else {
                if !play.caught && outs_before < 2 {
                    scored = advance_on_ground_out(&mut bases);
                }
                PlateAppearanceResult::Out
            }
        }
    };

    let mut half_over = false;
    for _ in 0..outs_on_play {
        half_over = state.record_out();
    }
    let mut runs = 0;
    if !half_over {
        *state.bases_mut() = bases;
        runs = score(state, bus, m, &scored, rbi);
        tally.runs += runs;
    }

    debug!(
        batter = m.batter.id,
        result = result.label(),
        exit_velocity = ball.exit_velocity,
        distance = ball.landing_distance,
        runs,
        "Play resolved"
    );
    state.emit(
        bus,
        MatchEvent::PlayResolved {
            batter: m.batter.id,
            pitcher: m.pitcher.id,
            result: play.result,
            fielder: play.fielder,
            error: play.error,
            outs_on_play,
            runs: u8::try_from(runs).unwrap_or(u8::MAX),
            exit_velocity: ball.exit_velocity,
            distance_ft: ball.landing_distance,
            description,
        },
    );
    if result == PlateAppearanceResult::DoublePlay {
        record_momentum(state, bus, m.fielding, MomentumKey::DoublePlay);
    }
    result
}

fn defense_player(state: &MatchState, side: TeamSide, position: Position) -> Option<PlayerId> {
    state.team(side).fielder_at(position).map(|p| p.id)
}

// ----------------------------------------------------------------------------
// Side effects
// ----------------------------------------------------------------------------

/// Score runners in order. Returns the number of runs.
fn score(
    state: &mut MatchState,
    bus: &mut EventBus,
    m: &Matchup,
    runners: &[PlayerId],
    rbi: Option<PlayerId>,
) -> u32 {
    for runner in runners {
        state.score_run(*runner);
        if let Some(batter) = rbi {
            state.stats_mut(batter).rbi += 1;
        }
        state.emit(
            bus,
            MatchEvent::RunScored {
                runner: *runner,
                side: m.batting,
                rbi,
            },
        );
    }
    u32::try_from(runners.len()).unwrap_or(u32::MAX)
}

fn battery_cushion(state: &MatchState, m: &Matchup) -> BatteryCushion {
    BatteryCushion {
        catcher_loyalty: f64::from(m.catcher.personality.loyalty),
        trust: f64::from(state.battery.trust(m.pitcher.id, m.catcher.id)),
    }
}

fn publish_confidence(state: &mut MatchState, bus: &mut EventBus, changes: Vec<ConfidenceChange>) {
    let threshold = state.config.confidence_materiality;
    for change in changes.into_iter().filter(|c| c.is_material(threshold)) {
        state.emit(
            bus,
            MatchEvent::ConfidenceChanged {
                player: change.player,
                side: change.side,
                reason: change.reason,
                old: change.old,
                new: change.new,
            },
        );
    }
}

fn record_momentum(state: &mut MatchState, bus: &mut EventBus, side: TeamSide, key: MomentumKey) {
    if let Some(change) = state.momentum.record(side, key) {
        state.emit(
            bus,
            MatchEvent::MomentumShift {
                side: change.side,
                key: change.key,
                old: change.old,
                new: change.new,
                in_zone: change.in_zone,
            },
        );
    }
}

fn adjust_confidence(
    state: &mut MatchState,
    bus: &mut EventBus,
    player: PlayerId,
    event: ConfidenceEvent,
    cushion: Option<BatteryCushion>,
) {
    let changes = state
        .confidence
        .adjust(player, event, cushion, &state.config.tuning);
    publish_confidence(state, bus, changes);
}

/// Apply the end-of-plate-appearance bookkeeping and announce the result.
#[allow(clippy::too_many_lines)]
fn finish(
    state: &mut MatchState,
    bus: &mut EventBus,
    m: &Matchup,
    result: PlateAppearanceResult,
    tally: &mut Tally,
) {
    use PlateAppearanceResult as R;
    let (batter, pitcher) = (m.batter.id, m.pitcher.id);

    // Scorebook.
    if result.batter_finished() {
        state.stats_mut(batter).plate_appearances += 1;
        state.stats_mut(pitcher).batters_faced += 1;
    }
    if result.counts_as_at_bat() {
        state.stats_mut(batter).at_bats += 1;
    }
    {
        let stats = state.stats_mut(batter);
        match result {
            R::Strikeout => stats.strikeouts += 1,
            R::Walk => stats.walks += 1,
            R::HitByPitch => stats.hit_by_pitch += 1,
            R::Double => stats.doubles += 1,
            R::Triple => stats.triples += 1,
            R::HomeRun => stats.home_runs += 1,
            R::SacrificeBunt | R::SacrificeFly => stats.sacrifices += 1,
            _ => {}
        }
        if result.is_hit() {
            stats.hits += 1;
        }
    }
    {
        let stats = state.stats_mut(pitcher);
        match result {
            R::Strikeout => stats.strikeouts_pitched += 1,
            R::Walk | R::HitByPitch => stats.walks_allowed += 1,
            _ => {}
        }
        if result.is_hit() {
            stats.hits_allowed += 1;
        }
    }
    if result.is_hit() {
        state.credit_hit();
    }

    // Battery trust.
    match result {
        R::Strikeout => {
            state.battery.adjust_trust(pitcher, m.catcher.id, 1);
        }
        R::Walk | R::HitByPitch => {
            state.battery.adjust_trust(pitcher, m.catcher.id, -1);
        }
        r if r.is_hit() => {
            state.battery.adjust_trust(pitcher, m.catcher.id, -1);
        }
        _ => {}
    }

    // Confidence.
    let cushion = battery_cushion(state, m);
    match result {
        R::Strikeout => {
            adjust_confidence(state, bus, pitcher, ConfidenceEvent::StrikeoutPitched, Some(cushion));
            adjust_confidence(state, bus, batter, ConfidenceEvent::StruckOut, None);
        }
        R::HomeRun => {
            adjust_confidence(state, bus, batter, ConfidenceEvent::HomeRun, None);
            adjust_confidence(state, bus, pitcher, ConfidenceEvent::HomeRunAllowed, Some(cushion));
        }
        R::Walk | R::HitByPitch => {
            adjust_confidence(state, bus, batter, ConfidenceEvent::Walk, None);
            adjust_confidence(state, bus, pitcher, ConfidenceEvent::WalkAllowed, Some(cushion));
        }
        r if r.is_hit() => {
            adjust_confidence(state, bus, batter, ConfidenceEvent::Hit, None);
            adjust_confidence(state, bus, pitcher, ConfidenceEvent::HitAllowed, Some(cushion));
        }
        _ => {}
    }
    if m.clutch && result.is_hit() && tally.runs > 0 {
        adjust_confidence(state, bus, batter, ConfidenceEvent::Clutch, None);
    }

    // Momentum.
    let key = match result {
        R::Strikeout => Some((m.fielding, MomentumKey::Strikeout)),
        R::Single | R::BuntSingle => Some((m.batting, MomentumKey::Single)),
        R::Double => Some((m.batting, MomentumKey::Double)),
        R::Triple => Some((m.batting, MomentumKey::Triple)),
        R::HomeRun => Some((m.batting, MomentumKey::HomeRun)),
        _ => None,
    };
    if let Some((side, key)) = key {
        record_momentum(state, bus, side, key);
    }

    // Psychology.
    let outcome = match result {
        R::Strikeout => PlateOutcome::Strikeout,
        R::DoublePlay => PlateOutcome::DoublePlay,
        R::Walk | R::HitByPitch => PlateOutcome::Walk,
        r if r.is_hit() => PlateOutcome::Hit,
        _ if tally.runs > 0 => PlateOutcome::RunsScored,
        _ => PlateOutcome::Out,
    };
    state
        .psychology
        .record_plate_outcome(pitcher, batter, outcome, m.leverage);
    let pitcher_mood = state.psychology.pitcher_mood(pitcher);
    let batter_mood = state.psychology.batter_mood(batter);
    state.emit(
        bus,
        MatchEvent::PsychologyShift {
            player: pitcher,
            side: m.fielding,
            mood: pitcher_mood,
        },
    );
    state.emit(
        bus,
        MatchEvent::PsychologyShift {
            player: batter,
            side: m.batting,
            mood: batter_mood,
        },
    );

    // Rally.
    if result.batter_finished() {
        let streak = state.note_reach(result.reached_base());
        if streak >= RALLY_STREAK {
            let lineup = state.team(m.batting).order().to_vec();
            let changes = state.confidence.rally(&lineup, &state.config.tuning);
            publish_confidence(state, bus, changes);
        }
    }

    debug!(batter, pitcher, result = result.label(), pitches = tally.pitches, "Plate appearance ended");
    state.emit(
        bus,
        MatchEvent::PlateAppearanceEnded {
            batter,
            pitcher,
            result,
            pitches: tally.pitches,
        },
    );
    state.conclude_plate_appearance(result.batter_finished());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::data::{UmpireProfile, WeatherProfile};
    use crate::events::EventRecorder;
    use crate::fielding::DefenseProfile;
    use crate::player::TeamSnapshot;
    use crate::rng::MatchRng;
    use crate::state::Half;
    use crate::umpire::UmpireState;

    fn roster(id: u32, base: PlayerId, controller: Controller) -> TeamSnapshot {
        let lineup = Position::FIELD
            .iter()
            .enumerate()
            .map(|(i, pos)| {
                PlayerSnapshot::league_average(base + i as PlayerId, format!("T{id}-{i}"), *pos)
            })
            .collect();
        TeamSnapshot {
            id,
            name: format!("Team {id}"),
            lineup,
            bullpen: Vec::new(),
            starting_pitcher: base,
            defense: DefenseProfile::default(),
            shift: Shift::None,
            controller,
        }
    }

    fn state_with(seed: u64, home: Controller, away: Controller) -> MatchState {
        let data = Arc::new(GameData::builtin().unwrap());
        let mut state = MatchState::new(
            roster(1, 100, home),
            roster(2, 200, away),
            MatchConfig::default(),
            data,
            UmpireState::new(UmpireProfile::neutral()),
            WeatherProfile::calm(),
            MatchRng::new(seed),
        );
        state.begin_half(1, Half::Top);
        state
    }

    fn none() -> Option<Box<dyn DecisionProvider>> {
        None
    }

    #[test]
    fn test_check_action_preconditions() {
        let mut bases = Bases::default();
        assert_eq!(
            check_action(SpecialAction::Steal(Base::First), &bases, 0, false),
            Err(SkipReason::NoRunner(Base::First))
        );
        assert_eq!(
            check_action(SpecialAction::Bunt(BuntKind::Sacrifice), &bases, 0, false),
            Err(SkipReason::NothingToAdvance)
        );
        assert_eq!(
            check_action(SpecialAction::Bunt(BuntKind::Squeeze), &bases, 0, false),
            Err(SkipReason::NoRunner(Base::Third))
        );

        bases.set(Base::First, 7);
        bases.set(Base::Second, 8);
        assert_eq!(
            check_action(SpecialAction::Steal(Base::First), &bases, 0, false),
            Err(SkipReason::TargetOccupied)
        );
        assert_eq!(check_action(SpecialAction::Steal(Base::Second), &bases, 0, false), Ok(()));
        assert_eq!(
            check_action(SpecialAction::Pickoff(Base::First), &bases, MAX_PICKOFFS, false),
            Err(SkipReason::PickoffLimit)
        );
        assert_eq!(
            check_action(SpecialAction::Bunt(BuntKind::Sacrifice), &bases, 0, true),
            Err(SkipReason::BuntAlreadyTried)
        );
    }

    #[test]
    fn test_result_classification() {
        use PlateAppearanceResult as R;
        assert!(R::BuntSingle.is_hit());
        assert!(!R::ReachedOnError.is_hit());
        assert!(R::ReachedOnError.reached_base());
        assert!(!R::SacrificeFly.counts_as_at_bat());
        assert!(R::ReachedOnError.counts_as_at_bat());
        assert!(!R::RetiredOnBases.batter_finished());
        assert!(!R::RetiredOnBases.counts_as_at_bat());
    }

    #[test]
    fn test_action_outcome_accessors() {
        let skipped: ActionOutcome<u8> = ActionOutcome::Skipped(SkipReason::TargetOccupied);
        assert!(!skipped.is_resolved());
        assert_eq!(skipped.resolved(), None);
        assert_eq!(ActionOutcome::Resolved(3u8).resolved(), Some(3));
        assert_eq!(ActionOutcome::<u8>::NotAttempted.resolved(), None);
    }

    #[test]
    fn test_plate_appearance_reaches_terminal_state() {
        for seed in 0..40 {
            let mut state = state_with(seed, Controller::Ai, Controller::Ai);
            let mut bus = EventBus::new();
            let summary = run_plate_appearance(&mut state, &mut bus, &mut none()).unwrap();
            let count = state.count();
            assert!(count.balls <= 4 && count.strikes <= 3, "seed {seed}: {count:?}");
            if summary.result == PlateAppearanceResult::Walk {
                assert_eq!(count.balls, 4);
            }
            if summary.result == PlateAppearanceResult::Strikeout {
                assert_eq!(count.strikes, 3);
            }
            assert!(summary.pitches >= 1);
            assert!(matches!(
                state.log().last(),
                Some(MatchEvent::PlateAppearanceEnded { .. })
            ));
        }
    }

    #[test]
    fn test_events_bracket_the_plate_appearance() {
        let mut state = state_with(11, Controller::Ai, Controller::Ai);
        let mut bus = EventBus::new();
        let recorder = EventRecorder::new();
        bus.subscribe_all(Box::new(recorder.clone()));
        run_plate_appearance(&mut state, &mut bus, &mut none()).unwrap();

        let events = recorder.snapshot();
        assert!(matches!(events.first(), Some(MatchEvent::PlateAppearanceStarted { .. })));
        let thrown = events
            .iter()
            .filter(|e| matches!(e, MatchEvent::PitchThrown { .. }))
            .count();
        let resolved = events
            .iter()
            .filter(|e| matches!(e, MatchEvent::PitchResolved { .. }))
            .count();
        assert_eq!(thrown, resolved);
        assert_eq!(events, state.log());
    }

    /// Play up to `count` plate appearances, rolling into the next half
    /// whenever three outs are made.
    fn play_through(state: &mut MatchState, bus: &mut EventBus, count: usize) {
        let (mut inning, mut half) = (1, Half::Top);
        for _ in 0..count {
            if state.outs() == 3 {
                (inning, half) = match half {
                    Half::Top => (inning, Half::Bottom),
                    Half::Bottom => (inning + 1, Half::Top),
                };
                state.begin_half(inning, half);
            }
            let summary = run_plate_appearance(state, bus, &mut none()).unwrap();
            if summary.result == PlateAppearanceResult::GameDecided {
                break;
            }
        }
    }

    #[test]
    fn test_every_negotiation_respects_shake_cap() {
        for seed in 0..60 {
            let mut state = state_with(seed, Controller::Ai, Controller::Ai);
            let mut bus = EventBus::new();
            play_through(&mut state, &mut bus, 40);

            let cap = usize::from(state.config.shake_cap);
            let (mut shaken, mut forced) = (0usize, 0usize);
            for event in state.log() {
                match event {
                    MatchEvent::SignShaken { .. } => shaken += 1,
                    MatchEvent::SignForced { .. } => forced += 1,
                    MatchEvent::PitchThrown { .. } => {
                        assert!(shaken <= cap, "seed {seed}: {shaken} shakes before one pitch");
                        assert!(forced <= 1, "seed {seed}: {forced} forced calls before one pitch");
                        shaken = 0;
                        forced = 0;
                    }
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn test_sign_survives_pickoff_throws() {
        let mut state = state_with(21, Controller::Human, Controller::Ai);
        state.bases_mut().set(Base::First, 205);
        let mut bus = EventBus::new();
        let mut script = ScriptedDecisions::default();
        script
            .actions
            .extend([Some(SpecialAction::Pickoff(Base::First)), Some(SpecialAction::Pickoff(Base::First))]);
        let mut decisions: Option<Box<dyn DecisionProvider>> = Some(Box::new(script));
        run_plate_appearance(&mut state, &mut bus, &mut decisions).unwrap();

        let log = state.log();
        let first_pitch = log
            .iter()
            .position(|e| matches!(e, MatchEvent::PitchThrown { .. }))
            .unwrap();
        let pickoffs = log[..first_pitch]
            .iter()
            .filter(|e| matches!(e, MatchEvent::PickoffResolved { .. }))
            .count();
        assert!(pickoffs >= 1);
        let calls = log[..first_pitch]
            .iter()
            .filter(|e| matches!(e, MatchEvent::SignCalled { .. }))
            .count();
        assert_eq!(calls, 1);

        let thrown = log.iter().filter(|e| matches!(e, MatchEvent::PitchThrown { .. })).count();
        let called = log.iter().filter(|e| matches!(e, MatchEvent::SignCalled { .. })).count();
        assert_eq!(called, thrown);
    }

    #[test]
    fn test_strikeout_records_an_out() {
        let mut strikeouts = 0;
        for seed in 0..50 {
            let mut state = state_with(seed, Controller::Ai, Controller::Ai);
            let mut bus = EventBus::new();
            let summary = run_plate_appearance(&mut state, &mut bus, &mut none()).unwrap();
            if summary.result == PlateAppearanceResult::Strikeout {
                strikeouts += 1;
                assert_eq!(state.outs(), 1, "seed {seed}");
            }
        }
        assert!(strikeouts > 0);
    }

    #[test]
    fn test_sacrifice_bunter_pulls_back_off_the_plate() {
        let mut state = state_with(6, Controller::Human, Controller::Human);
        state.bases_mut().set(Base::First, 205);
        let mut bus = EventBus::new();
        let mut script = ScriptedDecisions::default();
        script.pitches.push_back(Sign {
            grip: PitchGrip::new(PitchKind::FourSeam, 50, 10),
            location: PitchLocation::Chase,
        });
        script
            .actions
            .extend([None, Some(SpecialAction::Bunt(BuntKind::Sacrifice))]);
        let mut decisions: Option<Box<dyn DecisionProvider>> = Some(Box::new(script));
        run_plate_appearance(&mut state, &mut bus, &mut decisions).unwrap();

        let log = state.log();
        let first_pitch = log
            .iter()
            .position(|e| matches!(e, MatchEvent::PitchResolved { .. }))
            .unwrap();
        assert!(matches!(
            log[first_pitch],
            MatchEvent::PitchResolved {
                description: PitchDescription::CalledBall
                    | PitchDescription::CalledStrike
                    | PitchDescription::HitByPitch,
                ..
            }
        ));
        assert!(!log[..first_pitch]
            .iter()
            .any(|e| matches!(e, MatchEvent::BuntResolved { .. })));
    }

    #[test]
    fn test_human_batter_taking_every_pitch_walks_or_strikes_out() {
        let mut state = state_with(5, Controller::Ai, Controller::Human);
        let mut bus = EventBus::new();
        let mut decisions: Option<Box<dyn DecisionProvider>> =
            Some(Box::new(ScriptedDecisions::default()));
        let summary = run_plate_appearance(&mut state, &mut bus, &mut decisions).unwrap();
        assert!(matches!(
            summary.result,
            PlateAppearanceResult::Walk
                | PlateAppearanceResult::Strikeout
                | PlateAppearanceResult::HitByPitch
        ));
        let swings = state.log().iter().any(|e| {
            matches!(
                e,
                MatchEvent::PitchResolved {
                    description: PitchDescription::SwingingMiss
                        | PitchDescription::Foul
                        | PitchDescription::BallInPlay,
                    ..
                }
            )
        });
        assert!(!swings);
    }

    #[test]
    fn test_skipped_action_falls_through_to_pitch() {
        let mut state = state_with(9, Controller::Ai, Controller::Human);
        let mut bus = EventBus::new();
        let mut script = ScriptedDecisions::default();
        script.actions.push_back(Some(SpecialAction::Steal(Base::First)));
        let mut decisions: Option<Box<dyn DecisionProvider>> = Some(Box::new(script));
        let summary = run_plate_appearance(&mut state, &mut bus, &mut decisions).unwrap();
        assert_eq!(
            summary.actions.first(),
            Some(&ActionOutcome::Skipped(SkipReason::NoRunner(Base::First)))
        );
        assert!(summary.pitches >= 1);
    }

    #[test]
    fn test_human_steal_moves_or_retires_runner() {
        // Both benches human so the defense never throws over first.
        let mut state = state_with(21, Controller::Human, Controller::Human);
        state.bases_mut().set(Base::First, 205);
        let mut bus = EventBus::new();
        let mut script = ScriptedDecisions::default();
        script.actions.push_back(None);
        script.actions.push_back(Some(SpecialAction::Steal(Base::First)));
        let mut decisions: Option<Box<dyn DecisionProvider>> = Some(Box::new(script));
        let summary = run_plate_appearance(&mut state, &mut bus, &mut decisions).unwrap();

        let Some(ActionOutcome::Resolved(ActionResult::Steal { outcome, runner, .. })) =
            summary.actions.first().copied()
        else {
            panic!("steal was not attempted: {:?}", summary.actions);
        };
        assert_eq!(runner, 205);
        let stats = state.stats(205).unwrap();
        if outcome.success {
            assert_eq!(stats.stolen_bases, 1);
        } else {
            assert_eq!(stats.caught_stealing, 1);
        }
    }

    #[test]
    fn test_same_seed_same_plate_appearance() {
        let run = |seed| {
            let mut state = state_with(seed, Controller::Ai, Controller::Ai);
            let mut bus = EventBus::new();
            run_plate_appearance(&mut state, &mut bus, &mut none()).unwrap();
            state.log().to_vec()
        };
        assert_eq!(run(77), run(77));
    }
}
