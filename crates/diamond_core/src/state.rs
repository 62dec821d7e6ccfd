//! Canonical mutable record of one game.
//!
//! [`MatchState`] owns everything a match mutates: score, inning, outs,
//! count, runners, cumulative statistics, pitch counts and the emotional
//! subsystems. Structural fields (outs, count, bases, score) are private
//! and only change through mutators that assert the game's invariants.
//! The emotional and environmental subsystems are public fields because
//! they carry their own bounds.
//!
//! # Invariants
//!
//! - `outs` is in `[0, 3]`
//! - while a plate appearance is live, `balls < 4` and `strikes < 3`
//! - a runner slot never holds a player who is out or has scored
//! - pitch counts never decrease
//!
//! Violations are programming errors and trip `debug_assert!`.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::battery::BatteryBook;
use crate::baserunning::ThreatCache;
use crate::config::MatchConfig;
use crate::confidence::ConfidenceLedger;
use crate::data::{GameData, WeatherProfile};
use crate::events::{EventBus, MatchEvent};
use crate::momentum::MomentumMeters;
use crate::player::{PlayerId, PlayerSnapshot, Position, TeamSide, TeamSnapshot};
use crate::psychology::PsychologyEngine;
use crate::rng::MatchRng;
use crate::umpire::UmpireState;

/// Top or bottom of an inning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Half {
    /// Visitors bat.
    Top,
    /// Home team bats.
    Bottom,
}

impl Half {
    /// Side at the plate.
    #[must_use]
    pub const fn batting(self) -> TeamSide {
        match self {
            Half::Top => TeamSide::Away,
            Half::Bottom => TeamSide::Home,
        }
    }

    /// Side in the field.
    #[must_use]
    pub const fn fielding(self) -> TeamSide {
        self.batting().opponent()
    }
}

/// A base a runner can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Base {
    /// First base.
    First,
    /// Second base.
    Second,
    /// Third base.
    Third,
}

impl Base {
    /// All bases, first to third.
    pub const ALL: [Base; 3] = [Base::First, Base::Second, Base::Third];

    const fn index(self) -> usize {
        match self {
            Base::First => 0,
            Base::Second => 1,
            Base::Third => 2,
        }
    }

    /// The next base, or `None` from third (home).
    #[must_use]
    pub const fn next(self) -> Option<Base> {
        match self {
            Base::First => Some(Base::Second),
            Base::Second => Some(Base::Third),
            Base::Third => None,
        }
    }
}

/// The three runner slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bases {
    slots: [Option<PlayerId>; 3],
}

impl Bases {
    /// Runner on a base.
    #[must_use]
    pub const fn get(&self, base: Base) -> Option<PlayerId> {
        self.slots[base.index()]
    }

    /// Whether a base is occupied.
    #[must_use]
    pub const fn is_occupied(&self, base: Base) -> bool {
        self.slots[base.index()].is_some()
    }

    /// Place a runner. The base must be empty and the runner not already aboard.
    pub fn set(&mut self, base: Base, runner: PlayerId) {
        debug_assert!(
            !self.slots.contains(&Some(runner)),
            "runner {runner} already on base"
        );
        debug_assert!(self.get(base).is_none(), "{base:?} already occupied");
        self.slots[base.index()] = Some(runner);
    }

    /// Remove and return the runner on a base.
    pub fn clear(&mut self, base: Base) -> Option<PlayerId> {
        self.slots[base.index()].take()
    }

    /// Remove every runner.
    pub fn clear_all(&mut self) {
        self.slots = [None; 3];
    }

    /// Number of runners aboard.
    #[must_use]
    pub fn count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Whether the bases are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// All three bases occupied.
    #[must_use]
    pub fn loaded(&self) -> bool {
        self.count() == 3
    }

    /// Runner on second or third.
    #[must_use]
    pub const fn runners_in_scoring_position(&self) -> bool {
        self.is_occupied(Base::Second) || self.is_occupied(Base::Third)
    }

    /// Occupied bases with their runners, lead runner last.
    pub fn occupied(&self) -> impl Iterator<Item = (Base, PlayerId)> + '_ {
        Base::ALL
            .iter()
            .filter_map(|base| self.get(*base).map(|id| (*base, id)))
    }

    /// Base a runner stands on.
    #[must_use]
    pub fn base_of(&self, runner: PlayerId) -> Option<Base> {
        self.occupied().find(|(_, id)| *id == runner).map(|(b, _)| b)
    }

    /// Put the batter on first, pushing forced runners ahead.
    ///
    /// Returns the runner forced home, if any.
    pub fn force_advance(&mut self, batter: PlayerId) -> Option<PlayerId> {
        let mut scored = None;
        if self.is_occupied(Base::First) {
            if self.is_occupied(Base::Second) {
                if let Some(third) = self.clear(Base::Third) {
                    scored = Some(third);
                }
                if let Some(second) = self.clear(Base::Second) {
                    self.set(Base::Third, second);
                }
            }
            if let Some(first) = self.clear(Base::First) {
                self.set(Base::Second, first);
            }
        }
        self.set(Base::First, batter);
        scored
    }

    /// Move every runner up one base. Returns runners who scored.
    pub fn advance_all(&mut self) -> Vec<PlayerId> {
        let mut scored = Vec::new();
        if let Some(third) = self.clear(Base::Third) {
            scored.push(third);
        }
        if let Some(second) = self.clear(Base::Second) {
            self.set(Base::Third, second);
        }
        if let Some(first) = self.clear(Base::First) {
            self.set(Base::Second, first);
        }
        scored
    }
}

/// Ball/strike count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Count {
    /// Balls (0-3 while live; 4 resolves a walk).
    pub balls: u8,
    /// Strikes (0-2 while live; 3 resolves a strikeout).
    pub strikes: u8,
}

impl Count {
    /// Whether the count is full (3-2).
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.balls == 3 && self.strikes == 2
    }

    /// Balls minus strikes.
    #[must_use]
    pub const fn leverage(&self) -> i32 {
        self.balls as i32 - self.strikes as i32
    }
}

/// Whether a plate appearance is in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayPhase {
    /// Pitches are being thrown.
    Live,
    /// The plate appearance is over.
    #[default]
    Concluded,
}

/// Cumulative per-player statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Plate appearances.
    pub plate_appearances: u32,
    /// Official at-bats.
    pub at_bats: u32,
    /// Hits.
    pub hits: u32,
    /// Doubles.
    pub doubles: u32,
    /// Triples.
    pub triples: u32,
    /// Home runs.
    pub home_runs: u32,
    /// Runs scored.
    pub runs: u32,
    /// Runs batted in.
    pub rbi: u32,
    /// Walks drawn.
    pub walks: u32,
    /// Times hit by a pitch.
    pub hit_by_pitch: u32,
    /// Strikeouts as a batter.
    pub strikeouts: u32,
    /// Stolen bases.
    pub stolen_bases: u32,
    /// Caught stealing or picked off.
    pub caught_stealing: u32,
    /// Sacrifices (bunts and flies).
    pub sacrifices: u32,
    /// Fielding errors committed.
    pub errors: u32,
    /// Pitches thrown.
    pub pitches_thrown: u32,
    /// Batters faced.
    pub batters_faced: u32,
    /// Outs recorded while pitching.
    pub outs_pitched: u32,
    /// Strikeouts recorded as a pitcher.
    pub strikeouts_pitched: u32,
    /// Walks and hit batters allowed.
    pub walks_allowed: u32,
    /// Hits allowed.
    pub hits_allowed: u32,
    /// Runs allowed.
    pub runs_allowed: u32,
    /// Wild pitches thrown.
    pub wild_pitches: u32,
}

/// One team's in-match state.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamState {
    side: TeamSide,
    roster: TeamSnapshot,
    order: Vec<PlayerId>,
    lineup_index: usize,
    pitcher: PlayerId,
    bullpen: Vec<PlayerId>,
    runs: u32,
    hits: u32,
    errors: u32,
    line_score: Vec<u32>,
}

impl TeamState {
    fn new(side: TeamSide, roster: TeamSnapshot) -> Self {
        let order = roster.lineup.iter().map(|p| p.id).collect();
        let bullpen = roster.bullpen.iter().map(|p| p.id).collect();
        Self {
            side,
            pitcher: roster.starting_pitcher,
            roster,
            order,
            lineup_index: 0,
            bullpen,
            runs: 0,
            hits: 0,
            errors: 0,
            line_score: Vec::new(),
        }
    }

    /// Which side this team occupies.
    #[must_use]
    pub const fn side(&self) -> TeamSide {
        self.side
    }

    /// The frozen roster.
    #[must_use]
    pub const fn roster(&self) -> &TeamSnapshot {
        &self.roster
    }

    /// Current batting order by player id.
    #[must_use]
    pub fn order(&self) -> &[PlayerId] {
        &self.order
    }

    /// Zero-based slot of the batter due up.
    #[must_use]
    pub const fn lineup_index(&self) -> usize {
        self.lineup_index
    }

    /// Batter due up.
    #[must_use]
    pub fn current_batter(&self) -> PlayerId {
        self.order[self.lineup_index % self.order.len()]
    }

    /// Pitcher on the mound.
    #[must_use]
    pub const fn pitcher(&self) -> PlayerId {
        self.pitcher
    }

    /// Relievers not yet used.
    #[must_use]
    pub fn bullpen(&self) -> &[PlayerId] {
        &self.bullpen
    }

    /// Runs scored.
    #[must_use]
    pub const fn runs(&self) -> u32 {
        self.runs
    }

    /// Hits.
    #[must_use]
    pub const fn hits(&self) -> u32 {
        self.hits
    }

    /// Errors committed.
    #[must_use]
    pub const fn errors(&self) -> u32 {
        self.errors
    }

    /// Runs per completed (or in-progress) half-inning at bat.
    #[must_use]
    pub fn line_score(&self) -> &[u32] {
        &self.line_score
    }

    /// Any rostered player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.roster.player(id)
    }

    /// The player currently fielding a position.
    ///
    /// The pitcher slot always resolves to the pitcher on the mound.
    #[must_use]
    pub fn fielder_at(&self, position: Position) -> Option<&PlayerSnapshot> {
        if position == Position::Pitcher {
            return self.player(self.pitcher);
        }
        self.roster.fielder_at(position)
    }

    /// The catcher, falling back to the first lineup slot.
    #[must_use]
    pub fn catcher(&self) -> Option<&PlayerSnapshot> {
        self.roster.catcher()
    }

    fn advance_batter(&mut self) {
        self.lineup_index = (self.lineup_index + 1) % self.order.len();
    }

    /// Swap in the next reliever, who also takes the outgoing pitcher's
    /// batting slot. Returns the reliever, or `None` if the bullpen is empty.
    fn bring_in_reliever(&mut self) -> Option<PlayerId> {
        if self.bullpen.is_empty() {
            return None;
        }
        let incoming = self.bullpen.remove(0);
        let outgoing = self.pitcher;
        if let Some(slot) = self.order.iter_mut().find(|id| **id == outgoing) {
            *slot = incoming;
        }
        self.pitcher = incoming;
        Some(incoming)
    }
}

/// Call tilt counters for one side's pitchers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallTilt {
    /// Borderline calls that went the pitching side's way.
    pub favored: u32,
    /// Borderline calls that went against the pitching side.
    pub squeezed: u32,
}

/// Call tilt for both sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TiltReport {
    /// Visitors' pitchers.
    pub away: CallTilt,
    /// Home pitchers.
    pub home: CallTilt,
}

/// The whole match.
#[derive(Debug)]
pub struct MatchState {
    inning: u32,
    half: Half,
    outs: u8,
    count: Count,
    bases: Bases,
    phase: PlayPhase,
    teams: [TeamState; 2],
    stats: BTreeMap<PlayerId, PlayerStats>,
    pitch_counts: BTreeMap<PlayerId, u32>,
    workload: BTreeMap<PlayerId, f64>,
    half_runs: u32,
    reach_streak: [u32; 2],
    injured_pitcher: Option<PlayerId>,
    log: Vec<MatchEvent>,
    /// Match rules.
    pub config: MatchConfig,
    /// Lookup tables.
    pub data: Arc<GameData>,
    /// Per-player confidence.
    pub confidence: ConfidenceLedger,
    /// Per-team momentum.
    pub momentum: MomentumMeters,
    /// Pitcher and batter mental states.
    pub psychology: PsychologyEngine,
    /// Battery trust, sync and catcher memory.
    pub battery: BatteryBook,
    /// Runner threat snapshots for the current plate appearance.
    pub threats: ThreatCache,
    /// Plate umpire.
    pub umpire: UmpireState,
    /// Weather for the match.
    pub weather: WeatherProfile,
    /// The match's only random source.
    pub rng: MatchRng,
}

impl MatchState {
    /// Build the opening state. Rosters must already be validated.
    #[must_use]
    pub fn new(
        home: TeamSnapshot,
        away: TeamSnapshot,
        config: MatchConfig,
        data: Arc<GameData>,
        umpire: UmpireState,
        weather: WeatherProfile,
        rng: MatchRng,
    ) -> Self {
        let confidence = ConfidenceLedger::new(&home, &away, &data.traits);
        let momentum = MomentumMeters::new(&config.tuning);
        let mut stats = BTreeMap::new();
        for player in home.players().chain(away.players()) {
            stats.insert(player.id, PlayerStats::default());
        }
        Self {
            inning: 1,
            half: Half::Top,
            outs: 0,
            count: Count::default(),
            bases: Bases::default(),
            phase: PlayPhase::Concluded,
            teams: [
                TeamState::new(TeamSide::Away, away),
                TeamState::new(TeamSide::Home, home),
            ],
            stats,
            pitch_counts: BTreeMap::new(),
            workload: BTreeMap::new(),
            half_runs: 0,
            reach_streak: [0; 2],
            injured_pitcher: None,
            log: Vec::new(),
            config,
            data,
            confidence,
            momentum,
            psychology: PsychologyEngine::default(),
            battery: BatteryBook::default(),
            threats: ThreatCache::default(),
            umpire,
            weather,
            rng,
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Current inning (1-based).
    #[must_use]
    pub const fn inning(&self) -> u32 {
        self.inning
    }

    /// Current half.
    #[must_use]
    pub const fn half(&self) -> Half {
        self.half
    }

    /// Outs in the half-inning.
    #[must_use]
    pub const fn outs(&self) -> u8 {
        self.outs
    }

    /// Ball/strike count.
    #[must_use]
    pub const fn count(&self) -> Count {
        self.count
    }

    /// Runners.
    #[must_use]
    pub const fn bases(&self) -> &Bases {
        &self.bases
    }

    /// Live or concluded.
    #[must_use]
    pub const fn phase(&self) -> PlayPhase {
        self.phase
    }

    /// One team's state.
    #[must_use]
    pub const fn team(&self, side: TeamSide) -> &TeamState {
        &self.teams[side.index()]
    }

    /// Runs for a side.
    #[must_use]
    pub const fn score(&self, side: TeamSide) -> u32 {
        self.teams[side.index()].runs
    }

    /// Runs scored in the current half-inning.
    #[must_use]
    pub const fn half_runs(&self) -> u32 {
        self.half_runs
    }

    /// Any rostered player on either side.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.teams.iter().find_map(|t| t.player(id))
    }

    /// Side a player belongs to.
    #[must_use]
    pub fn side_of(&self, id: PlayerId) -> Option<TeamSide> {
        self.teams
            .iter()
            .find(|t| t.roster.contains(id))
            .map(|t| t.side)
    }

    /// Cumulative statistics.
    #[must_use]
    pub fn stats(&self, id: PlayerId) -> Option<&PlayerStats> {
        self.stats.get(&id)
    }

    /// Every player's statistics.
    #[must_use]
    pub const fn all_stats(&self) -> &BTreeMap<PlayerId, PlayerStats> {
        &self.stats
    }

    /// Pitches thrown by a pitcher.
    #[must_use]
    pub fn pitch_count(&self, pitcher: PlayerId) -> u32 {
        self.pitch_counts.get(&pitcher).copied().unwrap_or(0)
    }

    /// Accumulated arm workload: pitches weighted by stamina cost, plus
    /// slide steps and pickoff throws.
    #[must_use]
    pub fn workload(&self, pitcher: PlayerId) -> f64 {
        self.workload.get(&pitcher).copied().unwrap_or(0.0)
    }

    /// Pitcher flagged as injured and awaiting replacement.
    #[must_use]
    pub const fn injured_pitcher(&self) -> Option<PlayerId> {
        self.injured_pitcher
    }

    /// Consecutive batters who reached base for a side.
    #[must_use]
    pub const fn reach_streak(&self, side: TeamSide) -> u32 {
        self.reach_streak[side.index()]
    }

    /// Every event published so far, in order.
    #[must_use]
    pub fn log(&self) -> &[MatchEvent] {
        &self.log
    }

    /// Home team batting in the last half of a decided game.
    #[must_use]
    pub fn is_walk_off(&self) -> bool {
        self.half == Half::Bottom
            && self.inning >= self.config.regulation_innings
            && self.score(TeamSide::Home) > self.score(TeamSide::Away)
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    /// Publish through the bus and append the event and its follow-ups.
    pub fn emit(&mut self, bus: &mut EventBus, event: MatchEvent) {
        let delivered = bus.publish(event);
        self.log.extend(delivered);
    }

    /// Mutable statistics for a rostered player.
    pub fn stats_mut(&mut self, id: PlayerId) -> &mut PlayerStats {
        self.stats.entry(id).or_default()
    }

    /// Start a half-inning: clear outs, count, bases and the half's runs.
    pub fn begin_half(&mut self, inning: u32, half: Half) {
        debug_assert!(
            inning > self.inning || (inning == self.inning && half >= self.half),
            "half-innings must move forward"
        );
        self.inning = inning;
        self.half = half;
        self.outs = 0;
        self.count = Count::default();
        self.bases.clear_all();
        self.phase = PlayPhase::Concluded;
        self.half_runs = 0;
        self.teams[half.batting().index()].line_score.push(0);
    }

    /// Open a plate appearance with a fresh count.
    pub fn begin_plate_appearance(&mut self) {
        debug_assert!(self.outs < 3, "plate appearance with three outs");
        self.count = Count::default();
        self.phase = PlayPhase::Live;
    }

    /// Close the plate appearance and, if the batter finished it, rotate
    /// the lineup.
    pub fn conclude_plate_appearance(&mut self, batter_finished: bool) {
        self.phase = PlayPhase::Concluded;
        if batter_finished {
            self.teams[self.half.batting().index()].advance_batter();
        }
    }

    /// Add a ball. Returns the new ball total (4 means a walk).
    pub fn add_ball(&mut self) -> u8 {
        debug_assert!(self.phase == PlayPhase::Live);
        debug_assert!(self.count.balls < 4, "ball added after ball four");
        self.count.balls += 1;
        self.count.balls
    }

    /// Add a strike. Returns the new strike total (3 means a strikeout).
    pub fn add_strike(&mut self) -> u8 {
        debug_assert!(self.phase == PlayPhase::Live);
        debug_assert!(self.count.strikes < 3, "strike added after strike three");
        self.count.strikes += 1;
        self.count.strikes
    }

    /// A foul: a strike unless there are already two.
    pub fn add_foul(&mut self) {
        if self.count.strikes < 2 {
            self.add_strike();
        }
    }

    /// Record an out. Returns `true` when the half-inning is over.
    pub fn record_out(&mut self) -> bool {
        debug_assert!(self.outs < 3, "out recorded after the third out");
        self.outs = (self.outs + 1).min(3);
        let pitcher = self.team(self.half.fielding()).pitcher;
        self.stats_mut(pitcher).outs_pitched += 1;
        self.outs == 3
    }

    /// Mutable runners.
    pub fn bases_mut(&mut self) -> &mut Bases {
        &mut self.bases
    }

    /// Credit a run to the batting side and charge the pitcher.
    pub fn score_run(&mut self, runner: PlayerId) {
        let batting = self.half.batting();
        let team = &mut self.teams[batting.index()];
        team.runs += 1;
        if let Some(last) = team.line_score.last_mut() {
            *last += 1;
        }
        self.half_runs += 1;
        self.stats_mut(runner).runs += 1;
        let pitcher = self.team(batting.opponent()).pitcher;
        self.stats_mut(pitcher).runs_allowed += 1;
    }

    /// Count a hit for the batting side.
    pub fn credit_hit(&mut self) {
        self.teams[self.half.batting().index()].hits += 1;
    }

    /// Count an error against the fielding side.
    pub fn charge_error(&mut self, fielder: Option<PlayerId>) {
        self.teams[self.half.fielding().index()].errors += 1;
        if let Some(id) = fielder {
            self.stats_mut(id).errors += 1;
        }
    }

    /// Record a pitch thrown. Returns the pitcher's new total.
    pub fn record_pitch(&mut self, pitcher: PlayerId) -> u32 {
        let count = self.pitch_counts.entry(pitcher).or_insert(0);
        let before = *count;
        *count += 1;
        debug_assert!(*count > before, "pitch count went backwards");
        let total = *count;
        self.stats_mut(pitcher).pitches_thrown += 1;
        total
    }

    /// Add arm workload. Negative costs are ignored.
    pub fn add_workload(&mut self, pitcher: PlayerId, cost: f64) {
        *self.workload.entry(pitcher).or_insert(0.0) += cost.max(0.0);
    }

    /// Track consecutive reaching batters. Returns the new streak.
    pub fn note_reach(&mut self, reached: bool) -> u32 {
        let idx = self.half.batting().index();
        if reached {
            self.reach_streak[idx] += 1;
        } else {
            self.reach_streak[idx] = 0;
        }
        self.reach_streak[idx]
    }

    /// Flag the pitcher for replacement after the current plate appearance.
    pub fn flag_injury(&mut self, pitcher: PlayerId) {
        self.injured_pitcher = Some(pitcher);
    }

    /// Swap in a reliever for the fielding side.
    ///
    /// Returns `(outgoing, incoming)`, or `None` when nobody is left.
    pub fn change_pitcher(&mut self, side: TeamSide) -> Option<(PlayerId, PlayerId)> {
        let team = &mut self.teams[side.index()];
        let outgoing = team.pitcher;
        let incoming = team.bring_in_reliever()?;
        if self.injured_pitcher == Some(outgoing) {
            self.injured_pitcher = None;
        }
        Some((outgoing, incoming))
    }

    /// Hash of the structural state, for divergence hunting.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.inning.hash(&mut hasher);
        self.half.hash(&mut hasher);
        self.outs.hash(&mut hasher);
        self.count.hash(&mut hasher);
        self.bases.hash(&mut hasher);
        for team in &self.teams {
            team.runs.hash(&mut hasher);
            team.hits.hash(&mut hasher);
            team.errors.hash(&mut hasher);
            team.lineup_index.hash(&mut hasher);
            team.pitcher.hash(&mut hasher);
        }
        for (id, stats) in &self.stats {
            id.hash(&mut hasher);
            stats.hash(&mut hasher);
        }
        for (id, value) in self.confidence.values() {
            id.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        self.rng.draws().hash(&mut hasher);
        self.log.len().hash(&mut hasher);
        hasher.finish()
    }
}
