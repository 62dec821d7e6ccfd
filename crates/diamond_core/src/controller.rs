//! Inning and match controller.
//!
//! [`Match`] owns one [`MatchState`] and one [`EventBus`] and plays
//! half-innings until the game is decided. Between plate appearances it
//! swaps tired or injured pitchers for relievers. At the end it packages a
//! [`MatchResult`]: final score, per-player statistics, the ordered event
//! log, and the confidence and trust carryover that outlives the match.
//!
//! # Determinism
//!
//! The umpire and weather are drawn from the match generator before the
//! first pitch when the setup does not name them. After that every roll
//! happens in a fixed order, so the same [`MatchSetup`] always produces
//! the same log.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::at_bat::{run_plate_appearance, DecisionProvider};
use crate::battery::TrustDelta;
use crate::config::MatchConfig;
use crate::data::GameData;
use crate::error::{Result, SimError, SinkError};
use crate::events::{
    log_hash, ChangeReason, EventBus, EventKind, EventListener, MatchEvent, SubscriptionId,
};
use crate::player::{PlayerId, TeamSide, TeamSnapshot};
use crate::rng::MatchRng;
use crate::state::{Half, MatchState, PlayerStats, TiltReport};
use crate::umpire::UmpireState;

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Termination {
    /// Decided after a full final inning (or a skipped bottom half).
    Regulation,
    /// Home side took the lead in its last at-bat.
    WalkOff,
    /// Mercy rule margin reached.
    Mercy,
    /// Still tied after the last allowed inning.
    Draw,
}

/// Everything needed to start (or re-run) a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSetup {
    /// Home roster.
    pub home: TeamSnapshot,
    /// Visiting roster.
    pub away: TeamSnapshot,
    /// Rules.
    pub config: MatchConfig,
    /// Generator seed.
    pub seed: u64,
    /// Plate umpire key; drawn from the generator when absent.
    pub umpire: Option<String>,
    /// Weather key; drawn from the generator when absent.
    pub weather: Option<String>,
}

impl MatchSetup {
    /// Setup with default rules and drawn umpire and weather.
    #[must_use]
    pub fn new(home: TeamSnapshot, away: TeamSnapshot, seed: u64) -> Self {
        Self {
            home,
            away,
            config: MatchConfig::default(),
            seed,
            umpire: None,
            weather: None,
        }
    }

    /// Same setup under another seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check both rosters and the rules before anything is drawn.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidRoster`] for a malformed roster or player ids
    /// shared between the teams, [`SimError::InvalidConfig`] for bad rules.
    pub fn validate(&self) -> Result<()> {
        self.home.validate()?;
        self.away.validate()?;
        let home_ids: HashSet<PlayerId> = self.home.players().map(|p| p.id).collect();
        if let Some(shared) = self.away.players().find(|p| home_ids.contains(&p.id)) {
            return Err(SimError::InvalidRoster {
                team: self.away.name.clone(),
                reason: format!("player id {} is also on {}", shared.id, self.home.name),
            });
        }
        self.config.validate()
    }

    /// Encode for replays.
    ///
    /// # Errors
    ///
    /// [`SimError::Serialization`] if bincode fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| SimError::Serialization(e.to_string()))
    }

    /// Decode a replay payload.
    ///
    /// # Errors
    ///
    /// [`SimError::Serialization`] if the bytes are not a setup.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| SimError::Serialization(e.to_string()))
    }
}

/// Runs recorded in one half-inning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfInningSummary {
    /// Inning.
    pub inning: u32,
    /// Top or bottom.
    pub half: Half,
    /// Runs scored.
    pub runs: u32,
    /// Set when the game ended with this half.
    pub ended: Option<Termination>,
}

/// What survives a match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carryover {
    /// Final minus initial confidence, for players whose value moved.
    pub confidence: BTreeMap<PlayerId, i32>,
    /// Battery trust movement.
    pub trust: Vec<TrustDelta>,
}

/// Everything handed back for a finished match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Seed played.
    pub seed: u64,
    /// Home team name.
    pub home: String,
    /// Visiting team name.
    pub away: String,
    /// Home runs.
    pub home_score: u32,
    /// Visitor runs.
    pub away_score: u32,
    /// Winner, `None` for a draw.
    pub winner: Option<TeamSide>,
    /// Innings begun.
    pub innings: u32,
    /// How it ended.
    pub termination: Termination,
    /// Umpire key.
    pub umpire: String,
    /// Weather key.
    pub weather: String,
    /// Every half-inning played.
    pub halves: Vec<HalfInningSummary>,
    /// Per-player statistics.
    pub stats: BTreeMap<PlayerId, PlayerStats>,
    /// Call tilt counters.
    pub tilt: TiltReport,
    /// Confidence at match start.
    pub confidence_initial: BTreeMap<PlayerId, i32>,
    /// Confidence at the final out.
    pub confidence_final: BTreeMap<PlayerId, i32>,
    /// Battery trust movement.
    pub trust_deltas: Vec<TrustDelta>,
    /// Every event in publish order.
    pub log: Vec<MatchEvent>,
    /// Hash of `log`.
    pub log_hash: u64,
    /// Structural hash of the final state.
    pub state_hash: u64,
}

impl MatchResult {
    /// Confidence deltas and trust deltas to apply to persistent records.
    #[must_use]
    pub fn carryover(&self) -> Carryover {
        let confidence = self
            .confidence_final
            .iter()
            .filter_map(|(id, end)| {
                let start = self.confidence_initial.get(id).copied().unwrap_or(*end);
                (end != &start).then_some((*id, end - start))
            })
            .collect();
        Carryover {
            confidence,
            trust: self.trust_deltas.clone(),
        }
    }

    /// Runs for one side.
    #[must_use]
    pub const fn score(&self, side: TeamSide) -> u32 {
        match side {
            TeamSide::Home => self.home_score,
            TeamSide::Away => self.away_score,
        }
    }

    /// Runs per inning for one side, in order.
    #[must_use]
    pub fn line_score(&self, side: TeamSide) -> Vec<u32> {
        let half = match side {
            TeamSide::Away => Half::Top,
            TeamSide::Home => Half::Bottom,
        };
        self.halves
            .iter()
            .filter(|h| h.half == half)
            .map(|h| h.runs)
            .collect()
    }
}

/// Receiver of finished results (a save file, a league database).
pub trait ResultSink: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Store one result.
    fn store(&mut self, result: &MatchResult) -> std::result::Result<(), SinkError>;
}

/// Hand a result to every sink. Failures are logged and counted, never
/// raised. Returns the number of sinks that failed.
pub fn hand_back(result: &MatchResult, sinks: &mut [Box<dyn ResultSink>]) -> usize {
    let mut failed = 0;
    for sink in sinks.iter_mut() {
        if let Err(err) = sink.store(result) {
            failed += 1;
            warn!(sink = sink.name(), seed = result.seed, %err, "Result sink failed; continuing");
        }
    }
    failed
}

/// One match in progress.
pub struct Match {
    state: MatchState,
    bus: EventBus,
    decisions: Option<Box<dyn DecisionProvider>>,
    halves: Vec<HalfInningSummary>,
    seed: u64,
}

impl std::fmt::Debug for Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Match")
            .field("seed", &self.seed)
            .field("inning", &self.state.inning())
            .field("half", &self.state.half())
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl Match {
    /// Validate the setup and build the opening state.
    ///
    /// # Errors
    ///
    /// Fails when the rosters or rules are invalid, or when a named umpire
    /// or weather key is not in the data tables.
    pub fn new(setup: MatchSetup, data: Arc<GameData>) -> Result<Self> {
        setup.validate()?;
        let mut rng = MatchRng::new(setup.seed);

        let umpire = match &setup.umpire {
            Some(key) => data
                .umpires
                .get(key)
                .cloned()
                .ok_or_else(|| SimError::InvalidConfig(format!("unknown umpire '{key}'")))?,
            None => data.umpires.pick(&mut rng),
        };
        let weather = match &setup.weather {
            Some(key) => data
                .weather
                .get(key)
                .cloned()
                .ok_or_else(|| SimError::InvalidConfig(format!("unknown weather '{key}'")))?,
            None => data.weather.pick(&mut rng),
        };

        let state = MatchState::new(
            setup.home,
            setup.away,
            setup.config,
            data,
            UmpireState::new(umpire),
            weather,
            rng,
        );
        Ok(Self {
            state,
            bus: EventBus::new(),
            decisions: None,
            halves: Vec::new(),
            seed: setup.seed,
        })
    }

    /// Route human choices through a provider.
    #[must_use]
    pub fn with_decisions(mut self, provider: Box<dyn DecisionProvider>) -> Self {
        self.decisions = Some(provider);
        self
    }

    /// Attach a listener for the given kinds (all kinds when empty).
    pub fn subscribe(&mut self, listener: Box<dyn EventListener>, kinds: &[EventKind]) -> SubscriptionId {
        self.bus.subscribe(listener, kinds)
    }

    /// The live state.
    #[must_use]
    pub const fn state(&self) -> &MatchState {
        &self.state
    }

    /// Listener failures swallowed so far.
    #[must_use]
    pub const fn listener_failures(&self) -> u64 {
        self.bus.failures()
    }

    /// Play to the end.
    ///
    /// # Errors
    ///
    /// Only if the state references a player that is not rostered, which
    /// setup validation rules out.
    pub fn play(mut self) -> Result<MatchResult> {
        let home = self.state.team(TeamSide::Home).roster().name.clone();
        let away = self.state.team(TeamSide::Away).roster().name.clone();
        let umpire = self.state.umpire.profile().key.clone();
        let weather = self.state.weather.key.clone();
        info!(seed = self.seed, %home, %away, %umpire, %weather, "Match started");
        self.state.emit(
            &mut self.bus,
            MatchEvent::MatchStarted {
                home: home.clone(),
                away: away.clone(),
                seed: self.seed,
                umpire: umpire.clone(),
                weather: weather.clone(),
            },
        );

        let mut inning = 1;
        let termination = loop {
            self.play_half(inning, Half::Top)?;
            if let Some(end) = self.after_top(inning) {
                break end;
            }
            if self.play_half(inning, Half::Bottom)? {
                break Termination::WalkOff;
            }
            if let Some(end) = self.after_bottom(inning) {
                break end;
            }
            inning += 1;
        };
        if let Some(last) = self.halves.last_mut() {
            last.ended = Some(termination);
        }

        let home_score = self.state.score(TeamSide::Home);
        let away_score = self.state.score(TeamSide::Away);
        let tilt = self.state.umpire.tilt();
        self.state.emit(
            &mut self.bus,
            MatchEvent::MatchEnded {
                home_score,
                away_score,
                innings: inning,
                termination,
                tilt,
            },
        );
        info!(seed = self.seed, home_score, away_score, innings = inning, ?termination, "Match ended");

        let winner = match home_score.cmp(&away_score) {
            std::cmp::Ordering::Greater => Some(TeamSide::Home),
            std::cmp::Ordering::Less => Some(TeamSide::Away),
            std::cmp::Ordering::Equal => None,
        };
        let log = self.state.log().to_vec();
        Ok(MatchResult {
            seed: self.seed,
            home,
            away,
            home_score,
            away_score,
            winner,
            innings: inning,
            termination,
            umpire,
            weather,
            halves: self.halves,
            stats: self.state.all_stats().clone(),
            tilt,
            confidence_initial: self.state.confidence.initial_values().collect(),
            confidence_final: self.state.confidence.values().collect(),
            trust_deltas: self.state.battery.trust_deltas(),
            log_hash: log_hash(&log),
            log,
            state_hash: self.state.state_hash(),
        })
    }

    /// Play one half-inning. Returns `true` on a walk-off.
    fn play_half(&mut self, inning: u32, half: Half) -> Result<bool> {
        self.state.begin_half(inning, half);
        self.state
            .emit(&mut self.bus, MatchEvent::HalfInningStarted { inning, half });

        let mut walk_off = false;
        while self.state.outs() < 3 {
            self.manage_pitcher(half.fielding());
            run_plate_appearance(&mut self.state, &mut self.bus, &mut self.decisions)?;
            #[cfg(feature = "debug-validation")]
            self.check_invariants();
            if self.state.is_walk_off() {
                walk_off = true;
                break;
            }
        }

        let runs = self.state.half_runs();
        debug!(inning, ?half, runs, walk_off, "Half-inning over");
        let event = MatchEvent::HalfInningEnded {
            inning,
            half,
            runs,
            outs: self.state.outs(),
            walk_off,
            tilt: self.state.umpire.tilt(),
        };
        self.state.emit(&mut self.bus, event);
        self.halves.push(HalfInningSummary {
            inning,
            half,
            runs,
            ended: None,
        });
        Ok(walk_off)
    }

    #[cfg(feature = "debug-validation")]
    fn check_invariants(&self) {
        let count = self.state.count();
        assert!(self.state.outs() <= 3, "outs out of range");
        assert!(count.balls <= 4 && count.strikes <= 3, "count out of range: {count:?}");
        for side in [TeamSide::Home, TeamSide::Away] {
            let team = self.state.team(side);
            let line: u32 = team.line_score().iter().sum();
            assert_eq!(line, team.runs(), "{side:?} line score disagrees with runs");
        }
    }

    fn mercy_reached(&self, inning: u32, lead: u32) -> bool {
        self.state
            .config
            .mercy
            .is_some_and(|m| inning >= m.from_inning && lead >= m.run_margin)
    }

    /// Game over without the bottom half?
    fn after_top(&self, inning: u32) -> Option<Termination> {
        let home = self.state.score(TeamSide::Home);
        let away = self.state.score(TeamSide::Away);
        if home <= away {
            return None;
        }
        if inning >= self.state.config.regulation_innings {
            Some(Termination::Regulation)
        } else if self.mercy_reached(inning, home - away) {
            Some(Termination::Mercy)
        } else {
            None
        }
    }

    fn after_bottom(&self, inning: u32) -> Option<Termination> {
        let home = self.state.score(TeamSide::Home);
        let away = self.state.score(TeamSide::Away);
        let config = &self.state.config;
        if inning >= config.regulation_innings && home != away {
            Some(Termination::Regulation)
        } else if self.mercy_reached(inning, home.abs_diff(away)) {
            Some(Termination::Mercy)
        } else if inning >= config.max_innings {
            Some(Termination::Draw)
        } else {
            None
        }
    }

    /// Bring in a reliever for an injured or spent pitcher.
    fn manage_pitcher(&mut self, side: TeamSide) {
        let pitcher = self.state.team(side).pitcher();
        let reason = if self.state.injured_pitcher() == Some(pitcher) {
            ChangeReason::Injury
        } else if self
            .state
            .config
            .pitcher_pull_count
            .is_some_and(|limit| self.state.pitch_count(pitcher) >= limit)
        {
            ChangeReason::PitchCount
        } else {
            return;
        };

        match self.state.change_pitcher(side) {
            Some((outgoing, incoming)) => {
                info!(?side, outgoing, incoming, ?reason, "Pitching change");
                self.state.emit(
                    &mut self.bus,
                    MatchEvent::PitchingChange {
                        side,
                        outgoing,
                        incoming,
                        reason,
                    },
                );
            }
            None => debug!(?side, pitcher, ?reason, "Bullpen empty; pitcher stays in"),
        }
    }
}

/// Play a match with no listeners attached.
///
/// # Errors
///
/// See [`Match::new`].
pub fn simulate(setup: MatchSetup, data: Arc<GameData>) -> Result<MatchResult> {
    Match::new(setup, data)?.play()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MercyRule;
    use crate::events::EventRecorder;
    use crate::fielding::{DefenseProfile, Shift};
    use crate::player::{Controller, PlayerSnapshot, Position};

    fn roster(id: u32, base: PlayerId) -> TeamSnapshot {
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
            bullpen: vec![PlayerSnapshot::league_average(
                base + 50,
                "Reliever",
                Position::Pitcher,
            )],
            starting_pitcher: base,
            defense: DefenseProfile::default(),
            shift: Shift::None,
            controller: Controller::Ai,
        }
    }

    fn setup(seed: u64) -> MatchSetup {
        MatchSetup::new(roster(1, 100), roster(2, 200), seed)
    }

    fn data() -> Arc<GameData> {
        Arc::new(GameData::builtin().unwrap())
    }

    #[test]
    fn test_match_completes_with_consistent_score() {
        for seed in 0..6 {
            let result = simulate(setup(seed), data()).unwrap();
            let runs: u32 = result
                .log
                .iter()
                .filter(|e| matches!(e, MatchEvent::RunScored { .. }))
                .count() as u32;
            assert_eq!(runs, result.home_score + result.away_score, "seed {seed}");
            assert!(result.innings >= 9 && result.innings <= 12);
            match result.termination {
                Termination::Draw => assert_eq!(result.home_score, result.away_score),
                _ => assert_ne!(result.home_score, result.away_score),
            }
            let home: u32 = result.line_score(TeamSide::Home).iter().sum();
            assert_eq!(home, result.home_score);
            assert!(matches!(result.log.last(), Some(MatchEvent::MatchEnded { .. })));
        }
    }

    #[test]
    fn test_same_seed_same_log() {
        let a = simulate(setup(42), data()).unwrap();
        let b = simulate(setup(42), data()).unwrap();
        assert_eq!(a.log_hash, b.log_hash);
        assert_eq!(a.state_hash, b.state_hash);
        assert_eq!(a.log, b.log);
    }

    #[test]
    fn test_every_half_has_three_outs_unless_walk_off() {
        let result = simulate(setup(8), data()).unwrap();
        let mut start_outs = 0;
        for event in &result.log {
            match event {
                MatchEvent::HalfInningStarted { .. } => start_outs = 0,
                MatchEvent::PlateAppearanceStarted { outs, .. } => {
                    assert!(*outs >= start_outs, "outs went backwards");
                    assert!(*outs < 3);
                    start_outs = *outs;
                }
                MatchEvent::HalfInningEnded { outs, walk_off, .. } => {
                    if *walk_off {
                        assert!(*outs < 3);
                    } else {
                        assert_eq!(*outs, 3);
                    }
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_strikeouts_are_charged_as_outs() {
        for seed in 0..10 {
            let result = simulate(setup(seed), data()).unwrap();
            let strikeouts: u32 = result.stats.values().map(|s| s.strikeouts).sum();
            let pitched: u32 = result.stats.values().map(|s| s.strikeouts_pitched).sum();
            assert_eq!(strikeouts, pitched, "seed {seed}");
            let outs: u32 = result.stats.values().map(|s| s.outs_pitched).sum();
            assert!(outs >= strikeouts, "seed {seed}: {outs} outs for {strikeouts} strikeouts");
        }
    }

    #[test]
    fn test_bottom_skipped_when_home_leads() {
        for seed in 0..12 {
            let result = simulate(setup(seed), data()).unwrap();
            if result.termination == Termination::Regulation && result.winner == Some(TeamSide::Home) {
                let last = result.halves.last().unwrap();
                if last.half == Half::Top {
                    assert_eq!(last.inning, result.innings);
                    return;
                }
            }
        }
    }

    #[test]
    fn test_mercy_rule_ends_early() {
        let mut s = setup(3);
        s.config.mercy = Some(MercyRule {
            run_margin: 1,
            from_inning: 1,
        });
        let result = simulate(s, data()).unwrap();
        if result.termination == Termination::Mercy {
            assert!(result.innings < 9);
            assert_eq!(result.halves.last().unwrap().ended, Some(Termination::Mercy));
        }
    }

    #[test]
    fn test_pull_count_brings_in_reliever() {
        let mut s = setup(5);
        s.config.pitcher_pull_count = Some(1);
        let result = simulate(s, data()).unwrap();
        let changes: Vec<_> = result
            .log
            .iter()
            .filter_map(|e| match e {
                MatchEvent::PitchingChange { side, incoming, reason, .. } => Some((*side, *incoming, *reason)),
                _ => None,
            })
            .collect();
        assert!(changes.contains(&(TeamSide::Home, 150, ChangeReason::PitchCount)));
        assert!(changes.contains(&(TeamSide::Away, 250, ChangeReason::PitchCount)));
        // One reliever each; nobody left after that.
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_invalid_roster_refuses_to_start() {
        let mut s = setup(1);
        s.home.lineup.pop();
        assert!(matches!(
            Match::new(s, data()),
            Err(SimError::InvalidRoster { .. })
        ));

        let shared = MatchSetup::new(roster(1, 100), roster(2, 100), 1);
        assert!(matches!(
            Match::new(shared, data()),
            Err(SimError::InvalidRoster { .. })
        ));
    }

    #[test]
    fn test_unknown_umpire_key_is_rejected() {
        let mut s = setup(1);
        s.umpire = Some("nobody".into());
        assert!(matches!(Match::new(s, data()), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_listener_sees_full_log() {
        let recorder = EventRecorder::new();
        let mut game = Match::new(setup(9), data()).unwrap();
        game.subscribe(Box::new(recorder.clone()), &[]);
        let result = game.play().unwrap();
        assert_eq!(recorder.snapshot(), result.log);
    }

    #[test]
    fn test_carryover_reports_moved_values_only() {
        let result = simulate(setup(4), data()).unwrap();
        let carry = result.carryover();
        for (id, delta) in &carry.confidence {
            assert_ne!(*delta, 0);
            assert_eq!(
                result.confidence_initial[id] + delta,
                result.confidence_final[id]
            );
        }
        assert_eq!(carry.trust, result.trust_deltas);
    }

    #[test]
    fn test_failing_result_sink_is_swallowed() {
        struct Broken;
        impl ResultSink for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn store(&mut self, _: &MatchResult) -> std::result::Result<(), SinkError> {
                Err(SinkError::Write("read-only".into()))
            }
        }
        let result = simulate(setup(2), data()).unwrap();
        let mut sinks: Vec<Box<dyn ResultSink>> = vec![Box::new(Broken)];
        assert_eq!(hand_back(&result, &mut sinks), 1);
    }

    #[test]
    fn test_setup_bytes_round_trip() {
        let s = setup(77);
        let bytes = s.to_bytes().unwrap();
        assert_eq!(MatchSetup::from_bytes(&bytes).unwrap(), s);
    }
}
