//! Dugout chatter.
//!
//! [`DugoutListener`] watches the bus and answers with
//! [`MatchEvent::DugoutChatter`] follow-ups. It reads nothing but events:
//! pitcher focus and trauma come from [`MatchEvent::PsychologyShift`], so
//! the listener never touches match state.
//!
//! Each trigger fires at most once per inning for the same subject (a
//! pitcher, or a team for runs scoring).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::at_bat::PlateAppearanceResult;
use crate::error::ListenerError;
use crate::events::{EventKind, EventListener, MatchEvent};
use crate::player::{PlayerId, TeamSide, TeamSnapshot};
use crate::psychology::Mood;

/// Trauma at which a pitcher visibly rattles.
pub const RATTLED_TRAUMA: f64 = 4.0;

/// Focus at which a strikeout fires the dugout up.
pub const DOMINANT_FOCUS: f64 = 3.0;

/// What set the dugout off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChatterKey {
    /// A pitcher's trauma crossed the rattled line.
    PitcherRattled,
    /// Runs crossed the plate.
    RunsScored,
    /// A locked-in pitcher struck someone out.
    Dominant,
}

/// Event kinds the listener needs.
pub const DUGOUT_TOPICS: &[EventKind] = &[
    EventKind::HalfInningStarted,
    EventKind::PsychologyShift,
    EventKind::RunScored,
    EventKind::PlateAppearanceEnded,
];

/// Cooldown subject: a pitcher or a whole team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Subject {
    Player(PlayerId),
    Team(TeamSide),
}

/// Bus listener that turns raw events into bench chatter.
#[derive(Debug, Clone, Default)]
pub struct DugoutListener {
    names: BTreeMap<PlayerId, String>,
    pitchers: BTreeMap<PlayerId, (TeamSide, f64, f64)>,
    fired: BTreeSet<(ChatterKey, Subject)>,
    inning: u32,
}

impl DugoutListener {
    /// Listener that knows both rosters' names.
    #[must_use]
    pub fn new(home: &TeamSnapshot, away: &TeamSnapshot) -> Self {
        let names = home
            .players()
            .chain(away.players())
            .map(|p| (p.id, p.name.clone()))
            .collect();
        Self {
            names,
            ..Self::default()
        }
    }

    fn name(&self, id: PlayerId) -> &str {
        self.names.get(&id).map_or("The pitcher", String::as_str)
    }

    /// Mark a trigger as used this inning. Returns `false` if it already fired.
    fn arm(&mut self, key: ChatterKey, subject: Subject) -> bool {
        self.fired.insert((key, subject))
    }

    fn chatter(side: TeamSide, key: ChatterKey, line: String) -> MatchEvent {
        MatchEvent::DugoutChatter { side, key, line }
    }
}

impl EventListener for DugoutListener {
    fn name(&self) -> &str {
        "dugout"
    }

    fn on_event(
        &mut self,
        event: &MatchEvent,
        follow_ups: &mut Vec<MatchEvent>,
    ) -> Result<(), ListenerError> {
        match event {
            MatchEvent::HalfInningStarted { inning, .. } => {
                if *inning != self.inning {
                    self.inning = *inning;
                    self.fired.clear();
                }
            }
            MatchEvent::PsychologyShift {
                player,
                side,
                mood: Mood::Pitcher { focus, trauma, .. },
            } => {
                self.pitchers.insert(*player, (*side, *focus, *trauma));
                if *trauma >= RATTLED_TRAUMA
                    && self.arm(ChatterKey::PitcherRattled, Subject::Player(*player))
                {
                    let line = format!(
                        "{} is rattled after that last rocket. The pitching coach calls for deep breaths.",
                        self.name(*player)
                    );
                    follow_ups.push(Self::chatter(*side, ChatterKey::PitcherRattled, line));
                }
            }
            MatchEvent::RunScored { side, .. } => {
                if self.arm(ChatterKey::RunsScored, Subject::Team(*side)) {
                    let line = match side {
                        TeamSide::Home => "The home bench empties onto the rail. Helmets everywhere!",
                        TeamSide::Away => "The visitors' dugout erupts as the run crosses.",
                    };
                    follow_ups.push(Self::chatter(*side, ChatterKey::RunsScored, line.into()));
                }
            }
            MatchEvent::PlateAppearanceEnded {
                pitcher,
                result: PlateAppearanceResult::Strikeout,
                ..
            } => {
                let Some(&(side, focus, _)) = self.pitchers.get(pitcher) else {
                    return Ok(());
                };
                if focus >= DOMINANT_FOCUS && self.arm(ChatterKey::Dominant, Subject::Player(*pitcher)) {
                    let line = format!(
                        "{} stalks off the mound with that glare. The bench feeds off it.",
                        self.name(*pitcher)
                    );
                    follow_ups.push(Self::chatter(side, ChatterKey::Dominant, line));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Half;

    fn pitcher_mood(focus: f64, trauma: f64) -> MatchEvent {
        MatchEvent::PsychologyShift {
            player: 7,
            side: TeamSide::Home,
            mood: Mood::Pitcher {
                focus,
                trauma,
                intimidation: 0.0,
            },
        }
    }

    fn run(side: TeamSide) -> MatchEvent {
        MatchEvent::RunScored {
            runner: 3,
            side,
            rbi: None,
        }
    }

    fn strikeout() -> MatchEvent {
        MatchEvent::PlateAppearanceEnded {
            batter: 3,
            pitcher: 7,
            result: PlateAppearanceResult::Strikeout,
            pitches: 4,
        }
    }

    fn feed(listener: &mut DugoutListener, event: &MatchEvent) -> Vec<MatchEvent> {
        let mut out = Vec::new();
        listener.on_event(event, &mut out).unwrap();
        out
    }

    fn keys(events: &[MatchEvent]) -> Vec<ChatterKey> {
        events
            .iter()
            .filter_map(|e| match e {
                MatchEvent::DugoutChatter { key, .. } => Some(*key),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_rattled_fires_once_per_inning() {
        let mut dugout = DugoutListener::default();
        feed(&mut dugout, &MatchEvent::HalfInningStarted { inning: 1, half: Half::Top });
        assert!(feed(&mut dugout, &pitcher_mood(0.0, 3.9)).is_empty());
        assert_eq!(keys(&feed(&mut dugout, &pitcher_mood(0.0, 4.2))), [ChatterKey::PitcherRattled]);
        assert!(feed(&mut dugout, &pitcher_mood(0.0, 5.0)).is_empty());

        // Same inning, other half: still cooling down.
        feed(&mut dugout, &MatchEvent::HalfInningStarted { inning: 1, half: Half::Bottom });
        assert!(feed(&mut dugout, &pitcher_mood(0.0, 5.0)).is_empty());

        feed(&mut dugout, &MatchEvent::HalfInningStarted { inning: 2, half: Half::Top });
        assert_eq!(keys(&feed(&mut dugout, &pitcher_mood(0.0, 5.0))), [ChatterKey::PitcherRattled]);
    }

    #[test]
    fn test_runs_scored_per_side() {
        let mut dugout = DugoutListener::default();
        assert_eq!(keys(&feed(&mut dugout, &run(TeamSide::Away))), [ChatterKey::RunsScored]);
        assert!(feed(&mut dugout, &run(TeamSide::Away)).is_empty());
        assert_eq!(keys(&feed(&mut dugout, &run(TeamSide::Home))), [ChatterKey::RunsScored]);
    }

    #[test]
    fn test_dominant_needs_focus() {
        let mut dugout = DugoutListener::default();
        assert!(feed(&mut dugout, &strikeout()).is_empty(), "unknown pitcher");

        feed(&mut dugout, &pitcher_mood(1.0, 0.0));
        assert!(feed(&mut dugout, &strikeout()).is_empty());

        feed(&mut dugout, &pitcher_mood(3.5, 0.0));
        let out = feed(&mut dugout, &strikeout());
        assert_eq!(keys(&out), [ChatterKey::Dominant]);
        assert!(matches!(&out[0], MatchEvent::DugoutChatter { side: TeamSide::Home, .. }));
    }

    #[test]
    fn test_chatter_uses_roster_names() {
        use crate::player::{PlayerSnapshot, Position};
        let mut home = crate::player::TeamSnapshot {
            id: 1,
            name: "Home".into(),
            lineup: Vec::new(),
            bullpen: Vec::new(),
            starting_pitcher: 7,
            defense: crate::fielding::DefenseProfile::default(),
            shift: crate::fielding::Shift::None,
            controller: crate::player::Controller::Ai,
        };
        home.lineup
            .push(PlayerSnapshot::league_average(7, "Okada", Position::Pitcher));
        let away = crate::player::TeamSnapshot {
            id: 2,
            name: "Away".into(),
            ..home.clone()
        };
        let mut dugout = DugoutListener::new(&home, &away);
        let out = feed(&mut dugout, &pitcher_mood(0.0, 6.0));
        let MatchEvent::DugoutChatter { line, .. } = &out[0] else {
            panic!("expected chatter");
        };
        assert!(line.starts_with("Okada"));
    }
}
