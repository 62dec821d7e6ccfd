//! Match metrics for batch analysis.
//!
//! [`GameMetrics`] condenses one [`MatchResult`] into the numbers a batch
//! report needs; [`BatchSummary`] aggregates them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use diamond_core::controller::{MatchResult, Termination};
use diamond_core::events::MatchEvent;
use diamond_core::player::TeamSide;

/// Per-side totals for one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideMetrics {
    /// Team name.
    pub team: String,
    /// Runs.
    pub runs: u32,
    /// Hits.
    pub hits: u32,
    /// Home runs.
    pub home_runs: u32,
    /// Walks and hit batters.
    pub walks: u32,
    /// Batter strikeouts.
    pub strikeouts: u32,
    /// Stolen bases.
    pub stolen_bases: u32,
    /// Fielding errors committed.
    pub errors: u32,
    /// Relievers used.
    pub pitching_changes: u32,
}

/// Complete metrics for a single match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Unique game identifier.
    pub game_id: String,
    /// Seed used.
    pub seed: u64,
    /// Winning team name (None = draw).
    pub winner: Option<String>,
    /// How the game ended.
    pub termination: Termination,
    /// Innings begun.
    pub innings: u32,
    /// Plate umpire.
    pub umpire: String,
    /// Weather archetype.
    pub weather: String,
    /// Home side.
    pub home: SideMetrics,
    /// Visiting side.
    pub away: SideMetrics,
    /// Wild pitches.
    pub wild_pitches: u32,
    /// Dugout chatter lines.
    pub chatter: u32,
    /// Events in the log.
    pub events: usize,
    /// Event-log hash (for determinism validation).
    pub log_hash: u64,
}

impl GameMetrics {
    /// Condense a finished match.
    #[must_use]
    pub fn from_result(result: &MatchResult, home_ids: &[u32]) -> Self {
        let mut home = SideMetrics {
            team: result.home.clone(),
            runs: result.home_score,
            ..SideMetrics::default()
        };
        let mut away = SideMetrics {
            team: result.away.clone(),
            runs: result.away_score,
            ..SideMetrics::default()
        };
        for (id, stats) in &result.stats {
            let side = if home_ids.contains(id) { &mut home } else { &mut away };
            side.hits += stats.hits;
            side.home_runs += stats.home_runs;
            side.walks += stats.walks + stats.hit_by_pitch;
            side.strikeouts += stats.strikeouts;
            side.stolen_bases += stats.stolen_bases;
            side.errors += stats.errors;
        }
        let mut wild_pitches = 0;
        let mut chatter = 0;
        for event in &result.log {
            match event {
                MatchEvent::PitchingChange { side, .. } => match side {
                    TeamSide::Home => home.pitching_changes += 1,
                    TeamSide::Away => away.pitching_changes += 1,
                },
                MatchEvent::WildPitch { .. } => wild_pitches += 1,
                MatchEvent::DugoutChatter { .. } => chatter += 1,
                _ => {}
            }
        }
        let winner = result.winner.map(|side| match side {
            TeamSide::Home => result.home.clone(),
            TeamSide::Away => result.away.clone(),
        });
        Self {
            game_id: format!("game_{}", result.seed),
            seed: result.seed,
            winner,
            termination: result.termination,
            innings: result.innings,
            umpire: result.umpire.clone(),
            weather: result.weather.clone(),
            home,
            away,
            wild_pitches,
            chatter,
            events: result.log.len(),
            log_hash: result.log_hash,
        }
    }

    /// Combined runs.
    #[must_use]
    pub fn total_runs(&self) -> u32 {
        self.home.runs + self.away.runs
    }
}

/// Aggregate over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games aggregated.
    pub total_games: u32,
    /// Wins per team name.
    pub wins: BTreeMap<String, u32>,
    /// Win rate per team name.
    pub win_rates: BTreeMap<String, f64>,
    /// Home side win rate.
    pub home_win_rate: f64,
    /// Draws.
    pub draws: u32,
    /// Walk-off finishes.
    pub walk_offs: u32,
    /// Mercy-rule finishes.
    pub mercy_games: u32,
    /// Games past regulation.
    pub extra_inning_games: u32,
    /// Mean combined runs.
    pub runs_per_game: f64,
    /// Mean combined home runs.
    pub home_runs_per_game: f64,
    /// Mean combined walks.
    pub walks_per_game: f64,
    /// Mean combined strikeouts.
    pub strikeouts_per_game: f64,
    /// Mean innings begun.
    pub innings_per_game: f64,
    /// Umpire usage.
    pub umpires: BTreeMap<String, u32>,
    /// Weather usage.
    pub weather: BTreeMap<String, u32>,
}

impl BatchSummary {
    /// Aggregate the given games.
    #[must_use]
    pub fn from_games(games: &[GameMetrics], regulation_innings: u32) -> Self {
        let mut summary = Self {
            total_games: games.len() as u32,
            ..Self::default()
        };
        if games.is_empty() {
            return summary;
        }
        let mut home_wins = 0u32;
        let (mut runs, mut homers, mut walks, mut ks, mut innings) = (0u64, 0u64, 0u64, 0u64, 0u64);
        for game in games {
            match &game.winner {
                Some(name) => {
                    *summary.wins.entry(name.clone()).or_insert(0) += 1;
                    if *name == game.home.team {
                        home_wins += 1;
                    }
                }
                None => summary.draws += 1,
            }
            match game.termination {
                Termination::WalkOff => summary.walk_offs += 1,
                Termination::Mercy => summary.mercy_games += 1,
                Termination::Regulation | Termination::Draw => {}
            }
            if game.innings > regulation_innings {
                summary.extra_inning_games += 1;
            }
            *summary.umpires.entry(game.umpire.clone()).or_insert(0) += 1;
            *summary.weather.entry(game.weather.clone()).or_insert(0) += 1;
            runs += u64::from(game.total_runs());
            homers += u64::from(game.home.home_runs + game.away.home_runs);
            walks += u64::from(game.home.walks + game.away.walks);
            ks += u64::from(game.home.strikeouts + game.away.strikeouts);
            innings += u64::from(game.innings);
        }
        let n = games.len() as f64;
        summary.win_rates = summary
            .wins
            .iter()
            .map(|(team, wins)| (team.clone(), f64::from(*wins) / n))
            .collect();
        summary.home_win_rate = f64::from(home_wins) / n;
        summary.runs_per_game = runs as f64 / n;
        summary.home_runs_per_game = homers as f64 / n;
        summary.walks_per_game = walks as f64 / n;
        summary.strikeouts_per_game = ks as f64 / n;
        summary.innings_per_game = innings as f64 / n;
        summary
    }

    /// Human-readable report for stderr.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = format!("Games: {}\n", self.total_games);
        for (team, rate) in &self.win_rates {
            out.push_str(&format!("  {team}: {:.1}%\n", rate * 100.0));
        }
        out.push_str(&format!(
            "Draws: {}  Walk-offs: {}  Mercy: {}  Extra innings: {}\n",
            self.draws, self.walk_offs, self.mercy_games, self.extra_inning_games
        ));
        out.push_str(&format!(
            "Per game: {:.2} R, {:.2} HR, {:.2} BB, {:.2} K, {:.2} inn\n",
            self.runs_per_game,
            self.home_runs_per_game,
            self.walks_per_game,
            self.strikeouts_per_game,
            self.innings_per_game
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_core::controller::simulate;
    use diamond_test_utils::fixtures::{exhibition_setup, game_data};

    fn metrics(winner: Option<&str>, termination: Termination, innings: u32, runs: (u32, u32)) -> GameMetrics {
        GameMetrics {
            game_id: "g".into(),
            seed: 0,
            winner: winner.map(str::to_string),
            termination,
            innings,
            umpire: "sato".into(),
            weather: "crisp_calm".into(),
            home: SideMetrics {
                team: "Home".into(),
                runs: runs.0,
                home_runs: 1,
                ..SideMetrics::default()
            },
            away: SideMetrics {
                team: "Away".into(),
                runs: runs.1,
                ..SideMetrics::default()
            },
            wild_pitches: 0,
            chatter: 0,
            events: 0,
            log_hash: 0,
        }
    }

    #[test]
    fn test_summary_aggregates() {
        let games = vec![
            metrics(Some("Home"), Termination::WalkOff, 10, (4, 3)),
            metrics(Some("Away"), Termination::Regulation, 9, (1, 5)),
            metrics(None, Termination::Draw, 12, (2, 2)),
            metrics(Some("Home"), Termination::Mercy, 6, (11, 0)),
        ];
        let summary = BatchSummary::from_games(&games, 9);
        assert_eq!(summary.total_games, 4);
        assert_eq!(summary.wins["Home"], 2);
        assert!((summary.win_rates["Away"] - 0.25).abs() < 1e-9);
        assert!((summary.home_win_rate - 0.5).abs() < 1e-9);
        assert_eq!(summary.draws, 1);
        assert_eq!(summary.walk_offs, 1);
        assert_eq!(summary.mercy_games, 1);
        assert_eq!(summary.extra_inning_games, 2);
        assert!((summary.runs_per_game - 7.0).abs() < 1e-9);
        assert!((summary.home_runs_per_game - 1.0).abs() < 1e-9);
        assert_eq!(summary.umpires["sato"], 4);
    }

    #[test]
    fn test_empty_summary() {
        let summary = BatchSummary::from_games(&[], 9);
        assert_eq!(summary.total_games, 0);
        assert_eq!(summary.runs_per_game, 0.0);
    }

    #[test]
    fn test_metrics_from_result() {
        let setup = exhibition_setup(21);
        let home_ids: Vec<u32> = setup.home.players().map(|p| p.id).collect();
        let result = simulate(setup, game_data()).unwrap();
        let m = GameMetrics::from_result(&result, &home_ids);
        assert_eq!(m.home.runs, result.home_score);
        assert_eq!(m.away.runs, result.away_score);
        assert_eq!(m.events, result.log.len());
        let hits: u32 = result.stats.values().map(|s| s.hits).sum();
        assert_eq!(m.home.hits + m.away.hits, hits);
        match result.winner {
            Some(TeamSide::Home) => assert_eq!(m.winner.as_deref(), Some(result.home.as_str())),
            Some(TeamSide::Away) => assert_eq!(m.winner.as_deref(), Some(result.away.as_str())),
            None => assert!(m.winner.is_none()),
        }
    }
}
