//! Roster fixtures.
//!
//! Every fixture is built from league-average players so tests start from
//! a neutral baseline and change only what they exercise.

use std::sync::Arc;

use diamond_core::config::MatchConfig;
use diamond_core::controller::MatchSetup;
use diamond_core::data::GameData;
use diamond_core::fielding::{DefenseProfile, Shift};
use diamond_core::player::{
    Controller, PitcherRole, PlayerId, PlayerSnapshot, Position, TeamId, TeamSnapshot,
};

/// First player id of the home fixture team.
pub const HOME_BASE_ID: PlayerId = 100;

/// First player id of the visiting fixture team.
pub const AWAY_BASE_ID: PlayerId = 200;

/// Relievers carried by [`team`].
pub const BULLPEN_SIZE: usize = 3;

/// League-average player.
#[must_use]
pub fn player(id: PlayerId, position: Position) -> PlayerSnapshot {
    PlayerSnapshot::league_average(id, format!("Player {id}"), position)
}

/// League-average relief pitcher.
#[must_use]
pub fn reliever(id: PlayerId) -> PlayerSnapshot {
    let mut arm = player(id, Position::Pitcher);
    arm.pitching.role = PitcherRole::Reliever;
    arm
}

/// Full nine-man team plus a bullpen.
///
/// Lineup ids run `base_id..base_id + 9` in [`Position::FIELD`] order, so
/// the starting pitcher is `base_id`. Relievers follow at `base_id + 9`.
#[must_use]
pub fn team(id: TeamId, name: &str, base_id: PlayerId) -> TeamSnapshot {
    let lineup = Position::FIELD
        .iter()
        .zip(base_id..)
        .map(|(pos, pid)| player(pid, *pos))
        .collect();
    let first_reliever = base_id + Position::FIELD.len() as PlayerId;
    let bullpen = (first_reliever..first_reliever + BULLPEN_SIZE as PlayerId)
        .map(reliever)
        .collect();
    TeamSnapshot {
        id,
        name: name.to_string(),
        lineup,
        bullpen,
        starting_pitcher: base_id,
        defense: DefenseProfile::default(),
        shift: Shift::None,
        controller: Controller::Ai,
    }
}

/// Two opposing AI teams: `(home, away)`.
#[must_use]
pub fn opposing_teams() -> (TeamSnapshot, TeamSnapshot) {
    (
        team(1, "Harbor Cranes", HOME_BASE_ID),
        team(2, "Valley Comets", AWAY_BASE_ID),
    )
}

/// Default-rules setup for the fixture teams.
#[must_use]
pub fn exhibition_setup(seed: u64) -> MatchSetup {
    let (home, away) = opposing_teams();
    MatchSetup::new(home, away, seed)
}

/// Fixture setup with custom rules.
#[must_use]
pub fn setup_with_config(seed: u64, config: MatchConfig) -> MatchSetup {
    MatchSetup {
        config,
        ..exhibition_setup(seed)
    }
}

/// Built-in data tables.
///
/// # Panics
///
/// Panics if the compiled-in tables fail to parse.
#[must_use]
pub fn game_data() -> Arc<GameData> {
    Arc::new(GameData::builtin().expect("built-in data tables parse"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_teams_validate() {
        let setup = exhibition_setup(1);
        setup.validate().unwrap();
        assert_eq!(setup.home.lineup.len(), 9);
        assert_eq!(setup.home.bullpen.len(), BULLPEN_SIZE);
        assert_eq!(setup.away.starting_pitcher, AWAY_BASE_ID);
    }

    #[test]
    fn test_reliever_role() {
        assert_eq!(reliever(5).pitching.role, PitcherRole::Reliever);
        assert_eq!(reliever(5).position, Position::Pitcher);
    }
}
