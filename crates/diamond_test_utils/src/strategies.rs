//! Proptest strategies.
//!
//! Generators for ratings, players and whole setups. Every generated
//! roster is valid, so properties can run full matches on them.

use proptest::prelude::*;

use diamond_core::controller::MatchSetup;
use diamond_core::player::{BattingRatings, PlayerId, Position, TeamSnapshot};

use crate::fixtures::{opposing_teams, team};

/// Any match seed.
pub fn arb_seed() -> impl Strategy<Value = u64> {
    any::<u64>()
}

/// A 0-100 rating.
pub fn arb_rating() -> impl Strategy<Value = u8> {
    0u8..=100
}

/// Batting ratings anywhere on the scale.
pub fn arb_batting() -> impl Strategy<Value = BattingRatings> {
    (
        arb_rating(),
        arb_rating(),
        arb_rating(),
        arb_rating(),
        arb_rating(),
        arb_rating(),
    )
        .prop_map(|(contact, power, eye, discipline, speed, clutch)| BattingRatings {
            contact,
            power,
            eye,
            discipline,
            speed,
            clutch,
        })
}

/// Raw confidence deltas, up to several times a single event's swing.
pub fn arb_confidence_delta() -> impl Strategy<Value = i32> {
    -250i32..=250
}

/// Fixture team whose lineup has random batting ratings.
pub fn arb_team(id: u32, name: &'static str, base_id: PlayerId) -> impl Strategy<Value = TeamSnapshot> {
    prop::collection::vec(arb_batting(), Position::FIELD.len()).prop_map(move |ratings| {
        let mut team = team(id, name, base_id);
        for (slot, batting) in team.lineup.iter_mut().zip(ratings) {
            slot.batting = batting;
        }
        team
    })
}

/// Setup between two randomized fixture teams under any seed.
pub fn arb_setup() -> impl Strategy<Value = MatchSetup> {
    let (home, away) = opposing_teams();
    (
        arb_team(home.id, "Harbor Cranes", home.starting_pitcher),
        arb_team(away.id, "Valley Comets", away.starting_pitcher),
        arb_seed(),
    )
        .prop_map(|(home, away, seed)| MatchSetup::new(home, away, seed))
}
