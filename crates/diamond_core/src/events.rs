//! Match events and the synchronous event bus.
//!
//! Every state transition is announced as a [`MatchEvent`], a closed enum
//! so listeners match exhaustively and new variants are caught at compile
//! time. The [`EventBus`] fans each event out to subscribed listeners in
//! subscription order before `publish` returns. Listeners see only the
//! event, never the state mid-mutation.
//!
//! Listeners may answer with follow-up events (dugout chatter, telemetry
//! flush notices). Follow-ups are dispatched after the triggering event,
//! breadth-first, and everything delivered is returned to the caller so it
//! lands in the match log in dispatch order.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::at_bat::PlateAppearanceResult;
use crate::baserunning::BuntKind;
use crate::confidence::ConfidenceEvent;
use crate::controller::Termination;
use crate::dugout::ChatterKey;
use crate::error::ListenerError;
use crate::fielding::{ErrorKind, PlayResult};
use crate::momentum::MomentumKey;
use crate::physics::{InjurySeverity, PitchDescription, PitchLocation, PitchResolution};
use crate::player::{PitchKind, PlayerId, Position, TeamSide};
use crate::psychology::Mood;
use crate::state::{Base, Half, TiltReport};
use crate::telemetry::FlushReason;

/// Follow-up events dispatched per publish before further ones are dropped.
pub const MAX_CASCADE: usize = 32;

/// Why a pitcher left the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeReason {
    /// Pitch count reached the configured limit.
    PitchCount,
    /// Injured on the mound.
    Injury,
}

/// Everything the core announces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchEvent {
    /// First pitch is about to be thrown.
    MatchStarted {
        /// Home team name.
        home: String,
        /// Visiting team name.
        away: String,
        /// Match seed.
        seed: u64,
        /// Plate umpire key.
        umpire: String,
        /// Weather archetype key.
        weather: String,
    },
    /// A half-inning began.
    HalfInningStarted {
        /// Inning number.
        inning: u32,
        /// Top or bottom.
        half: Half,
    },
    /// A batter stepped in.
    PlateAppearanceStarted {
        /// Batter.
        batter: PlayerId,
        /// Pitcher.
        pitcher: PlayerId,
        /// Batting-order slot (1-9).
        lineup_slot: usize,
        /// Outs at the start.
        outs: u8,
    },
    /// Catcher put down a sign.
    SignCalled {
        /// Pitcher.
        pitcher: PlayerId,
        /// Catcher.
        catcher: PlayerId,
        /// Suggested pitch.
        pitch: PitchKind,
        /// Suggested location.
        location: PitchLocation,
        /// Shakes so far in this negotiation.
        shakes: u8,
    },
    /// Pitcher shook off a sign.
    SignShaken {
        /// Pitcher.
        pitcher: PlayerId,
        /// Catcher.
        catcher: PlayerId,
        /// Rejected pitch.
        pitch: PitchKind,
        /// Shakes including this one.
        shakes: u8,
    },
    /// Shake cap reached; the catcher's last sign stands.
    SignForced {
        /// Pitcher.
        pitcher: PlayerId,
        /// Catcher.
        catcher: PlayerId,
        /// Forced pitch.
        pitch: PitchKind,
        /// Forced location.
        location: PitchLocation,
    },
    /// A pitch left the hand.
    PitchThrown {
        /// Pitcher.
        pitcher: PlayerId,
        /// Batter.
        batter: PlayerId,
        /// Pitch type.
        pitch: PitchKind,
        /// Intended location.
        location: PitchLocation,
        /// Velocity in km/h.
        velocity_kmh: f64,
        /// Pitcher's count including this pitch.
        pitch_count: u32,
        /// Thrown from a slide step.
        slide_step: bool,
    },
    /// The pitch was called or swung at.
    PitchResolved {
        /// Batter.
        batter: PlayerId,
        /// Pitcher.
        pitcher: PlayerId,
        /// Ball, strike, foul or in play.
        resolution: PitchResolution,
        /// Descriptive tag.
        description: PitchDescription,
        /// Balls after the pitch.
        balls: u8,
        /// Strikes after the pitch.
        strikes: u8,
        /// Contact quality when put in play.
        contact_quality: Option<f64>,
    },
    /// A taken pitch got away from the catcher.
    WildPitch {
        /// Pitcher.
        pitcher: PlayerId,
        /// Runners who moved up.
        advanced: u8,
        /// Runs that scored.
        runs: u8,
    },
    /// A stolen-base attempt finished.
    StealResolved {
        /// Runner.
        runner: PlayerId,
        /// Base the runner broke for (`None` is home).
        target: Option<Base>,
        /// Runner safe.
        success: bool,
        /// Defense time minus offense time in seconds.
        margin: f64,
    },
    /// A pickoff throw finished.
    PickoffResolved {
        /// Pitcher.
        pitcher: PlayerId,
        /// Runner.
        runner: PlayerId,
        /// Base thrown to.
        base: Base,
        /// Runner tagged out.
        picked: bool,
        /// Runner's lead after the throw, in feet.
        lead_after: f64,
    },
    /// A bunt was laid down.
    BuntResolved {
        /// Batter.
        batter: PlayerId,
        /// Squeeze or sacrifice.
        kind: BuntKind,
        /// Ball put in play.
        contact: bool,
        /// Defense collapsed and everyone was safe.
        collapse: bool,
        /// Runs that scored.
        runs: u8,
    },
    /// A ball in play was resolved by the defense.
    PlayResolved {
        /// Batter.
        batter: PlayerId,
        /// Pitcher.
        pitcher: PlayerId,
        /// Result of the fielding play.
        result: PlayResult,
        /// Primary fielder.
        fielder: Option<Position>,
        /// Error charged on the play.
        error: Option<ErrorKind>,
        /// Outs recorded on the play.
        outs_on_play: u8,
        /// Runs that scored.
        runs: u8,
        /// Exit velocity in mph.
        exit_velocity: f64,
        /// Landing distance in feet.
        distance_ft: f64,
        /// Narrative line.
        description: String,
    },
    /// The plate appearance ended.
    PlateAppearanceEnded {
        /// Batter.
        batter: PlayerId,
        /// Pitcher.
        pitcher: PlayerId,
        /// How it ended.
        result: PlateAppearanceResult,
        /// Pitches thrown in the plate appearance.
        pitches: u32,
    },
    /// A run crossed the plate.
    RunScored {
        /// Runner who scored.
        runner: PlayerId,
        /// Scoring side.
        side: TeamSide,
        /// Batter credited with the RBI, if any.
        rbi: Option<PlayerId>,
    },
    /// A team's momentum meter moved.
    MomentumShift {
        /// Team.
        side: TeamSide,
        /// Trigger.
        key: MomentumKey,
        /// Meter before.
        old: i32,
        /// Meter after.
        new: i32,
        /// Team is in the zone after the shift.
        in_zone: bool,
    },
    /// A material confidence change.
    ConfidenceChanged {
        /// Player.
        player: PlayerId,
        /// Player's team.
        side: TeamSide,
        /// Trigger.
        reason: ConfidenceEvent,
        /// Value before.
        old: i32,
        /// Value after.
        new: i32,
    },
    /// A player's mental state moved.
    PsychologyShift {
        /// Player.
        player: PlayerId,
        /// Player's team.
        side: TeamSide,
        /// New mental state.
        mood: Mood,
    },
    /// Bench chatter.
    DugoutChatter {
        /// Team whose dugout is talking.
        side: TeamSide,
        /// Trigger.
        key: ChatterKey,
        /// What was said.
        line: String,
    },
    /// A reliever replaced the pitcher.
    PitchingChange {
        /// Team making the change.
        side: TeamSide,
        /// Pitcher leaving.
        outgoing: PlayerId,
        /// Pitcher entering.
        incoming: PlayerId,
        /// Why.
        reason: ChangeReason,
    },
    /// A pitcher was hurt.
    PitcherInjured {
        /// Pitcher.
        pitcher: PlayerId,
        /// How badly.
        severity: InjurySeverity,
        /// Pitch count at the time.
        pitch_count: u32,
    },
    /// A half-inning finished.
    HalfInningEnded {
        /// Inning number.
        inning: u32,
        /// Top or bottom.
        half: Half,
        /// Runs scored in the half.
        runs: u32,
        /// Outs recorded (3 unless the game ended mid-half).
        outs: u8,
        /// The half ended on a walk-off.
        walk_off: bool,
        /// Running umpire call tilt.
        tilt: TiltReport,
    },
    /// Telemetry records were handed to sinks.
    TelemetryFlushed {
        /// Records in the batch.
        records: usize,
        /// What triggered the flush.
        reason: FlushReason,
    },
    /// Final out (or walk-off run).
    MatchEnded {
        /// Home runs scored.
        home_score: u32,
        /// Visitor runs scored.
        away_score: u32,
        /// Innings played.
        innings: u32,
        /// How the game ended.
        termination: Termination,
        /// Umpire call tilt.
        tilt: TiltReport,
    },
}

/// Discriminant of [`MatchEvent`], used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum EventKind {
    MatchStarted,
    HalfInningStarted,
    PlateAppearanceStarted,
    SignCalled,
    SignShaken,
    SignForced,
    PitchThrown,
    PitchResolved,
    WildPitch,
    StealResolved,
    PickoffResolved,
    BuntResolved,
    PlayResolved,
    PlateAppearanceEnded,
    RunScored,
    MomentumShift,
    ConfidenceChanged,
    PsychologyShift,
    DugoutChatter,
    PitchingChange,
    PitcherInjured,
    HalfInningEnded,
    TelemetryFlushed,
    MatchEnded,
}

impl MatchEvent {
    /// This event's kind.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            MatchEvent::MatchStarted { .. } => EventKind::MatchStarted,
            MatchEvent::HalfInningStarted { .. } => EventKind::HalfInningStarted,
            MatchEvent::PlateAppearanceStarted { .. } => EventKind::PlateAppearanceStarted,
            MatchEvent::SignCalled { .. } => EventKind::SignCalled,
            MatchEvent::SignShaken { .. } => EventKind::SignShaken,
            MatchEvent::SignForced { .. } => EventKind::SignForced,
            MatchEvent::PitchThrown { .. } => EventKind::PitchThrown,
            MatchEvent::PitchResolved { .. } => EventKind::PitchResolved,
            MatchEvent::WildPitch { .. } => EventKind::WildPitch,
            MatchEvent::StealResolved { .. } => EventKind::StealResolved,
            MatchEvent::PickoffResolved { .. } => EventKind::PickoffResolved,
            MatchEvent::BuntResolved { .. } => EventKind::BuntResolved,
            MatchEvent::PlayResolved { .. } => EventKind::PlayResolved,
            MatchEvent::PlateAppearanceEnded { .. } => EventKind::PlateAppearanceEnded,
            MatchEvent::RunScored { .. } => EventKind::RunScored,
            MatchEvent::MomentumShift { .. } => EventKind::MomentumShift,
            MatchEvent::ConfidenceChanged { .. } => EventKind::ConfidenceChanged,
            MatchEvent::PsychologyShift { .. } => EventKind::PsychologyShift,
            MatchEvent::DugoutChatter { .. } => EventKind::DugoutChatter,
            MatchEvent::PitchingChange { .. } => EventKind::PitchingChange,
            MatchEvent::PitcherInjured { .. } => EventKind::PitcherInjured,
            MatchEvent::HalfInningEnded { .. } => EventKind::HalfInningEnded,
            MatchEvent::TelemetryFlushed { .. } => EventKind::TelemetryFlushed,
            MatchEvent::MatchEnded { .. } => EventKind::MatchEnded,
        }
    }
}

/// Observer attached to an [`EventBus`].
///
/// Listeners run synchronously on the match's thread. Returning an error
/// does not stop dispatch and does not undo anything already applied to
/// the match; the bus logs it and moves on.
pub trait EventListener: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Handle one event, optionally queueing follow-up events.
    fn on_event(
        &mut self,
        event: &MatchEvent,
        follow_ups: &mut Vec<MatchEvent>,
    ) -> Result<(), ListenerError>;
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    kinds: Vec<EventKind>,
    listener: Box<dyn EventListener>,
}

impl Subscription {
    fn wants(&self, kind: EventKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

/// Synchronous in-process fan-out.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
    failures: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self
            .subscriptions
            .iter()
            .map(|s| s.listener.name())
            .collect();
        f.debug_struct("EventBus")
            .field("listeners", &names)
            .field("failures", &self.failures)
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the given kinds. An empty slice subscribes to everything.
    pub fn subscribe(
        &mut self,
        listener: Box<dyn EventListener>,
        kinds: &[EventKind],
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            kinds: kinds.to_vec(),
            listener,
        });
        id
    }

    /// Subscribe to every event.
    pub fn subscribe_all(&mut self, listener: Box<dyn EventListener>) -> SubscriptionId {
        self.subscribe(listener, &[])
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Listener errors swallowed so far.
    #[must_use]
    pub const fn failures(&self) -> u64 {
        self.failures
    }

    /// Dispatch an event and any follow-ups.
    ///
    /// Returns every delivered event in dispatch order, the published one
    /// first.
    pub fn publish(&mut self, event: MatchEvent) -> Vec<MatchEvent> {
        let mut queue = VecDeque::from([event]);
        let mut delivered = Vec::with_capacity(1);
        let mut follow_up_budget = MAX_CASCADE;

        while let Some(event) = queue.pop_front() {
            let kind = event.kind();
            let mut follow_ups = Vec::new();
            for sub in &mut self.subscriptions {
                if !sub.wants(kind) {
                    continue;
                }
                if let Err(err) = sub.listener.on_event(&event, &mut follow_ups) {
                    self.failures += 1;
                    warn!(listener = sub.listener.name(), ?kind, %err, "Listener failed; continuing");
                }
            }
            delivered.push(event);

            for follow_up in follow_ups {
                if follow_up_budget == 0 {
                    warn!(?kind, "Follow-up cascade limit reached; dropping event");
                    break;
                }
                follow_up_budget -= 1;
                queue.push_back(follow_up);
            }
        }
        delivered
    }
}

/// Listener backed by a closure.
pub struct FnListener<F> {
    name: String,
    handler: F,
}

impl<F> FnListener<F>
where
    F: FnMut(&MatchEvent, &mut Vec<MatchEvent>) -> Result<(), ListenerError> + Send,
{
    /// Wrap a closure.
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> EventListener for FnListener<F>
where
    F: FnMut(&MatchEvent, &mut Vec<MatchEvent>) -> Result<(), ListenerError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(
        &mut self,
        event: &MatchEvent,
        follow_ups: &mut Vec<MatchEvent>,
    ) -> Result<(), ListenerError> {
        (self.handler)(event, follow_ups)
    }
}

/// Listener that copies events into a shared buffer.
///
/// Presentation layers and tests hold the [`EventRecorder::handle`] and
/// read it after (or during) the match.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<MatchEvent>>>,
}

impl EventRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded events.
    #[must_use]
    pub fn handle(&self) -> Arc<Mutex<Vec<MatchEvent>>> {
        Arc::clone(&self.events)
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MatchEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventListener for EventRecorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_event(
        &mut self,
        event: &MatchEvent,
        _follow_ups: &mut Vec<MatchEvent>,
    ) -> Result<(), ListenerError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

/// Order-sensitive hash of an event log.
///
/// Each event is hashed through its bincode encoding, so two logs hash
/// equal only if every field of every event matches bit for bit.
#[must_use]
pub fn log_hash(events: &[MatchEvent]) -> u64 {
    let mut hasher = DefaultHasher::new();
    events.len().hash(&mut hasher);
    for event in events {
        match bincode::serialize(event) {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(_) => format!("{event:?}").hash(&mut hasher),
        }
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(inning: u32) -> MatchEvent {
        MatchEvent::HalfInningStarted {
            inning,
            half: Half::Top,
        }
    }

    fn chatter() -> MatchEvent {
        MatchEvent::DugoutChatter {
            side: TeamSide::Home,
            key: ChatterKey::RunsScored,
            line: "Here we go!".into(),
        }
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let mut bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            bus.subscribe_all(Box::new(FnListener::new(tag, move |_, _| {
                order.lock().unwrap().push(tag);
                Ok(())
            })));
        }
        bus.publish(started(1));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_kind_filter() {
        let mut bus = EventBus::new();
        let recorder = EventRecorder::new();
        bus.subscribe(Box::new(recorder.clone()), &[EventKind::DugoutChatter]);
        bus.publish(started(1));
        bus.publish(chatter());
        assert_eq!(recorder.snapshot(), vec![chatter()]);
    }

    #[test]
    fn test_failing_listener_does_not_stop_dispatch() {
        let mut bus = EventBus::new();
        bus.subscribe_all(Box::new(FnListener::new("broken", |_, _| {
            Err(ListenerError::new("broken", "disk full"))
        })));
        let recorder = EventRecorder::new();
        bus.subscribe_all(Box::new(recorder.clone()));
        let delivered = bus.publish(started(1));
        assert_eq!(delivered.len(), 1);
        assert_eq!(recorder.snapshot().len(), 1);
        assert_eq!(bus.failures(), 1);
    }

    #[test]
    fn test_follow_ups_follow_trigger() {
        let mut bus = EventBus::new();
        bus.subscribe(
            Box::new(FnListener::new("chatty", |_, follow_ups| {
                follow_ups.push(chatter());
                Ok(())
            })),
            &[EventKind::HalfInningStarted],
        );
        let delivered = bus.publish(started(3));
        assert_eq!(delivered, vec![started(3), chatter()]);
    }

    #[test]
    fn test_cascade_is_bounded() {
        let mut bus = EventBus::new();
        bus.subscribe_all(Box::new(FnListener::new("echo", |event, follow_ups| {
            follow_ups.push(event.clone());
            Ok(())
        })));
        let delivered = bus.publish(started(1));
        assert_eq!(delivered.len(), MAX_CASCADE + 1);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = EventBus::new();
        let recorder = EventRecorder::new();
        let id = bus.subscribe_all(Box::new(recorder.clone()));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(started(1));
        assert!(recorder.snapshot().is_empty());
    }

    #[test]
    fn test_log_hash_is_order_sensitive() {
        let a = vec![started(1), started(2)];
        let b = vec![started(2), started(1)];
        assert_eq!(log_hash(&a), log_hash(&a.clone()));
        assert_ne!(log_hash(&a), log_hash(&b));
    }
}
