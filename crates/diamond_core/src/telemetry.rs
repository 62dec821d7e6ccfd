//! Structured telemetry.
//!
//! [`TelemetryCollector`] is a bus listener. It turns the events analysts
//! care about into [`TelemetryRecord`]s, buffers them, and hands the buffer
//! to every attached [`TelemetrySink`] when it fills up or when a half-inning
//! or the game ends.
//!
//! # Failure policy
//!
//! A sink that fails is logged and skipped. The buffer is cleared either
//! way, so a broken sink can neither stall the match nor grow memory.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::at_bat::PlateAppearanceResult;
use crate::confidence::ConfidenceEvent;
use crate::controller::Termination;
use crate::error::{ListenerError, SinkError};
use crate::events::{EventListener, MatchEvent};
use crate::player::{PlayerId, TeamSide};
use crate::state::{Half, TiltReport};

/// What triggered a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlushReason {
    /// Buffer reached the configured size.
    Threshold,
    /// A half-inning ended.
    HalfInning,
    /// The game ended.
    GameOver,
    /// Flushed by the host.
    Manual,
}

/// One analytics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryRecord {
    /// A plate appearance finished.
    Play {
        /// Inning.
        inning: u32,
        /// Batter.
        batter: PlayerId,
        /// Pitcher.
        pitcher: PlayerId,
        /// Result.
        result: PlateAppearanceResult,
        /// Pitches seen.
        pitches: u32,
    },
    /// A half-inning finished.
    InningComplete {
        /// Inning.
        inning: u32,
        /// Top or bottom.
        half: Half,
        /// Runs in the half.
        runs: u32,
        /// Outs recorded.
        outs: u8,
    },
    /// The home side won in its last at-bat.
    Walkoff {
        /// Inning.
        inning: u32,
        /// Runs in the deciding half.
        runs: u32,
    },
    /// A material confidence change.
    ConfidenceSwing {
        /// Inning.
        inning: u32,
        /// Player.
        player: PlayerId,
        /// Player's team.
        side: TeamSide,
        /// New minus old.
        delta: i32,
        /// Trigger.
        reason: ConfidenceEvent,
    },
    /// Call tilt counters.
    UmpireTilt {
        /// Counters per side.
        tilt: TiltReport,
    },
    /// Final score.
    GameOver {
        /// Home runs.
        home_score: u32,
        /// Visitor runs.
        away_score: u32,
        /// How it ended.
        termination: Termination,
    },
}

/// Destination for flushed telemetry.
pub trait TelemetrySink: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Accept a batch.
    fn write(&mut self, records: &[TelemetryRecord], reason: FlushReason) -> Result<(), SinkError>;

    /// Event to publish after a successful write.
    fn follow_up(&mut self) -> Option<MatchEvent> {
        None
    }
}

/// Sink that keeps everything in a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<TelemetryRecord>>>,
    flushes: Arc<Mutex<Vec<FlushReason>>>,
}

impl MemorySink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    #[must_use]
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reasons of every flush received, in order.
    #[must_use]
    pub fn flushes(&self) -> Vec<FlushReason> {
        self.flushes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TelemetrySink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&mut self, records: &[TelemetryRecord], reason: FlushReason) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(records);
        self.flushes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reason);
        Ok(())
    }
}

/// Sink that announces each flush on the bus as
/// [`MatchEvent::TelemetryFlushed`].
#[derive(Debug, Clone, Default)]
pub struct ForwardingSink {
    pending: Option<(usize, FlushReason)>,
}

impl TelemetrySink for ForwardingSink {
    fn name(&self) -> &str {
        "forwarding"
    }

    fn write(&mut self, records: &[TelemetryRecord], reason: FlushReason) -> Result<(), SinkError> {
        self.pending = Some((records.len(), reason));
        Ok(())
    }

    fn follow_up(&mut self) -> Option<MatchEvent> {
        self.pending
            .take()
            .map(|(records, reason)| MatchEvent::TelemetryFlushed { records, reason })
    }
}

/// Buffers records and flushes them to sinks.
pub struct TelemetryCollector {
    threshold: usize,
    buffer: Vec<TelemetryRecord>,
    sinks: Vec<Box<dyn TelemetrySink>>,
    inning: u32,
    flushes: u64,
    failures: u64,
}

impl std::fmt::Debug for TelemetryCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sinks: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("TelemetryCollector")
            .field("threshold", &self.threshold)
            .field("buffered", &self.buffer.len())
            .field("sinks", &sinks)
            .field("failures", &self.failures)
            .finish()
    }
}

impl TelemetryCollector {
    /// Collector flushing every `threshold` records (at least one).
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            buffer: Vec::new(),
            sinks: Vec::new(),
            inning: 1,
            flushes: 0,
            failures: 0,
        }
    }

    /// Attach a sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Records waiting for the next flush.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Sink failures swallowed so far.
    #[must_use]
    pub const fn failures(&self) -> u64 {
        self.failures
    }

    /// Flushes performed so far.
    #[must_use]
    pub const fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Hand the buffer to every sink and clear it. Returns sink follow-ups.
    pub fn flush(&mut self, reason: FlushReason) -> Vec<MatchEvent> {
        let mut follow_ups = Vec::new();
        if self.buffer.is_empty() {
            return follow_ups;
        }
        for sink in &mut self.sinks {
            match sink.write(&self.buffer, reason) {
                Ok(()) => follow_ups.extend(sink.follow_up()),
                Err(err) => {
                    self.failures += 1;
                    warn!(sink = sink.name(), %err, records = self.buffer.len(), "Telemetry flush failed; dropping batch");
                }
            }
        }
        debug!(records = self.buffer.len(), ?reason, "Telemetry flushed");
        self.flushes += 1;
        self.buffer.clear();
        follow_ups
    }

    fn push(&mut self, record: TelemetryRecord, follow_ups: &mut Vec<MatchEvent>) {
        self.buffer.push(record);
        if self.buffer.len() >= self.threshold {
            follow_ups.extend(self.flush(FlushReason::Threshold));
        }
    }
}

impl EventListener for TelemetryCollector {
    fn name(&self) -> &str {
        "telemetry"
    }

    fn on_event(
        &mut self,
        event: &MatchEvent,
        follow_ups: &mut Vec<MatchEvent>,
    ) -> Result<(), ListenerError> {
        match event {
            MatchEvent::HalfInningStarted { inning, .. } => self.inning = *inning,
            MatchEvent::PlateAppearanceEnded {
                batter,
                pitcher,
                result,
                pitches,
            } => {
                let record = TelemetryRecord::Play {
                    inning: self.inning,
                    batter: *batter,
                    pitcher: *pitcher,
                    result: *result,
                    pitches: *pitches,
                };
                self.push(record, follow_ups);
            }
            MatchEvent::ConfidenceChanged {
                player,
                side,
                reason,
                old,
                new,
            } => {
                let record = TelemetryRecord::ConfidenceSwing {
                    inning: self.inning,
                    player: *player,
                    side: *side,
                    delta: new - old,
                    reason: *reason,
                };
                self.push(record, follow_ups);
            }
            MatchEvent::HalfInningEnded {
                inning,
                half,
                runs,
                outs,
                walk_off,
                ..
            } => {
                self.buffer.push(TelemetryRecord::InningComplete {
                    inning: *inning,
                    half: *half,
                    runs: *runs,
                    outs: *outs,
                });
                if *walk_off {
                    self.buffer.push(TelemetryRecord::Walkoff {
                        inning: *inning,
                        runs: *runs,
                    });
                }
                follow_ups.extend(self.flush(FlushReason::HalfInning));
            }
            MatchEvent::MatchEnded {
                home_score,
                away_score,
                termination,
                tilt,
                ..
            } => {
                self.buffer.push(TelemetryRecord::UmpireTilt { tilt: *tilt });
                self.buffer.push(TelemetryRecord::GameOver {
                    home_score: *home_score,
                    away_score: *away_score,
                    termination: *termination,
                });
                follow_ups.extend(self.flush(FlushReason::GameOver));
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSink;

    impl TelemetrySink for BrokenSink {
        fn name(&self) -> &str {
            "broken"
        }

        fn write(&mut self, _: &[TelemetryRecord], _: FlushReason) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("disk gone".into()))
        }
    }

    fn play(batter: PlayerId) -> MatchEvent {
        MatchEvent::PlateAppearanceEnded {
            batter,
            pitcher: 1,
            result: PlateAppearanceResult::Single,
            pitches: 3,
        }
    }

    fn half_over(walk_off: bool) -> MatchEvent {
        MatchEvent::HalfInningEnded {
            inning: 9,
            half: Half::Bottom,
            runs: 2,
            outs: 1,
            walk_off,
            tilt: TiltReport::default(),
        }
    }

    fn feed(collector: &mut TelemetryCollector, event: &MatchEvent) -> Vec<MatchEvent> {
        let mut out = Vec::new();
        collector.on_event(event, &mut out).unwrap();
        out
    }

    #[test]
    fn test_flushes_at_threshold() {
        let sink = MemorySink::new();
        let mut collector = TelemetryCollector::new(3).with_sink(Box::new(sink.clone()));
        feed(&mut collector, &play(10));
        feed(&mut collector, &play(11));
        assert!(sink.records().is_empty());
        feed(&mut collector, &play(12));
        assert_eq!(sink.records().len(), 3);
        assert_eq!(sink.flushes(), [FlushReason::Threshold]);
        assert_eq!(collector.buffered(), 0);
    }

    #[test]
    fn test_flushes_at_half_inning_with_walkoff() {
        let sink = MemorySink::new();
        let mut collector = TelemetryCollector::new(64).with_sink(Box::new(sink.clone()));
        feed(&mut collector, &play(10));
        feed(&mut collector, &half_over(true));
        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert!(matches!(records[1], TelemetryRecord::InningComplete { inning: 9, .. }));
        assert!(matches!(records[2], TelemetryRecord::Walkoff { runs: 2, .. }));
        assert_eq!(sink.flushes(), [FlushReason::HalfInning]);
    }

    #[test]
    fn test_forwarding_sink_publishes_flush_notice() {
        let mut collector =
            TelemetryCollector::new(64).with_sink(Box::new(ForwardingSink::default()));
        feed(&mut collector, &play(10));
        let out = feed(&mut collector, &half_over(false));
        assert_eq!(
            out,
            [MatchEvent::TelemetryFlushed {
                records: 2,
                reason: FlushReason::HalfInning,
            }]
        );
    }

    #[test]
    fn test_broken_sink_is_swallowed() {
        let sink = MemorySink::new();
        let mut collector = TelemetryCollector::new(1)
            .with_sink(Box::new(BrokenSink))
            .with_sink(Box::new(sink.clone()));
        feed(&mut collector, &play(10));
        feed(&mut collector, &play(11));
        assert_eq!(collector.failures(), 2);
        assert_eq!(sink.records().len(), 2, "healthy sink still receives batches");
        assert_eq!(collector.buffered(), 0);
    }

    #[test]
    fn test_confidence_swing_records_delta() {
        let sink = MemorySink::new();
        let mut collector = TelemetryCollector::new(1).with_sink(Box::new(sink.clone()));
        feed(
            &mut collector,
            &MatchEvent::ConfidenceChanged {
                player: 4,
                side: TeamSide::Away,
                reason: ConfidenceEvent::HomeRun,
                old: 50,
                new: 62,
            },
        );
        assert!(matches!(
            sink.records()[0],
            TelemetryRecord::ConfidenceSwing { delta: 12, player: 4, .. }
        ));
    }
}
