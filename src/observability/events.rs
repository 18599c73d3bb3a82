//! Structured session event stream.
//!
//! Events are serialized as newline-delimited JSON, each line carrying a
//! monotonically increasing sequence number and the id of the run that
//! produced it.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `stop` was requested through the handle.
    Requested,
    /// The session task is shutting down.
    Shutdown,
}

/// A discrete event emitted by a running session.
///
/// Tagged with `"type"` when serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Initial dispatch succeeded and the bar clock is running.
    SessionStarted {
        /// When playback began.
        timestamp: DateTime<Utc>,
        /// Configured session name.
        #[serde(skip_serializing_if = "Option::is_none")]
        session_name: Option<String>,
        /// Evaluator name.
        evaluator: String,
        /// Tempo at start.
        tempo_bpm: f64,
        /// Phases in the cycle.
        phase_count: usize,
    },

    /// Start was attempted but the evaluator could not be brought up.
    InitializationFailed {
        /// When the attempt failed.
        timestamp: DateTime<Utc>,
        /// Error text.
        error: String,
    },

    /// Playback stopped.
    SessionStopped {
        /// When playback stopped.
        timestamp: DateTime<Utc>,
        /// Stop reason.
        reason: StopReason,
        /// Bars played since the last start.
        bars_played: u64,
    },

    /// A new phase became current.
    PhaseEntered {
        /// When the transition occurred.
        timestamp: DateTime<Utc>,
        /// Display name of the phase.
        phase_name: String,
        /// Zero-based index in the phase table.
        phase_index: usize,
        /// Target energy of the phase.
        energy: u8,
    },

    /// A bar boundary was reached.
    BarStarted {
        /// When the tick ran.
        timestamp: DateTime<Utc>,
        /// Display name of the current phase.
        phase_name: String,
        /// 1-indexed bar within the phase.
        bar: u32,
        /// Bars in the phase.
        duration_bars: u32,
        /// Length of this bar in milliseconds.
        bar_duration_ms: f64,
    },

    /// The pending tick was moved after a tempo change.
    TempoResynced {
        /// When the change was applied.
        timestamp: DateTime<Utc>,
        /// New tempo.
        tempo_bpm: f64,
        /// Fraction of the bar already played.
        progress: f64,
        /// Delay until the rescheduled tick in milliseconds.
        remaining_ms: f64,
    },

    /// The evaluator rejected a steady-state script.
    DispatchFailed {
        /// When the failure was observed.
        timestamp: DateTime<Utc>,
        /// What triggered the dispatch.
        reason: String,
        /// Error text.
        error: String,
    },
}

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    session_id: Uuid,
    #[serde(flatten)]
    event: Event,
}

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are dropped; observability never stops
/// the music.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
    session_id: Uuid,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("session_id", &self.session_id)
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter writing to `writer` under a fresh run id.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
            session_id: Uuid::new_v4(),
        }
    }

    /// Emitter on stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Emitter that discards everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Emitter writing to a new file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Run id stamped on every event.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let envelope = EventEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            session_id: self.session_id,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::noop()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn lines(&self) -> Vec<serde_json::Value> {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn phase_entered() -> Event {
        Event::PhaseEntered {
            timestamp: DateTime::parse_from_rfc3339("2025-06-01T22:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            phase_name: "Groove".to_owned(),
            phase_index: 1,
            energy: 60,
        }
    }

    #[test]
    fn envelope_is_flat_and_tagged() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(phase_entered());

        let lines = tw.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "PhaseEntered");
        assert_eq!(lines[0]["phase_name"], "Groove");
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(
            lines[0]["session_id"],
            emitter.session_id().to_string().as_str()
        );
        assert!(lines[0].get("event").is_none());
    }

    #[test]
    fn sequence_increments() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(phase_entered());
        emitter.emit(Event::SessionStopped {
            timestamp: Utc::now(),
            reason: StopReason::Requested,
            bars_played: 12,
        });

        assert_eq!(emitter.event_count(), 2);
        let lines = tw.lines();
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["reason"], "requested");
    }

    #[test]
    fn emitters_get_distinct_ids() {
        assert_ne!(
            EventEmitter::noop().session_id(),
            EventEmitter::noop().session_id()
        );
    }

    #[test]
    fn optional_name_is_omitted() {
        let json = serde_json::to_value(Event::SessionStarted {
            timestamp: Utc::now(),
            session_name: None,
            evaluator: "writer".to_owned(),
            tempo_bpm: 138.0,
            phase_count: 6,
        })
        .unwrap();
        assert!(json.get("session_name").is_none());
        assert_eq!(json["phase_count"], 6);
    }
}
