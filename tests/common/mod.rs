//! Shared integration-test harness: a scriptable evaluator, session
//! spawning helpers and a runner for the `tranceloop` binary.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tranceloop::display::MemoryDisplay;
use tranceloop::error::EvaluatorError;
use tranceloop::evaluator::{AudioEvaluator, ContextState, SampleMap};
use tranceloop::observability::EventEmitter;
use tranceloop::params::Parameters;
use tranceloop::phase::{Phase, PhaseName, PhaseTable};
use tranceloop::session::{SessionBuilder, SessionHandle, SessionOptions};
use tranceloop::visualizer::SignalTap;

/// Evaluator double that records every call and fails on demand.
#[derive(Default)]
pub struct MockEvaluator {
    calls: Mutex<Vec<String>>,
    failures: AtomicUsize,
    fail_on: Mutex<Vec<usize>>,
    fail_resume: AtomicBool,
    fail_samples: AtomicBool,
    running: AtomicBool,
    resumes: AtomicUsize,
    samples: Mutex<Vec<SampleMap>>,
    tap: Option<Arc<dyn SignalTap>>,
}

impl MockEvaluator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Evaluator whose `n`-th `evaluate` calls (1-based) are rejected.
    pub fn failing_on(calls: &[usize]) -> Arc<Self> {
        let mock = Self::default();
        *mock.fail_on.lock().unwrap() = calls.to_vec();
        Arc::new(mock)
    }

    pub fn with_tap(tap: Arc<dyn SignalTap>) -> Arc<Self> {
        Arc::new(Self {
            tap: Some(tap),
            ..Self::default()
        })
    }

    pub fn set_fail_resume(&self, fail: bool) {
        self.fail_resume.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_samples(&self, fail: bool) {
        self.fail_samples.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on(&self, calls: &[usize]) {
        *self.fail_on.lock().unwrap() = calls.to_vec();
    }

    /// Every script passed to `evaluate`, accepted or not.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn registered_samples(&self) -> Vec<SampleMap> {
        self.samples.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AudioEvaluator for MockEvaluator {
    async fn evaluate(&self, script: &str) -> Result<(), EvaluatorError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(script.to_string());
            calls.len()
        };
        if self.fail_on.lock().unwrap().contains(&call) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(EvaluatorError::Rejected(format!("call {call} rejected")));
        }
        Ok(())
    }

    fn context_state(&self) -> ContextState {
        if self.running.load(Ordering::SeqCst) {
            ContextState::Running
        } else {
            ContextState::Suspended
        }
    }

    async fn resume(&self) -> Result<(), EvaluatorError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(EvaluatorError::ContextUnavailable("no audio device".into()));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn register_samples(&self, samples: &SampleMap) -> Result<(), EvaluatorError> {
        if self.fail_samples.load(Ordering::SeqCst) {
            return Err(EvaluatorError::Samples("pack unreachable".into()));
        }
        self.samples.lock().unwrap().push(samples.clone());
        Ok(())
    }

    fn try_get_output_tap(&self) -> Option<Arc<dyn SignalTap>> {
        self.tap.clone()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A spawned session plus its collaborators.
pub struct TestSession {
    pub handle: SessionHandle,
    pub task: tokio::task::JoinHandle<()>,
    pub evaluator: Arc<MockEvaluator>,
    pub display: MemoryDisplay,
}

/// Spawns a session at `tempo` over `table` with default timing.
pub fn spawn_session(
    evaluator: Arc<MockEvaluator>,
    table: PhaseTable,
    tempo: f64,
) -> TestSession {
    spawn_with(evaluator, table, tempo, Arc::new(EventEmitter::noop()))
}

pub fn spawn_with(
    evaluator: Arc<MockEvaluator>,
    table: PhaseTable,
    tempo: f64,
    events: Arc<EventEmitter>,
) -> TestSession {
    let display = MemoryDisplay::new();
    let (handle, task) = SessionBuilder::new(evaluator.clone(), display.clone())
        .phases(table)
        .parameters(Parameters {
            tempo_bpm: tempo,
            ..Parameters::default()
        })
        .options(SessionOptions::default())
        .events(events)
        .spawn();

    TestSession {
        handle,
        task,
        evaluator,
        display,
    }
}

/// Table of one-bar phases in the standard order.
pub fn one_bar_table() -> PhaseTable {
    PhaseTable::new(
        PhaseName::ALL
            .into_iter()
            .map(|name| Phase::new(name, 1, 50))
            .collect(),
    )
    .unwrap()
}

/// Lets spawned tasks run without advancing the clock.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Sleeps on the (paused) clock, then lets tasks settle.
pub async fn advance(by: Duration) {
    tokio::time::sleep(by).await;
    settle().await;
}

/// Runs the `tranceloop` binary to completion.
pub fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tranceloop"))
        .args(args)
        .env_remove("TRANCELOOP_CONFIG")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run tranceloop")
}

/// Runs the binary with `input` on stdin.
pub fn run_cli_with_input(args: &[&str], input: &str) -> Output {
    use std::io::Write;

    let mut child = Command::new(env!("CARGO_BIN_EXE_tranceloop"))
        .args(args)
        .env_remove("TRANCELOOP_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn tranceloop");

    child
        .stdin
        .take()
        .expect("stdin not captured")
        .write_all(input.as_bytes())
        .expect("failed to write stdin");

    child.wait_with_output().expect("failed to wait for tranceloop")
}

/// Path to a test fixture.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}
