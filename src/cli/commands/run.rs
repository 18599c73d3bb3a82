//! `run`: play a live session.
//!
//! Scripts go to stdout (or `--out`), the phase display and optional
//! waveform go to stderr, and live controls are read from stdin one
//! command per line:
//!
//! ```text
//! tempo 140
//! cutoff 650
//! resonance 12
//! stop
//! start
//! quit
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::args::RunArgs;
use crate::display::{ConsoleDisplay, DisplaySurface};
use crate::error::{SessionError, TranceLoopError};
use crate::evaluator::{AudioEvaluator, FileEvaluator, WriterEvaluator};
use crate::observability::{EventEmitter, init_metrics};
use crate::session::{SessionBuilder, SessionHandle};
use crate::visualizer::{DEFAULT_HEIGHT, DEFAULT_WIDTH, Visualizer, render_ascii};

use super::load_config;

const VISUALIZER_INTERVAL: Duration = Duration::from_millis(250);
const VISUALIZER_COLS: usize = 64;
const VISUALIZER_ROWS: usize = 8;

/// One line of stdin input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    /// `tempo <bpm>`
    Tempo(f64),
    /// `cutoff <hz>`
    Cutoff(f64),
    /// `resonance <q>`
    Resonance(f64),
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `quit`
    Quit,
}

/// Parses a control line. Blank lines yield `Ok(None)`.
///
/// # Errors
///
/// Returns a message describing the unrecognized input.
pub fn parse_control(line: &str) -> Result<Option<Control>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    let value = |name: &str, raw: Option<&str>| -> Result<f64, String> {
        raw.ok_or_else(|| format!("'{name}' needs a value"))?
            .parse::<f64>()
            .map_err(|_| format!("'{name}' needs a number"))
    };

    let control = match command.to_ascii_lowercase().as_str() {
        "tempo" | "bpm" => Control::Tempo(value("tempo", words.next())?),
        "cutoff" => Control::Cutoff(value("cutoff", words.next())?),
        "resonance" | "res" => Control::Resonance(value("resonance", words.next())?),
        "start" | "play" => Control::Start,
        "stop" => Control::Stop,
        "quit" | "exit" => Control::Quit,
        other => return Err(format!("unknown command '{other}'")),
    };

    if words.next().is_some() {
        return Err(format!("unexpected input after '{command}'"));
    }
    Ok(Some(control))
}

struct Quiet;

impl DisplaySurface for Quiet {
    fn update(&mut self, _label: &str, _energy: u8) {}
}

/// Run a session until `quit`, `--for` elapses, or `cancel` fires.
///
/// # Errors
///
/// Returns an error if the session file, parameters, event file or
/// metrics listener are invalid, or the session fails to start.
pub async fn run(
    args: &RunArgs,
    quiet: bool,
    cancel: CancellationToken,
) -> Result<(), TranceLoopError> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let config = load_config(args.config.as_deref())?;
    let parameters = args.parameters.apply(config.parameters);
    parameters.validate()?;

    let evaluator: Arc<dyn AudioEvaluator> = match &args.out {
        Some(path) => Arc::new(FileEvaluator::new(path)),
        None => Arc::new(WriterEvaluator::stdout()),
    };

    let events = match &args.events_file {
        Some(path) if path.as_os_str() == "-" => EventEmitter::stderr(),
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let display: Box<dyn DisplaySurface> = if quiet || args.visualize {
        Box::new(Quiet)
    } else {
        Box::new(ConsoleDisplay::stderr())
    };

    let (handle, task) = SessionBuilder::from_config(&config, Arc::clone(&evaluator), display)?
        .parameters(parameters)
        .events(Arc::new(events))
        .spawn();

    if args.visualize {
        let visualizer = Visualizer::new(
            DEFAULT_WIDTH,
            DEFAULT_HEIGHT,
            evaluator.try_get_output_tap(),
        );
        tokio::spawn(visualizer.run(
            handle.subscribe(),
            VISUALIZER_INTERVAL,
            cancel.child_token(),
            |snapshot, frame| {
                let art = render_ascii(
                    frame,
                    DEFAULT_WIDTH,
                    DEFAULT_HEIGHT,
                    VISUALIZER_COLS,
                    VISUALIZER_ROWS,
                );
                eprintln!("{}  {}%\n{art}", snapshot.label, snapshot.energy);
            },
        ));
    }

    let outcome = drive(&handle, args, &cancel).await;

    match handle.stop().await {
        Ok(()) | Err(SessionError::Closed) => {}
        Err(e) => warn!(error = %e, "failed to stop session"),
    }
    handle.shutdown();
    if let Err(e) = task.await {
        warn!(error = %e, "session task ended abnormally");
    }

    outcome
}

async fn drive(
    handle: &SessionHandle,
    args: &RunArgs,
    cancel: &CancellationToken,
) -> Result<(), TranceLoopError> {
    if !args.paused {
        handle.start().await?;
    }

    let deadline = async {
        match args.run_for {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("interrupted, stopping session");
                break;
            }
            () = &mut deadline => {
                info!("run time elapsed, stopping session");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if apply(handle, &line).await? {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
        }
    }
    Ok(())
}

/// Applies one control line. Returns `true` on `quit`.
async fn apply(handle: &SessionHandle, line: &str) -> Result<bool, TranceLoopError> {
    let control = match parse_control(line) {
        Ok(Some(control)) => control,
        Ok(None) => return Ok(false),
        Err(message) => {
            warn!("{message}");
            return Ok(false);
        }
    };

    let rejected = match control {
        Control::Tempo(bpm) => handle.set_tempo(bpm).err(),
        Control::Cutoff(hz) => handle.set_cutoff(hz).err(),
        Control::Resonance(q) => handle.set_resonance(q).err(),
        Control::Start => {
            match handle.start().await {
                Ok(()) => {}
                Err(SessionError::Initialization(e)) => {
                    warn!(error = %e, "start failed, send 'start' to retry");
                }
                Err(e) => return Err(e.into()),
            }
            None
        }
        Control::Stop => {
            handle.stop().await?;
            None
        }
        Control::Quit => return Ok(true),
    };

    if let Some(e) = rejected {
        warn!(error = %e, "control rejected");
    }
    Ok(false)
}
