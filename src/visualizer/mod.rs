//! Visualizer feed
//!
//! Turns the session's energy and, when the evaluator exposes one, its
//! audio output tap into waveform frames. Without a tap an energy-driven
//! synthetic waveform is drawn instead.
//!
//! Frames are plain point lists in canvas coordinates; [`render_ascii`]
//! rasterizes one for terminals.

pub mod tap;

pub use tap::{BufferTap, SignalTap, TAP_CENTER, TAP_SIZE};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::session::SessionSnapshot;

/// Default canvas width in pixels.
pub const DEFAULT_WIDTH: usize = 600;

/// Default canvas height in pixels.
pub const DEFAULT_HEIGHT: usize = 200;

/// Stroke parameters derived from energy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WaveformStyle {
    /// Stroke hue in degrees, cyan at rest towards magenta at full energy.
    pub hue: f64,
    /// Stroke width in pixels.
    pub line_width: f64,
    /// Glow (shadow blur) radius in pixels.
    pub glow: f64,
}

impl WaveformStyle {
    /// Style for an energy percentage.
    #[must_use]
    pub fn from_energy(energy: u8) -> Self {
        let e = f64::from(energy);
        Self {
            hue: e.mul_add(0.8, 180.0),
            line_width: 2.0 + e / 40.0,
            glow: e / 5.0,
        }
    }

    /// CSS-style colour string, e.g. `hsl(260, 100%, 50%)`.
    #[must_use]
    pub fn css_color(&self) -> String {
        format!("hsl({}, 100%, 50%)", self.hue)
    }
}

/// Where a frame's samples came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSource {
    /// Real audio from the evaluator's output tap.
    Tap,
    /// Energy-driven stand-in.
    Synthetic,
}

/// A point on the canvas; `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    /// Horizontal position in pixels.
    pub x: f64,
    /// Vertical position in pixels.
    pub y: f64,
}

/// One waveform frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Stroke style.
    pub style: WaveformStyle,
    /// Sample origin.
    pub source: FrameSource,
    /// Polyline to stroke, left to right.
    pub points: Vec<Point>,
}

/// Produces waveform frames for a fixed canvas size.
pub struct Visualizer {
    width: usize,
    height: usize,
    tap: Option<Arc<dyn SignalTap>>,
    buffer: Vec<u8>,
}

impl std::fmt::Debug for Visualizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visualizer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("has_tap", &self.tap.is_some())
            .finish_non_exhaustive()
    }
}

impl Visualizer {
    /// Creates a visualizer; pass the evaluator's tap if it has one.
    #[must_use]
    pub fn new(width: usize, height: usize, tap: Option<Arc<dyn SignalTap>>) -> Self {
        let buffer = tap
            .as_ref()
            .map_or_else(Vec::new, |tap| vec![TAP_CENTER; tap.buffer_len()]);
        Self {
            width,
            height,
            tap,
            buffer,
        }
    }

    /// Canvas width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Canvas height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Computes the frame for `energy` at `t` seconds since the feed began.
    #[allow(clippy::cast_precision_loss)]
    pub fn frame(&mut self, energy: u8, t: f64) -> Frame {
        let style = WaveformStyle::from_energy(energy);
        let width = self.width as f64;
        let height = self.height as f64;

        if let Some(tap) = &self.tap {
            tap.read_time_domain(&mut self.buffer);
            let step = width / self.buffer.len().max(1) as f64;
            let points = self
                .buffer
                .iter()
                .enumerate()
                .map(|(i, &v)| Point {
                    x: i as f64 * step,
                    y: f64::from(v) / 128.0 * height / 2.0,
                })
                .collect();
            return Frame {
                style,
                source: FrameSource::Tap,
                points,
            };
        }

        let e = f64::from(energy);
        let speed = 5.0 + e / 10.0;
        let frequency = 0.02 + e / 2000.0;
        let amplitude = (e / 2.0) * (t * 0.5).sin();
        let points = (0..self.width)
            .map(|x| {
                let x = x as f64;
                Point {
                    x,
                    y: x.mul_add(frequency, t * speed).sin().mul_add(amplitude, height / 2.0),
                }
            })
            .collect();

        Frame {
            style,
            source: FrameSource::Synthetic,
            points,
        }
    }

    /// Emits a frame to `sink` every `interval` while the session plays.
    ///
    /// Returns when `cancel` fires or the snapshot sender is dropped.
    pub async fn run<F>(
        mut self,
        mut snapshots: watch::Receiver<SessionSnapshot>,
        interval: Duration,
        cancel: CancellationToken,
        mut sink: F,
    ) where
        F: FnMut(&SessionSnapshot, &Frame) + Send,
    {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let snapshot = snapshots.borrow().clone();
                    if !snapshot.is_playing {
                        continue;
                    }
                    let frame = self.frame(snapshot.energy, started.elapsed().as_secs_f64());
                    sink(&snapshot, &frame);
                }
            }
        }

        debug!("visualizer stopped");
    }
}

/// Rasterizes `frame` (drawn on a `width` x `height` canvas) into a
/// `cols` x `rows` block of text.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn render_ascii(frame: &Frame, width: usize, height: usize, cols: usize, rows: usize) -> String {
    if cols == 0 || rows == 0 {
        return String::new();
    }

    let mut grid = vec![vec![' '; cols]; rows];
    let mark = if frame.style.line_width >= 4.0 {
        '#'
    } else if frame.style.line_width >= 3.0 {
        '*'
    } else {
        '.'
    };

    let sx = cols as f64 / width.max(1) as f64;
    let sy = rows as f64 / height.max(1) as f64;
    for point in &frame.points {
        let col = ((point.x * sx).floor().max(0.0) as usize).min(cols - 1);
        let row = ((point.y * sy).floor().max(0.0) as usize).min(rows - 1);
        grid[row][col] = mark;
    }

    grid.into_iter()
        .map(|row| row.into_iter().collect::<String>().trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
