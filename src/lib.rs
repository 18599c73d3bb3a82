//! `tranceloop`: generative trance session driver
//!
//! Cycles through the phases of a trance arc, regenerates a declarative
//! pattern script for the active phase and live controls, and keeps a
//! bar-accurate clock running while tempo changes mid-performance.
//!
//! - [`phase`]: the cyclic phase table
//! - [`pattern`]: pure script generation
//! - [`scheduler`]: the bar clock and its resync
//! - [`session`]: the session task and its handle
//! - [`visualizer`]: waveform frames from energy or an output tap

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod evaluator;
pub mod observability;
pub mod params;
pub mod pattern;
pub mod phase;
pub mod scheduler;
pub mod session;
pub mod visualizer;
