//! Per-phase layer arrangement.

use crate::phase::PhaseName;

/// Mini-notation for a silent layer.
pub const REST: &str = "~";

/// Which instruments play, and how loud, in a given phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layers {
    /// Kick pattern.
    pub kick: &'static str,
    /// Kick gain; reduced in the intro and outro.
    pub kick_gain: f64,
    /// Low-pass on the kick, intro only.
    pub kick_lpf: Option<u32>,
    /// Closed hi-hat pattern.
    pub hats: &'static str,
    /// Open hi-hat pattern.
    pub open_hat: &'static str,
    /// Snare pattern.
    pub snare: &'static str,
    /// Bassline gain.
    pub bass_gain: f64,
    /// Arpeggio gain.
    pub lead_gain: f64,
    /// Pad gain.
    pub pad_gain: f64,
}

const FULL_KICK_GAIN: f64 = 0.8;
const REDUCED_KICK_GAIN: f64 = 0.6;
const INTRO_KICK_LPF: u32 = 800;

const KICK: &str = "bd*4";
const HATS: &str = "~ hh ~ hh";
const OPEN_HAT: &str = "~ ~ oh ~";
const SNARE_ROLL: &str = "sd*8";
const SNARE_BACKBEAT: &str = "~ sd";

const BASS_GAIN: f64 = 0.6;
const LEAD_GAIN: f64 = 0.4;
const PAD_GAIN: f64 = 0.25;
const BREAKDOWN_PAD_GAIN: f64 = 0.4;

impl Layers {
    /// Arrangement for `phase`.
    #[must_use]
    pub const fn for_phase(phase: PhaseName) -> Self {
        match phase {
            PhaseName::Intro => Self {
                kick: KICK,
                kick_gain: REDUCED_KICK_GAIN,
                kick_lpf: Some(INTRO_KICK_LPF),
                hats: REST,
                open_hat: REST,
                snare: REST,
                bass_gain: 0.0,
                lead_gain: 0.0,
                pad_gain: PAD_GAIN,
            },
            PhaseName::Groove => Self {
                kick: KICK,
                kick_gain: FULL_KICK_GAIN,
                kick_lpf: None,
                hats: HATS,
                open_hat: OPEN_HAT,
                snare: REST,
                bass_gain: BASS_GAIN,
                lead_gain: 0.0,
                pad_gain: PAD_GAIN,
            },
            PhaseName::Breakdown => Self {
                kick: REST,
                kick_gain: FULL_KICK_GAIN,
                kick_lpf: None,
                hats: REST,
                open_hat: REST,
                snare: REST,
                bass_gain: 0.0,
                lead_gain: LEAD_GAIN,
                pad_gain: BREAKDOWN_PAD_GAIN,
            },
            PhaseName::BuildUp => Self {
                kick: KICK,
                kick_gain: FULL_KICK_GAIN,
                kick_lpf: None,
                hats: HATS,
                open_hat: REST,
                snare: SNARE_ROLL,
                bass_gain: BASS_GAIN,
                lead_gain: LEAD_GAIN,
                pad_gain: PAD_GAIN,
            },
            PhaseName::Drop => Self {
                kick: KICK,
                kick_gain: FULL_KICK_GAIN,
                kick_lpf: None,
                hats: HATS,
                open_hat: OPEN_HAT,
                snare: SNARE_BACKBEAT,
                bass_gain: BASS_GAIN,
                lead_gain: LEAD_GAIN,
                pad_gain: PAD_GAIN,
            },
            PhaseName::Outro => Self {
                kick: KICK,
                kick_gain: REDUCED_KICK_GAIN,
                kick_lpf: None,
                hats: REST,
                open_hat: REST,
                snare: REST,
                bass_gain: 0.0,
                lead_gain: 0.0,
                pad_gain: PAD_GAIN,
            },
        }
    }

    /// Whether the kick actually sounds.
    #[must_use]
    pub fn kick_audible(&self) -> bool {
        self.kick != REST
    }
}
