//! Pattern script generation.
//!
//! Turns the active [`Phase`] and the live [`Parameters`] into the text
//! of a declarative pattern script for the external evaluator. Generation
//! is pure: the same inputs always produce byte-identical output, and
//! nothing here can fail.
//!
//! # Layers
//!
//! | Phase | Kick | Snare | Hats | Open hat | Bass | Lead | Pad |
//! |-------|------|-------|------|----------|------|------|-----|
//! | Intro | 0.6, lpf 800 | - | - | - | 0 | 0 | 0.25 |
//! | Groove | 0.8 | - | yes | yes | 0.6 | 0 | 0.25 |
//! | Breakdown | - | - | - | - | 0 | 0.4 | 0.4 |
//! | Build-up | 0.8 | `sd*8` | yes | - | 0.6 | 0.4 | 0.25 |
//! | Drop | 0.8 | `~ sd` | yes | yes | 0.6 | 0.4 | 0.25 |
//! | Outro | 0.6 | - | - | - | 0 | 0 | 0.25 |

mod layers;

pub use layers::{Layers, REST};

use std::fmt::Write as _;

use crate::params::Parameters;
use crate::phase::Phase;

/// Drum machine bank the percussion layers play from.
pub const DRUM_BANK: &str = "tr808";

/// Script that silences the evaluator.
pub const SILENCE: &str = "stack()";

/// Returns the silence script.
#[must_use]
pub const fn silence() -> &'static str {
    SILENCE
}

/// Generates the pattern script for `phase` at the given live parameters.
#[must_use]
pub fn generate(phase: &Phase, params: &Parameters) -> String {
    let layers = Layers::for_phase(phase.name);
    let mut script = String::with_capacity(1536);

    let _ = writeln!(script);
    let _ = writeln!(script, "setcpm({}/4);", params.tempo_bpm);
    let _ = writeln!(script);

    write_percussion(&mut script, &layers);
    write_bass(&mut script, &layers, params);
    write_lead(&mut script, &layers);
    write_pad(&mut script, &layers);

    script.push_str("stack(\n  kick,\n  hats,\n  openHat,\n  snare,\n  bass,\n  lead,\n  pad\n);\n");
    script
}

fn write_percussion(script: &mut String, layers: &Layers) {
    let kick_lpf = layers
        .kick_lpf
        .map_or_else(String::new, |hz| format!(".lpf({hz})"));

    let _ = writeln!(script, "// 1. Percussion");
    let _ = writeln!(
        script,
        "const kick = s(\"{}\").bank(\"{DRUM_BANK}\").gain({}){kick_lpf};",
        layers.kick, layers.kick_gain
    );
    let _ = writeln!(
        script,
        "const hats = s(\"{}\").bank(\"{DRUM_BANK}\").gain(0.4).decay(0.1);",
        layers.hats
    );
    let _ = writeln!(
        script,
        "const openHat = s(\"{}\").bank(\"{DRUM_BANK}\").gain(0.3).decay(0.3);",
        layers.open_hat
    );
    let _ = writeln!(
        script,
        "const snare = s(\"{}\").bank(\"{DRUM_BANK}\").gain(0.4);",
        layers.snare
    );
    let _ = writeln!(script);
}

fn write_bass(script: &mut String, layers: &Layers, params: &Parameters) {
    let _ = writeln!(script, "// 2. Bassline");
    let _ = writeln!(
        script,
        "const bass = note(\"a2 a2 a2 a2 a2 a2 a2 a2\".fast(2))"
    );
    let _ = writeln!(script, "  .sound(\"sawtooth\")");
    let _ = writeln!(script, "  .lpf({})", params.cutoff_hz);
    let _ = writeln!(script, "  .resonance({})", params.resonance);
    let _ = writeln!(script, "  .gain({})", layers.bass_gain);
    let _ = writeln!(script, "  .release(0.08);");
    let _ = writeln!(script);
}

fn write_lead(script: &mut String, layers: &Layers) {
    let _ = writeln!(script, "// 3. Euphoric Arpeggio");
    let _ = writeln!(script, "const lead = note(\"a4 c5 e5 a5\").fast(4)");
    let _ = writeln!(script, "  .sound(\"sawtooth\")");
    let _ = writeln!(script, "  .lpf(sine.range(500, 3000).slow(8))");
    let _ = writeln!(script, "  .room(0.8)");
    let _ = writeln!(script, "  .delay(0.5)");
    let _ = writeln!(script, "  .gain({})", layers.lead_gain);
    let _ = writeln!(script, "  .release(0.1);");
    let _ = writeln!(script);
}

fn write_pad(script: &mut String, layers: &Layers) {
    let _ = writeln!(script, "// 4. Atmospheric Pad");
    let _ = writeln!(
        script,
        "const pad = note(\"<[a3, c4, e4] [f3, a3, c4, e4] [g3, b3, d4] [e3, g3, b3]>\")"
    );
    let _ = writeln!(script, "  .sound(\"sine\")");
    let _ = writeln!(script, "  .gain({})", layers.pad_gain);
    let _ = writeln!(script, "  .attack(2)");
    let _ = writeln!(script, "  .release(2)");
    let _ = writeln!(script, "  .room(1);");
    let _ = writeln!(script);
}
