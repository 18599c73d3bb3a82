//! Sample registration map.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Drum bank registered by default.
pub const DEFAULT_BANK: &str = "tr808";

/// Local sample root used by default.
pub const DEFAULT_BASE: &str = "samples/";

/// Remote pack loaded for the synth and pad sounds.
pub const DEFAULT_REMOTE: &str = "github:tidalcycles/Dirt-Samples";

/// `bank -> name -> path` mapping, a base path and remote packs.
///
/// Handed to the evaluator once, when the session task starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SampleMap {
    /// Prefix prepended to every relative path.
    pub base: String,
    /// Named banks of sample files.
    pub banks: IndexMap<String, IndexMap<String, String>>,
    /// Remote sample packs.
    pub remote: Vec<String>,
}

impl Default for SampleMap {
    fn default() -> Self {
        let tr808 = [
            ("bd", "808/BD.wav"),
            ("sd", "808/SD.wav"),
            ("hh", "808/CH.wav"),
            ("oh", "808/OH.wav"),
        ]
        .into_iter()
        .map(|(name, path)| (name.to_string(), path.to_string()))
        .collect();

        Self {
            base: DEFAULT_BASE.to_string(),
            banks: IndexMap::from([(DEFAULT_BANK.to_string(), tr808)]),
            remote: vec![DEFAULT_REMOTE.to_string()],
        }
    }
}

impl SampleMap {
    /// Total number of mapped samples across all banks.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.banks.values().map(IndexMap::len).sum()
    }

    /// Renders the map as `samples(...)` registration calls.
    ///
    /// Local banks come first, remote packs after, one call per line.
    #[must_use]
    pub fn to_script(&self) -> String {
        let mut lines = Vec::with_capacity(self.banks.len() + self.remote.len());

        for (bank, entries) in &self.banks {
            let prefixed: IndexMap<String, &String> = entries
                .iter()
                .map(|(name, path)| (format!("{bank}_{name}"), path))
                .collect();
            let json = serde_json::to_string(&prefixed).unwrap_or_else(|_| "{}".to_string());
            let base = serde_json::to_string(&self.base).unwrap_or_else(|_| "\"\"".to_string());
            lines.push(format!("samples({json}, {base});"));
        }

        for pack in &self.remote {
            let pack = serde_json::to_string(pack).unwrap_or_else(|_| "\"\"".to_string());
            lines.push(format!("samples({pack});"));
        }

        lines.join("\n")
    }
}
