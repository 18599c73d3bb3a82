//! Evaluator that publishes the latest script to a watched file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{AudioEvaluator, ContextState, Result, SampleMap};

/// Replaces a file with each dispatched script.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so a watcher never observes a half-written script. Registered
/// samples are prepended to every script to keep the file self-contained.
#[derive(Debug)]
pub struct FileEvaluator {
    path: PathBuf,
    prelude: Mutex<Option<String>>,
    running: AtomicBool,
}

impl FileEvaluator {
    /// Publishes scripts to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            prelude: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Target file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl AudioEvaluator for FileEvaluator {
    async fn evaluate(&self, script: &str) -> Result<()> {
        let contents = match self.prelude.lock().await.as_deref() {
            Some(prelude) => format!("{prelude}\n{script}"),
            None => script.to_string(),
        };

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = script.len(), "script published");
        Ok(())
    }

    fn context_state(&self) -> ContextState {
        if self.running.load(Ordering::Acquire) {
            ContextState::Running
        } else {
            ContextState::Suspended
        }
    }

    async fn resume(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.running.store(true, Ordering::Release);
        info!(path = %self.path.display(), "publishing scripts to file");
        Ok(())
    }

    async fn register_samples(&self, samples: &SampleMap) -> Result<()> {
        *self.prelude.lock().await = Some(samples.to_script());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvaluatorError;

    #[tokio::test]
    async fn replaces_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live").join("pattern.js");
        let evaluator = FileEvaluator::new(&path);

        evaluator.resume().await.unwrap();
        assert_eq!(evaluator.context_state(), ContextState::Running);

        evaluator.evaluate("first").await.unwrap();
        evaluator.evaluate("second").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("live").join("pattern.js.tmp").exists());
    }

    #[tokio::test]
    async fn samples_are_prepended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pattern.js");
        let evaluator = FileEvaluator::new(&path);

        evaluator
            .register_samples(&SampleMap::default())
            .await
            .unwrap();
        evaluator.evaluate("stack()").await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("samples("));
        assert!(contents.ends_with("\nstack()"));
    }

    #[tokio::test]
    async fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let evaluator = FileEvaluator::new(dir.path().join("absent").join("pattern.js"));
        let err = evaluator.evaluate("stack()").await.unwrap_err();
        assert!(matches!(err, EvaluatorError::Io(_)));
    }
}
