//! Evaluator that writes scripts to an async writer.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::debug;

use super::{AudioEvaluator, ContextState, Result, SampleMap};

/// Line written between consecutive scripts.
pub const SCRIPT_SEPARATOR: &str = "// ----";

/// Streams every dispatched script to a writer, typically stdout.
///
/// The context starts suspended and `resume` only flips the flag, so the
/// session's start sequence runs exactly as it would against a real
/// engine.
pub struct WriterEvaluator<W> {
    writer: Mutex<BufWriter<W>>,
    running: AtomicBool,
}

impl WriterEvaluator<tokio::io::Stdout> {
    /// Evaluator writing to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> WriterEvaluator<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            running: AtomicBool::new(false),
        }
    }

    /// Unwraps the underlying writer. Buffered output not yet flushed is lost.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().into_inner()
    }

    async fn write_block(&self, text: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        if !text.ends_with('\n') {
            writer.write_all(b"\n").await?;
        }
        writer.write_all(SCRIPT_SEPARATOR.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

impl<W> std::fmt::Debug for WriterEvaluator<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterEvaluator")
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> AudioEvaluator for WriterEvaluator<W> {
    async fn evaluate(&self, script: &str) -> Result<()> {
        self.write_block(script).await
    }

    fn context_state(&self) -> ContextState {
        if self.running.load(Ordering::Acquire) {
            ContextState::Running
        } else {
            ContextState::Suspended
        }
    }

    async fn resume(&self) -> Result<()> {
        self.running.store(true, Ordering::Release);
        debug!("writer evaluator resumed");
        Ok(())
    }

    async fn register_samples(&self, samples: &SampleMap) -> Result<()> {
        self.write_block(&samples.to_script()).await
    }

    fn name(&self) -> &'static str {
        "writer"
    }
}
