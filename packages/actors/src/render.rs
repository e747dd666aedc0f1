//! Collaborators the engine drives but does not implement.

use futures_util::future::BoxFuture;
use sampler_core::{Job, JobItem};

/// Why a single render did not produce an image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The item itself failed; recorded on the item, the job carries on.
    #[error("{0}")]
    Failed(String),

    /// The render engine could not be reached; the item is retried.
    #[error("render engine unavailable: {0}")]
    Unavailable(String),
}

/// Result type for a single render.
pub type RenderResult = Result<(), RenderError>;

/// Executes items against the external render engine.
///
/// Futures are `'static`, so implementations clone whatever they need from
/// the borrowed job and item.
pub trait RenderExecutor: Send + Sync + 'static {
    /// Cheap reachability check used before a job starts or resumes.
    fn is_available(&self) -> BoxFuture<'static, bool>;

    /// Render one item of `job`.
    fn render(&self, job: &Job, item: &JobItem) -> BoxFuture<'static, RenderResult>;
}

/// Removes previously rendered output before a checkpoint is sampled again.
pub trait OutputCleaner: Send + Sync + 'static {
    /// Clear everything rendered for one checkpoint and return the removed
    /// keys.
    fn clear_checkpoint(
        &self,
        training_run: &str,
        checkpoint_filename: &str,
    ) -> BoxFuture<'static, Result<Vec<String>, String>>;
}

impl OutputCleaner for storage::Storage {
    fn clear_checkpoint(
        &self,
        training_run: &str,
        checkpoint_filename: &str,
    ) -> BoxFuture<'static, Result<Vec<String>, String>> {
        let storage = self.clone();
        let training_run = training_run.to_string();
        let checkpoint_filename = checkpoint_filename.to_string();
        Box::pin(async move {
            storage
                .clear_checkpoint_output(&training_run, &checkpoint_filename)
                .await
                .map_err(|e| e.to_string())
        })
    }
}
