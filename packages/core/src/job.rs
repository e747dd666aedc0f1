//! Job domain types for sampling runs over a training run's checkpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::PresetId;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current status of a job in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, waiting for an operator to start it.
    #[default]
    Pending,
    /// A worker is processing the job's pending items.
    Running,
    /// Paused by an operator; pending items are kept.
    Stopped,
    /// Every item completed successfully.
    Completed,
    /// Every item was processed and at least one failed.
    CompletedWithErrors,
    /// The run was aborted by an engine-level fault.
    Failed,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::CompletedWithErrors | JobStatus::Failed
        )
    }

    /// Check if the job may transition to running through `start`.
    pub fn can_start(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Stopped)
    }

    /// Check if the job may transition to running through `resume`.
    pub fn can_resume(&self) -> bool {
        matches!(self, JobStatus::Stopped)
    }

    /// Check if the job may transition to stopped.
    pub fn can_stop(&self) -> bool {
        matches!(self, JobStatus::Running)
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Stopped => "stopped",
            JobStatus::Completed => "completed",
            JobStatus::CompletedWithErrors => "completed_with_errors",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional model overrides applied on top of the workflow defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vae: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<f64>,
}

/// A job samples every checkpoint of a training run with a fixed preset,
/// workflow and override configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Name of the training run whose checkpoints are sampled.
    pub training_run: String,
    /// Preset whose axes were expanded into items.
    pub preset_id: PresetId,
    /// Render-engine workflow used for every item.
    pub workflow_name: String,
    #[serde(default)]
    pub overrides: ModelOverrides,
    /// Current status.
    pub status: JobStatus,
    /// Number of items created for this job.
    pub total_items: u32,
    /// Number of items that rendered successfully.
    #[serde(default)]
    pub completed_items: u32,
    /// Engine-level failure reason, set when the job ends `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        training_run: impl Into<String>,
        preset_id: PresetId,
        workflow_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            training_run: training_run.into(),
            preset_id,
            workflow_name: workflow_name.into(),
            overrides: ModelOverrides::default(),
            status: JobStatus::Pending,
            total_items: 0,
            completed_items: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the model overrides for this job.
    pub fn with_overrides(mut self, overrides: ModelOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Move the job to a new status and bump `updated_at`.
    pub fn transition(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
