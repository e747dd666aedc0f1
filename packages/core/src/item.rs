//! Job items: one checkpoint rendered with one parameter combination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::JobId;

/// Unique identifier for a job item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Ulid);

impl ItemId {
    /// Create a new unique item ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse an item ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A saved model snapshot discovered inside a training run directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checkpoint {
    /// File name, e.g. `my-lora-000100.safetensors`.
    pub filename: String,
    /// Training step, when it could be derived from the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u64>,
}

impl Checkpoint {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            step: None,
        }
    }

    pub fn with_step(mut self, step: u64) -> Self {
        self.step = Some(step);
        self
    }

    /// File name without its extension; used as the output directory name.
    pub fn stem(&self) -> &str {
        checkpoint_stem(&self.filename)
    }
}

/// Strip the extension from a checkpoint file name.
pub fn checkpoint_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Processing status of a single item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }

    /// Whether the item has been processed, successfully or not.
    pub fn is_done(&self) -> bool {
        !matches!(self, ItemStatus::Pending)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One combination of the preset axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleParams {
    pub prompt_name: String,
    pub prompt_text: String,
    pub steps: u32,
    pub cfg: f64,
    pub sampler: String,
    pub scheduler: String,
    pub seed: i64,
}

/// A unit of render work: one checkpoint with one parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    pub id: ItemId,
    /// Owning job.
    pub job_id: JobId,
    /// Position in the expansion order.
    pub seq: u32,
    pub checkpoint: Checkpoint,
    pub params: SampleParams,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobItem {
    /// Create a new pending item.
    pub fn new(job_id: JobId, seq: u32, checkpoint: Checkpoint, params: SampleParams) -> Self {
        let now = Utc::now();
        Self {
            id: ItemId::new(),
            job_id,
            seq,
            checkpoint,
            params,
            status: ItemStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Derived tally of item statuses for one job. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatusCounts {
    pub pending: u32,
    pub completed: u32,
    pub failed: u32,
}

impl ItemStatusCounts {
    /// Tally the statuses of the given items.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a JobItem>) -> Self {
        let mut counts = Self::default();
        for item in items {
            counts.add(item.status, 1);
        }
        counts
    }

    /// Add `n` items of the given status.
    pub fn add(&mut self, status: ItemStatus, n: u32) {
        match status {
            ItemStatus::Pending => self.pending += n,
            ItemStatus::Completed => self.completed += n,
            ItemStatus::Failed => self.failed += n,
        }
    }

    pub fn total(&self) -> u32 {
        self.pending + self.completed + self.failed
    }

    /// Items that have been processed, successfully or not.
    pub fn processed(&self) -> u32 {
        self.completed + self.failed
    }

    /// True once no item is left pending.
    pub fn is_finished(&self) -> bool {
        self.pending == 0
    }
}
