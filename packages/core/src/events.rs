//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, JobStatus};

/// Events fanned out to every live subscriber.
///
/// Serialized with a `type` tag, e.g. `{"type":"image_added","path":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubEvent {
    /// First event on every subscription.
    Connected,
    /// A rendered image appeared on disk.
    ImageAdded { path: String },
    /// An image was removed, e.g. when regenerating a checkpoint.
    ImageRemoved { path: String },
    /// A new training-run directory was discovered.
    DirectoryAdded { path: String },
    /// A job's aggregate progress changed.
    JobProgress(JobProgressEvent),
}

impl HubEvent {
    /// Short name of the event kind, matching the wire tag.
    pub fn kind(&self) -> &'static str {
        match self {
            HubEvent::Connected => "connected",
            HubEvent::ImageAdded { .. } => "image_added",
            HubEvent::ImageRemoved { .. } => "image_removed",
            HubEvent::DirectoryAdded { .. } => "directory_added",
            HubEvent::JobProgress(_) => "job_progress",
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            HubEvent::JobProgress(progress) => Some(progress.job_id),
            _ => None,
        }
    }
}

/// Flat progress snapshot carried by [`HubEvent::JobProgress`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    #[serde(rename = "jobID")]
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_items: u32,
    pub completed_items: u32,
    pub failed_items: u32,
    pub pending_items: u32,
    pub checkpoints_completed: u32,
    pub total_checkpoints: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_checkpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_checkpoint_progress: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_checkpoint_total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}
