//! Derived progress views: per-checkpoint progress, ETA and failure details.
//!
//! Nothing here is persisted. Every view is recomputed from the current item
//! state so it can never drift from the store.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{ItemId, ItemStatus, ItemStatusCounts, Job, JobId, JobItem, JobProgressEvent, JobStatus};

/// Throughput baseline for one running session of a job.
///
/// A job that is stopped and resumed starts a fresh session, so time spent
/// stopped never inflates the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunClock {
    pub started_at: DateTime<Utc>,
    /// Completed-item count when the session began.
    pub completed_at_start: u32,
}

impl RunClock {
    pub fn start(completed_so_far: u32) -> Self {
        Self {
            started_at: Utc::now(),
            completed_at_start: completed_so_far,
        }
    }

    /// `elapsed / completed * remaining`, or `None` until an item has
    /// completed during this session.
    pub fn estimate(
        &self,
        completed_now: u32,
        remaining: u32,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let completed = completed_now.saturating_sub(self.completed_at_start);
        if completed == 0 {
            return None;
        }
        let elapsed_ms = (now - self.started_at).num_milliseconds().max(0);
        let per_item_ms = elapsed_ms / i64::from(completed);
        Some(now + Duration::milliseconds(per_item_ms.saturating_mul(i64::from(remaining))))
    }
}

/// Progress within a single checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointProgress {
    pub filename: String,
    /// Items of this checkpoint that are no longer pending.
    pub processed: u32,
    pub total: u32,
}

impl CheckpointProgress {
    pub fn is_done(&self) -> bool {
        self.processed >= self.total
    }
}

/// Snapshot of a job's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_items: u32,
    pub counts: ItemStatusCounts,
    pub checkpoints_completed: u32,
    pub total_checkpoints: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_checkpoint: Option<CheckpointProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl JobProgress {
    /// Build a snapshot from the job and all of its items.
    ///
    /// `in_flight` names the checkpoint of the item currently rendering, if
    /// any. Without it a running job reports the first checkpoint that still
    /// has pending work.
    pub fn compute(
        job: &Job,
        items: &[JobItem],
        in_flight: Option<&str>,
        clock: Option<&RunClock>,
        now: DateTime<Utc>,
    ) -> Self {
        let counts = ItemStatusCounts::from_items(items);
        let per_checkpoint = checkpoint_breakdown(items);

        let checkpoints_completed = per_checkpoint.iter().filter(|c| c.is_done()).count() as u32;
        let total_checkpoints = per_checkpoint.len() as u32;

        let running = job.status == JobStatus::Running;
        let current_checkpoint = if running {
            match in_flight {
                Some(name) => per_checkpoint.iter().find(|c| c.filename == name),
                None => per_checkpoint.iter().find(|c| !c.is_done()),
            }
            .cloned()
        } else {
            None
        };

        let estimated_completion = if running {
            clock.and_then(|c| c.estimate(counts.completed, counts.pending, now))
        } else {
            None
        };

        Self {
            job_id: job.id,
            status: job.status,
            total_items: job.total_items,
            counts,
            checkpoints_completed,
            total_checkpoints,
            current_checkpoint,
            estimated_completion,
        }
    }

    /// Flatten into the wire event pushed to subscribers.
    pub fn to_event(&self) -> JobProgressEvent {
        JobProgressEvent {
            job_id: self.job_id,
            status: self.status,
            total_items: self.total_items,
            completed_items: self.counts.completed,
            failed_items: self.counts.failed,
            pending_items: self.counts.pending,
            checkpoints_completed: self.checkpoints_completed,
            total_checkpoints: self.total_checkpoints,
            current_checkpoint: self.current_checkpoint.as_ref().map(|c| c.filename.clone()),
            current_checkpoint_progress: self.current_checkpoint.as_ref().map(|c| c.processed),
            current_checkpoint_total: self.current_checkpoint.as_ref().map(|c| c.total),
            estimated_completion: self.estimated_completion,
        }
    }
}

/// Per-checkpoint tallies, in expansion order.
pub fn checkpoint_breakdown(items: &[JobItem]) -> Vec<CheckpointProgress> {
    let mut ordered: Vec<&JobItem> = items.iter().collect();
    ordered.sort_by_key(|item| item.seq);

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<CheckpointProgress> = Vec::new();
    for item in ordered {
        let slot = *index.entry(item.checkpoint.filename.as_str()).or_insert_with(|| {
            out.push(CheckpointProgress {
                filename: item.checkpoint.filename.clone(),
                processed: 0,
                total: 0,
            });
            out.len() - 1
        });
        out[slot].total += 1;
        if item.status.is_done() {
            out[slot].processed += 1;
        }
    }
    out
}

/// One failed item, for diagnostics and retry of the failed subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItemDetail {
    pub item_id: ItemId,
    pub checkpoint_filename: String,
    pub error_message: String,
}

impl FailedItemDetail {
    pub fn from_item(item: &JobItem) -> Option<Self> {
        if item.status != ItemStatus::Failed {
            return None;
        }
        Some(Self {
            item_id: item.id,
            checkpoint_filename: item.checkpoint.filename.clone(),
            error_message: item
                .error_message
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

/// Failed items sharing one error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureGroup {
    pub error_message: String,
    pub count: u32,
    /// Distinct checkpoints affected, in first-seen order.
    pub checkpoints: Vec<String>,
}

/// Group failures by identical message, ordered by first occurrence.
pub fn group_failures(details: &[FailedItemDetail]) -> Vec<FailureGroup> {
    let mut groups: Vec<FailureGroup> = Vec::new();
    for detail in details {
        let group = match groups
            .iter_mut()
            .position(|g| g.error_message == detail.error_message)
        {
            Some(i) => &mut groups[i],
            None => {
                groups.push(FailureGroup {
                    error_message: detail.error_message.clone(),
                    count: 0,
                    checkpoints: Vec::new(),
                });
                let last = groups.len() - 1;
                &mut groups[last]
            }
        };
        group.count += 1;
        if !group.checkpoints.contains(&detail.checkpoint_filename) {
            group.checkpoints.push(detail.checkpoint_filename.clone());
        }
    }
    groups
}
