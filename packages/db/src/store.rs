//! Storage traits implemented by every persistence backend.
//!
//! The engine only ever talks to these traits, so the SurrealDB backend and
//! the in-process [`MemoryStore`](crate::MemoryStore) are interchangeable.

use std::future::Future;

use sampler_core::{
    ItemId, ItemStatus, ItemStatusCounts, Job, JobId, JobItem, JobStatus, Preset, PresetId,
};

use crate::DbError;

/// Filter options for listing jobs.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub training_run: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        self.status.is_none_or(|s| s == job.status)
            && self
                .training_run
                .as_deref()
                .is_none_or(|run| run == job.training_run)
    }
}

/// Persistence for jobs and their items.
///
/// Every lookup by id fails with [`DbError::NotFound`] when the record is
/// missing.
pub trait JobStore: Send + Sync + 'static {
    /// Persist a job together with all of its items. Either both become
    /// visible or neither does.
    fn create_job(
        &self,
        job: &Job,
        items: &[JobItem],
    ) -> impl Future<Output = Result<Job, DbError>> + Send;

    fn get_job(&self, id: JobId) -> impl Future<Output = Result<Job, DbError>> + Send;

    /// Jobs matching the filter, newest first.
    fn list_jobs(&self, filter: JobFilter)
    -> impl Future<Output = Result<Vec<Job>, DbError>> + Send;

    /// Replace the stored job with `job`, bumping `updated_at`.
    fn update_job(&self, job: &Job) -> impl Future<Output = Result<Job, DbError>> + Send;

    /// Remove a job and all of its items.
    fn delete_job(&self, id: JobId) -> impl Future<Output = Result<(), DbError>> + Send;

    /// All items of a job in expansion order.
    fn list_items(&self, job_id: JobId)
    -> impl Future<Output = Result<Vec<JobItem>, DbError>> + Send;

    /// The lowest-sequence pending item, if any.
    fn next_pending_item(
        &self,
        job_id: JobId,
    ) -> impl Future<Output = Result<Option<JobItem>, DbError>> + Send;

    fn update_item_status(
        &self,
        item_id: ItemId,
        status: ItemStatus,
        error_message: Option<String>,
    ) -> impl Future<Output = Result<JobItem, DbError>> + Send;

    fn count_items(
        &self,
        job_id: JobId,
    ) -> impl Future<Output = Result<ItemStatusCounts, DbError>> + Send;

    /// Failed items of a job in expansion order.
    fn failed_items(
        &self,
        job_id: JobId,
    ) -> impl Future<Output = Result<Vec<JobItem>, DbError>> + Send;
}

/// Persistence for presets.
pub trait PresetStore: Send + Sync + 'static {
    fn create_preset(&self, preset: &Preset)
    -> impl Future<Output = Result<Preset, DbError>> + Send;

    fn get_preset(&self, id: PresetId) -> impl Future<Output = Result<Preset, DbError>> + Send;

    /// All presets ordered by name.
    fn list_presets(&self) -> impl Future<Output = Result<Vec<Preset>, DbError>> + Send;

    fn delete_preset(&self, id: PresetId) -> impl Future<Output = Result<(), DbError>> + Send;
}
