//! Repository implementations for database operations.

mod item_repo;
mod job_repo;
mod preset_repo;

pub use item_repo::ItemRepository;
pub use job_repo::JobRepository;
pub use preset_repo::PresetRepository;

use sampler_core::{
    ItemId, ItemStatus, ItemStatusCounts, Job, JobId, JobItem, Preset, PresetId,
};

use crate::store::{JobFilter, JobStore, PresetStore};
use crate::{Database, DbConfig, DbError};

/// SurrealDB-backed store combining the job, item and preset repositories.
#[derive(Clone)]
pub struct SurrealStore {
    jobs: JobRepository,
    items: ItemRepository,
    presets: PresetRepository,
}

impl SurrealStore {
    pub fn new(db: Database) -> Self {
        Self {
            jobs: JobRepository::new(db.clone()),
            items: ItemRepository::new(db.clone()),
            presets: PresetRepository::new(db),
        }
    }

    /// Connect with the given configuration and make sure the schema exists.
    pub async fn open(config: &DbConfig) -> Result<Self, DbError> {
        let db = crate::init(config).await?;
        Ok(Self::new(db))
    }

    pub fn jobs(&self) -> &JobRepository {
        &self.jobs
    }

    pub fn items(&self) -> &ItemRepository {
        &self.items
    }

    pub fn presets(&self) -> &PresetRepository {
        &self.presets
    }
}

impl JobStore for SurrealStore {
    async fn create_job(&self, job: &Job, items: &[JobItem]) -> Result<Job, DbError> {
        self.jobs.create_with_items(job, items).await
    }

    async fn get_job(&self, id: JobId) -> Result<Job, DbError> {
        self.jobs.get(id).await
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, DbError> {
        self.jobs.list(filter).await
    }

    async fn update_job(&self, job: &Job) -> Result<Job, DbError> {
        self.jobs.update(job).await
    }

    async fn delete_job(&self, id: JobId) -> Result<(), DbError> {
        self.jobs.delete_with_items(id).await
    }

    async fn list_items(&self, job_id: JobId) -> Result<Vec<JobItem>, DbError> {
        self.items.list_for_job(job_id).await
    }

    async fn next_pending_item(&self, job_id: JobId) -> Result<Option<JobItem>, DbError> {
        self.items.next_pending(job_id).await
    }

    async fn update_item_status(
        &self,
        item_id: ItemId,
        status: ItemStatus,
        error_message: Option<String>,
    ) -> Result<JobItem, DbError> {
        self.items.update_status(item_id, status, error_message).await
    }

    async fn count_items(&self, job_id: JobId) -> Result<ItemStatusCounts, DbError> {
        self.items.count_by_status(job_id).await
    }

    async fn failed_items(&self, job_id: JobId) -> Result<Vec<JobItem>, DbError> {
        self.items.list_failed(job_id).await
    }
}

impl PresetStore for SurrealStore {
    async fn create_preset(&self, preset: &Preset) -> Result<Preset, DbError> {
        self.presets.create(preset).await
    }

    async fn get_preset(&self, id: PresetId) -> Result<Preset, DbError> {
        self.presets.get(id).await
    }

    async fn list_presets(&self) -> Result<Vec<Preset>, DbError> {
        self.presets.list().await
    }

    async fn delete_preset(&self, id: PresetId) -> Result<(), DbError> {
        self.presets.delete(id).await
    }
}
