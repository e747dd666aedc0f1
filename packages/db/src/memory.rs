//! In-process store used by tests and single-session tools.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sampler_core::{
    ItemId, ItemStatus, ItemStatusCounts, Job, JobId, JobItem, Preset, PresetId,
};
use tokio::sync::RwLock;

use crate::DbError;
use crate::store::{JobFilter, JobStore, PresetStore};

#[derive(Default)]
struct MemoryState {
    jobs: HashMap<JobId, Job>,
    /// Items per job, kept in sequence order.
    items: HashMap<JobId, Vec<JobItem>>,
    presets: HashMap<PresetId, Preset>,
}

/// A [`JobStore`] and [`PresetStore`] that lives entirely in memory.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn job_not_found(id: JobId) -> DbError {
    DbError::NotFound(format!("Job not found: {}", id))
}

impl JobStore for MemoryStore {
    async fn create_job(&self, job: &Job, items: &[JobItem]) -> Result<Job, DbError> {
        let mut state = self.state.write().await;
        if state.jobs.contains_key(&job.id) {
            return Err(DbError::Query(format!("Job already exists: {}", job.id)));
        }

        let mut items = items.to_vec();
        items.sort_by_key(|item| item.seq);
        state.jobs.insert(job.id, job.clone());
        state.items.insert(job.id, items);

        Ok(job.clone())
    }

    async fn get_job(&self, id: JobId) -> Result<Job, DbError> {
        let state = self.state.read().await;
        state.jobs.get(&id).cloned().ok_or_else(|| job_not_found(id))
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, DbError> {
        let state = self.state.read().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    async fn update_job(&self, job: &Job) -> Result<Job, DbError> {
        let mut state = self.state.write().await;
        let stored = state.jobs.get_mut(&job.id).ok_or_else(|| job_not_found(job.id))?;
        *stored = job.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_job(&self, id: JobId) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        state.jobs.remove(&id).ok_or_else(|| job_not_found(id))?;
        state.items.remove(&id);
        Ok(())
    }

    async fn list_items(&self, job_id: JobId) -> Result<Vec<JobItem>, DbError> {
        let state = self.state.read().await;
        Ok(state.items.get(&job_id).cloned().unwrap_or_default())
    }

    async fn next_pending_item(&self, job_id: JobId) -> Result<Option<JobItem>, DbError> {
        let state = self.state.read().await;
        Ok(state.items.get(&job_id).and_then(|items| {
            items
                .iter()
                .find(|item| item.status == ItemStatus::Pending)
                .cloned()
        }))
    }

    async fn update_item_status(
        &self,
        item_id: ItemId,
        status: ItemStatus,
        error_message: Option<String>,
    ) -> Result<JobItem, DbError> {
        let mut state = self.state.write().await;
        let item = state
            .items
            .values_mut()
            .flat_map(|items| items.iter_mut())
            .find(|item| item.id == item_id)
            .ok_or_else(|| DbError::NotFound(format!("Job item not found: {}", item_id)))?;

        item.status = status;
        item.error_message = error_message;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn count_items(&self, job_id: JobId) -> Result<ItemStatusCounts, DbError> {
        let state = self.state.read().await;
        Ok(state
            .items
            .get(&job_id)
            .map(|items| ItemStatusCounts::from_items(items))
            .unwrap_or_default())
    }

    async fn failed_items(&self, job_id: JobId) -> Result<Vec<JobItem>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .items
            .get(&job_id)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.status == ItemStatus::Failed)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl PresetStore for MemoryStore {
    async fn create_preset(&self, preset: &Preset) -> Result<Preset, DbError> {
        let mut state = self.state.write().await;
        if state.presets.contains_key(&preset.id) {
            return Err(DbError::Query(format!("Preset already exists: {}", preset.id)));
        }
        state.presets.insert(preset.id, preset.clone());
        Ok(preset.clone())
    }

    async fn get_preset(&self, id: PresetId) -> Result<Preset, DbError> {
        let state = self.state.read().await;
        state
            .presets
            .get(&id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("Preset not found: {}", id)))
    }

    async fn list_presets(&self) -> Result<Vec<Preset>, DbError> {
        let state = self.state.read().await;
        let mut presets: Vec<Preset> = state.presets.values().cloned().collect();
        presets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(presets)
    }

    async fn delete_preset(&self, id: PresetId) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        state
            .presets
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DbError::NotFound(format!("Preset not found: {}", id)))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use sampler_core::{Checkpoint, SampleParams};

    fn item(job_id: JobId, seq: u32, checkpoint: &str) -> JobItem {
        JobItem::new(
            job_id,
            seq,
            Checkpoint::new(checkpoint),
            SampleParams {
                prompt_name: "portrait".into(),
                prompt_text: "a portrait".into(),
                steps: 20,
                cfg: 7.0,
                sampler: "euler".into(),
                scheduler: "normal".into(),
                seed: 42,
            },
        )
    }

    #[tokio::test]
    async fn next_pending_follows_sequence_order() -> Result<(), DbError> {
        let store = MemoryStore::new();
        let mut job = Job::new("run", PresetId::new(), "wf");
        job.total_items = 3;
        // Inserted out of order on purpose.
        let items = vec![item(job.id, 2, "b"), item(job.id, 0, "a"), item(job.id, 1, "a")];
        store.create_job(&job, &items).await?;

        let first = store.next_pending_item(job.id).await?.map(|i| i.seq);
        assert_eq!(first, Some(0));

        let listed: Vec<u32> = store.list_items(job.id).await?.iter().map(|i| i.seq).collect();
        assert_eq!(listed, vec![0, 1, 2]);
        Ok(())
    }

    #[tokio::test]
    async fn update_of_deleted_job_is_not_found() -> Result<(), DbError> {
        let store = MemoryStore::new();
        let job = Job::new("run", PresetId::new(), "wf");
        store.create_job(&job, &[]).await?;
        store.delete_job(job.id).await?;

        let err = store.update_job(&job).await.unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }
}
