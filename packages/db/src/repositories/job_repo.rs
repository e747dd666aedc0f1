//! Job repository for CRUD operations.

use chrono::{DateTime, Utc};
use sampler_core::{Job, JobId, JobItem, JobStatus, ModelOverrides, PresetId};
use serde::{Deserialize, Serialize};

use super::item_repo::ItemRecord;
use crate::schema::JOB_TABLE;
use crate::store::JobFilter;
use crate::{Database, DbError};

/// Repository for job persistence operations.
#[derive(Clone)]
pub struct JobRepository {
    db: Database,
}

/// Internal record type for SurrealDB.
///
/// The record key is the job id; it is also stored as `job_id` so that
/// queries never need to unpack a record link.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JobRecord {
    job_id: JobId,
    training_run: String,
    preset_id: PresetId,
    workflow_name: String,
    #[serde(default)]
    vae: Option<String>,
    #[serde(default)]
    clip: Option<String>,
    #[serde(default)]
    shift: Option<f64>,
    status: JobStatus,
    total_items: u32,
    #[serde(default)]
    completed_items: u32,
    #[serde(default)]
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Job> for JobRecord {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            training_run: job.training_run.clone(),
            preset_id: job.preset_id,
            workflow_name: job.workflow_name.clone(),
            vae: job.overrides.vae.clone(),
            clip: job.overrides.clip.clone(),
            shift: job.overrides.shift,
            status: job.status,
            total_items: job.total_items,
            completed_items: job.completed_items,
            error_message: job.error_message.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

impl JobRecord {
    pub(crate) fn into_job(self) -> Job {
        Job {
            id: self.job_id,
            training_run: self.training_run,
            preset_id: self.preset_id,
            workflow_name: self.workflow_name,
            overrides: ModelOverrides {
                vae: self.vae,
                clip: self.clip,
                shift: self.shift,
            },
            status: self.status,
            total_items: self.total_items,
            completed_items: self.completed_items,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl JobRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a job and its items in one transaction.
    pub async fn create_with_items(&self, job: &Job, items: &[JobItem]) -> Result<Job, DbError> {
        let records: Vec<ItemRecord> = items.iter().map(ItemRecord::from).collect();

        self.db
            .query(
                r#"
                BEGIN TRANSACTION;
                CREATE type::thing('sample_job', $job_id) CONTENT $job;
                INSERT INTO job_item $items;
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("job_id", job.id.to_string()))
            .bind(("job", JobRecord::from(job)))
            .bind(("items", records))
            .await?
            .check()?;

        tracing::debug!(job_id = %job.id, items = items.len(), "Job persisted");

        self.get(job.id).await
    }

    /// Get a job by ID.
    pub async fn get(&self, id: JobId) -> Result<Job, DbError> {
        let record: Option<JobRecord> = self.db.select((JOB_TABLE, id.to_string())).await?;

        record
            .map(JobRecord::into_job)
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))
    }

    /// List jobs with optional filtering, newest first.
    pub async fn list(&self, filter: JobFilter) -> Result<Vec<Job>, DbError> {
        let mut conditions = Vec::new();
        let mut bindings: Vec<(&str, serde_json::Value)> = Vec::new();

        if let Some(status) = &filter.status {
            conditions.push("status = $status");
            bindings.push(("status", serde_json::json!(status.as_str())));
        }

        if let Some(training_run) = &filter.training_run {
            conditions.push("training_run = $training_run");
            bindings.push(("training_run", serde_json::json!(training_run)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit_clause = filter
            .limit
            .map(|l| format!("LIMIT {}", l))
            .unwrap_or_default();

        let offset_clause = filter
            .offset
            .map(|o| format!("START {}", o))
            .unwrap_or_default();

        let query = format!(
            "SELECT * FROM sample_job {} ORDER BY created_at DESC, job_id DESC {} {}",
            where_clause, limit_clause, offset_clause
        );

        let mut result = self.db.query(&query);

        for (name, value) in bindings {
            result = result.bind((name, value));
        }

        let mut response = result.await?;
        let records: Vec<JobRecord> = response.take(0)?;

        Ok(records.into_iter().map(JobRecord::into_job).collect())
    }

    /// Update a job.
    pub async fn update(&self, job: &Job) -> Result<Job, DbError> {
        let mut updated = JobRecord::from(job);
        updated.updated_at = Utc::now();

        // Refuse to resurrect a job that was deleted concurrently.
        self.get(job.id).await?;

        let record: Option<JobRecord> = self
            .db
            .update((JOB_TABLE, job.id.to_string()))
            .content(updated)
            .await?;

        record
            .map(JobRecord::into_job)
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", job.id)))
    }

    /// Delete a job and all of its items in one transaction.
    pub async fn delete_with_items(&self, id: JobId) -> Result<(), DbError> {
        self.get(id).await?;

        self.db
            .query(
                r#"
                BEGIN TRANSACTION;
                DELETE job_item WHERE job_id = $job_id;
                DELETE type::thing('sample_job', $job_id);
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("job_id", id.to_string()))
            .await?
            .check()?;

        tracing::debug!(job_id = %id, "Job deleted with its items");

        Ok(())
    }
}
