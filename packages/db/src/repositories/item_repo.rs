//! Job item repository.

use chrono::{DateTime, Utc};
use sampler_core::{
    Checkpoint, ItemId, ItemStatus, ItemStatusCounts, JobId, JobItem, SampleParams,
};
use serde::{Deserialize, Serialize};

use crate::{Database, DbError};

/// Repository for job item persistence operations.
#[derive(Clone)]
pub struct ItemRepository {
    db: Database,
}

/// Internal record type for SurrealDB.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ItemRecord {
    item_id: ItemId,
    job_id: JobId,
    seq: u32,
    checkpoint: Checkpoint,
    params: SampleParams,
    status: ItemStatus,
    #[serde(default)]
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&JobItem> for ItemRecord {
    fn from(item: &JobItem) -> Self {
        Self {
            item_id: item.id,
            job_id: item.job_id,
            seq: item.seq,
            checkpoint: item.checkpoint.clone(),
            params: item.params.clone(),
            status: item.status,
            error_message: item.error_message.clone(),
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

impl ItemRecord {
    fn into_item(self) -> JobItem {
        JobItem {
            id: self.item_id,
            job_id: self.job_id,
            seq: self.seq,
            checkpoint: self.checkpoint,
            params: self.params,
            status: self.status,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ItemRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All items of a job in expansion order.
    pub async fn list_for_job(&self, job_id: JobId) -> Result<Vec<JobItem>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM job_item WHERE job_id = $job_id ORDER BY seq ASC")
            .bind(("job_id", job_id.to_string()))
            .await?;

        let records: Vec<ItemRecord> = result.take(0)?;

        Ok(records.into_iter().map(ItemRecord::into_item).collect())
    }

    /// The lowest-sequence pending item of a job.
    pub async fn next_pending(&self, job_id: JobId) -> Result<Option<JobItem>, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                SELECT * FROM job_item
                WHERE job_id = $job_id AND status = "pending"
                ORDER BY seq ASC
                LIMIT 1
                "#,
            )
            .bind(("job_id", job_id.to_string()))
            .await?;

        let records: Vec<ItemRecord> = result.take(0)?;

        Ok(records.into_iter().next().map(ItemRecord::into_item))
    }

    /// Set an item's status and error message.
    pub async fn update_status(
        &self,
        item_id: ItemId,
        status: ItemStatus,
        error_message: Option<String>,
    ) -> Result<JobItem, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                UPDATE job_item
                SET status = $status, error_message = $error_message, updated_at = $now
                WHERE item_id = $item_id
                RETURN AFTER
                "#,
            )
            .bind(("item_id", item_id.to_string()))
            .bind(("status", status.as_str()))
            .bind(("error_message", error_message))
            .bind(("now", Utc::now()))
            .await?;

        let records: Vec<ItemRecord> = result.take(0)?;

        records
            .into_iter()
            .next()
            .map(ItemRecord::into_item)
            .ok_or_else(|| DbError::NotFound(format!("Job item not found: {}", item_id)))
    }

    /// Count a job's items by status.
    pub async fn count_by_status(&self, job_id: JobId) -> Result<ItemStatusCounts, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                SELECT status, count() AS count
                FROM job_item
                WHERE job_id = $job_id
                GROUP BY status
                "#,
            )
            .bind(("job_id", job_id.to_string()))
            .await?;

        #[derive(Deserialize)]
        struct StatusCount {
            status: ItemStatus,
            count: i64,
        }

        let rows: Vec<StatusCount> = result.take(0)?;

        let mut counts = ItemStatusCounts::default();
        for row in rows {
            let n = u32::try_from(row.count)
                .map_err(|_| DbError::Query(format!("item count out of range: {}", row.count)))?;
            counts.add(row.status, n);
        }

        Ok(counts)
    }

    /// Failed items of a job in expansion order.
    pub async fn list_failed(&self, job_id: JobId) -> Result<Vec<JobItem>, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                SELECT * FROM job_item
                WHERE job_id = $job_id AND status = "failed"
                ORDER BY seq ASC
                "#,
            )
            .bind(("job_id", job_id.to_string()))
            .await?;

        let records: Vec<ItemRecord> = result.take(0)?;

        Ok(records.into_iter().map(ItemRecord::into_item).collect())
    }
}
