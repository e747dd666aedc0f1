//! Job management operations.

use actors::CreateJobRequest;
use sampler_core::{
    Checkpoint, FailedItemDetail, FailureGroup, ItemStatusCounts, Job, JobId, JobProgress,
    ModelOverrides, PresetId, group_failures,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::init::Sampler;

/// Request type for creating a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub training_run: String,
    /// Checkpoints discovered for the training run.
    pub checkpoints: Vec<Checkpoint>,
    #[serde(rename = "presetID")]
    pub preset_id: String,
    pub workflow_name: String,
    #[serde(default)]
    pub vae: Option<String>,
    #[serde(default)]
    pub clip: Option<String>,
    #[serde(default)]
    pub shift: Option<f64>,
    /// Only sample these checkpoint files.
    #[serde(default)]
    pub checkpoint_filenames: Option<Vec<String>>,
    #[serde(default)]
    pub clear_existing: bool,
}

impl JobRequest {
    fn into_engine_request(self) -> ApiResult<CreateJobRequest> {
        let preset_id = PresetId::parse(&self.preset_id)
            .map_err(|e| ApiError::invalid_id("preset", &self.preset_id, e))?;

        let overrides = ModelOverrides {
            vae: self.vae,
            clip: self.clip,
            shift: self.shift,
        };

        let mut request = CreateJobRequest::new(
            self.training_run,
            self.checkpoints,
            preset_id,
            self.workflow_name,
        )
        .with_overrides(overrides)
        .with_clear_existing(self.clear_existing);
        if let Some(filenames) = self.checkpoint_filenames {
            request = request.with_checkpoint_filenames(filenames);
        }
        Ok(request)
    }
}

/// A job with its live progress and grouped failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub job: Job,
    pub progress: JobProgress,
    pub failures: Vec<FailureGroup>,
}

pub(crate) fn parse_job_id(id: &str) -> ApiResult<JobId> {
    JobId::parse(id).map_err(|e| ApiError::invalid_id("job", id, e))
}

impl Sampler {
    /// Create a pending job.
    pub async fn create_job(&self, request: JobRequest) -> ApiResult<Job> {
        let request = request.into_engine_request()?;
        Ok(self.engine.create(request).await?)
    }

    pub async fn start_job(&self, id: &str) -> ApiResult<Job> {
        let job_id = parse_job_id(id)?;
        Ok(self.engine.start(job_id).await?)
    }

    pub async fn stop_job(&self, id: &str) -> ApiResult<Job> {
        let job_id = parse_job_id(id)?;
        Ok(self.engine.stop(job_id).await?)
    }

    pub async fn resume_job(&self, id: &str) -> ApiResult<Job> {
        let job_id = parse_job_id(id)?;
        Ok(self.engine.resume(job_id).await?)
    }

    pub async fn delete_job(&self, id: &str) -> ApiResult<()> {
        let job_id = parse_job_id(id)?;
        Ok(self.engine.delete(job_id).await?)
    }

    pub async fn get_job(&self, id: &str) -> ApiResult<Job> {
        let job_id = parse_job_id(id)?;
        Ok(self.engine.get(job_id).await?)
    }

    /// List all jobs, newest first.
    pub async fn list_jobs(&self) -> ApiResult<Vec<Job>> {
        Ok(self.engine.list().await?)
    }

    pub async fn job_progress(&self, id: &str) -> ApiResult<JobProgress> {
        let job_id = parse_job_id(id)?;
        Ok(self.engine.progress(job_id).await?)
    }

    pub async fn item_counts(&self, id: &str) -> ApiResult<ItemStatusCounts> {
        let job_id = parse_job_id(id)?;
        Ok(self.engine.item_counts(job_id).await?)
    }

    pub async fn failed_items(&self, id: &str) -> ApiResult<Vec<FailedItemDetail>> {
        let job_id = parse_job_id(id)?;
        Ok(self.engine.failed_items(job_id).await?)
    }

    /// Job, progress and failures grouped by error message.
    pub async fn job_detail(&self, id: &str) -> ApiResult<JobDetail> {
        let job_id = parse_job_id(id)?;
        let job = self.engine.get(job_id).await?;
        let progress = self.engine.progress(job_id).await?;
        let failed = self.engine.failed_items(job_id).await?;

        Ok(JobDetail {
            job,
            progress,
            failures: group_failures(&failed),
        })
    }

    /// Create a new job that re-samples the checkpoints with failures.
    pub async fn retry_failed(&self, id: &str) -> ApiResult<Job> {
        let job_id = parse_job_id(id)?;
        Ok(self.engine.retry_failed(job_id).await?)
    }
}
