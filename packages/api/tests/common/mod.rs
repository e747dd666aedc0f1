#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use api::{
    Checkpoint, EngineConfig, Job, JobItem, JobProgress, JobRequest, JobStatus, PresetRequest,
    PromptVariant, RenderError, RenderExecutor, RenderResult, Sampler, ServiceConfig,
};
use futures_util::future::BoxFuture;

pub type TestResult = Result<(), Box<dyn Error>>;

/// Render executor with a fixed reachability and a failing checkpoint.
pub struct ScriptedExecutor {
    pub available: bool,
    pub failing_checkpoint: Option<String>,
}

impl RenderExecutor for ScriptedExecutor {
    fn is_available(&self) -> BoxFuture<'static, bool> {
        let available = self.available;
        Box::pin(async move { available })
    }

    fn render(&self, _job: &Job, item: &JobItem) -> BoxFuture<'static, RenderResult> {
        let fails = self.failing_checkpoint.as_deref() == Some(item.checkpoint.filename.as_str());
        Box::pin(async move {
            if fails {
                Err(RenderError::Failed("CUDA out of memory".into()))
            } else {
                Ok(())
            }
        })
    }
}

pub async fn start_service(executor: ScriptedExecutor) -> Result<Sampler, Box<dyn Error>> {
    let config = ServiceConfig::memory()
        .with_engine(EngineConfig::default().with_reachability_timeout(Duration::from_millis(200)));
    let (sampler, _handle) = Sampler::start(config, Arc::new(executor)).await?;
    Ok(sampler)
}

pub fn reachable() -> ScriptedExecutor {
    ScriptedExecutor {
        available: true,
        failing_checkpoint: None,
    }
}

pub fn preset_request() -> PresetRequest {
    PresetRequest {
        name: "smoke".into(),
        prompts: vec![
            PromptVariant::new("portrait", "a portrait photo"),
            PromptVariant::new("landscape", "a mountain lake"),
        ],
        steps: vec![20],
        cfgs: vec![7.0],
        samplers: vec!["euler".into()],
        schedulers: vec!["normal".into()],
        seeds: vec![42],
    }
}

pub fn job_request(preset_id: &str) -> JobRequest {
    JobRequest {
        training_run: "my-lora".into(),
        checkpoints: vec![
            Checkpoint::new("my-lora-000500.safetensors").with_step(500),
            Checkpoint::new("my-lora-001000.safetensors").with_step(1000),
        ],
        preset_id: preset_id.to_string(),
        workflow_name: "flux-dev".into(),
        vae: Some("ae.safetensors".into()),
        clip: None,
        shift: Some(3.0),
        checkpoint_filenames: None,
        clear_existing: false,
    }
}

/// Poll until the job reaches `status`.
pub async fn wait_for_status(
    sampler: &Sampler,
    id: &str,
    status: JobStatus,
) -> Result<JobProgress, Box<dyn Error>> {
    let progress = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let progress = sampler.job_progress(id).await?;
            if progress.status == status {
                return Ok::<_, api::ApiError>(progress);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| format!("job {} never reached {}", id, status))??;
    Ok(progress)
}
