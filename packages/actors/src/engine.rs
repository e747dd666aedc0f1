//! Client handle for the engine actor.

use ractor::{Actor, ActorRef, RpcReplyPort};
use sampler_core::{FailedItemDetail, ItemStatusCounts, Job, JobId, JobProgress};

use crate::engine_actor::{EngineActor, EngineArgs};
use crate::error::{EngineError, EngineResult};
use crate::messages::{CreateJobRequest, EngineMessage};

/// Cheap, cloneable handle to a running job engine.
#[derive(Clone)]
pub struct JobEngine {
    actor: ActorRef<EngineMessage>,
}

impl JobEngine {
    pub fn new(actor: ActorRef<EngineMessage>) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &ActorRef<EngineMessage> {
        &self.actor
    }

    async fn request<T: Send + 'static>(
        &self,
        build: impl FnOnce(RpcReplyPort<EngineResult<T>>) -> EngineMessage,
    ) -> EngineResult<T> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.actor
            .send_message(build(tx.into()))
            .map_err(|e| EngineError::Internal(format!("Failed to send message: {}", e)))?;

        rx.await
            .map_err(|_| EngineError::Internal("Failed to receive response".into()))?
    }

    /// Expand a preset over the given checkpoints into a new pending job.
    pub async fn create(&self, request: CreateJobRequest) -> EngineResult<Job> {
        self.request(|reply| EngineMessage::Create {
            request: Box::new(request),
            reply,
        })
        .await
    }

    pub async fn start(&self, job_id: JobId) -> EngineResult<Job> {
        self.request(|reply| EngineMessage::Start { job_id, reply }).await
    }

    pub async fn stop(&self, job_id: JobId) -> EngineResult<Job> {
        self.request(|reply| EngineMessage::Stop { job_id, reply }).await
    }

    pub async fn resume(&self, job_id: JobId) -> EngineResult<Job> {
        self.request(|reply| EngineMessage::Resume { job_id, reply }).await
    }

    /// Delete a job and all of its items, cancelling its worker first.
    pub async fn delete(&self, job_id: JobId) -> EngineResult<()> {
        self.request(|reply| EngineMessage::Delete { job_id, reply }).await
    }

    pub async fn progress(&self, job_id: JobId) -> EngineResult<JobProgress> {
        self.request(|reply| EngineMessage::GetProgress { job_id, reply }).await
    }

    pub async fn item_counts(&self, job_id: JobId) -> EngineResult<ItemStatusCounts> {
        self.request(|reply| EngineMessage::GetItemCounts { job_id, reply }).await
    }

    pub async fn failed_items(&self, job_id: JobId) -> EngineResult<Vec<FailedItemDetail>> {
        self.request(|reply| EngineMessage::GetFailedItems { job_id, reply }).await
    }

    pub async fn get(&self, job_id: JobId) -> EngineResult<Job> {
        self.request(|reply| EngineMessage::GetJob { job_id, reply }).await
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> EngineResult<Vec<Job>> {
        self.request(|reply| EngineMessage::ListJobs { reply }).await
    }

    /// Create a job that re-samples only the checkpoints with failed items.
    pub async fn retry_failed(&self, job_id: JobId) -> EngineResult<Job> {
        self.request(|reply| EngineMessage::RetryFailed { job_id, reply }).await
    }

    /// Cancel every worker and stop the engine.
    ///
    /// Running jobs are left `stopped`. Await the join handle returned by
    /// [`start_engine`] to wait for the actor to exit.
    pub fn shutdown(&self) -> EngineResult<()> {
        self.actor
            .send_message(EngineMessage::Shutdown)
            .map_err(|e| EngineError::Internal(format!("Failed to send message: {}", e)))
    }
}

/// Start the job engine.
pub async fn start_engine<S>(
    args: EngineArgs<S>,
) -> Result<(JobEngine, tokio::task::JoinHandle<()>), ractor::SpawnErr>
where
    S: db::JobStore + db::PresetStore,
{
    let (actor, handle) = Actor::spawn(None, EngineActor::<S>::new(), args).await?;

    Ok((JobEngine::new(actor), handle))
}
