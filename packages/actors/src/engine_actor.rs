//! Engine actor: owns the job state machine.
//!
//! Every mutation of a job goes through this actor's mailbox, so checks and
//! writes never interleave. Workers only render; they ask the engine for
//! items and report back.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use db::{JobFilter, JobStore, PresetStore};
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, SupervisionEvent};
use realtime::EventHub;
use sampler_core::expansion::{expand_items, select_checkpoints};
use sampler_core::{
    Checkpoint, ExpansionError, FailedItemDetail, HubEvent, ItemId, ItemStatus, ItemStatusCounts,
    Job, JobId, JobItem, JobProgress, JobStatus, RunClock,
};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::messages::{CreateJobRequest, EngineMessage, ItemOutcome, WorkerMessage};
use crate::render::{OutputCleaner, RenderExecutor};
use crate::worker_actor::{JobWorker, WorkerArgs};

/// Arguments for spawning the engine actor.
pub struct EngineArgs<S> {
    pub store: Arc<S>,
    pub executor: Arc<dyn RenderExecutor>,
    pub cleaner: Arc<dyn OutputCleaner>,
    pub hub: Arc<EventHub>,
    pub config: EngineConfig,
}

/// The run currently processing a job.
struct ActiveRun {
    run_id: u64,
    cancel: CancellationToken,
    clock: RunClock,
    /// Checkpoint of the item being rendered.
    in_flight: Option<String>,
}

/// State for the engine actor.
pub struct EngineState<S> {
    store: Arc<S>,
    executor: Arc<dyn RenderExecutor>,
    cleaner: Arc<dyn OutputCleaner>,
    hub: Arc<EventHub>,
    config: EngineConfig,
    active: HashMap<JobId, ActiveRun>,
    /// Most recent run per job. Reports from any other run are stale.
    last_run: HashMap<JobId, u64>,
    workers: HashMap<ActorId, (JobId, u64)>,
    next_run_id: u64,
    shutdown: CancellationToken,
}

fn expansion_error(err: ExpansionError) -> EngineError {
    EngineError::InvalidInput(err.to_string())
}

impl<S: JobStore + PresetStore> EngineState<S> {
    fn new(args: EngineArgs<S>) -> Self {
        Self {
            store: args.store,
            executor: args.executor,
            cleaner: args.cleaner,
            hub: args.hub,
            config: args.config,
            active: HashMap::new(),
            last_run: HashMap::new(),
            workers: HashMap::new(),
            next_run_id: 0,
            shutdown: CancellationToken::new(),
        }
    }

    /// Jobs left `running` by a previous process have no worker; park them
    /// as `stopped` so an operator can resume them.
    async fn recover_orphaned_runs(&self) -> EngineResult<()> {
        let orphaned = self
            .store
            .list_jobs(JobFilter {
                status: Some(JobStatus::Running),
                ..Default::default()
            })
            .await?;

        for mut job in orphaned {
            tracing::warn!(job_id = %job.id, "Job was running at shutdown, marking stopped");
            job.transition(JobStatus::Stopped);
            self.store.update_job(&job).await?;
        }
        Ok(())
    }

    async fn create(&mut self, request: CreateJobRequest) -> EngineResult<Job> {
        if request.training_run.trim().is_empty() || request.checkpoints.is_empty() {
            return Err(EngineError::NotFound(format!(
                "Training run not found: {:?}",
                request.training_run
            )));
        }

        let preset = self.store.get_preset(request.preset_id).await?;

        if request.workflow_name.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "workflow name must not be empty".into(),
            ));
        }

        let selected = select_checkpoints(
            &request.checkpoints,
            request.checkpoint_filenames.as_deref(),
        )
        .map_err(expansion_error)?;

        let mut job = Job::new(request.training_run, preset.id, request.workflow_name)
            .with_overrides(request.overrides);
        let items = expand_items(job.id, &selected, &preset).map_err(expansion_error)?;
        job.total_items = u32::try_from(items.len())
            .map_err(|_| expansion_error(ExpansionError::TooLarge(items.len())))?;

        if request.clear_existing {
            for checkpoint in &selected {
                let removed = self
                    .cleaner
                    .clear_checkpoint(&job.training_run, &checkpoint.filename)
                    .await
                    .map_err(|e| {
                        EngineError::Internal(format!(
                            "failed to clear output for {}: {}",
                            checkpoint.filename, e
                        ))
                    })?;
                for path in removed {
                    self.hub.broadcast(&HubEvent::ImageRemoved { path });
                }
            }
        }

        let job = self.store.create_job(&job, &items).await?;

        tracing::info!(
            job_id = %job.id,
            training_run = %job.training_run,
            items = job.total_items,
            checkpoints = selected.len(),
            "Job created"
        );

        self.publish_progress(job.id).await;
        Ok(job)
    }

    async fn render_engine_reachable(&self) -> bool {
        tokio::time::timeout(self.config.reachability_timeout, self.executor.is_available())
            .await
            .unwrap_or(false)
    }

    /// Start or resume a job: validate, check reachability, persist `running`, spawn a
    /// worker.
    async fn begin_run(
        &mut self,
        myself: &ActorRef<EngineMessage>,
        job_id: JobId,
        resume: bool,
    ) -> EngineResult<Job> {
        let mut job = self.store.get_job(job_id).await?;

        let allowed = if resume {
            job.status.can_resume()
        } else {
            job.status.can_start()
        };
        if !allowed {
            let verb = if resume { "resume" } else { "start" };
            return Err(EngineError::InvalidState(format!(
                "cannot {} job {} while it is {}",
                verb, job_id, job.status
            )));
        }

        if !self.render_engine_reachable().await {
            return Err(EngineError::ServiceUnavailable(
                "render engine is not reachable".into(),
            ));
        }

        let counts = self.store.count_items(job_id).await?;
        let previous = job.status;
        job.transition(JobStatus::Running);
        job.completed_items = counts.completed;
        job.error_message = None;
        let job = self.store.update_job(&job).await?;

        self.next_run_id += 1;
        let run_id = self.next_run_id;
        let cancel = self.shutdown.child_token();

        let args = WorkerArgs {
            job: job.clone(),
            run_id,
            engine: myself.clone(),
            executor: self.executor.clone(),
            cancel: cancel.clone(),
            max_unavailable_retries: self.config.max_unavailable_retries,
            backoff: self.config.backoff.clone(),
        };

        let spawned = Actor::spawn_linked(None, JobWorker, args, myself.get_cell())
            .await
            .map_err(EngineError::from)
            .and_then(|(worker, _handle)| {
                worker
                    .send_message(WorkerMessage::Next)
                    .map(|()| worker)
                    .map_err(|_| EngineError::Internal("worker stopped before starting".into()))
            });

        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                cancel.cancel();
                let mut reverted = job.clone();
                reverted.transition(previous);
                if let Err(revert) = self.store.update_job(&reverted).await {
                    tracing::warn!(job_id = %job_id, "Failed to revert job status: {}", revert);
                }
                return Err(e);
            }
        };

        self.workers.insert(worker.get_id(), (job_id, run_id));
        self.last_run.insert(job_id, run_id);
        self.active.insert(
            job_id,
            ActiveRun {
                run_id,
                cancel,
                clock: RunClock::start(counts.completed),
                in_flight: None,
            },
        );

        tracing::info!(job_id = %job_id, run_id, resume, pending = counts.pending, "Job running");

        self.publish_progress(job_id).await;
        Ok(job)
    }

    async fn stop(&mut self, job_id: JobId) -> EngineResult<Job> {
        let mut job = self.store.get_job(job_id).await?;
        if !job.status.can_stop() {
            return Err(EngineError::InvalidState(format!(
                "cannot stop job {} while it is {}",
                job_id, job.status
            )));
        }

        let counts = self.store.count_items(job_id).await?;
        job.transition(JobStatus::Stopped);
        job.completed_items = counts.completed;
        let job = self.store.update_job(&job).await?;

        // The run keeps its worker until the stop is persisted.
        if let Some(run) = self.active.remove(&job_id) {
            run.cancel.cancel();
        }

        tracing::info!(job_id = %job_id, pending = counts.pending, "Job stopped");

        self.publish_progress(job_id).await;
        Ok(job)
    }

    async fn delete(&mut self, job_id: JobId) -> EngineResult<()> {
        self.store.delete_job(job_id).await?;

        if let Some(run) = self.active.remove(&job_id) {
            run.cancel.cancel();
        }
        self.last_run.remove(&job_id);

        tracing::info!(job_id = %job_id, "Job deleted");
        Ok(())
    }

    async fn progress(&self, job_id: JobId) -> EngineResult<JobProgress> {
        let job = self.store.get_job(job_id).await?;
        let items = self.store.list_items(job_id).await?;

        let run = self.active.get(&job_id);
        let in_flight = run.and_then(|r| r.in_flight.as_deref());
        let clock = run.map(|r| &r.clock);

        Ok(JobProgress::compute(&job, &items, in_flight, clock, Utc::now()))
    }

    async fn item_counts(&self, job_id: JobId) -> EngineResult<ItemStatusCounts> {
        self.store.get_job(job_id).await?;
        Ok(self.store.count_items(job_id).await?)
    }

    async fn failed_items(&self, job_id: JobId) -> EngineResult<Vec<FailedItemDetail>> {
        self.store.get_job(job_id).await?;
        let failed = self.store.failed_items(job_id).await?;
        Ok(failed.iter().filter_map(FailedItemDetail::from_item).collect())
    }

    async fn retry_failed(&mut self, job_id: JobId) -> EngineResult<Job> {
        let job = self.store.get_job(job_id).await?;
        if job.status == JobStatus::Running {
            return Err(EngineError::InvalidState(format!(
                "stop job {} before retrying its failures",
                job_id
            )));
        }

        let failed = self.store.failed_items(job_id).await?;
        if failed.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "job {} has no failed items",
                job_id
            )));
        }

        let mut checkpoints: Vec<Checkpoint> = Vec::new();
        for item in failed {
            if !checkpoints
                .iter()
                .any(|c| c.filename == item.checkpoint.filename)
            {
                checkpoints.push(item.checkpoint);
            }
        }

        let request = CreateJobRequest::new(
            job.training_run,
            checkpoints,
            job.preset_id,
            job.workflow_name,
        )
        .with_overrides(job.overrides)
        .with_clear_existing(true);

        self.create(request).await
    }

    /// Hand the next pending item to the worker of `run_id`.
    async fn claim_item(&mut self, job_id: JobId, run_id: u64) -> Option<JobItem> {
        if !self
            .active
            .get(&job_id)
            .is_some_and(|run| run.run_id == run_id)
        {
            return None;
        }

        match self.store.next_pending_item(job_id).await {
            Ok(Some(item)) => {
                let checkpoint_changed = match self.active.get_mut(&job_id) {
                    Some(run) => {
                        let changed =
                            run.in_flight.as_deref() != Some(item.checkpoint.filename.as_str());
                        run.in_flight = Some(item.checkpoint.filename.clone());
                        changed
                    }
                    None => false,
                };
                if checkpoint_changed {
                    self.publish_progress(job_id).await;
                }
                Some(item)
            }
            Ok(None) => {
                self.finish_if_done(job_id).await;
                None
            }
            Err(e) => {
                self.fail_run(job_id, run_id, format!("failed to load next item: {}", e))
                    .await;
                None
            }
        }
    }

    async fn item_finished(
        &mut self,
        job_id: JobId,
        run_id: u64,
        item_id: ItemId,
        outcome: ItemOutcome,
    ) {
        if self.last_run.get(&job_id) != Some(&run_id) {
            tracing::debug!(job_id = %job_id, run_id, "Ignoring report from a stale run");
            return;
        }

        let job = match self.store.get_job(job_id).await {
            Ok(job) => job,
            Err(e) => {
                tracing::debug!(job_id = %job_id, "Dropping item report: {}", e);
                return;
            }
        };
        let running = job.status == JobStatus::Running;

        let update = match outcome {
            ItemOutcome::Completed => Some((ItemStatus::Completed, None)),
            ItemOutcome::Failed(message) if running => Some((ItemStatus::Failed, Some(message))),
            ItemOutcome::Failed(message) => {
                tracing::debug!(
                    job_id = %job_id,
                    item_id = %item_id,
                    "Discarding failure reported after stop: {}",
                    message
                );
                None
            }
        };

        if let Some((status, error_message)) = update
            && let Err(e) = self
                .store
                .update_item_status(item_id, status, error_message)
                .await
        {
            tracing::warn!(job_id = %job_id, item_id = %item_id, "Failed to record item: {}", e);
        }

        if let Some(run) = self.active.get_mut(&job_id)
            && run.run_id == run_id
        {
            run.in_flight = None;
        }

        if running && self.finish_if_done(job_id).await {
            return;
        }

        self.sync_completed_count(job).await;
        self.publish_progress(job_id).await;
    }

    /// Keep the job's aggregate count in step with its items.
    async fn sync_completed_count(&self, mut job: Job) {
        match self.store.count_items(job.id).await {
            Ok(counts) if counts.completed != job.completed_items => {
                job.completed_items = counts.completed;
                if let Err(e) = self.store.update_job(&job).await {
                    tracing::warn!(job_id = %job.id, "Failed to update job counts: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(job_id = %job.id, "Failed to count items: {}", e),
        }
    }

    /// Move a running job with no pending items to its terminal state.
    ///
    /// Returns whether the job was finished.
    async fn finish_if_done(&mut self, job_id: JobId) -> bool {
        let finished = async {
            let mut job = self.store.get_job(job_id).await?;
            if job.status != JobStatus::Running {
                return Ok::<_, EngineError>(false);
            }

            let counts = self.store.count_items(job_id).await?;
            if !counts.is_finished() {
                return Ok(false);
            }

            let status = if counts.failed > 0 {
                JobStatus::CompletedWithErrors
            } else {
                JobStatus::Completed
            };
            job.transition(status);
            job.completed_items = counts.completed;
            self.store.update_job(&job).await?;

            tracing::info!(
                job_id = %job_id,
                status = %status,
                completed = counts.completed,
                failed = counts.failed,
                "Job finished"
            );
            Ok(true)
        }
        .await;

        match finished {
            Ok(true) => {
                if let Some(run) = self.active.remove(&job_id) {
                    run.cancel.cancel();
                }
                self.publish_progress(job_id).await;
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::warn!(job_id = %job_id, "Failed to finish job: {}", e);
                false
            }
        }
    }

    /// Engine-level fault: the run is abandoned and the job fails.
    async fn fail_run(&mut self, job_id: JobId, run_id: u64, reason: String) {
        match self.active.get(&job_id) {
            Some(run) if run.run_id == run_id => {}
            _ => return,
        }
        if let Some(run) = self.active.remove(&job_id) {
            run.cancel.cancel();
        }

        let result = async {
            let mut job = self.store.get_job(job_id).await?;
            if job.status != JobStatus::Running {
                return Ok(());
            }
            job.transition(JobStatus::Failed);
            job.error_message = Some(reason.clone());
            self.store.update_job(&job).await?;
            Ok::<_, EngineError>(())
        }
        .await;

        match result {
            Ok(()) => tracing::warn!(job_id = %job_id, run_id, "Job failed: {}", reason),
            Err(e) => tracing::warn!(job_id = %job_id, "Failed to mark job failed: {}", e),
        }

        self.publish_progress(job_id).await;
    }

    async fn publish_progress(&self, job_id: JobId) {
        match self.progress(job_id).await {
            Ok(progress) => {
                self.hub
                    .broadcast(&HubEvent::JobProgress(progress.to_event()));
            }
            Err(e) => tracing::debug!(job_id = %job_id, "No progress to publish: {}", e),
        }
    }

    /// Cancel every worker and park running jobs as `stopped`.
    async fn shutdown(&mut self) {
        self.shutdown.cancel();

        for (job_id, _run) in self.active.drain().collect::<Vec<_>>() {
            let result = async {
                let mut job = self.store.get_job(job_id).await?;
                if job.status == JobStatus::Running {
                    job.transition(JobStatus::Stopped);
                    self.store.update_job(&job).await?;
                }
                Ok::<_, EngineError>(())
            }
            .await;

            if let Err(e) = result {
                tracing::warn!(job_id = %job_id, "Failed to park job on shutdown: {}", e);
            }
        }
    }
}

/// Engine actor.
pub struct EngineActor<S> {
    _store: PhantomData<fn() -> S>,
}

impl<S> EngineActor<S> {
    pub fn new() -> Self {
        Self {
            _store: PhantomData,
        }
    }
}

impl<S> Default for EngineActor<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: JobStore + PresetStore> Actor for EngineActor<S> {
    type Msg = EngineMessage;
    type State = EngineState<S>;
    type Arguments = EngineArgs<S>;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting job engine");

        let state = EngineState::new(args);
        state.recover_orphaned_runs().await?;

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            EngineMessage::Create { request, reply } => {
                let _ = reply.send(state.create(*request).await);
            }

            EngineMessage::Start { job_id, reply } => {
                let _ = reply.send(state.begin_run(&myself, job_id, false).await);
            }

            EngineMessage::Resume { job_id, reply } => {
                let _ = reply.send(state.begin_run(&myself, job_id, true).await);
            }

            EngineMessage::Stop { job_id, reply } => {
                let _ = reply.send(state.stop(job_id).await);
            }

            EngineMessage::Delete { job_id, reply } => {
                let _ = reply.send(state.delete(job_id).await);
            }

            EngineMessage::GetProgress { job_id, reply } => {
                let _ = reply.send(state.progress(job_id).await);
            }

            EngineMessage::GetItemCounts { job_id, reply } => {
                let _ = reply.send(state.item_counts(job_id).await);
            }

            EngineMessage::GetFailedItems { job_id, reply } => {
                let _ = reply.send(state.failed_items(job_id).await);
            }

            EngineMessage::GetJob { job_id, reply } => {
                let _ = reply.send(state.store.get_job(job_id).await.map_err(EngineError::from));
            }

            EngineMessage::ListJobs { reply } => {
                let jobs = state.store.list_jobs(JobFilter::default()).await;
                let _ = reply.send(jobs.map_err(EngineError::from));
            }

            EngineMessage::RetryFailed { job_id, reply } => {
                let _ = reply.send(state.retry_failed(job_id).await);
            }

            EngineMessage::ClaimItem {
                job_id,
                run_id,
                reply,
            } => {
                let _ = reply.send(state.claim_item(job_id, run_id).await);
            }

            EngineMessage::ItemFinished {
                job_id,
                run_id,
                item_id,
                outcome,
            } => {
                state.item_finished(job_id, run_id, item_id, outcome).await;
            }

            EngineMessage::WorkerFault {
                job_id,
                run_id,
                reason,
            } => {
                state.fail_run(job_id, run_id, reason).await;
            }

            EngineMessage::Shutdown => {
                tracing::info!("Shutting down job engine");
                state.shutdown().await;
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorFailed(cell, err) => {
                if let Some((job_id, run_id)) = state.workers.remove(&cell.get_id()) {
                    tracing::warn!(job_id = %job_id, run_id, "Worker failed: {}", err);
                    state
                        .fail_run(job_id, run_id, format!("worker failed: {}", err))
                        .await;
                }
            }
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                if let Some((job_id, run_id)) = state.workers.remove(&cell.get_id()) {
                    tracing::debug!(job_id = %job_id, run_id, ?reason, "Worker exited");
                }
            }
            _ => {}
        }
        Ok(())
    }
}
