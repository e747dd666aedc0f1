//! Worker actor that renders the items of one job run.
//!
//! A worker processes one item at a time: it claims the next pending item
//! from the engine, renders it and reports the outcome. It never writes to
//! the store itself.

use std::sync::Arc;

use ractor::{Actor, ActorProcessingErr, ActorRef};
use sampler_core::{Job, JobItem};
use tokio_util::sync::CancellationToken;

use crate::config::BackoffConfig;
use crate::messages::{EngineMessage, ItemOutcome, WorkerMessage};
use crate::render::{RenderError, RenderExecutor};

/// Worker actor arguments.
pub struct WorkerArgs {
    pub job: Job,
    pub run_id: u64,
    pub engine: ActorRef<EngineMessage>,
    pub executor: Arc<dyn RenderExecutor>,
    pub cancel: CancellationToken,
    pub max_unavailable_retries: u32,
    pub backoff: BackoffConfig,
}

/// State for the worker actor.
pub struct WorkerState {
    job: Job,
    run_id: u64,
    engine: ActorRef<EngineMessage>,
    executor: Arc<dyn RenderExecutor>,
    cancel: CancellationToken,
    max_unavailable_retries: u32,
    backoff: BackoffConfig,
    /// Consecutive renders that found the render engine unreachable.
    unavailable_streak: u32,
}

impl WorkerState {
    async fn claim(&self) -> Option<JobItem> {
        let (tx, rx) = ractor::concurrency::oneshot();
        let sent = self.engine.send_message(EngineMessage::ClaimItem {
            job_id: self.job.id,
            run_id: self.run_id,
            reply: tx.into(),
        });
        if sent.is_err() {
            tracing::debug!(job_id = %self.job.id, "Engine gone, worker has nothing to claim");
            return None;
        }
        rx.await.ok().flatten()
    }

    fn report(&self, item: &JobItem, outcome: ItemOutcome) -> Result<(), ActorProcessingErr> {
        self.engine.send_message(EngineMessage::ItemFinished {
            job_id: self.job.id,
            run_id: self.run_id,
            item_id: item.id,
            outcome,
        })?;
        Ok(())
    }
}

/// Worker actor for a single run of a job.
pub struct JobWorker;

impl Actor for JobWorker {
    type Msg = WorkerMessage;
    type State = WorkerState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!(job_id = %args.job.id, run_id = args.run_id, "Starting job worker");

        Ok(WorkerState {
            job: args.job,
            run_id: args.run_id,
            engine: args.engine,
            executor: args.executor,
            cancel: args.cancel,
            max_unavailable_retries: args.max_unavailable_retries,
            backoff: args.backoff,
            unavailable_streak: 0,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Next => {
                if state.cancel.is_cancelled() {
                    myself.stop(None);
                    return Ok(());
                }

                let Some(item) = state.claim().await else {
                    myself.stop(None);
                    return Ok(());
                };

                let render = state.executor.render(&state.job, &item);
                let result = tokio::select! {
                    biased;
                    _ = state.cancel.cancelled() => {
                        // Abandoned mid-render; the item is still pending.
                        tracing::debug!(
                            job_id = %state.job.id,
                            item_id = %item.id,
                            "Render cancelled"
                        );
                        myself.stop(None);
                        return Ok(());
                    }
                    result = render => result,
                };

                match result {
                    Ok(()) => {
                        state.unavailable_streak = 0;
                        state.report(&item, ItemOutcome::Completed)?;
                    }
                    Err(RenderError::Failed(message)) => {
                        state.unavailable_streak = 0;
                        tracing::warn!(
                            job_id = %state.job.id,
                            item_id = %item.id,
                            checkpoint = %item.checkpoint.filename,
                            "Render failed: {}",
                            message
                        );
                        state.report(&item, ItemOutcome::Failed(message))?;
                    }
                    Err(RenderError::Unavailable(message)) => {
                        state.unavailable_streak += 1;

                        if state.unavailable_streak >= state.max_unavailable_retries {
                            state.engine.send_message(EngineMessage::WorkerFault {
                                job_id: state.job.id,
                                run_id: state.run_id,
                                reason: format!(
                                    "render engine unavailable after {} attempts: {}",
                                    state.unavailable_streak, message
                                ),
                            })?;
                            myself.stop(None);
                            return Ok(());
                        }

                        let delay = state.backoff.delay_for(state.unavailable_streak);
                        tracing::warn!(
                            job_id = %state.job.id,
                            attempt = state.unavailable_streak,
                            "Render engine unavailable, retrying in {:?}: {}",
                            delay,
                            message
                        );

                        tokio::select! {
                            biased;
                            _ = state.cancel.cancelled() => {
                                myself.stop(None);
                                return Ok(());
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }

                myself.send_message(WorkerMessage::Next)?;
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::debug!(job_id = %state.job.id, run_id = state.run_id, "Job worker stopped");
        Ok(())
    }
}
