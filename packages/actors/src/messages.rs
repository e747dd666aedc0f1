//! Message types for actor communication.

use ractor::RpcReplyPort;
use sampler_core::{
    Checkpoint, FailedItemDetail, ItemId, ItemStatusCounts, Job, JobId, JobItem, JobProgress,
    ModelOverrides, PresetId,
};

use crate::error::EngineResult;

/// Everything needed to create a job.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateJobRequest {
    pub training_run: String,
    /// Checkpoints discovered for the training run, in discovery order.
    pub checkpoints: Vec<Checkpoint>,
    pub preset_id: PresetId,
    pub workflow_name: String,
    pub overrides: ModelOverrides,
    /// Restrict the job to these checkpoint file names.
    pub checkpoint_filenames: Option<Vec<String>>,
    /// Remove prior output for every targeted checkpoint first.
    pub clear_existing: bool,
}

impl CreateJobRequest {
    pub fn new(
        training_run: impl Into<String>,
        checkpoints: Vec<Checkpoint>,
        preset_id: PresetId,
        workflow_name: impl Into<String>,
    ) -> Self {
        Self {
            training_run: training_run.into(),
            checkpoints,
            preset_id,
            workflow_name: workflow_name.into(),
            overrides: ModelOverrides::default(),
            checkpoint_filenames: None,
            clear_existing: false,
        }
    }

    pub fn with_overrides(mut self, overrides: ModelOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_checkpoint_filenames(mut self, filenames: Vec<String>) -> Self {
        self.checkpoint_filenames = Some(filenames);
        self
    }

    pub fn with_clear_existing(mut self, clear: bool) -> Self {
        self.clear_existing = clear;
        self
    }
}

/// How a single render ended, as reported by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Completed,
    Failed(String),
}

/// Messages for the engine actor.
#[derive(Debug)]
pub enum EngineMessage {
    Create {
        request: Box<CreateJobRequest>,
        reply: RpcReplyPort<EngineResult<Job>>,
    },
    Start {
        job_id: JobId,
        reply: RpcReplyPort<EngineResult<Job>>,
    },
    Stop {
        job_id: JobId,
        reply: RpcReplyPort<EngineResult<Job>>,
    },
    Resume {
        job_id: JobId,
        reply: RpcReplyPort<EngineResult<Job>>,
    },
    Delete {
        job_id: JobId,
        reply: RpcReplyPort<EngineResult<()>>,
    },
    GetProgress {
        job_id: JobId,
        reply: RpcReplyPort<EngineResult<JobProgress>>,
    },
    GetItemCounts {
        job_id: JobId,
        reply: RpcReplyPort<EngineResult<ItemStatusCounts>>,
    },
    GetFailedItems {
        job_id: JobId,
        reply: RpcReplyPort<EngineResult<Vec<FailedItemDetail>>>,
    },
    GetJob {
        job_id: JobId,
        reply: RpcReplyPort<EngineResult<Job>>,
    },
    ListJobs {
        reply: RpcReplyPort<EngineResult<Vec<Job>>>,
    },
    /// Create a new job covering the checkpoints that had failures.
    RetryFailed {
        job_id: JobId,
        reply: RpcReplyPort<EngineResult<Job>>,
    },

    /// Worker asks for the next pending item of its run.
    ClaimItem {
        job_id: JobId,
        run_id: u64,
        reply: RpcReplyPort<Option<JobItem>>,
    },
    /// Worker finished rendering an item.
    ItemFinished {
        job_id: JobId,
        run_id: u64,
        item_id: ItemId,
        outcome: ItemOutcome,
    },
    /// Worker gave up on the run.
    WorkerFault {
        job_id: JobId,
        run_id: u64,
        reason: String,
    },

    /// Cancel every worker and stop the engine.
    Shutdown,
}

/// Messages for a job worker.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Claim and render the next pending item.
    Next,
}
