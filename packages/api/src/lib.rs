//! Service API for the checkpoint sampler.
//!
//! This crate wires the store, output storage, event hub and job engine
//! together behind [`Sampler`], and exposes:
//! - Job management (create, start, stop, resume, delete, progress, retry)
//! - Preset management (create, get, list, delete)
//! - Real-time events (subscribe, publish)
//!
//! Errors carry their protocol status code, see [`ApiError::status_code`].

mod error;
mod events;
mod init;
mod jobs;
mod presets;

pub use error::{ApiError, ApiResult};
pub use init::{InitError, Sampler, ServiceConfig};
pub use jobs::{JobDetail, JobRequest};
pub use presets::PresetRequest;

// Re-export core types for convenience
pub use actors::{EngineConfig, RenderError, RenderExecutor, RenderResult};
pub use sampler_core::{
    Checkpoint, FailedItemDetail, FailureGroup, HubEvent, ItemStatusCounts, Job, JobId,
    JobItem, JobProgress, JobStatus, Preset, PresetId, PromptVariant,
};
