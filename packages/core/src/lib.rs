//! Core domain types for the checkpoint sampler.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobItem and their status enums
//! - Preset axes and their cross-product expansion into items
//! - Derived progress, ETA and failure views
//! - Events for real-time updates

mod events;
pub mod expansion;
mod item;
mod job;
mod preset;
pub mod progress;

pub use events::{HubEvent, JobProgressEvent};
pub use expansion::{ExpansionError, MAX_JOB_ITEMS};
pub use item::{
    Checkpoint, ItemId, ItemStatus, ItemStatusCounts, JobItem, SampleParams, checkpoint_stem,
};
pub use job::{Job, JobId, JobStatus, ModelOverrides};
pub use preset::{Preset, PresetId, PromptVariant};
pub use progress::{
    CheckpointProgress, FailedItemDetail, FailureGroup, JobProgress, RunClock, group_failures,
};
