//! Actor system for the job engine.
//!
//! This crate provides the Ractor-based actors that run sampling jobs.
//!
//! # Architecture
//!
//! - `EngineActor` - Owns every job's state machine; all mutations are
//!   serialized through its mailbox
//! - `JobWorker` - One per running job; claims, renders and reports items
//! - `JobEngine` - Cloneable request/reply handle over the engine actor
//!
//! # Usage
//!
//! ```ignore
//! use actors::{EngineArgs, EngineConfig, start_engine};
//!
//! let (engine, handle) = start_engine(EngineArgs {
//!     store, executor, cleaner, hub,
//!     config: EngineConfig::default(),
//! }).await?;
//!
//! let job = engine.create(request).await?;
//! engine.start(job.id).await?;
//! ```

mod config;
mod engine;
mod engine_actor;
mod error;
mod messages;
mod render;
mod worker_actor;

pub use config::{BackoffConfig, EngineConfig};
pub use engine::{JobEngine, start_engine};
pub use engine_actor::{EngineActor, EngineArgs, EngineState};
pub use error::{EngineError, EngineResult};
pub use messages::{CreateJobRequest, EngineMessage, ItemOutcome, WorkerMessage};
pub use render::{OutputCleaner, RenderError, RenderExecutor, RenderResult};
pub use worker_actor::{JobWorker, WorkerArgs, WorkerState};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, SpawnErr, concurrency};
