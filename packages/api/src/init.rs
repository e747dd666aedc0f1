//! Service initialization for the checkpoint sampler.

use std::sync::Arc;

use actors::{EngineArgs, EngineConfig, JobEngine, RenderExecutor, start_engine};
use db::{DbConfig, DbError, SurrealStore};
use realtime::{DEFAULT_BUFFER, EventHub};
use storage::{Storage, StorageConfig, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to start job engine: {0}")]
    Engine(#[from] actors::SpawnErr),
}

/// Everything needed to bring the service up.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub db: DbConfig,
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    /// Per-subscriber event queue size.
    pub subscriber_buffer: usize,
}

impl ServiceConfig {
    /// In-memory database and storage, default engine tuning.
    pub fn memory() -> Self {
        Self {
            db: DbConfig::memory(),
            storage: StorageConfig::memory(),
            engine: EngineConfig::default(),
            subscriber_buffer: DEFAULT_BUFFER,
        }
    }

    /// Build a config from environment variables.
    ///
    /// - `SAMPLER_DB_ENDPOINT`: SurrealDB endpoint. Defaults to file storage
    ///   under `./data/surrealdb` on Railway and to `mem://` elsewhere.
    /// - `SAMPLER_SUBSCRIBER_BUFFER`: per-subscriber queue size
    /// - output storage variables, see [`StorageConfig::from_env`]
    pub fn from_env() -> Result<Self, InitError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, InitError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let db = match var("SAMPLER_DB_ENDPOINT") {
            Some(endpoint) => DbConfig::default().with_endpoint(endpoint),
            // Railway deployment - use file-based storage
            None if lookup("RAILWAY_ENVIRONMENT").is_some() => DbConfig::file("./data/surrealdb"),
            None => DbConfig::memory(),
        };

        let subscriber_buffer = match var("SAMPLER_SUBSCRIBER_BUFFER") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    InitError::Config(format!(
                        "SAMPLER_SUBSCRIBER_BUFFER must be a positive integer, got {raw:?}"
                    ))
                })?,
            None => DEFAULT_BUFFER,
        };

        Ok(Self {
            db,
            storage: StorageConfig::from_lookup(&lookup)?,
            engine: EngineConfig::default(),
            subscriber_buffer,
        })
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Handle to a running sampler service.
///
/// Cloning is cheap; every clone talks to the same engine and hub.
#[derive(Clone)]
pub struct Sampler {
    pub(crate) engine: JobEngine,
    pub(crate) store: Arc<SurrealStore>,
    pub(crate) storage: Storage,
    pub(crate) hub: Arc<EventHub>,
    pub(crate) subscriber_buffer: usize,
}

impl Sampler {
    /// Connect the database and storage, then start the job engine.
    ///
    /// Jobs left running by a previous process come back as stopped.
    pub async fn start(
        config: ServiceConfig,
        executor: Arc<dyn RenderExecutor>,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), InitError> {
        tracing::info!("Initializing checkpoint sampler...");

        let store = Arc::new(SurrealStore::open(&config.db).await?);
        let storage = Storage::new(config.storage).await?;
        let hub = Arc::new(EventHub::new());

        let (engine, handle) = start_engine(EngineArgs {
            store: store.clone(),
            executor,
            cleaner: Arc::new(storage.clone()),
            hub: hub.clone(),
            config: config.engine,
        })
        .await?;

        tracing::info!(
            storage = storage.kind_str(),
            "Checkpoint sampler initialized"
        );

        Ok((
            Self {
                engine,
                store,
                storage,
                hub,
                subscriber_buffer: config.subscriber_buffer,
            },
            handle,
        ))
    }

    pub fn engine(&self) -> &JobEngine {
        &self.engine
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Stop the engine. Running jobs are left `stopped`.
    pub fn shutdown(&self) -> Result<(), crate::ApiError> {
        tracing::info!("Shutting down checkpoint sampler");
        Ok(self.engine.shutdown()?)
    }
}
