#![allow(dead_code)]

use std::collections::HashSet;
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{
    BackoffConfig, CreateJobRequest, EngineArgs, EngineConfig, JobEngine, RenderError,
    RenderExecutor, RenderResult, start_engine,
};
use db::{DbError, JobFilter, JobStore, MemoryStore, PresetStore};
use futures_util::future::BoxFuture;
use realtime::{EventHub, Subscriber, SubscriberId};
use sampler_core::{
    Checkpoint, HubEvent, ItemId, ItemStatus, ItemStatusCounts, Job, JobId, JobItem, JobProgress,
    JobStatus, Preset, PresetId, PromptVariant,
};
use storage::{Storage, StorageConfig};
use tokio::sync::Semaphore;

pub type TestResult = Result<(), Box<dyn Error>>;

struct FakeInner {
    available: AtomicBool,
    unavailable: AtomicBool,
    failing_seqs: Mutex<HashSet<u32>>,
    gate: Semaphore,
    started: AtomicUsize,
    rendered: Mutex<Vec<u32>>,
}

/// Render executor whose behaviour is scripted by the test.
#[derive(Clone)]
pub struct FakeExecutor {
    inner: Arc<FakeInner>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::with_gate(Semaphore::MAX_PERMITS)
    }

    /// Renders block until [`release`](Self::release) hands out permits.
    pub fn gated() -> Self {
        Self::with_gate(0)
    }

    fn with_gate(permits: usize) -> Self {
        Self {
            inner: Arc::new(FakeInner {
                available: AtomicBool::new(true),
                unavailable: AtomicBool::new(false),
                failing_seqs: Mutex::new(HashSet::new()),
                gate: Semaphore::new(permits),
                started: AtomicUsize::new(0),
                rendered: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Make every render report the render engine as unreachable.
    pub fn set_unavailable_renders(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn fail_seqs(&self, seqs: &[u32]) {
        self.inner.failing_seqs.lock().unwrap().extend(seqs);
    }

    pub fn clear_failures(&self) {
        self.inner.failing_seqs.lock().unwrap().clear();
    }

    pub fn release(&self, permits: usize) {
        self.inner.gate.add_permits(permits);
    }

    pub fn started(&self) -> usize {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Sequence numbers of successfully rendered items, in order.
    pub fn rendered(&self) -> Vec<u32> {
        self.inner.rendered.lock().unwrap().clone()
    }
}

impl RenderExecutor for FakeExecutor {
    fn is_available(&self) -> BoxFuture<'static, bool> {
        let available = self.inner.available.load(Ordering::SeqCst);
        Box::pin(async move { available })
    }

    fn render(&self, _job: &Job, item: &JobItem) -> BoxFuture<'static, RenderResult> {
        let inner = self.inner.clone();
        let seq = item.seq;
        Box::pin(async move {
            inner.started.fetch_add(1, Ordering::SeqCst);

            if inner.unavailable.load(Ordering::SeqCst) {
                return Err(RenderError::Unavailable("connection refused".into()));
            }

            let permit = inner
                .gate
                .acquire()
                .await
                .map_err(|_| RenderError::Failed("gate closed".into()))?;
            permit.forget();

            if inner.failing_seqs.lock().unwrap().contains(&seq) {
                return Err(RenderError::Failed(format!("out of memory on item {}", seq)));
            }

            inner.rendered.lock().unwrap().push(seq);
            Ok(())
        })
    }
}

/// Subscriber that records everything it is sent.
pub struct Recorder {
    id: SubscriberId,
    events: Mutex<Vec<HubEvent>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: SubscriberId::new(),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<HubEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn removed_paths(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HubEvent::ImageRemoved { path } => Some(path),
                _ => None,
            })
            .collect()
    }
}

impl Subscriber for Recorder {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn send_event(&self, event: &HubEvent) -> bool {
        self.events.lock().unwrap().push(event.clone());
        true
    }
}

/// Store whose job writes can be made to fail on demand.
///
/// Shares its state with the wrapped [`MemoryStore`].
#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make `update_job` and `delete_job` fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writes(&self) -> Result<(), DbError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Query("write rejected".into()));
        }
        Ok(())
    }
}

impl JobStore for FlakyStore {
    async fn create_job(&self, job: &Job, items: &[JobItem]) -> Result<Job, DbError> {
        self.inner.create_job(job, items).await
    }

    async fn get_job(&self, id: JobId) -> Result<Job, DbError> {
        self.inner.get_job(id).await
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, DbError> {
        self.inner.list_jobs(filter).await
    }

    async fn update_job(&self, job: &Job) -> Result<Job, DbError> {
        self.check_writes()?;
        self.inner.update_job(job).await
    }

    async fn delete_job(&self, id: JobId) -> Result<(), DbError> {
        self.check_writes()?;
        self.inner.delete_job(id).await
    }

    async fn list_items(&self, job_id: JobId) -> Result<Vec<JobItem>, DbError> {
        self.inner.list_items(job_id).await
    }

    async fn next_pending_item(&self, job_id: JobId) -> Result<Option<JobItem>, DbError> {
        self.inner.next_pending_item(job_id).await
    }

    async fn update_item_status(
        &self,
        item_id: ItemId,
        status: ItemStatus,
        error_message: Option<String>,
    ) -> Result<JobItem, DbError> {
        self.inner.update_item_status(item_id, status, error_message).await
    }

    async fn count_items(&self, job_id: JobId) -> Result<ItemStatusCounts, DbError> {
        self.inner.count_items(job_id).await
    }

    async fn failed_items(&self, job_id: JobId) -> Result<Vec<JobItem>, DbError> {
        self.inner.failed_items(job_id).await
    }
}

impl PresetStore for FlakyStore {
    async fn create_preset(&self, preset: &Preset) -> Result<Preset, DbError> {
        self.inner.create_preset(preset).await
    }

    async fn get_preset(&self, id: PresetId) -> Result<Preset, DbError> {
        self.inner.get_preset(id).await
    }

    async fn list_presets(&self) -> Result<Vec<Preset>, DbError> {
        self.inner.list_presets().await
    }

    async fn delete_preset(&self, id: PresetId) -> Result<(), DbError> {
        self.inner.delete_preset(id).await
    }
}

pub struct Harness {
    pub engine: JobEngine,
    pub handle: tokio::task::JoinHandle<()>,
    pub store: Arc<MemoryStore>,
    pub storage: Storage,
    pub hub: Arc<EventHub>,
    pub executor: FakeExecutor,
    pub recorder: Arc<Recorder>,
    /// Two prompts with a single value on every other axis.
    pub preset: Preset,
}

pub fn test_config() -> EngineConfig {
    EngineConfig::default()
        .with_reachability_timeout(Duration::from_millis(200))
        .with_max_unavailable_retries(3)
        .with_backoff(BackoffConfig {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
        })
}

pub fn two_prompt_preset() -> Preset {
    Preset::new("smoke")
        .with_prompts(vec![
            PromptVariant::new("portrait", "a portrait photo"),
            PromptVariant::new("landscape", "a mountain lake"),
        ])
        .with_steps(vec![20])
        .with_cfgs(vec![7.0])
        .with_samplers(vec!["euler".into()])
        .with_schedulers(vec!["normal".into()])
        .with_seeds(vec![42])
}

pub fn checkpoints(names: &[&str]) -> Vec<Checkpoint> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| Checkpoint::new(*name).with_step((i as u64 + 1) * 500))
        .collect()
}

/// Three checkpoints, so six items with [`two_prompt_preset`].
pub const CHECKPOINTS: [&str; 3] = [
    "my-lora-000500.safetensors",
    "my-lora-001000.safetensors",
    "my-lora-001500.safetensors",
];

pub async fn start_harness(executor: FakeExecutor) -> Result<Harness, Box<dyn Error>> {
    start_harness_with_store(executor, Arc::new(MemoryStore::new())).await
}

pub async fn start_harness_with_store(
    executor: FakeExecutor,
    store: Arc<MemoryStore>,
) -> Result<Harness, Box<dyn Error>> {
    spawn_harness(executor, store.clone(), store).await
}

/// Harness whose engine writes through a [`FlakyStore`]. `Harness::store`
/// sees the same state without the injected failures.
pub async fn start_flaky_harness(
    executor: FakeExecutor,
) -> Result<(Harness, FlakyStore), Box<dyn Error>> {
    let store = MemoryStore::new();
    let flaky = FlakyStore::new(store.clone());
    let harness = spawn_harness(executor, Arc::new(store), Arc::new(flaky.clone())).await?;
    Ok((harness, flaky))
}

async fn spawn_harness<S: JobStore + PresetStore>(
    executor: FakeExecutor,
    store: Arc<MemoryStore>,
    engine_store: Arc<S>,
) -> Result<Harness, Box<dyn Error>> {
    let storage = Storage::new(StorageConfig::memory()).await?;
    let hub = Arc::new(EventHub::new());
    let recorder = Recorder::new();
    hub.register(recorder.clone());

    let preset = store.create_preset(&two_prompt_preset()).await?;

    let (engine, handle) = start_engine(EngineArgs {
        store: engine_store,
        executor: Arc::new(executor.clone()),
        cleaner: Arc::new(storage.clone()),
        hub: hub.clone(),
        config: test_config(),
    })
    .await?;

    Ok(Harness {
        engine,
        handle,
        store,
        storage,
        hub,
        executor,
        recorder,
        preset,
    })
}

impl Harness {
    pub fn request(&self) -> CreateJobRequest {
        CreateJobRequest::new(
            "my-lora",
            checkpoints(&CHECKPOINTS),
            self.preset.id,
            "flux-dev",
        )
    }

    pub async fn create_job(&self) -> Result<Job, Box<dyn Error>> {
        Ok(self.engine.create(self.request()).await?)
    }

    /// Poll progress until the job reaches `status`.
    pub async fn wait_for_status(
        &self,
        job_id: JobId,
        status: JobStatus,
    ) -> Result<JobProgress, Box<dyn Error>> {
        let engine = self.engine.clone();
        let progress = tokio::time::timeout(Duration::from_secs(5), async move {
            loop {
                let progress = engine.progress(job_id).await?;
                if progress.status == status {
                    return Ok::<_, actors::EngineError>(progress);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .map_err(|_| format!("job {} never reached {}", job_id, status))??;
        Ok(progress)
    }

    /// Wait until the executor has begun `n` renders.
    pub async fn wait_for_renders(&self, n: usize) -> TestResult {
        let executor = self.executor.clone();
        tokio::time::timeout(Duration::from_secs(5), async move {
            while executor.started() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .map_err(|_| format!("never saw {} renders", n))?;
        Ok(())
    }
}
