use chrono::Utc;
use db::{DbConfig, DbError, SurrealStore};
use sampler_core::{Checkpoint, Job, JobItem, PresetId, SampleParams};

/// Open a fresh, isolated in-memory database.
pub async fn setup_db() -> Result<SurrealStore, DbError> {
    SurrealStore::open(&DbConfig::memory()).await
}

pub fn params(seed: i64) -> SampleParams {
    SampleParams {
        prompt_name: "portrait".to_string(),
        prompt_text: "a portrait photo".to_string(),
        steps: 20,
        cfg: 7.5,
        sampler: "euler".to_string(),
        scheduler: "normal".to_string(),
        seed,
    }
}

/// A pending job with `per_checkpoint` items for each named checkpoint.
pub fn job_with_items(checkpoints: &[&str], per_checkpoint: u32) -> (Job, Vec<JobItem>) {
    let mut job = Job::new("my-lora", PresetId::new(), "flux-dev");
    let mut items = Vec::new();
    let mut seq = 0;
    for name in checkpoints {
        for n in 0..per_checkpoint {
            items.push(JobItem::new(
                job.id,
                seq,
                Checkpoint::new(*name).with_step(u64::from(seq) * 100),
                params(i64::from(n)),
            ));
            seq += 1;
        }
    }
    job.total_items = seq;
    job.updated_at = Utc::now();
    (job, items)
}
