//! Cross-product expansion of checkpoints and preset axes into job items.
//!
//! The order is stable: checkpoints outermost (in discovery order), then
//! prompts, steps, cfgs, samplers, schedulers and seeds innermost. Identical
//! inputs always produce the same sequence of parameter combinations, which
//! is what makes item counts reproducible and resumption well-defined.

use std::collections::HashSet;

use thiserror::Error;

use crate::{Checkpoint, JobId, JobItem, Preset, SampleParams};

/// Reasons an expansion cannot produce a usable item set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error("unknown checkpoint: {0}")]
    UnknownCheckpoint(String),
    #[error("expansion produced no items")]
    Empty,
    #[error("expansion would produce {0} items, more than a job can hold")]
    TooLarge(usize),
}

/// Upper bound on the items a single job may hold.
pub const MAX_JOB_ITEMS: usize = 1_000_000;

/// Restrict `checkpoints` to the explicitly requested file names.
///
/// `None` keeps every checkpoint. The discovery order is preserved and
/// repeated names are collapsed.
pub fn select_checkpoints(
    checkpoints: &[Checkpoint],
    filenames: Option<&[String]>,
) -> Result<Vec<Checkpoint>, ExpansionError> {
    let Some(filenames) = filenames else {
        return Ok(checkpoints.to_vec());
    };

    let known: HashSet<&str> = checkpoints.iter().map(|c| c.filename.as_str()).collect();
    if let Some(missing) = filenames.iter().find(|f| !known.contains(f.as_str())) {
        return Err(ExpansionError::UnknownCheckpoint(missing.clone()));
    }

    let wanted: HashSet<&str> = filenames.iter().map(String::as_str).collect();
    Ok(checkpoints
        .iter()
        .filter(|c| wanted.contains(c.filename.as_str()))
        .cloned()
        .collect())
}

/// Every parameter combination of the preset, in stable order.
///
/// Callers must bound the preset first; [`expand_items`] does so.
pub fn combinations(preset: &Preset) -> Vec<SampleParams> {
    let mut out = Vec::with_capacity(preset.combinations().unwrap_or(0));
    for prompt in &preset.prompts {
        for &steps in &preset.steps {
            for &cfg in &preset.cfgs {
                for sampler in &preset.samplers {
                    for scheduler in &preset.schedulers {
                        for &seed in &preset.seeds {
                            out.push(SampleParams {
                                prompt_name: prompt.name.clone(),
                                prompt_text: prompt.text.clone(),
                                steps,
                                cfg,
                                sampler: sampler.clone(),
                                scheduler: scheduler.clone(),
                                seed,
                            });
                        }
                    }
                }
            }
        }
    }
    out
}

/// Expand `checkpoints × combinations(preset)` into pending items for `job_id`.
pub fn expand_items(
    job_id: JobId,
    checkpoints: &[Checkpoint],
    preset: &Preset,
) -> Result<Vec<JobItem>, ExpansionError> {
    // Sized before anything is allocated.
    let total = preset
        .combinations()
        .and_then(|per_checkpoint| per_checkpoint.checked_mul(checkpoints.len()))
        .ok_or(ExpansionError::TooLarge(usize::MAX))?;
    if total == 0 {
        return Err(ExpansionError::Empty);
    }
    if total > MAX_JOB_ITEMS {
        return Err(ExpansionError::TooLarge(total));
    }

    let combos = combinations(preset);
    let mut items = Vec::with_capacity(total);
    let mut seq = 0u32;
    for checkpoint in checkpoints {
        for params in &combos {
            items.push(JobItem::new(job_id, seq, checkpoint.clone(), params.clone()));
            seq += 1;
        }
    }
    Ok(items)
}
