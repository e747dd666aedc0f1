//! Preset repository.

use chrono::{DateTime, Utc};
use sampler_core::{Preset, PresetId, PromptVariant};
use serde::{Deserialize, Serialize};

use crate::schema::PRESET_TABLE;
use crate::{Database, DbError};

/// Repository for preset persistence operations.
#[derive(Clone)]
pub struct PresetRepository {
    db: Database,
}

#[derive(Debug, Serialize, Deserialize)]
struct PresetRecord {
    preset_id: PresetId,
    name: String,
    #[serde(default)]
    prompts: Vec<PromptVariant>,
    #[serde(default)]
    steps: Vec<u32>,
    #[serde(default)]
    cfgs: Vec<f64>,
    #[serde(default)]
    samplers: Vec<String>,
    #[serde(default)]
    schedulers: Vec<String>,
    #[serde(default)]
    seeds: Vec<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Preset> for PresetRecord {
    fn from(preset: &Preset) -> Self {
        Self {
            preset_id: preset.id,
            name: preset.name.clone(),
            prompts: preset.prompts.clone(),
            steps: preset.steps.clone(),
            cfgs: preset.cfgs.clone(),
            samplers: preset.samplers.clone(),
            schedulers: preset.schedulers.clone(),
            seeds: preset.seeds.clone(),
            created_at: preset.created_at,
            updated_at: preset.updated_at,
        }
    }
}

impl PresetRecord {
    fn into_preset(self) -> Preset {
        Preset {
            id: self.preset_id,
            name: self.name,
            prompts: self.prompts,
            steps: self.steps,
            cfgs: self.cfgs,
            samplers: self.samplers,
            schedulers: self.schedulers,
            seeds: self.seeds,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl PresetRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new preset.
    pub async fn create(&self, preset: &Preset) -> Result<Preset, DbError> {
        let record: Option<PresetRecord> = self
            .db
            .create((PRESET_TABLE, preset.id.to_string()))
            .content(PresetRecord::from(preset))
            .await?;

        record
            .map(PresetRecord::into_preset)
            .ok_or_else(|| DbError::Query("Failed to create preset".into()))
    }

    /// Get a preset by ID.
    pub async fn get(&self, id: PresetId) -> Result<Preset, DbError> {
        let record: Option<PresetRecord> = self.db.select((PRESET_TABLE, id.to_string())).await?;

        record
            .map(PresetRecord::into_preset)
            .ok_or_else(|| DbError::NotFound(format!("Preset not found: {}", id)))
    }

    /// List all presets ordered by name.
    pub async fn list(&self) -> Result<Vec<Preset>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM preset ORDER BY name ASC")
            .await?;

        let records: Vec<PresetRecord> = result.take(0)?;

        Ok(records.into_iter().map(PresetRecord::into_preset).collect())
    }

    /// Delete a preset.
    pub async fn delete(&self, id: PresetId) -> Result<(), DbError> {
        let record: Option<PresetRecord> = self.db.delete((PRESET_TABLE, id.to_string())).await?;

        match record {
            Some(_) => Ok(()),
            None => Err(DbError::NotFound(format!("Preset not found: {}", id))),
        }
    }
}
