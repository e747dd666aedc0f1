//! Preset management operations.

use db::PresetStore;
use sampler_core::{Preset, PresetId, PromptVariant};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::init::Sampler;

/// Request type for saving a preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetRequest {
    pub name: String,
    pub prompts: Vec<PromptVariant>,
    pub steps: Vec<u32>,
    pub cfgs: Vec<f64>,
    pub samplers: Vec<String>,
    pub schedulers: Vec<String>,
    pub seeds: Vec<i64>,
}

impl PresetRequest {
    fn into_preset(self) -> ApiResult<Preset> {
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest("preset name must not be empty".into()));
        }

        Ok(Preset::new(self.name)
            .with_prompts(self.prompts)
            .with_steps(self.steps)
            .with_cfgs(self.cfgs)
            .with_samplers(self.samplers)
            .with_schedulers(self.schedulers)
            .with_seeds(self.seeds))
    }
}

fn parse_preset_id(id: &str) -> ApiResult<PresetId> {
    PresetId::parse(id).map_err(|e| ApiError::invalid_id("preset", id, e))
}

impl Sampler {
    pub async fn create_preset(&self, request: PresetRequest) -> ApiResult<Preset> {
        let preset = request.into_preset()?;
        let preset = self.store.create_preset(&preset).await?;
        tracing::info!(preset_id = %preset.id, name = %preset.name, "Preset saved");
        Ok(preset)
    }

    pub async fn get_preset(&self, id: &str) -> ApiResult<Preset> {
        let preset_id = parse_preset_id(id)?;
        Ok(self.store.get_preset(preset_id).await?)
    }

    /// All presets, ordered by name.
    pub async fn list_presets(&self) -> ApiResult<Vec<Preset>> {
        Ok(self.store.list_presets().await?)
    }

    pub async fn delete_preset(&self, id: &str) -> ApiResult<()> {
        let preset_id = parse_preset_id(id)?;
        Ok(self.store.delete_preset(preset_id).await?)
    }
}
