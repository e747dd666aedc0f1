//! Presets: saved generation axes that expand into job items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetId(pub Ulid);

impl PresetId {
    /// Create a new unique preset ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a preset ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for PresetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PresetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named prompt text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptVariant {
    pub name: String,
    pub text: String,
}

impl PromptVariant {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// A saved set of prompt/step/cfg/sampler/scheduler/seed axes.
///
/// Every axis takes part in the cross product; an empty axis yields zero
/// items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: PresetId,
    pub name: String,
    #[serde(default)]
    pub prompts: Vec<PromptVariant>,
    #[serde(default)]
    pub steps: Vec<u32>,
    #[serde(default)]
    pub cfgs: Vec<f64>,
    #[serde(default)]
    pub samplers: Vec<String>,
    #[serde(default)]
    pub schedulers: Vec<String>,
    #[serde(default)]
    pub seeds: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Preset {
    /// Create an empty preset with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PresetId::new(),
            name: name.into(),
            prompts: Vec::new(),
            steps: Vec::new(),
            cfgs: Vec::new(),
            samplers: Vec::new(),
            schedulers: Vec::new(),
            seeds: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_prompts(mut self, prompts: Vec<PromptVariant>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_steps(mut self, steps: Vec<u32>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_cfgs(mut self, cfgs: Vec<f64>) -> Self {
        self.cfgs = cfgs;
        self
    }

    pub fn with_samplers(mut self, samplers: Vec<String>) -> Self {
        self.samplers = samplers;
        self
    }

    pub fn with_schedulers(mut self, schedulers: Vec<String>) -> Self {
        self.schedulers = schedulers;
        self
    }

    pub fn with_seeds(mut self, seeds: Vec<i64>) -> Self {
        self.seeds = seeds;
        self
    }

    /// Number of parameter combinations per checkpoint, or `None` when the
    /// product of the axis lengths does not fit in a `usize`.
    pub fn combinations(&self) -> Option<usize> {
        [
            self.steps.len(),
            self.cfgs.len(),
            self.samplers.len(),
            self.schedulers.len(),
            self.seeds.len(),
        ]
        .into_iter()
        .try_fold(self.prompts.len(), usize::checked_mul)
    }
}
