//! Output storage configuration.
//!
//! Settings come from environment variables in production. Parsing goes
//! through a lookup function so the same rules apply to any variable source.

use std::path::PathBuf;

use crate::StorageError;

/// Default root for rendered samples when writing to the local disk.
pub const DEFAULT_FS_ROOT: &str = "./data/samples";

const DEFAULT_REGION: &str = "us-east-1";

/// Which backend holds the rendered samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    S3,
    Filesystem,
    Memory,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::S3 => "s3",
            StorageKind::Filesystem => "filesystem",
            StorageKind::Memory => "memory",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "s3" => Some(StorageKind::S3),
            "filesystem" | "fs" => Some(StorageKind::Filesystem),
            "memory" | "mem" => Some(StorageKind::Memory),
            _ => None,
        }
    }
}

/// Connection settings for an S3-compatible bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    /// Permit plain-HTTP endpoints such as a local MinIO.
    pub allow_http: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub virtual_hosted_style: bool,
}

impl S3Config {
    /// A bucket in the default region with ambient credentials.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            allow_http: false,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            virtual_hosted_style: false,
        }
    }

    fn from_vars<F>(vars: &Vars<F>) -> Result<Self, StorageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = vars.get("S3_BUCKET").ok_or_else(|| {
            StorageError::InvalidConfig("S3_BUCKET is required for the s3 backend".into())
        })?;

        let mut cfg = Self::new(bucket);
        if let Some(region) = vars.get("AWS_REGION") {
            cfg.region = region;
        }
        cfg.endpoint = vars.get("S3_ENDPOINT");
        // An explicit flag wins; otherwise an http:// endpoint implies it.
        cfg.allow_http = vars.flag("S3_ALLOW_HTTP")?.unwrap_or_else(|| {
            cfg.endpoint
                .as_deref()
                .is_some_and(|e| e.to_ascii_lowercase().starts_with("http://"))
        });
        cfg.virtual_hosted_style = vars.flag("S3_VIRTUAL_HOSTED_STYLE")?.unwrap_or(false);
        cfg.access_key_id = vars.get("AWS_ACCESS_KEY_ID");
        cfg.secret_access_key = vars.get("AWS_SECRET_ACCESS_KEY");
        cfg.session_token = vars.get("AWS_SESSION_TOKEN");
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendConfig {
    S3(S3Config),
    Filesystem { root: PathBuf },
    Memory,
}

impl StorageBackendConfig {
    pub fn kind(&self) -> StorageKind {
        match self {
            StorageBackendConfig::S3(_) => StorageKind::S3,
            StorageBackendConfig::Filesystem { .. } => StorageKind::Filesystem,
            StorageBackendConfig::Memory => StorageKind::Memory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackendConfig,
    /// Optional key prefix applied to all object keys.
    pub prefix: Option<String>,
}

impl StorageConfig {
    fn with_backend(backend: StorageBackendConfig) -> Self {
        Self {
            backend,
            prefix: None,
        }
    }

    pub fn memory() -> Self {
        Self::with_backend(StorageBackendConfig::Memory)
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self::with_backend(StorageBackendConfig::Filesystem { root: root.into() })
    }

    pub fn s3(cfg: S3Config) -> Self {
        Self::with_backend(StorageBackendConfig::S3(cfg))
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = non_empty(prefix.into());
        self
    }

    /// Build a config from the process environment.
    ///
    /// - `SAMPLER_OUTPUT_BACKEND`: `s3`, `filesystem` (default) or `memory`
    /// - `SAMPLER_OUTPUT_ROOT`: filesystem root (default: `./data/samples`)
    /// - `SAMPLER_OUTPUT_PREFIX`: optional key prefix
    ///
    /// The S3 backend reads `S3_BUCKET` (required), `AWS_REGION` (default
    /// `us-east-1`), `S3_ENDPOINT`, `S3_ALLOW_HTTP`, `S3_VIRTUAL_HOSTED_STYLE`
    /// and the usual `AWS_*` credentials.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StorageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let kind = match vars.get("SAMPLER_OUTPUT_BACKEND") {
            None => StorageKind::Filesystem,
            Some(raw) => StorageKind::parse(&raw).ok_or_else(|| {
                StorageError::InvalidConfig(format!(
                    "unsupported SAMPLER_OUTPUT_BACKEND={raw} (expected s3|filesystem|memory)"
                ))
            })?,
        };

        let cfg = match kind {
            StorageKind::S3 => Self::s3(S3Config::from_vars(&vars)?),
            StorageKind::Filesystem => Self::filesystem(
                vars.get("SAMPLER_OUTPUT_ROOT")
                    .unwrap_or_else(|| DEFAULT_FS_ROOT.to_string()),
            ),
            StorageKind::Memory => Self::memory(),
        };

        Ok(Self {
            prefix: vars.get("SAMPLER_OUTPUT_PREFIX"),
            ..cfg
        })
    }
}

/// Variable source with blank values treated as unset.
struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).and_then(non_empty)
    }

    fn flag(&self, name: &str) -> Result<Option<bool>, StorageError> {
        let Some(raw) = self.get(name) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "y" => Ok(Some(true)),
            "0" | "false" | "no" | "n" => Ok(Some(false)),
            _ => Err(StorageError::InvalidConfig(format!(
                "invalid boolean for {name}={raw} (expected true/false)"
            ))),
        }
    }
}

pub(crate) fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<StorageConfig, StorageError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StorageConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_filesystem_under_data_dir() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg, StorageConfig::filesystem(DEFAULT_FS_ROOT));
        assert_eq!(cfg.backend.kind(), StorageKind::Filesystem);
    }

    #[test]
    fn reads_backend_root_and_prefix() {
        let cfg = from_pairs(&[
            ("SAMPLER_OUTPUT_BACKEND", "FS"),
            ("SAMPLER_OUTPUT_ROOT", "/srv/samples"),
            ("SAMPLER_OUTPUT_PREFIX", " runs/ "),
        ])
        .unwrap();
        assert_eq!(
            cfg.backend,
            StorageBackendConfig::Filesystem {
                root: PathBuf::from("/srv/samples")
            }
        );
        assert_eq!(cfg.prefix.as_deref(), Some("runs/"));

        let cfg = from_pairs(&[("SAMPLER_OUTPUT_BACKEND", "memory")]).unwrap();
        assert_eq!(cfg, StorageConfig::memory());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = from_pairs(&[
            ("SAMPLER_OUTPUT_BACKEND", "  "),
            ("SAMPLER_OUTPUT_PREFIX", ""),
        ])
        .unwrap();
        assert_eq!(cfg, StorageConfig::filesystem(DEFAULT_FS_ROOT));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = from_pairs(&[("SAMPLER_OUTPUT_BACKEND", "gcs")]).unwrap_err();
        assert!(err.to_string().contains("SAMPLER_OUTPUT_BACKEND=gcs"), "{err}");
    }

    #[test]
    fn s3_requires_a_bucket() {
        let err = from_pairs(&[("SAMPLER_OUTPUT_BACKEND", "s3")]).unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfig(_)), "{err:?}");
    }

    #[test]
    fn s3_http_endpoint_allows_http_unless_overridden() {
        let cfg = from_pairs(&[
            ("SAMPLER_OUTPUT_BACKEND", "s3"),
            ("S3_BUCKET", "samples"),
            ("S3_ENDPOINT", "http://localhost:9000"),
            ("AWS_ACCESS_KEY_ID", "minio"),
        ])
        .unwrap();
        let StorageBackendConfig::S3(s3) = cfg.backend else {
            panic!("expected s3 backend");
        };
        assert_eq!(s3.bucket, "samples");
        assert_eq!(s3.region, DEFAULT_REGION);
        assert!(s3.allow_http);
        assert!(!s3.virtual_hosted_style);
        assert_eq!(s3.access_key_id.as_deref(), Some("minio"));

        let cfg = from_pairs(&[
            ("SAMPLER_OUTPUT_BACKEND", "s3"),
            ("S3_BUCKET", "samples"),
            ("S3_ENDPOINT", "http://localhost:9000"),
            ("S3_ALLOW_HTTP", "no"),
            ("AWS_REGION", "eu-west-2"),
        ])
        .unwrap();
        let StorageBackendConfig::S3(s3) = cfg.backend else {
            panic!("expected s3 backend");
        };
        assert!(!s3.allow_http);
        assert_eq!(s3.region, "eu-west-2");
    }

    #[test]
    fn invalid_boolean_is_rejected() {
        let err = from_pairs(&[
            ("SAMPLER_OUTPUT_BACKEND", "s3"),
            ("S3_BUCKET", "samples"),
            ("S3_VIRTUAL_HOSTED_STYLE", "maybe"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("S3_VIRTUAL_HOSTED_STYLE"), "{err}");
    }
}
