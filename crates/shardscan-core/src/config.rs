use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Scratch size used by `ScratchMemory::Default`.
pub const DEFAULT_SCRATCH_BYTES: usize = 64 * 1024 * 1024;

/// How much temporary memory a transient compute stream may reserve up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScratchMemory {
    /// Reserve nothing; grow only as the kernel needs.
    #[default]
    None,
    Default,
    Bytes(usize),
}

impl ScratchMemory {
    pub fn bytes(self) -> usize {
        match self {
            Self::None => 0,
            Self::Default => DEFAULT_SCRATCH_BYTES,
            Self::Bytes(n) => n,
        }
    }
}

impl FromStr for ScratchMemory {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "0" => Ok(Self::None),
            "default" => Ok(Self::Default),
            other => other
                .parse::<usize>()
                .map(Self::Bytes)
                .map_err(|_| ConfigError::InvalidValue {
                    key: "SHARDSCAN_SCRATCH",
                    value: s.to_string(),
                }),
        }
    }
}

/// What to do with a shard whose compute context the backend does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPolicy {
    /// Fail that shard only and merge the rest.
    #[default]
    Isolate,
    /// Reject the whole call before any shard runs.
    FailFast,
}

impl FromStr for ContextPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "isolate" => Ok(Self::Isolate),
            "fail_fast" | "failfast" | "strict" => Ok(Self::FailFast),
            _ => Err(ConfigError::InvalidValue {
                key: "SHARDSCAN_CONTEXT_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

/// Per-dispatcher search settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub scratch: ScratchMemory,
    pub context_policy: ContextPolicy,
    /// Size of a dedicated worker pool. `None` uses the global rayon pool.
    pub threads: Option<usize>,
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `SHARDSCAN_SCRATCH`, `SHARDSCAN_CONTEXT_POLICY` and
    /// `SHARDSCAN_THREADS`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("SHARDSCAN_SCRATCH") {
            config.scratch = v.parse()?;
        }
        if let Some(v) = lookup("SHARDSCAN_CONTEXT_POLICY") {
            config.context_policy = v.parse()?;
        }
        if let Some(v) = lookup("SHARDSCAN_THREADS") {
            let threads = v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "SHARDSCAN_THREADS",
                    value: v.clone(),
                })?;
            config.threads = Some(threads);
        }

        Ok(config)
    }

    pub fn with_scratch(mut self, scratch: ScratchMemory) -> Self {
        self.scratch = scratch;
        self
    }

    pub fn with_context_policy(mut self, policy: ContextPolicy) -> Self {
        self.context_policy = policy;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}
