use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PreloaderError, Result};
use crate::image::ExclusionRuleSet;

/// Prefix of the preloader's own image, excluded unless overridden.
pub const DEFAULT_EXCLUDED_PREFIX: &str = "docker.io/outscale/k8s-image-preloader";

/// Preloader configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloaderConfig {
    /// Container runtime CLI settings
    pub ctr: CtrConfig,

    /// Export settings
    pub export: ExportConfig,

    /// Snapshot settings
    pub snapshot: SnapshotConfig,
}

impl PreloaderConfig {
    /// Load a configuration file. Missing sections fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PreloaderError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

/// `ctr` invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtrConfig {
    /// Path to the ctr binary, also used by the restore script
    pub path: PathBuf,

    /// Extra global flags, whitespace separated
    pub flags: String,

    /// containerd namespace holding the kubelet's images
    pub namespace: String,

    /// Log ctr command output
    pub debug: bool,
}

impl Default for CtrConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/usr/local/bin/ctr"),
            flags: "-a /var/run/containerd/containerd.sock".to_string(),
            namespace: "k8s.io".to_string(),
            debug: false,
        }
    }
}

impl CtrConfig {
    /// Flags split on whitespace, empty entries dropped.
    pub fn flag_args(&self) -> Vec<String> {
        self.flags.split_whitespace().map(str::to_string).collect()
    }
}

/// Where the image list comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageSource {
    /// Local cache plus workload inventory
    #[default]
    Cluster,
    /// Newline-delimited references on stdin
    Stdin,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory on the snapshot volume receiving archives
    pub target: PathBuf,

    /// Only export images present in the local cache
    pub cache_only: bool,

    /// Pull every image, even when cached
    pub force_pull: bool,

    /// Reference prefixes to skip
    pub exclude: ExclusionRuleSet,

    /// Platform every archive is pinned to
    pub platform: String,

    /// Write restore.sh next to the archives
    pub restore_script: bool,

    pub source: ImageSource,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            target: PathBuf::from("/snapshot"),
            cache_only: false,
            force_pull: false,
            exclude: ExclusionRuleSet::new([DEFAULT_EXCLUDED_PREFIX]),
            platform: "linux/amd64".to_string(),
            restore_script: true,
            source: ImageSource::Cluster,
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target.as_os_str().is_empty() {
            return Err(PreloaderError::Config(
                "export target path must not be empty".to_string(),
            ));
        }
        if self.platform.split('/').count() < 2 {
            return Err(PreloaderError::Config(format!(
                "platform '{}' must be os/arch",
                self.platform
            )));
        }
        Ok(())
    }
}

/// Snapshot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// PersistentVolumeClaim holding the exports
    pub pvc: String,

    /// VolumeSnapshotClass to use
    pub class: String,

    /// Name of the VolumeSnapshot to create
    pub name: String,

    /// Namespace of the VolumeSnapshot to create
    pub namespace: String,

    pub poll: PollPolicy,
}

impl SnapshotConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("pvc", &self.pvc),
            ("class", &self.class),
            ("name", &self.name),
            ("namespace", &self.namespace),
        ] {
            if value.trim().is_empty() {
                return Err(PreloaderError::Config(format!(
                    "snapshot {field} is required"
                )));
            }
        }
        self.poll.validate()
    }
}

/// Backoff policy for snapshot status polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Delay before the second poll, in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay, in milliseconds
    pub max_delay_ms: u64,

    /// Growth factor applied after each unready poll
    pub multiplier: f64,

    /// Overall deadline, in seconds
    pub timeout_secs: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 250,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            timeout_secs: 600,
        }
    }
}

impl PollPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(PreloaderError::Config(format!(
                "poll multiplier must be >= 1, got {}",
                self.multiplier
            )));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(PreloaderError::Config(
                "poll max delay must not be smaller than the initial delay".to_string(),
            ));
        }
        Ok(())
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay to wait after the `attempt`-th unready poll (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let millis = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(millis as u64)
    }
}
