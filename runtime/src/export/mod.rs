//! Export planner and executor.
//!
//! For every image in the resolved set: pull it when it is not cached (or
//! when force-pull is set), export a platform-pinned archive into the target
//! directory, then sync the filesystem and write the restore script.

mod restore;

pub use restore::{RestoreScript, RESTORE_SCRIPT_NAME};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use preloader_core::error::{PreloaderError, Result};
use preloader_core::{CtrConfig, ExportConfig, Image};
use tokio::process::Command;

use crate::oci::ImageRuntime;

/// Replacement for `/` in archive file names. Never valid in a reference.
const PATH_SEPARATOR_REPLACEMENT: &str = "+";

/// Archive file name for a reference.
///
/// Deterministic, so exporting the same reference again overwrites the
/// previous archive.
pub fn archive_file_name(reference: &str) -> String {
    format!("{}.tar", reference.replace('/', PATH_SEPARATOR_REPLACEMENT))
}

/// Flushes written archives to stable storage.
#[async_trait]
pub trait FilesystemSync: Send + Sync {
    async fn sync(&self) -> Result<()>;
}

/// [`FilesystemSync`] running the host's `sync` command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncCommand;

#[async_trait]
impl FilesystemSync for SyncCommand {
    async fn sync(&self) -> Result<()> {
        let output = Command::new("sync")
            .output()
            .await
            .map_err(|e| PreloaderError::Sync(format!("failed to execute sync: {e}")))?;
        if !output.status.success() {
            return Err(PreloaderError::Runtime {
                command: "sync".to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of an export run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// References pulled before export
    pub pulled: Vec<String>,
    /// Archives written, in export order
    pub archives: Vec<PathBuf>,
    pub restore_script: Option<PathBuf>,
}

/// Exports an image set into the target directory.
pub struct Exporter {
    config: ExportConfig,
    restore: RestoreScript,
}

impl Exporter {
    pub fn new(config: ExportConfig, ctr: &CtrConfig) -> Self {
        Self {
            config,
            restore: RestoreScript::new(ctr),
        }
    }

    pub fn needs_pull(&self, image: &Image) -> bool {
        self.config.force_pull || !image.cached_locally
    }

    pub fn archive_path(&self, reference: &str) -> PathBuf {
        self.config.target.join(archive_file_name(reference))
    }

    /// Pull and export every image, sync, then write the restore script.
    ///
    /// Stops at the first failure; archives already written are left in place.
    pub async fn run<'a, I>(
        &self,
        images: I,
        runtime: &dyn ImageRuntime,
        sync: &dyn FilesystemSync,
    ) -> Result<ExportReport>
    where
        I: IntoIterator<Item = &'a Image>,
    {
        self.config.validate()?;
        ensure_dir(&self.config.target)?;

        let mut report = ExportReport::default();
        for image in images {
            if self.needs_pull(image) {
                tracing::info!("Pulling {}...", image.reference);
                runtime.pull(&image.reference).await?;
                report.pulled.push(image.reference.clone());
            }

            let archive = self.archive_path(&image.reference);
            tracing::info!("Exporting {}...", image.reference);
            runtime
                .export(&image.reference, &archive, &self.config.platform)
                .await?;
            report.archives.push(archive);
        }

        tracing::info!("Sync...");
        sync.sync().await?;

        if self.config.restore_script {
            tracing::info!("Copying restore script...");
            report.restore_script = Some(self.restore.write_to(&self.config.target)?);
        }

        tracing::info!(
            exported = report.archives.len(),
            pulled = report.pulled.len(),
            target = %self.config.target.display(),
            "Export complete"
        );
        Ok(report)
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    tracing::info!("Creating {}", dir.display());
    std::fs::create_dir_all(dir).map_err(|e| {
        PreloaderError::Config(format!(
            "Failed to create export directory {}: {}",
            dir.display(),
            e
        ))
    })
}
