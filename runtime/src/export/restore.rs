//! Restore script written next to the exported archives.
//!
//! The script locates its own directory and imports every archive found
//! there, so a snapshot of the volume can be restored without the preloader.

use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use preloader_core::error::Result;
use preloader_core::CtrConfig;

/// File name of the restore script inside the export directory.
pub const RESTORE_SCRIPT_NAME: &str = "restore.sh";

const TEMPLATE: &str = r#"#!/bin/bash
RL=$(readlink -f "${BASH_SOURCE[0]}")
DN=$(dirname "$RL")
DIR=$(cd -P "$DN" && pwd)
for archive in "$DIR"/*.tar; do
    [ -e "$archive" ] || continue
    {{.CtrBin}} -n {{.Namespace}} images import "$archive"
done
"#;

/// Restore script bound to one `ctr` binary and namespace.
#[derive(Debug, Clone)]
pub struct RestoreScript {
    ctr_bin: PathBuf,
    namespace: String,
}

impl RestoreScript {
    pub fn new(ctr: &CtrConfig) -> Self {
        Self {
            ctr_bin: ctr.path.clone(),
            namespace: ctr.namespace.clone(),
        }
    }

    /// Script content with placeholders substituted.
    pub fn render(&self) -> String {
        TEMPLATE
            .replace("{{.CtrBin}}", &self.ctr_bin.to_string_lossy())
            .replace("{{.Namespace}}", &self.namespace)
    }

    /// Write the executable script into `dir`, replacing any previous one.
    ///
    /// The file is fsynced before returning.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(RESTORE_SCRIPT_NAME);
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o755)
            .open(&path)?;
        file.write_all(self.render().as_bytes())?;
        // mode() only applies when the file is created
        file.set_permissions(std::fs::Permissions::from_mode(0o755))?;
        file.sync_all()?;
        Ok(path)
    }
}
