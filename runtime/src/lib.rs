//! Preloader runtime.
//!
//! Resolves the set of container images a cluster needs, exports them into
//! a target directory through containerd's `ctr`, and snapshots the volume
//! holding the archives.

#![allow(clippy::result_large_err)]

pub mod aggregate;
pub mod export;
pub mod inventory;
pub mod oci;
pub mod snapshot;

// Re-export common types
pub use aggregate::{Aggregator, ImageSet};
pub use export::{archive_file_name, ExportReport, Exporter, FilesystemSync, SyncCommand};
pub use export::{RestoreScript, RESTORE_SCRIPT_NAME};
pub use inventory::{KubeInventory, WorkloadImages, WorkloadInventory};
pub use oci::{parse_image_list, CtrRuntime, ImageRuntime};
pub use oci::{DomainResolver, ReferenceNormalizer, StaticResolver, SystemResolver};
pub use snapshot::{KubeSnapshotBackend, SnapshotBackend, SnapshotProvisioner};
pub use snapshot::{SnapshotRequest, SnapshotState, SnapshotStatus};

/// Preloader runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
