//! `preloader snapshot` command.

use clap::Args;
use preloader_core::{PreloaderConfig, Result, SnapshotConfig};
use preloader_runtime::{KubeSnapshotBackend, SnapshotProvisioner, SnapshotRequest};
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// PersistentVolumeClaim holding the exported images
    #[arg(long)]
    pub pvc: Option<String>,

    /// VolumeSnapshotClass to use
    #[arg(long)]
    pub class: Option<String>,

    /// Name of the VolumeSnapshot to create
    #[arg(long)]
    pub name: Option<String>,

    /// Namespace of the PVC and the VolumeSnapshot
    #[arg(long)]
    pub namespace: Option<String>,

    /// Give up waiting for the snapshot after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

impl SnapshotArgs {
    fn apply(&self, config: &mut SnapshotConfig) {
        for (value, field) in [
            (&self.pvc, &mut config.pvc),
            (&self.class, &mut config.class),
            (&self.name, &mut config.name),
            (&self.namespace, &mut config.namespace),
        ] {
            if let Some(value) = value {
                *field = value.clone();
            }
        }
        if let Some(timeout) = self.timeout {
            config.poll.timeout_secs = timeout;
        }
    }
}

pub async fn execute(args: SnapshotArgs, config: PreloaderConfig) -> Result<()> {
    let mut snapshot = config.snapshot;
    args.apply(&mut snapshot);
    let request = SnapshotRequest::from_config(&snapshot)?;

    let backend = KubeSnapshotBackend::connect().await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, no longer waiting for the snapshot");
            on_interrupt.cancel();
        }
    });

    let mut provisioner =
        SnapshotProvisioner::new(&backend, snapshot.poll.clone()).with_cancellation(cancel);
    let handle = provisioner.provision(&request).await?;

    // Prefer the storage-level handle when the snapshot is bound to content
    let handle = backend.storage_handle(&handle).await?.unwrap_or(handle);
    println!("Snapshot created: {handle}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: SnapshotArgs,
    }

    fn parse(argv: &[&str]) -> SnapshotConfig {
        let harness =
            Harness::try_parse_from(std::iter::once("snapshot").chain(argv.iter().copied()))
                .unwrap();
        let mut config = SnapshotConfig {
            namespace: "kube-system".to_string(),
            ..Default::default()
        };
        harness.args.apply(&mut config);
        config
    }

    #[test]
    fn test_flags_fill_request() {
        let config = parse(&[
            "--pvc",
            "images",
            "--class",
            "csi-snapclass",
            "--name",
            "images-2026-10-16",
            "--timeout",
            "30",
        ]);

        let request = SnapshotRequest::from_config(&config).unwrap();
        assert_eq!(request.source_volume_claim, "images");
        assert_eq!(request.snapshot_class_name, "csi-snapclass");
        assert_eq!(request.name, "images-2026-10-16");
        // Unset flags keep the configured value
        assert_eq!(request.namespace, "kube-system");
        assert_eq!(config.poll.timeout_secs, 30);
    }

    #[test]
    fn test_missing_pvc_rejected() {
        let config = parse(&["--class", "csi-snapclass", "--name", "images"]);
        assert!(SnapshotRequest::from_config(&config).is_err());
    }
}
