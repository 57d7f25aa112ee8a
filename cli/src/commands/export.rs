//! `preloader export` command.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use preloader_core::{ExclusionRuleSet, ExportConfig, ImageSource, PreloaderConfig, Result};
use preloader_runtime::{Aggregator, CtrRuntime, Exporter, ImageSet, KubeInventory, SyncCommand, SystemResolver};

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Read newline-delimited image references from stdin instead of the cluster
    #[arg(long)]
    pub stdin: bool,

    /// Only export images already in the local cache
    #[arg(long)]
    pub cache_only: bool,

    /// Reference prefixes to skip (repeatable or comma separated)
    #[arg(long, value_delimiter = ',', value_name = "PREFIX")]
    pub exclude: Option<Vec<String>>,

    /// Pull every image, even when cached
    #[arg(long)]
    pub force_pull: bool,

    /// Directory receiving the archives
    #[arg(long, value_name = "DIR")]
    pub to: Option<PathBuf>,

    /// Do not write restore.sh
    #[arg(long)]
    pub no_restore_script: bool,

    /// Platform to export (e.g., "linux/amd64", "linux/arm64")
    #[arg(long)]
    pub platform: Option<String>,
}

impl ExportArgs {
    fn apply(&self, config: &mut ExportConfig) {
        if self.stdin {
            config.source = ImageSource::Stdin;
        }
        if self.cache_only {
            config.cache_only = true;
        }
        if let Some(prefixes) = &self.exclude {
            config.exclude = ExclusionRuleSet::new(prefixes.iter().map(|p| p.trim()));
        }
        if self.force_pull {
            config.force_pull = true;
        }
        if let Some(target) = &self.to {
            config.target = target.clone();
        }
        if self.no_restore_script {
            config.restore_script = false;
        }
        if let Some(platform) = &self.platform {
            config.platform = platform.clone();
        }
    }
}

pub async fn execute(args: ExportArgs, config: PreloaderConfig) -> Result<()> {
    let PreloaderConfig {
        ctr, mut export, ..
    } = config;
    args.apply(&mut export);
    export.validate()?;

    let runtime = CtrRuntime::new(ctr.clone());
    let mut aggregator = Aggregator::new(&export, Arc::new(SystemResolver::new()));

    let images = match export.source {
        ImageSource::Stdin => {
            tracing::info!("Reading image list from stdin...");
            aggregator.from_list(std::io::stdin().lock())?
        }
        ImageSource::Cluster if export.cache_only => {
            let mut images = ImageSet::new();
            aggregator.add_cached(&runtime, &mut images).await?;
            images
        }
        ImageSource::Cluster => {
            let inventory = KubeInventory::connect().await?;
            aggregator.collect(&runtime, &inventory).await?
        }
    };

    let exporter = Exporter::new(export, &ctr);
    let report = exporter.run(&images, &runtime, &SyncCommand).await?;

    println!(
        "Exported {} images ({} pulled)",
        report.archives.len(),
        report.pulled.len()
    );
    Ok(())
}
