//! CLI command definitions and dispatch.

mod export;
mod snapshot;
mod version;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use preloader_core::{PreloaderConfig, Result};

/// Preload container images onto a volume and snapshot it.
#[derive(Parser, Debug)]
#[command(name = "preloader", version, about)]
pub struct Cli {
    /// Path to the ctr binary
    #[arg(long, global = true, value_name = "PATH")]
    pub ctr_path: Option<PathBuf>,

    /// Global flags passed to every ctr invocation
    #[arg(long, global = true, value_name = "FLAGS", allow_hyphen_values = true)]
    pub ctr_flags: Option<String>,

    /// Verbose logging, including ctr output
    #[arg(long, global = true)]
    pub debug: bool,

    /// YAML configuration file; flags take precedence
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Export cached and workload images into a directory
    #[command(visible_alias = "e")]
    Export(export::ExportArgs),
    /// Snapshot the volume holding the exported images
    #[command(visible_alias = "s")]
    Snapshot(snapshot::SnapshotArgs),
    /// Show version information
    #[command(visible_alias = "v")]
    Version(version::VersionArgs),
}

impl Cli {
    /// Configuration file (or defaults) with global flags applied.
    pub fn load_config(&self) -> Result<PreloaderConfig> {
        let mut config = match &self.config {
            Some(path) => PreloaderConfig::load(path)?,
            None => PreloaderConfig::default(),
        };
        if let Some(path) = &self.ctr_path {
            config.ctr.path = path.clone();
        }
        if let Some(flags) = &self.ctr_flags {
            config.ctr.flags = flags.clone();
        }
        if self.debug {
            config.ctr.debug = true;
        }
        Ok(config)
    }
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    if let Command::Version(args) = &cli.command {
        return version::execute(args);
    }

    let config = cli.load_config()?;
    match cli.command {
        Command::Export(args) => export::execute(args, config).await,
        Command::Snapshot(args) => snapshot::execute(args, config).await,
        Command::Version(args) => version::execute(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_aliases() {
        for (alias, expected) in [("e", "export"), ("s", "snapshot"), ("v", "version")] {
            let cli = Cli::try_parse_from(["preloader", alias]);
            let name = match cli {
                Ok(Cli {
                    command: Command::Export(_),
                    ..
                }) => "export",
                Ok(Cli {
                    command: Command::Version(_),
                    ..
                }) => "version",
                // snapshot without its required values still parses
                Ok(Cli {
                    command: Command::Snapshot(_),
                    ..
                }) => "snapshot",
                Err(e) => panic!("{alias}: {e}"),
            };
            assert_eq!(name, expected);
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "preloader",
            "export",
            "--ctr-path",
            "/opt/bin/ctr",
            "--ctr-flags",
            "-a /run/containerd.sock",
            "--debug",
        ])
        .unwrap();

        let config = cli.load_config().unwrap();
        assert_eq!(config.ctr.path, PathBuf::from("/opt/bin/ctr"));
        assert_eq!(config.ctr.flags, "-a /run/containerd.sock");
        assert!(config.ctr.debug);
        assert_eq!(config.ctr.namespace, "k8s.io");
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preloader.yaml");
        std::fs::write(
            &path,
            "ctr:\n  path: /usr/bin/ctr\n  flags: \"\"\nexport:\n  target: /data\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "preloader",
            "--config",
            path.to_str().unwrap(),
            "--ctr-path",
            "/opt/bin/ctr",
            "export",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();

        assert_eq!(config.ctr.path, PathBuf::from("/opt/bin/ctr"));
        assert_eq!(config.ctr.flags, "");
        assert_eq!(config.export.target, PathBuf::from("/data"));
    }

    #[test]
    fn test_missing_config_file() {
        let cli = Cli::try_parse_from(["preloader", "--config", "/nonexistent.yaml", "export"])
            .unwrap();
        assert!(matches!(
            cli.load_config(),
            Err(preloader_core::PreloaderError::Config(_))
        ));
    }
}
