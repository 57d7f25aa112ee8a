//! containerd image runtime driven through the `ctr` CLI.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use preloader_core::error::{PreloaderError, Result};
use preloader_core::{CachedImage, CtrConfig};
use tokio::process::Command;

/// Local image content store.
#[async_trait]
pub trait ImageRuntime: Send + Sync {
    /// List cached images as `(reference, digest)` rows, in listing order.
    async fn list_images(&self) -> Result<Vec<CachedImage>>;

    /// Pull an image into the content store.
    async fn pull(&self, reference: &str) -> Result<()>;

    /// Export an image to a re-importable archive for a single platform.
    async fn export(&self, reference: &str, archive: &Path, platform: &str) -> Result<()>;
}

/// [`ImageRuntime`] shelling out to `ctr`.
///
/// Every invocation is `ctr -n <namespace> <flags...> <args...>`.
pub struct CtrRuntime {
    config: CtrConfig,
}

impl CtrRuntime {
    pub fn new(config: CtrConfig) -> Self {
        Self { config }
    }

    fn command_line(&self, args: &[&str]) -> Vec<String> {
        let mut full = vec!["-n".to_string(), self.config.namespace.clone()];
        full.extend(self.config.flag_args());
        full.extend(args.iter().map(|a| a.to_string()));
        full
    }

    /// Run ctr to completion and return its stdout.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let argv = self.command_line(args);
        let shown = format!("{} {}", self.config.path.display(), argv.join(" "));
        tracing::debug!(command = %shown, "Running ctr");

        let output = Command::new(&self.config.path)
            .args(&argv)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| PreloaderError::Runtime {
                command: shown.clone(),
                exit_code: -1,
                stderr: format!("failed to execute: {e}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PreloaderError::Runtime {
                command: shown,
                exit_code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        for line in stdout.lines() {
            if self.config.debug {
                tracing::info!("{}", line);
            } else {
                tracing::trace!("{}", line);
            }
        }
        Ok(stdout)
    }
}

#[async_trait]
impl ImageRuntime for CtrRuntime {
    async fn list_images(&self) -> Result<Vec<CachedImage>> {
        let stdout = self.run(&["images", "list"]).await?;
        parse_image_list(&stdout)
    }

    async fn pull(&self, reference: &str) -> Result<()> {
        self.run(&["images", "pull", reference]).await.map(|_| ())
    }

    async fn export(&self, reference: &str, archive: &Path, platform: &str) -> Result<()> {
        let archive = archive.to_string_lossy();
        self.run(&["images", "export", "--platform", platform, &archive, reference])
            .await
            .map(|_| ())
    }
}

/// Parse `ctr images list` output.
///
/// Columns are `REF TYPE DIGEST SIZE PLATFORMS LABELS`; the header row and
/// blank lines are skipped.
pub fn parse_image_list(stdout: &str) -> Result<Vec<CachedImage>> {
    let mut images = Vec::new();
    for line in stdout.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            ["REF", ..] => continue,
            [reference, _kind, digest, ..] => images.push(CachedImage {
                reference: reference.to_string(),
                digest: digest.to_string(),
            }),
            _ => {
                return Err(PreloaderError::Other(format!(
                    "Unexpected line in ctr images list output: '{}'",
                    line
                )))
            }
        }
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const LISTING: &str = "\
REF                                       TYPE                                                 DIGEST                                                                  SIZE     PLATFORMS   LABELS
docker.io/library/busybox:1.36            application/vnd.docker.distribution.manifest.list.v2+json sha256:aaaa 2.1 MiB  linux/amd64 io.cri-containerd.image=managed
docker.io/library/busybox@sha256:aaaa     application/vnd.docker.distribution.manifest.list.v2+json sha256:aaaa 2.1 MiB  linux/amd64 io.cri-containerd.image=managed
registry.k8s.io/pause:3.9                 application/vnd.docker.distribution.manifest.list.v2+json sha256:bbbb 268.1 KiB linux/amd64 io.cri-containerd.image=managed,io.cri-containerd.pinned=pinned
";

    #[test]
    fn test_parse_image_list() {
        let images = parse_image_list(LISTING).unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].reference, "docker.io/library/busybox:1.36");
        assert_eq!(images[0].digest, "sha256:aaaa");
        assert_eq!(images[1].digest, "sha256:aaaa");
        assert_eq!(images[2].reference, "registry.k8s.io/pause:3.9");
        assert_eq!(images[2].digest, "sha256:bbbb");
    }

    #[test]
    fn test_parse_empty_listing() {
        let header_only = "REF TYPE DIGEST SIZE PLATFORMS LABELS\n\n";
        assert!(parse_image_list(header_only).unwrap().is_empty());
        assert!(parse_image_list("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_truncated_line_is_an_error() {
        let result = parse_image_list("docker.io/library/nginx:1 application/json\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_command_line_layout() {
        let runtime = CtrRuntime::new(CtrConfig::default());
        let argv = runtime.command_line(&["images", "pull", "docker.io/library/nginx"]);
        assert_eq!(
            argv,
            vec![
                "-n",
                "k8s.io",
                "-a",
                "/var/run/containerd/containerd.sock",
                "images",
                "pull",
                "docker.io/library/nginx"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_runtime_error() {
        let runtime = CtrRuntime::new(CtrConfig {
            path: PathBuf::from("/nonexistent/ctr"),
            ..Default::default()
        });
        let err = runtime.pull("docker.io/library/nginx").await.unwrap_err();
        assert!(matches!(err, PreloaderError::Runtime { exit_code: -1, .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_nonzero_exit_status_propagates() {
        // `false` ignores its arguments and exits 1
        let runtime = CtrRuntime::new(CtrConfig {
            path: PathBuf::from("false"),
            ..Default::default()
        });
        let err = runtime.list_images().await.unwrap_err();
        match err {
            PreloaderError::Runtime { exit_code, command, .. } => {
                assert_eq!(exit_code, 1);
                assert!(command.contains("images list"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
