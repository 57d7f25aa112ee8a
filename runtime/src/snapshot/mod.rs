//! Snapshot provisioning.
//!
//! Submits a snapshot request for the volume holding the exports and waits
//! until the backend reports a durable handle.
//!
//! ```text
//! Requested ──submit──► Pending ──poll (backoff)──► Ready(handle)
//!     │                    │
//!     └──── error ─────────┴──── error / timeout / cancel ──► Failed
//! ```

mod cluster;

pub use cluster::KubeSnapshotBackend;

use std::time::Duration;

use async_trait::async_trait;
use preloader_core::error::{PreloaderError, Result};
use preloader_core::{PollPolicy, SnapshotConfig};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline used when the configured timeout does not fit in an `Instant`.
const MAX_WAIT: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Request for a snapshot of one volume claim. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub source_volume_claim: String,
    pub snapshot_class_name: String,
    pub name: String,
    pub namespace: String,
}

impl SnapshotRequest {
    pub fn from_config(config: &SnapshotConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source_volume_claim: config.pvc.clone(),
            snapshot_class_name: config.class.clone(),
            name: config.name.clone(),
            namespace: config.namespace.clone(),
        })
    }
}

/// Snapshot status as observed on the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotStatus {
    pub ready: bool,
    pub handle: Option<String>,
}

impl SnapshotStatus {
    /// The handle, once the backend has reported a non-empty one.
    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref().filter(|h| !h.is_empty())
    }
}

/// Provisioning state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotState {
    Requested,
    Pending,
    Ready(String),
    Failed,
}

impl SnapshotState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed)
    }
}

/// Storage snapshot backend.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Submit a snapshot request, returning the status of the created object.
    ///
    /// Names are not idempotent: a second request with the same name fails.
    async fn create(&self, request: &SnapshotRequest) -> Result<SnapshotStatus>;

    /// Fetch the current status of a snapshot by name.
    async fn status(&self, name: &str, namespace: &str) -> Result<SnapshotStatus>;
}

/// Drives one request through the provisioning state machine.
///
/// Read errors are not retried; only unready polls are, with exponential
/// backoff bounded by the policy deadline.
pub struct SnapshotProvisioner<'a> {
    backend: &'a dyn SnapshotBackend,
    policy: PollPolicy,
    cancel: CancellationToken,
    state: SnapshotState,
    polls: u32,
}

impl<'a> SnapshotProvisioner<'a> {
    pub fn new(backend: &'a dyn SnapshotBackend, policy: PollPolicy) -> Self {
        Self {
            backend,
            policy,
            cancel: CancellationToken::new(),
            state: SnapshotState::Requested,
            polls: 0,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> &SnapshotState {
        &self.state
    }

    /// Number of status polls issued after submission.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Submit `request` and wait for its handle.
    pub async fn provision(&mut self, request: &SnapshotRequest) -> Result<String> {
        if self.state != SnapshotState::Requested {
            return Err(PreloaderError::Snapshot(
                "provisioner already used for a request".to_string(),
            ));
        }
        self.policy.validate()?;

        tracing::info!(
            name = %request.name,
            namespace = %request.namespace,
            pvc = %request.source_volume_claim,
            class = %request.snapshot_class_name,
            "Creating snapshot"
        );
        let created = match self.backend.create(request).await {
            Ok(status) => status,
            Err(e) => return Err(self.fail(e)),
        };
        self.transition(SnapshotState::Pending);

        if let Some(handle) = created.handle() {
            return Ok(self.ready(handle));
        }
        self.wait(request).await
    }

    async fn wait(&mut self, request: &SnapshotRequest) -> Result<String> {
        let backend = self.backend;
        let cancel = self.cancel.clone();
        let policy = self.policy.clone();
        let now = Instant::now();
        let deadline = now
            .checked_add(policy.deadline())
            .unwrap_or_else(|| now + MAX_WAIT);
        let mut attempt = 0u32;

        loop {
            self.polls += 1;
            let poll = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(cancelled(request)),
                result = tokio::time::timeout_at(
                    deadline,
                    backend.status(&request.name, &request.namespace),
                ) => result.unwrap_or_else(|_| Err(timed_out(request, &policy))),
            };
            let status = match poll {
                Ok(status) => status,
                Err(e) => return Err(self.fail(e)),
            };
            if let Some(handle) = status.handle() {
                return Ok(self.ready(handle));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.fail(timed_out(request, &policy)));
            }
            let delay = policy.delay_for(attempt).min(deadline - now);
            attempt = attempt.saturating_add(1);
            tracing::debug!(
                name = %request.name,
                ready = status.ready,
                poll = self.polls,
                delay = ?delay,
                "Snapshot not ready"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.fail(cancelled(request))),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn ready(&mut self, handle: &str) -> String {
        tracing::info!(handle, polls = self.polls, "Snapshot ready");
        self.transition(SnapshotState::Ready(handle.to_string()));
        handle.to_string()
    }

    fn fail(&mut self, error: PreloaderError) -> PreloaderError {
        tracing::warn!(error = %error, "Snapshot provisioning failed");
        self.transition(SnapshotState::Failed);
        error
    }

    fn transition(&mut self, next: SnapshotState) {
        tracing::debug!(from = ?self.state, to = ?next, "Snapshot state");
        self.state = next;
    }
}

fn cancelled(request: &SnapshotRequest) -> PreloaderError {
    PreloaderError::Cancelled(format!("waiting for snapshot {}", request.name))
}

fn timed_out(request: &SnapshotRequest, policy: &PollPolicy) -> PreloaderError {
    PreloaderError::Timeout(format!(
        "snapshot {}/{} not ready after {}s",
        request.namespace, request.name, policy.timeout_secs
    ))
}
