//! CSI external-snapshotter backend (`snapshot.storage.k8s.io/v1`).

use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, PostParams};
use kube::{Api, Client};
use preloader_core::error::{PreloaderError, Result};
use serde::Deserialize;
use serde_json::json;

use super::{SnapshotBackend, SnapshotRequest, SnapshotStatus};

const GROUP: &str = "snapshot.storage.k8s.io";
const VERSION: &str = "v1";

fn volume_snapshot() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(GROUP, VERSION, "VolumeSnapshot"))
}

fn volume_snapshot_content() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(GROUP, VERSION, "VolumeSnapshotContent"))
}

/// `VolumeSnapshot.status`, restricted to the fields the preloader reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeSnapshotStatus {
    ready_to_use: Option<bool>,
    bound_volume_snapshot_content_name: Option<String>,
    volume_group_snapshot_name: Option<String>,
    error: Option<VolumeSnapshotError>,
}

#[derive(Debug, Default, Deserialize)]
struct VolumeSnapshotError {
    message: Option<String>,
}

/// Creates and watches `VolumeSnapshot` objects.
#[derive(Clone)]
pub struct KubeSnapshotBackend {
    client: Client,
}

impl KubeSnapshotBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using in-cluster configuration, falling back to kubeconfig.
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default().await.map_err(|e| {
            PreloaderError::Snapshot(format!("Failed to create Kubernetes client: {e}"))
        })?;
        Ok(Self::new(client))
    }

    fn snapshots(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &volume_snapshot())
    }

    /// Resolve the storage-level `snapshotHandle` of a bound snapshot content.
    ///
    /// Returns `None` when no content object carries that name, e.g. when the
    /// handle is a group snapshot name.
    pub async fn storage_handle(&self, content_name: &str) -> Result<Option<String>> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &volume_snapshot_content());
        let content = api.get_opt(content_name).await.map_err(|e| {
            PreloaderError::Snapshot(format!(
                "Failed to get VolumeSnapshotContent {content_name}: {e}"
            ))
        })?;
        Ok(content.and_then(|c| {
            c.data
                .pointer("/status/snapshotHandle")
                .and_then(|h| h.as_str())
                .map(str::to_string)
        }))
    }
}

#[async_trait]
impl SnapshotBackend for KubeSnapshotBackend {
    async fn create(&self, request: &SnapshotRequest) -> Result<SnapshotStatus> {
        let object = snapshot_object(request);
        let created = self
            .snapshots(&request.namespace)
            .create(&PostParams::default(), &object)
            .await
            .map_err(|e| {
                PreloaderError::Snapshot(format!(
                    "Failed to create VolumeSnapshot {}/{}: {e}",
                    request.namespace, request.name
                ))
            })?;
        parse_status(&created.data)
    }

    async fn status(&self, name: &str, namespace: &str) -> Result<SnapshotStatus> {
        let object = self.snapshots(namespace).get(name).await.map_err(|e| {
            PreloaderError::Snapshot(format!("Failed to get VolumeSnapshot {namespace}/{name}: {e}"))
        })?;
        parse_status(&object.data)
    }
}

fn snapshot_object(request: &SnapshotRequest) -> DynamicObject {
    DynamicObject::new(&request.name, &volume_snapshot())
        .within(&request.namespace)
        .data(json!({
            "spec": {
                "source": {
                    "persistentVolumeClaimName": request.source_volume_claim,
                },
                "volumeSnapshotClassName": request.snapshot_class_name,
            }
        }))
}

/// Map the object's status to a [`SnapshotStatus`].
///
/// The handle is the group snapshot name when present, otherwise the bound
/// content name once the snapshot is ready to use.
fn parse_status(data: &serde_json::Value) -> Result<SnapshotStatus> {
    let status: VolumeSnapshotStatus = match data.get("status") {
        Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
        _ => return Ok(SnapshotStatus::default()),
    };

    if let Some(message) = status.error.as_ref().and_then(|e| e.message.as_deref()) {
        tracing::warn!(message, "Snapshot controller reported an error");
    }

    let ready = status.ready_to_use.unwrap_or(false);
    let handle = status
        .volume_group_snapshot_name
        .filter(|name| !name.is_empty())
        .or_else(|| {
            status
                .bound_volume_snapshot_content_name
                .filter(|name| ready && !name.is_empty())
        });
    Ok(SnapshotStatus { ready, handle })
}
