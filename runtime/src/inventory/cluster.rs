//! Kubernetes-backed [`WorkloadInventory`].

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{Container, Namespace, Pod, PodSpec};
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use preloader_core::error::{PreloaderError, Result};

use super::{WorkloadImages, WorkloadInventory};

/// Lists namespaces, pods and cron jobs through the Kubernetes API.
#[derive(Clone)]
pub struct KubeInventory {
    client: Client,
}

impl KubeInventory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using in-cluster configuration, falling back to kubeconfig.
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default().await.map_err(|e| {
            PreloaderError::Inventory(format!("Failed to create Kubernetes client: {e}"))
        })?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl WorkloadInventory for KubeInventory {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| PreloaderError::Inventory(format!("Failed to list namespaces: {e}")))?;
        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<WorkloadImages>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await.map_err(|e| {
            PreloaderError::Inventory(format!("Failed to list pods in {namespace}: {e}"))
        })?;
        Ok(list
            .items
            .iter()
            .map(|pod| workload_images(pod.name_any(), pod.spec.as_ref()))
            .collect())
    }

    async fn list_cron_jobs(&self, namespace: &str) -> Result<Vec<WorkloadImages>> {
        let api: Api<CronJob> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await.map_err(|e| {
            PreloaderError::Inventory(format!("Failed to list cron jobs in {namespace}: {e}"))
        })?;
        Ok(list
            .items
            .iter()
            .map(|cron| {
                let spec = cron
                    .spec
                    .as_ref()
                    .and_then(|s| s.job_template.spec.as_ref())
                    .and_then(|s| s.template.spec.as_ref());
                workload_images(cron.name_any(), spec)
            })
            .collect())
    }
}

fn workload_images(name: String, spec: Option<&PodSpec>) -> WorkloadImages {
    let Some(spec) = spec else {
        return WorkloadImages {
            name,
            ..Default::default()
        };
    };
    WorkloadImages {
        name,
        init_containers: container_images(spec.init_containers.as_deref().unwrap_or_default()),
        containers: container_images(&spec.containers),
    }
}

/// Containers without an image (possible with image volumes or defaults
/// injected later) are skipped.
fn container_images(containers: &[Container]) -> Vec<String> {
    containers
        .iter()
        .filter_map(|c| c.image.as_deref())
        .filter(|image| !image.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(name: &str, image: Option<&str>) -> Container {
        Container {
            name: name.to_string(),
            image: image.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_workload_images_from_pod_spec() {
        let spec = PodSpec {
            init_containers: Some(vec![container("init", Some("busybox:1.36"))]),
            containers: vec![
                container("app", Some("acme/app:2")),
                container("sidecar", None),
                container("blank", Some(" ")),
            ],
            ..Default::default()
        };
        let images = workload_images("web-0".to_string(), Some(&spec));
        assert_eq!(images.name, "web-0");
        assert_eq!(images.init_containers, vec!["busybox:1.36"]);
        assert_eq!(images.containers, vec!["acme/app:2"]);
    }

    #[test]
    fn test_workload_images_without_spec() {
        let images = workload_images("pending".to_string(), None);
        assert!(images.images().next().is_none());
    }
}
