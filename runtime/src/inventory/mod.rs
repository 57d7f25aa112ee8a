//! Workload inventory: where pod and cron job images are discovered.

mod cluster;

pub use cluster::KubeInventory;

use async_trait::async_trait;
use preloader_core::error::Result;

/// Container images declared by one workload object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadImages {
    /// Object name, for log context
    pub name: String,
    pub init_containers: Vec<String>,
    pub containers: Vec<String>,
}

impl WorkloadImages {
    /// Images in discovery order: init containers, then regular containers.
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.init_containers
            .iter()
            .chain(self.containers.iter())
            .map(String::as_str)
    }
}

/// Source of running and scheduled workloads.
///
/// Every error is fatal to the caller; implementations must not return
/// partial listings.
#[async_trait]
pub trait WorkloadInventory: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<WorkloadImages>>;

    /// Job templates of the namespace's cron jobs.
    async fn list_cron_jobs(&self, namespace: &str) -> Result<Vec<WorkloadImages>>;
}
