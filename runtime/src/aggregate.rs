//! Image source aggregation.
//!
//! Merges the local cache listing and the workload inventory (or an external
//! list) into one deduplicated set, in discovery order:
//!
//! ```text
//! cache listing ──► digest dedup ──► exclusions ──┐
//!                                                 ├──► ImageSet (ordered, unique refs)
//! namespaces ──► pods ──► cron jobs ──► normalize ──► exclusions ──┘
//! ```

use std::collections::HashSet;
use std::io::BufRead;
use std::sync::Arc;

use preloader_core::error::Result;
use preloader_core::{ExclusionRuleSet, ExportConfig, Image};

use crate::inventory::{WorkloadImages, WorkloadInventory};
use crate::oci::{DomainResolver, ImageRuntime, ReferenceNormalizer};

/// Ordered image set with unique references.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    images: Vec<Image>,
    seen: HashSet<String>,
}

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.seen.contains(reference)
    }

    /// Add an image unless its reference is already present.
    ///
    /// Returns `false` when the image was a duplicate; the first entry wins.
    pub fn insert(&mut self, image: Image) -> bool {
        if !self.seen.insert(image.reference.clone()) {
            return false;
        }
        self.images.push(image);
        true
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Image> {
        self.images.iter()
    }

    pub fn as_slice(&self) -> &[Image] {
        &self.images
    }

    pub fn into_vec(self) -> Vec<Image> {
        self.images
    }
}

impl<'a> IntoIterator for &'a ImageSet {
    type Item = &'a Image;
    type IntoIter = std::slice::Iter<'a, Image>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

/// Builds the image set for one export run.
pub struct Aggregator {
    exclusions: ExclusionRuleSet,
    cache_only: bool,
    normalizer: ReferenceNormalizer,
}

impl Aggregator {
    pub fn new(config: &ExportConfig, resolver: Arc<dyn DomainResolver>) -> Self {
        Self {
            exclusions: config.exclude.clone(),
            cache_only: config.cache_only,
            normalizer: ReferenceNormalizer::new(resolver),
        }
    }

    /// Cache entries first, then workload images unless running cache-only.
    ///
    /// Any inventory or runtime error aborts; no partial set is returned.
    pub async fn collect(
        &mut self,
        runtime: &dyn ImageRuntime,
        inventory: &dyn WorkloadInventory,
    ) -> Result<ImageSet> {
        let mut set = ImageSet::new();
        self.add_cached(runtime, &mut set).await?;
        if self.cache_only {
            tracing::info!("Cache-only mode, not listing workloads");
        } else {
            self.add_workloads(inventory, &mut set).await?;
        }
        tracing::info!(count = set.len(), "Image list resolved");
        Ok(set)
    }

    /// Add images from the local cache, deduplicated by digest.
    pub async fn add_cached(&self, runtime: &dyn ImageRuntime, set: &mut ImageSet) -> Result<()> {
        let cached = runtime.list_images().await?;
        let mut digests = HashSet::new();

        for entry in cached {
            if !digests.insert(entry.digest.clone()) {
                tracing::info!("Skipping {} (same digest as a previous image)", entry.reference);
                continue;
            }
            if let Some(rule) = self.exclusions.matching(&entry.reference) {
                tracing::info!("Excluding {} (matches {})", entry.reference, rule);
                continue;
            }
            let image = Image::cached(entry.reference);
            tracing::info!("Found {} in {}", image.reference, image.origin);
            set.insert(image);
        }
        Ok(())
    }

    /// Add images referenced by pods and cron jobs in every namespace.
    pub async fn add_workloads(
        &mut self,
        inventory: &dyn WorkloadInventory,
        set: &mut ImageSet,
    ) -> Result<()> {
        let namespaces = inventory.list_namespaces().await?;
        for namespace in &namespaces {
            tracing::info!("Listing pods in {}...", namespace);
            for pod in inventory.list_pods(namespace).await? {
                self.add_workload(&pod, set).await?;
            }

            tracing::info!("Listing cron jobs in {}...", namespace);
            for cron in inventory.list_cron_jobs(namespace).await? {
                self.add_workload(&cron, set).await?;
            }
        }
        Ok(())
    }

    async fn add_workload(&mut self, workload: &WorkloadImages, set: &mut ImageSet) -> Result<()> {
        for raw in workload.images() {
            let reference = match self.normalizer.normalize(raw).await {
                Ok(reference) => reference,
                Err(e) => {
                    tracing::warn!("Skipping {} in {}: {}", raw, workload.name, e);
                    continue;
                }
            };
            if self.exclusions.excludes(&reference) {
                tracing::debug!(reference = %reference, workload = %workload.name, "Excluded");
                continue;
            }
            if set.contains(&reference) {
                continue;
            }
            let image = Image::from_workload(reference);
            tracing::info!("Found {} in {}", image.reference, image.origin);
            set.insert(image);
        }
        Ok(())
    }

    /// Build the set from a newline-delimited reference list.
    ///
    /// Blank lines and `#` comments are ignored. References are used as
    /// given, without normalization.
    pub fn from_list<R: BufRead>(&self, reader: R) -> Result<ImageSet> {
        let mut set = ImageSet::new();
        for line in reader.lines() {
            let line = line?;
            let reference = line.trim();
            if reference.is_empty() || reference.starts_with('#') {
                continue;
            }
            if let Some(rule) = self.exclusions.matching(reference) {
                tracing::info!("Excluding {} (matches {})", reference, rule);
                continue;
            }
            let image = Image::from_list(reference);
            if set.contains(&image.reference) {
                tracing::info!("Skipping duplicate {}", image.reference);
                continue;
            }
            tracing::info!("Found {} in {}", image.reference, image.origin);
            set.insert(image);
        }
        Ok(set)
    }
}
