//! Image data model shared by the aggregator and the exporter.

use serde::{Deserialize, Serialize};

/// Which discovery source produced an image entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Listed from the local runtime content store.
    Cache,
    /// Found in a pod or cron job spec.
    Workload,
    /// Read from a newline-delimited list.
    ExternalList,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache => write!(f, "local cache"),
            Self::Workload => write!(f, "pod spec"),
            Self::ExternalList => write!(f, "image list"),
        }
    }
}

/// An image that should be resident on the node.
///
/// Identity is the fully-qualified `reference`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub reference: String,
    pub origin: Origin,
    /// Already present in the runtime content store; no pull required.
    pub cached_locally: bool,
}

impl Image {
    pub fn cached(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            origin: Origin::Cache,
            cached_locally: true,
        }
    }

    pub fn from_workload(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            origin: Origin::Workload,
            cached_locally: false,
        }
    }

    pub fn from_list(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            origin: Origin::ExternalList,
            cached_locally: false,
        }
    }
}

/// One row of the runtime's image listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedImage {
    pub reference: String,
    /// Content digest (e.g., "sha256:abc123...")
    pub digest: String,
}

/// Ordered set of reference prefixes to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionRuleSet {
    prefixes: Vec<String>,
}

impl ExclusionRuleSet {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Return the first rule matching `reference`, if any.
    pub fn matching(&self, reference: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|prefix| reference.starts_with(prefix.as_str()))
            .map(String::as_str)
    }

    pub fn excludes(&self, reference: &str) -> bool {
        self.matching(reference).is_some()
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
