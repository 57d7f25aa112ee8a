//! Image reference normalization.
//!
//! Qualifies image strings found in container specs the way image-pulling
//! clients do, so `nginx` in a pod spec compares equal to
//! `docker.io/library/nginx` in the local cache.

use std::collections::HashMap;
use std::sync::Arc;

use preloader_core::error::{PreloaderError, Result};

use super::resolver::DomainResolver;

/// Default registry when none is specified.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Namespace of official images on the default registry.
const OFFICIAL_NAMESPACE: &str = "library";

/// Qualifies raw image strings into fully-qualified references.
///
/// Domain lookups are remembered per registry host for the lifetime of the
/// normalizer.
pub struct ReferenceNormalizer {
    resolver: Arc<dyn DomainResolver>,
    verdicts: HashMap<String, bool>,
}

impl ReferenceNormalizer {
    pub fn new(resolver: Arc<dyn DomainResolver>) -> Self {
        Self {
            resolver,
            verdicts: HashMap::new(),
        }
    }

    /// Produce a fully-qualified reference.
    ///
    /// - `nginx` → `docker.io/library/nginx`
    /// - `acme/app` → `docker.io/acme/app`
    /// - `myregistry.example.com/app:1` → unchanged when the host resolves
    pub async fn normalize(&mut self, raw: &str) -> Result<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PreloaderError::InvalidReference(
                "Empty image reference".to_string(),
            ));
        }

        let Some((first, rest)) = raw.split_once('/') else {
            return Ok(format!("{DEFAULT_REGISTRY}/{OFFICIAL_NAMESPACE}/{raw}"));
        };
        if rest.is_empty() {
            return Err(PreloaderError::InvalidReference(format!(
                "Empty repository in reference '{}'",
                raw
            )));
        }

        if self.is_registry(first).await {
            Ok(raw.to_string())
        } else {
            Ok(format!("{DEFAULT_REGISTRY}/{raw}"))
        }
    }

    /// Decide whether the first path segment names a registry.
    async fn is_registry(&mut self, first: &str) -> bool {
        if looks_qualified(first) {
            return true;
        }
        if !first.contains('.') {
            return false;
        }
        if let Some(verdict) = self.verdicts.get(first) {
            return *verdict;
        }
        let verdict = self.resolver.is_domain(first).await;
        if !verdict {
            tracing::debug!(host = first, "Not a resolvable domain, using default registry");
        }
        self.verdicts.insert(first.to_string(), verdict);
        verdict
    }
}

/// Registry hosts recognisable without a lookup: the default registry,
/// `localhost` and anything carrying a port.
fn looks_qualified(first: &str) -> bool {
    first == DEFAULT_REGISTRY || first == "localhost" || first.contains(':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::resolver::StaticResolver;

    fn normalizer(domains: &[&str]) -> ReferenceNormalizer {
        ReferenceNormalizer::new(Arc::new(StaticResolver::new(domains.iter().copied())))
    }

    #[tokio::test]
    async fn test_bare_name_goes_to_library() {
        let mut n = normalizer(&[]);
        assert_eq!(n.normalize("nginx").await.unwrap(), "docker.io/library/nginx");
        assert_eq!(
            n.normalize("nginx:1.25").await.unwrap(),
            "docker.io/library/nginx:1.25"
        );
    }

    #[tokio::test]
    async fn test_bare_host_name_is_a_library_image() {
        let resolver = Arc::new(StaticResolver::new(["registry.example.com"]));
        let mut n = ReferenceNormalizer::new(resolver.clone());
        assert_eq!(
            n.normalize("registry.example.com").await.unwrap(),
            "docker.io/library/registry.example.com"
        );
        assert_eq!(resolver.lookups(), 0);
    }

    #[tokio::test]
    async fn test_user_repo_goes_to_default_registry() {
        let mut n = normalizer(&[]);
        assert_eq!(n.normalize("acme/app").await.unwrap(), "docker.io/acme/app");
    }

    #[tokio::test]
    async fn test_resolvable_registry_unchanged() {
        let mut n = normalizer(&["myregistry.example.com"]);
        assert_eq!(
            n.normalize("myregistry.example.com/app:1").await.unwrap(),
            "myregistry.example.com/app:1"
        );
    }

    #[tokio::test]
    async fn test_unresolvable_dotted_segment_is_a_namespace() {
        let mut n = normalizer(&[]);
        assert_eq!(
            n.normalize("my.org/app").await.unwrap(),
            "docker.io/my.org/app"
        );
    }

    #[tokio::test]
    async fn test_qualified_without_lookup() {
        let mut n = normalizer(&[]);
        assert_eq!(
            n.normalize("docker.io/library/busybox").await.unwrap(),
            "docker.io/library/busybox"
        );
        assert_eq!(
            n.normalize("localhost/myimage:test").await.unwrap(),
            "localhost/myimage:test"
        );
        assert_eq!(
            n.normalize("registry:5000/team/app").await.unwrap(),
            "registry:5000/team/app"
        );
    }

    #[tokio::test]
    async fn test_lookup_happens_once_per_host() {
        let resolver = Arc::new(StaticResolver::new(["ghcr.io"]));
        let mut n = ReferenceNormalizer::new(resolver.clone());
        n.normalize("ghcr.io/org/a").await.unwrap();
        n.normalize("ghcr.io/org/b").await.unwrap();
        n.normalize("quay.io/org/c").await.unwrap();
        n.normalize("quay.io/org/d").await.unwrap();
        assert_eq!(resolver.lookups(), 2);
    }

    #[tokio::test]
    async fn test_whitespace_trimmed() {
        let mut n = normalizer(&[]);
        assert_eq!(n.normalize("  redis  ").await.unwrap(), "docker.io/library/redis");
    }

    #[tokio::test]
    async fn test_empty_reference_rejected() {
        let mut n = normalizer(&[]);
        assert!(matches!(
            n.normalize("   ").await,
            Err(PreloaderError::InvalidReference(_))
        ));
        assert!(n.normalize("ghcr.io/").await.is_err());
    }
}
