// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Target Entity Resolution
//!
//! Maps a request path to the identities it addresses. Resolvers are keyed by
//! a versioned path prefix: the first two segments (`v1/networks`) are tried
//! before the first segment alone. The segment following the prefix is the
//! entity id.
//!
//! Paths that match no resolver, or that cannot be parsed, resolve to
//! [`Identity::supervisor_wildcards`]. Read-only requests under a static
//! prefix address nothing.

use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::AuthorityError;
use crate::domain::identity::{Identity, IdentityCategory};

pub trait EntityResolver: Send + Sync {
    /// Targets for the entity addressed by `id`, or for the whole category
    /// when the path stops at the collection.
    fn resolve(&self, id: Option<&str>) -> Result<Vec<Identity>, AuthorityError>;
}

pub struct NetworkResolver;

impl EntityResolver for NetworkResolver {
    fn resolve(&self, id: Option<&str>) -> Result<Vec<Identity>, AuthorityError> {
        Ok(vec![match id {
            Some(id) => Identity::new_network(id)?,
            None => Identity::wildcard(IdentityCategory::Network),
        }])
    }
}

pub struct OperatorResolver;

impl EntityResolver for OperatorResolver {
    fn resolve(&self, id: Option<&str>) -> Result<Vec<Identity>, AuthorityError> {
        Ok(vec![match id {
            Some(id) => Identity::new_operator(id)?,
            None => Identity::wildcard(IdentityCategory::Operator),
        }])
    }
}

pub struct EntityResolverRegistry {
    resolvers: HashMap<String, Arc<dyn EntityResolver>>,
    static_prefixes: Vec<Vec<String>>,
}

impl EntityResolverRegistry {
    pub fn new() -> Self {
        Self {
            resolvers: HashMap::new(),
            static_prefixes: Vec::new(),
        }
    }

    /// `v1/networks` and `v1/operators` resolvers plus the given static prefixes.
    pub fn with_defaults(static_prefixes: &[String]) -> Self {
        let mut registry = Self::new();
        registry.register("v1/networks", Arc::new(NetworkResolver));
        registry.register("v1/operators", Arc::new(OperatorResolver));
        for prefix in static_prefixes {
            registry.add_static_prefix(prefix);
        }
        registry
    }

    pub fn register(&mut self, prefix: &str, resolver: Arc<dyn EntityResolver>) {
        self.resolvers
            .insert(prefix.trim_matches('/').to_string(), resolver);
    }

    pub fn add_static_prefix(&mut self, prefix: &str) {
        let segments: Vec<String> = prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !segments.is_empty() {
            self.static_prefixes.push(segments);
        }
    }

    pub fn resolve(&self, path: &str, read_only: bool) -> Result<Vec<Identity>, AuthorityError> {
        let Some(segments) = split_path(path) else {
            return Ok(Identity::supervisor_wildcards());
        };

        if read_only && self.is_static(&segments) {
            return Ok(Vec::new());
        }

        if segments.len() >= 2 {
            let key = format!("{}/{}", segments[0], segments[1]);
            if let Some(resolver) = self.resolvers.get(&key) {
                return resolver.resolve(segments.get(2).map(String::as_str));
            }
        }
        if let Some(first) = segments.first() {
            if let Some(resolver) = self.resolvers.get(first.as_str()) {
                return resolver.resolve(segments.get(1).map(String::as_str));
            }
        }
        Ok(Identity::supervisor_wildcards())
    }

    fn is_static(&self, segments: &[String]) -> bool {
        self.static_prefixes.iter().any(|prefix| {
            prefix.len() <= segments.len()
                && prefix.iter().zip(segments).all(|(p, s)| p == s)
        })
    }
}

impl Default for EntityResolverRegistry {
    fn default() -> Self {
        Self::with_defaults(&[])
    }
}

/// Percent-decoded path segments, matching what the router's `Path`
/// extractor hands to handlers. `None` for paths that do not parse: empty
/// segments in the middle, dot segments, a missing leading slash, or a
/// segment that is not valid UTF-8 or decodes to a `/`.
fn split_path(path: &str) -> Option<Vec<String>> {
    let rest = path.strip_prefix('/')?;
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() {
        return None;
    }
    rest.split('/')
        .map(|raw| {
            let segment = percent_decode_str(raw).decode_utf8().ok()?;
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('/') {
                return None;
            }
            Some(segment.into_owned())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EntityResolverRegistry {
        EntityResolverRegistry::with_defaults(&["v1/ca".to_string()])
    }

    #[test]
    fn test_resolves_registered_prefixes() {
        let r = registry();
        assert_eq!(
            r.resolve("/v1/networks/n1", false).unwrap(),
            vec![Identity::new_network("n1").unwrap()]
        );
        assert_eq!(
            r.resolve("/v1/networks/n1/gateways/g1", false).unwrap(),
            vec![Identity::new_network("n1").unwrap()]
        );
        assert_eq!(
            r.resolve("/v1/operators/bob/acl", true).unwrap(),
            vec![Identity::new_operator("bob").unwrap()]
        );
        assert_eq!(
            r.resolve("/v1/networks", true).unwrap(),
            vec![Identity::new_network_wildcard()]
        );
    }

    #[test]
    fn test_single_segment_fallback() {
        let mut r = EntityResolverRegistry::new();
        r.register("networks", Arc::new(NetworkResolver));
        assert_eq!(
            r.resolve("/networks/n7", false).unwrap(),
            vec![Identity::new_network("n7").unwrap()]
        );
    }

    #[test]
    fn test_unknown_and_unparsable_paths_require_supervisor() {
        let r = registry();
        for path in ["/v1/certificates", "/v2/networks/n1", "", "/", "v1/networks/n1", "/v1//networks", "/v1/../networks"] {
            assert_eq!(
                r.resolve(path, true).unwrap(),
                Identity::supervisor_wildcards(),
                "path {path:?}"
            );
        }
    }

    #[test]
    fn test_static_prefix_only_for_reads() {
        let r = registry();
        assert!(r.resolve("/v1/ca/default", true).unwrap().is_empty());
        assert_eq!(
            r.resolve("/v1/ca/default", false).unwrap(),
            Identity::supervisor_wildcards()
        );
        // Prefix matches whole segments only.
        assert_eq!(
            r.resolve("/v1/cab", true).unwrap(),
            Identity::supervisor_wildcards()
        );
    }

    #[test]
    fn test_encoded_segments_are_decoded() {
        let r = registry();
        assert_eq!(
            r.resolve("/v1/operators/bo%62/acl", false).unwrap(),
            vec![Identity::new_operator("bob").unwrap()]
        );
        assert_eq!(
            r.resolve("/v1/operators/bo%2562", false).unwrap(),
            vec![Identity::new_operator("bo%62").unwrap()]
        );
        assert_eq!(
            r.resolve("/v1/%6Eetworks/n1", true).unwrap(),
            vec![Identity::new_network("n1").unwrap()]
        );
        assert!(r.resolve("/v1/c%61/default", true).unwrap().is_empty());
    }

    #[test]
    fn test_undecodable_segments_require_supervisor() {
        let r = registry();
        for path in [
            "/v1/operators/a%2Fb/acl",
            "/v1/operators/%2e%2e/acl",
            "/v1/operators/%FF/acl",
            "/v1/operators/%00%2F",
        ] {
            assert_eq!(
                r.resolve(path, false).unwrap(),
                Identity::supervisor_wildcards(),
                "path {path:?}"
            );
        }
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        assert!(matches!(
            registry().resolve("/v1/networks/a:b", true),
            Err(AuthorityError::InvalidArgument(_))
        ));
    }
}
