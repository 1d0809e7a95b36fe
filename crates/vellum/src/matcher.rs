use crate::manifest::{ManifestRouteEntry, NotFoundEntry, RouteManifest};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use vellum_router::route::pattern::pattern_shape;
use vellum_router::trie::SegmentTrie;
use vellum_router::Params;

/// A manifest entry resolved for a request path
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestMatch<'a> {
    pub entry: &'a ManifestRouteEntry,
    pub params: Params,
}

/// Production matcher built from a persisted manifest
///
/// Uses the same [`SegmentTrie`] as the dev-time router, keyed by each
/// entry's `pattern`, so both resolve every path identically. The matcher
/// never touches the filesystem.
#[derive(Debug, Clone)]
pub struct Matcher {
    entries: Vec<ManifestRouteEntry>,
    trie: SegmentTrie<usize>,
    not_found: Option<NotFoundEntry>,
}

impl Matcher {
    pub fn from_manifest(manifest: &RouteManifest) -> Result<Self> {
        Ok(build_matcher(manifest.routes.values().cloned())?.with_not_found(manifest.not_found.clone()))
    }

    pub fn with_not_found(mut self, not_found: Option<NotFoundEntry>) -> Self {
        self.not_found = not_found;
        self
    }

    /// The compiled root `404` page, if the build had one
    pub fn not_found(&self) -> Option<&NotFoundEntry> {
        self.not_found.as_ref()
    }

    /// Resolves `path` to an entry and its parameters
    pub fn match_path(&self, path: &str) -> Option<ManifestMatch<'_>> {
        let (&index, params) = self.trie.find(path)?;
        Some(ManifestMatch {
            entry: &self.entries[index],
            params,
        })
    }

    pub fn entries(&self) -> &[ManifestRouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds a [`Matcher`] from manifest entries
///
/// Fails when two entries share a pattern shape, which a manifest written by
/// a successful build never contains.
///
/// # Examples
///
/// ```
/// use vellum::manifest::ManifestRouteEntry;
/// use vellum::matcher::build_matcher;
/// use vellum_router::{RouteNode, RouteType};
///
/// let entries = ["/docs", "/docs/[...path]"]
///     .iter()
///     .map(|id| ManifestRouteEntry::from_route(&RouteNode::new(*id, RouteType::Page, "page.tsx")));
/// let matcher = build_matcher(entries).unwrap();
///
/// let m = matcher.match_path("/docs/a/b").unwrap();
/// assert_eq!(m.entry.id, "/docs/[...path]");
/// assert_eq!(m.params["path"], "a/b");
/// ```
pub fn build_matcher<I>(entries: I) -> Result<Matcher>
where
    I: IntoIterator<Item = ManifestRouteEntry>,
{
    let entries: Vec<ManifestRouteEntry> = entries.into_iter().collect();
    let mut shapes: HashMap<String, &str> = HashMap::new();
    let mut trie = SegmentTrie::new();

    for (i, entry) in entries.iter().enumerate() {
        if let Some(first) = shapes.insert(pattern_shape(&entry.pattern), &entry.id) {
            return Err(anyhow!(
                "route collision in manifest: {} and {} both resolve to {}",
                first,
                entry.id,
                entry.pattern
            ));
        }
        trie.insert(&entry.pattern, i)
            .map_err(|err| anyhow!("invalid pattern {} in manifest: {}", entry.pattern, err))?;
    }

    Ok(Matcher {
        entries,
        trie,
        not_found: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_router::{RouteNode, RouteType, Router};

    const IDS: [&str; 8] = [
        "/",
        "/about",
        "/blog",
        "/blog/[slug]",
        "/blog/new",
        "/docs",
        "/docs/[...path]",
        "/a/[x]/edit",
    ];

    fn nodes() -> Vec<RouteNode> {
        IDS.iter()
            .map(|id| RouteNode::new(*id, RouteType::Page, format!("routes{}/page.tsx", id)))
            .collect()
    }

    #[test]
    fn test_agrees_with_router() {
        let router = Router::from_parts(nodes(), Vec::new(), None).unwrap();
        let matcher = build_matcher(nodes().iter().map(ManifestRouteEntry::from_route)).unwrap();

        let paths = [
            "/", "/about", "/about/", "/blog", "/blog/new", "/blog/x", "/blog/x/y", "/docs",
            "/docs/", "/docs/a", "/docs/a/b/c", "/a/1/edit", "/a/1/view", "/missing",
        ];
        for path in paths {
            let expected = router
                .match_route(path)
                .map(|m| (m.route.id.clone(), m.params));
            let actual = matcher
                .match_path(path)
                .map(|m| (m.entry.id.clone(), m.params));
            assert_eq!(actual, expected, "disagreement on {}", path);
        }
    }

    #[test]
    fn test_collision_in_manifest() {
        let entries = ["/blog/[slug]", "/blog/[id]"].iter().map(|id| {
            ManifestRouteEntry::from_route(&RouteNode::new(*id, RouteType::Page, "page.tsx"))
        });
        let err = build_matcher(entries).unwrap_err();
        assert!(err.to_string().contains("collision"));
    }
}
