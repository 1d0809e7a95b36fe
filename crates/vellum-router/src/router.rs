use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::RouteError;
use crate::route::parser::{parse_route_id_lossy, specificity};
use crate::route::pattern::pattern_shape;
use crate::trie::{SegmentTrie, TrieError};
use crate::{Params, RouteNode, ScanResult, ScannedLayout};

/// Result of resolving a request path
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch<'a> {
    pub route: &'a RouteNode,
    pub params: Params,
    /// Layout chain, outermost first
    pub layouts: Vec<&'a ScannedLayout>,
}

/// Plain, serializable form of a [`Router`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterSnapshot {
    pub routes: Vec<RouteNode>,
    pub layouts: Vec<ScannedLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found_page: Option<PathBuf>,
}

/// Immutable route graph built from one scan
///
/// The router keeps:
/// - routes ordered by specificity (static, then dynamic, then catch-all)
/// - an id → route index for `get`
/// - layouts by id, for resolving layout chains
/// - a [`SegmentTrie`] mapping patterns to route indices
///
/// A file-system change never mutates a router; callers build a new one.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<RouteNode>,
    by_id: HashMap<String, usize>,
    layouts: Vec<ScannedLayout>,
    layouts_by_id: HashMap<String, usize>,
    not_found_page: Option<PathBuf>,
    trie: SegmentTrie<usize>,
}

impl Router {
    /// Builds a router from a scan
    ///
    /// Collisions are checked again here, so a router is always consistent
    /// no matter where its routes came from.
    pub fn new(scan: &ScanResult) -> Result<Self, RouteError> {
        Self::from_parts(
            scan.routes.clone(),
            scan.layouts.clone(),
            scan.not_found_page.clone(),
        )
    }

    /// Builds a router from explicit route and layout lists
    ///
    /// # Errors
    ///
    /// - [`RouteError::Collision`] when two routes share a pattern shape
    /// - [`RouteError::LayoutCollision`] when two layouts share an id
    /// - [`RouteError::InvalidPattern`] when a pattern cannot be stored
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_router::{Router, RouteNode, RouteType};
    ///
    /// let routes = vec![
    ///     RouteNode::new("/blog/[slug]", RouteType::Page, "a/page.tsx"),
    ///     RouteNode::new("/blog/[id]", RouteType::Page, "b/page.tsx"),
    /// ];
    /// let err = Router::from_parts(routes, Vec::new(), None).unwrap_err();
    /// assert!(err.to_string().contains("collision"));
    /// ```
    pub fn from_parts(
        mut routes: Vec<RouteNode>,
        layouts: Vec<ScannedLayout>,
        not_found_page: Option<PathBuf>,
    ) -> Result<Self, RouteError> {
        routes.sort_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.id.cmp(&b.id)));

        let mut shapes: HashMap<String, &Path> = HashMap::new();
        for route in &routes {
            if let Some(first) = shapes.insert(pattern_shape(&route.pattern), &route.file_path) {
                return Err(RouteError::Collision {
                    pattern: route.pattern.clone(),
                    first: first.to_path_buf(),
                    second: route.file_path.clone(),
                });
            }
        }

        let mut layouts_by_id = HashMap::new();
        for (i, layout) in layouts.iter().enumerate() {
            if let Some(first) = layouts_by_id.insert(layout.id.clone(), i) {
                return Err(RouteError::LayoutCollision {
                    id: layout.id.clone(),
                    first: layouts[first].file_path.clone(),
                    second: layout.file_path.clone(),
                });
            }
        }

        let mut trie = SegmentTrie::new();
        let mut by_id = HashMap::with_capacity(routes.len());
        for (i, route) in routes.iter().enumerate() {
            trie.insert(&route.pattern, i)
                .map_err(|err: TrieError| RouteError::InvalidPattern {
                    pattern: route.pattern.clone(),
                    reason: err.to_string(),
                })?;
            by_id.insert(route.id.clone(), i);
        }

        Ok(Self {
            routes,
            by_id,
            layouts,
            layouts_by_id,
            not_found_page,
            trie,
        })
    }

    /// Rebuilds a router from a snapshot
    pub fn from_snapshot(snapshot: RouterSnapshot) -> Result<Self, RouteError> {
        Self::from_parts(snapshot.routes, snapshot.layouts, snapshot.not_found_page)
    }

    /// Resolves a request path
    ///
    /// Static segments outrank dynamic segments, which outrank catch-alls.
    /// A catch-all needs at least one segment to consume.
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_router::{Router, RouteNode, RouteType};
    ///
    /// let router = Router::from_parts(
    ///     vec![
    ///         RouteNode::new("/docs", RouteType::Page, "docs/page.tsx"),
    ///         RouteNode::new("/docs/[...path]", RouteType::Page, "docs/[...path]/page.tsx"),
    ///     ],
    ///     Vec::new(),
    ///     None,
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(router.match_route("/docs").unwrap().route.id, "/docs");
    ///
    /// let m = router.match_route("/docs/a/b/c").unwrap();
    /// assert_eq!(m.route.id, "/docs/[...path]");
    /// assert_eq!(m.params["path"], "a/b/c");
    /// ```
    pub fn match_route(&self, path: &str) -> Option<RouteMatch<'_>> {
        let (&index, params) = self.trie.find(path)?;
        let route = &self.routes[index];

        Some(RouteMatch {
            route,
            params,
            layouts: self.layout_chain(route),
        })
    }

    /// Layouts wrapping `route`, outermost first
    pub fn layout_chain(&self, route: &RouteNode) -> Vec<&ScannedLayout> {
        let mut chain = Vec::new();
        let mut next = route.layout_id.as_deref();

        while let Some(id) = next {
            // A malformed parent link must not loop forever.
            if chain.len() > self.layouts.len() {
                break;
            }
            match self.layout(id) {
                Some(layout) => {
                    chain.push(layout);
                    next = layout.parent_id.as_deref();
                }
                None => break,
            }
        }

        chain.reverse();
        chain
    }

    /// Looks a route up by id
    pub fn get(&self, id: &str) -> Option<&RouteNode> {
        self.by_id.get(id).map(|&i| &self.routes[i])
    }

    pub fn layout(&self, id: &str) -> Option<&ScannedLayout> {
        self.layouts_by_id.get(id).map(|&i| &self.layouts[i])
    }

    /// All routes, most specific first
    pub fn routes(&self) -> &[RouteNode] {
        &self.routes
    }

    pub fn layouts(&self) -> &[ScannedLayout] {
        &self.layouts
    }

    pub fn page_routes(&self) -> impl Iterator<Item = &RouteNode> {
        self.routes.iter().filter(|r| r.is_page())
    }

    pub fn api_routes(&self) -> impl Iterator<Item = &RouteNode> {
        self.routes.iter().filter(|r| r.is_api())
    }

    pub fn not_found_page(&self) -> Option<&Path> {
        self.not_found_page.as_deref()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn snapshot(&self) -> RouterSnapshot {
        RouterSnapshot {
            routes: self.routes.clone(),
            layouts: self.layouts.clone(),
            not_found_page: self.not_found_page.clone(),
        }
    }

    /// Pretty-printed JSON of [`Router::snapshot`]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

fn rank(route: &RouteNode) -> usize {
    let parsed = parse_route_id_lossy(&route.id);
    specificity(route.catch_all, parsed.dynamic_count, parsed.depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteType;

    #[test]
    fn test_routes_sorted_by_specificity() {
        let router = Router::from_parts(
            vec![
                RouteNode::new("/[...all]", RouteType::Page, "all.tsx"),
                RouteNode::new("/blog/[slug]", RouteType::Page, "slug.tsx"),
                RouteNode::new("/about", RouteType::Page, "about.tsx"),
            ],
            Vec::new(),
            None,
        )
        .unwrap();

        let ids: Vec<&str> = router.routes().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["/about", "/blog/[slug]", "/[...all]"]);
    }

    #[test]
    fn test_layout_chain_follows_parents() {
        let route = RouteNode::new("/blog/[slug]", RouteType::Page, "slug.tsx").with_layout("/blog");
        let router = Router::from_parts(
            vec![route],
            vec![
                ScannedLayout::new("/blog", "blog/layout.tsx").with_parent("/"),
                ScannedLayout::new("/", "layout.tsx"),
            ],
            None,
        )
        .unwrap();

        let m = router.match_route("/blog/x").unwrap();
        let ids: Vec<&str> = m.layouts.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["/", "/blog"]);
    }

    #[test]
    fn test_layout_chain_tolerates_cycles() {
        let route = RouteNode::new("/", RouteType::Page, "page.tsx").with_layout("/a");
        let router = Router::from_parts(
            vec![route],
            vec![
                ScannedLayout::new("/a", "a.tsx").with_parent("/b"),
                ScannedLayout::new("/b", "b.tsx").with_parent("/a"),
            ],
            None,
        )
        .unwrap();

        let m = router.match_route("/").unwrap();
        assert!(m.layouts.len() <= 3);
    }

    #[test]
    fn test_duplicate_layout_ids_rejected() {
        let err = Router::from_parts(
            Vec::new(),
            vec![
                ScannedLayout::new("/", "a/layout.tsx"),
                ScannedLayout::new("/", "b/layout.tsx"),
            ],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, RouteError::LayoutCollision { .. }));
    }
}
