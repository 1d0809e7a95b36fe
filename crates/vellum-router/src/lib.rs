//! # Vellum Router
//!
//! File-system based routing for the Vellum framework:
//! - Static routes (`/about`)
//! - Dynamic segments (`/blog/[slug]` → `/blog/:slug`)
//! - Catch-all segments (`/docs/[...path]` → `/docs/*path`)
//! - Route groups (`(marketing)/pricing` → `/pricing`)
//! - Nested layouts and root-first middleware inheritance
//!
//! ## Pipeline
//!
//! ```text
//! routes dir ──scan()──▶ ScanResult ──Router::new()──▶ Router ──match_route()──▶ RouteMatch
//! ```
//!
//! The [`scanner`] walks the routes directory once and produces an immutable
//! [`ScanResult`]. The [`Router`] consumes it and builds a [`trie::SegmentTrie`]
//! ordered by specificity: static segments before dynamic segments before
//! catch-all segments. The same trie type backs the production matcher built
//! from a persisted manifest, so both resolve every path identically.
//!
//! ## Path Normalization
//!
//! Request paths are split into non-empty segments, so trailing slashes and
//! doubled slashes never change the outcome of a match:
//! - `/about/` → `/about`
//! - `/blog//hello` → `/blog/hello`
//!
//! ## Example
//!
//! ```
//! use vellum_router::{Router, RouteNode, RouteType};
//!
//! let routes = vec![
//!     RouteNode::new("/about", RouteType::Page, "routes/about/page.tsx"),
//!     RouteNode::new("/blog/[slug]", RouteType::Page, "routes/blog/[slug]/page.tsx"),
//! ];
//! let router = Router::from_parts(routes, Vec::new(), None).unwrap();
//!
//! let m = router.match_route("/blog/hello").unwrap();
//! assert_eq!(m.route.id, "/blog/[slug]");
//! assert_eq!(m.params.get("slug"), Some(&"hello".to_string()));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Module Declarations
// ============================================================================

mod error;
pub mod path;
pub mod route;
mod router;
pub mod scanner;
pub mod trie;

pub use error::RouteError;
pub use path::{split_segments, PathHierarchy};
pub use route::pattern::{classify_segment, SegmentKind};
pub use router::{RouteMatch, Router, RouterSnapshot};
pub use scanner::{scan, ScanOptions};

/// Parameters extracted from a matched path, keyed by parameter name
pub type Params = BTreeMap<String, String>;

// ============================================================================
// Core Types
// ============================================================================

/// Kind of endpoint a route resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    /// Rendered page backed by a `page.<ext>` file
    Page,
    /// API handler backed by a `route.<ext>` file
    Api,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Page => "page",
            RouteType::Api => "api",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One routable endpoint discovered on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteNode {
    /// Canonical identifier with bracketed dynamic segments, e.g. `/blog/[slug]`
    pub id: String,
    /// Matcher pattern, e.g. `/blog/:slug` or `/docs/*path`
    pub pattern: String,
    /// Page or API route
    #[serde(rename = "type")]
    pub route_type: RouteType,
    /// Source file backing this route
    pub file_path: PathBuf,
    /// Parameter names in pattern order
    pub params: Vec<String>,
    /// Whether the last segment consumes a variable-length tail
    pub catch_all: bool,
    /// Id of the nearest enclosing layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_id: Option<String>,
    /// Middleware files in scope, root first
    #[serde(default)]
    pub middleware_paths: Vec<PathBuf>,
    /// Ids of routes exactly one segment below this one
    #[serde(default)]
    pub children: Vec<String>,
}

impl RouteNode {
    /// Creates a route from its id, deriving pattern, params and catch-all flag
    ///
    /// Segments that cannot be parsed are kept as static text; use
    /// [`route::parser::parse_route_id`] when validation matters.
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_router::{RouteNode, RouteType};
    ///
    /// let route = RouteNode::new("/docs/[...path]", RouteType::Page, "routes/docs/[...path]/page.tsx");
    /// assert_eq!(route.pattern, "/docs/*path");
    /// assert_eq!(route.params, vec!["path"]);
    /// assert!(route.catch_all);
    /// ```
    pub fn new(id: impl Into<String>, route_type: RouteType, file_path: impl Into<PathBuf>) -> Self {
        let id = id.into();
        let parsed = route::parser::parse_route_id_lossy(&id);

        Self {
            id,
            pattern: parsed.pattern,
            route_type,
            file_path: file_path.into(),
            params: parsed.params,
            catch_all: parsed.catch_all,
            layout_id: None,
            middleware_paths: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Sets the nearest layout id
    pub fn with_layout(mut self, layout_id: impl Into<String>) -> Self {
        self.layout_id = Some(layout_id.into());
        self
    }

    /// Appends a middleware file (callers add them root first)
    pub fn with_middleware(mut self, path: impl Into<PathBuf>) -> Self {
        self.middleware_paths.push(path.into());
        self
    }

    pub fn is_page(&self) -> bool {
        self.route_type == RouteType::Page
    }

    pub fn is_api(&self) -> bool {
        self.route_type == RouteType::Api
    }
}

/// A `layout.<ext>` file and its position in the layout tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedLayout {
    /// Directory-derived id; route-group segments are kept so sibling groups stay distinct
    pub id: String,
    pub file_path: PathBuf,
    /// Nearest ancestor layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl ScannedLayout {
    pub fn new(id: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Non-fatal problem found while scanning; the offending file is skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub message: String,
}

impl ScanIssue {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ScanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Immutable snapshot of one scan of the routes directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub routes: Vec<RouteNode>,
    pub layouts: Vec<ScannedLayout>,
    pub middlewares: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found_page: Option<PathBuf>,
    #[serde(default)]
    pub errors: Vec<ScanIssue>,
}

impl ScanResult {
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Finds a route by id
    pub fn route(&self, id: &str) -> Option<&RouteNode> {
        self.routes.iter().find(|r| r.id == id)
    }

    /// Finds the layout whose file is `path`
    pub fn layout_for_file(&self, path: &Path) -> Option<&ScannedLayout> {
        self.layouts.iter().find(|l| l.file_path == path)
    }
}
