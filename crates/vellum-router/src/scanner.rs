//! Routes directory scanner
//!
//! Walks the routes directory once, classifies special files and produces an
//! immutable [`ScanResult`].
//!
//! | file | meaning |
//! |---|---|
//! | `page.<ext>` | page route for the directory |
//! | `route.<ext>` | API route for the directory |
//! | `layout.<ext>` | layout wrapping the directory and everything below it |
//! | `middleware.<ext>` | middleware for the directory and everything below it |
//! | `404.<ext>` | not-found page (routes root only) |
//!
//! Directory ids keep route groups (`/(shop)/cart`); route ids strip them
//! (`/cart`). Layout ids are directory ids, so two sibling groups can each own
//! a layout without colliding.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::RouteError;
use crate::path::{parent_id, PathHierarchy};
use crate::route::parser::{parse_route_id, route_id_from_dir};
use crate::route::pattern::pattern_shape;
use crate::{RouteNode, RouteType, ScanIssue, ScanResult, ScannedLayout};

/// File extensions the scanner recognizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Extensions for `page`, `layout` and `404` files (the adapter's extensions)
    pub page_extensions: Vec<String>,
    /// Extra extensions accepted for `route` and `middleware` files
    pub script_extensions: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::new(["tsx", "jsx"])
    }
}

impl ScanOptions {
    pub fn new<I, S>(page_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            page_extensions: page_extensions.into_iter().map(Into::into).collect(),
            script_extensions: ["ts", "js", "mts", "mjs"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    pub fn with_script_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    fn is_page_ext(&self, ext: &str) -> bool {
        self.page_extensions.iter().any(|e| e == ext)
    }

    fn is_script_ext(&self, ext: &str) -> bool {
        self.is_page_ext(ext) || self.script_extensions.iter().any(|e| e == ext)
    }

    fn classify(&self, file_name: &str) -> Option<SpecialFile> {
        let (stem, ext) = file_name.rsplit_once('.')?;
        match stem {
            "page" if self.is_page_ext(ext) => Some(SpecialFile::Page),
            "layout" if self.is_page_ext(ext) => Some(SpecialFile::Layout),
            "404" if self.is_page_ext(ext) => Some(SpecialFile::NotFound),
            "route" if self.is_script_ext(ext) => Some(SpecialFile::Route),
            "middleware" if self.is_script_ext(ext) => Some(SpecialFile::Middleware),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialFile {
    Page,
    Route,
    Layout,
    Middleware,
    NotFound,
}

impl SpecialFile {
    fn label(self) -> &'static str {
        match self {
            SpecialFile::Page => "page",
            SpecialFile::Route => "route",
            SpecialFile::Layout => "layout",
            SpecialFile::Middleware => "middleware",
            SpecialFile::NotFound => "404",
        }
    }
}

/// Special files found in one directory
#[derive(Debug, Default)]
struct DirFiles {
    path: PathBuf,
    page: Option<PathBuf>,
    route: Option<PathBuf>,
    layout: Option<PathBuf>,
    middleware: Option<PathBuf>,
    not_found: Option<PathBuf>,
}

impl DirFiles {
    fn slot(&mut self, kind: SpecialFile) -> &mut Option<PathBuf> {
        match kind {
            SpecialFile::Page => &mut self.page,
            SpecialFile::Route => &mut self.route,
            SpecialFile::Layout => &mut self.layout,
            SpecialFile::Middleware => &mut self.middleware,
            SpecialFile::NotFound => &mut self.not_found,
        }
    }
}

/// Scans `routes_dir`
///
/// Fails on unreadable directories and on structural collisions. Per-route
/// problems (bad parameter names, misplaced catch-alls) are collected in
/// [`ScanResult::errors`] and the offending route is skipped.
///
/// # Examples
///
/// ```no_run
/// use vellum_router::{scan, Router, ScanOptions};
///
/// let result = scan("src/routes".as_ref(), &ScanOptions::default())?;
/// for issue in &result.errors {
///     eprintln!("{}", issue);
/// }
/// let router = Router::new(&result)?;
/// # Ok::<(), vellum_router::RouteError>(())
/// ```
pub fn scan(routes_dir: &Path, options: &ScanOptions) -> Result<ScanResult, RouteError> {
    let mut errors = Vec::new();
    let dirs = collect_dirs(routes_dir, options, &mut errors)?;

    let mut result = ScanResult {
        errors,
        ..ScanResult::default()
    };

    let mut middleware_by_dir: HashMap<&str, &Path> = HashMap::new();
    let mut layout_dirs: HashSet<&str> = HashSet::new();
    let mut candidates: Vec<(&str, RouteNode)> = Vec::new();

    for (dir_id, files) in &dirs {
        if let (Some(_), Some(_)) = (&files.page, &files.route) {
            return Err(RouteError::PageApiConflict {
                dir: files.path.clone(),
            });
        }

        if let Some(path) = &files.not_found {
            if dir_id == "/" {
                result.not_found_page = Some(path.clone());
            } else {
                result
                    .errors
                    .push(ScanIssue::new(path, "404 pages are only recognized at the routes root"));
            }
        }

        if let Some(path) = &files.middleware {
            middleware_by_dir.insert(dir_id.as_str(), path.as_path());
            result.middlewares.push(path.clone());
        }

        if files.layout.is_some() {
            layout_dirs.insert(dir_id.as_str());
        }

        let endpoint = files
            .page
            .as_ref()
            .map(|p| (RouteType::Page, p))
            .or_else(|| files.route.as_ref().map(|p| (RouteType::Api, p)));

        if let Some((route_type, file_path)) = endpoint {
            let route_id = route_id_from_dir(dir_id);
            match parse_route_id(&route_id) {
                Ok(_) => candidates.push((dir_id.as_str(), RouteNode::new(route_id, route_type, file_path))),
                Err(reason) => result.errors.push(ScanIssue::new(file_path, reason)),
            }
        }
    }

    for (dir_id, files) in &dirs {
        if let Some(path) = &files.layout {
            let layout = ScannedLayout::new(dir_id.clone(), path);
            result.layouts.push(match nearest(&layout_dirs, dir_id, 1) {
                Some(parent) => layout.with_parent(parent),
                None => layout,
            });
        }
    }

    let mut shapes: HashMap<String, PathBuf> = HashMap::new();
    for (dir_id, mut route) in candidates {
        if let Some(first) = shapes.insert(pattern_shape(&route.pattern), route.file_path.clone()) {
            return Err(RouteError::Collision {
                pattern: route.pattern,
                first,
                second: route.file_path,
            });
        }

        route.layout_id = nearest(&layout_dirs, dir_id, 0).map(String::from);

        let mut middleware: Vec<PathBuf> = PathHierarchy::new(dir_id)
            .filter_map(|dir| middleware_by_dir.get(dir).map(|p| p.to_path_buf()))
            .collect();
        middleware.reverse();
        route.middleware_paths = middleware;

        result.routes.push(route);
    }

    link_children(&mut result.routes);
    Ok(result)
}

/// Walks the tree and groups special files by directory id
fn collect_dirs(
    root: &Path,
    options: &ScanOptions,
    errors: &mut Vec<ScanIssue>,
) -> Result<BTreeMap<String, DirFiles>, RouteError> {
    let mut dirs: BTreeMap<String, DirFiles> = BTreeMap::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_private_dir(entry));

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            RouteError::Io {
                path,
                source: err.into(),
            }
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(kind) = entry.file_name().to_str().and_then(|name| options.classify(name)) else {
            continue;
        };

        let file_path = entry.path().to_path_buf();
        let dir_path = file_path.parent().unwrap_or(root).to_path_buf();
        let dir_id = dir_id(root, &dir_path);

        let files = dirs.entry(dir_id).or_insert_with(|| DirFiles {
            path: dir_path,
            ..DirFiles::default()
        });

        let slot = files.slot(kind);
        if let Some(kept) = slot.as_ref() {
            errors.push(ScanIssue::new(
                &file_path,
                format!("duplicate {} file; keeping {}", kind.label(), kept.display()),
            ));
        } else {
            *slot = Some(file_path);
        }
    }

    Ok(dirs)
}

fn is_private_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.') || name.starts_with('_'))
            .unwrap_or(false)
}

/// `/`-joined path of `dir` relative to `root`, with a leading `/`
fn dir_id(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    format!("/{}", segments.join("/"))
}

/// Nearest directory at or above `dir_id` (after skipping `skip` levels) that
/// holds a layout
fn nearest<'a>(layout_dirs: &HashSet<&'a str>, dir_id: &str, skip: usize) -> Option<&'a str> {
    PathHierarchy::new(dir_id)
        .skip(skip)
        .find_map(|dir| layout_dirs.get(dir).copied())
}

/// Records, for each route, the ids of routes exactly one segment below it
pub(crate) fn link_children(routes: &mut [RouteNode]) {
    let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for route in routes.iter() {
        if let Some(parent) = parent_id(&route.id) {
            children
                .entry(parent.to_string())
                .or_default()
                .push(route.id.clone());
        }
    }

    for route in routes.iter_mut() {
        route.children = children.remove(&route.id).unwrap_or_default();
    }
}
