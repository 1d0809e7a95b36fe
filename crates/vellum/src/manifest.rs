//! Persisted build manifest
//!
//! `manifest.json` is written once per build and read once at production
//! start. Its `version` is a hard compatibility gate: a reader that sees any
//! other version refuses to serve instead of guessing.
//!
//! Path bases:
//! - `clientEntry`, `clientChunks`, `css`, `layoutClientEntries` and asset
//!   keys are relative to `<out>/client`
//! - `serverEntry`, `layoutEntries` and `middleware` are relative to
//!   `<out>/server`
//! - `prerenderedFile` is relative to `<out>/static`

use crate::cache_control::CacheConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vellum_router::{RouteNode, RouteType};

/// Current manifest format
pub const MANIFEST_VERSION: u32 = 1;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CLIENT_DIR: &str = "client";
pub const SERVER_DIR: &str = "server";
pub const STATIC_DIR: &str = "static";

/// Why a manifest could not be loaded
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no build manifest at {}; run `vellum build` first", path.display())]
    Missing { path: PathBuf },

    #[error("manifest version {found} is not supported (expected {expected}); rebuild the project")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("failed to read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Build output for one compiled client file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub hash: String,
    pub size: u64,
    pub mime_type: String,
}

/// Production form of a route, enriched with build artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRouteEntry {
    pub id: String,
    pub pattern: String,
    #[serde(rename = "type")]
    pub route_type: RouteType,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub catch_all: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_entry: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub client_chunks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub css: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_entry: Option<String>,

    #[serde(default)]
    pub has_load: bool,
    /// Exported HTTP methods (API routes), canonical order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,

    #[serde(default)]
    pub prerendered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerendered_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerendered_count: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,

    /// Compiled layouts, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layout_entries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layout_client_entries: Vec<String>,
    /// Compiled middleware, root first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middleware: Vec<String>,
}

impl ManifestRouteEntry {
    /// Entry carrying only the routing fields of `route`
    pub fn from_route(route: &RouteNode) -> Self {
        Self {
            id: route.id.clone(),
            pattern: route.pattern.clone(),
            route_type: route.route_type,
            params: route.params.clone(),
            catch_all: route.catch_all,
            client_entry: None,
            client_chunks: Vec::new(),
            css: Vec::new(),
            server_entry: None,
            has_load: false,
            methods: Vec::new(),
            prerendered: false,
            prerendered_file: None,
            prerendered_count: None,
            cache: None,
            layout_entries: Vec::new(),
            layout_client_entries: Vec::new(),
            middleware: Vec::new(),
        }
    }

    pub fn is_page(&self) -> bool {
        self.route_type == RouteType::Page
    }

    pub fn is_api(&self) -> bool {
        self.route_type == RouteType::Api
    }
}

/// Compiled root `404` page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundEntry {
    pub server_entry: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layout_entries: Vec<String>,
}

/// The persisted description of a build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteManifest {
    pub version: u32,
    pub adapter: String,
    pub base: String,
    pub built_at: DateTime<Utc>,
    pub routes: BTreeMap<String, ManifestRouteEntry>,
    #[serde(default)]
    pub assets: BTreeMap<String, AssetInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_found: Option<NotFoundEntry>,
}

/// File under `<out>/static` holding the prerendered page for `url`
///
/// Returns `None` for URLs with `.` or `..` segments, which could otherwise
/// escape the static directory.
///
/// # Examples
///
/// ```
/// use vellum::manifest::static_file_for_url;
///
/// assert_eq!(static_file_for_url("/").as_deref(), Some("index.html"));
/// assert_eq!(static_file_for_url("/posts/a/").as_deref(), Some("posts/a/index.html"));
/// assert_eq!(static_file_for_url("/posts/../secret"), None);
/// ```
pub fn static_file_for_url(url: &str) -> Option<String> {
    let segments = vellum_router::split_segments(url);
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return None;
    }
    if segments.is_empty() {
        return Some("index.html".to_string());
    }
    Some(format!("{}/index.html", segments.join("/")))
}

/// Only the field needed to gate on the format version
#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl RouteManifest {
    /// Empty manifest stamped with the current time
    pub fn new(adapter: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            adapter: adapter.into(),
            base: base.into(),
            built_at: Utc::now(),
            routes: BTreeMap::new(),
            assets: BTreeMap::new(),
            not_found: None,
        }
    }

    pub fn path(out_dir: &Path) -> PathBuf {
        out_dir.join(MANIFEST_FILE)
    }

    /// Loads `<out_dir>/manifest.json`, checking the version first
    pub fn load(out_dir: &Path) -> Result<Self, ManifestError> {
        let path = Self::path(out_dir);
        if !path.exists() {
            return Err(ManifestError::Missing { path });
        }

        let content = fs::read_to_string(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;

        let probe: VersionProbe =
            serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
                path: path.clone(),
                source,
            })?;
        if probe.version != MANIFEST_VERSION {
            return Err(ManifestError::VersionMismatch {
                found: probe.version,
                expected: MANIFEST_VERSION,
            });
        }

        serde_json::from_str(&content).map_err(|source| ManifestError::Parse { path, source })
    }

    /// Writes `<out_dir>/manifest.json`
    pub fn save(&self, out_dir: &Path) -> Result<PathBuf, ManifestError> {
        let path = Self::path(out_dir);
        let json = serde_json::to_string_pretty(self).map_err(|source| ManifestError::Parse {
            path: path.clone(),
            source,
        })?;

        fs::create_dir_all(out_dir)
            .and_then(|_| fs::write(&path, json))
            .map_err(|source| ManifestError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }

    pub fn route(&self, id: &str) -> Option<&ManifestRouteEntry> {
        self.routes.get(id)
    }

    pub fn route_mut(&mut self, id: &str) -> Option<&mut ManifestRouteEntry> {
        self.routes.get_mut(id)
    }

    pub fn insert(&mut self, entry: ManifestRouteEntry) {
        self.routes.insert(entry.id.clone(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> RouteManifest {
        let mut manifest = RouteManifest::new("template", "/");
        let mut entry = ManifestRouteEntry::from_route(&RouteNode::new(
            "/about",
            RouteType::Page,
            "routes/about/page.html",
        ));
        entry.prerendered = true;
        entry.prerendered_file = Some("about/index.html".to_string());
        entry.cache = Some(CacheConfig::new().max_age(60));
        manifest.insert(entry);
        manifest
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = sample();
        manifest.save(dir.path()).unwrap();

        let loaded = RouteManifest::load(dir.path()).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_json_shape_is_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        let about = &json["routes"]["/about"];
        assert_eq!(json["version"], 1);
        assert!(json["builtAt"].is_string());
        assert_eq!(about["type"], "page");
        assert_eq!(about["prerenderedFile"], "about/index.html");
        assert_eq!(about["cache"]["maxAge"], 60);
        assert_eq!(about["hasLoad"], false);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = RouteManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Missing { .. }));
    }

    #[test]
    fn test_version_mismatch_is_checked_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"version": 2, "routes": "a future shape"}"#,
        )
        .unwrap();

        let err = RouteManifest::load(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::VersionMismatch { found: 2, expected: 1 }
        ));
    }

    #[test]
    fn test_corrupt_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();
        let err = RouteManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }
}
