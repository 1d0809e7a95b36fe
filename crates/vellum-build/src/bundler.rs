//! Bundler contract and the esbuild implementation
//!
//! A build runs two passes through a [`Bundler`]: a client pass over the
//! generated entry wrappers and a server pass over route, layout and
//! middleware sources. Each pass returns [`BuildMetadata`], the only view of
//! compiled output the orchestrator relies on.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};
use vellum::CompilerPlugin;

/// Which runtime a pass compiles for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleTarget {
    /// Browser bundles: minified when requested, code split into shared chunks
    Client,
    /// Bundles imported in-process: never minified, inline source maps
    Server,
}

impl fmt::Display for BundleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleTarget::Client => f.write_str("client"),
            BundleTarget::Server => f.write_str("server"),
        }
    }
}

/// One bundling pass
#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub target: BundleTarget,
    /// Absolute entry files
    pub entry_points: Vec<PathBuf>,
    /// Common ancestor of the entry points; output paths mirror the tree below it
    pub entry_base: PathBuf,
    /// Absolute output directory
    pub out_dir: PathBuf,
    /// Project root, used as the bundler's working directory
    pub root: PathBuf,
    pub minify: bool,
    pub plugins: Vec<CompilerPlugin>,
}

/// One emitted file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputMeta {
    pub bytes: u64,
    /// Absolute source file this output is the entry for
    pub entry_point: Option<PathBuf>,
    /// Export names of an entry output
    pub exports: Vec<String>,
    /// Other outputs this file imports, relative to the pass's `out_dir`
    pub imports: Vec<String>,
    /// CSS emitted for this entry, relative to the pass's `out_dir`
    pub css_bundle: Option<String>,
}

/// Output graph of one pass, keyed by path relative to the pass's `out_dir`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildMetadata {
    pub outputs: BTreeMap<String, OutputMeta>,
}

impl BuildMetadata {
    /// Output whose entry point is `source`
    pub fn output_for(&self, source: &Path) -> Option<(&str, &OutputMeta)> {
        self.outputs
            .iter()
            .find(|(_, meta)| meta.entry_point.as_deref() == Some(source))
            .map(|(path, meta)| (path.as_str(), meta))
    }
}

/// Compiles entry points into an output directory
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, request: &BundleRequest) -> Result<BuildMetadata>;
}

// ============================================================================
// esbuild
// ============================================================================

/// Runs the `esbuild` binary
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    binary: PathBuf,
}

impl EsbuildBundler {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Finds esbuild in the project's `node_modules/.bin`, then on `PATH`
    pub fn locate(root: &Path) -> Result<Self> {
        let local = root.join("node_modules").join(".bin").join("esbuild");
        if local.is_file() {
            return Ok(Self::new(local));
        }

        let binary = which::which("esbuild")
            .context("esbuild not found; install it with `npm install --save-dev esbuild`")?;
        Ok(Self::new(binary))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

/// Command-line arguments for one pass
pub fn esbuild_args(request: &BundleRequest, metafile: &Path) -> Vec<String> {
    let mut args: Vec<String> = request
        .entry_points
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    args.extend([
        "--bundle".to_string(),
        "--format=esm".to_string(),
        format!("--outdir={}", request.out_dir.display()),
        format!("--outbase={}", request.entry_base.display()),
        format!("--metafile={}", metafile.display()),
        "--entry-names=[dir]/[name]-[hash]".to_string(),
        "--chunk-names=chunks/[name]-[hash]".to_string(),
        "--asset-names=assets/[name]-[hash]".to_string(),
        "--log-level=warning".to_string(),
    ]);

    match request.target {
        BundleTarget::Client => {
            args.push("--platform=browser".to_string());
            args.push("--splitting".to_string());
            if request.minify {
                args.push("--minify".to_string());
            }
        }
        BundleTarget::Server => {
            args.push("--platform=node".to_string());
            args.push("--sourcemap=inline".to_string());
        }
    }

    for plugin in &request.plugins {
        for (extension, loader) in &plugin.loaders {
            args.push(format!("--loader:.{}={}", extension, loader));
        }
        if request.target == BundleTarget::Server {
            for external in &plugin.externals {
                args.push(format!("--external:{}", external));
            }
        }
    }

    args
}

#[async_trait]
impl Bundler for EsbuildBundler {
    async fn bundle(&self, request: &BundleRequest) -> Result<BuildMetadata> {
        if request.entry_points.is_empty() {
            return Ok(BuildMetadata::default());
        }

        tokio::fs::create_dir_all(&request.out_dir)
            .await
            .with_context(|| format!("Failed to create {}", request.out_dir.display()))?;

        let metafile = request.out_dir.with_extension("meta.json");
        let args = esbuild_args(request, &metafile);
        debug!("esbuild {} pass: {} entries", request.target, request.entry_points.len());

        let output = Command::new(&self.binary)
            .args(&args)
            .current_dir(&request.root)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.binary.display()))?;

        if !output.status.success() {
            bail!(
                "esbuild {} pass failed:\n{}",
                request.target,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let raw = tokio::fs::read_to_string(&metafile)
            .await
            .with_context(|| format!("Failed to read {}", metafile.display()))?;
        remove_metafile(&metafile).await;

        parse_metafile(&raw, &request.root, &request.out_dir)
    }
}

// ============================================================================
// Metafile
// ============================================================================

/// Whether the file was removed; failures other than NotFound are logged
async fn remove_metafile(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

#[derive(Deserialize)]
struct Metafile {
    #[serde(default)]
    outputs: BTreeMap<String, MetafileOutput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetafileOutput {
    bytes: u64,
    #[serde(default)]
    imports: Vec<MetafileImport>,
    #[serde(default)]
    exports: Vec<String>,
    entry_point: Option<String>,
    css_bundle: Option<String>,
}

#[derive(Deserialize)]
struct MetafileImport {
    path: String,
    #[serde(default)]
    external: bool,
}

/// Converts an esbuild metafile into [`BuildMetadata`]
///
/// esbuild reports every path relative to its working directory (`root`);
/// entry points become absolute and outputs become relative to `out_dir`.
/// Source maps and outputs outside `out_dir` are dropped.
pub fn parse_metafile(raw: &str, root: &Path, out_dir: &Path) -> Result<BuildMetadata> {
    let metafile: Metafile = serde_json::from_str(raw).context("Failed to parse esbuild metafile")?;
    let out_dir = clean_path(out_dir);

    let relative = |path: &str| -> Option<String> {
        let abs = clean_path(&root.join(path));
        let rel = abs.strip_prefix(&out_dir).ok()?;
        Some(to_slash(rel))
    };

    let mut outputs = BTreeMap::new();
    for (path, output) in metafile.outputs {
        if path.ends_with(".map") {
            continue;
        }
        let Some(key) = relative(&path) else {
            continue;
        };

        outputs.insert(
            key,
            OutputMeta {
                bytes: output.bytes,
                entry_point: output.entry_point.map(|e| clean_path(&root.join(e))),
                exports: output.exports,
                imports: output
                    .imports
                    .iter()
                    .filter(|import| !import.external)
                    .filter_map(|import| relative(&import.path))
                    .collect(),
                css_bundle: output.css_bundle.as_deref().and_then(|css| relative(css)),
            },
        );
    }

    Ok(BuildMetadata { outputs })
}

/// Resolves `.` and `..` without touching the filesystem
pub(crate) fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Path with `/` separators on every platform
pub(crate) fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
