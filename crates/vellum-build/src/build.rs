use crate::assets::{client_artifacts, collect_assets};
use crate::bundler::{BuildMetadata, BundleRequest, BundleTarget, Bundler};
use crate::exports::{self, RouteExports};
use crate::prerender::Prerenderer;
use crate::report;
use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use vellum::adapter::CONTAINER_ID;
use vellum::document::js_string;
use vellum::manifest::{NotFoundEntry, CLIENT_DIR, SERVER_DIR, STATIC_DIR};
use vellum::{Adapter, Config, ManifestRouteEntry, ModuleCache, ModuleRuntime, RouteManifest};
use vellum_router::{scan, Router, ScanOptions};

/// Directory under the output root holding generated client wrappers
pub const ENTRIES_DIR: &str = ".vellum-entries";

/// Inputs of one build
pub struct BuildOptions {
    /// Project root; relative paths below resolve against it
    pub root: PathBuf,
    pub routes_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Public path client assets are served under
    pub base: String,
    pub minify: bool,
    /// Suppresses the build report
    pub silent: bool,
    pub adapter: Arc<dyn Adapter>,
    /// Imports compiled server bundles for export values and prerendering
    pub runtime: Arc<dyn ModuleRuntime>,
    pub bundler: Arc<dyn Bundler>,
}

impl BuildOptions {
    pub fn from_config(
        root: impl Into<PathBuf>,
        config: &Config,
        adapter: Arc<dyn Adapter>,
        runtime: Arc<dyn ModuleRuntime>,
        bundler: Arc<dyn Bundler>,
    ) -> Self {
        let root = root.into();
        Self {
            routes_dir: config.routes_dir(&root),
            out_dir: config.out_dir(&root),
            root,
            base: config.build.base.clone(),
            minify: config.build.minify,
            silent: config.build.silent,
            adapter,
            runtime,
            bundler,
        }
    }
}

/// Outcome of a successful build
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub manifest: RouteManifest,
    pub route_count: usize,
    pub page_count: usize,
    pub api_count: usize,
    pub prerendered_pages: usize,
    pub duration: Duration,
}

/// Builds the project described by `options`
///
/// Recreates the output directory once the route graph is known, compiles client and server bundles,
/// writes `manifest.json` and the prerendered pages. Collisions and
/// bundler failures abort the build; problems confined to one route are
/// logged and the route degrades.
pub async fn build(options: BuildOptions) -> Result<BuildResult> {
    let started = Instant::now();
    let root = absolute(&options.root)?;
    let routes_dir = resolve(&root, &options.routes_dir);
    let out_dir = resolve(&root, &options.out_dir);

    info!(
        "Building {} with the {} adapter",
        routes_dir.display(),
        options.adapter.name()
    );

    // Phase 1: scan and route graph
    let scan_options = ScanOptions::new(options.adapter.file_extensions());
    let scanned = scan(&routes_dir, &scan_options)?;
    for issue in &scanned.errors {
        warn!("Skipped {}", issue);
    }
    let router = Router::new(&scanned)?;
    reset_dir(&out_dir)?;

    let mut manifest = RouteManifest::new(options.adapter.name(), options.base.clone());
    let mut prerendered_pages = 0;

    if router.is_empty() {
        warn!("No routes found in {}", routes_dir.display());
    } else {
        let entries_dir = out_dir.join(ENTRIES_DIR);
        let ctx = BuildContext {
            options: &options,
            router: &router,
            root: &root,
            routes_dir: &routes_dir,
            out_dir: &out_dir,
            entries_dir: &entries_dir,
        };

        let outcome = ctx.run(&mut manifest).await;
        match std::fs::remove_dir_all(&entries_dir) {
            Err(err) if err.kind() != ErrorKind::NotFound => {
                warn!("Failed to remove {}: {}", entries_dir.display(), err)
            }
            _ => {}
        }
        prerendered_pages = outcome?;
    }

    // Phase 9: persist and report
    manifest.save(&out_dir)?;

    let result = BuildResult {
        route_count: router.len(),
        page_count: router.page_routes().count(),
        api_count: router.api_routes().count(),
        prerendered_pages,
        duration: started.elapsed(),
        manifest,
    };

    info!(
        "Built {} routes ({} prerendered pages) in {:.2?}",
        result.route_count, result.prerendered_pages, result.duration
    );
    if !options.silent {
        report::print_report(&result);
    }

    Ok(result)
}

/// Borrowed state shared by phases 2 to 8
struct BuildContext<'a> {
    options: &'a BuildOptions,
    router: &'a Router,
    root: &'a Path,
    routes_dir: &'a Path,
    out_dir: &'a Path,
    entries_dir: &'a Path,
}

/// Generated client wrapper files
#[derive(Default)]
struct ClientWrappers {
    /// Route id to wrapper
    pages: HashMap<String, PathBuf>,
    /// Layout id to wrapper
    layouts: HashMap<String, PathBuf>,
}

impl ClientWrappers {
    fn all(&self) -> Vec<PathBuf> {
        let mut all: Vec<PathBuf> = self.pages.values().chain(self.layouts.values()).cloned().collect();
        all.sort();
        all
    }
}

impl BuildContext<'_> {
    /// Runs phases 2 to 8 and returns the number of prerendered pages
    async fn run(&self, manifest: &mut RouteManifest) -> Result<usize> {
        let adapter = self.options.adapter.as_ref();
        let client_dir = self.out_dir.join(CLIENT_DIR);
        let server_dir = self.out_dir.join(SERVER_DIR);
        let plugins = adapter.compiler_plugins();

        // Phase 2: client entry wrappers
        let wrappers = self.write_client_wrappers()?;

        // Phase 3: client pass
        let client_meta = self
            .options
            .bundler
            .bundle(&BundleRequest {
                target: BundleTarget::Client,
                entry_points: wrappers.all(),
                entry_base: self.entries_dir.to_path_buf(),
                out_dir: client_dir.clone(),
                root: self.root.to_path_buf(),
                minify: self.options.minify,
                plugins: plugins.clone(),
            })
            .await
            .context("Client bundling failed")?;

        // Phase 4: server pass
        let server_meta = self
            .options
            .bundler
            .bundle(&BundleRequest {
                target: BundleTarget::Server,
                entry_points: self.server_sources(),
                entry_base: self.routes_dir.to_path_buf(),
                out_dir: server_dir.clone(),
                root: self.root.to_path_buf(),
                minify: false,
                plugins,
            })
            .await
            .context("Server bundling failed")?;

        // Phase 5: export inference
        let modules = ModuleCache::new(self.options.runtime.clone());
        let mut route_exports: HashMap<&str, RouteExports> = HashMap::new();
        for route in self.router.routes() {
            if let Some((output, meta)) = server_meta.output_for(&route.file_path) {
                let inferred = exports::infer(&route.id, meta, &server_dir.join(output), &modules).await;
                route_exports.insert(route.id.as_str(), inferred);
            }
        }

        // Phases 6 and 7: artifact correlation and manifest assembly
        for route in self.router.routes() {
            let mut entry = ManifestRouteEntry::from_route(route);
            let chain = self.router.layout_chain(route);

            match output_path(&server_meta, &route.file_path) {
                Some(output) => entry.server_entry = Some(output),
                None => warn!("No server bundle for {}; it will answer 500", route.id),
            }
            entry.layout_entries = chain
                .iter()
                .filter_map(|layout| output_path(&server_meta, &layout.file_path))
                .collect();
            entry.middleware = route
                .middleware_paths
                .iter()
                .filter_map(|path| output_path(&server_meta, path))
                .collect();

            if route.is_page() {
                let artifacts = wrappers
                    .pages
                    .get(&route.id)
                    .and_then(|wrapper| client_artifacts(&client_meta, wrapper));
                if let Some(artifacts) = artifacts {
                    entry.client_entry = Some(artifacts.entry);
                    entry.client_chunks = artifacts.chunks;
                    entry.css = artifacts.css;
                }
                entry.layout_client_entries = chain
                    .iter()
                    .filter_map(|layout| wrappers.layouts.get(&layout.id))
                    .filter_map(|wrapper| output_path(&client_meta, wrapper))
                    .collect();
            }

            if let Some(exports) = route_exports.get(route.id.as_str()) {
                entry.has_load = exports.has_load;
                entry.cache = exports.cache;
                if route.is_api() {
                    entry.methods = exports.methods.clone();
                }
            }

            manifest.insert(entry);
        }

        manifest.assets = collect_assets(&client_dir, &client_meta)?;
        manifest.not_found = self.router.not_found_page().and_then(|page| {
            let server_entry = output_path(&server_meta, page)?;
            let layout_entries = self
                .router
                .layout("/")
                .and_then(|layout| output_path(&server_meta, &layout.file_path))
                .into_iter()
                .collect();
            Some(NotFoundEntry {
                server_entry,
                layout_entries,
            })
        });

        // Phase 8: prerender
        let static_dir = self.out_dir.join(STATIC_DIR);
        let prerenderer = Prerenderer {
            adapter,
            modules: &modules,
            server_dir: &server_dir,
            static_dir: &static_dir,
            base: &self.options.base,
        };

        let mut prerendered_pages = 0;
        for route in self.router.page_routes() {
            let Some(mode) = route_exports.get(route.id.as_str()).and_then(|e| e.prerender) else {
                continue;
            };
            if let Some(entry) = manifest.route_mut(&route.id) {
                prerendered_pages += prerenderer.prerender_route(entry, mode).await;
            }
        }

        Ok(prerendered_pages)
    }

    fn write_client_wrappers(&self) -> Result<ClientWrappers> {
        let adapter = self.options.adapter.as_ref();
        std::fs::create_dir_all(self.entries_dir)
            .with_context(|| format!("Failed to create {}", self.entries_dir.display()))?;

        let mut wrappers = ClientWrappers::default();

        for layout in self.router.layouts() {
            let specifier = import_specifier(&layout.file_path);
            let content = format!(
                "export * from {0};\nexport {{ default }} from {0};\n",
                js_string(&specifier)
            );
            let path = self.entries_dir.join(wrapper_file_name("layout", &layout.id));
            write_file(&path, &content)?;
            wrappers.layouts.insert(layout.id.clone(), path);
        }

        for route in self.router.page_routes() {
            let layout_specifiers: Vec<String> = self
                .router
                .layout_chain(route)
                .iter()
                .map(|layout| import_specifier(&layout.file_path))
                .collect();
            let content = adapter.hydration_script(
                &import_specifier(&route.file_path),
                CONTAINER_ID,
                &layout_specifiers,
            );
            let path = self.entries_dir.join(wrapper_file_name("page", &route.id));
            write_file(&path, &content)?;
            wrappers.pages.insert(route.id.clone(), path);
        }

        Ok(wrappers)
    }

    /// Route, layout, middleware and 404 sources, deduplicated and sorted
    fn server_sources(&self) -> Vec<PathBuf> {
        let mut sources = BTreeSet::new();
        for route in self.router.routes() {
            sources.insert(route.file_path.clone());
            sources.extend(route.middleware_paths.iter().cloned());
        }
        for layout in self.router.layouts() {
            sources.insert(layout.file_path.clone());
        }
        if let Some(page) = self.router.not_found_page() {
            sources.insert(page.to_path_buf());
        }
        sources.into_iter().collect()
    }
}

fn output_path(meta: &BuildMetadata, source: &Path) -> Option<String> {
    meta.output_for(source).map(|(path, _)| path.to_string())
}

/// Unique, filesystem-safe wrapper name for a route or layout id
///
/// Sanitizing alone could map two ids to one name, so a short hash of the
/// id is appended.
fn wrapper_file_name(kind: &str, id: &str) -> String {
    let slug: String = id
        .trim_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let slug = if slug.is_empty() { "index".to_string() } else { slug };
    let hash = blake3::hash(id.as_bytes());
    format!("{}-{}-{}.js", kind, slug, hex::encode(&hash.as_bytes()[..4]))
}

fn import_specifier(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Removes and recreates the output directory
fn reset_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to clean {}", dir.display()));
        }
    }
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    Ok(cwd.join(path))
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
