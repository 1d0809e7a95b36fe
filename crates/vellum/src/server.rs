//! Request pipeline
//!
//! One pipeline serves both production and dev. Production resolves requests
//! through a [`Matcher`] built from the persisted manifest; dev resolves them
//! through a live [`Router`] that the watcher swaps on change. Everything
//! after resolution (middleware, page rendering, API dispatch, error
//! handling) is shared.
//!
//! ```text
//! request ─▶ resolve ─▶ middleware (root first) ─▶ page | api ─▶ response
//!              │
//!              └─ no match ─▶ 404 page
//! ```

use crate::adapter::Adapter;
use crate::cache_control::cache_control_header;
use crate::document::{asset_url, render_document, PageRender};
use crate::manifest::{
    static_file_for_url, ManifestRouteEntry, NotFoundEntry, RouteManifest, CLIENT_DIR, SERVER_DIR,
    STATIC_DIR,
};
use crate::matcher::Matcher;
use crate::module::{exported_methods, LoadOutcome, MiddlewareOutcome, ModuleCache, ModuleRuntime};
use crate::request_context::RequestContext;
use crate::response::ApiResponse;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use vellum_router::{Params, RouteType, Router};

// ============================================================================
// Route resolution
// ============================================================================

/// A route resolved for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    pub entry: ManifestRouteEntry,
    pub params: Params,
}

/// Maps request paths to route entries
#[async_trait]
pub trait RouteResolver: Send + Sync {
    async fn resolve(&self, path: &str) -> Option<ResolvedRoute>;

    /// Page rendered with status 404 when nothing matches
    async fn not_found(&self) -> Option<NotFoundEntry> {
        None
    }
}

#[async_trait]
impl RouteResolver for Matcher {
    async fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        self.match_path(path).map(|m| ResolvedRoute {
            entry: m.entry.clone(),
            params: m.params,
        })
    }

    async fn not_found(&self) -> Option<NotFoundEntry> {
        Matcher::not_found(self).cloned()
    }
}

/// Resolves against a live [`Router`] and source files
///
/// Entries carry absolute source paths instead of compiled ones. The router
/// is replaced wholesale on change, never mutated.
#[derive(Clone)]
pub struct DevResolver {
    router: Arc<RwLock<Router>>,
}

impl DevResolver {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(RwLock::new(router)),
        }
    }

    /// Swaps in a freshly built router
    pub async fn replace(&self, router: Router) {
        *self.router.write().await = router;
    }

    pub async fn route_count(&self) -> usize {
        self.router.read().await.len()
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait]
impl RouteResolver for DevResolver {
    async fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        let router = self.router.read().await;
        let m = router.match_route(path)?;

        let mut entry = ManifestRouteEntry::from_route(m.route);
        entry.server_entry = Some(path_string(&m.route.file_path));
        entry.layout_entries = m.layouts.iter().map(|l| path_string(&l.file_path)).collect();
        entry.middleware = m.route.middleware_paths.iter().map(|p| path_string(p)).collect();

        Some(ResolvedRoute {
            entry,
            params: m.params,
        })
    }

    async fn not_found(&self) -> Option<NotFoundEntry> {
        let router = self.router.read().await;
        let page = router.not_found_page()?;
        let layout_entries = router
            .layout("/")
            .map(|layout| vec![path_string(&layout.file_path)])
            .unwrap_or_default();

        Some(NotFoundEntry {
            server_entry: path_string(page),
            layout_entries,
        })
    }
}

// ============================================================================
// Server
// ============================================================================

/// Collaborators for a production server
pub struct ServerOptions {
    /// Build output directory containing `manifest.json`
    pub out_dir: PathBuf,
    pub adapter: Arc<dyn Adapter>,
    pub runtime: Arc<dyn ModuleRuntime>,
}

/// Collaborators for a dev server
pub struct DevOptions {
    pub resolver: DevResolver,
    pub adapter: Arc<dyn Adapter>,
    pub runtime: Arc<dyn ModuleRuntime>,
    pub base: String,
}

/// HTTP server for a built (or, in dev, a scanned) project
pub struct Server {
    pipeline: Arc<Pipeline>,
    client_dir: Option<PathBuf>,
    manifest: Option<RouteManifest>,
}

impl Server {
    /// Production server for the build in `options.out_dir`
    ///
    /// Fails when the manifest is missing, has another version, or
    /// describes colliding routes. A server never starts partially.
    pub fn new(options: ServerOptions) -> Result<Self> {
        let manifest = RouteManifest::load(&options.out_dir)?;
        let matcher = Matcher::from_manifest(&manifest)?;

        info!(
            "Loaded manifest: {} routes, adapter {}, built {}",
            matcher.len(),
            manifest.adapter,
            manifest.built_at
        );

        let pipeline = Pipeline {
            resolver: Arc::new(matcher),
            adapter: options.adapter,
            modules: ModuleCache::new(options.runtime),
            server_dir: options.out_dir.join(SERVER_DIR),
            static_dir: options.out_dir.join(STATIC_DIR),
            base: manifest.base.clone(),
        };

        Ok(Self {
            pipeline: Arc::new(pipeline),
            client_dir: Some(options.out_dir.join(CLIENT_DIR)),
            manifest: Some(manifest),
        })
    }

    /// Dev server importing modules from their source paths
    pub fn dev(options: DevOptions) -> Self {
        let pipeline = Pipeline {
            resolver: Arc::new(options.resolver),
            adapter: options.adapter,
            modules: ModuleCache::new(options.runtime),
            server_dir: PathBuf::new(),
            static_dir: PathBuf::new(),
            base: options.base,
        };

        Self {
            pipeline: Arc::new(pipeline),
            client_dir: None,
            manifest: None,
        }
    }

    /// Loaded manifest (production only)
    pub fn manifest(&self) -> Option<&RouteManifest> {
        self.manifest.as_ref()
    }

    /// The axum application
    ///
    /// Client assets are served from `<out>/client` under the manifest's
    /// `base`; every other request goes through the pipeline.
    pub fn router(&self) -> axum::Router {
        let pipeline = axum::Router::new()
            .fallback(handle_request)
            .with_state(self.pipeline.clone());

        let app = match &self.client_dir {
            Some(dir) if self.pipeline.base.trim_end_matches('/').is_empty() => {
                axum::Router::new().fallback_service(
                    ServeDir::new(dir)
                        .call_fallback_on_method_not_allowed(true)
                        .fallback(pipeline),
                )
            }
            Some(dir) => axum::Router::new()
                .nest_service(self.pipeline.base.trim_end_matches('/'), ServeDir::new(dir))
                .fallback_service(pipeline),
            None => pipeline,
        };

        app.layer(TraceLayer::new_for_http())
    }
}

async fn handle_request(
    State(pipeline): State<Arc<Pipeline>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    pipeline.handle(method, uri, headers, body).await
}

// ============================================================================
// Pipeline
// ============================================================================

struct Pipeline {
    resolver: Arc<dyn RouteResolver>,
    adapter: Arc<dyn Adapter>,
    modules: ModuleCache,
    /// Base for `serverEntry`, `layoutEntries` and `middleware`
    server_dir: PathBuf,
    static_dir: PathBuf,
    base: String,
}

impl Pipeline {
    async fn handle(&self, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
        let path = uri.path().to_string();
        match self.dispatch(method, &uri, headers, body).await {
            Ok(response) => response,
            Err(err) => {
                error!(path = %path, "Request failed: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response> {
        let Some(resolved) = self.resolver.resolve(uri.path()).await else {
            debug!("No route for {}", uri.path());
            return Ok(self.not_found(uri.path()).await);
        };

        let mut ctx = RequestContext::new(method, uri.path())
            .with_params(resolved.params)
            .with_query(uri.query())
            .with_headers(headers)
            .with_body(body);

        let entry = &resolved.entry;
        for middleware in &entry.middleware {
            let module = self.import(middleware).await?;
            let outcome = module
                .middleware(&mut ctx)
                .await
                .with_context(|| format!("middleware {} failed", middleware))?;
            if let MiddlewareOutcome::Respond(response) = outcome {
                return Ok(with_queued_headers(response.into_response(), &ctx));
            }
        }

        let response = match entry.route_type {
            RouteType::Page => self.page(entry, &ctx).await?,
            RouteType::Api => self.api(entry, &ctx).await?,
        };

        Ok(with_queued_headers(response, &ctx))
    }

    async fn import(&self, entry: &str) -> Result<Arc<dyn crate::module::ServerModule>> {
        self.modules.import(&self.server_dir.join(entry)).await
    }

    async fn page(&self, entry: &ManifestRouteEntry, ctx: &RequestContext) -> Result<Response> {
        if ctx.method != Method::GET && ctx.method != Method::HEAD {
            return Ok(method_not_allowed(&["GET".to_string(), "HEAD".to_string()]));
        }

        if entry.prerendered {
            return self.prerendered(entry, ctx).await;
        }

        let server_entry = entry
            .server_entry
            .as_deref()
            .ok_or_else(|| anyhow!("route {} has no compiled server entry", entry.id))?;
        let module = self.import(server_entry).await?;
        let component = module
            .component()
            .ok_or_else(|| anyhow!("page {} has no default export", entry.id))?;

        let data = match module
            .load(ctx)
            .await
            .with_context(|| format!("load() failed for {}", entry.id))?
        {
            LoadOutcome::Data(data) => data,
            LoadOutcome::Redirect { location, status } => {
                return Ok(ApiResponse::redirect(&location, status).into_response());
            }
        };

        let layouts = self.layout_components(&entry.layout_entries).await?;
        let html = render_document(
            self.adapter.as_ref(),
            PageRender {
                component: &component,
                layouts,
                data: &data,
                url: &ctx.path,
                params: ctx.params.clone(),
                client_entry_url: entry
                    .client_entry
                    .as_deref()
                    .map(|client| asset_url(&self.base, client)),
                stylesheets: entry.css.iter().map(|css| asset_url(&self.base, css)).collect(),
            },
        )
        .with_context(|| format!("failed to render {}", entry.id))?;

        let cache = entry.cache.or_else(|| module.cache());
        Ok((
            [(header::CACHE_CONTROL, cache_control_header(cache.as_ref()))],
            Html(html),
        )
            .into_response())
    }

    async fn prerendered(&self, entry: &ManifestRouteEntry, ctx: &RequestContext) -> Result<Response> {
        let file = match &entry.prerendered_file {
            Some(file) => Some(file.clone()),
            None => static_file_for_url(&ctx.path),
        };
        let Some(file) = file else {
            return Ok(self.not_found(&ctx.path).await);
        };

        let path = self.static_dir.join(&file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((
                [
                    (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
                    (header::CACHE_CONTROL, cache_control_header(entry.cache.as_ref())),
                ],
                bytes,
            )
                .into_response()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    "Prerendered file {} for {} is missing",
                    path.display(),
                    ctx.path
                );
                Ok(self.not_found(&ctx.path).await)
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to read prerendered file {}", path.display()))
            }
        }
    }

    async fn api(&self, entry: &ManifestRouteEntry, ctx: &RequestContext) -> Result<Response> {
        let server_entry = entry
            .server_entry
            .as_deref()
            .ok_or_else(|| anyhow!("route {} has no compiled server entry", entry.id))?;
        let module = self.import(server_entry).await?;

        if let Some(response) = module
            .handle(&ctx.method, ctx)
            .await
            .with_context(|| format!("{} handler failed for {}", ctx.method, entry.id))?
        {
            return Ok(response.into_response());
        }

        let allowed = exported_methods(&module.exports());
        if allowed.is_empty() {
            bail!("API route {} exports no HTTP method handlers", entry.id);
        }
        Ok(method_not_allowed(&allowed))
    }

    async fn layout_components(&self, entries: &[String]) -> Result<Vec<crate::adapter::Component>> {
        let mut layouts = Vec::with_capacity(entries.len());
        for entry in entries {
            let module = self.import(entry).await?;
            let component = module
                .component()
                .ok_or_else(|| anyhow!("layout {} has no default export", entry))?;
            layouts.push(component);
        }
        Ok(layouts)
    }

    async fn not_found(&self, path: &str) -> Response {
        if let Some(page) = self.resolver.not_found().await {
            match self.render_not_found(&page, path).await {
                Ok(html) => return (StatusCode::NOT_FOUND, Html(html)).into_response(),
                Err(err) => warn!("Failed to render 404 page: {:#}", err),
            }
        }
        (StatusCode::NOT_FOUND, "404 Not Found").into_response()
    }

    async fn render_not_found(&self, page: &NotFoundEntry, path: &str) -> Result<String> {
        let module = self.import(&page.server_entry).await?;
        let component = module
            .component()
            .ok_or_else(|| anyhow!("404 page has no default export"))?;
        let layouts = self.layout_components(&page.layout_entries).await?;

        render_document(
            self.adapter.as_ref(),
            PageRender {
                component: &component,
                layouts,
                data: &Value::Null,
                url: path,
                params: Params::new(),
                client_entry_url: None,
                stylesheets: Vec::new(),
            },
        )
    }
}

fn method_not_allowed(allowed: &[String]) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, allowed.join(", "))],
        "Method Not Allowed",
    )
        .into_response()
}

/// Applies headers queued by middleware unless the response already set them
fn with_queued_headers(mut response: Response, ctx: &RequestContext) -> Response {
    for (name, value) in ctx.response_headers() {
        if !response.headers().contains_key(name) {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
    response
}
