//! Server module contract and module loading
//!
//! A server module is the executable form of one page, API route, layout or
//! middleware file. The framework reads it through [`ServerModule`] and
//! obtains it from a [`ModuleRuntime`]; [`ModuleCache`] memoizes imports per
//! absolute path for the lifetime of its owner.

use crate::adapter::Component;
use crate::cache_control::CacheConfig;
use crate::request_context::RequestContext;
use crate::response::ApiResponse;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;
use vellum_router::Params;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// HTTP methods API routes may export, in canonical order
pub const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

pub const DEFAULT_EXPORT: &str = "default";
pub const LOAD_EXPORT: &str = "load";
pub const PRERENDER_EXPORT: &str = "prerender";
pub const CACHE_EXPORT: &str = "cache";
pub const MIDDLEWARE_EXPORT: &str = "middleware";

/// Recognized HTTP method exports, in canonical order
///
/// # Examples
///
/// ```
/// use vellum::module::exported_methods;
///
/// let exports = vec!["helper".to_string(), "POST".to_string(), "GET".to_string()];
/// assert_eq!(exported_methods(&exports), vec!["GET", "POST"]);
/// ```
pub fn exported_methods(exports: &[String]) -> Vec<String> {
    HTTP_METHODS
        .iter()
        .filter(|m| exports.iter().any(|e| e == *m))
        .map(|m| m.to_string())
        .collect()
}

/// Value of a page's `prerender` export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrerenderExport {
    /// `prerender = true`: one page rendered with empty params
    Static,
    /// `prerender = { paths() }`: one page per enumerated param set
    Paths,
}

/// Result of a page's `load`
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Data(Value),
    Redirect { location: String, status: StatusCode },
}

impl LoadOutcome {
    pub fn data(value: Value) -> Self {
        LoadOutcome::Data(value)
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        LoadOutcome::Redirect {
            location: location.into(),
            status: StatusCode::FOUND,
        }
    }
}

/// Result of running one middleware
#[derive(Debug, Clone)]
pub enum MiddlewareOutcome {
    /// Continue with the next middleware, then the route
    Continue,
    /// Stop and send this response
    Respond(ApiResponse),
}

/// Executable form of a route, layout or middleware file
///
/// Every method has a default matching "not exported", so implementations
/// only override what their file exports.
#[async_trait]
pub trait ServerModule: Send + Sync {
    /// Names the module exports (`default`, `load`, `GET`, ...)
    fn exports(&self) -> Vec<String>;

    /// The default export of a page or layout
    fn component(&self) -> Option<Component> {
        None
    }

    fn prerender(&self) -> Option<PrerenderExport> {
        None
    }

    /// Param sets enumerated by `prerender.paths()`
    async fn prerender_paths(&self) -> Result<Vec<Params>> {
        bail!("module does not export prerender paths")
    }

    fn cache(&self) -> Option<CacheConfig> {
        None
    }

    async fn load(&self, _ctx: &RequestContext) -> Result<LoadOutcome> {
        Ok(LoadOutcome::Data(Value::Null))
    }

    /// Runs the handler exported for `method`, or `None` when there is none
    async fn handle(&self, _method: &Method, _ctx: &RequestContext) -> Result<Option<ApiResponse>> {
        Ok(None)
    }

    async fn middleware(&self, _ctx: &mut RequestContext) -> Result<MiddlewareOutcome> {
        Ok(MiddlewareOutcome::Continue)
    }
}

/// Loads server modules from compiled (or source) files
#[async_trait]
pub trait ModuleRuntime: Send + Sync {
    async fn import(&self, path: &Path) -> Result<Arc<dyn ServerModule>>;
}

// ============================================================================
// ModuleCache
// ============================================================================

/// Per-path import cache
///
/// Populated on first use and never evicted; a new deployment (a new cache)
/// is the only way to pick up rebuilt modules. Failed imports are not cached.
pub struct ModuleCache {
    runtime: Arc<dyn ModuleRuntime>,
    modules: RwLock<HashMap<PathBuf, Arc<dyn ServerModule>>>,
}

impl ModuleCache {
    pub fn new(runtime: Arc<dyn ModuleRuntime>) -> Self {
        Self {
            runtime,
            modules: RwLock::new(HashMap::new()),
        }
    }

    pub async fn import(&self, path: &Path) -> Result<Arc<dyn ServerModule>> {
        if let Some(module) = self.modules.read().await.get(path) {
            return Ok(module.clone());
        }

        let module = self
            .runtime
            .import(path)
            .await
            .with_context(|| format!("Failed to import server module {:?}", path))?;

        let mut modules = self.modules.write().await;
        Ok(modules
            .entry(path.to_path_buf())
            .or_insert(module)
            .clone())
    }

    /// Number of cached modules
    pub async fn len(&self) -> usize {
        self.modules.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.modules.read().await.is_empty()
    }
}

// ============================================================================
// NativeModule
// ============================================================================

type LoadFn = Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<LoadOutcome>> + Send + Sync>;
type PathsFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<Params>>> + Send + Sync>;
type HandlerFn = Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<ApiResponse>> + Send + Sync>;
type MiddlewareFn = Arc<dyn Fn(&mut RequestContext) -> Result<MiddlewareOutcome> + Send + Sync>;

/// Server module written in Rust
///
/// ```
/// use vellum::module::{LoadOutcome, NativeModule, ServerModule};
/// use vellum::template::Template;
///
/// let page = NativeModule::new()
///     .with_component(Template::new("<h1>{title}</h1>").into_component())
///     .with_load(|_ctx| async { Ok(LoadOutcome::data(serde_json::json!({ "title": "Hi" }))) });
///
/// assert_eq!(page.exports(), vec!["default", "load"]);
/// ```
#[derive(Clone, Default)]
pub struct NativeModule {
    component: Option<Component>,
    load: Option<LoadFn>,
    prerender: Option<PrerenderExport>,
    paths: Option<PathsFn>,
    cache: Option<CacheConfig>,
    handlers: BTreeMap<String, HandlerFn>,
    middleware: Option<MiddlewareFn>,
}

impl fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule")
            .field("exports", &self.exports())
            .finish()
    }
}

impl NativeModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.component = Some(component);
        self
    }

    pub fn with_load<F, Fut>(mut self, load: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<LoadOutcome>> + Send + 'static,
    {
        let load: LoadFn = Arc::new(move |ctx| -> BoxFuture<'static, Result<LoadOutcome>> {
            Box::pin(load(ctx))
        });
        self.load = Some(load);
        self
    }

    /// `load` returning the same data on every call
    pub fn with_data(self, data: Value) -> Self {
        self.with_load(move |_ctx| {
            let data = data.clone();
            async move { Ok(LoadOutcome::Data(data)) }
        })
    }

    /// `prerender = true`
    pub fn with_prerender(mut self) -> Self {
        self.prerender = Some(PrerenderExport::Static);
        self
    }

    /// `prerender = { paths() }`
    pub fn with_prerender_paths<F, Fut>(mut self, paths: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Params>>> + Send + 'static,
    {
        self.prerender = Some(PrerenderExport::Paths);
        let paths: PathsFn =
            Arc::new(move || -> BoxFuture<'static, Result<Vec<Params>>> { Box::pin(paths()) });
        self.paths = Some(paths);
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Exports a handler for `method` (`GET`, `POST`, ...)
    pub fn with_handler<F, Fut>(mut self, method: &str, handler: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse>> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |ctx| -> BoxFuture<'static, Result<ApiResponse>> {
            Box::pin(handler(ctx))
        });
        self.handlers.insert(method.to_ascii_uppercase(), handler);
        self
    }

    pub fn with_middleware<F>(mut self, middleware: F) -> Self
    where
        F: Fn(&mut RequestContext) -> Result<MiddlewareOutcome> + Send + Sync + 'static,
    {
        let middleware: MiddlewareFn = Arc::new(middleware);
        self.middleware = Some(middleware);
        self
    }
}

#[async_trait]
impl ServerModule for NativeModule {
    fn exports(&self) -> Vec<String> {
        let mut exports = Vec::new();
        if self.component.is_some() {
            exports.push(DEFAULT_EXPORT.to_string());
        }
        if self.load.is_some() {
            exports.push(LOAD_EXPORT.to_string());
        }
        if self.prerender.is_some() {
            exports.push(PRERENDER_EXPORT.to_string());
        }
        if self.cache.is_some() {
            exports.push(CACHE_EXPORT.to_string());
        }
        exports.extend(
            HTTP_METHODS
                .iter()
                .filter(|m| self.handlers.contains_key(**m))
                .map(|m| m.to_string()),
        );
        if self.middleware.is_some() {
            exports.push(MIDDLEWARE_EXPORT.to_string());
        }
        exports
    }

    fn component(&self) -> Option<Component> {
        self.component.clone()
    }

    fn prerender(&self) -> Option<PrerenderExport> {
        self.prerender
    }

    async fn prerender_paths(&self) -> Result<Vec<Params>> {
        match &self.paths {
            Some(paths) => paths().await,
            None => bail!("module does not export prerender paths"),
        }
    }

    fn cache(&self) -> Option<CacheConfig> {
        self.cache
    }

    async fn load(&self, ctx: &RequestContext) -> Result<LoadOutcome> {
        match &self.load {
            Some(load) => load(ctx.clone()).await,
            None => Ok(LoadOutcome::Data(Value::Null)),
        }
    }

    async fn handle(&self, method: &Method, ctx: &RequestContext) -> Result<Option<ApiResponse>> {
        match self.handlers.get(method.as_str()) {
            Some(handler) => handler(ctx.clone()).await.map(Some),
            None => Ok(None),
        }
    }

    async fn middleware(&self, ctx: &mut RequestContext) -> Result<MiddlewareOutcome> {
        match &self.middleware {
            Some(middleware) => middleware(ctx),
            None => Ok(MiddlewareOutcome::Continue),
        }
    }
}

// ============================================================================
// ModuleRegistry
// ============================================================================

/// In-process [`ModuleRuntime`] resolving paths to registered modules
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<PathBuf, Arc<dyn ServerModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: impl Into<PathBuf>, module: impl ServerModule + 'static) {
        self.modules.insert(path.into(), Arc::new(module));
    }

    pub fn with_module(mut self, path: impl Into<PathBuf>, module: impl ServerModule + 'static) -> Self {
        self.register(path, module);
        self
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.modules.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[async_trait]
impl ModuleRuntime for ModuleRegistry {
    async fn import(&self, path: &Path) -> Result<Arc<dyn ServerModule>> {
        match self.modules.get(path) {
            Some(module) => Ok(module.clone()),
            None => bail!("no module registered for {}", path.display()),
        }
    }
}
