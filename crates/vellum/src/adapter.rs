//! UI adapter contract
//!
//! An adapter is the only code that understands components. The framework
//! hands it opaque [`Component`] values and JSON page data and gets back HTML
//! strings and browser bootstrap code.

use anyhow::Result;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use vellum_router::Params;

/// Marker in the document shell replaced by collected head markup
pub const HEAD_MARKER: &str = "<!--vellum-head-->";

/// Marker in the document shell replaced by the rendered body
pub const BODY_MARKER: &str = "<!--vellum-body-->";

/// Id of the element server-rendered markup is mounted in
pub const CONTAINER_ID: &str = "vellum-root";

/// Shell used by adapters that do not provide their own
pub const DEFAULT_DOCUMENT_SHELL: &str = "<!DOCTYPE html>\n\
<html>\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<!--vellum-head-->\n\
</head>\n\
<body>\n\
<!--vellum-body-->\n\
</body>\n\
</html>\n";

/// Opaque UI component; only the adapter that produced it looks inside
pub type Component = Arc<dyn Any + Send + Sync>;

/// Compiler plugin an adapter needs to transform its file types
///
/// Loaders map a file extension (without the dot) to a bundler loader name;
/// externals are module specifiers resolved at execution time instead of
/// being bundled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerPlugin {
    pub name: String,
    pub loaders: Vec<(String, String)>,
    pub externals: Vec<String>,
}

impl CompilerPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_loader(mut self, extension: impl Into<String>, loader: impl Into<String>) -> Self {
        self.loaders.push((extension.into(), loader.into()));
        self
    }

    pub fn with_external(mut self, specifier: impl Into<String>) -> Self {
        self.externals.push(specifier.into());
        self
    }
}

/// Per-render state handed to [`Adapter::render_to_html`]
pub struct RenderContext {
    /// Request URL path being rendered
    pub url: String,
    pub params: Params,
    /// Layout components, outermost first
    pub layouts: Vec<Component>,
    head: Vec<String>,
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("url", &self.url)
            .field("params", &self.params)
            .field("layouts", &self.layouts.len())
            .field("head", &self.head)
            .finish()
    }
}

impl RenderContext {
    pub fn new(url: impl Into<String>, params: Params) -> Self {
        Self {
            url: url.into(),
            params,
            layouts: Vec::new(),
            head: Vec::new(),
        }
    }

    pub fn with_layouts(mut self, layouts: Vec<Component>) -> Self {
        self.layouts = layouts;
        self
    }

    /// Adds markup to the document head
    pub fn push_head(&mut self, markup: impl Into<String>) {
        self.head.push(markup.into());
    }

    pub fn head(&self) -> &[String] {
        &self.head
    }

    pub fn into_head(self) -> Vec<String> {
        self.head
    }
}

/// A UI framework integration
///
/// Implementations must be substitutable: the framework never branches on
/// [`Adapter::name`] except when logging.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;

    /// Source extensions (without the dot) recognized for pages and layouts
    fn file_extensions(&self) -> Vec<String>;

    fn compiler_plugins(&self) -> Vec<CompilerPlugin> {
        Vec::new()
    }

    /// Renders `component` wrapped in `ctx.layouts`
    fn render_to_html(
        &self,
        component: &Component,
        data: &Value,
        ctx: &mut RenderContext,
    ) -> Result<String>;

    /// Browser bootstrap code for a page's client entry wrapper
    fn hydration_script(
        &self,
        client_entry_url: &str,
        container_id: &str,
        layout_client_urls: &[String],
    ) -> String;

    /// HTML document containing [`HEAD_MARKER`] and [`BODY_MARKER`]
    fn document_shell(&self) -> String {
        DEFAULT_DOCUMENT_SHELL.to_string()
    }
}
