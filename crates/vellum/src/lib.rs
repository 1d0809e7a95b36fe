// Vellum - full-stack web framework core
// Adapter and server-module contracts, build manifest, production matcher and request pipeline

pub mod adapter;
pub mod cache_control;
pub mod config;
pub mod document;
pub mod manifest;
pub mod matcher;
pub mod module;
pub mod request_context;
pub mod response;
pub mod server;
pub mod template;

// Re-export framework types
pub use adapter::{Adapter, CompilerPlugin, Component, RenderContext};
pub use cache_control::CacheConfig;
pub use config::Config;
pub use manifest::{ManifestError, ManifestRouteEntry, RouteManifest};
pub use matcher::Matcher;
pub use module::{
    LoadOutcome, MiddlewareOutcome, ModuleCache, ModuleRegistry, ModuleRuntime, NativeModule,
    PrerenderExport, ServerModule,
};
pub use request_context::{QueryParams, RequestContext};
pub use response::ApiResponse;
pub use server::{DevOptions, DevResolver, RouteResolver, Server, ServerOptions};
pub use template::{Template, TemplateAdapter};

// Re-export the router crate and commonly used dependencies
pub use vellum_router as router;
pub use axum;
pub use axum::http::StatusCode;
