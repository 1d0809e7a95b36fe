//! Static export inference
//!
//! Export names come from bundler metadata without running anything. The
//! `prerender` and `cache` exports carry values, so a module declaring either
//! is imported once to read them; an import failure only degrades that route.

use crate::bundler::OutputMeta;
use std::path::Path;
use tracing::warn;
use vellum::module::{
    exported_methods, CACHE_EXPORT, DEFAULT_EXPORT, LOAD_EXPORT, PRERENDER_EXPORT,
};
use vellum::{CacheConfig, ModuleCache, PrerenderExport};

/// What a compiled route module exports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteExports {
    pub has_default: bool,
    pub has_load: bool,
    /// Recognized HTTP methods, canonical order
    pub methods: Vec<String>,
    pub prerender: Option<PrerenderExport>,
    pub cache: Option<CacheConfig>,
}

/// Export names only
///
/// # Examples
///
/// ```
/// use vellum_build::bundler::OutputMeta;
/// use vellum_build::exports::infer_static;
///
/// let meta = OutputMeta {
///     exports: vec!["GET".into(), "POST".into(), "schema".into()],
///     ..OutputMeta::default()
/// };
/// let exports = infer_static(&meta);
/// assert_eq!(exports.methods, vec!["GET", "POST"]);
/// assert!(!exports.has_load);
/// ```
pub fn infer_static(meta: &OutputMeta) -> RouteExports {
    let has = |name: &str| meta.exports.iter().any(|e| e == name);

    RouteExports {
        has_default: has(DEFAULT_EXPORT),
        has_load: has(LOAD_EXPORT),
        methods: exported_methods(&meta.exports),
        prerender: None,
        cache: None,
    }
}

/// Whether the module must be imported to read export values
pub fn needs_import(meta: &OutputMeta) -> bool {
    meta.exports
        .iter()
        .any(|e| e == PRERENDER_EXPORT || e == CACHE_EXPORT)
}

/// Export names plus `prerender`/`cache` values read from the module at `module_path`
pub async fn infer(
    route_id: &str,
    meta: &OutputMeta,
    module_path: &Path,
    modules: &ModuleCache,
) -> RouteExports {
    let mut exports = infer_static(meta);
    if !needs_import(meta) {
        return exports;
    }

    match modules.import(module_path).await {
        Ok(module) => {
            exports.prerender = module.prerender();
            exports.cache = module.cache();
        }
        Err(err) => warn!(
            "Could not import {} to read its prerender/cache exports: {:#}",
            route_id, err
        ),
    }

    exports
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vellum::{ModuleRegistry, NativeModule};

    fn meta(exports: &[&str]) -> OutputMeta {
        OutputMeta {
            exports: exports.iter().map(|e| e.to_string()).collect(),
            ..OutputMeta::default()
        }
    }

    #[test]
    fn test_needs_import_only_for_value_exports() {
        assert!(!needs_import(&meta(&["default", "load"])));
        assert!(needs_import(&meta(&["default", "prerender"])));
        assert!(needs_import(&meta(&["cache"])));
    }

    #[tokio::test]
    async fn test_infer_reads_values() {
        let registry = ModuleRegistry::new().with_module(
            "/out/server/about/page.js",
            NativeModule::new()
                .with_prerender()
                .with_cache(CacheConfig::new().max_age(60)),
        );
        let modules = ModuleCache::new(Arc::new(registry));

        let exports = infer(
            "/about",
            &meta(&["default", "prerender", "cache"]),
            Path::new("/out/server/about/page.js"),
            &modules,
        )
        .await;

        assert!(exports.has_default);
        assert_eq!(exports.prerender, Some(PrerenderExport::Static));
        assert_eq!(exports.cache, Some(CacheConfig::new().max_age(60)));
    }

    #[tokio::test]
    async fn test_import_failure_degrades() {
        let modules = ModuleCache::new(Arc::new(ModuleRegistry::new()));
        let exports = infer(
            "/about",
            &meta(&["default", "load", "prerender"]),
            Path::new("/out/server/missing.js"),
            &modules,
        )
        .await;

        assert!(exports.has_load);
        assert_eq!(exports.prerender, None);
    }
}
