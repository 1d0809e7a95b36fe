//! Static prerendering
//!
//! Each page with a `prerender` export is rendered once per parameter set and
//! written under `<out>/static`. Pages are rendered one at a time; a failure
//! skips that page (or the whole route) with a warning and never aborts the
//! build.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use vellum::axum::http::Method;
use vellum::document::{asset_url, render_document, PageRender};
use vellum::manifest::{static_file_for_url, ManifestRouteEntry};
use vellum::module::ServerModule;
use vellum::{Adapter, Component, LoadOutcome, ModuleCache, PrerenderExport, RequestContext};
use vellum_router::route::pattern::{parse_pattern_segment, PatternSegment};
use vellum_router::{split_segments, Params};

/// Concrete URL for `pattern` with `params` substituted
///
/// Returns `None` when a parameter is missing or empty, or when a dynamic
/// value would span more than one segment.
///
/// # Examples
///
/// ```
/// use vellum_build::prerender::concrete_url;
/// use vellum_router::Params;
///
/// let params = Params::from([("slug".to_string(), "hello".to_string())]);
/// assert_eq!(concrete_url("/blog/:slug", &params).as_deref(), Some("/blog/hello"));
/// assert_eq!(concrete_url("/", &Params::new()).as_deref(), Some("/"));
/// assert_eq!(concrete_url("/blog/:slug", &Params::new()), None);
/// ```
pub fn concrete_url(pattern: &str, params: &Params) -> Option<String> {
    let mut segments = Vec::new();

    for segment in split_segments(pattern) {
        match parse_pattern_segment(segment) {
            PatternSegment::Static(text) => segments.push(text.to_string()),
            PatternSegment::Param(name) => {
                let value = params.get(name)?;
                if value.is_empty() || value.contains('/') {
                    return None;
                }
                segments.push(value.clone());
            }
            PatternSegment::CatchAll(name) => {
                let value = params.get(name)?.trim_matches('/');
                if value.is_empty() {
                    return None;
                }
                segments.push(value.to_string());
            }
        }
    }

    Some(format!("/{}", segments.join("/")))
}

/// Shared state of a prerender pass
pub struct Prerenderer<'a> {
    pub adapter: &'a dyn Adapter,
    pub modules: &'a ModuleCache,
    /// Base for `serverEntry` and `layoutEntries`
    pub server_dir: &'a Path,
    pub static_dir: &'a Path,
    pub base: &'a str,
}

impl Prerenderer<'_> {
    /// Prerenders every parameter set of one route
    ///
    /// Updates `entry` when at least one page was written and returns the
    /// number of pages written.
    pub async fn prerender_route(&self, entry: &mut ManifestRouteEntry, mode: PrerenderExport) -> usize {
        let files = match self.render_route(entry, mode).await {
            Ok(files) => files,
            Err(err) => {
                warn!("Skipping prerender of {}: {:#}", entry.id, err);
                return 0;
            }
        };

        if files.is_empty() {
            return 0;
        }

        entry.prerendered = true;
        match mode {
            PrerenderExport::Static => entry.prerendered_file = files.first().cloned(),
            PrerenderExport::Paths => entry.prerendered_count = Some(files.len()),
        }
        files.len()
    }

    async fn render_route(&self, entry: &ManifestRouteEntry, mode: PrerenderExport) -> Result<Vec<String>> {
        let server_entry = entry
            .server_entry
            .as_deref()
            .ok_or_else(|| anyhow!("no compiled server entry"))?;
        let module = self.modules.import(&self.server_dir.join(server_entry)).await?;
        let component = module
            .component()
            .ok_or_else(|| anyhow!("page has no default export"))?;

        let param_sets = match mode {
            PrerenderExport::Static => vec![Params::new()],
            PrerenderExport::Paths => module
                .prerender_paths()
                .await
                .context("prerender.paths() failed")?,
        };

        let mut layouts = Vec::with_capacity(entry.layout_entries.len());
        for layout in &entry.layout_entries {
            let layout_module = self.modules.import(&self.server_dir.join(layout)).await?;
            layouts.push(
                layout_module
                    .component()
                    .ok_or_else(|| anyhow!("layout {} has no default export", layout))?,
            );
        }

        let mut files = Vec::new();
        for params in param_sets {
            match self.render_page(entry, &module, &component, &layouts, params).await {
                Ok(Some(file)) => files.push(file),
                Ok(None) => {}
                Err(err) => warn!("Failed to prerender a page of {}: {:#}", entry.id, err),
            }
        }

        Ok(files)
    }

    async fn render_page(
        &self,
        entry: &ManifestRouteEntry,
        module: &Arc<dyn ServerModule>,
        component: &Component,
        layouts: &[Component],
        params: Params,
    ) -> Result<Option<String>> {
        let url = concrete_url(&entry.pattern, &params)
            .ok_or_else(|| anyhow!("params {:?} do not fill {}", params, entry.pattern))?;
        let file = static_file_for_url(&url).ok_or_else(|| anyhow!("unsafe URL {}", url))?;

        let ctx = RequestContext::new(Method::GET, url.clone()).with_params(params.clone());
        let data = match module.load(&ctx).await.context("load() failed")? {
            LoadOutcome::Data(data) => data,
            LoadOutcome::Redirect { location, .. } => {
                warn!("load() for {} redirects to {}; page not prerendered", url, location);
                return Ok(None);
            }
        };

        let html = render_document(
            self.adapter,
            PageRender {
                component,
                layouts: layouts.to_vec(),
                data: &data,
                url: &url,
                params,
                client_entry_url: entry
                    .client_entry
                    .as_deref()
                    .map(|client| asset_url(self.base, client)),
                stylesheets: entry.css.iter().map(|css| asset_url(self.base, css)).collect(),
            },
        )?;

        let path = self.static_dir.join(&file);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, html)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!("Prerendered {} -> {}", url, file);
        Ok(Some(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_concrete_url_catch_all() {
        assert_eq!(
            concrete_url("/docs/*path", &params(&[("path", "guide/intro")])).as_deref(),
            Some("/docs/guide/intro")
        );
        assert_eq!(concrete_url("/docs/*path", &params(&[("path", "")])), None);
    }

    #[test]
    fn test_concrete_url_rejects_multi_segment_param() {
        assert_eq!(concrete_url("/blog/:slug", &params(&[("slug", "a/b")])), None);
    }

    #[test]
    fn test_concrete_url_ignores_extra_params() {
        assert_eq!(
            concrete_url("/a/:x/edit", &params(&[("x", "1"), ("y", "2")])).as_deref(),
            Some("/a/1/edit")
        );
    }
}
