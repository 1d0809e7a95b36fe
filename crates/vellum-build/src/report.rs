//! Human-readable build report

use crate::BuildResult;
use colored::Colorize;
use vellum::manifest::RouteManifest;
use vellum::ManifestRouteEntry;

/// Byte count for display
///
/// # Examples
///
/// ```
/// use vellum_build::report::format_size;
///
/// assert_eq!(format_size(0), "-");
/// assert_eq!(format_size(1023), "1023 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    match bytes {
        0 => "-".to_string(),
        n if n < 1024 => format!("{} B", n),
        n => format!("{:.1} KB", n as f64 / 1024.0),
    }
}

/// How a route is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Ssg,
    Ssr,
    Api,
}

impl RenderMode {
    pub fn of(entry: &ManifestRouteEntry) -> Self {
        if entry.is_api() {
            RenderMode::Api
        } else if entry.prerendered {
            RenderMode::Ssg
        } else {
            RenderMode::Ssr
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Ssg => "SSG",
            RenderMode::Ssr => "SSR",
            RenderMode::Api => "API",
        }
    }
}

/// One line of the route table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub route: String,
    pub route_type: String,
    pub mode: RenderMode,
    /// Client entry plus shared chunks and CSS, in bytes
    pub size: u64,
    pub has_load: bool,
}

/// Route table rows in manifest order
pub fn report_rows(manifest: &RouteManifest) -> Vec<ReportRow> {
    manifest
        .routes
        .values()
        .map(|entry| {
            let size = entry
                .client_entry
                .iter()
                .chain(&entry.client_chunks)
                .chain(&entry.css)
                .filter_map(|path| manifest.assets.get(path))
                .map(|asset| asset.size)
                .sum();

            ReportRow {
                route: entry.id.clone(),
                route_type: entry.route_type.to_string(),
                mode: RenderMode::of(entry),
                size,
                has_load: entry.has_load,
            }
        })
        .collect()
}

/// Prints the route table and totals
pub fn print_report(result: &BuildResult) {
    let rows = report_rows(&result.manifest);
    let width = rows.iter().map(|r| r.route.len()).max().unwrap_or(5).max(5);

    println!();
    println!(
        "  {:<width$}  {:<4}  {:<4}  {:>9}  {}",
        "Route".bold(),
        "Type".bold(),
        "Mode".bold(),
        "Size".bold(),
        "load()".bold(),
        width = width
    );

    for row in &rows {
        let mode = match row.mode {
            RenderMode::Ssg => row.mode.as_str().green(),
            RenderMode::Ssr => row.mode.as_str().cyan(),
            RenderMode::Api => row.mode.as_str().yellow(),
        };
        println!(
            "  {:<width$}  {:<4}  {:<4}  {:>9}  {}",
            row.route,
            row.route_type,
            mode,
            format_size(row.size),
            if row.has_load { "✓" } else { "" },
            width = width
        );
    }

    println!();
    println!(
        "{} {} routes ({} pages, {} API), {} prerendered pages in {:.2?}",
        "✓".green().bold(),
        result.route_count,
        result.page_count,
        result.api_count,
        result.prerendered_pages,
        result.duration
    );
}
