use crate::App;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use vellum::Config;
use vellum_router::{scan, RouteType, Router, ScanOptions};

pub fn execute(app: &App, root: &Path, config: &Config, json: bool) -> Result<()> {
    let options = match app.adapter() {
        Some(adapter) => ScanOptions::new(adapter.file_extensions()),
        None => ScanOptions::default(),
    };
    let routes_dir = config.routes_dir(root);
    let scanned = scan(&routes_dir, &options)?;
    let router = Router::new(&scanned)?;

    if json {
        println!("{}", router.to_json()?);
        return Ok(());
    }

    for issue in &scanned.errors {
        println!("  {} {}", "⚠".yellow(), issue);
    }

    if router.is_empty() {
        println!("No routes found in {}", routes_dir.display());
        return Ok(());
    }

    println!("{}", "Routes:".cyan().bold());
    for line in route_lines(&router, &routes_dir) {
        println!("  {}", line);
    }
    Ok(())
}

/// `<type> <id> -> <file>` rows in match priority order
pub fn route_lines(router: &Router, routes_dir: &Path) -> Vec<String> {
    let width = router.routes().iter().map(|r| r.id.len()).max().unwrap_or(0);

    router
        .routes()
        .iter()
        .map(|route| {
            let kind = match route.route_type {
                RouteType::Page => "page",
                RouteType::Api => "api ",
            };
            let file = route
                .file_path
                .strip_prefix(routes_dir)
                .unwrap_or(&route.file_path);
            format!("{} {:<width$} → {}", kind, route.id, file.display(), width = width)
        })
        .collect()
}
