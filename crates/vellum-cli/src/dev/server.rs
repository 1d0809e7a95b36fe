use super::watcher::{load_router, RouteWatcher};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_livereload::LiveReloadLayer;
use vellum::{Adapter, DevOptions, DevResolver, ModuleRuntime, Server};
use vellum_router::ScanOptions;

pub struct DevServerOptions {
    pub routes_dir: PathBuf,
    pub adapter: Arc<dyn Adapter>,
    pub runtime: Arc<dyn ModuleRuntime>,
    pub base: String,
    pub host: String,
    pub port: u16,
    pub live_reload: bool,
}

/// Serves routes straight from the source tree until interrupted
pub async fn start_dev_server(options: DevServerOptions) -> Result<()> {
    let scan_options = ScanOptions::new(options.adapter.file_extensions());

    if !options.routes_dir.is_dir() {
        anyhow::bail!("Routes directory not found: {}", options.routes_dir.display());
    }
    println!("  {} Routes: {}", "📂".cyan(), options.routes_dir.display());

    let router = load_router(&options.routes_dir, &scan_options)?;
    println!("  {} Found {} routes", "✓".green(), router.len());
    let resolver = DevResolver::new(router);

    let server = Server::dev(DevOptions {
        resolver: resolver.clone(),
        adapter: options.adapter,
        runtime: options.runtime,
        base: options.base,
    });
    let mut app = server.router();

    let reloader = if options.live_reload {
        let livereload = LiveReloadLayer::new();
        let reloader = livereload.reloader();
        app = app.layer(livereload);
        Some(reloader)
    } else {
        None
    };

    // Dropping the watcher stops it
    let _watcher = RouteWatcher::spawn(options.routes_dir, scan_options, resolver, reloader)?;

    let addr = format!("{}:{}", options.host, options.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    println!();
    println!("{}", "✅ Dev server ready!".green().bold());
    println!();
    println!("  {} {}", "URL:".cyan(), format!("http://{}", addr).bold());
    if options.live_reload {
        println!("  {} Live reload enabled", "🔥".yellow());
    }
    println!("  {} Press Ctrl+C to stop", "ℹ".cyan());
    println!();

    axum::serve(listener, app).await?;
    Ok(())
}
