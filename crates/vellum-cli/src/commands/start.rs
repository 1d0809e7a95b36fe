use crate::{tokio_runtime, App};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tracing::info;
use vellum::{Config, Server, ServerOptions};

pub fn execute(app: &App, root: &Path, config: &Config, port: Option<u16>) -> Result<()> {
    let adapter = app.require_adapter("start")?;
    let runtime = app.require_runtime("start")?;
    let out_dir = config.out_dir(root);
    let addr = format!("{}:{}", config.server.host, port.unwrap_or(config.server.port));

    tokio_runtime()?.block_on(async move {
        let server = Server::new(ServerOptions {
            out_dir,
            adapter,
            runtime,
        })
        .context("Failed to start the production server")?;

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        if let Some(manifest) = server.manifest() {
            info!("Serving {} routes", manifest.routes.len());
        }
        println!();
        println!("{}", "✅ Server ready!".green().bold());
        println!("  {} {}", "URL:".cyan(), format!("http://{}", addr).bold());
        println!("  {} Press Ctrl+C to stop", "ℹ".cyan());
        println!();

        axum::serve(listener, server.router()).await?;
        Ok(())
    })
}
