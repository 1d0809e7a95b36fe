use crate::App;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use vellum::Config;

#[cfg(feature = "dev-server")]
pub fn execute(app: &App, root: &Path, config: &Config, port: Option<u16>) -> Result<()> {
    use crate::dev::server::{start_dev_server, DevServerOptions};
    use crate::tokio_runtime;

    println!("{}", "Preparing development environment...".green().bold());

    let options = DevServerOptions {
        routes_dir: config.routes_dir(root),
        adapter: app.require_adapter("dev")?,
        runtime: app.require_runtime("dev")?,
        base: config.build.base.clone(),
        host: config.server.host.clone(),
        port: port.unwrap_or(config.dev.port),
        live_reload: config.dev.live_reload,
    };

    tokio_runtime()?.block_on(start_dev_server(options))
}

#[cfg(not(feature = "dev-server"))]
pub fn execute(_app: &App, _root: &Path, _config: &Config, _port: Option<u16>) -> Result<()> {
    println!("{}", "⚠ Dev server not available".yellow());
    println!();
    println!("The dev server requires the 'dev-server' feature.");
    println!("Rebuild with: cargo build --features dev-server");
    Ok(())
}
