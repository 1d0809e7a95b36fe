use crate::{tokio_runtime, App};
use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use vellum::Config;
use vellum_build::{BuildOptions, Bundler, EsbuildBundler};

pub fn execute(
    app: &App,
    root: &Path,
    mut config: Config,
    out_dir: Option<String>,
    silent: bool,
) -> Result<()> {
    if let Some(out_dir) = out_dir {
        config.build.out_dir = out_dir;
    }
    if silent {
        config.build.silent = true;
    }

    let adapter = app.require_adapter("build")?;
    let runtime = app.require_runtime("build")?;
    let bundler: Arc<dyn Bundler> = match app.bundler() {
        Some(bundler) => bundler.clone(),
        None => Arc::new(EsbuildBundler::locate(root)?),
    };

    if !config.build.silent {
        println!("{}", "Building for production...".green().bold());
    }

    let options = BuildOptions::from_config(root, &config, adapter, runtime, bundler);
    let result = tokio_runtime()?.block_on(vellum_build::build(options))?;

    if !config.build.silent {
        println!(
            "  {} Output: {}",
            "📦".cyan(),
            config.out_dir(root).display()
        );
        if result.route_count == 0 {
            println!("  {} No routes found", "⚠".yellow());
        }
    }

    Ok(())
}
