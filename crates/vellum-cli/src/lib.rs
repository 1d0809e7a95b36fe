//! # Vellum CLI
//!
//! `vellum build`, `vellum start`, `vellum dev` and `vellum routes`.
//!
//! The framework core never picks a UI adapter or a way to execute compiled
//! server modules, so an application binary hands those in through [`App`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use vellum::{ModuleRegistry, TemplateAdapter};
//! use vellum_cli::App;
//!
//! fn main() -> anyhow::Result<()> {
//!     let app = App::new()
//!         .with_adapter(Arc::new(TemplateAdapter::default()))
//!         .with_runtime(Arc::new(ModuleRegistry::new()));
//!     vellum_cli::run(app)
//! }
//! ```
//!
//! Without an adapter only `routes` is available.

pub mod commands;

#[cfg(feature = "dev-server")]
pub mod dev;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vellum::{Adapter, Config, ModuleRuntime};
use vellum_build::Bundler;

#[derive(Parser, Debug)]
#[command(name = "vellum")]
#[command(version, about = "Vellum CLI - file-routed SSR and SSG framework", long_about = None)]
pub struct Cli {
    /// Project root containing vellum.toml
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Build the project for production
    Build {
        /// Output directory (overrides build.out_dir)
        #[arg(long)]
        out_dir: Option<String>,

        /// Skip the build report
        #[arg(long)]
        silent: bool,
    },

    /// Serve a previous build
    Start {
        /// Port to listen on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start the development server with live reload
    Dev {
        /// Port to listen on (overrides dev.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the route table
    Routes {
        /// Print the route graph as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Collaborators supplied by the application binary
#[derive(Clone, Default)]
pub struct App {
    adapter: Option<Arc<dyn Adapter>>,
    runtime: Option<Arc<dyn ModuleRuntime>>,
    bundler: Option<Arc<dyn Bundler>>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn ModuleRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Replaces the esbuild bundler `build` would otherwise locate
    pub fn with_bundler(mut self, bundler: Arc<dyn Bundler>) -> Self {
        self.bundler = Some(bundler);
        self
    }

    pub fn adapter(&self) -> Option<&Arc<dyn Adapter>> {
        self.adapter.as_ref()
    }

    pub fn bundler(&self) -> Option<&Arc<dyn Bundler>> {
        self.bundler.as_ref()
    }

    pub(crate) fn require_adapter(&self, command: &str) -> Result<Arc<dyn Adapter>> {
        self.adapter.clone().ok_or_else(|| {
            anyhow!(
                "`vellum {}` needs a UI adapter; run it from an application binary that passes one to vellum_cli::run",
                command
            )
        })
    }

    pub(crate) fn require_runtime(&self, command: &str) -> Result<Arc<dyn ModuleRuntime>> {
        self.runtime.clone().ok_or_else(|| {
            anyhow!(
                "`vellum {}` needs a module runtime; run it from an application binary that passes one to vellum_cli::run",
                command
            )
        })
    }
}

/// Parses the process arguments and runs the command
pub fn run(app: App) -> Result<()> {
    execute(app, Cli::parse())
}

/// Like [`run`] with explicit arguments (the first one is the binary name)
pub fn run_from<I, T>(app: App, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    execute(app, Cli::try_parse_from(args)?)
}

fn execute(app: App, cli: Cli) -> Result<()> {
    init_logging(cli.verbose);

    let config = Config::load_from_root(&cli.root)?;

    match cli.command {
        Commands::Build { out_dir, silent } => {
            commands::build::execute(&app, &cli.root, config, out_dir, silent)
        }
        Commands::Start { port } => commands::start::execute(&app, &cli.root, &config, port),
        Commands::Dev { port } => commands::dev::execute(&app, &cli.root, &config, port),
        Commands::Routes { json } => commands::routes::execute(&app, &cli.root, &config, json),
    }
}

/// Installs the global subscriber; later calls are no-ops
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn tokio_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
