use anyhow::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tower_livereload::Reloader;
use tracing::{debug, error, info, warn};
use vellum::DevResolver;
use vellum_router::{scan, Router, ScanOptions};

/// Quiet period collapsing an editor's burst of events into one rebuild
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Scans `routes_dir` and builds a router, logging skipped files
pub fn load_router(routes_dir: &Path, options: &ScanOptions) -> Result<Router> {
    let scanned = scan(routes_dir, options)?;
    for issue in &scanned.errors {
        warn!("Skipped {}", issue);
    }
    Ok(Router::new(&scanned)?)
}

/// Rebuilds the dev router whenever the routes directory changes
pub struct RouteWatcher {
    _watcher: RecommendedWatcher,
}

impl RouteWatcher {
    /// Starts watching; must be called inside a tokio runtime
    ///
    /// Each change produces a fresh [`Router`] that replaces the resolver's
    /// current one. When the rebuild fails the previous router stays active.
    pub fn spawn(
        routes_dir: PathBuf,
        options: ScanOptions,
        resolver: DevResolver,
        reloader: Option<Reloader>,
    ) -> Result<Self> {
        let (tx, mut rx) = mpsc::channel::<PathBuf>(100);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !affects_routes(&event.kind) {
                    return;
                }
                for path in event.paths {
                    if is_hidden(&path) {
                        continue;
                    }
                    let _ = tx.blocking_send(path);
                }
            }
            Err(e) => error!("Watch error: {:?}", e),
        })?;

        watcher.watch(&routes_dir, RecursiveMode::Recursive)?;
        info!("Watching {}", routes_dir.display());

        tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                tokio::time::sleep(DEBOUNCE).await;
                while rx.try_recv().is_ok() {}

                debug!("Change detected: {}", path.display());
                match load_router(&routes_dir, &options) {
                    Ok(router) => {
                        let count = router.len();
                        resolver.replace(router).await;
                        info!("Routes reloaded ({} routes)", count);
                        if let Some(reloader) = &reloader {
                            reloader.reload();
                        }
                    }
                    Err(err) => error!("Route rebuild failed, keeping previous routes: {:#}", err),
                }
            }
        });

        Ok(Self { _watcher: watcher })
    }
}

fn affects_routes(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Editor swap files and dot-directories
fn is_hidden(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}
