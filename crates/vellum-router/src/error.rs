use std::path::PathBuf;
use thiserror::Error;

/// Structural routing failures
///
/// Every collision variant renders with the word "collision" so callers can
/// branch on the category from the message alone.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A directory holds both a page file and an API route file
    #[error("route collision in {}: a directory cannot contain both a page and a route handler", dir.display())]
    PageApiConflict { dir: PathBuf },

    /// Two routes resolve to the same pattern
    #[error(
        "route collision: {} and {} both resolve to {pattern}",
        first.display(),
        second.display()
    )]
    Collision {
        pattern: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Two layouts share an id
    #[error(
        "layout collision: {} and {} both resolve to layout {id}",
        first.display(),
        second.display()
    )]
    LayoutCollision {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A pattern the trie cannot hold (e.g. a catch-all before the last segment)
    #[error("invalid route pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("failed to read routes directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RouteError {
    /// True for every collision-type error
    pub fn is_collision(&self) -> bool {
        matches!(
            self,
            RouteError::PageApiConflict { .. }
                | RouteError::Collision { .. }
                | RouteError::LayoutCollision { .. }
        )
    }
}
