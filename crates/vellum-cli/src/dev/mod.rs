pub mod server;
pub mod watcher;
