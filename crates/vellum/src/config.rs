// File: src/config.rs
// Purpose: Configuration parsing from vellum.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name, resolved against the project root
pub const CONFIG_FILE: &str = "vellum.toml";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub dev: DevConfig,
}

/// Project metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_name")]
    pub name: String,
}

/// Production server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Directory scanned for routes (default: "src/routes")
    #[serde(default = "default_routes_dir")]
    pub routes_dir: String,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Public path the client assets are served under
    #[serde(default = "default_base")]
    pub base: String,

    #[serde(default = "default_true")]
    pub minify: bool,

    /// Suppress the build report
    #[serde(default = "default_false")]
    pub silent: bool,
}

/// Development configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub live_reload: bool,
}

// Default values
fn default_name() -> String {
    "vellum-app".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_routes_dir() -> String {
    "src/routes".to_string()
}

fn default_out_dir() -> String {
    "dist".to_string()
}

fn default_base() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            routes_dir: default_routes_dir(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            base: default_base(),
            minify: true,
            silent: false,
        }
    }
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            live_reload: true,
        }
    }
}

impl Config {
    /// Load configuration from vellum.toml
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Missing or empty file means defaults
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from `<root>/vellum.toml`
    pub fn load_from_root(root: impl AsRef<Path>) -> Result<Self> {
        Self::load(root.as_ref().join(CONFIG_FILE))
    }

    /// Routes directory resolved against `root`
    pub fn routes_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.routing.routes_dir)
    }

    /// Output directory resolved against `root`
    pub fn out_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.build.out_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.routing.routes_dir, "src/routes");
        assert_eq!(config.build.out_dir, "dist");
        assert_eq!(config.build.base, "/");
        assert!(config.build.minify);
        assert!(!config.build.silent);
    }

    #[test]
    fn test_empty_config() {
        let config = toml::from_str::<Config>("").unwrap_or_default();
        assert_eq!(config.server.port, 3000);
        assert!(config.dev.live_reload);
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
            [routing]
            routes_dir = "app/routes"

            [build]
            base = "/static/"
            silent = true
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.routing.routes_dir, "app/routes");
        assert_eq!(config.build.base, "/static/");
        assert!(config.build.silent);
        assert_eq!(config.build.out_dir, "dist");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_root(dir.path()).unwrap();
        assert_eq!(config.project.name, "vellum-app");
        assert_eq!(config.routes_dir(dir.path()), dir.path().join("src/routes"));
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[server]\nport = \"nope\"").unwrap();
        assert!(Config::load_from_root(dir.path()).is_err());
    }
}
