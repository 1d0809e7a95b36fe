//! # Vellum Build
//!
//! Turns a routes directory into a deployable output tree:
//!
//! ```text
//! <out>/
//! ├── manifest.json   route table + build artifacts (read by `vellum start`)
//! ├── client/         hashed browser bundles, shared chunks, CSS
//! ├── server/         unminified server bundles with inline source maps
//! └── static/         prerendered HTML (`index.html`, `<url>/index.html`)
//! ```
//!
//! [`build`] runs the phases in order: scan, client wrappers, client pass,
//! server pass, export inference, artifact correlation, manifest assembly,
//! prerendering, then persistence and the report. Each later phase consumes
//! what the earlier ones produced.
//!
//! The orchestrator holds no rendering logic. Markup and bootstrap code come
//! from the [`vellum::Adapter`]; compiled modules are executed through the
//! [`vellum::ModuleRuntime`]; compilation goes through a [`Bundler`].

pub mod assets;
mod build;
pub mod bundler;
pub mod exports;
pub mod prerender;
pub mod report;

pub use build::{build, BuildOptions, BuildResult, ENTRIES_DIR};
pub use bundler::{BuildMetadata, BundleRequest, BundleTarget, Bundler, EsbuildBundler, OutputMeta};
