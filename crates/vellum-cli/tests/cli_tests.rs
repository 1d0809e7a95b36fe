use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use vellum::{ModuleRegistry, RouteManifest, TemplateAdapter};
use vellum_build::{BuildMetadata, BundleRequest, Bundler, OutputMeta};
use vellum_cli::{run_from, App};

/// Emits one empty output per entry, named after its path below the entry base
struct StubBundler;

#[async_trait]
impl Bundler for StubBundler {
    async fn bundle(&self, request: &BundleRequest) -> Result<BuildMetadata> {
        let mut meta = BuildMetadata::default();
        for entry in &request.entry_points {
            let key = entry
                .strip_prefix(&request.entry_base)?
                .with_extension("js")
                .to_string_lossy()
                .replace('\\', "/");
            let out = request.out_dir.join(&key);
            fs::create_dir_all(out.parent().unwrap())?;
            fs::write(&out, "")?;
            meta.outputs.insert(
                key,
                OutputMeta {
                    entry_point: Some(entry.clone()),
                    exports: vec!["default".to_string()],
                    ..OutputMeta::default()
                },
            );
        }
        Ok(meta)
    }
}

fn project(files: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for file in files {
        let path = dir.path().join("src/routes").join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }
    dir
}

fn root_arg(dir: &Path) -> String {
    dir.to_string_lossy().into_owned()
}

#[test]
fn test_routes_works_without_adapter() {
    let dir = project(&["page.tsx", "blog/[slug]/page.tsx"]);
    run_from(App::new(), ["vellum", "routes", "--root", &root_arg(dir.path())]).unwrap();
}

#[test]
fn test_routes_reports_collisions() {
    let dir = project(&["blog/[slug]/page.tsx", "blog/[id]/page.tsx"]);
    let err = run_from(App::new(), ["vellum", "routes", "--root", &root_arg(dir.path())]).unwrap_err();
    assert!(err.to_string().contains("collision"));
}

#[test]
fn test_build_requires_adapter() {
    let dir = project(&["page.tsx"]);
    let err = run_from(App::new(), ["vellum", "build", "--root", &root_arg(dir.path())]).unwrap_err();
    assert!(err.to_string().contains("`vellum build` needs a UI adapter"));
}

#[test]
fn test_start_without_build_fails() {
    let dir = project(&["page.html"]);
    let app = App::new()
        .with_adapter(Arc::new(TemplateAdapter::default()))
        .with_runtime(Arc::new(ModuleRegistry::new()));

    let err = run_from(app, ["vellum", "start", "--root", &root_arg(dir.path())]).unwrap_err();
    assert!(format!("{:#}", err).contains("manifest"));
}

#[test]
fn test_build_honours_out_dir_flag() {
    let dir = project(&["page.html", "about/page.html"]);
    fs::write(dir.path().join("vellum.toml"), "[build]\nout_dir = \"ignored\"\n").unwrap();

    let app = App::new()
        .with_adapter(Arc::new(TemplateAdapter::default()))
        .with_runtime(Arc::new(ModuleRegistry::new()))
        .with_bundler(Arc::new(StubBundler));

    run_from(
        app,
        [
            "vellum",
            "build",
            "--silent",
            "--out-dir",
            "public",
            "--root",
            &root_arg(dir.path()),
        ],
    )
    .unwrap();

    assert!(!dir.path().join("ignored").exists());
    let manifest = RouteManifest::load(&dir.path().join("public")).unwrap();
    assert_eq!(manifest.adapter, "template");
    assert_eq!(manifest.routes.len(), 2);
    assert!(manifest.route("/about").unwrap().server_entry.is_some());
}
