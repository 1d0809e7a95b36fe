//! Client asset table and per-route client artifacts

use crate::bundler::BuildMetadata;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use vellum::manifest::AssetInfo;

/// Client files produced for one entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientArtifacts {
    /// Entry output, relative to `<out>/client`
    pub entry: String,
    /// Shared chunks the entry imports
    pub chunks: Vec<String>,
    pub css: Vec<String>,
}

/// Client artifacts for the entry built from `source`
pub fn client_artifacts(meta: &BuildMetadata, source: &Path) -> Option<ClientArtifacts> {
    let (entry, output) = meta.output_for(source)?;
    Some(ClientArtifacts {
        entry: entry.to_string(),
        chunks: output.imports.clone(),
        css: output.css_bundle.iter().cloned().collect(),
    })
}

/// First 16 hex characters of the blake3 digest
///
/// # Examples
///
/// ```
/// use vellum_build::assets::content_hash;
///
/// let hash = content_hash(b"console.log(1)");
/// assert_eq!(hash.len(), 16);
/// assert_eq!(hash, content_hash(b"console.log(1)"));
/// ```
pub fn content_hash(content: &[u8]) -> String {
    let hash = blake3::hash(content);
    hex::encode(&hash.as_bytes()[..8])
}

/// MIME type recorded in the manifest, the same guess `ServeDir` makes
///
/// # Examples
///
/// ```
/// use vellum_build::assets::mime_type;
///
/// assert_eq!(mime_type("chunks/app-1.css"), "text/css");
/// assert_eq!(mime_type("wasm/app.wasm"), "application/wasm");
/// assert_eq!(mime_type("data.unknownext"), "application/octet-stream");
/// ```
pub fn mime_type(path: &str) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Hash, size and MIME type of every client output
pub fn collect_assets(client_dir: &Path, meta: &BuildMetadata) -> Result<BTreeMap<String, AssetInfo>> {
    let mut assets = BTreeMap::new();

    for path in meta.outputs.keys() {
        let file = client_dir.join(path);
        let content =
            std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;

        assets.insert(
            path.clone(),
            AssetInfo {
                hash: content_hash(&content),
                size: content.len() as u64,
                mime_type: mime_type(path),
            },
        );
    }

    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::OutputMeta;
    use std::path::PathBuf;

    #[test]
    fn test_collect_assets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("chunks")).unwrap();
        std::fs::write(dir.path().join("about-1.js"), "export {}").unwrap();
        std::fs::write(dir.path().join("chunks/a.css"), "body{}").unwrap();

        let mut meta = BuildMetadata::default();
        meta.outputs.insert("about-1.js".into(), OutputMeta::default());
        meta.outputs.insert("chunks/a.css".into(), OutputMeta::default());

        let assets = collect_assets(dir.path(), &meta).unwrap();
        assert_eq!(assets["about-1.js"].size, 9);
        assert_eq!(assets["about-1.js"].mime_type, mime_type("about-1.js"));
        assert_eq!(assets["chunks/a.css"].mime_type, "text/css");
        assert_eq!(assets["chunks/a.css"].hash, content_hash(b"body{}"));
    }

    #[test]
    fn test_mime_type_matches_served_content_type() {
        for path in ["app.wasm", "favicon.ico", "robots.txt", "entry.js", "font.woff2"] {
            let guessed = mime_guess::from_path(path).first_or_octet_stream();
            assert_eq!(mime_type(path), guessed.essence_str(), "{}", path);
            assert_ne!(mime_type(path), "application/octet-stream", "{}", path);
        }
    }

    #[test]
    fn test_client_artifacts() {
        let mut meta = BuildMetadata::default();
        meta.outputs.insert(
            "about-1.js".into(),
            OutputMeta {
                entry_point: Some(PathBuf::from("/out/.vellum-entries/about.js")),
                imports: vec!["chunks/shared.js".into()],
                css_bundle: Some("about-1.css".into()),
                ..OutputMeta::default()
            },
        );

        let artifacts = client_artifacts(&meta, Path::new("/out/.vellum-entries/about.js")).unwrap();
        assert_eq!(artifacts.entry, "about-1.js");
        assert_eq!(artifacts.chunks, vec!["chunks/shared.js"]);
        assert_eq!(artifacts.css, vec!["about-1.css"]);
        assert!(client_artifacts(&meta, Path::new("/elsewhere.js")).is_none());
    }
}
