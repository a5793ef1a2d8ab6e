//! Full builds against a real project directory.

mod helpers;

use std::fs;
use std::path::Path;

use cachet_bundler::{BuildPipeline, Manifest};
use cachet_config::BuildMode;
use helpers::*;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/index.ts", "import './style.css';\nconsole.log('v1');\n");
    write(dir.path(), "src/style.css", "body { color: red; }\n");
    dir
}

fn read_manifest(dir: &Path) -> Manifest {
    Manifest::read(&dir.join("dist/asset-manifest.json")).unwrap()
}

#[tokio::test]
async fn release_build_writes_manifest_and_files() {
    let dir = project();
    let mut pipeline = BuildPipeline::new(dir.path(), config(BuildMode::Release)).unwrap();
    let report = pipeline.run().await.unwrap();

    let manifest = read_manifest(dir.path());
    assert_eq!(manifest, report.manifest);
    for (_, url) in manifest.iter() {
        assert!(exists(&dir.path().join("dist"), url.trim_start_matches('/')), "{url}");
    }
    let leftovers: Vec<_> = fs::read_dir(dir.path().join("dist"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn rebuild_replaces_manifest_and_prunes_stale_files() {
    let dir = project();
    let mut pipeline = BuildPipeline::new(dir.path(), config(BuildMode::Release)).unwrap();
    let first = pipeline.run().await.unwrap();
    let old_app = first.manifest.get("app.js").unwrap().trim_start_matches('/').to_string();
    let old_css = first.manifest.get("app.css").unwrap().to_string();

    write(dir.path(), "src/index.ts", "import './style.css';\nconsole.log('v2');\n");
    pipeline.invalidate(&[dir.path().join("src/index.ts")]);
    let second = pipeline.run().await.unwrap();

    let new_app = second.manifest.get("app.js").unwrap().trim_start_matches('/');
    assert_ne!(old_app, new_app);
    assert_eq!(second.manifest.get("app.css").unwrap(), old_css);
    assert!(!exists(&dir.path().join("dist"), &old_app));
    assert!(exists(&dir.path().join("dist"), new_app));
    assert_eq!(second.pruned.len(), 1);
    assert!(second.pruned[0].ends_with(&old_app));
    assert_eq!(read_manifest(dir.path()), second.manifest);
}

#[tokio::test]
async fn keep_stale_leaves_old_files() {
    let dir = project();
    let mut config = config(BuildMode::Release);
    config.clean_stale = false;
    let mut pipeline = BuildPipeline::new(dir.path(), config).unwrap();
    let first = pipeline.run().await.unwrap();
    let old_app = first.manifest.get("app.js").unwrap().trim_start_matches('/').to_string();

    write(dir.path(), "src/index.ts", "import './style.css';\nconsole.log('v2');\n");
    pipeline.invalidate(&[dir.path().join("src/index.ts")]);
    let second = pipeline.run().await.unwrap();

    assert!(second.pruned.is_empty());
    assert!(exists(&dir.path().join("dist"), &old_app));
}

#[tokio::test]
async fn failed_pass_leaves_previous_output() {
    let dir = project();
    let mut pipeline = BuildPipeline::new(dir.path(), config(BuildMode::Release)).unwrap();
    pipeline.run().await.unwrap();
    let before = fs::read_to_string(dir.path().join("dist/asset-manifest.json")).unwrap();

    write(dir.path(), "src/index.ts", "import './gone';\n");
    pipeline.invalidate(&[dir.path().join("src/index.ts")]);
    assert!(pipeline.run().await.is_err());

    let after = fs::read_to_string(dir.path().join("dist/asset-manifest.json")).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn media_above_the_threshold_is_written_with_a_hash() {
    let dir = project();
    write(dir.path(), "src/index.ts", "import logo from './logo.svg';\nconsole.log(logo);\n");
    write(dir.path(), "src/logo.svg", &"<svg/>".repeat(64));
    let mut config = config(BuildMode::Development);
    config.inline_threshold_bytes = 16;
    let mut pipeline = BuildPipeline::new(dir.path(), config).unwrap();
    let report = pipeline.run().await.unwrap();

    let url = report.manifest.get("assets/media/logo.svg").unwrap();
    assert!(url.starts_with("/assets/media/logo.") && url.ends_with(".svg"), "{url}");
    assert!(exists(&dir.path().join("dist"), url.trim_start_matches('/')));

    let script = fs::read_to_string(dir.path().join("dist/app.js")).unwrap();
    assert!(script.contains(url));
}
