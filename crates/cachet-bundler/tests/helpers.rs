//! Shared helpers for cachet-bundler integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use cachet_bundler::{BuildPipeline, MemoryRuntime, OutputAsset};
use cachet_config::{BuildConfig, BuildMode};

pub const ROOT: &str = "/p";

/// Config with TypeScript resolution first and a single `app` entry.
pub fn config(mode: BuildMode) -> BuildConfig {
    BuildConfig {
        mode,
        extension_priority: vec!["ts".into(), "js".into()],
        ..Default::default()
    }
    .with_entry("app", "src/index")
}

/// Small app: a script entry importing a stylesheet, a tiny image and a
/// package from `node_modules`.
pub fn app_project() -> MemoryRuntime {
    MemoryRuntime::new()
        .with_file(
            "/p/src/index.ts",
            "import './style.css';\nimport logo from './logo.png';\nimport { render } from 'lib';\nrender(logo, process.env.NODE_ENV);\n",
        )
        .with_file("/p/src/style.css", "body { margin: 0; }\n")
        .with_file("/p/src/logo.png", [0x89u8, b'P', b'N', b'G'])
        .with_file("/p/node_modules/lib/package.json", r#"{ "main": "main.js" }"#)
        .with_file("/p/node_modules/lib/main.js", "export function render() {}\n")
}

pub fn pipeline(config: BuildConfig, runtime: &MemoryRuntime) -> BuildPipeline {
    BuildPipeline::new(ROOT, config)
        .unwrap()
        .with_runtime(Arc::new(runtime.clone()))
}

pub fn text(asset: &OutputAsset) -> String {
    String::from_utf8(asset.bytes.to_vec()).unwrap()
}

/// `[name].[contenthash:8].[ext]` with the hash taken from the bytes.
pub fn assert_hashed(asset: &OutputAsset, name: &str, ext: &str) {
    let expected = format!("{name}.{}.{ext}", &asset.fingerprint[..8]);
    assert_eq!(asset.path, expected, "asset {}", asset.logical_name);
}

pub fn exists(dir: &Path, relative: &str) -> bool {
    dir.join(relative).is_file()
}
