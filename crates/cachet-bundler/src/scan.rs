//! Dependency discovery and specifier rewriting.
//!
//! This is a lexical scan, not a parser: scripts are searched for
//! `import ... from`, `export ... from`, bare `import '...'`, `import(...)` and
//! `require(...)` with a string literal; stylesheets for `@import` and
//! `url(...)`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static SCRIPT_SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:\b(?:import|export)\s[^;'"]*?\bfrom\s*|\bimport\s*|\b(?:import|require)\s*\(\s*)(['"])([^'"\n]+)['"]"#,
    )
    .expect("script specifier pattern is valid")
});

static STYLE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s*(?:url\(\s*)?(['"]?)([^'"()\s;]+)['"]?\s*\)?[^;]*;"#)
        .expect("style import pattern is valid")
});

static STYLE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(['"]?)([^'"()]+?)['"]?\s*\)"#).expect("style url pattern is valid")
});

/// Specifiers a script depends on, first occurrence order, without duplicates.
pub fn script_specifiers(code: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in SCRIPT_SPECIFIER.captures_iter(code) {
        let spec = caps[2].trim();
        if !spec.is_empty() && !out.iter().any(|seen| seen == spec) {
            out.push(spec.to_string());
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleReferenceKind {
    Import,
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleReference {
    pub kind: StyleReferenceKind,
    /// Normalized to a resolvable specifier
    pub specifier: String,
}

/// Local references of a stylesheet. Remote URLs, data URIs and fragment
/// references are skipped.
pub fn style_references(css: &str) -> Vec<StyleReference> {
    let mut out: Vec<StyleReference> = Vec::new();
    let mut import_spans = Vec::new();

    for caps in STYLE_IMPORT.captures_iter(css) {
        if let Some(whole) = caps.get(0) {
            import_spans.push(whole.range());
        }
        if let Some(specifier) = normalize_style_specifier(&caps[2]) {
            push_unique(&mut out, StyleReferenceKind::Import, specifier);
        }
    }

    for caps in STYLE_URL.captures_iter(css) {
        let start = caps.get(0).map(|m| m.start()).unwrap_or_default();
        if import_spans.iter().any(|span| span.contains(&start)) {
            continue;
        }
        if let Some(specifier) = normalize_style_specifier(&caps[2]) {
            push_unique(&mut out, StyleReferenceKind::Url, specifier);
        }
    }
    out
}

fn push_unique(out: &mut Vec<StyleReference>, kind: StyleReferenceKind, specifier: String) {
    if !out.iter().any(|r| r.specifier == specifier) {
        out.push(StyleReference { kind, specifier });
    }
}

/// CSS references are relative unless prefixed with `~` (module lookup).
pub fn normalize_style_specifier(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();
    if raw.is_empty()
        || raw.starts_with('#')
        || raw.starts_with("//")
        || lower.starts_with("data:")
        || lower.starts_with("http:")
        || lower.starts_with("https:")
    {
        return None;
    }

    // drop query strings and fragments (`font.woff?v=1`, `icons.svg#home`)
    let raw = raw.split(['?', '#']).next().unwrap_or(raw);
    if let Some(module) = raw.strip_prefix('~') {
        return Some(module.to_string());
    }
    if raw.starts_with('.') || raw.starts_with('/') {
        Some(raw.to_string())
    } else {
        Some(format!("./{raw}"))
    }
}

/// Replace script specifier literals for which `map` returns a value.
pub fn rewrite_script_specifiers(code: &str, map: impl Fn(&str) -> Option<String>) -> String {
    SCRIPT_SPECIFIER
        .replace_all(code, |caps: &Captures<'_>| {
            let whole = caps.get(0);
            let spec = caps.get(2);
            match (whole, spec) {
                (Some(whole), Some(spec)) => match map(spec.as_str().trim()) {
                    Some(replacement) => format!(
                        "{}{}{}",
                        &code[whole.start()..spec.start()],
                        replacement,
                        &code[spec.end()..whole.end()]
                    ),
                    None => whole.as_str().to_string(),
                },
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Replace `url(...)` targets for which `map` returns a value.
pub fn rewrite_style_urls(css: &str, map: impl Fn(&str) -> Option<String>) -> String {
    STYLE_URL
        .replace_all(css, |caps: &Captures<'_>| {
            let quote = &caps[1];
            match normalize_style_specifier(&caps[2]).and_then(|spec| map(&spec)) {
                Some(url) => format!("url({quote}{url}{quote})"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Drop `@import` statements for which `bundled` returns true.
pub fn strip_style_imports(css: &str, mut bundled: impl FnMut(&str) -> bool) -> String {
    STYLE_IMPORT
        .replace_all(css, |caps: &Captures<'_>| {
            match normalize_style_specifier(&caps[2]) {
                Some(spec) if bundled(&spec) => String::new(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Split a stylesheet into literal text and local `url(...)` specifiers, in order.
pub fn split_style_urls(css: &str) -> Vec<StyleSegment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in STYLE_URL.captures_iter(css) {
        let (Some(whole), Some(target)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let Some(specifier) = normalize_style_specifier(target.as_str()) else {
            continue;
        };
        segments.push(StyleSegment::Text(css[last..whole.start()].to_string()));
        segments.push(StyleSegment::Url(specifier));
        last = whole.end();
    }
    segments.push(StyleSegment::Text(css[last..].to_string()));
    segments
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleSegment {
    Text(String),
    Url(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_script_specifiers() {
        let code = r#"
import React from 'react';
import { a,
  b } from "./util";
import './style.css';
export * from "./reexport";
const lazy = import('./lazy');
const cjs = require("lodash/fp");
const again = require('./util');
"#;
        assert_eq!(
            script_specifiers(code),
            vec!["react", "./util", "./style.css", "./reexport", "./lazy", "lodash/fp"]
        );
    }

    #[test]
    fn ignores_non_literal_requires() {
        assert!(script_specifiers("require(name); importer('x');").is_empty());
    }

    #[test]
    fn style_references_skip_remote_and_data() {
        let css = r#"
@import "./reset.css";
@import url(theme.css) screen;
.a { background: url(logo.png); }
.b { background: url("data:image/png;base64,AAAA"); }
.c { background: url('https://cdn/x.png'); }
.d { src: url(~pkg/font.woff2?v=3); }
"#;
        let refs = style_references(css);
        let specs: Vec<_> = refs.iter().map(|r| r.specifier.as_str()).collect();
        assert_eq!(specs, vec!["./reset.css", "./theme.css", "./logo.png", "pkg/font.woff2"]);
        assert_eq!(refs[1].kind, StyleReferenceKind::Import);
        assert_eq!(refs[2].kind, StyleReferenceKind::Url);
    }

    #[test]
    fn rewrites_only_mapped_specifiers() {
        let code = "import a from './a';\nimport b from 'b';\nrequire('./a');";
        let out = rewrite_script_specifiers(code, |spec| {
            (spec == "./a").then(|| "1f2e3d4c".to_string())
        });
        assert_eq!(out, "import a from '1f2e3d4c';\nimport b from 'b';\nrequire('1f2e3d4c');");
    }

    #[test]
    fn rewrites_style_urls_and_strips_imports() {
        let css = "@import './base.css';\n.a{background:url(\"./logo.png\")}";
        let css = strip_style_imports(css, |spec| spec == "./base.css");
        let css = rewrite_style_urls(&css, |spec| {
            (spec == "./logo.png").then(|| "/assets/media/logo.1234.png".to_string())
        });
        assert_eq!(css, "\n.a{background:url(\"/assets/media/logo.1234.png\")}");
    }

    #[test]
    fn splits_style_urls() {
        let segments = split_style_urls("a{b:url(x.png)}");
        assert_eq!(
            segments,
            vec![
                StyleSegment::Text("a{b:".into()),
                StyleSegment::Url("./x.png".into()),
                StyleSegment::Text("}".into()),
            ]
        );
    }
}
