//! Output file naming.
//!
//! Fingerprints are BLAKE3 over an asset's own bytes, so an asset's name only
//! changes when its content does.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Default fingerprint length in file names
pub const HASH_LENGTH: usize = 8;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(name|ext|hash|contenthash|chunkhash)(?::(\d+))?\]")
        .expect("placeholder pattern is valid")
});

static HASH_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.\-_]?\[(?:hash|contenthash|chunkhash)(?::\d+)?\]")
        .expect("hash segment pattern is valid")
});

/// Full hex BLAKE3 digest of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingMode {
    /// Hash placeholders are honored
    ContentHash,
    /// Hash placeholders are stripped; names never change
    Stable,
}

/// Values substituted into a filename template.
#[derive(Debug, Clone, Copy)]
pub struct NameParts<'a> {
    pub name: &'a str,
    pub ext: &'a str,
    pub hash: &'a str,
}

/// Expand `template`. In [`NamingMode::Stable`] hash placeholders are removed
/// together with one leading `.`, `-` or `_`.
pub fn render_template(template: &str, parts: NameParts<'_>, mode: NamingMode) -> String {
    let template = match mode {
        NamingMode::Stable => strip_hashes(template),
        NamingMode::ContentHash => template.to_string(),
    };

    PLACEHOLDER
        .replace_all(&template, |caps: &Captures<'_>| {
            let length = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok());
            match &caps[1] {
                "name" => parts.name.to_string(),
                "ext" => parts.ext.to_string(),
                _ => truncate(parts.hash, length.unwrap_or(parts.hash.len())).to_string(),
            }
        })
        .into_owned()
}

/// Template with every hash placeholder removed.
pub fn strip_hashes(template: &str) -> String {
    HASH_SEGMENT.replace_all(template, "").into_owned()
}

pub fn has_hash(template: &str) -> bool {
    HASH_SEGMENT.is_match(template)
}

fn truncate(hash: &str, length: usize) -> &str {
    &hash[..length.min(hash.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts<'a>(name: &'a str, ext: &'a str, hash: &'a str) -> NameParts<'a> {
        NameParts { name, ext, hash }
    }

    #[test]
    fn content_hash_mode_truncates() {
        let hash = fingerprint(b"console.log(1)");
        let name = render_template(
            "[name].[contenthash:8].js",
            parts("app", "js", &hash),
            NamingMode::ContentHash,
        );
        assert_eq!(name, format!("app.{}.js", &hash[..8]));
    }

    #[test]
    fn stable_mode_strips_hashes() {
        let name = render_template(
            "js/[name]-[chunkhash:10].js",
            parts("app", "js", "abcdef0123456789"),
            NamingMode::Stable,
        );
        assert_eq!(name, "js/app.js");
        assert!(!has_hash(&strip_hashes("[name].[hash].[ext]")));
    }

    #[test]
    fn media_template_uses_ext() {
        let name = render_template(
            "assets/media/[name].[hash:8].[ext]",
            parts("logo", "png", "0123456789abcdef"),
            NamingMode::ContentHash,
        );
        assert_eq!(name, "assets/media/logo.01234567.png");
    }

    #[test]
    fn fingerprint_depends_only_on_bytes() {
        assert_eq!(fingerprint(b"a"), fingerprint(b"a"));
        assert_ne!(fingerprint(b"a"), fingerprint(b"b"));
        assert_eq!(fingerprint(b"a").len(), 64);
    }
}
