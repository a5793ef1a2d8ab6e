//! Built-in transform stages.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cachet_config::{BuildMode, StageConfig};
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use regex::Regex;

use super::{Payload, Transform, TransformContext, Transpiler, file_asset};
use crate::module::{SourceModule, mime_for_extension};
use crate::scan::{self, StyleSegment};
use crate::{Error, Result};

/// Build the stage described by `config`.
pub fn from_config(
    config: &StageConfig,
    transpiler: &Arc<dyn Transpiler>,
) -> Result<Arc<dyn Transform>> {
    Ok(match config {
        StageConfig::Transpile => Arc::new(Transpile {
            transpiler: Arc::clone(transpiler),
        }),
        StageConfig::Define => Arc::new(Define),
        StageConfig::Minify => Arc::new(Minify {
            transpiler: Arc::clone(transpiler),
        }),
        StageConfig::Replace {
            pattern,
            replacement,
        } => Arc::new(Replace {
            pattern: Regex::new(pattern).map_err(|e| {
                Error::InvalidConfig(format!("invalid replace pattern '{pattern}': {e}"))
            })?,
            replacement: replacement.clone(),
        }),
        StageConfig::Css => Arc::new(Css),
        StageConfig::MinifyCss => Arc::new(MinifyCss),
        StageConfig::ExtractCss => Arc::new(ExtractCss),
        StageConfig::InjectCss => Arc::new(InjectCss),
        StageConfig::Url { limit } => Arc::new(Url { limit: *limit }),
        StageConfig::File => Arc::new(File),
    })
}

#[derive(Debug)]
pub struct Transpile {
    transpiler: Arc<dyn Transpiler>,
}

impl Transform for Transpile {
    fn id(&self) -> &str {
        "transpile"
    }

    fn apply(
        &self,
        module: &SourceModule,
        input: Payload,
        ctx: &TransformContext,
    ) -> std::result::Result<Payload, String> {
        let source = input.into_text()?;
        self.transpiler
            .transpile(&module.path, &source, ctx.mode)
            .map(Payload::Script)
    }
}

/// Delegates to [`Transpiler::minify`].
#[derive(Debug)]
pub struct Minify {
    transpiler: Arc<dyn Transpiler>,
}

impl Transform for Minify {
    fn id(&self) -> &str {
        "minify"
    }

    fn apply(
        &self,
        module: &SourceModule,
        input: Payload,
        _ctx: &TransformContext,
    ) -> std::result::Result<Payload, String> {
        let code = input.into_text()?;
        self.transpiler
            .minify(&module.path, &code)
            .map(Payload::Script)
    }
}

/// Replaces `process.env.NODE_ENV` with the mode string.
#[derive(Debug)]
pub struct Define;

impl Transform for Define {
    fn id(&self) -> &str {
        "define"
    }

    fn apply(
        &self,
        _module: &SourceModule,
        input: Payload,
        ctx: &TransformContext,
    ) -> std::result::Result<Payload, String> {
        let code = input.into_text()?;
        let value = format!("\"{}\"", ctx.mode.as_str());
        Ok(Payload::Script(code.replace("process.env.NODE_ENV", &value)))
    }
}

#[derive(Debug)]
pub struct Replace {
    pattern: Regex,
    replacement: String,
}

impl Transform for Replace {
    fn id(&self) -> &str {
        "replace"
    }

    fn apply(
        &self,
        _module: &SourceModule,
        input: Payload,
        _ctx: &TransformContext,
    ) -> std::result::Result<Payload, String> {
        let rewrite = |text: String| {
            self.pattern
                .replace_all(&text, self.replacement.as_str())
                .into_owned()
        };
        Ok(match input {
            Payload::Style(css) => Payload::Style(rewrite(css)),
            Payload::Stylesheet(css) => Payload::Stylesheet(rewrite(css)),
            other => Payload::Script(rewrite(other.into_text()?)),
        })
    }
}

/// Stylesheet resolution: BOM stripped, line endings normalized.
#[derive(Debug)]
pub struct Css;

impl Transform for Css {
    fn id(&self) -> &str {
        "css"
    }

    fn apply(
        &self,
        _module: &SourceModule,
        input: Payload,
        _ctx: &TransformContext,
    ) -> std::result::Result<Payload, String> {
        let text = input.into_text()?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        Ok(Payload::Style(text.replace("\r\n", "\n")))
    }
}

/// Parses, minifies and reprints a stylesheet with lightningcss.
///
/// `@import` rules and `url(...)` references survive for linking.
#[derive(Debug)]
pub struct MinifyCss;

impl MinifyCss {
    fn minify(module: &SourceModule, css: &str) -> std::result::Result<String, String> {
        let mut stylesheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: module.path.to_string_lossy().to_string(),
                ..Default::default()
            },
        )
        .map_err(|e| format!("invalid stylesheet: {e}"))?;

        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| format!("failed to minify stylesheet: {e}"))?;

        let printed = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| format!("failed to print stylesheet: {e}"))?;
        Ok(printed.code)
    }
}

impl Transform for MinifyCss {
    fn id(&self) -> &str {
        "minify-css"
    }

    fn apply(
        &self,
        module: &SourceModule,
        input: Payload,
        _ctx: &TransformContext,
    ) -> std::result::Result<Payload, String> {
        match input {
            Payload::Style(css) => Self::minify(module, &css).map(Payload::Style),
            Payload::Stylesheet(css) => Self::minify(module, &css).map(Payload::Stylesheet),
            other => Err(format!("expected a stylesheet, got {}", other.kind())),
        }
    }
}

#[derive(Debug)]
pub struct ExtractCss;

impl Transform for ExtractCss {
    fn id(&self) -> &str {
        "extract-css"
    }

    fn apply(
        &self,
        _module: &SourceModule,
        input: Payload,
        _ctx: &TransformContext,
    ) -> std::result::Result<Payload, String> {
        match input {
            Payload::Style(css) | Payload::Stylesheet(css) => Ok(Payload::Stylesheet(css)),
            other => Err(format!("expected a stylesheet, got {}", other.kind())),
        }
    }
}

/// Turns a stylesheet into a script that appends a `<style>` element.
///
/// Local `url(...)` references become `require` calls so the linker can
/// point them at the referenced asset modules.
#[derive(Debug)]
pub struct InjectCss;

impl Transform for InjectCss {
    fn id(&self) -> &str {
        "inject-css"
    }

    fn apply(
        &self,
        _module: &SourceModule,
        input: Payload,
        _ctx: &TransformContext,
    ) -> std::result::Result<Payload, String> {
        let css = match input {
            Payload::Style(css) | Payload::Stylesheet(css) => css,
            other => return Err(format!("expected a stylesheet, got {}", other.kind())),
        };

        let mut code = String::new();
        let mut imports = Vec::new();
        let css = scan::strip_style_imports(&css, |spec| {
            imports.push(spec.to_string());
            true
        });
        for spec in &imports {
            code.push_str(&format!("require({});\n", json_string(spec)));
        }

        let parts: Vec<String> = scan::split_style_urls(&css)
            .into_iter()
            .filter_map(|segment| match segment {
                StyleSegment::Text(text) if text.is_empty() => None,
                StyleSegment::Text(text) => Some(json_string(&text)),
                StyleSegment::Url(spec) => {
                    Some(format!("\"url(\" + require({}) + \")\"", json_string(&spec)))
                }
            })
            .collect();
        let content = if parts.is_empty() {
            "\"\"".to_string()
        } else {
            parts.join(" + ")
        };

        code.push_str("var style = document.createElement(\"style\");\n");
        code.push_str(&format!("style.textContent = {content};\n"));
        code.push_str("document.head.appendChild(style);\n");
        Ok(Payload::Script(code))
    }
}

/// Inlines assets smaller than the threshold as data URIs.
#[derive(Debug)]
pub struct Url {
    limit: Option<u64>,
}

impl Transform for Url {
    fn id(&self) -> &str {
        "url"
    }

    fn apply(
        &self,
        module: &SourceModule,
        input: Payload,
        ctx: &TransformContext,
    ) -> std::result::Result<Payload, String> {
        let bytes = input.into_bytes()?;
        let limit = self.limit.unwrap_or(ctx.inline_threshold);
        if (bytes.len() as u64) < limit {
            let mime = mime_for_extension(module.extension());
            let data_uri = format!("data:{mime};base64,{}", STANDARD.encode(&bytes));
            Ok(Payload::InlineAsset(data_uri))
        } else {
            Ok(file_asset(module, bytes, ctx))
        }
    }
}

#[derive(Debug)]
pub struct File;

impl Transform for File {
    fn id(&self) -> &str {
        "file"
    }

    fn apply(
        &self,
        module: &SourceModule,
        input: Payload,
        ctx: &TransformContext,
    ) -> std::result::Result<Payload, String> {
        Ok(file_asset(module, input.into_bytes()?, ctx))
    }
}

pub(crate) fn json_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

/// Stages of the built-in chains for `mode`.
pub fn builtin_chain(id: &str, mode: BuildMode) -> Option<Vec<StageConfig>> {
    Some(match id {
        "script" => match mode {
            BuildMode::Release => vec![
                StageConfig::Transpile,
                StageConfig::Define,
                StageConfig::Minify,
            ],
            BuildMode::Development => vec![StageConfig::Transpile, StageConfig::Define],
        },
        "style" => match mode {
            BuildMode::Release => vec![
                StageConfig::Css,
                StageConfig::MinifyCss,
                StageConfig::ExtractCss,
            ],
            BuildMode::Development => vec![StageConfig::Css, StageConfig::InjectCss],
        },
        "media" => vec![StageConfig::Url { limit: None }],
        "file" => vec![StageConfig::File],
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::fingerprint;

    fn ctx() -> TransformContext {
        TransformContext {
            mode: BuildMode::Release,
            inline_threshold: 10,
            media_template: "assets/media/[name].[hash:8].[ext]".to_string(),
        }
    }

    fn image(size: usize) -> SourceModule {
        SourceModule::new("/p/src/logo.png", vec![7u8; size])
    }

    fn run(stage: &dyn Transform, module: &SourceModule) -> Payload {
        stage
            .apply(module, Payload::Binary(module.content.clone()), &ctx())
            .unwrap()
    }

    #[test]
    fn url_inlines_below_threshold() {
        let payload = run(&Url { limit: None }, &image(9));
        match payload {
            Payload::InlineAsset(uri) => assert!(uri.starts_with("data:image/png;base64,")),
            other => panic!("expected inline asset, got {}", other.kind()),
        }
    }

    #[test]
    fn url_externalizes_at_threshold() {
        let module = image(10);
        match run(&Url { limit: None }, &module) {
            Payload::FileAsset { path, bytes } => {
                let hash = fingerprint(&module.content);
                assert_eq!(path, format!("assets/media/logo.{}.png", &hash[..8]));
                assert_eq!(bytes.len(), 10);
            }
            other => panic!("expected file asset, got {}", other.kind()),
        }
    }

    #[test]
    fn url_stage_limit_overrides_global_threshold() {
        let payload = run(&Url { limit: Some(100) }, &image(50));
        assert!(matches!(payload, Payload::InlineAsset(_)));
    }

    #[test]
    fn define_substitutes_mode() {
        let module = SourceModule::new("/p/a.js", b"if (process.env.NODE_ENV !== 'x') {}".to_vec());
        let payload = run(&Define, &module);
        assert_eq!(
            payload,
            Payload::Script("if (\"production\" !== 'x') {}".to_string())
        );
    }

    #[test]
    fn css_strips_bom_and_crlf() {
        let module = SourceModule::new("/p/a.css", "\u{feff}a{}\r\nb{}".as_bytes().to_vec());
        assert_eq!(run(&Css, &module), Payload::Style("a{}\nb{}".to_string()));
    }

    #[test]
    fn inject_css_requires_urls() {
        let module = SourceModule::new("/p/a.css", Vec::new());
        let payload = InjectCss
            .apply(
                &module,
                Payload::Style("a{background:url(logo.png)}".to_string()),
                &ctx(),
            )
            .unwrap();
        let Payload::Script(code) = payload else {
            panic!("expected script");
        };
        assert!(code.contains(r#""a{background:" + "url(" + require("./logo.png") + ")" + "}""#));
        assert!(code.contains("document.head.appendChild(style)"));
    }

    #[test]
    fn extract_rejects_binary() {
        let module = image(3);
        let err = ExtractCss
            .apply(&module, Payload::Binary(module.content.clone()), &ctx())
            .unwrap_err();
        assert!(err.contains("expected a stylesheet"));
    }

    #[test]
    fn builtin_style_chain_depends_on_mode() {
        assert_eq!(
            builtin_chain("style", BuildMode::Release).unwrap()[1..],
            [StageConfig::MinifyCss, StageConfig::ExtractCss]
        );
        assert_eq!(
            builtin_chain("style", BuildMode::Development).unwrap()[1],
            StageConfig::InjectCss
        );
        assert!(builtin_chain("other", BuildMode::Release).is_none());
    }

    #[test]
    fn minify_css_keeps_imports_and_urls_for_linking() {
        let module = SourceModule::new("/p/src/a.css", Vec::new());
        let css = "@import \"./base.css\";\n\n.a {\n  color: #ff0000;\n  background: url(logo.png);\n}\n";
        let payload = MinifyCss
            .apply(&module, Payload::Style(css.to_string()), &ctx())
            .unwrap();
        let Payload::Style(out) = payload else {
            panic!("expected style");
        };
        assert!(out.len() < css.len(), "{out}");
        assert!(!out.contains('\n'), "{out}");
        assert!(out.contains("color:red"), "{out}");
        assert_eq!(
            scan::style_references(&out)
                .into_iter()
                .map(|r| r.specifier)
                .collect::<Vec<_>>(),
            vec!["./base.css", "./logo.png"]
        );
    }

    #[test]
    fn minify_css_rejects_binary() {
        let module = image(3);
        let err = MinifyCss
            .apply(&module, Payload::Binary(module.content.clone()), &ctx())
            .unwrap_err();
        assert!(err.contains("expected a stylesheet"));
    }

    #[derive(Debug)]
    struct Squash;

    impl Transpiler for Squash {
        fn transpile(&self, _: &std::path::Path, source: &str, _: BuildMode) -> std::result::Result<String, String> {
            Ok(source.to_string())
        }

        fn minify(&self, _: &std::path::Path, code: &str) -> std::result::Result<String, String> {
            Ok(code.split_whitespace().collect::<Vec<_>>().join(" "))
        }
    }

    #[test]
    fn minify_delegates_to_the_transpiler() {
        let module = SourceModule::new("/p/src/a.js", b"var  a =\n  1;".to_vec());
        let shout: Arc<dyn Transpiler> = Arc::new(Squash);
        let stage = from_config(&StageConfig::Minify, &shout).unwrap();
        assert_eq!(stage.id(), "minify");
        assert_eq!(run(stage.as_ref(), &module), Payload::Script("var a = 1;".to_string()));

        let passthrough: Arc<dyn Transpiler> = Arc::new(crate::transform::PassThrough);
        let stage = from_config(&StageConfig::Minify, &passthrough).unwrap();
        assert_eq!(run(stage.as_ref(), &module), Payload::Script("var  a =\n  1;".to_string()));
    }
}
