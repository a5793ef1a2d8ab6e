//! HTML shell generation.
//!
//! The template is rendered first; tag injection happens on the rendered
//! text, so templates never need to know the chunk names.

use indexmap::IndexMap;
use minijinja::Environment;
use serde_json::Value;

use cachet_config::HtmlOptions;

use crate::Result;

const DEFAULT_SHELL: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{{ title }}</title>
  </head>
  <body>
    <noscript>You need to enable JavaScript to run this app.</noscript>
    <div id="root"></div>
  </body>
</html>
"#;

const DEFAULT_TITLE: &str = "Cachet App";

/// Tags to inject, already in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlAssets {
    pub styles: Vec<String>,
    pub scripts: Vec<String>,
    /// Runtime code inlined ahead of the scripts
    pub inline_runtime: Option<String>,
}

impl HtmlAssets {
    /// Add a stylesheet URL unless already present.
    pub fn push_style(&mut self, url: String) {
        if !self.styles.contains(&url) {
            self.styles.push(url);
        }
    }

    /// Add a script URL unless already present.
    pub fn push_script(&mut self, url: String) {
        if !self.scripts.contains(&url) {
            self.scripts.push(url);
        }
    }
}

/// Render the template (or the built-in shell) and inject the asset tags.
pub fn render_document(
    options: &HtmlOptions,
    template: Option<&str>,
    public_path: &str,
    assets: &HtmlAssets,
) -> Result<String> {
    let mut context: IndexMap<&str, Value> = IndexMap::new();
    context.insert(
        "title",
        Value::String(options.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string())),
    );
    context.insert("public_path", Value::String(public_path.to_string()));
    for (key, value) in &options.variables {
        context.insert(key.as_str(), value.clone());
    }

    let env = Environment::new();
    let rendered = env.render_str(template.unwrap_or(DEFAULT_SHELL), &context)?;
    Ok(inject(&rendered, assets))
}

fn inject(html: &str, assets: &HtmlAssets) -> String {
    let links: String = assets
        .styles
        .iter()
        .map(|href| format!("<link href=\"{}\" rel=\"stylesheet\">", escape_attr(href)))
        .collect();

    let mut scripts = String::new();
    if let Some(code) = &assets.inline_runtime {
        scripts.push_str("<script>");
        scripts.push_str(&code.replace("</script", "<\\/script"));
        scripts.push_str("</script>");
    }
    for src in &assets.scripts {
        scripts.push_str(&format!("<script defer src=\"{}\"></script>", escape_attr(src)));
    }

    let html = insert_before(html, "</head>", &links);
    insert_before(&html, "</body>", &scripts)
}

/// Insert `content` before the last `marker` (case-insensitive), or append it.
fn insert_before(html: &str, marker: &str, content: &str) -> String {
    if content.is_empty() {
        return html.to_string();
    }
    match html.to_ascii_lowercase().rfind(marker) {
        Some(at) => format!("{}{}{}", &html[..at], content, &html[at..]),
        None => format!("{html}{content}"),
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
