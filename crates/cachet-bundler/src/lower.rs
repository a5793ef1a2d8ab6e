//! Lowering of static ES module syntax to the factory shape.
//!
//! Module factories receive `(module, exports, require)`, so `import` and
//! `export` statements are rewritten to `require` calls and getters on
//! `exports` before linking. Like [`crate::scan`] this works on text: only
//! statements that start a line are lowered, and imported bindings are
//! snapshots taken when the import runs, not live views.
//!
//! ```text
//! import logo, { render as draw } from './lib';
//! export const size = 2;
//! ```
//!
//! becomes
//!
//! ```text
//! Object.defineProperty(exports, "__esModule", { value: true });
//! Object.defineProperty(exports, "size", { enumerable: true, get: function () { return size; } });
//! var __cachet_im0 = require("./lib"), logo = __cachet_im0 && __cachet_im0.__esModule ? __cachet_im0.default : __cachet_im0, draw = __cachet_im0.render;
//! const size = 2;
//! ```

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::transform::stages::json_string;

static STATIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^([ \t]*)import\b\s*(?:([\w$]+)\s*(?:,\s*)?)?(?:\*\s*as\s+([\w$]+)|\{([^}]*)\})?\s*from\s*['"]([^'"\n]+)['"][ \t]*;?"#,
    )
    .expect("static import pattern is valid")
});

static BARE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^([ \t]*)import\s*['"]([^'"\n]+)['"][ \t]*;?"#)
        .expect("bare import pattern is valid")
});

static DYNAMIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#).expect("dynamic import pattern is valid")
});

static EXPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^([ \t]*)export\s*(?:\*\s*(?:as\s+([\w$]+)\s*)?|\{([^}]*)\}\s*)from\s*['"]([^'"\n]+)['"][ \t]*;?"#,
    )
    .expect("export from pattern is valid")
});

static EXPORT_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^([ \t]*)export\s*\{([^}]*)\}[ \t]*;?"#).expect("export list pattern is valid")
});

static EXPORT_DEFAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^([ \t]*)export\s+default\s+"#).expect("export default pattern is valid")
});

static EXPORT_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^([ \t]*)export\s+((?:async\s+)?function\s*\*?\s*([\w$]+)|class\s+([\w$]+)|(?:const|let|var)\s+([\w$]+))"#,
    )
    .expect("export declaration pattern is valid")
});

/// An exported name and the expression its getter returns.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Export {
    name: String,
    value: String,
}

#[derive(Debug, Default)]
struct Lowering {
    exports: Vec<Export>,
    reexport_all: Vec<String>,
    temporaries: usize,
    is_module: bool,
}

impl Lowering {
    fn temporary(&mut self, prefix: &str) -> String {
        let name = format!("__cachet_{prefix}{}", self.temporaries);
        self.temporaries += 1;
        name
    }

    fn export(&mut self, name: &str, value: String) {
        self.is_module = true;
        if !self.exports.iter().any(|e| e.name == name) {
            self.exports.push(Export {
                name: name.to_string(),
                value,
            });
        }
    }
}

/// Rewrite `import`/`export` statements of `code` to CommonJS.
///
/// Code without module syntax is returned unchanged.
pub fn lower_esm(code: &str) -> String {
    let mut state = Lowering::default();

    let code = EXPORT_FROM.replace_all(code, |caps: &Captures<'_>| {
        let indent = &caps[1];
        let require = format!("require({})", json_string(&caps[4]));
        match (caps.get(2), caps.get(3)) {
            (_, Some(list)) => {
                let temp = state.temporary("re");
                for (imported, exported) in specifier_pairs(list.as_str()) {
                    state.export(&exported, format!("{temp}.{imported}"));
                }
                format!("{indent}var {temp} = {require};")
            }
            (Some(namespace), None) => {
                let temp = state.temporary("re");
                state.export(namespace.as_str(), temp.clone());
                format!("{indent}var {temp} = {require};")
            }
            (None, None) => {
                let temp = state.temporary("re");
                state.is_module = true;
                state.reexport_all.push(temp.clone());
                format!("{indent}var {temp} = {require};")
            }
        }
    });

    let code = EXPORT_LIST.replace_all(&code, |caps: &Captures<'_>| {
        for (local, exported) in specifier_pairs(&caps[2]) {
            state.export(&exported, local);
        }
        caps[1].to_string()
    });

    let code = EXPORT_DEFAULT.replace_all(&code, |caps: &Captures<'_>| {
        state.is_module = true;
        format!("{}exports.default = ", &caps[1])
    });

    let code = EXPORT_DECLARATION.replace_all(&code, |caps: &Captures<'_>| {
        let name = caps.get(3).or_else(|| caps.get(4)).or_else(|| caps.get(5));
        if let Some(name) = name {
            state.export(name.as_str(), name.as_str().to_string());
        }
        format!("{}{}", &caps[1], &caps[2])
    });

    let code = STATIC_IMPORT.replace_all(&code, |caps: &Captures<'_>| {
        state.is_module = true;
        let indent = &caps[1];
        let require = format!("require({})", json_string(&caps[5]));
        let default = caps.get(2).map(|m| m.as_str());
        let namespace = caps.get(3).map(|m| m.as_str());
        let named = caps.get(4).map(|m| specifier_pairs(m.as_str())).unwrap_or_default();

        if let (None, Some(namespace), true) = (default, namespace, named.is_empty()) {
            return format!("{indent}var {namespace} = {require};");
        }

        let temp = state.temporary("im");
        let mut declarators = vec![format!("{temp} = {require}")];
        if let Some(default) = default {
            declarators.push(format!(
                "{default} = {temp} && {temp}.__esModule ? {temp}.default : {temp}"
            ));
        }
        if let Some(namespace) = namespace {
            declarators.push(format!("{namespace} = {temp}"));
        }
        for (imported, local) in named {
            declarators.push(format!("{local} = {temp}.{imported}"));
        }
        format!("{indent}var {};", declarators.join(", "))
    });

    let code = BARE_IMPORT.replace_all(&code, |caps: &Captures<'_>| {
        state.is_module = true;
        format!("{}require({});", &caps[1], json_string(&caps[2]))
    });

    let code = DYNAMIC_IMPORT.replace_all(&code, |caps: &Captures<'_>| {
        format!(
            "Promise.resolve().then(function () {{ return require({}); }})",
            json_string(&caps[1])
        )
    });

    if !state.is_module {
        return code.into_owned();
    }

    let mut out = String::from("Object.defineProperty(exports, \"__esModule\", { value: true });\n");
    for export in &state.exports {
        out.push_str(&format!(
            "Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {}; }} }});\n",
            json_string(&export.name),
            export.value
        ));
    }
    for temp in &state.reexport_all {
        // hoisted var; the getters read it once the require has run
        out.push_str(&format!(
            "Object.keys({temp} || {{}}).forEach(function (k) {{ if (k !== \"default\" && !Object.prototype.hasOwnProperty.call(exports, k)) Object.defineProperty(exports, k, {{ enumerable: true, get: function () {{ return {temp}[k]; }} }}); }});\n"
        ));
    }
    out.push_str(&code);
    out
}

/// `a, b as c` into `(a, a), (b, c)`.
fn specifier_pairs(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .filter_map(|item| {
            let mut words = item.split_whitespace();
            let first = words.next()?;
            match (words.next(), words.next()) {
                (Some("as"), Some(alias)) => Some((first.to_string(), alias.to_string())),
                _ => Some((first.to_string(), first.to_string())),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commonjs_is_left_alone() {
        let code = "const x = require('./x');\nmodule.exports = { x };\n";
        assert_eq!(lower_esm(code), code);
    }

    #[test]
    fn imports_become_requires() {
        let out = lower_esm(
            "import './style.css';\nimport logo, { render as draw, size } from './lib';\nimport * as all from 'pkg';\n",
        );
        assert!(out.starts_with("Object.defineProperty(exports, \"__esModule\", { value: true });\n"));
        assert!(out.contains("require(\"./style.css\");\n"));
        assert!(out.contains(
            "var __cachet_im0 = require(\"./lib\"), logo = __cachet_im0 && __cachet_im0.__esModule ? __cachet_im0.default : __cachet_im0, draw = __cachet_im0.render, size = __cachet_im0.size;"
        ));
        assert!(out.contains("var all = require(\"pkg\");"));
        assert!(!out.contains("import "));
    }

    #[test]
    fn exports_become_getters() {
        let out = lower_esm(
            "export const size = 2;\nexport function grow() {}\nconst inner = 1;\nexport { inner as outer };\nexport default size;\n",
        );
        for name in ["size", "grow"] {
            assert!(out.contains(&format!(
                "Object.defineProperty(exports, \"{name}\", {{ enumerable: true, get: function () {{ return {name}; }} }});"
            )));
        }
        assert!(out.contains("\"outer\", { enumerable: true, get: function () { return inner; } }"));
        assert!(out.contains("\nconst size = 2;\nfunction grow() {}\n"));
        assert!(out.contains("exports.default = size;"));
        assert!(!out.contains("export "));
    }

    #[test]
    fn reexports_read_through_a_temporary() {
        let out = lower_esm("export { a as b } from './a';\nexport * from './all';\n");
        assert!(out.contains("var __cachet_re0 = require(\"./a\");"));
        assert!(out.contains("return __cachet_re0.a;"));
        assert!(out.contains("var __cachet_re1 = require(\"./all\");"));
        assert!(out.contains("Object.keys(__cachet_re1 || {})"));
    }

    #[test]
    fn dynamic_imports_resolve_from_loaded_chunks() {
        let out = lower_esm("button.onclick = () => import('./lazy').then(show);");
        assert_eq!(
            out,
            "button.onclick = () => Promise.resolve().then(function () { return require(\"./lazy\"); }).then(show);"
        );
    }

    #[test]
    fn mid_line_keywords_are_not_statements() {
        let code = "const important = 'export default';\nlog('import x from y');\n";
        assert_eq!(lower_esm(code), code);
    }
}
