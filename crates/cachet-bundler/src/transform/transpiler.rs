use std::fmt;
use std::path::Path;

use cachet_config::BuildMode;

/// External source-to-source compiler (TypeScript, JSX, syntax lowering).
///
/// Cachet does not parse scripts itself. The `transpile` stage hands each
/// script to this service and takes its output verbatim.
///
/// Output must be plain script using either CommonJS (`require`,
/// `module.exports`) or line-leading `import`/`export` statements, which
/// rendering lowers to CommonJS (see [`crate::lower`]). Static imports must
/// keep their string-literal specifiers so linking can map them to module
/// ids. Minified single-line ES module output is not lowered.
pub trait Transpiler: Send + Sync + fmt::Debug {
    fn transpile(&self, path: &Path, source: &str, mode: BuildMode) -> Result<String, String>;

    /// Compact release output (the `minify` stage). The same output rules
    /// as [`Transpiler::transpile`] apply. Defaults to the code unchanged.
    fn minify(&self, _path: &Path, code: &str) -> Result<String, String> {
        Ok(code.to_string())
    }
}

/// Returns sources unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Transpiler for PassThrough {
    fn transpile(&self, _path: &Path, source: &str, _mode: BuildMode) -> Result<String, String> {
        Ok(source.to_string())
    }
}
