//! Miette reporting for build errors.
//!
//! A failed pass carries every error it collected; the CLI renders the
//! failure as one report with each cause listed as a related diagnostic.

use std::fmt;

use miette::{Diagnostic, Severity};

use crate::Error;

/// All fatal errors of one build pass.
#[derive(Debug)]
pub struct BuildFailure {
    pub errors: Vec<Error>,
}

impl BuildFailure {
    pub fn new(errors: Vec<Error>) -> Self {
        Self { errors }
    }

    pub fn single(error: impl Into<Error>) -> Self {
        Self {
            errors: vec![error.into()],
        }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl From<Error> for BuildFailure {
    fn from(error: Error) -> Self {
        Self::single(error)
    }
}

impl std::error::Error for BuildFailure {}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [only] => write!(f, "build failed: {only}"),
            errors => write!(f, "build failed with {} errors", errors.len()),
        }
    }
}

impl Diagnostic for BuildFailure {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new("cachet::build::failed"))
    }

    fn help(&self) -> Option<Box<dyn fmt::Display + '_>> {
        match self.errors.as_slice() {
            [only] => only.help(),
            _ => None,
        }
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn Diagnostic> + 'a>> {
        if self.errors.len() < 2 {
            return None;
        }
        Some(Box::new(self.errors.iter().map(|e| e as &dyn Diagnostic)))
    }
}

impl Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        let code = match self {
            Error::Resolution(_) => "cachet::resolve::not_found",
            Error::Transform(_) => "cachet::transform::failed",
            Error::GroupingInvariant { .. } => "cachet::chunk::invariant",
            Error::InvalidOutputPath(_) => "cachet::emit::invalid_path",
            Error::WriteFailure(_) => "cachet::emit::write_failed",
            Error::InvalidConfig(_) | Error::Config(_) => "cachet::config::invalid",
            Error::Template(_) => "cachet::html::template",
            Error::Io(_) => "cachet::io",
            Error::Runtime(_) => "cachet::runtime",
        };
        Some(Box::new(code))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn fmt::Display + '_>> {
        let help = match self {
            Error::Resolution(err) => {
                let searched: Vec<String> = err
                    .searched
                    .iter()
                    .map(|path| format!("  {}", path.display()))
                    .collect();
                format!(
                    "searched:\n{}\nadd the extension to `extension_priority` or set `unresolved = {{ fallback = \"js\" }}`",
                    searched.join("\n")
                )
            }
            Error::Transform(err) => format!("check the '{}' stage input for this module", err.stage),
            Error::GroupingInvariant { .. } => {
                "this is a bug in chunk grouping; please report it with your splitting config".to_string()
            }
            Error::InvalidOutputPath(_) => {
                "filename templates must stay inside the output directory".to_string()
            }
            Error::WriteFailure(_) => {
                "the previous output is untouched; check permissions and free space".to_string()
            }
            Error::Template(_) => "check the Jinja syntax of `html.template`".to_string(),
            _ => return None,
        };
        Some(Box::new(help))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolutionError;
    use std::path::PathBuf;

    #[test]
    fn resolution_help_lists_searched_paths() {
        let err = Error::Resolution(ResolutionError {
            specifier: "./missing".into(),
            from: PathBuf::from("/p/src"),
            searched: vec![PathBuf::from("/p/src/missing"), PathBuf::from("/p/src/missing.ts")],
        });
        let help = err.help().unwrap().to_string();
        assert!(help.contains("/p/src/missing.ts"));
        assert_eq!(
            err.code().unwrap().to_string(),
            "cachet::resolve::not_found"
        );
    }

    #[test]
    fn failure_relates_every_error() {
        let failure = BuildFailure::new(vec![
            Error::InvalidConfig("a".into()),
            Error::WriteFailure("b".into()),
        ]);
        assert_eq!(failure.to_string(), "build failed with 2 errors");
        assert_eq!(failure.related().unwrap().count(), 2);

        let single = BuildFailure::single(Error::InvalidConfig("a".into()));
        assert!(single.related().is_none());
        assert_eq!(single.to_string(), "build failed: invalid configuration: a");
    }
}
