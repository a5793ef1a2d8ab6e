//! Rule matching.
//!
//! Top-level rules are non-exclusive: every matching rule contributes its
//! chain, in declared order. A `one_of` group stops at its first matching
//! child. Within a single rule `exclude` always beats `test` and `include`.

use std::path::{Path, PathBuf};

use cachet_config::RuleConfig;
use regex::Regex;

use crate::module::SourceModule;
use crate::{Error, Result};

pub type ChainId = String;

/// Chains selected for a module, in application order. Empty means pass-through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub chains: Vec<ChainId>,
}

impl Classification {
    pub fn is_passthrough(&self) -> bool {
        self.chains.is_empty()
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    test: Vec<Regex>,
    include: Vec<PathBuf>,
    exclude: Vec<Regex>,
    chain: Option<ChainId>,
    one_of: Vec<CompiledRule>,
}

impl CompiledRule {
    fn compile(rule: &RuleConfig, root: &Path) -> Result<Self> {
        Ok(Self {
            test: compile_all(&rule.test)?,
            include: rule
                .include
                .iter()
                .map(|p| if p.is_absolute() { p.clone() } else { root.join(p) })
                .collect(),
            exclude: compile_all(&rule.exclude)?,
            chain: rule.chain.clone(),
            one_of: rule
                .one_of
                .iter()
                .map(|child| CompiledRule::compile(child, root))
                .collect::<Result<_>>()?,
        })
    }

    fn predicate(&self, path: &Path, subject: &str) -> bool {
        if self.exclude.iter().any(|re| re.is_match(subject)) {
            return false;
        }
        let tested = self.test.is_empty() || self.test.iter().any(|re| re.is_match(subject));
        let included = self.include.is_empty() || self.include.iter().any(|p| path.starts_with(p));
        tested && included
    }

    /// Chains this rule contributes, `None` when it does not match.
    fn evaluate(&self, path: &Path, subject: &str) -> Option<Vec<ChainId>> {
        if !self.predicate(path, subject) {
            return None;
        }

        let mut chains: Vec<ChainId> = self.chain.iter().cloned().collect();
        if self.one_of.is_empty() {
            return Some(chains);
        }

        let winner = self
            .one_of
            .iter()
            .find_map(|child| child.evaluate(path, subject))?;
        chains.extend(winner);
        Some(chains)
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| {
                Error::InvalidConfig(format!("invalid rule pattern '{pattern}': {e}"))
            })
        })
        .collect()
}

/// Compiled, ordered rule list.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile rules once per pipeline; `include` paths are joined onto `root`.
    pub fn compile(rules: &[RuleConfig], root: &Path) -> Result<Self> {
        Ok(Self {
            rules: rules
                .iter()
                .map(|rule| CompiledRule::compile(rule, root))
                .collect::<Result<_>>()?,
        })
    }

    pub fn classify(&self, module: &SourceModule) -> Classification {
        let subject = module.path.to_string_lossy().replace('\\', "/");
        let mut chains = Vec::new();
        for rule in &self.rules {
            if let Some(contributed) = rule.evaluate(&module.path, &subject) {
                chains.extend(contributed);
            }
        }
        Classification { chains }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_config::BuildConfig;

    fn module(path: &str) -> SourceModule {
        SourceModule::new(path, Vec::new())
    }

    fn chains(set: &RuleSet, path: &str) -> Vec<String> {
        set.classify(&module(path)).chains
    }

    #[test]
    fn default_rules_classify_typical_sources() {
        let set = RuleSet::compile(&BuildConfig::default().rules, Path::new("/p")).unwrap();

        assert_eq!(chains(&set, "/p/src/index.ts"), vec!["script"]);
        assert_eq!(chains(&set, "/p/src/style.css"), vec!["style"]);
        assert_eq!(chains(&set, "/p/src/logo.png"), vec!["media"]);
        assert_eq!(chains(&set, "/p/src/font.woff2"), vec!["file"]);
        // excluded from the file fallback and outside src/ for scripts
        assert!(chains(&set, "/p/node_modules/lib/index.js").is_empty());
        assert!(chains(&set, "/p/src/data.json").is_empty());
    }

    #[test]
    fn one_of_first_match_wins() {
        let rules = vec![RuleConfig::one_of(vec![
            RuleConfig::new(r"\.svg$", "inline"),
            RuleConfig::new(r"\.(svg|png)$", "file"),
        ])];
        let set = RuleSet::compile(&rules, Path::new("/p")).unwrap();

        assert_eq!(chains(&set, "/p/icon.svg"), vec!["inline"]);
        assert_eq!(chains(&set, "/p/icon.png"), vec!["file"]);
    }

    #[test]
    fn top_level_rules_all_apply_in_order() {
        let rules = vec![
            RuleConfig::new(r"\.ts$", "script"),
            RuleConfig::new(r"\.ts$", "banner"),
        ];
        let set = RuleSet::compile(&rules, Path::new("/p")).unwrap();
        assert_eq!(chains(&set, "/p/a.ts"), vec!["script", "banner"]);
    }

    #[test]
    fn exclude_beats_test_and_include() {
        let rules = vec![
            RuleConfig::new(r"\.js$", "script")
                .with_include("src")
                .with_exclude(r"\.test\.js$"),
        ];
        let set = RuleSet::compile(&rules, Path::new("/p")).unwrap();

        assert_eq!(chains(&set, "/p/src/a.js"), vec!["script"]);
        assert!(chains(&set, "/p/src/a.test.js").is_empty());
        assert!(chains(&set, "/p/lib/a.js").is_empty());
    }

    #[test]
    fn nested_groups_fall_through_to_next_child() {
        let rules = vec![RuleConfig::one_of(vec![
            RuleConfig::one_of(vec![RuleConfig::new(r"\.gif$", "media")]),
            RuleConfig::fallback("file"),
        ])];
        let set = RuleSet::compile(&rules, Path::new("/p")).unwrap();

        assert_eq!(chains(&set, "/p/a.gif"), vec!["media"]);
        assert_eq!(chains(&set, "/p/a.txt"), vec!["file"]);
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let rules = vec![RuleConfig::new("(", "x")];
        assert!(matches!(
            RuleSet::compile(&rules, Path::new("/p")),
            Err(Error::InvalidConfig(_))
        ));
    }
}
