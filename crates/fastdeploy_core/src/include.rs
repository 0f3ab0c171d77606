use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File selection for the update artifact, as configured under
/// `custom.fastDeploy.include`: either a list of glob patterns matched from
/// the project root, or a mapping of relative base directories to a pattern
/// matched inside each.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum InclusionSpec {
    Patterns(Vec<String>),
    BaseDirs(BTreeMap<String, String>),
}

impl Default for InclusionSpec {
    fn default() -> Self {
        Self::Patterns(Vec::new())
    }
}

/// One resolved selection rule: match `pattern` relative to `base`, store
/// matches under their `base`-relative entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRule {
    pub base: PathBuf,
    pub pattern: String,
}

impl InclusionSpec {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Patterns(patterns) => patterns.is_empty(),
            Self::BaseDirs(bases) => bases.is_empty(),
        }
    }

    /// Flattened pattern list in resolution order, as sent on the wire.
    pub fn patterns(&self) -> Vec<String> {
        match self {
            Self::Patterns(patterns) => patterns.clone(),
            Self::BaseDirs(bases) => bases.values().cloned().collect(),
        }
    }

    /// Resolves into ordered `(base, pattern)` rules. List patterns keep
    /// their configured order against the project root; mapped bases come
    /// out in key order, so repeated resolution within one run describes
    /// the identical file set. Duplicate rules are dropped, first wins.
    pub fn resolve(&self, project_root: &Path) -> Vec<IncludeRule> {
        let mut rules: Vec<IncludeRule> = Vec::new();
        match self {
            Self::Patterns(patterns) => {
                for pattern in patterns {
                    push_unique(
                        &mut rules,
                        IncludeRule {
                            base: project_root.to_path_buf(),
                            pattern: pattern.clone(),
                        },
                    );
                }
            }
            Self::BaseDirs(bases) => {
                for (relative_base, pattern) in bases {
                    push_unique(
                        &mut rules,
                        IncludeRule {
                            base: project_root.join(relative_base),
                            pattern: pattern.clone(),
                        },
                    );
                }
            }
        }
        rules
    }
}

fn push_unique(rules: &mut Vec<IncludeRule>, rule: IncludeRule) {
    if !rules.contains(&rule) {
        rules.push(rule);
    }
}

/// A bare `**` tail only matches directory names outright; the files live one
/// segment deeper. Rewrites `src/**` into `src/**/*` so file matching sees
/// everything under the tree, the way `src/**` behaves in the framework's
/// own matcher.
pub fn file_match_pattern(pattern: &str) -> String {
    if pattern == "**" || pattern.ends_with("/**") {
        format!("{pattern}/*")
    } else {
        pattern.to_string()
    }
}
