//! Rule-definition file loader.
//!
//! Files are YAML-shaped: `version`, optional `transaction_set` and
//! `description`, and a `rules` list matching the rule schema. Unknown
//! file-level fields are preserved as opaque metadata and ignored by the
//! engine.

use crate::rule::Rule;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// A parsed rule-definition file.
#[derive(Debug, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub version: Option<String>,
    /// Default transaction-set scope for rules that do not name their own.
    #[serde(default)]
    pub transaction_set: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Unrecognized file-level fields, kept verbatim.
    #[serde(flatten)]
    pub metadata: BTreeMap<String, serde_yaml::Value>,
}

impl RuleFile {
    /// The rules, with the file-level `transaction_set` applied as the
    /// default scope for rules that left theirs empty.
    pub fn into_rules(self) -> Vec<Rule> {
        let default_scope = self.transaction_set;
        self.rules
            .into_iter()
            .map(|mut rule| {
                if rule.transaction_types.is_empty() {
                    if let Some(scope) = &default_scope {
                        rule.transaction_types.insert(scope.clone());
                    }
                }
                rule
            })
            .collect()
    }
}

/// Loads rule files from YAML text or disk.
pub struct RuleFileLoader;

impl RuleFileLoader {
    /// Parse a rule file from YAML text.
    pub fn load_from_str(yaml: &str) -> Result<RuleFile> {
        let file: RuleFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error: {e}")))?;
        debug!(
            rules = file.rules.len(),
            version = file.version.as_deref().unwrap_or("unversioned"),
            "loaded rule file"
        );
        Ok(file)
    }

    /// Read and parse a rule file from disk.
    pub fn load_from_file(path: &Path) -> Result<RuleFile> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }
}
