//! Serializable rule tables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MigrateError, Result};

use super::RuleSet;

/// A serializable guard. See [`super::Exclusion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "snake_case")]
pub enum ExclusionSpec {
    /// Skip the match when the text right after it matches this pattern.
    NotFollowedBy(String),
    /// Skip the match when the text right before it matches this pattern.
    NotPrecededBy(String),
}

/// A serializable rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    pub template: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<ExclusionSpec>,
}

impl RuleSpec {
    pub fn new(pattern: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            template: template.into(),
            exclusions: Vec::new(),
        }
    }

    /// Adds a guard.
    pub fn exclude(mut self, exclusion: ExclusionSpec) -> Self {
        self.exclusions.push(exclusion);
        self
    }
}

/// A rule table that can be saved to and loaded from YAML or JSON.
///
/// # Example YAML
///
/// ```yaml
/// name: upgrade-state
/// description: Upgrade ownership keys
/// manual_notes:
///   - OR-chained reads need manual handling
/// rules:
///   - pattern: '"HasUpgrade_"\s*\+\s*(\w+)\)'
///     template: 'Keys.kHasUpgrade(${1}))'
///     exclusions:
///       - kind: not_followed_by
///         pattern: '\s*\|\|'
///   - pattern: '"HasUpgrade_"\s*\+\s*(\w+),'
///     template: 'Keys.kHasUpgrade(${1}),'
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manual_notes: Vec<String>,

    /// Rules in application order.
    pub rules: Vec<RuleSpec>,
}

impl RuleSetConfig {
    /// Compiles the table into a [`RuleSet`].
    pub fn to_rule_set(&self) -> Result<RuleSet> {
        let mut builder = RuleSet::builder(&self.name).description(&self.description);
        for spec in &self.rules {
            builder = builder.spec(spec.clone());
        }
        for note in &self.manual_notes {
            builder = builder.manual_note(note);
        }
        builder.build()
    }

    /// Loads a table, choosing the format from the file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            Some("yaml") | Some("yml") => Self::from_yaml(path),
            other => Err(MigrateError::InvalidConfig(format!(
                "unsupported rule file extension {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }

    /// Saves a table, choosing the format from the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => self.to_json(path),
            Some("yaml") | Some("yml") => self.to_yaml(path),
            other => Err(MigrateError::InvalidConfig(format!(
                "unsupported rule file extension {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }

    /// Load config from a YAML file.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| MigrateError::file_access(path, e))?;

        serde_yaml::from_str(&content).map_err(|e| {
            MigrateError::InvalidConfig(format!("Failed to parse YAML rules: {}", e))
        })
    }

    /// Load config from a JSON file.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| MigrateError::file_access(path, e))?;

        serde_json::from_str(&content).map_err(|e| {
            MigrateError::InvalidConfig(format!("Failed to parse JSON rules: {}", e))
        })
    }

    /// Save config to a YAML file.
    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content).map_err(|e| MigrateError::file_access(path, e))
    }

    /// Save config to a JSON file.
    pub fn to_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| MigrateError::file_access(path, e))
    }
}
