//! Command implementations.

pub mod delete;
pub mod members;
pub mod save;
pub mod validate;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use vigil_rule::{Rule, RuleKind};

/// Loads a rule file, choosing the format by extension.
pub fn load_rule(path: &str, kind: RuleKind) -> Result<Rule> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read rule file: {path}"))?;
    parse_rule(&content, Path::new(path), kind)
}

fn parse_rule(content: &str, path: &Path, kind: RuleKind) -> Result<Rule> {
    let value: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(content)
            .with_context(|| format!("Failed to parse YAML: {}", path.display()))?,
        _ => serde_json::from_str(content)
            .with_context(|| format!("Failed to parse JSON: {}", path.display()))?,
    };
    Rule::from_value(kind, value).with_context(|| format!("Not a valid {kind} rule"))
}
