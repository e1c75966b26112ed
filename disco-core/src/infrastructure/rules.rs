// disco-core/src/infrastructure/rules.rs
//
// Rule and schema files are dropped under the agent's search path by the
// image build; this module finds and parses them.
//
// Rule file shape (YAML):
//
//   format: 1
//   rules:
//     - rule:
//         when: "mysql"            # or a list, or compact "any:mysql,pgsql"
//         op: all                  # optional; default all
//         do: "mysql-configure"

use std::path::PathBuf;

use serde::Deserialize;
use walkdir::WalkDir;

use crate::domain::rule::{Rule, RuleOp};
use crate::error::DiscoError;
use crate::infrastructure::error::InfrastructureError;

const RULES_FORMAT: u32 = 1;

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default = "default_format")]
    format: u32,
    rules: Vec<RuleEntry>,
}

fn default_format() -> u32 {
    RULES_FORMAT
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    rule: RuleDef,
}

#[derive(Debug, Deserialize)]
struct RuleDef {
    when: WhenClause,
    #[serde(default)]
    op: Option<String>,
    #[serde(rename = "do")]
    handler: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WhenClause {
    One(String),
    Many(Vec<String>),
}

/// Parse one rules document into domain rules, in declaration order.
pub fn parse_rules(text: &str) -> Result<Vec<Rule>, DiscoError> {
    let doc: RulesFile =
        serde_yaml::from_str(text).map_err(InfrastructureError::Yaml)?;
    if doc.format != RULES_FORMAT {
        return Err(InfrastructureError::UnknownRuleFormat(doc.format).into());
    }
    doc.rules.into_iter().map(|entry| build(entry.rule)).collect()
}

fn build(def: RuleDef) -> Result<Rule, DiscoError> {
    let (deps, prefix_op) = match def.when {
        WhenClause::One(clause) => parse_compact_when(&clause),
        WhenClause::Many(deps) => (deps, None),
    };

    let explicit_op = match def.op.as_deref() {
        None => None,
        Some(text) => Some(RuleOp::parse(text).ok_or_else(|| {
            InfrastructureError::ConfigError(format!(
                "rule for '{}' has unknown op '{}' (expected any|all)",
                def.handler, text
            ))
        })?),
    };

    // The compact prefix is the more specific spelling; it wins over `op:`
    let op = prefix_op.or(explicit_op).unwrap_or_default();
    Rule::new(deps, def.handler, op).map_err(Into::into)
}

/// Legacy compact form: a single string, optionally prefixed `any:`/`all:`,
/// with comma-separated dependency paths.
fn parse_compact_when(clause: &str) -> (Vec<String>, Option<RuleOp>) {
    let (op, rest) = match clause.split_once(':') {
        Some((prefix, rest)) if RuleOp::parse(prefix.trim()).is_some() => {
            (RuleOp::parse(prefix.trim()), rest)
        }
        _ => (None, clause),
    };
    let deps = rest
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect();
    (deps, op)
}

/// Recursively enumerate files with `extension` under each search path, in
/// path order then sorted walk order. Unreadable entries are skipped.
pub fn find_files(paths: &[PathBuf], extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for path in paths {
        let walker = WalkDir::new(path).follow_links(true).sort_by_file_name();
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let candidate = entry.path();
            if candidate.is_file()
                && candidate.extension().is_some_and(|ext| ext == extension)
            {
                found.push(candidate.to_path_buf());
            }
        }
    }
    found
}

/// `disco.path` is a colon-separated list of directories.
pub fn split_search_path(path: &str) -> Vec<PathBuf> {
    path.split(':')
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}
