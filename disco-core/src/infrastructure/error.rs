// disco-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(disco::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- CONFIG / YAML ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(disco::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON Encoding Error: {0}")]
    #[diagnostic(code(disco::infra::json))]
    Json(#[from] serde_json::Error),

    // --- TRANSPORT (Consul / etcd) ---
    #[error("Transport Error: {0}")]
    #[diagnostic(
        code(disco::infra::transport),
        help("The source endpoint is unreachable; discovery retries next tick.")
    )]
    Http(#[from] reqwest::Error),

    // --- SOURCE CONSTRUCTION ---
    #[error("Unknown discovery source kind '{0}'")]
    #[diagnostic(
        code(disco::infra::unknown_source),
        help("Recognized kinds: flat, consul, etcd, beacon.")
    )]
    UnknownSourceKind(String),

    #[error("Configuration Error: {0}")]
    #[diagnostic(code(disco::infra::config))]
    ConfigError(String),

    // --- RULE FILES ---
    #[error("Unknown rules format version {0}")]
    #[diagnostic(
        code(disco::infra::rules_format),
        help("Only rules format 1 is understood by this agent.")
    )]
    UnknownRuleFormat(u32),
}
