// disco-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Schema '{name}' is not loaded")]
    #[diagnostic(
        code(disco::domain::schema_missing),
        help("Schemas are loaded from '*.schema' files found on the disco.path.")
    )]
    SchemaMissing { name: String },

    #[error("No value at path '{path}'")]
    #[diagnostic(code(disco::domain::path_missing))]
    PathMissing { path: String },

    #[error("Validation of '{name}' failed at '{at}'")]
    #[diagnostic(
        code(disco::domain::schema_invalid),
        help("The document body is withheld from this message; rerun with -l debug for detail.")
    )]
    SchemaInvalid { name: String, at: String },

    #[error("Malformed document: {0}")]
    #[diagnostic(code(disco::domain::document))]
    Document(String),

    #[error("Schema document has no top-level 'name' key")]
    #[diagnostic(code(disco::domain::unnamed_schema))]
    UnnamedSchema,

    #[error("Rule for handler '{cmd}' declares no dependencies")]
    #[diagnostic(code(disco::domain::empty_deps))]
    EmptyDeps { cmd: String },

    #[error("Handler '{cmd}' failing repeatedly with valid data ({attempts} attempts)")]
    #[diagnostic(
        code(disco::domain::handler_failing),
        help("The fail limit is configured through disco.fail_limit (default 5).")
    )]
    HandlerRepeatedlyFailing { cmd: String, attempts: u32 },
}
