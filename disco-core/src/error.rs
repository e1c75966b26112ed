// disco-core/src/error.rs

use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoError {
    // --- ERREURS DU DOMAINE (Knowledge base, Rules, Validation) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- ERREURS D'INFRASTRUCTURE (IO, Parsing, Transport) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- ERREURS GÉNÉRIQUES / APPLICATIVES ---
    #[error("Internal Error: {0}")]
    InternalError(String),
}

// Manual implementations to avoid duplicate enum variants but keep ergonomics
impl From<std::io::Error> for DiscoError {
    fn from(err: std::io::Error) -> Self {
        DiscoError::Infrastructure(InfrastructureError::Io(err))
    }
}

impl From<serde_yaml::Error> for DiscoError {
    fn from(err: serde_yaml::Error) -> Self {
        DiscoError::Infrastructure(InfrastructureError::Yaml(err))
    }
}
