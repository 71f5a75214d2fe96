use thiserror::Error;

/// Closed set of error kinds from the orchestrator's error-handling design (§7).
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider returned schema-invalid output: {0}")]
    ProviderSchemaViolation(String),

    #[error("external service error: {0}")]
    ExternalServiceError(String),

    #[error("internal invariant violated: {0}")]
    SchemaInvariant(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SynthError {
    /// Stable label for the `failed` event envelope's `error_kind` field (§7).
    pub fn kind_label(&self) -> &'static str {
        match self {
            SynthError::InvalidInput(_) => "invalid_input",
            SynthError::ProviderUnavailable(_) => "provider_unavailable",
            SynthError::ProviderSchemaViolation(_) => "provider_schema_violation",
            SynthError::ExternalServiceError(_) => "external_service_error",
            SynthError::SchemaInvariant(_) => "schema_invariant",
            SynthError::Timeout(_) => "timeout",
            SynthError::Cancelled => "cancelled",
            SynthError::UnknownEntity(_) => "unknown_entity",
            SynthError::Io(_) => "io",
            SynthError::Serialization(_) => "serialization",
            SynthError::Configuration(_) => "configuration",
        }
    }
}

pub type Result<T> = std::result::Result<T, SynthError>;
