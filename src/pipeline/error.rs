use thiserror::Error;

use super::classify::{self, ClassifiedError};
use super::model::GenerateError;
use super::preprocess::PreprocessError;
use super::validate::ValidateError;

/// Everything that can stop a request between pickup and result
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error("internal failure: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Reduce to the user-facing taxonomy sent over the wire. Validation
    /// failures carry structure of their own; everything else goes through
    /// keyword classification of its message.
    pub fn into_classified(self) -> ClassifiedError {
        match self {
            PipelineError::UnknownProfile(id) => ClassifiedError::configuration(&id),
            PipelineError::Validate(ValidateError::Malformed(detail)) => {
                ClassifiedError::malformed_response(&detail)
            }
            PipelineError::Validate(ValidateError::MissingFields(fields)) => {
                ClassifiedError::missing_fields(&fields)
            }
            other => classify::classify(&other.to_string()),
        }
    }
}
