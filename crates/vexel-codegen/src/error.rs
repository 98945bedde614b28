//! Error types for kernel generation

use crate::database::TemplateKind;
use crate::numeric::NumericType;
use crate::statement::StatementShape;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    /// No tuning parameters exist for this (template kind, numeric type) pair
    #[error("no {kind} tuning parameters for numeric type `{numeric}`")]
    UnsupportedNumericType { kind: TemplateKind, numeric: NumericType },

    #[error("statement batch must contain at least one statement")]
    EmptyBatch,

    /// Batch members must all share one reduction shape
    #[error("heterogeneous statement batch: member {index} has shape {found}, expected {expected}")]
    HeterogeneousBatch {
        index: usize,
        expected: StatementShape,
        found: StatementShape,
    },

    #[error("{kind} template cannot expand a {shape} statement")]
    TemplateMismatch { kind: TemplateKind, shape: StatementShape },

    #[error("statement mixes numeric types `{first}` and `{second}`")]
    MixedNumericTypes { first: NumericType, second: NumericType },

    /// The type needs a double-precision extension the device lacks
    #[error("device `{device}` has no double-precision support required by `{numeric}`")]
    DoublePrecisionUnsupported { device: String, numeric: NumericType },

    #[error("reduction `{kernel}` must write its result to a device scalar")]
    HostScalarOutput { kernel: String },

    #[error("invalid template parameters: {0}")]
    InvalidParameters(String),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl CodegenError {
    pub fn invalid_parameters(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CodegenError>;
