//! Error types for module building and registration

use vexel_codegen::{CodegenError, NumericType};

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors surfaced by [`crate::ensure_module_ready`] and execution contexts.
///
/// None of these are retried or cached: a failed build leaves the module
/// unregistered and the next call starts over.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Parameter resolution or kernel generation failed
    #[error("code generation failed: {0}")]
    Codegen(#[from] CodegenError),

    /// The type needs a double-precision extension the device lacks
    #[error("device `{device}` has no double-precision support required by `{numeric}`")]
    DoublePrecisionUnsupported { device: String, numeric: NumericType },

    /// The context rejected the generated source
    #[error("compilation of module `{module}` failed: {message}")]
    Compilation { module: String, message: String },

    /// A module with this name is already registered in the context
    #[error("module `{0}` is already registered")]
    DuplicateModule(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Create a compilation error
    pub fn compilation(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compilation {
            module: module.into(),
            message: message.into(),
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
