//! Execution-context trait and handle types

mod traits;
mod types;

pub use traits::ExecutionContext;
pub use types::{ContextId, ModuleHandle, ProgramId};
