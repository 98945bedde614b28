//! Execution-context implementations
//!
//! - `host` - in-memory reference context; validates source instead of
//!   compiling it for a device

pub mod host;

pub use host::{HostContext, HostProgram};
