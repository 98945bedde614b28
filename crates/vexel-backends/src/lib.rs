//! Per-context module building for generated vector kernels
//!
//! This crate provides:
//! - **Execution-context trait**: the narrow interface the builder needs
//!   from a compilation target
//! - **Module cache**: one slot per (module family, numeric type), owned by
//!   the context
//! - **Module builder**: idempotent, serialized first-time build and
//!   registration
//! - **Host context**: in-memory reference implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        ensure_module_ready(ctx, family, numeric)         │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ first call per (ctx, family, type)
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                    vexel-codegen                         │
//! │  tuning lookup → presets/variants → template expansion   │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ "<type>_vector" / "<type>_vector_multi"
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │             ExecutionContext::register_module            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use vexel_backends::{ExecutionContext, HostContext, VectorModule};
//! use vexel_codegen::database::{DeviceKind, DeviceProfile, Vendor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = HostContext::new(DeviceProfile::new(Vendor::Intel, DeviceKind::Cpu, "x86_64", "xeon"));
//!
//! let first = VectorModule::<f32>::init(&ctx)?;
//! let again = VectorModule::<f32>::init(&ctx)?;
//! assert_eq!(first, again);
//! assert_eq!(ctx.registration_count(), 1);
//! assert_eq!(ctx.module_cache().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod backends;
pub mod config;
pub mod error;
pub mod program_builder;
pub mod program_cache;

// Re-export commonly used types
pub use backend::{ContextId, ExecutionContext, ModuleHandle, ProgramId};
pub use backends::{HostContext, HostProgram};
pub use config::BuildOptions;
pub use error::{BackendError, Result};
pub use program_builder::{ensure_module_ready, ensure_module_ready_with, VectorModule, VectorMultiInnerProdModule};
pub use program_cache::{ModuleCache, ModuleKey};
