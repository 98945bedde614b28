//! Execution-context trait
//!
//! The module builder only needs four things from a context: a stable
//! identity, a description of its device, a way to compile and register
//! source under a name, and the module cache attached to it.
//!
//! ```text
//! ensure_module_ready(ctx, family, numeric)
//!         │
//!         ├── ctx.device()          double-precision check, tuning lookup
//!         ├── ctx.module_cache()    per-(family, type) slot
//!         └── ctx.register_module() compile + register, once
//! ```

use super::types::{ContextId, ModuleHandle};
use crate::error::Result;
use crate::program_cache::ModuleCache;
use vexel_codegen::DeviceProfile;

/// A compilation target that owns its own module cache.
///
/// Implementations must be shareable across threads; `register_module` may
/// be called concurrently for different module names.
pub trait ExecutionContext: Send + Sync {
    fn id(&self) -> ContextId;

    fn device(&self) -> &DeviceProfile;

    /// Compile `source` and register it under `name`.
    ///
    /// On error nothing is registered.
    fn register_module(&self, name: &str, source: &str) -> Result<ModuleHandle>;

    /// Modules built for this context; dropped with the context.
    fn module_cache(&self) -> &ModuleCache;
}
