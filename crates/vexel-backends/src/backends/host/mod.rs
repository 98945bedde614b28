//! In-memory reference context
//!
//! `HostContext` implements [`ExecutionContext`] without a device: it
//! validates generated source structurally (balanced delimiters, unique
//! entry points, `double` only behind the fp64 pragma) and records each
//! registered program by name.
//!
//! # Usage
//!
//! ```rust
//! use vexel_backends::{ensure_module_ready, ExecutionContext, HostContext};
//! use vexel_codegen::database::{DeviceKind, DeviceProfile, Vendor};
//! use vexel_codegen::{ModuleFamily, NumericType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = HostContext::new(DeviceProfile::new(Vendor::Nvidia, DeviceKind::Gpu, "ampere", "a100"));
//! let handle = ensure_module_ready(&ctx, ModuleFamily::Vector, NumericType::Float)?;
//!
//! assert_eq!(handle.name(), "float_vector");
//! assert_eq!(ctx.registration_count(), 1);
//! # Ok(())
//! # }
//! ```

mod compiler;

use crate::backend::{ContextId, ExecutionContext, ModuleHandle, ProgramId};
use crate::error::{BackendError, Result};
use crate::program_cache::ModuleCache;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;
use vexel_codegen::DeviceProfile;

/// A program accepted by a [`HostContext`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProgram {
    pub id: ProgramId,
    pub name: String,
    pub source: String,
    pub entry_points: Vec<String>,
}

#[derive(Debug)]
pub struct HostContext {
    id: ContextId,
    device: DeviceProfile,
    cache: ModuleCache,
    programs: RwLock<HashMap<String, Arc<HostProgram>>>,
    next_program: AtomicU64,
    registrations: AtomicUsize,
}

impl HostContext {
    pub fn new(device: DeviceProfile) -> Self {
        Self {
            id: ContextId::next(),
            device,
            cache: ModuleCache::new(),
            programs: RwLock::new(HashMap::new()),
            next_program: AtomicU64::new(1),
            registrations: AtomicUsize::new(0),
        }
    }

    pub fn program(&self, name: &str) -> Option<Arc<HostProgram>> {
        self.programs.read().get(name).cloned()
    }

    /// Registered program names, sorted
    pub fn program_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.programs.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Successful `register_module` calls so far
    pub fn registration_count(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }
}

impl ExecutionContext for HostContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn device(&self) -> &DeviceProfile {
        &self.device
    }

    fn register_module(&self, name: &str, source: &str) -> Result<ModuleHandle> {
        let entry_points = compiler::check_source(name, source, &self.device)?;

        let mut programs = self.programs.write();
        if programs.contains_key(name) {
            return Err(BackendError::DuplicateModule(name.to_string()));
        }

        let id = ProgramId::new(self.next_program.fetch_add(1, Ordering::Relaxed));
        debug!(
            context = %self.id,
            module = name,
            program = %id,
            entry_points = entry_points.len(),
            "registered program"
        );
        programs.insert(
            name.to_string(),
            Arc::new(HostProgram {
                id,
                name: name.to_string(),
                source: source.to_string(),
                entry_points,
            }),
        );
        self.registrations.fetch_add(1, Ordering::SeqCst);

        Ok(ModuleHandle::new(self.id, name, id))
    }

    fn module_cache(&self) -> &ModuleCache {
        &self.cache
    }
}
