//! Identity and handle types for execution contexts

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an execution context
///
/// Ids come from a monotonically increasing counter and are never reused,
/// so a destroyed context can never alias a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the internal ID
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

/// Context-assigned id of a compiled program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u64);

impl ProgramId {
    pub const fn new(id: u64) -> Self {
        ProgramId(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prog{}", self.0)
    }
}

/// A module registered with a context
///
/// Cheap to clone; every call that finds the module already built returns
/// a handle equal to the one the build produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleHandle {
    context: ContextId,
    name: Arc<str>,
    program: ProgramId,
}

impl ModuleHandle {
    pub fn new(context: ContextId, name: impl Into<Arc<str>>, program: ProgramId) -> Self {
        Self {
            context,
            name: name.into(),
            program,
        }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }
}

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.context, self.name)
    }
}
