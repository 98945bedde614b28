//! Per-context module cache
//!
//! Each execution context owns one [`ModuleCache`]. It holds one slot per
//! (module family, numeric type); a slot is empty until the module has been
//! registered successfully, and then holds the module's handle.
//!
//! # Locking
//!
//! - The slot map sits behind a `parking_lot::RwLock` that is held only long
//!   enough to find or create a slot.
//! - Each slot has its own `parking_lot::Mutex`, held for the whole build.
//!   First-time callers for the same key serialize on it; callers for other
//!   keys or other contexts never wait on each other.
//!
//! A failed build leaves the slot empty, so the next call builds again.

use crate::backend::ModuleHandle;
use crate::error::Result;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use vexel_codegen::{ModuleFamily, NumericType};

/// Cache key: one module per family and element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey {
    pub family: ModuleFamily,
    pub numeric: NumericType,
}

impl ModuleKey {
    pub const fn new(family: ModuleFamily, numeric: NumericType) -> Self {
        Self { family, numeric }
    }

    /// Registered program name, e.g. `float_vector`
    pub fn name(&self) -> String {
        self.family.module_name(self.numeric)
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.numeric, self.family)
    }
}

type Slot = Arc<Mutex<Option<ModuleHandle>>>;

#[derive(Debug, Default)]
pub struct ModuleCache {
    slots: RwLock<HashMap<ModuleKey, Slot>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: ModuleKey) -> Slot {
        // Fast path: read lock for lookup
        if let Some(slot) = self.slots.read().get(&key) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(key).or_default())
    }

    fn existing_slot(&self, key: ModuleKey) -> Option<Slot> {
        self.slots.read().get(&key).cloned()
    }

    /// Return the handle for `key`, running `init` if it is not built yet
    ///
    /// `init` runs with the slot locked. Its result is stored only when it
    /// is `Ok`; an error propagates unchanged and leaves the slot empty.
    pub fn get_or_try_init<F>(&self, key: ModuleKey, init: F) -> Result<ModuleHandle>
    where
        F: FnOnce() -> Result<ModuleHandle>,
    {
        let slot = self.slot(key);
        let mut guard = slot.lock();
        if let Some(handle) = guard.as_ref() {
            return Ok(handle.clone());
        }

        let handle = init()?;
        *guard = Some(handle.clone());
        Ok(handle)
    }

    /// Handle of a built module; waits if the module is being built.
    pub fn get(&self, key: ModuleKey) -> Option<ModuleHandle> {
        let slot = self.existing_slot(key)?;
        let handle = slot.lock().clone();
        handle
    }

    pub fn is_initialized(&self, key: ModuleKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of built modules
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.read().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ContextId, ProgramId};
    use crate::error::BackendError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    const FLOAT_VECTOR: ModuleKey = ModuleKey::new(ModuleFamily::Vector, NumericType::Float);
    const FLOAT_MULTI: ModuleKey = ModuleKey::new(ModuleFamily::VectorMultiInnerProd, NumericType::Float);

    fn handle(key: ModuleKey, program: u64) -> ModuleHandle {
        ModuleHandle::new(ContextId::next(), key.name(), ProgramId::new(program))
    }

    #[test]
    fn test_init_runs_once() {
        let cache = ModuleCache::new();
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_try_init(FLOAT_VECTOR, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(handle(FLOAT_VECTOR, 1))
            })
            .unwrap();
        let second = cache
            .get_or_try_init(FLOAT_VECTOR, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(handle(FLOAT_VECTOR, 2))
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_leaves_slot_empty() {
        let cache = ModuleCache::new();

        let err = cache
            .get_or_try_init(FLOAT_VECTOR, || Err(BackendError::compilation("float_vector", "boom")))
            .unwrap_err();
        assert!(matches!(err, BackendError::Compilation { .. }));
        assert!(!cache.is_initialized(FLOAT_VECTOR));
        assert!(cache.is_empty());

        cache.get_or_try_init(FLOAT_VECTOR, || Ok(handle(FLOAT_VECTOR, 7))).unwrap();
        assert_eq!(cache.get(FLOAT_VECTOR).map(|h| h.program()), Some(ProgramId::new(7)));
    }

    #[test]
    fn test_keys_are_independent() {
        let cache = ModuleCache::new();
        cache.get_or_try_init(FLOAT_VECTOR, || Ok(handle(FLOAT_VECTOR, 1))).unwrap();

        assert!(cache.is_initialized(FLOAT_VECTOR));
        assert!(!cache.is_initialized(FLOAT_MULTI));
        assert!(cache.get(FLOAT_MULTI).is_none());
    }

    #[test]
    fn test_concurrent_init_serializes() {
        let cache = Arc::new(ModuleCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache
                        .get_or_try_init(FLOAT_VECTOR, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(handle(FLOAT_VECTOR, 1))
                        })
                        .unwrap()
                })
            })
            .collect();

        let handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handles.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn test_other_key_not_blocked_by_build() {
        let cache = Arc::new(ModuleCache::new());
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let builder = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                cache
                    .get_or_try_init(FLOAT_VECTOR, || {
                        started_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok(handle(FLOAT_VECTOR, 1))
                    })
                    .unwrap();
            })
        };

        started_rx.recv().unwrap();
        // FLOAT_VECTOR is mid-build; FLOAT_MULTI must still go through.
        cache.get_or_try_init(FLOAT_MULTI, || Ok(handle(FLOAT_MULTI, 2))).unwrap();
        assert!(cache.is_initialized(FLOAT_MULTI));

        release_tx.send(()).unwrap();
        builder.join().unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_key_name() {
        assert_eq!(FLOAT_VECTOR.name(), "float_vector");
        assert_eq!(FLOAT_MULTI.to_string(), "float_vector_multi");
    }
}
