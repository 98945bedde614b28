//! Test contexts shared by the integration suites

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use vexel_backends::{BackendError, ContextId, ExecutionContext, HostContext, ModuleCache, ModuleHandle, Result};
use vexel_codegen::database::{DeviceKind, DeviceProfile, Vendor};

pub fn gpu_with_fp64() -> DeviceProfile {
    DeviceProfile::new(Vendor::Nvidia, DeviceKind::Gpu, "ampere", "a100").with_double_extension("cl_khr_fp64")
}

pub fn gpu_without_fp64() -> DeviceProfile {
    DeviceProfile::new(Vendor::Intel, DeviceKind::Gpu, "xe-lp", "iris")
}

/// Context whose compiler rejects the first `failures` registrations.
pub struct FlakyContext {
    pub inner: HostContext,
    failures: AtomicUsize,
    pub attempts: AtomicUsize,
}

impl FlakyContext {
    pub fn new(device: DeviceProfile, failures: usize) -> Self {
        Self {
            inner: HostContext::new(device),
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ExecutionContext for FlakyContext {
    fn id(&self) -> ContextId {
        self.inner.id()
    }

    fn device(&self) -> &DeviceProfile {
        self.inner.device()
    }

    fn register_module(&self, name: &str, source: &str) -> Result<ModuleHandle> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(BackendError::compilation(name, "injected compiler failure"));
        }
        self.inner.register_module(name, source)
    }

    fn module_cache(&self) -> &ModuleCache {
        self.inner.module_cache()
    }
}

/// Context whose compiler takes `delay` per registration.
pub struct SlowContext {
    pub inner: HostContext,
    delay: Duration,
}

impl SlowContext {
    pub fn new(device: DeviceProfile, delay: Duration) -> Self {
        Self {
            inner: HostContext::new(device),
            delay,
        }
    }
}

impl ExecutionContext for SlowContext {
    fn id(&self) -> ContextId {
        self.inner.id()
    }

    fn device(&self) -> &DeviceProfile {
        self.inner.device()
    }

    fn register_module(&self, name: &str, source: &str) -> Result<ModuleHandle> {
        thread::sleep(self.delay);
        self.inner.register_module(name, source)
    }

    fn module_cache(&self) -> &ModuleCache {
        self.inner.module_cache()
    }
}
