//! Module builder: generate, register and memoize kernel modules per context
//!
//! [`ensure_module_ready`] is the one entry point dispatch code calls before
//! launching a kernel. The first call for a (context, family, numeric type)
//! builds the module and registers it; every later call returns the cached
//! handle without generating anything.
//!
//! # Build sequence
//!
//! ```text
//! 1. double-precision capability check   (no cache access on failure)
//! 2. lock the (family, type) slot of ctx.module_cache()
//! 3. slot filled?  -> return its handle
//! 4. resolve template parameters, generate every kernel, concatenate
//! 5. ctx.register_module(name, source)
//! 6. fill the slot                        (only if 5 succeeded)
//! ```
//!
//! # Example
//!
//! ```rust
//! use vexel_backends::{HostContext, VectorModule, VectorMultiInnerProdModule};
//! use vexel_codegen::database::{DeviceKind, DeviceProfile, Vendor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let device = DeviceProfile::new(Vendor::Amd, DeviceKind::Gpu, "gfx90a", "mi210")
//!     .with_double_extension("cl_khr_fp64");
//! let ctx = HostContext::new(device);
//!
//! let handle = VectorMultiInnerProdModule::<f64>::init(&ctx)?;
//! assert_eq!(handle.name(), VectorMultiInnerProdModule::<f64>::program_name());
//! assert_eq!(VectorModule::<f32>::program_name(), "float_vector");
//! # Ok(())
//! # }
//! ```

use crate::backend::{ExecutionContext, ModuleHandle};
use crate::config::{build_options, tuning_database};
use crate::error::{BackendError, Result};
use crate::program_cache::ModuleKey;
use std::marker::PhantomData;
use tracing::{debug, info};
use vexel_codegen::{build_module, ModuleFamily, Numeric, NumericType, TuningDatabase};
use vexel_tracing::{perf_span, timed_block};
use vexel_tracing::performance::record_module_build;

/// Build and register the module for `(family, numeric)` unless `ctx` has it
///
/// Uses the process tuning database (see [`crate::config`]).
pub fn ensure_module_ready<C>(ctx: &C, family: ModuleFamily, numeric: NumericType) -> Result<ModuleHandle>
where
    C: ExecutionContext + ?Sized,
{
    ensure_module_ready_with(ctx, family, numeric, tuning_database())
}

/// [`ensure_module_ready`] against an explicit tuning database
pub fn ensure_module_ready_with<C>(
    ctx: &C,
    family: ModuleFamily,
    numeric: NumericType,
    db: &TuningDatabase,
) -> Result<ModuleHandle>
where
    C: ExecutionContext + ?Sized,
{
    let device = ctx.device();
    if numeric.requires_double_precision() && !device.supports_double_precision() {
        return Err(BackendError::DoublePrecisionUnsupported {
            device: device.name.clone(),
            numeric,
        });
    }

    let key = ModuleKey::new(family, numeric);
    ctx.module_cache().get_or_try_init(key, || build_and_register(ctx, key, db))
}

fn build_and_register<C>(ctx: &C, key: ModuleKey, db: &TuningDatabase) -> Result<ModuleHandle>
where
    C: ExecutionContext + ?Sized,
{
    let name = key.name();
    let span = perf_span!(name.as_str(), context = ctx.id().id());

    let module = build_module(key.family, key.numeric, ctx.device(), db)?;

    info!(
        module = %module.name,
        context = %ctx.id(),
        kernels = module.kernel_count(),
        source_bytes = module.source.len(),
        "creating program"
    );
    if build_options().build_info {
        info!(module = %module.name, source = %module.source, "generated source");
    }

    let (handle, register_us) = timed_block!("register_module", { ctx.register_module(&module.name, &module.source) });
    let handle = handle?;
    debug!(module = %module.name, register_us, "program registered");
    record_module_build(&module.name, module.kernel_count(), module.source.len(), span.elapsed_us());
    Ok(handle)
}

/// The standard vector module for element type `T`
#[derive(Debug)]
pub struct VectorModule<T>(PhantomData<T>);

impl<T: Numeric> VectorModule<T> {
    pub const FAMILY: ModuleFamily = ModuleFamily::Vector;

    /// `<type>_vector`
    pub fn program_name() -> String {
        Self::FAMILY.module_name(T::TYPE)
    }

    pub fn init<C: ExecutionContext + ?Sized>(ctx: &C) -> Result<ModuleHandle> {
        ensure_module_ready(ctx, Self::FAMILY, T::TYPE)
    }
}

/// The multi-inner-product module for element type `T`
#[derive(Debug)]
pub struct VectorMultiInnerProdModule<T>(PhantomData<T>);

impl<T: Numeric> VectorMultiInnerProdModule<T> {
    pub const FAMILY: ModuleFamily = ModuleFamily::VectorMultiInnerProd;

    /// `<type>_vector_multi`
    pub fn program_name() -> String {
        Self::FAMILY.module_name(T::TYPE)
    }

    pub fn init<C: ExecutionContext + ?Sized>(ctx: &C) -> Result<ModuleHandle> {
        ensure_module_ready(ctx, Self::FAMILY, T::TYPE)
    }
}
