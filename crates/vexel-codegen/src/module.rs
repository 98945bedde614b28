//! Module assembly: every kernel of one family and element type in one source
//!
//! The standard family (`<type>_vector`) holds 48 kernels, in this order:
//!
//! 1. axpby, for `assign` then `inplace_add`: 4 one-term and 16 two-term
//!    flag variants each (40)
//! 2. `plane_rotation`, `swap`, `assign_cpu`
//! 3. `inner_prod_1`
//! 4. `norm_1`, `norm_2`, `norm_inf`, `index_norm_inf`, `sum`
//!
//! The multi-inner-product family (`<type>_vector_multi`) holds
//! `inner_prod_2`, `inner_prod_3`, `inner_prod_4` and `inner_prod_8`.

use crate::database::{DeviceProfile, TemplateKind, TemplateParameters, TuningDatabase};
use crate::error::{CodegenError, Result};
use crate::generate::{expand, BindingPolicy};
use crate::numeric::{Numeric, NumericType};
use crate::placeholder::Placeholders;
use crate::preset;
use crate::statement::{Statement, StatementBatch};
use crate::variant::{axpby_family, AxpbyOperands};
use std::fmt;
use tracing::debug;

/// Batch arities of the multi-inner-product family.
pub const MULTI_INNER_PROD_ARITIES: [usize; 4] = [2, 3, 4, 8];

const SOURCE_RESERVE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleFamily {
    /// Pointwise operations, rotations, single inner product and norms.
    Vector,
    /// Batched inner products.
    VectorMultiInnerProd,
}

impl ModuleFamily {
    pub const ALL: [ModuleFamily; 2] = [ModuleFamily::Vector, ModuleFamily::VectorMultiInnerProd];

    pub const fn suffix(self) -> &'static str {
        match self {
            ModuleFamily::Vector => "vector",
            ModuleFamily::VectorMultiInnerProd => "vector_multi",
        }
    }

    /// `<type>_vector` or `<type>_vector_multi`.
    pub fn module_name(self, numeric: NumericType) -> String {
        format!("{}_{}", numeric.type_name(), self.suffix())
    }
}

impl fmt::Display for ModuleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelInfo {
    pub name: String,
    pub entry_points: Vec<String>,
}

/// Concatenated source of one module, ready for registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    pub name: String,
    pub family: ModuleFamily,
    pub numeric: NumericType,
    pub source: String,
    /// Logical kernels in source order.
    pub kernels: Vec<KernelInfo>,
}

impl GeneratedModule {
    pub fn kernel_count(&self) -> usize {
        self.kernels.len()
    }

    pub fn kernel(&self, name: &str) -> Option<&KernelInfo> {
        self.kernels.iter().find(|k| k.name == name)
    }

    /// Every `__kernel` function in the module, in source order.
    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.kernels.iter().flat_map(|k| k.entry_points.iter().map(String::as_str))
    }
}

/// One unit of generation work with the parameters it expands under.
enum Job {
    Single(Statement, TemplateParameters, BindingPolicy),
    Batch(StatementBatch, TemplateParameters, BindingPolicy),
}

fn vector_jobs<T: Numeric>(axpy: TemplateParameters, reduction: TemplateParameters) -> Result<Vec<Job>> {
    let mut ph = Placeholders::new();
    let (x, y, z) = (ph.vector::<T>(), ph.vector::<T>(), ph.vector::<T>());
    let (a, b) = (ph.device_scalar::<T>(), ph.device_scalar::<T>());
    let (alpha, beta) = (ph.host_scalar::<T>(), ph.host_scalar::<T>());
    let value = ph.host_scalar::<T>();
    let result = ph.device_scalar::<T>();

    let patterns = [
        AxpbyOperands { x, y, a, second: None },
        AxpbyOperands {
            x,
            y,
            a,
            second: Some((z, b)),
        },
    ];

    let mut jobs: Vec<Job> = axpby_family(&patterns)
        .into_iter()
        .map(|s| Job::Single(s, axpy, BindingPolicy::BindAllUnique))
        .collect();

    for statement in [
        preset::plane_rotation(x, y, alpha, beta),
        preset::swap(x, y),
        preset::assign_cpu(x, value),
    ] {
        jobs.push(Job::Single(statement, axpy, BindingPolicy::Shared));
    }

    jobs.push(Job::Batch(
        StatementBatch::inner_products(1, result, x, y)?,
        reduction,
        BindingPolicy::BindAllUnique,
    ));

    for statement in [
        preset::norm_1(result, x),
        preset::norm_2(result, x),
        preset::norm_inf(result, x),
        preset::index_norm_inf(result, x),
        preset::sum(result, x),
    ] {
        jobs.push(Job::Single(statement, reduction, BindingPolicy::Shared));
    }

    Ok(jobs)
}

fn multi_inner_prod_jobs<T: Numeric>(reduction: TemplateParameters) -> Result<Vec<Job>> {
    let mut ph = Placeholders::new();
    let (x, y) = (ph.vector::<T>(), ph.vector::<T>());
    let result = ph.device_scalar::<T>();

    MULTI_INNER_PROD_ARITIES
        .into_iter()
        .map(|arity| {
            Ok(Job::Batch(
                StatementBatch::inner_products(arity, result, x, y)?,
                reduction,
                BindingPolicy::BindAllUnique,
            ))
        })
        .collect()
}

/// Call `$func::<T>(args)` with `T` the Rust type of a runtime [`NumericType`].
macro_rules! for_numeric {
    ($numeric:expr, $func:ident($($arg:expr),*)) => {
        match $numeric {
            NumericType::Char => $func::<i8>($($arg),*),
            NumericType::Uchar => $func::<u8>($($arg),*),
            NumericType::Short => $func::<i16>($($arg),*),
            NumericType::Ushort => $func::<u16>($($arg),*),
            NumericType::Int => $func::<i32>($($arg),*),
            NumericType::Uint => $func::<u32>($($arg),*),
            NumericType::Long => $func::<i64>($($arg),*),
            NumericType::Ulong => $func::<u64>($($arg),*),
            NumericType::Float => $func::<f32>($($arg),*),
            NumericType::Double => $func::<f64>($($arg),*),
        }
    };
}

/// Build the module of `family` for `numeric` on `device`.
///
/// Parameters for every template the family uses are resolved before any
/// text is generated, so an unsupported type fails without partial work.
/// A type that needs double precision fails with
/// [`CodegenError::DoublePrecisionUnsupported`] unless `device` names an
/// extension providing it.
pub fn build_module(
    family: ModuleFamily,
    numeric: NumericType,
    device: &DeviceProfile,
    db: &TuningDatabase,
) -> Result<GeneratedModule> {
    if numeric.requires_double_precision() && !device.supports_double_precision() {
        return Err(CodegenError::DoublePrecisionUnsupported {
            device: device.name.clone(),
            numeric,
        });
    }

    let tuning = db.for_device(device);
    let jobs = match family {
        ModuleFamily::Vector => {
            let axpy = tuning.resolve(TemplateKind::Axpy, numeric)?;
            let reduction = tuning.resolve(TemplateKind::Reduction, numeric)?;
            for_numeric!(numeric, vector_jobs(axpy, reduction))?
        }
        ModuleFamily::VectorMultiInnerProd => {
            let reduction = tuning.resolve(TemplateKind::Reduction, numeric)?;
            for_numeric!(numeric, multi_inner_prod_jobs(reduction))?
        }
    };

    let name = family.module_name(numeric);
    let mut source = String::with_capacity(SOURCE_RESERVE);
    if let Some(extension) = device.double_extension.as_ref().filter(|_| numeric.requires_double_precision()) {
        source.push_str(&format!("#pragma OPENCL EXTENSION {extension} : enable\n\n"));
    }

    let mut kernels = Vec::with_capacity(jobs.len());
    for job in &jobs {
        let kernel = match job {
            Job::Single(statement, params, policy) => expand(params, statement, *policy)?,
            Job::Batch(batch, params, policy) => expand(params, batch, *policy)?,
        };
        debug!(module = %name, kernel = %kernel.name, bytes = kernel.source.len(), "generated kernel");
        source.push_str(&kernel.source);
        kernels.push(KernelInfo {
            name: kernel.name,
            entry_points: kernel.entry_points,
        });
    }

    Ok(GeneratedModule {
        name,
        family,
        numeric,
        source,
        kernels,
    })
}

/// The standard `<type>_vector` module.
pub fn vector_module(numeric: NumericType, device: &DeviceProfile, db: &TuningDatabase) -> Result<GeneratedModule> {
    build_module(ModuleFamily::Vector, numeric, device, db)
}

/// The `<type>_vector_multi` module of batched inner products.
pub fn vector_multi_inner_prod_module(
    numeric: NumericType,
    device: &DeviceProfile,
    db: &TuningDatabase,
) -> Result<GeneratedModule> {
    build_module(ModuleFamily::VectorMultiInnerProd, numeric, device, db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DeviceKind, Vendor};
    use std::collections::HashSet;

    fn device() -> DeviceProfile {
        DeviceProfile::new(Vendor::Nvidia, DeviceKind::Gpu, "ampere", "test").with_double_extension("cl_khr_fp64")
    }

    #[test]
    fn test_float_vector_has_48_kernels_in_order() {
        let module = vector_module(NumericType::Float, &device(), &TuningDatabase::builtin()).unwrap();
        assert_eq!(module.name, "float_vector");
        assert_eq!(module.kernel_count(), 48);

        let names: Vec<&str> = module.kernels.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names[0], "assign_av_a00");
        assert_eq!(names[39], "inplace_add_avbv_a11_b11");
        assert_eq!(
            &names[40..],
            &[
                "plane_rotation",
                "swap",
                "assign_cpu",
                "inner_prod_1",
                "norm_1",
                "norm_2",
                "norm_inf",
                "index_norm_inf",
                "sum"
            ]
        );
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), 48);
    }

    #[test]
    fn test_every_entry_point_is_defined_once() {
        let module = vector_module(NumericType::Float, &device(), &TuningDatabase::builtin()).unwrap();
        for entry in module.entry_points() {
            let needle = format!("void {entry}(");
            assert_eq!(module.source.matches(&needle).count(), 1, "{entry}");
        }
        assert_eq!(module.entry_points().count(), 40 + 3 + 2 * 6);
    }

    #[test]
    fn test_double_source_starts_with_pragma() {
        let module = vector_module(NumericType::Double, &device(), &TuningDatabase::builtin()).unwrap();
        assert!(module.source.starts_with("#pragma OPENCL EXTENSION cl_khr_fp64 : enable\n"));

        let float = vector_module(NumericType::Float, &device(), &TuningDatabase::builtin()).unwrap();
        assert!(!float.source.contains("#pragma"));
    }

    #[test]
    fn test_double_without_extension_is_rejected() {
        let iris = DeviceProfile::new(Vendor::Intel, DeviceKind::Gpu, "xe", "iris");
        for family in ModuleFamily::ALL {
            let err = build_module(family, NumericType::Double, &iris, &TuningDatabase::builtin()).unwrap_err();
            assert!(matches!(
                err,
                CodegenError::DoublePrecisionUnsupported {
                    ref device,
                    numeric: NumericType::Double,
                } if device == "iris"
            ));
        }
        assert!(vector_module(NumericType::Float, &iris, &TuningDatabase::builtin()).is_ok());
    }

    #[test]
    fn test_packed_kernels_fall_back_for_strided_vectors() {
        let module = vector_module(NumericType::Float, &device(), &TuningDatabase::builtin()).unwrap();
        let start = module.source.find("void assign_av_a00(").unwrap();
        let end = start + module.source[start..].find("__kernel").unwrap();
        let kernel = &module.source[start..end];

        assert!(kernel.contains("if (arg0_stride == 1 && arg1_stride == 1)"));
        assert!(kernel.contains("vstore4(vload4(i, arg1 + arg1_start) * arg2_value, i, arg0 + arg0_start);"));
        let fallback = &kernel[kernel.find("else").unwrap()..];
        assert!(!fallback.contains("vload4"));
        assert!(fallback.contains("arg0[arg0_start + (i) * arg0_stride] = arg1[arg1_start + (i) * arg1_stride] * arg2_value;"));
    }

    #[test]
    fn test_multi_module_arities() {
        let module =
            vector_multi_inner_prod_module(NumericType::Float, &device(), &TuningDatabase::builtin()).unwrap();
        assert_eq!(module.name, "float_vector_multi");
        let names: Vec<&str> = module.kernels.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["inner_prod_2", "inner_prod_3", "inner_prod_4", "inner_prod_8"]);
        assert!(module.source.contains("partials[7 * get_num_groups(0) + get_group_id(0)]"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let db = TuningDatabase::builtin();
        let a = vector_module(NumericType::Double, &device(), &db).unwrap();
        let b = vector_module(NumericType::Double, &device(), &db).unwrap();
        assert_eq!(a.source, b.source);
    }

    #[test]
    fn test_untuned_type_fails_before_generation() {
        let err = vector_module(NumericType::Int, &device(), &TuningDatabase::builtin()).unwrap_err();
        assert!(matches!(
            err,
            CodegenError::UnsupportedNumericType {
                numeric: NumericType::Int,
                ..
            }
        ));
    }

    #[test]
    fn test_family_names() {
        assert_eq!(ModuleFamily::Vector.module_name(NumericType::Uint), "uint_vector");
        assert_eq!(
            ModuleFamily::VectorMultiInnerProd.module_name(NumericType::Double),
            "double_vector_multi"
        );
    }
}
