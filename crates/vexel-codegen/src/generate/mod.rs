//! OpenCL C kernel text generation
//!
//! [`expand`] turns one statement (or one batch of reductions) plus a
//! resolved parameter record into the text of a single logical kernel.
//! Pointwise statements expand through the axpy template into one entry
//! point; reductions expand through the two-stage template into
//! `<name>_0` (per-group partials) and `<name>_1` (final combine).
//!
//! Every kernel takes the element count `unsigned int N` first. Vector
//! operands follow as `(pointer, start, stride)` triples, device scalars as
//! one-element pointers, host scalars by value. Output is a pure function
//! of the inputs.

mod axpy;
mod binding;
mod reduction;
mod writer;

pub use binding::BindingPolicy;

use crate::database::{AxpyParameters, FetchingPolicy, ReductionParameters, TemplateParameters};
use crate::error::{CodegenError, Result};
use crate::numeric::NumericType;
use crate::statement::{Statement, StatementBatch, StatementShape};
use vexel_tracing::performance::record_kernel_generated;
use writer::SourceWriter;

/// What [`expand`] generates from.
#[derive(Debug, Clone, Copy)]
pub enum GeneratorInput<'a> {
    Single(&'a Statement),
    Batch(&'a StatementBatch),
}

impl<'a> From<&'a Statement> for GeneratorInput<'a> {
    fn from(statement: &'a Statement) -> Self {
        GeneratorInput::Single(statement)
    }
}

impl<'a> From<&'a StatementBatch> for GeneratorInput<'a> {
    fn from(batch: &'a StatementBatch) -> Self {
        GeneratorInput::Batch(batch)
    }
}

/// Text of one logical kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKernel {
    pub name: String,
    /// `__kernel` functions defined by `source`, in definition order.
    pub entry_points: Vec<String>,
    pub source: String,
}

/// Shape parameters shared by both templates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Layout {
    pub(crate) simd_width: u32,
    pub(crate) local_size: u32,
    pub(crate) num_groups: u32,
    pub(crate) fetching: FetchingPolicy,
}

impl From<AxpyParameters> for Layout {
    fn from(p: AxpyParameters) -> Self {
        Self {
            simd_width: p.simd_width,
            local_size: p.local_size,
            num_groups: p.num_groups,
            fetching: p.fetching,
        }
    }
}

impl From<ReductionParameters> for Layout {
    fn from(p: ReductionParameters) -> Self {
        Self {
            simd_width: p.simd_width,
            local_size: p.local_size,
            num_groups: p.num_groups,
            fetching: p.fetching,
        }
    }
}

/// Expand `input` with `params` into kernel source.
///
/// Fails with [`CodegenError::TemplateMismatch`] when the parameter kind
/// does not fit the statement shape, and with
/// [`CodegenError::MixedNumericTypes`] when operands disagree on type.
pub fn expand<'a>(
    params: &TemplateParameters,
    input: impl Into<GeneratorInput<'a>>,
    policy: BindingPolicy,
) -> Result<GeneratedKernel> {
    let (name, statements) = match input.into() {
        GeneratorInput::Single(statement) => (statement.kernel_name(), std::slice::from_ref(statement)),
        GeneratorInput::Batch(batch) => (batch.kernel_name(), batch.statements()),
    };
    let first = statements.first().ok_or(CodegenError::EmptyBatch)?;
    let numeric = common_numeric(statements)?;
    let shape = first.shape();

    let kernel = match (params, shape) {
        (TemplateParameters::Axpy(p), StatementShape::Pointwise) => {
            p.validate()?;
            axpy::generate(&name, first, numeric, Layout::from(*p), policy)
        }
        (TemplateParameters::Reduction(p), StatementShape::Reduction(op)) => {
            p.validate()?;
            reduction::generate(&name, op, statements, numeric, Layout::from(*p), policy)?
        }
        _ => {
            return Err(CodegenError::TemplateMismatch {
                kind: params.kind(),
                shape,
            })
        }
    };

    record_kernel_generated(&kernel.name, kernel.entry_points.len(), kernel.source.len());
    Ok(kernel)
}

fn common_numeric(statements: &[Statement]) -> Result<NumericType> {
    let mut common: Option<NumericType> = None;
    for statement in statements {
        let numeric = statement.numeric()?;
        match common {
            Some(first) if first != numeric => {
                return Err(CodegenError::MixedNumericTypes { first, second: numeric });
            }
            _ => common = Some(numeric),
        }
    }
    common.ok_or(CodegenError::EmptyBatch)
}

fn describe(w: &mut SourceWriter, name: &str, layout: Layout) {
    let fetching = match layout.fetching {
        FetchingPolicy::GlobalStrided => "global_strided",
        FetchingPolicy::GlobalContiguous => "global_contiguous",
    };
    w.line(format!(
        "// {name}: simd_width={} local_size={} num_groups={} fetching={fetching}",
        layout.simd_width, layout.local_size, layout.num_groups
    ));
}

fn open_kernel(w: &mut SourceWriter, layout: Layout, entry: &str, params: &str) {
    w.line(format!(
        "__kernel __attribute__((reqd_work_group_size({}, 1, 1)))",
        layout.local_size
    ));
    w.open(format!("void {entry}({params})"));
}

/// Open the main loop binding `i` over `[0, count)`.
fn open_main_loop(w: &mut SourceWriter, fetching: FetchingPolicy, count: &str) {
    match fetching {
        FetchingPolicy::GlobalStrided => {
            w.open(format!(
                "for (unsigned int i = get_global_id(0); i < {count}; i += get_global_size(0))"
            ));
        }
        FetchingPolicy::GlobalContiguous => {
            w.line(format!(
                "const unsigned int chunk = ({count} + get_global_size(0) - 1) / get_global_size(0);"
            ));
            w.line("const unsigned int begin = get_global_id(0) * chunk;");
            w.line(format!("const unsigned int end = min(begin + chunk, {count});"));
            w.open("for (unsigned int i = begin; i < end; ++i)");
        }
    }
}

/// Open the scalar loop over the elements a packed loop of `width` left over.
fn open_tail_loop(w: &mut SourceWriter, width: u32) {
    w.open(format!(
        "for (unsigned int i = N / {width} * {width} + get_global_id(0); i < N; i += get_global_size(0))"
    ));
}

/// Emit the element loop of a kernel.
///
/// With `simd_width > 1` the packed main loop plus scalar tail runs only
/// when `unit_stride` holds for the launch; any strided operand takes the
/// plain scalar loop over `[0, N)` instead.
fn emit_element_loops(
    w: &mut SourceWriter,
    layout: Layout,
    unit_stride: Option<String>,
    packed: impl FnOnce(&mut SourceWriter),
    scalar: impl Fn(&mut SourceWriter),
) {
    let width = layout.simd_width;
    match unit_stride {
        Some(guard) if width > 1 => {
            w.open(format!("if ({guard})"));
            open_main_loop(w, layout.fetching, &format!("N / {width}"));
            packed(w);
            w.close();
            open_tail_loop(w, width);
            scalar(w);
            w.close();
            w.close();
            w.open("else");
            open_main_loop(w, layout.fetching, "N");
            scalar(w);
            w.close();
            w.close();
        }
        _ => {
            open_main_loop(w, layout.fetching, "N");
            scalar(w);
            w.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DeviceKind, DeviceProfile, TemplateKind, TuningDatabase, Vendor};
    use crate::placeholder::Placeholders;
    use crate::preset;
    use crate::statement::{AssignKind, ReductionOp, ScalarFlags};

    fn params(kind: TemplateKind, numeric: NumericType) -> TemplateParameters {
        let db = TuningDatabase::builtin();
        let device = DeviceProfile::new(Vendor::Unknown, DeviceKind::Gpu, "", "generic");
        db.for_device(&device).resolve(kind, numeric).unwrap()
    }

    #[test]
    fn test_pointwise_single_entry_point() {
        let mut ph = Placeholders::new();
        let (x, y) = (ph.vector::<f32>(), ph.vector::<f32>());
        let kernel = expand(
            &params(TemplateKind::Axpy, NumericType::Float),
            &preset::swap(x, y),
            BindingPolicy::Shared,
        )
        .unwrap();

        assert_eq!(kernel.name, "swap");
        assert_eq!(kernel.entry_points, vec!["swap"]);
        assert!(kernel.source.contains("void swap(unsigned int N, __global float* arg0"));
    }

    #[test]
    fn test_reduction_has_two_stages() {
        let mut ph = Placeholders::new();
        let (s, x) = (ph.device_scalar::<f32>(), ph.vector::<f32>());
        let kernel = expand(
            &params(TemplateKind::Reduction, NumericType::Float),
            &preset::norm_2(s, x),
            BindingPolicy::Shared,
        )
        .unwrap();

        assert_eq!(kernel.entry_points, vec!["norm_2_0", "norm_2_1"]);
        assert!(kernel.source.contains("sqrt("));
    }

    #[test]
    fn test_template_mismatch_rejected() {
        let mut ph = Placeholders::new();
        let (s, x) = (ph.device_scalar::<f32>(), ph.vector::<f32>());

        let err = expand(
            &params(TemplateKind::Axpy, NumericType::Float),
            &preset::sum(s, x),
            BindingPolicy::Shared,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CodegenError::TemplateMismatch {
                kind: TemplateKind::Axpy,
                shape: StatementShape::Reduction(ReductionOp::Sum),
            }
        ));
    }

    #[test]
    fn test_mixed_types_across_batch_rejected() {
        let mut ph = Placeholders::new();
        let (sf, xf) = (ph.device_scalar::<f32>(), ph.vector::<f32>());
        let (sd, xd) = (ph.device_scalar::<f64>(), ph.vector::<f64>());
        let batch = StatementBatch::new(vec![preset::sum(sf, xf), preset::sum(sd, xd)]).unwrap();

        let err = expand(
            &params(TemplateKind::Reduction, NumericType::Float),
            &batch,
            BindingPolicy::Shared,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CodegenError::MixedNumericTypes {
                first: NumericType::Float,
                second: NumericType::Double,
            }
        ));
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let mut ph = Placeholders::new();
        let (x, y, z) = (ph.vector::<f64>(), ph.vector::<f64>(), ph.vector::<f64>());
        let (a, b) = (ph.device_scalar::<f64>(), ph.device_scalar::<f64>());
        let stmt = preset::axpby(
            AssignKind::InplaceAdd,
            x,
            preset::Term::new(y, a, ScalarFlags::new(true, true)),
            Some(preset::Term::new(z, b, ScalarFlags::NONE)),
        );
        let p = params(TemplateKind::Axpy, NumericType::Double);

        let first = expand(&p, &stmt, BindingPolicy::Shared).unwrap();
        let second = expand(&p, &stmt, BindingPolicy::Shared).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_binding_policy_changes_signature() {
        let mut ph = Placeholders::new();
        let (s, x) = (ph.device_scalar::<f32>(), ph.vector::<f32>());
        let stmt = preset::inner_prod(s, x, x);
        let p = params(TemplateKind::Reduction, NumericType::Float);

        let shared = expand(&p, &stmt, BindingPolicy::Shared).unwrap();
        let unique = expand(&p, &stmt, BindingPolicy::BindAllUnique).unwrap();
        assert!(!shared.source.contains("arg2"));
        assert!(unique.source.contains("__global const float* arg2"));
    }
}
