//! Two-stage reduction template
//!
//! Stage 0 (`<name>_0`) runs the configured number of groups. Each
//! work-item accumulates its share of the vector, each group tree-reduces
//! in local memory and writes one partial per batch member to
//! `partials[k * num_groups + group]`. Stage 1 (`<name>_1`) runs as a single
//! group over those partials and writes the final scalars. The host passes
//! the stage-0 group count as `num_partials`.
//!
//! Index reductions carry a position next to every value. Ties resolve to
//! the smaller position, so the result is the first index attaining the
//! maximum.

use super::binding::{lane_type, Access, Binder, BindingPolicy};
use super::writer::SourceWriter;
use super::{describe, emit_element_loops, open_kernel, GeneratedKernel, Layout};
use crate::error::{CodegenError, Result};
use crate::numeric::NumericType;
use crate::placeholder::{OperandKind, Residency};
use crate::statement::{Node, ReductionOp, Statement};

/// One batch member with its operands bound.
struct Member {
    result: usize,
    inputs: Vec<usize>,
}

fn abs(numeric: NumericType, e: &str) -> String {
    if numeric.is_float() {
        format!("fabs({e})")
    } else if numeric.is_signed() {
        format!("({})abs({e})", numeric.type_name())
    } else {
        e.to_string()
    }
}

fn max(numeric: NumericType, a: &str, b: &str) -> String {
    if numeric.is_float() {
        format!("fmax({a}, {b})")
    } else {
        format!("max({a}, {b})")
    }
}

fn finalize(op: ReductionOp, numeric: NumericType, e: &str) -> String {
    match op {
        ReductionOp::Norm2 if numeric.is_float() => format!("sqrt({e})"),
        ReductionOp::Norm2 => format!("({})sqrt((float)({e}))", numeric.type_name()),
        _ => e.to_string(),
    }
}

/// Fold element expressions `elems` (at position `index`) into member `k`.
fn accumulate(w: &mut SourceWriter, op: ReductionOp, numeric: NumericType, k: usize, elems: &[String], index: &str) {
    let acc = format!("acc{k}");
    let e0 = &elems[0];
    match op {
        ReductionOp::InnerProd => w.line(format!("{acc} += {e0} * {};", elems[1])),
        ReductionOp::Norm1 => w.line(format!("{acc} += {};", abs(numeric, e0))),
        ReductionOp::Norm2 => w.line(format!("{acc} += {e0} * {e0};")),
        ReductionOp::NormInf => w.line(format!("{acc} = {};", max(numeric, &acc, &abs(numeric, e0)))),
        ReductionOp::Sum => w.line(format!("{acc} += {e0};")),
        ReductionOp::IndexNormInf => {
            let magnitude = abs(numeric, e0);
            w.open(format!("if ({magnitude} > {acc})"));
            w.line(format!("{acc} = {magnitude};"));
            w.line(format!("idx{k} = {index};"));
            w.close();
        }
    }
}

/// Merge a candidate (`value`, `position`) into member `k`'s accumulator.
fn merge(w: &mut SourceWriter, op: ReductionOp, numeric: NumericType, k: usize, value: &str, position: &str) {
    let acc = format!("acc{k}");
    match op {
        ReductionOp::NormInf => w.line(format!("{acc} = {};", max(numeric, &acc, value))),
        ReductionOp::IndexNormInf => {
            w.open(format!(
                "if ({value} > {acc} || ({value} == {acc} && {position} < idx{k}))"
            ));
            w.line(format!("{acc} = {value};"));
            w.line(format!("idx{k} = {position};"));
            w.close();
        }
        _ => w.line(format!("{acc} += {value};")),
    }
}

fn declare_locals(w: &mut SourceWriter, op: ReductionOp, numeric: NumericType, members: usize, local_size: u32) {
    let ty = numeric.type_name();
    w.line("const unsigned int lid = get_local_id(0);");
    for k in 0..members {
        w.line(format!("__local {ty} buf{k}[{local_size}];"));
        if op.is_index() {
            w.line(format!("__local unsigned int ibuf{k}[{local_size}];"));
        }
    }
    for k in 0..members {
        w.line(format!("{ty} acc{k} = 0;"));
        if op.is_index() {
            w.line(format!("unsigned int idx{k} = 0;"));
        }
    }
}

/// Tree-reduce every member's accumulator into `buf{k}[0]`.
fn tree_reduce(w: &mut SourceWriter, op: ReductionOp, numeric: NumericType, members: usize, local_size: u32) {
    for k in 0..members {
        w.line(format!("buf{k}[lid] = acc{k};"));
        if op.is_index() {
            w.line(format!("ibuf{k}[lid] = idx{k};"));
        }
    }
    w.open(format!(
        "for (unsigned int stride = {}; stride > 0; stride /= 2)",
        local_size / 2
    ));
    w.line("barrier(CLK_LOCAL_MEM_FENCE);");
    w.open("if (lid < stride)");
    for k in 0..members {
        w.line(format!("acc{k} = buf{k}[lid];"));
        if op.is_index() {
            w.line(format!("idx{k} = ibuf{k}[lid];"));
        }
        merge(
            w,
            op,
            numeric,
            k,
            &format!("buf{k}[lid + stride]"),
            &format!("ibuf{k}[lid + stride]"),
        );
        w.line(format!("buf{k}[lid] = acc{k};"));
        if op.is_index() {
            w.line(format!("ibuf{k}[lid] = idx{k};"));
        }
    }
    w.close();
    w.close();
}

fn bind_members(
    name: &str,
    op: ReductionOp,
    statements: &[Statement],
    binder: &mut Binder,
) -> Result<Vec<Member>> {
    statements
        .iter()
        .map(|statement| {
            let lhs = statement.lhs();
            if lhs.kind != OperandKind::Scalar(Residency::Device) {
                return Err(CodegenError::HostScalarOutput {
                    kernel: name.to_string(),
                });
            }
            let result = binder.bind_result(lhs, op.is_index());
            let inputs = match statement.rhs() {
                Node::Reduction { operands, .. } => {
                    operands.iter().map(|&operand| binder.bind(operand, Access::Read)).collect()
                }
                _ => unreachable!("batch members share the reduction shape"),
            };
            Ok(Member { result, inputs })
        })
        .collect()
}

fn stage_0(w: &mut SourceWriter, name: &str, op: ReductionOp, numeric: NumericType, layout: Layout, binder: &Binder, members: &[Member]) {
    let ty = numeric.type_name();
    let inputs: Vec<usize> = members.iter().flat_map(|m| m.inputs.iter().copied()).collect();
    let mut signature = format!("unsigned int N, {}, __global {ty}* partials", binder.signature(&inputs));
    if op.is_index() {
        signature.push_str(", __global unsigned int* partial_indices");
    }

    open_kernel(w, layout, &format!("{name}_0"), &signature);
    declare_locals(w, op, numeric, members.len(), layout.local_size);

    let scalar_pass = |w: &mut SourceWriter| {
        for (k, member) in members.iter().enumerate() {
            let elems: Vec<String> = member.inputs.iter().map(|&s| binder.get(s).element("i")).collect();
            accumulate(w, op, numeric, k, &elems, "i");
        }
    };

    let width = layout.simd_width;
    let packed_pass = |w: &mut SourceWriter| {
        let packed = lane_type(numeric, width);
        let mut loaded: Vec<usize> = Vec::new();
        for &slot in &inputs {
            if !loaded.contains(&slot) {
                let binding = binder.get(slot);
                w.line(format!("const {packed} {}_v = {};", binding.name, binding.vload(width, "i")));
                loaded.push(slot);
            }
        }
        for lane in 0..width {
            for (k, member) in members.iter().enumerate() {
                let elems: Vec<String> = member
                    .inputs
                    .iter()
                    .map(|&s| format!("{}_v.s{lane:x}", binder.get(s).name))
                    .collect();
                accumulate(w, op, numeric, k, &elems, &format!("i * {width} + {lane}"));
            }
        }
    };

    emit_element_loops(w, layout, binder.unit_stride_guard(&inputs), packed_pass, scalar_pass);

    tree_reduce(w, op, numeric, members.len(), layout.local_size);

    w.open("if (lid == 0)");
    for k in 0..members.len() {
        w.line(format!("partials[{k} * get_num_groups(0) + get_group_id(0)] = buf{k}[0];"));
        if op.is_index() {
            w.line(format!(
                "partial_indices[{k} * get_num_groups(0) + get_group_id(0)] = ibuf{k}[0];"
            ));
        }
    }
    w.close();
    w.close();
    w.blank();
}

fn stage_1(w: &mut SourceWriter, name: &str, op: ReductionOp, numeric: NumericType, layout: Layout, binder: &Binder, members: &[Member]) {
    let ty = numeric.type_name();
    let results: Vec<usize> = members.iter().map(|m| m.result).collect();
    let mut signature = format!("unsigned int N, __global const {ty}* partials");
    if op.is_index() {
        signature.push_str(", __global const unsigned int* partial_indices");
    }
    signature.push_str(&format!(", unsigned int num_partials, {}", binder.signature(&results)));

    open_kernel(w, layout, &format!("{name}_1"), &signature);
    declare_locals(w, op, numeric, members.len(), layout.local_size);

    w.open(format!(
        "for (unsigned int i = lid; i < num_partials; i += {})",
        layout.local_size
    ));
    for k in 0..members.len() {
        merge(
            w,
            op,
            numeric,
            k,
            &format!("partials[{k} * num_partials + i]"),
            &format!("partial_indices[{k} * num_partials + i]"),
        );
    }
    w.close();

    tree_reduce(w, op, numeric, members.len(), layout.local_size);

    w.open("if (lid == 0)");
    for (k, member) in members.iter().enumerate() {
        let result = &binder.get(member.result).name;
        if op.is_index() {
            w.line(format!("{result}[0] = ibuf{k}[0];"));
        } else {
            w.line(format!("{result}[0] = {};", finalize(op, numeric, &format!("buf{k}[0]"))));
        }
    }
    w.close();
    w.close();
    w.blank();
}

pub(super) fn generate(
    name: &str,
    op: ReductionOp,
    statements: &[Statement],
    numeric: NumericType,
    layout: Layout,
    policy: BindingPolicy,
) -> Result<GeneratedKernel> {
    let mut binder = Binder::new(policy);
    let members = bind_members(name, op, statements, &mut binder)?;

    let mut w = SourceWriter::with_capacity(2048 * statements.len());
    describe(&mut w, name, layout);
    stage_0(&mut w, name, op, numeric, layout, &binder, &members);
    stage_1(&mut w, name, op, numeric, layout, &binder, &members);

    Ok(GeneratedKernel {
        name: name.to_string(),
        entry_points: vec![format!("{name}_0"), format!("{name}_1")],
        source: w.finish(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::FetchingPolicy;
    use crate::placeholder::Placeholders;
    use crate::preset;

    const LAYOUT: Layout = Layout {
        simd_width: 1,
        local_size: 64,
        num_groups: 32,
        fetching: FetchingPolicy::GlobalStrided,
    };

    #[test]
    fn test_inner_prod_batch_writes_one_partial_per_member() {
        let mut ph = Placeholders::new();
        let x = ph.vector::<f32>();
        let statements: Vec<_> = (0..3)
            .map(|_| {
                let y = ph.vector::<f32>();
                let s = ph.device_scalar::<f32>();
                preset::inner_prod(s, x, y)
            })
            .collect();

        let kernel = generate(
            "inner_prod_3",
            ReductionOp::InnerProd,
            &statements,
            NumericType::Float,
            LAYOUT,
            BindingPolicy::Shared,
        )
        .unwrap();
        assert_eq!(kernel.entry_points, vec!["inner_prod_3_0", "inner_prod_3_1"]);
        for k in 0..3 {
            assert!(kernel
                .source
                .contains(&format!("partials[{k} * get_num_groups(0) + get_group_id(0)] = buf{k}[0];")));
        }
        assert!(kernel.source.contains("for (unsigned int stride = 32; stride > 0; stride /= 2)"));
        assert!(kernel.source.contains("__local float buf2[64];"));
    }

    #[test]
    fn test_index_norm_inf_binds_unsigned_result() {
        let mut ph = Placeholders::new();
        let (s, x) = (ph.device_scalar::<f64>(), ph.vector::<f64>());

        let kernel = generate(
            "index_norm_inf",
            ReductionOp::IndexNormInf,
            &[preset::index_norm_inf(s, x)],
            NumericType::Double,
            LAYOUT,
            BindingPolicy::Shared,
        )
        .unwrap();
        assert!(kernel.source.contains("__global unsigned int* arg0"));
        assert!(kernel.source.contains("if (fabs(arg1[arg1_start + (i) * arg1_stride]) > acc0)"));
        assert!(kernel.source.contains("arg0[0] = ibuf0[0];"));
    }

    #[test]
    fn test_integer_norms_avoid_float_builtins() {
        let mut ph = Placeholders::new();
        let (s, x) = (ph.device_scalar::<u32>(), ph.vector::<u32>());

        let kernel = generate(
            "norm_inf",
            ReductionOp::NormInf,
            &[preset::norm_inf(s, x)],
            NumericType::Uint,
            LAYOUT,
            BindingPolicy::Shared,
        )
        .unwrap();
        assert!(!kernel.source.contains("fabs"));
        assert!(kernel.source.contains("acc0 = max(acc0, arg1[arg1_start + (i) * arg1_stride]);"));
    }

    #[test]
    fn test_packed_loads_each_input_once() {
        let mut ph = Placeholders::new();
        let (s, x) = (ph.device_scalar::<f32>(), ph.vector::<f32>());
        let layout = Layout {
            simd_width: 4,
            ..LAYOUT
        };

        let kernel = generate(
            "inner_prod",
            ReductionOp::InnerProd,
            &[preset::inner_prod(s, x, x)],
            NumericType::Float,
            layout,
            BindingPolicy::Shared,
        )
        .unwrap();
        assert_eq!(kernel.source.matches("const float4 arg1_v = vload4(i, arg1 + arg1_start);").count(), 1);
        assert!(kernel.source.contains("acc0 += arg1_v.s3 * arg1_v.s3;"));
    }

    #[test]
    fn test_strided_input_skips_packed_loads() {
        let mut ph = Placeholders::new();
        let (s, x) = (ph.device_scalar::<f32>(), ph.vector::<f32>());
        let layout = Layout {
            simd_width: 8,
            fetching: FetchingPolicy::GlobalContiguous,
            ..LAYOUT
        };

        let kernel = generate(
            "norm_1",
            ReductionOp::Norm1,
            &[preset::norm_1(s, x)],
            NumericType::Float,
            layout,
            BindingPolicy::Shared,
        )
        .unwrap();
        let source = &kernel.source;
        let guard = source.find("if (arg1_stride == 1)").unwrap();
        let fallback = source[guard..].find("else").map(|at| guard + at).unwrap();
        assert!(source[guard..fallback].contains("vload8(i, arg1 + arg1_start)"));

        let strided = &source[fallback..source.find("void norm_1_1(").unwrap()];
        assert!(!strided.contains("vload8"));
        assert!(strided.contains("const unsigned int end = min(begin + chunk, N);"));
        assert!(strided.contains("acc0 += fabs(arg1[arg1_start + (i) * arg1_stride]);"));
    }

    #[test]
    fn test_host_result_rejected() {
        let mut ph = Placeholders::new();
        let (s, x) = (ph.host_scalar::<f32>(), ph.vector::<f32>());

        let err = generate(
            "sum",
            ReductionOp::Sum,
            &[preset::sum(s, x)],
            NumericType::Float,
            LAYOUT,
            BindingPolicy::Shared,
        )
        .unwrap_err();
        assert!(matches!(err, CodegenError::HostScalarOutput { .. }));
    }
}
