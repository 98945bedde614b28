//! Pointwise template: one element-wise update per work-item iteration

use super::binding::{lane_type, Access, Binder, BindingPolicy, Binding};
use super::writer::SourceWriter;
use super::{describe, emit_element_loops, open_kernel, GeneratedKernel, Layout};
use crate::numeric::NumericType;
use crate::statement::{AssignKind, Node, ScalarFlags, Statement};

/// Statement with every operand resolved to a binding slot.
enum Plan {
    Axpby {
        lhs: usize,
        assign: AssignKind,
        terms: Vec<(usize, usize, ScalarFlags)>,
    },
    Swap {
        x: usize,
        y: usize,
    },
    Rotation {
        x: usize,
        y: usize,
        alpha: usize,
        beta: usize,
    },
    Broadcast {
        x: usize,
        value: usize,
    },
}

impl Plan {
    fn bind(statement: &Statement, binder: &mut Binder) -> Self {
        let lhs = binder.bind(statement.lhs(), Access::Write);
        match statement.rhs() {
            Node::Axpby { first, second } => {
                let terms = std::iter::once(first)
                    .chain(second.iter())
                    .map(|term| {
                        let vector = binder.bind(term.vector, Access::Read);
                        let scalar = binder.bind(term.scalar, Access::Read);
                        (vector, scalar, term.flags)
                    })
                    .collect();
                Plan::Axpby {
                    lhs,
                    assign: statement.assign(),
                    terms,
                }
            }
            Node::Swap { other } => Plan::Swap {
                x: lhs,
                y: binder.bind(*other, Access::Write),
            },
            Node::PlaneRotation { other, alpha, beta } => Plan::Rotation {
                x: lhs,
                y: binder.bind(*other, Access::Write),
                alpha: binder.bind(*alpha, Access::Read),
                beta: binder.bind(*beta, Access::Read),
            },
            Node::HostAssign { value } => Plan::Broadcast {
                x: lhs,
                value: binder.bind(*value, Access::Read),
            },
            Node::Reduction { .. } => unreachable!("reductions expand through the reduction template"),
        }
    }

    fn slots(&self) -> Vec<usize> {
        match self {
            Plan::Axpby { lhs, terms, .. } => std::iter::once(*lhs)
                .chain(terms.iter().flat_map(|&(v, s, _)| [v, s]))
                .collect(),
            Plan::Swap { x, y } => vec![*x, *y],
            Plan::Rotation { x, y, alpha, beta } => vec![*x, *y, *alpha, *beta],
            Plan::Broadcast { x, value } => vec![*x, *value],
        }
    }

    fn scalar_slots(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let candidates: Vec<usize> = match self {
            Plan::Axpby { terms, .. } => terms.iter().map(|&(_, s, _)| s).collect(),
            Plan::Swap { .. } => Vec::new(),
            Plan::Rotation { alpha, beta, .. } => vec![*alpha, *beta],
            Plan::Broadcast { value, .. } => vec![*value],
        };
        for slot in candidates {
            if !out.contains(&slot) {
                out.push(slot);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
enum Lane {
    Scalar,
    Packed(u32),
}

impl Lane {
    fn width(self) -> u32 {
        match self {
            Lane::Scalar => 1,
            Lane::Packed(width) => width,
        }
    }
}

fn load(binding: &Binding, lane: Lane) -> String {
    match lane {
        Lane::Scalar => binding.element("i"),
        Lane::Packed(width) => binding.vload(width, "i"),
    }
}

fn store(w: &mut SourceWriter, binding: &Binding, lane: Lane, assign: AssignKind, value: &str) {
    match lane {
        Lane::Scalar => w.line(format!("{} {} {};", binding.element("i"), assign.operator(), value)),
        Lane::Packed(width) => {
            let updated = match assign {
                AssignKind::Assign => value.to_string(),
                AssignKind::InplaceAdd => format!("{} + ({value})", binding.vload(width, "i")),
                AssignKind::InplaceSub => format!("{} - ({value})", binding.vload(width, "i")),
            };
            w.line(binding.vstore(width, &updated, "i"));
        }
    }
}

fn scalar_value(binding: &Binding) -> String {
    format!("{}_value", binding.name)
}

fn term(binder: &Binder, lane: Lane, vector: usize, scalar: usize, flags: ScalarFlags) -> String {
    let y = load(binder.get(vector), lane);
    let mut a = scalar_value(binder.get(scalar));
    if flags.flip_sign {
        a = format!("(-{a})");
    }
    if flags.reciprocal {
        format!("{y} / {a}")
    } else {
        format!("{y} * {a}")
    }
}

fn body(w: &mut SourceWriter, plan: &Plan, binder: &Binder, numeric: NumericType, lane: Lane) {
    let ty = lane_type(numeric, lane.width());
    match plan {
        Plan::Axpby { lhs, assign, terms } => {
            let value = terms
                .iter()
                .map(|&(v, s, flags)| term(binder, lane, v, s, flags))
                .collect::<Vec<_>>()
                .join(" + ");
            store(w, binder.get(*lhs), lane, *assign, &value);
        }
        Plan::Swap { x, y } => {
            let (bx, by) = (binder.get(*x), binder.get(*y));
            w.line(format!("const {ty} tmp_x = {};", load(bx, lane)));
            w.line(format!("const {ty} tmp_y = {};", load(by, lane)));
            store(w, bx, lane, AssignKind::Assign, "tmp_y");
            store(w, by, lane, AssignKind::Assign, "tmp_x");
        }
        Plan::Rotation { x, y, alpha, beta } => {
            let (bx, by) = (binder.get(*x), binder.get(*y));
            let a = scalar_value(binder.get(*alpha));
            let b = scalar_value(binder.get(*beta));
            w.line(format!("const {ty} tmp_x = {};", load(bx, lane)));
            w.line(format!("const {ty} tmp_y = {};", load(by, lane)));
            store(w, bx, lane, AssignKind::Assign, &format!("{a} * tmp_x + {b} * tmp_y"));
            store(w, by, lane, AssignKind::Assign, &format!("{a} * tmp_y - {b} * tmp_x"));
        }
        Plan::Broadcast { x, value } => {
            let v = scalar_value(binder.get(*value));
            let v = match lane {
                Lane::Scalar => v,
                Lane::Packed(_) => format!("({ty})({v})"),
            };
            store(w, binder.get(*x), lane, AssignKind::Assign, &v);
        }
    }
}

pub(super) fn generate(
    name: &str,
    statement: &Statement,
    numeric: NumericType,
    layout: Layout,
    policy: BindingPolicy,
) -> GeneratedKernel {
    let mut binder = Binder::new(policy);
    let plan = Plan::bind(statement, &mut binder);
    let signature = format!("unsigned int N, {}", binder.signature(&plan.slots()));

    let mut w = SourceWriter::with_capacity(1024);
    describe(&mut w, name, layout);
    open_kernel(&mut w, layout, name, &signature);

    for slot in plan.scalar_slots() {
        let binding = binder.get(slot);
        w.line(format!(
            "const {} {} = {};",
            numeric.type_name(),
            scalar_value(binding),
            binding.value()
        ));
    }

    emit_element_loops(
        &mut w,
        layout,
        binder.unit_stride_guard(&plan.slots()),
        |w| body(w, &plan, &binder, numeric, Lane::Packed(layout.simd_width)),
        |w| body(w, &plan, &binder, numeric, Lane::Scalar),
    );

    w.close();
    w.blank();

    GeneratedKernel {
        name: name.to_string(),
        entry_points: vec![name.to_string()],
        source: w.finish(),
    }
}
