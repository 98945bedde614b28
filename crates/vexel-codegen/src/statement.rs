//! Operation statements: the symbolic form of one kernel's computation
//!
//! A [`Statement`] is `lhs <assign> rhs`, where `rhs` is one of a small set
//! of node shapes. Statements are only built through [`crate::preset`], so
//! every statement that reaches the generator is well formed.

use crate::error::{CodegenError, Result};
use crate::numeric::{Numeric, NumericType};
use crate::placeholder::{Operand, Scalar, Vector};
use crate::preset;
use serde::Serialize;
use std::fmt;

/// Root operation of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignKind {
    Assign,
    InplaceAdd,
    InplaceSub,
}

impl AssignKind {
    /// Assign kinds the axpby family is generated for.
    pub const AXPBY: [AssignKind; 2] = [AssignKind::Assign, AssignKind::InplaceAdd];

    pub const fn name(self) -> &'static str {
        match self {
            AssignKind::Assign => "assign",
            AssignKind::InplaceAdd => "inplace_add",
            AssignKind::InplaceSub => "inplace_sub",
        }
    }

    pub const fn operator(self) -> &'static str {
        match self {
            AssignKind::Assign => "=",
            AssignKind::InplaceAdd => "+=",
            AssignKind::InplaceSub => "-=",
        }
    }
}

/// Per-scalar transforms of an axpby term.
///
/// `flip_sign` negates the scalar; `reciprocal` divides the vector by the
/// scalar instead of multiplying. The generator bakes both into the kernel
/// text, so each combination is a different kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ScalarFlags {
    pub flip_sign: bool,
    pub reciprocal: bool,
}

impl ScalarFlags {
    pub const NONE: ScalarFlags = ScalarFlags::new(false, false);

    /// All four combinations, flip bit varying fastest.
    pub const ALL: [ScalarFlags; 4] = [
        ScalarFlags::new(false, false),
        ScalarFlags::new(true, false),
        ScalarFlags::new(false, true),
        ScalarFlags::new(true, true),
    ];

    pub const fn new(flip_sign: bool, reciprocal: bool) -> Self {
        Self { flip_sign, reciprocal }
    }

    /// Two-digit code used in kernel names: flip bit, then reciprocal bit.
    pub const fn code(self) -> &'static str {
        match (self.flip_sign, self.reciprocal) {
            (false, false) => "00",
            (true, false) => "10",
            (false, true) => "01",
            (true, true) => "11",
        }
    }
}

/// One `scalar * vector` term of an axpby statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScaledOperand {
    pub vector: Operand,
    pub scalar: Operand,
    pub flags: ScalarFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionOp {
    InnerProd,
    Norm1,
    Norm2,
    NormInf,
    IndexNormInf,
    Sum,
}

impl ReductionOp {
    pub const fn name(self) -> &'static str {
        match self {
            ReductionOp::InnerProd => "inner_prod",
            ReductionOp::Norm1 => "norm_1",
            ReductionOp::Norm2 => "norm_2",
            ReductionOp::NormInf => "norm_inf",
            ReductionOp::IndexNormInf => "index_norm_inf",
            ReductionOp::Sum => "sum",
        }
    }

    /// Number of vector operands the reduction reads.
    pub const fn vector_arity(self) -> usize {
        match self {
            ReductionOp::InnerProd => 2,
            _ => 1,
        }
    }

    /// Whether the result is a position rather than a value.
    pub const fn is_index(self) -> bool {
        matches!(self, ReductionOp::IndexNormInf)
    }
}

/// Right-hand side of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    /// `first.scalar * first.vector [+ second.scalar * second.vector]`
    Axpby {
        first: ScaledOperand,
        second: Option<ScaledOperand>,
    },
    /// Exchange the contents of `lhs` and `other`.
    Swap { other: Operand },
    /// `(lhs, other) <- (alpha*lhs + beta*other, alpha*other - beta*lhs)`
    PlaneRotation {
        other: Operand,
        alpha: Operand,
        beta: Operand,
    },
    /// Broadcast a host scalar into every element of `lhs`.
    HostAssign { value: Operand },
    /// Reduce the operands into the scalar `lhs`.
    Reduction { op: ReductionOp, operands: Vec<Operand> },
}

/// Structural class of a statement; decides which template expands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementShape {
    Pointwise,
    Reduction(ReductionOp),
}

impl fmt::Display for StatementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementShape::Pointwise => f.write_str("pointwise"),
            StatementShape::Reduction(op) => write!(f, "reduction({})", op.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Statement {
    lhs: Operand,
    assign: AssignKind,
    rhs: Node,
}

impl Statement {
    pub(crate) fn new(lhs: Operand, assign: AssignKind, rhs: Node) -> Self {
        Self { lhs, assign, rhs }
    }

    pub fn lhs(&self) -> Operand {
        self.lhs
    }

    pub fn assign(&self) -> AssignKind {
        self.assign
    }

    pub fn rhs(&self) -> &Node {
        &self.rhs
    }

    pub fn shape(&self) -> StatementShape {
        match &self.rhs {
            Node::Reduction { op, .. } => StatementShape::Reduction(*op),
            _ => StatementShape::Pointwise,
        }
    }

    /// Every operand in order of first appearance, `lhs` first.
    ///
    /// Repeated occurrences are kept; the binding policy decides whether
    /// they share a kernel argument.
    pub fn operands(&self) -> Vec<Operand> {
        let mut out = vec![self.lhs];
        match &self.rhs {
            Node::Axpby { first, second } => {
                for term in std::iter::once(first).chain(second.iter()) {
                    out.push(term.vector);
                    out.push(term.scalar);
                }
            }
            Node::Swap { other } => out.push(*other),
            Node::PlaneRotation { other, alpha, beta } => out.extend([*other, *alpha, *beta]),
            Node::HostAssign { value } => out.push(*value),
            Node::Reduction { operands, .. } => out.extend(operands.iter().copied()),
        }
        out
    }

    /// The element type shared by every operand.
    pub fn numeric(&self) -> Result<NumericType> {
        let first = self.lhs.numeric;
        match self.operands().into_iter().find(|op| op.numeric != first) {
            Some(other) => Err(CodegenError::MixedNumericTypes {
                first,
                second: other.numeric,
            }),
            None => Ok(first),
        }
    }

    /// Stable kernel name derived from the pattern and its flags.
    pub fn kernel_name(&self) -> String {
        match &self.rhs {
            Node::Axpby { first, second } => match second {
                None => format!("{}_av_a{}", self.assign.name(), first.flags.code()),
                Some(second) => format!(
                    "{}_avbv_a{}_b{}",
                    self.assign.name(),
                    first.flags.code(),
                    second.flags.code()
                ),
            },
            Node::Swap { .. } => "swap".to_string(),
            Node::PlaneRotation { .. } => "plane_rotation".to_string(),
            Node::HostAssign { .. } => "assign_cpu".to_string(),
            Node::Reduction { op, .. } => op.name().to_string(),
        }
    }

    /// JSON dump of the statement tree, for debugging generated kernels.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Independent statements expanded into one kernel.
///
/// All members share one reduction shape; the generator emits a single
/// kernel parameterized by the batch arity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementBatch {
    statements: Vec<Statement>,
    op: ReductionOp,
}

impl StatementBatch {
    pub fn new(statements: Vec<Statement>) -> Result<Self> {
        let first = statements.first().ok_or(CodegenError::EmptyBatch)?;
        let expected = first.shape();
        let op = match expected {
            StatementShape::Reduction(op) => op,
            StatementShape::Pointwise => {
                return Err(CodegenError::HeterogeneousBatch {
                    index: 0,
                    expected: StatementShape::Reduction(ReductionOp::InnerProd),
                    found: expected,
                })
            }
        };

        for (index, statement) in statements.iter().enumerate().skip(1) {
            let found = statement.shape();
            if found != expected {
                return Err(CodegenError::HeterogeneousBatch { index, expected, found });
            }
        }

        Ok(Self { statements, op })
    }

    /// `arity` copies of `result = inner_prod(x, y)`.
    ///
    /// Members share placeholders; generate with
    /// [`BindingPolicy::BindAllUnique`](crate::generate::BindingPolicy) to
    /// give each member its own arguments.
    pub fn inner_products<T: Numeric>(arity: usize, result: Scalar<T>, x: Vector<T>, y: Vector<T>) -> Result<Self> {
        Self::new(vec![preset::inner_prod(result, x, y); arity])
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn reduction_op(&self) -> ReductionOp {
        self.op
    }

    pub fn arity(&self) -> usize {
        self.statements.len()
    }

    /// `<op>_<arity>`, e.g. `inner_prod_4`.
    pub fn kernel_name(&self) -> String {
        format!("{}_{}", self.op.name(), self.arity())
    }
}
