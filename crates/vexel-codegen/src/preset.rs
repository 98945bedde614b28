//! Preset builders: one function per recognized vector operation
//!
//! Every function here is pure. It turns placeholders (and, for axpby,
//! per-term flags) into the canonical [`Statement`] for its pattern. The
//! typed signatures keep all operands of a statement on one element type,
//! and bundling flags with their [`Term`] makes "flags for a missing second
//! term" impossible to express.

use crate::numeric::Numeric;
use crate::placeholder::{Scalar, Vector};
use crate::statement::{AssignKind, Node, ReductionOp, ScalarFlags, ScaledOperand, Statement};

/// One `scalar * vector` term of [`axpby`] with its flags.
#[derive(Debug)]
pub struct Term<T> {
    pub vector: Vector<T>,
    pub scalar: Scalar<T>,
    pub flags: ScalarFlags,
}

impl<T> Clone for Term<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Term<T> {}

impl<T: Numeric> Term<T> {
    pub fn new(vector: Vector<T>, scalar: Scalar<T>, flags: ScalarFlags) -> Self {
        Self { vector, scalar, flags }
    }

    fn scaled(&self) -> ScaledOperand {
        ScaledOperand {
            vector: self.vector.operand(),
            scalar: self.scalar.operand(),
            flags: self.flags,
        }
    }
}

/// `x <assign> a*y` or `x <assign> a*y + b*z`.
pub fn axpby<T: Numeric>(assign: AssignKind, x: Vector<T>, first: Term<T>, second: Option<Term<T>>) -> Statement {
    Statement::new(
        x.operand(),
        assign,
        Node::Axpby {
            first: first.scaled(),
            second: second.map(|term| term.scaled()),
        },
    )
}

/// `x <-> y`
pub fn swap<T: Numeric>(x: Vector<T>, y: Vector<T>) -> Statement {
    Statement::new(x.operand(), AssignKind::Assign, Node::Swap { other: y.operand() })
}

/// Givens rotation of the pair `(x, y)` by `(alpha, beta)`.
pub fn plane_rotation<T: Numeric>(x: Vector<T>, y: Vector<T>, alpha: Scalar<T>, beta: Scalar<T>) -> Statement {
    Statement::new(
        x.operand(),
        AssignKind::Assign,
        Node::PlaneRotation {
            other: y.operand(),
            alpha: alpha.operand(),
            beta: beta.operand(),
        },
    )
}

/// `x[i] = value` for every `i`.
pub fn assign_cpu<T: Numeric>(x: Vector<T>, value: Scalar<T>) -> Statement {
    Statement::new(x.operand(), AssignKind::Assign, Node::HostAssign { value: value.operand() })
}

fn reduction<T: Numeric>(op: ReductionOp, result: Scalar<T>, operands: &[Vector<T>]) -> Statement {
    Statement::new(
        result.operand(),
        AssignKind::Assign,
        Node::Reduction {
            op,
            operands: operands.iter().map(|v| v.operand()).collect(),
        },
    )
}

/// `result = sum(x[i] * y[i])`
pub fn inner_prod<T: Numeric>(result: Scalar<T>, x: Vector<T>, y: Vector<T>) -> Statement {
    reduction(ReductionOp::InnerProd, result, &[x, y])
}

/// `result = sum(|x[i]|)`
pub fn norm_1<T: Numeric>(result: Scalar<T>, x: Vector<T>) -> Statement {
    reduction(ReductionOp::Norm1, result, &[x])
}

/// `result = sqrt(sum(x[i]^2))`
pub fn norm_2<T: Numeric>(result: Scalar<T>, x: Vector<T>) -> Statement {
    reduction(ReductionOp::Norm2, result, &[x])
}

/// `result = max(|x[i]|)`
pub fn norm_inf<T: Numeric>(result: Scalar<T>, x: Vector<T>) -> Statement {
    reduction(ReductionOp::NormInf, result, &[x])
}

/// `result = argmax(|x[i]|)` (first index on ties)
pub fn index_norm_inf<T: Numeric>(result: Scalar<T>, x: Vector<T>) -> Statement {
    reduction(ReductionOp::IndexNormInf, result, &[x])
}

/// `result = sum(x[i])`
pub fn sum<T: Numeric>(result: Scalar<T>, x: Vector<T>) -> Statement {
    reduction(ReductionOp::Sum, result, &[x])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::Placeholders;
    use crate::statement::StatementShape;

    #[test]
    fn test_presets_are_pure() {
        let mut ph = Placeholders::new();
        let (x, y) = (ph.vector::<f32>(), ph.vector::<f32>());
        assert_eq!(swap(x, y), swap(x, y));
    }

    #[test]
    fn test_one_term_axpby_has_no_second_operand() {
        let mut ph = Placeholders::new();
        let (x, y) = (ph.vector::<f32>(), ph.vector::<f32>());
        let a = ph.host_scalar::<f32>();

        let stmt = axpby(AssignKind::Assign, x, Term::new(y, a, ScalarFlags::NONE), None);
        match stmt.rhs() {
            Node::Axpby { second, .. } => assert!(second.is_none()),
            other => panic!("expected axpby node, got {other:?}"),
        }
        assert_eq!(stmt.operands().len(), 3);
    }

    #[test]
    fn test_reduction_shapes() {
        let mut ph = Placeholders::new();
        let s = ph.device_scalar::<f64>();
        let (x, y) = (ph.vector::<f64>(), ph.vector::<f64>());

        let cases = [
            (inner_prod(s, x, y), ReductionOp::InnerProd),
            (norm_1(s, x), ReductionOp::Norm1),
            (norm_2(s, x), ReductionOp::Norm2),
            (norm_inf(s, x), ReductionOp::NormInf),
            (index_norm_inf(s, x), ReductionOp::IndexNormInf),
            (sum(s, x), ReductionOp::Sum),
        ];
        for (stmt, op) in cases {
            assert_eq!(stmt.shape(), StatementShape::Reduction(op));
            assert_eq!(stmt.operands().len(), 1 + op.vector_arity());
        }
    }

    #[test]
    fn test_assign_cpu_reads_host_scalar() {
        let mut ph = Placeholders::new();
        let x = ph.vector::<f32>();
        let v = ph.host_scalar::<f32>();
        let stmt = assign_cpu(x, v);
        assert_eq!(stmt.kernel_name(), "assign_cpu");
        assert_eq!(stmt.operands()[1], v.operand());
    }
}
