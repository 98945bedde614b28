//! Enumeration of axpby flag combinations
//!
//! The generator specializes on every [`ScalarFlags`] combination; there is
//! no runtime branch in the kernel. Every reachable combination therefore
//! has to be materialized ahead of time, in a fixed order so that module
//! source is reproducible.
//!
//! Order: `b` flags vary slowest, `a` flags fastest, both in
//! [`ScalarFlags::ALL`] order. The one-term form has 4 variants, the
//! two-term form 16.

use crate::numeric::Numeric;
use crate::placeholder::{Scalar, Vector};
use crate::preset::{self, Term};
use crate::statement::{AssignKind, ScalarFlags, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxpbyForm {
    /// `x = a*y`
    OneTerm,
    /// `x = a*y + b*z`
    TwoTerm,
}

/// Flag assignment for one generated axpby kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxpbyVariant {
    pub a: ScalarFlags,
    pub b: Option<ScalarFlags>,
}

impl AxpbyVariant {
    pub fn form(&self) -> AxpbyForm {
        match self.b {
            None => AxpbyForm::OneTerm,
            Some(_) => AxpbyForm::TwoTerm,
        }
    }
}

const ONE_TERM_B: [Option<ScalarFlags>; 1] = [None];
const TWO_TERM_B: [Option<ScalarFlags>; 4] = [
    Some(ScalarFlags::ALL[0]),
    Some(ScalarFlags::ALL[1]),
    Some(ScalarFlags::ALL[2]),
    Some(ScalarFlags::ALL[3]),
];

/// All flag combinations for `form`, in generation order.
pub fn axpby_variants(form: AxpbyForm) -> impl Iterator<Item = AxpbyVariant> {
    let b_choices: &'static [Option<ScalarFlags>] = match form {
        AxpbyForm::OneTerm => &ONE_TERM_B,
        AxpbyForm::TwoTerm => &TWO_TERM_B,
    };

    b_choices
        .iter()
        .flat_map(|&b| ScalarFlags::ALL.into_iter().map(move |a| AxpbyVariant { a, b }))
}

/// Placeholders for one axpby base pattern; `second` absent means the
/// one-term form.
#[derive(Debug)]
pub struct AxpbyOperands<T> {
    pub x: Vector<T>,
    pub y: Vector<T>,
    pub a: Scalar<T>,
    pub second: Option<(Vector<T>, Scalar<T>)>,
}

impl<T: Numeric> AxpbyOperands<T> {
    pub fn form(&self) -> AxpbyForm {
        match self.second {
            None => AxpbyForm::OneTerm,
            Some(_) => AxpbyForm::TwoTerm,
        }
    }
}

/// Every flag variant of one base pattern for a single assign kind.
pub fn axpby_statements<T: Numeric>(assign: AssignKind, operands: &AxpbyOperands<T>) -> Vec<Statement> {
    axpby_variants(operands.form())
        .map(|variant| {
            let second = match (operands.second, variant.b) {
                (Some((z, b)), Some(flags)) => Some(Term::new(z, b, flags)),
                (None, None) => None,
                _ => unreachable!("variant form always matches operand form"),
            };
            preset::axpby(assign, operands.x, Term::new(operands.y, operands.a, variant.a), second)
        })
        .collect()
}

/// The full axpby family: for each of [`AssignKind::AXPBY`], every base
/// pattern in `patterns` with all of its flag variants.
pub fn axpby_family<T: Numeric>(patterns: &[AxpbyOperands<T>]) -> Vec<Statement> {
    AssignKind::AXPBY
        .into_iter()
        .flat_map(|assign| patterns.iter().flat_map(move |ops| axpby_statements(assign, ops)))
        .collect()
}
