//! Mapping of placeholders to kernel arguments

use crate::numeric::NumericType;
use crate::placeholder::{Operand, OperandKind, PlaceholderId, Residency};
use std::collections::HashMap;

/// How repeated placeholders map onto kernel arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BindingPolicy {
    /// Occurrences of the same placeholder share one argument.
    #[default]
    Shared,
    /// Every occurrence gets its own argument.
    BindAllUnique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub(crate) name: String,
    pub(crate) operand: Operand,
    writable: bool,
    /// Element type override; index reductions write `unsigned int`.
    element: Option<&'static str>,
}

impl Binding {
    fn element_type(&self) -> &'static str {
        self.element.unwrap_or(self.operand.numeric.type_name())
    }

    /// Parameter declarations this binding contributes to a signature.
    pub(crate) fn declarations(&self) -> Vec<String> {
        let ty = self.element_type();
        let qualifier = if self.writable { "" } else { "const " };
        match self.operand.kind {
            OperandKind::Vector => vec![
                format!("__global {qualifier}{ty}* {}", self.name),
                format!("unsigned int {}_start", self.name),
                format!("unsigned int {}_stride", self.name),
            ],
            OperandKind::Scalar(Residency::Device) => vec![format!("__global {qualifier}{ty}* {}", self.name)],
            OperandKind::Scalar(Residency::Host) => vec![format!("{ty} {}", self.name)],
        }
    }

    /// Scalar value expression.
    pub(crate) fn value(&self) -> String {
        match self.operand.kind {
            OperandKind::Scalar(Residency::Device) => format!("{}[0]", self.name),
            _ => self.name.clone(),
        }
    }

    /// Strided element access at index expression `i`.
    pub(crate) fn element(&self, i: &str) -> String {
        format!("{name}[{name}_start + ({i}) * {name}_stride]", name = self.name)
    }

    /// Packed load of `width` elements at packed index `i`.
    ///
    /// Only valid under [`Binder::unit_stride_guard`].
    pub(crate) fn vload(&self, width: u32, i: &str) -> String {
        format!("vload{width}({i}, {name} + {name}_start)", name = self.name)
    }

    pub(crate) fn vstore(&self, width: u32, value: &str, i: &str) -> String {
        format!("vstore{width}({value}, {i}, {name} + {name}_start);", name = self.name)
    }
}

/// Assigns `arg{n}` names in order of first appearance.
#[derive(Debug)]
pub(crate) struct Binder {
    policy: BindingPolicy,
    bindings: Vec<Binding>,
    shared: HashMap<PlaceholderId, usize>,
}

impl Binder {
    pub(crate) fn new(policy: BindingPolicy) -> Self {
        Self {
            policy,
            bindings: Vec::new(),
            shared: HashMap::new(),
        }
    }

    pub(crate) fn bind(&mut self, operand: Operand, access: Access) -> usize {
        self.bind_as(operand, access, None)
    }

    /// Bind a reduction result; index reductions store positions.
    pub(crate) fn bind_result(&mut self, operand: Operand, index: bool) -> usize {
        self.bind_as(operand, Access::Write, index.then_some("unsigned int"))
    }

    fn bind_as(&mut self, operand: Operand, access: Access, element: Option<&'static str>) -> usize {
        let writable = access == Access::Write;
        if self.policy == BindingPolicy::Shared {
            if let Some(&slot) = self.shared.get(&operand.id) {
                debug_assert!(
                    element.is_none() || self.bindings[slot].element == element,
                    "placeholder {} already bound as {}, cannot rebind as {:?}",
                    operand.id,
                    self.bindings[slot].element_type(),
                    element
                );
                self.bindings[slot].writable |= writable;
                return slot;
            }
        }

        let slot = self.bindings.len();
        self.bindings.push(Binding {
            name: format!("arg{slot}"),
            operand,
            writable,
            element,
        });
        self.shared.entry(operand.id).or_insert(slot);
        slot
    }

    pub(crate) fn get(&self, slot: usize) -> &Binding {
        &self.bindings[slot]
    }

    /// `argN_stride == 1 && ...` over the vector bindings among `slots`.
    ///
    /// `None` when no vector is bound, e.g. a kernel over scalars only.
    pub(crate) fn unit_stride_guard(&self, slots: &[usize]) -> Option<String> {
        let mut ordered: Vec<usize> = slots.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        let terms: Vec<String> = ordered
            .into_iter()
            .map(|slot| &self.bindings[slot])
            .filter(|binding| binding.operand.kind == OperandKind::Vector)
            .map(|binding| format!("{}_stride == 1", binding.name))
            .collect();
        (!terms.is_empty()).then(|| terms.join(" && "))
    }

    /// Comma-joined declarations for `slots`, each slot once, in slot order.
    pub(crate) fn signature(&self, slots: &[usize]) -> String {
        let mut ordered: Vec<usize> = slots.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        ordered
            .into_iter()
            .flat_map(|slot| self.bindings[slot].declarations())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Scalar type name, or its `n`-wide vector form.
pub(crate) fn lane_type(numeric: NumericType, width: u32) -> String {
    if width == 1 {
        numeric.type_name().to_string()
    } else {
        format!("{}{width}", numeric.type_name())
    }
}
