//! Typed, valueless stand-ins for kernel operands
//!
//! Placeholders only give an expression its shape. They never point at data;
//! the same placeholder used twice in a statement means "the same object",
//! which is what the default binding policy keys on.
//!
//! ```rust
//! use vexel_codegen::placeholder::Placeholders;
//!
//! let mut ph = Placeholders::new();
//! let x = ph.vector::<f32>();
//! let alpha = ph.device_scalar::<f32>();
//! assert_ne!(x.operand().id, alpha.operand().id);
//! ```

use crate::numeric::{Numeric, NumericType};
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

/// Identity of a placeholder within one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PlaceholderId(pub u32);

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Where a scalar lives when the kernel runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Residency {
    /// Passed to the kernel by value.
    Host,
    /// Read from a one-element device buffer.
    Device,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandKind {
    Vector,
    Scalar(Residency),
}

/// Type-erased placeholder as it appears inside a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Operand {
    pub id: PlaceholderId,
    pub kind: OperandKind,
    pub numeric: NumericType,
}

impl Operand {
    pub fn is_vector(&self) -> bool {
        matches!(self.kind, OperandKind::Vector)
    }
}

/// Placeholder for a device vector of `T`.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Vector<T> {
    id: PlaceholderId,
    _marker: PhantomData<T>,
}

/// Placeholder for a scalar of `T`, host- or device-resident.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Scalar<T> {
    id: PlaceholderId,
    residency: Residency,
    _marker: PhantomData<T>,
}

// Manual impls: deriving would require `T: Copy` on the marker.
impl<T> Clone for Vector<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Vector<T> {}

impl<T> Clone for Scalar<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Scalar<T> {}

impl<T: Numeric> Vector<T> {
    pub fn operand(&self) -> Operand {
        Operand {
            id: self.id,
            kind: OperandKind::Vector,
            numeric: T::TYPE,
        }
    }
}

impl<T: Numeric> Scalar<T> {
    pub fn residency(&self) -> Residency {
        self.residency
    }

    pub fn operand(&self) -> Operand {
        Operand {
            id: self.id,
            kind: OperandKind::Scalar(self.residency),
            numeric: T::TYPE,
        }
    }
}

/// Hands out placeholders with ids in creation order.
///
/// Ids are deterministic so that two generation runs over the same presets
/// produce byte-identical source.
#[derive(Debug, Default)]
pub struct Placeholders {
    next: u32,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> PlaceholderId {
        let id = PlaceholderId(self.next);
        self.next += 1;
        id
    }

    pub fn vector<T: Numeric>(&mut self) -> Vector<T> {
        Vector {
            id: self.allocate(),
            _marker: PhantomData,
        }
    }

    pub fn host_scalar<T: Numeric>(&mut self) -> Scalar<T> {
        self.scalar(Residency::Host)
    }

    pub fn device_scalar<T: Numeric>(&mut self) -> Scalar<T> {
        self.scalar(Residency::Device)
    }

    pub fn scalar<T: Numeric>(&mut self, residency: Residency) -> Scalar<T> {
        Scalar {
            id: self.allocate(),
            residency,
            _marker: PhantomData,
        }
    }

    /// Number of placeholders handed out so far.
    pub fn len(&self) -> usize {
        self.next as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next == 0
    }
}
