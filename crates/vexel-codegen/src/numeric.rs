//! Element types that kernel modules can be generated for

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device element type of a vector or scalar operand.
///
/// The [`fmt::Display`] form is the OpenCL C type name, which is also the
/// prefix of every generated module name (`float_vector`, `double_vector_multi`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericType {
    Char,
    Uchar,
    Short,
    Ushort,
    Int,
    Uint,
    Long,
    Ulong,
    Float,
    Double,
}

impl NumericType {
    pub const ALL: [NumericType; 10] = [
        NumericType::Char,
        NumericType::Uchar,
        NumericType::Short,
        NumericType::Ushort,
        NumericType::Int,
        NumericType::Uint,
        NumericType::Long,
        NumericType::Ulong,
        NumericType::Float,
        NumericType::Double,
    ];

    /// OpenCL C spelling of the type.
    pub const fn type_name(self) -> &'static str {
        match self {
            NumericType::Char => "char",
            NumericType::Uchar => "uchar",
            NumericType::Short => "short",
            NumericType::Ushort => "ushort",
            NumericType::Int => "int",
            NumericType::Uint => "uint",
            NumericType::Long => "long",
            NumericType::Ulong => "ulong",
            NumericType::Float => "float",
            NumericType::Double => "double",
        }
    }

    pub const fn size_bytes(self) -> usize {
        match self {
            NumericType::Char | NumericType::Uchar => 1,
            NumericType::Short | NumericType::Ushort => 2,
            NumericType::Int | NumericType::Uint | NumericType::Float => 4,
            NumericType::Long | NumericType::Ulong | NumericType::Double => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, NumericType::Float | NumericType::Double)
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            NumericType::Char
                | NumericType::Short
                | NumericType::Int
                | NumericType::Long
                | NumericType::Float
                | NumericType::Double
        )
    }

    /// Whether kernels over this type need a double-precision device extension.
    pub const fn requires_double_precision(self) -> bool {
        matches!(self, NumericType::Double)
    }

    /// Parse an OpenCL C type name.
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.type_name() == name)
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Rust element types with a device counterpart.
pub trait Numeric: Copy + Send + Sync + 'static {
    const TYPE: NumericType;
}

macro_rules! impl_numeric {
    ($($rust:ty => $variant:ident),+ $(,)?) => {
        $(
            impl Numeric for $rust {
                const TYPE: NumericType = NumericType::$variant;
            }
        )+
    };
}

impl_numeric! {
    i8 => Char,
    u8 => Uchar,
    i16 => Short,
    u16 => Ushort,
    i32 => Int,
    u32 => Uint,
    i64 => Long,
    u64 => Ulong,
    f32 => Float,
    f64 => Double,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_round_trip() {
        for ty in NumericType::ALL {
            assert_eq!(NumericType::from_type_name(ty.type_name()), Some(ty));
        }
        assert_eq!(NumericType::from_type_name("half"), None);
    }

    #[test]
    fn test_only_double_needs_extension() {
        let needing: Vec<_> = NumericType::ALL
            .into_iter()
            .filter(|ty| ty.requires_double_precision())
            .collect();
        assert_eq!(needing, vec![NumericType::Double]);
    }

    #[test]
    fn test_rust_type_mapping() {
        assert_eq!(<f32 as Numeric>::TYPE, NumericType::Float);
        assert_eq!(<f64 as Numeric>::TYPE, NumericType::Double);
        assert_eq!(<u16 as Numeric>::TYPE, NumericType::Ushort);
        assert_eq!(<i64 as Numeric>::TYPE.size_bytes(), 8);
    }

    #[test]
    fn test_serde_uses_type_names() {
        let json = serde_json::to_string(&NumericType::Ulong).unwrap();
        assert_eq!(json, "\"ulong\"");
        let parsed: NumericType = serde_json::from_str("\"double\"").unwrap();
        assert_eq!(parsed, NumericType::Double);
    }
}
