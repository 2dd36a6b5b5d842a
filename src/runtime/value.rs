//! WebAssembly value representation
//!
//! Every operand stack slot holds a [`Value`] and, in a parallel stack, a
//! [`TypeTag`] classifying its storage width. The tag lets bulk stack moves
//! reason about slot widths without matching on the full value.

use fhex::ToHex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime representation of WebAssembly values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawValue", from = "RawValue")]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    V128(u128),
    /// Function reference, `None` is `ref.null func`
    FuncRef(Option<u32>),
    /// External reference, `None` is `ref.null extern`
    ExternRef(Option<u32>),
}

/// Storage width class of an operand stack slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    /// 4-byte values: i32, f32
    Word32,
    /// 8-byte values: i64, f64
    Word64,
    /// Everything else: v128 and references
    Other,
}

impl TypeTag {
    /// Classify a storage size in bytes. Only exact 4 and 8 byte sizes get
    /// their own class.
    pub const fn from_size(size: usize) -> Self {
        match size {
            4 => TypeTag::Word32,
            8 => TypeTag::Word64,
            _ => TypeTag::Other,
        }
    }

    /// Classify a native type by its in-memory size
    pub const fn of<T>() -> Self {
        Self::from_size(std::mem::size_of::<T>())
    }

    /// Width in bytes, `None` for [`TypeTag::Other`]
    pub fn byte_width(self) -> Option<usize> {
        match self {
            TypeTag::Word32 => Some(4),
            TypeTag::Word64 => Some(8),
            TypeTag::Other => None,
        }
    }
}

impl Value {
    /// Get the width tag of this value
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::I32(_) | Value::F32(_) => TypeTag::Word32,
            Value::I64(_) | Value::F64(_) => TypeTag::Word64,
            Value::V128(_) | Value::FuncRef(_) | Value::ExternRef(_) => TypeTag::Other,
        }
    }

    /// Convert to i32, returning None if wrong type
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to i64, returning None if wrong type
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to f32, returning None if wrong type
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to f64, returning None if wrong type
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_v128(&self) -> Option<u128> {
        match self {
            Value::V128(v) => Some(*v),
            _ => None,
        }
    }

    /// Bitwise equality, treating NaNs with identical payloads as equal
    pub fn bits_eq(&self, other: &Value) -> bool {
        RawValue::from(*self) == RawValue::from(*other)
    }
}

/// A native Rust type that can be pushed onto the operand stack with its
/// width tag derived from its size alone.
pub trait NativeValue: Copy + Into<Value> {}

macro_rules! native_value {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v $(as $cast)?)
                }
            }

            impl NativeValue for $ty {}
        )*
    };
}

native_value! {
    i32 => I32,
    u32 => I32 as i32,
    i64 => I64,
    u64 => I64 as i64,
    f32 => F32,
    f64 => F64,
    u128 => V128,
}

/// Bit-exact serialized form of [`Value`], floats are stored as raw bits so
/// NaN payloads survive a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum RawValue {
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
    V128(u128),
    FuncRef(Option<u32>),
    ExternRef(Option<u32>),
}

impl From<Value> for RawValue {
    fn from(v: Value) -> Self {
        match v {
            Value::I32(v) => RawValue::I32(v),
            Value::I64(v) => RawValue::I64(v),
            Value::F32(v) => RawValue::F32(v.to_bits()),
            Value::F64(v) => RawValue::F64(v.to_bits()),
            Value::V128(v) => RawValue::V128(v),
            Value::FuncRef(r) => RawValue::FuncRef(r),
            Value::ExternRef(r) => RawValue::ExternRef(r),
        }
    }
}

impl From<RawValue> for Value {
    fn from(v: RawValue) -> Self {
        match v {
            RawValue::I32(v) => Value::I32(v),
            RawValue::I64(v) => Value::I64(v),
            RawValue::F32(bits) => Value::F32(f32::from_bits(bits)),
            RawValue::F64(bits) => Value::F64(f64::from_bits(bits)),
            RawValue::V128(v) => Value::V128(v),
            RawValue::FuncRef(r) => Value::FuncRef(r),
            RawValue::ExternRef(r) => Value::ExternRef(r),
        }
    }
}

fn fmt_ref(f: &mut fmt::Formatter<'_>, kind: &str, r: &Option<u32>) -> fmt::Result {
    match r {
        Some(idx) => write!(f, "{kind}:{idx}"),
        None => write!(f, "{kind}:null"),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{}", v.to_hex()),
            Value::F64(v) => write!(f, "f64:{}", v.to_hex()),
            Value::V128(v) => write!(f, "v128:0x{}", hex::encode(v.to_be_bytes())),
            Value::FuncRef(r) => fmt_ref(f, "funcref", r),
            Value::ExternRef(r) => fmt_ref(f, "externref", r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_tag() {
        assert_eq!(Value::I32(42).tag(), TypeTag::Word32);
        assert_eq!(Value::F32(42.0).tag(), TypeTag::Word32);
        assert_eq!(Value::I64(42).tag(), TypeTag::Word64);
        assert_eq!(Value::F64(42.0).tag(), TypeTag::Word64);
        assert_eq!(Value::V128(1).tag(), TypeTag::Other);
        assert_eq!(Value::FuncRef(None).tag(), TypeTag::Other);
        assert_eq!(Value::ExternRef(Some(3)).tag(), TypeTag::Other);
    }

    #[test]
    fn test_native_size_classification() {
        assert_eq!(TypeTag::of::<i32>(), TypeTag::Word32);
        assert_eq!(TypeTag::of::<f32>(), TypeTag::Word32);
        assert_eq!(TypeTag::of::<u64>(), TypeTag::Word64);
        assert_eq!(TypeTag::of::<f64>(), TypeTag::Word64);
        assert_eq!(TypeTag::of::<u128>(), TypeTag::Other);
        // Anything not exactly 4 or 8 bytes falls into the catch-all
        assert_eq!(TypeTag::of::<u16>(), TypeTag::Other);
        assert_eq!(TypeTag::from_size(0), TypeTag::Other);

        assert_eq!(TypeTag::Word32.byte_width(), Some(4));
        assert_eq!(TypeTag::Word64.byte_width(), Some(8));
        assert_eq!(TypeTag::Other.byte_width(), None);
    }

    #[test]
    fn test_native_tag_matches_value_tag() {
        assert_eq!(Value::from(7u32).tag(), TypeTag::of::<u32>());
        assert_eq!(Value::from(7i64).tag(), TypeTag::of::<i64>());
        assert_eq!(Value::from(1.5f64).tag(), TypeTag::of::<f64>());
        assert_eq!(Value::from(u32::MAX), Value::I32(-1));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::I32(42).as_i32(), Some(42));
        assert_eq!(Value::I32(42).as_i64(), None);
        assert_eq!(Value::I64(42).as_i64(), Some(42));
        assert_eq!(Value::F32(42.0).as_f32(), Some(42.0));
        assert_eq!(Value::F64(42.0).as_f64(), Some(42.0));
        assert_eq!(Value::V128(9).as_v128(), Some(9));
    }

    #[test]
    fn test_serde_preserves_nan_bits() {
        let nan = Value::F32(f32::from_bits(0x7fc0_0001));
        let json = serde_json::to_string(&nan).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert!(nan.bits_eq(&back));

        let v = Value::V128(u128::MAX);
        let back: Value = serde_json::from_str(&serde_json::to_string(&v).unwrap()).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::I32(42)), "i32:42");
        assert_eq!(format!("{}", Value::I64(42)), "i64:42");
        assert_eq!(format!("{}", Value::FuncRef(None)), "funcref:null");
        assert_eq!(format!("{}", Value::ExternRef(Some(2))), "externref:2");
        assert_eq!(
            format!("{}", Value::V128(0x0102)),
            "v128:0x00000000000000000000000000000102"
        );
        let f32_str = format!("{}", Value::F32(42.0));
        assert!(f32_str.starts_with("f32:"));
    }
}
