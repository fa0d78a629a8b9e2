//! The typed values manipulated by the VM.
//!
//! `StackItem` is a closed sum. Primitive variants (Boolean, Integer,
//! ByteString) carry their value; compound variants (Array, Struct, Map,
//! Buffer) are handles onto shared interiors so clones preserve identity
//! and the reference counter can observe lifetimes.

pub mod array;
pub mod buffer;
pub mod integer;
pub mod interop;
pub mod map;
pub mod pointer;
pub mod stack_item_type;

pub use array::{ArrayItem, StructItem};
pub use buffer::BufferItem;
pub use interop::InteropItem;
pub use map::{MapItem, VmOrderedDictionary};
pub use pointer::PointerItem;
pub use stack_item_type::StackItemType;

use crate::error::{VmError, VmResult};
use crate::execution_engine_limits::ExecutionEngineLimits;
use crate::script::Script;
use num_bigint::BigInt;
use num_traits::{One, Zero};
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_ITEM_ID: AtomicUsize = AtomicUsize::new(1);

/// Allocates a process-unique identity for a compound or interop item.
pub(crate) fn next_item_id() -> usize {
    NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed)
}

/// A value on the evaluation stack.
#[derive(Debug, Clone)]
pub enum StackItem {
    /// The absence of a value; compares equal only to itself.
    Null,
    Boolean(bool),
    Integer(BigInt),
    /// Immutable byte sequence.
    ByteString(Vec<u8>),
    /// Mutable byte sequence with reference semantics.
    Buffer(BufferItem),
    Array(ArrayItem),
    Struct(StructItem),
    Map(MapItem),
    Pointer(PointerItem),
    InteropInterface(InteropItem),
}

impl StackItem {
    /// The Null singleton.
    pub const fn null() -> StackItem {
        StackItem::Null
    }

    /// Creates a boolean item.
    pub const fn from_bool(value: bool) -> StackItem {
        StackItem::Boolean(value)
    }

    /// Creates an integer item.
    pub fn from_int<T: Into<BigInt>>(value: T) -> StackItem {
        StackItem::Integer(value.into())
    }

    /// Creates a byte-string item.
    pub fn from_byte_string<T: Into<Vec<u8>>>(value: T) -> StackItem {
        StackItem::ByteString(value.into())
    }

    /// Creates a buffer item.
    pub fn from_buffer<T: Into<Vec<u8>>>(value: T) -> StackItem {
        StackItem::Buffer(BufferItem::new(value.into()))
    }

    /// Creates an array item.
    pub fn from_array(items: Vec<StackItem>) -> StackItem {
        StackItem::Array(ArrayItem::new(items))
    }

    /// Creates a struct item.
    pub fn from_struct(items: Vec<StackItem>) -> StackItem {
        StackItem::Struct(StructItem::new(items))
    }

    /// Creates an empty map item.
    pub fn new_map() -> StackItem {
        StackItem::Map(MapItem::new())
    }

    /// Creates a pointer item.
    pub fn from_pointer(script: Script, position: usize) -> StackItem {
        StackItem::Pointer(PointerItem::new(script, position))
    }

    /// Wraps a host value into an interop handle.
    pub fn from_interop<T: std::any::Any>(name: &'static str, value: T) -> StackItem {
        StackItem::InteropInterface(InteropItem::new(name, value))
    }

    /// The type tag.
    pub const fn item_type(&self) -> StackItemType {
        match self {
            StackItem::Null => StackItemType::Any,
            StackItem::Boolean(_) => StackItemType::Boolean,
            StackItem::Integer(_) => StackItemType::Integer,
            StackItem::ByteString(_) => StackItemType::ByteString,
            StackItem::Buffer(_) => StackItemType::Buffer,
            StackItem::Array(_) => StackItemType::Array,
            StackItem::Struct(_) => StackItemType::Struct,
            StackItem::Map(_) => StackItemType::Map,
            StackItem::Pointer(_) => StackItemType::Pointer,
            StackItem::InteropInterface(_) => StackItemType::InteropInterface,
        }
    }

    /// Whether this is Null.
    pub const fn is_null(&self) -> bool {
        matches!(self, StackItem::Null)
    }

    /// The identity of a compound, buffer, or interop item.
    pub fn compound_id(&self) -> Option<usize> {
        match self {
            StackItem::Buffer(b) => Some(b.id()),
            StackItem::Array(a) => Some(a.id()),
            StackItem::Struct(s) => Some(s.id()),
            StackItem::Map(m) => Some(m.id()),
            StackItem::InteropInterface(i) => Some(i.id()),
            _ => None,
        }
    }

    /// The directly contained items of a compound (keys and values for a
    /// map), for reference-graph traversal.
    pub fn children(&self) -> Vec<StackItem> {
        match self {
            StackItem::Array(a) => a.borrow().clone(),
            StackItem::Struct(s) => s.borrow().clone(),
            StackItem::Map(m) => {
                let dict = m.borrow();
                let mut children = Vec::with_capacity(dict.len() * 2);
                for (key, value) in dict.entries() {
                    children.push(key.clone());
                    children.push(value.clone());
                }
                children
            }
            _ => Vec::new(),
        }
    }

    /// Boolean interpretation. Byte strings are true iff any byte is
    /// nonzero; every compound, pointer, and interop handle is true.
    pub fn as_bool(&self) -> VmResult<bool> {
        match self {
            StackItem::Null => Ok(false),
            StackItem::Boolean(value) => Ok(*value),
            StackItem::Integer(value) => Ok(!value.is_zero()),
            StackItem::ByteString(bytes) => {
                if bytes.len() > integer::MAX_INTEGER_SIZE {
                    return Err(VmError::invalid_argument(
                        "byte string too long for boolean conversion",
                    ));
                }
                Ok(bytes.iter().any(|&b| b != 0))
            }
            StackItem::Buffer(_)
            | StackItem::Array(_)
            | StackItem::Struct(_)
            | StackItem::Map(_)
            | StackItem::Pointer(_)
            | StackItem::InteropInterface(_) => Ok(true),
        }
    }

    /// Integer interpretation; byte sequences decode two's-complement LE
    /// and must fit the 32-byte cap.
    pub fn as_int(&self) -> VmResult<BigInt> {
        match self {
            StackItem::Boolean(value) => Ok(if *value { BigInt::one() } else { BigInt::zero() }),
            StackItem::Integer(value) => Ok(value.clone()),
            StackItem::ByteString(bytes) => {
                if bytes.len() > integer::MAX_INTEGER_SIZE {
                    return Err(VmError::invalid_argument(
                        "byte string too long for integer conversion",
                    ));
                }
                Ok(integer::from_bytes_le(bytes))
            }
            StackItem::Buffer(buffer) => {
                let bytes = buffer.to_vec();
                if bytes.len() > integer::MAX_INTEGER_SIZE {
                    return Err(VmError::invalid_argument(
                        "buffer too long for integer conversion",
                    ));
                }
                Ok(integer::from_bytes_le(&bytes))
            }
            other => Err(other.type_mismatch("Integer")),
        }
    }

    /// The byte span: content for byte sequences, minimal encoding for
    /// integers, a single 0/1 byte for booleans.
    pub fn as_bytes(&self) -> VmResult<Vec<u8>> {
        match self {
            StackItem::Boolean(value) => Ok(vec![u8::from(*value)]),
            StackItem::Integer(value) => Ok(integer::to_bytes_le(value)),
            StackItem::ByteString(bytes) => Ok(bytes.clone()),
            StackItem::Buffer(buffer) => Ok(buffer.to_vec()),
            other => Err(other.type_mismatch("ByteString")),
        }
    }

    /// UTF-8 view of the byte span.
    pub fn as_string(&self) -> VmResult<String> {
        let bytes = self.as_bytes()?;
        String::from_utf8(bytes)
            .map_err(|_| VmError::invalid_argument("byte span is not valid UTF-8"))
    }

    /// A `TypeMismatch` error naming the actual variant.
    pub fn type_mismatch(&self, expected: &'static str) -> VmError {
        VmError::TypeMismatch {
            expected,
            actual: self.item_type().name(),
        }
    }

    /// Equality per the stack-item laws: value equality on primitives
    /// (cross-variant by byte span), identity on reference variants,
    /// recursive structural equality on Structs bounded by
    /// `max_comparable_size` counted bytes.
    pub fn equals(&self, other: &StackItem, limits: &ExecutionEngineLimits) -> VmResult<bool> {
        let mut budget = limits.max_comparable_size;
        self.equals_inner(other, &mut budget)
    }

    fn equals_inner(&self, other: &StackItem, budget: &mut usize) -> VmResult<bool> {
        let cost = |bytes: &[u8]| bytes.len().max(1);
        match (self, other) {
            (StackItem::Null, StackItem::Null) => Ok(true),
            (StackItem::Null, _) | (_, StackItem::Null) => Ok(false),
            (StackItem::Buffer(a), StackItem::Buffer(b)) => Ok(a.same_identity(b)),
            (StackItem::Array(a), StackItem::Array(b)) => Ok(a.same_identity(b)),
            (StackItem::Map(a), StackItem::Map(b)) => Ok(a.same_identity(b)),
            (StackItem::Pointer(a), StackItem::Pointer(b)) => Ok(a.equals(b)),
            (StackItem::InteropInterface(a), StackItem::InteropInterface(b)) => {
                Ok(a.same_identity(b))
            }
            (StackItem::Struct(a), StackItem::Struct(b)) => {
                if a.same_identity(b) {
                    return Ok(true);
                }
                let left = a.borrow().clone();
                let right = b.borrow().clone();
                if left.len() != right.len() {
                    return Ok(false);
                }
                for (x, y) in left.iter().zip(right.iter()) {
                    if !x.equals_inner(y, budget)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (left, right)
                if left.item_type().is_primitive() && right.item_type().is_primitive() =>
            {
                let a = left.as_bytes()?;
                let b = right.as_bytes()?;
                let needed = cost(&a).max(cost(&b));
                if *budget < needed {
                    return Err(VmError::LimitExceeded {
                        what: "comparable size",
                        value: needed,
                        limit: *budget,
                    });
                }
                *budget -= needed;
                Ok(a == b)
            }
            // Remaining cross-variant pairs (compound vs primitive, struct
            // vs array, buffer vs bytestring) are never equal.
            _ => Ok(false),
        }
    }

    /// Deep copy with fresh identities, used for Struct assignment
    /// semantics. Bounded by `max_stack_size` copied items.
    pub fn deep_copy(&self, limits: &ExecutionEngineLimits) -> VmResult<StackItem> {
        let mut count = 0usize;
        self.deep_copy_inner(limits, &mut count)
    }

    fn deep_copy_inner(
        &self,
        limits: &ExecutionEngineLimits,
        count: &mut usize,
    ) -> VmResult<StackItem> {
        *count += 1;
        if *count > limits.max_stack_size {
            return Err(VmError::LimitExceeded {
                what: "clone size",
                value: *count,
                limit: limits.max_stack_size,
            });
        }
        match self {
            StackItem::Struct(s) => {
                let fields = s.borrow().clone();
                let mut copied = Vec::with_capacity(fields.len());
                for field in &fields {
                    copied.push(field.deep_copy_inner(limits, count)?);
                }
                Ok(StackItem::Struct(StructItem::new(copied)))
            }
            StackItem::Array(a) => {
                let items = a.borrow().clone();
                let mut copied = Vec::with_capacity(items.len());
                for item in &items {
                    copied.push(item.deep_copy_inner(limits, count)?);
                }
                Ok(StackItem::Array(ArrayItem::new(copied)))
            }
            StackItem::Map(m) => {
                let entries = m.borrow().entries().to_vec();
                let copy = MapItem::new();
                for (key, value) in entries {
                    let copied_value = value.deep_copy_inner(limits, count)?;
                    copy.borrow_mut().insert(key, copied_value)?;
                }
                Ok(StackItem::Map(copy))
            }
            StackItem::Buffer(b) => Ok(StackItem::Buffer(BufferItem::new(b.to_vec()))),
            other => Ok(other.clone()),
        }
    }

    /// Explicit CONVERT semantics.
    pub fn convert_to(
        &self,
        target: StackItemType,
        limits: &ExecutionEngineLimits,
    ) -> VmResult<StackItem> {
        if self.item_type() == target {
            return Ok(self.clone());
        }
        if self.is_null() {
            return match target {
                StackItemType::Any => Ok(StackItem::Null),
                StackItemType::Boolean => Ok(StackItem::Boolean(false)),
                _ => Err(VmError::invalid_argument(format!(
                    "cannot convert Null to {}",
                    target.name()
                ))),
            };
        }
        match target {
            StackItemType::Boolean => Ok(StackItem::Boolean(self.as_bool()?)),
            StackItemType::Integer => Ok(StackItem::Integer(self.as_int()?)),
            StackItemType::ByteString => {
                let bytes = self.as_bytes()?;
                limits.assert_max_item_size(bytes.len())?;
                Ok(StackItem::ByteString(bytes))
            }
            StackItemType::Buffer => {
                let bytes = self.as_bytes()?;
                limits.assert_max_item_size(bytes.len())?;
                Ok(StackItem::Buffer(BufferItem::new(bytes)))
            }
            StackItemType::Array => match self {
                StackItem::Struct(s) => Ok(StackItem::Array(ArrayItem::new(s.borrow().clone()))),
                other => Err(other.type_mismatch("Struct")),
            },
            StackItemType::Struct => match self {
                StackItem::Array(a) => Ok(StackItem::Struct(StructItem::new(a.borrow().clone()))),
                other => Err(other.type_mismatch("Array")),
            },
            StackItemType::Map
            | StackItemType::Pointer
            | StackItemType::InteropInterface
            | StackItemType::Any => Err(VmError::invalid_argument(format!(
                "cannot convert {} to {}",
                self.item_type().name(),
                target.name()
            ))),
        }
    }

    /// A short value rendering for diagnostics and receipts.
    pub fn display_value(&self) -> String {
        match self {
            StackItem::Null => "null".into(),
            StackItem::Boolean(value) => value.to_string(),
            StackItem::Integer(value) => value.to_string(),
            StackItem::ByteString(bytes) => format!("0x{}", to_hex(bytes)),
            StackItem::Buffer(buffer) => format!("0x{}", to_hex(&buffer.to_vec())),
            StackItem::Array(a) => format!("Array[{}]", a.len()),
            StackItem::Struct(s) => format!("Struct[{}]", s.len()),
            StackItem::Map(m) => format!("Map[{}]", m.len()),
            StackItem::Pointer(p) => format!("Pointer({})", p.position()),
            StackItem::InteropInterface(i) => format!("InteropInterface({})", i.interface_name()),
        }
    }

    /// Enforces the 32-byte cap when this item is an Integer.
    pub fn check_integer_cap(&self) -> VmResult<()> {
        if let StackItem::Integer(value) = self {
            integer::check(value, "push")?;
        }
        Ok(())
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

impl From<bool> for StackItem {
    fn from(value: bool) -> StackItem {
        StackItem::Boolean(value)
    }
}

impl From<BigInt> for StackItem {
    fn from(value: BigInt) -> StackItem {
        StackItem::Integer(value)
    }
}

impl From<i64> for StackItem {
    fn from(value: i64) -> StackItem {
        StackItem::Integer(BigInt::from(value))
    }
}

impl From<Vec<u8>> for StackItem {
    fn from(value: Vec<u8>) -> StackItem {
        StackItem::ByteString(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ExecutionEngineLimits {
        ExecutionEngineLimits::default()
    }

    #[test]
    fn bytestring_bool_is_any_nonzero() {
        assert!(!StackItem::from_byte_string(vec![0, 0, 0])
            .as_bool()
            .unwrap());
        assert!(StackItem::from_byte_string(vec![0, 1, 0]).as_bool().unwrap());
        assert!(!StackItem::from_byte_string(Vec::new()).as_bool().unwrap());
    }

    #[test]
    fn array_equality_is_identity() {
        let a = StackItem::from_array(vec![StackItem::from_int(1)]);
        let b = a.clone();
        let c = StackItem::from_array(vec![StackItem::from_int(1)]);
        assert!(a.equals(&b, &limits()).unwrap());
        assert!(!a.equals(&c, &limits()).unwrap());
    }

    #[test]
    fn struct_equality_is_structural() {
        let a = StackItem::from_struct(vec![StackItem::from_int(1), StackItem::from_bool(true)]);
        let b = StackItem::from_struct(vec![StackItem::from_int(1), StackItem::from_bool(true)]);
        let c = StackItem::from_struct(vec![StackItem::from_int(2), StackItem::from_bool(true)]);
        assert!(a.equals(&b, &limits()).unwrap());
        assert!(!a.equals(&c, &limits()).unwrap());
    }

    #[test]
    fn struct_never_equals_array() {
        let s = StackItem::from_struct(vec![StackItem::from_int(1)]);
        let a = StackItem::from_array(vec![StackItem::from_int(1)]);
        assert!(!s.equals(&a, &limits()).unwrap());
        let converted = a.convert_to(StackItemType::Struct, &limits()).unwrap();
        assert!(s.equals(&converted, &limits()).unwrap());
    }

    #[test]
    fn cross_primitive_span_equality() {
        let one_int = StackItem::from_int(1);
        let one_bytes = StackItem::from_byte_string(vec![0x01]);
        let one_bool = StackItem::from_bool(true);
        assert!(one_int.equals(&one_bytes, &limits()).unwrap());
        assert!(one_int.equals(&one_bool, &limits()).unwrap());
        // Integer 0 encodes empty; Boolean false encodes [0].
        assert!(!StackItem::from_int(0)
            .equals(&StackItem::from_bool(false), &limits())
            .unwrap());
    }

    #[test]
    fn comparable_size_is_bounded() {
        let big = StackItem::from_byte_string(vec![7u8; 70_000]);
        let other = StackItem::from_byte_string(vec![7u8; 70_000]);
        assert!(matches!(
            big.equals(&other, &limits()),
            Err(VmError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn null_converts_only_to_any_and_boolean() {
        assert!(matches!(
            StackItem::Null
                .convert_to(StackItemType::Boolean, &limits())
                .unwrap(),
            StackItem::Boolean(false)
        ));
        assert!(StackItem::Null
            .convert_to(StackItemType::Integer, &limits())
            .is_err());
    }

    #[test]
    fn integer_bytestring_round_trip() {
        let value = StackItem::from_int(-129);
        let bytes = value.convert_to(StackItemType::ByteString, &limits()).unwrap();
        let back = bytes.convert_to(StackItemType::Integer, &limits()).unwrap();
        assert!(value.equals(&back, &limits()).unwrap());
    }

    #[test]
    fn struct_deep_copy_is_detached() {
        let inner = StackItem::from_struct(vec![StackItem::from_int(1)]);
        let outer = StackItem::from_struct(vec![inner]);
        let copy = outer.deep_copy(&limits()).unwrap();
        // Mutate the original's inner struct; the copy must not change.
        if let StackItem::Struct(s) = &outer {
            let inner = s.borrow()[0].clone();
            if let StackItem::Struct(i) = inner {
                i.borrow_mut()[0] = StackItem::from_int(99);
            }
        }
        if let StackItem::Struct(s) = &copy {
            let inner = s.borrow()[0].clone();
            if let StackItem::Struct(i) = inner {
                assert!(i.borrow()[0]
                    .equals(&StackItem::from_int(1), &limits())
                    .unwrap());
            } else {
                panic!("expected struct");
            }
        } else {
            panic!("expected struct");
        }
    }

    #[test]
    fn buffer_conversion_snapshots() {
        let buffer = StackItem::from_buffer(vec![1, 2, 3]);
        let snapshot = buffer
            .convert_to(StackItemType::ByteString, &limits())
            .unwrap();
        if let StackItem::Buffer(b) = &buffer {
            b.borrow_mut()[0] = 9;
        }
        assert_eq!(snapshot.as_bytes().unwrap(), vec![1, 2, 3]);
    }
}
