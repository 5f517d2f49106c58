//! The backend-agnostic value tree.
//!
//! Every piece of data a backend stores (backend metadata, episode
//! metadata, the payload fields of a [`Step`](crate::Step)) is a
//! [`Value`]. Dictionaries keep insertion order so that encoded
//! metadata is byte-for-byte reproducible.

use indexmap::IndexMap;

use crate::dtype::DType;
use crate::spec::Shape;

/// A nested, self-describing value.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    None,
    /// Boolean scalar.
    Bool(bool),
    /// Signed integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Opaque byte string.
    Bytes(Vec<u8>),
    /// Dense n-dimensional array.
    Tensor(Tensor),
    /// Ordered heterogeneous sequence.
    List(Vec<Value>),
    /// String-keyed mapping, insertion ordered.
    Dict(IndexMap<String, Value>),
}

impl Value {
    /// Build a [`Value::Dict`] from key/value pairs.
    ///
    /// ```
    /// use trajlog_core::Value;
    ///
    /// let v = Value::dict([("agent", Value::from("random")), ("episodes", Value::from(3))]);
    /// assert_eq!(v.get("episodes"), Some(&Value::Int(3)));
    /// ```
    pub fn dict<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// An empty [`Value::Dict`].
    pub fn empty_dict() -> Self {
        Value::Dict(IndexMap::new())
    }

    /// Look up `key` if this is a dictionary.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(map) => map.get(key),
            _ => None,
        }
    }

    /// Borrow the mapping if this is a dictionary.
    pub fn as_dict(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the elements if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The string contents if this is a [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer if this is a [`Value::Int`].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of an `Int` or `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this is [`Value::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// `None` and the empty dictionary both mean "nothing recorded".
    pub fn is_absent(&self) -> bool {
        match self {
            Value::None => true,
            Value::Dict(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Tensor(_) => "tensor",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v $(as $cast)?)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int as i64,
    i64 => Int,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float,
    String => Str,
    Vec<u8> => Bytes,
    Tensor => Tensor,
    Vec<Value> => List,
    IndexMap<String, Value> => Dict,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

// ── Tensor ──────────────────────────────────────────────────────

/// The element count implied by a shape does not match the data length.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("tensor of shape {shape:?} and dtype {dtype} needs {expected} bytes, got {found}")]
pub struct TensorShapeError {
    /// Requested shape.
    pub shape: Shape,
    /// Requested dtype.
    pub dtype: DType,
    /// Byte length implied by shape and dtype.
    pub expected: usize,
    /// Byte length supplied.
    pub found: usize,
}

/// A dense array stored as raw little-endian element bytes.
///
/// A scalar has an empty shape and exactly one element.
///
/// ```
/// use trajlog_core::{DType, Tensor};
///
/// let t = Tensor::from_slice(&[2, 2], &[1.0f32, 2.0, 3.0, 4.0]).unwrap();
/// assert_eq!(t.dtype(), DType::Float32);
/// assert_eq!(t.num_elements(), 4);
/// assert_eq!(t.to_vec::<f32>(), Some(vec![1.0, 2.0, 3.0, 4.0]));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    dtype: DType,
    shape: Shape,
    data: Vec<u8>,
}

impl Tensor {
    /// Wrap raw little-endian bytes, validating length against the shape.
    pub fn new(dtype: DType, shape: Shape, data: Vec<u8>) -> Result<Self, TensorShapeError> {
        let expected = shape.iter().product::<usize>() * dtype.size_bytes();
        if data.len() != expected {
            return Err(TensorShapeError {
                shape,
                dtype,
                expected,
                found: data.len(),
            });
        }
        Ok(Self { dtype, shape, data })
    }

    /// Build a tensor from typed elements.
    pub fn from_slice<T: Element>(shape: &[usize], values: &[T]) -> Result<Self, TensorShapeError> {
        let mut data = Vec::with_capacity(values.len() * T::DTYPE.size_bytes());
        for &v in values {
            v.write_le(&mut data);
        }
        Self::new(T::DTYPE, Shape::from_slice(shape), data)
    }

    /// A zero-rank tensor holding one element.
    pub fn scalar<T: Element>(value: T) -> Self {
        let mut data = Vec::with_capacity(T::DTYPE.size_bytes());
        value.write_le(&mut data);
        Self {
            dtype: T::DTYPE,
            shape: Shape::new(),
            data,
        }
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Dimensions, outermost first.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Raw little-endian element bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of elements.
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Decode the elements, or `None` if `T` does not match the dtype.
    pub fn to_vec<T: Element>(&self) -> Option<Vec<T>> {
        if T::DTYPE != self.dtype {
            return None;
        }
        let width = self.dtype.size_bytes();
        Some(self.data.chunks_exact(width).map(T::read_le).collect())
    }
}

/// A primitive type that can be stored as a tensor element.
pub trait Element: Copy {
    /// The matching dtype.
    const DTYPE: DType;
    /// Append the little-endian encoding.
    fn write_le(self, out: &mut Vec<u8>);
    /// Decode from exactly `DTYPE.size_bytes()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! numeric_element {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$dtype;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(bytes);
                    <$t>::from_le_bytes(buf)
                }
            }
        )*
    };
}

numeric_element! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn tensor_rejects_wrong_length() {
        let err = Tensor::new(DType::Int32, smallvec![3], vec![0; 8]).unwrap_err();
        assert_eq!(err.expected, 12);
        assert_eq!(err.found, 8);
    }

    #[test]
    fn scalar_tensor_has_one_element() {
        let t = Tensor::scalar(7i32);
        assert!(t.shape().is_empty());
        assert_eq!(t.num_elements(), 1);
        assert_eq!(t.to_vec::<i32>(), Some(vec![7]));
        assert_eq!(t.to_vec::<i64>(), None);
    }

    #[test]
    fn bool_tensor_decodes() {
        let t = Tensor::from_slice(&[3], &[true, false, true]).unwrap();
        assert_eq!(t.data(), &[1, 0, 1]);
        assert_eq!(t.to_vec::<bool>(), Some(vec![true, false, true]));
    }

    #[test]
    fn empty_dict_counts_as_absent() {
        assert!(Value::None.is_absent());
        assert!(Value::empty_dict().is_absent());
        assert!(!Value::dict([("k", Value::Int(1))]).is_absent());
        assert!(!Value::List(vec![]).is_absent());
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::None);
        assert_eq!(Value::from(Some("x")), Value::Str("x".into()));
    }
}
