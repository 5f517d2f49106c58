//! Binary encode/decode for values, steps and file headers.
//!
//! All integers are little-endian. Strings, byte arrays, lists and dicts
//! are length-prefixed with a `u32`. The format is intentionally simple:
//! no compression, no alignment padding. Each value carries a one-byte
//! type tag, so records are self-describing.

use std::io::{Read, Write};

use indexmap::IndexMap;
use trajlog_core::{DType, Shape, Step, StepType, Tensor, Value};

use crate::error::CodecError;
use crate::{FORMAT_VERSION, MAGIC, MAX_DEPTH};

// ── Value tags ──────────────────────────────────────────────────

const TAG_NONE: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_BYTES: u8 = 5;
const TAG_TENSOR: u8 = 6;
const TAG_LIST: u8 = 7;
const TAG_DICT: u8 = 8;

/// Highest tensor rank accepted by the decoder.
const MAX_RANK: u32 = 32;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), CodecError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian i64.
pub fn write_i64_le(w: &mut dyn Write, v: i64) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f64.
pub fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), CodecError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a `u32` length prefix, rejecting lengths that do not fit.
pub fn write_len(w: &mut dyn Write, len: usize) -> Result<(), CodecError> {
    let len = u32::try_from(len)
        .map_err(|_| CodecError::malformed(format!("length {len} exceeds u32::MAX")))?;
    write_u32_le(w, len)
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), CodecError> {
    write_len(w, s.len())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

/// Write a length-prefixed byte array (u32 length + bytes).
pub fn write_length_prefixed_bytes(w: &mut dyn Write, b: &[u8]) -> Result<(), CodecError> {
    write_len(w, b.len())?;
    w.write_all(b)?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, CodecError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, CodecError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, CodecError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a little-endian i64.
pub fn read_i64_le(r: &mut dyn Read) -> Result<i64, CodecError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Read a little-endian f64.
pub fn read_f64_le(r: &mut dyn Read) -> Result<f64, CodecError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read a length-prefixed byte array.
///
/// Reads through `take` so a corrupt length cannot force a huge
/// up-front allocation.
pub fn read_length_prefixed_bytes(r: &mut dyn Read) -> Result<Vec<u8>, CodecError> {
    let len = read_u32_le(r)? as usize;
    let mut buf = Vec::new();
    Read::take(&mut *r, len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(CodecError::malformed(format!(
            "truncated byte array: expected {len} bytes, got {}",
            buf.len()
        )));
    }
    Ok(buf)
}

/// Read a length-prefixed UTF-8 string.
pub fn read_length_prefixed_str(r: &mut dyn Read) -> Result<String, CodecError> {
    let buf = read_length_prefixed_bytes(r)?;
    String::from_utf8(buf).map_err(|e| CodecError::malformed(format!("invalid UTF-8 string: {e}")))
}

// ── File header ─────────────────────────────────────────────────

/// Which file of a log directory a header belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// Backend-wide metadata.
    Metadata,
    /// Length-prefixed step records.
    Steps,
    /// `u64` byte offsets into the steps file.
    StepOffsets,
    /// `(u64 first step, u64 length, u64 metadata offset)` triples, one per episode.
    EpisodeIndex,
    /// Length-prefixed episode metadata values.
    EpisodeMetadata,
}

impl FileKind {
    /// Single-byte tag stored in the header.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Metadata => 0,
            Self::Steps => 1,
            Self::StepOffsets => 2,
            Self::EpisodeIndex => 3,
            Self::EpisodeMetadata => 4,
        }
    }
}

/// Size in bytes of every file header.
pub const HEADER_LEN: u64 = 6;

/// Write magic, version and file kind.
pub fn encode_file_header(w: &mut dyn Write, kind: FileKind) -> Result<(), CodecError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;
    write_u8(w, kind.as_u8())?;
    Ok(())
}

/// Read and validate a file header of the expected kind.
pub fn decode_file_header(r: &mut dyn Read, kind: FileKind) -> Result<(), CodecError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(CodecError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion { found: version });
    }
    let found = read_u8(r)?;
    if found != kind.as_u8() {
        return Err(CodecError::UnexpectedFileKind {
            expected: kind.as_u8(),
            found,
        });
    }
    Ok(())
}

// ── Value encode/decode ─────────────────────────────────────────

/// Encode a value tree.
pub fn encode_value(w: &mut dyn Write, value: &Value) -> Result<(), CodecError> {
    match value {
        Value::None => write_u8(w, TAG_NONE)?,
        Value::Bool(b) => {
            write_u8(w, TAG_BOOL)?;
            write_u8(w, *b as u8)?;
        }
        Value::Int(v) => {
            write_u8(w, TAG_INT)?;
            write_i64_le(w, *v)?;
        }
        Value::Float(v) => {
            write_u8(w, TAG_FLOAT)?;
            write_f64_le(w, *v)?;
        }
        Value::Str(s) => {
            write_u8(w, TAG_STR)?;
            write_length_prefixed_str(w, s)?;
        }
        Value::Bytes(b) => {
            write_u8(w, TAG_BYTES)?;
            write_length_prefixed_bytes(w, b)?;
        }
        Value::Tensor(t) => {
            write_u8(w, TAG_TENSOR)?;
            write_u8(w, t.dtype().wire_tag())?;
            write_len(w, t.shape().len())?;
            for &dim in t.shape() {
                write_u64_le(w, dim as u64)?;
            }
            write_length_prefixed_bytes(w, t.data())?;
        }
        Value::List(items) => {
            write_u8(w, TAG_LIST)?;
            write_len(w, items.len())?;
            for item in items {
                encode_value(w, item)?;
            }
        }
        Value::Dict(map) => {
            write_u8(w, TAG_DICT)?;
            write_len(w, map.len())?;
            for (key, item) in map {
                write_length_prefixed_str(w, key)?;
                encode_value(w, item)?;
            }
        }
    }
    Ok(())
}

/// Decode a value tree.
pub fn decode_value(r: &mut dyn Read) -> Result<Value, CodecError> {
    decode_value_at(r, 0)
}

fn decode_value_at(r: &mut dyn Read, depth: usize) -> Result<Value, CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::DepthExceeded { limit: MAX_DEPTH });
    }
    let tag = read_u8(r)?;
    let value = match tag {
        TAG_NONE => Value::None,
        TAG_BOOL => match read_u8(r)? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => return Err(CodecError::malformed(format!("invalid bool byte {other}"))),
        },
        TAG_INT => Value::Int(read_i64_le(r)?),
        TAG_FLOAT => Value::Float(read_f64_le(r)?),
        TAG_STR => Value::Str(read_length_prefixed_str(r)?),
        TAG_BYTES => Value::Bytes(read_length_prefixed_bytes(r)?),
        TAG_TENSOR => Value::Tensor(decode_tensor(r)?),
        TAG_LIST => {
            let count = read_u32_le(r)? as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(decode_value_at(r, depth + 1)?);
            }
            Value::List(items)
        }
        TAG_DICT => {
            let count = read_u32_le(r)? as usize;
            let mut map = IndexMap::with_capacity(count.min(1024));
            for _ in 0..count {
                let key = read_length_prefixed_str(r)?;
                let item = decode_value_at(r, depth + 1)?;
                if map.insert(key.clone(), item).is_some() {
                    return Err(CodecError::malformed(format!("duplicate dict key '{key}'")));
                }
            }
            Value::Dict(map)
        }
        tag => return Err(CodecError::UnknownTag { tag }),
    };
    Ok(value)
}

fn decode_tensor(r: &mut dyn Read) -> Result<Tensor, CodecError> {
    let dtype_tag = read_u8(r)?;
    let dtype = DType::from_wire_tag(dtype_tag)
        .ok_or_else(|| CodecError::malformed(format!("unknown dtype tag {dtype_tag}")))?;
    let rank = read_u32_le(r)?;
    if rank > MAX_RANK {
        return Err(CodecError::malformed(format!("tensor rank {rank} exceeds {MAX_RANK}")));
    }
    let mut shape = Shape::new();
    let mut elements: usize = 1;
    for _ in 0..rank {
        let dim = usize::try_from(read_u64_le(r)?)
            .map_err(|_| CodecError::malformed("tensor dimension overflows usize"))?;
        elements = elements
            .checked_mul(dim)
            .ok_or_else(|| CodecError::malformed("tensor element count overflows usize"))?;
        shape.push(dim);
    }
    let data = read_length_prefixed_bytes(r)?;
    if elements.checked_mul(dtype.size_bytes()) != Some(data.len()) {
        return Err(CodecError::malformed(format!(
            "tensor data length {} does not match shape {:?} of {dtype}",
            data.len(),
            shape.as_slice()
        )));
    }
    Tensor::new(dtype, shape, data).map_err(|e| CodecError::malformed(e.to_string()))
}

// ── Step encode/decode ──────────────────────────────────────────

/// Encode one step record.
pub fn encode_step(w: &mut dyn Write, step: &Step) -> Result<(), CodecError> {
    write_u8(w, step.step_type.as_u8())?;
    encode_value(w, &step.observation)?;
    encode_value(w, &step.reward)?;
    encode_value(w, &step.discount)?;
    encode_value(w, &step.action)?;
    encode_value(w, &step.custom_data)?;
    Ok(())
}

/// Decode one step record.
pub fn decode_step(r: &mut dyn Read) -> Result<Step, CodecError> {
    let raw = read_u8(r)?;
    let step_type = StepType::from_u8(raw)
        .ok_or_else(|| CodecError::malformed(format!("invalid step type {raw}")))?;
    Ok(Step {
        step_type,
        observation: decode_value(r)?,
        reward: decode_value(r)?,
        discount: decode_value(r)?,
        action: decode_value(r)?,
        custom_data: decode_value(r)?,
    })
}

// ── Whole-buffer helpers ────────────────────────────────────────

/// Encode a value into a fresh buffer.
pub fn value_to_bytes(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_value(&mut buf, value)?;
    Ok(buf)
}

/// Decode a value that must span all of `bytes`.
pub fn value_from_bytes(bytes: &[u8]) -> Result<Value, CodecError> {
    let mut cursor = bytes;
    let value = decode_value(&mut cursor)?;
    ensure_consumed(cursor)?;
    Ok(value)
}

/// Encode a step into a fresh buffer.
pub fn step_to_bytes(step: &Step) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_step(&mut buf, step)?;
    Ok(buf)
}

/// Decode a step that must span all of `bytes`.
pub fn step_from_bytes(bytes: &[u8]) -> Result<Step, CodecError> {
    let mut cursor = bytes;
    let step = decode_step(&mut cursor)?;
    ensure_consumed(cursor)?;
    Ok(step)
}

fn ensure_consumed(rest: &[u8]) -> Result<(), CodecError> {
    if !rest.is_empty() {
        return Err(CodecError::malformed(format!(
            "{} trailing bytes after record",
            rest.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_tensor() -> impl Strategy<Value = Tensor> {
        prop_oneof![
            prop::collection::vec(any::<f32>(), 0..16)
                .prop_map(|v| Tensor::from_slice(&[v.len()], &v).unwrap()),
            prop::collection::vec(any::<i32>(), 6)
                .prop_map(|v| Tensor::from_slice(&[2, 3], &v).unwrap()),
            any::<u8>().prop_map(Tensor::scalar),
        ]
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::None),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<f64>()
                .prop_filter("NaN breaks equality", |f| !f.is_nan())
                .prop_map(Value::Float),
            "[a-z0-9 ]{0,16}".prop_map(Value::Str),
            prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
            arb_tensor().prop_map(Value::Tensor),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                prop::collection::vec(("[a-z]{1,6}", inner), 0..4)
                    .prop_map(|pairs| Value::Dict(pairs.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn roundtrip_value(v in arb_value()) {
            let bytes = value_to_bytes(&v).unwrap();
            prop_assert_eq!(value_from_bytes(&bytes).unwrap(), v);
        }

        #[test]
        fn truncated_value_never_decodes(v in arb_value(), cut in 1usize..8) {
            let bytes = value_to_bytes(&v).unwrap();
            let cut = cut.min(bytes.len());
            let truncated = &bytes[..bytes.len() - cut];
            prop_assert!(value_from_bytes(truncated).is_err());
        }
    }

    #[test]
    fn roundtrip_step() {
        let step = Step::new(StepType::Last, Value::Tensor(Tensor::scalar(3i32)))
            .with_transition(1.0f32, 0.0f32)
            .with_action(Value::Tensor(Tensor::scalar(2i64)))
            .with_custom_data(Value::dict([("timestamp", Value::Float(12.5))]));
        let bytes = step_to_bytes(&step).unwrap();
        assert_eq!(step_from_bytes(&bytes).unwrap(), step);
    }

    #[test]
    fn header_roundtrip_and_kind_check() {
        let mut buf = Vec::new();
        encode_file_header(&mut buf, FileKind::Steps).unwrap();
        assert_eq!(buf.len() as u64, HEADER_LEN);
        decode_file_header(&mut buf.as_slice(), FileKind::Steps).unwrap();
        let err = decode_file_header(&mut buf.as_slice(), FileKind::StepOffsets).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnexpectedFileKind { expected: 2, found: 1 }
        ));
    }

    #[test]
    fn bad_magic_rejected() {
        let data = b"XRJL\x01\x01";
        let err = decode_file_header(&mut data.as_slice(), FileKind::Steps).unwrap_err();
        assert!(matches!(err, CodecError::InvalidMagic));
    }

    #[test]
    fn bad_version_rejected() {
        let data = b"TRJL\x09\x01";
        let err = decode_file_header(&mut data.as_slice(), FileKind::Steps).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedVersion { found: 9 }));
    }

    #[test]
    fn unknown_tag_rejected() {
        let err = value_from_bytes(&[99]).unwrap_err();
        assert!(matches!(err, CodecError::UnknownTag { tag: 99 }));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let err = value_from_bytes(&[TAG_NONE, TAG_NONE]).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn deep_nesting_rejected() {
        // MAX_DEPTH + 2 nested single-element lists.
        let mut bytes = Vec::new();
        for _ in 0..MAX_DEPTH + 2 {
            bytes.push(TAG_LIST);
            bytes.extend_from_slice(&1u32.to_le_bytes());
        }
        bytes.push(TAG_NONE);
        let err = value_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::DepthExceeded { .. }));
    }

    #[test]
    fn tensor_length_mismatch_rejected() {
        let mut bytes = vec![TAG_TENSOR, DType::Int32.wire_tag()];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&3u64.to_le_bytes());
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 4]);
        let err = value_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn huge_length_prefix_does_not_allocate() {
        let mut bytes = vec![TAG_BYTES];
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let err = value_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }
}
