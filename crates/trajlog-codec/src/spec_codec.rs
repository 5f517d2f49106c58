//! Conversion between spec trees and their stored value form.
//!
//! Specs are stored as plain [`Value`] trees so any backend can keep
//! them in its metadata without knowing about specs:
//!
//! - a leaf [`ArraySpec`] becomes a dict tagged with `"__spec__"`
//!   (`"array"`, `"bounded_array"` or `"discrete_array"`) holding
//!   `shape`, `dtype`, `name` and, for bounded kinds, `minimum`/`maximum`
//!   or `num_values`;
//! - a [`Spec::Tuple`] becomes a list;
//! - a [`Spec::Dict`] becomes a dict without the `"__spec__"` marker;
//! - [`Spec::None`] becomes [`Value::None`].
//!
//! The key `"__spec__"` is therefore reserved: encoding a dict spec with
//! a child of that name fails with [`SpecCodecError::ReservedKey`].

use indexmap::IndexMap;
use trajlog_core::{ArraySpec, Bounds, DType, EnvironmentSpecs, Shape, Spec, Value};

use crate::error::SpecCodecError;

const SPEC_MARKER: &str = "__spec__";
const KIND_ARRAY: &str = "array";
const KIND_BOUNDED: &str = "bounded_array";
const KIND_DISCRETE: &str = "discrete_array";

// ── Encode ──────────────────────────────────────────────────────

/// Encode one spec tree.
///
/// Fails with [`SpecCodecError::ReservedKey`] when a dict spec has a
/// child named `"__spec__"`, which would decode as an array spec.
///
/// # Examples
///
/// ```
/// use trajlog_codec::{decode_spec, encode_spec};
/// use trajlog_core::{ArraySpec, DType, Spec};
///
/// let spec = Spec::from(ArraySpec::new(&[3], DType::Float32).named("velocity"));
/// let encoded = encode_spec(&spec).unwrap();
/// assert_eq!(encoded.get("dtype").and_then(|v| v.as_str()), Some("float32"));
/// assert_eq!(decode_spec(&encoded).unwrap(), spec);
/// ```
pub fn encode_spec(spec: &Spec) -> Result<Value, SpecCodecError> {
    encode_spec_at(spec, "spec")
}

fn encode_spec_at(spec: &Spec, path: &str) -> Result<Value, SpecCodecError> {
    Ok(match spec {
        Spec::None => Value::None,
        Spec::Array(array) => encode_array_spec(array),
        Spec::Tuple(children) => Value::List(
            children
                .iter()
                .enumerate()
                .map(|(i, child)| encode_spec_at(child, &format!("{path}[{i}]")))
                .collect::<Result<_, _>>()?,
        ),
        Spec::Dict(children) => {
            if children.contains_key(SPEC_MARKER) {
                return Err(SpecCodecError::ReservedKey {
                    path: path.to_string(),
                    key: SPEC_MARKER,
                });
            }
            Value::Dict(
                children
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), encode_spec_at(v, &format!("{path}.{k}"))?)))
                    .collect::<Result<_, SpecCodecError>>()?,
            )
        }
    })
}

fn encode_array_spec(spec: &ArraySpec) -> Value {
    let kind = match spec.bounds {
        None => KIND_ARRAY,
        Some(Bounds::Range { .. }) => KIND_BOUNDED,
        Some(Bounds::Discrete { .. }) => KIND_DISCRETE,
    };
    let mut map = IndexMap::new();
    map.insert(SPEC_MARKER.to_string(), Value::from(kind));
    map.insert(
        "shape".to_string(),
        Value::List(spec.shape.iter().map(|&d| Value::Int(d as i64)).collect()),
    );
    map.insert("dtype".to_string(), Value::from(spec.dtype.name()));
    map.insert("name".to_string(), Value::from(spec.name.clone()));
    match &spec.bounds {
        None => {}
        Some(Bounds::Range { minimum, maximum }) => {
            map.insert("minimum".to_string(), minimum.clone());
            map.insert("maximum".to_string(), maximum.clone());
        }
        Some(Bounds::Discrete { num_values }) => {
            map.insert("num_values".to_string(), Value::Int(*num_values));
        }
    }
    Value::Dict(map)
}

/// Encode the four environment specs into the value stored under the
/// `environment_specs` metadata key.
pub fn encode_environment_specs(specs: &EnvironmentSpecs) -> Result<Value, SpecCodecError> {
    Ok(Value::dict([
        ("observation_spec", encode_spec_at(&specs.observation_spec, "observation_spec")?),
        ("action_spec", encode_spec_at(&specs.action_spec, "action_spec")?),
        ("reward_spec", encode_spec_at(&specs.reward_spec, "reward_spec")?),
        ("discount_spec", encode_spec_at(&specs.discount_spec, "discount_spec")?),
    ]))
}

// ── Decode ──────────────────────────────────────────────────────

/// Decode one spec tree.
pub fn decode_spec(value: &Value) -> Result<Spec, SpecCodecError> {
    decode_spec_at(value, "spec")
}

/// Decode the value stored under the `environment_specs` metadata key.
///
/// All four keys are required; each may hold [`Value::None`] for a
/// stream the environment does not produce.
pub fn decode_environment_specs(value: &Value) -> Result<EnvironmentSpecs, SpecCodecError> {
    const ROOT: &str = "environment_specs";
    let map = value.as_dict().ok_or_else(|| SpecCodecError::NotAMapping {
        path: ROOT.to_string(),
        found: value.kind(),
    })?;
    let field = |key: &str| -> Result<Spec, SpecCodecError> {
        let encoded = map.get(key).ok_or_else(|| SpecCodecError::MissingKey {
            path: ROOT.to_string(),
            key: key.to_string(),
        })?;
        decode_spec_at(encoded, key)
    };
    Ok(EnvironmentSpecs {
        observation_spec: field("observation_spec")?,
        action_spec: field("action_spec")?,
        reward_spec: field("reward_spec")?,
        discount_spec: field("discount_spec")?,
    })
}

fn decode_spec_at(value: &Value, path: &str) -> Result<Spec, SpecCodecError> {
    match value {
        Value::None => Ok(Spec::None),
        Value::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| decode_spec_at(item, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Spec::Tuple),
        Value::Dict(map) if map.contains_key(SPEC_MARKER) => {
            decode_array_spec(map, path).map(Spec::Array)
        }
        Value::Dict(map) => {
            let mut children = IndexMap::with_capacity(map.len());
            for (key, item) in map {
                children.insert(key.clone(), decode_spec_at(item, &format!("{path}.{key}"))?);
            }
            Ok(Spec::Dict(children))
        }
        other => Err(SpecCodecError::InvalidField {
            path: path.to_string(),
            detail: format!("expected a spec node, found {}", other.kind()),
        }),
    }
}

fn decode_array_spec(map: &IndexMap<String, Value>, path: &str) -> Result<ArraySpec, SpecCodecError> {
    let required = |key: &str| {
        map.get(key).ok_or_else(|| SpecCodecError::MissingKey {
            path: path.to_string(),
            key: key.to_string(),
        })
    };
    let invalid = |key: &str, detail: String| SpecCodecError::InvalidField {
        path: format!("{path}.{key}"),
        detail,
    };

    let kind = required(SPEC_MARKER)?
        .as_str()
        .ok_or_else(|| invalid(SPEC_MARKER, "spec kind must be a string".into()))?;

    let shape = decode_shape(required("shape")?).map_err(|detail| invalid("shape", detail))?;

    let dtype_value = required("dtype")?;
    let dtype_name = dtype_value
        .as_str()
        .ok_or_else(|| invalid("dtype", format!("expected str, found {}", dtype_value.kind())))?;
    let dtype: DType = dtype_name
        .parse()
        .map_err(|_| SpecCodecError::UnknownDType {
            path: format!("{path}.dtype"),
            name: dtype_name.to_string(),
        })?;

    let name = match map.get("name") {
        None | Some(Value::None) => None,
        Some(Value::Str(s)) => Some(s.clone()),
        Some(other) => {
            return Err(invalid("name", format!("expected str or none, found {}", other.kind())))
        }
    };

    let bounds = match kind {
        KIND_ARRAY => None,
        KIND_BOUNDED => Some(Bounds::Range {
            minimum: decode_bound(required("minimum")?).map_err(|d| invalid("minimum", d))?,
            maximum: decode_bound(required("maximum")?).map_err(|d| invalid("maximum", d))?,
        }),
        KIND_DISCRETE => {
            let num_values = required("num_values")?
                .as_i64()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("num_values", "expected a positive int".into()))?;
            Some(Bounds::Discrete { num_values })
        }
        other => return Err(invalid(SPEC_MARKER, format!("unknown spec kind '{other}'"))),
    };

    Ok(ArraySpec {
        shape,
        dtype,
        name,
        bounds,
    })
}

/// Shapes are stored as a list of ints; a 1-D integer tensor is also
/// accepted.
fn decode_shape(value: &Value) -> Result<Shape, String> {
    let dims: Vec<i64> = match value {
        Value::List(items) => items
            .iter()
            .map(|item| {
                item.as_i64()
                    .ok_or_else(|| format!("expected int dimension, found {}", item.kind()))
            })
            .collect::<Result<_, _>>()?,
        Value::Tensor(t) if t.shape().len() <= 1 => {
            let dims = match t.dtype() {
                DType::Int64 => t.to_vec::<i64>(),
                DType::Int32 => t
                    .to_vec::<i32>()
                    .map(|dims| dims.into_iter().map(i64::from).collect()),
                _ => None,
            };
            dims.ok_or_else(|| format!("expected an integer tensor, found {}", t.dtype()))?
        }
        other => return Err(format!("expected a list of ints, found {}", other.kind())),
    };
    dims.into_iter()
        .map(|d| usize::try_from(d).map_err(|_| format!("negative dimension {d}")))
        .collect()
}

fn decode_bound(value: &Value) -> Result<Value, String> {
    match value {
        Value::Int(_) | Value::Float(_) | Value::Tensor(_) => Ok(value.clone()),
        other => Err(format!("expected a number or tensor, found {}", other.kind())),
    }
}
