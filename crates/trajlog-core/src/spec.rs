//! Environment specification trees.
//!
//! A [`Spec`] describes the structure of one stream of logged data:
//! observations, actions, rewards or discounts. Leaves are
//! [`ArraySpec`]s; interior nodes are tuples or string-keyed dicts.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::dtype::DType;
use crate::value::Value;

/// Array dimensions, outermost first. Empty for scalars.
pub type Shape = SmallVec<[usize; 4]>;

/// Value bounds attached to an [`ArraySpec`].
#[derive(Clone, Debug, PartialEq)]
pub enum Bounds {
    /// Inclusive element-wise range. Each bound is a scalar or a
    /// tensor broadcastable to the spec's shape.
    Range {
        /// Lower bound.
        minimum: Value,
        /// Upper bound.
        maximum: Value,
    },
    /// Integers in `[0, num_values)`.
    Discrete {
        /// Number of distinct values.
        num_values: i64,
    },
}

/// Shape, dtype and optional name of one array-valued leaf.
///
/// # Examples
///
/// ```
/// use trajlog_core::{ArraySpec, DType};
///
/// let spec = ArraySpec::scalar(DType::Int32).named("observation");
/// assert!(spec.shape.is_empty());
/// assert_eq!(spec.name.as_deref(), Some("observation"));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ArraySpec {
    /// Dimensions of every conforming array.
    pub shape: Shape,
    /// Element type.
    pub dtype: DType,
    /// Optional human-readable name.
    pub name: Option<String>,
    /// Optional bounds.
    pub bounds: Option<Bounds>,
}

impl ArraySpec {
    /// An unbounded, unnamed spec.
    pub fn new(shape: &[usize], dtype: DType) -> Self {
        Self {
            shape: Shape::from_slice(shape),
            dtype,
            name: None,
            bounds: None,
        }
    }

    /// A scalar (zero-rank) spec.
    pub fn scalar(dtype: DType) -> Self {
        Self::new(&[], dtype)
    }

    /// Attach a name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach an inclusive range.
    pub fn bounded(mut self, minimum: impl Into<Value>, maximum: impl Into<Value>) -> Self {
        self.bounds = Some(Bounds::Range {
            minimum: minimum.into(),
            maximum: maximum.into(),
        });
        self
    }

    /// A scalar integer spec over `[0, num_values)`.
    pub fn discrete(num_values: i64, dtype: DType) -> Self {
        Self {
            shape: Shape::new(),
            dtype,
            name: None,
            bounds: Some(Bounds::Discrete { num_values }),
        }
    }
}

/// A (possibly nested) tree of array specs.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Spec {
    /// No data recorded for this stream.
    #[default]
    None,
    /// A single array-valued leaf.
    Array(ArraySpec),
    /// Positional children.
    Tuple(Vec<Spec>),
    /// Named children, insertion ordered.
    Dict(IndexMap<String, Spec>),
}

impl Spec {
    /// The leaf spec, if this node is one.
    pub fn as_array(&self) -> Option<&ArraySpec> {
        match self {
            Spec::Array(spec) => Some(spec),
            _ => None,
        }
    }

    /// Number of array leaves in the tree.
    pub fn num_leaves(&self) -> usize {
        match self {
            Spec::None => 0,
            Spec::Array(_) => 1,
            Spec::Tuple(children) => children.iter().map(Spec::num_leaves).sum(),
            Spec::Dict(children) => children.values().map(Spec::num_leaves).sum(),
        }
    }
}

impl From<ArraySpec> for Spec {
    fn from(spec: ArraySpec) -> Self {
        Spec::Array(spec)
    }
}

/// The four specs recorded alongside a trajectory.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct EnvironmentSpecs {
    /// Structure of observations.
    pub observation_spec: Spec,
    /// Structure of actions.
    pub action_spec: Spec,
    /// Structure of rewards.
    pub reward_spec: Spec,
    /// Structure of discounts.
    pub discount_spec: Spec,
}

impl EnvironmentSpecs {
    /// Metadata keys, in encoding order.
    pub const KEYS: [&'static str; 4] = [
        "observation_spec",
        "action_spec",
        "reward_spec",
        "discount_spec",
    ];
}
