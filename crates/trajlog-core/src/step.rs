//! Step records and episode descriptors.

use crate::value::Value;

/// Position of a step within its episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepType {
    /// First step of an episode (the reset observation).
    First,
    /// Any step strictly inside an episode.
    Mid,
    /// Terminal step of an episode.
    Last,
}

impl StepType {
    /// Wire encoding.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::First => 0,
            Self::Mid => 1,
            Self::Last => 2,
        }
    }

    /// Inverse of [`as_u8`](Self::as_u8).
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::First),
            1 => Some(Self::Mid),
            2 => Some(Self::Last),
            _ => None,
        }
    }

    /// Whether this step starts an episode.
    pub fn is_first(self) -> bool {
        self == Self::First
    }

    /// Whether this step ends an episode.
    pub fn is_last(self) -> bool {
        self == Self::Last
    }
}

/// One logged timestep.
///
/// The layer that reads steps treats every payload field as opaque; the
/// decoded environment specs describe how to interpret them.
///
/// # Examples
///
/// ```
/// use trajlog_core::{Step, StepType, Value};
///
/// let step = Step::new(StepType::First, Value::Int(0));
/// assert!(step.step_type.is_first());
/// assert_eq!(step.reward, Value::None);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// Where this step sits in its episode.
    pub step_type: StepType,
    /// Observation emitted by the environment.
    pub observation: Value,
    /// Reward for the transition into this step (`None` on a first step).
    pub reward: Value,
    /// Discount for the transition into this step (`None` on a first step).
    pub discount: Value,
    /// Action taken after observing this step.
    pub action: Value,
    /// Per-step user data recorded by the writer.
    pub custom_data: Value,
}

impl Step {
    /// A step with only a type and an observation; other fields are `None`.
    pub fn new(step_type: StepType, observation: Value) -> Self {
        Self {
            step_type,
            observation,
            reward: Value::None,
            discount: Value::None,
            action: Value::None,
            custom_data: Value::None,
        }
    }

    /// Set the reward and discount.
    pub fn with_transition(mut self, reward: impl Into<Value>, discount: impl Into<Value>) -> Self {
        self.reward = reward.into();
        self.discount = discount.into();
        self
    }

    /// Set the action.
    pub fn with_action(mut self, action: impl Into<Value>) -> Self {
        self.action = action.into();
        self
    }

    /// Set the custom data.
    pub fn with_custom_data(mut self, custom_data: impl Into<Value>) -> Self {
        self.custom_data = custom_data.into();
        self
    }
}

/// Location of one episode within the global step sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeInfo {
    /// Global index of the episode's first step.
    pub start: usize,
    /// Number of steps in the episode.
    pub num_steps: usize,
    /// Episode-level metadata, when requested and recorded.
    pub metadata: Option<Value>,
}

impl EpisodeInfo {
    /// One past the global index of the episode's last step.
    pub fn end(&self) -> usize {
        self.start + self.num_steps
    }
}
