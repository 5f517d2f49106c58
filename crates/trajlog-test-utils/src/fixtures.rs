//! Deterministic trajectories and spec sets.
//!
//! - [`catch_specs`]: specs of a small grid game with a bounded board,
//!   three discrete actions and scalar reward/discount.
//! - [`catch_episode`]: an episode whose every field encodes its
//!   `(episode, step)` coordinates, so readers can check placement.
//! - [`metadata_with_specs`]: backend metadata as a writer records it.

use trajlog_codec::encode_environment_specs;
use trajlog_core::{ArraySpec, DType, EnvironmentSpecs, Step, StepType, Tensor, Value};

/// Episode lengths used by the reference scenario: two episodes of 3
/// and 5 steps.
pub const REFERENCE_EPISODES: [usize; 2] = [3, 5];

pub const BOARD_ROWS: usize = 10;
pub const BOARD_COLUMNS: usize = 5;

/// Specs of the catch-like environment [`catch_episode`] imitates.
pub fn catch_specs() -> EnvironmentSpecs {
    EnvironmentSpecs {
        observation_spec: ArraySpec::new(&[BOARD_ROWS, BOARD_COLUMNS], DType::Float32)
            .named("board")
            .bounded(0.0, 1.0)
            .into(),
        action_spec: ArraySpec::discrete(3, DType::Int64).named("action").into(),
        reward_spec: ArraySpec::scalar(DType::Float64).named("reward").into(),
        discount_spec: ArraySpec::scalar(DType::Float64)
            .named("discount")
            .bounded(0.0, 1.0)
            .into(),
    }
}

/// Scalar specs: an `int32` observation and `float32` everything else.
pub fn scalar_specs() -> EnvironmentSpecs {
    EnvironmentSpecs {
        observation_spec: ArraySpec::scalar(DType::Int32).into(),
        action_spec: ArraySpec::scalar(DType::Float32).into(),
        reward_spec: ArraySpec::scalar(DType::Float32).into(),
        discount_spec: ArraySpec::scalar(DType::Float32).into(),
    }
}

/// Backend metadata carrying `specs` under `environment_specs`, plus a
/// free-form entry readers must pass through untouched.
///
/// Panics if `specs` cannot be encoded.
pub fn metadata_with_specs(specs: &EnvironmentSpecs) -> Value {
    let encoded = encode_environment_specs(specs)
        .unwrap_or_else(|e| panic!("fixture specs do not encode: {e}"));
    Value::dict([
        ("environment_specs", encoded),
        ("agent", Value::from("random")),
    ])
}

/// Board observation with a single lit cell derived from the coordinates.
pub fn board(episode: usize, step: usize) -> Value {
    let n = BOARD_ROWS * BOARD_COLUMNS;
    let mut cells = vec![0.0f32; n];
    cells[(episode * 7 + step) % n] = 1.0;
    match Tensor::from_slice(&[BOARD_ROWS, BOARD_COLUMNS], &cells) {
        Ok(t) => Value::Tensor(t),
        Err(e) => panic!("board fixture has a bad shape: {e}"),
    }
}

/// Step `step` of episode `episode`, out of `len` steps.
pub fn catch_step(episode: usize, step: usize, len: usize) -> Step {
    let step_type = if step == 0 {
        StepType::First
    } else if step + 1 == len {
        StepType::Last
    } else {
        StepType::Mid
    };
    let mut s = Step::new(step_type, board(episode, step))
        .with_action((step % 3) as i64)
        .with_custom_data(Value::dict([
            ("episode", Value::from(episode as i64)),
            ("step", Value::from(step as i64)),
        ]));
    if step > 0 {
        let reward = if step_type.is_last() { 1.0 } else { 0.0 };
        let discount = if step_type.is_last() { 0.0 } else { 1.0 };
        s = s.with_transition(reward, discount);
    }
    s
}

/// All steps of one episode.
pub fn catch_episode(episode: usize, len: usize) -> Vec<Step> {
    (0..len).map(|i| catch_step(episode, i, len)).collect()
}

/// Metadata recorded for an episode.
pub fn episode_metadata(episode: usize) -> Value {
    Value::dict([
        ("episode_id", Value::from(episode as i64)),
        ("seed", Value::from(1_000 + episode as i64)),
    ])
}

/// Read the `(episode, step)` coordinates back out of a fixture step.
pub fn coordinates(step: &Step) -> Option<(i64, i64)> {
    let episode = step.custom_data.get("episode")?.as_i64()?;
    let index = step.custom_data.get("step")?.as_i64()?;
    Some((episode, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_has_first_and_last() {
        let steps = catch_episode(1, 4);
        assert_eq!(steps.len(), 4);
        assert!(steps[0].step_type.is_first());
        assert!(steps[3].step_type.is_last());
        assert_eq!(steps[0].reward, Value::None);
        assert_eq!(steps[3].reward, Value::Float(1.0));
        assert_eq!(coordinates(&steps[2]), Some((1, 2)));
    }

    #[test]
    fn board_lights_one_cell() {
        for (episode, step) in [(0, 0), (1, 4), (9, 30)] {
            let Value::Tensor(t) = board(episode, step) else {
                panic!("board is not a tensor");
            };
            assert_eq!(t.shape(), &[BOARD_ROWS, BOARD_COLUMNS]);
            let cells = t.to_vec::<f32>().unwrap();
            assert_eq!(cells.iter().filter(|&&c| c == 1.0).count(), 1);
            assert_eq!(cells[(episode * 7 + step) % cells.len()], 1.0);
        }
    }

    #[test]
    fn metadata_keeps_specs() {
        let meta = metadata_with_specs(&catch_specs());
        let specs = meta.get("environment_specs").unwrap();
        let decoded = trajlog_codec::decode_environment_specs(specs).unwrap();
        assert_eq!(decoded, catch_specs());
    }
}
