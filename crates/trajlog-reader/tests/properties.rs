//! Property tests over randomly shaped trajectories.

use proptest::prelude::*;
use trajlog_memory::{InMemoryBackendWriter, InMemoryStorage};
use trajlog_reader::{BackendArgs, BackendKind, TrajectoryReader};
use trajlog_test_utils::{catch_episode, catch_specs, coordinates, metadata_with_specs};

fn reader_over(lengths: &[usize]) -> TrajectoryReader {
    let storage = InMemoryStorage::new();
    let mut writer =
        InMemoryBackendWriter::new(storage.clone(), Some(metadata_with_specs(&catch_specs())));
    for (e, &len) in lengths.iter().enumerate() {
        for (i, step) in catch_episode(e, len).into_iter().enumerate() {
            writer.add_step(step, i == 0);
        }
    }
    TrajectoryReader::open(BackendKind::InMemory, BackendArgs::new().arg(storage)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn counts_are_consistent(lengths in prop::collection::vec(1usize..12, 0..10)) {
        let reader = reader_over(&lengths);
        let episodes = reader.episodes();
        let total: usize = episodes.iter().map(|e| e.unwrap().len()).sum();
        prop_assert_eq!(reader.steps().len(), total);
        prop_assert_eq!(reader.episode_metadata().len(), episodes.len());
        prop_assert_eq!(episodes.len(), lengths.len());
    }

    #[test]
    fn episodes_hold_their_own_steps(lengths in prop::collection::vec(1usize..8, 1..6)) {
        let reader = reader_over(&lengths);
        for (e, episode) in reader.episodes().iter().enumerate() {
            let episode = episode.unwrap();
            prop_assert_eq!(episode.len(), lengths[e]);
            for (i, step) in episode.iter().enumerate() {
                prop_assert_eq!(coordinates(&step.unwrap()), Some((e as i64, i as i64)));
            }
        }
    }

    #[test]
    fn close_is_idempotent(lengths in prop::collection::vec(1usize..5, 0..4), closes in 1usize..4) {
        let mut reader = reader_over(&lengths);
        for _ in 0..closes {
            reader.close();
        }
        prop_assert!(reader.is_closed());
        prop_assert_eq!(reader.environment_specs(), &catch_specs());
    }
}
