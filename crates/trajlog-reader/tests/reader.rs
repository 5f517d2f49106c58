//! Reader construction, dispatch and teardown across both backends.

use std::path::Path;

use trajlog_codec::{decode_environment_specs, SpecCodecError};
use trajlog_core::{ArraySpec, BackendError, BackendReader, DType, Spec, Value};
use trajlog_log::{LogWriter, LogWriterConfig};
use trajlog_memory::{InMemoryBackendReader, InMemoryBackendWriter, InMemoryStorage};
use trajlog_reader::{BackendArgs, BackendKind, BackendSelector, ReaderError, TrajectoryReader};
use trajlog_test_utils::{
    catch_episode, catch_specs, coordinates, episode_metadata, metadata_with_specs, scalar_specs,
    MockBackend, REFERENCE_EPISODES,
};

// ── Helpers ─────────────────────────────────────────────────────

fn seeded_storage(metadata: Option<Value>) -> InMemoryStorage {
    let storage = InMemoryStorage::new();
    let mut writer = InMemoryBackendWriter::new(storage.clone(), metadata);
    for (e, &len) in REFERENCE_EPISODES.iter().enumerate() {
        for (i, step) in catch_episode(e, len).into_iter().enumerate() {
            writer.add_step(step, i == 0);
        }
        writer.set_episode_metadata(episode_metadata(e)).unwrap();
    }
    storage
}

fn write_log(dir: &Path, metadata: Option<&Value>) {
    let mut writer = LogWriter::create(dir, metadata, LogWriterConfig::default()).unwrap();
    for (e, &len) in REFERENCE_EPISODES.iter().enumerate() {
        for (i, step) in catch_episode(e, len).iter().enumerate() {
            writer.add_step(step, i == 0).unwrap();
        }
        writer.set_episode_metadata(&episode_metadata(e)).unwrap();
    }
    writer.close().unwrap();
}

fn assert_reference_layout(reader: &TrajectoryReader) {
    let steps = reader.steps();
    let episodes = reader.episodes();
    assert_eq!(steps.len(), 8);
    assert_eq!(episodes.len(), 2);
    assert_eq!(episodes.get(0).unwrap().len(), 3);
    assert_eq!(episodes.get(1).unwrap().len(), 5);
    assert_eq!(reader.episode_metadata().len(), episodes.len());
    let total: usize = episodes.iter().map(|e| e.unwrap().len()).sum();
    assert_eq!(total, steps.len());
}

// ── Scenarios ───────────────────────────────────────────────────

#[test]
fn in_memory_reference_scenario() {
    let storage = seeded_storage(Some(metadata_with_specs(&scalar_specs())));
    let reader =
        TrajectoryReader::open(BackendKind::InMemory, BackendArgs::new().arg(storage)).unwrap();

    assert_reference_layout(&reader);
    let expected = Spec::from(ArraySpec::scalar(DType::Int32));
    assert_eq!(reader.observation_spec(), &expected);
    let obs = reader.observation_spec().as_array().unwrap();
    assert_eq!(obs.dtype, DType::Int32);
    assert!(obs.shape.is_empty());
    assert_eq!(reader.action_spec(), &scalar_specs().action_spec);
    assert_eq!(reader.reward_spec(), &scalar_specs().reward_spec);
    assert_eq!(reader.discount_spec(), &scalar_specs().discount_spec);
}

#[test]
fn log_reference_scenario() {
    let dir = tempfile::tempdir().unwrap();
    write_log(dir.path(), Some(&metadata_with_specs(&catch_specs())));
    let reader = TrajectoryReader::new("log", BackendArgs::new().arg(dir.path())).unwrap();

    assert_reference_layout(&reader);
    assert_eq!(reader.environment_specs(), &catch_specs());
    let second = reader.episodes().get(1).unwrap();
    assert_eq!(coordinates(&second.get(4).unwrap()), Some((1, 4)));
    assert_eq!(
        reader.episode_metadata().to_vec().unwrap(),
        vec![Some(episode_metadata(0)), Some(episode_metadata(1))]
    );
}

#[test]
fn riegeli_alias_reads_log() {
    let dir = tempfile::tempdir().unwrap();
    write_log(dir.path(), Some(&metadata_with_specs(&catch_specs())));
    let args = BackendArgs::new().named("data_dir", dir.path());
    let reader = TrajectoryReader::new("riegeli", args).unwrap();
    assert_eq!(reader.steps().len(), 8);
}

#[test]
fn specs_match_direct_decode() {
    let metadata = metadata_with_specs(&catch_specs());
    let direct =
        decode_environment_specs(metadata.get("environment_specs").unwrap()).unwrap();
    let storage = seeded_storage(Some(metadata));
    let reader =
        TrajectoryReader::open(BackendKind::InMemory, BackendArgs::new().arg(storage)).unwrap();
    assert_eq!(reader.environment_specs(), &direct);
    for spec in [
        reader.observation_spec(),
        reader.action_spec(),
        reader.reward_spec(),
        reader.discount_spec(),
    ] {
        assert_ne!(spec, &Spec::None);
    }
}

#[test]
fn metadata_passes_through() {
    let metadata = metadata_with_specs(&catch_specs());
    let storage = seeded_storage(Some(metadata.clone()));
    let reader =
        TrajectoryReader::open(BackendKind::InMemory, BackendArgs::new().arg(storage)).unwrap();
    assert_eq!(reader.metadata().unwrap(), Some(metadata));
}

// ── Failures ────────────────────────────────────────────────────

#[test]
fn missing_specs_fail_construction() {
    let storage = seeded_storage(Some(Value::dict([("agent", Value::from("random"))])));
    let err = TrajectoryReader::open(BackendKind::InMemory, BackendArgs::new().arg(storage))
        .unwrap_err();
    assert!(matches!(err, ReaderError::SpecsNotRecorded));

    let storage = seeded_storage(None);
    let err = TrajectoryReader::open(BackendKind::InMemory, BackendArgs::new().arg(storage))
        .unwrap_err();
    assert!(matches!(err, ReaderError::SpecsNotRecorded));
}

#[test]
fn incomplete_specs_fail_with_decode_error() {
    let mut encoded = trajlog_codec::encode_environment_specs(&catch_specs()).unwrap();
    if let Value::Dict(map) = &mut encoded {
        map.shift_remove("discount_spec");
    }
    let storage = seeded_storage(Some(Value::dict([("environment_specs", encoded)])));
    let err = TrajectoryReader::open(BackendKind::InMemory, BackendArgs::new().arg(storage))
        .unwrap_err();
    match err {
        ReaderError::MetadataDecode(SpecCodecError::MissingKey { key, .. }) => {
            assert_eq!(key, "discount_spec")
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_tag_fails_before_io() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("never-created");
    let err = TrajectoryReader::new("sqlite", BackendArgs::new().arg(missing.as_path()))
        .unwrap_err();
    match err {
        ReaderError::Configuration { value } => assert_eq!(value, "sqlite"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(!missing.exists());
}

#[test]
fn backend_errors_propagate_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let err = TrajectoryReader::open(
        BackendKind::Log,
        BackendArgs::new().arg(dir.path().join("absent")),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ReaderError::Backend(BackendError::NotFound { .. })
    ));

    let err = TrajectoryReader::open(BackendKind::InMemory, BackendArgs::new()).unwrap_err();
    assert!(matches!(
        err,
        ReaderError::Backend(BackendError::InvalidArgument { .. })
    ));
}

#[test]
fn failed_construction_closes_backend() {
    let backend = MockBackend::reference(None);
    let counter = backend.close_counter();
    let err = TrajectoryReader::from_backend(backend).unwrap_err();
    assert!(matches!(err, ReaderError::SpecsNotRecorded));
    assert_eq!(counter.count(), 1);

    let backend = MockBackend::reference(None).failing_metadata();
    let counter = backend.close_counter();
    let err = TrajectoryReader::from_backend(backend).unwrap_err();
    assert!(matches!(err, ReaderError::Backend(BackendError::Corrupt { .. })));
    assert_eq!(counter.count(), 1);
}

// ── Instances and teardown ──────────────────────────────────────

#[test]
fn closed_in_memory_instance_still_constructs() {
    let storage = seeded_storage(Some(metadata_with_specs(&scalar_specs())));
    let mut backend = InMemoryBackendReader::new(storage);
    backend.close();
    let reader = TrajectoryReader::new(
        BackendSelector::Instance(Box::new(backend)),
        BackendArgs::new(),
    )
    .unwrap();
    assert!(reader.is_closed());
    assert_eq!(reader.environment_specs(), &scalar_specs());
    assert!(matches!(reader.steps().get(0), Err(BackendError::Closed)));
}

#[test]
fn close_twice_is_harmless() {
    let backend = MockBackend::reference(Some(metadata_with_specs(&catch_specs())));
    let counter = backend.close_counter();
    let mut reader = TrajectoryReader::from_backend(backend).unwrap();
    reader.close();
    reader.close();
    assert!(reader.is_closed());
    assert_eq!(reader.steps().len(), 8);
    assert!(matches!(reader.steps().get(0), Err(BackendError::Closed)));
    drop(reader);
    assert_eq!(counter.count(), 1);
}

#[test]
fn instance_closed_by_caller_is_closed_once_more() {
    let mut backend = MockBackend::reference(Some(metadata_with_specs(&catch_specs())));
    let counter = backend.close_counter();
    backend.close();
    let mut reader = TrajectoryReader::from_backend(backend).unwrap();
    assert!(reader.is_closed());
    reader.close();
    reader.close();
    drop(reader);
    assert_eq!(counter.count(), 2);
}

#[test]
fn drop_closes_backend() {
    let backend = MockBackend::reference(Some(metadata_with_specs(&catch_specs())));
    let counter = backend.close_counter();
    {
        let reader = TrajectoryReader::from_backend(backend).unwrap();
        assert_eq!(reader.steps().len(), 8);
    }
    assert_eq!(counter.count(), 1);
}

#[test]
fn log_reader_closes_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    write_log(dir.path(), Some(&metadata_with_specs(&catch_specs())));
    let mut reader = TrajectoryReader::open(BackendKind::Log, BackendArgs::new().arg(dir.path()))
        .unwrap();
    reader.close();
    reader.close();
    assert!(matches!(reader.steps().get(0), Err(BackendError::Closed)));
    assert!(reader.metadata().unwrap().is_some());
}

#[test]
fn reader_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<TrajectoryReader>();
}

#[test]
fn boxed_instance_via_from() {
    let storage = seeded_storage(Some(metadata_with_specs(&catch_specs())));
    let backend: Box<dyn BackendReader> = Box::new(InMemoryBackendReader::new(storage));
    let reader = TrajectoryReader::new(backend, BackendArgs::new()).unwrap();
    assert_eq!(reader.backend().num_episodes(), 2);
}
