//! Staging and binary sanity checks as seen through real loads.

mod common;

use std::sync::Arc;

use common::{Behavior, Fixture, SPEECH_MODEL};
use ondevice_core::engine::{EngineState, RuntimeEngine, RuntimeError};
use ondevice_core::models::{EngineKind, ModelConfig, ModelDescriptor};
use ondevice_core::staging::{DirAssetSource, ModelStorage, StagingResolver};

fn bundled(id: &str, file: &str, kind: EngineKind) -> ModelDescriptor {
    ModelDescriptor::new(id, file, kind).with_config(ModelConfig::new().with("isBundled", true))
}

#[tokio::test]
async fn test_bundled_asset_is_staged_byte_for_byte() {
    let assets = tempfile::tempdir().unwrap();
    let docs = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    let payload: Vec<u8> = (0..3_000_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::create_dir_all(assets.path().join("models")).unwrap();
    std::fs::write(assets.path().join("models/big.tflite"), &payload).unwrap();

    let resolver = StagingResolver::new(
        Arc::new(DirAssetSource::new(assets.path())),
        ModelStorage::new(docs.path()),
    );
    let d = bundled("big", "models/big.tflite", EngineKind::TensorGraph);

    let staged = resolver.ensure_local_file(&d, dest.path()).await.unwrap();
    assert_eq!(staged.len, payload.len() as u64);
    assert_eq!(std::fs::read(&staged.path).unwrap(), payload);
    assert_eq!(
        staged.path.file_name().unwrap().to_str().unwrap(),
        "tensor_graph-big-big.tflite"
    );

    // No partial file is left beside the staged copy.
    let leftovers: Vec<_> = std::fs::read_dir(dest.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_restaging_overwrites_previous_copy() {
    let assets = tempfile::tempdir().unwrap();
    let docs = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    let resolver = StagingResolver::new(
        Arc::new(DirAssetSource::new(assets.path())),
        ModelStorage::new(docs.path()),
    );
    let d = bundled("voice", "voice.onnx", EngineKind::SpeechSynthesis);

    std::fs::write(assets.path().join("voice.onnx"), b"first version bytes").unwrap();
    let first = resolver.ensure_local_file(&d, dest.path()).await.unwrap();
    std::fs::write(assets.path().join("voice.onnx"), b"second").unwrap();
    let second = resolver.ensure_local_file(&d, dest.path()).await.unwrap();

    assert_eq!(first.path, second.path);
    assert_eq!(std::fs::read(&second.path).unwrap(), b"second");
    assert_ne!(first.sha256, second.sha256);
}

#[tokio::test]
async fn test_storage_source_is_copied_when_staging() {
    let fx = Fixture::new(Behavior::default());
    fx.write_storage(EngineKind::SpeechSynthesis, "voice.onnx", SPEECH_MODEL);
    let speech = fx.runtime.registry.speech().unwrap();

    let d = ModelDescriptor::new("voice", "voice.onnx", EngineKind::SpeechSynthesis);
    speech.load_model(&d).await.unwrap();

    let paths = fx.binding.paths.lock().unwrap().clone();
    assert!(paths[0].starts_with(fx.runtime.staging.path()));
    assert_eq!(std::fs::read(&paths[0]).unwrap(), SPEECH_MODEL);
}

#[tokio::test]
async fn test_missing_model_names_the_path() {
    let fx = Fixture::new(Behavior::default());
    let graph = fx.runtime.registry.tensor_graph().unwrap();
    let d = ModelDescriptor::new("gone", "gone.tflite", EngineKind::TensorGraph);

    let err = graph.load_model(&d).await.unwrap_err();
    assert!(err.is_retryable());
    match err {
        RuntimeError::ModelNotFound { model_id, path } => {
            assert_eq!(model_id, "gone");
            assert!(path.ends_with("models/tensor_graph/gone.tflite"));
        }
        other => panic!("expected ModelNotFound, got {other}"),
    }
    assert_eq!(graph.state(), EngineState::Unloaded);
}

#[tokio::test]
async fn test_tflite_signature_loads() {
    let fx = Fixture::new(Behavior::default());
    fx.write_asset("m.tflite", b"\x1c\0\0\0TFL3\0\0\0\0");
    let graph = fx.runtime.registry.tensor_graph().unwrap();

    graph
        .load_model(&bundled("m", "m.tflite", EngineKind::TensorGraph))
        .await
        .unwrap();
    assert!(graph.is_loaded());
}

#[tokio::test]
async fn test_four_byte_file_is_too_small() {
    let fx = Fixture::new(Behavior::default());
    fx.write_asset("m.tflite", b"TFL3");
    let graph = fx.runtime.registry.tensor_graph().unwrap();

    let err = graph
        .load_model(&bundled("m", "m.tflite", EngineKind::TensorGraph))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::TooSmall { size: 4, minimum: 8, .. }
    ));
    assert!(fx.binding.calls().is_empty());
    assert_eq!(graph.state(), EngineState::Unloaded);
}

#[tokio::test]
async fn test_unrecognized_signature_still_loads() {
    let fx = Fixture::new(Behavior::default());
    fx.write_asset("m.tflite", b"\0\0\0\0XXXX\0\0");
    let graph = fx.runtime.registry.tensor_graph().unwrap();

    graph
        .load_model(&bundled("m", "m.tflite", EngineKind::TensorGraph))
        .await
        .unwrap();
    assert_eq!(fx.binding.calls(), vec!["file"]);
    assert!(graph.is_loaded());
}

#[tokio::test]
async fn test_speech_model_only_needs_minimum_size() {
    let fx = Fixture::new(Behavior::default());
    fx.write_asset("tiny.onnx", b"1234567");
    let speech = fx.runtime.registry.speech().unwrap();

    assert!(matches!(
        speech
            .load_model(&bundled("tiny", "tiny.onnx", EngineKind::SpeechSynthesis))
            .await,
        Err(RuntimeError::TooSmall { size: 7, .. })
    ));
}

#[tokio::test]
async fn test_absolute_file_name_cannot_reach_outside_roots() {
    let fx = Fixture::new(Behavior::default());
    let outside = tempfile::tempdir().unwrap();
    let target = outside.path().join("outside.tflite");
    std::fs::write(&target, b"\x1c\0\0\0TFL3outside").unwrap();
    let file_name = target.to_str().unwrap().to_string();
    let graph = fx.runtime.registry.tensor_graph().unwrap();

    let from_storage = ModelDescriptor::new("x", file_name.clone(), EngineKind::TensorGraph);
    let from_bundle = bundled("x", &file_name, EngineKind::TensorGraph);
    for d in [from_storage, from_bundle] {
        assert!(matches!(
            graph.load_model(&d).await,
            Err(RuntimeError::InvalidDescriptor(_))
        ));
        assert_eq!(graph.state(), EngineState::Unloaded);
    }
    assert!(fx.binding.calls().is_empty());
}
