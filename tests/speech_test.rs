//! Speech engine: voice styles, chunked synthesis and audio streams.

mod common;

use common::{Behavior, Fixture, SAMPLE_RATE, SPEECH_MODEL};
use futures::StreamExt;
use ondevice_core::engine::{
    EngineState, GenerationConfig, RuntimeEngine, RuntimeError, SynthesisParams,
};
use ondevice_core::models::{EngineKind, ModelConfig, ModelDescriptor};

fn voice_model() -> ModelDescriptor {
    ModelDescriptor::new("supertonic", "tts/supertonic.onnx", EngineKind::SpeechSynthesis)
        .with_display_name("Supertonic")
        .with_config(ModelConfig::new().with("isBundled", true))
}

fn fixture(stream_buffer: usize) -> Fixture {
    let fx = Fixture::with_stream_buffer(Behavior::default(), stream_buffer);
    fx.write_asset("tts/supertonic.onnx", SPEECH_MODEL);
    fx.write_asset("voice_styles/a.json", br#"{"style_ttl": [0.1]}"#);
    fx.write_asset("voice_styles/bbb.json", br#"{"style_ttl": [0.2]}"#);
    fx
}

/// Text that chunks into exactly `n` pieces.
fn sentences(n: usize) -> String {
    (0..n)
        .map(|_| format!("{}.", "a".repeat(250)))
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::test]
async fn test_synthesis_requires_style() {
    let fx = fixture(16);
    let speech = fx.runtime.registry.speech().unwrap();
    speech.load_model(&voice_model()).await.unwrap();

    let err = speech
        .synthesize("Hello.", &SynthesisParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::StyleNotLoaded));
    assert_eq!(speech.state(), EngineState::Loaded);
    assert_eq!(fx.binding.invocations(), 0);
}

#[tokio::test]
async fn test_missing_style_file_is_not_found() {
    let fx = fixture(16);
    let speech = fx.runtime.registry.speech().unwrap();
    speech.load_model(&voice_model()).await.unwrap();

    let err = speech.load_style("nope").await.unwrap_err();
    match err {
        RuntimeError::ModelNotFound { path, .. } => {
            assert!(path.ends_with("voice_styles/nope.json"));
        }
        other => panic!("expected ModelNotFound, got {other}"),
    }
    assert!(speech.active_style().is_none());
    assert!(matches!(
        speech.load_style("../escape").await,
        Err(RuntimeError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_style_can_change_without_reload() {
    let fx = fixture(16);
    let speech = fx.runtime.registry.speech().unwrap();
    speech.load_model(&voice_model()).await.unwrap();

    speech.load_style("a").await.unwrap();
    let first = speech
        .synthesize("Hi.", &SynthesisParams::default())
        .await
        .unwrap();
    assert_eq!(first.sample_rate, SAMPLE_RATE);
    assert_eq!(first.samples, vec![1.0; 3]);

    speech.load_style("bbb").await.unwrap();
    assert_eq!(speech.active_style().as_deref(), Some("bbb"));
    let second = speech
        .synthesize("Hi.", &SynthesisParams::default())
        .await
        .unwrap();
    assert_eq!(second.samples, vec![3.0; 3]);

    assert_eq!(fx.binding.calls(), vec!["file"]);
    assert_eq!(fx.binding.live_handles(), 1);
}

#[tokio::test]
async fn test_chunks_are_joined_with_silence() {
    let fx = fixture(16);
    let speech = fx.runtime.registry.speech().unwrap();
    speech.load_model(&voice_model()).await.unwrap();
    speech.load_style("a").await.unwrap();

    let params = SynthesisParams {
        silence_secs: 0.5,
        ..Default::default()
    };
    let wave = speech.synthesize(&sentences(2), &params).await.unwrap();

    let gap = (SAMPLE_RATE / 2) as usize;
    assert_eq!(wave.samples.len(), 251 + gap + 251);
    assert!(wave.samples[251..251 + gap].iter().all(|s| *s == 0.0));
    assert_eq!(fx.binding.invocations(), 2);
}

#[tokio::test]
async fn test_stream_yields_one_waveform_per_chunk() {
    let fx = fixture(16);
    let speech = fx.runtime.registry.speech().unwrap();
    speech.load_model(&voice_model()).await.unwrap();
    speech.load_style("a").await.unwrap();

    let stream = speech
        .synthesize_stream(&sentences(3), &SynthesisParams::default())
        .await
        .unwrap();
    let chunks = stream.collect_all().await.unwrap();
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|w| w.samples.len() == 251));
    assert_eq!(speech.state(), EngineState::Loaded);
}

#[tokio::test]
async fn test_unload_rejected_while_stream_alive() {
    let fx = fixture(1);
    let speech = fx.runtime.registry.speech().unwrap();
    speech.load_model(&voice_model()).await.unwrap();
    speech.load_style("a").await.unwrap();

    let mut stream = speech
        .synthesize_stream(&sentences(4), &SynthesisParams::default())
        .await
        .unwrap();
    assert!(stream.next().await.unwrap().is_ok());
    assert_eq!(speech.state(), EngineState::Generating);

    match speech.unload().await {
        Err(RuntimeError::InvalidState { expected, actual, .. }) => {
            assert_eq!(expected, EngineState::Loaded);
            assert_eq!(actual, EngineState::Generating);
        }
        other => panic!("expected InvalidState, got {other:?}"),
    }
    assert!(speech.is_loaded());

    drop(stream);
    assert_eq!(speech.state(), EngineState::Loaded);
    speech.unload().await.unwrap();
    assert_eq!(speech.state(), EngineState::Unloaded);
    assert_eq!(fx.binding.live_handles(), 0);
    assert!(speech.active_style().is_none());
}

#[tokio::test]
async fn test_dropping_stream_stops_production() {
    let fx = fixture(1);
    let speech = fx.runtime.registry.speech().unwrap();
    speech.load_model(&voice_model()).await.unwrap();
    speech.load_style("a").await.unwrap();

    let mut stream = speech
        .synthesize_stream(&sentences(20), &SynthesisParams::default())
        .await
        .unwrap();
    assert!(stream.next().await.unwrap().is_ok());
    drop(stream);

    // Unload joins the worker, so the producer has finished by now.
    speech.unload().await.unwrap();
    assert!(fx.binding.invocations() < 20);
}

#[tokio::test]
async fn test_style_is_cleared_by_reload() {
    let fx = fixture(16);
    let speech = fx.runtime.registry.speech().unwrap();
    speech.load_model(&voice_model()).await.unwrap();
    speech.load_style("a").await.unwrap();
    speech.unload().await.unwrap();
    speech.load_model(&voice_model()).await.unwrap();

    assert!(matches!(
        speech.synthesize("Hi.", &SynthesisParams::default()).await,
        Err(RuntimeError::StyleNotLoaded)
    ));
}

#[tokio::test]
async fn test_text_generation_is_unsupported() {
    let fx = fixture(16);
    let speech = fx.runtime.registry.speech().unwrap();
    speech.load_model(&voice_model()).await.unwrap();

    let err = speech
        .generate("hello", &GenerationConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Unsupported {
            engine: EngineKind::SpeechSynthesis,
            operation: "generate",
            ..
        }
    ));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_synthesis_before_load_is_not_loaded() {
    let fx = fixture(16);
    let speech = fx.runtime.registry.speech().unwrap();
    assert!(matches!(
        speech.load_style("a").await,
        Err(RuntimeError::NotLoaded(EngineKind::SpeechSynthesis))
    ));
    assert!(matches!(
        speech.synthesize("Hi.", &SynthesisParams::default()).await,
        Err(RuntimeError::NotLoaded(_))
    ));
}

#[tokio::test]
async fn test_style_dir_must_stay_relative() {
    let fx = fixture(16);
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("a.json"), br#"{"style_ttl": []}"#).unwrap();
    let speech = fx.runtime.registry.speech().unwrap();
    let d = voice_model().with_config(
        ModelConfig::new()
            .with("isBundled", true)
            .with("styleDir", outside.path().to_str().unwrap()),
    );
    speech.load_model(&d).await.unwrap();

    assert!(matches!(
        speech.load_style("a").await,
        Err(RuntimeError::InvalidConfig(_))
    ));
    assert!(speech.active_style().is_none());
    assert_eq!(speech.state(), EngineState::Loaded);
}
