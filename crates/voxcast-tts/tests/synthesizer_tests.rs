//! Synthesizer integration tests
//!
//! Drives the `TextToSpeech` facade end-to-end with the mock engine:
//! lifecycle transitions, busy rejection, clamping, reconciliation,
//! voice/locale ripple, and selection failure handling.

use voxcast_tts::engines::mock::{MockConfig, MockEngineFactory, MockHandle};
use voxcast_tts::engines::noop::NoOpEngineFactory;
use voxcast_tts::{
    EngineRegistry, EngineState, Locale, PauseSupport, SpeakOutcome, TextToSpeech, TtsConfig,
    TtsEvent, Voice, VoxCastError,
};

fn test_config() -> TtsConfig {
    TtsConfig {
        preferred_engine: None,
        fallback_engines: Vec::new(),
        locale: Some(Locale::new("en-US")),
        voice: None,
        pitch: 0.0,
        rate: 0.0,
        volume: 80,
    }
}

async fn mock_tts(config: MockConfig) -> (TextToSpeech, MockHandle) {
    let factory = MockEngineFactory::new(config);
    let handle = factory.handle();
    let mut registry = EngineRegistry::new();
    registry.register(Box::new(factory));
    let tts = TextToSpeech::new(&registry, test_config()).await;
    (tts, handle)
}

fn drain(rx: &crossbeam_channel::Receiver<TtsEvent>) -> Vec<TtsEvent> {
    rx.try_iter().collect()
}

fn helga() -> Voice {
    Voice {
        name: "helga".to_string(),
        locale: Locale::new("de-DE"),
        variant: "F".to_string(),
        token: "mock:helga".to_string(),
    }
}

// ─── Construction and selection ─────────────────────────────────────

#[tokio::test]
async fn construction_selects_engine_and_applies_defaults() {
    let (tts, _handle) = mock_tts(MockConfig::default()).await;
    assert_eq!(tts.engine_info().unwrap().id, "mock");
    assert_eq!(tts.state(), EngineState::Ready);
    assert_eq!(tts.volume(), 80);
    assert_eq!(tts.locale(), &Locale::new("en-US"));
    // The voice defaults to the engine's current voice.
    assert_eq!(tts.voice().unwrap().name, "alice");
}

#[tokio::test]
async fn no_engine_available_is_permanent() {
    let registry = EngineRegistry::new();
    let mut tts = TextToSpeech::new(&registry, test_config()).await;

    assert_eq!(tts.state(), EngineState::BackendError);
    assert!(tts.last_error().is_some());
    for _ in 0..3 {
        let result = tts.say("hello").await;
        assert!(matches!(result, Err(VoxCastError::NoEngineAvailable)));
        assert_eq!(tts.state(), EngineState::BackendError);
    }
    assert!(tts.available_locales().is_empty());
    assert!(tts.available_voices(None).is_empty());
}

#[tokio::test]
async fn selection_falls_back_past_failing_engine() {
    let failing = MockEngineFactory::new(MockConfig {
        fail_initialize: Some("model missing".to_string()),
        ..MockConfig::default()
    });
    let mut registry = EngineRegistry::new();
    registry.register(Box::new(failing));
    registry.register(Box::new(NoOpEngineFactory));

    let tts = TextToSpeech::new(&registry, test_config()).await;
    assert_eq!(tts.engine_info().unwrap().id, "noop");
    assert_eq!(tts.state(), EngineState::Ready);
}

// ─── Speaking lifecycle ─────────────────────────────────────────────

#[tokio::test]
async fn say_enters_speaking_before_any_completion() {
    let (mut tts, handle) = mock_tts(MockConfig::default()).await;
    let rx = tts.subscribe();

    tts.say("hello").await.unwrap();
    assert_eq!(tts.state(), EngineState::Speaking);
    assert_eq!(drain(&rx), vec![TtsEvent::StateChanged(EngineState::Speaking)]);
    assert_eq!(handle.last_spoken().unwrap().1, "hello");
}

#[tokio::test]
async fn completed_callback_returns_to_ready() {
    let (mut tts, handle) = mock_tts(MockConfig::default()).await;
    let rx = tts.subscribe();

    tts.say("hello").await.unwrap();
    assert!(handle.complete(SpeakOutcome::Completed));
    tts.poll();

    assert_eq!(tts.state(), EngineState::Ready);
    assert!(tts.current_utterance().is_none());
    assert_eq!(
        drain(&rx),
        vec![
            TtsEvent::StateChanged(EngineState::Speaking),
            TtsEvent::StateChanged(EngineState::Ready),
        ]
    );
}

#[tokio::test]
async fn failed_completion_enters_backend_error_with_reason() {
    let (mut tts, handle) = mock_tts(MockConfig::default()).await;

    tts.say("hello").await.unwrap();
    handle.complete(SpeakOutcome::Failed("engine crashed".to_string()));
    tts.poll();

    assert_eq!(tts.state(), EngineState::BackendError);
    assert_eq!(tts.last_error(), Some("engine crashed"));

    // Recoverable: a new say re-attempts and speaks again.
    tts.say("retry").await.unwrap();
    assert_eq!(tts.state(), EngineState::Speaking);
}

#[tokio::test]
async fn say_while_busy_is_rejected() {
    let (mut tts, handle) = mock_tts(MockConfig::default()).await;

    tts.say("first").await.unwrap();
    let result = tts.say("second").await;
    assert!(matches!(result, Err(VoxCastError::Busy)));
    assert_eq!(handle.speak_count(), 1);
    assert_eq!(tts.current_utterance().unwrap().text, "first");
}

#[tokio::test]
async fn dispatch_failure_surfaces_as_state_not_error() {
    let (mut tts, _handle) = mock_tts(MockConfig {
        fail_speak: Some("synthesis denied".to_string()),
        ..MockConfig::default()
    })
    .await;
    let rx = tts.subscribe();

    let result = tts.say("hello").await;
    assert!(result.is_ok());
    assert_eq!(tts.state(), EngineState::BackendError);
    assert!(tts.last_error().unwrap().contains("synthesis denied"));
    assert_eq!(
        drain(&rx),
        vec![TtsEvent::StateChanged(EngineState::BackendError)]
    );

    // Re-entering BackendError produces no duplicate notification.
    tts.say("again").await.unwrap();
    assert_eq!(tts.state(), EngineState::BackendError);
    assert!(drain(&rx).is_empty());
}

// ─── Stop ───────────────────────────────────────────────────────────

#[tokio::test]
async fn stop_when_ready_is_a_silent_noop() {
    let (mut tts, handle) = mock_tts(MockConfig::default()).await;
    let rx = tts.subscribe();

    tts.stop().await;
    assert_eq!(tts.state(), EngineState::Ready);
    assert!(drain(&rx).is_empty());
    assert_eq!(handle.stop_calls(), 0);
}

#[tokio::test]
async fn stop_cancels_and_discards_the_late_completion() {
    let (mut tts, handle) = mock_tts(MockConfig::default()).await;
    let rx = tts.subscribe();

    tts.say("hello").await.unwrap();
    tts.stop().await;
    assert_eq!(tts.state(), EngineState::Ready);
    assert_eq!(handle.stop_calls(), 1);
    assert_eq!(
        drain(&rx),
        vec![
            TtsEvent::StateChanged(EngineState::Speaking),
            TtsEvent::StateChanged(EngineState::Ready),
        ]
    );

    // The engine reports the cancelled playback afterwards; the stale
    // signal must not produce another transition.
    assert!(handle.complete(SpeakOutcome::Stopped));
    tts.poll();
    assert_eq!(tts.state(), EngineState::Ready);
    assert!(drain(&rx).is_empty());
}

// ─── Pause and resume ───────────────────────────────────────────────

#[tokio::test]
async fn pause_and_resume_keep_the_same_utterance() {
    let (mut tts, handle) = mock_tts(MockConfig::default()).await;

    tts.say("long text").await.unwrap();
    let utterance_id = tts.current_utterance().unwrap().id;

    tts.pause().await;
    assert_eq!(tts.state(), EngineState::Paused);
    assert_eq!(handle.pause_calls(), 1);

    tts.resume().await;
    assert_eq!(tts.state(), EngineState::Speaking);
    assert_eq!(handle.resume_calls(), 1);
    assert_eq!(tts.current_utterance().unwrap().id, utterance_id);
    assert_eq!(handle.speak_count(), 1);

    // The original dispatch is still live and completes normally.
    handle.complete(SpeakOutcome::Completed);
    tts.poll();
    assert_eq!(tts.state(), EngineState::Ready);
}

#[tokio::test]
async fn restart_engines_redispatch_the_retained_utterance_on_resume() {
    let (mut tts, handle) = mock_tts(MockConfig {
        pause: PauseSupport::RestartsUtterance,
        ..MockConfig::default()
    })
    .await;

    tts.say("start over").await.unwrap();
    let utterance_id = tts.current_utterance().unwrap().id;

    tts.pause().await;
    assert_eq!(tts.state(), EngineState::Paused);

    tts.resume().await;
    assert_eq!(tts.state(), EngineState::Speaking);
    assert_eq!(handle.speak_count(), 2);
    let (redispatched_id, text) = handle.last_spoken().unwrap();
    assert_eq!(redispatched_id, utterance_id);
    assert_eq!(text, "start over");

    handle.complete(SpeakOutcome::Completed);
    tts.poll();
    assert_eq!(tts.state(), EngineState::Ready);
}

#[tokio::test]
async fn pause_without_support_is_a_reported_failure() {
    let (mut tts, handle) = mock_tts(MockConfig {
        pause: PauseSupport::Unsupported,
        ..MockConfig::default()
    })
    .await;
    let rx = tts.subscribe();

    tts.say("hello").await.unwrap();
    tts.pause().await;

    assert_eq!(tts.state(), EngineState::BackendError);
    assert!(tts.last_error().unwrap().contains("pause"));
    assert_eq!(handle.pause_calls(), 0);
    assert_eq!(
        drain(&rx),
        vec![
            TtsEvent::StateChanged(EngineState::Speaking),
            TtsEvent::StateChanged(EngineState::BackendError),
        ]
    );
}

#[tokio::test]
async fn pause_and_resume_outside_their_states_are_noops() {
    let (mut tts, handle) = mock_tts(MockConfig::default()).await;
    let rx = tts.subscribe();

    tts.pause().await;
    tts.resume().await;
    assert_eq!(tts.state(), EngineState::Ready);
    assert!(drain(&rx).is_empty());
    assert_eq!(handle.pause_calls(), 0);
    assert_eq!(handle.resume_calls(), 0);
}

// ─── Parameters ─────────────────────────────────────────────────────

#[tokio::test]
async fn volume_is_clamped_never_rejected() {
    let (mut tts, _handle) = mock_tts(MockConfig::default()).await;
    let rx = tts.subscribe();

    tts.set_volume(150).await;
    assert_eq!(tts.volume(), 100);
    tts.set_volume(-5).await;
    assert_eq!(tts.volume(), 0);
    assert_eq!(
        drain(&rx),
        vec![TtsEvent::VolumeChanged(100), TtsEvent::VolumeChanged(0)]
    );
}

#[tokio::test]
async fn pitch_and_rate_are_clamped_to_unit_range() {
    let (mut tts, _handle) = mock_tts(MockConfig::default()).await;

    tts.set_pitch(2.0).await;
    assert_eq!(tts.pitch(), 1.0);
    tts.set_rate(-4.5).await;
    assert_eq!(tts.rate(), -1.0);
}

#[tokio::test]
async fn noop_sets_emit_no_notifications() {
    let (mut tts, _handle) = mock_tts(MockConfig::default()).await;
    let rx = tts.subscribe();

    tts.set_volume(80).await;
    tts.set_pitch(0.0).await;
    tts.set_locale(Locale::new("en-US")).await;
    assert!(drain(&rx).is_empty());
}

#[tokio::test]
async fn stored_value_reconciles_with_engine_coercion() {
    let (mut tts, handle) = mock_tts(MockConfig {
        coerce_pitch: Some(0.25),
        ..MockConfig::default()
    })
    .await;
    let rx = tts.subscribe();

    tts.set_pitch(0.5).await;
    assert_eq!(tts.pitch(), 0.25);
    assert_eq!(drain(&rx), vec![TtsEvent::PitchChanged(0.25)]);
    assert_eq!(handle.applied_params().pitch, 0.25);
}

#[tokio::test]
async fn voice_change_ripples_into_locale() {
    let (mut tts, _handle) = mock_tts(MockConfig::default()).await;
    let rx = tts.subscribe();

    tts.set_voice(helga()).await;
    assert_eq!(tts.voice().unwrap().name, "helga");
    assert_eq!(tts.locale(), &Locale::new("de-DE"));
    assert_eq!(
        drain(&rx),
        vec![
            TtsEvent::VoiceChanged(helga()),
            TtsEvent::LocaleChanged(Locale::new("de-DE")),
        ]
    );
}

#[tokio::test]
async fn locale_change_ripples_into_voice() {
    let (mut tts, _handle) = mock_tts(MockConfig::default()).await;
    let rx = tts.subscribe();

    tts.set_locale(Locale::new("de-DE")).await;
    assert_eq!(tts.locale(), &Locale::new("de-DE"));
    assert_eq!(tts.voice().unwrap().name, "helga");
    assert_eq!(
        drain(&rx),
        vec![
            TtsEvent::LocaleChanged(Locale::new("de-DE")),
            TtsEvent::VoiceChanged(helga()),
        ]
    );
}

#[tokio::test]
async fn utterances_snapshot_their_parameters() {
    let (mut tts, _handle) = mock_tts(MockConfig::default()).await;

    tts.set_volume(30).await;
    tts.say("snapshot").await.unwrap();
    tts.set_volume(90).await;

    let utterance = tts.current_utterance().unwrap();
    assert_eq!(utterance.params.volume, 30);
    assert_eq!(tts.volume(), 90);
}

#[tokio::test]
async fn available_voices_filter_by_locale() {
    let (tts, _handle) = mock_tts(MockConfig::default()).await;

    assert_eq!(tts.available_voices(None).len(), 3);
    let german: Vec<Voice> = tts.available_voices(Some(&Locale::new("de-DE")));
    assert_eq!(german.len(), 1);
    assert_eq!(german[0].name, "helga");
    assert!(tts
        .available_voices(Some(&Locale::new("zh-CN")))
        .is_empty());
}
