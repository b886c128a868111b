mod common;

use common::{test_config, NOON};
use herald_core::{
    EngineEventSink, FixedClock, HeraldError, InMemoryStore, Result, SchedulerEvent,
    SettingsPatch, SpeechEngine, SpeechRequest, SpeechScheduler, Utterance,
};
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Engine {}

    impl SpeechEngine for Engine {
        fn name(&self) -> &'static str;
        fn speak(&self, utterance: Utterance, sink: EngineEventSink) -> Result<()>;
        fn cancel(&self) -> Result<()>;
    }
}

async fn spawn(engine: MockEngine) -> SpeechScheduler {
    SpeechScheduler::builder(Arc::new(engine))
        .context(Arc::new(FixedClock::new(NOON)))
        .storage(InMemoryStore::new())
        .config(test_config())
        .spawn()
        .await
}

#[tokio::test]
async fn test_disabled_never_reaches_engine() {
    let mut engine = MockEngine::new();
    engine.expect_name().return_const("mock");
    engine.expect_speak().never();
    engine.expect_cancel().never();

    let scheduler = spawn(engine).await;
    scheduler
        .save_settings(SettingsPatch::new().enabled(false))
        .await
        .unwrap();

    for text in ["one", "two", "three"] {
        let err = scheduler.speak(SpeechRequest::urgent(text)).await.unwrap_err();
        assert!(matches!(err, HeraldError::Disabled));
    }
    assert_eq!(scheduler.usage_stats().await.unwrap().total_requests, 3);
    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_utterance_carries_settings_and_tuning() {
    let mut engine = MockEngine::new();
    engine.expect_name().return_const("mock");
    engine
        .expect_speak()
        .withf(|u, _| {
            u.text == "volume check"
                && u.language == "en"
                && (u.pitch - 1.2).abs() < 1e-6
                && (u.volume - 0.6).abs() < 1e-6
                && u.tuning.voice.as_deref() == Some("en-gb")
        })
        .times(1)
        .returning(|_, sink| {
            sink.start();
            sink.finish(true);
            Ok(())
        });
    engine.expect_cancel().returning(|| Ok(()));

    let scheduler = spawn(engine).await;
    let mut events = scheduler.subscribe();
    scheduler
        .save_settings(SettingsPatch::new().pitch(1.2).base_volume(0.7))
        .await
        .unwrap();

    // Low at noon: 0.7 base - 0.1
    let id = scheduler
        .speak(SpeechRequest::low("volume check").with_voice("en-gb"))
        .await
        .unwrap();
    common::wait_for(&mut events, |e| {
        matches!(e, SchedulerEvent::Finished { id: f, completed: true } if *f == id)
    })
    .await;
    scheduler.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_engine_rejection_counts_as_failed_attempt() {
    let mut engine = MockEngine::new();
    engine.expect_name().return_const("mock");
    engine
        .expect_speak()
        .times(4)
        .returning(|_, _| Err(HeraldError::EngineError("no audio device".into())));
    engine.expect_cancel().never();

    let scheduler = spawn(engine).await;
    let mut events = scheduler.subscribe();

    let id = scheduler.speak(SpeechRequest::new("nobody hears")).await.unwrap();
    let dropped = common::wait_for(&mut events, |e| {
        matches!(e, SchedulerEvent::Dropped { .. })
    })
    .await;
    assert_eq!(dropped, SchedulerEvent::Dropped { id });

    let status = scheduler.status().await.unwrap();
    assert!(!status.speaking);
    assert_eq!(status.queue_length, 0);
    scheduler.shutdown().await.unwrap();
}
