mod config;
use config::{AnnouncerConfig, EngineKind};
use herald_core::{
    CommandEngine, ContextProvider, FixedClock, InMemoryStore, JsonFileStore, LogEngine, Priority,
    RequestId, SchedulerEvent, SettingsPatch, SpeechEngine, SpeechRequest, SpeechScheduler,
    SystemClock,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

/// One parsed stdin line
#[derive(Debug, PartialEq)]
enum Input {
    Speak(Priority, String),
    Pause,
    Resume,
    Stop,
    Cancel(RequestId),
    Status,
    Queue,
    Stats,
    ClearStats,
    Enable(bool),
    Language(String),
}

/// `/command [arg]`, `priority: text`, or plain text at `default` priority.
fn parse_line(line: &str, default: Priority) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(cmd) = line.strip_prefix('/') {
        let (name, arg) = cmd.split_once(' ').unwrap_or((cmd, ""));
        let arg = arg.trim();
        return match name {
            "pause" => Some(Input::Pause),
            "resume" => Some(Input::Resume),
            "stop" => Some(Input::Stop),
            "status" => Some(Input::Status),
            "queue" => Some(Input::Queue),
            "stats" => Some(Input::Stats),
            "clear-stats" => Some(Input::ClearStats),
            "enable" => Some(Input::Enable(true)),
            "disable" => Some(Input::Enable(false)),
            "lang" if !arg.is_empty() => Some(Input::Language(arg.to_string())),
            "cancel" => arg
                .trim_start_matches("spk-")
                .parse::<u64>()
                .ok()
                .map(|n| Input::Cancel(RequestId(n))),
            _ => None,
        };
    }
    if let Some((head, rest)) = line.split_once(':') {
        if let Some(priority) = Priority::parse(head) {
            return Some(Input::Speak(priority, rest.trim().to_string()));
        }
    }
    Some(Input::Speak(default, line.to_string()))
}

async fn handle(scheduler: &SpeechScheduler, input: Input) -> herald_core::Result<()> {
    match input {
        Input::Speak(priority, text) => {
            match scheduler
                .speak(SpeechRequest::new(text).with_priority(priority))
                .await
            {
                Ok(id) => info!(target: "announcer", id = %id, priority = %priority, "Queued"),
                Err(e) if e.is_rejection() => {
                    warn!(target: "announcer", priority = %priority, reason = %e, "Not spoken")
                }
                Err(e) => return Err(e),
            }
        }
        Input::Pause => scheduler.pause().await?,
        Input::Resume => scheduler.resume().await?,
        Input::Stop => {
            let cleared = scheduler.stop().await?;
            info!(target: "announcer", cleared, "Stopped");
        }
        Input::Cancel(id) => {
            let found = scheduler.cancel(id).await?;
            info!(target: "announcer", id = %id, found, "Cancel");
        }
        Input::Status => print_json(&scheduler.status().await?),
        Input::Queue => print_json(&scheduler.queue_status().await?),
        Input::Stats => print_json(&scheduler.usage_stats().await?),
        Input::ClearStats => scheduler.clear_usage_stats().await?,
        Input::Enable(enabled) => {
            scheduler
                .save_settings(SettingsPatch::new().enabled(enabled))
                .await?;
        }
        Input::Language(language) => {
            scheduler
                .save_settings(SettingsPatch::new().language(language))
                .await?;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => error!(target: "announcer", error = %e, "Failed to render JSON"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    herald_core::telemetry::init_tracing("info,herald_core=info,announcer=info")?;

    info!(
        target: "announcer",
        "Starting announcer: stdin → Herald scheduler → speech engine"
    );

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = AnnouncerConfig::load();

    let engine: Arc<dyn SpeechEngine> = match cfg.engine {
        EngineKind::Espeak => {
            let engine = CommandEngine::new(Some(cfg.espeak.clone()));
            if engine.is_available() {
                Arc::new(engine)
            } else {
                warn!(target: "announcer", "espeak-ng unavailable; falling back to log engine");
                Arc::new(LogEngine::new(cfg.log_ms_per_char))
            }
        }
        EngineKind::Log => Arc::new(LogEngine::new(cfg.log_ms_per_char)),
    };

    let context: Arc<dyn ContextProvider> = match cfg.fixed_hour {
        Some(hour) => Arc::new(FixedClock::new(hour)),
        None => Arc::new(SystemClock::new()),
    };

    let mut builder = SpeechScheduler::builder(engine)
        .context(context)
        .config(cfg.scheduler.clone());
    builder = match &cfg.storage_dir {
        Some(dir) => {
            info!(target: "announcer", dir = %dir.display(), "Persisting to JSON files");
            builder.storage(Arc::new(JsonFileStore::new(dir.clone())))
        }
        None => builder.storage(InMemoryStore::new()),
    };
    let scheduler = builder.spawn().await;

    // Mirror scheduler lifecycle into the log
    let mut events = scheduler.subscribe();
    let events_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SchedulerEvent::Failed { id, reason, .. } => {
                    warn!(target: "announcer", id = %id, reason = %reason, "Playback failed")
                }
                SchedulerEvent::Dropped { id } => {
                    warn!(target: "announcer", id = %id, "Gave up")
                }
                other => info!(target: "announcer", event = ?other, "Scheduler event"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(input) = parse_line(&line, cfg.default_priority) {
                        if let Err(e) = handle(&scheduler, input).await {
                            error!(target: "announcer", error = %e, "Command failed");
                            break;
                        }
                    } else {
                        warn!(target: "announcer", line = %line, "Unrecognized input");
                    }
                }
                Ok(None) => {
                    info!(target: "announcer", "stdin closed; draining queue");
                    drain(&scheduler).await;
                    break;
                }
                Err(e) => {
                    error!(target: "announcer", error = %e, "Failed to read stdin");
                    break;
                }
            },
            _ = signal::ctrl_c() => {
                info!(target: "announcer", "Shutdown signal received");
                break;
            }
        }
    }

    scheduler.shutdown().await?;
    events_task.abort();
    info!(target: "announcer", "Announcer stopped");
    Ok(())
}

/// Wait until nothing is queued or playing, or until Ctrl-C.
async fn drain(scheduler: &SpeechScheduler) {
    let mut events = scheduler.subscribe();
    loop {
        match scheduler.status().await {
            Ok(s) if !s.speaking && s.queue_length == 0 => return,
            Ok(s) if s.paused && !s.speaking => {
                info!(target: "announcer", queue_length = s.queue_length, "Paused with items queued; not waiting");
                return;
            }
            Ok(_) => {}
            Err(_) => return,
        }
        tokio::select! {
            ev = events.recv() => {
                if ev.is_err() {
                    return;
                }
            }
            _ = signal::ctrl_c() => return,
        }
    }
}
