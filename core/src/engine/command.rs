//! espeak-ng backed engine.
//!
//! Each utterance runs one `espeak-ng` process that plays straight to the
//! default audio device. Cancel kills the process.
//!
//! Env overrides:
//! - ESPEAK_BIN
//! - ESPEAK_VOICE (used when a request names no voice)
//! - ESPEAK_WPM (words per minute at rate 1.0, default 160)

use super::{runtime_handle, EngineEventSink, SpeechEngine, Utterance};
use crate::{HeraldError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct CommandEngineConfig {
    pub espeak_bin: Option<PathBuf>,
    pub default_voice: Option<String>,
    pub base_wpm: u32,
}

impl Default for CommandEngineConfig {
    fn default() -> Self {
        let espeak_bin =
            get_from_env_or_path("ESPEAK_BIN", "espeak-ng").or_else(|| get_from_path("espeak"));
        let default_voice = std::env::var("ESPEAK_VOICE").ok().filter(|s| !s.is_empty());
        let base_wpm = std::env::var("ESPEAK_WPM")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(160);
        Self {
            espeak_bin,
            default_voice,
            base_wpm,
        }
    }
}

fn get_from_env_or_path(env_key: &str, default_bin: &str) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(env_key) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Some(pb);
        }
    }
    get_from_path(default_bin)
}

fn get_from_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(bin))
        .find(|candidate| candidate.is_file())
}

pub struct CommandEngine {
    cfg: CommandEngineConfig,
    // Cancel trigger for the running process, if any
    active: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandEngine {
    pub fn new(cfg: Option<CommandEngineConfig>) -> Self {
        let cfg = cfg.unwrap_or_default();
        match cfg.espeak_bin {
            Some(ref bin) => info!(target: "herald::engine", bin = ?bin, "Detected espeak-ng binary"),
            None => warn!(target: "herald::engine", "espeak-ng not found; every utterance will fail"),
        }
        Self {
            cfg,
            active: Mutex::new(None),
        }
    }

    pub fn is_available(&self) -> bool {
        self.cfg.espeak_bin.is_some()
    }

    fn build_command(&self, bin: &Path, utterance: &Utterance) -> Command {
        let wpm = (self.cfg.base_wpm as f32 * utterance.rate)
            .round()
            .clamp(80.0, 450.0) as u32;
        let amplitude = (100.0 * utterance.volume).round().clamp(0.0, 200.0) as u32;
        let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32;
        let voice = utterance
            .tuning
            .voice
            .clone()
            .or_else(|| self.cfg.default_voice.clone())
            .unwrap_or_else(|| utterance.language.clone());

        let mut cmd = Command::new(bin);
        cmd.arg("-v").arg(voice);
        cmd.arg("-s").arg(wpm.to_string());
        cmd.arg("-a").arg(amplitude.to_string());
        cmd.arg("-p").arg(pitch.to_string());
        if let Some(gap) = utterance.tuning.params.get("word_gap") {
            cmd.arg("-g").arg(gap);
        }
        cmd.arg("--").arg(&utterance.text);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    fn replace_active(&self, next: Option<oneshot::Sender<()>>) -> Option<oneshot::Sender<()>> {
        let mut guard = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, next)
    }
}

impl SpeechEngine for CommandEngine {
    fn name(&self) -> &'static str {
        "espeak-ng"
    }

    fn speak(&self, utterance: Utterance, sink: EngineEventSink) -> Result<()> {
        let bin = self
            .cfg
            .espeak_bin
            .as_ref()
            .ok_or_else(|| HeraldError::EngineError("espeak-ng not found".into()))?;
        let runtime = runtime_handle()?;

        let mut cmd = self.build_command(bin, &utterance);
        debug!(target: "herald::engine", command = ?cmd, "Running espeak-ng");
        let mut child = cmd
            .spawn()
            .map_err(|e| HeraldError::EngineError(format!("spawn espeak-ng: {e}")))?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        if let Some(previous) = self.replace_active(Some(cancel_tx)) {
            let _ = previous.send(());
        }

        // Read concurrently with the wait; a full stderr pipe blocks the child
        let stderr = child.stderr.take().map(|mut pipe| {
            runtime.spawn(async move {
                let mut message = String::new();
                let _ = pipe.read_to_string(&mut message).await;
                message
            })
        });
        runtime.spawn(async move {
            sink.start();
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = cancel_rx => None,
            };
            match exited {
                Some(Ok(status)) if status.success() => {
                    sink.finish(true);
                }
                Some(Ok(status)) => {
                    let message = match stderr {
                        Some(drain) => drain.await.unwrap_or_default(),
                        None => String::new(),
                    };
                    sink.error(format!("espeak-ng failed ({status}): {}", tail(&message)));
                }
                Some(Err(e)) => {
                    sink.error(format!("espeak-ng wait: {e}"));
                }
                None => {
                    if let Err(e) = child.kill().await {
                        warn!(target: "herald::engine", error = %e, "Failed to kill espeak-ng");
                    }
                    if let Some(drain) = stderr {
                        drain.abort();
                    }
                    sink.finish(false);
                }
            }
        });
        Ok(())
    }

    fn cancel(&self) -> Result<()> {
        if let Some(tx) = self.replace_active(None) {
            // Err means playback already ended on its own
            let _ = tx.send(());
        }
        Ok(())
    }
}

/// Last few hundred characters of a diagnostic, trimmed.
fn tail(message: &str) -> &str {
    let message = message.trim();
    let count = message.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return message;
    }
    let start = message
        .char_indices()
        .nth(count - STDERR_TAIL_CHARS)
        .map_or(0, |(i, _)| i);
    &message[start..]
}

const STDERR_TAIL_CHARS: usize = 400;
