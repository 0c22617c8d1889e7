//! Speech backends: Piper neural TTS when configured, macOS `say` otherwise.
//!
//! Piper renders to a temporary WAV which is played through rodio. A Piper
//! failure falls back to `say` for the same phrase.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use rodio::{Decoder, OutputStreamBuilder, Sink};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SpeechConfig;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("{command} exited with {status}")]
    Exited { command: String, status: ExitStatus },
    #[error("audio file: {0}")]
    Io(#[from] std::io::Error),
    #[error("audio playback failed: {0}")]
    Playback(String),
}

/// Anything that can turn a phrase into sound. Blocks until done.
pub trait Speaker: Send + Sync {
    fn describe(&self) -> String;
    fn speak(&self, phrase: &str) -> Result<(), SpeechError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechBackend {
    Piper {
        bin: PathBuf,
        model: PathBuf,
        config: Option<PathBuf>,
    },
    Say,
}

/// Piper only when the binary exists and the model path names a real file.
pub fn select_backend(piper_bin: Option<PathBuf>, model: &str, config: &str) -> SpeechBackend {
    let Some(bin) = piper_bin else {
        return SpeechBackend::Say;
    };
    let model = model.trim();
    if model.is_empty() || !Path::new(model).exists() {
        return SpeechBackend::Say;
    }

    let config = config.trim();
    let config = (!config.is_empty() && Path::new(config).exists()).then(|| PathBuf::from(config));

    SpeechBackend::Piper {
        bin,
        model: PathBuf::from(model),
        config,
    }
}

fn locate_piper(explicit: &str) -> Option<PathBuf> {
    let name = if explicit.trim().is_empty() { "piper" } else { explicit.trim() };
    which::which(name).ok()
}

pub struct SpeechEngine {
    backend: SpeechBackend,
    say_command: String,
    voice: String,
    rate: u32,
}

impl SpeechEngine {
    pub fn new(config: &SpeechConfig) -> Self {
        Self::with_piper_bin(config, locate_piper(&config.piper_command))
    }

    pub fn with_piper_bin(config: &SpeechConfig, piper_bin: Option<PathBuf>) -> Self {
        let backend = select_backend(
            piper_bin,
            &config.piper_model_path,
            &config.piper_config_path,
        );

        let engine = Self {
            backend,
            say_command: config.say_command.clone(),
            voice: config.voice.clone(),
            rate: config.rate,
        };
        info!("Speech engine: {}", engine.describe());
        engine
    }

    pub fn backend(&self) -> &SpeechBackend {
        &self.backend
    }

    fn say_args(&self, phrase: &str) -> Vec<String> {
        vec![
            "-v".into(),
            self.voice.clone(),
            "-r".into(),
            self.rate.to_string(),
            phrase.to_string(),
        ]
    }

    fn speak_say(&self, phrase: &str) -> Result<(), SpeechError> {
        debug!("say: {phrase}");
        let status = Command::new(&self.say_command)
            .args(self.say_args(phrase))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| SpeechError::Spawn {
                command: self.say_command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(SpeechError::Exited {
                command: self.say_command.clone(),
                status,
            });
        }
        Ok(())
    }

    fn speak_piper(
        &self,
        bin: &Path,
        model: &Path,
        config: Option<&Path>,
        phrase: &str,
    ) -> Result<(), SpeechError> {
        // Removed when dropped, whichever way this returns.
        let wav = tempfile::Builder::new()
            .prefix("talking-t-")
            .suffix(".wav")
            .tempfile()?;

        let mut cmd = Command::new(bin);
        cmd.arg("--model")
            .arg(model)
            .arg("--output_file")
            .arg(wav.path());
        if let Some(config) = config {
            cmd.arg("--config").arg(config);
        }

        let command = bin.display().to_string();
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                command: command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(phrase.as_bytes()) {
                warn!("Failed to write phrase to piper: {e}");
            }
        }
        let status = child
            .wait()
            .map_err(|source| SpeechError::Spawn { command, source })?;

        if !status.success() {
            warn!("piper exited with {status}, falling back to say");
            return self.speak_say(phrase);
        }

        play_wav(wav.path())
    }
}

impl Speaker for SpeechEngine {
    fn describe(&self) -> String {
        match &self.backend {
            SpeechBackend::Piper { model, .. } => {
                let name = model
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                format!("Piper ({name})")
            }
            SpeechBackend::Say => format!("say ({})", self.voice),
        }
    }

    fn speak(&self, phrase: &str) -> Result<(), SpeechError> {
        match &self.backend {
            SpeechBackend::Piper { bin, model, config } => {
                self.speak_piper(bin, model, config.as_deref(), phrase)
            }
            SpeechBackend::Say => self.speak_say(phrase),
        }
    }
}

/// Play a WAV file on the default output and block until it finishes.
fn play_wav(path: &Path) -> Result<(), SpeechError> {
    let stream = OutputStreamBuilder::open_default_stream()
        .map_err(|e| SpeechError::Playback(format!("failed to open audio output: {e}")))?;
    let sink = Sink::connect_new(stream.mixer());

    let file = File::open(path)?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| SpeechError::Playback(format!("failed to decode {}: {e}", path.display())))?;
    sink.append(source);
    sink.sleep_until_end();

    Ok(())
}
