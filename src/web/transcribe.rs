use anyhow::{Context, Result};
use axum::extract::{Multipart, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::web::api::{ok, ApiError};
use crate::web::server::AppState;

/// Audio types the transcription boundary accepts.
pub const ALLOWED_AUDIO_MIME: &[&str] = &[
    "audio/wav",
    "audio/x-wav",
    "audio/mp3",
    "audio/mpeg",
    "audio/m4a",
    "audio/mp4",
    "audio/x-m4a",
    "audio/x-hx-aac-adts",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Task {
    #[default]
    Transcribe,
    Translate,
}

impl Task {
    fn parse(value: &str) -> Result<Self, ApiError> {
        match value {
            "transcribe" => Ok(Task::Transcribe),
            "translate" => Ok(Task::Translate),
            other => Err(ApiError::validation(
                "task",
                &format!("Unknown task '{other}', expected transcribe or translate"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Srt,
    Vtt,
}

impl OutputFormat {
    fn parse(value: &str) -> Result<Self, ApiError> {
        match value {
            "text" => Ok(OutputFormat::Text),
            "srt" => Ok(OutputFormat::Srt),
            "vtt" => Ok(OutputFormat::Vtt),
            other => Err(ApiError::validation(
                "format",
                &format!("Unknown format '{other}', expected text, srt or vtt"),
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TranscriptionOptions {
    pub language: Option<String>,
    pub task: Task,
    pub format: OutputFormat,
}

/// Thin wrapper over the external whisper.cpp command-line tool. The
/// binary does the real work; this only builds its invocation and reads
/// the output back.
pub struct WhisperCli {
    pub binary: PathBuf,
    pub model: PathBuf,
    pub model_name: String,
    pub default_language: String,
}

impl WhisperCli {
    pub fn new(binary: PathBuf, model: PathBuf, default_language: String) -> Self {
        let model_name = model
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .trim_end_matches(".bin")
            .to_string();
        Self {
            binary,
            model,
            model_name,
            default_language,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.exists()
    }

    pub async fn transcribe(&self, audio: &Path, options: &TranscriptionOptions) -> Result<String> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.arg("-m")
            .arg(&self.model)
            .arg("-l")
            .arg(options.language.as_deref().unwrap_or(&self.default_language))
            .arg("-f")
            .arg(audio);
        if options.task == Task::Translate {
            cmd.arg("--translate");
        }
        match options.format {
            OutputFormat::Text => {
                cmd.arg("--no-timestamps");
            }
            OutputFormat::Srt => {
                cmd.arg("--output-srt");
            }
            OutputFormat::Vtt => {
                cmd.arg("--output-vtt");
            }
        }

        tracing::debug!("Running {:?}", cmd.as_std());
        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to launch {}", self.binary.display()))?;
        if !output.status.success() {
            anyhow::bail!(
                "whisper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        match options.format {
            OutputFormat::Text => Ok(String::from_utf8_lossy(&output.stdout).trim().to_string()),
            OutputFormat::Srt | OutputFormat::Vtt => {
                // The tool writes `<input>.<ext>` next to the input file.
                let ext = if options.format == OutputFormat::Srt {
                    "srt"
                } else {
                    "vtt"
                };
                let path = PathBuf::from(format!("{}.{ext}", audio.to_string_lossy()));
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Missing whisper output {}", path.display()))?;
                let _ = tokio::fs::remove_file(&path).await;
                Ok(text)
            }
        }
    }
}

/// Transcription boundary: validate the multipart request, hand the
/// audio to the external tool, and translate its outcome into the wire
/// envelope. The uploaded file is removed on both paths.
pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut audio: Option<(String, String, axum::body::Bytes)> = None;
    let mut options = TranscriptionOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation("audio", &format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("audio") => {
                let name = field.file_name().unwrap_or("audio.wav").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::validation("audio", &format!("Upload truncated: {e}"))
                })?;
                audio = Some((name, content_type, bytes));
            }
            Some("language") => {
                options.language = Some(read_text(field, "language").await?);
            }
            Some("task") => {
                options.task = Task::parse(&read_text(field, "task").await?)?;
            }
            Some("format") => {
                options.format = OutputFormat::parse(&read_text(field, "format").await?)?;
            }
            _ => {}
        }
    }

    let (original_name, content_type, data) =
        audio.ok_or_else(|| ApiError::validation("audio", "No audio file provided"))?;
    if !ALLOWED_AUDIO_MIME.contains(&content_type.as_str()) {
        return Err(ApiError::validation(
            "audio",
            &format!("Unsupported audio type: {content_type}"),
        ));
    }

    tokio::fs::create_dir_all(&state.upload_root)
        .await
        .map_err(|e| ApiError::file_system("write", &state.upload_root, &e.to_string()))?;
    let extension = Path::new(&original_name)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("wav");
    let stored = state
        .upload_root
        .join(format!("{}.{}", Utc::now().timestamp_millis(), extension));
    tokio::fs::write(&stored, &data)
        .await
        .map_err(|e| ApiError::file_system("write", &stored, &e.to_string()))?;

    let outcome = state.whisper.transcribe(&stored, &options).await;
    let cleanup = tokio::fs::remove_file(&stored).await;

    match outcome {
        Ok(raw_text) => {
            // A leaked upload is an error in its own right once
            // transcription itself has succeeded.
            cleanup.map_err(|e| ApiError::file_system("delete", &stored, &e.to_string()))?;
            Ok(ok(json!({ "rawText": raw_text })))
        }
        Err(e) => {
            if let Err(cleanup_err) = cleanup {
                tracing::warn!("Failed to clean up {}: {cleanup_err}", stored.display());
            }
            Err(ApiError::transcription(
                &format!("{e:#}"),
                Some(&original_name),
                &state.whisper.model_name,
            ))
        }
    }
}

async fn read_text(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::validation(name, &format!("Unreadable field: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_and_format_parse_wire_values() {
        assert_eq!(Task::parse("transcribe").unwrap(), Task::Transcribe);
        assert_eq!(Task::parse("translate").unwrap(), Task::Translate);
        assert!(Task::parse("summarize").is_err());

        assert_eq!(OutputFormat::parse("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("srt").unwrap(), OutputFormat::Srt);
        assert_eq!(OutputFormat::parse("vtt").unwrap(), OutputFormat::Vtt);
        assert!(OutputFormat::parse("json").is_err());
    }

    #[test]
    fn mime_allowlist_covers_the_contract() {
        for mime in ["audio/wav", "audio/mpeg", "audio/x-m4a", "audio/x-hx-aac-adts"] {
            assert!(ALLOWED_AUDIO_MIME.contains(&mime));
        }
        assert!(!ALLOWED_AUDIO_MIME.contains(&"video/mp4"));
    }

    #[test]
    fn model_name_drops_the_bin_suffix() {
        let whisper = WhisperCli::new(
            PathBuf::from("whisper-cli"),
            PathBuf::from("models/ggml-large-v3-turbo.bin"),
            "pl".to_string(),
        );
        assert_eq!(whisper.model_name, "ggml-large-v3-turbo");
    }
}
