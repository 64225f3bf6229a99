use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use crate::session::{
    create_run, get_run, list_runs, list_videos, load_result, start_run, RunMetadata,
};
use crate::web::server::AppState;

/// Wire-level error taxonomy. Every failure leaving the HTTP boundary is
/// one of these four kinds, wrapped in the standard envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorType {
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "TRANSCRIPTION_ERROR")]
    Transcription,
    #[serde(rename = "FILE_SYSTEM_ERROR")]
    FileSystem,
    #[serde(rename = "SERVER_ERROR")]
    Server,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ApiError {
    pub fn validation(field: &str, reason: &str) -> Self {
        Self {
            error_type: ErrorType::Validation,
            message: reason.to_string(),
            details: Some(json!({ "field": field, "reason": reason })),
            code: None,
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn unknown_run(run_id: &str) -> Self {
        Self {
            error_type: ErrorType::Validation,
            message: format!("No run with id {run_id}"),
            details: Some(json!({ "field": "runId", "reason": "unknown run id" })),
            code: None,
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn still_processing(run_id: &str) -> Self {
        Self {
            error_type: ErrorType::Validation,
            message: format!("Run {run_id} is still processing"),
            details: None,
            code: None,
            status: StatusCode::CONFLICT,
        }
    }

    pub fn transcription(message: &str, audio_file: Option<&str>, model_name: &str) -> Self {
        Self {
            error_type: ErrorType::Transcription,
            message: message.to_string(),
            details: Some(json!({ "audioFile": audio_file, "modelName": model_name })),
            code: None,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn file_system(operation: &str, path: &Path, system_error: &str) -> Self {
        Self {
            error_type: ErrorType::FileSystem,
            message: format!("File system {operation} failed"),
            details: Some(json!({
                "path": path.display().to_string(),
                "operation": operation,
                "systemError": system_error,
            })),
            code: None,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn server(message: &str) -> Self {
        Self {
            error_type: ErrorType::Server,
            message: message.to_string(),
            details: None,
            code: None,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "error": &self });
        (self.status, Json(body)).into_response()
    }
}

/// The `{success: true, data}` envelope used by every endpoint.
pub fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

#[derive(Serialize)]
pub struct VideoInfo {
    pub name: String,
    pub path: String,
}

#[derive(Serialize)]
pub struct RunInfo {
    pub name: String,
    pub metadata: RunMetadata,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uploadDir": state.upload_root,
        "modelPath": state.whisper.model,
        "modelName": state.whisper.model_name,
        "model": if state.whisper.is_ready() { "ready" } else { "not_loaded" },
    }))
}

pub async fn get_videos(State(state): State<Arc<AppState>>) -> Json<Value> {
    let info_list: Vec<VideoInfo> = list_videos(&state.upload_root)
        .into_iter()
        .map(|video_path| VideoInfo {
            name: video_path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string(),
            path: video_path.to_string_lossy().to_string(),
        })
        .collect();

    ok(info_list)
}

pub async fn get_runs(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let runs = list_runs(&state.output_root)
        .map_err(|e| ApiError::file_system("read", &state.output_root, &format!("{e:#}")))?;
    let info_list: Vec<RunInfo> = runs
        .into_iter()
        .map(|(name, metadata)| RunInfo { name, metadata })
        .collect();
    Ok(ok(info_list))
}

/// Accept a multipart video upload, store it and start a sampling run.
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut saved: Option<(String, std::path::PathBuf)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation("video", &format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("video") {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload.mp4").to_string();

        let guessed = mime_guess::from_path(&original_name).first_or_octet_stream();
        if guessed.type_() != mime_guess::mime::VIDEO {
            return Err(ApiError::validation(
                "video",
                &format!("Unsupported media type: {guessed}"),
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation("video", &format!("Upload truncated: {e}")))?;

        tokio::fs::create_dir_all(&state.upload_root)
            .await
            .map_err(|e| ApiError::file_system("write", &state.upload_root, &e.to_string()))?;

        let extension = Path::new(&original_name)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("mp4");
        let stored = state
            .upload_root
            .join(format!("{}.{}", Utc::now().timestamp_millis(), extension));
        tokio::fs::write(&stored, &bytes)
            .await
            .map_err(|e| ApiError::file_system("write", &stored, &e.to_string()))?;

        saved = Some((original_name, stored));
        break;
    }

    let (original_name, stored) =
        saved.ok_or_else(|| ApiError::validation("video", "No video file provided"))?;

    let metadata = create_run(&state.output_root, &original_name)
        .map_err(|e| ApiError::server(&format!("{e:#}")))?;
    tracing::info!("Upload {} -> run {}", original_name, metadata.run_id);
    let run = start_run(metadata, stored, state.sampler.clone());

    Ok(ok(json!({ "runId": run.metadata.run_id })))
}

/// The finished frame sequence for a run, read back from its run
/// directory. The registry only tracks metadata and progress.
pub async fn get_result(
    UrlPath(run_id): UrlPath<String>,
) -> Result<Json<Value>, ApiError> {
    let run = get_run(&run_id).ok_or_else(|| ApiError::unknown_run(&run_id))?;

    if let Some(error) = run.progress.error() {
        return Err(ApiError::server(&error));
    }
    if !run.progress.is_complete() {
        return Err(ApiError::still_processing(&run_id));
    }
    let data = load_result(&run.metadata)
        .map_err(|e| ApiError::file_system("read", &run.metadata.output_dir, &format!("{e:#}")))?;
    Ok(ok(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_uses_wire_names() {
        let error = ApiError::validation("audio", "No audio file provided");
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["type"], "VALIDATION_ERROR");
        assert_eq!(value["message"], "No audio file provided");
        assert_eq!(value["details"]["field"], "audio");
        assert!(value.get("code").is_none(), "absent code must be omitted");
    }

    #[test]
    fn error_kinds_map_to_expected_status() {
        assert_eq!(
            ApiError::validation("x", "y").status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::unknown_run("r").status, StatusCode::NOT_FOUND);
        assert_eq!(ApiError::still_processing("r").status, StatusCode::CONFLICT);
        assert_eq!(
            ApiError::transcription("boom", None, "m").status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn success_envelope_wraps_data() {
        let Json(value) = ok(json!({ "runId": "clip-1" }));
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["runId"], "clip-1");
    }
}
