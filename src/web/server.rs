use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::cli::ServeArgs;
use crate::sampler::SamplerConfig;
use crate::web::transcribe::WhisperCli;
use crate::web::{api, progress, transcribe};

/// Uploads can be full-length videos.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

pub struct AppState {
    pub upload_root: PathBuf,
    pub output_root: PathBuf,
    pub sampler: SamplerConfig,
    pub whisper: WhisperCli,
}

pub async fn run_server(args: ServeArgs) -> Result<()> {
    std::fs::create_dir_all(&args.upload_root)?;
    std::fs::create_dir_all(&args.output_root)?;

    let whisper = WhisperCli::new(args.whisper_bin, args.whisper_model, args.language);
    if whisper.is_ready() {
        info!("Whisper model found at {}", whisper.model.display());
    } else {
        warn!(
            "Whisper model not found at {}; /api/transcribe will report not_loaded",
            whisper.model.display()
        );
    }

    let state = Arc::new(AppState {
        upload_root: args.upload_root,
        output_root: args.output_root,
        sampler: SamplerConfig {
            interval_secs: args.sampling_interval,
            ..SamplerConfig::default()
        },
        whisper,
    });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/api/videos", get(api::get_videos).post(api::upload_video))
        .route("/api/runs", get(api::get_runs))
        .route("/api/runs/:run_id/progress", get(progress::progress_stream))
        .route("/api/runs/:run_id/result", get(api::get_result))
        .route("/api/transcribe", post(transcribe::transcribe))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let mut current_port = args.port;
    let listener = loop {
        let addr = SocketAddr::new(args.host, current_port);
        match TcpListener::bind(addr) {
            Ok(listener) => {
                // Set non-blocking before registering with Tokio
                listener.set_nonblocking(true)?;
                info!("Successfully bound to {}", addr);
                break listener;
            }
            Err(e) => {
                warn!("Failed to bind to {}: {}. Trying next port...", addr, e);
                current_port = current_port.wrapping_add(1);
                if current_port == 0 {
                    return Err(anyhow::anyhow!("No available ports found"));
                }
            }
        }
    };

    let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
    info!(
        "framemark server started on http://{:?}",
        tokio_listener.local_addr()?
    );

    axum::serve(tokio_listener, app).await?;

    Ok(())
}
