use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use walkdir::WalkDir;

use crate::media::ffmpeg_source::FfmpegSource;
use crate::sampler::frames::sample_video;
use crate::sampler::{SampleProgress, SamplerConfig};
use crate::types::ProcessedVideoData;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "avi"];

lazy_static! {
    static ref RUN_REGISTRY: RwLock<HashMap<String, Arc<VideoRun>>> =
        RwLock::new(HashMap::new());
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunMetadata {
    pub run_id: String,
    pub original_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub output_dir: PathBuf,
}

/// A sampling run: shared progress while the worker is busy. The finished
/// frame sequence lives in the run directory (`frames.json`), not in
/// memory; thumbnails are too heavy to pin for the life of the server.
pub struct VideoRun {
    pub metadata: RunMetadata,
    pub progress: Arc<SampleProgress>,
}

pub fn get_run(run_id: &str) -> Option<Arc<VideoRun>> {
    RUN_REGISTRY.read().unwrap().get(run_id).cloned()
}

fn register_run(run: Arc<VideoRun>) {
    tracing::info!("Registering run {}", run.metadata.run_id);
    RUN_REGISTRY
        .write()
        .unwrap()
        .insert(run.metadata.run_id.clone(), run);
}

/// Create the on-disk run directory and metadata record. Run ids carry a
/// millisecond timestamp so re-uploading the same file never collides.
pub fn create_run(output_root: &Path, original_name: &str) -> Result<RunMetadata> {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid video name: {}", original_name))?;

    let run_id = format!("{}-{}", stem, Utc::now().timestamp_millis());
    let output_dir = output_root.join(&run_id);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let metadata = RunMetadata {
        run_id,
        original_name: original_name.to_string(),
        created_at: Utc::now(),
        output_dir: output_dir.clone(),
    };

    let content = serde_json::to_string_pretty(&metadata)?;
    fs::write(output_dir.join("metadata.json"), content)?;

    Ok(metadata)
}

pub fn list_runs(output_root: &Path) -> Result<Vec<(String, RunMetadata)>> {
    let mut runs = Vec::new();
    if !output_root.exists() {
        return Ok(runs);
    }

    for entry in fs::read_dir(output_root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let metadata_path = path.join("metadata.json");
        if !metadata_path.exists() {
            continue;
        }
        let content = fs::read_to_string(metadata_path)?;
        let mut metadata: RunMetadata = serde_json::from_str(&content)?;
        metadata.output_dir = path.clone();
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        runs.push((name, metadata));
    }

    Ok(runs)
}

pub fn list_videos(upload_root: &Path) -> Vec<PathBuf> {
    WalkDir::new(upload_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| VIDEO_EXTENSIONS.contains(&s.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Kick off sampling for an uploaded video on a blocking worker. The run
/// is observable through the registry immediately; completion (or
/// failure) is reported through its progress handle.
pub fn start_run(metadata: RunMetadata, video_path: PathBuf, config: SamplerConfig) -> Arc<VideoRun> {
    let run = Arc::new(VideoRun {
        metadata,
        progress: Arc::new(SampleProgress::new()),
    });
    register_run(run.clone());

    let worker = run.clone();
    tokio::task::spawn_blocking(move || {
        let outcome = (|| -> Result<ProcessedVideoData> {
            let mut source = FfmpegSource::open(&video_path)?;
            sample_video(&mut source, &config, &worker.progress)
        })();

        // The persisted frames.json is the result of record; a run whose
        // output cannot be written has failed.
        match outcome.and_then(|data| persist_result(&worker.metadata, &data)) {
            Ok(()) => {
                worker.progress.mark_complete();
                tracing::info!("Run {} complete", worker.metadata.run_id);
            }
            Err(e) => {
                tracing::error!("Run {} failed: {e:#}", worker.metadata.run_id);
                worker.progress.mark_failed(format!("{e:#}"));
            }
        }
    });

    run
}

/// Load a completed run's frame sequence back from its run directory.
pub fn load_result(metadata: &RunMetadata) -> Result<ProcessedVideoData> {
    let path = metadata.output_dir.join("frames.json");
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

fn persist_result(metadata: &RunMetadata, data: &ProcessedVideoData) -> Result<()> {
    let path = metadata.output_dir.join("frames.json");
    let content = serde_json::to_string_pretty(data)?;
    fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
