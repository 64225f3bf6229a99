use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use framemark::cli::{Cli, Command, SampleArgs};
use framemark::media::ffmpeg_source::FfmpegSource;
use framemark::sampler::frames::sample_video;
use framemark::sampler::{SampleProgress, SamplerConfig};
use framemark::web::server::run_server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse_args();
    match cli.command {
        Command::Serve(args) => run_server(args).await?,
        Command::Sample(args) => run_sample(args).await?,
    }

    Ok(())
}

/// One-shot sampling from the command line, with a progress bar fed by
/// the same side channel the server streams over SSE.
async fn run_sample(args: SampleArgs) -> Result<()> {
    let config = SamplerConfig {
        interval_secs: args.interval,
        ..SamplerConfig::default()
    };
    let progress = Arc::new(SampleProgress::new());

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}%")?
            .progress_chars("#>-"),
    );

    let reporter = {
        let progress = progress.clone();
        let pb = pb.clone();
        tokio::spawn(async move {
            loop {
                pb.set_position(progress.percent() as u64);
                if progress.is_complete() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
    };

    let video = args.video.clone();
    let worker_progress = progress.clone();
    let data = tokio::task::spawn_blocking(move || {
        let mut source = FfmpegSource::open(&video)?;
        sample_video(&mut source, &config, &worker_progress)
    })
    .await?;

    match &data {
        Ok(_) => progress.mark_complete(),
        Err(e) => progress.mark_failed(format!("{e:#}")),
    }
    reporter.await.ok();
    pb.finish_and_clear();

    let data = data?;
    tracing::info!(
        "Sampled {} frames over {:.2}s",
        data.frames.len(),
        data.duration
    );

    let json = serde_json::to_string_pretty(&data)?;
    match args.out {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
