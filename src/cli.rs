use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the annotation backend (uploads, sampling runs, transcription).
    Serve(ServeArgs),
    /// Sample a single video and print the frame sequence as JSON.
    Sample(SampleArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind to
    #[arg(long, default_value_t = 3001)]
    pub port: u16,

    /// Directory for uploaded media
    #[arg(long, env = "FRAMEMARK_UPLOAD_ROOT", default_value = "uploads")]
    pub upload_root: PathBuf,

    /// Directory for sampling-run artifacts
    #[arg(long, env = "FRAMEMARK_OUTPUT_ROOT", default_value = "runs")]
    pub output_root: PathBuf,

    /// Seconds between frame samples
    #[arg(long, default_value_t = 5.0)]
    pub sampling_interval: f64,

    /// Path to the whisper-cli binary
    #[arg(long, env = "FRAMEMARK_WHISPER_BIN", default_value = "whisper-cli")]
    pub whisper_bin: PathBuf,

    /// Path to the whisper model file
    #[arg(
        long,
        env = "FRAMEMARK_WHISPER_MODEL",
        default_value = "models/ggml-large-v3-turbo.bin"
    )]
    pub whisper_model: PathBuf,

    /// Default transcription language
    #[arg(long, env = "FRAMEMARK_LANGUAGE", default_value = "pl")]
    pub language: String,
}

#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    /// Video file to sample
    pub video: PathBuf,

    /// Seconds between frame samples
    #[arg(long, default_value_t = 5.0)]
    pub interval: f64,

    /// Write the result here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
