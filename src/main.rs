use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

use keyframe_stitch::generator::{self, GenerateOptions};
use keyframe_stitch::init;
use keyframe_stitch::stitch;

#[derive(Debug, Parser)]
#[command(
    name = "keyframe-stitch",
    version,
    about = "Generate and stitch AI video segments from a keyframe job config"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check a job config and report every problem at once
    Validate {
        /// Path to the JSON job config
        config: PathBuf,
    },
    /// Generate segment clips via the remote service
    Generate {
        /// Path to the JSON job config
        config: PathBuf,
        /// Directory for seg_000.mp4, seg_001.mp4, ...
        #[arg(long, short = 'o', default_value = "runway_segments")]
        output_dir: PathBuf,
        /// Regenerate all segments, writing versioned files instead of skipping
        #[arg(long)]
        no_skip_existing: bool,
        /// Request audio in generated clips (when the model supports it)
        #[arg(long)]
        audio: bool,
        /// Max parallel generation tasks
        #[arg(long, default_value_t = 3)]
        max_workers: usize,
    },
    /// Concatenate generated segments into one video, in segment order
    Stitch {
        /// Same job config used for generation (defines segment count/order)
        config: PathBuf,
        /// Directory containing seg_000.mp4, seg_001.mp4, ...
        #[arg(long, short = 'd', default_value = "runway_segments")]
        output_dir: PathBuf,
        /// Final stitched video path
        #[arg(long, short = 'o', default_value = "stitched_output.mp4")]
        output: PathBuf,
        /// Keep audio in the final video (default: strip)
        #[arg(long)]
        audio: bool,
    },
    /// Change a clip's playback speed
    SpeedUp {
        /// Input video path
        #[arg(default_value = "stitched.mp4")]
        input: PathBuf,
        /// Output path (default: input name with a _fast suffix)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Playback speed factor
        #[arg(long, short = 's', default_value_t = 1.622161)]
        speed: f64,
    },
    /// Scale an image to the exact pixel dimensions of a reference image
    ScaleImage {
        /// Image to scale
        source: PathBuf,
        /// Image whose dimensions to match
        reference: PathBuf,
        /// Output path (default: overwrite source)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

async fn require_ffmpeg() -> bool {
    if init::check_ffmpeg().await {
        return true;
    }
    eprintln!("ffmpeg not found in PATH. Install FFmpeg first.");
    false
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let code = match cli.command {
        Command::Validate { config } => generator::run_validate(&config).await?,
        Command::Generate {
            config,
            output_dir,
            no_skip_existing,
            audio,
            max_workers,
        } => {
            generator::run_generate(
                &config,
                GenerateOptions {
                    output_dir,
                    skip_existing: !no_skip_existing,
                    include_audio: audio,
                    max_workers,
                },
            )
            .await?
        }
        Command::Stitch {
            config,
            output_dir,
            output,
            audio,
        } => {
            if !require_ffmpeg().await {
                1
            } else {
                let (job, _) = generator::load_job(&config).await?;
                match stitch::stitch_segments(&job, &output_dir, &output, audio).await {
                    Ok(()) => {
                        println!("Done: {}", output.display());
                        0
                    }
                    Err(err) => {
                        eprintln!("{err:#}");
                        1
                    }
                }
            }
        }
        Command::SpeedUp {
            input,
            output,
            speed,
        } => {
            if !require_ffmpeg().await {
                1
            } else {
                match stitch::speed_up(&input, output.as_deref(), speed).await {
                    Ok(path) => {
                        println!("Done: {}", path.display());
                        0
                    }
                    Err(err) => {
                        eprintln!("{err:#}");
                        1
                    }
                }
            }
        }
        Command::ScaleImage {
            source,
            reference,
            output,
        } => {
            if !require_ffmpeg().await {
                1
            } else {
                match stitch::scale_image_to_match(&source, &reference, output.as_deref()).await {
                    Ok(path) => {
                        println!("Done: {}", path.display());
                        0
                    }
                    Err(err) => {
                        eprintln!("{err:#}");
                        1
                    }
                }
            }
        }
    };
    std::process::exit(code);
}
