use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use subtitle_composer::batch::{self, BatchSummary};
use subtitle_composer::compose::{BurnJob, Composer};
use subtitle_composer::config::Config;
use subtitle_composer::cover::CoverRenderer;
use subtitle_composer::ffmpeg::Ffprobe;
use subtitle_composer::init;
use tracing::{Level, error, warn};

#[derive(Parser)]
#[command(name = "subtitle-composer")]
#[command(about = "Burn bilingual subtitles into videos and render title covers", long_about = None)]
struct Cli {
    /// Config file (defaults to ./config.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Burn subtitles into one video
    Burn {
        /// Input video path
        #[arg(short, long)]
        input: PathBuf,

        /// Translation subtitle file
        #[arg(short, long)]
        trans: PathBuf,

        /// Source-language subtitle file
        #[arg(short, long)]
        src: Option<PathBuf>,

        /// Output video path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the filter graph and encoder arguments without encoding
    Plan {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        trans: PathBuf,

        #[arg(short, long)]
        src: Option<PathBuf>,

        #[arg(short, long, default_value = "output.mp4")]
        output: PathBuf,
    },

    /// Render one cover image
    Cover {
        /// Background image
        #[arg(short, long)]
        input: PathBuf,

        /// Title text
        #[arg(short, long)]
        title: String,

        /// Output image (format from extension)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Burn every video under a directory that has trans.srt beside it
    BatchBurn {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Render covers for every image under a directory
    BatchCovers {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "covers")]
        output: PathBuf,

        /// JSON map of file name or stem to title
        #[arg(long)]
        titles: Option<PathBuf>,

        /// Worker threads (defaults to available cores)
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

async fn composer(config: Arc<Config>) -> Composer {
    if !init::check_ffmpeg(&config.ffmpeg_program).await {
        warn!("{} not found in PATH. Please install FFmpeg.", config.ffmpeg_program);
    }
    let encoder = init::resolve_encoder(&config).await;
    let probe = Ffprobe {
        program: config.ffprobe_program.clone(),
    };
    Composer::new(config, Arc::new(probe), encoder)
}

fn exit_code(summary: &BatchSummary) -> i32 {
    if summary.failed() > 0 { 1 } else { 0 }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = Arc::new(Config::load_or_default(cli.config.as_deref()).await?);

    match cli.command {
        Commands::Burn {
            input,
            trans,
            src,
            output,
        } => {
            if let Some(dir) = output.parent() {
                init::ensure_output_dir(dir).await?;
            }
            let composer = composer(config).await;
            let job = BurnJob {
                source_video: input,
                source_srt: src,
                translation_srt: trans,
                output,
            };
            composer.run(&job).await?;
            Ok(0)
        }
        Commands::Plan {
            input,
            trans,
            src,
            output,
        } => {
            let encoder = init::resolve_encoder(&config).await;
            let probe = Ffprobe {
                program: config.ffprobe_program.clone(),
            };
            let composer = Composer::new(config, Arc::new(probe), encoder);
            let job = BurnJob {
                source_video: input,
                source_srt: src,
                translation_srt: trans,
                output,
            };
            let plan = composer.plan(&job).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(0)
        }
        Commands::Cover {
            input,
            title,
            output,
        } => {
            if let Some(dir) = output.parent() {
                init::ensure_output_dir(dir).await?;
            }
            let renderer = CoverRenderer::from_config(&config)?;
            let report = renderer.render(&input, &title, &output)?;
            if report.overflowed {
                warn!("Title truncated to {} lines", report.lines.len());
            }
            Ok(0)
        }
        Commands::BatchBurn { input, output } => {
            init::ensure_output_dir(&output).await?;
            let jobs = batch::discover_burn_jobs(&input, &output)?;
            if jobs.is_empty() {
                warn!("No videos with subtitles under {}", input.display());
                return Ok(0);
            }
            let composer = Arc::new(composer(config).await);
            let summary = batch::burn_all(composer, jobs, batch::available_workers()).await;
            summary.log("Batch burn");
            Ok(exit_code(&summary))
        }
        Commands::BatchCovers {
            input,
            output,
            titles,
            workers,
        } => {
            init::ensure_output_dir(&output).await?;
            let titles = match titles {
                Some(path) => batch::load_title_map(&path).await?,
                None => HashMap::new(),
            };
            let items = batch::discover_cover_items(&input, &output, &titles)?;
            let renderer = CoverRenderer::from_config(&config)?;
            let workers = workers.unwrap_or_else(batch::available_workers);
            let summary = tokio::task::spawn_blocking(move || batch::render_covers(&renderer, items, workers))
                .await
                .context("Cover workers did not finish")??;
            summary.log("Batch covers");
            Ok(exit_code(&summary))
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            1
        }
    };
    std::process::exit(code);
}
