//! Highlight finder
//!
//! Finds the most interesting moments of a video: samples frames at a fixed
//! interval, scores each one with a vision model and ranks the best.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use highlight_finder::aggregate::DEFAULT_EXPORT_FILE;
use highlight_finder::analysis::{AnthropicClient, VisionScorer};
use highlight_finder::cancel::CancellationToken;
use highlight_finder::config::AppConfig;
use highlight_finder::config_file::{generate_default_config, ConfigFile};
use highlight_finder::error::{HighlightError, Result};
use highlight_finder::estimate::{estimate_cost, estimate_frame_count, format_cost};
use highlight_finder::ffmpeg::{self, FfmpegDecoder};
use highlight_finder::http::create_router;
use highlight_finder::pipeline::Pipeline;
use highlight_finder::progress::LogProgress;
use highlight_finder::sampler::{MediaDecoder, VideoSource};
use highlight_finder::state::AppState;
use highlight_finder::types::{AnalysisConfig, Model, VideoDomain};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "highlight-finder";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find and rank the best moments of a video
    Analyze(AnalyzeArgs),
    /// Print video info and the estimated frame count and cost
    Estimate(RunArgs),
    /// Serve the scoring endpoint
    Serve {
        /// Host address to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Write a default configuration file
    InitConfig {
        /// Where to write the file
        #[arg(default_value = "config.toml")]
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Video file
    video: PathBuf,
    /// Model tier: fast, balanced or best
    #[arg(short, long)]
    model: Option<String>,
    /// Kind of footage: gaming, sport or action
    #[arg(short = 't', long)]
    video_type: Option<String>,
    /// Seconds between sampled frames
    #[arg(short, long)]
    interval: Option<u64>,
    /// Minimum score kept in the results (0-10)
    #[arg(long)]
    min_score: Option<u8>,
    /// Cap on sampled frames, 0 for unbounded
    #[arg(long)]
    max_frames: Option<usize>,
    /// JPEG quality in (0, 1]
    #[arg(long)]
    quality: Option<f32>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    run: RunArgs,
    /// API key of the vision provider
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Where to write the ranked moments
    #[arg(short, long, default_value = DEFAULT_EXPORT_FILE)]
    output: PathBuf,
}

impl RunArgs {
    /// Merge the flags over the configured defaults.
    fn analysis_config(&self, app: &AppConfig, api_key: String) -> Result<AnalysisConfig> {
        let mut config = app.defaults.to_analysis_config(api_key);
        if let Some(model) = &self.model {
            config.model = Model::parse(model)
                .ok_or_else(|| HighlightError::Validation(format!("unknown model: {}", model)))?;
        }
        if let Some(video_type) = &self.video_type {
            config.domain = VideoDomain::parse(video_type).ok_or_else(|| {
                HighlightError::Validation(format!("unknown video type: {}", video_type))
            })?;
        }
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if let Some(min_score) = self.min_score {
            config.min_score = min_score;
        }
        if let Some(max_frames) = self.max_frames {
            config.max_frames = max_frames;
        }
        if let Some(quality) = self.quality {
            config.frame_quality = quality;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let app = ConfigFile::load_or_default(Some(&cli.config)).into_app_config();

    init_logging(&app);

    tracing::debug!("{} v{} starting", APP_NAME, VERSION);

    if let Err(e) = run(cli, app).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, app: AppConfig) -> Result<()> {
    match cli.command {
        Command::InitConfig { path } => {
            generate_default_config(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
        Command::Estimate(args) => {
            init_ffmpeg()?;
            estimate(&args, &app)
        }
        Command::Analyze(args) => {
            init_ffmpeg()?;
            analyze(args, &app).await
        }
        Command::Serve { host, port } => {
            init_ffmpeg()?;
            let mut server = app.server.clone();
            if let Some(host) = host {
                server.host = host;
            }
            if let Some(port) = port {
                server.port = port;
            }
            serve(server, &app).await
        }
    }
}

fn init_ffmpeg() -> Result<()> {
    ffmpeg::init()?;
    ffmpeg::install_log_filter();
    tracing::debug!("FFmpeg initialized ({})", ffmpeg::version_info());
    Ok(())
}

fn open_video(path: &Path) -> Result<(VideoSource, highlight_finder::types::VideoHandle)> {
    let source = VideoSource::Path(path.to_path_buf());
    let mut decoder = FfmpegDecoder::new();
    let handle = decoder.open(&source)?;
    decoder.close();
    Ok((source, handle))
}

fn estimate(args: &RunArgs, app: &AppConfig) -> Result<()> {
    let config = args.analysis_config(app, String::new())?;
    let (_, handle) = open_video(&args.video)?;

    let frames = estimate_frame_count(handle.duration_secs, config.interval, config.max_frames);
    println!("Video:      {}", args.video.display());
    println!("Duration:   {}", handle.duration_label());
    println!("Resolution: {}x{}", handle.width, handle.height);
    println!("Size:       {:.1} MB", handle.size_mb());
    println!("Frames:     {} (every {}s)", frames, config.interval);
    for model in Model::ALL {
        let marker = if model == config.model { "*" } else { " " };
        println!(
            "{} {:<9} {}",
            marker,
            model.name(),
            format_cost(estimate_cost(frames, model))
        );
    }
    Ok(())
}

async fn analyze(args: AnalyzeArgs, app: &AppConfig) -> Result<()> {
    let api_key = args.api_key.clone().unwrap_or_default();
    let config = args.run.analysis_config(app, api_key)?;
    config.validate()?;

    let client = app.scoring.build_client()?;
    let pipeline = Pipeline::new(client)
        .with_rate_limit(app.rate_limit.clone())
        .with_bounds(app.sampler.max_width, app.sampler.max_height);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing with the moments found so far");
            ctrl_c.cancel();
        }
    });

    let source = VideoSource::Path(args.run.video.clone());
    let summary = pipeline
        .analyze(source, FfmpegDecoder::new(), &config, &mut LogProgress, &cancel)
        .await?;

    println!(
        "{} ({}, {}x{}, {:.1} MB)",
        args.run.video.display(),
        summary.handle.duration_label(),
        summary.handle.width,
        summary.handle.height,
        summary.handle.size_mb()
    );
    if summary.results.is_empty() {
        println!("No moment scored {}/10 or more.", config.min_score);
    } else {
        print!("{}", summary.results.render_text());
    }
    if summary.skipped > 0 {
        println!(
            "{} of {} frames could not be analyzed and were skipped.",
            summary.skipped, summary.attempted
        );
    }
    if summary.cancelled {
        println!("Run cancelled; results are partial.");
    }

    summary.results.write_to(&args.output)?;
    println!("Saved {} moments to {}", summary.results.len(), args.output.display());
    Ok(())
}

async fn serve(server: highlight_finder::config::ServerConfig, app: &AppConfig) -> Result<()> {
    let scorer: Arc<dyn VisionScorer> = Arc::new(AnthropicClient::with_base_url(
        app.scoring.anthropic_url.clone(),
        app.scoring.timeout(),
    )?);
    let state = Arc::new(AppState::new(scorer, server.clone()));
    let router = create_router(state);

    let addr: SocketAddr = server
        .socket_addr()
        .parse()
        .map_err(|e| HighlightError::Config(format!("invalid listen address: {}", e)))?;
    tracing::info!("{} v{} listening on {}", APP_NAME, VERSION, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(app: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("highlight_finder={},tower_http=info", app.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if app.json_logs() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            APP_NAME,
            "analyze",
            "clip.mp4",
            "--api-key",
            "sk-test",
            "-m",
            "best",
            "-t",
            "sport",
            "--min-score",
            "8",
        ])
        .unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        let config = args
            .run
            .analysis_config(&AppConfig::default(), args.api_key.clone().unwrap())
            .unwrap();
        assert_eq!(config.model, Model::Best);
        assert_eq!(config.domain, VideoDomain::Sport);
        assert_eq!(config.min_score, 8);
        assert_eq!(config.interval, 5);
        assert_eq!(args.output, PathBuf::from("moments.json"));
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let cli = Cli::try_parse_from([APP_NAME, "estimate", "clip.mp4", "-m", "gpt"]).unwrap();
        let Command::Estimate(args) = cli.command else {
            panic!("expected estimate");
        };
        assert!(args
            .analysis_config(&AppConfig::default(), String::new())
            .is_err());
    }
}
