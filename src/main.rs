use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use media_uploader::delivery::thumbnail_key;
use media_uploader::models::StrategyKind;
use media_uploader::thumbnail::FrameExtractor;
use media_uploader::upload::UploadEvent;
use media_uploader::{Config, ContentKind, MediaUploader, UploadResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "media-uploader")]
#[command(about = "Upload images and videos to S3 and resolve their CDN URLs")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a local image or video.
    Upload {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Content kind; inferred from the file extension when omitted.
        #[arg(long, value_parser = parse_kind_arg)]
        kind: Option<ContentKind>,
        /// Override MEDIA_UPLOAD_STRATEGY.
        #[arg(long, value_parser = parse_strategy_arg)]
        strategy: Option<StrategyKind>,
    },
    /// Print the CDN URL for an object key.
    Url {
        key: String,
        /// Route by explicit kind instead of the `.jpeg` key heuristic.
        #[arg(long, value_parser = parse_kind_arg)]
        kind: Option<ContentKind>,
    },
    /// Print the CDN thumbnail URL for a video key.
    ThumbnailUrl { key: String },
    /// Extract the first frame of a local video as PNG.
    ExtractFrame {
        #[arg(value_name = "VIDEO")]
        video: PathBuf,
        #[arg(value_name = "OUTPUT_PNG")]
        output: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct UploadReport {
    #[serde(flatten)]
    result: UploadResult,
    cdn_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail_url: Option<String>,
}

fn parse_kind_arg(input: &str) -> std::result::Result<ContentKind, String> {
    input.parse().map_err(|e: media_uploader::Error| e.to_string())
}

fn parse_strategy_arg(input: &str) -> std::result::Result<StrategyKind, String> {
    input.parse().map_err(|e: media_uploader::Error| e.to_string())
}

fn infer_kind(file: &Path) -> Result<ContentKind> {
    file.extension()
        .and_then(|ext| ext.to_str())
        .and_then(ContentKind::from_extension)
        .ok_or_else(|| {
            anyhow!(
                "Cannot infer content kind of {}; pass --kind image|video",
                file.display()
            )
        })
}

async fn upload(
    mut config: Config,
    file: PathBuf,
    kind: Option<ContentKind>,
    strategy: Option<StrategyKind>,
) -> Result<()> {
    let kind = match kind {
        Some(kind) => kind,
        None => infer_kind(&file)?,
    };
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }

    let uploader = MediaUploader::new(config).await?;
    info!(
        "Uploading {} as {:?} ({} strategy)",
        file.display(),
        kind,
        uploader.strategy_name()
    );
    let mut handle = uploader.spawn_file_upload(file, kind);

    while let Some(event) = handle.next_event().await {
        match event {
            UploadEvent::Progress(fraction) => info!("progress: {:.1}%", fraction * 100.0),
            UploadEvent::Completed(result) => {
                let result = result.context("Upload failed")?;
                let report = UploadReport {
                    cdn_url: uploader.delivery().url_for(&result.key, result.kind),
                    thumbnail_url: match result.kind {
                        ContentKind::Video => {
                            Some(uploader.delivery().thumbnail_url(&result.key))
                        }
                        ContentKind::Image => None,
                    },
                    result,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }

    Ok(())
}

fn load_config() -> Result<Config> {
    Config::from_env().context("Failed to load configuration")
}

async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Upload {
            file,
            kind,
            strategy,
        } => upload(load_config()?, file, kind, strategy).await,
        Command::Url { key, kind } => {
            let delivery = media_uploader::delivery::DeliveryUrls::from_config(&load_config()?);
            let url = match kind {
                Some(kind) => delivery.url_for(&key, kind),
                None => delivery.url_for_key(&key),
            };
            println!("{}", url);
            Ok(())
        }
        Command::ThumbnailUrl { key } => {
            let delivery = media_uploader::delivery::DeliveryUrls::from_config(&load_config()?);
            info!("Thumbnail key: {}", thumbnail_key(&key));
            println!("{}", delivery.thumbnail_url(&key));
            Ok(())
        }
        Command::ExtractFrame { video, output } => {
            // Only the ffmpeg path is needed; buckets and CDNs may be unset here.
            let extractor = FrameExtractor::new(Config::ffmpeg_path_from_env());
            let frame = extractor
                .extract_first_frame(&video)
                .await
                .ok_or_else(|| anyhow!("No frame could be extracted from {}", video.display()))?;
            FrameExtractor::save_png(frame, &output).await?;
            info!("Saved frame to {}", output.display());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_uploader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
