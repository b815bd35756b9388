//! Scan command - replay image files as camera frames through the scanner.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{debug, info, warn};

use mrzscan_core::{
    CameraFacing, DocumentSide, DocumentType, RawFrame, RecogResult, RecognitionEngine,
    ScanConfig, ScanEvent, ScanMode, Scanner, SensorRotation, SubmitOutcome,
};

use super::load_config;
use super::output::{OutputFormat, format_result};

/// Poll interval while waiting for the worker.
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Image files or glob pattern, replayed in name order
    #[arg(required = true)]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Document type hint (passport, id_card, visa, none)
    #[arg(short, long)]
    document_type: Option<DocumentType>,

    /// Completion policy (mrz_only, face_required, face_first)
    #[arg(short, long)]
    mode: Option<ScanMode>,

    /// Sensor rotation of the frames in degrees
    #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
    rotation: i32,

    /// Camera the frames come from
    #[arg(long)]
    facing: Option<CameraFacing>,

    /// Write the captured document sides and face into this directory
    #[arg(long)]
    save_images: Option<PathBuf>,
}

pub async fn run(args: ScanArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(document_type) = args.document_type {
        config.scan.document_type = document_type;
    }
    if let Some(mode) = args.mode {
        config.scan.mode = mode;
    }
    if let Some(facing) = args.facing {
        config.scan.camera_facing = facing;
    }
    let rotation = SensorRotation::from_degrees(args.rotation)?;

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_image(p))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching image files found for pattern: {}", args.input);
    }
    info!("Replaying {} frames", files.len());

    let engine = create_engine()?;
    let result = replay(engine, config, &files, rotation).await?;

    let Some(result) = result else {
        anyhow::bail!("No document recognized in {} frames", files.len());
    };

    if let Some(dir) = &args.save_images {
        save_images(&result, dir)?;
    }

    let output = format_result(&result, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total scan time: {:?}", start.elapsed());

    Ok(())
}

#[cfg(feature = "native")]
fn create_engine() -> anyhow::Result<mrzscan_core::NativeEngine> {
    Ok(mrzscan_core::NativeEngine::new())
}

#[cfg(not(feature = "native"))]
fn create_engine() -> anyhow::Result<mrzscan_core::ScriptedEngine> {
    anyhow::bail!(
        "mrzscan was built without the recognition SDK; rebuild with `--features native` to scan"
    )
}

async fn replay<E: RecognitionEngine + 'static>(
    engine: E,
    config: ScanConfig,
    files: &[PathBuf],
    rotation: SensorRotation,
) -> anyhow::Result<Option<RecogResult>> {
    let facing = config.scan.camera_facing;
    let (tx, mut rx) = unbounded_channel();
    let scanner = match Scanner::start(engine, config, Arc::new(tx)).await {
        Ok(scanner) => scanner,
        Err(e) => {
            drain(&mut rx, None);
            return Err(e.into());
        }
    };

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames {msg}")?
            .progress_chars("=>-"),
    );

    let mut completed = None;
    for path in files {
        let image = match image::open(path) {
            Ok(image) => image,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                pb.inc(1);
                continue;
            }
        };
        let frame = RawFrame::from_image(&image)
            .with_rotation(rotation)
            .with_facing(facing);

        match scanner.submit_frame(frame) {
            SubmitOutcome::Accepted => {}
            SubmitOutcome::Closed => break,
            other => debug!("{} not accepted: {:?}", path.display(), other),
        }
        while scanner.is_busy() {
            tokio::time::sleep(IDLE_POLL).await;
        }

        pb.inc(1);
        completed = drain(&mut rx, Some(&pb));
        if completed.is_some() {
            break;
        }
    }
    pb.finish_and_clear();

    let stats = scanner.shutdown(true).await?;
    debug!(
        "{} frames submitted, {} processed, {} dropped",
        stats.submitted, stats.processed, stats.dropped
    );

    Ok(completed.or_else(|| drain(&mut rx, None)))
}

/// Report pending events; returns the result if the scan completed.
fn drain(rx: &mut UnboundedReceiver<ScanEvent>, pb: Option<&ProgressBar>) -> Option<RecogResult> {
    let mut completed = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            ScanEvent::LayoutUpdated { width, height } => {
                debug!("Guide frame {}x{}", width, height);
            }
            ScanEvent::Process(update) => {
                let mut parts = Vec::new();
                if let Some(title) = update.title {
                    parts.push(title.text().to_string());
                }
                if let Some(message) = &update.message {
                    parts.push(message.to_string());
                }
                if update.flip {
                    parts.push("(turn the document over)".to_string());
                }
                let text = parts.join(" ");
                match pb {
                    Some(pb) => pb.set_message(text),
                    None => eprintln!("{} {}", style("ℹ").blue(), text),
                }
            }
            ScanEvent::Completed(result) => completed = Some(*result),
            ScanEvent::Error(message) => {
                eprintln!("{} {}", style("✗").red(), message);
            }
        }
    }
    completed
}

fn save_images(result: &RecogResult, dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir)?;

    for (side, name) in [
        (DocumentSide::Front, "document_front.png"),
        (DocumentSide::Back, "document_back.png"),
    ] {
        if let Some(image) = result.document(side) {
            image.save(dir.join(name))?;
        }
    }
    if let Some(face) = &result.face {
        face.save(dir.join("face.png"))?;
    }

    eprintln!(
        "{} Images written to {}",
        style("✓").green(),
        dir.display()
    );
    Ok(())
}

fn is_image(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(
        ext.to_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "bmp" | "tiff" | "tif" | "webp"
    )
}
