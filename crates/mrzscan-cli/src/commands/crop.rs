//! Crop command - cut the viewfinder area out of a single frame.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use tracing::{debug, info};

use mrzscan_core::geometry::try_transform;
use mrzscan_core::{CameraFacing, PixelFormat, RawFrame, SensorRotation};

use super::load_config;

/// Arguments for the crop command.
#[derive(Args)]
pub struct CropArgs {
    /// Frame file (raw sensor dump or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output image (format from extension)
    #[arg(short, long, default_value = "crop.png")]
    output: PathBuf,

    /// Pixel format of the frame (nv21, rgba, rgb, encoded)
    #[arg(short, long)]
    format: Option<PixelFormat>,

    /// Frame width in pixels (raw formats only)
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels (raw formats only)
    #[arg(long)]
    height: Option<u32>,

    /// Sensor rotation in degrees (0, 90, 180, 270)
    #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
    rotation: i32,

    /// Camera that produced the frame
    #[arg(long, default_value = "back")]
    facing: CameraFacing,

    /// Horizontal zoom offset in display pixels
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    zoom_x: f32,

    /// Vertical zoom offset in display pixels
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    zoom_y: f32,
}

pub async fn run(args: CropArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let format = args.format.unwrap_or_else(|| guess_format(&args.input));
    let rotation = SensorRotation::from_degrees(args.rotation)?;
    let data = fs::read(&args.input)?;

    let (width, height) = match format {
        PixelFormat::Encoded => (0, 0),
        _ => match (args.width, args.height) {
            (Some(w), Some(h)) => (w, h),
            _ => anyhow::bail!("--width and --height are required for {:?} frames", format),
        },
    };

    info!("Cropping {} ({:?}, {})", args.input.display(), format, rotation);

    let frame = RawFrame::new(data, format, width, height)
        .with_rotation(rotation)
        .with_facing(args.facing);
    let mirror = config.scan.mirror_front_camera && args.facing == CameraFacing::Front;

    let processed = try_transform(&frame, &config.viewfinder, args.zoom_x, args.zoom_y, mirror)?;
    debug!(
        "scale {:.4}x{:.4}, crop {:?}",
        processed.scale.width, processed.scale.height, processed.crop
    );

    processed.image.save(&args.output)?;

    let crop = processed.crop;
    println!(
        "{} Cropped {}x{} at ({}, {}) to {}",
        style("✓").green(),
        crop.width,
        crop.height,
        crop.x,
        crop.y,
        args.output.display()
    );

    Ok(())
}

fn guess_format(path: &Path) -> PixelFormat {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "nv21" | "yuv" => PixelFormat::Nv21,
        "rgba" => PixelFormat::Rgba8888,
        "rgb" => PixelFormat::Rgb888,
        _ => PixelFormat::Encoded,
    }
}
