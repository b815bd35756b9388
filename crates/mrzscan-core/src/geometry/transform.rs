//! Raw frame to cropped, display-up document image.

use image::DynamicImage;
use tracing::debug;

use super::frame::{CameraFacing, RawFrame, SensorRotation, orient};
use super::viewfinder::{CropRect, PixelRect, ScaleFactors, ViewfinderSpec, scale_factors};
use crate::error::GeometryError;

/// Document image cut out of one frame.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// Display-up image cropped to the viewfinder.
    pub image: DynamicImage,

    /// Scale factors used for the projection.
    pub scale: ScaleFactors,

    /// Crop rectangle in rotated-bitmap pixels.
    pub crop: PixelRect,

    /// Rotation applied to the sensor frame.
    pub rotation: SensorRotation,

    /// Camera that produced the frame.
    pub facing: CameraFacing,
}

/// Geometry of a crop, computed before any pixel is touched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropPlan {
    pub scale: ScaleFactors,
    pub crop: PixelRect,
    pub rotated_width: u32,
    pub rotated_height: u32,
}

/// Plan the crop of a `sensor_width` x `sensor_height` frame.
///
/// Zoom offsets translate the guide in display space before scaling, the
/// same way for every rotation. `None` when the guide misses the frame.
pub fn plan_crop(
    sensor_width: u32,
    sensor_height: u32,
    rotation: SensorRotation,
    spec: &ViewfinderSpec,
    zoom_x: f32,
    zoom_y: f32,
) -> Option<CropPlan> {
    if spec.view_width == 0 || spec.view_height == 0 {
        return None;
    }

    let (rotated_width, rotated_height) = if rotation.is_transposed() {
        (sensor_height, sensor_width)
    } else {
        (sensor_width, sensor_height)
    };

    let scale = scale_factors(sensor_width, sensor_height, rotation, spec);
    let guide = spec.guide_rect(zoom_x, zoom_y);
    let crop = CropRect::project(&guide, scale).clamp(rotated_width, rotated_height);
    debug!(
        "crop plan at {}: scale {:.3}x{:.3}, crop {:?}",
        rotation, scale.width, scale.height, crop
    );

    Some(CropPlan {
        scale,
        crop: crop.to_pixels()?,
        rotated_width,
        rotated_height,
    })
}

/// Decode, orient and crop a raw frame, reporting why it failed.
pub fn try_transform(
    raw: &RawFrame,
    spec: &ViewfinderSpec,
    zoom_x: f32,
    zoom_y: f32,
    mirror: bool,
) -> Result<ProcessedFrame, GeometryError> {
    let decoded = raw.decode()?;
    let (sensor_width, sensor_height) = (decoded.width(), decoded.height());

    let plan = plan_crop(
        sensor_width,
        sensor_height,
        raw.rotation,
        spec,
        zoom_x,
        zoom_y,
    )
    .ok_or(GeometryError::OutsideFrame)?;

    let oriented = orient(decoded, raw.rotation, mirror);
    let PixelRect {
        x,
        y,
        width,
        height,
    } = plan.crop;

    Ok(ProcessedFrame {
        image: oriented.crop_imm(x, y, width, height),
        scale: plan.scale,
        crop: plan.crop,
        rotation: raw.rotation,
        facing: raw.facing,
    })
}

/// Decode, orient and crop a raw frame; `None` means skip it.
pub fn transform(
    raw: &RawFrame,
    spec: &ViewfinderSpec,
    zoom_x: f32,
    zoom_y: f32,
) -> Option<ProcessedFrame> {
    match try_transform(raw, spec, zoom_x, zoom_y, false) {
        Ok(frame) => Some(frame),
        Err(e) => {
            debug!("skipping frame: {}", e);
            None
        }
    }
}

/// Frame transformer bound to one viewfinder.
#[derive(Debug, Clone)]
pub struct FrameTransformer {
    spec: ViewfinderSpec,
    mirror_front: bool,
    zoom_x: f32,
    zoom_y: f32,
}

impl FrameTransformer {
    pub fn new(spec: ViewfinderSpec) -> Self {
        Self {
            spec,
            mirror_front: false,
            zoom_x: 0.0,
            zoom_y: 0.0,
        }
    }

    /// Mirror frames from the front camera after rotation.
    pub fn with_front_mirroring(mut self, mirror: bool) -> Self {
        self.mirror_front = mirror;
        self
    }

    pub fn set_zoom_offsets(&mut self, zoom_x: f32, zoom_y: f32) {
        self.zoom_x = zoom_x;
        self.zoom_y = zoom_y;
    }

    pub fn set_viewfinder(&mut self, spec: ViewfinderSpec) {
        self.spec = spec;
    }

    pub fn viewfinder(&self) -> &ViewfinderSpec {
        &self.spec
    }

    pub fn process(&self, raw: &RawFrame) -> Option<ProcessedFrame> {
        let mirror = self.mirror_front && raw.facing == CameraFacing::Front;
        match try_transform(raw, &self.spec, self.zoom_x, self.zoom_y, mirror) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!("skipping frame: {}", e);
                None
            }
        }
    }
}
