//! Guide-frame geometry: where the on-screen viewfinder lands in a frame.

use serde::{Deserialize, Serialize};

use super::frame::SensorRotation;
use crate::error::ConfigError;

/// On-screen guide frame and the view it is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewfinderSpec {
    /// Guide frame width in display pixels.
    pub guide_width: u32,

    /// Guide frame height in display pixels.
    pub guide_height: u32,

    /// Horizontal pan applied to the guide frame.
    pub offset_x: f32,

    /// Vertical pan applied to the guide frame.
    pub offset_y: f32,

    /// Width of the camera preview view.
    pub view_width: u32,

    /// Height of the camera preview view.
    pub view_height: u32,

    /// Display width, used to center the guide.
    pub display_width: u32,

    /// Display height, used to center the guide.
    pub display_height: u32,
}

impl Default for ViewfinderSpec {
    fn default() -> Self {
        Self {
            guide_width: 600,
            guide_height: 380,
            offset_x: 0.0,
            offset_y: 0.0,
            view_width: 1080,
            view_height: 1920,
            display_width: 1080,
            display_height: 1920,
        }
    }
}

impl ViewfinderSpec {
    /// Reject zero-sized guide, view or display.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dimensions = [
            ("viewfinder.guide_width", self.guide_width),
            ("viewfinder.guide_height", self.guide_height),
            ("viewfinder.view_width", self.view_width),
            ("viewfinder.view_height", self.view_height),
            ("viewfinder.display_width", self.display_width),
            ("viewfinder.display_height", self.display_height),
        ];
        match dimensions.into_iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::Dimension { field }),
            None => Ok(()),
        }
    }

    /// Guide rectangle in display space, centered on the display and moved
    /// by the pan offsets plus the given zoom offsets.
    pub fn guide_rect(&self, zoom_x: f32, zoom_y: f32) -> Rect {
        let cx = self.display_width as f32 / 2.0;
        let cy = self.display_height as f32 / 2.0;
        let half_w = self.guide_width as f32 / 2.0;
        let half_h = self.guide_height as f32 / 2.0;

        Rect {
            left: cx - half_w,
            top: cy - half_h,
            right: cx + half_w,
            bottom: cy + half_h,
        }
        .translate(self.offset_x + zoom_x, self.offset_y + zoom_y)
    }
}

/// Axis-aligned rectangle in display space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }
}

/// Display-to-bitmap scale along each axis of the rotated frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactors {
    pub width: f32,
    pub height: f32,
}

/// Scale factors mapping view coordinates onto the rotated sensor frame.
///
/// For 90/270 the sensor axes swap, so the rotated width is the sensor
/// height; 0/180 keep the sensor axes.
pub fn scale_factors(
    sensor_width: u32,
    sensor_height: u32,
    rotation: SensorRotation,
    spec: &ViewfinderSpec,
) -> ScaleFactors {
    let (rotated_w, rotated_h) = if rotation.is_transposed() {
        (sensor_height, sensor_width)
    } else {
        (sensor_width, sensor_height)
    };
    ScaleFactors {
        width: rotated_w as f32 / spec.view_width as f32,
        height: rotated_h as f32 / spec.view_height as f32,
    }
}

/// Crop rectangle in rotated-bitmap pixels, possibly outside the bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl CropRect {
    /// Scale every edge of a display rectangle, truncating toward zero.
    pub fn project(rect: &Rect, scale: ScaleFactors) -> Self {
        Self {
            x: (rect.left * scale.width) as i64,
            y: (rect.top * scale.height) as i64,
            width: (rect.width() * scale.width) as i64,
            height: (rect.height() * scale.height) as i64,
        }
    }

    /// Fit into a `bound_width` x `bound_height` bitmap.
    ///
    /// A negative origin moves to zero and gives up the part that hung
    /// over; the far edges are pulled in. The origin never moves right or
    /// down. Applying it twice changes nothing.
    pub fn clamp(self, bound_width: u32, bound_height: u32) -> Self {
        let (x, width) = clamp_axis(self.x, self.width, i64::from(bound_width));
        let (y, height) = clamp_axis(self.y, self.height, i64::from(bound_height));
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Convert a clamped, non-empty rectangle to pixel coordinates.
    pub fn to_pixels(self) -> Option<PixelRect> {
        if self.is_empty() || self.x < 0 || self.y < 0 {
            return None;
        }
        Some(PixelRect {
            x: u32::try_from(self.x).ok()?,
            y: u32::try_from(self.y).ok()?,
            width: u32::try_from(self.width).ok()?,
            height: u32::try_from(self.height).ok()?,
        })
    }
}

fn clamp_axis(origin: i64, length: i64, bound: i64) -> (i64, i64) {
    let (origin, length) = if origin < 0 {
        (0, length + origin)
    } else {
        (origin, length)
    };
    (origin, length.min(bound - origin).max(0))
}

/// Crop rectangle inside a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_guide_rect_centered() {
        let spec = ViewfinderSpec::default();
        let rect = spec.guide_rect(0.0, 0.0);

        assert_eq!(
            rect,
            Rect {
                left: 240.0,
                top: 770.0,
                right: 840.0,
                bottom: 1150.0
            }
        );
        assert_eq!(rect.width(), 600.0);
        assert_eq!(rect.height(), 380.0);
    }

    #[test]
    fn test_guide_rect_keeps_odd_sizes() {
        let spec = ViewfinderSpec {
            guide_width: 601,
            guide_height: 381,
            display_width: 1081,
            display_height: 1921,
            ..ViewfinderSpec::default()
        };
        let rect = spec.guide_rect(0.0, 0.0);

        assert_eq!(rect.left, 240.0);
        assert_eq!(rect.top, 770.0);
        assert_eq!(rect.width(), 601.0);
        assert_eq!(rect.height(), 381.0);
    }

    #[test]
    fn test_guide_rect_offsets_add_up() {
        let spec = ViewfinderSpec {
            offset_x: 10.0,
            offset_y: -20.0,
            ..ViewfinderSpec::default()
        };
        let rect = spec.guide_rect(5.0, 5.0);

        assert_eq!(rect.left, 255.0);
        assert_eq!(rect.top, 755.0);
        assert_eq!(rect.width(), 600.0);
    }

    #[test]
    fn test_scale_factors_each_rotation() {
        let spec = ViewfinderSpec {
            view_width: 100,
            view_height: 200,
            ..ViewfinderSpec::default()
        };

        let s0 = scale_factors(400, 300, SensorRotation::Deg0, &spec);
        let s90 = scale_factors(400, 300, SensorRotation::Deg90, &spec);
        let s180 = scale_factors(400, 300, SensorRotation::Deg180, &spec);
        let s270 = scale_factors(400, 300, SensorRotation::Deg270, &spec);

        assert_eq!(s0, ScaleFactors { width: 4.0, height: 1.5 });
        assert_eq!(s180, s0);
        assert_eq!(s90, ScaleFactors { width: 3.0, height: 2.0 });
        assert_eq!(s270, s90);
    }

    #[test]
    fn test_clamp_negative_origin_and_far_edges() {
        let crop = CropRect {
            x: -10,
            y: 5,
            width: 50,
            height: 100,
        };
        let clamped = crop.clamp(30, 60);

        assert_eq!(
            clamped,
            CropRect {
                x: 0,
                y: 5,
                width: 30,
                height: 55
            }
        );
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let cases = [
            CropRect { x: -10, y: -10, width: 5, height: 5 },
            CropRect { x: 100, y: 0, width: 10, height: 10 },
            CropRect { x: 3, y: 4, width: 500, height: 500 },
            CropRect { x: 0, y: 0, width: 20, height: 20 },
        ];
        for crop in cases {
            let once = crop.clamp(40, 30);
            assert_eq!(once.clamp(40, 30), once);
            assert!(once.x + once.width <= 40 || once.is_empty());
            assert!(once.y + once.height <= 30 || once.is_empty());
        }
    }

    #[test]
    fn test_outside_bitmap_is_empty() {
        let crop = CropRect {
            x: 100,
            y: 0,
            width: 10,
            height: 10,
        }
        .clamp(40, 30);

        assert!(crop.is_empty());
        assert_eq!(crop.to_pixels(), None);
    }

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        assert_eq!(ViewfinderSpec::default().validate(), Ok(()));

        let spec = ViewfinderSpec {
            view_height: 0,
            ..ViewfinderSpec::default()
        };
        assert_eq!(
            spec.validate(),
            Err(ConfigError::Dimension {
                field: "viewfinder.view_height"
            })
        );
    }
}
