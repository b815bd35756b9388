//! Raw sensor frames and their decoding into oriented bitmaps.

use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GeometryError;

/// Pixel layout of a raw frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// YUV 4:2:0, full-resolution Y plane followed by interleaved V/U.
    #[default]
    Nv21,
    /// 8-bit RGBA, row-major, no padding.
    Rgba8888,
    /// 8-bit RGB, row-major, no padding.
    Rgb888,
    /// Compressed image (JPEG, PNG...) decoded by the `image` crate.
    Encoded,
}

impl PixelFormat {
    /// Minimum buffer length for a frame of the given size.
    ///
    /// `None` for encoded buffers, whose length is not tied to the size, and
    /// for sizes that do not fit in `usize`.
    pub fn expected_len(self, width: u32, height: u32) -> Option<usize> {
        let (w, h) = (width as usize, height as usize);
        let pixels = w.checked_mul(h)?;
        match self {
            Self::Nv21 => chroma_stride(width)?
                .checked_mul(h.div_ceil(2))?
                .checked_add(pixels),
            Self::Rgba8888 => pixels.checked_mul(4),
            Self::Rgb888 => pixels.checked_mul(3),
            Self::Encoded => None,
        }
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nv21" | "yuv" => Ok(Self::Nv21),
            "rgba" | "rgba8888" => Ok(Self::Rgba8888),
            "rgb" | "rgb888" => Ok(Self::Rgb888),
            "encoded" | "jpeg" | "jpg" | "png" => Ok(Self::Encoded),
            other => Err(format!("unknown pixel format: {}", other)),
        }
    }
}

/// Bytes per interleaved V/U row of an NV21 frame.
fn chroma_stride(width: u32) -> Option<usize> {
    (width as usize).div_ceil(2).checked_mul(2)
}

/// Clockwise rotation that brings a sensor frame to display-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SensorRotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl SensorRotation {
    /// Map a rotation tag (0..=3) to a rotation.
    pub fn from_tag(tag: i32) -> Result<Self, GeometryError> {
        match tag {
            0 => Ok(Self::Deg0),
            1 => Ok(Self::Deg90),
            2 => Ok(Self::Deg180),
            3 => Ok(Self::Deg270),
            other => Err(GeometryError::InvalidRotation(other)),
        }
    }

    /// Map a rotation in degrees; negative and >= 360 values wrap.
    pub fn from_degrees(degrees: i32) -> Result<Self, GeometryError> {
        if degrees % 90 != 0 {
            return Err(GeometryError::InvalidRotation(degrees));
        }
        Self::from_tag(degrees.rem_euclid(360) / 90)
    }

    /// Accept either a tag (0..=3) or degrees.
    pub fn from_raw(value: i32) -> Result<Self, GeometryError> {
        if (0..=3).contains(&value) {
            Self::from_tag(value)
        } else {
            Self::from_degrees(value)
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Whether width and height swap after rotation.
    pub fn is_transposed(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

impl fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Which camera produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl CameraFacing {
    /// The other camera.
    pub fn flipped(self) -> Self {
        match self {
            Self::Back => Self::Front,
            Self::Front => Self::Back,
        }
    }
}

impl FromStr for CameraFacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "back" | "rear" => Ok(Self::Back),
            "front" | "selfie" => Ok(Self::Front),
            other => Err(format!("unknown camera facing: {}", other)),
        }
    }
}

impl fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Back => "back",
            Self::Front => "front",
        })
    }
}

/// A frame as delivered by the capture layer.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub rotation: SensorRotation,
    pub facing: CameraFacing,
}

impl RawFrame {
    /// Create an upright back-camera frame.
    pub fn new(data: Vec<u8>, format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            data,
            format,
            width,
            height,
            rotation: SensorRotation::Deg0,
            facing: CameraFacing::Back,
        }
    }

    /// Wrap an already decoded image (width and height taken from it).
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(rgba.into_raw(), PixelFormat::Rgba8888, width, height)
    }

    pub fn with_rotation(mut self, rotation: SensorRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_facing(mut self, facing: CameraFacing) -> Self {
        self.facing = facing;
        self
    }

    /// Decode at native sensor resolution, without rotation.
    pub fn decode(&self) -> Result<DynamicImage, GeometryError> {
        if self.format == PixelFormat::Encoded {
            return decode_encoded(&self.data);
        }

        if self.width == 0 || self.height == 0 {
            return Err(GeometryError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }

        let expected = self
            .format
            .expected_len(self.width, self.height)
            .ok_or(GeometryError::TooLarge {
                width: self.width,
                height: self.height,
            })?;
        if self.data.len() < expected {
            return Err(GeometryError::ShortBuffer {
                expected,
                actual: self.data.len(),
            });
        }

        let short = || GeometryError::ShortBuffer {
            expected,
            actual: self.data.len(),
        };
        match self.format {
            PixelFormat::Nv21 => Ok(DynamicImage::ImageRgb8(decode_nv21(
                &self.data,
                self.width,
                self.height,
            ))),
            PixelFormat::Rgba8888 => {
                RgbaImage::from_raw(self.width, self.height, self.data[..expected].to_vec())
                    .map(DynamicImage::ImageRgba8)
                    .ok_or_else(short)
            }
            PixelFormat::Rgb888 => {
                RgbImage::from_raw(self.width, self.height, self.data[..expected].to_vec())
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(short)
            }
            PixelFormat::Encoded => decode_encoded(&self.data),
        }
    }
}

fn decode_encoded(data: &[u8]) -> Result<DynamicImage, GeometryError> {
    let image = image::load_from_memory(data).map_err(|e| GeometryError::Decode(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(GeometryError::EmptyFrame {
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(image)
}

/// Convert NV21 to RGB with integer BT.601 coefficients.
///
/// `data` must hold at least `PixelFormat::Nv21.expected_len(width, height)`
/// bytes.
fn decode_nv21(data: &[u8], width: u32, height: u32) -> RgbImage {
    let (w, h) = (width as usize, height as usize);
    let stride = 2 * w.div_ceil(2);
    let plane = w * h;

    RgbImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let luma = i32::from(data[y * w + x]);
        let uv = plane + (y / 2) * stride + (x / 2) * 2;
        let v = i32::from(data[uv]) - 128;
        let u = i32::from(data[uv + 1]) - 128;

        let r = luma + ((359 * v) >> 8);
        let g = luma - ((88 * u + 183 * v) >> 8);
        let b = luma + ((454 * u) >> 8);
        image::Rgb([clamp_u8(r), clamp_u8(g), clamp_u8(b)])
    })
}

fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Rotate a decoded frame to display-up and optionally mirror it.
pub fn orient(image: DynamicImage, rotation: SensorRotation, mirror: bool) -> DynamicImage {
    let rotated = match rotation {
        SensorRotation::Deg0 => image,
        SensorRotation::Deg90 => image.rotate90(),
        SensorRotation::Deg180 => image.rotate180(),
        SensorRotation::Deg270 => image.rotate270(),
    };
    debug!(
        "oriented frame by {} to {}x{}",
        rotation,
        rotated.width(),
        rotated.height()
    );

    if mirror { rotated.fliph() } else { rotated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba};
    use pretty_assertions::assert_eq;

    fn nv21(width: u32, height: u32, luma: u8, v: u8, u: u8) -> Vec<u8> {
        let mut data = vec![luma; (width * height) as usize];
        for _ in 0..(height as usize).div_ceil(2) {
            for _ in 0..(width as usize).div_ceil(2) {
                data.extend([v, u]);
            }
        }
        data
    }

    #[test]
    fn test_rotation_mapping() {
        assert_eq!(SensorRotation::from_tag(1), Ok(SensorRotation::Deg90));
        assert_eq!(SensorRotation::from_degrees(270), Ok(SensorRotation::Deg270));
        assert_eq!(SensorRotation::from_degrees(-90), Ok(SensorRotation::Deg270));
        assert_eq!(SensorRotation::from_degrees(450), Ok(SensorRotation::Deg90));
        assert_eq!(SensorRotation::from_raw(2), Ok(SensorRotation::Deg180));
        assert_eq!(SensorRotation::from_raw(180), Ok(SensorRotation::Deg180));
        assert_eq!(
            SensorRotation::from_raw(45),
            Err(GeometryError::InvalidRotation(45))
        );
        assert!(SensorRotation::Deg270.is_transposed());
        assert!(!SensorRotation::Deg180.is_transposed());
    }

    #[test]
    fn test_nv21_expected_len_odd_sizes() {
        assert_eq!(PixelFormat::Nv21.expected_len(4, 2), Some(8 + 4));
        assert_eq!(PixelFormat::Nv21.expected_len(3, 3), Some(9 + 4 * 2));
        assert_eq!(PixelFormat::Encoded.expected_len(3, 3), None);
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        assert_eq!(PixelFormat::Nv21.expected_len(u32::MAX, u32::MAX), None);
        assert_eq!(PixelFormat::Rgba8888.expected_len(u32::MAX, u32::MAX), None);

        for format in [PixelFormat::Nv21, PixelFormat::Rgba8888, PixelFormat::Rgb888] {
            let frame = RawFrame::new(vec![0; 16], format, u32::MAX, u32::MAX);
            assert_eq!(
                frame.decode().unwrap_err(),
                GeometryError::TooLarge {
                    width: u32::MAX,
                    height: u32::MAX
                }
            );
        }

        let tall = RawFrame::new(vec![0; 16], PixelFormat::Nv21, 100_000, 100_000);
        assert!(matches!(
            tall.decode(),
            Err(GeometryError::ShortBuffer { actual: 16, .. })
        ));
    }

    #[test]
    fn test_decode_nv21_neutral_chroma() {
        let frame = RawFrame::new(nv21(4, 2, 100, 128, 128), PixelFormat::Nv21, 4, 2);
        let image = frame.decode().unwrap();

        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image.to_rgb8().get_pixel(3, 1).0, [100, 100, 100]);
    }

    #[test]
    fn test_decode_nv21_saturates() {
        let frame = RawFrame::new(nv21(2, 2, 250, 255, 0), PixelFormat::Nv21, 2, 2);
        let pixel = frame.decode().unwrap().to_rgb8().get_pixel(0, 0).0;

        // v=127, u=-128: red saturates, blue floors.
        assert_eq!(pixel[0], 255);
        assert_eq!(pixel[2], 23);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        let short = RawFrame::new(vec![0; 10], PixelFormat::Nv21, 4, 4);
        assert_eq!(
            short.decode().unwrap_err(),
            GeometryError::ShortBuffer {
                expected: 24,
                actual: 10
            }
        );

        let empty = RawFrame::new(vec![], PixelFormat::Rgba8888, 0, 4);
        assert!(matches!(
            empty.decode(),
            Err(GeometryError::EmptyFrame { .. })
        ));

        let corrupt = RawFrame::new(vec![1, 2, 3], PixelFormat::Encoded, 0, 0);
        assert!(matches!(corrupt.decode(), Err(GeometryError::Decode(_))));
    }

    #[test]
    fn test_decode_encoded_png() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(5, 3, Rgba([9, 8, 7, 255])));
        let mut bytes = std::io::Cursor::new(Vec::new());
        source.write_to(&mut bytes, image::ImageFormat::Png).unwrap();

        let frame = RawFrame::new(bytes.into_inner(), PixelFormat::Encoded, 0, 0);
        let decoded = frame.decode().unwrap();
        assert_eq!(decoded.dimensions(), (5, 3));
    }

    #[test]
    fn test_orient_rotates_and_mirrors() {
        let mut source = RgbaImage::new(4, 2);
        source.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let image = DynamicImage::ImageRgba8(source);

        let rotated = orient(image.clone(), SensorRotation::Deg90, false);
        assert_eq!(rotated.dimensions(), (2, 4));
        // Top-left moves to top-right on a clockwise turn.
        assert_eq!(rotated.get_pixel(1, 0), Rgba([255, 0, 0, 255]));

        let mirrored = orient(image, SensorRotation::Deg0, true);
        assert_eq!(mirrored.get_pixel(3, 0), Rgba([255, 0, 0, 255]));
    }
}
