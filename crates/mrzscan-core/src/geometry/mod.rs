//! Frame geometry: decoding, orientation and viewfinder cropping.

pub mod frame;
pub mod transform;
pub mod viewfinder;

pub use frame::{CameraFacing, PixelFormat, RawFrame, SensorRotation, orient};
pub use transform::{CropPlan, FrameTransformer, ProcessedFrame, plan_crop, transform, try_transform};
pub use viewfinder::{CropRect, PixelRect, Rect, ScaleFactors, ViewfinderSpec, scale_factors};
