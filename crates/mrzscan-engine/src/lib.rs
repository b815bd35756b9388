//! Recognition engine abstraction layer for mrzscan.
//!
//! Document, light, MRZ and face checks are provided by a compiled
//! recognition library. This crate puts them behind one trait:
//! - `NativeEngine` binding `libaccurasdk` (feature `native`)
//! - `ScriptedEngine`, a deterministic engine replaying queued responses

mod backend;
mod error;
mod response;
mod types;

pub use backend::RecognitionEngine;
pub use backend::scripted::{CallLog, EngineCall, ScriptedEngine};
pub use error::{EngineError, LicenseError};
pub use response::{EngineResponse, decode_mrz_buffer};
pub use types::{
    Check, DocumentType, EngineParams, EngineStatus, FACE_CANVAS_SIZE, FaceCapture, FaceCheck,
    FaceDetection, FaceRegion, FaceVerdict, Recognition,
};

#[cfg(feature = "native")]
pub use backend::native::NativeEngine;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
