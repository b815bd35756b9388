//! Core library for MRZ document scanning.
//!
//! This crate provides:
//! - Frame geometry (raw frame decoding, rotation, viewfinder cropping)
//! - MRZ parsing for the ICAO 9303 layouts with check digit validation
//! - Scan configuration and result models
//! - The scan state machine and a threaded scanner driving a
//!   [`RecognitionEngine`]

pub mod error;
pub mod geometry;
pub mod models;
pub mod mrz;
pub mod scan;

pub use error::{ConfigError, GeometryError, MrzError, Result, ScanError};
pub use geometry::{
    CameraFacing, FrameTransformer, PixelFormat, ProcessedFrame, RawFrame, SensorRotation,
    ViewfinderSpec, transform,
};
pub use models::{DocumentSide, RecogResult, ScanConfig, ScanMode, ScanOptions};
pub use mrz::{MrzFields, MrzFormat, parse_mrz};
pub use scan::{
    ErrorCode, FrameOutcome, ProcessMessage, ProcessUpdate, ScanEvent, ScanObserver, ScanPhase,
    ScanSession, ScanStateMachine, ScanStats, ScanTitle, Scanner, SubmitOutcome,
};

/// Re-export engine types.
pub use mrzscan_engine::{
    DocumentType, EngineError, EngineParams, LicenseError, RecognitionEngine, ScriptedEngine,
};

#[cfg(feature = "native")]
pub use mrzscan_engine::NativeEngine;
