//! Error types for the mrzscan-core library.

use thiserror::Error;

/// Main error type for the mrzscan library.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Frame decoding or cropping error.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// MRZ text parsing error.
    #[error("MRZ error: {0}")]
    Mrz(#[from] MrzError),

    /// Error from the recognition engine.
    #[error("engine error: {0}")]
    Engine(#[from] mrzscan_engine::EngineError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The scanner worker is gone.
    #[error("scanner worker stopped unexpectedly")]
    WorkerStopped,
}

/// Errors related to raw frame decoding and cropping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// Width or height is zero.
    #[error("frame has zero dimensions ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    /// The buffer is shorter than the format requires.
    #[error("frame buffer too short: expected {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },

    /// The frame size does not fit in memory.
    #[error("frame dimensions too large ({width}x{height})")]
    TooLarge { width: u32, height: u32 },

    /// Sensor rotation is not a multiple of 90 degrees.
    #[error("unsupported rotation: {0}")]
    InvalidRotation(i32),

    /// Encoded buffer could not be decoded.
    #[error("failed to decode frame: {0}")]
    Decode(String),

    /// The guide rectangle does not overlap the frame.
    #[error("viewfinder lies outside the frame")]
    OutsideFrame,
}

/// Errors related to configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A percentage is above 100.
    #[error("{field} must be within 0..=100, got {value}")]
    Percentage { field: &'static str, value: u8 },

    /// Glare bounds are inverted.
    #[error("glare minimum {min} exceeds maximum {max}")]
    GlareRange { min: u8, max: u8 },

    /// A viewfinder dimension is zero.
    #[error("{field} must be positive")]
    Dimension { field: &'static str },

    /// Unknown configuration key.
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),

    /// Value cannot be parsed for a key.
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    /// The file is not valid JSON for a configuration.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Errors related to MRZ text parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MrzError {
    /// Line count and lengths match no known layout.
    #[error("unrecognized MRZ layout: {lines} lines of length {length}")]
    UnknownLayout { lines: usize, length: usize },

    /// A line contains characters outside `A-Z0-9<`.
    #[error("invalid characters in MRZ line {0}")]
    InvalidCharacters(usize),

    /// A date field is not a valid YYMMDD date.
    #[error("invalid {field} date: {value}")]
    InvalidDate { field: &'static str, value: String },
}

/// Result type for the mrzscan library.
pub type Result<T> = std::result::Result<T, ScanError>;
