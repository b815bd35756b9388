//! Request and response types exchanged with a recognition engine.

use std::fmt;
use std::str::FromStr;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, LicenseError};

/// Side length of the working canvas handed to face detection.
pub const FACE_CANVAS_SIZE: u32 = 400;

/// MRZ document family used as a recognition hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Any MRZ document.
    #[default]
    None,
    /// Passport (TD3).
    Passport,
    /// Identity card (TD1/TD2).
    IdCard,
    /// Visa (MRV-A/MRV-B).
    Visa,
}

impl DocumentType {
    /// Numeric hint passed to the engine.
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Passport => 1,
            Self::IdCard => 2,
            Self::Visa => 3,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Passport => "passport",
            Self::IdCard => "id_card",
            Self::Visa => "visa",
        };
        f.write_str(name)
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "none" | "other" | "any" => Ok(Self::None),
            "passport" => Ok(Self::Passport),
            "id_card" | "id" | "idcard" => Ok(Self::IdCard),
            "visa" => Ok(Self::Visa),
            other => Err(format!("unknown document type: {}", other)),
        }
    }
}

/// Engine tuning knobs, applied once after initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    /// Allowed document blur (0 = sharp only, 100 = anything).
    pub blur_percentage: u8,

    /// Allowed blur over the detected face.
    pub face_blur_percentage: u8,

    /// Lower glare bound in percent.
    pub glare_min_percentage: u8,

    /// Upper glare bound in percent.
    pub glare_max_percentage: u8,

    /// Reject photocopied documents.
    pub check_photocopy: bool,

    /// Reject documents with a hologram over the face.
    pub detect_hologram: bool,

    /// Low light tolerance (0 = allow dark, 100 = require bright).
    pub low_light_tolerance: u8,

    /// Motion threshold between consecutive frames.
    pub motion_threshold: u32,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            blur_percentage: 62,
            face_blur_percentage: 70,
            glare_min_percentage: 6,
            glare_max_percentage: 98,
            check_photocopy: false,
            detect_hologram: true,
            low_light_tolerance: 39,
            motion_threshold: 18,
        }
    }
}

/// Outcome of engine initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Raw status; negative values encode license failures.
    pub status: i32,

    /// Whether the license enables MRZ recognition.
    pub mrz_enabled: bool,
}

impl EngineStatus {
    /// Turn a negative status into the matching license error.
    pub fn into_result(self) -> Result<Self, EngineError> {
        if self.status < 0 {
            Err(LicenseError::from_status(self.status).into())
        } else {
            Ok(self)
        }
    }
}

/// Result of a cheap gate (document presence or lighting).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Check {
    /// Whether the frame passed the gate.
    pub accepted: bool,

    /// Message or error code to show the user.
    pub message: Option<String>,
}

impl Check {
    /// A passing check.
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            message: None,
        }
    }

    /// A failing check with a message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: Some(message.into()),
        }
    }

    /// A failing check without anything to show.
    pub fn silent_reject() -> Self {
        Self::default()
    }
}

/// Valid face area inside a detection canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    /// Region anchored at the canvas origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Face image as returned by the engine: a canvas plus the part of it that
/// actually holds the face.
#[derive(Debug, Clone)]
pub struct FaceCapture {
    pub canvas: RgbaImage,
    pub region: FaceRegion,
}

/// Output of the MRZ recognition call.
#[derive(Debug, Clone, Default)]
pub struct Recognition {
    /// Raw engine status; `> 0` means the MRZ was read.
    pub status: i32,

    /// Face located on the same frame, if any.
    pub face: Option<FaceCapture>,

    /// MRZ text lines, top to bottom.
    pub lines: Vec<String>,
}

impl Recognition {
    /// A failed recognition with the given status.
    pub fn failed(status: i32) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// A successful recognition without a face.
    pub fn mrz<S: Into<String>>(lines: impl IntoIterator<Item = S>) -> Self {
        Self {
            status: 1,
            face: None,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach a face capture.
    pub fn with_face(mut self, face: FaceCapture) -> Self {
        self.face = Some(face);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status > 0
    }
}

/// Output of the standalone face detection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaceDetection {
    /// Raw engine status; `> 0` means a face was found.
    pub status: i32,

    /// Valid area inside the working canvas.
    pub region: FaceRegion,
}

impl FaceDetection {
    pub fn is_success(&self) -> bool {
        self.status > 0
    }
}

/// Result of the face quality check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FaceCheck {
    /// Response code, `None` when the engine returned nothing.
    pub code: Option<i32>,

    /// Message attached to a rejection.
    pub message: Option<String>,
}

/// Interpretation of a [`FaceCheck`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceVerdict {
    /// Face is good enough to keep.
    Accepted,
    /// Face was rejected (quality, blur, hologram...); the user may retry.
    Rejected { code: i32, message: Option<String> },
    /// The engine gave no answer at all.
    Empty,
}

impl FaceCheck {
    /// Code for an accepted face.
    pub const ACCEPTED: i32 = 1;
    /// Code for a face rejected on quality.
    pub const QUALITY_REJECTED: i32 = 10;

    pub fn accepted() -> Self {
        Self {
            code: Some(Self::ACCEPTED),
            message: None,
        }
    }

    pub fn rejected(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: Some(message.into()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn verdict(&self) -> FaceVerdict {
        match self.code {
            Some(Self::ACCEPTED) => FaceVerdict::Accepted,
            Some(code) => FaceVerdict::Rejected {
                code,
                message: self.message.clone().filter(|m| !m.is_empty()),
            },
            None => FaceVerdict::Empty,
        }
    }
}
