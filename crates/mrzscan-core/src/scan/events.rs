//! Events emitted to the scan consumer.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use mrzscan_engine::DocumentType;

use crate::models::RecogResult;

/// Title shown above the guide frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTitle {
    Front,
    Back,
}

impl ScanTitle {
    pub fn code(self) -> i32 {
        match self {
            Self::Front => 1,
            Self::Back => 2,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Front => "Scan Front Side of Document",
            Self::Back => "Now Scan Back Side of Document",
        }
    }
}

/// Status codes the engine and the pipeline report while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Motion,
    DocumentInFrame,
    BringDocumentInFrame,
    Processing,
    BlurDocument,
    FaceBlur,
    GlareDocument,
    Hologram,
    DarkDocument,
    PhotoCopyDocument,
    Face,
    Mrz,
    PassportMrz,
    IdMrz,
    VisaMrz,
}

impl ErrorCode {
    const ALL: [Self; 15] = [
        Self::Motion,
        Self::DocumentInFrame,
        Self::BringDocumentInFrame,
        Self::Processing,
        Self::BlurDocument,
        Self::FaceBlur,
        Self::GlareDocument,
        Self::Hologram,
        Self::DarkDocument,
        Self::PhotoCopyDocument,
        Self::Face,
        Self::Mrz,
        Self::PassportMrz,
        Self::IdMrz,
        Self::VisaMrz,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Default English text.
    pub fn text(self) -> &'static str {
        match self {
            Self::Motion => "Keep Document Steady",
            Self::DocumentInFrame => "Keep Document in Frame",
            Self::BringDocumentInFrame => "Bring Document in Frame",
            Self::Processing => "Processing...",
            Self::BlurDocument => "Blur detect in document",
            Self::FaceBlur => "Blur detected over face",
            Self::GlareDocument => "Glare detect in document",
            Self::Hologram => "Hologram Detected",
            Self::DarkDocument => "Low lighting detected",
            Self::PhotoCopyDocument => "Can not accept Photo Copy Document",
            Self::Face => "Face not detected",
            Self::Mrz => "MRZ not detected",
            Self::PassportMrz => "Passport MRZ not detected",
            Self::IdMrz => "ID card MRZ not detected",
            Self::VisaMrz => "Visa MRZ not detected",
        }
    }

    /// MRZ failure code for a document type.
    pub fn mrz_for(document_type: DocumentType) -> Self {
        match document_type {
            DocumentType::None => Self::Mrz,
            DocumentType::Passport => Self::PassportMrz,
            DocumentType::IdCard => Self::IdMrz,
            DocumentType::Visa => Self::VisaMrz,
        }
    }
}

/// Message attached to a process update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessMessage {
    Code(ErrorCode),
    Text(String),
}

impl ProcessMessage {
    /// Decode an engine message: numeric codes become [`ErrorCode`]s, other
    /// strings pass through.
    pub fn from_engine(message: &str) -> Self {
        let trimmed = message.trim();
        trimmed
            .parse::<u8>()
            .ok()
            .and_then(ErrorCode::from_code)
            .map(Self::Code)
            .unwrap_or_else(|| Self::Text(message.to_string()))
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Code(code) => Some(*code),
            Self::Text(_) => None,
        }
    }
}

impl From<ErrorCode> for ProcessMessage {
    fn from(code: ErrorCode) -> Self {
        Self::Code(code)
    }
}

impl fmt::Display for ProcessMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => f.write_str(code.text()),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Transient status for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessUpdate {
    pub title: Option<ScanTitle>,
    pub message: Option<ProcessMessage>,
    /// Ask the user to turn the document over.
    pub flip: bool,
}

impl ProcessUpdate {
    pub fn message(message: impl Into<ProcessMessage>) -> Self {
        Self {
            title: None,
            message: Some(message.into()),
            flip: false,
        }
    }

    pub fn flip_to(title: ScanTitle) -> Self {
        Self {
            title: Some(title),
            message: None,
            flip: true,
        }
    }
}

/// Everything the scan pipeline tells its consumer.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Size of the guide frame, sent once per viewfinder.
    LayoutUpdated { width: u32, height: u32 },

    /// Transient status.
    Process(ProcessUpdate),

    /// Terminal result. Sent exactly once per scan.
    Completed(Box<RecogResult>),

    /// Fatal failure; no more frames are processed.
    Error(String),
}

/// Receiver of scan events.
///
/// Called from the worker thread; implementations must not block.
pub trait ScanObserver: Send + Sync {
    fn on_event(&self, event: ScanEvent);
}

impl ScanObserver for UnboundedSender<ScanEvent> {
    fn on_event(&self, event: ScanEvent) {
        // A dropped receiver just means nobody listens any more.
        let _ = self.send(event);
    }
}

impl<T: ScanObserver + ?Sized> ScanObserver for Arc<T> {
    fn on_event(&self, event: ScanEvent) {
        (**self).on_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_codes_roundtrip() {
        for code in 0..15u8 {
            assert_eq!(ErrorCode::from_code(code).map(ErrorCode::code), Some(code));
        }
        assert_eq!(ErrorCode::from_code(15), None);
        assert_eq!(ErrorCode::from_code(8), Some(ErrorCode::DarkDocument));
    }

    #[test]
    fn test_engine_messages() {
        assert_eq!(
            ProcessMessage::from_engine("0"),
            ProcessMessage::Code(ErrorCode::Motion)
        );
        assert_eq!(
            ProcessMessage::from_engine("bring document into frame"),
            ProcessMessage::Text("bring document into frame".to_string())
        );
        assert_eq!(
            ProcessMessage::from_engine("99"),
            ProcessMessage::Text("99".to_string())
        );
        assert_eq!(ProcessMessage::from_engine(" 8 ").to_string(), "Low lighting detected");
    }

    #[test]
    fn test_mrz_code_per_document() {
        assert_eq!(ErrorCode::mrz_for(DocumentType::None).code(), 11);
        assert_eq!(ErrorCode::mrz_for(DocumentType::Passport).code(), 12);
        assert_eq!(ErrorCode::mrz_for(DocumentType::IdCard).code(), 13);
        assert_eq!(ErrorCode::mrz_for(DocumentType::Visa).code(), 14);
    }

    #[test]
    fn test_channel_observer() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.on_event(ScanEvent::LayoutUpdated {
            width: 600,
            height: 380,
        });
        assert!(matches!(
            rx.try_recv(),
            Ok(ScanEvent::LayoutUpdated {
                width: 600,
                height: 380
            })
        ));
        assert_eq!(ScanTitle::Back.code(), 2);
    }
}
