//! Per-scan state.

use std::fmt;

use mrzscan_engine::DocumentType;

use crate::models::{DocumentSide, RecogResult, ScanMode};

/// Progress of a scan through its recognition steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanPhase {
    /// Nothing recognized yet.
    #[default]
    Init,
    /// MRZ read, face still missing.
    Mrz,
    /// Face captured, MRZ still missing.
    Face,
    /// MRZ and face captured.
    Both,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::Mrz => "mrz",
            Self::Face => "face",
            Self::Both => "both",
        })
    }
}

/// Which recognition a frame is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Mrz,
    Face,
}

/// State of one scan, from start to the terminal result.
#[derive(Debug, Clone)]
pub struct ScanSession {
    document_type: DocumentType,
    mode: ScanMode,
    pub(crate) phase: ScanPhase,
    pub(crate) side: DocumentSide,
    pub(crate) complete: bool,
    pub(crate) result: RecogResult,
}

impl ScanSession {
    pub fn new(document_type: DocumentType, mode: ScanMode) -> Self {
        Self {
            document_type,
            mode,
            phase: ScanPhase::Init,
            side: DocumentSide::Front,
            complete: false,
            result: RecogResult::new(document_type),
        }
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn side(&self) -> DocumentSide {
        self.side
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Partial result accumulated so far. Empty once completed.
    pub fn result(&self) -> &RecogResult {
        &self.result
    }

    /// Recognition the next frame goes to.
    pub fn next_pass(&self) -> Pass {
        match (self.mode, self.phase) {
            (ScanMode::FaceFirst, ScanPhase::Init) | (ScanMode::FaceRequired, ScanPhase::Mrz) => {
                Pass::Face
            }
            _ => Pass::Mrz,
        }
    }

    /// Start over with the same settings.
    pub fn reset(&mut self) {
        *self = Self::new(self.document_type, self.mode);
    }

    /// Mark complete and hand over the result.
    pub(crate) fn finish(&mut self) -> RecogResult {
        self.complete = true;
        std::mem::take(&mut self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_routing() {
        let mut session = ScanSession::new(DocumentType::Passport, ScanMode::FaceRequired);
        assert_eq!(session.next_pass(), Pass::Mrz);
        session.phase = ScanPhase::Mrz;
        assert_eq!(session.next_pass(), Pass::Face);

        let mut session = ScanSession::new(DocumentType::IdCard, ScanMode::FaceFirst);
        assert_eq!(session.next_pass(), Pass::Face);
        session.phase = ScanPhase::Face;
        assert_eq!(session.next_pass(), Pass::Mrz);

        let session = ScanSession::new(DocumentType::None, ScanMode::MrzOnly);
        assert_eq!(session.next_pass(), Pass::Mrz);
    }

    #[test]
    fn test_finish_and_reset() {
        let mut session = ScanSession::new(DocumentType::Visa, ScanMode::MrzOnly);
        session.phase = ScanPhase::Mrz;
        session.result.ret = 3;

        let result = session.finish();
        assert_eq!(result.ret, 3);
        assert_eq!(result.document_type, DocumentType::Visa);
        assert!(session.is_complete());

        session.reset();
        assert!(!session.is_complete());
        assert_eq!(session.phase(), ScanPhase::Init);
        assert_eq!(session.side(), DocumentSide::Front);
        assert_eq!(session.document_type(), DocumentType::Visa);
    }
}
