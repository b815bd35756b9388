//! Aggregated scan result.

use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};

use mrzscan_engine::DocumentType;

use crate::mrz::MrzFields;

/// Side of the document being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSide {
    #[default]
    Front,
    Back,
}

impl DocumentSide {
    pub fn other(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

/// Everything recognized during one scan.
///
/// Bitmaps are not serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecogResult {
    /// Document family the scan was configured for.
    pub document_type: DocumentType,

    /// Status of the last successful recognition call.
    pub ret: i32,

    /// Raw MRZ lines as read by the engine.
    pub lines: Vec<String>,

    /// Decoded MRZ fields.
    pub fields: Option<MrzFields>,

    #[serde(skip)]
    pub document_front: Option<DynamicImage>,

    #[serde(skip)]
    pub document_back: Option<DynamicImage>,

    #[serde(skip)]
    pub face: Option<RgbaImage>,
}

impl RecogResult {
    pub fn new(document_type: DocumentType) -> Self {
        Self {
            document_type,
            ..Self::default()
        }
    }

    /// Whether the MRZ was read and every check digit matches.
    pub fn is_valid(&self) -> bool {
        self.fields.as_ref().is_some_and(MrzFields::is_valid)
    }

    pub fn has_mrz(&self) -> bool {
        self.fields.is_some()
    }

    pub fn has_face(&self) -> bool {
        self.face.is_some()
    }

    /// Record a successful MRZ read.
    pub fn set_mrz(&mut self, ret: i32, lines: Vec<String>, fields: MrzFields) {
        self.ret = ret;
        self.lines = lines;
        self.fields = Some(fields);
    }

    /// Keep the document image for a side.
    pub fn store_document(&mut self, side: DocumentSide, image: DynamicImage) {
        match side {
            DocumentSide::Front => self.document_front = Some(image),
            DocumentSide::Back => self.document_back = Some(image),
        }
    }

    pub fn document(&self, side: DocumentSide) -> Option<&DynamicImage> {
        match side {
            DocumentSide::Front => self.document_front.as_ref(),
            DocumentSide::Back => self.document_back.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mrz::parse_mrz;

    #[test]
    fn test_validity_follows_fields() {
        let mut result = RecogResult::new(DocumentType::Passport);
        assert!(!result.is_valid());
        assert!(!result.has_mrz());

        let lines = vec![
            "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<".to_string(),
            "L898902C36UTO7408122F1204159ZE184226B<<<<<10".to_string(),
        ];
        let fields = parse_mrz(&lines).unwrap();
        result.set_mrz(1, lines, fields);

        assert!(result.is_valid());
        assert_eq!(result.ret, 1);
    }

    #[test]
    fn test_serialization_skips_images() {
        let mut result = RecogResult::new(DocumentType::Visa);
        result.store_document(DocumentSide::Back, DynamicImage::new_rgb8(2, 2));
        result.face = Some(RgbaImage::new(1, 1));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["document_type"], "visa");
        assert!(json.get("document_back").is_none());
        assert!(json.get("face").is_none());
        assert!(result.document(DocumentSide::Back).is_some());
        assert!(result.document(DocumentSide::Front).is_none());
    }
}
