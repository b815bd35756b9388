//! Decoding of the raw answers produced by the compiled engine.
//!
//! Gate calls answer with a small JSON object
//! (`{"responseCode": 1, "responseMessage": "..."}`), MRZ recognition fills
//! an integer buffer with character codes.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{Check, FaceCheck};

/// JSON answer of the document, light and face checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResponse {
    pub response_code: i32,
    #[serde(default)]
    pub response_message: String,
}

impl EngineResponse {
    /// Parse a raw answer; `None` or blank input means the engine said nothing.
    pub fn parse(raw: Option<&str>) -> Result<Option<Self>, EngineError> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| EngineError::MalformedResponse(format!("{}: {}", e, raw)))
    }

    fn message(&self) -> Option<String> {
        let message = self.response_message.trim();
        (!message.is_empty()).then(|| message.to_string())
    }

    /// Interpret as a document-presence check (code 1 passes).
    pub fn into_document_check(response: Option<Self>) -> Check {
        match response {
            Some(r) if r.response_code == 1 => Check::accepted(),
            Some(r) => Check {
                accepted: false,
                message: r.message(),
            },
            None => Check::silent_reject(),
        }
    }

    /// Interpret as a lighting check (code 1 passes, any other positive code
    /// carries a message).
    pub fn into_light_check(response: Option<Self>) -> Check {
        match response {
            Some(r) if r.response_code == 1 => Check::accepted(),
            Some(r) if r.response_code > 0 => Check {
                accepted: false,
                message: r.message(),
            },
            _ => Check::silent_reject(),
        }
    }

    /// Interpret as a face quality check.
    pub fn into_face_check(response: Option<Self>) -> FaceCheck {
        match response {
            Some(r) => FaceCheck {
                code: Some(r.response_code),
                message: r.message(),
            },
            None => FaceCheck::empty(),
        }
    }
}

/// Decode the integer buffer filled by MRZ recognition into text lines.
///
/// Each entry is a Unicode scalar value; `\n` separates lines and `0`
/// terminates the text.
pub fn decode_mrz_buffer(buffer: &[i32]) -> Vec<String> {
    let text: String = buffer
        .iter()
        .take_while(|&&c| c != 0)
        .filter_map(|&c| u32::try_from(c).ok().and_then(char::from_u32))
        .collect();

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
