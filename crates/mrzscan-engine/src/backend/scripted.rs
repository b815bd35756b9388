//! Deterministic engine replaying queued responses.
//!
//! Each call kind has its own queue. When a queue runs dry the engine falls
//! back to a neutral answer: gates pass, recognition and face detection
//! fail, the face check answers nothing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, Rgba, RgbaImage};
use tracing::trace;

use crate::backend::RecognitionEngine;
use crate::error::EngineError;
use crate::types::{
    Check, DocumentType, EngineParams, EngineStatus, FaceCheck, FaceDetection, Recognition,
};
use crate::Result;

/// Pixel painted over the detected face area.
const FACE_PIXEL: Rgba<u8> = Rgba([200, 150, 120, 255]);

/// A call received by a [`ScriptedEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    Initialize,
    ApplyParams,
    CheckDocument,
    CheckLight,
    Recognize(DocumentType),
    DetectFace,
    CheckFace,
    Close { dispose: bool },
}

/// Shared record of engine calls, readable after the engine moved away.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<EngineCall>>>);

impl CallLog {
    fn record(&self, call: EngineCall) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    /// Number of MRZ recognition calls.
    pub fn recognitions(&self) -> usize {
        self.count(|call| matches!(call, EngineCall::Recognize(_)))
    }
}

/// Engine answering from scripted queues.
pub struct ScriptedEngine {
    status: EngineStatus,
    documents: VecDeque<Check>,
    lights: VecDeque<Check>,
    recognitions: VecDeque<Recognition>,
    detections: VecDeque<FaceDetection>,
    face_checks: VecDeque<FaceCheck>,
    recognize_hook: Option<Box<dyn FnMut() + Send>>,
    log: CallLog,
    closed: bool,
}

impl ScriptedEngine {
    /// Create an engine with a valid license and MRZ enabled.
    pub fn new() -> Self {
        Self {
            status: EngineStatus {
                status: 1,
                mrz_enabled: true,
            },
            documents: VecDeque::new(),
            lights: VecDeque::new(),
            recognitions: VecDeque::new(),
            detections: VecDeque::new(),
            face_checks: VecDeque::new(),
            recognize_hook: None,
            log: CallLog::default(),
            closed: false,
        }
    }

    /// Set the initialization status.
    pub fn with_status(mut self, status: EngineStatus) -> Self {
        self.status = status;
        self
    }

    /// Queue a document check answer.
    pub fn with_document_check(mut self, check: Check) -> Self {
        self.documents.push_back(check);
        self
    }

    /// Queue a light check answer.
    pub fn with_light_check(mut self, check: Check) -> Self {
        self.lights.push_back(check);
        self
    }

    /// Queue a recognition answer.
    pub fn with_recognition(mut self, recognition: Recognition) -> Self {
        self.recognitions.push_back(recognition);
        self
    }

    /// Queue a face detection answer.
    pub fn with_face_detection(mut self, detection: FaceDetection) -> Self {
        self.detections.push_back(detection);
        self
    }

    /// Queue a face check answer.
    pub fn with_face_check(mut self, check: FaceCheck) -> Self {
        self.face_checks.push_back(check);
        self
    }

    /// Run `hook` at the start of every recognition call.
    pub fn on_recognize(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.recognize_hook = Some(Box::new(hook));
        self
    }

    /// Handle to the call record.
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }

    fn enter(&self, call: EngineCall) -> Result<()> {
        trace!("scripted engine call: {:?}", call);
        self.log.record(call);
        if self.closed {
            return Err(EngineError::Closed);
        }
        Ok(())
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn initialize(&mut self) -> Result<EngineStatus> {
        self.enter(EngineCall::Initialize)?;
        Ok(self.status)
    }

    fn apply_params(&mut self, _params: &EngineParams) -> Result<()> {
        self.enter(EngineCall::ApplyParams)
    }

    fn check_document(&mut self, _image: &DynamicImage) -> Result<Check> {
        self.enter(EngineCall::CheckDocument)?;
        Ok(self.documents.pop_front().unwrap_or_else(Check::accepted))
    }

    fn check_light(&mut self, _image: &DynamicImage) -> Result<Check> {
        self.enter(EngineCall::CheckLight)?;
        Ok(self.lights.pop_front().unwrap_or_else(Check::accepted))
    }

    fn recognize(
        &mut self,
        _image: &DynamicImage,
        document_type: DocumentType,
    ) -> Result<Recognition> {
        self.enter(EngineCall::Recognize(document_type))?;
        if let Some(hook) = self.recognize_hook.as_mut() {
            hook();
        }
        Ok(self
            .recognitions
            .pop_front()
            .unwrap_or_else(|| Recognition::failed(0)))
    }

    fn detect_face(
        &mut self,
        _image: &DynamicImage,
        canvas: &mut RgbaImage,
    ) -> Result<FaceDetection> {
        self.enter(EngineCall::DetectFace)?;
        let detection = self.detections.pop_front().unwrap_or_default();

        if detection.is_success() {
            let region = detection.region;
            let x_end = region.x.saturating_add(region.width).min(canvas.width());
            let y_end = region.y.saturating_add(region.height).min(canvas.height());
            for y in region.y..y_end {
                for x in region.x..x_end {
                    canvas.put_pixel(x, y, FACE_PIXEL);
                }
            }
        }

        Ok(detection)
    }

    fn check_face(&mut self, _face: &RgbaImage) -> Result<FaceCheck> {
        self.enter(EngineCall::CheckFace)?;
        Ok(self.face_checks.pop_front().unwrap_or_default())
    }

    fn close(&mut self, dispose: bool) {
        self.log.record(EngineCall::Close { dispose });
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FaceRegion, FACE_CANVAS_SIZE};
    use pretty_assertions::assert_eq;

    fn frame() -> DynamicImage {
        DynamicImage::new_rgba8(8, 8)
    }

    #[test]
    fn test_queues_then_fallbacks() {
        let mut engine = ScriptedEngine::new()
            .with_document_check(Check::rejected("2"))
            .with_recognition(Recognition::mrz(["LINE1", "LINE2"]));

        assert_eq!(engine.check_document(&frame()).unwrap(), Check::rejected("2"));
        assert_eq!(engine.check_document(&frame()).unwrap(), Check::accepted());

        let first = engine.recognize(&frame(), DocumentType::Passport).unwrap();
        assert!(first.is_success());
        let second = engine.recognize(&frame(), DocumentType::Passport).unwrap();
        assert!(!second.is_success());
    }

    #[test]
    fn test_detect_face_paints_region() {
        let mut engine = ScriptedEngine::new().with_face_detection(FaceDetection {
            status: 1,
            region: FaceRegion::from_size(10, 20),
        });
        let mut canvas = RgbaImage::new(FACE_CANVAS_SIZE, FACE_CANVAS_SIZE);

        let detection = engine.detect_face(&frame(), &mut canvas).unwrap();

        assert!(detection.is_success());
        assert_eq!(*canvas.get_pixel(9, 19), FACE_PIXEL);
        assert_eq!(*canvas.get_pixel(10, 19), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_call_log_and_close() {
        let mut engine = ScriptedEngine::new();
        let log = engine.call_log();

        engine.initialize().unwrap();
        engine.recognize(&frame(), DocumentType::Visa).unwrap();
        engine.close(true);

        assert!(matches!(
            engine.check_light(&frame()),
            Err(EngineError::Closed)
        ));
        assert_eq!(
            log.calls(),
            vec![
                EngineCall::Initialize,
                EngineCall::Recognize(DocumentType::Visa),
                EngineCall::Close { dispose: true },
                EngineCall::CheckLight,
            ]
        );
        assert_eq!(log.recognitions(), 1);
    }
}
