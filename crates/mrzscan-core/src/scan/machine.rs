//! Per-frame scan orchestration.
//!
//! Every frame runs the cheap gates (document, light) first, then either the
//! MRZ pass or the face pass depending on the session phase and scan mode.
//! Per-frame failures are absorbed here and reported as events; only the
//! completed result leaves the machine.

use image::{RgbaImage, imageops};
use tracing::{debug, info, warn};

use mrzscan_engine::{
    Check, DocumentType, EngineError, FACE_CANVAS_SIZE, FaceRegion, FaceVerdict,
    RecognitionEngine,
};

use super::events::{ErrorCode, ProcessMessage, ProcessUpdate, ScanEvent, ScanObserver, ScanTitle};
use super::session::{Pass, ScanPhase, ScanSession};
use crate::geometry::ProcessedFrame;
use crate::models::{DocumentSide, ScanMode};
use crate::mrz::parse_mrz;

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The session is already complete.
    Ignored,
    DocumentRejected,
    LightRejected,
    /// No MRZ on this frame, or one that could not be parsed.
    RecognitionFailed,
    /// MRZ read; the face is still required.
    MrzRead,
    /// Face read; the MRZ is still required.
    FaceRead,
    FaceNotDetected,
    /// The face check rejected the face; retry.
    FaceRejected,
    /// The face check returned nothing.
    FaceFailed,
    /// The engine call failed for this frame.
    EngineFailed,
    /// The terminal result was emitted.
    Completed,
}

/// Drives a [`ScanSession`] with frames and a recognition engine.
pub struct ScanStateMachine<E> {
    engine: E,
    session: ScanSession,
}

impl<E: RecognitionEngine> ScanStateMachine<E> {
    /// Wrap an initialized engine.
    pub fn new(engine: E, document_type: DocumentType, mode: ScanMode) -> Self {
        Self {
            engine,
            session: ScanSession::new(document_type, mode),
        }
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Discard the current session and start a new one.
    pub fn restart(&mut self) {
        info!("restarting scan");
        self.session.reset();
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Run one frame through the pipeline.
    pub fn process_frame(
        &mut self,
        frame: &ProcessedFrame,
        observer: &dyn ScanObserver,
    ) -> FrameOutcome {
        if self.session.is_complete() {
            return FrameOutcome::Ignored;
        }

        match self.run(frame, observer) {
            Ok(outcome) => {
                debug!(
                    "frame outcome {:?} in phase {}",
                    outcome,
                    self.session.phase()
                );
                outcome
            }
            Err(e) => {
                warn!("engine call failed: {}", e);
                FrameOutcome::EngineFailed
            }
        }
    }

    fn run(
        &mut self,
        frame: &ProcessedFrame,
        observer: &dyn ScanObserver,
    ) -> Result<FrameOutcome, EngineError> {
        let document = self.engine.check_document(&frame.image)?;
        if !gate(document, observer) {
            return Ok(FrameOutcome::DocumentRejected);
        }

        let light = self.engine.check_light(&frame.image)?;
        if !gate(light, observer) {
            return Ok(FrameOutcome::LightRejected);
        }

        match self.session.next_pass() {
            Pass::Mrz => self.mrz_pass(frame, observer),
            Pass::Face => self.face_pass(frame, observer),
        }
    }

    fn mrz_pass(
        &mut self,
        frame: &ProcessedFrame,
        observer: &dyn ScanObserver,
    ) -> Result<FrameOutcome, EngineError> {
        let document_type = self.session.document_type();
        let recognition = self.engine.recognize(&frame.image, document_type)?;

        if !recognition.is_success() {
            emit(observer, ErrorCode::Processing);
            return Ok(FrameOutcome::RecognitionFailed);
        }

        let fields = match parse_mrz(&recognition.lines) {
            Ok(fields) => fields,
            Err(e) => {
                debug!("discarding unreadable MRZ: {}", e);
                emit(observer, ErrorCode::mrz_for(document_type));
                return Ok(FrameOutcome::RecognitionFailed);
            }
        };

        let side = self.session.side;
        let result = &mut self.session.result;
        result.set_mrz(recognition.status, recognition.lines, fields);
        result.store_document(side, frame.image.clone());

        let phase = self.session.phase;
        Ok(match phase {
            ScanPhase::Init => match recognition
                .face
                .and_then(|face| crop_face(&face.canvas, face.region))
            {
                Some(face) => {
                    self.session.result.face = Some(face);
                    self.session.phase = ScanPhase::Both;
                    self.complete(observer)
                }
                None => {
                    self.session.phase = ScanPhase::Mrz;
                    if self.session.mode() == ScanMode::FaceRequired {
                        self.flip(observer);
                        FrameOutcome::MrzRead
                    } else {
                        self.complete(observer)
                    }
                }
            },
            ScanPhase::Face => {
                self.session.phase = ScanPhase::Both;
                self.complete(observer)
            }
            ScanPhase::Mrz | ScanPhase::Both => FrameOutcome::MrzRead,
        })
    }

    fn face_pass(
        &mut self,
        frame: &ProcessedFrame,
        observer: &dyn ScanObserver,
    ) -> Result<FrameOutcome, EngineError> {
        let mut canvas = RgbaImage::new(FACE_CANVAS_SIZE, FACE_CANVAS_SIZE);
        let detection = self.engine.detect_face(&frame.image, &mut canvas)?;

        let face = detection
            .is_success()
            .then(|| crop_face(&canvas, detection.region))
            .flatten();
        let Some(face) = face else {
            emit(observer, ErrorCode::Face);
            return Ok(FrameOutcome::FaceNotDetected);
        };
        let check = self.engine.check_face(&face)?;

        match check.verdict() {
            FaceVerdict::Accepted => {
                let side = self.session.side;
                self.session.result.face = Some(face);
                self.session.result.store_document(side, frame.image.clone());

                if self.session.phase == ScanPhase::Init {
                    self.session.phase = ScanPhase::Face;
                    self.flip(observer);
                    Ok(FrameOutcome::FaceRead)
                } else {
                    self.session.phase = ScanPhase::Both;
                    Ok(self.complete(observer))
                }
            }
            FaceVerdict::Rejected { code, message } => {
                debug!("face rejected with code {}", code);
                if let Some(message) = message {
                    emit(observer, ProcessMessage::from_engine(&message));
                }
                Ok(FrameOutcome::FaceRejected)
            }
            FaceVerdict::Empty => Ok(FrameOutcome::FaceFailed),
        }
    }

    /// Ask for the other side of the document.
    fn flip(&mut self, observer: &dyn ScanObserver) {
        self.session.side = self.session.side.other();
        let title = match self.session.side {
            DocumentSide::Front => ScanTitle::Front,
            DocumentSide::Back => ScanTitle::Back,
        };
        observer.on_event(ScanEvent::Process(ProcessUpdate::flip_to(title)));
    }

    fn complete(&mut self, observer: &dyn ScanObserver) -> FrameOutcome {
        let result = self.session.finish();
        info!(
            "scan completed (valid: {}, face: {})",
            result.is_valid(),
            result.has_face()
        );
        observer.on_event(ScanEvent::Completed(Box::new(result)));
        FrameOutcome::Completed
    }
}

/// Pass or report a gate; only rejections with a message are reported.
fn gate(check: Check, observer: &dyn ScanObserver) -> bool {
    if !check.accepted {
        if let Some(message) = check.message {
            emit(observer, ProcessMessage::from_engine(&message));
        }
    }
    check.accepted
}

fn emit(observer: &dyn ScanObserver, message: impl Into<ProcessMessage>) {
    observer.on_event(ScanEvent::Process(ProcessUpdate::message(message)));
}

/// Cut the valid face area out of a detection canvas; `None` when the area
/// is empty.
fn crop_face(canvas: &RgbaImage, region: FaceRegion) -> Option<RgbaImage> {
    let x = region.x.min(canvas.width());
    let y = region.y.min(canvas.height());
    let width = region.width.min(canvas.width() - x);
    let height = region.height.min(canvas.height() - y);

    if width == 0 || height == 0 {
        return None;
    }
    Some(imageops::crop_imm(canvas, x, y, width, height).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CameraFacing, PixelRect, ScaleFactors, SensorRotation};
    use image::DynamicImage;
    use mrzscan_engine::{
        EngineCall, FaceCapture, FaceCheck, FaceDetection, Recognition, ScriptedEngine,
    };
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

    const TD3: [&str; 2] = [
        "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<",
        "L898902C36UTO7408122F1204159ZE184226B<<<<<10",
    ];

    fn frame() -> ProcessedFrame {
        ProcessedFrame {
            image: DynamicImage::new_rgb8(40, 25),
            scale: ScaleFactors {
                width: 1.0,
                height: 1.0,
            },
            crop: PixelRect {
                x: 0,
                y: 0,
                width: 40,
                height: 25,
            },
            rotation: SensorRotation::Deg0,
            facing: CameraFacing::Back,
        }
    }

    fn observer() -> (UnboundedSender<ScanEvent>, UnboundedReceiver<ScanEvent>) {
        unbounded_channel()
    }

    fn drain(rx: &mut UnboundedReceiver<ScanEvent>) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn updates(events: &[ScanEvent]) -> Vec<ProcessUpdate> {
        events
            .iter()
            .filter_map(|event| match event {
                ScanEvent::Process(update) => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    fn completions(events: &[ScanEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, ScanEvent::Completed(_)))
            .count()
    }

    fn face_capture(width: u32, height: u32) -> FaceCapture {
        FaceCapture {
            canvas: RgbaImage::new(FACE_CANVAS_SIZE, FACE_CANVAS_SIZE),
            region: FaceRegion::from_size(width, height),
        }
    }

    #[test]
    fn test_document_rejection_stops_frame() {
        let engine = ScriptedEngine::new()
            .with_document_check(Check::rejected("bring document into frame"));
        let log = engine.call_log();
        let mut machine = ScanStateMachine::new(engine, DocumentType::None, ScanMode::MrzOnly);
        let (tx, mut rx) = observer();

        let outcome = machine.process_frame(&frame(), &tx);

        assert_eq!(outcome, FrameOutcome::DocumentRejected);
        assert_eq!(
            updates(&drain(&mut rx)),
            vec![ProcessUpdate::message(ProcessMessage::Text(
                "bring document into frame".to_string()
            ))]
        );
        assert_eq!(log.recognitions(), 0);
    }

    #[test]
    fn test_silent_rejections_emit_nothing() {
        let engine = ScriptedEngine::new()
            .with_document_check(Check::silent_reject())
            .with_light_check(Check::silent_reject());
        let mut machine = ScanStateMachine::new(engine, DocumentType::None, ScanMode::MrzOnly);
        let (tx, mut rx) = observer();

        assert_eq!(
            machine.process_frame(&frame(), &tx),
            FrameOutcome::DocumentRejected
        );
        assert_eq!(
            machine.process_frame(&frame(), &tx),
            FrameOutcome::LightRejected
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_light_rejection_decodes_code() {
        let engine = ScriptedEngine::new().with_light_check(Check::rejected("8"));
        let mut machine = ScanStateMachine::new(engine, DocumentType::None, ScanMode::MrzOnly);
        let (tx, mut rx) = observer();

        assert_eq!(
            machine.process_frame(&frame(), &tx),
            FrameOutcome::LightRejected
        );
        assert_eq!(
            updates(&drain(&mut rx)),
            vec![ProcessUpdate::message(ErrorCode::DarkDocument)]
        );
    }

    #[test]
    fn test_failed_recognition_emits_processing() {
        let engine = ScriptedEngine::new().with_recognition(Recognition::failed(0));
        let mut machine = ScanStateMachine::new(engine, DocumentType::None, ScanMode::MrzOnly);
        let (tx, mut rx) = observer();

        assert_eq!(
            machine.process_frame(&frame(), &tx),
            FrameOutcome::RecognitionFailed
        );
        assert_eq!(
            updates(&drain(&mut rx)),
            vec![ProcessUpdate::message(ErrorCode::Processing)]
        );
        assert_eq!(machine.session().phase(), ScanPhase::Init);
    }

    #[test]
    fn test_unparsable_mrz_is_recoverable() {
        let engine = ScriptedEngine::new()
            .with_recognition(Recognition::mrz(["P<UTO<<<", "garbage"]))
            .with_recognition(Recognition::mrz(TD3));
        let mut machine =
            ScanStateMachine::new(engine, DocumentType::Passport, ScanMode::MrzOnly);
        let (tx, mut rx) = observer();

        assert_eq!(
            machine.process_frame(&frame(), &tx),
            FrameOutcome::RecognitionFailed
        );
        assert_eq!(
            updates(&drain(&mut rx)),
            vec![ProcessUpdate::message(ErrorCode::PassportMrz)]
        );
        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::Completed);
    }

    #[test]
    fn test_mrz_only_completes_without_face() {
        let engine = ScriptedEngine::new().with_recognition(Recognition::mrz(TD3));
        let mut machine =
            ScanStateMachine::new(engine, DocumentType::Passport, ScanMode::MrzOnly);
        let (tx, mut rx) = observer();

        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::Completed);
        assert_eq!(machine.session().phase(), ScanPhase::Mrz);
        assert!(machine.session().is_complete());

        let events = drain(&mut rx);
        assert_eq!(completions(&events), 1);
        let Some(ScanEvent::Completed(result)) = events.last() else {
            panic!("expected a completed event");
        };
        assert!(result.is_valid());
        assert!(!result.has_face());
        assert_eq!(result.document_type, DocumentType::Passport);
        assert!(result.document_front.is_some());
        assert_eq!(
            result.fields.as_ref().map(|f| f.surname.as_str()),
            Some("ERIKSSON")
        );
    }

    #[test]
    fn test_face_on_mrz_frame_completes_both() {
        let engine = ScriptedEngine::new()
            .with_recognition(Recognition::mrz(TD3).with_face(face_capture(120, 900)));
        let mut machine =
            ScanStateMachine::new(engine, DocumentType::Passport, ScanMode::FaceRequired);
        let (tx, mut rx) = observer();

        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::Completed);
        assert_eq!(machine.session().phase(), ScanPhase::Both);

        let events = drain(&mut rx);
        let Some(ScanEvent::Completed(result)) = events.last() else {
            panic!("expected a completed event");
        };
        let face = result.face.as_ref().unwrap();
        assert_eq!(face.dimensions(), (120, FACE_CANVAS_SIZE));
    }

    #[test]
    fn test_completed_session_ignores_frames() {
        let engine = ScriptedEngine::new()
            .with_recognition(Recognition::mrz(TD3))
            .with_recognition(Recognition::mrz(TD3));
        let log = engine.call_log();
        let mut machine = ScanStateMachine::new(engine, DocumentType::None, ScanMode::MrzOnly);
        let (tx, mut rx) = observer();

        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::Completed);
        let calls = log.calls().len();
        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::Ignored);
        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::Ignored);

        assert_eq!(completions(&drain(&mut rx)), 1);
        assert_eq!(log.calls().len(), calls);
    }

    #[test]
    fn test_face_required_flips_then_completes() {
        let engine = ScriptedEngine::new()
            .with_recognition(Recognition::mrz(TD3))
            .with_face_detection(FaceDetection {
                status: 1,
                region: FaceRegion::from_size(200, 250),
            })
            .with_face_check(FaceCheck::accepted());
        let log = engine.call_log();
        let mut machine =
            ScanStateMachine::new(engine, DocumentType::IdCard, ScanMode::FaceRequired);
        let (tx, mut rx) = observer();

        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::MrzRead);
        assert_eq!(machine.session().phase(), ScanPhase::Mrz);
        assert_eq!(machine.session().side(), DocumentSide::Back);
        assert_eq!(
            updates(&drain(&mut rx)),
            vec![ProcessUpdate::flip_to(ScanTitle::Back)]
        );

        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::Completed);
        assert_eq!(machine.session().phase(), ScanPhase::Both);

        let events = drain(&mut rx);
        let Some(ScanEvent::Completed(result)) = events.last() else {
            panic!("expected a completed event");
        };
        assert_eq!(result.face.as_ref().unwrap().dimensions(), (200, 250));
        assert!(result.document_front.is_some());
        assert!(result.document_back.is_some());
        assert_eq!(log.recognitions(), 1);
    }

    #[test]
    fn test_face_first_then_mrz() {
        let engine = ScriptedEngine::new()
            .with_face_detection(FaceDetection {
                status: 1,
                region: FaceRegion::from_size(400, 400),
            })
            .with_face_check(FaceCheck::accepted())
            .with_recognition(Recognition::mrz(TD3));
        let log = engine.call_log();
        let mut machine =
            ScanStateMachine::new(engine, DocumentType::IdCard, ScanMode::FaceFirst);
        let (tx, mut rx) = observer();

        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::FaceRead);
        assert_eq!(machine.session().phase(), ScanPhase::Face);
        assert_eq!(log.recognitions(), 0);
        assert_eq!(
            updates(&drain(&mut rx)),
            vec![ProcessUpdate::flip_to(ScanTitle::Back)]
        );

        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::Completed);
        let events = drain(&mut rx);
        let Some(ScanEvent::Completed(result)) = events.last() else {
            panic!("expected a completed event");
        };
        assert!(result.has_face());
        assert!(result.has_mrz());
        assert_eq!(
            log.calls()
                .iter()
                .filter(|call| matches!(call, EngineCall::Recognize(DocumentType::IdCard)))
                .count(),
            1
        );
    }

    #[test]
    fn test_face_pass_failures() {
        let engine = ScriptedEngine::new()
            .with_face_detection(FaceDetection::default())
            .with_face_detection(FaceDetection {
                status: 1,
                region: FaceRegion::from_size(100, 100),
            })
            .with_face_check(FaceCheck::rejected(
                FaceCheck::QUALITY_REJECTED,
                "Blur detected over face",
            ))
            .with_face_detection(FaceDetection {
                status: 1,
                region: FaceRegion::from_size(100, 100),
            })
            .with_face_check(FaceCheck::empty());
        let mut machine =
            ScanStateMachine::new(engine, DocumentType::None, ScanMode::FaceFirst);
        let (tx, mut rx) = observer();

        assert_eq!(
            machine.process_frame(&frame(), &tx),
            FrameOutcome::FaceNotDetected
        );
        assert_eq!(
            machine.process_frame(&frame(), &tx),
            FrameOutcome::FaceRejected
        );
        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::FaceFailed);

        assert_eq!(
            updates(&drain(&mut rx)),
            vec![
                ProcessUpdate::message(ErrorCode::Face),
                ProcessUpdate::message(ProcessMessage::Text(
                    "Blur detected over face".to_string()
                )),
            ]
        );
        assert_eq!(machine.session().phase(), ScanPhase::Init);
        assert!(!machine.session().result().has_face());
    }

    #[test]
    fn test_engine_error_is_absorbed() {
        let mut engine = ScriptedEngine::new();
        engine.close(false);
        let mut machine = ScanStateMachine::new(engine, DocumentType::None, ScanMode::MrzOnly);
        let (tx, mut rx) = observer();

        assert_eq!(
            machine.process_frame(&frame(), &tx),
            FrameOutcome::EngineFailed
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_restart_after_completion() {
        let engine = ScriptedEngine::new()
            .with_recognition(Recognition::mrz(TD3))
            .with_recognition(Recognition::mrz(TD3));
        let mut machine = ScanStateMachine::new(engine, DocumentType::None, ScanMode::MrzOnly);
        let (tx, mut rx) = observer();

        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::Completed);
        machine.restart();
        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::Completed);
        assert_eq!(completions(&drain(&mut rx)), 2);
    }

    #[test]
    fn test_crop_face_clamps_to_canvas() {
        let canvas = RgbaImage::new(FACE_CANVAS_SIZE, FACE_CANVAS_SIZE);

        let face = crop_face(
            &canvas,
            FaceRegion {
                x: 350,
                y: 0,
                width: 100,
                height: 80,
            },
        )
        .unwrap();
        assert_eq!(face.dimensions(), (50, 80));
        assert_eq!(crop_face(&canvas, FaceRegion::default()), None);
        assert_eq!(crop_face(&canvas, FaceRegion::from_size(0, 120)), None);
        assert_eq!(
            crop_face(
                &canvas,
                FaceRegion {
                    x: FACE_CANVAS_SIZE,
                    y: 0,
                    width: 50,
                    height: 50,
                }
            ),
            None
        );
    }

    #[test]
    fn test_empty_face_region_on_mrz_frame_is_no_face() {
        let engine = ScriptedEngine::new()
            .with_recognition(Recognition::mrz(TD3).with_face(face_capture(0, 0)));
        let mut machine =
            ScanStateMachine::new(engine, DocumentType::Passport, ScanMode::FaceRequired);
        let (tx, mut rx) = observer();

        assert_eq!(machine.process_frame(&frame(), &tx), FrameOutcome::MrzRead);
        assert_eq!(machine.session().phase(), ScanPhase::Mrz);
        assert!(!machine.session().result().has_face());
        assert_eq!(
            updates(&drain(&mut rx)),
            vec![ProcessUpdate::flip_to(ScanTitle::Back)]
        );
    }

    #[test]
    fn test_empty_face_region_in_face_pass_is_not_detected() {
        let engine = ScriptedEngine::new().with_face_detection(FaceDetection {
            status: 1,
            region: FaceRegion::from_size(0, 250),
        });
        let log = engine.call_log();
        let mut machine =
            ScanStateMachine::new(engine, DocumentType::None, ScanMode::FaceFirst);
        let (tx, mut rx) = observer();

        assert_eq!(
            machine.process_frame(&frame(), &tx),
            FrameOutcome::FaceNotDetected
        );
        assert_eq!(log.count(|call| *call == EngineCall::CheckFace), 0);
        assert_eq!(
            updates(&drain(&mut rx)),
            vec![ProcessUpdate::message(ErrorCode::Face)]
        );
        assert!(!machine.session().result().has_face());
    }
}
