//! Recognition engine implementations.

#[cfg(feature = "native")]
pub mod native;

pub mod scripted;

use image::{DynamicImage, RgbaImage};

use crate::types::{
    Check, DocumentType, EngineParams, EngineStatus, FaceCheck, FaceDetection, Recognition,
};
use crate::Result;

/// Trait for recognition engines.
///
/// Every call blocks until the engine answers. Engines are not assumed to
/// be re-entrant, hence `&mut self`: the caller serializes all calls and
/// keeps them off the capture thread.
pub trait RecognitionEngine: Send {
    /// Load dictionaries/models and validate the license.
    ///
    /// A negative `status` encodes a license failure; see
    /// [`EngineStatus::into_result`].
    fn initialize(&mut self) -> Result<EngineStatus>;

    /// Apply tuning parameters. Called once, after `initialize`.
    fn apply_params(&mut self, params: &EngineParams) -> Result<()>;

    /// Cheap, frame-rate capable document presence/quality gate.
    fn check_document(&mut self, image: &DynamicImage) -> Result<Check>;

    /// Lighting gate.
    fn check_light(&mut self, image: &DynamicImage) -> Result<Check>;

    /// Expensive MRZ read, optionally locating the face on the same frame.
    fn recognize(&mut self, image: &DynamicImage, document_type: DocumentType)
    -> Result<Recognition>;

    /// Detect a face and render it into `canvas`.
    fn detect_face(&mut self, image: &DynamicImage, canvas: &mut RgbaImage)
    -> Result<FaceDetection>;

    /// Validate a detected face.
    fn check_face(&mut self, face: &RgbaImage) -> Result<FaceCheck>;

    /// Release engine resources. `dispose` also unloads the dictionaries.
    fn close(&mut self, dispose: bool);
}

impl<E: RecognitionEngine + ?Sized> RecognitionEngine for Box<E> {
    fn initialize(&mut self) -> Result<EngineStatus> {
        (**self).initialize()
    }

    fn apply_params(&mut self, params: &EngineParams) -> Result<()> {
        (**self).apply_params(params)
    }

    fn check_document(&mut self, image: &DynamicImage) -> Result<Check> {
        (**self).check_document(image)
    }

    fn check_light(&mut self, image: &DynamicImage) -> Result<Check> {
        (**self).check_light(image)
    }

    fn recognize(
        &mut self,
        image: &DynamicImage,
        document_type: DocumentType,
    ) -> Result<Recognition> {
        (**self).recognize(image, document_type)
    }

    fn detect_face(
        &mut self,
        image: &DynamicImage,
        canvas: &mut RgbaImage,
    ) -> Result<FaceDetection> {
        (**self).detect_face(image, canvas)
    }

    fn check_face(&mut self, face: &RgbaImage) -> Result<FaceCheck> {
        (**self).check_face(face)
    }

    fn close(&mut self, dispose: bool) {
        (**self).close(dispose)
    }
}
