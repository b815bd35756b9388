//! Binding to the compiled recognition SDK (`libaccurasdk`).
//!
//! Every call owns the buffers it hands across the boundary, so nothing is
//! shared between frames. Images are passed as tightly packed RGBA8.

use std::ffi::{CStr, c_char, c_int};

use image::{DynamicImage, RgbaImage};
use tracing::{debug, info, warn};

use crate::backend::RecognitionEngine;
use crate::error::EngineError;
use crate::response::{EngineResponse, decode_mrz_buffer};
use crate::types::{
    Check, DocumentType, EngineParams, EngineStatus, FACE_CANVAS_SIZE, FaceCapture, FaceCheck,
    FaceDetection, FaceRegion, Recognition,
};
use crate::Result;

/// Capacity of the MRZ character buffer.
const MRZ_BUFFER_LEN: usize = 3000;

/// Number of license flags filled by dictionary loading.
const LICENSE_FLAGS_LEN: usize = 5;

#[link(name = "accurasdk")]
unsafe extern "C" {
    fn accura_load_dictionary(flags: *mut c_int, flags_len: c_int) -> c_int;

    fn accura_set_blur_percentage(value: c_int) -> c_int;
    fn accura_set_face_blur_percentage(value: c_int) -> c_int;
    fn accura_set_glare_percentage(min: c_int, max: c_int) -> c_int;
    fn accura_set_check_photocopy(enabled: bool) -> c_int;
    fn accura_set_hologram_detection(enabled: bool) -> c_int;
    fn accura_set_low_light_tolerance(value: c_int) -> c_int;
    fn accura_set_motion_threshold(value: c_int) -> c_int;

    fn accura_check_document(rgba: *const u8, width: c_int, height: c_int) -> *mut c_char;
    fn accura_check_light(rgba: *const u8, width: c_int, height: c_int) -> *mut c_char;

    fn accura_recognize_mrz(
        rgba: *const u8,
        width: c_int,
        height: c_int,
        mrz: *mut c_int,
        mrz_len: c_int,
        face: *mut u8,
        face_size: c_int,
        faced: *mut c_int,
        document_type: c_int,
    ) -> c_int;

    fn accura_detect_face(
        rgba: *const u8,
        width: c_int,
        height: c_int,
        face: *mut u8,
        face_size: c_int,
        faced: *mut c_int,
    ) -> c_int;

    fn accura_check_face(rgba: *const u8, width: c_int, height: c_int) -> *mut c_char;

    fn accura_free_string(s: *mut c_char);

    fn accura_close(dispose: c_int) -> c_int;
}

/// Engine backed by the native SDK.
///
/// The SDK keeps global state, so only one instance should be live at a
/// time.
pub struct NativeEngine {
    initialized: bool,
    closed: bool,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self {
            initialized: false,
            closed: false,
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.closed {
            return Err(EngineError::Closed);
        }
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }
        Ok(())
    }
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn dimension(value: u32) -> Result<c_int> {
    c_int::try_from(value).map_err(|_| EngineError::Call(format!("dimension too large: {}", value)))
}

/// Take ownership of a string returned by the SDK.
fn take_string(raw: *mut c_char) -> Option<String> {
    if raw.is_null() {
        return None;
    }
    // SAFETY: non-null pointers returned by the SDK are NUL-terminated and
    // stay valid until handed back to `accura_free_string`.
    let text = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
    unsafe { accura_free_string(raw) };
    Some(text)
}

fn check_param(param: &'static str, code: c_int) -> Result<()> {
    if code < 0 {
        warn!("engine rejected {}: {}", param, code);
        return Err(EngineError::Parameter { param, code });
    }
    Ok(())
}

/// Clamp the `faced` dimensions to the canvas.
fn face_region(faced: &[c_int; 3]) -> FaceRegion {
    let side = |v: c_int| u32::try_from(v).unwrap_or(0).min(FACE_CANVAS_SIZE);
    FaceRegion::from_size(side(faced[1]), side(faced[2]))
}

impl RecognitionEngine for NativeEngine {
    fn initialize(&mut self) -> Result<EngineStatus> {
        if self.closed {
            return Err(EngineError::Closed);
        }

        let mut flags = [0 as c_int; LICENSE_FLAGS_LEN];
        // SAFETY: `flags` outlives the call and its length is passed along.
        let status = unsafe { accura_load_dictionary(flags.as_mut_ptr(), flags.len() as c_int) };
        info!("dictionary loaded with status {}", status);

        let status = EngineStatus {
            status,
            mrz_enabled: status >= 0 && flags[0] == 1,
        };
        self.initialized = status.status >= 0;
        Ok(status)
    }

    fn apply_params(&mut self, params: &EngineParams) -> Result<()> {
        self.ensure_ready()?;
        debug!("applying engine params: {:?}", params);

        // SAFETY: plain value arguments.
        unsafe {
            check_param(
                "blur_percentage",
                accura_set_blur_percentage(params.blur_percentage.into()),
            )?;
            check_param(
                "face_blur_percentage",
                accura_set_face_blur_percentage(params.face_blur_percentage.into()),
            )?;
            check_param(
                "glare_percentage",
                accura_set_glare_percentage(
                    params.glare_min_percentage.into(),
                    params.glare_max_percentage.into(),
                ),
            )?;
            check_param(
                "check_photocopy",
                accura_set_check_photocopy(params.check_photocopy),
            )?;
            check_param(
                "detect_hologram",
                accura_set_hologram_detection(params.detect_hologram),
            )?;
            check_param(
                "low_light_tolerance",
                accura_set_low_light_tolerance(params.low_light_tolerance.into()),
            )?;
            check_param(
                "motion_threshold",
                accura_set_motion_threshold(
                    c_int::try_from(params.motion_threshold).unwrap_or(c_int::MAX),
                ),
            )?;
        }
        Ok(())
    }

    fn check_document(&mut self, image: &DynamicImage) -> Result<Check> {
        self.ensure_ready()?;
        let rgba = image.to_rgba8();
        let (w, h) = (dimension(rgba.width())?, dimension(rgba.height())?);

        // SAFETY: `rgba` holds w*h*4 bytes for the duration of the call.
        let raw = take_string(unsafe { accura_check_document(rgba.as_ptr(), w, h) });
        let response = EngineResponse::parse(raw.as_deref())?;
        Ok(EngineResponse::into_document_check(response))
    }

    fn check_light(&mut self, image: &DynamicImage) -> Result<Check> {
        self.ensure_ready()?;
        let rgba = image.to_rgba8();
        let (w, h) = (dimension(rgba.width())?, dimension(rgba.height())?);

        // SAFETY: as above.
        let raw = take_string(unsafe { accura_check_light(rgba.as_ptr(), w, h) });
        let response = EngineResponse::parse(raw.as_deref())?;
        Ok(EngineResponse::into_light_check(response))
    }

    fn recognize(
        &mut self,
        image: &DynamicImage,
        document_type: DocumentType,
    ) -> Result<Recognition> {
        self.ensure_ready()?;
        let rgba = image.to_rgba8();
        let (w, h) = (dimension(rgba.width())?, dimension(rgba.height())?);

        let mut mrz = vec![0 as c_int; MRZ_BUFFER_LEN];
        let mut canvas = RgbaImage::new(FACE_CANVAS_SIZE, FACE_CANVAS_SIZE);
        let mut faced = [0 as c_int; 3];

        // SAFETY: every buffer is owned by this frame and sized as declared.
        let status = unsafe {
            accura_recognize_mrz(
                rgba.as_ptr(),
                w,
                h,
                mrz.as_mut_ptr(),
                MRZ_BUFFER_LEN as c_int,
                canvas.as_mut_ptr(),
                FACE_CANVAS_SIZE as c_int,
                faced.as_mut_ptr(),
                document_type.code(),
            )
        };
        debug!("MRZ recognition for {} returned {}", document_type, status);

        if status <= 0 {
            return Ok(Recognition::failed(status));
        }

        let recognition = Recognition {
            status,
            face: None,
            lines: decode_mrz_buffer(&mrz),
        };

        Ok(if faced[0] != 0 {
            recognition.with_face(FaceCapture {
                canvas,
                region: face_region(&faced),
            })
        } else {
            recognition
        })
    }

    fn detect_face(
        &mut self,
        image: &DynamicImage,
        canvas: &mut RgbaImage,
    ) -> Result<FaceDetection> {
        self.ensure_ready()?;
        if canvas.width() != FACE_CANVAS_SIZE || canvas.height() != FACE_CANVAS_SIZE {
            return Err(EngineError::Call(format!(
                "face canvas must be {0}x{0}",
                FACE_CANVAS_SIZE
            )));
        }

        let rgba = image.to_rgba8();
        let (w, h) = (dimension(rgba.width())?, dimension(rgba.height())?);
        let mut faced = [0 as c_int; 3];

        // SAFETY: `canvas` is FACE_CANVAS_SIZE squared RGBA, checked above.
        let status = unsafe {
            accura_detect_face(
                rgba.as_ptr(),
                w,
                h,
                canvas.as_mut_ptr(),
                FACE_CANVAS_SIZE as c_int,
                faced.as_mut_ptr(),
            )
        };

        Ok(FaceDetection {
            status,
            region: face_region(&faced),
        })
    }

    fn check_face(&mut self, face: &RgbaImage) -> Result<FaceCheck> {
        self.ensure_ready()?;
        let (w, h) = (dimension(face.width())?, dimension(face.height())?);

        // SAFETY: `face` holds w*h*4 bytes for the duration of the call.
        let raw = take_string(unsafe { accura_check_face(face.as_ptr(), w, h) });
        let response = EngineResponse::parse(raw.as_deref())?;
        Ok(EngineResponse::into_face_check(response))
    }

    fn close(&mut self, dispose: bool) {
        if self.closed {
            return;
        }
        // SAFETY: plain value argument.
        let code = unsafe { accura_close(c_int::from(dispose)) };
        debug!("engine closed with code {}", code);
        self.closed = true;
        self.initialized = false;
    }
}
