//! Threaded scanner: one capture producer, one blocking worker.
//!
//! Frames are handed over through a single-slot channel. While a frame is
//! being processed new ones are dropped, never queued, so the capture side
//! never blocks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use mrzscan_engine::{EngineError, EngineParams, EngineStatus, RecognitionEngine};

use super::events::{ScanEvent, ScanObserver};
use super::machine::ScanStateMachine;
use crate::error::{ConfigError, Result, ScanError};
use crate::geometry::{CameraFacing, FrameTransformer, RawFrame, ViewfinderSpec};
use crate::models::ScanConfig;

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Handed to the worker.
    Accepted,
    /// Dropped because a frame is still in flight.
    DroppedBusy,
    /// Dropped because the scanner is paused.
    DroppedPaused,
    /// The worker is gone.
    Closed,
}

/// Frame counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanStats {
    pub submitted: u64,
    pub processed: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Controls {
    in_flight: AtomicBool,
    paused: AtomicBool,
    restart: AtomicBool,
    closed: AtomicBool,
    front_camera: AtomicBool,
    viewfinder: Mutex<Option<ViewfinderSpec>>,
    submitted: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
}

impl Controls {
    fn take_viewfinder(&self) -> Option<ViewfinderSpec> {
        self.viewfinder
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn drop_frame(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Live scan over a recognition engine.
pub struct Scanner<E: RecognitionEngine + 'static> {
    controls: Arc<Controls>,
    frames: mpsc::Sender<RawFrame>,
    worker: JoinHandle<E>,
}

impl<E: RecognitionEngine + 'static> Scanner<E> {
    /// Initialize the engine and start the worker.
    ///
    /// Initialization failures are reported once through `observer` as
    /// [`ScanEvent::Error`]; the engine is then closed and the error
    /// returned.
    pub async fn start(
        engine: E,
        config: ScanConfig,
        observer: Arc<dyn ScanObserver>,
    ) -> Result<Self> {
        config.validate()?;

        let params = config.engine.clone();
        let (mut engine, init) = tokio::task::spawn_blocking(move || {
            let mut engine = engine;
            let init = initialize(&mut engine, &params);
            (engine, init)
        })
        .await
        .map_err(|_| ScanError::WorkerStopped)?;

        if let Err(e) = init {
            error!("engine initialization failed: {}", e);
            let message = match &e {
                EngineError::License(license) => license.to_string(),
                other => other.to_string(),
            };
            observer.on_event(ScanEvent::Error(message));
            engine.close(true);
            return Err(e.into());
        }

        let controls = Arc::new(Controls::default());
        controls.front_camera.store(
            config.scan.camera_facing == CameraFacing::Front,
            Ordering::Relaxed,
        );

        let machine = ScanStateMachine::new(engine, config.scan.document_type, config.scan.mode);
        let transformer = FrameTransformer::new(config.viewfinder)
            .with_front_mirroring(config.scan.mirror_front_camera);

        let (frames, rx) = mpsc::channel(1);
        let worker_controls = Arc::clone(&controls);
        let worker = tokio::task::spawn_blocking(move || {
            run_worker(machine, transformer, rx, worker_controls, observer)
        });

        info!(
            "scanner started ({} mode, document type {})",
            config.scan.mode, config.scan.document_type
        );
        Ok(Self {
            controls,
            frames,
            worker,
        })
    }

    /// Offer a frame. Never blocks.
    pub fn submit_frame(&self, frame: RawFrame) -> SubmitOutcome {
        let controls = &self.controls;
        if controls.closed.load(Ordering::Acquire) {
            return SubmitOutcome::Closed;
        }
        if controls.paused.load(Ordering::Acquire) {
            controls.drop_frame();
            return SubmitOutcome::DroppedPaused;
        }
        if controls
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("frame dropped: worker busy");
            controls.drop_frame();
            return SubmitOutcome::DroppedBusy;
        }

        match self.frames.try_send(frame) {
            Ok(()) => {
                controls.submitted.fetch_add(1, Ordering::Relaxed);
                SubmitOutcome::Accepted
            }
            Err(TrySendError::Full(_)) => {
                controls.in_flight.store(false, Ordering::Release);
                controls.drop_frame();
                SubmitOutcome::DroppedBusy
            }
            Err(TrySendError::Closed(_)) => {
                controls.in_flight.store(false, Ordering::Release);
                controls.closed.store(true, Ordering::Release);
                SubmitOutcome::Closed
            }
        }
    }

    /// Stop accepting frames; the engine stays loaded.
    pub fn pause(&self) {
        if !self.controls.paused.swap(true, Ordering::AcqRel) {
            info!("scanner paused");
        }
    }

    pub fn resume(&self) {
        if self.controls.paused.swap(false, Ordering::AcqRel) {
            info!("scanner resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.controls.paused.load(Ordering::Acquire)
    }

    /// Whether a frame is being processed.
    pub fn is_busy(&self) -> bool {
        self.controls.in_flight.load(Ordering::Acquire)
    }

    /// Start a new scan, e.g. for the next document.
    pub fn restart_scan(&self) {
        self.controls.restart.store(true, Ordering::Release);
    }

    /// Switch cameras and restart the scan. Returns the new facing.
    pub fn flip_camera(&self) -> CameraFacing {
        let was_front = self.controls.front_camera.fetch_xor(true, Ordering::AcqRel);
        self.restart_scan();
        let facing = if was_front {
            CameraFacing::Back
        } else {
            CameraFacing::Front
        };
        info!("camera flipped to {}", facing);
        facing
    }

    /// Camera the capture layer should use.
    pub fn camera_facing(&self) -> CameraFacing {
        if self.controls.front_camera.load(Ordering::Acquire) {
            CameraFacing::Front
        } else {
            CameraFacing::Back
        }
    }

    /// Replace the guide frame; applies from the next frame on.
    pub fn set_viewfinder(&self, spec: ViewfinderSpec) -> std::result::Result<(), ConfigError> {
        spec.validate()?;
        *self
            .controls
            .viewfinder
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(spec);
        Ok(())
    }

    pub fn stats(&self) -> ScanStats {
        let controls = &self.controls;
        ScanStats {
            submitted: controls.submitted.load(Ordering::Relaxed),
            processed: controls.processed.load(Ordering::Relaxed),
            dropped: controls.dropped.load(Ordering::Relaxed),
        }
    }

    /// Stop the worker and release the engine. `dispose` also unloads the
    /// engine dictionaries.
    pub async fn shutdown(self, dispose: bool) -> Result<ScanStats> {
        let Self {
            controls,
            frames,
            worker,
        } = self;
        controls.closed.store(true, Ordering::Release);
        drop(frames);

        let mut engine = worker.await.map_err(|_| ScanError::WorkerStopped)?;
        tokio::task::spawn_blocking(move || engine.close(dispose))
            .await
            .map_err(|_| ScanError::WorkerStopped)?;

        let stats = ScanStats {
            submitted: controls.submitted.load(Ordering::Relaxed),
            processed: controls.processed.load(Ordering::Relaxed),
            dropped: controls.dropped.load(Ordering::Relaxed),
        };
        info!("scanner stopped: {:?}", stats);
        Ok(stats)
    }
}

fn initialize<E: RecognitionEngine>(
    engine: &mut E,
    params: &EngineParams,
) -> std::result::Result<EngineStatus, EngineError> {
    let status = engine.initialize()?.into_result()?;
    if !status.mrz_enabled {
        return Err(EngineError::MrzDisabled);
    }
    engine.apply_params(params)?;
    info!("engine initialized with status {}", status.status);
    Ok(status)
}

fn run_worker<E: RecognitionEngine>(
    mut machine: ScanStateMachine<E>,
    mut transformer: FrameTransformer,
    mut frames: mpsc::Receiver<RawFrame>,
    controls: Arc<Controls>,
    observer: Arc<dyn ScanObserver>,
) -> E {
    let mut layout_sent = false;

    while let Some(frame) = frames.blocking_recv() {
        if controls.restart.swap(false, Ordering::AcqRel) {
            machine.restart();
        }
        if let Some(spec) = controls.take_viewfinder() {
            debug!("viewfinder changed to {}x{}", spec.guide_width, spec.guide_height);
            transformer.set_viewfinder(spec);
            layout_sent = false;
        }

        if controls.paused.load(Ordering::Acquire) {
            controls.drop_frame();
        } else if let Some(processed) = transformer.process(&frame) {
            if !layout_sent {
                let spec = transformer.viewfinder();
                observer.on_event(ScanEvent::LayoutUpdated {
                    width: spec.guide_width,
                    height: spec.guide_height,
                });
                layout_sent = true;
            }
            let outcome = machine.process_frame(&processed, observer.as_ref());
            trace!("frame processed: {:?}", outcome);
            controls.processed.fetch_add(1, Ordering::Relaxed);
        }

        controls.in_flight.store(false, Ordering::Release);
    }

    debug!("frame channel closed, worker exiting");
    machine.into_engine()
}
