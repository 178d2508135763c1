//! The kiosk engine: a dedicated OS thread that owns the camera, both
//! ONNX sessions, and the kiosk state machine.
//!
//! The thread multiplexes the recognition tick with management requests
//! (enrollment capture, cutoff updates) over a channel; replies travel
//! back on oneshot channels. Camera and models are opened fail-fast on
//! the caller's thread so startup errors surface before the loop exists.

use crate::config::Config;
use chrono::NaiveTime;
use rollcall_core::kiosk::TickOutcome;
use rollcall_core::{Alert, AlertKind, Clock, FaceDescriptor, KioskMachine};
use rollcall_hw::{Camera, CameraError, Frame};
use rollcall_store::{Store, StoreError};
use rollcall_vision::{FacePipeline, VisionError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("vision error: {0}")]
    Vision(#[from] VisionError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("no face detected in any captured frame")]
    NoFaceDetected,
    #[error("multiple faces in frame — enrollment needs a single unobstructed face")]
    AmbiguousFaces,
    #[error("image write failed: {0}")]
    ImageWrite(String),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of an enrollment capture.
pub struct EnrollCapture {
    pub descriptor: FaceDescriptor,
    /// Saved enrollment frame.
    pub image_path: String,
    pub confidence: f32,
}

enum EngineRequest {
    CaptureFace {
        reply: oneshot::Sender<Result<EnrollCapture, EngineError>>,
    },
    SetCutoff {
        cutoff: NaiveTime,
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    scanning: Arc<AtomicBool>,
}

impl EngineHandle {
    /// Capture frames and extract a descriptor for enrollment.
    pub async fn capture_face(&self) -> Result<EnrollCapture, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::CaptureFace { reply: reply_tx })
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Update the late-after cutoff for subsequent check-ins.
    pub async fn set_cutoff(&self, cutoff: NaiveTime) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::SetCutoff {
                cutoff,
                reply: reply_tx,
            })
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Gate the recognition loop (subscription state). The engine keeps
    /// ticking but does no capture or recognition work while disabled.
    pub fn set_scanning(&self, enabled: bool) {
        self.scanning.store(enabled, Ordering::Relaxed);
    }

    pub fn scanning(&self) -> bool {
        self.scanning.load(Ordering::Relaxed)
    }

    /// Stop the loop and release the camera. No tick runs afterwards.
    pub fn shutdown(&self) {
        let _ = self.tx.send(EngineRequest::Shutdown);
    }
}

struct EngineContext {
    camera: Camera,
    pipeline: FacePipeline,
    machine: KioskMachine,
    store: Store,
    clock: Arc<dyn Clock>,
    runtime: tokio::runtime::Handle,
    year: String,
    capture_dir: PathBuf,
    enroll_frames: usize,
}

/// Open the camera, load the models, and spawn the engine thread.
/// Fails fast: any unavailable resource is a fatal setup error and the
/// kiosk loop never starts.
pub fn spawn_engine(
    config: &Config,
    store: Store,
    clock: Arc<dyn Clock>,
    runtime: tokio::runtime::Handle,
    scanning_enabled: bool,
) -> Result<EngineHandle, anyhow::Error> {
    let camera = Camera::open(&config.camera_device)?;
    tracing::info!(
        device = %config.camera_device,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        "camera opened"
    );

    let pipeline = FacePipeline::load(&config.model_dir)?;
    tracing::info!(dir = %config.model_dir.display(), "vision models loaded");

    if config.warmup_frames > 0 {
        tracing::info!(count = config.warmup_frames, "discarding warmup frames");
        camera.discard_warmup_frames(config.warmup_frames);
    }

    let machine = KioskMachine::new(&config.kiosk_config()?);
    let tick_interval = Duration::from_secs(config.scan_interval_secs);

    let mut ctx = EngineContext {
        camera,
        pipeline,
        machine,
        store,
        clock,
        runtime,
        year: config.year.clone(),
        capture_dir: config.capture_dir.clone(),
        enroll_frames: config.enroll_frames,
    };

    let (tx, rx) = mpsc::channel::<EngineRequest>();
    let scanning = Arc::new(AtomicBool::new(scanning_enabled));
    let scanning_flag = scanning.clone();

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("kiosk engine thread started");
            let mut next_tick = Instant::now() + tick_interval;
            loop {
                let timeout = next_tick.saturating_duration_since(Instant::now());
                match rx.recv_timeout(timeout) {
                    Ok(EngineRequest::CaptureFace { reply }) => {
                        let _ = reply.send(run_capture(&mut ctx));
                    }
                    Ok(EngineRequest::SetCutoff { cutoff, reply }) => {
                        tracing::info!(%cutoff, "cutoff updated");
                        ctx.machine.set_cutoff(cutoff);
                        let _ = reply.send(());
                    }
                    Ok(EngineRequest::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        next_tick += tick_interval;
                        if scanning_flag.load(Ordering::Relaxed) {
                            run_tick(&mut ctx);
                        }
                    }
                }
            }
            tracing::info!("kiosk engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx, scanning })
}

/// One recognition tick. Transient capture/detector errors are logged
/// and treated as zero detections; nothing here may take the loop down.
fn run_tick(ctx: &mut EngineContext) {
    let now = ctx.clock.now();
    ctx.machine.poll_dwell(now);
    if ctx.machine.state() != rollcall_core::KioskState::Idle {
        return;
    }

    let frame = match ctx.camera.capture_frame() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "frame capture failed; skipping tick");
            return;
        }
    };

    let faces = match ctx.pipeline.scan(&frame) {
        Ok(faces) => faces,
        Err(e) => {
            tracing::warn!(error = %e, "face scan failed; treating as zero detections");
            Vec::new()
        }
    };
    let descriptors: Vec<FaceDescriptor> =
        faces.into_iter().map(|f| f.descriptor).collect();

    let students = match ctx.runtime.block_on(ctx.store.students(&ctx.year)) {
        Ok(students) => students,
        Err(e) => {
            tracing::error!(error = %e, "failed to load students; skipping tick");
            return;
        }
    };

    match ctx.machine.on_frame(&descriptors, &students, now) {
        TickOutcome::Skipped | TickOutcome::Quiet => {}
        TickOutcome::CheckIn { result, mark } => {
            tracing::info!(
                status = ?result.status,
                person = %result.person_name,
                message = %result.message,
                "kiosk check-in"
            );
            if let Some(mark) = mark {
                if let Err(e) = ctx.runtime.block_on(ctx.store.mark_attendance(
                    &mark.student_id,
                    mark.date,
                    mark.status,
                    Some(mark.time),
                )) {
                    tracing::error!(error = %e, "failed to write attendance");
                    return;
                }
                if let Err(e) = ctx
                    .runtime
                    .block_on(refresh_alerts(&ctx.store, &ctx.year, ctx.clock.as_ref()))
                {
                    tracing::error!(error = %e, "alert reassessment failed");
                }
            }
        }
        TickOutcome::ProxyAlert {
            result,
            alert_message,
        } => {
            tracing::warn!(person = %result.person_name, "proxy attempt detected");
            let image = match save_frame_jpeg(&frame, &ctx.capture_dir, "alerts") {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to save alert frame");
                    None
                }
            };
            let alert = Alert {
                id: uuid::Uuid::new_v4().to_string(),
                kind: AlertKind::ProxyAttempt,
                message: alert_message,
                student_name: None,
                timestamp: now,
                image,
            };
            if let Err(e) = ctx
                .runtime
                .block_on(ctx.store.append_alert(&ctx.year, alert))
            {
                tracing::error!(error = %e, "failed to persist proxy alert");
            }
        }
    }
}

/// Capture enrollment frames and pick the best single-face detection.
fn run_capture(ctx: &mut EngineContext) -> Result<EnrollCapture, EngineError> {
    let mut best: Option<(Frame, FaceDescriptor, f32)> = None;
    let mut saw_multiple = false;

    for _ in 0..ctx.enroll_frames {
        let frame = ctx.camera.capture_frame()?;
        let faces = ctx.pipeline.scan(&frame)?;
        match faces.as_slice() {
            [face] => {
                let better = best
                    .as_ref()
                    .map(|(_, _, conf)| face.bbox.confidence > *conf)
                    .unwrap_or(true);
                if better {
                    best = Some((frame, face.descriptor.clone(), face.bbox.confidence));
                }
            }
            [] => {}
            _ => saw_multiple = true,
        }
    }

    let Some((frame, descriptor, confidence)) = best else {
        return Err(if saw_multiple {
            EngineError::AmbiguousFaces
        } else {
            EngineError::NoFaceDetected
        });
    };

    tracing::info!(confidence, "enrollment face selected");
    let image_path = save_frame_jpeg(&frame, &ctx.capture_dir, "faces")?;

    Ok(EnrollCapture {
        descriptor,
        image_path,
        confidence,
    })
}

/// Re-run the absence aggregator and replace the scope's alert list.
/// Invoked after every attendance mutation, kiosk or manual.
pub async fn refresh_alerts(
    store: &Store,
    year: &str,
    clock: &dyn Clock,
) -> Result<(), StoreError> {
    let students = store.students(year).await?;
    let existing = store.alerts(year).await?;
    let combined = rollcall_core::aggregator::reassess(&students, &existing, clock.now());
    store.replace_alerts(year, &combined).await
}

/// Write an RGB frame as JPEG under `<capture_dir>/<subdir>/<uuid>.jpg`.
fn save_frame_jpeg(frame: &Frame, capture_dir: &Path, subdir: &str) -> Result<String, EngineError> {
    let dir = capture_dir.join(subdir);
    std::fs::create_dir_all(&dir).map_err(|e| EngineError::ImageWrite(e.to_string()))?;
    let path = dir.join(format!("{}.jpg", uuid::Uuid::new_v4()));

    let buffer = image::RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| EngineError::ImageWrite("frame buffer size mismatch".to_string()))?;
    buffer
        .save(&path)
        .map_err(|e| EngineError::ImageWrite(e.to_string()))?;
    Ok(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{AttendanceStatus, ManualClock, Student};
    use chrono::NaiveDate;

    fn clock() -> ManualClock {
        ManualClock::new(
            NaiveDate::from_ymd_opt(2026, 3, 6)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn refresh_alerts_replaces_scope_alerts() {
        let store = Store::open_in_memory("secret").await.unwrap();
        let clock = clock();
        let year = "2025-2026";

        // One student, no attendance in the trailing window.
        store
            .add_student(
                year,
                &Student {
                    id: "s1".into(),
                    name: "Meera Shah".into(),
                    roll_no: "10A-001".into(),
                    phone: None,
                    face_image: None,
                    descriptor: None,
                    last_seen: "Just Enrolled".into(),
                    attendance: Vec::new(),
                },
            )
            .await
            .unwrap();

        refresh_alerts(&store, year, &clock).await.unwrap();
        let alerts = store.alerts(year).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::ConsecutiveAbsence);

        // Checking the student in today does not clear the trailing
        // window, but marking the three prior days does.
        for day in 3..=5 {
            store
                .mark_attendance(
                    "s1",
                    NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
                    AttendanceStatus::Present,
                    chrono::NaiveTime::from_hms_opt(8, 50, 0),
                )
                .await
                .unwrap();
        }
        refresh_alerts(&store, year, &clock).await.unwrap();
        assert!(store.alerts(year).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_alerts_preserves_proxy_alerts() {
        let store = Store::open_in_memory("secret").await.unwrap();
        let clock = clock();
        let year = "2025-2026";

        store
            .append_alert(
                year,
                Alert {
                    id: "p1".into(),
                    kind: AlertKind::ProxyAttempt,
                    message: "An unrecognized person was detected.".into(),
                    student_name: None,
                    timestamp: clock.now(),
                    image: None,
                },
            )
            .await
            .unwrap();

        refresh_alerts(&store, year, &clock).await.unwrap();
        let alerts = store.alerts(year).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "p1");
    }
}
