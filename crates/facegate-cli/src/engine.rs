use facegate_core::{BuildReport, DatasetError, FaceEncoder, Gallery, GalleryError, Recognition, Tolerance};
use facegate_hw::Camera;
use image::RgbImage;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to capture frame from camera: {0}")]
    Camera(#[from] facegate_hw::CameraError),
    #[error("camera frame unusable: {0}")]
    Frame(#[from] facegate_hw::FrameError),
    #[error("face analysis failed: {0}")]
    Analyze(#[from] facegate_core::AnalyzeError),
    #[error("dataset rebuild failed: {0}")]
    Dataset(#[from] DatasetError),
    #[error("gallery: {0}")]
    Gallery(#[from] GalleryError),
    #[error("no camera opened for this session")]
    NoCamera,
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Where the engine keeps its dataset and gallery.
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub dataset_dir: PathBuf,
    pub gallery_path: PathBuf,
}

/// Messages sent from the kiosk loop to the engine thread.
enum EngineRequest {
    Recognize {
        image: RgbImage,
        tolerance: Tolerance,
        reply: oneshot::Sender<Result<Recognition, EngineError>>,
    },
    Capture {
        tolerance: Tolerance,
        reply: oneshot::Sender<Result<Recognition, EngineError>>,
    },
    Rebuild {
        reply: oneshot::Sender<Result<BuildReport, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, EngineError>>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Recognize faces in a supplied picture.
    pub async fn recognize(&self, image: RgbImage, tolerance: Tolerance) -> Result<Recognition, EngineError> {
        self.call(|reply| EngineRequest::Recognize { image, tolerance, reply }).await
    }

    /// Grab one webcam frame and recognize faces in it.
    pub async fn capture(&self, tolerance: Tolerance) -> Result<Recognition, EngineError> {
        self.call(|reply| EngineRequest::Capture { tolerance, reply }).await
    }

    /// Rebuild the gallery from the dataset directory and persist it.
    pub async fn rebuild(&self) -> Result<BuildReport, EngineError> {
        self.call(|reply| EngineRequest::Rebuild { reply }).await
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the encoder, the gallery and the camera (webcam mode
/// only). The gallery is loaded here so a corrupt file fails fast.
pub fn spawn_engine<E>(
    mut encoder: E,
    paths: DatasetPaths,
    camera: Option<Camera>,
) -> Result<EngineHandle, EngineError>
where
    E: FaceEncoder + Send + 'static,
{
    let mut gallery = Gallery::load(&paths.gallery_path)?;
    tracing::info!(entries = gallery.len(), path = %paths.gallery_path.display(), "gallery ready");
    if gallery.is_empty() {
        tracing::warn!("gallery is empty; every face will be Unknown until the dataset is rebuilt");
    }

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Recognize { image, tolerance, reply } => {
                        let result = facegate_core::recognize(&mut encoder, &image, &gallery, tolerance)
                            .map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Capture { tolerance, reply } => {
                        let result = capture_and_recognize(camera.as_ref(), &mut encoder, &gallery, tolerance);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Rebuild { reply } => {
                        let result = rebuild(&mut encoder, &paths, &mut gallery);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(|e| {
            tracing::error!(error = %e, "failed to spawn engine thread");
            EngineError::ChannelClosed
        })?;

    Ok(EngineHandle { tx })
}

fn capture_and_recognize<E: FaceEncoder>(
    camera: Option<&Camera>,
    encoder: &mut E,
    gallery: &Gallery,
    tolerance: Tolerance,
) -> Result<Recognition, EngineError> {
    let camera = camera.ok_or(EngineError::NoCamera)?;
    let frame = camera.capture_frame()?;
    if frame.is_dark {
        tracing::debug!(seq = frame.sequence, "dark frame");
    }
    let image = frame.into_rgb_image()?;
    Ok(facegate_core::recognize(encoder, &image, gallery, tolerance)?)
}

/// Rebuild, persist, then swap the in-memory gallery.
fn rebuild<E: FaceEncoder>(
    encoder: &mut E,
    paths: &DatasetPaths,
    gallery: &mut Gallery,
) -> Result<BuildReport, EngineError> {
    let (rebuilt, report) = facegate_core::build_dataset(encoder, &paths.dataset_dir, gallery)?;
    rebuilt.save(&paths.gallery_path)?;
    *gallery = rebuilt;
    Ok(report)
}
