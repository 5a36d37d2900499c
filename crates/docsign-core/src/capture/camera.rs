//! Camera capture of a pen signature
//!
//! A [`CameraCapture`] owns an open media stream until it is captured,
//! cancelled, or dropped. Every one of those paths stops the stream.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use super::codec::to_data_url;
use super::extract::extract_pen;
use super::surface::Surface;
use super::CaptureError;

/// Which camera to ask the platform for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Rear camera, pointed at the paper
    Environment,
    /// Front camera
    User,
}

/// Failures reported by the platform media layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("media devices are not available")]
    NotSupported,

    #[error("permission denied")]
    PermissionDenied,

    #[error("no matching device")]
    NotFound,

    /// The device could not be started by its driver
    #[error("device not readable")]
    NotReadable,

    #[error("{0}")]
    Other(String),
}

impl From<MediaError> for CaptureError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::NotSupported => CaptureError::Unsupported,
            MediaError::PermissionDenied => CaptureError::PermissionDenied,
            MediaError::NotFound => CaptureError::DeviceNotFound,
            MediaError::NotReadable => CaptureError::DriverUnsupported,
            MediaError::Other(message) => CaptureError::Failed(message),
        }
    }
}

/// Platform entry point for opening camera streams
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn open(&self, facing: Facing) -> Result<Box<dyn MediaStream>, MediaError>;
}

/// An open camera stream
pub trait MediaStream: Send {
    /// Draw the current frame onto a fresh surface
    fn grab_frame(&mut self) -> Result<Surface, MediaError>;

    /// Stop every track of the stream
    fn stop(&mut self);
}

/// A camera capture session
pub struct CameraCapture {
    stream: Option<Box<dyn MediaStream>>,
    facing: Facing,
}

impl CameraCapture {
    /// Open the rear camera, falling back once to the front camera. When both
    /// fail, the front camera's error is returned.
    pub async fn open<D: MediaDevices + ?Sized>(devices: &D) -> Result<Self, CaptureError> {
        let (stream, facing) = match devices.open(Facing::Environment).await {
            Ok(stream) => (stream, Facing::Environment),
            Err(first) => {
                debug!(error = %first, "environment camera unavailable, trying user camera");
                match devices.open(Facing::User).await {
                    Ok(stream) => (stream, Facing::User),
                    Err(second) => {
                        warn!(error = %second, "camera capture unavailable");
                        return Err(second.into());
                    }
                }
            }
        };

        Ok(Self {
            stream: Some(stream),
            facing,
        })
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Grab one frame, release the camera, and binarize the frame
    pub fn capture(mut self) -> Result<Surface, CaptureError> {
        let frame = match self.stream.as_mut() {
            Some(stream) => stream.grab_frame().map_err(CaptureError::from),
            None => Err(CaptureError::Failed("camera stream is closed".to_string())),
        };
        self.release();

        let mut frame = frame?;
        extract_pen(&mut frame);
        Ok(frame)
    }

    /// [`capture`](Self::capture) straight to an image-data string
    pub fn capture_data_url(self) -> Result<String, CaptureError> {
        to_data_url(&self.capture()?)
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!(facing = ?self.facing, "camera stream released");
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FakeStream {
        stops: Arc<AtomicUsize>,
        frame: Result<Surface, MediaError>,
    }

    impl MediaStream for FakeStream {
        fn grab_frame(&mut self) -> Result<Surface, MediaError> {
            self.frame.clone()
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeDevices {
        environment: Option<MediaError>,
        user: Option<MediaError>,
        frame: Result<Surface, MediaError>,
        stops: Arc<AtomicUsize>,
        requests: Mutex<Vec<Facing>>,
    }

    impl FakeDevices {
        fn new(environment: Option<MediaError>, user: Option<MediaError>) -> Self {
            let mut frame = Surface::new(2, 1);
            frame.put_pixel(0, 0, [250, 250, 240, 255]);
            frame.put_pixel(1, 0, [20, 30, 90, 255]);
            Self {
                environment,
                user,
                frame: Ok(frame),
                stops: Arc::new(AtomicUsize::new(0)),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn stops(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaDevices for FakeDevices {
        async fn open(&self, facing: Facing) -> Result<Box<dyn MediaStream>, MediaError> {
            self.requests.lock().unwrap().push(facing);
            let failure = match facing {
                Facing::Environment => &self.environment,
                Facing::User => &self.user,
            };
            match failure {
                Some(err) => Err(err.clone()),
                None => Ok(Box::new(FakeStream {
                    stops: self.stops.clone(),
                    frame: self.frame.clone(),
                })),
            }
        }
    }

    #[tokio::test]
    async fn test_capture_binarizes_and_releases() {
        let devices = FakeDevices::new(None, None);
        let capture = CameraCapture::open(&devices).await.unwrap();
        assert_eq!(capture.facing(), Facing::Environment);

        let frame = capture.capture().unwrap();
        assert_eq!(frame.pixel(0, 0), Some([255, 255, 255, 255]));
        assert_eq!(frame.pixel(1, 0), Some([0, 0, 0, 255]));
        assert_eq!(devices.stops(), 1);
    }

    #[tokio::test]
    async fn test_environment_failure_retries_user_camera_once() {
        let devices = FakeDevices::new(Some(MediaError::NotFound), None);
        let capture = CameraCapture::open(&devices).await.unwrap();
        assert_eq!(capture.facing(), Facing::User);
        assert_eq!(
            *devices.requests.lock().unwrap(),
            vec![Facing::Environment, Facing::User]
        );
    }

    #[tokio::test]
    async fn test_both_failures_surface_mapped_error() {
        let devices = FakeDevices::new(
            Some(MediaError::NotFound),
            Some(MediaError::PermissionDenied),
        );
        let err = CameraCapture::open(&devices).await.err().unwrap();
        assert_eq!(err, CaptureError::PermissionDenied);
        assert_eq!(devices.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_and_drop_release_the_stream() {
        let devices = FakeDevices::new(None, None);

        CameraCapture::open(&devices).await.unwrap().cancel();
        assert_eq!(devices.stops(), 1);

        {
            let capture = CameraCapture::open(&devices).await.unwrap();
            assert!(capture.is_open());
        }
        assert_eq!(devices.stops(), 2);
    }

    #[tokio::test]
    async fn test_failed_grab_still_releases() {
        let mut devices = FakeDevices::new(None, None);
        devices.frame = Err(MediaError::NotReadable);

        let capture = CameraCapture::open(&devices).await.unwrap();
        assert_eq!(capture.capture().unwrap_err(), CaptureError::DriverUnsupported);
        assert_eq!(devices.stops(), 1);
    }

    #[test]
    fn test_other_media_errors_collapse_to_failed() {
        let err: CaptureError = MediaError::Other("AbortError".to_string()).into();
        assert!(matches!(err, CaptureError::Failed(_)));
    }
}
