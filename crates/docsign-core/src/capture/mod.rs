//! Signature capture
//!
//! Two ways to produce a signature image: freehand strokes on a transparent
//! [`Surface`], or a still frame from a camera run through pen extraction.
//! Both end as a PNG data URL.

pub mod camera;
pub mod codec;
pub mod extract;
pub mod freehand;
pub mod surface;

pub use camera::{CameraCapture, Facing, MediaDevices, MediaError, MediaStream};
pub use codec::{from_data_url, image_dimensions, is_image_data, to_data_url};
pub use extract::{extract_pen, luminance, PEN_THRESHOLD};
pub use freehand::FreehandPad;
pub use surface::{Rgba, Surface, INK, TRANSPARENT};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// No camera API on this platform
    #[error("Camera capture is not supported on this device")]
    Unsupported,

    #[error("Camera permission was denied")]
    PermissionDenied,

    #[error("No camera device was found")]
    DeviceNotFound,

    /// The device exists but its driver refused to start a stream
    #[error("The camera is not supported by its driver")]
    DriverUnsupported,

    #[error("Capture failed: {0}")]
    Failed(String),

    #[error("Failed to encode signature image: {0}")]
    Encode(String),

    #[error("Failed to decode signature image: {0}")]
    Decode(String),

    #[error("Signature surface is empty")]
    EmptySignature,
}

impl CaptureError {
    /// Message shown to the person capturing a signature
    pub fn user_message(&self) -> &'static str {
        match self {
            CaptureError::Unsupported => "Your device does not support camera capture.",
            CaptureError::PermissionDenied => {
                "Camera access was denied. Allow camera access and try again."
            }
            CaptureError::DeviceNotFound => "No camera was found on this device.",
            CaptureError::DriverUnsupported => "Your camera could not be started.",
            CaptureError::EmptySignature => "Please draw your signature first.",
            CaptureError::Failed(_) | CaptureError::Encode(_) | CaptureError::Decode(_) => {
                "Could not capture the signature. Please try again."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_errors_have_distinct_messages() {
        let messages = [
            CaptureError::Unsupported.user_message(),
            CaptureError::PermissionDenied.user_message(),
            CaptureError::DeviceNotFound.user_message(),
            CaptureError::DriverUnsupported.user_message(),
            CaptureError::Failed("x".to_string()).user_message(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
