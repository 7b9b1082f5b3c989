//! facegate-hw: webcam capture.
//!
//! Provides V4L2 camera access and conversion of the negotiated pixel
//! format (YUYV, MJPG, GREY) to RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
