//! geste-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based camera access with RGB24 frame output, plus the
//! frame-level pixel routines (YUYV conversion, mirroring).

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, PixelFormat};
pub use frame::Frame;
