//! geste-core — Hand gesture perception and luminance mapping.
//!
//! Wraps a hand-landmark ONNX model for per-frame hand observations and
//! provides the pure gesture logic on top: finger counting, debouncing,
//! and the finger-count → luminance mapping.

pub mod fingers;
pub mod landmarker;
pub mod luminance;
pub mod stability;
pub mod types;

pub use fingers::count_fingers;
pub use landmarker::{HandLandmarker, LandmarkerError};
pub use luminance::{luminance_percent, to_luminance, LUMINANCE_STEP};
pub use stability::{StabilityFilter, DEFAULT_STABILITY_THRESHOLD};
pub use types::{HandObservation, Handedness, Landmark};
