use serde::{Deserialize, Serialize};

/// MediaPipe 21-point hand landmark indices.
///
/// See: https://google.github.io/mediapipe/solutions/hands.html
pub mod landmark_ids {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_DIP: usize = 11;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_DIP: usize = 15;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// Number of landmarks per hand observation.
pub const LANDMARK_COUNT: usize = 21;

/// A single tracked hand point, with x/y normalized to frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Depth relative to the wrist. Carried through but unused by the
    /// finger-counting rule.
    pub z: f32,
}

/// Which hand the model classified the observation as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// One frame's detected hand: 21 landmarks plus handedness.
///
/// Supplied fresh each frame and never retained across frames.
#[derive(Debug, Clone)]
pub struct HandObservation {
    pub landmarks: [Landmark; LANDMARK_COUNT],
    pub handedness: Handedness,
}
