//! Hand landmark inference via ONNX Runtime.
//!
//! Wraps a MediaPipe-style hand landmarker model: one RGB frame in, at most
//! one hand out (21 landmarks plus handedness). The model is a black box —
//! geste depends only on its tensor contract: an RGB input normalized to
//! [0,1], and three outputs (landmark coordinates in input-pixel units, a
//! hand presence score, and a left/right score).

use crate::types::{HandObservation, Handedness, Landmark, LANDMARK_COUNT};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Model contract constants ---
const LANDMARKER_INPUT_SIZE: usize = 224;
const LANDMARK_VALUES: usize = LANDMARK_COUNT * 3; // x, y, z per landmark
/// Minimum presence score for a frame to count as "hand observed".
const PRESENCE_THRESHOLD: f32 = 0.5;
/// Handedness scores at or above this classify as a right hand.
const RIGHT_HAND_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum LandmarkerError {
    #[error("model file not found: {0} — download hand_landmarker.onnx and place it there")]
    ModelNotFound(String),
    #[error("frame buffer too short: expected {expected} bytes, got {actual}")]
    BadFrame { expected: usize, actual: usize },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Output tensor indices: (landmarks, presence, handedness).
type OutputIndices = (usize, usize, usize);

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Hand landmarker over a single-hand model. First (only) detected hand wins.
pub struct HandLandmarker {
    session: Session,
    input_size: usize,
    /// (landmarks, presence, handedness) output slots. Discovered by name
    /// at load time; falls back to positional ordering.
    output_indices: OutputIndices,
}

impl HandLandmarker {
    /// Load the hand landmarker ONNX model from the given path.
    ///
    /// A missing model file is fatal: the caller must not start a capture
    /// loop without hand detection capability.
    pub fn load(model_path: &str) -> Result<Self, LandmarkerError> {
        if !Path::new(model_path).exists() {
            return Err(LandmarkerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded hand landmarker model"
        );

        if output_names.len() < 3 {
            return Err(LandmarkerError::InferenceFailed(format!(
                "hand landmarker requires 3 outputs (landmarks/presence/handedness), got {}",
                output_names.len()
            )));
        }

        let output_indices = discover_output_indices(&output_names);
        tracing::debug!(?output_indices, "hand landmarker output tensor mapping");

        Ok(Self {
            session,
            input_size: LANDMARKER_INPUT_SIZE,
            output_indices,
        })
    }

    /// Detect a hand in an RGB24 frame.
    ///
    /// Returns `None` when the presence score stays below the threshold —
    /// the normal "no hand this frame" outcome, not an error.
    pub fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<HandObservation>, LandmarkerError> {
        let expected = (width * height * 3) as usize;
        if rgb.len() < expected {
            return Err(LandmarkerError::BadFrame {
                expected,
                actual: rgb.len(),
            });
        }

        let (input, letterbox) = self.preprocess(rgb, width as usize, height as usize);

        let (landmarks_idx, presence_idx, handedness_idx) = self.output_indices;
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, presence) = outputs[presence_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkerError::InferenceFailed(format!("presence: {e}")))?;
        let presence = presence.first().copied().unwrap_or(0.0);

        if presence < PRESENCE_THRESHOLD {
            tracing::trace!(presence, "no hand this frame");
            return Ok(None);
        }

        let (_, handedness) = outputs[handedness_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkerError::InferenceFailed(format!("handedness: {e}")))?;
        let handedness = if handedness.first().copied().unwrap_or(0.0) >= RIGHT_HAND_THRESHOLD {
            Handedness::Right
        } else {
            Handedness::Left
        };

        let (_, raw) = outputs[landmarks_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkerError::InferenceFailed(format!("landmarks: {e}")))?;
        if raw.len() < LANDMARK_VALUES {
            return Err(LandmarkerError::InferenceFailed(format!(
                "landmark tensor too short: expected {LANDMARK_VALUES} values, got {}",
                raw.len()
            )));
        }

        let landmarks = decode_landmarks(
            raw,
            &letterbox,
            width as f32,
            height as f32,
            self.input_size as f32,
        );

        tracing::trace!(presence, ?handedness, "hand observed");

        Ok(Some(HandObservation {
            landmarks,
            handedness,
        }))
    }

    /// Preprocess an RGB24 frame into a NCHW float tensor with letterbox
    /// padding, normalized to [0, 1]. Bilinear resize per channel.
    fn preprocess(&self, rgb: &[u8], width: usize, height: usize) -> (Array4<f32>, LetterboxInfo) {
        let size = self.input_size;

        let scale_w = size as f32 / width as f32;
        let scale_h = size as f32 / height as f32;
        let scale = scale_w.min(scale_h);

        let new_w = (width as f32 * scale).round() as usize;
        let new_h = (height as f32 * scale).round() as usize;
        let pad_x = (size - new_w) as f32 / 2.0;
        let pad_y = (size - new_h) as f32 / 2.0;

        let letterbox = LetterboxInfo { scale, pad_x, pad_y };

        let pad_x_start = pad_x.floor() as usize;
        let pad_y_start = pad_y.floor() as usize;

        let inv_scale = 1.0 / scale;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for y in 0..new_h {
            let src_y = (y as f32 + 0.5) * inv_scale - 0.5;
            let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
            let y1 = (y0 + 1).min(height - 1);
            let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

            for x in 0..new_w {
                let src_x = (x as f32 + 0.5) * inv_scale - 0.5;
                let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
                let x1 = (x0 + 1).min(width - 1);
                let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

                for c in 0..3 {
                    let tl = rgb[(y0 * width + x0) * 3 + c] as f32;
                    let tr = rgb[(y0 * width + x1) * 3 + c] as f32;
                    let bl = rgb[(y1 * width + x0) * 3 + c] as f32;
                    let br = rgb[(y1 * width + x1) * 3 + c] as f32;

                    let val = tl * (1.0 - fx) * (1.0 - fy)
                        + tr * fx * (1.0 - fy)
                        + bl * (1.0 - fx) * fy
                        + br * fx * fy;

                    tensor[[0, c, y + pad_y_start, x + pad_x_start]] = val / 255.0;
                }
            }
        }

        (tensor, letterbox)
    }
}

/// Discover output tensor ordering by name.
///
/// MediaPipe-derived exports name their tensors along the lines of
/// "ld_21_3d" / "xyz_x21" (landmarks), "hand_score" / "output_handflag"
/// (presence) and "handedness" / "lefthand" (left/right). If all three can
/// be matched, use those slots; otherwise fall back to the positional
/// ordering [0]=landmarks, [1]=presence, [2]=handedness.
fn discover_output_indices(names: &[String]) -> OutputIndices {
    let find = |patterns: &[&str]| -> Option<usize> {
        names.iter().position(|n| {
            let lower = n.to_ascii_lowercase();
            patterns.iter().any(|p| lower.contains(p))
        })
    };

    let landmarks = find(&["ld_21", "xyz_x21", "landmark"]);
    let presence = find(&["handflag", "hand_score", "presence", "score"]);
    let handedness = find(&["handedness", "lefthand", "left_right"]);

    match (landmarks, presence, handedness) {
        (Some(l), Some(p), Some(h)) if l != p && p != h && l != h => {
            tracing::info!("hand landmarker: using name-based output tensor mapping");
            (l, p, h)
        }
        _ => {
            tracing::info!(
                ?names,
                "hand landmarker: output names not recognized, using positional mapping \
                 [0]=landmarks, [1]=presence, [2]=handedness"
            );
            (0, 1, 2)
        }
    }
}

/// Decode the raw landmark tensor (x/y/z triplets in input-pixel units)
/// back into frame-normalized coordinates.
fn decode_landmarks(
    raw: &[f32],
    letterbox: &LetterboxInfo,
    frame_w: f32,
    frame_h: f32,
    input_size: f32,
) -> [Landmark; LANDMARK_COUNT] {
    std::array::from_fn(|i| {
        let px = raw[i * 3];
        let py = raw[i * 3 + 1];
        let pz = raw[i * 3 + 2];

        // Map from letterboxed input space to original frame pixels, then
        // normalize to [0,1] against the frame dimensions.
        let x = (px - letterbox.pad_x) / letterbox.scale / frame_w;
        let y = (py - letterbox.pad_y) / letterbox.scale / frame_h;
        // z stays in the model's relative scale; unused downstream.
        let z = pz / input_size;

        Landmark { x, y, z }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = ["ld_21_3d", "output_handflag", "output_handedness"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(discover_output_indices(&names), (0, 1, 2));
    }

    #[test]
    fn test_discover_output_indices_shuffled_named() {
        let names: Vec<String> = ["handedness", "xyz_x21", "hand_score"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(discover_output_indices(&names), (1, 2, 0));
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = (0..3).map(|i: usize| i.to_string()).collect();
        assert_eq!(discover_output_indices(&names), (0, 1, 2));
    }

    #[test]
    fn test_decode_landmarks_roundtrip() {
        // 320x240 frame letterboxed into 224x224: scale fits width.
        let frame_w = 320.0f32;
        let frame_h = 240.0f32;
        let scale = (224.0 / frame_w).min(224.0 / frame_h);
        let new_h = (frame_h * scale).round();
        let letterbox = LetterboxInfo {
            scale,
            pad_x: 0.0,
            pad_y: (224.0 - new_h) / 2.0,
        };

        // A landmark at the frame center should decode to (0.5, 0.5).
        let cx = frame_w / 2.0 * scale + letterbox.pad_x;
        let cy = frame_h / 2.0 * scale + letterbox.pad_y;
        let mut raw = vec![0.0f32; LANDMARK_VALUES];
        raw[0] = cx;
        raw[1] = cy;
        raw[2] = 11.2;

        let decoded = decode_landmarks(&raw, &letterbox, frame_w, frame_h, 224.0);
        assert!((decoded[0].x - 0.5).abs() < 1e-3, "x: {}", decoded[0].x);
        assert!((decoded[0].y - 0.5).abs() < 1e-3, "y: {}", decoded[0].y);
        assert!((decoded[0].z - 0.05).abs() < 1e-3, "z: {}", decoded[0].z);
    }

    #[test]
    fn test_decode_landmarks_corners() {
        let letterbox = LetterboxInfo {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let mut raw = vec![0.0f32; LANDMARK_VALUES];
        // Landmark 20 at the far corner of a 224x224 frame.
        raw[20 * 3] = 224.0;
        raw[20 * 3 + 1] = 224.0;

        let decoded = decode_landmarks(&raw, &letterbox, 224.0, 224.0, 224.0);
        assert!((decoded[20].x - 1.0).abs() < 1e-6);
        assert!((decoded[20].y - 1.0).abs() < 1e-6);
        assert_eq!(decoded[0].x, 0.0);
    }
}
