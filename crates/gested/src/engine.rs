//! The capture → detect → debounce → commit loop.

use crate::state::SharedState;
use geste_core::{count_fingers, to_luminance, HandLandmarker, StabilityFilter};
use geste_hw::Camera;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] geste_hw::CameraError),
    #[error("landmarker error: {0}")]
    Landmarker(#[from] geste_core::LandmarkerError),
}

/// Spawn the frame loop on a dedicated OS thread.
///
/// Opens the camera and loads the landmark model synchronously (fail-fast:
/// the daemon must not come up without hand detection capability). The
/// thread exits when `stop` is set or on a capture failure; either way
/// `done` fires so the daemon can wind down the rest.
pub fn spawn_engine(
    camera_device: &str,
    model_path: &str,
    state: Arc<SharedState>,
    stop: Arc<AtomicBool>,
    done: oneshot::Sender<()>,
) -> Result<std::thread::JoinHandle<()>, EngineError> {
    let camera = Camera::open(camera_device)?;
    tracing::info!(
        device = camera_device,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        "camera opened"
    );

    let mut landmarker = HandLandmarker::load(model_path)?;
    tracing::info!(path = model_path, "hand landmarker loaded");

    let handle = std::thread::Builder::new()
        .name("geste-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            let mut filter = StabilityFilter::default();

            let mut stream = match camera.stream() {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::error!(error = %e, "failed to start capture stream");
                    let _ = done.send(());
                    return;
                }
            };

            while !stop.load(Ordering::Relaxed) {
                let mut frame = match stream.next_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(error = %e, "capture failed; stopping engine");
                        break;
                    }
                };

                // Mirror before detection: the finger-counting thumb rule
                // is specified against mirrored coordinates.
                frame.mirror();

                let raw = match landmarker.detect(&frame.data, frame.width, frame.height) {
                    Ok(observation) => observation.as_ref().map(count_fingers),
                    Err(e) => {
                        // A transient inference failure reads as a no-hand
                        // frame; only model loading is fatal.
                        tracing::warn!(error = %e, "inference failed");
                        None
                    }
                };

                apply_observation(&mut filter, raw, &state);
            }

            tracing::info!("engine thread exiting");
            let _ = done.send(());
        })
        .expect("failed to spawn engine thread");

    Ok(handle)
}

/// One frame's state transition: debounce the raw count and, on a newly
/// confirmed count, commit the mapped luminance.
///
/// An unconfirmed frame — and a confirmed no-hand — leaves the luminance
/// register untouched: a lost hand holds the last committed value.
fn apply_observation(filter: &mut StabilityFilter, raw: Option<u8>, state: &SharedState) {
    let confirmed = filter.update(raw);
    state.set_confirmed(confirmed);

    if let Some(count) = confirmed {
        let luminance = to_luminance(count);
        let previous = state.luminance();
        if luminance != previous {
            tracing::info!(
                fingers = count,
                old = previous,
                new = luminance,
                "luminance changed"
            );
            state.set_luminance(luminance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_frames(raws: &[Option<u8>]) -> (Vec<u8>, SharedState) {
        let state = SharedState::new();
        let mut filter = StabilityFilter::default();
        let mut luminances = Vec::with_capacity(raws.len());
        for &raw in raws {
            apply_observation(&mut filter, raw, &state);
            luminances.push(state.luminance());
        }
        (luminances, state)
    }

    #[test]
    fn test_commits_after_three_matching_frames() {
        // Raw [2, 2, 2]: confirmed only at the third frame, luminance
        // 0 → 0 → 102.
        let (luminances, state) = run_frames(&[Some(2), Some(2), Some(2)]);
        assert_eq!(luminances, vec![0, 0, 102]);
        assert_eq!(state.confirmed_fingers(), Some(2));
    }

    #[test]
    fn test_interrupted_run_commits_late() {
        // Raw [3, 4, 4, 4, 4]: the leading 3 delays confirmation of 4 to
        // the fourth sample.
        let (luminances, _) = run_frames(&[Some(3), Some(4), Some(4), Some(4), Some(4)]);
        assert_eq!(luminances, vec![0, 0, 0, 204, 204]);
    }

    #[test]
    fn test_hand_lost_holds_last_luminance() {
        // Confirm an open hand, then lose it for three frames: the
        // confirmed count clears but the luminance register holds 255.
        let (_, state) = run_frames(&[
            Some(5),
            Some(5),
            Some(5),
            None,
            None,
            None,
        ]);
        assert_eq!(state.confirmed_fingers(), None);
        assert_eq!(state.luminance(), 255);
    }

    #[test]
    fn test_brief_dropout_does_not_clear_confirmed() {
        let state = SharedState::new();
        let mut filter = StabilityFilter::default();
        for _ in 0..3 {
            apply_observation(&mut filter, Some(3), &state);
        }
        assert_eq!(state.confirmed_fingers(), Some(3));
        assert_eq!(state.luminance(), 153);

        // Two dropped frames: display-side confirmed clears, luminance
        // does not move.
        apply_observation(&mut filter, None, &state);
        apply_observation(&mut filter, None, &state);
        assert_eq!(state.luminance(), 153);
    }

    #[test]
    fn test_fist_commits_zero_luminance() {
        let (luminances, _) = run_frames(&[Some(5), Some(5), Some(5), Some(0), Some(0), Some(0)]);
        assert_eq!(luminances.last(), Some(&0));
    }
}
