//! The geometric finger-counting rule.
//!
//! Coordinates are expected in the *mirrored* frame: the engine flips each
//! captured frame horizontally before detection, so the on-screen hand moves
//! like a mirror image. That convention is a fixed contract between this
//! module and the capture path — the thumb rule below is written against it.

use crate::types::{landmark_ids as ids, HandObservation, Handedness};

/// Fingertip / mid-joint (PIP) landmark pairs for index, middle, ring, pinky.
const FINGER_PAIRS: [(usize, usize); 4] = [
    (ids::INDEX_FINGER_TIP, ids::INDEX_FINGER_PIP),
    (ids::MIDDLE_FINGER_TIP, ids::MIDDLE_FINGER_PIP),
    (ids::RING_FINGER_TIP, ids::RING_FINGER_PIP),
    (ids::PINKY_TIP, ids::PINKY_PIP),
];

/// Count the extended fingers in one hand observation (0–5).
///
/// The thumb is judged on the x axis against its IP joint; in the mirrored
/// frame a right hand's extended thumb points toward larger x, a left
/// hand's toward smaller x. The four long fingers are extended when the tip
/// sits strictly above its PIP joint in image space (y grows downward).
/// An exact tie on either axis counts as not extended.
pub fn count_fingers(hand: &HandObservation) -> u8 {
    let lm = &hand.landmarks;
    let mut count = 0u8;

    let thumb_tip = lm[ids::THUMB_TIP];
    let thumb_ip = lm[ids::THUMB_IP];
    let thumb_extended = match hand.handedness {
        Handedness::Right => thumb_tip.x > thumb_ip.x,
        Handedness::Left => thumb_tip.x < thumb_ip.x,
    };
    if thumb_extended {
        count += 1;
    }

    for (tip, pip) in FINGER_PAIRS {
        if lm[tip].y < lm[pip].y {
            count += 1;
        }
    }

    count
}
