//! Debouncing of the per-frame finger count.

/// Consecutive identical raw observations required before a count is trusted.
pub const DEFAULT_STABILITY_THRESHOLD: u32 = 3;

/// Suppresses single-frame misreads in the raw finger-count stream.
///
/// Fed one raw observation per frame (`None` = no hand detected this frame),
/// it releases a confirmed count only after the same observation has been
/// seen `threshold` frames in a row. "No hand" is debounced like any other
/// value, so a hand briefly leaving the frame cannot flicker the committed
/// luminance.
///
/// Pure state transition — never errors, lives for the capture session.
#[derive(Debug)]
pub struct StabilityFilter {
    last_observed: Option<u8>,
    consecutive: u32,
    threshold: u32,
}

impl StabilityFilter {
    pub fn new(threshold: u32) -> Self {
        Self {
            last_observed: None,
            consecutive: 0,
            threshold: threshold.max(1),
        }
    }

    /// Feed one frame's raw count.
    ///
    /// Returns the confirmed count once the run reaches the threshold;
    /// `None` while the observation is still unconfirmed, and also for a
    /// confirmed no-hand (callers hold the last committed value either way).
    pub fn update(&mut self, raw: Option<u8>) -> Option<u8> {
        if raw == self.last_observed {
            self.consecutive = self.consecutive.saturating_add(1);
        } else {
            self.last_observed = raw;
            self.consecutive = 1;
        }

        if self.consecutive >= self.threshold {
            raw
        } else {
            None
        }
    }
}

impl Default for StabilityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_STABILITY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(filter: &mut StabilityFilter, raws: &[Option<u8>]) -> Vec<Option<u8>> {
        raws.iter().map(|&r| filter.update(r)).collect()
    }

    #[test]
    fn test_confirms_on_third_repeat() {
        let mut f = StabilityFilter::default();
        assert_eq!(
            feed(&mut f, &[Some(2), Some(2), Some(2)]),
            vec![None, None, Some(2)]
        );
    }

    #[test]
    fn test_keeps_confirming_past_threshold() {
        let mut f = StabilityFilter::default();
        feed(&mut f, &[Some(4), Some(4), Some(4)]);
        assert_eq!(f.update(Some(4)), Some(4));
        assert_eq!(f.update(Some(4)), Some(4));
    }

    #[test]
    fn test_change_resets_run() {
        let mut f = StabilityFilter::default();
        // A run of 3s interrupted by a single 4 starts a fresh run.
        assert_eq!(
            feed(&mut f, &[Some(3), Some(4), Some(4), Some(4), Some(4)]),
            vec![None, None, None, Some(4), Some(4)]
        );
    }

    #[test]
    fn test_single_glitch_in_run_suppressed() {
        let mut f = StabilityFilter::default();
        feed(&mut f, &[Some(5), Some(5), Some(5)]);
        // One misread frame never surfaces...
        assert_eq!(f.update(Some(2)), None);
        // ...and the return to 5 starts counting from 1 again.
        assert_eq!(f.update(Some(5)), None);
        assert_eq!(f.update(Some(5)), None);
        assert_eq!(f.update(Some(5)), Some(5));
    }

    #[test]
    fn test_no_hand_is_debounced_like_any_value() {
        let mut f = StabilityFilter::default();
        feed(&mut f, &[Some(5), Some(5), Some(5)]);
        // Two dropped frames are not enough for the filter to settle on
        // "no hand"; nothing is released in between.
        assert_eq!(f.update(None), None);
        assert_eq!(f.update(None), None);
        assert_eq!(f.update(None), None);
        // A returning hand needs a full fresh run.
        assert_eq!(f.update(Some(5)), None);
        assert_eq!(f.update(Some(5)), None);
        assert_eq!(f.update(Some(5)), Some(5));
    }

    #[test]
    fn test_threshold_one_passes_through() {
        let mut f = StabilityFilter::new(1);
        assert_eq!(f.update(Some(3)), Some(3));
        assert_eq!(f.update(Some(1)), Some(1));
    }

    #[test]
    fn test_zero_threshold_clamped_to_one() {
        let mut f = StabilityFilter::new(0);
        assert_eq!(f.update(Some(2)), Some(2));
    }

    #[test]
    fn test_alternating_never_confirms() {
        let mut f = StabilityFilter::default();
        let out = feed(
            &mut f,
            &[Some(1), Some(2), Some(1), Some(2), Some(1), Some(2)],
        );
        assert!(out.iter().all(|c| c.is_none()));
    }
}
