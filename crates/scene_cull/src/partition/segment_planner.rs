//! Camera segment planning
//!
//! Turns the (near, far) pairs gathered by the
//! [`DistanceAccumulator`](crate::partition::DistanceAccumulator) into the
//! list of view segments, one per camera, ordered far to near.
//!
//! The steps are:
//! 1. sort pairs by descending far distance,
//! 2. merge pairs that overlap (with a 1% gap tolerance),
//! 3. split each merged span into logarithmically spaced segments whose
//!    near/far ratio stays close to the requested one, letting the nearest
//!    segment swallow following spans that already fit inside it.

/// A pair whose far distance is below this fraction of the current merged
/// near distance starts a new merged span
pub const MERGE_TOLERANCE: f64 = 0.99;

/// Fractional segment counts below this are rounded with an upward bias
pub const ROUNDING_BIAS_LIMIT: f64 = 10.0;

/// Ceiling for a near distance synthesised for content touching the eye
pub const MAX_SYNTHESISED_NEAR: f64 = 1.0;

/// Eye-space (near, far) distance interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistancePair {
    /// Nearest distance from the eye
    pub near: f64,
    /// Farthest distance from the eye
    pub far: f64,
}

impl DistancePair {
    /// Create a pair
    pub const fn new(near: f64, far: f64) -> Self {
        Self { near, far }
    }

    /// Reset value for running limits: nothing seen yet
    pub const fn empty_limits() -> Self {
        Self {
            near: f64::INFINITY,
            far: 0.0,
        }
    }

    /// Pair fit for planning
    ///
    /// `None` when the interval lies behind the eye or is not finite. A near
    /// distance at or behind the eye becomes `far * near_far_ratio`, capped
    /// at [`MAX_SYNTHESISED_NEAR`].
    pub fn clamped(near: f64, far: f64, near_far_ratio: f64) -> Option<Self> {
        if !(far > 0.0 && far.is_finite()) || near.is_nan() || (near.is_infinite() && near > 0.0) {
            return None;
        }
        let near = if near <= 0.0 {
            (far * near_far_ratio).min(MAX_SYNTHESISED_NEAR)
        } else {
            near
        };
        Some(Self::new(near, far))
    }

    fn is_plannable(&self) -> bool {
        self.near > 0.0 && self.near.is_finite() && self.far.is_finite()
    }

    /// near / far
    pub fn ratio(&self) -> f64 {
        self.near / self.far
    }
}

/// Compute the camera segments for a set of distance pairs
///
/// `limits` must be the running (nearest, farthest) over `distance_pairs`.
/// Returns an empty list for an empty scene and the limits themselves when
/// the whole scene already fits one depth range.
///
/// Pairs go through [`DistancePair::clamped`] first. Limits that are not
/// usable are rebuilt from the clamped pairs. A ratio outside (0, 1) plans a
/// single segment.
pub fn compute_camera_pairs(
    distance_pairs: &[DistancePair],
    limits: DistancePair,
    near_far_ratio: f64,
) -> Vec<DistancePair> {
    let mut camera_pairs = Vec::new();

    let mut sorted: Vec<DistancePair> = distance_pairs
        .iter()
        .filter_map(|pair| DistancePair::clamped(pair.near, pair.far, near_far_ratio))
        .collect();
    if sorted.is_empty() {
        return camera_pairs;
    }

    let limits = if limits.is_plannable() {
        limits
    } else {
        sorted.iter().fold(DistancePair::empty_limits(), |acc, pair| {
            DistancePair::new(acc.near.min(pair.near), acc.far.max(pair.far))
        })
    };

    if !(near_far_ratio > 0.0 && near_far_ratio < 1.0) {
        log::debug!("Near/far ratio {} outside (0, 1), planning one segment", near_far_ratio);
        camera_pairs.push(limits);
        return camera_pairs;
    }

    if limits.near >= limits.far * near_far_ratio {
        camera_pairs.push(limits);
        return camera_pairs;
    }

    sorted.sort_by(|a, b| b.far.total_cmp(&a.far));
    let combined = merge_overlapping(&sorted);

    let ratio_invlog = 1.0 / near_far_ratio.ln();
    let fractional_segments = |pair: &DistancePair| {
        if pair.near >= pair.far * near_far_ratio {
            1.0
        } else {
            pair.ratio().ln() * ratio_invlog
        }
    };

    let mut i = 0;
    while i < combined.len() {
        let mut current = combined[i];

        let mut near_limit = current.far * near_far_ratio;
        let mut num_segs = fractional_segments(&current);
        if num_segs > 1.0 {
            // Near plane of the nearest whole segment
            for _ in 1..(num_segs.floor() as usize) {
                near_limit *= near_far_ratio;
            }
        }

        // Following spans that start inside the nearest segment are absorbed
        let mut j = i + 1;
        while j < combined.len() && combined[j].near >= near_limit {
            j += 1;
        }
        if j - 1 != i {
            i = j - 1;
            current.near = combined[i].near;
            num_segs = fractional_segments(&current);
        }

        let num_segs = round_segment_count(num_segs);
        let segment_ratio = current.ratio().powf(1.0 / num_segs);

        for _ in 0..(num_segs as usize) {
            current.near = current.far * segment_ratio;
            camera_pairs.push(current);
            current.far = current.near;
        }

        i += 1;
    }

    camera_pairs
}

/// Merge pairs sorted by descending far distance into disjoint spans
pub(crate) fn merge_overlapping(sorted: &[DistancePair]) -> Vec<DistancePair> {
    let mut combined = Vec::new();
    let Some(&first) = sorted.first() else {
        return combined;
    };

    let mut current = first;
    for pair in &sorted[1..] {
        if pair.far < MERGE_TOLERANCE * current.near {
            combined.push(current);
            current = *pair;
        } else {
            current.near = current.near.min(pair.near);
        }
    }
    combined.push(current);
    combined
}

/// Integer segment count for a fractional one
///
/// Small counts are biased upwards (a fraction of 0.9 down to 0.1 is
/// enough to add a segment as the count grows); large counts are floored.
pub fn round_segment_count(num_segs: f64) -> f64 {
    if num_segs < ROUNDING_BIAS_LIMIT {
        (num_segs + 1.0 - 0.1 * num_segs.floor()).floor()
    } else {
        num_segs.floor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn limits_of(pairs: &[DistancePair]) -> DistancePair {
        pairs.iter().fold(DistancePair::empty_limits(), |acc, p| {
            DistancePair::new(acc.near.min(p.near), acc.far.max(p.far))
        })
    }

    #[test]
    fn test_empty_input_yields_no_segments() {
        let segments = compute_camera_pairs(&[], DistancePair::empty_limits(), 0.001);
        assert!(segments.is_empty());
    }

    #[test]
    fn test_single_camera_shortcut_returns_limits() {
        let pairs = [
            DistancePair::new(50.0, 60.0),
            DistancePair::new(10.0, 20.0),
            DistancePair::new(30.0, 90.0),
        ];
        let limits = limits_of(&pairs);
        let segments = compute_camera_pairs(&pairs, limits, 0.1);
        assert_eq!(segments, vec![DistancePair::new(10.0, 90.0)]);
    }

    #[test]
    fn test_merge_within_tolerance() {
        let sorted = [DistancePair::new(19.9, 25.0), DistancePair::new(10.0, 20.0)];
        let combined = merge_overlapping(&sorted);
        assert_eq!(combined, vec![DistancePair::new(10.0, 25.0)]);
    }

    #[test]
    fn test_merge_tolerance_boundary() {
        // 0.99 * 19.7 = 19.503
        let touching = [DistancePair::new(19.7, 25.0), DistancePair::new(10.0, 19.55)];
        assert_eq!(merge_overlapping(&touching).len(), 1);

        let gapped = [DistancePair::new(19.7, 25.0), DistancePair::new(10.0, 19.5)];
        assert_eq!(
            merge_overlapping(&gapped),
            vec![DistancePair::new(19.7, 25.0), DistancePair::new(10.0, 19.5)]
        );
    }

    #[test]
    fn test_rounding_policy() {
        assert_relative_eq!(round_segment_count(1.0), 1.0);
        assert_relative_eq!(round_segment_count(1.05), 1.0);
        assert_relative_eq!(round_segment_count(1.2), 2.0);
        assert_relative_eq!(round_segment_count(2.0), 2.0);
        assert_relative_eq!(round_segment_count(5.4), 5.0);
        assert_relative_eq!(round_segment_count(5.6), 6.0);
        assert_relative_eq!(round_segment_count(9.95), 10.0);
        assert_relative_eq!(round_segment_count(12.9), 12.0);
    }

    #[test]
    fn test_segments_cover_span_without_gaps() {
        // One span from 1 to 10_000 with ratio 0.01: two segments of two decades
        let pairs = [DistancePair::new(1.0, 10_000.0)];
        let segments = compute_camera_pairs(&pairs, limits_of(&pairs), 0.01);

        assert_eq!(segments.len(), 2);
        assert_relative_eq!(segments[0].far, 10_000.0);
        for window in segments.windows(2) {
            assert_relative_eq!(window[0].near, window[1].far, max_relative = 1e-12);
        }
        assert_relative_eq!(segments.last().unwrap().near, 1.0, max_relative = 1e-9);
    }

    #[test]
    fn test_segments_keep_ratio_when_rounding_up() {
        // log(1e-5)/log(0.01) = 2.5 -> 3 segments
        let ratio = 0.01;
        let pairs = [DistancePair::new(0.1, 10_000.0)];
        let segments = compute_camera_pairs(&pairs, limits_of(&pairs), ratio);

        assert_eq!(segments.len(), 3);
        for segment in &segments {
            assert!(segment.ratio() >= ratio * (1.0 - 1e-12));
            assert!(segment.near < segment.far);
        }
    }

    #[test]
    fn test_disjoint_spans_are_planned_far_to_near() {
        let ratio = 0.1;
        let pairs = [
            DistancePair::new(1.0, 5.0),
            DistancePair::new(5000.0, 10_000.0),
        ];
        let segments = compute_camera_pairs(&pairs, limits_of(&pairs), ratio);

        assert_eq!(segments.len(), 2);
        assert_relative_eq!(segments[0].far, 10_000.0);
        assert_relative_eq!(segments[0].near, 5000.0, max_relative = 1e-12);
        assert_relative_eq!(segments[1].far, 5.0);
        assert_relative_eq!(segments[1].near, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn test_nearest_segment_absorbs_following_span() {
        // Span A = (100, 1000): one segment, its near limit is 1000 * 0.05 = 50.
        // Span B = (60, 90) starts inside that limit and is absorbed, so the
        // merged span (60, 1000) is replanned and still fits one segment.
        let ratio = 0.05;
        let pairs = [
            DistancePair::new(100.0, 1000.0),
            DistancePair::new(60.0, 90.0),
            DistancePair::new(1.0, 2.0),
        ];
        let segments = compute_camera_pairs(&pairs, limits_of(&pairs), ratio);

        assert_eq!(segments.len(), 2);
        assert_relative_eq!(segments[0].far, 1000.0);
        assert_relative_eq!(segments[0].near, 60.0, max_relative = 1e-12);
        assert_eq!(segments[1], DistancePair::new(1.0, 2.0));
    }

    #[test]
    fn test_absorption_limit_uses_whole_segments_only() {
        // (10^0.5, 10^4) needs 3.5 segments at ratio 0.1; the two whole ones
        // below the first end at 10_000 * 0.1^3 = 10, so (2, 2.5) stays apart
        let ratio = 0.1;
        let pairs = [
            DistancePair::new(10_000.0 * 10f64.powf(-3.5), 10_000.0),
            DistancePair::new(2.0, 2.5),
        ];
        let segments = compute_camera_pairs(&pairs, limits_of(&pairs), ratio);

        assert_eq!(segments.len(), 5);
        assert_relative_eq!(segments[3].near, 10f64.powf(0.5), max_relative = 1e-9);
        assert_relative_eq!(segments[4].near, 2.0, max_relative = 1e-12);
        assert_relative_eq!(segments[4].far, 2.5);
    }

    #[test]
    fn test_zero_near_is_clamped_before_planning() {
        let pairs = [DistancePair::new(0.0, 10.0)];
        let segments = compute_camera_pairs(&pairs, DistancePair::new(0.0, 10.0), 0.1);
        assert_eq!(segments, vec![DistancePair::new(1.0, 10.0)]);
    }

    #[test]
    fn test_non_finite_pairs_are_skipped() {
        let pairs = [
            DistancePair::new(1.0, f64::INFINITY),
            DistancePair::new(f64::NAN, 5.0),
            DistancePair::new(20.0, 40.0),
        ];
        let segments = compute_camera_pairs(&pairs, DistancePair::new(1.0, f64::INFINITY), 0.1);
        assert_eq!(segments, vec![DistancePair::new(20.0, 40.0)]);

        let only_bad = [DistancePair::new(1.0, f64::INFINITY)];
        assert!(compute_camera_pairs(&only_bad, only_bad[0], 0.1).is_empty());
    }

    #[test]
    fn test_clamped_pair() {
        let behind = DistancePair::clamped(-1.0, 50.0, 0.001).unwrap();
        assert_relative_eq!(behind.near, 0.05);
        assert_relative_eq!(behind.far, 50.0);
        assert_eq!(DistancePair::clamped(0.0, 5000.0, 0.001), Some(DistancePair::new(1.0, 5000.0)));
        assert_eq!(DistancePair::clamped(1.0, 0.0, 0.001), None);
        assert_eq!(DistancePair::clamped(1.0, f64::NAN, 0.001), None);
        assert_eq!(DistancePair::clamped(f64::INFINITY, 10.0, 0.001), None);
    }

    #[test]
    fn test_empty_limits_start_at_infinity() {
        let limits = DistancePair::empty_limits();
        assert!(limits.near.is_infinite() && limits.near > 0.0);
        assert_eq!(limits.far, 0.0);
    }

    #[test]
    fn test_planning_is_deterministic() {
        let pairs = [
            DistancePair::new(3.0, 40.0),
            DistancePair::new(0.5, 2.0),
            DistancePair::new(200.0, 9000.0),
            DistancePair::new(35.0, 210.0),
        ];
        let limits = limits_of(&pairs);
        let first = compute_camera_pairs(&pairs, limits, 0.02);
        let second = compute_camera_pairs(&pairs, limits, 0.02);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
