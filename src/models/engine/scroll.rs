//! Scroll-velocity integration.
//!
//! Musical time is mapped to a scroll-space position by integrating the
//! piecewise-constant SV multipliers. With a single multiplier of 1 (or no SVs
//! at all) position equals time, so positions are still expressed in ms.

use super::playfield::{PlayfieldLayout, ScreenPoint, Viewport};
use crate::models::chart::timing_point::{self, TimingPoint};
use crate::models::chart::{Chart, ScrollVelocity};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Marker {
    time: f64,
    /// Scroll position at `time`.
    position: f64,
    multiplier: f64,
}

impl Marker {
    fn position_at(&self, time: f64) -> f64 {
        self.position + (time - self.time) * self.multiplier
    }

    fn time_at(&self, position: f64) -> f64 {
        self.time + (position - self.position) / self.multiplier
    }
}

/// Maps musical time to scroll position and back.
///
/// Times before the first SV use the first multiplier, times after the last
/// SV use the last one. Negative multipliers are supported: the position
/// function then stops being monotonic and [`ScrollResolver::time_at_position`]
/// returns the earliest time that reaches the requested position.
#[derive(Debug, Clone, Default)]
pub struct ScrollResolver {
    markers: Vec<Marker>,
    /// All multipliers are strictly positive.
    monotonic: bool,
}

impl ScrollResolver {
    pub fn new(velocities: &[ScrollVelocity]) -> Self {
        let mut sorted = velocities.to_vec();
        sorted.sort_by(|a, b| a.time.total_cmp(&b.time));

        let mut markers: Vec<Marker> = Vec::with_capacity(sorted.len());
        for sv in sorted {
            let multiplier = if sv.multiplier.is_finite() {
                sv.multiplier
            } else {
                log::warn!("SCROLL: Ignoring non-finite multiplier at {}ms", sv.time);
                1.0
            };

            let position = match markers.last() {
                Some(prev) => prev.position_at(sv.time),
                None => sv.time,
            };

            markers.push(Marker {
                time: sv.time,
                position,
                multiplier,
            });
        }

        let monotonic = markers.iter().all(|m| m.multiplier > 0.0);
        if !monotonic {
            log::debug!("SCROLL: Chart has zero or negative scroll velocities");
        }

        Self { markers, monotonic }
    }

    pub fn from_chart(chart: &Chart) -> Self {
        Self::new(&chart.scroll_velocities)
    }

    /// Returns `true` if position strictly increases with time.
    pub fn is_monotonic(&self) -> bool {
        self.monotonic
    }

    /// Scroll position of `time`.
    pub fn position_from_time(&self, time: f64) -> f64 {
        if self.markers.is_empty() {
            return time;
        }

        let idx = self.markers.partition_point(|m| m.time <= time);
        self.markers[idx.saturating_sub(1)].position_at(time)
    }

    /// Inverse of [`ScrollResolver::position_from_time`].
    pub fn time_at_position(&self, position: f64) -> f64 {
        if self.markers.is_empty() {
            return position;
        }

        if self.monotonic {
            let idx = self.markers.partition_point(|m| m.position <= position);
            return self.markers[idx.saturating_sub(1)].time_at(position);
        }

        self.earliest_time_at(position)
    }

    fn earliest_time_at(&self, position: f64) -> f64 {
        let first = self.markers[0];

        // Extrapolated range before the first SV.
        if let Some(t) = solve_in_range(&first, f64::NEG_INFINITY, first.time, position) {
            return t;
        }

        for (i, marker) in self.markers.iter().enumerate() {
            let end = self
                .markers
                .get(i + 1)
                .map_or(f64::INFINITY, |next| next.time);

            if let Some(t) = solve_in_range(marker, marker.time, end, position) {
                return t;
            }
        }

        // Unreachable position: use the closest SV boundary.
        self.markers
            .iter()
            .min_by(|a, b| {
                (a.position - position)
                    .abs()
                    .total_cmp(&(b.position - position).abs())
            })
            .map_or(position, |m| m.time)
    }

    /// Builds the frame viewport for clock time `time`.
    pub fn viewport(
        &self,
        layout: PlayfieldLayout,
        time: f64,
        rate: f64,
        scroll_speed: f64,
    ) -> Viewport {
        Viewport {
            layout,
            current_time: time,
            current_position: self.position_from_time(time),
            rate,
            scroll_speed,
        }
    }

    /// Time under a screen point.
    pub fn time_at_screen_space_position(&self, point: ScreenPoint, viewport: &Viewport) -> f64 {
        self.time_at_position(viewport.position_at_y(point.y))
    }

    /// Lane under a screen point, clamped to `[0, lane_count)`.
    pub fn lane_at_screen_space_position(
        &self,
        point: ScreenPoint,
        viewport: &Viewport,
        lane_count: usize,
    ) -> usize {
        viewport.layout.lane_at_x(point.x, lane_count)
    }
}

/// Solves `marker.position_at(t) == position` for `t` in `[start, end)`.
fn solve_in_range(marker: &Marker, start: f64, end: f64, position: f64) -> Option<f64> {
    if marker.multiplier == 0.0 {
        if position == marker.position {
            return Some(if start.is_finite() { start } else { marker.time });
        }
        return None;
    }

    let t = marker.time_at(position);
    (t >= start && t < end).then_some(t)
}

/// Quantizes `time` to the beat grid of the timing point active at `time`,
/// split into `divisor` steps per beat.
///
/// A result that reaches the next timing point is pinned to that point, which
/// keeps the operation idempotent across section boundaries.
pub fn snap_time(time: f64, points: &[TimingPoint], divisor: u32) -> f64 {
    let Some(idx) = timing_point::index_at(points, time) else {
        return time;
    };

    let point = &points[idx];
    let step = point.ms_per_beat / divisor.max(1) as f64;
    if !step.is_finite() || step <= 0.0 {
        return time;
    }

    let steps = ((time - point.time) / step).round();
    let snapped = point.time + steps * step;

    match points.get(idx + 1) {
        Some(next) if snapped >= next.time => next.time,
        _ => snapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::engine::playfield::PlayfieldLayout;
    use proptest::prelude::*;

    fn sv(time: f64, multiplier: f64) -> ScrollVelocity {
        ScrollVelocity::new(time, multiplier)
    }

    #[test]
    fn test_identity_without_svs() {
        let resolver = ScrollResolver::new(&[]);
        assert_eq!(resolver.position_from_time(1234.5), 1234.5);
        assert_eq!(resolver.time_at_position(-20.0), -20.0);
    }

    #[test]
    fn test_integrates_segments() {
        let resolver = ScrollResolver::new(&[sv(0.0, 1.0), sv(1000.0, 2.0), sv(2000.0, 0.5)]);

        assert_eq!(resolver.position_from_time(500.0), 500.0);
        assert_eq!(resolver.position_from_time(1500.0), 2000.0);
        assert_eq!(resolver.position_from_time(2000.0), 3000.0);
        assert_eq!(resolver.position_from_time(4000.0), 4000.0);
    }

    #[test]
    fn test_extrapolates_outside_known_range() {
        let resolver = ScrollResolver::new(&[sv(1000.0, 2.0), sv(2000.0, 3.0)]);

        // before the first SV: first multiplier
        assert_eq!(resolver.position_from_time(500.0), 0.0);
        // after the last SV: last multiplier
        assert_eq!(resolver.position_from_time(3000.0), 6000.0);
        assert_eq!(resolver.time_at_position(0.0), 500.0);
    }

    #[test]
    fn test_zero_length_segment_uses_later_multiplier() {
        let resolver = ScrollResolver::new(&[sv(0.0, 1.0), sv(1000.0, 5.0), sv(1000.0, 2.0)]);

        assert_eq!(resolver.position_from_time(1000.0), 1000.0);
        assert_eq!(resolver.position_from_time(1500.0), 2000.0);
    }

    #[test]
    fn test_negative_multiplier_reverses_scroll() {
        let resolver = ScrollResolver::new(&[sv(0.0, 1.0), sv(1000.0, -1.0), sv(1500.0, 1.0)]);
        assert!(!resolver.is_monotonic());

        assert_eq!(resolver.position_from_time(1000.0), 1000.0);
        assert_eq!(resolver.position_from_time(1500.0), 500.0);
        assert_eq!(resolver.position_from_time(2500.0), 1500.0);

        // 750 is reached three times; the earliest wins
        assert_eq!(resolver.time_at_position(750.0), 750.0);
        // only reachable after the reversal
        assert_eq!(resolver.time_at_position(1200.0), 2200.0);
    }

    #[test]
    fn test_zero_multiplier_resolves_to_segment_start() {
        let resolver = ScrollResolver::new(&[sv(0.0, 1.0), sv(1000.0, 0.0), sv(2000.0, 1.0)]);

        assert_eq!(resolver.position_from_time(1500.0), 1000.0);
        assert_eq!(resolver.time_at_position(1000.0), 1000.0);
        assert_eq!(resolver.time_at_position(1100.0), 2100.0);
    }

    #[test]
    fn test_unreachable_position_uses_closest_boundary() {
        let resolver = ScrollResolver::new(&[sv(0.0, 0.0), sv(1000.0, 1.0), sv(2000.0, 0.0)]);

        assert_eq!(resolver.time_at_position(-500.0), 0.0);
        assert_eq!(resolver.time_at_position(9000.0), 2000.0);
    }

    #[test]
    fn test_screen_space_queries() {
        let resolver = ScrollResolver::new(&[sv(0.0, 1.0), sv(1000.0, 2.0)]);
        let viewport = Viewport {
            layout: PlayfieldLayout::default(),
            current_time: 1000.0,
            current_position: resolver.position_from_time(1000.0),
            rate: 1.0,
            scroll_speed: 2.0,
        };

        let target = 1400.0;
        let y = viewport.y_for_position(resolver.position_from_time(target));
        let point = ScreenPoint::new(viewport.layout.lane_center_x(1, 4), y);

        let time = resolver.time_at_screen_space_position(point, &viewport);
        assert!((time - target).abs() < 1e-6);
        assert_eq!(resolver.lane_at_screen_space_position(point, &viewport, 4), 1);
        assert_eq!(
            resolver.lane_at_screen_space_position(ScreenPoint::new(-1e6, y), &viewport, 4),
            0
        );
    }

    #[test]
    fn test_snap_time() {
        let points = vec![TimingPoint::new(0.0, 500.0, 4), TimingPoint::new(1100.0, 300.0, 4)];

        assert_eq!(snap_time(130.0, &points, 4), 125.0);
        assert_eq!(snap_time(-130.0, &points, 4), -125.0);
        // would round to 1125, pinned to the next section start
        assert_eq!(snap_time(1090.0, &points, 4), 1100.0);
        assert_eq!(snap_time(1180.0, &points, 4), 1175.0);
        assert_eq!(snap_time(42.0, &[], 4), 42.0);
    }

    proptest! {
        #[test]
        fn prop_inverse_for_positive_multipliers(
            changes in prop::collection::vec((0.0f64..60_000.0, 0.05f64..8.0), 0..12),
            time in -5_000.0f64..70_000.0,
        ) {
            let svs: Vec<ScrollVelocity> = changes.iter().map(|&(t, m)| sv(t, m)).collect();
            let resolver = ScrollResolver::new(&svs);

            let back = resolver.time_at_position(resolver.position_from_time(time));
            prop_assert!((back - time).abs() < 1e-6, "{} -> {}", time, back);
        }

        #[test]
        fn prop_inverse_is_a_preimage_with_negative_multipliers(
            changes in prop::collection::vec((0.0f64..60_000.0, 0.1f64..4.0, any::<bool>()), 1..10),
            time in 0.0f64..60_000.0,
        ) {
            let svs: Vec<ScrollVelocity> = changes
                .iter()
                .map(|&(t, m, reverse)| sv(t, if reverse { -m } else { m }))
                .collect();
            let resolver = ScrollResolver::new(&svs);

            let position = resolver.position_from_time(time);
            let back = resolver.time_at_position(position);
            prop_assert!(back <= time + 1e-4);
            prop_assert!((resolver.position_from_time(back) - position).abs() < 1e-4);
        }

        #[test]
        fn prop_snap_is_idempotent(
            time in -10_000.0f64..120_000.0,
            ms_per_beat in 100.0f64..1500.0,
            second_start in 1.0f64..60_000.0,
            divisor in 1u32..16,
        ) {
            let points = vec![
                TimingPoint::new(0.0, ms_per_beat, 4),
                TimingPoint::new(second_start, ms_per_beat * 0.75, 3),
            ];

            let once = snap_time(time, &points, divisor);
            prop_assert_eq!(snap_time(once, &points, divisor), once);
        }
    }
}
