//! Drag-move of selected hit objects.

use crate::models::chart::{Chart, HitObjectId};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Origin {
    id: HitObjectId,
    time: f64,
    lane: usize,
}

/// Positions of the dragged objects when the drag started.
///
/// Every frame the pointer is resolved to a snapped time and a lane; the
/// difference to the anchor's origin is applied to every dragged object.
#[derive(Debug, Clone)]
pub struct Drag {
    anchor: Origin,
    objects: Vec<Origin>,
}

impl Drag {
    /// Starts dragging `selection` by `anchor`. Ids missing from the chart
    /// are ignored; returns `None` if the anchor itself is missing.
    pub fn begin(chart: &Chart, anchor: HitObjectId, selection: &[HitObjectId]) -> Option<Self> {
        let origin_of = |id: HitObjectId| {
            chart.get(id).map(|o| Origin {
                id,
                time: o.time,
                lane: o.lane,
            })
        };

        let anchor = origin_of(anchor)?;
        let mut objects: Vec<Origin> = selection.iter().filter_map(|id| origin_of(*id)).collect();
        if !objects.iter().any(|o| o.id == anchor.id) {
            objects.push(anchor);
        }

        Some(Self { anchor, objects })
    }

    pub fn anchor(&self) -> HitObjectId {
        self.anchor.id
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Where every dragged object goes when the anchor is dropped at
    /// (`time`, `lane`).
    ///
    /// A lane change that would push any object out of `[0, lane_count)` is
    /// dropped; the time change still applies.
    pub fn targets(&self, time: f64, lane: usize, lane_count: usize) -> Vec<(HitObjectId, f64, usize)> {
        let time_delta = time - self.anchor.time;
        let mut lane_delta = lane as i64 - self.anchor.lane as i64;

        let min_lane = self.objects.iter().map(|o| o.lane).min().unwrap_or(0) as i64;
        let max_lane = self.objects.iter().map(|o| o.lane).max().unwrap_or(0) as i64;
        if min_lane + lane_delta < 0 || max_lane + lane_delta >= lane_count as i64 {
            lane_delta = 0;
        }

        self.objects
            .iter()
            .map(|o| {
                let lane = (o.lane as i64 + lane_delta) as usize;
                (o.id, o.time + time_delta, lane)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chart::HitObjectInfo;

    #[test]
    fn test_targets_apply_both_deltas() {
        let mut chart = Chart::new(4);
        let a = chart.add_hit_object(HitObjectInfo::tap(1000.0, 1));
        let b = chart.add_hit_object(HitObjectInfo::tap(1500.0, 2));

        let drag = Drag::begin(&chart, a, &[a, b]).unwrap();
        let targets = drag.targets(1250.0, 2, 4);

        assert_eq!(targets, vec![(a, 1250.0, 2), (b, 1750.0, 3)]);
    }

    #[test]
    fn test_lane_guard_keeps_time_delta() {
        let mut chart = Chart::new(4);
        let a = chart.add_hit_object(HitObjectInfo::tap(1000.0, 0));
        let b = chart.add_hit_object(HitObjectInfo::tap(1000.0, 3));

        let drag = Drag::begin(&chart, a, &[a, b]).unwrap();
        let targets = drag.targets(2000.0, 1, 4);

        assert_eq!(targets, vec![(a, 2000.0, 0), (b, 2000.0, 3)]);
    }

    #[test]
    fn test_anchor_always_dragged() {
        let mut chart = Chart::new(4);
        let a = chart.add_hit_object(HitObjectInfo::tap(1000.0, 0));

        let drag = Drag::begin(&chart, a, &[]).unwrap();
        assert_eq!(drag.len(), 1);
        assert!(Drag::begin(&chart, HitObjectId(99), &[a]).is_none());
    }
}
