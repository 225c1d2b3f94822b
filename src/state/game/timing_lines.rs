//! Beat-line scheduling.
//!
//! Lines are generated once per chart and kept sorted by scroll position.
//! Each frame the active window `[head, tail)` follows the viewport: `tail`
//! admits lines entering the lookahead, then `head` drops lines that scrolled
//! past the bottom of the viewport. Under reverse scroll both pointers walk
//! back the same way.

use crate::models::chart::Chart;
use crate::models::engine::playfield::Viewport;
use crate::models::engine::scroll::ScrollResolver;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingLine {
    /// Musical time of the line.
    pub time: f64,
    /// Scroll position of the line.
    pub scroll_velocity_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Scheduled,
    Active,
    Expired,
}

/// Generates the beat lines of `chart`, sorted by scroll position.
///
/// A timing point emits one line per measure from its own time up to the next
/// point (exclusive) or, for the last point, up to the chart end (inclusive).
pub fn create_lines(chart: &Chart, resolver: &ScrollResolver) -> Vec<TimingLine> {
    let end_time = chart.end_time();
    let mut lines = Vec::new();

    for (i, point) in chart.timing_points.iter().enumerate() {
        if !point.shows_lines() {
            continue;
        }

        let increase = point.measure_length();
        if !increase.is_finite() || increase <= 0.0 {
            continue;
        }

        let next = chart.timing_points.get(i + 1).map(|p| p.time);
        let mut k = 0u32;
        loop {
            let time = point.time + k as f64 * increase;
            let in_segment = match next {
                Some(next_time) => time < next_time,
                None => time <= end_time,
            };
            if !in_segment {
                break;
            }

            lines.push(TimingLine {
                time,
                scroll_velocity_time: resolver.position_from_time(time),
            });
            k += 1;
        }
    }

    lines.sort_by(|a, b| a.scroll_velocity_time.total_cmp(&b.scroll_velocity_time));
    lines
}

#[derive(Debug, Default)]
pub struct TimingLineManager {
    lines: Vec<TimingLine>,
    /// First line not yet expired.
    head: usize,
    /// First line not yet admitted.
    tail: usize,
    last_viewport: Option<Viewport>,
    seek_generation: u64,
    visible: bool,
}

impl TimingLineManager {
    pub fn new(chart: &Chart, resolver: &ScrollResolver, visible: bool) -> Self {
        let lines = create_lines(chart, resolver);
        log::debug!("LINES: Created {} timing lines", lines.len());
        Self {
            lines,
            visible,
            ..Self::default()
        }
    }

    /// Replaces the lines after the chart's timing or length changed.
    pub fn reload(&mut self, chart: &Chart, resolver: &ScrollResolver) {
        self.lines = create_lines(chart, resolver);
        match self.last_viewport {
            Some(viewport) => self.rebuild(&viewport),
            None => {
                self.head = 0;
                self.tail = 0;
            }
        }
    }

    /// Moves the active window to `viewport`.
    ///
    /// Only the fronts of the window are touched, in whichever direction the
    /// viewport moved. A seek generation the manager has not seen rebuilds it.
    pub fn update(&mut self, viewport: &Viewport, seek_generation: u64) {
        if self.last_viewport.is_none() || seek_generation != self.seek_generation {
            self.rebuild(viewport);
            self.seek_generation = seek_generation;
            return;
        }

        let horizon = viewport.horizon();
        while self.tail < self.lines.len()
            && self.lines[self.tail].scroll_velocity_time <= horizon
        {
            self.tail += 1;
        }
        while self.tail > 0 && self.lines[self.tail - 1].scroll_velocity_time > horizon {
            self.tail -= 1;
        }

        self.head = self.head.min(self.tail);
        while self.head > 0
            && !viewport.is_below_viewport(self.lines[self.head - 1].scroll_velocity_time)
        {
            self.head -= 1;
        }
        while self.head < self.tail
            && viewport.is_below_viewport(self.lines[self.head].scroll_velocity_time)
        {
            self.head += 1;
        }

        self.last_viewport = Some(*viewport);
    }

    /// Recomputes the active window from scratch.
    pub fn rebuild(&mut self, viewport: &Viewport) {
        let horizon = viewport.horizon();
        self.tail = self
            .lines
            .partition_point(|l| l.scroll_velocity_time <= horizon);
        self.head = self
            .lines
            .partition_point(|l| viewport.is_below_viewport(l.scroll_velocity_time))
            .min(self.tail);
        self.last_viewport = Some(*viewport);
    }

    pub fn lines(&self) -> &[TimingLine] {
        &self.lines
    }

    /// Lines currently admitted, in scroll order.
    pub fn active(&self) -> &[TimingLine] {
        &self.lines[self.head..self.tail]
    }

    /// State of the line at `index` for the last viewport. Under reverse
    /// scroll an expired line can become active again.
    pub fn line_state(&self, index: usize) -> LineState {
        if index < self.head {
            LineState::Expired
        } else if index < self.tail {
            LineState::Active
        } else {
            LineState::Scheduled
        }
    }

    /// Whether lines should be drawn at all.
    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}
