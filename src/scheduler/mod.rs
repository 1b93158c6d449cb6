//! Capture Scheduler
//!
//! Decides, per window and per tick, whether a capture request is due and at
//! which priority. Capturing every window every tick is wasteful, so each
//! scheduled window carries its own cadence accumulator and timing mode.

use crate::engine::{CaptureMode, CapturePriority, WindowId};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// When a due capture is actually issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureTiming {
    /// On every tick the cadence allows.
    #[default]
    EveryFrame,
    /// On the first "visible this frame" signal after the cadence allows.
    OnlyWhenVisible,
    /// Never automatically; the caller requests captures itself.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Interval {
    EveryTick,
    Every(f32),
    Never,
}

/// Frame-rate accumulator.
///
/// Time is accumulated every tick; once it reaches one interval a request
/// becomes due and whole intervals are subtracted, so slow ticks never
/// produce a burst of catch-up requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Cadence {
    interval: Interval,
    accumulator: f32,
}

impl Cadence {
    /// A negative frame rate means "every tick"; zero or non-finite rates
    /// never fire.
    pub fn new(frame_rate: f32) -> Self {
        let interval = if !frame_rate.is_finite() || frame_rate == 0.0 {
            Interval::Never
        } else if frame_rate < 0.0 {
            Interval::EveryTick
        } else {
            Interval::Every(1.0 / frame_rate)
        };
        Self {
            interval,
            accumulator: 0.0,
        }
    }

    /// Advance by `dt` seconds; returns whether a request is due this tick.
    pub fn advance(&mut self, dt: f32) -> bool {
        let interval = match self.interval {
            Interval::EveryTick => return true,
            Interval::Never => return false,
            Interval::Every(interval) => interval,
        };

        self.accumulator += dt.max(0.0);
        if self.accumulator < interval {
            return false;
        }
        self.accumulator = (self.accumulator % interval).max(0.0);
        true
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }
}

/// Per-window capture configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSchedule {
    pub frame_rate: f32,
    pub timing: CaptureTiming,
    /// `Auto` applies [`resolve_priority`] at issue time.
    pub priority: CapturePriority,
    pub mode: CaptureMode,
    pub draw_cursor: bool,
}

impl Default for CaptureSchedule {
    fn default() -> Self {
        Self {
            frame_rate: 10.0,
            timing: CaptureTiming::EveryFrame,
            priority: CapturePriority::Auto,
            mode: CaptureMode::Auto,
            draw_cursor: true,
        }
    }
}

/// A request the scheduler wants issued this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DueCapture {
    pub id: WindowId,
    pub priority: CapturePriority,
    pub mode: CaptureMode,
    pub draw_cursor: bool,
}

#[derive(Debug)]
struct ScheduleEntry {
    schedule: CaptureSchedule,
    cadence: Cadence,
    /// Cadence fired but the request waits for a visibility signal.
    awaiting_visibility: bool,
}

impl ScheduleEntry {
    fn due(&self, id: WindowId) -> DueCapture {
        DueCapture {
            id,
            priority: self.schedule.priority,
            mode: self.schedule.mode,
            draw_cursor: self.schedule.draw_cursor,
        }
    }
}

#[derive(Debug, Default)]
pub struct CaptureScheduler {
    entries: BTreeMap<WindowId, ScheduleEntry>,
}

impl CaptureScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) periodic captures of `id`.
    pub fn schedule(&mut self, id: WindowId, schedule: CaptureSchedule) {
        debug!(
            "Scheduling window {} at {} fps ({:?})",
            id, schedule.frame_rate, schedule.timing
        );
        self.entries.insert(
            id,
            ScheduleEntry {
                schedule,
                cadence: Cadence::new(schedule.frame_rate),
                awaiting_visibility: false,
            },
        );
    }

    /// Stop periodic captures of `id`. Returns `false` if it was not scheduled.
    pub fn unschedule(&mut self, id: WindowId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn is_scheduled(&self, id: WindowId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn schedule_of(&self, id: WindowId) -> Option<&CaptureSchedule> {
        self.entries.get(&id).map(|entry| &entry.schedule)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance every cadence by `dt` and return the requests due now, in
    /// ascending id order.
    pub fn advance(&mut self, dt: f32) -> Vec<DueCapture> {
        let mut due = Vec::new();
        for (id, entry) in self.entries.iter_mut() {
            if entry.schedule.timing == CaptureTiming::Manual {
                continue;
            }
            if !entry.cadence.advance(dt) {
                continue;
            }
            match entry.schedule.timing {
                CaptureTiming::EveryFrame => due.push(entry.due(*id)),
                CaptureTiming::OnlyWhenVisible => entry.awaiting_visibility = true,
                CaptureTiming::Manual => {}
            }
        }
        due
    }

    /// The presentation layer is about to sample `id`. Returns the request
    /// to issue if the cadence had fired since the last visible frame.
    pub fn mark_visible(&mut self, id: WindowId) -> Option<DueCapture> {
        let entry = self.entries.get_mut(&id)?;
        if !entry.awaiting_visibility {
            return None;
        }
        entry.awaiting_visibility = false;
        Some(entry.due(id))
    }
}

/// Priority for a request: an explicit priority wins; otherwise the window
/// under the cursor is `High`, near-top windows (`z_order < middle_max_z`)
/// are `Middle` and everything else is `Low`.
pub fn resolve_priority(
    requested: CapturePriority,
    under_cursor: bool,
    z_order: i32,
    middle_max_z: i32,
) -> CapturePriority {
    if requested != CapturePriority::Auto {
        return requested;
    }
    if under_cursor {
        CapturePriority::High
    } else if z_order < middle_max_z {
        CapturePriority::Middle
    } else {
        CapturePriority::Low
    }
}

#[cfg(test)]
mod tests;
