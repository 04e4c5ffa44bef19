//! Present-timing ledger
//!
//! Applications tag presents with an ID and a desired display time; the
//! compositor reports what actually happened several frames later. The
//! ledger holds the in-flight correlation records, matches them against
//! the window's frame-timestamp history, derives the earliest time each
//! frame could have been presented, and hands finished records out exactly
//! once.

use ash::vk;
use aurora_window::NativeWindow;

/// Maximum number of timing records kept per swapchain; the oldest record
/// is evicted when a new insert would exceed this.
pub(crate) const MAX_TIMING_INFOS: usize = 10;

/// How many frames back the timestamp search starts. Younger frames may
/// still be in flight, and querying them can force a synchronous round
/// trip to the compositor.
pub(crate) const MIN_NUM_FRAMES_AGO: u32 = 5;

/// Min/max display refresh periods, snapshotted at swapchain creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshCycleDuration {
    /// Shortest refresh period, in nanoseconds
    pub min_refresh_duration: u64,
    /// Longest refresh period, in nanoseconds
    pub max_refresh_duration: u64,
}

/// One in-flight present correlation record.
///
/// The four `timestamp_*` fields hold the compositor's report; 0 means
/// "not yet known". Once all four are known the record is ready and the
/// derived values in `record` can be computed.
#[derive(Debug, Clone, Default)]
pub(crate) struct TimingInfo {
    record: vk::PastPresentationTimingGOOGLE,
    timestamp_desired_present_time: u64,
    timestamp_actual_present_time: u64,
    timestamp_render_complete_time: u64,
    timestamp_composition_latch_time: u64,
}

impl TimingInfo {
    fn new(time: &vk::PresentTimeGOOGLE) -> TimingInfo {
        TimingInfo {
            record: vk::PastPresentationTimingGOOGLE {
                present_id: time.present_id,
                desired_present_time: time.desired_present_time,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn ready(&self) -> bool {
        self.timestamp_desired_present_time != 0
            && self.timestamp_actual_present_time != 0
            && self.timestamp_render_complete_time != 0
            && self.timestamp_composition_latch_time != 0
    }

    /// Compute the reported values from the received timestamps.
    ///
    /// `earliest_present_time` starts at the actual present time and walks
    /// back one refresh cycle at a time for as long as the remaining
    /// margin covers a cycle and the earlier time still trails the
    /// composition latch. Each step also shrinks the reported margin, so
    /// the walk terminates.
    fn calculate(&mut self, refresh_duration: u64) {
        self.record.actual_present_time = self.timestamp_actual_present_time;

        let mut margin = self
            .timestamp_composition_latch_time
            .saturating_sub(self.timestamp_render_complete_time);
        let mut early_time = self.record.actual_present_time;
        if refresh_duration > 0 {
            while margin > refresh_duration
                && early_time - refresh_duration > self.timestamp_composition_latch_time
            {
                early_time -= refresh_duration;
                margin -= refresh_duration;
            }
        }
        self.record.earliest_present_time = early_time;
        self.record.present_margin = margin;
    }

    fn values(&self) -> vk::PastPresentationTimingGOOGLE {
        self.record
    }
}

/// Bounded, present-id-ordered set of in-flight timing records
#[derive(Debug, Default)]
pub(crate) struct TimingLedger {
    entries: Vec<TimingInfo>,
}

impl TimingLedger {
    pub fn new() -> TimingLedger {
        TimingLedger { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Record a present. Present IDs are monotonic in practice, but the
    /// ledger keeps itself sorted rather than assuming it. Overflow evicts
    /// the oldest record.
    pub fn insert(&mut self, time: &vk::PresentTimeGOOGLE) {
        self.entries.push(TimingInfo::new(time));
        self.entries.sort_by_key(|info| info.record.present_id);
        if self.entries.len() > MAX_TIMING_INFOS {
            self.entries.remove(0);
        }
    }

    /// Match pending records against the window's timestamp history and
    /// return how many records are ready to report.
    ///
    /// For each record that is not ready yet, frame timestamps are queried
    /// from `MIN_NUM_FRAMES_AGO` frames back up to the ledger length; the
    /// search for a record stops at the first query failure or at the
    /// query whose desired present time matches the record's.
    pub fn count_ready(&mut self, window: &dyn NativeWindow, refresh_duration: u64) -> u32 {
        let mut num_ready = 0;
        let frames_ago = self.entries.len() as u32;
        for info in &mut self.entries {
            if info.ready() {
                num_ready += 1;
                continue;
            }
            for f in MIN_NUM_FRAMES_AGO..frames_ago {
                let Ok(ts) = window.frame_timestamps(f) else {
                    break;
                };
                if ts.desired_present_time as u64 == info.record.desired_present_time {
                    info.timestamp_desired_present_time = ts.desired_present_time as u64;
                    info.timestamp_actual_present_time = ts.actual_present_time as u64;
                    info.timestamp_render_complete_time = ts.render_complete_time as u64;
                    info.timestamp_composition_latch_time = ts.composition_latch_time as u64;
                    if info.ready() {
                        info.calculate(refresh_duration);
                        num_ready += 1;
                    }
                    break;
                }
            }
        }
        num_ready
    }

    /// Remove and return up to `max` ready records, in ledger order.
    ///
    /// A record is reported at most once; whatever is drained here is gone
    /// from the ledger.
    pub fn drain_ready(&mut self, max: usize) -> Vec<vk::PastPresentationTimingGOOGLE> {
        let mut drained = Vec::new();
        let mut i = 0;
        while i < self.entries.len() && drained.len() < max {
            if self.entries[i].ready() {
                drained.push(self.entries[i].values());
                self.entries.remove(i);
            } else {
                i += 1;
            }
        }
        drained
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "timing_tests.rs"]
mod tests;
