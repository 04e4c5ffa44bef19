use super::*;
use crate::mock_window::MockWindow;
use aurora_window::FrameTimestamps;

fn present_time(id: u32, desired: u64) -> vk::PresentTimeGOOGLE {
    vk::PresentTimeGOOGLE {
        present_id: id,
        desired_present_time: desired,
    }
}

// ============================================================================
// Insert and ordering tests
// ============================================================================

#[test]
fn test_insert_keeps_present_id_order() {
    let mut ledger = TimingLedger::new();
    ledger.insert(&present_time(5, 500));
    ledger.insert(&present_time(1, 100));
    ledger.insert(&present_time(3, 300));

    let ids: Vec<u32> = ledger.entries.iter().map(|e| e.record.present_id).collect();
    assert_eq!(ids, vec![1, 3, 5]);
}

#[test]
fn test_insert_evicts_oldest_beyond_capacity() {
    let mut ledger = TimingLedger::new();
    for id in 0..(MAX_TIMING_INFOS as u32 + 3) {
        ledger.insert(&present_time(id, (id as u64 + 1) * 100));
        assert!(ledger.len() <= MAX_TIMING_INFOS);
    }
    assert_eq!(ledger.len(), MAX_TIMING_INFOS);
    // The three oldest records were evicted
    assert_eq!(ledger.entries[0].record.present_id, 3);
}

#[test]
fn test_clear() {
    let mut ledger = TimingLedger::new();
    ledger.insert(&present_time(1, 100));
    ledger.clear();
    assert_eq!(ledger.len(), 0);
}

// ============================================================================
// Readiness and back-search tests
// ============================================================================

fn timestamps(desired: i64) -> FrameTimestamps {
    FrameTimestamps {
        desired_present_time: desired,
        render_complete_time: 800_000_000,
        composition_latch_time: 900_000_000,
        actual_present_time: 1_000_000_000,
    }
}

#[test]
fn test_count_ready_matches_by_desired_present_time() {
    let window = MockWindow::new();
    let mut ledger = TimingLedger::new();
    for id in 1..=6u32 {
        ledger.insert(&present_time(id, id as u64 * 100));
    }
    // The search starts MIN_NUM_FRAMES_AGO frames back; report the frame
    // whose desired time matches entry 3
    window.set_frame_timestamps(MIN_NUM_FRAMES_AGO, timestamps(300));

    let ready = ledger.count_ready(window.as_ref(), 16_666_666);
    assert_eq!(ready, 1);

    // The matched entry is ready, the others are untouched
    let ready_flags: Vec<bool> = ledger.entries.iter().map(|e| e.ready()).collect();
    assert_eq!(ready_flags, vec![false, false, true, false, false, false]);
}

#[test]
fn test_count_ready_includes_already_ready_entries() {
    let window = MockWindow::new();
    let mut ledger = TimingLedger::new();
    for id in 1..=6u32 {
        ledger.insert(&present_time(id, id as u64 * 100));
    }
    window.set_frame_timestamps(MIN_NUM_FRAMES_AGO, timestamps(300));
    assert_eq!(ledger.count_ready(window.as_ref(), 16_666_666), 1);

    // A second scan with no new history still reports the ready entry
    assert_eq!(ledger.count_ready(window.as_ref(), 16_666_666), 1);
}

#[test]
fn test_count_ready_stops_on_query_failure() {
    // A window with no timestamp history fails every query
    let window = MockWindow::new();
    let mut ledger = TimingLedger::new();
    for id in 1..=8u32 {
        ledger.insert(&present_time(id, id as u64 * 100));
    }
    assert_eq!(ledger.count_ready(window.as_ref(), 16_666_666), 0);
}

#[test]
fn test_small_ledger_queries_nothing() {
    // With fewer entries than MIN_NUM_FRAMES_AGO, the search range is
    // empty and the window is never asked
    let window = MockWindow::new();
    window.set_frame_timestamps(MIN_NUM_FRAMES_AGO, timestamps(100));
    let mut ledger = TimingLedger::new();
    ledger.insert(&present_time(1, 100));

    assert_eq!(ledger.count_ready(window.as_ref(), 16_666_666), 0);
    assert!(!ledger.entries[0].ready());
}

// ============================================================================
// Derived-value computation tests
// ============================================================================

#[test]
fn test_calculate_walks_back_by_refresh_cycles() {
    let rdur = 16_666_666u64;
    let mut info = TimingInfo::new(&present_time(1, 0));
    info.timestamp_desired_present_time = 950_000_000;
    info.timestamp_actual_present_time = 1_000_000_000;
    info.timestamp_render_complete_time = 800_000_000;
    info.timestamp_composition_latch_time = 900_000_000;

    info.calculate(rdur);

    assert_eq!(info.record.actual_present_time, 1_000_000_000);
    // The frame could have been latched for an earlier refresh cycle
    assert!(info.record.earliest_present_time < info.record.actual_present_time);
    // On exit either the margin fits in a cycle or the walk hit the latch
    assert!(
        info.record.present_margin <= rdur
            || info.record.earliest_present_time - rdur
                <= info.timestamp_composition_latch_time
    );
    // earliest = actual - k * rdur for some whole k
    let walked = info.record.actual_present_time - info.record.earliest_present_time;
    assert_eq!(walked % rdur, 0);
    assert_eq!(walked / rdur, 6);
    assert_eq!(info.record.present_margin, 100_000_000 - 6 * rdur);
}

#[test]
fn test_calculate_with_no_slack_keeps_actual_time() {
    let rdur = 16_666_666u64;
    let mut info = TimingInfo::new(&present_time(1, 0));
    info.timestamp_desired_present_time = 950_000_000;
    info.timestamp_actual_present_time = 1_000_000_000;
    info.timestamp_render_complete_time = 890_000_000;
    info.timestamp_composition_latch_time = 900_000_000;

    info.calculate(rdur);

    // margin (10ms) fits within one refresh cycle: no walk-back
    assert_eq!(info.record.earliest_present_time, 1_000_000_000);
    assert_eq!(info.record.present_margin, 10_000_000);
}

#[test]
fn test_calculate_tolerates_inverted_timestamps() {
    let mut info = TimingInfo::new(&present_time(1, 0));
    info.timestamp_desired_present_time = 1;
    info.timestamp_actual_present_time = 2;
    info.timestamp_render_complete_time = 5;
    info.timestamp_composition_latch_time = 3;

    info.calculate(16_666_666);
    assert_eq!(info.record.present_margin, 0);
    assert_eq!(info.record.earliest_present_time, 2);
}

// ============================================================================
// Drain tests
// ============================================================================

fn ready_ledger(ids: &[u32]) -> TimingLedger {
    let mut ledger = TimingLedger::new();
    for &id in ids {
        ledger.insert(&present_time(id, id as u64 * 100));
    }
    for entry in &mut ledger.entries {
        entry.timestamp_desired_present_time = entry.record.desired_present_time;
        entry.timestamp_actual_present_time = 1_000_000_000;
        entry.timestamp_render_complete_time = 800_000_000;
        entry.timestamp_composition_latch_time = 900_000_000;
        entry.calculate(16_666_666);
    }
    ledger
}

#[test]
fn test_drain_reports_each_entry_exactly_once() {
    let mut ledger = ready_ledger(&[1, 2, 3]);

    let first = ledger.drain_ready(10);
    assert_eq!(first.len(), 3);
    assert_eq!(ledger.len(), 0);

    let second = ledger.drain_ready(10);
    assert!(second.is_empty());
}

#[test]
fn test_drain_respects_capacity_and_order() {
    let mut ledger = ready_ledger(&[4, 2, 9]);

    let drained = ledger.drain_ready(2);
    let ids: Vec<u32> = drained.iter().map(|t| t.present_id).collect();
    assert_eq!(ids, vec![2, 4]);

    // The undrained record is still there for the next call
    let rest = ledger.drain_ready(2);
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].present_id, 9);
}

#[test]
fn test_drain_skips_pending_entries() {
    let mut ledger = ready_ledger(&[1, 3]);
    ledger.insert(&present_time(2, 200)); // not ready

    let drained = ledger.drain_ready(10);
    let ids: Vec<u32> = drained.iter().map(|t| t.present_id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(ledger.len(), 1);
}
