use chrono::{DateTime, TimeDelta, Timelike, Utc};
use spin_sleep::SpinSleeper;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Capture instants of the window that contains `now`.
///
/// Windows are `period_minutes` long and aligned to the hour. Ticks start at
/// the window start and are spaced by `interval`; ticks before `now` (floored
/// to seconds) are dropped, so joining a window late only loses the past part.
///
/// ```text
/// (13:00:00.75, 2 min, 30 s) => 13:00:00, 13:00:30, 13:01:00, 13:01:30
/// (13:00:01.00, 2 min, 30 s) =>           13:00:30, 13:01:00, 13:01:30
/// ```
pub fn ticks_between(
    now: DateTime<Utc>,
    period_minutes: u32,
    interval: TimeDelta,
) -> Vec<DateTime<Utc>> {
    if interval <= TimeDelta::zero() {
        return vec![];
    }

    let (start, end) = window_bounds(now, period_minutes);
    let earliest = floor_second(now);

    let mut ticks = vec![];
    let mut tick = start;
    while tick < end {
        if tick >= earliest {
            ticks.push(tick);
        }
        tick += interval;
    }

    ticks
}

/// `[start, end)` of the period containing `now`.
pub fn window_bounds(now: DateTime<Utc>, period_minutes: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let period = period_minutes.max(1);
    let start = floor_second(now)
        - TimeDelta::minutes((now.minute() % period) as i64)
        - TimeDelta::seconds(now.second() as i64);

    (start, start + TimeDelta::minutes(period as i64))
}

pub fn floor_second(t: DateTime<Utc>) -> DateTime<Utc> {
    t - TimeDelta::nanoseconds(t.nanosecond() as i64)
}

/// One recording window: the ticks still ahead and how they play back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureWindow {
    pub ticks: Vec<DateTime<Utc>>,
    pub interval: TimeDelta,
    pub fps: u32,
    pub window_end: DateTime<Utc>,
}

impl CaptureWindow {
    pub fn compute(now: DateTime<Utc>, period_minutes: u32, interval: TimeDelta, fps: u32) -> Self {
        Self {
            ticks: ticks_between(now, period_minutes, interval),
            interval,
            fps,
            window_end: window_bounds(now, period_minutes).1,
        }
    }

    pub fn from_ticks(
        ticks: Vec<DateTime<Utc>>,
        interval: TimeDelta,
        fps: u32,
        window_end: DateTime<Utc>,
    ) -> Self {
        Self {
            ticks,
            interval,
            fps,
            window_end,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn first_tick(&self) -> Option<DateTime<Utc>> {
        self.ticks.first().copied()
    }

    /// Where the next window's first capture lands.
    pub fn next_tick(&self) -> DateTime<Utc> {
        match self.ticks.last() {
            Some(last) => *last + self.interval,
            None => self.window_end,
        }
    }
}

/// Block until the wall clock reaches `deadline`. Returns `false` when cancelled first.
pub fn sleep_until(deadline: DateTime<Utc>, cancel_sig: &AtomicBool) -> bool {
    let sleeper = SpinSleeper::default();

    loop {
        if cancel_sig.load(Ordering::Relaxed) {
            return false;
        }

        // negative when the deadline already passed
        let Ok(remaining) = (deadline - Utc::now()).to_std() else {
            return true;
        };

        if remaining.is_zero() {
            return true;
        }

        sleeper.sleep(remaining.min(CANCEL_POLL_INTERVAL));
    }
}
