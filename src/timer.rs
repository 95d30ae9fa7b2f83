//! Performance measurement tools.

use std::{
    fmt,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::filter::{Ema, EmaState, Filter};

const EMA_ALPHA: f32 = 0.3;

/// Measures how long an operation takes, smoothed over time.
///
/// Displaying the timer with `{}` prints the smoothed duration and the number of measurements
/// since the last time it was displayed, then starts a fresh measurement window.
pub struct Timer {
    name: &'static str,
    ema: Ema,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    ema: EmaState,
    avg_secs: f32,
    count: usize,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ema: Ema::new(EMA_ALPHA),
            state: Mutex::new(State::default()),
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation; the measurement ends when the returned guard is dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn record(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|poison| poison.into_inner());
        let state = &mut *state;
        state.avg_secs = self.ema.filter(&mut state.ema, duration.as_secs_f32());
        state.count += 1;
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut state = self.state.lock().unwrap_or_else(|poison| poison.into_inner());
        let State {
            avg_secs, count, ..
        } = std::mem::take(&mut *state);

        write!(f, "{}: {count}x{:.01}ms", self.name, avg_secs * 1000.0)
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Logs frames per second, optionally followed by a list of [`Timer`]s.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Counts a frame and, once a second has passed, logs the frame rate followed by `extra`.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        if self.start.elapsed() < Duration::from_secs(1) {
            return;
        }

        let extra = extra.into_iter().map(|d| d.to_string()).collect::<Vec<_>>();
        if extra.is_empty() {
            log::debug!("{}: {} FPS", self.name, self.frames);
        } else {
            log::debug!("{}: {} FPS ({})", self.name, self.frames, extra.join(", "));
        }

        self.frames = 0;
        self.start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_resets_window() {
        let timer = Timer::new("work");
        timer.time(|| ());
        timer.time(|| ());
        let shown = timer.to_string();
        assert!(shown.starts_with("work: 2x"), "{shown}");
        assert!(timer.to_string().starts_with("work: 0x"));
    }

    #[test]
    fn time_returns_closure_value() {
        let timer = Timer::new("value");
        assert_eq!(timer.time(|| 42), 42);
    }
}
