//! Background timer loop that drives a light through its phases.
//!
//! The loop wakes every `tick`, toggles the phase once the current randomized
//! duration has elapsed, and publishes the current phase into the handoff on
//! every iteration. Waiters therefore see a fresh value at most one tick after
//! a toggle.

use std::any::Any;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::config::LightConfig;
use crate::light::LightState;
use crate::{slog, slog_debug, slog_error, slog_trace};

/// Randomized deadline between two toggles.
///
/// Kept free of threads and clocks so the toggle rule can be driven with
/// synthetic instants.
#[derive(Debug)]
pub struct CycleSchedule {
    rng: StdRng,
    range: RangeInclusive<u64>,
    duration: Duration,
    started: Instant,
}

impl CycleSchedule {
    pub fn new(config: &LightConfig, now: Instant) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut schedule = Self {
            rng,
            range: config.min_cycle_ms..=config.max_cycle_ms,
            duration: Duration::ZERO,
            started: now,
        };
        schedule.redraw();
        schedule
    }

    fn redraw(&mut self) {
        self.duration = Duration::from_millis(self.rng.random_range(self.range.clone()));
    }

    /// The duration currently in force.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Returns `true` when the phase must toggle at `now`.
    ///
    /// On a toggle the start timestamp moves to `now`. A fresh duration is
    /// drawn on every call; only the draw preceding the next check matters.
    pub fn advance(&mut self, now: Instant) -> bool {
        let due = self.elapsed_at(now) > self.duration;
        if due {
            self.started = now;
        }
        self.redraw();
        due
    }
}

/// Marks the light as finished when the timer thread exits, however it exits.
///
/// On unwind the light becomes `Failed`; otherwise `Stopped`. Either way the
/// handoff is closed so no waiter blocks on a producer that is gone.
pub(crate) struct ExitGuard {
    state: Arc<LightState>,
}

impl ExitGuard {
    pub(crate) fn new(state: Arc<LightState>) -> Self {
        Self { state }
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            slog_error!("Timer thread panicked; light marked failed");
            self.state.mark_failed();
        } else {
            slog!("Timer thread stopped");
            self.state.mark_stopped();
        }
        self.state.channel.close();
    }
}

pub struct CycleTimer {
    state: Arc<LightState>,
    schedule: CycleSchedule,
    tick: Duration,
    cancel: CancellationToken,
}

impl CycleTimer {
    pub(crate) fn new(
        state: Arc<LightState>,
        config: &LightConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            schedule: CycleSchedule::new(config, Instant::now()),
            state,
            tick: config.tick(),
            cancel,
        }
    }

    /// Run until cancelled.
    pub fn run(mut self) {
        let _guard = ExitGuard::new(self.state.clone());
        slog!(
            "Timer started: first duration={:?} tick={:?}",
            self.schedule.duration(),
            self.tick
        );

        while !self.cancel.is_cancelled() {
            thread::sleep(self.tick);

            let now = Instant::now();
            if self.schedule.advance(now) {
                let phase = self.state.phase.toggle();
                self.state.record_toggle();
                slog_debug!(
                    "Phase -> {} (next duration {:?})",
                    phase,
                    self.schedule.duration()
                );
            }

            let phase = self.state.phase.load();
            self.state.channel.send(phase);
            self.state.beat();
            slog_trace!(
                "tick phase={} elapsed={:?}",
                phase,
                self.schedule.elapsed_at(now)
            );
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
