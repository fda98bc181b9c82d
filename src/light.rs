//! The traffic light: owner of the current phase and its timer thread.
//!
//! [`TrafficLight`] controls the lifecycle (start, shutdown, join).
//! [`LightObserver`] is a cloneable read side for collaborators that only
//! need to look at the light or wait for it to turn green.
//!
//! Only the timer thread writes the shared phase. Waiters consume handoff
//! values into locals, so a slow waiter can never republish a stale phase.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::channel::Handoff;
use crate::config::LightConfig;
use crate::phase::{AtomicPhase, Phase};
use crate::timer::{panic_message, CycleTimer};
use crate::{slog, slog_debug, slog_warn, Error, Result};

const TIMER_THREAD_NAME: &str = "stoplight-timer";

/// Observable health of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LightStatus {
    /// Constructed, `simulate` not called yet.
    Idle,
    /// Timer thread alive and ticking.
    Running,
    /// Timer thread alive but its heartbeat is older than the stall threshold.
    Stalled,
    /// Timer thread exited after shutdown.
    Stopped,
    /// Timer thread panicked.
    Failed,
}

impl LightStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LightStatus::Idle,
            1 => LightStatus::Running,
            2 => LightStatus::Stopped,
            _ => LightStatus::Failed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LightStatus::Idle => 0,
            LightStatus::Running | LightStatus::Stalled => 1,
            LightStatus::Stopped => 2,
            LightStatus::Failed => 3,
        }
    }
}

impl std::fmt::Display for LightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LightStatus::Idle => write!(f, "idle"),
            LightStatus::Running => write!(f, "running"),
            LightStatus::Stalled => write!(f, "stalled"),
            LightStatus::Stopped => write!(f, "stopped"),
            LightStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of a light for display or JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct LightStats {
    pub phase: Phase,
    pub status: LightStatus,
    pub toggles: u64,
    pub uptime_ms: u64,
}

/// State shared between the light, its observers and the timer thread.
#[derive(Debug)]
pub(crate) struct LightState {
    pub(crate) phase: AtomicPhase,
    pub(crate) channel: Handoff<Phase>,
    lifecycle: AtomicU8,
    epoch: Instant,
    heartbeat_ms: AtomicU64,
    toggles: AtomicU64,
}

impl LightState {
    pub(crate) fn new() -> Self {
        Self {
            phase: AtomicPhase::new(Phase::Red),
            channel: Handoff::new(),
            lifecycle: AtomicU8::new(LightStatus::Idle.as_u8()),
            epoch: Instant::now(),
            heartbeat_ms: AtomicU64::new(0),
            toggles: AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub(crate) fn beat(&self) {
        self.heartbeat_ms.store(self.now_ms(), Ordering::Release);
    }

    pub(crate) fn record_toggle(&self) {
        self.toggles.fetch_add(1, Ordering::Relaxed);
    }

    /// Idle -> Running. Fails if the light was ever started.
    fn try_start(&self) -> bool {
        self.lifecycle
            .compare_exchange(
                LightStatus::Idle.as_u8(),
                LightStatus::Running.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_running(&self) {
        self.beat();
        self.lifecycle
            .store(LightStatus::Running.as_u8(), Ordering::Release);
    }

    pub(crate) fn mark_stopped(&self) {
        // A failure recorded first must not be overwritten.
        let _ = self.lifecycle.fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
            (v != LightStatus::Failed.as_u8()).then_some(LightStatus::Stopped.as_u8())
        });
    }

    pub(crate) fn mark_failed(&self) {
        self.lifecycle
            .store(LightStatus::Failed.as_u8(), Ordering::Release);
    }

    /// Lifecycle as recorded, without heartbeat interpretation.
    pub(crate) fn lifecycle(&self) -> LightStatus {
        LightStatus::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    fn status(&self, stall_threshold: Duration) -> LightStatus {
        match self.lifecycle() {
            LightStatus::Running => {
                let age = self
                    .now_ms()
                    .saturating_sub(self.heartbeat_ms.load(Ordering::Acquire));
                if age > stall_threshold.as_millis() as u64 {
                    LightStatus::Stalled
                } else {
                    LightStatus::Running
                }
            }
            other => other,
        }
    }

    fn wait_for_green(&self) -> Result<()> {
        loop {
            let received = self.channel.receive()?;
            // The slot may still hold a green published just before a
            // toggle; only return once the light itself agrees.
            if received.is_green() && self.phase.load().is_green() {
                return Ok(());
            }
        }
    }

    fn wait_for_green_timeout(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let received = match self.channel.receive_timeout(remaining) {
                Ok(phase) => phase,
                Err(Error::Timeout(_)) => return Err(Error::Timeout(timeout)),
                Err(e) => return Err(e),
            };
            if received.is_green() && self.phase.load().is_green() {
                return Ok(());
            }
        }
    }
}

/// A single traffic light cycling between red and green on a background
/// thread.
///
/// Dropping the light shuts the timer down and joins it.
pub struct TrafficLight {
    state: Arc<LightState>,
    config: LightConfig,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TrafficLight {
    /// A red light with the default 4-6 second timing.
    pub fn new() -> Self {
        Self::build(LightConfig::default())
    }

    pub fn with_config(config: LightConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: LightConfig) -> Self {
        Self {
            state: Arc::new(LightState::new()),
            config,
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &LightConfig {
        &self.config
    }

    /// The phase the light shows right now. Never blocks.
    pub fn current_phase(&self) -> Phase {
        self.state.phase.load()
    }

    /// Block until the light turns green.
    ///
    /// Fails with [`Error::ChannelClosed`] if the light is shut down or its
    /// timer dies while waiting.
    pub fn wait_for_green(&self) -> Result<()> {
        self.state.wait_for_green()
    }

    pub fn wait_for_green_timeout(&self, timeout: Duration) -> Result<()> {
        self.state.wait_for_green_timeout(timeout)
    }

    /// Start the timer thread and return immediately.
    ///
    /// A light runs at most one timer; any later call returns
    /// [`Error::AlreadyRunning`], including after shutdown.
    pub fn simulate(&self) -> Result<()> {
        if !self.state.try_start() {
            slog_warn!("simulate() called on a light that was already started");
            return Err(Error::AlreadyRunning);
        }
        self.state.mark_running();

        let timer = CycleTimer::new(self.state.clone(), &self.config, self.cancel.clone());
        let spawned = thread::Builder::new()
            .name(TIMER_THREAD_NAME.into())
            .spawn(move || timer.run());

        match spawned {
            Ok(handle) => {
                *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                slog!(
                    "Light started: cycle={}..={}ms tick={}ms",
                    self.config.min_cycle_ms,
                    self.config.max_cycle_ms,
                    self.config.tick_ms
                );
                Ok(())
            }
            Err(e) => {
                self.state.mark_failed();
                self.state.channel.close();
                Err(Error::Io(e))
            }
        }
    }

    /// Ask the timer to stop and release every waiter.
    ///
    /// Does not wait for the thread; call [`join`](Self::join) for that.
    pub fn shutdown(&self) {
        slog_debug!("TrafficLight::shutdown status={}", self.status());
        self.cancel.cancel();
        if self.state.lifecycle() == LightStatus::Idle {
            self.state.mark_stopped();
        }
        self.state.channel.close();
    }

    /// Wait for the timer thread to exit.
    ///
    /// Returns [`Error::TimerPanicked`] if it died by panic. Joining a light
    /// that was never started, or joining twice, is a no-op.
    pub fn join(&self) -> Result<()> {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return Ok(());
        };
        handle
            .join()
            .map_err(|payload| Error::TimerPanicked(panic_message(payload.as_ref())))?;
        slog!("Light joined after {} toggles", self.stats().toggles);
        Ok(())
    }

    pub fn status(&self) -> LightStatus {
        self.state.status(self.config.stall_threshold())
    }

    pub fn stats(&self) -> LightStats {
        LightStats {
            phase: self.current_phase(),
            status: self.status(),
            toggles: self.state.toggles.load(Ordering::Relaxed),
            uptime_ms: self.state.now_ms(),
        }
    }

    /// A cloneable read handle that outlives borrows of the light.
    pub fn observer(&self) -> LightObserver {
        LightObserver {
            state: self.state.clone(),
            stall_threshold: self.config.stall_threshold(),
        }
    }
}

impl Default for TrafficLight {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrafficLight {
    fn drop(&mut self) {
        self.shutdown();
        if let Err(e) = self.join() {
            slog_warn!("Timer exited abnormally: {}", e);
        }
    }
}

/// Read-only view of a [`TrafficLight`], cheap to clone and send to other
/// threads or tasks.
#[derive(Debug, Clone)]
pub struct LightObserver {
    state: Arc<LightState>,
    stall_threshold: Duration,
}

impl LightObserver {
    pub fn current_phase(&self) -> Phase {
        self.state.phase.load()
    }

    pub fn status(&self) -> LightStatus {
        self.state.status(self.stall_threshold)
    }

    pub fn wait_for_green(&self) -> Result<()> {
        self.state.wait_for_green()
    }

    pub fn wait_for_green_timeout(&self, timeout: Duration) -> Result<()> {
        self.state.wait_for_green_timeout(timeout)
    }

    /// Wait for green from async code without blocking the runtime.
    ///
    /// The wait runs on tokio's blocking pool. Pass a timeout so the blocking
    /// thread is released even if the caller's future is dropped.
    pub async fn wait_for_green_async(&self, timeout: Option<Duration>) -> Result<()> {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || match timeout {
            Some(t) => state.wait_for_green_timeout(t),
            None => state.wait_for_green(),
        })
        .await
        .map_err(|e| Error::TaskJoin(e.to_string()))?
    }
}
