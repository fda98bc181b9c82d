//! Test fixtures for integration tests.

use std::time::{Duration, Instant};

use stoplight::{LightConfig, Phase, TrafficLight};

pub const FAST_MIN_MS: u64 = 40;
pub const FAST_MAX_MS: u64 = 60;

/// Config with phases of 40-60ms so a test sees many toggles quickly.
pub fn fast_config() -> LightConfig {
    LightConfig::default()
        .with_cycle_range(FAST_MIN_MS, FAST_MAX_MS)
        .with_stall_threshold(500)
}

/// A fast light that is already running.
pub fn running_fast_light() -> TrafficLight {
    let light = TrafficLight::with_config(fast_config()).expect("valid fast config");
    light.simulate().expect("first simulate succeeds");
    light
}

/// Generous upper bound for `n` full red+green round trips of `config`.
pub fn round_trips(config: &LightConfig, n: u32) -> Duration {
    config.max_round_trip() * n + Duration::from_millis(250)
}

/// Sample the phase every millisecond for `window` and report which phases
/// were seen.
pub fn sample_phases(light: &TrafficLight, window: Duration) -> (bool, bool) {
    let start = Instant::now();
    let (mut saw_red, mut saw_green) = (false, false);
    while start.elapsed() < window {
        match light.current_phase() {
            Phase::Red => saw_red = true,
            Phase::Green => saw_green = true,
        }
        if saw_red && saw_green {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    (saw_red, saw_green)
}
