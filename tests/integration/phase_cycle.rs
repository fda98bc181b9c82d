//! Phase toggling and wait-for-green behavior on a live timer.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use stoplight::{LightConfig, Phase, TrafficLight};

use super::fixtures::{fast_config, round_trips, running_fast_light, sample_phases};

#[test]
fn test_new_light_is_red() {
    let light = TrafficLight::new();
    assert_eq!(light.current_phase(), Phase::Red);
}

#[test]
fn test_running_light_shows_both_phases() {
    let light = running_fast_light();
    let (saw_red, saw_green) = sample_phases(&light, round_trips(light.config(), 2));
    assert!(saw_red, "never observed red");
    assert!(saw_green, "never observed green");
    assert!(light.stats().toggles >= 1);
}

#[test]
fn test_first_toggle_respects_minimum_duration() {
    let config = LightConfig::default()
        .with_cycle_range(150, 200)
        .with_stall_threshold(500);
    let light = TrafficLight::with_config(config).unwrap();
    let start = Instant::now();
    light.simulate().unwrap();

    light
        .wait_for_green_timeout(Duration::from_secs(2))
        .unwrap();
    assert!(
        start.elapsed() >= Duration::from_millis(150),
        "turned green after only {:?}",
        start.elapsed()
    );
}

#[test]
fn test_wait_for_green_leaves_light_green() {
    let light = running_fast_light();
    for _ in 0..5 {
        light
            .wait_for_green_timeout(round_trips(light.config(), 1))
            .unwrap();
        assert_eq!(light.current_phase(), Phase::Green);
        // Let the light go red again before the next wait.
        thread::sleep(Duration::from_millis(fast_config().max_cycle_ms + 5));
    }
}

#[test]
fn test_two_waiters_fast_light() {
    let light = Arc::new(running_fast_light());
    let limit = round_trips(light.config(), 1);

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let light = light.clone();
            thread::spawn(move || {
                light.wait_for_green_timeout(limit)?;
                Ok::<_, stoplight::Error>(light.current_phase())
            })
        })
        .collect();

    for w in waiters {
        assert_eq!(w.join().unwrap().unwrap(), Phase::Green);
    }
}

/// Two waiters against the default 4-6 second timing must both see green
/// within one red+green round trip.
#[test]
fn test_two_waiters_default_timing() {
    let light = TrafficLight::new();
    light.simulate().unwrap();
    let limit = light.config().max_round_trip();
    let start = Instant::now();

    let observers = [light.observer(), light.observer()];
    let waiters: Vec<_> = observers
        .into_iter()
        .map(|observer| {
            thread::spawn(move || {
                observer.wait_for_green_timeout(limit)?;
                Ok::<_, stoplight::Error>(observer.current_phase())
            })
        })
        .collect();

    for w in waiters {
        assert_eq!(w.join().unwrap().unwrap(), Phase::Green);
    }
    assert!(start.elapsed() <= limit);
}

#[test]
fn test_many_waiters_all_released() {
    let light = running_fast_light();
    let limit = round_trips(light.config(), 2);

    let waiters: Vec<_> = (0..8)
        .map(|_| {
            let observer = light.observer();
            thread::spawn(move || observer.wait_for_green_timeout(limit))
        })
        .collect();

    for w in waiters {
        w.join().unwrap().unwrap();
    }
}
