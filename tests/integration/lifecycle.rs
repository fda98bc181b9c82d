//! Start, shutdown and supervision of the timer thread.

use std::thread;
use std::time::Duration;

use stoplight::{Error, LightStatus, TrafficLight};

use super::fixtures::{fast_config, running_fast_light};

#[test]
fn test_status_progression() {
    let light = TrafficLight::with_config(fast_config()).unwrap();
    assert_eq!(light.status(), LightStatus::Idle);

    light.simulate().unwrap();
    assert_eq!(light.status(), LightStatus::Running);

    light.shutdown();
    light.join().unwrap();
    assert_eq!(light.status(), LightStatus::Stopped);
}

#[test]
fn test_double_simulate_rejected() {
    let light = running_fast_light();
    assert!(matches!(light.simulate(), Err(Error::AlreadyRunning)));
}

#[test]
fn test_shutdown_releases_blocked_waiter() {
    // Long phases so the waiter is certainly still blocked at shutdown.
    let config = fast_config().with_cycle_range(5_000, 6_000);
    let light = TrafficLight::with_config(config).unwrap();
    light.simulate().unwrap();

    let observer = light.observer();
    let waiter = thread::spawn(move || observer.wait_for_green());

    thread::sleep(Duration::from_millis(50));
    light.shutdown();
    light.join().unwrap();

    assert!(matches!(waiter.join().unwrap(), Err(Error::ChannelClosed)));
}

#[test]
fn test_observer_outlives_light() {
    let light = running_fast_light();
    let observer = light.observer();
    drop(light);

    assert_eq!(observer.status(), LightStatus::Stopped);
    // The last published phase may be received once; after that the closed
    // handoff is reported.
    let mut result = observer.wait_for_green_timeout(Duration::from_millis(100));
    if result.is_ok() {
        result = observer.wait_for_green_timeout(Duration::from_millis(100));
    }
    assert!(matches!(result, Err(Error::ChannelClosed)));
}

#[test]
fn test_stats_track_toggles() {
    let light = running_fast_light();
    thread::sleep(Duration::from_millis(300));
    let stats = light.stats();
    assert!(stats.toggles >= 2, "only {} toggles in 300ms", stats.toggles);
    assert!(stats.uptime_ms >= 300);
    assert_eq!(stats.status, LightStatus::Running);
}
