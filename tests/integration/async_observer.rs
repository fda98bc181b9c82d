//! Waiting for green from async code.

use std::time::Duration;

use stoplight::{Error, Phase, TrafficLight};

use super::fixtures::{round_trips, running_fast_light};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_wait_for_green() {
    let light = running_fast_light();
    let observer = light.observer();
    let limit = round_trips(light.config(), 1);

    observer.wait_for_green_async(Some(limit)).await.unwrap();
    assert_eq!(observer.current_phase(), Phase::Green);
}

#[tokio::test]
async fn test_async_waiters_run_concurrently() {
    let light = running_fast_light();
    let limit = round_trips(light.config(), 2);

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let observer = light.observer();
            tokio::spawn(async move { observer.wait_for_green_async(Some(limit)).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_async_wait_times_out_on_idle_light() {
    let light = TrafficLight::new();
    let result = light
        .observer()
        .wait_for_green_async(Some(Duration::from_millis(30)))
        .await;
    assert!(matches!(result, Err(Error::Timeout(_))));
}
