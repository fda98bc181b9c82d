use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use crossbeam_channel::{after, select, tick, Sender};
use rand::Rng;
use serde::Serialize;

use stoplight::{slog, LightConfig, LightObserver, LightStatus, Phase, Result, TrafficLight};

const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Stoplight - a single randomized traffic light with waiting vehicles
#[derive(Parser, Debug)]
#[command(name = "stoplight")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    STOPLIGHT_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.stoplight/stoplight.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a light with vehicles waiting for green
    Run {
        /// Number of vehicle threads waiting at the light
        #[arg(short = 'n', long, default_value_t = 2)]
        vehicles: usize,

        /// How long to run before shutting the light down
        #[arg(short = 's', long, default_value_t = 20)]
        duration_secs: u64,

        /// Override the shortest phase duration (ms)
        #[arg(long)]
        min_ms: Option<u64>,

        /// Override the longest phase duration (ms)
        #[arg(long)]
        max_ms: Option<u64>,

        /// Seed the phase duration generator
        #[arg(long)]
        seed: Option<u64>,

        /// Emit one JSON object per event instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Write the effective configuration to ~/.stoplight/stoplight.toml
        #[arg(long)]
        save: bool,
    },
}

/// Something worth printing while the light runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event {
    PhaseChanged {
        at: DateTime<Local>,
        phase: Phase,
    },
    VehicleCrossed {
        at: DateTime<Local>,
        vehicle: usize,
        waited_ms: u64,
    },
    VehicleStopped {
        at: DateTime<Local>,
        vehicle: usize,
        reason: String,
    },
    StatusChanged {
        at: DateTime<Local>,
        status: LightStatus,
    },
    Finished {
        at: DateTime<Local>,
        stats: stoplight::LightStats,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    stoplight::log::init(cli.debug);

    match cli.command {
        Command::Run {
            vehicles,
            duration_secs,
            min_ms,
            max_ms,
            seed,
            json,
        } => {
            let mut config = LightConfig::load()?;
            if let Some(min) = min_ms {
                config.min_cycle_ms = min;
            }
            if let Some(max) = max_ms {
                config.max_cycle_ms = max;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            run(config, vehicles, Duration::from_secs(duration_secs), json)
        }
        Command::Config { save } => {
            let config = LightConfig::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
            if save {
                config.save()?;
                println!("# saved to {}", LightConfig::config_path()?.display());
            }
            Ok(())
        }
    }
}

fn run(config: LightConfig, vehicles: usize, duration: Duration, json: bool) -> Result<()> {
    slog!(
        "Run: vehicles={} duration={:?} cycle={}..={}ms",
        vehicles,
        duration,
        config.min_cycle_ms,
        config.max_cycle_ms
    );

    let light = TrafficLight::with_config(config)?;
    light.simulate()?;

    let (event_tx, event_rx) = crossbeam_channel::unbounded::<Event>();
    let handles: Vec<_> = (0..vehicles)
        .map(|id| spawn_vehicle(id, light.observer(), event_tx.clone()))
        .collect::<std::io::Result<_>>()?;

    let sampler = tick(SAMPLE_INTERVAL);
    let deadline = after(duration);
    let mut last_phase = light.current_phase();
    let mut last_status = light.status();
    emit(
        &Event::PhaseChanged {
            at: Local::now(),
            phase: last_phase,
        },
        json,
    )?;

    let mut running = true;
    while running {
        select! {
            // The loop holds a sender, so this channel never disconnects here.
            recv(event_rx) -> event => {
                if let Ok(event) = event {
                    emit(&event, json)?;
                }
            }
            recv(sampler) -> _ => {
                let phase = light.current_phase();
                if phase != last_phase {
                    last_phase = phase;
                    emit(&Event::PhaseChanged { at: Local::now(), phase }, json)?;
                }
                let status = light.status();
                if status != last_status {
                    last_status = status;
                    emit(&Event::StatusChanged { at: Local::now(), status }, json)?;
                }
            }
            recv(deadline) -> _ => running = false,
        }
    }

    light.shutdown();
    drop(event_tx);
    for handle in handles {
        let _ = handle.join();
    }
    for event in event_rx.try_iter() {
        emit(&event, json)?;
    }
    light.join()?;

    emit(
        &Event::Finished {
            at: Local::now(),
            stats: light.stats(),
        },
        json,
    )
}

fn spawn_vehicle(
    id: usize,
    observer: LightObserver,
    events: Sender<Event>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("vehicle-{id}"))
        .spawn(move || {
            let mut rng = rand::rng();
            loop {
                let arrived = std::time::Instant::now();
                match observer.wait_for_green() {
                    Ok(()) => {
                        let _ = events.send(Event::VehicleCrossed {
                            at: Local::now(),
                            vehicle: id,
                            waited_ms: arrived.elapsed().as_millis() as u64,
                        });
                    }
                    Err(e) => {
                        let _ = events.send(Event::VehicleStopped {
                            at: Local::now(),
                            vehicle: id,
                            reason: e.to_string(),
                        });
                        return;
                    }
                }
                // Time until this vehicle comes around to the light again.
                thread::sleep(Duration::from_millis(rng.random_range(500..=3000)));
            }
        })
}

fn emit(event: &Event, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        Event::PhaseChanged { at, phase } => {
            println!("[{}] light is {}", at.format("%H:%M:%S%.3f"), phase);
        }
        Event::VehicleCrossed {
            at,
            vehicle,
            waited_ms,
        } => {
            println!(
                "[{}] vehicle {} crossed after waiting {}ms",
                at.format("%H:%M:%S%.3f"),
                vehicle,
                waited_ms
            );
        }
        Event::VehicleStopped { at, vehicle, reason } => {
            println!(
                "[{}] vehicle {} stopped: {}",
                at.format("%H:%M:%S%.3f"),
                vehicle,
                reason
            );
        }
        Event::StatusChanged { at, status } => {
            println!("[{}] light status: {}", at.format("%H:%M:%S%.3f"), status);
        }
        Event::Finished { at, stats } => {
            println!(
                "[{}] finished: phase={} status={} toggles={} uptime={}ms",
                at.format("%H:%M:%S%.3f"),
                stats.phase,
                stats.status,
                stats.toggles,
                stats.uptime_ms
            );
        }
    }
    Ok(())
}
