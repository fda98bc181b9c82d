pub mod channel;
pub mod config;
pub mod error;
pub mod light;
pub mod log;
pub mod phase;
pub mod timer;

pub use channel::Handoff;
pub use config::LightConfig;
pub use error::{Error, Result};
pub use light::{LightObserver, LightStats, LightStatus, TrafficLight};
pub use phase::{AtomicPhase, Phase};
