//! Indoor positioning from Wi-Fi fingerprints, step-based dead reckoning and
//! barometric floor detection.
//!
//! The pure pipeline lives in [`engine::PositioningEngine`]; [`runtime`] runs
//! it as a single-writer tokio task fed by independent sensor producers.

pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod fusion;
pub mod geo;
pub mod live_status;
pub mod motion;
pub mod runtime;
pub mod session;
pub mod types;

pub use config::PositioningConfig;
pub use engine::{EngineSnapshot, PositioningEngine};
pub use error::{PositioningError, Result};
pub use fusion::PositionEvent;
pub use runtime::{spawn_engine, EngineHandle, SensorInput};
