//! Motion sensors: step detection, heading, and barometric floor changes.

pub mod floor_detector;
pub mod heading;
pub mod step_detector;

pub use floor_detector::{FloorChange, FloorDetector, FloorDetectorConfig};
pub use heading::HeadingTracker;
pub use step_detector::{StepDetector, StepDetectorConfig, StepEvent, StepPhase, StepRejection};
