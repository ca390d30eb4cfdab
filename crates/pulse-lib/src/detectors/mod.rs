pub mod adaptive;
pub mod ecg;
pub mod pressure;

pub use adaptive::{
    AdaptiveThresholdConfig, AdaptiveThresholdDetector, Detection, Extremum, ScanState, Transition,
};
