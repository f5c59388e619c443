//! Step detection from phone motion sensors.
//!
//! Live samples flow through [`processor::StepProcessor`]; recorded sessions
//! are replayed through the same processor by [`replay`].

pub mod autocorrelation;
pub mod config;
pub mod decimal;
pub mod decision;
pub mod error;
pub mod extrema;
pub mod filters;
pub mod history;
pub mod live_status;
pub mod processor;
pub mod replay;
pub mod resultant;
pub mod sampling;
pub mod sensors;
pub mod types;
pub mod validator;

pub use config::{Configuration, CutoffFrequency, FilterKind, ProcessingMode, RecognitionAlgorithm, SamplingFrequency};
pub use error::{Result, StepError};
pub use processor::{Processed, ProcessorEvent, StepEvent, StepProcessor, StepReport};
pub use types::{SensorKind, SensorSample};
