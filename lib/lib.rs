#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod convert;
pub mod error;
pub mod fault;
#[cfg(feature = "firmware")]
pub mod hw;
pub mod pipeline;
pub mod ring;
pub mod source;

pub use config::Config;
pub use convert::{raw_to_millivolts, Millivolts, UnitConverter};
pub use error::{Error, Result};
pub use fault::{describe, ErrorKind, ErrorLog, ErrorRecord, Severity};
pub use pipeline::{format_report, AcquisitionPipeline, Output, PipelineReport, BANNER};
pub use ring::RingBuffer;
pub use source::{Acquisition, Clock, Completion, Sample, SampleSource, State, Timestamp};
