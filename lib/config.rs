use crate::error::{Error, Result};

/// Acquisition setup for the pipeline and the board layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub sample_rate_hz: u32,
    pub channel: u8,
    /// Full-scale code, 4095 for 12-bit conversions
    pub max_code: u16,
    pub reference_mv: u32,
    /// Samples the ring buffer can hold while output lags
    pub buffer_capacity: usize,
    /// Fault records kept by the error history
    pub error_history: usize,
    pub baud_rate: u32,
}

impl Config {
    pub const DEFAULT: Config = Config {
        sample_rate_hz: 100,
        channel: 0,
        max_code: (1 << 12) - 1,
        reference_mv: 3300,
        buffer_capacity: 1024,
        error_history: crate::fault::ERROR_HISTORY,
        baud_rate: 115_200,
    };

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_hz == 0
            || self.max_code == 0
            || self.reference_mv == 0
            || self.buffer_capacity == 0
            || self.error_history == 0
            || self.baud_rate == 0
        {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::DEFAULT
    }
}
