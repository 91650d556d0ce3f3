use crate::error::Result;
use crate::ring::RingBuffer;
use crate::source::Timestamp;

pub const ERROR_HISTORY: usize = 10;

/// Closed set of fault kinds, with the numeric codes used on the wire.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Empty record, nothing reported yet
    #[default]
    None,
    HardwareFault,
    TransferFault,
    CommFault,
    TimerFault,
    BufferOverflow,
    BufferUnderflow,
    InvalidParameter,
    Timeout,
    Unknown,
}

impl ErrorKind {
    pub fn code(self) -> u8 {
        match self {
            ErrorKind::None => 0x00,
            ErrorKind::HardwareFault => 0x01,
            ErrorKind::TransferFault => 0x02,
            ErrorKind::CommFault => 0x04,
            ErrorKind::TimerFault => 0x08,
            ErrorKind::BufferOverflow => 0x10,
            ErrorKind::BufferUnderflow => 0x20,
            ErrorKind::InvalidParameter => 0x40,
            ErrorKind::Timeout => 0x80,
            ErrorKind::Unknown => 0xFF,
        }
    }

    /// Inverse of [`ErrorKind::code`]; anything outside the known codes is `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => ErrorKind::None,
            0x01 => ErrorKind::HardwareFault,
            0x02 => ErrorKind::TransferFault,
            0x04 => ErrorKind::CommFault,
            0x08 => ErrorKind::TimerFault,
            0x10 => ErrorKind::BufferOverflow,
            0x20 => ErrorKind::BufferUnderflow,
            0x40 => ErrorKind::InvalidParameter,
            0x80 => ErrorKind::Timeout,
            _ => ErrorKind::Unknown,
        }
    }
}

pub fn describe(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::None => "No error",
        ErrorKind::HardwareFault => "ADC conversion failed",
        ErrorKind::TransferFault => "DMA transfer failed",
        ErrorKind::CommFault => "UART communication failed",
        ErrorKind::TimerFault => "Timer initialization failed",
        ErrorKind::BufferOverflow => "Buffer overflow",
        ErrorKind::BufferUnderflow => "Buffer underflow",
        ErrorKind::InvalidParameter => "Invalid parameter",
        ErrorKind::Timeout => "Operation timeout",
        ErrorKind::Unknown => "Unknown error",
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub timestamp: Timestamp,
    pub message: &'static str,
}

/// Bounded history of fault records.
///
/// Keeps the most recent `capacity` records, counts every report over its lifetime
/// and latches once a [`Severity::Critical`] record has been seen. The latch is only
/// cleared by [`ErrorLog::clear`].
pub struct ErrorLog<'a> {
    history: RingBuffer<'a, ErrorRecord>,
    observed: u32,
    critical: bool,
}

impl<'a> ErrorLog<'a> {
    pub fn new(storage: &'a mut [ErrorRecord]) -> Result<Self> {
        Ok(ErrorLog {
            history: RingBuffer::new(storage)?,
            observed: 0,
            critical: false,
        })
    }

    pub fn report(
        &mut self,
        kind: ErrorKind,
        severity: Severity,
        message: &'static str,
        timestamp: Timestamp,
    ) {
        self.history.write(ErrorRecord {
            kind,
            severity,
            timestamp,
            message,
        });
        self.observed = self.observed.saturating_add(1);
        if severity == Severity::Critical {
            self.critical = true;
        }
    }

    /// Most recent record, or the empty record when nothing has been reported.
    pub fn last(&self) -> ErrorRecord {
        self.history.newest().unwrap_or_default()
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// Reports seen since the last clear, including ones no longer retained.
    pub fn observed_count(&self) -> u32 {
        self.observed
    }

    pub fn records(&self) -> impl Iterator<Item = ErrorRecord> + '_ {
        self.history.iter()
    }

    /// Retained records reported after [`ErrorLog::observed_count`] was `seen`, oldest
    /// first. A `seen` from before a clear yields everything retained.
    pub fn since(&self, seen: u32) -> impl Iterator<Item = ErrorRecord> + '_ {
        let fresh = if seen <= self.observed {
            self.observed - seen
        } else {
            self.observed
        };
        let len = self.history.len();
        let take = (fresh as usize).min(len);
        self.records().skip(len - take)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.observed = 0;
        self.critical = false;
    }
}
