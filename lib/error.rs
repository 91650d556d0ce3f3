use crate::fault::ErrorKind;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Conversion/trigger chain failed to configure or signaled a fault
    Hardware,
    // Transfer engine fault
    Transfer,
    // Sample trigger timer fault
    Timer,
    // Output boundary rejected the report
    Comm,
    // Read on an empty buffer
    Empty,
    // Peek past the buffered count
    OutOfRange,
    InvalidParameter,
    // Report line did not fit the line buffer
    BufferWrite,
    Timeout,
}

impl Error {
    /// Fault kind recorded in the [`ErrorLog`](crate::fault::ErrorLog) for this error.
    pub fn kind(self) -> ErrorKind {
        match self {
            Error::Hardware => ErrorKind::HardwareFault,
            Error::Transfer => ErrorKind::TransferFault,
            Error::Timer => ErrorKind::TimerFault,
            Error::Comm | Error::BufferWrite => ErrorKind::CommFault,
            Error::Empty => ErrorKind::BufferUnderflow,
            Error::OutOfRange | Error::InvalidParameter => ErrorKind::InvalidParameter,
            Error::Timeout => ErrorKind::Timeout,
        }
    }
}
