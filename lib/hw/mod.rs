mod adc;
mod helper;
mod serial;
mod timers;

pub use adc::{AdcChain, TransferIrq};
pub use helper::*;
pub use serial::SerialOutput;
pub use timers::{MillisTimer, MonotonicClock, SampleTimer};
