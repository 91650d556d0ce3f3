use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp(u32);

impl Timestamp {
    pub const fn from_millis(millis: u32) -> Self {
        Timestamp(millis)
    }

    pub fn millis(self) -> u32 {
        self.0
    }
}

pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Timer trigger, ADC and DMA transfer chain.
///
/// Once armed, the chain converts at the configured rate, writes every code into the
/// [`Completion`] landing cell and raises the transfer interrupt, whose handler calls
/// [`Completion::complete`].
pub trait Acquisition {
    fn configure(&mut self, sample_rate_hz: u32, channel: u8) -> Result<()>;
    fn arm(&mut self);
    fn disarm(&mut self);
    /// Fault signal of the chain, checked on every poll while armed
    fn fault(&mut self) -> Result<()>;
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    pub raw_code: u16,
    pub sequence_number: u32,
    pub timestamp: Timestamp,
}

/// One-slot handoff between the transfer interrupt and the main context.
///
/// The transfer (or [`Completion::land`]) writes the landing cell. In the interrupt,
/// [`Completion::complete`] copies the cell into a snapshot, bumps the completion
/// counter and publishes the flag with `Release`. The main side reads flag, snapshot
/// and counter inside one critical section. The transfer can still rewrite the cell
/// while the interrupt is masked, but the snapshot only changes together with the
/// counter, so a code is never paired with another completion's sequence number.
/// Only load/store atomics are used; Cortex-M0+ has no compare-and-swap.
pub struct Completion {
    ready: AtomicBool,
    cell: AtomicU16,
    // written by the interrupt only
    code: AtomicU16,
    completed: AtomicU32,
}

impl Completion {
    pub const fn new() -> Self {
        Completion {
            ready: AtomicBool::new(false),
            cell: AtomicU16::new(0),
            code: AtomicU16::new(0),
            completed: AtomicU32::new(0),
        }
    }

    pub fn land(&self, code: u16) {
        self.cell.store(code, Ordering::Relaxed);
    }

    /// Transfer-complete edge. Call from the interrupt handler after acknowledging the
    /// hardware event.
    pub fn complete(&self) {
        self.code
            .store(self.cell.load(Ordering::Relaxed), Ordering::Relaxed);
        let completed = self.completed.load(Ordering::Relaxed);
        self.completed
            .store(completed.wrapping_add(1), Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
    }

    pub fn cell_address(&self) -> u32 {
        self.cell.as_ptr() as u32
    }

    pub fn is_pending(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Clears the flag and returns the landed code with its sequence number.
    pub(crate) fn take(&self) -> Option<(u16, u32)> {
        critical_section::with(|_| {
            if !self.ready.load(Ordering::Acquire) {
                return None;
            }
            self.ready.store(false, Ordering::Relaxed);
            let code = self.code.load(Ordering::Relaxed);
            let sequence = self.completed.load(Ordering::Relaxed).wrapping_sub(1);
            Some((code, sequence))
        })
    }
}

impl Default for Completion {
    fn default() -> Self {
        Completion::new()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Uninitialized,
    Ready,
    Armed,
    /// Armed with a completed conversion waiting in the landing cell
    SampleAvailable,
    Error,
}

/// Owner of the trigger, convert and transfer chain and of its completion signal.
pub struct SampleSource<'a, A, C> {
    chain: A,
    clock: C,
    completion: &'a Completion,
    sample_rate_hz: u32,
    channel: u8,
    state: State,
    // last init() succeeded
    configured: bool,
    // sequence number expected from the next completion
    next_sequence: u32,
    missed: u32,
}

impl<'a, A, C> SampleSource<'a, A, C>
where
    A: Acquisition,
    C: Clock,
{
    pub fn new(chain: A, clock: C, completion: &'a Completion, config: &Config) -> Self {
        SampleSource {
            chain,
            clock,
            completion,
            sample_rate_hz: config.sample_rate_hz,
            channel: config.channel,
            state: State::Uninitialized,
            configured: false,
            next_sequence: 0,
            missed: 0,
        }
    }

    /// Configures the chain. A failure leaves the source in [`State::Error`].
    pub fn init(&mut self) -> Result<()> {
        if self.state == State::Armed {
            self.chain.disarm();
        }
        match self.chain.configure(self.sample_rate_hz, self.channel) {
            Ok(()) => {
                self.configured = true;
                self.state = State::Ready;
                Ok(())
            }
            Err(err) => {
                #[cfg(feature = "defmt")]
                defmt::error!("acquisition chain setup failed: {}", err);
                self.configured = false;
                self.state = State::Error;
                Err(err)
            }
        }
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            State::Armed => Ok(()),
            State::Ready => {
                self.chain.arm();
                self.state = State::Armed;
                Ok(())
            }
            _ => Err(Error::Hardware),
        }
    }

    /// Disarms triggering. A conversion already in flight still lands.
    ///
    /// A source whose chain was never configured keeps its state; only
    /// [`SampleSource::init`] can make it ready.
    pub fn stop(&mut self) {
        if !self.configured {
            return;
        }
        match self.state {
            State::Armed => {
                self.chain.disarm();
                self.state = State::Ready;
            }
            _ => self.state = State::Ready,
        }
    }

    /// Takes the pending sample, if any.
    ///
    /// `Ok(None)` is the usual outcome. A chain fault moves the source to
    /// [`State::Error`] and is returned once; later polls yield `Ok(None)` until the
    /// source is stopped and started again.
    pub fn poll_and_take(&mut self) -> Result<Option<Sample>> {
        if self.state != State::Armed {
            return Ok(None);
        }
        if let Err(err) = self.chain.fault() {
            #[cfg(feature = "defmt")]
            defmt::warn!("acquisition chain fault: {}", err);
            self.chain.disarm();
            self.state = State::Error;
            return Err(err);
        }

        let Some((raw_code, sequence_number)) = self.completion.take() else {
            return Ok(None);
        };
        let skipped = sequence_number.wrapping_sub(self.next_sequence);
        self.missed = self.missed.saturating_add(skipped);
        self.next_sequence = sequence_number.wrapping_add(1);

        Ok(Some(Sample {
            raw_code,
            sequence_number,
            timestamp: self.clock.now(),
        }))
    }

    pub fn state(&self) -> State {
        if self.state == State::Armed && self.completion.is_pending() {
            State::SampleAvailable
        } else {
            self.state
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready | State::Armed)
    }

    /// Completions overwritten in the landing cell before they were taken.
    pub fn missed(&self) -> u32 {
        self.missed
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn chain_mut(&mut self) -> &mut A {
        &mut self.chain
    }
}
