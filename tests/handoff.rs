use std::cell::Cell;
use std::thread;

use lib::{Acquisition, Clock, Completion, Config, Result, SampleSource, Timestamp};

struct Chain;

impl Acquisition for Chain {
    fn configure(&mut self, _sample_rate_hz: u32, _channel: u8) -> Result<()> {
        Ok(())
    }

    fn arm(&mut self) {}

    fn disarm(&mut self) {}

    fn fault(&mut self) -> Result<()> {
        Ok(())
    }
}

struct FixedClock(Cell<u32>);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.0.get())
    }
}

fn armed(completion: &Completion) -> SampleSource<'_, Chain, FixedClock> {
    let mut source = SampleSource::new(Chain, FixedClock(Cell::new(0)), completion, &Config::DEFAULT);
    source.init().unwrap();
    source.start().unwrap();
    source
}

// Stand-in for the DMA write plus transfer-complete interrupt. The critical section
// models the interrupt being masked while the main context takes the cell.
fn interrupt(completion: &Completion, code: u16) {
    critical_section::with(|_| {
        completion.land(code);
        completion.complete();
    });
}

#[test]
fn polling_between_interrupts_loses_nothing() {
    let completion = Completion::new();
    let mut source = armed(&completion);

    for sequence in 0..5000u32 {
        interrupt(&completion, (sequence % 4096) as u16);
        let sample = source.poll_and_take().unwrap().unwrap();
        assert_eq!(sample.sequence_number, sequence);
        assert_eq!(sample.raw_code, (sequence % 4096) as u16);
        assert_eq!(source.poll_and_take(), Ok(None));
    }
    assert_eq!(source.missed(), 0);
}

#[test]
fn concurrent_interrupts_never_duplicate_or_tear_samples() {
    const INTERRUPTS: u32 = 20_000;
    let completion = Completion::new();
    let mut source = armed(&completion);

    thread::scope(|scope| {
        let producer = scope.spawn(|| {
            for sequence in 0..INTERRUPTS {
                // code carries its own sequence number
                interrupt(&completion, (sequence % 4096) as u16);
                if sequence % 64 == 0 {
                    thread::yield_now();
                }
            }
        });

        let mut last: Option<u32> = None;
        let mut taken = 0u32;
        loop {
            let finished = producer.is_finished();
            if let Some(sample) = source.poll_and_take().unwrap() {
                assert_eq!(sample.raw_code, (sample.sequence_number % 4096) as u16);
                if let Some(previous) = last {
                    assert!(sample.sequence_number > previous);
                }
                last = Some(sample.sequence_number);
                taken += 1;
            } else if finished {
                break;
            }
        }

        assert_eq!(last, Some(INTERRUPTS - 1));
        assert_eq!(taken + source.missed(), INTERRUPTS);
    });
}
