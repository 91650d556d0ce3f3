use core::fmt::Write;

use heapless::String;

use crate::convert::{Millivolts, UnitConverter};
use crate::error::{Error, Result};
use crate::fault::{ErrorKind, ErrorLog, Severity};
use crate::ring::RingBuffer;
use crate::source::{Acquisition, Clock, Sample, SampleSource};

pub const LINE_LENGTH: usize = 64;

/// Sent once before the first report.
pub const BANNER: &str = "\r\n\
==========================================\r\n\
 ADC monitor: timer-triggered DMA sampling\r\n\
 Smp <sequence> | ADC: <raw> | V: <volts> V\r\n\
==========================================\r\n";

/// Serial link or equivalent. Sends are best effort.
pub trait Output {
    fn send(&mut self, text: &str) -> Result<()>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineReport {
    pub sample: Sample,
    pub voltage: Millivolts,
    pub sequence_number: u32,
}

/// Formats `report` as `Smp 00012 | ADC: 2048 | V: 1.650 V\r\n`.
pub fn format_report(report: &PipelineReport) -> Result<String<LINE_LENGTH>> {
    let mut line = String::new();
    write!(
        &mut line,
        "Smp {:05} | ADC: {:4} | V: {}.{:03} V\r\n",
        report.sequence_number,
        report.sample.raw_code,
        report.voltage.whole(),
        report.voltage.frac()
    )
    .map_err(|_| Error::BufferWrite)?;
    Ok(line)
}

/// Drives samples from the [`SampleSource`] through the ring buffer and the unit
/// conversion to the [`Output`], recording faults instead of stopping.
pub struct AcquisitionPipeline<'a, A, C, O> {
    source: SampleSource<'a, A, C>,
    buffer: RingBuffer<'a, Sample>,
    errors: ErrorLog<'a>,
    converter: UnitConverter,
    output: O,
    // source misses already recorded
    missed: u32,
}

impl<'a, A, C, O> AcquisitionPipeline<'a, A, C, O>
where
    A: Acquisition,
    C: Clock,
    O: Output,
{
    pub fn new(
        source: SampleSource<'a, A, C>,
        buffer: RingBuffer<'a, Sample>,
        errors: ErrorLog<'a>,
        converter: UnitConverter,
        output: O,
    ) -> Self {
        AcquisitionPipeline {
            source,
            buffer,
            errors,
            converter,
            output,
            missed: 0,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if let Err(err) = self.output.send(BANNER) {
            self.record(err.kind(), Severity::Warning, "startup banner not sent");
        }
        self.source.start().map_err(|err| {
            self.record(err.kind(), Severity::Error, "source not initialized");
            err
        })
    }

    pub fn stop(&mut self) {
        self.source.stop();
    }

    /// One pass of the poll loop. Returns the number of reports sent.
    pub fn tick(&mut self) -> usize {
        let sample = match self.source.poll_and_take() {
            Ok(Some(sample)) => sample,
            Ok(None) => return 0,
            Err(err) => {
                let message = match err {
                    Error::Transfer => "DMA transfer fault",
                    _ => "acquisition chain fault",
                };
                self.record(ErrorKind::HardwareFault, Severity::Error, message);
                return 0;
            }
        };

        if self.source.missed() != self.missed {
            self.missed = self.source.missed();
            self.record(
                ErrorKind::BufferOverflow,
                Severity::Warning,
                "landing cell overrun, samples lost",
            );
        }
        if self.buffer.write(sample).is_some() {
            self.record(
                ErrorKind::BufferOverflow,
                Severity::Info,
                "oldest unsent sample overwritten",
            );
        }
        self.drain()
    }

    /// Sends buffered samples oldest first. A sample that could not be sent stays
    /// buffered for the next pass.
    fn drain(&mut self) -> usize {
        let mut sent = 0;
        while let Ok(sample) = self.buffer.peek(0) {
            let voltage = match self.converter.convert(sample.raw_code) {
                Ok(voltage) => voltage,
                Err(err) => {
                    self.discard_oldest();
                    self.record(err.kind(), Severity::Warning, "raw code above full scale");
                    continue;
                }
            };
            let report = PipelineReport {
                sample,
                voltage,
                sequence_number: sample.sequence_number,
            };
            let line = match format_report(&report) {
                Ok(line) => line,
                Err(err) => {
                    self.discard_oldest();
                    self.record(err.kind(), Severity::Warning, "report line too long");
                    continue;
                }
            };
            if let Err(err) = self.output.send(&line) {
                self.record(err.kind(), Severity::Warning, "report not sent");
                break;
            }
            self.discard_oldest();
            sent += 1;
        }
        sent
    }

    fn discard_oldest(&mut self) {
        if let Err(err) = self.buffer.read() {
            self.record(err.kind(), Severity::Warning, "read on empty sample buffer");
        }
    }

    fn record(&mut self, kind: ErrorKind, severity: Severity, message: &'static str) {
        let now = self.source.now();
        self.errors.report(kind, severity, message, now);
    }

    pub fn errors(&self) -> &ErrorLog<'a> {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorLog<'a> {
        &mut self.errors
    }

    pub fn source(&self) -> &SampleSource<'a, A, C> {
        &self.source
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fault::{ErrorRecord, ERROR_HISTORY};
    use crate::source::mock::{ManualClock, MockChain};
    use crate::source::{Completion, Timestamp};

    #[derive(Default)]
    struct Lines {
        sent: Vec<std::string::String>,
        refuse: bool,
    }

    impl Output for Lines {
        fn send(&mut self, text: &str) -> Result<()> {
            if self.refuse {
                return Err(Error::Comm);
            }
            self.sent.push(text.into());
            Ok(())
        }
    }

    type Pipeline<'a> = AcquisitionPipeline<'a, MockChain, ManualClock, Lines>;

    fn pipeline<'a>(
        completion: &'a Completion,
        samples: &'a mut [Sample],
        records: &'a mut [ErrorRecord],
    ) -> Pipeline<'a> {
        let mut source = SampleSource::new(
            MockChain::default(),
            ManualClock::default(),
            completion,
            &Config::DEFAULT,
        );
        source.init().unwrap();
        AcquisitionPipeline::new(
            source,
            RingBuffer::new(samples).unwrap(),
            ErrorLog::new(records).unwrap(),
            UnitConverter::new(4095, 3300).unwrap(),
            Lines::default(),
        )
    }

    fn interrupt(completion: &Completion, code: u16) {
        completion.land(code);
        completion.complete();
    }

    #[test]
    fn report_line_is_byte_exact() {
        let report = PipelineReport {
            sample: Sample {
                raw_code: 2048,
                sequence_number: 7,
                timestamp: Timestamp::default(),
            },
            voltage: Millivolts(1650),
            sequence_number: 7,
        };
        assert_eq!(
            format_report(&report).unwrap().as_str(),
            "Smp 00007 | ADC: 2048 | V: 1.650 V\r\n"
        );

        let report = PipelineReport {
            sample: Sample {
                raw_code: 5,
                ..report.sample
            },
            voltage: Millivolts(4),
            sequence_number: 123_456,
        };
        assert_eq!(
            format_report(&report).unwrap().as_str(),
            "Smp 123456 | ADC:    5 | V: 0.004 V\r\n"
        );
    }

    #[test]
    fn banner_goes_out_before_reports() {
        let completion = Completion::new();
        let mut samples = [Sample::default(); 4];
        let mut records = [ErrorRecord::default(); ERROR_HISTORY];
        let mut pipeline = pipeline(&completion, &mut samples, &mut records);

        pipeline.start().unwrap();
        interrupt(&completion, 4095);
        assert_eq!(pipeline.tick(), 1);

        let sent = &pipeline.output().sent;
        assert_eq!(sent[0], BANNER);
        assert_eq!(sent[1], "Smp 00000 | ADC: 4095 | V: 3.300 V\r\n");
    }

    #[test]
    fn idle_tick_does_nothing() {
        let completion = Completion::new();
        let mut samples = [Sample::default(); 4];
        let mut records = [ErrorRecord::default(); ERROR_HISTORY];
        let mut pipeline = pipeline(&completion, &mut samples, &mut records);
        pipeline.start().unwrap();

        for _ in 0..100 {
            assert_eq!(pipeline.tick(), 0);
        }
        assert_eq!(pipeline.output().sent.len(), 1);
        assert!(pipeline.errors().is_empty());
    }

    #[test]
    fn output_failure_keeps_samples_buffered() {
        let completion = Completion::new();
        let mut samples = [Sample::default(); 4];
        let mut records = [ErrorRecord::default(); ERROR_HISTORY];
        let mut pipeline = pipeline(&completion, &mut samples, &mut records);
        pipeline.start().unwrap();

        pipeline.output.refuse = true;
        interrupt(&completion, 100);
        assert_eq!(pipeline.tick(), 0);
        interrupt(&completion, 200);
        assert_eq!(pipeline.tick(), 0);
        assert_eq!(pipeline.buffered(), 2);
        assert_eq!(pipeline.errors().last().kind, ErrorKind::CommFault);
        assert_eq!(pipeline.errors().observed_count(), 2);

        pipeline.output.refuse = false;
        interrupt(&completion, 300);
        assert_eq!(pipeline.tick(), 3);
        assert_eq!(pipeline.buffered(), 0);
        let sent = &pipeline.output().sent[1..];
        assert!(sent[0].starts_with("Smp 00000 | ADC:  100"));
        assert!(sent[1].starts_with("Smp 00001 | ADC:  200"));
        assert!(sent[2].starts_with("Smp 00002 | ADC:  300"));
    }

    #[test]
    fn sustained_output_failure_drops_oldest() {
        let completion = Completion::new();
        let mut samples = [Sample::default(); 2];
        let mut records = [ErrorRecord::default(); ERROR_HISTORY];
        let mut pipeline = pipeline(&completion, &mut samples, &mut records);
        pipeline.start().unwrap();

        pipeline.output.refuse = true;
        for code in 1..=4 {
            interrupt(&completion, code);
            pipeline.tick();
        }
        assert_eq!(pipeline.buffered(), 2);
        assert!(pipeline
            .errors()
            .records()
            .any(|record| record.kind == ErrorKind::BufferOverflow
                && record.severity == Severity::Info));

        pipeline.output.refuse = false;
        interrupt(&completion, 5);
        assert_eq!(pipeline.tick(), 2);
        let sent = &pipeline.output().sent[1..];
        assert!(sent[0].starts_with("Smp 00003 | ADC:    4"));
        assert!(sent[1].starts_with("Smp 00004 | ADC:    5"));
    }

    #[test]
    fn chain_fault_is_logged_and_polling_continues() {
        let completion = Completion::new();
        let mut samples = [Sample::default(); 4];
        let mut records = [ErrorRecord::default(); ERROR_HISTORY];
        let mut pipeline = pipeline(&completion, &mut samples, &mut records);
        pipeline.start().unwrap();

        pipeline.source.chain_mut().fault = Some(Error::Hardware);
        interrupt(&completion, 1);
        assert_eq!(pipeline.tick(), 0);
        let last = pipeline.errors().last();
        assert_eq!(last.kind, ErrorKind::HardwareFault);
        assert_eq!(last.severity, Severity::Error);

        for _ in 0..10 {
            assert_eq!(pipeline.tick(), 0);
        }
        assert_eq!(pipeline.errors().observed_count(), 1);
        assert!(!pipeline.errors().is_critical());
    }

    #[test]
    fn transfer_fault_is_logged_as_hardware_fault() {
        let completion = Completion::new();
        let mut samples = [Sample::default(); 4];
        let mut records = [ErrorRecord::default(); ERROR_HISTORY];
        let mut pipeline = pipeline(&completion, &mut samples, &mut records);
        pipeline.start().unwrap();

        pipeline.source.chain_mut().fault = Some(Error::Transfer);
        assert_eq!(pipeline.tick(), 0);
        let last = pipeline.errors().last();
        assert_eq!(last.kind, ErrorKind::HardwareFault);
        assert_eq!(last.severity, Severity::Error);
        assert_eq!(last.message, "DMA transfer fault");
    }

    #[test]
    fn out_of_range_code_is_dropped() {
        let completion = Completion::new();
        let mut samples = [Sample::default(); 4];
        let mut records = [ErrorRecord::default(); ERROR_HISTORY];
        let mut pipeline = pipeline(&completion, &mut samples, &mut records);
        pipeline.start().unwrap();

        interrupt(&completion, 4096);
        assert_eq!(pipeline.tick(), 0);
        assert_eq!(pipeline.buffered(), 0);
        assert_eq!(pipeline.errors().last().kind, ErrorKind::InvalidParameter);

        interrupt(&completion, 0);
        assert_eq!(pipeline.tick(), 1);
    }

    #[test]
    fn landing_cell_overrun_is_logged() {
        let completion = Completion::new();
        let mut samples = [Sample::default(); 4];
        let mut records = [ErrorRecord::default(); ERROR_HISTORY];
        let mut pipeline = pipeline(&completion, &mut samples, &mut records);
        pipeline.start().unwrap();

        interrupt(&completion, 1);
        interrupt(&completion, 2);
        assert_eq!(pipeline.tick(), 1);
        let last = pipeline.errors().last();
        assert_eq!(last.kind, ErrorKind::BufferOverflow);
        assert_eq!(last.severity, Severity::Warning);
        assert!(pipeline.output().sent[1].starts_with("Smp 00001 | ADC:    2"));
    }

    #[test]
    fn start_without_init_is_recorded() {
        let completion = Completion::new();
        let mut samples = [Sample::default(); 4];
        let mut records = [ErrorRecord::default(); ERROR_HISTORY];
        let source = SampleSource::new(
            MockChain::default(),
            ManualClock::default(),
            &completion,
            &Config::DEFAULT,
        );
        let mut pipeline = AcquisitionPipeline::new(
            source,
            RingBuffer::new(&mut samples).unwrap(),
            ErrorLog::new(&mut records).unwrap(),
            UnitConverter::new(4095, 3300).unwrap(),
            Lines::default(),
        );
        assert_eq!(pipeline.start(), Err(Error::Hardware));
        assert_eq!(pipeline.errors().last().kind, ErrorKind::HardwareFault);
    }
}
