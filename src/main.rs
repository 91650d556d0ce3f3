#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;

use lib::Completion;

/// Landing cell shared by the DMA, its interrupt and the idle loop.
static COMPLETION: Completion = Completion::new();

defmt::timestamp!("{=u32}", lib::hw::MonotonicClock::millis());

#[rtic::app(device = stm32g0xx_hal::stm32, peripherals = true)]
mod app {
    use cortex_m::singleton;
    use lib::fault::ERROR_HISTORY;
    use lib::hw::{halt, init_clock, AdcChain, MillisTimer, MonotonicClock, Pipeline};
    use lib::hw::{SerialOutput, StatusLed, TransferIrq};
    use lib::{describe, AcquisitionPipeline, Config, ErrorLog, ErrorRecord};
    use lib::{RingBuffer, Sample, SampleSource, UnitConverter};
    use stm32g0xx_hal::delay::DelayExt;
    use stm32g0xx_hal::dma::DmaExt;
    use stm32g0xx_hal::dmamux::DmaMuxIndex;
    use stm32g0xx_hal::gpio::GpioExt;
    use stm32g0xx_hal::hal::digital::v2::ToggleableOutputPin;
    use stm32g0xx_hal::prelude::*;
    use stm32g0xx_hal::serial::FullConfig;
    use stm32g0xx_hal::time::U32Ext;

    const CONFIG: Config = Config::DEFAULT;
    const SAMPLES: usize = Config::DEFAULT.buffer_capacity;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        pipeline: Pipeline,
        led: StatusLed,
        transfer: TransferIrq,
        millis: MillisTimer,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        let core = cx.core;
        let device = cx.device;
        defmt::info!("ADC monitor startup");

        // Buffers
        let samples: &'static mut [Sample; SAMPLES] =
            singleton!(: [Sample; SAMPLES] = [Sample::default(); SAMPLES]).unwrap();
        let records: &'static mut [ErrorRecord; ERROR_HISTORY] =
            singleton!(: [ErrorRecord; ERROR_HISTORY] = [ErrorRecord::default(); ERROR_HISTORY])
                .unwrap();

        // Clock
        let mut rcc = init_clock(device.RCC);
        let mut delay = core.SYST.delay(&mut rcc);

        // GPIO
        let gpioa = device.GPIOA.split(&mut rcc);
        let mut led: StatusLed = gpioa.pa5.into_push_pull_output();

        // Serial
        let serial = match device.USART2.usart(
            gpioa.pa2,
            gpioa.pa3,
            FullConfig::default().baudrate(CONFIG.baud_rate.bps()),
            &mut rcc,
        ) {
            Ok(serial) => serial,
            Err(_) => {
                defmt::error!("USART2 setup failed");
                halt(&mut led, &mut delay)
            }
        };
        let (tx, _rx) = serial.split();

        // ADC
        let dma = device.DMA.split(&mut rcc, device.DMAMUX);
        let mut ch1 = dma.ch1;
        ch1.mux().select_peripheral(DmaMuxIndex::ADC);
        let (chain, transfer) = AdcChain::new(
            device.ADC,
            device.TIM1,
            gpioa.pa0,
            ch1,
            &crate::COMPLETION,
            &mut rcc,
            &mut delay,
        );
        let mut source = SampleSource::new(chain, MonotonicClock, &crate::COMPLETION, &CONFIG);
        if let Err(err) = source.init() {
            defmt::error!("acquisition chain unavailable: {}", err);
            halt(&mut led, &mut delay)
        }

        let (buffer, errors, converter) = match (
            RingBuffer::new(samples),
            ErrorLog::new(records),
            UnitConverter::new(CONFIG.max_code, CONFIG.reference_mv),
        ) {
            (Ok(buffer), Ok(errors), Ok(converter)) => (buffer, errors, converter),
            _ => {
                defmt::error!("invalid pipeline setup: {}", CONFIG);
                halt(&mut led, &mut delay)
            }
        };
        let pipeline = AcquisitionPipeline::new(
            source,
            buffer,
            errors,
            converter,
            SerialOutput::new(tx),
        );

        let mut millis = MillisTimer::new(device.TIM7, &mut rcc);
        millis.start();

        (
            Shared {},
            Local {
                pipeline,
                led,
                transfer,
                millis,
            },
            init::Monotonics(),
        )
    }

    #[idle(local = [pipeline, led])]
    fn idle(cx: idle::Context) -> ! {
        let pipeline: &mut Pipeline = cx.local.pipeline;
        let led: &mut StatusLed = cx.local.led;

        if let Err(err) = pipeline.start() {
            defmt::error!("sampling not started: {}", err);
        } else {
            defmt::info!("sampling at {=u32} Hz", CONFIG.sample_rate_hz);
        }

        let mut seen = 0;
        loop {
            // Blink per forwarded sample
            if pipeline.tick() > 0 {
                led.toggle().ok();
            }

            let errors = pipeline.errors();
            if errors.observed_count() != seen {
                for record in errors.since(seen) {
                    defmt::warn!(
                        "{} ({}): {}",
                        describe(record.kind),
                        record.severity,
                        record.message
                    );
                }
                seen = errors.observed_count();
            }
        }
    }

    #[task(binds = DMA_CHANNEL1, priority = 2, local = [transfer])]
    fn dma(cx: dma::Context) {
        let transfer: &mut TransferIrq = cx.local.transfer;

        transfer.unpend();
        crate::COMPLETION.complete();
    }

    #[task(binds = TIM7, priority = 3, local = [millis])]
    fn tim7(cx: tim7::Context) {
        let millis: &mut MillisTimer = cx.local.millis;

        millis.tick();
    }
}
