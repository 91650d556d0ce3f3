use stm32g0xx_hal::analog::adc::Adc as HalAdc;
use stm32g0xx_hal::dma::{Channel as DmaChannel, Direction, Event, Priority, WordSize};
use stm32g0xx_hal::hal::adc::Channel as AdcChannel;
use stm32g0xx_hal::hal::blocking::delay::DelayUs;
use stm32g0xx_hal::rcc::Rcc;
use stm32g0xx_hal::stm32::DMA;
use stm32g0xx_hal::stm32g0::stm32g070::{ADC, RCC, SYST, TIM1};
use stm32g0xx_hal::timer::delay::Delay;

use crate::error::{Error, Result};
use crate::hw::timers::SampleTimer;
use crate::source::{Acquisition, Completion};

// Busy-wait bound for ADC enable, disable and calibration flags
const SPIN_LIMIT: u32 = 100_000;

/// Timer-triggered ADC feeding the landing cell over a circular one-word DMA.
pub struct AdcChain<I, C> {
    adc: InnerAdc<I>,
    dma: Dma<C>,
    trig: SampleTimer,
    landing_addr: u32,
}

impl<I, C> AdcChain<I, C>
where
    I: AdcChannel<HalAdc, ID = u8>,
    C: DmaChannel,
{
    pub fn new(
        pac_adc: ADC,
        pac_timer: TIM1,
        input: I,
        dma_channel: C,
        completion: &'static Completion,
        rcc: &mut Rcc,
        delay: &mut Delay<SYST>,
    ) -> (Self, TransferIrq) {
        let adc = InnerAdc::new(pac_adc, input, rcc, delay);
        let chain = AdcChain {
            adc,
            dma: Dma { channel: dma_channel },
            trig: SampleTimer::new(pac_timer, rcc),
            landing_addr: completion.cell_address(),
        };
        (chain, TransferIrq)
    }
}

impl<I, C> Acquisition for AdcChain<I, C>
where
    I: AdcChannel<HalAdc, ID = u8>,
    C: DmaChannel,
{
    fn configure(&mut self, sample_rate_hz: u32, channel: u8) -> Result<()> {
        if channel != I::channel() {
            return Err(Error::InvalidParameter);
        }
        // Calibration needs the ADC disabled
        self.adc.disable()?;
        self.adc.calibrate()?;
        self.adc.enable()?;
        self.adc.configure();
        self.dma
            .configure(InnerAdc::<I>::get_dma_address(), self.landing_addr);
        self.trig.set_rate(sample_rate_hz)
    }

    fn arm(&mut self) {
        self.adc.start();
        self.dma.start();
        self.trig.start();
    }

    fn disarm(&mut self) {
        self.trig.stop();
    }

    fn fault(&mut self) -> Result<()> {
        if self.dma.transfer_error() {
            return Err(Error::Transfer);
        }
        if self.adc.overrun() {
            return Err(Error::Hardware);
        }
        Ok(())
    }
}

pub struct TransferIrq;

impl TransferIrq {
    pub fn unpend(&mut self) {
        // Channel 1 only, the rest of IFCR is left alone
        unsafe { (*DMA::ptr()).ifcr.write(|w| w.ctcif1().set_bit()) };
    }
}

struct Dma<C> {
    channel: C,
}

impl<C> Dma<C>
where
    C: DmaChannel,
{
    fn start(&mut self) {
        self.channel.clear_event(Event::TransferComplete);
        self.channel.listen(Event::TransferComplete);
        self.channel.enable();
    }

    fn transfer_error(&self) -> bool {
        self.channel.event_occurred(Event::TransferError)
    }

    fn configure(&mut self, peripheral_addr: u32, memory_addr: u32) {
        self.channel.disable();
        self.channel.set_priority_level(Priority::VeryHigh);
        self.channel.set_word_size(WordSize::BITS16);
        self.channel.set_direction(Direction::FromPeripheral);
        self.channel.set_peripheral_address(peripheral_addr, false);
        // Single landing cell, no memory increment
        self.channel.set_memory_address(memory_addr, false);
        self.channel.set_transfer_length(1);
        self.channel.set_circular_mode(true);
    }
}

struct InnerAdc<I> {
    adc: ADC,
    _input: I,
}

impl<I> InnerAdc<I>
where
    I: AdcChannel<HalAdc, ID = u8>,
{
    fn new<D: DelayUs<u8>>(pac_adc: ADC, input: I, rcc: &mut Rcc, delay: &mut D) -> Self {
        InnerAdc::<I>::enable_clock_and_reset(rcc);
        let mut adc = InnerAdc {
            adc: pac_adc,
            _input: input,
        };
        // Out of reset, ADEN is clear
        adc.enable_vreg(delay);
        adc
    }

    fn start(&mut self) {
        self.adc.isr.write(|w| {
            w.eoc().set_bit();
            w.ovr().set_bit()
        });
        self.adc.cr.modify(|_, w| w.adstart().set_bit());
    }

    fn overrun(&self) -> bool {
        self.adc.isr.read().ovr().bit_is_set()
    }

    fn get_dma_address() -> u32 {
        unsafe { &(*ADC::ptr()).dr as *const _ as u32 }
    }

    fn configure(&mut self) {
        self.adc.cfgr1.write(|w| unsafe {
            // External trigger rising edge
            w.exten().bits(0b01);
            // TRG1, TIM1_CC4
            w.extsel().bits(0b001);
            // Right alignment
            w.align().clear_bit();
            // 12-bit resolution
            w.res().bits(0b00);
            // Circular DMA
            w.dmacfg().set_bit();
            // Enable DMA requests
            w.dmaen().set_bit()
        });
        // 160.5 cycles for the best precision
        self.adc.smpr.write(|w| unsafe { w.smp1().bits(0b111) });
        self.adc
            .chselr()
            .write(|w| unsafe { w.chsel().bits(1 << I::channel()) });
    }

    fn enable_clock_and_reset(_: &mut Rcc) {
        let rcc = unsafe { &(*RCC::ptr()) };
        rcc.apbenr2.modify(|_, w| w.adcen().set_bit());
        rcc.apbrstr2.modify(|_, w| w.adcrst().set_bit());
        rcc.apbrstr2.modify(|_, w| w.adcrst().clear_bit());
    }

    fn enable_vreg<D: DelayUs<u8>>(&mut self, delay: &mut D) {
        self.adc.cr.modify(|_, w| w.advregen().set_bit());
        // Max starting time declared by stm32g070 datasheet is 20 us
        delay.delay_us(20);
    }

    fn enable(&mut self) -> Result<()> {
        self.adc.isr.write(|w| w.adrdy().set_bit());
        self.adc.cr.modify(|_, w| w.aden().set_bit());
        spin_until(|| self.adc.isr.read().adrdy().bit_is_set())
    }

    fn disable(&mut self) -> Result<()> {
        let cr = self.adc.cr.read();
        if cr.aden().bit_is_clear() {
            return Ok(());
        }
        if cr.adstart().bit_is_set() {
            self.adc.cr.modify(|_, w| w.adstp().set_bit());
        }
        self.adc.cr.modify(|_, w| w.addis().set_bit());
        spin_until(|| self.adc.cr.read().aden().bit_is_clear())?;
        self.adc.isr.write(|w| w.adrdy().set_bit());
        Ok(())
    }

    fn calibrate(&mut self) -> Result<()> {
        self.adc.cr.modify(|_, w| w.adcal().set_bit());
        spin_until(|| self.adc.isr.read().eocal().bit_is_set())?;
        self.adc.isr.write(|w| w.eocal().set_bit());
        Ok(())
    }
}

fn spin_until<F: FnMut() -> bool>(mut done: F) -> Result<()> {
    for _ in 0..SPIN_LIMIT {
        if done() {
            return Ok(());
        }
    }
    Err(Error::Hardware)
}
