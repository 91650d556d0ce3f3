use cortex_m::peripheral::SYST;
use stm32g0xx_hal::dma::C1;
use stm32g0xx_hal::gpio::gpioa::{PA0, PA5};
use stm32g0xx_hal::gpio::{Analog, Output, PushPull};
use stm32g0xx_hal::hal::blocking::delay::DelayMs;
use stm32g0xx_hal::prelude::OutputPin;
use stm32g0xx_hal::rcc::{Config, PllConfig, Rcc, RccExt};
use stm32g0xx_hal::serial::{FullConfig, Tx};
use stm32g0xx_hal::stm32g0::stm32g070::{RCC, USART2};
use stm32g0xx_hal::timer::delay::Delay;

use crate::hw::adc::AdcChain;
use crate::hw::serial::SerialOutput;
use crate::hw::timers::MonotonicClock;
use crate::pipeline::AcquisitionPipeline;

pub fn init_clock(pac_rcc: RCC) -> Rcc {
    // ((16 MHz / 4) * 32) / 2 = 64 MHz
    let pll_config = PllConfig::with_hsi(4, 32, 2);
    pac_rcc.freeze(Config::pll().pll_cfg(pll_config))
}

// ADC DMA channel
type DmaChannel = C1;
// PA0 - ADC input channel
type InputChannel = PA0<Analog>;
// PA2 - USART2_TX
pub type SerialTx = Tx<USART2, FullConfig>;
// PA5 - user LED (LD4 on the Nucleo board)
pub type StatusLed = PA5<Output<PushPull>>;

// RESERVED for future use
// PA3 - USART2_RX

pub type Chain = AdcChain<InputChannel, DmaChannel>;
pub type Pipeline = AcquisitionPipeline<'static, Chain, MonotonicClock, SerialOutput<SerialTx>>;

/// Repeats three short blinks and a pause, forever.
///
/// Used when the acquisition chain cannot be brought up.
pub fn halt(led: &mut StatusLed, delay: &mut Delay<SYST>) -> ! {
    loop {
        for _ in 0..3 {
            led.set_high().ok();
            delay.delay_ms(100u16);
            led.set_low().ok();
            delay.delay_ms(100u16);
        }
        delay.delay_ms(600u16);
    }
}
