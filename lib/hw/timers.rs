use core::sync::atomic::{AtomicU32, Ordering};

use stm32g0xx_hal::hal::timer::CountDown;
use stm32g0xx_hal::hal::PwmPin as PwmPinTrait;
use stm32g0xx_hal::rcc::Rcc;
use stm32g0xx_hal::stm32g0::stm32g070::{TIM1, TIM7};
use stm32g0xx_hal::time::{MicroSecond, U32Ext};
use stm32g0xx_hal::timer::pins::TimerPin;
use stm32g0xx_hal::timer::pwm::{Pwm, PwmExt, PwmPin};
use stm32g0xx_hal::timer::{Channel4, Timer, TimerExt};

use crate::error::{Error, Result};
use crate::source::{Clock, Timestamp};

// Written by the TIM7 handler only
static MILLIS: AtomicU32 = AtomicU32::new(0);

/// Drives [`MILLIS`] from a 1 ms TIM7 update interrupt.
pub struct MillisTimer {
    timer: Timer<TIM7>,
    period: MicroSecond,
}

impl MillisTimer {
    pub fn new(pac_tim: TIM7, rcc: &mut Rcc) -> Self {
        MillisTimer {
            timer: pac_tim.timer(rcc),
            period: 1.ms(),
        }
    }

    pub fn start(&mut self) {
        self.timer.clear_irq();
        self.timer.listen();
        self.timer.start(self.period);
    }

    /// Call from the TIM7 handler.
    pub fn tick(&mut self) {
        self.timer.clear_irq();
        let now = MILLIS.load(Ordering::Relaxed);
        MILLIS.store(now.wrapping_add(1), Ordering::Relaxed);
    }
}

#[derive(Copy, Clone, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn millis() -> u32 {
        MILLIS.load(Ordering::Relaxed)
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(MonotonicClock::millis())
    }
}

struct UnusedPin;

impl TimerPin<TIM1> for UnusedPin {
    type Channel = Channel4;

    fn setup(&self) {
        // Do nothing
    }

    fn release(self) -> Self {
        self
    }
}

/// TIM1 channel 4 compare events, used as the ADC external trigger.
pub struct SampleTimer {
    timer: Pwm<TIM1>,
    trig: PwmPin<TIM1, Channel4>,
}

impl SampleTimer {
    // Any rate the prescaler can reach from the 64 MHz timer clock
    const MAX_RATE_HZ: u32 = 1_000_000;

    pub fn new(pac_timer: TIM1, rcc: &mut Rcc) -> Self {
        let timer = pac_timer.pwm(1.hz(), rcc);
        let trig = timer.bind_pin(UnusedPin);
        SampleTimer { timer, trig }
    }

    pub fn set_rate(&mut self, rate_hz: u32) -> Result<()> {
        if rate_hz == 0 || rate_hz > Self::MAX_RATE_HZ {
            return Err(Error::Timer);
        }
        self.timer.set_freq(rate_hz.hz());
        Ok(())
    }

    pub fn start(&mut self) {
        self.trig.set_duty(self.trig.get_max_duty() / 2);
        self.trig.enable();
    }

    pub fn stop(&mut self) {
        self.trig.disable();
    }
}
