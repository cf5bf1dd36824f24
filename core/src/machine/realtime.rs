use std::time::{SystemTime, UNIX_EPOCH};

use bit_field::BitField;

use crate::{
    primitives::Byte,
    machine::interrupt::{InterruptController, Interrupt},
};


/// The realtime clock peripheral. It mirrors the host's wall clock into a
/// handful of registers and, when enabled, requests an interrupt whenever the
/// seconds value changes.
pub(crate) struct Realtime {
    divider: u16,
    seconds: u8,
    minutes: u8,
    hours: u8,
    days: u16,

    /// RTC control register; bit 0 enables the clock.
    control: Byte,
}

impl Realtime {
    pub(crate) fn new() -> Self {
        let mut realtime = Realtime {
            divider: 0,
            seconds: 0,
            minutes: 0,
            hours: 0,
            days: 0,
            control: Byte::zero(),
        };
        realtime.refresh();
        realtime
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.control.get().get_bit(0)
    }

    pub(crate) fn read_reg_rts(&self) -> Byte {
        Byte::new(self.seconds)
    }

    pub(crate) fn read_reg_rtm(&self) -> Byte {
        Byte::new(self.minutes)
    }

    pub(crate) fn read_reg_rth(&self) -> Byte {
        Byte::new(self.hours)
    }

    pub(crate) fn read_reg_rtdl(&self) -> Byte {
        Byte::new((self.days & 0xff) as u8)
    }

    pub(crate) fn read_reg_rtdh(&self) -> Byte {
        Byte::new((self.days >> 8) as u8)
    }

    pub(crate) fn read_reg_rtc(&self) -> Byte {
        self.control
    }

    pub(crate) fn write_reg_rtc(&mut self, byte: Byte) {
        self.control = byte;
    }

    /// Advances the clock by one dot tick. The registers resynchronize with
    /// the host clock on every falling edge of divider bit 9.
    pub(crate) fn tick(&mut self, interrupt_controller: &mut InterruptController) {
        let old_divider = self.divider;
        self.divider = self.divider.wrapping_add(1);

        if !self.is_enabled() {
            return;
        }

        if old_divider.get_bit(9) && !self.divider.get_bit(9) {
            let old_seconds = self.seconds;
            self.refresh();

            if self.seconds != old_seconds {
                interrupt_controller.request_interrupt(Interrupt::Realtime);
            }
        }
    }

    /// Reloads all clock registers from the host's wall clock.
    fn refresh(&mut self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let seconds = now.as_secs();
        self.seconds = (seconds % 60) as u8;
        self.minutes = ((seconds / 60) % 60) as u8;
        self.hours = ((seconds / 3600) % 24) as u8;
        self.days = (((seconds / 86400) & 0xffff) % 365) as u16;
    }
}

#[cfg(test)]
mod test {
    use super::*;


    #[test]
    fn test_registers_hold_a_plausible_time() {
        let realtime = Realtime::new();
        assert!(realtime.read_reg_rts().get() < 60);
        assert!(realtime.read_reg_rtm().get() < 60);
        assert!(realtime.read_reg_rth().get() < 24);
    }

    #[test]
    fn test_disabled_clock_stays_quiet() {
        let mut realtime = Realtime::new();
        let mut ic = InterruptController::new();

        for _ in 0..0x10000u32 {
            realtime.tick(&mut ic);
        }
        assert!(!ic.any_requested());
    }
}
