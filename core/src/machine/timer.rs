use bit_field::BitField;

use crate::{
    primitives::Byte,
    machine::interrupt::{InterruptController, Interrupt},
};


/// Manages the four timer registers and is responsible for triggering the
/// timer interrupt.
pub(crate) struct Timer {
    /// Internal 16-bit divider. The DIV register reads its high byte; any
    /// write to DIV clears the whole divider.
    divider: u16,

    /// TIMA: incremented as configured by `control`.
    counter: Byte,

    /// TMA: when `counter` runs over, it is replaced with this value.
    modulo: Byte,

    /// TAC control register:
    ///
    /// - Bit 2: timer enable
    /// - Bits 1 & 0: speed of `counter` increase
    control: Byte,
}

impl Timer {
    pub(crate) fn new() -> Self {
        Timer {
            divider: 0,
            counter: Byte::zero(),
            modulo: Byte::zero(),
            control: Byte::zero(),
        }
    }

    pub(crate) fn read_reg_div(&self) -> Byte {
        Byte::new((self.divider >> 8) as u8)
    }

    pub(crate) fn read_reg_tima(&self) -> Byte {
        self.counter
    }

    pub(crate) fn read_reg_tma(&self) -> Byte {
        self.modulo
    }

    pub(crate) fn read_reg_tac(&self) -> Byte {
        self.control
    }

    pub(crate) fn write_reg_div(&mut self) {
        self.divider = 0;
    }

    pub(crate) fn write_reg_tima(&mut self, byte: Byte) {
        self.counter = byte;
    }

    pub(crate) fn write_reg_tma(&mut self, byte: Byte) {
        self.modulo = byte;
    }

    pub(crate) fn write_reg_tac(&mut self, byte: Byte) {
        self.control = byte;
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.control.get().get_bit(2)
    }

    /// Advances the timer by one dot tick. `stopped` reflects the CPU's stop
    /// flag; a stopped machine freezes its timer.
    pub(crate) fn tick(&mut self, stopped: bool, interrupt_controller: &mut InterruptController) {
        if stopped {
            return;
        }

        let old_divider = self.divider;
        self.divider = self.divider.wrapping_add(1);

        if !self.is_enabled() {
            return;
        }

        // The clock speed setting selects which divider bit clocks the
        // counter. The counter increments on the falling edge of that bit.
        let check_bit = match self.control.get() & 0b11 {
            0b00 => 9,
            0b01 => 3,
            0b10 => 5,
            0b11 => 7,
            _ => unreachable!(),
        };

        if old_divider.get_bit(check_bit) && !self.divider.get_bit(check_bit) {
            self.counter += 1;

            // The counter reaching its ceiling reloads it from the modulo
            // register and raises the timer interrupt.
            if self.counter == 0xff {
                self.counter = self.modulo;
                interrupt_controller.request_interrupt(Interrupt::Timer);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;


    #[test]
    fn test_div_counts_and_clears() {
        let mut timer = Timer::new();
        let mut ic = InterruptController::new();

        for _ in 0..0x100 {
            timer.tick(false, &mut ic);
        }
        assert_eq!(timer.read_reg_div(), 0x01);

        timer.write_reg_div();
        assert_eq!(timer.read_reg_div(), 0x00);
    }

    #[test]
    fn test_counter_reload_requests_interrupt() {
        let mut timer = Timer::new();
        let mut ic = InterruptController::new();

        // Fastest rate (divider bit 3), counter one step from the ceiling.
        timer.write_reg_tac(Byte::new(0b101));
        timer.write_reg_tma(Byte::new(0xa0));
        timer.write_reg_tima(Byte::new(0xfe));

        // One full period of bit 3 is 16 ticks.
        for _ in 0..16 {
            timer.tick(false, &mut ic);
        }

        assert_eq!(timer.read_reg_tima(), 0xa0);
        assert!(ic.any_requested());
    }

    #[test]
    fn test_stopped_machine_freezes_the_timer() {
        let mut timer = Timer::new();
        let mut ic = InterruptController::new();

        for _ in 0..0x1000 {
            timer.tick(true, &mut ic);
        }
        assert_eq!(timer.read_reg_div(), 0x00);
    }
}
