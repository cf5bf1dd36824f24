use bit_field::BitField;

use crate::primitives::{Byte, Long};


/// Manages the interrupt enable (`IE`) and interrupt request (`IR`) registers.
///
/// The SM166 knows eight prioritized interrupt sources; bit `i` of both
/// registers belongs to interrupt `i` and interrupt 0 has the highest
/// priority. The assignment of the low bits:
///
/// ```text
///   7   6   5   4   3   2   1   0    <- Bits
/// +---+---+---+---+---+---+---+---+
/// | X | X |RTC|JOY|SER|TIM|LCD|VBL|
/// +---+---+---+---+---+---+---+---+
/// ```
///
/// Peripherals receive a `&mut InterruptController` when they are ticked and
/// request interrupts through it; the CPU dispatches them between
/// instructions.
pub struct InterruptController {
    /// The `IE` register. Only interrupts whose bit is set here are
    /// dispatched.
    pub interrupt_enable: Byte,

    /// The `IR` register: interrupts waiting to be handled.
    interrupt_request: Byte,
}

impl InterruptController {
    pub(crate) fn new() -> Self {
        InterruptController {
            interrupt_enable: Byte::zero(),
            interrupt_request: Byte::zero(),
        }
    }

    /// Requests the given interrupt by setting its `IR` bit.
    pub(crate) fn request_interrupt(&mut self, interrupt: Interrupt) {
        self.request_id(interrupt as u8);
    }

    /// Requests the interrupt with the given ID (0 to 7).
    pub fn request_id(&mut self, id: u8) {
        self.interrupt_request = self.interrupt_request.map(|mut b| {
            b.set_bit((id & 0b111) as usize, true);
            b
        });
    }

    /// Returns `true` if any interrupt is requested, enabled or not. This is
    /// what wakes the CPU from halt.
    pub(crate) fn any_requested(&self) -> bool {
        self.interrupt_request.get() != 0
    }

    /// Returns the ID of the highest-priority interrupt that is both enabled
    /// and requested, if any.
    pub(crate) fn pending(&self) -> Option<u8> {
        let ready = self.interrupt_enable.get() & self.interrupt_request.get();
        (0u8..8).find(|id| ready.get_bit(*id as usize))
    }

    /// Clears the `IR` bit of the given interrupt. Called when the CPU
    /// dispatches its handler.
    pub(crate) fn acknowledge(&mut self, id: u8) {
        self.interrupt_request = self.interrupt_request.map(|mut b| {
            b.set_bit((id & 0b111) as usize, false);
            b
        });
    }

    /// Returns the `IR` register.
    pub(crate) fn load_ir(&self) -> Byte {
        self.interrupt_request
    }

    /// Replaces the `IR` register.
    pub(crate) fn store_ir(&mut self, byte: Byte) {
        self.interrupt_request = byte;
    }
}

/// The interrupt sources wired up in the SM166 handheld. The discriminant is
/// the interrupt ID; IDs 6 and 7 are unassigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Interrupt {
    VBlank = 0,
    Lcd = 1,
    Timer = 2,
    #[allow(dead_code)]
    Serial = 3,
    Joypad = 4,
    Realtime = 5,
}

/// Returns the hard-coded handler address of the interrupt with the given ID.
pub(crate) fn handler_address(id: u8) -> Long {
    Long::new(0x80 + 0x10 * (id & 0b111) as u32)
}

#[cfg(test)]
mod test {
    use super::*;


    #[test]
    fn test_priority_order() {
        let mut ic = InterruptController::new();
        ic.interrupt_enable = Byte::new(0xff);
        ic.store_ir(Byte::new(0xff));

        assert_eq!(ic.pending(), Some(0));
        ic.acknowledge(0);
        assert_eq!(ic.pending(), Some(1));

        // Disabled interrupts are skipped, but still wake the CPU.
        ic.interrupt_enable = Byte::new(0b1000_0000);
        assert_eq!(ic.pending(), Some(7));
        assert!(ic.any_requested());
    }

    #[test]
    fn test_handler_addresses() {
        assert_eq!(handler_address(0), 0x80);
        assert_eq!(handler_address(3), 0xb0);
        assert_eq!(handler_address(7), 0xf0);
    }
}
