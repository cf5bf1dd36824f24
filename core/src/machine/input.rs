use bit_field::BitField;

use crate::{
    primitives::Byte,
    machine::interrupt::{InterruptController, Interrupt},
};


/// Manages the joypad registers (`JOYB`, `JOYD` and `JOYC`) and requests the
/// joypad interrupt on button presses.
pub(crate) struct Joypad {
    /// Pressed state of the eight buttons, one bit per [`JoypadButton`].
    buttons: u8,

    /// Pressed state of the four d-pad directions, one bit per [`JoypadDpad`].
    dpad: u8,

    /// `JOYC` control register:
    ///
    /// - Bit 0: joypad enable
    /// - Bit 1: buttons selected
    /// - Bit 2: d-pad selected
    control: Byte,
}

impl Joypad {
    /// Creates a joypad with nothing pressed and everything selected.
    pub(crate) fn new() -> Self {
        Self {
            buttons: 0,
            dpad: 0,
            control: Byte::new(0b111),
        }
    }

    /// Reads the `JOYB` button bitmap. Reads as 0 unless the joypad is
    /// enabled and buttons are selected.
    pub(crate) fn read_reg_joyb(&self) -> Byte {
        if self.is_enabled() && self.buttons_selected() {
            Byte::new(self.buttons)
        } else {
            Byte::zero()
        }
    }

    /// Reads the `JOYD` d-pad bitmap. Reads as 0 unless the joypad is enabled
    /// and the d-pad is selected.
    pub(crate) fn read_reg_joyd(&self) -> Byte {
        if self.is_enabled() && self.dpad_selected() {
            Byte::new(self.dpad)
        } else {
            Byte::zero()
        }
    }

    pub(crate) fn read_reg_joyc(&self) -> Byte {
        self.control
    }

    pub(crate) fn write_reg_joyc(&mut self, byte: Byte) {
        self.control = byte;
    }

    /// Applies the host's key state. A fresh press of a selected half of the
    /// pad requests the joypad interrupt.
    pub(crate) fn handle_input(
        &mut self,
        keys: Keys,
        interrupt_controller: &mut InterruptController,
    ) {
        let fresh_buttons = !self.buttons & keys.buttons;
        let fresh_dpad = !self.dpad & keys.dpad;
        self.buttons = keys.buttons;
        self.dpad = keys.dpad & 0x0f;

        if self.is_enabled() {
            let press = (self.buttons_selected() && fresh_buttons != 0)
                || (self.dpad_selected() && fresh_dpad != 0);
            if press {
                interrupt_controller.request_interrupt(Interrupt::Joypad);
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.control.get().get_bit(0)
    }

    fn buttons_selected(&self) -> bool {
        self.control.get().get_bit(1)
    }

    fn dpad_selected(&self) -> bool {
        self.control.get().get_bit(2)
    }
}

/// The pressed keys of the handheld, as sampled by the host. Buttons and
/// d-pad directions live in separate bitmaps, mirroring the two read-side
/// registers (1 = pressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Keys {
    buttons: u8,
    dpad: u8,
}

impl Keys {
    /// Creates an instance with no keys pressed.
    pub fn none() -> Self {
        Self::default()
    }

    /// Sets the given button in this instance to the given state.
    pub fn set_button(mut self, button: JoypadButton, is_pressed: bool) -> Self {
        self.buttons.set_bit(button as usize, is_pressed);
        self
    }

    /// Sets the given d-pad direction in this instance to the given state.
    pub fn set_dpad(mut self, dpad: JoypadDpad, is_pressed: bool) -> Self {
        self.dpad.set_bit(dpad as usize, is_pressed);
        self
    }
}

/// One of the eight face/shoulder buttons. The discriminant is the bit index
/// in `JOYB`.
#[derive(Clone, Copy, Debug)]
pub enum JoypadButton {
    A = 0,
    B,
    X,
    Y,
    L,
    R,
    Select,
    Start,
}

/// One of the four d-pad directions. The discriminant is the bit index in
/// `JOYD`.
#[derive(Clone, Copy, Debug)]
pub enum JoypadDpad {
    Up = 0,
    Down,
    Left,
    Right,
}

#[cfg(test)]
mod test {
    use super::*;


    fn run(control: u8, keys: Keys) -> (u8, u8, bool) {
        let mut joypad = Joypad::new();
        let mut ic = InterruptController::new();
        joypad.write_reg_joyc(Byte::new(control));
        joypad.handle_input(keys, &mut ic);
        (
            joypad.read_reg_joyb().get(),
            joypad.read_reg_joyd().get(),
            ic.any_requested(),
        )
    }

    #[test]
    fn test_disabled_pad_reads_zero() {
        let keys = Keys::none()
            .set_button(JoypadButton::A, true)
            .set_dpad(JoypadDpad::Up, true);

        assert_eq!(run(0b000, keys), (0, 0, false));
    }

    #[test]
    fn test_selection_gates_the_registers() {
        let keys = Keys::none()
            .set_button(JoypadButton::Start, true)
            .set_dpad(JoypadDpad::Left, true);

        // Only buttons selected.
        assert_eq!(run(0b011, keys), (0b1000_0000, 0, true));
        // Only the d-pad selected.
        assert_eq!(run(0b101, keys), (0, 0b0100, true));
        // Both halves selected.
        assert_eq!(run(0b111, keys), (0b1000_0000, 0b0100, true));
    }

    #[test]
    fn test_interrupt_only_on_fresh_presses() {
        let mut joypad = Joypad::new();
        let mut ic = InterruptController::new();

        let keys = Keys::none().set_button(JoypadButton::B, true);
        joypad.handle_input(keys, &mut ic);
        assert!(ic.any_requested());

        // Holding the button does not retrigger.
        ic.store_ir(Byte::zero());
        joypad.handle_input(keys, &mut ic);
        assert!(!ic.any_requested());

        // Releasing does not trigger either.
        joypad.handle_input(Keys::none(), &mut ic);
        assert!(!ic.any_requested());
    }
}
