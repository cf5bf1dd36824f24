//! The window-backed peripherals handed to the emulator.

use minifb::{Key, Window};

use sm166::{
    SCREEN_WIDTH,
    env::Peripherals,
    machine::input::{Keys, JoypadButton, JoypadDpad},
    primitives::PixelColor,
};


/// What the emulator sees of the host: the sampled key state and the
/// framebuffer the finished scanlines land in.
pub(crate) struct DesktopPeripherals {
    /// Framebuffer in the `0x00RRGGBB` layout `minifb` presents.
    pub(crate) buffer: Vec<u32>,

    /// Key state sampled once per frame from the window.
    pub(crate) keys: Keys,
}

impl DesktopPeripherals {
    pub(crate) fn new(buffer_len: usize) -> Self {
        Self {
            buffer: vec![0; buffer_len],
            keys: Keys::none(),
        }
    }
}

impl Peripherals for DesktopPeripherals {
    fn get_pressed_keys(&self) -> Keys {
        self.keys
    }

    fn write_lcd_line(&mut self, line_idx: u8, pixels: &[PixelColor]) {
        let start = line_idx as usize * SCREEN_WIDTH;
        for (src, dst) in pixels.iter().zip(&mut self.buffer[start..start + SCREEN_WIDTH]) {
            *dst = src.to_rgb_u32();
        }
    }
}

/// Samples the handheld's key state from the window.
///
/// The d-pad maps to WASD; the button cluster to J/K/I/N (A/B/X/Y), R/U for
/// the shoulders and H/G for select/start.
pub(crate) fn sample_keys(window: &Window) -> Keys {
    Keys::none()
        .set_dpad(JoypadDpad::Up, window.is_key_down(Key::W))
        .set_dpad(JoypadDpad::Down, window.is_key_down(Key::S))
        .set_dpad(JoypadDpad::Left, window.is_key_down(Key::A))
        .set_dpad(JoypadDpad::Right, window.is_key_down(Key::D))
        .set_button(JoypadButton::A, window.is_key_down(Key::J))
        .set_button(JoypadButton::B, window.is_key_down(Key::K))
        .set_button(JoypadButton::X, window.is_key_down(Key::I))
        .set_button(JoypadButton::Y, window.is_key_down(Key::N))
        .set_button(JoypadButton::L, window.is_key_down(Key::R))
        .set_button(JoypadButton::R, window.is_key_down(Key::U))
        .set_button(JoypadButton::Select, window.is_key_down(Key::H))
        .set_button(JoypadButton::Start, window.is_key_down(Key::G))
}
