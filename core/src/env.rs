//! Interfaces to the host environment.

use crate::{
    SCREEN_WIDTH,
    machine::input::Keys,
    primitives::PixelColor,
};


/// Everything the emulator needs from its host: key input going in, finished
/// scanlines going out.
///
/// The emulator calls [`Peripherals::get_pressed_keys`] while it runs and
/// hands over the finished frame line by line when it reaches the vertical
/// blank.
pub trait Peripherals {
    /// Returns the currently pressed keys.
    fn get_pressed_keys(&self) -> Keys;

    /// Receives one finished scanline of the frame.
    fn write_lcd_line(&mut self, line_idx: u8, pixels: &[PixelColor]);
}

/// The width in pixels of the lines passed to
/// [`Peripherals::write_lcd_line`].
pub const LCD_LINE_WIDTH: usize = SCREEN_WIDTH;
