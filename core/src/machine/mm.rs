//! Everything related to memory mapping.
//!
//! The 32-bit address space routes to eight fixed regions:
//!
//! | Region | Base          | Size      |
//! |--------|---------------|-----------|
//! | ROM    | `0x0000_0000` | <= 64 MiB |
//! | WRAM   | `0x8000_0000` | 8 MiB     |
//! | SRAM   | `0x8100_0000` | 256 KiB   |
//! | VRAM   | `0x8200_0000` | 8 KiB x 2 |
//! | OAM    | `0x8200_4000` | 160 B     |
//! | Stack  | `0xFFFD_0000` | 64 KiB    |
//! | HRAM   | `0xFFFE_0000` | 64 KiB    |
//! | I/O    | `0xFFFF_FF00` | 256 B     |
//!
//! Reads from unmapped addresses float high (0xFF); writes there are dropped.

use super::Machine;
use crate::{
    primitives::{Byte, Word, Long},
};


pub(crate) const STACK_BASE: u32 = 0xfffd_0000;

impl Machine {
    /// Loads a byte from the given address.
    pub fn load_byte(&self, addr: Long) -> Byte {
        match addr.get() {
            0x0000_0000..=0x03ff_ffff => self.program.read_rom(addr.get()),
            0x8000_0000..=0x807f_ffff => self.wram[addr.get() - 0x8000_0000],
            0x8100_0000..=0x8103_ffff => self.program.read_sram(addr.get() - 0x8100_0000),
            0x8200_0000..=0x8200_1fff => self.ppu.read_vram(addr.get() - 0x8200_0000),
            0x8200_4000..=0x8200_409f => self.ppu.read_oam(addr.get() - 0x8200_4000),
            0xfffd_0000..=0xfffd_ffff => self.stack[addr.get() - 0xfffd_0000],
            0xfffe_0000..=0xfffe_ffff => self.hram[addr.get() - 0xfffe_0000],
            0xffff_ff00..=0xffff_ffff => self.read_io(addr.get() as u8),
            _ => Byte::new(0xff),
        }
    }

    /// Stores the given byte at the given address.
    pub fn store_byte(&mut self, addr: Long, byte: Byte) {
        match addr.get() {
            0x8000_0000..=0x807f_ffff => self.wram[addr.get() - 0x8000_0000] = byte,
            0x8100_0000..=0x8103_ffff => self.program.write_sram(addr.get() - 0x8100_0000, byte),
            0x8200_0000..=0x8200_1fff => self.ppu.write_vram(addr.get() - 0x8200_0000, byte),
            0x8200_4000..=0x8200_409f => self.ppu.write_oam(addr.get() - 0x8200_4000, byte),
            0xfffd_0000..=0xfffd_ffff => self.stack[addr.get() - 0xfffd_0000] = byte,
            0xfffe_0000..=0xfffe_ffff => self.hram[addr.get() - 0xfffe_0000] = byte,
            0xffff_ff00..=0xffff_ffff => self.write_io(addr.get() as u8, byte),
            _ => {} // silently dropped, like the ROM region
        }
    }

    /// Loads a word. Data on the bus is little-endian.
    pub fn load_word(&self, addr: Long) -> Word {
        let lsb = self.load_byte(addr);
        let msb = self.load_byte(addr + 1);

        Word::from_bytes(lsb, msb)
    }

    /// Loads a long. Data on the bus is little-endian.
    pub fn load_long(&self, addr: Long) -> Long {
        let b0 = self.load_byte(addr);
        let b1 = self.load_byte(addr + 1);
        let b2 = self.load_byte(addr + 2);
        let b3 = self.load_byte(addr + 3);

        Long::from_bytes(b0, b1, b2, b3)
    }

    /// Stores a word, little-endian.
    pub fn store_word(&mut self, addr: Long, word: Word) {
        let (lsb, msb) = word.into_bytes();
        self.store_byte(addr, lsb);
        self.store_byte(addr + 1, msb);
    }

    /// Stores a long, little-endian.
    pub fn store_long(&mut self, addr: Long, long: Long) {
        let (b0, b1, b2, b3) = long.into_bytes();
        self.store_byte(addr, b0);
        self.store_byte(addr + 1, b1);
        self.store_byte(addr + 2, b2);
        self.store_byte(addr + 3, b3);
    }

    /// Pushes one byte onto the stack. The stack pointer is decremented
    /// first and supplies the low 16 bits of the stack region address.
    pub fn push_byte(&mut self, byte: Byte) {
        self.cpu.sp -= 1;
        self.store_byte(Long::new(STACK_BASE + self.cpu.sp.get() as u32), byte);
    }

    /// Pops one byte from the stack, incrementing the stack pointer.
    pub fn pop_byte(&mut self) -> Byte {
        let byte = self.load_byte(Long::new(STACK_BASE + self.cpu.sp.get() as u32));
        self.cpu.sp += 1;
        byte
    }

    /// Pushes a word onto the stack, low byte first. Because pushes grow
    /// downwards this lays the word out big-endian in memory.
    pub fn push_word(&mut self, word: Word) {
        let (lsb, msb) = word.into_bytes();
        self.push_byte(lsb);
        self.push_byte(msb);
    }

    /// Pops a word pushed by [`Machine::push_word`].
    pub fn pop_word(&mut self) -> Word {
        let msb = self.pop_byte();
        let lsb = self.pop_byte();
        Word::from_bytes(lsb, msb)
    }

    /// Pushes a long onto the stack, low byte first (big-endian in memory;
    /// a little-endian `load_long` of the stack top does *not* reconstruct
    /// the pushed value, see the test below).
    pub fn push_long(&mut self, long: Long) {
        let (b0, b1, b2, b3) = long.into_bytes();
        self.push_byte(b0);
        self.push_byte(b1);
        self.push_byte(b2);
        self.push_byte(b3);
    }

    /// Pops a long pushed by [`Machine::push_long`].
    pub fn pop_long(&mut self) -> Long {
        let b3 = self.pop_byte();
        let b2 = self.pop_byte();
        let b1 = self.pop_byte();
        let b0 = self.pop_byte();
        Long::from_bytes(b0, b1, b2, b3)
    }

    /// Reads a byte out of the 256-byte I/O window. Unassigned offsets float
    /// high.
    fn read_io(&self, offset: u8) -> Byte {
        match offset {
            0x00 => self.joypad.read_reg_joyb(),
            0x01 => self.joypad.read_reg_joyd(),
            0x02 => self.joypad.read_reg_joyc(),
            0x04 => self.timer.read_reg_div(),
            0x05 => self.timer.read_reg_tima(),
            0x06 => self.timer.read_reg_tma(),
            0x07 => self.timer.read_reg_tac(),
            0x08 => self.realtime.read_reg_rts(),
            0x09 => self.realtime.read_reg_rtm(),
            0x0a => self.realtime.read_reg_rth(),
            0x0b => self.realtime.read_reg_rtdl(),
            0x0c => self.realtime.read_reg_rtdh(),
            0x0d => self.realtime.read_reg_rtc(),
            0x0f => self.interrupt_controller.load_ir(),
            0x10..=0x26 => self.audio.read_reg(offset),
            0x40..=0x6c => self.ppu.read_reg(offset),
            0xff => self.interrupt_controller.interrupt_enable,
            _ => Byte::new(0xff),
        }
    }

    /// Writes a byte into the 256-byte I/O window. Writes to read-only or
    /// unassigned registers are dropped.
    fn write_io(&mut self, offset: u8, byte: Byte) {
        match offset {
            0x02 => self.joypad.write_reg_joyc(byte),
            0x04 => self.timer.write_reg_div(),
            0x05 => self.timer.write_reg_tima(byte),
            0x06 => self.timer.write_reg_tma(byte),
            0x07 => self.timer.write_reg_tac(byte),
            0x0d => self.realtime.write_reg_rtc(byte),
            0x0f => self.interrupt_controller.store_ir(byte),
            0x10..=0x26 => self.audio.write_reg(offset, byte),
            0x40..=0x6c => self.ppu.write_reg(offset, byte),
            0xff => self.interrupt_controller.interrupt_enable = byte,
            _ => {}
        }
    }
}
