//! The OAM DMA engine.

use super::Machine;
use crate::{
    log::*,
    primitives::Long,
};


impl Machine {
    /// Executes one OAM DMA step. Called once per machine cycle; while a
    /// transfer is active this copies one byte from the configured source
    /// address into OAM.
    ///
    /// The transfer walks the low byte of the source address from wherever
    /// the DMA4 trigger left it (zero) up to 0xA0, after a two cycle setup
    /// delay. The source is read through the regular memory routing, so DMA
    /// can copy out of any readable region.
    pub(crate) fn dma_step(&mut self) {
        let source = self.ppu.dma_source;
        let low = (source & 0xff) as u8;

        if low < 0xa0 {
            if self.ppu.dma_delay > 0 {
                self.ppu.dma_delay -= 1;
            } else {
                let byte = self.load_byte(Long::new(source));
                self.ppu.dma_write_oam(low, byte);
                self.ppu.dma_source = source.wrapping_add(1);

                if low == 0x9f {
                    trace!("[dma] OAM transfer from 0x{:08x} finished", source & 0xffff_ff00);
                }
            }
        }
    }
}


#[cfg(test)]
mod test {
    use crate::machine::test_machine;
    use crate::primitives::{Byte, Long};


    #[test]
    fn test_oam_dma_copies_a_full_oam_worth_of_bytes() {
        let mut machine = test_machine(&[]);

        // Stage a recognizable pattern at the start of WRAM.
        for i in 0..0xa0u32 {
            machine.store_byte(Long::new(0x8000_0000 + i), Byte::new(i as u8 ^ 0x5a));
        }

        // Write the source address bytewise, then trigger through DMA4.
        machine.store_byte(Long::new(0xffff_ff46), Byte::new(0x80));
        machine.store_byte(Long::new(0xffff_ff47), Byte::new(0x00));
        machine.store_byte(Long::new(0xffff_ff48), Byte::new(0x00));
        machine.store_byte(Long::new(0xffff_ff49), Byte::new(0x00));

        // Two machine cycles of setup delay, then one byte per cycle.
        machine.cycle(2 + 160);

        assert_eq!(machine.ppu.read_oam(0x00), 0x00 ^ 0x5a);
        assert_eq!(machine.ppu.read_oam(0x9f), 0x9f ^ 0x5a);
        // The source address stops at the end of the OAM window.
        assert_eq!(machine.load_byte(Long::new(0xffff_ff49)), 0xa0);
    }

    #[test]
    fn test_dma_stops_at_the_oam_boundary() {
        let mut machine = test_machine(&[]);

        // The transfer engine walks the low source byte up to 0xA0 and then
        // stays put, however long the machine keeps running.
        machine.store_byte(Long::new(0xffff_ff46), Byte::new(0x80));
        machine.store_byte(Long::new(0xffff_ff49), Byte::new(0x00));
        machine.cycle(2 + 160 + 64);

        assert_eq!(machine.load_byte(Long::new(0xffff_ff49)), 0xa0);
    }
}
