//! Contains code to fetch, decode and execute instructions.

use super::Machine;
use super::cpu::Flag;
use super::interrupt;
use crate::{
    Disruption,
    primitives::{Byte, Long},
};


/// Where a byte-sized ALU operand comes from.
#[derive(Clone, Copy)]
enum Src {
    /// The next immediate byte.
    Imm,
    /// A direct byte register.
    Reg(u8),
    /// The byte at the next immediate 32-bit address.
    Abs,
    /// The byte at the address held in a long register.
    Ptr(u8),
}

/// A byte-sized location that can be read and written back (for INC/DEC,
/// shifts, SET/RES and friends).
#[derive(Clone, Copy)]
enum Loc {
    Reg(u8),
    Abs,
    Ptr(u8),
}

/// A [`Loc`] after its address (if any) has been fetched.
#[derive(Clone, Copy)]
enum Target {
    Reg(u8),
    Mem(Long),
}

impl Machine {
    /// Executes one (the next) instruction, or burns one idle cycle while
    /// halted, then services interrupts.
    pub fn step(&mut self) -> Result<(), Disruption> {
        if !self.cpu.halted() {
            let instr_start = self.cpu.pc;
            let opcode = self.load_word(instr_start);
            self.advance(2);

            let op = opcode.get();
            match op {
                // ======== 0x00xx: general ========
                0x0000 => {} // NOP
                0x0001 => self.cpu.set_flag(Flag::Stop, true),
                0x0002 => self.cpu.set_flag(Flag::Halt, true),
                0x0003 => self.cpu.set_flag(Flag::InterruptDisable, true),
                0x0004 => self.cpu.set_flag(Flag::InterruptEnable, true),
                0x0005 => self.cpu.daa(),

                // CPL
                0x0006 => {
                    let a = self.cpu.accumulator();
                    self.cpu.set_accumulator(!a);
                    set_flags!(self.cpu.f => - 1 1 -);
                }

                // CCF
                0x0007 => {
                    let carry = !self.cpu.carry();
                    set_flags!(self.cpu.f => - 0 0 carry);
                }

                // SCF
                0x0008 => {
                    set_flags!(self.cpu.f => - 0 0 1);
                }

                // ======== 0x10xx: loads ========
                0x1000..=0x100f => self.op_ld_i8((op & 0xf) as u8),
                0x1010..=0x1017 => self.op_ld_i16((op & 0x7) as u8),
                0x1018..=0x101b => self.op_ld_i32((op & 0x3) as u8),
                0x1020..=0x102f => self.op_ld_mem((op & 0xf) as u8, Src::Abs),
                0x1030..=0x106f => {
                    let long = (((op >> 4) & 0xf) - 3) as u8;
                    self.op_ld_mem((op & 0xf) as u8, Src::Ptr(long));
                }
                0x1070 => self.op_lhb(),
                0x1071 => self.op_lhr(),
                0x1072 => self.op_lhw(),

                // ======== 0x11xx: stores ========
                0x1120..=0x112f => self.op_st_a32((op & 0xf) as u8),
                0x1130..=0x116f => {
                    let long = (((op >> 4) & 0xf) - 3) as u8;
                    self.op_st_r32((op & 0xf) as u8, long);
                }
                0x1170 => self.op_shb(),
                0x1171 => self.op_shr(),
                0x1172 => self.op_shw(),
                0x1173 => self.op_ssp(),
                0x1174 => self.op_spc(),

                // ======== 0x12xx..0x15xx: register moves ========
                0x1200..=0x12ff => {
                    let value = self.cpu.r8((op & 0xf) as u8);
                    self.cpu.set_r8(((op >> 4) & 0xf) as u8, value);
                }
                0x1300..=0x137f if op & 0x0008 == 0 => {
                    let value = self.cpu.r16((op & 0x7) as u8);
                    self.cpu.set_r16(((op >> 4) & 0x7) as u8, value);
                }
                0x1400..=0x143f if op & 0x000c == 0 => {
                    let value = self.cpu.r32((op & 0x3) as u8);
                    self.cpu.set_r32(((op >> 4) & 0x3) as u8, value);
                }
                0x1500..=0x1507 => {
                    let sp = self.cpu.sp;
                    self.cpu.set_r16((op & 0x7) as u8, sp);
                }
                0x1508..=0x150b => {
                    let pc = self.cpu.pc;
                    self.cpu.set_r32((op & 0x3) as u8, pc);
                }

                // ======== 0x16xx: stack ========
                0x1618..=0x161b => {
                    let value = self.cpu.r32((op & 0x3) as u8);
                    self.push_long(value);
                    self.cycle(4);
                }
                0x1638..=0x163b => {
                    let value = self.pop_long();
                    self.cycle(4);
                    self.cpu.set_r32((op & 0x3) as u8, value);
                }

                // ======== 0x20xx..0x23xx: control transfer ========
                0x2000..=0x2004 => self.op_jmp_a32((op & 0x7) as u8),
                0x2010..=0x2044 if op & 0xf <= 4 => {
                    let long = (((op >> 4) & 0xf) - 1) as u8;
                    self.op_jmp_r32((op & 0xf) as u8, long);
                }
                0x2200..=0x2204 => self.op_call_a32((op & 0x7) as u8),
                0x2210 => self.op_rst(),
                0x2300..=0x2304 => self.op_ret((op & 0x7) as u8),
                0x2310 => {
                    self.cpu.set_flag(Flag::InterruptDisable, false);
                    self.op_ret(0);
                }

                // ======== 0x30xx, 0x31xx: increments and decrements ========
                0x3000..=0x300f => self.op_inc8(Loc::Reg((op & 0xf) as u8)),
                0x3010..=0x3017 => self.op_inc16((op & 0x7) as u8),
                0x3018..=0x301b => self.op_inc32((op & 0x3) as u8),
                0x3020 => self.op_inc8(Loc::Abs),
                0x3030..=0x3033 => self.op_inc8(Loc::Ptr((op & 0x3) as u8)),
                0x3100..=0x310f => self.op_dec8(Loc::Reg((op & 0xf) as u8)),
                0x3110..=0x3117 => self.op_dec16((op & 0x7) as u8),
                0x3118..=0x311b => self.op_dec32((op & 0x3) as u8),
                0x3120 => self.op_dec8(Loc::Abs),
                0x3130..=0x3133 => self.op_dec8(Loc::Ptr((op & 0x3) as u8)),

                // ======== 0x32xx, 0x33xx: addition and subtraction ========
                0x3200 => self.op_add(Src::Imm),
                0x3210..=0x321f => self.op_add(Src::Reg((op & 0xf) as u8)),
                0x3220 => self.op_add(Src::Abs),
                0x3230..=0x3233 => self.op_add(Src::Ptr((op & 0x3) as u8)),
                0x3240 => self.op_adc(Src::Imm),
                0x3250..=0x325f => self.op_adc(Src::Reg((op & 0xf) as u8)),
                0x3260 => self.op_adc(Src::Abs),
                0x3270..=0x3273 => self.op_adc(Src::Ptr((op & 0x3) as u8)),
                0x3300 => self.op_sub(Src::Imm),
                0x3310..=0x331f => self.op_sub(Src::Reg((op & 0xf) as u8)),
                0x3320 => self.op_sub(Src::Abs),
                0x3330..=0x3333 => self.op_sub(Src::Ptr((op & 0x3) as u8)),
                0x3340 => self.op_sbc(Src::Imm),
                0x3350..=0x335f => self.op_sbc(Src::Reg((op & 0xf) as u8)),
                0x3360 => self.op_sbc(Src::Abs),
                0x3370..=0x3373 => self.op_sbc(Src::Ptr((op & 0x3) as u8)),

                // ======== 0x50xx..0x53xx: logic ========
                0x5000 => self.op_and(Src::Imm),
                0x5010..=0x501f => self.op_and(Src::Reg((op & 0xf) as u8)),
                0x5020 => self.op_and(Src::Abs),
                0x5030..=0x5033 => self.op_and(Src::Ptr((op & 0x3) as u8)),
                0x5100 => self.op_or(Src::Imm),
                0x5110..=0x511f => self.op_or(Src::Reg((op & 0xf) as u8)),
                0x5120 => self.op_or(Src::Abs),
                0x5130..=0x5133 => self.op_or(Src::Ptr((op & 0x3) as u8)),
                0x5200 => self.op_xor(Src::Imm),
                0x5210..=0x521f => self.op_xor(Src::Reg((op & 0xf) as u8)),
                0x5220 => self.op_xor(Src::Abs),
                0x5230..=0x5233 => self.op_xor(Src::Ptr((op & 0x3) as u8)),
                0x5300 => self.op_cmp(Src::Imm),
                0x5310..=0x531f => self.op_cmp(Src::Reg((op & 0xf) as u8)),
                0x5320 => self.op_cmp(Src::Abs),
                0x5330..=0x5333 => self.op_cmp(Src::Ptr((op & 0x3) as u8)),

                // ======== 0x60xx..0x62xx: single-bit operations ========
                0x6010..=0x601f => self.op_bit(Loc::Reg((op & 0xf) as u8)),
                0x6020 => self.op_bit(Loc::Abs),
                0x6030..=0x6033 => self.op_bit(Loc::Ptr((op & 0x3) as u8)),
                0x6110..=0x611f => self.op_set_res(Loc::Reg((op & 0xf) as u8), true),
                0x6120 => self.op_set_res(Loc::Abs, true),
                0x6130..=0x6133 => self.op_set_res(Loc::Ptr((op & 0x3) as u8), true),
                0x6210..=0x621f => self.op_set_res(Loc::Reg((op & 0xf) as u8), false),
                0x6220 => self.op_set_res(Loc::Abs, false),
                0x6230..=0x6233 => self.op_set_res(Loc::Ptr((op & 0x3) as u8), false),

                // ======== 0x70xx..0x76xx: shifts and rotates ========
                0x7010..=0x701f => self.op_shift(Loc::Reg((op & 0xf) as u8), |b, _| b.shift_left()),
                0x7020 => self.op_shift(Loc::Abs, |b, _| b.shift_left()),
                0x7030..=0x7033 => {
                    self.op_shift(Loc::Ptr((op & 0x3) as u8), |b, _| b.shift_left());
                }
                0x7110..=0x711f => {
                    self.op_shift(Loc::Reg((op & 0xf) as u8), |b, _| b.arithmetic_shift_right());
                }
                0x7120 => self.op_shift(Loc::Abs, |b, _| b.arithmetic_shift_right()),
                0x7130..=0x7133 => {
                    self.op_shift(Loc::Ptr((op & 0x3) as u8), |b, _| b.arithmetic_shift_right());
                }
                0x7210..=0x721f => {
                    self.op_shift(Loc::Reg((op & 0xf) as u8), |b, _| b.shift_right());
                }
                0x7220 => self.op_shift(Loc::Abs, |b, _| b.shift_right()),
                0x7230..=0x7233 => {
                    self.op_shift(Loc::Ptr((op & 0x3) as u8), |b, _| b.shift_right());
                }
                0x7310..=0x731f => {
                    self.op_shift(Loc::Reg((op & 0xf) as u8), |b, c| {
                        b.rotate_left_through_carry(c)
                    });
                }
                0x7320 => self.op_shift(Loc::Abs, |b, c| b.rotate_left_through_carry(c)),
                0x7330..=0x7333 => {
                    self.op_shift(Loc::Ptr((op & 0x3) as u8), |b, c| {
                        b.rotate_left_through_carry(c)
                    });
                }
                0x7340 => self.op_shift(Loc::Reg(0), |b, c| b.rotate_left_through_carry(c)),
                0x7410..=0x741f => {
                    self.op_shift(Loc::Reg((op & 0xf) as u8), |b, _| b.rotate_left());
                }
                0x7420 => self.op_shift(Loc::Abs, |b, _| b.rotate_left()),
                0x7430..=0x7433 => {
                    self.op_shift(Loc::Ptr((op & 0x3) as u8), |b, _| b.rotate_left());
                }
                0x7440 => self.op_shift(Loc::Reg(0), |b, _| b.rotate_left()),
                0x7510..=0x751f => {
                    self.op_shift(Loc::Reg((op & 0xf) as u8), |b, c| {
                        b.rotate_right_through_carry(c)
                    });
                }
                0x7520 => self.op_shift(Loc::Abs, |b, c| b.rotate_right_through_carry(c)),
                0x7530..=0x7533 => {
                    self.op_shift(Loc::Ptr((op & 0x3) as u8), |b, c| {
                        b.rotate_right_through_carry(c)
                    });
                }
                0x7540 => self.op_shift(Loc::Reg(0), |b, c| b.rotate_right_through_carry(c)),
                0x7610..=0x761f => {
                    self.op_shift(Loc::Reg((op & 0xf) as u8), |b, _| b.rotate_right());
                }
                0x7620 => self.op_shift(Loc::Abs, |b, _| b.rotate_right()),
                0x7630..=0x7633 => {
                    self.op_shift(Loc::Ptr((op & 0x3) as u8), |b, _| b.rotate_right());
                }
                0x7640 => self.op_shift(Loc::Reg(0), |b, _| b.rotate_right()),

                // The reset trap: unmapped memory reads as 0xFF, so a program
                // running off the rails restarts from the top.
                0xffff => self.cpu.pc = Long::zero(),

                _ => {
                    return Err(Disruption::Terminated {
                        opcode,
                        pc: instr_start,
                    });
                }
            }
        } else {
            // Halted: burn one machine cycle. Any requested interrupt ends
            // the halt, whether or not it can be dispatched right now.
            self.cycle(1);

            if self.interrupt_controller.any_requested() {
                self.cpu.set_flag(Flag::Halt, false);
            }
        }

        // Service interrupts unless they are disabled. Dispatching (or merely
        // being allowed to) consumes a pending EI.
        if !self.cpu.interrupt_disable() {
            self.handle_interrupts();
            self.cpu.set_flag(Flag::InterruptEnable, false);
        }

        // An EI executed under disabled interrupts re-enables them with one
        // instruction of delay.
        if self.cpu.check_flag(Flag::InterruptEnable) {
            self.cpu.set_flag(Flag::InterruptDisable, false);
        }

        Ok(())
    }

    /// Advances the program counter by `count` places, spending the same
    /// number of machine cycles.
    fn advance(&mut self, count: u32) {
        self.cycle(count);
        self.cpu.pc += count;
    }

    /// Dispatches the highest-priority enabled-and-requested interrupt, if
    /// any: the return address is pushed, execution continues at the
    /// interrupt's handler and further interrupts are disabled.
    fn handle_interrupts(&mut self) {
        if let Some(id) = self.interrupt_controller.pending() {
            let pc = self.cpu.pc;
            self.push_long(pc);
            self.cpu.pc = interrupt::handler_address(id);

            self.interrupt_controller.acknowledge(id);
            self.cpu.set_flag(Flag::Halt, false);
            self.cpu.set_flag(Flag::InterruptDisable, true);
        }
    }

    fn check_condition(&self, cond: u8) -> bool {
        match cond {
            0 => true,
            1 => self.cpu.zero(),
            2 => !self.cpu.zero(),
            3 => self.cpu.carry(),
            4 => !self.cpu.carry(),
            _ => false,
        }
    }

    // ===== Operand plumbing ================================================

    /// Fetches a byte operand, consuming immediates and clocking memory
    /// accesses.
    fn fetch_operand(&mut self, src: Src) -> Byte {
        match src {
            Src::Imm => {
                let value = self.load_byte(self.cpu.pc);
                self.advance(1);
                value
            }
            Src::Reg(index) => self.cpu.r8(index),
            Src::Abs => {
                let address = self.load_long(self.cpu.pc);
                self.advance(4);
                let value = self.load_byte(address);
                self.cycle(1);
                value
            }
            Src::Ptr(index) => {
                let address = self.cpu.r32(index);
                let value = self.load_byte(address);
                self.cycle(1);
                value
            }
        }
    }

    /// Resolves a read-modify-write location, consuming the immediate
    /// address if there is one.
    fn resolve(&mut self, loc: Loc) -> Target {
        match loc {
            Loc::Reg(index) => Target::Reg(index),
            Loc::Abs => {
                let address = self.load_long(self.cpu.pc);
                self.advance(4);
                Target::Mem(address)
            }
            Loc::Ptr(index) => Target::Mem(self.cpu.r32(index)),
        }
    }

    fn read_target(&mut self, target: Target) -> Byte {
        match target {
            Target::Reg(index) => self.cpu.r8(index),
            Target::Mem(address) => {
                let value = self.load_byte(address);
                self.cycle(1);
                value
            }
        }
    }

    fn write_target(&mut self, target: Target, value: Byte) {
        match target {
            Target::Reg(index) => self.cpu.set_r8(index, value),
            Target::Mem(address) => {
                self.store_byte(address, value);
                self.cycle(1);
            }
        }
    }

    // ===== Loads and stores ================================================

    fn op_ld_i8(&mut self, dest: u8) {
        let value = self.load_byte(self.cpu.pc);
        self.advance(1);
        self.cpu.set_r8(dest, value);
    }

    fn op_ld_i16(&mut self, dest: u8) {
        let value = self.load_word(self.cpu.pc);
        self.advance(2);
        self.cpu.set_r16(dest, value);
    }

    fn op_ld_i32(&mut self, dest: u8) {
        let value = self.load_long(self.cpu.pc);
        self.advance(4);
        self.cpu.set_r32(dest, value);
    }

    /// `LD r8, [a32]` and `LD r8, [l]`.
    fn op_ld_mem(&mut self, dest: u8, src: Src) {
        let value = self.fetch_operand(src);
        self.cpu.set_r8(dest, value);
    }

    fn op_lhb(&mut self) {
        let low = self.load_byte(self.cpu.pc);
        self.advance(1);
        let value = self.load_byte(Long::new(0xffff_ff00 + low.get() as u32));
        self.cycle(1);
        self.cpu.set_accumulator(value);
    }

    fn op_lhr(&mut self) {
        let low = self.cpu.r8(1);
        let value = self.load_byte(Long::new(0xffff_ff00 + low.get() as u32));
        self.cycle(1);
        self.cpu.set_accumulator(value);
    }

    fn op_lhw(&mut self) {
        let low = self.load_word(self.cpu.pc);
        self.advance(2);
        let value = self.load_byte(Long::new(0xfffe_0000 + low.get() as u32));
        self.cycle(1);
        self.cpu.set_accumulator(value);
    }

    fn op_st_a32(&mut self, src: u8) {
        let address = self.load_long(self.cpu.pc);
        self.advance(4);
        let value = self.cpu.r8(src);
        self.store_byte(address, value);
        self.cycle(1);
    }

    fn op_st_r32(&mut self, src: u8, addr_reg: u8) {
        let address = self.cpu.r32(addr_reg);
        let value = self.cpu.r8(src);
        self.store_byte(address, value);
        self.cycle(1);
    }

    fn op_shb(&mut self) {
        let low = self.load_byte(self.cpu.pc);
        self.advance(1);
        let value = self.cpu.accumulator();
        self.store_byte(Long::new(0xffff_ff00 + low.get() as u32), value);
        self.cycle(1);
    }

    fn op_shr(&mut self) {
        let low = self.cpu.r8(1);
        let value = self.cpu.accumulator();
        self.store_byte(Long::new(0xffff_ff00 + low.get() as u32), value);
        self.cycle(1);
    }

    fn op_shw(&mut self) {
        let low = self.load_word(self.cpu.pc);
        self.advance(2);
        let value = self.cpu.accumulator();
        self.store_byte(Long::new(0xfffe_0000 + low.get() as u32), value);
        self.cycle(1);
    }

    fn op_ssp(&mut self) {
        let address = self.load_long(self.cpu.pc);
        self.advance(4);
        let sp = self.cpu.sp;
        self.store_word(address, sp);
        self.cycle(2);
    }

    fn op_spc(&mut self) {
        let address = self.load_long(self.cpu.pc);
        self.advance(4);
        let pc = self.cpu.pc;
        self.store_long(address, pc);
        self.cycle(4);
    }

    // ===== Control transfer ================================================

    fn op_jmp_a32(&mut self, cond: u8) {
        let address = self.load_long(self.cpu.pc);
        self.advance(4);
        if self.check_condition(cond) {
            self.cpu.pc = address;
            self.cycle(1);
        }
    }

    fn op_jmp_r32(&mut self, cond: u8, addr_reg: u8) {
        let address = self.cpu.r32(addr_reg);
        if self.check_condition(cond) {
            self.cpu.pc = address;
            self.cycle(1);
        }
    }

    fn op_call_a32(&mut self, cond: u8) {
        let address = self.load_long(self.cpu.pc);
        self.advance(4);
        if self.check_condition(cond) {
            let pc = self.cpu.pc;
            self.push_long(pc);
            self.cycle(4);
            self.cpu.pc = address;
            self.cycle(1);
        }
    }

    fn op_rst(&mut self) {
        let mut vector = self.load_byte(self.cpu.pc).get();
        self.advance(1);
        if vector > 7 {
            vector = 0;
        }

        let pc = self.cpu.pc;
        self.push_long(pc);
        self.cycle(4);
        self.cpu.pc = Long::new(0x10 * (vector & 0b111) as u32);
        self.cycle(1);
    }

    fn op_ret(&mut self, cond: u8) {
        if self.check_condition(cond) {
            let address = self.pop_long();
            self.cycle(4);
            self.cpu.pc = address;
            self.cycle(1);
        }
    }

    // ===== Increments and decrements =======================================

    fn op_inc8(&mut self, loc: Loc) {
        let target = self.resolve(loc);
        let value = self.read_target(target) + 1;
        self.write_target(target, value);

        let zero = value == 0;
        let half_carry = value.get() & 0xf == 0x0;
        set_flags!(self.cpu.f => zero 0 half_carry -);
    }

    fn op_dec8(&mut self, loc: Loc) {
        let target = self.resolve(loc);
        let value = self.read_target(target) - 1;
        self.write_target(target, value);

        let zero = value == 0;
        let half_carry = value.get() & 0xf == 0xf;
        set_flags!(self.cpu.f => zero 1 half_carry -);
    }

    fn op_inc16(&mut self, reg: u8) {
        let value = self.cpu.r16(reg) + 1;
        self.cpu.set_r16(reg, value);

        let zero = value == 0;
        set_flags!(self.cpu.f => zero 0 - -);
    }

    fn op_dec16(&mut self, reg: u8) {
        let value = self.cpu.r16(reg) - 1;
        self.cpu.set_r16(reg, value);

        let zero = value == 0;
        set_flags!(self.cpu.f => zero 1 - -);
    }

    fn op_inc32(&mut self, reg: u8) {
        let value = self.cpu.r32(reg) + 1;
        self.cpu.set_r32(reg, value);

        let zero = value == 0;
        set_flags!(self.cpu.f => zero 0 - -);
    }

    fn op_dec32(&mut self, reg: u8) {
        let value = self.cpu.r32(reg) - 1;
        self.cpu.set_r32(reg, value);

        let zero = value == 0;
        set_flags!(self.cpu.f => zero 1 - -);
    }

    // ===== Arithmetic ======================================================

    fn op_add(&mut self, src: Src) {
        let rhs = self.fetch_operand(src);
        let mut a = self.cpu.accumulator();
        let (carry, half_carry) = a.add_with_carries(rhs);
        self.cpu.set_accumulator(a);

        let zero = a == 0;
        set_flags!(self.cpu.f => zero 0 half_carry carry);
    }

    fn op_adc(&mut self, src: Src) {
        let carry_in = self.cpu.carry();
        let rhs = self.fetch_operand(src);
        let mut a = self.cpu.accumulator();
        let (carry, half_carry) = a.full_add_with_carries(rhs, carry_in);
        self.cpu.set_accumulator(a);

        let zero = a == 0;
        set_flags!(self.cpu.f => zero 0 half_carry carry);
    }

    fn op_sub(&mut self, src: Src) {
        let rhs = self.fetch_operand(src);
        let mut a = self.cpu.accumulator();
        let (carry, half_carry) = a.sub_with_carries(rhs);
        self.cpu.set_accumulator(a);

        let zero = a == 0;
        set_flags!(self.cpu.f => zero 1 half_carry carry);
    }

    /// SBC folds the carry into the subtrahend before comparing, so its H and
    /// C flags are computed against the adjusted amount.
    fn op_sbc(&mut self, src: Src) {
        let carry_in = self.cpu.carry();
        let rhs = self.fetch_operand(src) + carry_in as u8;
        let mut a = self.cpu.accumulator();
        let (carry, half_carry) = a.sub_with_carries(rhs);
        self.cpu.set_accumulator(a);

        let zero = a == 0;
        set_flags!(self.cpu.f => zero 1 half_carry carry);
    }

    // ===== Logic ===========================================================

    fn op_and(&mut self, src: Src) {
        let rhs = self.fetch_operand(src);
        let a = self.cpu.accumulator() & rhs;
        self.cpu.set_accumulator(a);

        let zero = a == 0;
        set_flags!(self.cpu.f => zero 0 1 0);
    }

    fn op_or(&mut self, src: Src) {
        let rhs = self.fetch_operand(src);
        let a = self.cpu.accumulator() | rhs;
        self.cpu.set_accumulator(a);

        let zero = a == 0;
        set_flags!(self.cpu.f => zero 0 0 0);
    }

    fn op_xor(&mut self, src: Src) {
        let rhs = self.fetch_operand(src);
        let a = self.cpu.accumulator() ^ rhs;
        self.cpu.set_accumulator(a);

        let zero = a == 0;
        set_flags!(self.cpu.f => zero 0 0 0);
    }

    /// CMP: subtraction flags without touching the accumulator.
    fn op_cmp(&mut self, src: Src) {
        let rhs = self.fetch_operand(src);
        let mut copy = self.cpu.accumulator();
        let (carry, half_carry) = copy.sub_with_carries(rhs);

        let zero = copy == 0;
        set_flags!(self.cpu.f => zero 1 half_carry carry);
    }

    // ===== Single-bit operations ===========================================

    /// Fetches the bit number and operand byte of a BIT/SET/RES instruction,
    /// honoring each addressing form's operand order. Returns the bit number,
    /// the value and the writeback address for the memory forms.
    ///
    /// The register-pointer forms read their operand with a long-wide bus
    /// access and truncate it, costing four cycles.
    fn fetch_bit_operand(&mut self, loc: Loc) -> (u8, Byte, Option<Long>) {
        match loc {
            Loc::Reg(index) => {
                let bit = self.load_byte(self.cpu.pc);
                self.advance(1);
                (bit.get() & 0b111, self.cpu.r8(index), None)
            }
            Loc::Abs => {
                let bit = self.load_byte(self.cpu.pc);
                self.advance(1);
                let address = self.load_long(self.cpu.pc);
                self.advance(4);
                let value = self.load_byte(address);
                self.cycle(1);
                (bit.get() & 0b111, value, Some(address))
            }
            Loc::Ptr(index) => {
                let address = self.cpu.r32(index);
                let bit = self.load_byte(self.cpu.pc);
                self.advance(1);
                let value = Byte::new(self.load_long(address).get() as u8);
                self.cycle(4);
                (bit.get() & 0b111, value, Some(address))
            }
        }
    }

    fn op_bit(&mut self, loc: Loc) {
        let (bit, value, _) = self.fetch_bit_operand(loc);

        let zero = value.get() & (1 << bit) == 0;
        set_flags!(self.cpu.f => zero 0 1 -);
    }

    fn op_set_res(&mut self, loc: Loc, on: bool) {
        let (bit, value, address) = self.fetch_bit_operand(loc);
        let value = value.map(|b| if on { b | (1 << bit) } else { b & !(1 << bit) });

        match (loc, address) {
            (Loc::Reg(index), _) => self.cpu.set_r8(index, value),
            (_, Some(address)) => {
                self.store_byte(address, value);
                self.cycle(1);
            }
            _ => unreachable!(),
        }
    }

    // ===== Shifts and rotates ==============================================

    /// Applies a shift or rotate step to the given location. `f` mutates the
    /// byte (receiving the current carry flag) and returns the bit that was
    /// shifted out, which becomes the new carry.
    fn op_shift(&mut self, loc: Loc, f: impl FnOnce(&mut Byte, bool) -> bool) {
        let carry_in = self.cpu.carry();
        let target = self.resolve(loc);
        let mut value = self.read_target(target);
        let carry = f(&mut value, carry_in);
        self.write_target(target, value);

        let zero = value == 0;
        set_flags!(self.cpu.f => zero 0 0 carry);
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::machine::test_machine;
    use crate::primitives::Word;


    /// Steps the machine once, asserting the instruction decoded.
    fn step_ok(machine: &mut Machine) {
        machine.step().expect("unexpected disruption");
    }

    #[test]
    fn test_nop_advances_pc() {
        let mut machine = test_machine(&[0x00, 0x00]);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.pc, 0x202);
    }

    #[test]
    fn test_ld_i8() {
        // ld b0, $42
        let mut machine = test_machine(&[0x00, 0x10, 0x42]);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.accumulator(), 0x42);
        assert_eq!(machine.cpu.pc, 0x203);
    }

    #[test]
    fn test_ld_i16_i32_views() {
        // ld w1, $1234 / ld l1, $cafebabe
        let mut machine = test_machine(&[
            0x11, 0x10, 0x34, 0x12,
            0x19, 0x10, 0xbe, 0xba, 0xfe, 0xca,
        ]);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.r16(1), 0x1234);
        assert_eq!(machine.cpu.r8(2), 0x12);
        assert_eq!(machine.cpu.r8(3), 0x34);

        step_ok(&mut machine);
        assert_eq!(machine.cpu.r32(1), 0xcafe_babe);
    }

    #[test]
    fn test_add_i8_flags() {
        // ld b0, $f0 / add $20
        let mut machine = test_machine(&[0x00, 0x10, 0xf0, 0x00, 0x32, 0x20]);
        step_ok(&mut machine);
        step_ok(&mut machine);

        assert_eq!(machine.cpu.accumulator(), 0x10);
        assert!(!machine.cpu.zero());
        assert!(!machine.cpu.negative());
        assert!(!machine.cpu.half_carry());
        assert!(machine.cpu.carry());
    }

    #[test]
    fn test_sub_and_cmp_flags() {
        // ld b0, $10 / cmp $20 / sub $20
        let mut machine = test_machine(&[
            0x00, 0x10, 0x10,
            0x00, 0x53, 0x20,
            0x00, 0x33, 0x20,
        ]);
        step_ok(&mut machine);

        step_ok(&mut machine);
        assert_eq!(machine.cpu.accumulator(), 0x10); // CMP leaves B0 alone
        assert!(machine.cpu.negative());
        assert!(machine.cpu.carry());

        step_ok(&mut machine);
        assert_eq!(machine.cpu.accumulator(), 0xf0);
        assert!(machine.cpu.carry());
        assert!(!machine.cpu.half_carry());
    }

    #[test]
    fn test_adc_and_sbc_use_the_carry() {
        // ld b0, $ff / add $01 (carry out) / adc $00 -> 1
        let mut machine = test_machine(&[
            0x00, 0x10, 0xff,
            0x00, 0x32, 0x01,
            0x40, 0x32, 0x00,
        ]);
        step_ok(&mut machine);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.accumulator(), 0x00);
        assert!(machine.cpu.carry());
        assert!(machine.cpu.zero());

        step_ok(&mut machine);
        assert_eq!(machine.cpu.accumulator(), 0x01);
        assert!(!machine.cpu.carry());
    }

    #[test]
    fn test_logic_flags() {
        // ld b0, $0f / and $f0 -> 0, H set / or $00 -> still 0
        let mut machine = test_machine(&[
            0x00, 0x10, 0x0f,
            0x00, 0x50, 0xf0,
            0x00, 0x51, 0x00,
        ]);
        step_ok(&mut machine);
        step_ok(&mut machine);
        assert!(machine.cpu.zero());
        assert!(machine.cpu.half_carry());
        assert!(!machine.cpu.carry());

        step_ok(&mut machine);
        assert!(machine.cpu.zero());
        assert!(!machine.cpu.half_carry());
    }

    #[test]
    fn test_mv_between_register_files() {
        // ld b5, $7b / mv b0, b5 / mv w3, w2 / mv l3, l0
        let mut machine = test_machine(&[
            0x05, 0x10, 0x7b,
            0x05, 0x12,
            0x32, 0x13,
            0x30, 0x14,
        ]);
        step_ok(&mut machine);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.accumulator(), 0x7b);

        machine.cpu.set_r16(2, Word::new(0xaabb));
        step_ok(&mut machine);
        assert_eq!(machine.cpu.r16(3), 0xaabb);

        machine.cpu.set_r32(0, Long::new(0x1122_3344));
        step_ok(&mut machine);
        assert_eq!(machine.cpu.r32(3), 0x1122_3344);
    }

    #[test]
    fn test_store_and_load_through_memory() {
        // ld b0, $99 / st [$80000010], b0 / ld b1, [$80000010]
        let mut machine = test_machine(&[
            0x00, 0x10, 0x99,
            0x20, 0x11, 0x10, 0x00, 0x00, 0x80,
            0x21, 0x10, 0x10, 0x00, 0x00, 0x80,
        ]);
        step_ok(&mut machine);
        step_ok(&mut machine);
        assert_eq!(machine.load_byte(Long::new(0x8000_0010)), 0x99);

        step_ok(&mut machine);
        assert_eq!(machine.cpu.r8(1), 0x99);
    }

    #[test]
    fn test_high_page_shorthand() {
        // ld b0, $12 / shb $ff (-> IE) / lhb $ff
        let mut machine = test_machine(&[
            0x00, 0x10, 0x12,
            0x70, 0x11, 0xff,
            0x00, 0x10, 0x00, // ld b0, 0
            0x70, 0x10, 0xff,
        ]);
        step_ok(&mut machine);
        step_ok(&mut machine);
        assert_eq!(machine.interrupt_controller.interrupt_enable, 0x12);

        step_ok(&mut machine);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.accumulator(), 0x12);
    }

    #[test]
    fn test_jmp_and_conditions() {
        // jmp z, $300 (not taken) / jmp n, $300 (taken)
        let mut machine = test_machine(&[
            0x01, 0x20, 0x00, 0x03, 0x00, 0x00,
            0x00, 0x20, 0x00, 0x03, 0x00, 0x00,
        ]);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.pc, 0x208);

        step_ok(&mut machine);
        assert_eq!(machine.cpu.pc, 0x300);
    }

    #[test]
    fn test_call_and_ret() {
        let mut machine = test_machine(&[
            // 0x200: call n, $20a
            0x00, 0x22, 0x0a, 0x02, 0x00, 0x00,
            // 0x206: nop; nop
            0x00, 0x00, 0x00, 0x00,
            // 0x20a: ret n
            0x00, 0x23,
        ]);
        let sp_before = machine.cpu.sp;

        step_ok(&mut machine);
        assert_eq!(machine.cpu.pc, 0x20a);
        assert_eq!(machine.cpu.sp, sp_before - 4);

        step_ok(&mut machine);
        assert_eq!(machine.cpu.pc, 0x206);
        assert_eq!(machine.cpu.sp, sp_before);
    }

    #[test]
    fn test_push_pop_registers() {
        // ld l2, $11223344 / push l2 / pop l3
        let mut machine = test_machine(&[
            0x1a, 0x10, 0x44, 0x33, 0x22, 0x11,
            0x1a, 0x16,
            0x3b, 0x16,
        ]);
        step_ok(&mut machine);
        step_ok(&mut machine);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.r32(3), 0x1122_3344);
    }

    #[test]
    fn test_inc_dec_flags() {
        // ld b3, $ff / inc b3 -> 0, Z+H / dec b3 -> ff, N+H
        let mut machine = test_machine(&[
            0x03, 0x10, 0xff,
            0x03, 0x30,
            0x03, 0x31,
        ]);
        step_ok(&mut machine);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.r8(3), 0x00);
        assert!(machine.cpu.zero());
        assert!(machine.cpu.half_carry());
        assert!(!machine.cpu.negative());

        step_ok(&mut machine);
        assert_eq!(machine.cpu.r8(3), 0xff);
        assert!(machine.cpu.negative());
        assert!(machine.cpu.half_carry());
    }

    #[test]
    fn test_bit_set_res() {
        // ld b2, $00 / set 3, b2 / bit 3, b2 / res 3, b2 / bit 3, b2
        let mut machine = test_machine(&[
            0x02, 0x10, 0x00,
            0x12, 0x61, 0x03,
            0x12, 0x60, 0x03,
            0x12, 0x62, 0x03,
            0x12, 0x60, 0x03,
        ]);
        step_ok(&mut machine);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.r8(2), 0b1000);

        step_ok(&mut machine);
        assert!(!machine.cpu.zero());
        assert!(machine.cpu.half_carry());

        step_ok(&mut machine);
        assert_eq!(machine.cpu.r8(2), 0x00);

        step_ok(&mut machine);
        assert!(machine.cpu.zero());
    }

    #[test]
    fn test_rotates() {
        // ld b0, $81 / rlca -> 0x03, C / rrca -> 0x81, C
        let mut machine = test_machine(&[
            0x00, 0x10, 0x81,
            0x40, 0x74,
            0x40, 0x76,
        ]);
        step_ok(&mut machine);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.accumulator(), 0x03);
        assert!(machine.cpu.carry());

        step_ok(&mut machine);
        assert_eq!(machine.cpu.accumulator(), 0x81);
        assert!(machine.cpu.carry());
    }

    #[test]
    fn test_unknown_opcode_terminates() {
        let mut machine = test_machine(&[0x34, 0x12]);
        match machine.step() {
            Err(Disruption::Terminated { opcode, pc }) => {
                assert_eq!(opcode, 0x1234);
                assert_eq!(pc, 0x200);
            }
            _ => panic!("expected a terminated disruption"),
        }
    }

    #[test]
    fn test_interrupt_priority() {
        let mut machine = test_machine(&[0x00, 0x00]);
        machine.interrupt_controller.interrupt_enable = Byte::new(0xff);
        machine.interrupt_controller.store_ir(Byte::new(0xff));

        step_ok(&mut machine);
        assert_eq!(machine.cpu.pc, 0x80);
        assert!(machine.cpu.interrupt_disable());

        // The handled bit is gone, the rest are still pending.
        assert_eq!(machine.interrupt_controller.load_ir(), 0xfe);

        // The pushed return address sits behind the NOP.
        assert_eq!(machine.pop_long(), 0x202);
    }

    #[test]
    fn test_ei_enables_with_one_instruction_delay() {
        // di / halt / ei / nop
        let mut machine = test_machine(&[0x03, 0x00, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00]);

        step_ok(&mut machine); // di
        assert!(machine.cpu.interrupt_disable());

        step_ok(&mut machine); // halt
        assert!(machine.cpu.halted());

        // Halt only ends once some interrupt is requested, even a disabled
        // one; with D set it is not dispatched.
        step_ok(&mut machine);
        assert!(machine.cpu.halted());
        machine.interrupt_controller.request_id(2);
        step_ok(&mut machine);
        assert!(!machine.cpu.halted());
        assert!(machine.cpu.interrupt_disable());

        // Enable the requested interrupt, then execute EI. D falls at the
        // step boundary, but nothing is dispatched during the EI step.
        machine.interrupt_controller.interrupt_enable = Byte::new(0b100);
        step_ok(&mut machine); // ei
        assert!(!machine.cpu.interrupt_disable());
        assert_eq!(machine.cpu.pc, 0x206);

        // The instruction after EI still runs; the dispatch happens at its
        // end, one instruction late.
        step_ok(&mut machine); // nop
        assert_eq!(machine.cpu.pc, interrupt::handler_address(2));
        assert!(machine.cpu.interrupt_disable());
    }

    #[test]
    fn test_reset_trap_on_unmapped_fetch() {
        let mut machine = test_machine(&[]);
        machine.cpu.pc = Long::new(0x7000_0000);

        step_ok(&mut machine);
        assert_eq!(machine.cpu.pc, 0x0);
    }

    #[test]
    fn test_cycle_counts() {
        // nop = 2 machine cycles (opcode fetch), 8 dots.
        let mut machine = test_machine(&[0x00, 0x00, 0x00, 0x10, 0x42]);
        step_ok(&mut machine);
        assert_eq!(machine.cpu.cycle_counter, 8);

        // ld b0, i8 = opcode + immediate = 3 machine cycles.
        step_ok(&mut machine);
        assert_eq!(machine.cpu.cycle_counter, 8 + 12);
    }
}
