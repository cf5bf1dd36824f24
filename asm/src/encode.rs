//! The instruction encoders: validate operand kinds and turn mnemonics into
//! opcodes plus immediates.
//!
//! Every mnemonic family has a fixed opcode base; the operand forms add their
//! offsets on top (`+0x10` register, `+0x20` absolute address, `+0x30`
//! register pointer). The bytes emitted here decode, on the CPU, to the same
//! mnemonic and operands.

use std::rc::Rc;

use crate::{
    env::Env,
    eval::Interpreter,
    keyword::{Mnemonic, Reg},
    syntax::Expr,
    value::Value,
};


impl<'l> Interpreter<'l> {
    /// Encodes one instruction statement. Returns `false` (after a
    /// diagnostic) when an operand does not fit the mnemonic.
    pub(crate) fn eval_instruction(
        &mut self,
        mnemonic: Mnemonic,
        first: Option<&Expr>,
        second: Option<&Expr>,
        env: &Env,
    ) -> bool {
        use Mnemonic::*;

        match mnemonic {
            Nop => self.assembly.write_word(0x0000),
            Stop => self.assembly.write_word(0x0001),
            Halt => self.assembly.write_word(0x0002),
            Di => self.assembly.write_word(0x0003),
            Ei => self.assembly.write_word(0x0004),
            Daa => self.assembly.write_word(0x0005),
            Cpl => self.assembly.write_word(0x0006),
            Ccf => self.assembly.write_word(0x0007),
            Scf => self.assembly.write_word(0x0008),
            Ld => self.encode_ld(first, second, env),
            Lhb => self.encode_lh(0x1070, 1, first, env),
            Lhr => self.assembly.write_word(0x1071),
            Lhw => self.encode_lh(0x1072, 2, first, env),
            St => self.encode_st(first, second, env),
            Shb => self.encode_lh(0x1170, 1, first, env),
            Shr => self.assembly.write_word(0x1171),
            Shw => self.encode_lh(0x1172, 2, first, env),
            Ssp => self.encode_lh(0x1173, 4, first, env),
            Spc => self.encode_lh(0x1174, 4, first, env),
            Mv => self.encode_mv(first, second, env),
            Msp => self.encode_ms(Msp, first, env),
            Mpc => self.encode_ms(Mpc, first, env),
            Push => self.encode_stack(0x1600, Push, first, env),
            Pop => self.encode_stack(0x1620, Pop, first, env),
            Jmp => self.encode_jmp(first, second, env),
            Call => self.encode_call(first, second, env),
            Rst => self.encode_rst(first, env),
            Ret => self.encode_ret(first, env),
            Reti => self.assembly.write_word(0x2310),
            Inc => self.encode_step(0x3000, Inc, first, env),
            Dec => self.encode_step(0x3100, Dec, first, env),
            Add => self.encode_accumulator(0x3200, Add, first, env),
            Adc => self.encode_accumulator(0x3240, Adc, first, env),
            Sub => self.encode_accumulator(0x3300, Sub, first, env),
            Sbc => self.encode_accumulator(0x3340, Sbc, first, env),
            And => self.encode_accumulator(0x5000, And, first, env),
            Or => self.encode_accumulator(0x5100, Or, first, env),
            Xor => self.encode_accumulator(0x5200, Xor, first, env),
            Cmp => self.encode_accumulator(0x5300, Cmp, first, env),
            Bit => self.encode_bitwise(0x6000, Bit, first, second, env),
            Set => self.encode_bitwise(0x6100, Set, first, second, env),
            Res => self.encode_bitwise(0x6200, Res, first, second, env),
            Sla => self.encode_shift(0x7000, Sla, first, env),
            Sra => self.encode_shift(0x7100, Sra, first, env),
            Srl => self.encode_shift(0x7200, Srl, first, env),
            Rl => self.encode_shift(0x7300, Rl, first, env),
            Rla => self.assembly.write_word(0x7340),
            Rlc => self.encode_shift(0x7400, Rlc, first, env),
            Rlca => self.assembly.write_word(0x7440),
            Rr => self.encode_shift(0x7500, Rr, first, env),
            Rra => self.assembly.write_word(0x7540),
            Rrc => self.encode_shift(0x7600, Rrc, first, env),
            Rrca => self.assembly.write_word(0x7640),
        }
    }

    /// Evaluates a required operand expression.
    fn operand(
        &mut self,
        expr: Option<&Expr>,
        env: &Env,
        mnemonic: Mnemonic,
        which: &str,
    ) -> Option<Rc<Value>> {
        let expr = match expr {
            Some(expr) => expr,
            None => {
                eprintln!(
                    "[instruction] Missing {} argument to instruction '{}'.",
                    which, mnemonic.name(),
                );
                return None;
            }
        };

        match self.eval_expr(expr, env) {
            Some(value) => Some(value),
            None => {
                eprintln!(
                    "[instruction] In {} argument to instruction '{}'.",
                    which, mnemonic.name(),
                );
                None
            }
        }
    }

    /// The `+0x30`/`+0x40`/`+0x50`/`+0x60` column of the load/store pages,
    /// selected by the pointer's long register.
    fn pointer_column(reg: Reg) -> Option<u16> {
        match reg {
            Reg::L(0) => Some(0x30),
            Reg::L(1) => Some(0x40),
            Reg::L(2) => Some(0x50),
            Reg::L(3) => Some(0x60),
            _ => None,
        }
    }

    fn encode_ld(&mut self, first: Option<&Expr>, second: Option<&Expr>, env: &Env) -> bool {
        let opcode = 0x1000u16;
        let arg_one = match self.operand(first, env, Mnemonic::Ld, "first") {
            Some(v) => v,
            None => return false,
        };
        let arg_two = match self.operand(second, env, Mnemonic::Ld, "second") {
            Some(v) => v,
            None => return false,
        };

        let dest = match &*arg_one {
            Value::Register { reg, pointer: false } => *reg,
            _ => {
                eprintln!(
                    "[instruction] Expected non-pointer register for argument one of 'ld' \
                     instruction.",
                );
                return false;
            }
        };

        match &*arg_two {
            Value::Number(n) => {
                if dest.is_byte() {
                    self.assembly.write_word(opcode + dest.code())
                        && self.assembly.write_byte(n.integer() as u8)
                } else if dest.is_word() {
                    self.assembly.write_word(opcode + dest.code())
                        && self.assembly.write_word(n.integer() as u16)
                } else {
                    self.assembly.write_word(opcode + dest.code())
                        && self.assembly.write_long(n.integer() as u32)
                }
            }
            Value::Address(address) => {
                self.assembly.write_word(opcode + 0x20 + dest.code())
                    && self.assembly.write_long(*address)
            }
            Value::Register { reg, pointer: true } => {
                let column = match Self::pointer_column(*reg) {
                    Some(column) => column,
                    None => {
                        eprintln!(
                            "[instruction] Expected long register pointer for argument two of \
                             'ld r8, [r32]' instruction.",
                        );
                        return false;
                    }
                };

                self.assembly.write_word(opcode + column + dest.code())
            }
            _ => {
                eprintln!(
                    "[instruction] Expected number, address, or register pointer for argument \
                     two of 'ld' instruction.",
                );
                false
            }
        }
    }

    /// The high-page and wide store shorthands (`lhb`/`lhw`/`shb`/`shw`/
    /// `ssp`/`spc`): a bare opcode followed by a truncated address immediate
    /// of `width` bytes.
    fn encode_lh(&mut self, opcode: u16, width: u8, first: Option<&Expr>, env: &Env) -> bool {
        let mnemonic = match opcode {
            0x1070 => Mnemonic::Lhb,
            0x1072 => Mnemonic::Lhw,
            0x1170 => Mnemonic::Shb,
            0x1172 => Mnemonic::Shw,
            0x1173 => Mnemonic::Ssp,
            _ => Mnemonic::Spc,
        };

        let arg = match self.operand(first, env, mnemonic, "first") {
            Some(v) => v,
            None => return false,
        };

        let address = match &*arg {
            Value::Address(address) => *address,
            _ => {
                eprintln!(
                    "[instruction] Expected address for parameter of instruction '{}'.",
                    mnemonic.name(),
                );
                return false;
            }
        };

        match width {
            1 => self.assembly.write_word(opcode) && self.assembly.write_byte(address as u8),
            2 => self.assembly.write_word(opcode) && self.assembly.write_word(address as u16),
            _ => self.assembly.write_word(opcode) && self.assembly.write_long(address),
        }
    }

    fn encode_st(&mut self, first: Option<&Expr>, second: Option<&Expr>, env: &Env) -> bool {
        let opcode = 0x1100u16;
        let arg_one = match self.operand(first, env, Mnemonic::St, "first") {
            Some(v) => v,
            None => return false,
        };
        let arg_two = match self.operand(second, env, Mnemonic::St, "second") {
            Some(v) => v,
            None => return false,
        };

        let source = match &*arg_two {
            Value::Register { reg, pointer: false } if reg.is_byte() => *reg,
            _ => {
                eprintln!(
                    "[instruction] Expected byte register for argument two of instruction 'st'.",
                );
                return false;
            }
        };

        match &*arg_one {
            Value::Address(address) => {
                self.assembly.write_word(opcode + 0x20 + source.code())
                    && self.assembly.write_long(*address)
            }
            Value::Register { reg, pointer: true } => {
                let column = match Self::pointer_column(*reg) {
                    Some(column) => column,
                    None => {
                        eprintln!(
                            "[instruction] Expected register pointer for argument one of \
                             instruction 'st [r32], r8'.",
                        );
                        return false;
                    }
                };

                self.assembly.write_word(opcode + column + source.code())
            }
            _ => {
                eprintln!(
                    "[instruction] Expected address or register pointer for argument one of \
                     instruction 'st'.",
                );
                false
            }
        }
    }

    fn encode_mv(&mut self, first: Option<&Expr>, second: Option<&Expr>, env: &Env) -> bool {
        let mut opcode = 0x1200u16;
        let arg_one = match self.operand(first, env, Mnemonic::Mv, "first") {
            Some(v) => v,
            None => return false,
        };
        let arg_two = match self.operand(second, env, Mnemonic::Mv, "second") {
            Some(v) => v,
            None => return false,
        };

        let (dest, source) = match (&*arg_one, &*arg_two) {
            (
                Value::Register { reg: dest, pointer: false },
                Value::Register { reg: source, pointer: false },
            ) => (*dest, *source),
            _ => {
                eprintln!(
                    "[instruction] Expected non-pointer registers for arguments of instruction \
                     'mv'.",
                );
                return false;
            }
        };

        if dest.is_byte() && source.is_byte() {
            opcode += 0x10 * dest.code() + source.code();
        } else if dest.is_word() && source.is_word() {
            opcode += 0x100 + 0x10 * dest.index() as u16 + source.index() as u16;
        } else if dest.is_long() && source.is_long() {
            opcode += 0x200 + 0x10 * dest.index() as u16 + source.index() as u16;
        } else {
            eprintln!(
                "[instruction] Expected same-size registers for arguments of instruction 'mv'.",
            );
            return false;
        }

        self.assembly.write_word(opcode)
    }

    fn encode_ms(&mut self, mnemonic: Mnemonic, first: Option<&Expr>, env: &Env) -> bool {
        let arg = match self.operand(first, env, mnemonic, "first") {
            Some(v) => v,
            None => return false,
        };

        let dest = match &*arg {
            Value::Register { reg, pointer: false } => *reg,
            _ => {
                eprintln!(
                    "[instruction] Expected non-pointer register for argument of instruction \
                     '{}'.",
                    mnemonic.name(),
                );
                return false;
            }
        };

        match mnemonic {
            Mnemonic::Msp => {
                if !dest.is_word() {
                    eprintln!(
                        "[instruction] Expected word register for argument of instruction 'msp'.",
                    );
                    return false;
                }
                self.assembly.write_word(0x1500 + dest.index() as u16)
            }
            _ => {
                if !dest.is_long() {
                    eprintln!(
                        "[instruction] Expected long register for argument of instruction 'mpc'.",
                    );
                    return false;
                }
                self.assembly.write_word(0x1508 + dest.index() as u16)
            }
        }
    }

    fn encode_stack(
        &mut self,
        base: u16,
        mnemonic: Mnemonic,
        first: Option<&Expr>,
        env: &Env,
    ) -> bool {
        let arg = match self.operand(first, env, mnemonic, "first") {
            Some(v) => v,
            None => return false,
        };

        match &*arg {
            Value::Register { reg, pointer: false } if reg.is_long() => {
                self.assembly.write_word(base + reg.code())
            }
            _ => {
                eprintln!(
                    "[instruction] Expected long register for argument of instruction '{}'.",
                    mnemonic.name(),
                );
                false
            }
        }
    }

    fn encode_jmp(&mut self, first: Option<&Expr>, second: Option<&Expr>, env: &Env) -> bool {
        let mut opcode = 0x2000u16;
        let arg_one = match self.operand(first, env, Mnemonic::Jmp, "first") {
            Some(v) => v,
            None => return false,
        };
        let arg_two = match self.operand(second, env, Mnemonic::Jmp, "second") {
            Some(v) => v,
            None => return false,
        };

        match &*arg_one {
            Value::Condition(cond) => opcode += cond.code(),
            _ => {
                eprintln!(
                    "[instruction] Expected cpu condition for argument one of instruction 'jmp'.",
                );
                return false;
            }
        }

        match &*arg_two {
            Value::Address(address) => {
                self.assembly.write_word(opcode) && self.assembly.write_long(*address)
            }
            Value::Register { reg, pointer: true } if reg.is_long() => {
                self.assembly.write_word(opcode + 0x10 + 0x10 * reg.index() as u16)
            }
            _ => {
                eprintln!(
                    "[instruction] Expected address or pointer register for argument two of \
                     instruction 'jmp'.",
                );
                false
            }
        }
    }

    fn encode_call(&mut self, first: Option<&Expr>, second: Option<&Expr>, env: &Env) -> bool {
        let mut opcode = 0x2200u16;
        let arg_one = match self.operand(first, env, Mnemonic::Call, "first") {
            Some(v) => v,
            None => return false,
        };
        let arg_two = match self.operand(second, env, Mnemonic::Call, "second") {
            Some(v) => v,
            None => return false,
        };

        match &*arg_one {
            Value::Condition(cond) => opcode += cond.code(),
            _ => {
                eprintln!(
                    "[instruction] Expected cpu condition for argument one of instruction 'call'.",
                );
                return false;
            }
        }

        match &*arg_two {
            Value::Address(address) => {
                self.assembly.write_word(opcode) && self.assembly.write_long(*address)
            }
            _ => {
                eprintln!(
                    "[instruction] Expected address for argument two of instruction 'call'.",
                );
                false
            }
        }
    }

    fn encode_rst(&mut self, first: Option<&Expr>, env: &Env) -> bool {
        let arg = match self.operand(first, env, Mnemonic::Rst, "first") {
            Some(v) => v,
            None => return false,
        };

        match &*arg {
            Value::Number(n) => {
                self.assembly.write_word(0x2210)
                    && self.assembly.write_byte((n.integer() & 0b111) as u8)
            }
            _ => {
                eprintln!("[instruction] Expected number for argument to 'rst'.");
                false
            }
        }
    }

    fn encode_ret(&mut self, first: Option<&Expr>, env: &Env) -> bool {
        let arg = match self.operand(first, env, Mnemonic::Ret, "first") {
            Some(v) => v,
            None => return false,
        };

        match &*arg {
            Value::Condition(cond) => self.assembly.write_word(0x2300 + cond.code()),
            _ => {
                eprintln!(
                    "[instruction] Expected cpu condition for argument of instruction 'ret'.",
                );
                false
            }
        }
    }

    /// INC/DEC: any non-pointer register (the register code spans all three
    /// files), an absolute address, or a long register pointer.
    fn encode_step(
        &mut self,
        base: u16,
        mnemonic: Mnemonic,
        first: Option<&Expr>,
        env: &Env,
    ) -> bool {
        let arg = match self.operand(first, env, mnemonic, "first") {
            Some(v) => v,
            None => return false,
        };

        match &*arg {
            Value::Register { reg, pointer: false } => {
                self.assembly.write_word(base + reg.code())
            }
            Value::Register { reg, pointer: true } => {
                if !reg.is_long() {
                    eprintln!(
                        "[instruction] Expected long register pointer for argument of \
                         instruction '{} [r32]'.",
                        mnemonic.name(),
                    );
                    return false;
                }
                self.assembly.write_word(base + 0x30 + reg.index() as u16)
            }
            Value::Address(address) => {
                self.assembly.write_word(base + 0x20) && self.assembly.write_long(*address)
            }
            _ => {
                eprintln!(
                    "[instruction] Expected register, address or long register pointer for \
                     argument of instruction '{}'.",
                    mnemonic.name(),
                );
                false
            }
        }
    }

    /// The accumulator-destination ALU family (`add`/`adc`/`sub`/`sbc`/
    /// `and`/`or`/`xor`/`cmp`): immediate, byte register, absolute address
    /// or long register pointer.
    fn encode_accumulator(
        &mut self,
        base: u16,
        mnemonic: Mnemonic,
        first: Option<&Expr>,
        env: &Env,
    ) -> bool {
        let arg = match self.operand(first, env, mnemonic, "first") {
            Some(v) => v,
            None => return false,
        };

        match &*arg {
            Value::Number(n) => {
                self.assembly.write_word(base) && self.assembly.write_byte(n.integer() as u8)
            }
            Value::Register { reg, pointer: true } => {
                if !reg.is_long() {
                    eprintln!(
                        "[instruction] Expected long register pointer for argument to \
                         instruction '{} [r32]'.",
                        mnemonic.name(),
                    );
                    return false;
                }
                self.assembly.write_word(base + 0x30 + reg.index() as u16)
            }
            Value::Register { reg, pointer: false } => {
                if !reg.is_byte() {
                    eprintln!(
                        "[instruction] Expected byte register for argument to instruction \
                         '{} r8'.",
                        mnemonic.name(),
                    );
                    return false;
                }
                self.assembly.write_word(base + 0x10 + reg.code())
            }
            Value::Address(address) => {
                self.assembly.write_word(base + 0x20) && self.assembly.write_long(*address)
            }
            _ => {
                eprintln!(
                    "[instruction] Expected integer, byte register, address or address pointer \
                     for argument to instruction '{}'.",
                    mnemonic.name(),
                );
                false
            }
        }
    }

    /// The shift/rotate family: like the accumulator family, minus the
    /// immediate form.
    fn encode_shift(
        &mut self,
        base: u16,
        mnemonic: Mnemonic,
        first: Option<&Expr>,
        env: &Env,
    ) -> bool {
        let arg = match self.operand(first, env, mnemonic, "first") {
            Some(v) => v,
            None => return false,
        };

        match &*arg {
            Value::Register { reg, pointer: true } => {
                if !reg.is_long() {
                    eprintln!(
                        "[instruction] Expected long register pointer for argument to \
                         instruction '{} [r32]'.",
                        mnemonic.name(),
                    );
                    return false;
                }
                self.assembly.write_word(base + 0x30 + reg.index() as u16)
            }
            Value::Register { reg, pointer: false } => {
                if !reg.is_byte() {
                    eprintln!(
                        "[instruction] Expected byte register for argument to instruction \
                         '{} r8'.",
                        mnemonic.name(),
                    );
                    return false;
                }
                self.assembly.write_word(base + 0x10 + reg.code())
            }
            Value::Address(address) => {
                self.assembly.write_word(base + 0x20) && self.assembly.write_long(*address)
            }
            _ => {
                eprintln!(
                    "[instruction] Expected byte register, address or address pointer for \
                     argument to instruction '{}'.",
                    mnemonic.name(),
                );
                false
            }
        }
    }

    /// BIT/SET/RES: a bit index immediate plus a byte register, absolute
    /// address or long register pointer. The bit index byte is emitted right
    /// after the opcode, before any address immediate.
    fn encode_bitwise(
        &mut self,
        base: u16,
        mnemonic: Mnemonic,
        first: Option<&Expr>,
        second: Option<&Expr>,
        env: &Env,
    ) -> bool {
        let arg_one = match self.operand(first, env, mnemonic, "first") {
            Some(v) => v,
            None => return false,
        };
        let arg_two = match self.operand(second, env, mnemonic, "second") {
            Some(v) => v,
            None => return false,
        };

        let bit = match &*arg_one {
            Value::Number(n) => (n.integer() & 0b111) as u8,
            _ => {
                eprintln!(
                    "[instruction] Expected number for argument one of instruction '{}'.",
                    mnemonic.name(),
                );
                return false;
            }
        };

        match &*arg_two {
            Value::Register { reg, pointer: true } => {
                if !reg.is_long() {
                    eprintln!(
                        "[instruction] Expected long register pointer for argument to \
                         instruction '{} bp [r32]'.",
                        mnemonic.name(),
                    );
                    return false;
                }
                self.assembly.write_word(base + 0x30 + reg.index() as u16)
                    && self.assembly.write_byte(bit)
            }
            Value::Register { reg, pointer: false } => {
                if !reg.is_byte() {
                    eprintln!(
                        "[instruction] Expected byte register for argument to instruction \
                         '{} bp r8'.",
                        mnemonic.name(),
                    );
                    return false;
                }
                self.assembly.write_word(base + 0x10 + reg.code())
                    && self.assembly.write_byte(bit)
            }
            Value::Address(address) => {
                self.assembly.write_word(base + 0x20)
                    && self.assembly.write_byte(bit)
                    && self.assembly.write_long(*address)
            }
            _ => {
                eprintln!(
                    "[instruction] Expected byte register, address or address pointer for \
                     argument two to instruction '{}'.",
                    mnemonic.name(),
                );
                false
            }
        }
    }
}


#[cfg(test)]
mod test {
    use crate::{
        lexer::Lexer,
        parser,
        eval::Interpreter,
    };


    /// Assembles one source string and returns the whole image.
    fn assemble(source: &str) -> Vec<u8> {
        let mut lexer = Lexer::new();
        assert!(lexer.lex_source("test", source), "lex error");

        let program = parser::parse_program(&mut lexer).expect("parse error");
        let mut interpreter = Interpreter::new(&mut lexer);
        assert!(interpreter.assemble(&program), "assembly error");

        interpreter.assembly().rom().to_vec()
    }

    /// Asserts that `source` emits exactly `expected` behind the entry point
    /// (and nothing else).
    fn assert_encodes(source: &str, expected: &[u8]) {
        let rom = assemble(source);
        assert_eq!(&rom[0x200..0x200 + expected.len()], expected, "for '{}'", source);
        assert!(
            rom[0x200 + expected.len()..].iter().all(|b| *b == 0),
            "unexpected extra bytes for '{}'",
            source,
        );
    }

    fn encode_fails(source: &str) {
        let mut lexer = Lexer::new();
        assert!(lexer.lex_source("test", source), "lex error");

        let program = parser::parse_program(&mut lexer).expect("parse error");
        let mut interpreter = Interpreter::new(&mut lexer);
        assert!(!interpreter.assemble(&program));
    }


    #[test]
    fn test_no_operand_opcodes() {
        assert_encodes("stop", &[0x01, 0x00]);
        assert_encodes("halt", &[0x02, 0x00]);
        assert_encodes("daa", &[0x05, 0x00]);
        assert_encodes("reti", &[0x10, 0x23]);
        assert_encodes("rla", &[0x40, 0x73]);
        assert_encodes("rrca", &[0x40, 0x76]);
    }

    #[test]
    fn test_ld_forms() {
        assert_encodes("ld b0, $42", &[0x00, 0x10, 0x42]);
        assert_encodes("ld b9, $42", &[0x09, 0x10, 0x42]);
        assert_encodes("ld w3, $1234", &[0x13, 0x10, 0x34, 0x12]);
        assert_encodes("ld l1, $11223344", &[0x19, 0x10, 0x44, 0x33, 0x22, 0x11]);
        assert_encodes("ld b2, [$80000010]", &[0x22, 0x10, 0x10, 0x00, 0x00, 0x80]);
        assert_encodes("ld b5, [l2]", &[0x55, 0x10]);

        encode_fails("ld [l0], b0"); // pointer destination is 'st' territory
    }

    #[test]
    fn test_st_forms() {
        assert_encodes("st [$80000010], b3", &[0x23, 0x11, 0x10, 0x00, 0x00, 0x80]);
        assert_encodes("st [l3], b1", &[0x61, 0x11]);

        encode_fails("st [l3], w0"); // only byte registers store
    }

    #[test]
    fn test_high_page_shorthands() {
        assert_encodes("lhb [$44]", &[0x70, 0x10, 0x44]);
        assert_encodes("lhr", &[0x71, 0x10]);
        assert_encodes("lhw [$1234]", &[0x72, 0x10, 0x34, 0x12]);
        assert_encodes("shb [$44]", &[0x70, 0x11, 0x44]);
        assert_encodes("shw [$1234]", &[0x72, 0x11, 0x34, 0x12]);
        assert_encodes("ssp [$80000000]", &[0x73, 0x11, 0x00, 0x00, 0x00, 0x80]);
        assert_encodes("spc [$80000000]", &[0x74, 0x11, 0x00, 0x00, 0x00, 0x80]);
    }

    #[test]
    fn test_mv_and_ms_forms() {
        assert_encodes("mv b3, b12", &[0x3c, 0x12]);
        assert_encodes("mv w5, w1", &[0x51, 0x13]);
        assert_encodes("mv l2, l3", &[0x23, 0x14]);
        assert_encodes("msp w4", &[0x04, 0x15]);
        assert_encodes("mpc l1", &[0x09, 0x15]);

        encode_fails("mv b0, w0"); // mixed register classes
        encode_fails("msp l0");
    }

    #[test]
    fn test_stack_forms() {
        assert_encodes("push l0", &[0x18, 0x16]);
        assert_encodes("push l3", &[0x1b, 0x16]);
        assert_encodes("pop l2", &[0x3a, 0x16]);

        encode_fails("push b0");
    }

    #[test]
    fn test_control_transfer_forms() {
        assert_encodes("jmp n, [$200]", &[0x00, 0x20, 0x00, 0x02, 0x00, 0x00]);
        assert_encodes("jmp nc, [$200]", &[0x04, 0x20, 0x00, 0x02, 0x00, 0x00]);
        assert_encodes("jmp z, [l0]", &[0x11, 0x20]);
        assert_encodes("jmp n, [l3]", &[0x40, 0x20]);
        assert_encodes("call nz, [$300]", &[0x02, 0x22, 0x00, 0x03, 0x00, 0x00]);
        assert_encodes("rst 3", &[0x10, 0x22, 0x03]);
        assert_encodes("ret c", &[0x03, 0x23]);

        encode_fails("jmp [$200], n"); // operands the wrong way around
    }

    #[test]
    fn test_inc_dec_forms() {
        assert_encodes("inc b7", &[0x07, 0x30]);
        assert_encodes("inc w2", &[0x12, 0x30]);
        assert_encodes("inc l3", &[0x1b, 0x30]);
        assert_encodes("inc [$80000000]", &[0x20, 0x30, 0x00, 0x00, 0x00, 0x80]);
        assert_encodes("inc [l1]", &[0x31, 0x30]);
        assert_encodes("dec b7", &[0x07, 0x31]);
        assert_encodes("dec [l0]", &[0x30, 0x31]);
    }

    #[test]
    fn test_accumulator_families() {
        assert_encodes("add $20", &[0x00, 0x32, 0x20]);
        assert_encodes("add b4", &[0x14, 0x32]);
        assert_encodes("add [$80000000]", &[0x20, 0x32, 0x00, 0x00, 0x00, 0x80]);
        assert_encodes("add [l2]", &[0x32, 0x32]);
        assert_encodes("adc $01", &[0x40, 0x32, 0x01]);
        assert_encodes("sub b1", &[0x11, 0x33]);
        assert_encodes("sbc b1", &[0x51, 0x33]);
        assert_encodes("and $0f", &[0x00, 0x50, 0x0f]);
        assert_encodes("or b2", &[0x12, 0x51]);
        assert_encodes("xor b0", &[0x10, 0x52]);
        assert_encodes("cmp $99", &[0x00, 0x53, 0x99]);

        encode_fails("add w0"); // word registers have no ALU column
    }

    #[test]
    fn test_bitwise_families() {
        assert_encodes("bit 7, b0", &[0x10, 0x60, 0x07]);
        assert_encodes("set 0, b15", &[0x1f, 0x61, 0x00]);
        assert_encodes("res 2, [l1]", &[0x31, 0x62, 0x02]);
        assert_encodes("bit 1, [$82000000]", &[0x20, 0x60, 0x01, 0x00, 0x00, 0x00, 0x82]);

        encode_fails("bit b0, 7"); // operands the wrong way around
    }

    #[test]
    fn test_shift_families() {
        assert_encodes("sla b1", &[0x11, 0x70]);
        assert_encodes("sra b1", &[0x11, 0x71]);
        assert_encodes("srl [l0]", &[0x30, 0x72]);
        assert_encodes("rl b0", &[0x10, 0x73]);
        assert_encodes("rlc [$80000000]", &[0x20, 0x74, 0x00, 0x00, 0x00, 0x80]);
        assert_encodes("rr b9", &[0x19, 0x75]);
        assert_encodes("rrc b2", &[0x12, 0x76]);
    }
}
