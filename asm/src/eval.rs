//! The evaluator: walks the syntax tree, maintaining the environment and
//! emitting bytes into the output image.
//!
//! Assembly runs in two passes over the same tree. The first pass is lenient
//! about unresolved identifiers -- they stand in as address zero, which has
//! the same encoded width as any real label -- while recording the address of
//! every label statement it passes. The second pass starts over with a fresh
//! image and environment and resolves forward label references from the
//! recorded addresses; anything still unknown is an error.

use std::{
    collections::BTreeMap,
    rc::Rc,
};

use crate::{
    env::{Env, Scope},
    keyword::Keyword,
    lexer::Lexer,
    parser,
    rom::Assembly,
    syntax::{BinOp, Expr, Program, Stmt},
    value::Value,
};


pub struct Interpreter<'l> {
    lexer: &'l mut Lexer,
    pub(crate) assembly: Assembly,
    labels: BTreeMap<String, u32>,
    lenient: bool,
}

impl<'l> Interpreter<'l> {
    pub fn new(lexer: &'l mut Lexer) -> Self {
        Self {
            lexer,
            assembly: Assembly::new(),
            labels: BTreeMap::new(),
            lenient: false,
        }
    }

    /// Runs both assembly passes over the parsed program. Returns `false` if
    /// either pass fails.
    pub fn assemble(&mut self, program: &Program) -> bool {
        self.lenient = true;
        self.labels.clear();
        {
            let env = Env::global();
            if self.eval_body(&program.body, &env).is_none() {
                return false;
            }
        }

        // Start over with everything reset except the collected labels.
        self.assembly = Assembly::new();
        self.lexer.clear_includes();
        self.lenient = false;

        let env = Env::global();
        self.eval_body(&program.body, &env).is_some()
    }

    pub fn assembly(&self) -> &Assembly {
        &self.assembly
    }

    /// Evaluates a statement list, yielding the last statement's value.
    fn eval_body(&mut self, body: &[Stmt], env: &Env) -> Option<Rc<Value>> {
        let mut last = Value::void();
        for stmt in body {
            last = self.eval_stmt(stmt, env)?;
        }
        Some(last)
    }

    pub(crate) fn eval_stmt(&mut self, stmt: &Stmt, env: &Env) -> Option<Rc<Value>> {
        match stmt {
            Stmt::Size(size) => {
                if !self.assembly.resize_rom(*size as usize) {
                    return None;
                }
                Some(Value::void())
            }

            Stmt::Section { ram, addr } => {
                let cursor = match &*self.eval_expr(addr, env)? {
                    Value::Number(n) => n.integer(),
                    _ => {
                        eprintln!(
                            "[interpreter] Expected numeric value in second parameter of \
                             '.section' directive.",
                        );
                        return None;
                    }
                };

                if *ram {
                    self.assembly.set_ram_mode(true);
                    self.assembly.set_ram_cursor(cursor);
                } else {
                    self.assembly.set_ram_mode(false);
                    if !self.assembly.set_rom_cursor(cursor as usize) {
                        return None;
                    }
                }

                Some(Value::void())
            }

            Stmt::VariableDecl { name, value, constant, global } => {
                let value = self.eval_expr(value, env)?;
                if matches!(&*value, Value::Void) {
                    eprintln!(
                        "[interpreter] Declaration of variable '{}' has evaluated to no value.",
                        name,
                    );
                    return None;
                }

                let target = if *global { env.root() } else { env };
                if !target.declare_variable(name, value, *constant) {
                    return None;
                }

                Some(Value::void())
            }

            Stmt::Label(name) => {
                let cursor = self.assembly.current_cursor() as u32;
                if !env.declare_variable(name, Rc::new(Value::Address(cursor)), false) {
                    return None;
                }
                self.labels.insert(name.clone(), cursor);

                Some(Value::void())
            }

            Stmt::Data { exprs, size } => self.eval_data(exprs, *size, env),

            Stmt::Include(path) => {
                let full = self.lexer.parent_path().join(path);
                if !self.lexer.lex_file(&full) {
                    eprintln!("[interpreter] Could not lex included source file \"{}\".", path);
                    return None;
                }

                let program = parser::parse_program(self.lexer)?;
                self.eval_body(&program.body, env)
            }

            Stmt::Incbin(path) => {
                let full = self.lexer.parent_path().join(path);
                if !self.assembly.include_binary(&full) {
                    return None;
                }
                Some(Value::void())
            }

            Stmt::Repeat { count, body } => {
                let count = match &*self.eval_expr(count, env)? {
                    Value::Number(n) => n.integer(),
                    other => {
                        eprintln!(
                            "[interpreter] Expected numeric count in repeat statement; got '{}'.",
                            other.type_name(),
                        );
                        return None;
                    }
                };

                for _ in 0..count {
                    let scope = Env::child(env, Scope::Repeat);
                    self.eval_body(body, &scope)?;
                }

                Some(Value::void())
            }

            Stmt::Shift(count) => {
                match env.function_scope() {
                    Some(scope) if scope.shift_arguments(*count) => Some(Value::void()),
                    _ => {
                        eprintln!("[interpreter] 'shift' outside of a function call.");
                        None
                    }
                }
            }

            Stmt::If { condition, then_body, else_body } => {
                let condition = self.eval_expr(condition, env)?;
                let scope = Env::child(env, Scope::If);

                if condition.is_truthy() {
                    self.eval_body(then_body, &scope)?;
                } else {
                    self.eval_body(else_body, &scope)?;
                }

                Some(Value::void())
            }

            Stmt::Charmap { from, to } => {
                let from = match &*self.eval_expr(from, env)? {
                    Value::Str(s) if s.chars().count() == 1 => s.chars().next().unwrap(),
                    other => {
                        eprintln!(
                            "[interpreter] Expected single-character string in charmap \
                             statement; got '{}'.",
                            other.type_name(),
                        );
                        return None;
                    }
                };
                let to = match &*self.eval_expr(to, env)? {
                    Value::Number(n) => n.integer() as u8,
                    other => {
                        eprintln!(
                            "[interpreter] Expected numeric mapping in charmap statement; \
                             got '{}'.",
                            other.type_name(),
                        );
                        return None;
                    }
                };

                self.assembly.map_character(from, to);
                Some(Value::void())
            }

            Stmt::NewCharmap(name) => {
                self.assembly.new_charmap(name);
                Some(Value::void())
            }

            Stmt::SetCharmap(name) => {
                if !self.assembly.set_charmap(name) {
                    return None;
                }
                Some(Value::void())
            }

            Stmt::Instruction { mnemonic, first, second } => {
                if self.eval_instruction(*mnemonic, first.as_ref(), second.as_ref(), env) {
                    Some(Value::void())
                } else {
                    None
                }
            }

            Stmt::Expr(expr) => self.eval_expr(expr, env),
        }
    }

    /// Emits a `byte`/`word`/`long` data statement. In RAM mode the values
    /// are element counts and only advance the placement cursor.
    fn eval_data(&mut self, exprs: &[Expr], size: u8, env: &Env) -> Option<Rc<Value>> {
        if self.assembly.is_in_ram() {
            for (i, expr) in exprs.iter().enumerate() {
                let count = match &*self.eval_expr(expr, env)? {
                    Value::Number(n) => n.integer(),
                    _ => {
                        eprintln!(
                            "[interpreter] Expression #{} in RAM data statement is not numeric.",
                            i + 1,
                        );
                        return None;
                    }
                };

                let cursor = self.assembly.ram_cursor();
                self.assembly.set_ram_cursor(cursor + count * size as u64);
            }

            return Some(Value::void());
        }

        for expr in exprs {
            match &*self.eval_expr(expr, env)? {
                Value::Number(n) => {
                    let integer = n.integer();
                    let ok = match size {
                        4 => self.assembly.write_long(integer as u32),
                        2 => self.assembly.write_word(integer as u16),
                        1 => self.assembly.write_byte(integer as u8),
                        _ => false,
                    };
                    if !ok {
                        return None;
                    }
                }
                Value::Str(s) => {
                    if size != 1 {
                        eprintln!(
                            "[interpreter] Strings can only be passed into byte data statements.",
                        );
                        return None;
                    }

                    for c in s.chars() {
                        let byte = self.assembly.map_char(c);
                        if !self.assembly.write_byte(byte) {
                            return None;
                        }
                    }
                    if !self.assembly.write_byte(0x00) {
                        return None;
                    }
                }
                Value::Address(address) => {
                    // Labels in data statements emit their address.
                    let ok = match size {
                        4 => self.assembly.write_long(*address),
                        2 => self.assembly.write_word(*address as u16),
                        1 => self.assembly.write_byte(*address as u8),
                        _ => false,
                    };
                    if !ok {
                        return None;
                    }
                }
                other => {
                    eprintln!(
                        "[interpreter] Cannot emit a '{}' value from a data statement.",
                        other.type_name(),
                    );
                    return None;
                }
            }
        }

        Some(Value::void())
    }

    pub(crate) fn eval_expr(&mut self, expr: &Expr, env: &Env) -> Option<Rc<Value>> {
        match expr {
            Expr::Number(n) => Some(Value::number(*n)),
            Expr::Str(s) => Some(Rc::new(Value::Str(s.clone()))),
            Expr::Ident(name) => self.eval_identifier(name, env),
            Expr::Address(inner) => {
                let inner = self.eval_expr(inner, env)?;
                match &*inner {
                    Value::Number(n) => Some(Rc::new(Value::Address(n.integer() as u32))),
                    Value::Address(address) => Some(Rc::new(Value::Address(*address))),
                    Value::Register { reg, .. } => Some(Rc::new(Value::Register {
                        reg: *reg,
                        pointer: true,
                    })),
                    _ => {
                        eprintln!(
                            "[interpreter] Expected number value or long register in address \
                             expression.",
                        );
                        None
                    }
                }
            }
            Expr::Binary { left, right, op } => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                apply_binary(&left, &right, *op)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, env),
            Expr::Function { name, params, body, global } => {
                let value = Rc::new(Value::Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::clone(body),
                });

                let target = if *global { env.root() } else { env };
                if !target.declare_variable(name, Rc::clone(&value), true) {
                    return None;
                }

                Some(value)
            }
        }
    }

    fn eval_identifier(&mut self, name: &str, env: &Env) -> Option<Rc<Value>> {
        match crate::keyword::lookup(name) {
            Some(Keyword::Register(reg)) => {
                return Some(Rc::new(Value::Register { reg, pointer: false }));
            }
            Some(Keyword::Condition(cond)) => {
                return Some(Rc::new(Value::Condition(cond)));
            }
            _ => {}
        }

        if let Some(value) = env.resolve_variable(name) {
            return Some(value);
        }

        // Forward label references resolve from the address table the first
        // pass recorded; during the first pass itself any unknown name stands
        // in as address zero.
        if let Some(address) = self.labels.get(name) {
            return Some(Rc::new(Value::Address(*address)));
        }
        if self.lenient {
            return Some(Rc::new(Value::Address(0)));
        }

        if !name.starts_with('_') {
            eprintln!("[environment] Could not resolve variable name '{}'.", name);
        }
        None
    }

    fn eval_call(&mut self, callee: &str, args: &[Expr], env: &Env) -> Option<Rc<Value>> {
        let function = match env.resolve_variable(callee) {
            Some(value) => value,
            None => {
                eprintln!("[interpreter] Could not resolve variable name '{}'.", callee);
                return None;
            }
        };

        // Arguments are evaluated in the caller's scope, then bound both by
        // position (`_0`, `_1`, ...) and by parameter name.
        let scope = Env::child(env, Scope::Function);
        let params: &[String] = match &*function {
            Value::Function { params, .. } => params,
            Value::Native(_) => &[],
            _ => {
                eprintln!(
                    "[interpreter] Identifier '{}' does not resolve to a function.",
                    callee,
                );
                return None;
            }
        };

        for (i, arg) in args.iter().enumerate() {
            let value = match self.eval_expr(arg, env) {
                Some(value) => value,
                None => {
                    eprintln!(
                        "[interpreter] Evaluating argument #{} of call to function '{}'.",
                        i + 1, callee,
                    );
                    return None;
                }
            };

            scope.declare_variable(&format!("_{}", i), Rc::clone(&value), false);
            if let Some(param) = params.get(i) {
                scope.declare_variable(param, value, false);
            }
        }
        scope.declare_variable("_count", Value::number(args.len() as f64), false);

        match &*function {
            Value::Native(native) => native(&scope),
            Value::Function { body, .. } => {
                let body = Rc::clone(body);
                match self.eval_body(&body, &scope) {
                    Some(value) => Some(value),
                    None => {
                        eprintln!(
                            "[interpreter] Evaluating call to function '{}'.",
                            callee,
                        );
                        None
                    }
                }
            }
            _ => unreachable!(),
        }
    }
}

/// Combines two values with a binary operator. The bitwise operators work on
/// the integer part; the arithmetic ones on the numeric value; addresses
/// offset by numbers stay addresses.
fn apply_binary(left: &Value, right: &Value, op: BinOp) -> Option<Rc<Value>> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let result = match op {
                BinOp::And => (a.integer() & b.integer()) as f64,
                BinOp::Or => (a.integer() | b.integer()) as f64,
                BinOp::Xor => (a.integer() ^ b.integer()) as f64,
                BinOp::Add => a.value() + b.value(),
                BinOp::Sub => a.value() - b.value(),
                BinOp::Mul => a.value() * b.value(),
                BinOp::Div => {
                    if b.value() == 0.0 {
                        eprintln!("[interpreter] Attempted division by zero encountered.");
                        return None;
                    }
                    a.value() / b.value()
                }
                BinOp::Mod => {
                    if b.value() == 0.0 {
                        eprintln!("[interpreter] Attempted modulo by zero encountered.");
                        return None;
                    }
                    a.value() % b.value()
                }
            };
            Some(Value::number(result))
        }

        (Value::Address(address), Value::Number(n)) => match op {
            BinOp::Add => Some(Rc::new(Value::Address(
                address.wrapping_add(n.integer() as u32),
            ))),
            BinOp::Sub => Some(Rc::new(Value::Address(
                address.wrapping_sub(n.integer() as u32),
            ))),
            _ => {
                eprintln!(
                    "[interpreter] Operator '{}' cannot be applied to an address.",
                    op.symbol(),
                );
                None
            }
        },

        (Value::Number(n), Value::Address(address)) if op == BinOp::Add => {
            Some(Rc::new(Value::Address(address.wrapping_add(n.integer() as u32))))
        }

        _ => {
            eprintln!(
                "[interpreter] Operator '{}' cannot combine '{}' and '{}' values.",
                op.symbol(), left.type_name(), right.type_name(),
            );
            None
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;


    /// Assembles a source string, returning the finished image.
    pub(crate) fn assemble(source: &str) -> Option<Vec<u8>> {
        let mut lexer = Lexer::new();
        assert!(lexer.lex_source("test", source));

        let program = parser::parse_program(&mut lexer)?;
        let mut interpreter = Interpreter::new(&mut lexer);
        if !interpreter.assemble(&program) {
            return None;
        }

        Some(interpreter.assembly().rom().to_vec())
    }

    /// The payload emitted behind the entry point, trimmed of trailing
    /// zeroed fill.
    fn payload(rom: &[u8]) -> &[u8] {
        let mut end = rom.len();
        while end > 0x200 && rom[end - 1] == 0 {
            end -= 1;
        }
        &rom[0x200..end]
    }

    #[test]
    fn test_assemble_nop() {
        let rom = assemble(".size $210\nnop").unwrap();
        assert_eq!(rom.len(), 0x210);
        assert_eq!(&rom[0x200..0x202], &[0x00, 0x00]);
    }

    #[test]
    fn test_data_statements() {
        let rom = assemble("byte 1, 2, $ff\nword $1234\nlong $cafebabe").unwrap();
        assert_eq!(payload(&rom), &[
            0x01, 0x02, 0xff,
            0x34, 0x12,
            0xbe, 0xba, 0xfe, 0xca,
        ]);
    }

    #[test]
    fn test_negative_data_truncates() {
        let rom = assemble("byte -5\nword -2").unwrap();
        assert_eq!(payload(&rom), &[0xfb, 0xfe, 0xff]);
    }

    #[test]
    fn test_string_data_and_charmaps() {
        let rom = assemble("byte \"AB\"").unwrap();
        assert_eq!(payload(&rom), &[0x41, 0x42, 0x00]);

        let rom = assemble("charmap \"A\", 1\ncharmap \"B\", 2\nbyte \"AB\"").unwrap();
        assert_eq!(payload(&rom), &[0x01, 0x02, 0x00]);

        // Switching to a fresh charmap restores the identity mapping.
        let rom = assemble(
            "charmap \"A\", 1\nnewcharmap other\nbyte \"A\"",
        ).unwrap();
        assert_eq!(payload(&rom), &[0x41, 0x00]);
    }

    #[test]
    fn test_let_const_and_arithmetic() {
        let rom = assemble("let x = 2 + 3 * 4\nbyte x").unwrap();
        assert_eq!(payload(&rom), &[14]);

        let rom = assemble("const mask = $f0 | $01\nbyte mask & $ff").unwrap();
        assert_eq!(payload(&rom), &[0xf1]);

        // Constants cannot be re-declared.
        assert!(assemble("const k = 1\nlet k = 2").is_none());
        // Division by zero is an error, not a value.
        assert!(assemble("byte 1 / 0").is_none());
    }

    #[test]
    fn test_labels_and_forward_references() {
        // The jmp at 0x200 is 6 bytes; `target` binds to 0x206.
        let rom = assemble("jmp n, target\ndef target:\nbyte $aa").unwrap();
        assert_eq!(&rom[0x200..0x207], &[0x00, 0x20, 0x06, 0x02, 0x00, 0x00, 0xaa]);

        // Backward references work the same.
        let rom = assemble("def start:\nnop\njmp n, start").unwrap();
        assert_eq!(&rom[0x202..0x208], &[0x00, 0x20, 0x00, 0x02, 0x00, 0x00]);

        // A name that is not a label anywhere stays unresolved.
        assert!(assemble("jmp n, nowhere").is_none());
    }

    #[test]
    fn test_ram_section_reserves_without_emitting() {
        let rom = assemble(
            ".section ram $100\n\
             def counter:\nbyte 2\n\
             def flags:\nbyte 1\n\
             .section rom $200\n\
             long counter\nlong flags",
        ).unwrap();

        // counter = 0x80000100, flags = counter + 2.
        assert_eq!(&rom[0x200..0x208], &[
            0x00, 0x01, 0x00, 0x80,
            0x02, 0x01, 0x00, 0x80,
        ]);
    }

    #[test]
    fn test_repeat_and_if() {
        let rom = assemble("repeat 3 { byte 7 }").unwrap();
        assert_eq!(payload(&rom), &[7, 7, 7]);

        let rom = assemble("if true { byte 1 } else { byte 2 }").unwrap();
        assert_eq!(payload(&rom), &[1]);

        let rom = assemble("if false { byte 1 } else if true { byte 2 } else { byte 3 }").unwrap();
        assert_eq!(payload(&rom), &[2]);
    }

    #[test]
    fn test_functions_and_shift() {
        let rom = assemble(
            "function pair(a, b) { byte a, b }\n\
             pair(3, 4)",
        ).unwrap();
        assert_eq!(payload(&rom), &[3, 4]);

        // Varargs processing through shift and the numbered argument names.
        let rom = assemble(
            "function tail() { shift 1\nbyte _0 }\n\
             tail(10, 20)",
        ).unwrap();
        assert_eq!(payload(&rom), &[20]);
    }

    #[test]
    fn test_intrinsics_in_data() {
        let rom = assemble("byte round(1.6), strlen(\"abcd\")").unwrap();
        assert_eq!(payload(&rom), &[2, 4]);

        let rom = assemble("word fp_frac(fp_div(1, 2, 8))").unwrap();
        assert_eq!(payload(&rom), &[128, 0]);

        assert!(assemble("byte fp_div(1, 0)").is_none());
    }

    #[test]
    fn test_size_directive_grows_the_image() {
        let rom = assemble(".size $400\nnop").unwrap();
        assert_eq!(rom.len(), 0x400);
    }

    #[test]
    fn test_include_re_enters_the_lexer() {
        let dir = std::env::temp_dir().join("sm166-asm-include-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("main.asm"), "include \"part.asm\"\nbyte 2").unwrap();
        std::fs::write(dir.join("part.asm"), "byte 1").unwrap();

        let mut lexer = Lexer::new();
        assert!(lexer.lex_file(&dir.join("main.asm")));
        let program = parser::parse_program(&mut lexer).unwrap();
        let mut interpreter = Interpreter::new(&mut lexer);
        assert!(interpreter.assemble(&program));

        // The included bytes land first, then the including file continues.
        let rom = interpreter.assembly().rom();
        assert_eq!(&rom[0x200..0x202], &[1, 2]);
    }

    #[test]
    fn test_incbin_copies_raw_bytes() {
        let dir = std::env::temp_dir().join("sm166-asm-incbin-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("main.asm"), "incbin \"blob.bin\"\nbyte $ee").unwrap();
        std::fs::write(dir.join("blob.bin"), &[0xde, 0xad, 0xbe, 0xef]).unwrap();

        let mut lexer = Lexer::new();
        assert!(lexer.lex_file(&dir.join("main.asm")));
        let program = parser::parse_program(&mut lexer).unwrap();
        let mut interpreter = Interpreter::new(&mut lexer);
        assert!(interpreter.assemble(&program));

        let rom = interpreter.assembly().rom();
        assert_eq!(&rom[0x200..0x205], &[0xde, 0xad, 0xbe, 0xef, 0xee]);
    }

    #[test]
    fn test_vector_table_emission() {
        // Interrupt handler 0 lives at 0x80; place an endless loop there.
        let rom = assemble(
            ".section rom $80\njmp n, [$80]\n.section rom $200\nnop",
        ).unwrap();
        assert_eq!(&rom[0x80..0x86], &[0x00, 0x20, 0x80, 0x00, 0x00, 0x00]);
        assert_eq!(&rom[0x200..0x202], &[0x00, 0x00]);
    }
}
