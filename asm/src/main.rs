use std::{
    path::PathBuf,
    process,
};

use failure::{bail, Error};
use structopt::StructOpt;

use sm166_asm::{
    eval::Interpreter,
    lexer::Lexer,
    parser,
};


#[derive(Debug, StructOpt)]
#[structopt(name = "sm166-asm", about = "Assembler for the SM166 CPU.")]
struct Args {
    /// The assembly source file to translate.
    #[structopt(short = "i", long = "input-filename", parse(from_os_str))]
    input_filename: PathBuf,

    /// Where to write the assembled ROM image.
    #[structopt(short = "o", long = "output-file", parse(from_os_str))]
    output_file: Option<PathBuf>,

    /// Dump the token stream instead of assembling.
    #[structopt(short = "l", long = "lex-only")]
    lex_only: bool,

    /// Dump the syntax tree instead of assembling.
    #[structopt(short = "s", long = "ast-only")]
    ast_only: bool,

    /// Assemble without writing the ROM image.
    #[structopt(short = "n", long = "no-output")]
    no_output: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("ERROR: {}", e);

        for cause in e.iter_causes() {
            eprintln!("  ... caused by: {}", cause);
        }

        process::exit(1);
    }
}

/// The actual main function.
fn run() -> Result<(), Error> {
    let args = Args::from_args();

    if args.output_file.is_none() && !args.lex_only && !args.ast_only && !args.no_output {
        bail!("missing output filename argument (--output-file, -o)");
    }

    let mut lexer = Lexer::new();
    if !lexer.lex_file(&args.input_filename) {
        bail!("could not lex '{}'", args.input_filename.display());
    }

    if args.lex_only {
        let mut index = 0usize;
        while lexer.has_more_tokens() {
            let token = lexer.discard_token();
            index += 1;
            println!("{}. '{}' = '{}'", index, token.type_name(), token.text);
        }

        return Ok(());
    }

    let program = match parser::parse_program(&mut lexer) {
        Some(program) => program,
        None => bail!("could not parse '{}'", args.input_filename.display()),
    };

    if args.ast_only {
        println!("{:#?}", program);
        return Ok(());
    }

    let mut interpreter = Interpreter::new(&mut lexer);
    if !interpreter.assemble(&program) {
        bail!("could not assemble '{}'", args.input_filename.display());
    }

    if !args.no_output {
        let output = args.output_file.expect("checked above");
        if !interpreter.assembly().save_rom(&output) {
            bail!("could not write '{}'", output.display());
        }
    }

    Ok(())
}
