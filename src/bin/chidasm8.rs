//! The disassembler CLI: a binary image in, assembly text (listing or
//! clean) out.
//!
//! Flags follow the same hand-rolled `std::env::args()` style as
//! `chasm8`, grounded on
//! `original_source/chidasm8/src/cmdlineparser.cc`: `-o` overrides the
//! output name, `-p` names the synthesized program label (unused by the
//! printer itself but accepted for interface fidelity), `-c` selects
//! clean output, default output name is the source stem with `.lst`
//! (`.asm` under `-c`).

use std::collections::HashMap;
use std::path::Path;
use std::{env, fs, process};

use chip8ir::disassembler;
use chip8ir::logging::{error, info};
use chip8ir::memory::DEFAULT_ORIGIN;
use chip8ir::printer::{self, Mode};

struct Args {
    source: String,
    output: Option<String>,
    program_name: Option<String>,
    clean: bool,
    verbose: bool,
}

fn usage() -> &'static str {
    "Usage: chidasm8 [-o output] [-p name] [-c] [-v] [-h] <source.ch8>"
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut source = None;
    let mut output = None;
    let mut program_name = None;
    let mut clean = false;
    let mut verbose = false;

    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "-h" | "--help" => return Err(usage().to_string()),
            "-v" | "--verbose" => verbose = true,
            "-c" | "--clean" => clean = true,
            "-o" => {
                i += 1;
                output = Some(raw.get(i).ok_or("-o requires a filename")?.clone());
            }
            "-p" => {
                i += 1;
                program_name = Some(raw.get(i).ok_or("-p requires a name")?.clone());
            }
            arg if source.is_none() => source = Some(arg.to_string()),
            arg => return Err(format!("unexpected argument \"{}\"", arg)),
        }
        i += 1;
    }

    Ok(Args { source: source.ok_or("source file is required")?, output, program_name, clean, verbose })
}

fn stem(path: &str) -> String {
    Path::new(path).file_stem().and_then(|s| s.to_str()).unwrap_or("out").to_string()
}

fn main() {
    let raw: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!("{}", usage());
            process::exit(if message == usage() { 0 } else { 1 });
        }
    };

    let source_stem = stem(&args.source);
    let _program_name = args.program_name.unwrap_or_else(|| source_stem.clone());
    let mode = if args.clean { Mode::Clean } else { Mode::Listing };
    let default_suffix = if args.clean { ".asm" } else { ".lst" };
    let output_path = args.output.clone().unwrap_or_else(|| format!("{}{}", source_stem, default_suffix));

    if args.verbose {
        info(format!("reading {}", args.source));
    }

    let image = fs::read(&args.source).unwrap_or_else(|e| {
        error(format!("{}: {}", args.source, e));
        process::exit(2);
    });

    let result = disassembler::disassemble(image, DEFAULT_ORIGIN);

    if args.verbose {
        info(format!("{} labels synthesized", result.labels.len()));
    }

    let labels: HashMap<u16, String> = result.labels.iter().map(|l| (l.address, l.name.clone())).collect();
    let text = printer::print_program(&result.program, &labels, mode);

    if args.verbose {
        info(format!("writing {}", output_path));
    }

    fs::write(&output_path, text).unwrap_or_else(|e| {
        error(format!("{}: {}", output_path, e));
        process::exit(3);
    });
}
