//! The assembler CLI: source text in, a binary image (and optionally a
//! listing) out.
//!
//! Flags are parsed by hand with `std::env::args()`, the teacher's own
//! style — no argument-parsing crate, since CLI ergonomics are explicitly
//! out of scope here. Output naming defaults follow
//! `original_source/chasem8/src/cmdlineparser.cc`: the binary defaults to
//! the source file's stem with `.ch8`, the listing to stem with
//! `.ch8.lst`.

use std::collections::HashMap;
use std::path::Path;
use std::{env, fs, process};

use chip8ir::assembler;
use chip8ir::logging::{error, info};
use chip8ir::printer::{self, Mode};

struct Args {
    source: String,
    output: Option<String>,
    listing: Option<String>,
    verbose: bool,
}

fn usage() -> &'static str {
    "Usage: chasm8 [-o output.ch8] [-l[=listing.lst]] [-v] [-h] <source.asm>"
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut source = None;
    let mut output = None;
    let mut listing = None;
    let mut verbose = false;

    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "-h" | "--help" => return Err(usage().to_string()),
            "-v" | "--verbose" => verbose = true,
            "-o" => {
                i += 1;
                output = Some(raw.get(i).ok_or("-o requires a filename")?.clone());
            }
            "-l" => {
                listing = Some(String::new());
            }
            arg if arg.starts_with("-l=") => {
                listing = Some(arg["-l=".len()..].to_string());
            }
            arg if source.is_none() => source = Some(arg.to_string()),
            arg => return Err(format!("unexpected argument \"{}\"", arg)),
        }
        i += 1;
    }

    Ok(Args { source: source.ok_or("source file is required")?, output, listing, verbose })
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
    let output_path = args.output.clone().unwrap_or_else(|| format!("{}.ch8", source_stem));

    if args.verbose {
        info(format!("reading {}", args.source));
    }

    let source_text = fs::read_to_string(&args.source).unwrap_or_else(|e| {
        error(format!("{}: {}", args.source, e));
        process::exit(2);
    });

    let output = match assembler::assemble_default(&source_text) {
        Ok(output) => output,
        Err(diagnostics) => {
            for diagnostic in &diagnostics {
                error(diagnostic.to_string());
            }
            process::exit(2);
        }
    };

    if args.verbose {
        info(format!("writing {} ({} bytes)", output_path, output.image.len()));
    }

    fs::write(&output_path, &output.image).unwrap_or_else(|e| {
        error(format!("{}: {}", output_path, e));
        process::exit(3);
    });

    if let Some(listing_path) = &args.listing {
        let listing_path =
            if listing_path.is_empty() { format!("{}.ch8.lst", source_stem) } else { listing_path.clone() };

        let labels: HashMap<u16, String> =
            output.program.symbols.iter().map(|s| (s.value, s.name.clone())).collect();
        let listing = printer::print_program(&output.program, &labels, Mode::Listing);

        if args.verbose {
            info(format!("writing {}", listing_path));
        }
        fs::write(&listing_path, listing).unwrap_or_else(|e| {
            error(format!("{}: {}", listing_path, e));
            process::exit(3);
        });
    }
}
