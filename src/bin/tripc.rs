//! TIR compiler driver.
//!
//! Reads a TIR unit from a file (or stdin), runs it through the back end and
//! prints the listing the emitter produced.

use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;
use tribe::tir::{self, Evaluator};
use tribe::{CompileKind, CompileOptions, Compiler, FullBool, ListingEmitter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BoolMode {
    Standard,
    Full,
    Ext,
}

impl From<BoolMode> for FullBool {
    fn from(mode: BoolMode) -> Self {
        match mode {
            BoolMode::Standard => FullBool::Standard,
            BoolMode::Full => FullBool::Full,
            BoolMode::Ext => FullBool::Ext,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "tripc", version, about = "Compile a TIR unit and print its listing")]
struct Args {
    /// Input file; stdin when omitted
    input: Option<String>,

    /// Boolean evaluation mode
    #[arg(long, value_enum, default_value = "standard")]
    full_bool: BoolMode,

    /// Variable slots reserved by the front end
    #[arg(long, default_value_t = 0)]
    var_count: u32,

    /// Ceiling of live temporaries per class
    #[arg(long)]
    max_temps: Option<usize>,

    /// Keep stores of literals as plain stores
    #[arg(long)]
    no_inline_literals: bool,

    /// Drop redundant line-entry markers
    #[arg(long)]
    no_line_entry: bool,

    /// Compile as run-time built code
    #[arg(long)]
    indirect: bool,

    /// Evaluate the unit before finalizing it
    #[arg(long)]
    eval: bool,

    /// Initial value of the truth flag when evaluating
    #[arg(long)]
    truth: bool,

    /// Print compile statistics
    #[arg(long)]
    stats: bool,

    /// Include retired triples in the listing
    #[arg(long)]
    noops: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let source = match read_source(args.input.as_deref()) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut options = CompileOptions::default()
        .with_full_bool(args.full_bool.into())
        .with_var_count(args.var_count)
        .with_inline_literals(!args.no_inline_literals)
        .with_line_entry(!args.no_line_entry);
    if let Some(limit) = args.max_temps {
        options = options.with_max_temps(limit);
    }
    let kind = if args.indirect {
        CompileKind::Indirect
    } else {
        CompileKind::Normal
    };

    let mut compiler = Compiler::new(options, ListingEmitter::new().with_noops(args.noops));
    let result = compiler.compile(kind, &source, |ctx, source| {
        let parsed = tir::front_end(ctx, source)?;
        if args.eval {
            match Evaluator::new(ctx).with_test(args.truth).run(parsed.ret) {
                Ok(outcome) => {
                    for line in &outcome.output {
                        println!("{line}");
                    }
                    if let Some(value) = outcome.result {
                        println!("=> {value}");
                    }
                }
                Err(e) => eprintln!("eval error: {e}"),
            }
        }
        Ok(parsed)
    });

    match result {
        Ok(object) => {
            print!("{}", object.listing().unwrap_or_default());
            if args.stats {
                print!("{}", object.stats);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn read_source(input: Option<&str>) -> io::Result<String> {
    match input {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}
