//! Toy C Compiler Driver
//!
//! Command-line entry point: reads a source file (or stdin), runs the
//! full pipeline, and writes the assembly to a file (or stdout). The
//! assembly is built completely in memory before anything is written,
//! so a failed compilation never leaves partial output behind.

use clap::Parser;
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use toycc_codegen::generate_assembly;
use toycc_common::CompilerError;
use toycc_frontend::Frontend;
use toycc_opt::Optimizer;

#[derive(Parser)]
#[command(name = "toycc")]
#[command(about = "Toy C compiler targeting RV32 assembly")]
#[command(version = "0.1.0")]
struct Cli {
    /// Input source file, or "-" for stdin
    #[arg(default_value = "-")]
    input: String,

    /// Output assembly file, or "-" for stdout
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Skip the optimization pipeline
    #[arg(long)]
    no_opt: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CompilerError> {
    let source = read_input(&cli.input)?;
    let (mut unit, mut infos) = Frontend::analyze_source(&source)?;
    if !cli.no_opt {
        log::debug!("running optimization pipeline");
        let mut optimizer = Optimizer::new(&unit);
        optimizer.optimize(&mut unit, &mut infos)?;
    }
    let assembly = generate_assembly(&unit, &infos)?;
    write_output(&cli.output, &assembly)
}

fn read_input(path: &str) -> Result<String, CompilerError> {
    if path == "-" {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &str, assembly: &str) -> Result<(), CompilerError> {
    if path == "-" {
        io::stdout().write_all(assembly.as_bytes())?;
        Ok(())
    } else {
        fs::write(path, assembly)?;
        Ok(())
    }
}
