//! Fault-injection hardening CLI.
//!
//! Reads textual IR from a file (or stdin), hardens it, and writes the
//! transformed IR to stdout. Statistics and analysis warnings go to
//! stderr.
//!
//! Usage:
//!     harden [options] [input.ir] > hardened.ir
//!     harden --analyze input.ir

use std::io::Read;
use std::process::ExitCode;

use harden::{analyze_module, harden_module, HardenLevel, HardenOptions};

fn print_usage() {
    eprintln!("harden - IR fault-injection hardening tool");
    eprintln!();
    eprintln!("Usage: harden [options] [input.ir] > hardened.ir");
    eprintln!("       harden --analyze [input.ir]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --level <0-3>       Hardening level (default 3)");
    eprintln!("  --analyze           Run the read-only analysis pass only");
    eprintln!("  --stats             Print transformation statistics to stderr");
    eprintln!("  --no-verify         Skip IR verification after transformation");
    eprintln!("  --no-branches       Disable branch hardening");
    eprintln!("  --no-memory         Disable load/store verification");
    eprintln!("  --arithmetic        Enable arithmetic duplication (off by default)");
    eprintln!("  --no-cfi            Disable indirect-call CFI");
    eprintln!("  --no-data-redundancy Disable critical-variable redundancy");
    eprintln!("  --no-memory-safety  Disable bounds checking");
    eprintln!("  --no-stack          Disable return-address protection");
    eprintln!("  --exceptions        Enable exception-path hardening (off by default)");
    eprintln!("  --hardware-io       Enable hardware I/O validation (off by default)");
    eprintln!("  --no-logging        Disable fault logging calls");
    eprintln!("  --timing            Enable timing-noise injection (off by default)");
    eprintln!("  --help, -h          Show this help message");
}

struct Cli {
    opts: HardenOptions,
    analyze: bool,
    input: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut opts = HardenOptions::default();
    let mut analyze = false;
    let mut input = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--level" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--level requires a value".to_string())?;
                let raw: u32 = value
                    .parse()
                    .map_err(|_| format!("invalid level '{value}'"))?;
                opts.level = HardenLevel::from_raw(raw).map_err(|e| e.to_string())?;
            }
            "--analyze" => analyze = true,
            "--stats" => opts.show_stats = true,
            "--no-verify" => opts.verify_ir = false,
            "--no-branches" => opts.branches = false,
            "--no-memory" => opts.memory = false,
            "--arithmetic" => opts.arithmetic = true,
            "--no-cfi" => opts.cfi = false,
            "--no-data-redundancy" => opts.data_redundancy = false,
            "--no-memory-safety" => opts.memory_safety = false,
            "--no-stack" => opts.stack = false,
            "--exceptions" => opts.exceptions = true,
            "--hardware-io" => opts.hardware_io = true,
            "--no-logging" => opts.logging = false,
            "--timing" => opts.timing = true,
            other if other.starts_with('-') => {
                return Err(format!("unknown option '{other}'"));
            }
            path => {
                if input.replace(path.to_string()).is_some() {
                    return Err("multiple input files given".to_string());
                }
            }
        }
    }

    Ok(Cli {
        opts,
        analyze,
        input,
    })
}

fn read_input(input: Option<&str>) -> std::io::Result<(String, String)> {
    match input {
        Some(path) => Ok((std::fs::read_to_string(path)?, path.to_string())),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok((text, "<stdin>".to_string()))
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {e}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let (text, name) = match read_input(cli.input.as_deref()) {
        Ok(read) => read,
        Err(e) => {
            eprintln!("Error reading input: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut module = match ir::parse(&text) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("Parse error in {name}: {e}");
            return ExitCode::FAILURE;
        }
    };
    module.name = name;

    if cli.analyze {
        let report = analyze_module(&module);
        eprint!("{report}");
        return ExitCode::SUCCESS;
    }

    match harden_module(&mut module, &cli.opts) {
        Ok(stats) => {
            print!("{module}");
            if cli.opts.show_stats {
                eprint!("{stats}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Hardening failed: {e}");
            ExitCode::FAILURE
        }
    }
}
