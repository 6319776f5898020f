//! teros - T3 toolchain and λ-engine front end
//!
//! # Usage
//!
//! ```bash
//! # Assemble to a T3 object
//! teros asm countdown.t3s -o countdown.t3o
//!
//! # Canonical listing of a source or object
//! teros disasm countdown.t3o
//!
//! # Execute, printing every instruction to stderr
//! teros run countdown.t3s --budget 1000 --trace
//!
//! # β-reduce a term
//! teros reduce '(\m n f x. m f (n f x)) 2 3' --steps 500
//!
//! # Compile a term to T3 and run it
//! teros compile '(\n f x. f (n f x)) 4' --readback numeral --run
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Failure (bad input, fault, budget exhausted)
//! - 2: Invalid arguments

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use teros::lambda::{
    church, compile, parse_term, CompileOptions, Outcome, Readback, ReductionContext, Strategy,
    TermStore,
};
use teros::loader::{load_path, ProgramLoader};
use teros::vm::{disassemble, ProfileEvent, Profiler, Program, Reg, RunOutcome, Tvm, TvmConfig};

enum Command {
    Asm { input: PathBuf, output: PathBuf },
    Disasm { input: PathBuf },
    Run { inputs: Vec<PathBuf>, budget: Option<u64>, trace: bool },
    Reduce { term: String, steps: u64, strategy: Strategy },
    Compile { term: String, readback: Readback, normalize: Option<u64>, run: bool },
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let command = match parse_args(&args) {
        Ok(Some(command)) => command,
        Ok(None) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("Error: {}\n", message);
            print_help();
            return ExitCode::from(2);
        }
    };

    match execute(command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> std::result::Result<Option<Command>, String> {
    let Some((sub, rest)) = args.split_first() else {
        return Err("No command specified".into());
    };

    let mut positional = Vec::new();
    let mut output = None;
    let mut budget = None;
    let mut steps = 10_000;
    let mut trace = false;
    let mut strategy = Strategy::NormalOrder;
    let mut readback = Readback::Closure;
    let mut normalize = None;
    let mut run = false;

    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value", name))
        };
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-o" | "--output" => output = Some(PathBuf::from(value(arg)?)),
            "--budget" => budget = Some(parse_count(arg, &value(arg)?)?),
            "--steps" => steps = parse_count(arg, &value(arg)?)?,
            "--normalize" => normalize = Some(parse_count(arg, &value(arg)?)?),
            "--readback" => {
                readback = match value(arg)?.as_str() {
                    "numeral" => Readback::ChurchNumeral,
                    "bool" => Readback::ChurchBool,
                    "closure" => Readback::Closure,
                    other => return Err(format!("Unknown readback: {}", other)),
                }
            }
            "--trace" => trace = true,
            "--applicative" => strategy = Strategy::Applicative,
            "--run" => run = true,
            _ if arg.starts_with("--") => return Err(format!("Unknown option: {}", arg)),
            _ => positional.push(arg.clone()),
        }
    }

    let single = |what: &str| match positional.as_slice() {
        [one] => Ok(one.clone()),
        [] => Err(format!("{} needs {}", sub, what)),
        _ => Err(format!("{} takes exactly one {}", sub, what)),
    };

    let command = match sub.as_str() {
        "-h" | "--help" | "help" => return Ok(None),
        "asm" => Command::Asm {
            input: single("an input file")?.into(),
            output: output.ok_or("asm needs -o <out.t3o>")?,
        },
        "disasm" => Command::Disasm {
            input: single("an input file")?.into(),
        },
        "run" if positional.is_empty() => return Err("run needs at least one file".into()),
        "run" => Command::Run {
            inputs: positional.iter().map(PathBuf::from).collect(),
            budget,
            trace,
        },
        "reduce" => Command::Reduce {
            term: single("a term")?,
            steps,
            strategy,
        },
        "compile" => Command::Compile {
            term: single("a term")?,
            readback,
            normalize,
            run,
        },
        other => return Err(format!("Unknown command: {}", other)),
    };
    Ok(Some(command))
}

fn parse_count(name: &str, text: &str) -> std::result::Result<u64, String> {
    text.parse()
        .map_err(|_| format!("{} expects a non-negative integer, got '{}'", name, text))
}

fn execute(command: Command) -> Result<bool> {
    match command {
        Command::Asm { input, output } => {
            let object = ProgramLoader::save_object(&input, &output)?;
            println!(
                "{} -> {} ({} instructions, {} data bytes, {} symbols)",
                input.display(),
                output.display(),
                object.instruction_count(),
                object.data.len(),
                object.symbols.len()
            );
            Ok(true)
        }
        Command::Disasm { input } => {
            let program = load_path(&input)?;
            print!("{}", disassemble(&program)?);
            Ok(true)
        }
        Command::Run {
            inputs,
            budget,
            trace,
        } => {
            let program = teros::loader::load_paths(&inputs)?;
            run_program(&program, budget, trace)
        }
        Command::Reduce {
            term,
            steps,
            strategy,
        } => reduce(&term, steps, strategy),
        Command::Compile {
            term,
            readback,
            normalize,
            run,
        } => {
            let mut store = TermStore::new();
            let t = parse_term(&mut store, &term).context("Failed to parse term")?;
            let mut options = CompileOptions::new().readback(readback);
            if let Some(budget) = normalize {
                options = options.normalize_first(budget);
            }
            let compiled = compile(&mut store, t, &options);
            store.release(t)?;
            let compiled = compiled?;

            if run {
                run_program(&compiled.program, None, false)
            } else {
                print!("{}", compiled.source);
                Ok(true)
            }
        }
    }
}

/// Prints each executed instruction to stderr
struct Trace {
    program: Program,
}

impl Profiler for Trace {
    fn record(&mut self, event: &ProfileEvent) {
        match self.program.instruction(event.pc) {
            Ok(instr) => eprintln!("{:>8}  {:>5}  {}", event.step, event.pc, instr),
            Err(_) => eprintln!("{:>8}  {:>5}  {}", event.step, event.pc, event.opcode),
        }
    }
}

fn run_program(program: &Program, budget: Option<u64>, trace: bool) -> Result<bool> {
    let mut tvm = Tvm::with_std_host(TvmConfig::default());
    tvm.load(program)?;
    if trace {
        tvm.attach_profiler(Trace {
            program: program.clone(),
        });
    }

    let outcome = match budget {
        Some(budget) => tvm.run(budget),
        None => tvm.run_default(),
    };
    let r1 = tvm.registers().read(Reg::R1);

    match outcome {
        RunOutcome::Halted => {
            match tvm.exit_status() {
                Some(status) => eprintln!("exit {} after {} steps", status, tvm.steps()),
                None => eprintln!("halted after {} steps", tvm.steps()),
            }
            println!("R1 = {}", r1);
            Ok(tvm.exit_status().unwrap_or(0) == 0)
        }
        RunOutcome::Faulted { kind, pc } => {
            bail!("{} at pc {} after {} steps", kind, pc, tvm.steps())
        }
        RunOutcome::Suspended { executed } => {
            eprintln!(
                "budget exhausted after {} steps (pc {}, R1 = {})",
                executed,
                tvm.registers().pc(),
                r1
            );
            Ok(false)
        }
    }
}

fn reduce(source: &str, steps: u64, strategy: Strategy) -> Result<bool> {
    let mut store = TermStore::new();
    let term = parse_term(&mut store, source).context("Failed to parse term")?;
    let mut ctx = ReductionContext::new(steps).strategy(strategy);
    let reduction = store.reduce(term, &mut ctx);
    store.release(term)?;
    let reduction = reduction?;

    println!("{}", store.display(reduction.term));
    match reduction.outcome {
        Outcome::NormalForm => {
            eprintln!("normal form after {} steps", reduction.steps);
            if let Some(n) = church::as_numeral(&store, reduction.term) {
                eprintln!("  = numeral {}", n);
            } else if let Some(b) = church::as_bool(&store, reduction.term) {
                eprintln!("  = {}", b);
            }
        }
        Outcome::BudgetExceeded => {
            eprintln!("budget of {} steps exhausted; term above is partial", steps);
        }
    }
    let normal = reduction.is_normal();
    store.release(reduction.term)?;
    Ok(normal)
}

fn print_help() {
    eprintln!("teros - balanced-ternary VM and λ-engine");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    teros asm <in.t3s> -o <out.t3o>");
    eprintln!("    teros disasm <file>");
    eprintln!("    teros run <file>... [--budget N] [--trace]");
    eprintln!("    teros reduce '<term>' [--steps N] [--applicative]");
    eprintln!("    teros compile '<term>' [--readback numeral|bool|closure] [--normalize N] [--run]");
    eprintln!();
    eprintln!("Files may be T3 objects or assembly source; the content decides.");
    eprintln!();
    eprintln!("EXIT CODES:");
    eprintln!("    0    Success");
    eprintln!("    1    Failure (bad input, fault, budget exhausted)");
    eprintln!("    2    Invalid arguments");
}
