//! teros-validate - Pre-execution validation tool for .t3s files
//!
//! # Usage
//!
//! ```bash
//! # Assemble, link and check every .t3s file in a directory
//! teros-validate path/to/programs
//!
//! # Only the checks whose failures would fault at runtime
//! teros-validate --quick path/to/programs
//!
//! # Verbose output with instruction/data counts and every diagnostic
//! teros-validate -v path/to/programs
//! ```
//!
//! # Exit Codes
//!
//! - 0: All files validated successfully (no errors)
//! - 1: One or more files failed validation (assembly errors or error-level diagnostics)
//! - 2: Invalid arguments or IO error

use std::path::Path;
use std::process::ExitCode;
use teros::validate::{
    validate_directory_with_config, validate_file_with_config, ValidationResult,
    ValidationSummary,
};
use teros::vm::validator::{DiagnosticLevel, ValidationConfig};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let mut verbose = false;
    let mut quick = false;
    let mut paths = Vec::new();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            "-q" | "--quick" => quick = true,
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            _ if arg.starts_with('-') => {
                eprintln!("Unknown option: {}\n", arg);
                print_help();
                return ExitCode::from(2);
            }
            _ => paths.push(arg.clone()),
        }
    }

    if paths.is_empty() {
        eprintln!("Error: No path specified\n");
        print_help();
        return ExitCode::from(2);
    }

    let config = if quick {
        ValidationConfig::quick()
    } else {
        ValidationConfig::full()
    };

    let mut all_results = Vec::new();

    for path_str in &paths {
        let path = Path::new(path_str);

        if !path.exists() {
            eprintln!("Error: Path does not exist: {}", path.display());
            return ExitCode::from(2);
        }

        if path.is_file() {
            let result = validate_file_with_config(path, Some(&config));
            print_result(&result, verbose);
            all_results.push(result);
        } else if path.is_dir() {
            match validate_directory_with_config(path, Some(&config)) {
                Ok(results) => {
                    for result in &results {
                        print_result(result, verbose);
                    }
                    all_results.extend(results);
                }
                Err(e) => {
                    eprintln!("Error reading directory {}: {}", path.display(), e);
                    return ExitCode::from(2);
                }
            }
        }
    }

    let summary = ValidationSummary::from_results(&all_results);
    eprintln!();
    summary.print_report();

    if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_result(result: &ValidationResult, verbose: bool) {
    match result {
        ValidationResult::Ok {
            path,
            program,
            diagnostics,
        } => {
            let marker = if result.is_ok() { "+" } else { "!" };

            if verbose {
                println!(
                    "{} {} ({} instrs, {} data bytes, entry {})",
                    marker,
                    path.display(),
                    program.len(),
                    program.data.len(),
                    program.entry
                );
            } else {
                println!("{} {}", marker, path.display());
            }

            // Info-level notes only in verbose mode
            for d in diagnostics
                .iter()
                .filter(|d| verbose || d.level != DiagnosticLevel::Info)
            {
                let level_str = match d.level {
                    DiagnosticLevel::Error => "  ERROR",
                    DiagnosticLevel::Warning => "  WARN ",
                    DiagnosticLevel::Info => "  INFO ",
                };
                match d.instruction_idx {
                    Some(idx) => eprintln!("  {} [{}]: {}", level_str, idx, d.message),
                    None => eprintln!("  {}: {}", level_str, d.message),
                }
            }
        }
        ValidationResult::Err { path, error } => {
            eprintln!("x {}", path.display());
            match error.line {
                Some(line) => eprintln!("  line {}: {}", line, error.message),
                None => eprintln!("  {}", error.message),
            }
            if let Some(snippet) = &error.snippet {
                eprintln!("  | {}", snippet);
            }
        }
    }
}

fn print_help() {
    eprintln!("teros-validate - Validate .t3s assembly files");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    teros-validate [OPTIONS] <PATH>...");
    eprintln!();
    eprintln!("ARGS:");
    eprintln!("    <PATH>    File or directory to validate (recursive for directories)");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -v, --verbose    Show counts and info-level diagnostics");
    eprintln!("    -q, --quick      Skip the termination analysis");
    eprintln!("    -h, --help       Print this help message");
    eprintln!();
    eprintln!("EXIT CODES:");
    eprintln!("    0    All files validated successfully");
    eprintln!("    1    One or more files failed validation");
    eprintln!("    2    Invalid arguments or IO error");
}
