//! Validation utilities for T3 assembly files
//!
//! Provides batch validation with detailed error reporting.
//! Two levels of validation:
//! - Assembly validation (always runs): syntax, directives, labels, linking
//! - Program validation (with a [`ValidationConfig`]): registers, control
//!   flow, gate indices, termination
//!
//! # Example
//!
//! ```ignore
//! use teros::validate::{validate_directory, ValidationResult};
//!
//! let results = validate_directory("demos")?;
//! for result in &results {
//!     match result {
//!         ValidationResult::Ok { path, program, diagnostics } => {
//!             println!("+ {}: {} instructions, {} diagnostics",
//!                 path.display(), program.len(), diagnostics.len());
//!         }
//!         ValidationResult::Err { path, error } => {
//!             eprintln!("x {}: {}", path.display(), error);
//!         }
//!     }
//! }
//! ```

use crate::error::TernaryError;
use crate::vm::validator::{Diagnostic, DiagnosticLevel, ProgramValidator, ValidationConfig};
use crate::vm::{assemble_program, Program};
use std::path::{Path, PathBuf};

/// Extension of T3 assembly sources
pub const SOURCE_EXTENSION: &str = "t3s";

/// Result of validating a single assembly file
#[derive(Debug)]
pub enum ValidationResult {
    /// File assembled and linked (and optionally passed program validation)
    Ok {
        path: PathBuf,
        program: Program,
        /// Empty if program validation did not run
        diagnostics: Vec<Diagnostic>,
    },
    /// File failed to read, assemble or link
    Err {
        path: PathBuf,
        error: ValidationError,
    },
}

impl ValidationResult {
    /// Assembly passed and no diagnostic is an error
    pub fn is_ok(&self) -> bool {
        match self {
            Self::Ok { diagnostics, .. } => ProgramValidator::is_valid(diagnostics),
            Self::Err { .. } => false,
        }
    }

    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Ok { path, .. } => path,
            Self::Err { path, .. } => path,
        }
    }

    /// Diagnostics (empty for the Err variant)
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Ok { diagnostics, .. } => diagnostics,
            Self::Err { .. } => &[],
        }
    }
}

/// Validation error with context
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Source line, for parse errors
    pub line: Option<usize>,
    pub message: String,
    /// Offending source line, trimmed
    pub snippet: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: {}", line, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(snippet) = &self.snippet {
            write!(f, "\n  | {}", snippet)?;
        }
        Ok(())
    }
}

impl ValidationError {
    fn from_error(error: TernaryError, source: &str) -> Self {
        match error {
            TernaryError::Parse { line, message } => Self {
                line: Some(line),
                snippet: source
                    .lines()
                    .nth(line.saturating_sub(1))
                    .map(|s| s.trim().to_string()),
                message,
            },
            other => Self {
                line: None,
                message: other.to_string(),
                snippet: None,
            },
        }
    }
}

impl From<std::io::Error> for ValidationError {
    fn from(e: std::io::Error) -> Self {
        Self {
            line: None,
            message: e.to_string(),
            snippet: None,
        }
    }
}

/// Validate a single file (assembly and linking only).
pub fn validate_file<P: AsRef<Path>>(path: P) -> ValidationResult {
    validate_file_with_config(path, None)
}

/// Validate a single file, running [`ProgramValidator`] when `config` is Some.
pub fn validate_file_with_config<P: AsRef<Path>>(
    path: P,
    config: Option<&ValidationConfig>,
) -> ValidationResult {
    let path = path.as_ref().to_path_buf();

    let source = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            return ValidationResult::Err {
                path,
                error: e.into(),
            }
        }
    };

    match assemble_program(&source) {
        Ok(program) => {
            let diagnostics = config
                .map(|config| ProgramValidator::new(config.clone()).validate(&program))
                .unwrap_or_default();
            ValidationResult::Ok {
                path,
                program,
                diagnostics,
            }
        }
        Err(e) => ValidationResult::Err {
            path,
            error: ValidationError::from_error(e, &source),
        },
    }
}

/// Validate all `.t3s` files in a directory (recursive, assembly only).
pub fn validate_directory<P: AsRef<Path>>(dir: P) -> std::io::Result<Vec<ValidationResult>> {
    validate_directory_with_config(dir, None)
}

/// Validate all `.t3s` files in a directory, sorted by path.
pub fn validate_directory_with_config<P: AsRef<Path>>(
    dir: P,
    config: Option<&ValidationConfig>,
) -> std::io::Result<Vec<ValidationResult>> {
    let mut results = Vec::new();
    validate_directory_recursive(dir.as_ref(), config, &mut results)?;
    results.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(results)
}

fn validate_directory_recursive(
    dir: &Path,
    config: Option<&ValidationConfig>,
    results: &mut Vec<ValidationResult>,
) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            validate_directory_recursive(&path, config, results)?;
        } else if path.extension().is_some_and(|e| e == SOURCE_EXTENSION) {
            results.push(validate_file_with_config(&path, config));
        }
    }

    Ok(())
}

/// Summary of validation results
#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: Vec<(PathBuf, ValidationError)>,
    pub diag_errors: usize,
    pub diag_warnings: usize,
    pub diag_info: usize,
}

impl ValidationSummary {
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            if result.is_ok() {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            match result {
                ValidationResult::Ok { diagnostics, .. } => {
                    for d in diagnostics {
                        match d.level {
                            DiagnosticLevel::Error => summary.diag_errors += 1,
                            DiagnosticLevel::Warning => summary.diag_warnings += 1,
                            DiagnosticLevel::Info => summary.diag_info += 1,
                        }
                    }
                }
                ValidationResult::Err { path, error } => {
                    summary.errors.push((path.clone(), error.clone()));
                }
            }
        }

        summary
    }

    /// Print summary to stderr
    pub fn print_report(&self) {
        if !self.errors.is_empty() {
            eprintln!("\n{} ASSEMBLY ERRORS:", self.errors.len());
            for (path, error) in &self.errors {
                eprintln!("\n  {}", path.display());
                match error.line {
                    Some(line) => eprintln!("    line {}: {}", line, error.message),
                    None => eprintln!("    {}", error.message),
                }
                if let Some(snippet) = &error.snippet {
                    eprintln!("    | {}", snippet);
                }
            }
            eprintln!();
        }

        eprintln!(
            "Validated {} files: {} passed, {} failed",
            self.total, self.passed, self.failed
        );

        if self.diag_errors + self.diag_warnings + self.diag_info > 0 {
            eprintln!(
                "Diagnostics: {} errors, {} warnings, {} info",
                self.diag_errors, self.diag_warnings, self.diag_info
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn source_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", text).unwrap();
        file
    }

    #[test]
    fn test_validate_valid_source() {
        let file = source_file(
            r#"
.global main
main:
    LI R1, 3
loop:
    DEC R1
    JNZ R1, loop
    HALT
"#,
        );
        let result = validate_file(file.path());
        assert!(result.is_ok());
        assert!(result.diagnostics().is_empty());
    }

    #[test]
    fn test_validate_invalid_source() {
        let file = source_file("    NOP\n    FROB R1\n    HALT\n");
        let result = validate_file(file.path());
        assert!(result.is_err());

        let ValidationResult::Err { error, .. } = result else {
            panic!("expected assembly error");
        };
        assert_eq!(error.line, Some(2));
        assert_eq!(error.snippet.as_deref(), Some("FROB R1"));
    }

    #[test]
    fn test_link_errors_have_no_line() {
        let file = source_file("JMP nowhere\n");
        let ValidationResult::Err { error, .. } = validate_file(file.path()) else {
            panic!("expected link error");
        };
        assert_eq!(error.line, None);
        assert!(error.message.contains("nowhere"));
    }

    #[test]
    fn test_validate_with_program_config() {
        let file = source_file("GATE R1, R2, R3, 19682\nHALT\n");
        let config = ValidationConfig::full();
        let result = validate_file_with_config(file.path(), Some(&config));
        assert!(result.is_ok());
        assert!(ProgramValidator::is_valid(result.diagnostics()));
    }

    #[test]
    fn test_summary_with_diagnostics() {
        let file = source_file("spin: JMP spin\n");
        let config = ValidationConfig::default();
        let result = validate_file_with_config(file.path(), Some(&config));
        assert!(result.is_ok());

        let summary = ValidationSummary::from_results(&[result]);
        assert_eq!(summary.passed, 1);
        assert!(summary.diag_warnings > 0);
    }

    #[test]
    fn test_validate_directory_recursive() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("a.t3s"), "HALT\n").unwrap();
        std::fs::write(nested.join("b.t3s"), "BOGUS\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "BOGUS\n").unwrap();

        let results = validate_directory(dir.path()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].path().ends_with("a.t3s"));
        assert!(results[0].is_ok());
        assert!(results[1].is_err());

        let summary = ValidationSummary::from_results(&results);
        assert_eq!((summary.total, summary.passed, summary.failed), (2, 1, 1));
        assert_eq!(summary.errors.len(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = validate_file("no/such/file.t3s");
        let ValidationResult::Err { error, .. } = result else {
            panic!("expected io error");
        };
        assert_eq!(error.line, None);
    }
}
