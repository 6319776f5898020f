//! Program Loader - Clean API for loading T3 programs
//!
//! Files are recognised by content, not extension: anything starting with
//! the `T3\0\x01` object magic goes through the object codec, everything
//! else is treated as assembly source.
//!
//! # Usage
//!
//! ```ignore
//! use teros::loader::{ProgramLoader, load_path};
//!
//! // Configure search directory once at startup
//! ProgramLoader::set_search_dir("/path/to/programs");
//!
//! // Relative names resolve against the search directory
//! let program = load_path("demos/countdown.t3s")?;
//!
//! // Several objects or sources linked together
//! let program = load_paths(&["main.t3o", "lib.t3s"])?;
//! ```

use crate::vm::{assemble, deserialize, is_object, link, save_to_file, Object, Program};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Global directory for resolving relative program names
static SEARCH_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Program loader configuration and utilities
pub struct ProgramLoader;

impl ProgramLoader {
    /// Set the directory relative names resolve against.
    ///
    /// Only the first call takes effect; returns false when a directory was
    /// already set.
    pub fn set_search_dir<P: AsRef<Path>>(path: P) -> bool {
        SEARCH_DIR.set(path.as_ref().to_path_buf()).is_ok()
    }

    /// Configured search directory, or the current directory
    pub fn search_dir() -> PathBuf {
        SEARCH_DIR.get().cloned().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a program name: absolute paths and paths that exist as given
    /// are used directly, anything else is looked up in the search directory.
    pub fn resolve<P: AsRef<Path>>(name: P) -> PathBuf {
        let name = name.as_ref();
        if name.is_absolute() || name.exists() {
            name.to_path_buf()
        } else {
            Self::search_dir().join(name)
        }
    }

    /// Read one file into an unlinked object
    pub fn load_object<P: AsRef<Path>>(path: P) -> Result<Object> {
        let path = Self::resolve(path);
        let bytes =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        object_from_bytes(&bytes, &path.display().to_string())
    }

    /// Assemble a source file and write it as an object
    pub fn save_object<P: AsRef<Path>, Q: AsRef<Path>>(source: P, out: Q) -> Result<Object> {
        let object = Self::load_object(source)?;
        save_to_file(&object, out)?;
        Ok(object)
    }

    /// Assemble a source string
    pub fn assemble_source(source: &str, name: &str) -> Result<Object> {
        assemble(source).with_context(|| format!("Failed to assemble {}", name))
    }
}

fn object_from_bytes(bytes: &[u8], name: &str) -> Result<Object> {
    if is_object(bytes) {
        log::debug!("{}: T3 object ({} bytes)", name, bytes.len());
        return deserialize(bytes).with_context(|| format!("Failed to decode object {}", name));
    }
    let source = std::str::from_utf8(bytes)
        .with_context(|| format!("{} is neither a T3 object nor UTF-8 assembly", name))?;
    ProgramLoader::assemble_source(source, name)
}

/// Load and link a single object or source file
pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Program> {
    load_paths(&[path])
}

/// Load every file and link them in order
pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Program> {
    let objects = paths
        .iter()
        .map(ProgramLoader::load_object)
        .collect::<Result<Vec<_>>>()?;
    let program = link(&objects).context("Link failed")?;
    log::debug!(
        "Loaded {} file(s): {} instructions, entry {}",
        paths.len(),
        program.len(),
        program.entry
    );
    Ok(program)
}

/// Load a program from a source string
pub fn load_string(source: &str, name: &str) -> Result<Program> {
    let object = ProgramLoader::assemble_source(source, name)?;
    link(&[object]).with_context(|| format!("Failed to link {}", name))
}
