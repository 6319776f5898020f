//! Memory - Byte-addressed TVM memory image
//!
//! Words are stored packed (4 trits per byte), so one 27-trit word occupies
//! [`WORD_BYTES`] consecutive bytes at any byte address. There is no alignment
//! requirement.

use super::register::{Word, WORD_TRITS};
use crate::error::Fault;
use crate::trit_array::{packed_len, TritArray};

/// Bytes per packed register word
pub const WORD_BYTES: usize = packed_len(WORD_TRITS);

/// Flat memory owned by one TVM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Zero every byte
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Range check for `len` bytes at a signed address
    fn range(&self, addr: i64, len: usize) -> Result<std::ops::Range<usize>, Fault> {
        if addr < 0 {
            return Err(Fault::BadAddress);
        }
        let start = addr as usize;
        let end = start.checked_add(len).ok_or(Fault::BadAddress)?;
        if end > self.bytes.len() {
            return Err(Fault::BadAddress);
        }
        Ok(start..end)
    }

    pub fn read(&self, addr: i64, len: usize) -> Result<&[u8], Fault> {
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    pub fn read_mut(&mut self, addr: i64, len: usize) -> Result<&mut [u8], Fault> {
        let range = self.range(addr, len)?;
        Ok(&mut self.bytes[range])
    }

    pub fn write(&mut self, addr: i64, data: &[u8]) -> Result<(), Fault> {
        let range = self.range(addr, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Load the word at `addr`; undecodable cells fault with `BadAddress`
    pub fn load_word(&self, addr: i64) -> Result<Word, Fault> {
        let bytes = self.read(addr, WORD_BYTES)?;
        TritArray::from_packed_bytes(bytes, WORD_TRITS).map_err(|_| Fault::BadAddress)
    }

    pub fn store_word(&mut self, addr: i64, word: &Word) -> Result<(), Fault> {
        self.write(addr, word.to_packed_bytes())
    }
}
