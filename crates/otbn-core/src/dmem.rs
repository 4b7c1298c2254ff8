//! 128-entry data memory with per-entry initialization tracking and a
//! byte-addressed view over the same storage.

use crate::error::{MachineError, Result};
use crate::wide::WideWord;
use crate::DMEM_DEPTH;

/// Data memory: 128 wide words, each with an independent "has this ever
/// been written" bit.
#[derive(Debug, Clone)]
pub struct DataMemory {
    words: Vec<WideWord>,
    initialized: Vec<bool>,
}

impl Default for DataMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl DataMemory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            words: vec![WideWord::ZERO; DMEM_DEPTH],
            initialized: vec![false; DMEM_DEPTH],
        }
    }

    fn check_addr(addr: usize) -> Result<()> {
        if addr >= DMEM_DEPTH {
            return Err(MachineError::IndexOutOfRange {
                what: "DMEM",
                index: addr as i64,
                bound: DMEM_DEPTH as u32,
            });
        }
        Ok(())
    }

    /// Read a word. Reading a slot that was never written emits a
    /// diagnostic on every read (not just the first) but is not an error.
    pub fn get_dmem(&self, addr: usize) -> Result<WideWord> {
        Self::check_addr(addr)?;
        if !self.initialized[addr] {
            eprintln!("warning: read of uninitialized DMEM[{addr}]");
        }
        Ok(self.words[addr])
    }

    pub fn set_dmem(&mut self, addr: usize, v: WideWord) -> Result<()> {
        Self::check_addr(addr)?;
        self.words[addr] = v;
        self.initialized[addr] = true;
        Ok(())
    }

    fn byte_addr_to_word_limb(byte_addr: usize) -> (usize, usize) {
        (byte_addr / 32, (byte_addr % 32) / 4)
    }

    /// Byte-addressed view: word index = `byte_addr / 32`, limb index =
    /// `(byte_addr % 32) / 4`.
    pub fn get_dmem_otbn(&self, byte_addr: usize) -> Result<u32> {
        let (word, limb) = Self::byte_addr_to_word_limb(byte_addr);
        self.get_dmem(word)?.get_limb(limb)
    }

    pub fn set_dmem_otbn(&mut self, byte_addr: usize, v: u32) -> Result<()> {
        let (word, limb) = Self::byte_addr_to_word_limb(byte_addr);
        Self::check_addr(word)?;
        let updated = self.words[word].set_limb(limb, v)?;
        self.words[word] = updated;
        self.initialized[word] = true;
        Ok(())
    }

    /// Fill DMEM from a caller-supplied prefix, marking those entries
    /// initialized; the remainder is zeroed and left uninitialized. Used by
    /// init and reset.
    pub fn load_prefix(&mut self, data: &[WideWord]) {
        self.words = vec![WideWord::ZERO; DMEM_DEPTH];
        self.initialized = vec![false; DMEM_DEPTH];
        for (i, &w) in data.iter().take(DMEM_DEPTH).enumerate() {
            self.words[i] = w;
            self.initialized[i] = true;
        }
    }

    /// Full bulk replace of all 128 entries; the caller supplies
    /// ground-truth values, so every entry is marked initialized.
    pub fn replace_all(&mut self, data: [WideWord; DMEM_DEPTH]) {
        self.words = data.to_vec();
        self.initialized = vec![true; DMEM_DEPTH];
    }

    pub fn is_initialized(&self, addr: usize) -> Result<bool> {
        Self::check_addr(addr)?;
        Ok(self.initialized[addr])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips_and_marks_initialized() {
        let mut mem = DataMemory::new();
        mem.set_dmem(4, WideWord::from_limbs([1, 2, 3, 4, 5, 6, 7, 8]))
            .unwrap();
        assert!(mem.is_initialized(4).unwrap());
        assert_eq!(
            mem.get_dmem(4).unwrap(),
            WideWord::from_limbs([1, 2, 3, 4, 5, 6, 7, 8])
        );
    }

    #[test]
    fn reading_uninitialized_slot_returns_zero_without_erroring() {
        let mem = DataMemory::new();
        assert!(!mem.is_initialized(0).unwrap());
        assert_eq!(mem.get_dmem(0).unwrap(), WideWord::ZERO);
    }

    #[test]
    fn out_of_range_addr_is_index_error() {
        let mem = DataMemory::new();
        assert!(matches!(
            mem.get_dmem(128),
            Err(MachineError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn byte_addressed_view_matches_limb_operation() {
        let mut mem = DataMemory::new();
        mem.set_dmem_otbn(32 + 4, 0xAABB_CCDD).unwrap();
        assert_eq!(mem.get_dmem(1).unwrap().get_limb(1).unwrap(), 0xAABB_CCDD);
        assert_eq!(mem.get_dmem_otbn(32 + 4).unwrap(), 0xAABB_CCDD);
    }

    #[test]
    fn load_prefix_zeroes_and_uninitializes_the_remainder() {
        let mut mem = DataMemory::new();
        mem.set_dmem(50, WideWord::from_limbs([9; 8])).unwrap();
        mem.load_prefix(&[WideWord::from_limbs([1; 8])]);
        assert!(mem.is_initialized(0).unwrap());
        assert!(!mem.is_initialized(50).unwrap());
        assert_eq!(mem.get_dmem(50).unwrap(), WideWord::ZERO);
    }

    #[test]
    fn replace_all_marks_every_entry_initialized() {
        let mut mem = DataMemory::new();
        mem.replace_all([WideWord::ZERO; DMEM_DEPTH]);
        for addr in 0..DMEM_DEPTH {
            assert!(mem.is_initialized(addr).unwrap());
        }
    }
}
