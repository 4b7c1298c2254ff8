//! Instruction memory: an ordered, bounded, append-only sequence of opaque
//! instruction records, plus the trait the core dispatches through.

use std::rc::Rc;

use crate::core::Core;
use crate::error::{MachineError, Result};
use crate::IMEM_DEPTH;

/// One decoded instruction. The core never interprets opcode semantics
/// itself — it only asks an instruction for its assembly text (for stats
/// and trace), its cycle count, and finally dispatches `execute`.
///
/// `execute` takes the owning [`Core`] by mutable reference. Because
/// instructions live inside the core's own instruction memory, callers
/// clone the `Rc` out before invoking `execute` rather than borrowing
/// through `Core` — see [`InstructionMemory::get`].
pub trait Instruction {
    /// `(raw encoding, assembly text)`. Used only for stats/trace.
    fn get_asm_str(&self) -> (u32, String);

    /// Reported unmodified by the step engine.
    fn get_cycles(&self) -> u32;

    /// Mutate `core` through its public operation surface and return
    /// `(trace_text, jump_addr)`. A `None` jump target means "advance to
    /// the next instruction" (subject to the loop-fold rule).
    fn execute(&self, core: &mut Core) -> Result<(String, Option<usize>)>;
}

/// Ordered, bounded instruction store. Never mutated by the core after
/// load, and the length never exceeds [`IMEM_DEPTH`].
#[derive(Clone, Default)]
pub struct InstructionMemory {
    instructions: Vec<Rc<dyn Instruction>>,
}

impl InstructionMemory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
        }
    }

    /// Load a fresh program, replacing whatever was there. Fails if the
    /// program exceeds [`IMEM_DEPTH`].
    pub fn load(&mut self, instructions: Vec<Rc<dyn Instruction>>) -> Result<()> {
        if instructions.len() > IMEM_DEPTH {
            return Err(MachineError::IndexOutOfRange {
                what: "IMEM length",
                index: instructions.len() as i64,
                bound: IMEM_DEPTH as u32,
            });
        }
        self.instructions = instructions;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Clone out the `Rc` at `pc` so the caller can invoke `execute` on it
    /// without holding a borrow of the [`InstructionMemory`] (which, in
    /// practice, lives inside the same `Core` the instruction mutates).
    pub fn get(&self, pc: usize) -> Result<Rc<dyn Instruction>> {
        self.instructions
            .get(pc)
            .cloned()
            .ok_or(MachineError::IndexOutOfRange {
                what: "PC",
                index: pc as i64,
                bound: self.instructions.len() as u32,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl Instruction for Nop {
        fn get_asm_str(&self) -> (u32, String) {
            (0, "NOP".to_string())
        }
        fn get_cycles(&self) -> u32 {
            1
        }
        fn execute(&self, _core: &mut Core) -> Result<(String, Option<usize>)> {
            Ok(("NOP".to_string(), None))
        }
    }

    #[test]
    fn load_rejects_programs_past_imem_depth() {
        let mut imem = InstructionMemory::new();
        let program: Vec<Rc<dyn Instruction>> =
            (0..IMEM_DEPTH + 1).map(|_| Rc::new(Nop) as Rc<dyn Instruction>).collect();
        assert!(matches!(
            imem.load(program),
            Err(MachineError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn get_out_of_range_pc_is_index_error() {
        let mut imem = InstructionMemory::new();
        imem.load(vec![Rc::new(Nop)]).unwrap();
        assert!(matches!(imem.get(1), Err(MachineError::IndexOutOfRange { .. })));
    }
}
