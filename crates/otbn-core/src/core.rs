//! The architectural state container and the step engine that drives it.

use std::rc::Rc;

use emu_core::{Observable, Value};

use crate::breakpoints::{AssemblerContext, BreakHit, BreakpointController, ForceBreak};
use crate::dmem::DataMemory;
use crate::error::{MachineError, Result};
use crate::flags::{self, FlagGroups, FlagName};
use crate::imem::{Instruction, InstructionMemory};
use crate::registers::{RegisterFile, WideRegId};
use crate::stacks::{CallStack, LoopStack};
use crate::stats::Stats;
use crate::wide::WideWord;
use crate::{CSR_FLAG, CSR_MOD_BASE, CSR_RNG, LIMBS, WSR_MOD, WSR_RND};

/// The machine: registers, flags, memories, stacks, breakpoints, stats, and
/// the PC/halt state that the step engine advances.
pub struct Core {
    regs: RegisterFile,
    flags: FlagGroups,
    dmem: DataMemory,
    imem: InstructionMemory,
    loop_stack: LoopStack,
    call_stack: CallStack,
    breakpoints: BreakpointController,
    stats: Stats,
    pc: usize,
    stop_addr: usize,
    finish_flag: bool,
    assembler_ctx: Option<Box<dyn AssemblerContext>>,
}

impl Core {
    /// Build a fresh core: all wide/GPR state zero except RND (sentinel),
    /// DMEM loaded from `dmem_prefix` (the rest zero-and-uninitialized),
    /// IMEM set to `instructions`, `pc = s_addr`, `stop_addr` defaulting to
    /// `len(imem) - 1` when not given, stacks empty, force-break cleared,
    /// and `initial_breakpoints` each given `passes = 1`.
    pub fn init(
        dmem_prefix: &[WideWord],
        instructions: Vec<Rc<dyn Instruction>>,
        s_addr: usize,
        stop_addr: Option<usize>,
        initial_breakpoints: &[usize],
    ) -> Result<Self> {
        let mut imem = InstructionMemory::new();
        imem.load(instructions)?;
        let mut dmem = DataMemory::new();
        dmem.load_prefix(dmem_prefix);

        let stop_addr = stop_addr.unwrap_or_else(|| imem.len().saturating_sub(1));
        let mut breakpoints = BreakpointController::new();
        for &addr in initial_breakpoints {
            breakpoints.toggle_addr(addr)?;
        }

        Ok(Self {
            regs: RegisterFile::new(),
            flags: FlagGroups::new(),
            dmem,
            imem,
            loop_stack: LoopStack::new(),
            call_stack: CallStack::new(),
            breakpoints,
            stats: Stats::new(),
            pc: s_addr,
            stop_addr,
            finish_flag: false,
            assembler_ctx: None,
        })
    }

    /// Clear flags and loop/call stacks (but not force-break or the
    /// breakpoint table, which persist across reset); rebuild DMEM exactly
    /// as in `init`; replace IMEM; optionally `clear_regs`; unconditionally
    /// clear every WDR's half-limb validity vector.
    pub fn reset(
        &mut self,
        dmem_prefix: &[WideWord],
        instructions: Vec<Rc<dyn Instruction>>,
        s_addr: usize,
        stop_addr: Option<usize>,
        clear_regs: bool,
    ) -> Result<()> {
        self.flags = FlagGroups::new();
        self.loop_stack.clear();
        self.call_stack.clear();

        self.dmem.load_prefix(dmem_prefix);
        self.imem.load(instructions)?;

        if clear_regs {
            self.clear_regs();
        }
        // clear_regs (if run) sets pc = 0; s_addr is applied after, so it
        // always wins regardless of clear_regs.
        self.pc = s_addr;
        self.stop_addr = stop_addr.unwrap_or_else(|| self.imem.len().saturating_sub(1));
        self.finish_flag = false;

        self.regs.clear_validity();
        Ok(())
    }

    /// All WDRs zero; MOD/DMP/RFP/LC/ACC zero; RND back to sentinel; PC 0;
    /// GPRs zero. Does not touch validity vectors or stacks.
    pub fn clear_regs(&mut self) {
        self.regs.clear_regs();
        self.pc = 0;
    }

    /// Attach an optional assembler context so symbolic breakpoints can be
    /// resolved by function/label name.
    pub fn set_assembler_context(&mut self, ctx: Option<Box<dyn AssemblerContext>>) {
        self.assembler_ctx = ctx;
    }

    pub fn set_finish_flag(&mut self, v: bool) {
        self.finish_flag = v;
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn stop_addr(&self) -> usize {
        self.stop_addr
    }

    // -- register file passthroughs -----------------------------------

    pub fn get_wide(&self, id: WideRegId) -> Result<WideWord> {
        self.regs.get_wide(id)
    }

    pub fn set_wide(&mut self, id: WideRegId, v: WideWord) -> Result<()> {
        self.regs.set_wide(id, v)
    }

    pub fn get_acc(&self) -> WideWord {
        self.regs.get_acc()
    }

    pub fn set_acc(&mut self, v: WideWord) {
        self.regs.set_acc(v);
    }

    pub fn get_reg_limb(&self, id: WideRegId, i: usize) -> Result<u32> {
        self.regs.get_reg_limb(id, i)
    }

    pub fn set_reg_limb(&mut self, id: WideRegId, i: usize, v: u32) -> Result<()> {
        self.regs.set_reg_limb(id, i, v)
    }

    pub fn set_reg_half_limb(&mut self, id: WideRegId, i: usize, upper: bool, v: u16) -> Result<()> {
        self.regs.set_reg_half_limb(id, i, upper, v)
    }

    pub fn get_reg_qw(&self, id: WideRegId, q: usize) -> Result<u64> {
        self.regs.get_reg_qw(id, q)
    }

    pub fn set_reg_half_word(&mut self, id: WideRegId, h: usize, v: u128) -> Result<()> {
        self.regs.set_reg_half_word(id, h, v)
    }

    pub fn get_reg_valid_half_limbs(&self, i: usize) -> Result<[bool; 16]> {
        self.regs.get_reg_valid_half_limbs(i)
    }

    pub fn get_gpr(&mut self, i: usize) -> Result<u32> {
        self.regs.get_gpr(i, &mut self.call_stack)
    }

    pub fn set_gpr(&mut self, i: usize, v: u32) -> Result<()> {
        self.regs.set_gpr(i, v, &mut self.call_stack)
    }

    pub fn inc_gpr(&mut self, i: usize) -> Result<u32> {
        self.regs.inc_gpr(i, &mut self.call_stack)
    }

    pub fn inc_gpr_wlen_bytes(&mut self, i: usize) -> Result<u32> {
        self.regs.inc_gpr_wlen_bytes(i, &mut self.call_stack)
    }

    // -- flags -----------------------------------------------------------

    pub fn get_flag(&self, name: FlagName) -> bool {
        self.flags.get_flag(name)
    }

    pub fn set_flag(&mut self, name: FlagName, v: bool) {
        self.flags.set_flag(name, v);
    }

    pub fn get_flags_as_bin(&self) -> u8 {
        self.flags.get_flags_as_bin()
    }

    pub fn set_flags_as_bin(&mut self, b: u8) {
        self.flags.set_flags_as_bin(b);
    }

    pub fn flags_mut(&mut self) -> &mut FlagGroups {
        &mut self.flags
    }

    // -- CSR / WSR ---------------------------------------------------------

    /// Read the CSR namespace. `0x7C0` is the packed flags byte;
    /// `0x7D0..0x7D7` are limbs 0..7 of MOD; `0xFC0` is limb 0 of RND.
    pub fn get_csr(&self, addr: u16) -> Result<u32> {
        if addr == CSR_FLAG {
            return Ok(u32::from(self.flags.get_flags_as_bin()));
        }
        if (CSR_MOD_BASE..CSR_MOD_BASE + LIMBS as u16).contains(&addr) {
            let limb = (addr - CSR_MOD_BASE) as usize;
            return self.regs.get_reg_limb(WideRegId::Mod, limb);
        }
        if addr == CSR_RNG {
            return self.regs.get_reg_limb(WideRegId::Rnd, 0);
        }
        Err(MachineError::InvalidName {
            what: "CSR address",
            detail: format!("{addr:#06x}"),
        })
    }

    /// Write the CSR namespace. RNG is read-only: a write fails with
    /// *ValueError*-class [`MachineError::InvalidName`].
    pub fn set_csr(&mut self, addr: u16, v: u32) -> Result<()> {
        if addr == CSR_FLAG {
            self.flags.set_flags_as_bin(v as u8);
            return Ok(());
        }
        if (CSR_MOD_BASE..CSR_MOD_BASE + LIMBS as u16).contains(&addr) {
            let limb = (addr - CSR_MOD_BASE) as usize;
            return self.regs.set_reg_limb(WideRegId::Mod, limb, v);
        }
        if addr == CSR_RNG {
            return Err(MachineError::InvalidName {
                what: "CSR address",
                detail: format!("{addr:#06x} (RND is read-only)"),
            });
        }
        Err(MachineError::InvalidName {
            what: "CSR address",
            detail: format!("{addr:#06x}"),
        })
    }

    /// Read the WSR namespace: index 0 is MOD, index 1 is RND.
    pub fn get_wsr(&self, index: u8) -> Result<WideWord> {
        match index {
            WSR_MOD => self.regs.get_wide(WideRegId::Mod),
            WSR_RND => self.regs.get_wide(WideRegId::Rnd),
            other => Err(MachineError::InvalidName {
                what: "WSR index",
                detail: other.to_string(),
            }),
        }
    }

    /// Write the WSR namespace. MOD is read/write; a write to RND is
    /// silently dropped (not an error).
    pub fn set_wsr(&mut self, index: u8, v: WideWord) -> Result<()> {
        match index {
            WSR_MOD => self.regs.set_wide(WideRegId::Mod, v),
            WSR_RND => Ok(()),
            other => Err(MachineError::InvalidName {
                what: "WSR index",
                detail: other.to_string(),
            }),
        }
    }

    // -- data memory -------------------------------------------------------

    pub fn get_dmem(&self, addr: usize) -> Result<WideWord> {
        self.dmem.get_dmem(addr)
    }

    pub fn set_dmem(&mut self, addr: usize, v: WideWord) -> Result<()> {
        self.dmem.set_dmem(addr, v)
    }

    pub fn get_dmem_otbn(&self, byte_addr: usize) -> Result<u32> {
        self.dmem.get_dmem_otbn(byte_addr)
    }

    pub fn set_dmem_otbn(&mut self, byte_addr: usize, v: u32) -> Result<()> {
        self.dmem.set_dmem_otbn(byte_addr, v)
    }

    pub fn replace_dmem_all(&mut self, data: [WideWord; crate::DMEM_DEPTH]) {
        self.dmem.replace_all(data);
    }

    // -- loop / call stacks --------------------------------------------

    pub fn loop_push(&mut self, count: u32, end_addr: usize, start_addr: usize) -> Result<()> {
        self.loop_stack.push(count, end_addr, start_addr)
    }

    pub fn loop_dec_top_cnt(&mut self) -> Result<bool> {
        self.loop_stack.dec_top_cnt()
    }

    pub fn loop_top_end_addr(&self) -> Result<usize> {
        self.loop_stack.top_end_addr()
    }

    pub fn loop_top_start_addr(&self) -> Result<usize> {
        self.loop_stack.top_start_addr()
    }

    pub fn loop_pop(&mut self) -> Result<usize> {
        self.loop_stack.pop()
    }

    pub fn loop_depth(&self) -> usize {
        self.loop_stack.len()
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.depth()
    }

    // -- breakpoints --------------------------------------------------------

    pub fn toggle_breakpoint_addr(&mut self, addr: usize) -> Result<()> {
        self.breakpoints.toggle_addr(addr)
    }

    pub fn toggle_breakpoint_named(&mut self, name: &str) -> Result<()> {
        let ctx = self.assembler_ctx.as_deref();
        self.breakpoints.toggle_named(name, ctx)
    }

    pub fn set_force_break(&mut self, force: ForceBreak) {
        self.breakpoints.set_force_break(force);
    }

    // -- stats ------------------------------------------------------------

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Execute exactly one instruction, per §4.I: halt check, break check,
    /// stats bump, dispatch, loop end-of-body fold, next-PC, halt commit.
    pub fn step(&mut self) -> Result<(bool, String, u32)> {
        let halt = self.pc == self.stop_addr || self.finish_flag;

        let hit = self
            .breakpoints
            .check(self.pc, self.loop_stack.len(), self.call_stack.depth());
        if let BreakHit::Force = hit {
            println!("breakpoint: force-break hit at pc={}", self.pc);
        } else if let BreakHit::Address { passes } = hit {
            println!("breakpoint: pc={} (passes={passes})", self.pc);
        }

        let instruction = self.imem.get(self.pc)?;
        let (_, asm_text) = instruction.get_asm_str();
        self.stats.record(&asm_text);
        let cycles = instruction.get_cycles();

        let (trace_text, mut jump) = instruction.execute(self)?;

        if !self.loop_stack.is_empty() && self.pc == self.loop_stack.top_end_addr()? {
            if self.loop_stack.dec_top_cnt()? {
                jump = Some(self.loop_stack.top_start_addr()?);
            } else {
                self.loop_stack.pop()?;
            }
        }

        let mut cont = true;
        if let Some(target) = jump {
            if target >= self.imem.len() {
                return Err(MachineError::Runtime(format!(
                    "jump target {target} outside instruction memory"
                )));
            }
            self.pc = target;
        } else {
            self.pc += 1;
            if self.pc >= self.imem.len() {
                cont = false;
            }
        }

        if halt {
            cont = false;
        }

        Ok((cont, trace_text, cycles))
    }
}

const QUERY_PATHS: &[&str] = &[
    "pc",
    "stop_addr",
    "flags",
    "call_depth",
    "loop_depth",
    "acc",
    "mod",
    "dmp",
    "rfp",
    "lc",
    "rnd",
];

impl Observable for Core {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(Value::U32(self.pc as u32)),
            "stop_addr" => Some(Value::U32(self.stop_addr as u32)),
            "flags" => Some(Value::U8(self.flags.get_flags_as_bin())),
            "call_depth" => Some(Value::U8(self.call_stack.depth() as u8)),
            "loop_depth" => Some(Value::U8(self.loop_stack.len() as u8)),
            "acc" => Some(Value::String(crate::hex::xlen_hex(self.regs.get_acc()))),
            "mod" => self
                .regs
                .get_wide(WideRegId::Mod)
                .ok()
                .map(|v| Value::String(crate::hex::xlen_hex(v))),
            "dmp" => self
                .regs
                .get_wide(WideRegId::Dmp)
                .ok()
                .map(|v| Value::String(crate::hex::xlen_hex(v))),
            "rfp" => self
                .regs
                .get_wide(WideRegId::Rfp)
                .ok()
                .map(|v| Value::String(crate::hex::xlen_hex(v))),
            "lc" => self
                .regs
                .get_wide(WideRegId::Lc)
                .ok()
                .map(|v| Value::String(crate::hex::xlen_hex(v))),
            "rnd" => self
                .regs
                .get_wide(WideRegId::Rnd)
                .ok()
                .map(|v| Value::String(crate::hex::xlen_hex(v))),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}

/// Resolve a flag name string (as used by CSR/WSR or instruction bodies
/// addressing a flag by name) into a [`FlagName`].
pub fn flag_name(s: &str) -> Result<FlagName> {
    flags::name_from_str(s)
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

    fn core_with(n: usize) -> Core {
        let program: Vec<Rc<dyn Instruction>> = (0..n).map(|_| Rc::new(Nop) as Rc<dyn Instruction>).collect();
        Core::init(&[], program, 0, None, &[]).unwrap()
    }

    #[test]
    fn step_advances_pc_and_halts_at_stop_addr() {
        let mut core = core_with(3);
        assert_eq!(core.stop_addr(), 2);
        let (cont, _, _) = core.step().unwrap();
        assert!(cont);
        assert_eq!(core.pc(), 1);
        let (cont, _, _) = core.step().unwrap();
        assert!(cont);
        let (cont, _, _) = core.step().unwrap();
        assert!(!cont, "halt at stop_addr is applied after execution");
    }

    #[test]
    fn csr_rng_write_is_rejected() {
        let mut core = core_with(1);
        assert!(matches!(
            core.set_csr(CSR_RNG, 1),
            Err(MachineError::InvalidName { .. })
        ));
    }

    #[test]
    fn csr_mod_round_trips_through_limbs() {
        let mut core = core_with(1);
        core.set_csr(CSR_MOD_BASE + 3, 0xAABB_CCDD).unwrap();
        assert_eq!(core.get_csr(CSR_MOD_BASE + 3).unwrap(), 0xAABB_CCDD);
        assert_eq!(
            core.get_reg_limb(WideRegId::Mod, 3).unwrap(),
            0xAABB_CCDD
        );
    }

    #[test]
    fn wsr_rnd_write_is_silently_dropped() {
        let mut core = core_with(1);
        let before = core.get_wsr(WSR_RND).unwrap();
        core.set_wsr(WSR_RND, WideWord::ZERO).unwrap();
        assert_eq!(core.get_wsr(WSR_RND).unwrap(), before);
    }

    #[test]
    fn unknown_csr_address_is_invalid_name() {
        let core = core_with(1);
        assert!(matches!(
            core.get_csr(0x1234),
            Err(MachineError::InvalidName { .. })
        ));
    }

    #[test]
    fn reset_preserves_breakpoint_table_and_force_break() {
        let mut core = core_with(2);
        core.toggle_breakpoint_addr(0).unwrap();
        let program: Vec<Rc<dyn Instruction>> = vec![Rc::new(Nop), Rc::new(Nop)];
        core.reset(&[], program, 0, None, true).unwrap();
        // still set: toggling again should remove it, proving it survived reset
        core.toggle_breakpoint_addr(0).unwrap();
        assert_eq!(core.breakpoints.check(0, 0, 0), BreakHit::None);
    }
}
