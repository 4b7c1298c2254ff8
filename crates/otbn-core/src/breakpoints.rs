//! Address breakpoints and the separate force-break predicate, with
//! optional symbolic (function/label) resolution.

use std::collections::HashMap;

use crate::error::{MachineError, Result};
use crate::IMEM_DEPTH;

/// Read-only view an embedding assembler/toolchain can hand to the core so
/// that breakpoints may be set by function or label name instead of by raw
/// address. The core never needs to know how these maps were built.
pub trait AssemblerContext {
    fn functions(&self) -> &HashMap<usize, String>;
    fn labels(&self) -> &HashMap<usize, String>;
}

/// One address's passes/counter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AddrBreak {
    passes: u32,
    counter: u32,
}

/// The force-break predicate: a one-shot hit that can additionally require
/// the loop and/or call stack to be at a specific depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ForceBreak {
    pub active: bool,
    pub consider_callstack: bool,
    pub callstack_depth: usize,
    pub consider_loopstack: bool,
    pub loopstack_depth: usize,
}

/// Outcome of a single step's break check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakHit {
    None,
    Force,
    Address { passes: u32 },
}

/// Owns the address-breakpoint table and the force-break predicate.
#[derive(Debug, Clone, Default)]
pub struct BreakpointController {
    addr_breaks: HashMap<usize, AddrBreak>,
    force: ForceBreak,
}

impl BreakpointController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle an address breakpoint: remove if present, insert with
    /// `passes = 1` if absent. Addresses outside `[0, IMEM_DEPTH)` are
    /// rejected.
    pub fn toggle_addr(&mut self, addr: usize) -> Result<()> {
        if addr >= IMEM_DEPTH {
            return Err(MachineError::IndexOutOfRange {
                what: "breakpoint address",
                index: addr as i64,
                bound: IMEM_DEPTH as u32,
            });
        }
        if self.addr_breaks.remove(&addr).is_none() {
            self.addr_breaks.insert(
                addr,
                AddrBreak {
                    passes: 1,
                    counter: 1,
                },
            );
        }
        Ok(())
    }

    /// Toggle a breakpoint resolved from a symbolic name through the
    /// supplied assembler context. A resolved address outside
    /// `[0, IMEM_DEPTH)` is silently ignored, matching `toggle_addr`'s
    /// treatment of a well-formed but out-of-range numeric address.
    pub fn toggle_named(
        &mut self,
        name: &str,
        ctx: Option<&dyn AssemblerContext>,
    ) -> Result<()> {
        let ctx = ctx.ok_or_else(|| MachineError::InvalidName {
            what: "breakpoint",
            detail: format!("no assembler context to resolve '{name}'"),
        })?;
        let addr = ctx
            .functions()
            .iter()
            .chain(ctx.labels().iter())
            .find(|(_, n)| n.as_str() == name)
            .map(|(&addr, _)| addr)
            .ok_or_else(|| MachineError::InvalidName {
                what: "breakpoint",
                detail: format!("unresolved label or function '{name}'"),
            })?;
        if addr >= IMEM_DEPTH {
            return Ok(());
        }
        let _ = self.toggle_addr(addr);
        Ok(())
    }

    pub fn set_passes(&mut self, addr: usize, passes: u32) -> Result<()> {
        if addr >= IMEM_DEPTH {
            return Err(MachineError::IndexOutOfRange {
                what: "breakpoint address",
                index: addr as i64,
                bound: IMEM_DEPTH as u32,
            });
        }
        self.addr_breaks
            .entry(addr)
            .and_modify(|b| b.passes = passes)
            .or_insert(AddrBreak { passes, counter: 1 });
        Ok(())
    }

    pub fn set_force_break(&mut self, force: ForceBreak) {
        self.force = force;
    }

    pub fn clear_force_break(&mut self) {
        self.force = ForceBreak::default();
    }

    /// Check force-break first, then the address table, for the current
    /// step. Matches §4.H's ordering: force-break is evaluated *before*
    /// address lookup.
    pub fn check(&mut self, pc: usize, loop_sp: usize, call_sp: usize) -> BreakHit {
        if self.force.active {
            let hit = (self.force.consider_loopstack && loop_sp == self.force.loopstack_depth)
                || (self.force.consider_callstack && call_sp == self.force.callstack_depth)
                || (!self.force.consider_loopstack && !self.force.consider_callstack);
            if hit {
                self.force.active = false;
                return BreakHit::Force;
            }
        }
        if let Some(b) = self.addr_breaks.get_mut(&pc) {
            if b.counter == b.passes {
                let passes = b.passes;
                b.counter = 1;
                return BreakHit::Address { passes };
            }
            b.counter += 1;
        }
        BreakHit::None
    }

    /// Address breakpoints persist across `reset`; this is never called by
    /// it. Exposed for callers that want an explicit clear (e.g. a fresh
    /// debug session with the same core).
    pub fn clear_addr_breaks(&mut self) {
        self.addr_breaks.clear();
    }
}
