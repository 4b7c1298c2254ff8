//! Wide data registers, special wide registers, and the 32-bit GPR file
//! projected onto them.

use crate::error::{MachineError, Result};
use crate::stacks::CallStack;
use crate::wide::WideWord;
use crate::{NUM_GPRS, NUM_REGS, XLEN};

/// The sentinel pattern RND initializes to: every byte `0x99`.
const RND_SENTINEL: [u8; 32] = [0x99; 32];

/// Identifies a wide register reachable through the generic `get_wide`/
/// `set_wide` accessors: one of the 32 WDRs, or one of the named special
/// wide registers. ACC is deliberately absent — per the architectural
/// contract it is only reachable through the dedicated `get_acc`/`set_acc`
/// pair, not through a general register-select id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WideRegId {
    Wdr(usize),
    Mod,
    Dmp,
    Rfp,
    Lc,
    Rnd,
}

impl WideRegId {
    fn is_validity_tracked(self) -> bool {
        matches!(self, Self::Wdr(_))
    }
}

#[derive(Debug, Clone)]
struct Wdr {
    value: WideWord,
    /// 16 half-limb validity bits, index = `2*limb + upper as usize`.
    valid: [bool; 16],
}

impl Default for Wdr {
    fn default() -> Self {
        Self {
            value: WideWord::ZERO,
            valid: [false; 16],
        }
    }
}

/// gpr index -> (paired wide register, limb index), for the mirrored GPR
/// ranges x8..x15 (RFP), x16..x23 (DMP), x24..x31 (LC).
fn mirror_of(i: usize) -> Option<(WideRegId, usize)> {
    match i {
        8..=15 => Some((WideRegId::Rfp, i - 8)),
        16..=23 => Some((WideRegId::Dmp, i - 16)),
        24..=31 => Some((WideRegId::Lc, i - 24)),
        _ => None,
    }
}

/// The register file: 32 WDRs, 32 GPRs (with role projections), and the
/// special wide registers MOD/DMP/RFP/LC/ACC/RND.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    wdrs: [Wdr; NUM_REGS],
    /// Plain storage for x2..x7; x0/x1/mirrored ranges never read this.
    gprs: [u32; NUM_GPRS],
    r#mod: WideWord,
    dmp: WideWord,
    rfp: WideWord,
    lc: WideWord,
    acc: WideWord,
    rnd: WideWord,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    #[must_use]
    pub fn new() -> Self {
        Self {
            wdrs: std::array::from_fn(|_| Wdr::default()),
            gprs: [0; NUM_GPRS],
            r#mod: WideWord::ZERO,
            dmp: WideWord::ZERO,
            rfp: WideWord::ZERO,
            lc: WideWord::ZERO,
            acc: WideWord::ZERO,
            rnd: WideWord::from_le_bytes(RND_SENTINEL),
        }
    }

    fn wide_slot(&self, id: WideRegId) -> Result<&WideWord> {
        match id {
            WideRegId::Wdr(i) => self
                .wdrs
                .get(i)
                .map(|w| &w.value)
                .ok_or(MachineError::IndexOutOfRange {
                    what: "WDR",
                    index: i as i64,
                    bound: NUM_REGS as u32,
                }),
            WideRegId::Mod => Ok(&self.r#mod),
            WideRegId::Dmp => Ok(&self.dmp),
            WideRegId::Rfp => Ok(&self.rfp),
            WideRegId::Lc => Ok(&self.lc),
            WideRegId::Rnd => Ok(&self.rnd),
        }
    }

    fn wide_slot_mut(&mut self, id: WideRegId) -> Result<&mut WideWord> {
        match id {
            WideRegId::Wdr(i) => {
                let bound = NUM_REGS as u32;
                self.wdrs
                    .get_mut(i)
                    .map(|w| &mut w.value)
                    .ok_or(MachineError::IndexOutOfRange {
                        what: "WDR",
                        index: i as i64,
                        bound,
                    })
            }
            WideRegId::Mod => Ok(&mut self.r#mod),
            WideRegId::Dmp => Ok(&mut self.dmp),
            WideRegId::Rfp => Ok(&mut self.rfp),
            WideRegId::Lc => Ok(&mut self.lc),
            WideRegId::Rnd => Ok(&mut self.rnd),
        }
    }

    /// Read a wide register by id.
    pub fn get_wide(&self, id: WideRegId) -> Result<WideWord> {
        self.wide_slot(id).copied()
    }

    /// Replace a wide register wholesale. For a WDR this marks every
    /// half-limb valid; specials have no validity vector.
    pub fn set_wide(&mut self, id: WideRegId, v: WideWord) -> Result<()> {
        if let WideRegId::Wdr(i) = id {
            let w = self
                .wdrs
                .get_mut(i)
                .ok_or(MachineError::IndexOutOfRange {
                    what: "WDR",
                    index: i as i64,
                    bound: NUM_REGS as u32,
                })?;
            w.value = v;
            w.valid = [true; 16];
            return Ok(());
        }
        *self.wide_slot_mut(id)? = v;
        Ok(())
    }

    /// ACC is only reachable through this pair, never through `get_wide`'s
    /// generic id (kept as a distinct method to match the addressable
    /// surface of the architectural contract).
    pub fn get_acc(&self) -> WideWord {
        self.acc
    }

    pub fn set_acc(&mut self, v: WideWord) {
        self.acc = v;
    }

    fn mark_limb_valid(&mut self, id: WideRegId, limb: usize) {
        if let WideRegId::Wdr(i) = id {
            if let Some(w) = self.wdrs.get_mut(i) {
                w.valid[2 * limb] = true;
                w.valid[2 * limb + 1] = true;
            }
        }
    }

    fn mark_half_limb_valid(&mut self, id: WideRegId, limb: usize, upper: bool) {
        if let WideRegId::Wdr(i) = id {
            if let Some(w) = self.wdrs.get_mut(i) {
                w.valid[2 * limb + usize::from(upper)] = true;
            }
        }
    }

    pub fn get_reg_limb(&self, id: WideRegId, i: usize) -> Result<u32> {
        self.wide_slot(id)?.get_limb(i)
    }

    pub fn set_reg_limb(&mut self, id: WideRegId, i: usize, v: u32) -> Result<()> {
        let slot = self.wide_slot_mut(id)?;
        *slot = slot.set_limb(i, v)?;
        if id.is_validity_tracked() {
            self.mark_limb_valid(id, i);
        }
        Ok(())
    }

    pub fn get_reg_half_limb(&self, id: WideRegId, i: usize, upper: bool) -> Result<u16> {
        self.wide_slot(id)?.get_half_limb(i, upper)
    }

    pub fn set_reg_half_limb(&mut self, id: WideRegId, i: usize, upper: bool, v: u16) -> Result<()> {
        let slot = self.wide_slot_mut(id)?;
        *slot = slot.set_half_limb(i, upper, v)?;
        if id.is_validity_tracked() {
            self.mark_half_limb_valid(id, i, upper);
        }
        Ok(())
    }

    pub fn get_reg_qw(&self, id: WideRegId, q: usize) -> Result<u64> {
        self.wide_slot(id)?.get_qw(q)
    }

    pub fn set_reg_half_word(&mut self, id: WideRegId, h: usize, v: u128) -> Result<()> {
        let slot = self.wide_slot_mut(id)?;
        *slot = slot.set_half_word(h, v)?;
        if id.is_validity_tracked() {
            let base = if h == 0 { 0 } else { 4 };
            for limb in base..base + 4 {
                self.mark_limb_valid(id, limb);
            }
        }
        Ok(())
    }

    /// The 16-entry half-limb validity vector of a WDR.
    pub fn get_reg_valid_half_limbs(&self, i: usize) -> Result<[bool; 16]> {
        self.wdrs
            .get(i)
            .map(|w| w.valid)
            .ok_or(MachineError::IndexOutOfRange {
                what: "WDR",
                index: i as i64,
                bound: NUM_REGS as u32,
            })
    }

    fn check_gpr_index(i: usize) -> Result<()> {
        if i >= NUM_GPRS {
            return Err(MachineError::IndexOutOfRange {
                what: "GPR",
                index: i as i64,
                bound: NUM_GPRS as u32,
            });
        }
        Ok(())
    }

    /// Read a GPR, honoring the x0-is-zero and x1-pops-the-call-stack
    /// projections. x1 reads pop the call stack through `call_stack`.
    pub fn get_gpr(&mut self, i: usize, call_stack: &mut CallStack) -> Result<u32> {
        Self::check_gpr_index(i)?;
        match i {
            0 => Ok(0),
            1 => Ok(call_stack.pop()? as u32),
            _ => {
                if let Some((wide, limb)) = mirror_of(i) {
                    self.get_reg_limb(wide, limb)
                } else {
                    Ok(self.gprs[i])
                }
            }
        }
    }

    /// Write a GPR, honoring the x0-drop, x1-pushes-the-call-stack, and
    /// mirrored-range projections.
    pub fn set_gpr(&mut self, i: usize, v: u32, call_stack: &mut CallStack) -> Result<()> {
        Self::check_gpr_index(i)?;
        match i {
            0 => Ok(()),
            1 => call_stack.push(u64::from(v)),
            _ => {
                if let Some((wide, limb)) = mirror_of(i) {
                    self.set_reg_limb(wide, limb, v)?;
                }
                self.gprs[i] = v;
                Ok(())
            }
        }
    }

    /// `(x+1) mod 2^32`, routed through the full `get_gpr`/`set_gpr`
    /// projection (a call on x1 both pops and then pushes).
    pub fn inc_gpr(&mut self, i: usize, call_stack: &mut CallStack) -> Result<u32> {
        let cur = self.get_gpr(i, call_stack)?;
        let next = cur.wrapping_add(1);
        self.set_gpr(i, next, call_stack)?;
        Ok(next)
    }

    /// `(x + XLEN/8) mod 2^32`, routed through the full projection.
    pub fn inc_gpr_wlen_bytes(&mut self, i: usize, call_stack: &mut CallStack) -> Result<u32> {
        let cur = self.get_gpr(i, call_stack)?;
        let next = cur.wrapping_add(XLEN / 8);
        self.set_gpr(i, next, call_stack)?;
        Ok(next)
    }

    /// Zero all WDRs, specials, GPRs, and PC-adjacent state this file owns.
    /// Does not touch validity vectors (see `reset` in `core.rs`, which
    /// clears them unconditionally and independently of this call).
    pub fn clear_regs(&mut self) {
        for w in &mut self.wdrs {
            w.value = WideWord::ZERO;
        }
        self.gprs = [0; NUM_GPRS];
        self.r#mod = WideWord::ZERO;
        self.dmp = WideWord::ZERO;
        self.rfp = WideWord::ZERO;
        self.lc = WideWord::ZERO;
        self.acc = WideWord::ZERO;
        self.rnd = WideWord::from_le_bytes(RND_SENTINEL);
    }

    /// Unconditionally clear every WDR's half-limb validity vector.
    /// Called by `reset` regardless of `clear_regs`.
    pub fn clear_validity(&mut self) {
        for w in &mut self.wdrs {
            w.valid = [false; 16];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> (RegisterFile, CallStack) {
        (RegisterFile::new(), CallStack::new())
    }

    #[test]
    fn x0_reads_zero_and_drops_writes() {
        let (mut rf, mut cs) = file();
        rf.set_gpr(0, 0xFFFF_FFFF, &mut cs).unwrap();
        assert_eq!(rf.get_gpr(0, &mut cs).unwrap(), 0);
    }

    #[test]
    fn x1_push_pop_is_call_stack() {
        let (mut rf, mut cs) = file();
        rf.set_gpr(1, 0x1000, &mut cs).unwrap();
        rf.set_gpr(1, 0x2000, &mut cs).unwrap();
        assert_eq!(rf.get_gpr(1, &mut cs).unwrap(), 0x2000);
        assert_eq!(rf.get_gpr(1, &mut cs).unwrap(), 0x1000);
    }

    #[test]
    fn mirrored_gpr_write_updates_wide_register_and_read_is_authoritative() {
        let (mut rf, mut cs) = file();
        rf.set_gpr(10, 0xCAFE_BABE, &mut cs).unwrap();
        assert_eq!(rf.get_gpr(10, &mut cs).unwrap(), 0xCAFE_BABE);
        assert_eq!(rf.get_reg_limb(WideRegId::Rfp, 2).unwrap(), 0xCAFE_BABE);

        rf.set_reg_limb(WideRegId::Rfp, 2, 0x1234_5678).unwrap();
        assert_eq!(
            rf.get_gpr(10, &mut cs).unwrap(),
            0x1234_5678,
            "wide register is authoritative on read"
        );
    }

    #[test]
    fn whole_register_write_marks_all_half_limbs_valid() {
        let (mut rf, _cs) = file();
        rf.set_wide(WideRegId::Wdr(3), WideWord::ZERO).unwrap();
        assert_eq!(rf.get_reg_valid_half_limbs(3).unwrap(), [true; 16]);
    }

    #[test]
    fn limb_write_marks_only_that_limbs_two_half_limbs() {
        let (mut rf, _cs) = file();
        rf.set_reg_limb(WideRegId::Wdr(0), 3, 0xDEAD_BEEF).unwrap();
        let valid = rf.get_reg_valid_half_limbs(0).unwrap();
        assert!(valid[6] && valid[7]);
        assert!(valid.iter().enumerate().all(|(i, &v)| (6..=7).contains(&i) || !v));
    }

    #[test]
    fn gpr_out_of_range_is_index_error() {
        let (mut rf, mut cs) = file();
        let err = rf.get_gpr(32, &mut cs).unwrap_err();
        assert!(matches!(err, MachineError::IndexOutOfRange { .. }));
    }

    #[test]
    fn rnd_initializes_to_sentinel() {
        let (rf, _cs) = file();
        assert_eq!(rf.get_wide(WideRegId::Rnd).unwrap().to_le_bytes(), RND_SENTINEL);
    }
}
