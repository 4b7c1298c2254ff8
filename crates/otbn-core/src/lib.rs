//! Architectural state and step engine for an OTBN-style big-number
//! coprocessor.
//!
//! The [`Core`] owns a 32-bit general-purpose register file projected onto a
//! 256-bit wide-register file, two flag groups, a byte-addressed data
//! memory, an append-only instruction memory, a loop stack, a call stack,
//! and a breakpoint controller, and drives them one fetch/dispatch/retire
//! step at a time.

pub mod breakpoints;
pub mod core;
pub mod dmem;
pub mod error;
pub mod flags;
pub mod hex;
pub mod imem;
pub mod registers;
pub mod stacks;
pub mod stats;
pub mod wide;

pub use core::Core;
pub use error::{MachineError, Result};
pub use imem::Instruction;
pub use registers::WideRegId;
pub use wide::WideWord;

/// Data-path width in bits.
pub const XLEN: u32 = 256;
/// Bits per limb.
pub const LIMB_BITS: u32 = 32;
/// Limbs per wide word.
pub const LIMBS: usize = 8;
/// Bits per half-limb.
pub const HALF_LIMB_BITS: u32 = 16;
/// Bits per quarter-word.
pub const QW_BITS: u32 = 64;
/// Bits per half-word.
pub const HW_BITS: u32 = 128;
/// Bits in a GPR.
pub const GPR_WIDTH: u32 = 32;
/// Number of wide data registers, and number of general-purpose registers.
pub const NUM_REGS: usize = 32;
/// Alias for [`NUM_REGS`] used where the GPR file is meant specifically.
pub const NUM_GPRS: usize = 32;
/// Data memory depth, in 256-bit words.
pub const DMEM_DEPTH: usize = 128;
/// Maximum instruction memory length.
pub const IMEM_DEPTH: usize = 1024;
/// Maximum loop stack depth.
pub const LOOP_STACK_SIZE: usize = 16;
/// Maximum call stack depth.
pub const CALL_STACK_SIZE: usize = 16;

/// CSR address of the packed flags byte.
pub const CSR_FLAG: u16 = 0x7C0;
/// CSR base address of MOD's eight limbs (`CSR_MOD_BASE + i` = limb `i`).
pub const CSR_MOD_BASE: u16 = 0x7D0;
/// CSR address of RND's limb 0 (read-only).
pub const CSR_RNG: u16 = 0xFC0;

/// WSR index of MOD.
pub const WSR_MOD: u8 = 0;
/// WSR index of RND.
pub const WSR_RND: u8 = 1;

/// Width, in bits, of an I-type immediate in the encoded instruction
/// stream. Exposed for assembler-context consumers; unused by the core's
/// own state transitions.
pub const I_TYPE_IMM_WIDTH: u32 = 12;

/// Default filename used by the optional DMEM dump-to-disk helper.
pub const DEFAULT_DUMP_FILENAME: &str = "dmem_dump.hex";

/// Mask selecting the low 32 bits of a `u64`.
pub const LIMB_MASK: u64 = 0xFFFF_FFFF;
/// Mask selecting the low 16 bits of a `u32`.
pub const HALF_LIMB_MASK: u32 = 0xFFFF;
