//! Error taxonomy surfaced by the core to callers of [`crate::Core::step`] and
//! the register/memory/stack accessors it is built from.

use std::fmt;

/// Everything that can go wrong while driving the machine.
///
/// Variants mirror the language-agnostic error kinds of the architectural
/// contract: out-of-range indices, unknown addressable names, stack
/// over/underflow, and invalid runtime jump targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    /// A register, limb, half-limb, half-word, quarter-word, DMEM, IMEM, or
    /// PC index fell outside its declared range.
    IndexOutOfRange {
        what: &'static str,
        index: i64,
        bound: u32,
    },
    /// An unknown CSR/WSR address, flag name, or unresolved breakpoint label.
    InvalidName { what: &'static str, detail: String },
    /// A loop or call stack push exceeded its fixed depth, or a loop stack
    /// pop underran an empty stack.
    StackOverflow {
        which: &'static str,
        reason: &'static str,
    },
    /// A pop on an empty call stack. Architecturally distinct from a generic
    /// [`MachineError::StackOverflow`] so callers can special-case it (e.g.
    /// a RET with no matching CALL).
    CallStackUnderrun,
    /// Inspecting an empty loop stack, or a runtime jump target that falls
    /// outside the instruction memory.
    Runtime(String),
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { what, index, bound } => {
                write!(f, "{what} index {index} out of range (0..{bound})")
            }
            Self::InvalidName { what, detail } => write!(f, "invalid {what}: {detail}"),
            Self::StackOverflow { which, reason } => write!(f, "{which} stack {reason}"),
            Self::CallStackUnderrun => write!(f, "call stack underrun"),
            Self::Runtime(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for MachineError {}

pub type Result<T> = std::result::Result<T, MachineError>;
