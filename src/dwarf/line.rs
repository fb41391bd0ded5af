//! The immutable row type produced by the line-number state machine.

use crate::dwarf::file::FileId;
use bitflags::bitflags;

bitflags! {
    /// Flags carried by a [`Line`], mirroring the DWARF line-number program registers of the
    /// same name.
    #[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
    pub struct LineFlags: u32 {
        const IS_STMT         = 1 << 0;
        const BASIC_BLOCK     = 1 << 1;
        const PROLOGUE_END    = 1 << 2;
        const EPILOGUE_BEGIN  = 1 << 3;
    }
}

/// One row emitted by the line-number program: `(address, file, line, column, flags, isa,
/// discriminator, op_index)`.
///
/// Rows within a [`crate::dwarf::cu::CompilationUnit`] are append-only and in emission order;
/// per DWARF, addresses are non-decreasing within a sequence (a run of rows between
/// `end_sequence` markers).
#[derive(Clone, Copy, Debug)]
pub struct Line {
    pub address: u32,
    pub file: FileId,
    pub line: i64,
    pub column: u64,
    pub flags: LineFlags,
    pub isa: u64,
    pub discriminator: u64,
    pub op_index: u8,
}
