//! Lazy ELF32 reader and DWARF `.debug_line` decoder.
//!
//! The crate is split along the two hard subsystems: an endian-aware,
//! lazily-materializing [`container`] around the ELF32 file layout, and a
//! [`dwarf`] line-program decoder built on top of it. Everything else
//! (image assembly, polymorphic format dispatch, CLI front-ends) is
//! deliberately left to callers.

pub mod container;
pub mod cursor;
pub mod dwarf;
pub mod endian;
pub mod header;
pub mod source;

#[cfg(test)]
mod tests;

use thiserror_no_std::Error;

/// The flat error taxonomy used across every component of this crate.
///
/// Propagation is uniform: every fallible API surfaces one of these
/// variants to its caller. The only tolerated failures are unknown DWARF
/// opcodes, which are skipped rather than reported (see [`dwarf`]).
#[derive(Error, Debug)]
pub enum Error {
    /// The byte source refused a read (short read, or the underlying I/O
    /// operation itself failed).
    #[error("I/O error reading ELF data")]
    Io,

    /// `#[from] std::io::Error`, kept distinct from [`Error::Io`] so callers
    /// can recover the underlying OS error if they need to.
    #[error(transparent)]
    #[cfg(feature = "std")]
    StdIo(#[from] std::io::Error),

    /// The ELF magic bytes (`0x7F 'E' 'L' 'F'`) were not found.
    #[error("not an ELF file")]
    NotElf,

    /// The file's `EI_CLASS` byte is not `ELFCLASS32`.
    #[error("only 32-bit ELF class is supported")]
    UnsupportedClass,

    /// A header or table bound was violated, or a string-table lookup fell
    /// outside the resolved section content.
    #[error("malformed ELF: {0}")]
    MalformedElf(String),

    /// A `PT_NOTE` segment's entries were short or internally inconsistent.
    #[error("malformed note entry: {0}")]
    MalformedNote(String),

    /// The `.debug_line` bytecode violated a header bound, ran out of
    /// bytes mid-operand, or divided by a zero `line_range`.
    #[error("debug line error: {0}")]
    DebugLineError(String),
}

pub use crate::container::ElfContainer;
pub use crate::dwarf::LineProgram;
