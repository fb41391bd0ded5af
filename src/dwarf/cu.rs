//! One compilation unit's worth of line-program output.

use crate::dwarf::file::FileId;
use crate::dwarf::line::Line;

/// An arena index into [`crate::dwarf::program::LineProgram`]'s unit table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CuId(pub(crate) usize);

/// Owns the unit's file table (1-indexed by the line program's `file` register) and its
/// append-only, emission-ordered line table.
#[derive(Clone, Debug, Default)]
pub struct CompilationUnit {
    pub(crate) files: Vec<FileId>,
    pub(crate) lines: Vec<Line>,
}

impl CompilationUnit {
    pub fn files(&self) -> &[FileId] {
        &self.files
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }
}
