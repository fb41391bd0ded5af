//! Deduplicated source-file records (the `File` side of the DWARF data model).

use std::path::PathBuf;

use crate::dwarf::cu::CuId;
use crate::dwarf::program::LineProgram;

/// An arena index into [`LineProgram`]'s file table. Replaces the original's raw `File *`
/// pointers so `SourceFile` and `CompilationUnit` can reference each other without a cycle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FileId(pub(crate) usize);

/// `(path, timestamp, declared size, compilation units that reference it)`.
///
/// Identity is by resolved path: two file-table entries from different units that join to the
/// same path dedupe to one `SourceFile`.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub date: u64,
    pub size: u64,
    pub units: Vec<CuId>,
}

/// A borrowed view of a [`SourceFile`] plus the [`LineProgram`] that owns it, letting callers
/// run line-address queries without threading the arena through by hand.
pub struct SourceFileRef<'a> {
    pub(crate) program: &'a LineProgram,
    pub(crate) id: FileId,
}

impl<'a> SourceFileRef<'a> {
    pub fn path(&self) -> &'a std::path::Path {
        &self.program.files[self.id.0].path
    }

    pub fn date(&self) -> u64 {
        self.program.files[self.id.0].date
    }

    pub fn size(&self) -> u64 {
        self.program.files[self.id.0].size
    }

    pub fn units(&self) -> &'a [CuId] {
        &self.program.files[self.id.0].units
    }

    /// Address ranges covering `line` across every compilation unit that references this file.
    ///
    /// For each referencing unit, scans its line table sequentially; whenever a row names this
    /// file and `line`, the range `[row.address, next.address)` is returned, where `next` is the
    /// following row in emission order (possibly an `end_sequence` row).
    pub fn find(&self, line: i64) -> Vec<(u32, u32)> {
        let mut ranges = Vec::new();
        for &cu_id in self.units() {
            let cu = &self.program.units[cu_id.0];
            for (i, row) in cu.lines.iter().enumerate() {
                if row.file == self.id && row.line == line {
                    if let Some(next) = cu.lines.get(i + 1) {
                        ranges.push((row.address, next.address));
                    }
                }
            }
        }
        ranges
    }
}
