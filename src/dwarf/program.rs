//! Top-level DWARF line-number decoder: owns the file and compilation-unit arenas and drives
//! the per-unit parse loop.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::container::ElfContainer;
use crate::cursor::Cursor;
use crate::dwarf::cu::{CompilationUnit, CuId};
use crate::dwarf::file::{FileId, SourceFile, SourceFileRef};
use crate::dwarf::line_header::{read_unit_header, resolve_path};
use crate::dwarf::state_machine::{step, StateMachine};
use crate::endian::Endian;
use crate::source::ByteSource;
use crate::Error;

/// Owns every [`SourceFile`] and [`CompilationUnit`] produced by decoding a `.debug_line`
/// section, plus the path → file index used to deduplicate file-table entries across units.
pub struct LineProgram {
    pub(crate) files: Vec<SourceFile>,
    pub(crate) units: Vec<CompilationUnit>,
    path_index: HashMap<PathBuf, FileId>,
}

impl LineProgram {
    /// Locates `.debug_line` in `elf` and decodes every unit it contains.
    pub fn from_elf<S: ByteSource>(elf: &ElfContainer<S>) -> Result<Self, Error> {
        let index = elf
            .section_by_name(".debug_line")?
            .ok_or_else(|| Error::DebugLineError("no .debug_line section".into()))?;
        let data = elf.section_content(index)?;
        Self::from_bytes(data, elf.endian())
    }

    /// Decodes every unit inside a raw `.debug_line` section buffer.
    pub fn from_bytes(data: &[u8], endian: Endian) -> Result<Self, Error> {
        let mut program = LineProgram { files: Vec::new(), units: Vec::new(), path_index: HashMap::new() };
        let mut cursor = Cursor::new(data, endian);
        while !cursor.ended() {
            program.read_unit(&mut cursor)?;
        }
        Ok(program)
    }

    pub(crate) fn intern_file(&mut self, path: PathBuf, date: u64, size: u64) -> FileId {
        if let Some(&id) = self.path_index.get(&path) {
            return id;
        }
        let id = FileId(self.files.len());
        self.files.push(SourceFile { path: path.clone(), date, size, units: Vec::new() });
        self.path_index.insert(path, id);
        id
    }

    fn read_unit(&mut self, cursor: &mut Cursor) -> Result<(), Error> {
        let (header, program_start, unit_end) = read_unit_header(cursor)?;

        let cu_id = CuId(self.units.len());
        let mut files = Vec::with_capacity(header.file_entries.len());
        for entry in &header.file_entries {
            let path = resolve_path(&header.include_directories, entry.dir_index, &entry.name);
            files.push(self.intern_file(path, entry.mtime, entry.size));
        }
        self.units.push(CompilationUnit { files, lines: Vec::new() });

        cursor
            .seek(program_start)
            .map_err(|_| Error::DebugLineError("header_length beyond unit length".into()))?;

        let mut sm = StateMachine::new(&header);
        while cursor.position() < unit_end {
            step(self, cu_id, &header, &mut sm, cursor)?;
        }

        let mut touched = Vec::new();
        for line in self.units[cu_id.0].lines() {
            if !touched.contains(&line.file) {
                touched.push(line.file);
            }
        }
        for file_id in touched {
            let units = &mut self.files[file_id.0].units;
            if !units.contains(&cu_id) {
                units.push(cu_id);
            }
        }

        cursor.seek(unit_end).map_err(|_| Error::DebugLineError("unit body position invariant violated".into()))?;
        Ok(())
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn units(&self) -> &[CompilationUnit] {
        &self.units
    }

    pub fn file(&self, id: FileId) -> SourceFileRef<'_> {
        SourceFileRef { program: self, id }
    }

    /// Looks up a `SourceFile` by its resolved path, as produced by joining an include-directory
    /// entry with a file-table name.
    pub fn find_path(&self, path: &std::path::Path) -> Option<SourceFileRef<'_>> {
        self.path_index.get(path).map(|&id| self.file(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_uleb128(buf: &mut Vec<u8>, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                buf.push(byte);
                break;
            }
            buf.push(byte | 0x80);
        }
    }

    /// Builds the literal `.debug_line` unit from the worked scenario: `opcode_base=13,
    /// line_base=-5, line_range=14, min_inst_len=1`, dirs `[".", "src"]`, one file `a.c` in
    /// `src`, body `set_address 0x100; copy; special(0xF1); end_sequence`.
    fn worked_unit() -> Vec<u8> {
        let mut header_tail = Vec::new();
        header_tail.push(1u8); // minimum_instruction_length
        // no maximum_operations_per_instruction (version 3)
        header_tail.push(1u8); // default_is_stmt
        header_tail.push(0xFBu8); // line_base = -5 as i8 two's complement
        header_tail.push(14u8); // line_range
        header_tail.push(13u8); // opcode_base
        header_tail.extend_from_slice(&[0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]); // 12 standard opcode lengths
        header_tail.extend_from_slice(b"src\0"); // include_directories[1]
        header_tail.push(0); // end of include_directories
        header_tail.extend_from_slice(b"a.c\0");
        push_uleb128(&mut header_tail, 1); // dir_index
        push_uleb128(&mut header_tail, 0); // mtime
        push_uleb128(&mut header_tail, 0); // size
        header_tail.push(0); // end of file table

        let mut program_body = Vec::new();
        // DW_LNE_set_address 0x100
        program_body.push(0);
        program_body.push(5); // instruction length: 1 (sub-opcode) + 4 (address)
        program_body.push(0x02);
        program_body.extend_from_slice(&0x100u32.to_le_bytes());
        // DW_LNS_copy
        program_body.push(0x01);
        // special opcode 0xF1
        program_body.push(0xF1);
        // DW_LNE_end_sequence
        program_body.push(0);
        program_body.push(1);
        program_body.push(0x01);

        let mut header_and_body = Vec::new();
        header_and_body.extend_from_slice(&(header_tail.len() as u32).to_le_bytes()); // header_length
        header_and_body.extend_from_slice(&header_tail);
        header_and_body.extend_from_slice(&program_body);

        let mut unit = Vec::new();
        let version: u16 = 3;
        let mut versioned = version.to_le_bytes().to_vec();
        versioned.extend_from_slice(&header_and_body);
        unit.extend_from_slice(&(versioned.len() as u32).to_le_bytes()); // unit_length
        unit.extend_from_slice(&versioned);
        unit
    }

    #[test]
    fn decodes_worked_special_opcode_scenario() {
        let data = worked_unit();
        let program = LineProgram::from_bytes(&data, Endian::Little).unwrap();

        assert_eq!(program.units().len(), 1);
        let cu = &program.units()[0];
        assert_eq!(cu.lines().len(), 3);
        assert_eq!(cu.lines()[0].address, 0x100);
        assert_eq!(cu.lines()[0].line, 1);
        assert_eq!(cu.lines()[1].address, 0x110);
        assert_eq!(cu.lines()[1].line, 0);
        // end_sequence fires before any flag-setting opcode runs, so IS_STMT (the only flag
        // `default_is_stmt` turns on) is the only one that can be set on this row.
        assert_eq!(cu.lines()[2].flags, crate::dwarf::LineFlags::IS_STMT);

        assert_eq!(program.files().len(), 1);
        assert_eq!(program.files()[0].path, std::path::PathBuf::from("src/a.c"));

        let file_ref = program.file(FileId(0));
        let ranges = file_ref.find(1);
        assert_eq!(ranges, vec![(0x100, 0x110)]);
    }

    #[test]
    fn two_units_referencing_the_same_path_dedupe() {
        let mut data = worked_unit();
        data.extend_from_slice(&worked_unit());
        let program = LineProgram::from_bytes(&data, Endian::Little).unwrap();

        assert_eq!(program.units().len(), 2);
        assert_eq!(program.files().len(), 1);
        assert_eq!(program.files()[0].units.len(), 2);
    }

    #[test]
    fn rejects_zero_line_range_in_special_opcode() {
        let mut data = worked_unit();
        // line_range lives right after default_is_stmt and line_base in the header tail; patch
        // it to 0 to exercise the division-by-zero guard for the eventual special opcode.
        // Layout from the start of `versioned`: version(2) + header_length(4) + min_inst_len(1)
        // + default_is_stmt(1) + line_base(1) + line_range(1) ...
        let line_range_offset = 4 /* unit_length */ + 2 /* version */ + 4 /* header_length */ + 1 + 1 + 1;
        data[line_range_offset] = 0;
        let err = LineProgram::from_bytes(&data, Endian::Little).unwrap_err();
        assert!(matches!(err, Error::DebugLineError(_)));
    }
}
