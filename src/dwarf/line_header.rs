//! Unit framing and line-program header parsing (the non-executable half of C5).

use crate::cursor::Cursor;
use crate::Error;

fn short(_: crate::cursor::CursorError) -> Error {
    Error::DebugLineError("unexpected end of .debug_line unit".into())
}

/// One entry from the header's file-name table: `(name, dir_index, mtime, size)`, all as they
/// appeared on disk — not yet resolved to an absolute path.
#[derive(Clone, Debug)]
pub struct FileEntry {
    pub name: String,
    pub dir_index: u64,
    pub mtime: u64,
    pub size: u64,
}

/// The per-unit constants read from the line-program header, plus the decoded include-directory
/// and file-name tables.
#[derive(Clone, Debug)]
pub struct LineProgramHeader {
    pub version: u16,
    pub minimum_instruction_length: u8,
    pub maximum_operations_per_instruction: u8,
    pub default_is_stmt: bool,
    pub line_base: i8,
    pub line_range: u8,
    pub opcode_base: u8,
    pub standard_opcode_lengths: Vec<u8>,
    /// Index 0 is always `"."`, matching the state machine's pre-seeded entry; indices 1.. are
    /// the directories actually declared in the header.
    pub include_directories: Vec<String>,
    pub file_entries: Vec<FileEntry>,
}

/// Reads one unit's length prologue and header, leaving the cursor positioned wherever it ended
/// up (the caller seeks to `program_start` before executing opcodes). Returns the header plus
/// the absolute offsets where the opcode stream starts and where the unit body ends.
pub fn read_unit_header(cursor: &mut Cursor) -> Result<(LineProgramHeader, usize, usize), Error> {
    let initial_length = cursor.read_u32().map_err(short)?;
    let (unit_length, offset_size): (u64, u8) = if initial_length == 0xFFFF_FFFF {
        (cursor.read_u64().map_err(short)?, 8)
    } else {
        (u64::from(initial_length), 4)
    };
    let unit_end = cursor
        .position()
        .checked_add(usize::try_from(unit_length).map_err(|_| Error::DebugLineError("unit length too large".into()))?)
        .ok_or_else(|| Error::DebugLineError("unit length overflows".into()))?;
    if unit_end > cursor.len() {
        return Err(Error::DebugLineError("unit length exceeds .debug_line section".into()));
    }

    let version = cursor.read_u16().map_err(short)?;
    let header_length = if offset_size == 8 {
        cursor.read_u64().map_err(short)?
    } else {
        u64::from(cursor.read_u32().map_err(short)?)
    };
    let program_start = cursor
        .position()
        .checked_add(usize::try_from(header_length).map_err(|_| Error::DebugLineError("header_length too large".into()))?)
        .ok_or_else(|| Error::DebugLineError("header_length overflows".into()))?;
    if program_start > unit_end {
        return Err(Error::DebugLineError("header_length beyond unit length".into()));
    }

    let minimum_instruction_length = cursor.read_u8().map_err(short)?;
    let maximum_operations_per_instruction = if version >= 4 { cursor.read_u8().map_err(short)? } else { 1 };
    let default_is_stmt = cursor.read_u8().map_err(short)? != 0;
    let line_base = cursor.read_i8().map_err(short)?;
    let line_range = cursor.read_u8().map_err(short)?;
    let opcode_base = cursor.read_u8().map_err(short)?;

    let mut standard_opcode_lengths = Vec::with_capacity(opcode_base.saturating_sub(1) as usize);
    for _ in 1..opcode_base {
        standard_opcode_lengths.push(cursor.read_u8().map_err(short)?);
    }

    let mut include_directories = vec![".".to_string()];
    loop {
        let dir = cursor.read_cstring().map_err(short)?;
        if dir.is_empty() {
            break;
        }
        include_directories.push(dir.to_string());
    }

    let mut file_entries = Vec::new();
    loop {
        let name = cursor.read_cstring().map_err(short)?;
        if name.is_empty() {
            break;
        }
        let dir_index = cursor.read_uleb128().map_err(short)?;
        let mtime = cursor.read_uleb128().map_err(short)?;
        let size = cursor.read_uleb128().map_err(short)?;
        file_entries.push(FileEntry { name: name.to_string(), dir_index, mtime, size });
    }

    let header = LineProgramHeader {
        version,
        minimum_instruction_length,
        maximum_operations_per_instruction,
        default_is_stmt,
        line_base,
        line_range,
        opcode_base,
        standard_opcode_lengths,
        include_directories,
        file_entries,
    };
    Ok((header, program_start, unit_end))
}

/// Joins `name` onto `dirs[dir_index]` (falling back to `"."` for an out-of-range index, same as
/// directory 0).
pub fn resolve_path(dirs: &[String], dir_index: u64, name: &str) -> std::path::PathBuf {
    let dir = usize::try_from(dir_index).ok().and_then(|i| dirs.get(i)).map(String::as_str).unwrap_or(".");
    std::path::Path::new(dir).join(name)
}
