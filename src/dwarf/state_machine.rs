//! The line-number program's register file and opcode dispatch loop.

use crate::cursor::{Cursor, CursorError};
use crate::dwarf::cu::CuId;
use crate::dwarf::line::{Line, LineFlags};
use crate::dwarf::line_header::{resolve_path, LineProgramHeader};
use crate::dwarf::program::LineProgram;
use crate::Error;

/// `address_size` for `DW_LNE_set_address`. Fixed at the ELF32 word size; DWARF versions in
/// scope here (2-4) don't encode address size in the `.debug_line` header itself.
const ADDRESS_SIZE: usize = 4;

fn short(_: CursorError) -> Error {
    Error::DebugLineError("unexpected end of line program".into())
}

/// Transient decoder registers; lifetime equals one line-number sequence within a unit. Reset
/// to its initial values after every `DW_LNE_end_sequence`, so a single instance is reused across
/// all of a unit's sequences.
pub struct StateMachine {
    pub address: u32,
    pub op_index: u8,
    pub file: u64,
    pub line: i64,
    pub column: u64,
    pub isa: u64,
    pub discriminator: u64,
    pub end_sequence: bool,
    pub flags: LineFlags,

    line_base: i8,
    line_range: u8,
    opcode_base: u8,
    minimum_instruction_length: u8,
    maximum_operations_per_instruction: u8,
    default_is_stmt: bool,
}

impl StateMachine {
    pub fn new(header: &LineProgramHeader) -> Self {
        let mut sm = StateMachine {
            address: 0,
            op_index: 0,
            file: 1,
            line: 1,
            column: 0,
            isa: 0,
            discriminator: 0,
            end_sequence: false,
            flags: LineFlags::empty(),
            line_base: header.line_base,
            line_range: header.line_range,
            opcode_base: header.opcode_base,
            minimum_instruction_length: header.minimum_instruction_length,
            maximum_operations_per_instruction: header.maximum_operations_per_instruction,
            default_is_stmt: header.default_is_stmt,
        };
        if sm.default_is_stmt {
            sm.flags.insert(LineFlags::IS_STMT);
        }
        sm
    }

    fn reset(&mut self) {
        self.address = 0;
        self.op_index = 0;
        self.file = 1;
        self.line = 1;
        self.column = 0;
        self.isa = 0;
        self.discriminator = 0;
        self.end_sequence = false;
        self.flags = LineFlags::empty();
        if self.default_is_stmt {
            self.flags.insert(LineFlags::IS_STMT);
        }
    }

    /// The operation-advance rule (for VLIW-capable targets): advances `(address, op_index)` by
    /// `advance` operations, reducing to `address += minimum_instruction_length * advance;
    /// op_index = 0` when `maximum_operations_per_instruction == 1`.
    fn advance_operations(&mut self, advance: u64) {
        let max_ops = u64::from(self.maximum_operations_per_instruction.max(1));
        let min_len = u64::from(self.minimum_instruction_length);
        let total = u64::from(self.op_index) + advance;
        self.address = self.address.wrapping_add((min_len * (total / max_ops)) as u32);
        self.op_index = (total % max_ops) as u8;
    }
}

fn emit_row(program: &mut LineProgram, cu_id: CuId, sm: &StateMachine) -> Result<(), Error> {
    let file_index = sm
        .file
        .checked_sub(1)
        .ok_or_else(|| Error::DebugLineError("file register is zero".into()))?;
    let file_index = usize::try_from(file_index).map_err(|_| Error::DebugLineError("file register too large".into()))?;
    let cu = &program.units[cu_id.0];
    let file_id = *cu
        .files
        .get(file_index)
        .ok_or_else(|| Error::DebugLineError(format!("file register {} out of range of unit's file table", sm.file)))?;

    program.units[cu_id.0].lines.push(Line {
        address: sm.address,
        file: file_id,
        line: sm.line,
        column: sm.column,
        flags: sm.flags,
        isa: sm.isa,
        discriminator: sm.discriminator,
        op_index: sm.op_index,
    });
    Ok(())
}

/// Executes one opcode starting at `cursor`'s current position.
pub fn step(
    program: &mut LineProgram,
    cu_id: CuId,
    header: &LineProgramHeader,
    sm: &mut StateMachine,
    cursor: &mut Cursor,
) -> Result<(), Error> {
    let opcode = cursor.read_u8().map_err(short)?;

    if opcode == 0 {
        let instr_len = usize::try_from(cursor.read_uleb128().map_err(short)?)
            .map_err(|_| Error::DebugLineError("extended opcode length too large".into()))?;
        let instr_start = cursor.position();
        let sub_opcode = cursor.read_u8().map_err(short)?;

        match sub_opcode {
            0x01 => {
                sm.end_sequence = true;
                emit_row(program, cu_id, sm)?;
                sm.reset();
            }
            0x02 => {
                let bytes = cursor.read_bytes(ADDRESS_SIZE).map_err(short)?;
                let mut addr = [0u8; ADDRESS_SIZE];
                addr.copy_from_slice(bytes);
                sm.address = match cursor.endian() {
                    crate::endian::Endian::Little => u32::from_le_bytes(addr),
                    crate::endian::Endian::Big => u32::from_be_bytes(addr),
                };
                sm.op_index = 0;
            }
            0x03 => {
                let name = cursor.read_cstring().map_err(short)?.to_string();
                let dir_index = cursor.read_uleb128().map_err(short)?;
                let mtime = cursor.read_uleb128().map_err(short)?;
                let size = cursor.read_uleb128().map_err(short)?;
                let path = resolve_path(&header.include_directories, dir_index, &name);
                let file_id = program.intern_file(path, mtime, size);
                program.units[cu_id.0].files.push(file_id);
            }
            0x04 => {
                sm.discriminator = cursor.read_uleb128().map_err(short)?;
            }
            _ => {}
        }

        let consumed = cursor.position() - instr_start;
        if consumed > instr_len {
            return Err(Error::DebugLineError("extended opcode overran its declared length".into()));
        }
        cursor.skip(instr_len - consumed).map_err(short)?;
        return Ok(());
    }

    if opcode < header.opcode_base {
        match opcode {
            1 => {
                emit_row(program, cu_id, sm)?;
                sm.flags.remove(LineFlags::BASIC_BLOCK | LineFlags::PROLOGUE_END | LineFlags::EPILOGUE_BEGIN);
                sm.discriminator = 0;
            }
            2 => {
                let advance = cursor.read_uleb128().map_err(short)?;
                sm.advance_operations(advance);
            }
            3 => {
                let delta = cursor.read_sleb128().map_err(short)?;
                sm.line += delta;
            }
            4 => sm.file = cursor.read_uleb128().map_err(short)?,
            5 => sm.column = cursor.read_uleb128().map_err(short)?,
            6 => sm.flags.toggle(LineFlags::IS_STMT),
            7 => sm.flags.insert(LineFlags::BASIC_BLOCK),
            8 => {
                if header.line_range == 0 {
                    return Err(Error::DebugLineError("line_range is zero".into()));
                }
                let adj = 255u32.saturating_sub(u32::from(header.opcode_base));
                sm.advance_operations(u64::from(adj / u32::from(header.line_range)));
            }
            9 => {
                let delta = cursor.read_u16().map_err(short)?;
                sm.address = sm.address.wrapping_add(u32::from(delta));
                sm.op_index = 0;
            }
            10 => sm.flags.insert(LineFlags::PROLOGUE_END),
            11 => sm.flags.insert(LineFlags::EPILOGUE_BEGIN),
            12 => sm.isa = cursor.read_uleb128().map_err(short)?,
            other => {
                let operand_count = header.standard_opcode_lengths.get(usize::from(other - 1)).copied().unwrap_or(0);
                for _ in 0..operand_count {
                    cursor.read_uleb128().map_err(short)?;
                }
            }
        }
        return Ok(());
    }

    // Special opcode.
    if header.line_range == 0 {
        return Err(Error::DebugLineError("line_range is zero".into()));
    }
    let adj = u32::from(opcode) - u32::from(header.opcode_base);
    let operation_advance = adj / u32::from(header.line_range);
    let line_delta = i64::from(header.line_base) + i64::from(adj % u32::from(header.line_range));
    sm.line += line_delta;
    sm.advance_operations(u64::from(operation_advance));
    emit_row(program, cu_id, sm)?;
    sm.flags.remove(LineFlags::BASIC_BLOCK | LineFlags::PROLOGUE_END | LineFlags::EPILOGUE_BEGIN);
    sm.discriminator = 0;
    Ok(())
}
