//! ELF32 on-disk record shapes (ehdr / shdr / phdr) and their `Cursor`-based parsers.
//!
//! These are plain data — [`crate::container::ElfContainer`] owns the lazy materialization and
//! caching policy described in §4.4 of `SPEC_FULL.md`.

pub mod ident;

use crate::cursor::Cursor;
use crate::header::ident::{ElfClass, ElfIdent};
use crate::Error;
use bitflags::bitflags;

/// The object-file type from `e_type`.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum FileType {
    #[default]
    None,
    Relocatable,
    Executable,
    SharedObject,
    Core,
    Unknown(u16),
}

impl From<u16> for FileType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Relocatable,
            2 => Self::Executable,
            3 => Self::SharedObject,
            4 => Self::Core,
            value => Self::Unknown(value),
        }
    }
}

/// The target architecture from `e_machine`. Only the handful of values the pack's example
/// repos actually target are named; everything else round-trips through `Unknown`.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum TargetMachine {
    #[default]
    None,
    X86,
    X86_64,
    Arm,
    Arm64,
    RiscV,
    Unknown(u16),
}

impl From<u16> for TargetMachine {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            3 => Self::X86,
            62 => Self::X86_64,
            40 => Self::Arm,
            183 => Self::Arm64,
            243 => Self::RiscV,
            other => Self::Unknown(other),
        }
    }
}

/// The fixed 52-byte ELF32 file header (`Elf32_Ehdr`).
#[derive(Clone, Copy, Debug)]
pub struct FileHeader {
    pub ident: ElfIdent,
    pub ty: FileType,
    pub machine: TargetMachine,
    pub version: u32,
    pub entry: u32,
    pub phoff: u32,
    pub shoff: u32,
    pub flags: u32,
    pub ehsize: u16,
    pub phentsize: u16,
    pub phnum: u16,
    pub shentsize: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl FileHeader {
    pub const SIZE: usize = 52;

    /// Parses and validates the 52-byte ELF32 header. `raw` must be exactly [`Self::SIZE`] bytes
    /// — the caller ([`crate::container::ElfContainer::open`]) is responsible for reading that
    /// many bytes from offset 0 first.
    pub fn parse(raw: &[u8; Self::SIZE]) -> Result<Self, Error> {
        if raw[0..4] != ElfIdent::MAGIC {
            return Err(Error::NotElf);
        }

        let mut ident_bytes = [0u8; ElfIdent::SIZE];
        ident_bytes.copy_from_slice(&raw[0..ElfIdent::SIZE]);
        let ident = ElfIdent::parse(&ident_bytes);

        if ident.class != ElfClass::Class32 {
            return Err(Error::UnsupportedClass);
        }

        let endian = crate::endian::Endian::try_from(ident.endian)
            .map_err(|_| Error::MalformedElf("invalid EI_DATA byte".into()))?;

        let mut cursor = Cursor::new(&raw[ElfIdent::SIZE..], endian);
        let map_short = |what: &'static str| move |_| Error::MalformedElf(format!("truncated {what}"));

        let ty = cursor.read_u16().map_err(map_short("e_type")).map(FileType::from)?;
        let machine = cursor.read_u16().map_err(map_short("e_machine")).map(TargetMachine::from)?;
        let version = cursor.read_u32().map_err(map_short("e_version"))?;
        let entry = cursor.read_u32().map_err(map_short("e_entry"))?;
        let phoff = cursor.read_u32().map_err(map_short("e_phoff"))?;
        let shoff = cursor.read_u32().map_err(map_short("e_shoff"))?;
        let flags = cursor.read_u32().map_err(map_short("e_flags"))?;
        let ehsize = cursor.read_u16().map_err(map_short("e_ehsize"))?;
        let phentsize = cursor.read_u16().map_err(map_short("e_phentsize"))?;
        let phnum = cursor.read_u16().map_err(map_short("e_phnum"))?;
        let shentsize = cursor.read_u16().map_err(map_short("e_shentsize"))?;
        let shnum = cursor.read_u16().map_err(map_short("e_shnum"))?;
        let shstrndx = cursor.read_u16().map_err(map_short("e_shstrndx"))?;

        if shstrndx >= shnum {
            return Err(Error::MalformedElf(format!(
                "e_shstrndx ({shstrndx}) out of range of e_shnum ({shnum})"
            )));
        }

        Ok(FileHeader {
            ident,
            ty,
            machine,
            version,
            entry,
            phoff,
            shoff,
            flags,
            ehsize,
            phentsize,
            phnum,
            shentsize,
            shnum,
            shstrndx,
        })
    }
}

/// Segment types from `p_type`, from the TIS ELF spec plus the common GNU extensions.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum SegmentType {
    #[default]
    Null,
    Load,
    Dynamic,
    Interp,
    Note,
    ShLib,
    Phdr,
    Tls,
    GnuEhFrame,
    GnuStack,
    GnuRelro,
    Unknown(u32),
}

impl From<u32> for SegmentType {
    fn from(value: u32) -> Self {
        match value {
            0x0 => Self::Null,
            0x1 => Self::Load,
            0x2 => Self::Dynamic,
            0x3 => Self::Interp,
            0x4 => Self::Note,
            0x5 => Self::ShLib,
            0x6 => Self::Phdr,
            0x7 => Self::Tls,
            0x6474_E550 => Self::GnuEhFrame,
            0x6474_E551 => Self::GnuStack,
            0x6474_E552 => Self::GnuRelro,
            other => Self::Unknown(other),
        }
    }
}

bitflags! {
    /// `p_flags`: access permissions for a loadable segment.
    #[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
    pub struct SegmentFlags: u32 {
        const EXECUTABLE = 0x1;
        const WRITABLE   = 0x2;
        const READABLE   = 0x4;
    }
}

/// The 32-byte ELF32 program header (`Elf32_Phdr`). Field order for the 32-bit class is
/// `type, offset, vaddr, paddr, filesz, memsz, flags, align` — note `flags` comes *after*
/// `memsz` here, unlike the 64-bit layout.
#[derive(Clone, Copy, Debug)]
pub struct ProgramHeader {
    pub ty: SegmentType,
    pub offset: u32,
    pub vaddr: u32,
    pub paddr: u32,
    pub filesz: u32,
    pub memsz: u32,
    pub flags: SegmentFlags,
    pub align: u32,
}

impl ProgramHeader {
    pub const SIZE: usize = 32;

    pub fn parse(cursor: &mut Cursor) -> Result<Self, Error> {
        let map_short = |what: &'static str| move |_| Error::MalformedElf(format!("truncated program header {what}"));

        let ty = SegmentType::from(cursor.read_u32().map_err(map_short("p_type"))?);
        let offset = cursor.read_u32().map_err(map_short("p_offset"))?;
        let vaddr = cursor.read_u32().map_err(map_short("p_vaddr"))?;
        let paddr = cursor.read_u32().map_err(map_short("p_paddr"))?;
        let filesz = cursor.read_u32().map_err(map_short("p_filesz"))?;
        let memsz = cursor.read_u32().map_err(map_short("p_memsz"))?;
        let flags = SegmentFlags::from_bits_retain(cursor.read_u32().map_err(map_short("p_flags"))?);
        let align = cursor.read_u32().map_err(map_short("p_align"))?;

        Ok(ProgramHeader { ty, offset, vaddr, paddr, filesz, memsz, flags, align })
    }
}

/// Section types from `sh_type`.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
pub enum SectionType {
    #[default]
    Null,
    ProgBits,
    SymbolTable,
    StringTable,
    Rela,
    Hash,
    Dynamic,
    Note,
    NoBits,
    Rel,
    ShLib,
    DynamicSymbol,
    InitArray,
    FiniArray,
    PreInitArray,
    Group,
    SymbolTableIndex,
    Unknown(u32),
}

impl From<u32> for SectionType {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Null,
            1 => Self::ProgBits,
            2 => Self::SymbolTable,
            3 => Self::StringTable,
            4 => Self::Rela,
            5 => Self::Hash,
            6 => Self::Dynamic,
            7 => Self::Note,
            8 => Self::NoBits,
            9 => Self::Rel,
            10 => Self::ShLib,
            11 => Self::DynamicSymbol,
            14 => Self::InitArray,
            15 => Self::FiniArray,
            16 => Self::PreInitArray,
            17 => Self::Group,
            81 => Self::SymbolTableIndex,
            other => Self::Unknown(other),
        }
    }
}

bitflags! {
    /// `sh_flags`.
    #[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
    pub struct SectionFlags: u32 {
        const WRITE            = 0x1;
        const ALLOC            = 0x2;
        const INSTRUCTIONS     = 0x4;
        const MERGE            = 0x10;
        const STRINGS          = 0x20;
        const INFO_LINK        = 0x40;
        const LINK_ORDER       = 0x80;
        const OS_NONCONFORMING = 0x100;
        const GROUP            = 0x200;
        const TLS              = 0x400;
        const COMPRESSED       = 0x800;
    }
}

/// The 40-byte ELF32 section header (`Elf32_Shdr`).
#[derive(Clone, Copy, Debug)]
pub struct SectionHeader {
    pub name_offset: u32,
    pub ty: SectionType,
    pub flags: SectionFlags,
    pub addr: u32,
    pub offset: u32,
    pub size: u32,
    pub link: u32,
    pub info: u32,
    pub addralign: u32,
    pub entsize: u32,
}

impl SectionHeader {
    pub const SIZE: usize = 40;

    pub fn parse(cursor: &mut Cursor) -> Result<Self, Error> {
        let map_short = |what: &'static str| move |_| Error::MalformedElf(format!("truncated section header {what}"));

        let name_offset = cursor.read_u32().map_err(map_short("sh_name"))?;
        let ty = SectionType::from(cursor.read_u32().map_err(map_short("sh_type"))?);
        let flags = SectionFlags::from_bits_retain(cursor.read_u32().map_err(map_short("sh_flags"))?);
        let addr = cursor.read_u32().map_err(map_short("sh_addr"))?;
        let offset = cursor.read_u32().map_err(map_short("sh_offset"))?;
        let size = cursor.read_u32().map_err(map_short("sh_size"))?;
        let link = cursor.read_u32().map_err(map_short("sh_link"))?;
        let info = cursor.read_u32().map_err(map_short("sh_info"))?;
        let addralign = cursor.read_u32().map_err(map_short("sh_addralign"))?;
        let entsize = cursor.read_u32().map_err(map_short("sh_entsize"))?;

        Ok(SectionHeader { name_offset, ty, flags, addr, offset, size, link, info, addralign, entsize })
    }
}
