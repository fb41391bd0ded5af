//! Lazy, endian-aware ELF32 container (component C4).
//!
//! [`ElfContainer`] owns the byte source, the parsed header, and every
//! cache described in §3/§4.4 of `SPEC_FULL.md`: section headers,
//! program headers, and per-section/per-program-header content are all
//! materialized on first request and never re-read afterwards.

use std::cell::OnceCell;

use crate::cursor::Cursor;
use crate::endian::Endian;
use crate::header::ident::ElfEndian;
use crate::header::{FileHeader, FileType, ProgramHeader, SectionHeader, SegmentType};
use crate::source::ByteSource;
use crate::Error;

/// An opened ELF32 file or in-memory image.
///
/// Cheap to construct further views from (`section`, `program_header`, ...); expensive work
/// (reading the section table, reading section content) happens lazily and only once.
pub struct ElfContainer<S: ByteSource> {
    source: S,
    endian: Endian,
    header: FileHeader,
    sections: OnceCell<Vec<SectionHeader>>,
    section_content: OnceCell<Vec<OnceCell<Vec<u8>>>>,
    program_headers: OnceCell<Vec<ProgramHeader>>,
    program_header_content: OnceCell<Vec<OnceCell<Vec<u8>>>>,
}

impl<S: ByteSource> ElfContainer<S> {
    /// Reads and validates the 52-byte ELF32 header from `source`. Table contents (sections,
    /// program headers) are not read until first requested.
    pub fn open(source: S) -> Result<Self, Error> {
        let mut raw = [0u8; FileHeader::SIZE];
        source.read_at(0, &mut raw)?;
        let header = FileHeader::parse(&raw)?;

        let endian = Endian::try_from(header.ident.endian)
            .map_err(|_| Error::MalformedElf("invalid EI_DATA byte".into()))?;

        let phtable_extent = u64::from(header.phentsize) * u64::from(header.phnum);
        if u64::from(header.phoff).checked_add(phtable_extent).map_or(true, |end| end > source.len()) {
            return Err(Error::MalformedElf("program header table extends past end of file".into()));
        }
        let shtable_extent = u64::from(header.shentsize) * u64::from(header.shnum);
        if u64::from(header.shoff).checked_add(shtable_extent).map_or(true, |end| end > source.len()) {
            return Err(Error::MalformedElf("section header table extends past end of file".into()));
        }

        Ok(ElfContainer {
            source,
            endian,
            header,
            sections: OnceCell::new(),
            section_content: OnceCell::new(),
            program_headers: OnceCell::new(),
            program_header_content: OnceCell::new(),
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn is_big_endian(&self) -> bool {
        self.header.ident.endian == ElfEndian::Big
    }

    pub fn entry(&self) -> u32 {
        self.header.entry
    }

    pub fn file_type(&self) -> FileType {
        self.header.ty
    }

    fn load_sections(&self) -> Result<Vec<SectionHeader>, Error> {
        let count = self.header.shnum as usize;
        let entsize = self.header.shentsize as usize;
        let mut raw = vec![0u8; entsize * count];
        self.source.read_at(u64::from(self.header.shoff), &mut raw)?;

        let mut sections = Vec::with_capacity(count);
        for i in 0..count {
            let entry = &raw[i * entsize..i * entsize + entsize];
            let mut cursor = Cursor::new(&entry[..SectionHeader::SIZE.min(entry.len())], self.endian);
            sections.push(SectionHeader::parse(&mut cursor)?);
        }
        Ok(sections)
    }

    /// Section headers, materialized and cached on first call.
    pub fn sections(&self) -> Result<&[SectionHeader], Error> {
        if let Some(sections) = self.sections.get() {
            return Ok(sections);
        }
        let sections = self.load_sections()?;
        // OnceCell::set can only fail if another call already won the race; in a single-owner,
        // single-threaded container that never happens, but either way `get` below is correct.
        let _ = self.sections.set(sections);
        Ok(self.sections.get().expect("just initialized"))
    }

    pub fn section_count(&self) -> Result<usize, Error> {
        Ok(self.sections()?.len())
    }

    pub fn section_header(&self, index: usize) -> Result<SectionHeader, Error> {
        self.sections()?
            .get(index)
            .copied()
            .ok_or_else(|| Error::MalformedElf(format!("section index {index} out of range")))
    }

    fn content_cache_for(
        cell: &OnceCell<Vec<OnceCell<Vec<u8>>>>,
        count: usize,
    ) -> &Vec<OnceCell<Vec<u8>>> {
        if let Some(cache) = cell.get() {
            return cache;
        }
        let cache = (0..count).map(|_| OnceCell::new()).collect();
        let _ = cell.set(cache);
        cell.get().expect("just initialized")
    }

    /// Section content, loaded and cached on first call. Length always equals `sh_size`.
    pub fn section_content(&self, index: usize) -> Result<&[u8], Error> {
        let header = self.section_header(index)?;
        let count = self.section_count()?;
        let cache = Self::content_cache_for(&self.section_content, count);
        let cell = cache.get(index).ok_or_else(|| Error::MalformedElf(format!("section index {index} out of range")))?;
        if let Some(buf) = cell.get() {
            return Ok(buf);
        }
        let mut buf = vec![0u8; header.size as usize];
        self.source.read_at(u64::from(header.offset), &mut buf)?;
        let _ = cell.set(buf);
        Ok(cell.get().expect("just initialized"))
    }

    /// Resolves `offset` inside the section-header string table (`sections[e_shstrndx]`).
    pub fn string_at(&self, offset: u32) -> Result<&str, Error> {
        let strtab_index = self.header.shstrndx as usize;
        if strtab_index >= self.section_count()? {
            return Err(Error::MalformedElf("e_shstrndx out of range of section table".into()));
        }
        let content = self.section_content(strtab_index)?;
        let mut cursor = Cursor::new(content, self.endian);
        cursor
            .seek(offset as usize)
            .map_err(|_| Error::MalformedElf(format!("string offset {offset} exceeds string table size")))?;
        cursor
            .read_cstring()
            .map_err(|_| Error::MalformedElf(format!("unterminated or invalid string at offset {offset}")))
    }

    pub fn section_name(&self, index: usize) -> Result<&str, Error> {
        let header = self.section_header(index)?;
        self.string_at(header.name_offset)
    }

    /// Finds the first section whose resolved name equals `name`.
    pub fn section_by_name(&self, name: &str) -> Result<Option<usize>, Error> {
        for i in 0..self.section_count()? {
            if self.section_name(i)? == name {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    fn load_program_headers(&self) -> Result<Vec<ProgramHeader>, Error> {
        let count = self.header.phnum as usize;
        let entsize = self.header.phentsize as usize;
        let mut raw = vec![0u8; entsize * count];
        self.source.read_at(u64::from(self.header.phoff), &mut raw)?;

        let mut headers = Vec::with_capacity(count);
        for i in 0..count {
            let entry = &raw[i * entsize..i * entsize + entsize];
            let mut cursor = Cursor::new(&entry[..ProgramHeader::SIZE.min(entry.len())], self.endian);
            headers.push(ProgramHeader::parse(&mut cursor)?);
        }
        Ok(headers)
    }

    pub fn program_headers(&self) -> Result<&[ProgramHeader], Error> {
        if let Some(headers) = self.program_headers.get() {
            return Ok(headers);
        }
        let headers = self.load_program_headers()?;
        let _ = self.program_headers.set(headers);
        Ok(self.program_headers.get().expect("just initialized"))
    }

    pub fn program_header_count(&self) -> Result<usize, Error> {
        Ok(self.program_headers()?.len())
    }

    pub fn program_header(&self, index: usize) -> Result<ProgramHeader, Error> {
        self.program_headers()?
            .get(index)
            .copied()
            .ok_or_else(|| Error::MalformedElf(format!("program header index {index} out of range")))
    }

    /// Program-header content, loaded and cached on first call. Length always equals `p_memsz`;
    /// bytes `[p_filesz, p_memsz)` are zero-filled rather than read from the file.
    pub fn program_header_content(&self, index: usize) -> Result<&[u8], Error> {
        let header = self.program_header(index)?;
        let count = self.program_header_count()?;
        let cache = Self::content_cache_for(&self.program_header_content, count);
        let cell = cache
            .get(index)
            .ok_or_else(|| Error::MalformedElf(format!("program header index {index} out of range")))?;
        if let Some(buf) = cell.get() {
            return Ok(buf);
        }
        let mut buf = vec![0u8; header.memsz as usize];
        if header.filesz > 0 {
            self.source.read_at(u64::from(header.offset), &mut buf[..header.filesz as usize])?;
        }
        let _ = cell.set(buf);
        Ok(cell.get().expect("just initialized"))
    }

    /// Iterates the notes inside a `PT_NOTE` program header.
    pub fn notes(&self, index: usize) -> Result<NoteIter<'_>, Error> {
        let header = self.program_header(index)?;
        if header.ty != SegmentType::Note {
            return Err(Error::MalformedNote(format!(
                "program header {index} is not PT_NOTE"
            )));
        }
        let content = self.program_header_content(index)?;
        Ok(NoteIter { cursor: Cursor::new(content, self.endian) })
    }
}

impl ProgramHeader {
    /// Whether the loadable segment's virtual address range covers `addr`.
    pub fn contains(&self, addr: u32) -> bool {
        self.ty == SegmentType::Load
            && addr >= self.vaddr
            && u64::from(addr) < u64::from(self.vaddr) + u64::from(self.memsz)
    }
}

/// One entry inside a `PT_NOTE` segment.
#[derive(Debug, Clone, Copy)]
pub struct Note<'a> {
    pub name: &'a str,
    pub ty: u32,
    pub desc: &'a [u8],
}

/// Iterator over the entries of a `PT_NOTE` segment (§4.4).
///
/// Per an explicit Open-Questions decision in `SPEC_FULL.md`, fields are **not** padded to
/// 4-byte boundaries between name and descriptor, matching `gel::elf::NoteIter` byte-for-byte
/// rather than the stricter alignment the ELF standard describes.
pub struct NoteIter<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Iterator for NoteIter<'a> {
    type Item = Result<Note<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.ended() {
            return None;
        }

        let mut read = || -> Result<Note<'a>, Error> {
            let short = |_| Error::MalformedNote("short read in note header".into());
            let namesz = self.cursor.read_u32().map_err(short)?;
            let descsz = self.cursor.read_u32().map_err(short)?;
            let ty = self.cursor.read_u32().map_err(short)?;

            let name_bytes = self
                .cursor
                .read_bytes(namesz as usize)
                .map_err(|_| Error::MalformedNote("note name overruns segment".into()))?;
            let name = core::str::from_utf8(name_bytes)
                .map(|s| s.trim_end_matches('\0'))
                .map_err(|_| Error::MalformedNote("note name is not valid UTF-8".into()))?;
            let desc = self
                .cursor
                .read_bytes(descsz as usize)
                .map_err(|_| Error::MalformedNote("note descriptor overruns segment".into()))?;

            Ok(Note { name, ty, desc })
        };

        Some(read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ident::ElfIdent;

    fn le_u16(v: u16) -> [u8; 2] {
        v.to_le_bytes()
    }
    fn le_u32(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    /// Builds a minimal, valid little-endian ELF32 header followed by caller-supplied section
    /// and program-header tables plus content.
    struct ElfBuilder {
        bytes: Vec<u8>,
    }

    impl ElfBuilder {
        fn new() -> Self {
            ElfBuilder { bytes: Vec::new() }
        }

        fn push(&mut self, bytes: &[u8]) -> u32 {
            let offset = self.bytes.len() as u32;
            self.bytes.extend_from_slice(bytes);
            offset
        }

        fn pad_to(&mut self, offset: u32) {
            while (self.bytes.len() as u32) < offset {
                self.bytes.push(0);
            }
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = vec![0x7F, b'E', b'L', b'X'];
        bytes.resize(FileHeader::SIZE, 0);
        let err = ElfContainer::open(bytes).unwrap_err();
        assert!(matches!(err, Error::NotElf));
    }

    #[test]
    fn rejects_elf64_class() {
        let mut bytes = vec![0x7F, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        bytes.resize(FileHeader::SIZE, 0);
        let err = ElfContainer::open(bytes).unwrap_err();
        assert!(matches!(err, Error::UnsupportedClass));
    }

    #[test]
    fn rejects_short_file() {
        let bytes = vec![0x7F, b'E', b'L', b'F'];
        let err = ElfContainer::open(bytes).unwrap_err();
        assert!(matches!(err, Error::Io));
    }

    /// End-to-end scenario 1: a `.text` section plus one loadable program header whose memsz
    /// exceeds filesz.
    #[test]
    fn section_and_program_header_content_scenario() {
        let mut b = ElfBuilder::new();
        b.pad_to(FileHeader::SIZE as u32);

        // section content for section 1 (".text") and the shstrtab (section 2).
        let text_off = b.push(&[0xAAu8; 0x10]);
        let strtab_off = b.push(b"\0.text\0.shstrtab\0");

        // section header table: [NULL, .text, .shstrtab]
        let shoff = b.bytes.len() as u32;
        // NULL section
        b.push(&[0u8; SectionHeader::SIZE]);
        // .text: name offset 1, type PROGBITS(1), flags ALLOC|EXEC, addr 0x1000, offset, size
        b.push(&le_u32(1)); // sh_name
        b.push(&le_u32(1)); // sh_type PROGBITS
        b.push(&le_u32(0x6)); // sh_flags ALLOC|EXEC
        b.push(&le_u32(0x1000)); // sh_addr
        b.push(&le_u32(text_off)); // sh_offset
        b.push(&le_u32(0x10)); // sh_size
        b.push(&le_u32(0)); // sh_link
        b.push(&le_u32(0)); // sh_info
        b.push(&le_u32(1)); // sh_addralign
        b.push(&le_u32(0)); // sh_entsize
        // .shstrtab: name offset 7
        b.push(&le_u32(7));
        b.push(&le_u32(3)); // STRTAB
        b.push(&le_u32(0));
        b.push(&le_u32(0));
        b.push(&le_u32(strtab_off));
        b.push(&le_u32(17));
        b.push(&le_u32(0));
        b.push(&le_u32(0));
        b.push(&le_u32(1));
        b.push(&le_u32(0));

        // program header table: one PT_LOAD, filesz=0x10 memsz=0x20
        let phoff = b.bytes.len() as u32;
        b.push(&le_u32(1)); // p_type LOAD
        b.push(&le_u32(text_off)); // p_offset
        b.push(&le_u32(0x1000)); // p_vaddr
        b.push(&le_u32(0x1000)); // p_paddr
        b.push(&le_u32(0x10)); // p_filesz
        b.push(&le_u32(0x20)); // p_memsz
        b.push(&le_u32(0x5)); // p_flags R|X
        b.push(&le_u32(0x1000)); // p_align

        // fill in the ELF header now that offsets are known
        let mut header = vec![0u8; FileHeader::SIZE];
        header[0..4].copy_from_slice(&ElfIdent::MAGIC);
        header[4] = 1; // class32
        header[5] = 1; // little endian
        header[6] = 1; // version
        header[16..18].copy_from_slice(&le_u16(2)); // e_type EXEC
        header[18..20].copy_from_slice(&le_u16(0)); // e_machine
        header[20..24].copy_from_slice(&le_u32(1)); // e_version
        header[24..28].copy_from_slice(&le_u32(0)); // e_entry
        header[28..32].copy_from_slice(&le_u32(phoff));
        header[32..36].copy_from_slice(&le_u32(shoff));
        header[36..40].copy_from_slice(&le_u32(0)); // e_flags
        header[40..42].copy_from_slice(&le_u16(FileHeader::SIZE as u16));
        header[42..44].copy_from_slice(&le_u16(ProgramHeader::SIZE as u16));
        header[44..46].copy_from_slice(&le_u16(1)); // e_phnum
        header[46..48].copy_from_slice(&le_u16(SectionHeader::SIZE as u16));
        header[48..50].copy_from_slice(&le_u16(3)); // e_shnum
        header[50..52].copy_from_slice(&le_u16(2)); // e_shstrndx

        b.bytes[0..FileHeader::SIZE].copy_from_slice(&header);

        let container = ElfContainer::open(b.bytes).unwrap();
        assert_eq!(container.section_count().unwrap(), 3);
        assert_eq!(container.program_header_count().unwrap(), 1);

        let text_idx = container.section_by_name(".text").unwrap().unwrap();
        assert_eq!(container.section_content(text_idx).unwrap().len(), 0x10);

        let ph = container.program_header(0).unwrap();
        let content = container.program_header_content(0).unwrap();
        assert_eq!(content.len(), 0x20);
        assert_eq!(&content[0..0x10], &[0xAAu8; 0x10]);
        assert!(content[0x10..0x20].iter().all(|&b| b == 0));
        assert!(ph.contains(0x1000));
        assert!(!ph.contains(0x2000));
    }

    /// End-to-end scenario 2: a single PT_NOTE entry, `name="GNU\0"`, `type=1`, `desc=[0,1,2,3]`.
    #[test]
    fn note_iteration_scenario() {
        let mut content = Vec::new();
        content.extend_from_slice(&le_u32(4)); // namesz
        content.extend_from_slice(&le_u32(4)); // descsz
        content.extend_from_slice(&le_u32(1)); // type
        content.extend_from_slice(b"GNU\0");
        content.extend_from_slice(&[0, 1, 2, 3]);

        let mut cursor = Cursor::new(&content, Endian::Little);
        let mut iter = NoteIter { cursor: cursor.clone() };
        let note = iter.next().unwrap().unwrap();
        assert_eq!(note.name, "GNU");
        assert_eq!(note.ty, 1);
        assert_eq!(note.desc, &[0, 1, 2, 3]);
        assert!(iter.next().is_none());
        let _ = cursor.ended();
    }
}
