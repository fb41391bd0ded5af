//! Random-access byte source (component C1).
//!
//! A single seek-and-read primitive that every higher component reads
//! through. Offsets are widened to `u64` (see §9 Open Questions in
//! `SPEC_FULL.md`) even though every on-disk ELF32 field that names an
//! offset is itself a 32-bit value.

use crate::Error;

/// Fills `buf` with exactly `buf.len()` bytes read from absolute offset `offset`. Fails with
/// [`Error::Io`] if fewer bytes were available; there is no partial-success case.
pub trait ByteSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error>;

    /// Total length of the underlying data, used for header/table bounds checks.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSource for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        let start = usize::try_from(offset).map_err(|_| Error::Io)?;
        let end = start.checked_add(buf.len()).ok_or(Error::Io)?;
        let slice = self.get(start..end).ok_or(Error::Io)?;
        buf.copy_from_slice(slice);
        Ok(())
    }

    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }
}

impl ByteSource for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.as_slice().read_at(offset, buf)
    }

    fn len(&self) -> u64 {
        <[u8]>::len(self.as_slice()) as u64
    }
}

impl<'a> ByteSource for &'a [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        (**self).read_at(offset, buf)
    }

    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }
}

#[cfg(feature = "std")]
mod file {
    use super::ByteSource;
    use crate::Error;
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom};
    use std::path::Path;
    use std::sync::Mutex;

    /// A [`ByteSource`] backed by an open file, read with positioned `seek` + `read_exact`.
    ///
    /// The seek cursor is interior-mutable state private to this type (guarded by a `Mutex` so
    /// the type stays `Sync`); callers only ever see the stateless `read_at` contract.
    pub struct FileSource {
        file: Mutex<File>,
        len: u64,
    }

    impl FileSource {
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
            let file = File::open(path)?;
            let len = file.metadata()?.len();
            Ok(FileSource { file: Mutex::new(file), len })
        }
    }

    impl ByteSource for FileSource {
        fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
            let mut file = self.file.lock().map_err(|_| Error::Io)?;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(buf)?;
            Ok(())
        }

        fn len(&self) -> u64 {
            self.len
        }
    }
}

#[cfg(feature = "std")]
pub use file::FileSource;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_reads_in_bounds() {
        let data = [1u8, 2, 3, 4, 5];
        let mut buf = [0u8; 2];
        data.as_slice().read_at(1, &mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
    }

    #[test]
    fn slice_source_rejects_short_read() {
        let data = [1u8, 2, 3];
        let mut buf = [0u8; 4];
        assert!(data.as_slice().read_at(0, &mut buf).is_err());
    }

    #[test]
    fn vec_source_matches_slice_source() {
        let data = vec![9u8, 8, 7, 6];
        let mut buf = [0u8; 2];
        data.read_at(2, &mut buf).unwrap();
        assert_eq!(buf, [7, 6]);
    }
}
