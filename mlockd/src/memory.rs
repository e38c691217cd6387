//! Mapping and page-locking primitives.
//!
//! The lifecycle code never calls the OS directly. Every step that can fail
//! for a single file goes through [`MemoryBackend`], so the loader and the
//! unwind pass can be exercised against a recording fake in tests.
//! [`SystemMemory`] is the real implementation: a read-only shared mapping
//! from `memmap2`, locked with `mlock(2)`.

use memmap2::{Mmap, MmapOptions};
use nix::sys::mman::{mlock, munlock};
use std::ffi::c_void;
use std::fs::File;
use std::io;
use std::path::Path;
use std::ptr::NonNull;

/// OS operations needed to keep one file resident.
///
/// Each method corresponds to one acquisition or release step. A
/// `Handle` is consumed by [`map`](MemoryBackend::map) whether or not the
/// mapping succeeds; the mapping does not need the handle afterwards.
pub trait MemoryBackend {
    /// Open file handle, released on drop.
    type Handle;
    /// Mapped byte range of a file.
    type Region: AsRef<[u8]>;

    /// Open `path` for reading.
    fn open(&mut self, path: &Path) -> io::Result<Self::Handle>;

    /// Size of the opened file in bytes.
    fn size(&mut self, handle: &Self::Handle) -> io::Result<u64>;

    /// Map `len` bytes of the file read-only, releasing the handle.
    fn map(&mut self, handle: Self::Handle, len: usize) -> io::Result<Self::Region>;

    /// Lock the mapped range in physical memory.
    fn pin(&mut self, region: &Self::Region) -> io::Result<()>;

    /// Undo [`pin`](MemoryBackend::pin).
    fn unpin(&mut self, region: &Self::Region) -> io::Result<()>;

    /// Release the mapping.
    fn unmap(&mut self, region: Self::Region) -> io::Result<()>;
}

/// Real backend: `memmap2` mappings locked with `mlock(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

impl MemoryBackend for SystemMemory {
    type Handle = File;
    type Region = Mmap;

    fn open(&mut self, path: &Path) -> io::Result<File> {
        File::open(path)
    }

    fn size(&mut self, handle: &File) -> io::Result<u64> {
        Ok(handle.metadata()?.len())
    }

    fn map(&mut self, handle: File, len: usize) -> io::Result<Mmap> {
        // SAFETY: the mapping is read-only and only ever read as bytes.
        // A concurrent truncation by another process would fault on access,
        // as for any reader of a shared file mapping.
        let region = unsafe { MmapOptions::new().len(len).map(&handle) };
        drop(handle);
        region
    }

    fn pin(&mut self, region: &Mmap) -> io::Result<()> {
        let addr = region_start(region)?;
        // SAFETY: the range is exactly the live mapping owned by `region`.
        unsafe { mlock(addr, region.len()) }.map_err(io::Error::from)
    }

    fn unpin(&mut self, region: &Mmap) -> io::Result<()> {
        let addr = region_start(region)?;
        // SAFETY: the range is exactly the live mapping owned by `region`.
        unsafe { munlock(addr, region.len()) }.map_err(io::Error::from)
    }

    fn unmap(&mut self, region: Mmap) -> io::Result<()> {
        drop(region);
        Ok(())
    }
}

/// Start address of a mapping, as the `nix::sys::mman` calls take it.
fn region_start(region: &Mmap) -> io::Result<NonNull<c_void>> {
    NonNull::new(region.as_ptr().cast_mut().cast::<c_void>())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "null mapping address"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn open_missing_file_fails() {
        let mut mem = SystemMemory;
        let err = mem
            .open(Path::new("/nonexistent/mlockd/table.bin"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn map_reads_file_contents() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"resident bytes").unwrap();

        let mut mem = SystemMemory;
        let handle = mem.open(file.path()).unwrap();
        let len = mem.size(&handle).unwrap();
        assert_eq!(len, 14);

        let region = mem.map(handle, len as usize).unwrap();
        assert_eq!(region.as_ref(), b"resident bytes");
        mem.unmap(region).unwrap();
    }

    #[test]
    fn pin_and_unpin_small_mapping() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 512]).unwrap();

        let mut mem = SystemMemory;
        let handle = mem.open(file.path()).unwrap();
        let region = mem.map(handle, 512).unwrap();

        // RLIMIT_MEMLOCK may forbid locking in restricted sandboxes.
        match mem.pin(&region) {
            Ok(()) => mem.unpin(&region).unwrap(),
            Err(e) => eprintln!("skipping pin check: mlock not permitted ({e})"),
        }
        mem.unmap(region).unwrap();
    }
}
