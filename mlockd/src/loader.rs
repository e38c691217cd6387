//! Loading one file: open, size, map, pin, touch.
//!
//! A pin failure releases the mapping immediately, so a record is never
//! left mapped but unpinned.

use crate::accounting::Accounting;
use crate::error::LoadError;
use crate::memory::MemoryBackend;
use crate::registry::ResourceRecord;
use std::io;
use std::path::Path;
use tracing::{error, info, warn};

/// Outcome of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Registry index of the record.
    pub index: usize,
    /// Bytes mapped and locked.
    pub length: usize,
    /// CRC32 of the file contents, computed by reading every byte.
    pub crc32: u32,
}

/// Acquire the mapping and pin for `path` into `record`.
///
/// `record` must be the freshly allocated slot at `index`. On success the
/// record is mapped and pinned and both acquisition counters are bumped.
/// On failure the record is left empty.
pub fn load_file<B: MemoryBackend>(
    backend: &mut B,
    index: usize,
    record: &mut ResourceRecord<B::Region>,
    path: &Path,
    accounting: &mut Accounting,
) -> Result<LoadReport, LoadError> {
    match acquire(backend, record, path, accounting) {
        Ok((length, crc32)) => {
            info!(
                "[{}] {} loaded ({} bytes, CRC32: {:08X})",
                index,
                path.display(),
                length,
                crc32
            );
            Ok(LoadReport {
                index,
                length,
                crc32,
            })
        }
        Err(e) => {
            error!("[{}] {}", index, e);
            Err(e)
        }
    }
}

fn acquire<B: MemoryBackend>(
    backend: &mut B,
    record: &mut ResourceRecord<B::Region>,
    path: &Path,
    accounting: &mut Accounting,
) -> Result<(usize, u32), LoadError> {
    let handle = backend.open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    // The handle is dropped on every early return below.
    let size = backend.size(&handle).map_err(|source| LoadError::Stat {
        path: path.to_path_buf(),
        source,
    })?;

    let length = mappable_length(size).map_err(|source| LoadError::Map {
        path: path.to_path_buf(),
        source,
    })?;

    let region = backend
        .map(handle, length)
        .map_err(|source| LoadError::Map {
            path: path.to_path_buf(),
            source,
        })?;
    record.set_mapped(region, length);

    let pinned = match record.mapping() {
        Some(region) => backend.pin(region),
        None => Err(io::Error::other("mapping vanished before pin")),
    };
    if let Err(source) = pinned {
        if let Some(region) = record.reset() {
            if let Err(e) = backend.unmap(region) {
                warn!("could not release mapping of {}: {}", path.display(), e);
            }
        }
        return Err(LoadError::Pin {
            path: path.to_path_buf(),
            source,
        });
    }
    record.set_pinned();
    accounting.record_loaded();

    let crc32 = record
        .mapping()
        .map(|region| crc32fast::hash(region.as_ref()))
        .unwrap_or_default();

    Ok((length, crc32))
}

/// Length to map for a file of `size` bytes. Empty files cannot be mapped.
fn mappable_length(size: u64) -> io::Result<usize> {
    if size == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "cannot map an empty file",
        ));
    }
    usize::try_from(size).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("file of {size} bytes exceeds the address space"),
        )
    })
}
