//! Recording fake backend shared by the integration tests.
//!
//! Files live in memory, any step can be made to fail per path, and every
//! call is appended to `calls` so tests can check what was attempted and
//! in which order.

#![allow(dead_code)]

use mlockd::MemoryBackend;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// One backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(PathBuf),
    Size(PathBuf),
    Map(PathBuf),
    Pin(PathBuf),
    Unpin(PathBuf),
    Unmap(PathBuf),
}

/// Mapped fake file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRegion {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl AsRef<[u8]> for FakeRegion {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Size,
    Map,
    Pin,
    Unpin,
    Unmap,
}

#[derive(Debug, Default)]
pub struct FakeMemory {
    files: HashMap<PathBuf, Vec<u8>>,
    failures: HashSet<(PathBuf, Step)>,
    pub calls: Vec<Call>,
    pub live_maps: usize,
    pub live_pins: usize,
}

impl FakeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake with `names` present, each holding its own name as contents.
    pub fn with_files(names: &[&str]) -> Self {
        let mut mem = Self::new();
        for name in names {
            mem.add_file(name, name.as_bytes());
        }
        mem
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, bytes: &[u8]) {
        self.files.insert(path.as_ref().to_path_buf(), bytes.to_vec());
    }

    pub fn fail(&mut self, path: impl AsRef<Path>, step: Step) {
        self.failures.insert((path.as_ref().to_path_buf(), step));
    }

    fn fails(&self, path: &Path, step: Step) -> bool {
        self.failures.contains(&(path.to_path_buf(), step))
    }

    /// Paths passed to `open`, in order.
    pub fn opened(&self) -> Vec<PathBuf> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Open(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    /// Calls made for one path, in order.
    pub fn calls_for(&self, path: impl AsRef<Path>) -> Vec<Call> {
        let path = path.as_ref();
        self.calls
            .iter()
            .filter(|c| match c {
                Call::Open(p)
                | Call::Size(p)
                | Call::Map(p)
                | Call::Pin(p)
                | Call::Unpin(p)
                | Call::Unmap(p) => p == path,
            })
            .cloned()
            .collect()
    }
}

impl MemoryBackend for FakeMemory {
    type Handle = PathBuf;
    type Region = FakeRegion;

    fn open(&mut self, path: &Path) -> io::Result<PathBuf> {
        self.calls.push(Call::Open(path.to_path_buf()));
        if self.files.contains_key(path) {
            Ok(path.to_path_buf())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    fn size(&mut self, handle: &PathBuf) -> io::Result<u64> {
        self.calls.push(Call::Size(handle.clone()));
        if self.fails(handle, Step::Size) {
            return Err(io::Error::other("injected stat failure"));
        }
        Ok(self.files[handle].len() as u64)
    }

    fn map(&mut self, handle: PathBuf, len: usize) -> io::Result<FakeRegion> {
        self.calls.push(Call::Map(handle.clone()));
        if self.fails(&handle, Step::Map) {
            return Err(io::Error::other("injected mmap failure"));
        }
        let bytes = self.files[&handle][..len].to_vec();
        self.live_maps += 1;
        Ok(FakeRegion {
            path: handle,
            bytes,
        })
    }

    fn pin(&mut self, region: &FakeRegion) -> io::Result<()> {
        self.calls.push(Call::Pin(region.path.clone()));
        if self.fails(&region.path, Step::Pin) {
            return Err(io::Error::other("injected mlock failure"));
        }
        self.live_pins += 1;
        Ok(())
    }

    fn unpin(&mut self, region: &FakeRegion) -> io::Result<()> {
        self.calls.push(Call::Unpin(region.path.clone()));
        if self.fails(&region.path, Step::Unpin) {
            return Err(io::Error::other("injected munlock failure"));
        }
        self.live_pins -= 1;
        Ok(())
    }

    fn unmap(&mut self, region: FakeRegion) -> io::Result<()> {
        self.calls.push(Call::Unmap(region.path.clone()));
        if self.fails(&region.path, Step::Unmap) {
            return Err(io::Error::other("injected munmap failure"));
        }
        self.live_maps -= 1;
        Ok(())
    }
}
