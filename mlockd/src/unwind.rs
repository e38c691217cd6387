//! Releasing every acquired pin and mapping.
//!
//! This is the only place resources are released. Records are visited
//! once each, in allocation order; for each one the pin is released before
//! the mapping. Records the loader never filled are skipped.

use crate::accounting::Accounting;
use crate::error::AccountingMismatch;
use crate::memory::MemoryBackend;
use crate::registry::ResourceRegistry;
use tracing::{error, info};

/// What the unwind pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnwindReport {
    /// Records visited.
    pub visited: usize,
    /// Pins released.
    pub unlocked: usize,
    /// Mappings released.
    pub unmapped: usize,
    /// Release calls that returned an error.
    pub failures: usize,
}

/// Release every record of `registry` and check the counters.
///
/// The registry storage is dropped afterwards. Any difference between
/// acquisition and release counts is returned as `AccountingMismatch`.
pub fn unwind<B: MemoryBackend>(
    backend: &mut B,
    mut registry: ResourceRegistry<B::Region>,
    accounting: &mut Accounting,
) -> Result<UnwindReport, AccountingMismatch> {
    let mut report = UnwindReport::default();

    for (index, record) in registry.iter_mut().enumerate() {
        report.visited += 1;

        if record.is_pinned() {
            if let Some(region) = record.mapping() {
                match backend.unpin(region) {
                    Ok(()) => {
                        accounting.record_unlocked();
                        report.unlocked += 1;
                    }
                    Err(e) => {
                        error!("[{}] munlock failed: {}", index, e);
                        report.failures += 1;
                    }
                }
            }
        }

        if record.is_mapped() {
            if let Some(region) = record.reset() {
                match backend.unmap(region) {
                    Ok(()) => {
                        accounting.record_unmapped();
                        report.unmapped += 1;
                    }
                    Err(e) => {
                        error!("[{}] munmap failed: {}", index, e);
                        report.failures += 1;
                    }
                }
            }
        }
    }
    drop(registry);

    if !accounting.is_steady() {
        error!("mismatch between files locked/mapped");
    }
    info!(
        "{}/{} files unlocked ({})",
        accounting.files_unlocked,
        accounting.files_locked,
        ok_or_error(accounting.files_unlocked == accounting.files_locked)
    );
    info!(
        "{}/{} files unmapped ({})",
        accounting.files_unmapped,
        accounting.files_mapped,
        ok_or_error(accounting.files_unmapped == accounting.files_mapped)
    );

    accounting.verify_unwind().map(|()| report).inspect_err(|e| {
        error!("{}", e);
    })
}

fn ok_or_error(ok: bool) -> &'static str {
    if ok { "OK" } else { "ERROR" }
}
