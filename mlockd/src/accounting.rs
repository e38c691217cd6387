//! Acquisition and release counters.
//!
//! One `Accounting` value is threaded through the load pass and the unwind
//! pass of a single instance. After a background split each instance has
//! its own.

use crate::error::AccountingMismatch;

/// Monotonic counts of successful map/pin/unmap/unpin operations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Accounting {
    /// Successful mappings that were also pinned.
    pub files_mapped: u64,
    /// Successful pins.
    pub files_locked: u64,
    /// Mappings released during unwind.
    pub files_unmapped: u64,
    /// Pins released during unwind.
    pub files_unlocked: u64,
}

impl Accounting {
    /// Fresh counters, all zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A file was mapped and pinned.
    ///
    /// A mapping whose pin failed is rolled back by the loader and never
    /// counted.
    pub fn record_loaded(&mut self) {
        self.files_mapped += 1;
        self.files_locked += 1;
    }

    /// A pin was released.
    pub fn record_unlocked(&mut self) {
        self.files_unlocked += 1;
    }

    /// A mapping was released.
    pub fn record_unmapped(&mut self) {
        self.files_unmapped += 1;
    }

    /// Every mapped file is also locked.
    pub fn is_steady(&self) -> bool {
        self.files_locked == self.files_mapped
    }

    /// Check release counts against acquisition counts.
    pub fn verify_unwind(&self) -> Result<(), AccountingMismatch> {
        if self.files_unlocked == self.files_locked
            && self.files_unmapped == self.files_mapped
            && self.is_steady()
        {
            Ok(())
        } else {
            Err(AccountingMismatch {
                mapped: self.files_mapped,
                locked: self.files_locked,
                unmapped: self.files_unmapped,
                unlocked: self.files_unlocked,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_counters_verify() {
        let mut acct = Accounting::new();
        for _ in 0..3 {
            acct.record_loaded();
        }
        assert!(acct.is_steady());
        for _ in 0..3 {
            acct.record_unlocked();
            acct.record_unmapped();
        }
        assert_eq!(acct.verify_unwind(), Ok(()));
    }

    #[test]
    fn missing_unlock_is_mismatch() {
        let mut acct = Accounting::new();
        acct.record_loaded();
        acct.record_loaded();
        acct.record_unlocked();
        acct.record_unmapped();
        acct.record_unmapped();

        let err = acct.verify_unwind().unwrap_err();
        assert_eq!(err.locked, 2);
        assert_eq!(err.unlocked, 1);
        assert_eq!(err.unmapped, 2);
    }

    #[test]
    fn nothing_loaded_verifies() {
        assert!(Accounting::new().verify_unwind().is_ok());
    }
}
