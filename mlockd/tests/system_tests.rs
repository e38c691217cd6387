//! End-to-end runs against real files with the mmap/mlock backend.
//!
//! `mlock` is subject to RLIMIT_MEMLOCK; when the environment forbids it
//! the run must still fail cleanly with balanced counters.

use mlockd::lifecycle::{Disposition, Options, run};
use mlockd::{Accounting, SystemMemory};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_files(dir: &TempDir, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.path().join(format!("table_{i}.bin"));
            fs::write(&path, vec![i as u8 + 1; 256]).unwrap();
            path
        })
        .collect()
}

#[test]
fn real_files_pin_and_release() {
    let tmp = TempDir::new().unwrap();
    let files = write_files(&tmp, 3);
    let options = Options {
        lazy: false,
        list_file: None,
        files,
        max_files: None,
    };

    let summary = run(&mut SystemMemory, &options, None, || Ok(()));

    match summary.disposition {
        Disposition::Success => assert_eq!(
            summary.accounting,
            Accounting {
                files_mapped: 3,
                files_locked: 3,
                files_unmapped: 3,
                files_unlocked: 3,
            }
        ),
        Disposition::LoadFailed => {
            eprintln!("mlock not permitted here; checking clean failure only");
            let acct = summary.accounting;
            assert!(acct.verify_unwind().is_ok());
        }
        other => panic!("unexpected disposition {other:?}"),
    }
}

#[test]
fn missing_real_file_fails_in_lazy_mode() {
    let tmp = TempDir::new().unwrap();
    let mut files = write_files(&tmp, 1);
    files.insert(0, tmp.path().join("missing.bin"));
    let options = Options {
        lazy: true,
        list_file: None,
        files,
        max_files: None,
    };

    let summary = run(&mut SystemMemory, &options, None, || Ok(()));

    assert_eq!(summary.disposition, Disposition::LoadFailed);
    assert_eq!(summary.pass.attempted, 2);
    assert!(summary.accounting.verify_unwind().is_ok());
}
