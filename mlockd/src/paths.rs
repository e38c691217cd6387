//! Reading input paths from a newline-delimited list file.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

/// Read one path per line from `list`.
///
/// Line terminators (`\n` or `\r\n`) are stripped and blank lines skipped.
/// Paths are taken as raw bytes, so non-UTF-8 names survive.
pub fn read_path_list(list: &Path) -> io::Result<Vec<PathBuf>> {
    let reader = BufReader::new(File::open(list)?);
    let mut paths = Vec::new();

    for line in reader.split(b'\n') {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }
        paths.push(PathBuf::from(OsString::from_vec(line)));
    }
    Ok(paths)
}
