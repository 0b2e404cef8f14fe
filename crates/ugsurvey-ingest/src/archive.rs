//! Moving handled source files out of the incoming directory

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Move `src` into `dir`, keeping its file name.
///
/// An existing target is never overwritten: the new name gets a UTC
/// timestamp suffix (`name.20250101T120000.csv`), then a counter.
pub fn move_into(src: &Path, dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let name = src
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?;
    let mut target = dir.join(name);
    if target.exists() {
        target = free_name(dir, src)?;
    }
    match fs::rename(src, &target) {
        Ok(()) => Ok(target),
        // Different filesystem: fall back to copy + remove.
        Err(_) => {
            fs::copy(src, &target)?;
            fs::remove_file(src)?;
            Ok(target)
        }
    }
}

fn free_name(dir: &Path, src: &Path) -> io::Result<PathBuf> {
    let stem = src
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let ext = src
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let ts = chrono::Utc::now().format("%Y%m%dT%H%M%S");
    (0..1000)
        .map(|n| {
            let suffix = if n == 0 {
                ts.to_string()
            } else {
                format!("{ts}-{n}")
            };
            dir.join(format!("{stem}.{suffix}{ext}"))
        })
        .find(|p| !p.exists())
        .ok_or_else(|| io::Error::new(io::ErrorKind::AlreadyExists, "no free archive name"))
}
