//! Positioned reads and writes over a shared file handle.

use geoshape_core::error::{AccessError, Error, FormatError, PermissionError};
use geoshape_core::OpenMode;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub(crate) fn open_file(path: &Path, mode: OpenMode) -> Result<File, Error> {
    OpenOptions::new()
        .read(true)
        .write(mode.is_writable())
        .open(path)
        .map_err(|e| Error::from_open(e, path))
}

pub(crate) fn read_at(mut file: &File, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}

pub(crate) fn write_at(mut file: &File, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)
}

/// Maps a short read onto `FormatError::Truncated`.
pub(crate) fn eof_as_truncated(err: std::io::Error, at: u64, needed: usize) -> Error {
    match err.kind() {
        std::io::ErrorKind::UnexpectedEof => FormatError::Truncated { at, needed }.into(),
        _ => Error::Io(err),
    }
}

/// Path of a companion file (`.shx`, `.dbf`), matching the extension's case.
pub(crate) fn sibling_path(path: &Path, ext: &str) -> PathBuf {
    let upper = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_uppercase()));
    if upper {
        path.with_extension(ext.to_ascii_uppercase())
    } else {
        path.with_extension(ext)
    }
}

pub(crate) fn not_open(path: &Path) -> Error {
    AccessError::NotOpen {
        path: path.to_path_buf(),
    }
    .into()
}

pub(crate) fn ensure_writable(path: &Path, mode: OpenMode) -> Result<(), Error> {
    if mode.is_writable() {
        Ok(())
    } else {
        Err(PermissionError::ReadOnly {
            path: path.to_path_buf(),
        }
        .into())
    }
}

pub(crate) fn check_id(id: u32, count: u32) -> Result<(), Error> {
    if id == 0 || id > count {
        return Err(AccessError::IndexOutOfRange {
            id: u64::from(id),
            count: u64::from(count),
        }
        .into());
    }
    Ok(())
}
