// src/engine/io.rs
//
// I/O operations: Source enum and file loading.

use crate::error::{Result, StylizeError};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Image source - in-memory data or a memory-mapped file
#[derive(Clone, Debug)]
pub enum Source {
    /// In-memory image data
    Memory(Arc<Vec<u8>>),
    /// Memory-mapped file (zero-copy access)
    Mapped(Arc<Mmap>),
}

impl Source {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Source::Memory(Arc::new(bytes.into()))
    }

    /// Memory-map `path`.
    ///
    /// Empty files cannot be mapped on every platform; they are read into
    /// memory instead so the decoder reports them uniformly.
    pub fn map_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.to_string_lossy().into_owned();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StylizeError::file_not_found(display.clone()),
            _ => StylizeError::file_read_failed(display.clone(), e),
        })?;
        let len = file
            .metadata()
            .map_err(|e| StylizeError::file_read_failed(display.clone(), e))?
            .len();
        if len == 0 {
            return Ok(Source::Memory(Arc::new(Vec::new())));
        }

        // SAFETY: the map is read-only and the file is assumed not to be
        // truncated by another process while we hold it.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| StylizeError::mmap_failed(display, e))?;
        Ok(Source::Mapped(Arc::new(mmap)))
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Source::Memory(data) => data.as_slice(),
            Source::Mapped(mmap) => mmap.as_ref(),
        }
    }

    /// Human-readable origin for logs and batch reports.
    pub fn describe(&self) -> String {
        match self {
            Source::Memory(data) => format!("<memory: {} bytes>", data.len()),
            Source::Mapped(mmap) => format!("<mapped: {} bytes>", mmap.len()),
        }
    }
}
