/*
    MZ-Pico
    Sharp MZ-80K peripheral emulation

    Copyright 2024-2026 The MZ-Pico Authors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    tape_manager.rs

    Discover tape images in the tape directory and provide an interface for
    enumerating and loading them.
*/

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use fxhash::FxHashMap;
use thiserror::Error;

use mz_core::tape::{TapeError, TapeImage};

#[derive(Debug, Error)]
pub enum TapeManagerError {
    #[error("Couldn't read the tape directory {0:?}.")]
    DirNotFound(PathBuf),
    #[error("No tape images found.")]
    NoImages,
    #[error("No tape image with index {0}.")]
    ImageNotFound(usize),
    #[error("Error reading tape image {path:?}: {source}")]
    ImageReadError { path: PathBuf, source: TapeError },
}

pub struct TapeImageMeta {
    pub idx:  usize,
    pub name: OsString,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Default)]
pub struct TapeManager {
    image_vec: Vec<TapeImageMeta>,
    image_map: FxHashMap<OsString, usize>,
    current: Option<usize>,
}

impl TapeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every file in `path`, ordered by name. Returns the number of
    /// images found.
    pub fn scan_dir(&mut self, path: &Path) -> Result<usize, TapeManagerError> {
        let dir = fs::read_dir(path).map_err(|_| TapeManagerError::DirNotFound(path.to_path_buf()))?;

        self.image_vec.clear();
        self.image_map.clear();
        self.current = None;

        let mut entries: Vec<(OsString, PathBuf, u64)> = dir
            .flatten()
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                metadata.is_file().then(|| (entry.file_name(), entry.path(), metadata.len()))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, path, size) in entries {
            let idx = self.image_vec.len();
            log::debug!("Found tape image: {:?} size: {}", path, size);
            self.image_map.insert(name.clone(), idx);
            self.image_vec.push(TapeImageMeta { idx, name, path, size });
        }

        log::info!("Found {} tape images in {:?}", self.image_vec.len(), path);
        Ok(self.image_vec.len())
    }

    pub fn count(&self) -> usize {
        self.image_vec.len()
    }

    pub fn image_names(&self) -> Vec<OsString> {
        self.image_vec.iter().map(|meta| meta.name.clone()).collect()
    }

    pub fn find(&self, name: &OsString) -> Option<usize> {
        self.image_map.get(name).copied()
    }

    /// Index of the tape currently in the deck.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// The tape after the current one, wrapping back to the first.
    pub fn next_index(&self) -> Result<usize, TapeManagerError> {
        if self.image_vec.is_empty() {
            return Err(TapeManagerError::NoImages);
        }
        Ok(self.current.map_or(0, |idx| (idx + 1) % self.image_vec.len()))
    }

    /// Read tape image `idx` from disk.
    pub fn load(&self, idx: usize) -> Result<TapeImage, TapeManagerError> {
        let meta = self.image_vec.get(idx).ok_or(TapeManagerError::ImageNotFound(idx))?;
        TapeImage::from_file(&meta.path).map_err(|source| TapeManagerError::ImageReadError {
            path: meta.path.clone(),
            source,
        })
    }

    /// Record that tape `idx` is now in the deck.
    pub fn set_current(&mut self, idx: usize) {
        if idx < self.image_vec.len() {
            self.current = Some(idx);
        }
    }
}
