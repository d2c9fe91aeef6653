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

    video.rs

    Display memory shared between the emulation thread and the renderer.

    The MZ-80K shows 40x25 characters out of a 1K video RAM. Below it the
    frontend draws five extra rows of emulator status text. The renderer runs
    on its own thread and reads both buffers plus the vertical blank flag while
    the processor writes them. Every field is a single byte or flag, so plain
    atomics are enough and no lock is taken on either side.
*/

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

pub const DISPLAY_COLUMNS: usize = 40;
pub const DISPLAY_ROWS: usize = 25;
pub const VRAM_SIZE: usize = 1024;
pub const STATUS_ROWS: usize = 5;
pub const STATUS_SIZE: usize = DISPLAY_COLUMNS * STATUS_ROWS;

pub struct FrameBuffer {
    vram: Box<[AtomicU8]>,
    status: Box<[AtomicU8]>,
    vblank: AtomicBool,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            vram: (0..VRAM_SIZE).map(|_| AtomicU8::new(0)).collect(),
            status: (0..STATUS_SIZE).map(|_| AtomicU8::new(0)).collect(),
            vblank: AtomicBool::new(false),
        }
    }

    /// Read a byte of video RAM. Offsets wrap at the 1K boundary.
    #[inline]
    pub fn read_vram(&self, offset: usize) -> u8 {
        self.vram[offset % VRAM_SIZE].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn write_vram(&self, offset: usize, data: u8) {
        self.vram[offset % VRAM_SIZE].store(data, Ordering::Relaxed);
    }

    pub fn vram_snapshot(&self) -> Vec<u8> {
        self.vram.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }

    #[inline]
    pub fn read_status(&self, offset: usize) -> u8 {
        self.status[offset % STATUS_SIZE].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn write_status(&self, offset: usize, data: u8) {
        self.status[offset % STATUS_SIZE].store(data, Ordering::Relaxed);
    }

    pub fn status_snapshot(&self) -> Vec<u8> {
        self.status.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }

    /// Blank one status row and write display codes into it from column 0.
    /// Anything past 40 columns is dropped.
    pub fn set_status_row(&self, row: usize, codes: &[u8]) {
        let base = (row % STATUS_ROWS) * DISPLAY_COLUMNS;
        for col in 0..DISPLAY_COLUMNS {
            let code = codes.get(col).copied().unwrap_or(0);
            self.status[base + col].store(code, Ordering::Relaxed);
        }
    }

    pub fn clear_status(&self) {
        for b in self.status.iter() {
            b.store(0, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn vblank(&self) -> bool {
        self.vblank.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_vblank(&self, state: bool) {
        self.vblank.store(state, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn status_row_is_padded_and_isolated() {
        let fb = FrameBuffer::new();
        fb.set_status_row(0, &[0x01; DISPLAY_COLUMNS]);
        fb.set_status_row(1, &[0x0e, 0x85]);

        let status = fb.status_snapshot();
        assert!(status[..DISPLAY_COLUMNS].iter().all(|&c| c == 0x01));
        assert_eq!(&status[40..43], &[0x0e, 0x85, 0x00]);

        fb.clear_status();
        assert!(fb.status_snapshot().iter().all(|&c| c == 0));
    }

    #[test]
    fn renderer_thread_sees_writes() {
        let fb = Arc::new(FrameBuffer::new());
        fb.write_vram(0x3E7, 0x41);
        fb.set_vblank(true);

        let renderer = {
            let fb = fb.clone();
            thread::spawn(move || (fb.read_vram(0x3E7), fb.vblank()))
        };
        assert_eq!(renderer.join().unwrap(), (0x41, true));
    }
}
