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

    interrupt.rs

    The maskable interrupt line from the peripherals to the processor.
*/

/// Data byte placed on the bus when the PIT countdown raises /INT.
pub const PIT_INTERRUPT_DATA: u8 = 0x01;

/// Edge-triggered interrupt request line.
///
/// A device raises the line once; the processor emulator collects the request
/// with `take()`, which clears it. Nothing re-asserts it on its own.
#[derive(Debug, Default)]
pub struct InterruptLine {
    pending: Option<u8>,
    raised: u64,
}

impl InterruptLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, data: u8) {
        if let Some(old) = self.pending {
            log::warn!("Interrupt raised with {:02X} while {:02X} still pending", data, old);
        }
        log::debug!("Raising interrupt, data: {:02X}", data);
        self.pending = Some(data);
        self.raised += 1;
    }

    #[inline]
    pub fn take(&mut self) -> Option<u8> {
        self.pending.take()
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Total number of times the line has been raised.
    pub fn raised_count(&self) -> u64 {
        self.raised
    }
}
