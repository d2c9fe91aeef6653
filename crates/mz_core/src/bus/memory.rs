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

    bus::memory.rs

    Memory routines for [BusInterface].
*/

use thiserror::Error;

use crate::bus::{
    decode_address,
    BusInterface,
    MemRegion,
    MONITOR_ROM_SIZE,
    NO_IO_BYTE,
    USER_RAM_BASE,
    VIDEO_RAM_BASE,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RomError {
    #[error("Monitor ROM image must be 4096 bytes, got {0}.")]
    WrongSize(usize),
}

impl BusInterface {
    /// Read a byte as the CPU would, with any side effects of reading
    /// peripheral registers.
    pub fn read_u8(&mut self, address: u16) -> u8 {
        match decode_address(address) {
            MemRegion::MonitorRom => self.rom[address as usize],
            MemRegion::UserRam => self.ram[(address - USER_RAM_BASE) as usize],
            MemRegion::VideoRam => self.frame.read_vram((address - VIDEO_RAM_BASE) as usize),
            MemRegion::Ppi | MemRegion::Pit | MemRegion::SoundEnable => self.io_read_u8(address),
            region @ (MemRegion::VideoControl | MemRegion::Unmapped | MemRegion::FloppyRom) => {
                log::trace!("Read from {} at {:04X}", region, address);
                NO_IO_BYTE
            }
        }
    }

    pub fn write_u8(&mut self, address: u16, data: u8) {
        match decode_address(address) {
            MemRegion::MonitorRom => {
                log::trace!("Write to monitor ROM ignored: [{:04X}] <- {:02X}", address, data);
            }
            MemRegion::UserRam => self.ram[(address - USER_RAM_BASE) as usize] = data,
            MemRegion::VideoRam => self.frame.write_vram((address - VIDEO_RAM_BASE) as usize, data),
            MemRegion::Ppi | MemRegion::Pit | MemRegion::SoundEnable => self.io_write_u8(address, data),
            region @ (MemRegion::VideoControl | MemRegion::Unmapped | MemRegion::FloppyRom) => {
                log::debug!("Write to {} ignored: [{:04X}] <- {:02X}", region, address, data);
            }
        }
    }

    /// Read a byte without side effects. Peripheral registers read as
    /// NO_IO_BYTE.
    pub fn peek_u8(&self, address: u16) -> u8 {
        match decode_address(address) {
            MemRegion::MonitorRom => self.rom[address as usize],
            MemRegion::UserRam => self.ram[(address - USER_RAM_BASE) as usize],
            MemRegion::VideoRam => self.frame.read_vram((address - VIDEO_RAM_BASE) as usize),
            _ => NO_IO_BYTE,
        }
    }

    pub fn load_monitor_rom(&mut self, rom: &[u8]) -> Result<(), RomError> {
        if rom.len() != MONITOR_ROM_SIZE {
            return Err(RomError::WrongSize(rom.len()));
        }
        self.rom.copy_from_slice(rom);
        log::debug!("Loaded {} byte monitor ROM", rom.len());
        Ok(())
    }

    /// Copy `data` into user RAM at `address`. Anything that would run past
    /// the end of user RAM is dropped. Returns the number of bytes copied.
    pub fn load_ram(&mut self, address: u16, data: &[u8]) -> usize {
        if decode_address(address) != MemRegion::UserRam {
            log::warn!("RAM load address {:04X} is outside user RAM", address);
            return 0;
        }
        let offset = (address - USER_RAM_BASE) as usize;
        let len = data.len().min(self.ram.len() - offset);
        if len < data.len() {
            log::warn!("RAM load truncated from {} to {} bytes", data.len(), len);
        }
        self.ram[offset..offset + len].copy_from_slice(&data[..len]);
        len
    }
}
