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

    bus::io.rs

    IO routines for [BusInterface].
*/

use crate::bus::{BusInterface, IoDevice, IoDeviceStats, IoDeviceType, NO_IO_BYTE};

impl BusInterface {
    /// Read an 8-bit value from a memory mapped peripheral register.
    pub fn io_read_u8(&mut self, port: u16) -> u8 {
        let byte = match self.io_map.get(&port).copied() {
            Some(IoDeviceType::Ppi) => Some(self.ppi.read_u8(port, &mut self.irq)),
            Some(IoDeviceType::Pit) => Some(self.pit.read_u8(port, &mut self.irq)),
            None => {
                log::debug!("Read from unmapped IO port {:04X}", port);
                None
            }
        };

        let byte_val = byte.unwrap_or(NO_IO_BYTE);

        self.io_stats
            .entry(port)
            .and_modify(|e| {
                e.last_read = byte_val;
                e.reads += 1;
            })
            .or_insert(IoDeviceStats::one_read(byte_val));

        byte_val
    }

    /// Write an 8-bit value to a memory mapped peripheral register.
    pub fn io_write_u8(&mut self, port: u16, data: u8) {
        match self.io_map.get(&port).copied() {
            Some(IoDeviceType::Ppi) => self.ppi.write_u8(port, data),
            Some(IoDeviceType::Pit) => self.pit.write_u8(port, data),
            None => {
                log::debug!("Write to unmapped IO port {:04X}: {:02X}", port, data);
            }
        }

        self.io_stats
            .entry(port)
            .and_modify(|e| {
                e.last_write = data;
                e.writes += 1;
            })
            .or_insert(IoDeviceStats::one_write(data));
    }

    /// Z80 IN. Nothing on the MZ-80K decodes the I/O space.
    pub fn z80_port_in(&mut self, port: u16) -> u8 {
        log::debug!("Z80 IN from unused port {:04X}", port);
        0x00
    }

    /// Z80 OUT. Nothing on the MZ-80K decodes the I/O space.
    pub fn z80_port_out(&mut self, port: u16, data: u8) {
        log::debug!("Z80 OUT to unused port {:04X}: {:02X}", port, data);
    }
}
