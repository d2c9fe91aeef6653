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

    bus::mod.rs

    Implements the MZ-80K's system bus.

    The Z80 has a separate I/O space but the MZ-80K doesn't use it. Every
    peripheral is memory mapped into the top of the 64K address space:

        0000-0FFF  monitor ROM
        1000-CFFF  user RAM
        D000-D3FF  video RAM
        D400-DFFF  video control (unused)
        E000-E003  8255 PPI
        E004-E007  8253 PIT
        E008       sound enable
        E009-EFFF  unused
        F000-FFFF  floppy disk ROM (not fitted)

    Reads from anything unmapped return 0xC7, the opcode for RST 00.
*/

pub mod io;
pub mod memory;

use std::sync::Arc;

use fxhash::FxHashMap;
use strum_macros::{Display, EnumIter};

use crate::{
    clock::HostClock,
    coreconfig::CoreConfig,
    devices::{pit::Pit, ppi::Ppi},
    interrupt::InterruptLine,
    sound::ToneGenerator,
    video::FrameBuffer,
};

pub use memory::RomError;

pub const NO_IO_BYTE: u8 = 0xC7; // RST 00, read from any unmapped address.

pub const MONITOR_ROM_BASE: u16 = 0x0000;
pub const MONITOR_ROM_SIZE: usize = 0x1000;
pub const USER_RAM_BASE: u16 = 0x1000;
pub const USER_RAM_SIZE: usize = 0xC000;
pub const VIDEO_RAM_BASE: u16 = 0xD000;
pub const VIDEO_CONTROL_BASE: u16 = 0xD400;
pub const IO_BASE: u16 = 0xE000;
pub const FLOPPY_ROM_BASE: u16 = 0xF000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumIter)]
pub enum MemRegion {
    MonitorRom,
    UserRam,
    VideoRam,
    VideoControl,
    Ppi,
    Pit,
    SoundEnable,
    Unmapped,
    FloppyRom,
}

/// Resolve an address to the single region that services it.
pub fn decode_address(address: u16) -> MemRegion {
    match address {
        0x0000..=0x0FFF => MemRegion::MonitorRom,
        0x1000..=0xCFFF => MemRegion::UserRam,
        0xD000..=0xD3FF => MemRegion::VideoRam,
        0xD400..=0xDFFF => MemRegion::VideoControl,
        0xE000..=0xE003 => MemRegion::Ppi,
        0xE004..=0xE007 => MemRegion::Pit,
        0xE008 => MemRegion::SoundEnable,
        0xE009..=0xEFFF => MemRegion::Unmapped,
        0xF000..=0xFFFF => MemRegion::FloppyRom,
    }
}

/// The processor side of the bus. A Z80 core calls these for every memory
/// access, every IN/OUT instruction, and to poll for interrupts.
pub trait CpuBus {
    fn mem_read(&mut self, address: u16) -> u8;
    fn mem_write(&mut self, address: u16, data: u8);
    fn port_in(&mut self, port: u16) -> u8;
    fn port_out(&mut self, port: u16, data: u8);
    /// Collect a pending interrupt request and its data byte.
    fn take_interrupt(&mut self) -> Option<u8>;
}

pub trait IoDevice {
    /// Read a byte from the specified port. The interrupt line is provided for
    /// devices that signal the CPU as a side effect of being read.
    /// The default implementation returns NO_IO_BYTE (0xC7).
    fn read_u8(&mut self, _port: u16, _irq: &mut InterruptLine) -> u8 {
        NO_IO_BYTE
    }

    /// Write a byte to the specified port.
    /// The default implementation does nothing.
    fn write_u8(&mut self, _port: u16, _data: u8) {}

    /// Return a list of ports the device should service, comprised of a vector of tuples of
    /// (port description, port number).
    fn port_list(&self) -> Vec<(String, u16)>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IoDeviceType {
    Ppi,
    Pit,
}

#[derive(Clone, Debug, Default)]
pub struct IoDeviceStats {
    pub last_read: u8,
    pub last_write: u8,
    pub reads: usize,
    pub writes: usize,
}

impl IoDeviceStats {
    pub fn one_read(byte: u8) -> Self {
        Self {
            last_read: byte,
            reads: 1,
            ..Default::default()
        }
    }

    pub fn one_write(byte: u8) -> Self {
        Self {
            last_write: byte,
            writes: 1,
            ..Default::default()
        }
    }
}

// Main bus struct.
// The bus owns the memories and both peripheral chips, so a single &mut to
// the bus is all the CPU core needs. The frame buffer is shared with the
// renderer.
pub struct BusInterface {
    rom: Vec<u8>,
    ram: Vec<u8>,
    frame: Arc<FrameBuffer>,
    ppi: Ppi,
    pit: Pit,
    irq: InterruptLine,

    io_map: FxHashMap<u16, IoDeviceType>,
    io_desc_map: FxHashMap<u16, String>,
    io_stats: FxHashMap<u16, IoDeviceStats>,
}

#[macro_export]
macro_rules! add_io_device {
    ($self:expr, $device:expr, $device_type:expr) => {{
        let port_list = $device.port_list();
        $self.io_desc_map.extend(port_list.iter().map(|p| (p.1, p.0.clone())));
        $self.io_map.extend(port_list.into_iter().map(|p| (p.1, $device_type)));
    }};
}

impl BusInterface {
    pub fn new(config: &CoreConfig, clock: Box<dyn HostClock>, tone: ToneGenerator, frame: Arc<FrameBuffer>) -> Self {
        let mut bus = Self {
            rom: vec![NO_IO_BYTE; MONITOR_ROM_SIZE],
            ram: vec![0; USER_RAM_SIZE],
            frame: frame.clone(),
            ppi: Ppi::new(config, frame),
            pit: Pit::new(config, clock, tone),
            irq: InterruptLine::new(),
            io_map: FxHashMap::default(),
            io_desc_map: FxHashMap::default(),
            io_stats: FxHashMap::default(),
        };

        add_io_device!(bus, bus.ppi, IoDeviceType::Ppi);
        add_io_device!(bus, bus.pit, IoDeviceType::Pit);
        bus
    }

    #[inline]
    pub fn frame(&self) -> &Arc<FrameBuffer> {
        &self.frame
    }

    #[inline]
    pub fn ppi(&self) -> &Ppi {
        &self.ppi
    }

    #[inline]
    pub fn ppi_mut(&mut self) -> &mut Ppi {
        &mut self.ppi
    }

    #[inline]
    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    #[inline]
    pub fn pit_mut(&mut self) -> &mut Pit {
        &mut self.pit
    }

    pub fn interrupt_line(&self) -> &InterruptLine {
        &self.irq
    }

    pub fn port_description(&self, port: u16) -> Option<&str> {
        self.io_desc_map.get(&port).map(|s| s.as_str())
    }

    pub fn io_stats(&self) -> &FxHashMap<u16, IoDeviceStats> {
        &self.io_stats
    }

    pub fn reset_io_stats(&mut self) {
        self.io_stats.clear();
    }
}

impl CpuBus for BusInterface {
    fn mem_read(&mut self, address: u16) -> u8 {
        self.read_u8(address)
    }

    fn mem_write(&mut self, address: u16, data: u8) {
        self.write_u8(address, data)
    }

    fn port_in(&mut self, port: u16) -> u8 {
        self.z80_port_in(port)
    }

    fn port_out(&mut self, port: u16, data: u8) {
        self.z80_port_out(port, data)
    }

    fn take_interrupt(&mut self) -> Option<u8> {
        self.irq.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use strum::IntoEnumIterator;

    pub(crate) fn test_bus() -> BusInterface {
        BusInterface::new(
            &CoreConfig::default(),
            Box::new(ManualClock::new()),
            ToneGenerator::silent(),
            Arc::new(FrameBuffer::new()),
        )
    }

    #[test]
    fn decode_boundaries() {
        let cases = [
            (0x0000, MemRegion::MonitorRom),
            (0x0FFF, MemRegion::MonitorRom),
            (0x1000, MemRegion::UserRam),
            (0xCFFF, MemRegion::UserRam),
            (0xD000, MemRegion::VideoRam),
            (0xD3FF, MemRegion::VideoRam),
            (0xD400, MemRegion::VideoControl),
            (0xDFFF, MemRegion::VideoControl),
            (0xE000, MemRegion::Ppi),
            (0xE003, MemRegion::Ppi),
            (0xE004, MemRegion::Pit),
            (0xE007, MemRegion::Pit),
            (0xE008, MemRegion::SoundEnable),
            (0xE009, MemRegion::Unmapped),
            (0xEFFF, MemRegion::Unmapped),
            (0xF000, MemRegion::FloppyRom),
            (0xFFFF, MemRegion::FloppyRom),
        ];
        for (address, region) in cases {
            assert_eq!(decode_address(address), region, "address {:04X}", address);
        }
    }

    #[test]
    fn every_region_is_reachable() {
        let mut seen: Vec<MemRegion> = (0..=0xFFFFu16).map(decode_address).collect();
        seen.dedup();
        assert_eq!(seen, MemRegion::iter().collect::<Vec<_>>());
    }

    #[test]
    fn io_map_covers_peripheral_ports() {
        let bus = test_bus();
        for port in 0xE000..=0xE008u16 {
            assert!(bus.port_description(port).is_some(), "port {:04X}", port);
        }
        assert_eq!(bus.port_description(0xE009), None);
    }
}
