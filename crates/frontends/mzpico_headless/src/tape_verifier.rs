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

    tape_verifier.rs

    Reads a tape back through PPI port C the way the monitor's tape routine
    does, checking the framing and both checksums.

    Everything goes through the CPU's view of the bus, so a passing tape
    proves the whole read path: decoder, PPI and cassette deck.
*/

use std::fmt::{self, Display};

use anyhow::{bail, Error};

use mz_core::{
    bus::CpuBus,
    charset::{TAPE_NAME_END, TAPE_NAME_LEN},
    devices::ppi::{PORTC_MOTOR, PORTC_READ_DATA, PPI_COMMAND_PORT, PPI_PORT_C},
    tape::{HEADER_ATTRIBUTE, HEADER_LENGTH_LSB, HEADER_LENGTH_MSB, HEADER_NAME, TAPE_HEADER_LEN},
};

/// Port C bit set/reset commands for the cassette sense line.
const SENSE_SET: u8 = 0x07;
const SENSE_RESET: u8 = 0x06;

/// A pulse high for longer than this many reads means the deck isn't playing.
const MAX_HIGH_READS: u32 = 3;
/// Shortest leading gap the monitor will lock on to.
const MIN_GAP: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub name: String,
    pub attribute: u8,
    pub body_len: usize,
    pub header_gap: u32,
    pub body_gap: u32,
    pub header_checksum: u16,
    pub body_checksum: u16,
    pub pulses: usize,
}

impl Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' attr {:02X} len {} checksums {:04X}/{:04X} ({} pulses)",
            self.name, self.attribute, self.body_len, self.header_checksum, self.body_checksum, self.pulses
        )
    }
}

/// Start or stop the cassette motor by pulsing the sense line, as the monitor
/// does. Nothing is written if the motor is already in the requested state.
pub fn set_motor(bus: &mut dyn CpuBus, on: bool) {
    let running = bus.mem_read(PPI_PORT_C) & PORTC_MOTOR != 0;
    if running != on {
        bus.mem_write(PPI_COMMAND_PORT, SENSE_RESET);
        bus.mem_write(PPI_COMMAND_PORT, SENSE_SET);
        bus.mem_write(PPI_COMMAND_PORT, SENSE_RESET);
    }
}

struct PulseReader<'a> {
    bus: &'a mut dyn CpuBus,
    pulses: usize,
}

impl<'a> PulseReader<'a> {
    fn new(bus: &'a mut dyn CpuBus) -> Self {
        Self { bus, pulses: 0 }
    }

    /// Sample the read data bit until a pulse ends. Returns true for a long
    /// pulse.
    fn pulse(&mut self) -> Result<bool, Error> {
        let mut high = 0;
        loop {
            if self.bus.mem_read(PPI_PORT_C) & PORTC_READ_DATA != 0 {
                high += 1;
                if high > MAX_HIGH_READS {
                    bail!("Tape read data stuck high after {} pulses", self.pulses);
                }
            }
            else if high > 0 {
                self.pulses += 1;
                return Ok(high > 1);
            }
        }
    }

    fn expect_long(&mut self, what: &str) -> Result<(), Error> {
        if !self.pulse()? {
            bail!("Expected long pulse {} at pulse {}", what, self.pulses);
        }
        Ok(())
    }

    /// Count pulses equal to `level`. The first pulse that differs is
    /// consumed.
    fn run_of(&mut self, level: bool) -> Result<u32, Error> {
        let mut count = 0;
        while self.pulse()? == level {
            count += 1;
        }
        Ok(count)
    }

    /// Skip a gap and tape mark. Returns the gap length.
    fn preamble(&mut self) -> Result<u32, Error> {
        let gap = self.run_of(false)?;
        if gap < MIN_GAP {
            bail!("Gap of {} pulses is too short", gap);
        }
        // The first long pulse of the mark ended the gap.
        let mark_long = 1 + self.run_of(true)?;
        // And the first short pulse of its second half ended that run.
        let mark_short = 1 + self.run_of(false)?;
        if mark_long != mark_short {
            bail!("Unbalanced tape mark: {} long, {} short", mark_long, mark_short);
        }
        // The pulse that ended the mark was the long delimiter.
        log::debug!("Preamble: gap {} mark {}", gap, mark_long + mark_short);
        Ok(gap)
    }

    fn byte(&mut self) -> Result<(u8, u16), Error> {
        self.expect_long("before byte")?;
        let mut byte = 0u8;
        let mut longs = 0;
        for _ in 0..8 {
            let bit = self.pulse()?;
            byte = byte << 1 | bit as u8;
            longs += bit as u16;
        }
        Ok((byte, longs))
    }

    fn block(&mut self, len: usize) -> Result<(Vec<u8>, u16), Error> {
        let mut bytes = Vec::with_capacity(len);
        let mut checksum = 0u16;
        for _ in 0..len {
            let (byte, longs) = self.byte()?;
            checksum = checksum.wrapping_add(longs);
            bytes.push(byte);
        }
        Ok((bytes, checksum))
    }

    fn checksum(&mut self, section: &str, expected: u16) -> Result<u16, Error> {
        let (hi, _) = self.byte()?;
        let (lo, _) = self.byte()?;
        let found = u16::from_be_bytes([hi, lo]);
        if found != expected {
            bail!("{} checksum mismatch: tape has {:04X}, counted {:04X}", section, found, expected);
        }
        Ok(found)
    }
}

/// Play a freshly loaded tape from the start and check every section of it.
/// The motor is started if needed and stopped again afterwards.
pub fn verify_tape(bus: &mut dyn CpuBus) -> Result<VerifyReport, Error> {
    set_motor(bus, true);
    let result = read_tape(bus);
    set_motor(bus, false);
    result
}

fn read_tape(bus: &mut dyn CpuBus) -> Result<VerifyReport, Error> {
    let mut reader = PulseReader::new(bus);

    let header_gap = reader.preamble()?;
    let (header, header_longs) = reader.block(TAPE_HEADER_LEN)?;
    let header_checksum = reader.checksum("Header", header_longs)?;
    reader.expect_long("after header")?;
    let body_gap = reader.preamble()?;

    let body_len = header[HEADER_LENGTH_LSB] as usize | (header[HEADER_LENGTH_MSB] as usize) << 8;
    let (_, body_longs) = reader.block(body_len)?;
    let body_checksum = reader.checksum("Body", body_longs)?;
    reader.expect_long("stop bit")?;

    let name = header[HEADER_NAME..]
        .iter()
        .take_while(|&&c| c != TAPE_NAME_END)
        .take(TAPE_NAME_LEN)
        .map(|&c| if c.is_ascii_graphic() || c == b' ' { c as char } else { '?' })
        .collect();

    Ok(VerifyReport {
        name,
        attribute: header[HEADER_ATTRIBUTE],
        body_len,
        header_gap,
        body_gap,
        header_checksum,
        body_checksum,
        pulses: reader.pulses,
    })
}

/// Render the first `count` pulses of the tape as a string of 1s (long) and
/// 0s (short).
pub fn dump_pulses(bus: &mut dyn CpuBus, count: usize) -> Result<String, Error> {
    set_motor(bus, true);
    let mut reader = PulseReader::new(bus);
    let dump: Result<String, Error> = (0..count)
        .map(|_| reader.pulse().map(|long| if long { '1' } else { '0' }))
        .collect();
    set_motor(bus, false);
    dump
}

#[cfg(test)]
mod tests {
    use super::*;
    use mz_core::{
        clock::ManualClock,
        coreconfig::CoreConfig,
        devices::cassette::TapeState,
        machine::Machine,
        tape::{TapeImage, ATTRIBUTE_OBJ},
    };

    fn machine_with(tape: TapeImage) -> Machine {
        let mut machine = Machine::new(&CoreConfig::default(), Box::new(ManualClock::new()), None);
        set_motor(machine.cpu_bus(), false);
        machine.insert_tape(tape).unwrap();
        machine
    }

    #[test]
    fn motor_control_is_idempotent() {
        let mut machine = Machine::new(&CoreConfig::default(), Box::new(ManualClock::new()), None);
        assert!(machine.bus().ppi().motor_on());
        set_motor(machine.cpu_bus(), true);
        assert!(machine.bus().ppi().motor_on());
        set_motor(machine.cpu_bus(), false);
        assert!(!machine.bus().ppi().motor_on());
        set_motor(machine.cpu_bus(), false);
        assert!(!machine.bus().ppi().motor_on());
    }

    #[test]
    fn verifies_program_tape() {
        let body: Vec<u8> = (0..=255u8).rev().collect();
        let mut machine = machine_with(TapeImage::with_body("HELLO WORLD", ATTRIBUTE_OBJ, &body).unwrap());

        let report = verify_tape(machine.cpu_bus()).unwrap();
        assert_eq!(report.name, "HELLO WORLD");
        assert_eq!(report.attribute, ATTRIBUTE_OBJ);
        assert_eq!(report.body_len, 256);
        assert_eq!(report.header_gap, 120);
        assert_eq!(report.body_gap, 120);
        // Every value 0-255 once: 4 set bits on average.
        assert_eq!(report.body_checksum, 1024);
        assert_eq!(report.pulses, 1552 + 9 * 256);
        assert!(!machine.bus().ppi().motor_on());
    }

    #[test]
    fn unterminated_name_stops_at_field_end() {
        // Name runs into the length field, which reads as 'A' (65 bytes).
        let mut header = [0u8; TAPE_HEADER_LEN];
        header[HEADER_ATTRIBUTE] = ATTRIBUTE_OBJ;
        header[HEADER_NAME..=HEADER_LENGTH_LSB].fill(b'A');
        let mut machine = machine_with(TapeImage::new(header, vec![0; 0x41]).unwrap());

        let report = verify_tape(machine.cpu_bus()).unwrap();
        assert_eq!(report.name, "A".repeat(TAPE_NAME_LEN));
        assert_eq!(report.body_len, 0x41);
    }

    #[test]
    fn verifies_blank_tape() {
        let mut machine = machine_with(TapeImage::blank());
        let report = verify_tape(machine.cpu_bus()).unwrap();
        assert_eq!(report.body_len, 0);
        assert_eq!(report.header_checksum, 0);
        assert_eq!(report.body_checksum, 0);
    }

    #[test]
    fn corrupted_deck_fails_verification() {
        let mut machine = machine_with(TapeImage::with_body("BAD", ATTRIBUTE_OBJ, &[1, 2, 3]).unwrap());
        machine.bus_mut().ppi_mut().cassette_mut().jump_to(TapeState::BodyCopy);
        assert!(verify_tape(machine.cpu_bus()).is_err());
        assert!(!machine.bus().ppi().motor_on());
    }

    #[test]
    fn dump_starts_with_gap_then_mark() {
        let mut machine = machine_with(TapeImage::blank());
        let dump = dump_pulses(machine.cpu_bus(), 160).unwrap();
        assert_eq!(dump.len(), 160);
        assert_eq!(&dump[..120], "0".repeat(120));
        assert_eq!(&dump[120..], "1".repeat(40));
    }
}
