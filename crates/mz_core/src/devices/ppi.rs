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

    devices::ppi.rs

    Implementation of the Intel 8255 Programmable Peripheral Interface as wired
    in the MZ-80K.

    The monitor programs the PPI once at startup (mode 0, port A output, port B
    input, port C lower output, port C upper input) and never changes it, so
    mode set writes are accepted and otherwise ignored.

    Port A bits 0-3 drive a BCD decoder strobing the ten keyboard matrix rows.
    Bit 7 clocks the cursor blink timer, a 555 on the real board.
    Port B returns the strobed keyboard row, active low.
    Port C lower nibble is written through the bit set/reset protocol:
        bit 0  /VGATE
        bit 1  cassette write data
        bit 2  SML/CAP LED
        bit 3  cassette sense, setting it toggles the motor
    Port C upper nibble is read only:
        bit 4  cassette motor
        bit 5  cassette read data
        bit 6  cursor blink
        bit 7  /VBLANK
*/

use std::sync::Arc;

use modular_bitfield::{bitfield, prelude::*};

use crate::{
    bus::{IoDevice, NO_IO_BYTE},
    coreconfig::CoreConfig,
    devices::cassette::{Cassette, LONG_PULSE},
    interrupt::InterruptLine,
    tape::{TapeError, TapeImage},
    video::FrameBuffer,
};

pub const PPI_PORT_A: u16 = 0xE000;
pub const PPI_PORT_B: u16 = 0xE001;
pub const PPI_PORT_C: u16 = 0xE002;
pub const PPI_COMMAND_PORT: u16 = 0xE003;

pub const KEY_ROWS: usize = 10;
pub const KEY_NONE: u8 = 0xFF;
/// Strobe values above this select the last row.
const STROBE_MAX: usize = KEY_ROWS - 1;
const STROBE_MASK: u8 = 0x0F;

pub const PORTA_BLINK_CLOCK: u8 = 0b1000_0000;

pub const PORTC_VGATE: u8 = 0b0000_0001;
pub const PORTC_WRITE_DATA: u8 = 0b0000_0010;
pub const PORTC_LED: u8 = 0b0000_0100;
pub const PORTC_SENSE: u8 = 0b0000_1000;
pub const PORTC_MOTOR: u8 = 0b0001_0000;
pub const PORTC_READ_DATA: u8 = 0b0010_0000;
pub const PORTC_BLINK: u8 = 0b0100_0000;
pub const PORTC_VBLANK: u8 = 0b1000_0000;
const PORTC_LOWER: u8 = 0x0F;

/// Blink timer ticks per blink counter increment.
pub const BLINK_DIVISOR: u8 = 50;
const BLINK_THRESHOLD: u8 = 0x7F;

#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct PpiControlWord {
    pub port_c_lower_input: bool,
    pub port_b_input: bool,
    pub group_b_mode: B1,
    pub port_c_upper_input: bool,
    pub port_a_input: bool,
    pub group_a_mode: B2,
    pub mode_set: bool,
}

#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct PortCBitOp {
    pub set: bool,
    pub bit: B3,
    #[skip]
    unused: B3,
    pub mode_set: bool,
}

pub struct Ppi {
    port_a: u8,
    port_c: u8,
    mode: Option<PpiControlWord>,
    vgate: bool,
    motor: bool,
    sense: bool,
    blink: u8,
    blink_ticks: u8,
    live_keys: [u8; KEY_ROWS],
    latched_keys: [u8; KEY_ROWS],
    cassette: Cassette,
    frame: Arc<FrameBuffer>,
}

impl IoDevice for Ppi {
    fn read_u8(&mut self, port: u16, _irq: &mut InterruptLine) -> u8 {
        match port {
            PPI_PORT_A => self.port_a,
            PPI_PORT_B => self.port_b_read(),
            PPI_PORT_C => self.port_c_read(),
            _ => {
                log::debug!("Read from write-only PPI port {:04X}", port);
                NO_IO_BYTE
            }
        }
    }

    fn write_u8(&mut self, port: u16, data: u8) {
        match port {
            PPI_PORT_A => self.port_a_write(data),
            PPI_PORT_B => {
                log::debug!("Write to PPI port B ignored: {:02X}", data);
            }
            PPI_PORT_C => self.port_c_write(data),
            PPI_COMMAND_PORT => self.control_write(data),
            _ => {
                log::warn!("Write to invalid PPI port {:04X}", port);
            }
        }
    }

    fn port_list(&self) -> Vec<(String, u16)> {
        vec![
            (String::from("PPI Port A"), PPI_PORT_A),
            (String::from("PPI Port B"), PPI_PORT_B),
            (String::from("PPI Port C"), PPI_PORT_C),
            (String::from("PPI Control"), PPI_COMMAND_PORT),
        ]
    }
}

impl Ppi {
    pub fn new(config: &CoreConfig, frame: Arc<FrameBuffer>) -> Self {
        Self {
            port_a: 0,
            port_c: 0,
            mode: None,
            vgate: false,
            motor: config.initial_motor_on,
            sense: config.initial_sense,
            blink: 0,
            blink_ticks: 0,
            live_keys: [KEY_NONE; KEY_ROWS],
            latched_keys: [KEY_NONE; KEY_ROWS],
            cassette: Cassette::new(config.cassette),
            frame,
        }
    }

    fn port_a_write(&mut self, data: u8) {
        if data & PORTA_BLINK_CLOCK != 0 {
            self.blink_ticks += 1;
            if self.blink_ticks >= BLINK_DIVISOR {
                self.blink_ticks = 0;
                self.blink = self.blink.wrapping_add(1);
            }
        }
        self.port_a = data;
    }

    /// The strobed keyboard row. Every read of row 9 latches the keys
    /// collected since the previous row 9 read and starts collecting afresh.
    fn port_b_read(&mut self) -> u8 {
        let strobe = self.strobe();
        if strobe == STROBE_MAX {
            self.latched_keys = self.live_keys;
            self.live_keys = [KEY_NONE; KEY_ROWS];
        }
        self.latched_keys[strobe]
    }

    #[inline]
    pub fn strobe(&self) -> usize {
        ((self.port_a & STROBE_MASK) as usize).min(STROBE_MAX)
    }

    fn port_c_write(&mut self, data: u8) {
        self.port_c = (self.port_c & !PORTC_LOWER) | (data & PORTC_LOWER);
    }

    fn port_c_read(&mut self) -> u8 {
        let tape_bit = match self.cassette.read_bit(self.motor) {
            Ok(bit) => bit,
            Err(e) => {
                log::warn!("Stopping cassette motor: {}", e);
                self.motor = false;
                LONG_PULSE
            }
        };

        let mut byte = self.port_c & PORTC_LOWER;
        if self.motor {
            byte |= PORTC_MOTOR;
        }
        if tape_bit {
            byte |= PORTC_READ_DATA;
        }
        if self.blink > BLINK_THRESHOLD {
            byte |= PORTC_BLINK;
        }
        if self.frame.vblank() {
            byte |= PORTC_VBLANK;
        }
        byte
    }

    fn control_write(&mut self, data: u8) {
        let op = PortCBitOp::from_bytes([data]);
        if op.mode_set() {
            let mode = PpiControlWord::from_bytes([data]);
            log::debug!("PPI mode set ignored: {:02X} {:?}", data, mode);
            self.mode = Some(mode);
            return;
        }

        let set = op.set();
        let bit = op.bit();
        log::trace!("PPI port C bit {} {}", bit, if set { "set" } else { "reset" });
        match bit {
            0 => {
                self.set_port_c_bit(PORTC_VGATE, set);
                self.vgate = set;
                self.frame.set_vblank(!set);
            }
            1 => self.set_port_c_bit(PORTC_WRITE_DATA, set),
            2 => self.set_port_c_bit(PORTC_LED, set),
            3 => {
                self.set_port_c_bit(PORTC_SENSE, set);
                if set {
                    self.sense = !self.sense;
                    self.motor = !self.motor;
                    log::debug!("Cassette motor {} sense {}", self.motor, self.sense);
                }
            }
            _ => {
                log::warn!("Unexpected PPI port C bit operation on bit {}", bit);
            }
        }
    }

    #[inline]
    fn set_port_c_bit(&mut self, mask: u8, set: bool) {
        if set {
            self.port_c |= mask;
        }
        else {
            self.port_c &= !mask;
        }
    }

    /// Record pressed keys for `row` (active high) in the live matrix. They
    /// become visible on port B at the next keyboard scan.
    pub fn press_keys(&mut self, row: usize, pressed: u8) {
        if let Some(keys) = self.live_keys.get_mut(row) {
            *keys = !pressed;
        }
    }

    /// Load a new tape. Refused while the motor is running so a read in
    /// progress is never cut short.
    pub fn insert_tape(&mut self, image: TapeImage) -> Result<(), TapeError> {
        if self.motor {
            log::warn!("Tape change refused, cassette motor is running");
            return Err(TapeError::MotorRunning);
        }
        self.cassette.load(image);
        Ok(())
    }

    #[inline]
    pub fn port_c_latch(&self) -> u8 {
        self.port_c
    }

    #[inline]
    pub fn motor_on(&self) -> bool {
        self.motor
    }

    #[inline]
    pub fn sense(&self) -> bool {
        self.sense
    }

    #[inline]
    pub fn vgate(&self) -> bool {
        self.vgate
    }

    #[inline]
    pub fn blink(&self) -> u8 {
        self.blink
    }

    pub fn mode(&self) -> Option<PpiControlWord> {
        self.mode
    }

    pub fn cassette(&self) -> &Cassette {
        &self.cassette
    }

    pub fn cassette_mut(&mut self) -> &mut Cassette {
        &mut self.cassette
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::cassette::TapeState;

    fn ppi() -> Ppi {
        Ppi::new(&CoreConfig::default(), Arc::new(FrameBuffer::new()))
    }

    fn read(ppi: &mut Ppi, port: u16) -> u8 {
        ppi.read_u8(port, &mut InterruptLine::new())
    }

    #[test]
    fn blink_counter_divides_by_fifty() {
        let mut ppi = ppi();
        for _ in 0..49 {
            ppi.write_u8(PPI_PORT_A, 0x80);
            ppi.write_u8(PPI_PORT_A, 0x00);
        }
        assert_eq!(ppi.blink(), 0);
        ppi.write_u8(PPI_PORT_A, 0x8F);
        assert_eq!(ppi.blink(), 1);
        assert_eq!(read(&mut ppi, PPI_PORT_A), 0x8F);

        for _ in 0..(127 * 50) {
            ppi.write_u8(PPI_PORT_A, 0x80);
        }
        assert_eq!(ppi.blink(), 128);
        ppi.write_u8(PPI_COMMAND_PORT, 0x07);
        assert_ne!(read(&mut ppi, PPI_PORT_C) & PORTC_BLINK, 0);
    }

    #[test]
    fn keyboard_latches_once_per_scan() {
        let mut ppi = ppi();

        // Nothing latched yet.
        ppi.write_u8(PPI_PORT_A, 0x09);
        assert_eq!(read(&mut ppi, PPI_PORT_B), KEY_NONE);

        ppi.press_keys(4, 0x01);
        ppi.write_u8(PPI_PORT_A, 0x04);
        assert_eq!(read(&mut ppi, PPI_PORT_B), KEY_NONE);

        // Start of the next scan picks up the key.
        ppi.write_u8(PPI_PORT_A, 0x0F);
        assert_eq!(read(&mut ppi, PPI_PORT_B), KEY_NONE);
        ppi.press_keys(4, 0x02);
        ppi.write_u8(PPI_PORT_A, 0x04);
        assert_eq!(read(&mut ppi, PPI_PORT_B), 0xFE);

        // The second press waits for the next scan.
        ppi.write_u8(PPI_PORT_A, 0x09);
        read(&mut ppi, PPI_PORT_B);
        ppi.write_u8(PPI_PORT_A, 0x04);
        assert_eq!(read(&mut ppi, PPI_PORT_B), 0xFD);

        // And a scan with no presses releases it.
        ppi.write_u8(PPI_PORT_A, 0x09);
        read(&mut ppi, PPI_PORT_B);
        ppi.write_u8(PPI_PORT_A, 0x04);
        assert_eq!(read(&mut ppi, PPI_PORT_B), KEY_NONE);
    }

    #[test]
    fn polling_row_nine_sees_new_presses() {
        let mut ppi = ppi();
        ppi.write_u8(PPI_PORT_A, 0x09);
        assert_eq!(read(&mut ppi, PPI_PORT_B), KEY_NONE);

        // BREAK pressed while the monitor polls only the last row.
        ppi.press_keys(9, 0x08);
        ppi.write_u8(PPI_PORT_A, 0x09);
        assert_eq!(read(&mut ppi, PPI_PORT_B), 0xF7);

        // Released on the following poll.
        ppi.write_u8(PPI_PORT_A, 0x09);
        assert_eq!(read(&mut ppi, PPI_PORT_B), KEY_NONE);
    }

    #[test]
    fn sense_bit_toggles_motor_on_set_only() {
        let mut ppi = ppi();
        assert!(ppi.motor_on());
        assert!(ppi.sense());

        ppi.write_u8(PPI_COMMAND_PORT, 0x07);
        assert!(!ppi.motor_on());
        assert!(!ppi.sense());
        assert_eq!(ppi.port_c_latch() & PORTC_SENSE, PORTC_SENSE);

        ppi.write_u8(PPI_COMMAND_PORT, 0x06);
        assert!(!ppi.motor_on());
        assert!(!ppi.sense());
        assert_eq!(ppi.port_c_latch() & PORTC_SENSE, 0);

        ppi.write_u8(PPI_COMMAND_PORT, 0x07);
        assert!(ppi.motor_on());
        assert!(ppi.sense());
    }

    #[test]
    fn vgate_and_vblank_are_exclusive() {
        let mut ppi = ppi();
        ppi.write_u8(PPI_COMMAND_PORT, 0x01);
        assert!(ppi.vgate());
        assert!(!ppi.frame.vblank());
        assert_eq!(read(&mut ppi, PPI_PORT_C) & (PORTC_VGATE | PORTC_VBLANK), PORTC_VGATE);

        ppi.write_u8(PPI_COMMAND_PORT, 0x00);
        assert!(!ppi.vgate());
        assert!(ppi.frame.vblank());
        assert_eq!(read(&mut ppi, PPI_PORT_C) & (PORTC_VGATE | PORTC_VBLANK), PORTC_VBLANK);
    }

    #[test]
    fn mode_set_and_unused_bits_change_nothing() {
        let mut ppi = ppi();
        ppi.write_u8(PPI_COMMAND_PORT, 0x8A);
        let mode = ppi.mode().unwrap();
        assert!(mode.port_b_input());
        assert!(mode.port_c_upper_input());
        assert!(!mode.port_a_input());

        ppi.write_u8(PPI_COMMAND_PORT, 0x09);
        ppi.write_u8(PPI_COMMAND_PORT, 0x0F);
        assert_eq!(ppi.port_c_latch(), 0);
        assert!(ppi.motor_on());
    }

    #[test]
    fn port_c_write_keeps_upper_nibble() {
        let mut ppi = ppi();
        ppi.write_u8(PPI_PORT_C, 0xF5);
        assert_eq!(ppi.port_c_latch(), 0x05);
        ppi.write_u8(PPI_PORT_B, 0x00);
        assert_eq!(ppi.strobe(), 0);
    }

    #[test]
    fn port_c_reads_motor_and_tape() {
        let mut ppi = ppi();
        // Motor on at power up: high, first preamble bit (short), low.
        assert_eq!(read(&mut ppi, PPI_PORT_C) & 0x30, PORTC_MOTOR | PORTC_READ_DATA);
        assert_eq!(read(&mut ppi, PPI_PORT_C) & 0x30, PORTC_MOTOR);
        assert_eq!(read(&mut ppi, PPI_PORT_C) & 0x30, PORTC_MOTOR);

        ppi.write_u8(PPI_COMMAND_PORT, 0x07);
        assert_eq!(read(&mut ppi, PPI_PORT_C) & 0x30, PORTC_READ_DATA);
    }

    #[test]
    fn tape_change_refused_while_motor_runs() {
        let mut ppi = ppi();
        let tape = TapeImage::with_body("NEW", 1, &[0xAA]).unwrap();
        assert!(matches!(ppi.insert_tape(tape.clone()), Err(TapeError::MotorRunning)));
        assert_eq!(ppi.cassette().image(), &TapeImage::blank());

        ppi.write_u8(PPI_COMMAND_PORT, 0x07);
        ppi.insert_tape(tape.clone()).unwrap();
        assert_eq!(ppi.cassette().image(), &tape);
        assert!(ppi.cassette().state().is_idle());
    }

    #[test]
    fn cassette_fault_stops_motor() {
        let mut ppi = ppi();
        ppi.cassette_mut().jump_to(TapeState::HeaderCopy);
        read(&mut ppi, PPI_PORT_C);
        let byte = read(&mut ppi, PPI_PORT_C);
        assert_eq!(byte & (PORTC_MOTOR | PORTC_READ_DATA), PORTC_READ_DATA);
        assert!(!ppi.motor_on());
        assert!(ppi.cassette().state().is_idle());
    }
}
