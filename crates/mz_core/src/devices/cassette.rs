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

    devices::cassette.rs

    Cassette deck read path.

    The MZ-80K monitor reads tapes by polling bit 5 of PPI port C and timing
    the pulses it sees. We play back an in-memory tape image by producing one
    level per port C read. Every logical bit is framed as three reads: high,
    the bit itself, then low. A long pulse encodes 1, a short pulse encodes 0.

    On tape a file looks like this:

        gap          short pulses (22000 on a real tape, >100 is enough)
        tape mark    long pulses then the same number of short pulses
        long         1 long pulse
        header       128 bytes, each preceded by a long sync pulse, msb first
        checksum     2 bytes, count of long bits in the header, msb first
        long         1 long pulse
        gap, mark    a smaller gap and tape mark
        long         1 long pulse
        body         the program, framed like the header
        checksum     2 bytes, count of long bits in the body
        long         1 long pulse

    A real tape repeats the header and body after a 256 pulse gap so the
    monitor can retry a failed read. Our tapes never fail a read, so the copies
    are never played.
*/

use strum_macros::Display;
use thiserror::Error;

use crate::{coreconfig::CassetteTiming, tape::TapeImage};

pub const LONG_PULSE: bool = true;
pub const SHORT_PULSE: bool = false;

const PULSE_PHASES: u8 = 3;
const SYNC_LEN: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CassetteError {
    #[error("Cassette reached undefined state {0}.")]
    UndefinedState(u8),
}

/// One step of byte framing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Framed {
    Sync,
    Data(bool),
}

/// Position within a run of framed bytes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteCursor {
    bit: usize,
    sync_sent: bool,
}

impl ByteCursor {
    /// Produce the next framed pulse for `bytes`, or None once every byte has
    /// been sent. A sync pulse goes out once before each byte.
    pub fn next(&mut self, bytes: &[u8]) -> Option<Framed> {
        let byte = *bytes.get(self.bit / 8)?;
        let shift = self.bit % 8;

        if shift == 0 && !self.sync_sent {
            self.sync_sent = true;
            return Some(Framed::Sync);
        }
        self.sync_sent = false;
        self.bit += 1;
        Some(Framed::Data((byte << shift) & 0x80 != 0))
    }

    #[inline]
    pub fn bits_sent(&self) -> usize {
        self.bit
    }
}

/// Tape read state. The numbering follows the deck's own state labels; the
/// retry and copy states are labelled but never entered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum TapeState {
    Idle,
    HeaderPreamble { pulses: u32 },
    HeaderBytes(ByteCursor),
    HeaderChecksum { cursor: ByteCursor, checksum: [u8; 2] },
    HeaderRetryGap,
    HeaderCopy,
    HeaderChecksumCopy,
    BodyPreamble { pulses: u32 },
    BodyBytes(ByteCursor),
    BodyChecksum { cursor: ByteCursor, checksum: [u8; 2] },
    BodyRetryGap,
    BodyCopy,
    BodyChecksumCopy,
    Stop,
}

impl TapeState {
    pub fn number(&self) -> u8 {
        match self {
            TapeState::Idle => 0,
            TapeState::HeaderPreamble { .. } => 1,
            TapeState::HeaderBytes(_) => 2,
            TapeState::HeaderChecksum { .. } => 3,
            TapeState::HeaderRetryGap => 4,
            TapeState::HeaderCopy => 5,
            TapeState::HeaderChecksumCopy => 6,
            TapeState::BodyPreamble { .. } => 7,
            TapeState::BodyBytes(_) => 8,
            TapeState::BodyChecksum { .. } => 9,
            TapeState::BodyRetryGap => 10,
            TapeState::BodyCopy => 11,
            TapeState::BodyChecksumCopy => 12,
            TapeState::Stop => 13,
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        matches!(self, TapeState::Idle)
    }
}

enum Step {
    /// Output a level and move to the next state.
    Emit(bool, TapeState),
    /// Move to the next state without consuming a pulse.
    Next(TapeState),
}

pub struct Cassette {
    image: TapeImage,
    timing: CassetteTiming,
    state: TapeState,
    phase: u8,
    checksum: u16,
    body_len: usize,
    level: bool,
}

impl Cassette {
    pub fn new(timing: CassetteTiming) -> Self {
        Self {
            image: TapeImage::blank(),
            timing,
            state: TapeState::Idle,
            phase: 0,
            checksum: 0,
            body_len: 0,
            level: LONG_PULSE,
        }
    }

    /// Replace the tape in the deck and rewind to the start.
    pub fn load(&mut self, image: TapeImage) {
        log::debug!(
            "Cassette loaded '{}', {} byte body",
            image.name_lossy(),
            image.body_len()
        );
        self.image = image;
        self.rewind();
    }

    pub fn rewind(&mut self) {
        self.state = TapeState::Idle;
        self.phase = 0;
        self.checksum = 0;
        self.body_len = 0;
    }

    #[inline]
    pub fn image(&self) -> &TapeImage {
        &self.image
    }

    #[inline]
    pub fn state(&self) -> &TapeState {
        &self.state
    }

    #[inline]
    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// The level returned by the most recent read.
    #[inline]
    pub fn level(&self) -> bool {
        self.level
    }

    /// Put the read state machine into `state`. Used to position the tape for
    /// diagnostics.
    pub fn jump_to(&mut self, state: TapeState) {
        log::debug!("Cassette forced to state {} ({})", state.number(), state);
        self.state = state;
    }

    /// Produce the tape level for one port C read.
    ///
    /// With the motor stopped the deck reads high and the framing phase is
    /// reset, so the next motor start begins on the high part of a bit. On error the deck has been reset to Idle and the caller
    /// should stop the motor.
    pub fn read_bit(&mut self, motor_on: bool) -> Result<bool, CassetteError> {
        if !motor_on {
            self.phase = 0;
            self.level = LONG_PULSE;
            return Ok(LONG_PULSE);
        }

        self.phase = (self.phase + 1) % PULSE_PHASES;
        let level = match self.phase {
            1 => LONG_PULSE,
            2 => match self.advance() {
                Ok(level) => level,
                Err(e) => {
                    log::error!("{}. Resetting cassette.", e);
                    self.state = TapeState::Idle;
                    self.phase = 0;
                    self.level = LONG_PULSE;
                    return Err(e);
                }
            },
            _ => SHORT_PULSE,
        };

        log::trace!("Cassette pulse: {}", level as u8);
        self.level = level;
        Ok(level)
    }

    fn advance(&mut self) -> Result<bool, CassetteError> {
        loop {
            match self.step(self.state)? {
                Step::Emit(level, next) => {
                    self.set_state(next);
                    return Ok(level);
                }
                Step::Next(next) => self.set_state(next),
            }
        }
    }

    fn set_state(&mut self, next: TapeState) {
        if next.number() != self.state.number() {
            log::debug!("Cassette state {} -> {}", self.state, next);
        }
        self.state = next;
    }

    fn step(&mut self, state: TapeState) -> Result<Step, CassetteError> {
        let step = match state {
            TapeState::Idle => {
                self.checksum = 0;
                Step::Next(TapeState::HeaderPreamble { pulses: 0 })
            }
            TapeState::HeaderPreamble { pulses } => {
                let gap = self.timing.header_gap;
                let mark = self.timing.header_mark;
                match preamble_level(pulses, 0, gap, mark) {
                    Some(level) => Step::Emit(level, TapeState::HeaderPreamble { pulses: pulses + 1 }),
                    None => Step::Emit(LONG_PULSE, TapeState::HeaderBytes(ByteCursor::default())),
                }
            }
            TapeState::HeaderBytes(mut cursor) => match cursor.next(self.image.header()) {
                Some(framed) => Step::Emit(self.count(framed), TapeState::HeaderBytes(cursor)),
                None => Step::Next(TapeState::HeaderChecksum {
                    cursor: ByteCursor::default(),
                    checksum: self.freeze_checksum("Header"),
                }),
            },
            TapeState::HeaderChecksum { mut cursor, checksum } => match cursor.next(&checksum) {
                Some(framed) => Step::Emit(framed_level(framed), TapeState::HeaderChecksum { cursor, checksum }),
                None => Step::Next(TapeState::BodyPreamble { pulses: 0 }),
            },
            TapeState::BodyPreamble { pulses } => {
                let gap = self.timing.body_gap;
                let mark = self.timing.body_mark;
                let end = SYNC_LEN + gap + mark;
                if pulses < SYNC_LEN {
                    Step::Emit(LONG_PULSE, TapeState::BodyPreamble { pulses: pulses + 1 })
                }
                else if let Some(level) = preamble_level(pulses, SYNC_LEN, gap, mark) {
                    Step::Emit(level, TapeState::BodyPreamble { pulses: pulses + 1 })
                }
                else if pulses < end + SYNC_LEN {
                    Step::Emit(LONG_PULSE, TapeState::BodyPreamble { pulses: pulses + 1 })
                }
                else {
                    self.body_len = self.image.body_len().min(self.image.body().len());
                    log::debug!("Cassette body length is {:#06X} ({}) bytes", self.body_len, self.body_len);
                    Step::Next(TapeState::BodyBytes(ByteCursor::default()))
                }
            }
            TapeState::BodyBytes(mut cursor) => match cursor.next(&self.image.body()[..self.body_len]) {
                Some(framed) => Step::Emit(self.count(framed), TapeState::BodyBytes(cursor)),
                None => {
                    log::debug!("Cassette body sent, {} bits", cursor.bits_sent());
                    Step::Next(TapeState::BodyChecksum {
                        cursor: ByteCursor::default(),
                        checksum: self.freeze_checksum("Body"),
                    })
                }
            },
            TapeState::BodyChecksum { mut cursor, checksum } => match cursor.next(&checksum) {
                Some(framed) => Step::Emit(framed_level(framed), TapeState::BodyChecksum { cursor, checksum }),
                None => Step::Next(TapeState::Stop),
            },
            TapeState::Stop => {
                log::debug!("Cassette stop bit sent");
                self.phase = 0;
                Step::Emit(LONG_PULSE, TapeState::Idle)
            }
            TapeState::HeaderRetryGap
            | TapeState::HeaderCopy
            | TapeState::HeaderChecksumCopy
            | TapeState::BodyRetryGap
            | TapeState::BodyCopy
            | TapeState::BodyChecksumCopy => return Err(CassetteError::UndefinedState(state.number())),
        };
        Ok(step)
    }

    /// Output level for a framed pulse, counting long data bits toward the
    /// running checksum.
    fn count(&mut self, framed: Framed) -> bool {
        if let Framed::Data(true) = framed {
            self.checksum = self.checksum.wrapping_add(1);
        }
        framed_level(framed)
    }

    fn freeze_checksum(&mut self, section: &str) -> [u8; 2] {
        let bytes = self.checksum.to_be_bytes();
        log::debug!(
            "{} checksum is {:#06X} {:#04X} {:#04X}",
            section,
            self.checksum,
            bytes[0],
            bytes[1]
        );
        self.checksum = 0;
        bytes
    }
}

#[inline]
fn framed_level(framed: Framed) -> bool {
    match framed {
        Framed::Sync => LONG_PULSE,
        Framed::Data(bit) => bit,
    }
}

/// Level for pulse `pulses` of a gap then tape mark starting at `start`.
/// The first half of the mark is long, the rest short.
fn preamble_level(pulses: u32, start: u32, gap: u32, mark: u32) -> Option<bool> {
    let offset = pulses.checked_sub(start)?;
    if offset < gap {
        Some(SHORT_PULSE)
    }
    else if offset < gap + mark / 2 {
        Some(LONG_PULSE)
    }
    else if offset < gap + mark {
        Some(SHORT_PULSE)
    }
    else {
        None
    }
}
