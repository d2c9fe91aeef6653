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

    keys.rs

    Translation of host terminal input to the MZ-80K key matrix.

    The keyboard is a 10 row by 8 column matrix read through PPI port B. A key
    reads as 0 in its row when pressed. The host side delivers bytes from a
    terminal: plain ASCII, plus VT100 escape sequences for the cursor and
    editing keys. Lower case letters map to the unshifted MZ-80K letter keys,
    which produce capitals; upper case letters map to the shifted key, which
    produces the graphic character on that key.

        Row 0  1 3 5 7 9 -
        Row 1  2 4 6 8 0
        Row 2  Q E T U O =
        Row 3  W R Y I P
        Row 4  A D G J L
        Row 5  S F H K ;
        Row 6  Z C B M . SML/CAP
        Row 7  X V N , /
        Row 8  LSHIFT DEL - LEFT CR RSHIFT
        Row 9  HOME SPACE DOWN BREAK

    Two bytes are reserved for the frontend: '~' selects the next tape and
    '|' clears the emulator status area.
*/

use crate::devices::ppi::{KEY_ROWS, PORTC_LED};

const ESC: u8 = 0x1B;
const CSI: u8 = b'[';
const SS3: u8 = b'O';

pub const KEY_NEXT_TAPE: u8 = b'~';
pub const KEY_CLEAR_STATUS: u8 = b'|';

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyPos {
    pub row: u8,
    pub bit: u8,
}

const fn key(row: u8, bit: u8) -> KeyPos {
    KeyPos { row, bit }
}

pub const SHIFT: KeyPos = key(8, 0x01);
pub const DEL: KeyPos = key(8, 0x02);
pub const CURSOR_LEFT: KeyPos = key(8, 0x08);
pub const CR: KeyPos = key(8, 0x10);
pub const HOME: KeyPos = key(9, 0x01);
pub const SPACE: KeyPos = key(9, 0x02);
pub const CURSOR_DOWN: KeyPos = key(9, 0x04);
pub const BREAK: KeyPos = key(9, 0x08);
pub const SML_CAP: KeyPos = key(6, 0x20);

/// Unshifted letter keys, a to z.
const LETTERS: [KeyPos; 26] = [
    key(4, 0x01),
    key(6, 0x04),
    key(6, 0x02),
    key(4, 0x02),
    key(2, 0x02),
    key(5, 0x02),
    key(4, 0x04),
    key(5, 0x04),
    key(3, 0x08),
    key(4, 0x08),
    key(5, 0x08),
    key(4, 0x10),
    key(6, 0x08),
    key(7, 0x04),
    key(2, 0x10),
    key(3, 0x10),
    key(2, 0x01),
    key(3, 0x02),
    key(5, 0x01),
    key(2, 0x04),
    key(2, 0x08),
    key(7, 0x02),
    key(3, 0x01),
    key(7, 0x01),
    key(3, 0x04),
    key(6, 0x01),
];

/// A set of matrix keys held together. Bits are active high here; the PPI
/// inverts them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyChord {
    rows: [u8; KEY_ROWS],
}

impl KeyChord {
    pub fn single(pos: KeyPos) -> Self {
        Self::default().with(pos)
    }

    pub fn shifted(pos: KeyPos) -> Self {
        Self::single(pos).with(SHIFT)
    }

    pub fn with(mut self, pos: KeyPos) -> Self {
        self.rows[pos.row as usize] |= pos.bit;
        self
    }

    pub fn is_pressed(&self, pos: KeyPos) -> bool {
        self.rows[pos.row as usize] & pos.bit != 0
    }

    /// Rows with at least one key held, as (row, pressed bits).
    pub fn rows(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.rows.iter().copied().enumerate().filter(|(_, bits)| *bits != 0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Keys(KeyChord),
    NextTape,
    ClearStatus,
}

#[derive(Default)]
pub struct KeyMapper {
    sml_cap: bool,
}

impl KeyMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// SML/CAP lock state. The key itself is momentary; we track the lock.
    pub fn sml_cap(&self) -> bool {
        self.sml_cap
    }

    /// Map one burst of terminal input. `port_c` is the current PPI port C
    /// latch, which holds the SML/CAP LED state. Unknown input maps to None.
    pub fn map(&mut self, input: &[u8], port_c: u8) -> Option<KeyAction> {
        match input {
            [KEY_NEXT_TAPE] => Some(KeyAction::NextTape),
            [KEY_CLEAR_STATUS] => Some(KeyAction::ClearStatus),
            [c] => map_ascii(*c).map(KeyAction::Keys),
            [ESC, CSI, c] => map_cursor(*c).map(KeyAction::Keys),
            [ESC, SS3, b'F'] => Some(KeyAction::Keys(KeyChord::shifted(HOME))),
            [ESC, CSI, n, b'~'] => self.map_editing(*n, port_c).map(KeyAction::Keys),
            _ => {
                log::debug!("Unmapped key input: {:02X?}", input);
                None
            }
        }
    }

    fn map_editing(&mut self, n: u8, port_c: u8) -> Option<KeyChord> {
        let chord = match n {
            b'1' => KeyChord::single(HOME),
            b'2' => KeyChord::shifted(DEL),
            b'3' => KeyChord::single(DEL),
            b'5' => {
                self.sml_cap = !self.sml_cap;
                log::debug!("SML/CAP lock: {}", self.sml_cap);
                if port_c & PORTC_LED != 0 {
                    KeyChord::shifted(SML_CAP)
                }
                else {
                    KeyChord::single(SML_CAP)
                }
            }
            b'6' => KeyChord::single(BREAK),
            _ => return None,
        };
        Some(chord)
    }
}

fn map_cursor(c: u8) -> Option<KeyChord> {
    match c {
        b'A' => Some(KeyChord::shifted(CURSOR_DOWN)),
        b'B' => Some(KeyChord::single(CURSOR_DOWN)),
        b'C' => Some(KeyChord::single(CURSOR_LEFT)),
        b'D' => Some(KeyChord::shifted(CURSOR_LEFT)),
        _ => None,
    }
}

/// Digit keys alternate between rows 0 and 1, '1' at row 0 bit 0.
fn digit_key(n: u8) -> KeyPos {
    key((n + 1) % 2, 1 << ((n - 1) / 2))
}

pub fn map_ascii(c: u8) -> Option<KeyChord> {
    let chord = match c {
        0x03 => KeyChord::shifted(BREAK),
        0x08 => KeyChord::single(DEL),
        0x09 => KeyChord::single(BREAK),
        0x0D => KeyChord::single(CR),
        b' ' => KeyChord::single(SPACE),
        b'0' => KeyChord::single(digit_key(10)),
        b'1'..=b'9' => KeyChord::single(digit_key(c - b'0')),
        b'!'..=b')' => KeyChord::shifted(digit_key(c - b' ')),
        b'a'..=b'z' => KeyChord::single(LETTERS[(c - b'a') as usize]),
        b'A'..=b'Z' => KeyChord::shifted(LETTERS[(c - b'A') as usize]),
        b'*' => KeyChord::shifted(key(2, 0x20)),
        b'+' => KeyChord::shifted(key(0, 0x20)),
        b',' => KeyChord::single(key(7, 0x08)),
        b'-' => KeyChord::single(key(0, 0x20)),
        b'.' => KeyChord::single(key(6, 0x10)),
        b'/' => KeyChord::single(key(7, 0x10)),
        b':' => KeyChord::shifted(key(2, 0x10)),
        b';' => KeyChord::single(key(5, 0x10)),
        b'<' => KeyChord::shifted(key(2, 0x01)),
        b'=' => KeyChord::single(key(2, 0x20)),
        b'>' => KeyChord::shifted(key(3, 0x01)),
        b'?' => KeyChord::shifted(key(3, 0x08)),
        b'\\' => KeyChord::shifted(key(3, 0x04)),
        b'^' => KeyChord::shifted(key(1, 0x10)),
        _ => return None,
    };
    Some(chord)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(mapper: &mut KeyMapper, input: &[u8]) -> KeyChord {
        match mapper.map(input, 0) {
            Some(KeyAction::Keys(chord)) => chord,
            other => panic!("{:02X?} mapped to {:?}", input, other),
        }
    }

    #[test]
    fn digits_alternate_rows() {
        assert_eq!(map_ascii(b'1'), Some(KeyChord::single(key(0, 0x01))));
        assert_eq!(map_ascii(b'2'), Some(KeyChord::single(key(1, 0x01))));
        assert_eq!(map_ascii(b'9'), Some(KeyChord::single(key(0, 0x10))));
        assert_eq!(map_ascii(b'0'), Some(KeyChord::single(key(1, 0x10))));
        assert_eq!(map_ascii(b'#'), Some(KeyChord::shifted(key(0, 0x02))));
    }

    #[test]
    fn letter_case_selects_shift() {
        let a = map_ascii(b'a').unwrap();
        assert!(a.is_pressed(key(4, 0x01)));
        assert!(!a.is_pressed(SHIFT));

        let upper = map_ascii(b'A').unwrap();
        assert!(upper.is_pressed(key(4, 0x01)));
        assert!(upper.is_pressed(SHIFT));
    }

    #[test]
    fn shift_and_key_share_a_row() {
        let mut mapper = KeyMapper::new();
        let right = keys(&mut mapper, &[ESC, CSI, b'D']);
        assert_eq!(right.rows().collect::<Vec<_>>(), vec![(8, 0x09)]);

        let up = keys(&mut mapper, &[ESC, CSI, b'A']);
        assert_eq!(up.rows().collect::<Vec<_>>(), vec![(8, 0x01), (9, 0x04)]);

        let clr = keys(&mut mapper, &[ESC, SS3, b'F']);
        assert_eq!(clr.rows().collect::<Vec<_>>(), vec![(8, 0x01), (9, 0x01)]);
    }

    #[test]
    fn editing_keys() {
        let mut mapper = KeyMapper::new();
        assert_eq!(keys(&mut mapper, b"\x1b[1~"), KeyChord::single(HOME));
        assert_eq!(keys(&mut mapper, b"\x1b[2~"), KeyChord::shifted(DEL));
        assert_eq!(keys(&mut mapper, b"\x1b[3~"), KeyChord::single(DEL));
        assert_eq!(keys(&mut mapper, b"\x1b[6~"), KeyChord::single(BREAK));
        assert_eq!(mapper.map(b"\x1b[9~", 0), None);
    }

    #[test]
    fn sml_cap_toggles_and_follows_led() {
        let mut mapper = KeyMapper::new();
        assert_eq!(
            mapper.map(b"\x1b[5~", PORTC_LED),
            Some(KeyAction::Keys(KeyChord::shifted(SML_CAP)))
        );
        assert!(mapper.sml_cap());
        assert_eq!(mapper.map(b"\x1b[5~", 0), Some(KeyAction::Keys(KeyChord::single(SML_CAP))));
        assert!(!mapper.sml_cap());
    }

    #[test]
    fn frontend_keys() {
        let mut mapper = KeyMapper::new();
        assert_eq!(mapper.map(b"~", 0), Some(KeyAction::NextTape));
        assert_eq!(mapper.map(b"|", 0), Some(KeyAction::ClearStatus));
        assert_eq!(mapper.map(b"~~", 0), None);
        assert_eq!(mapper.map(&[0x80], 0), None);
    }
}
