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

    charset.rs

    Conversion from host ASCII (plus the Sharp's own lowercase codes) to the
    MZ-80K display codes that the character generator ROM indexes.
*/

pub const DISPLAY_BLANK: u8 = 0x00;

/// Display codes for "Next tape is: ".
pub const NEXT_TAPE_PREFIX: [u8; 14] = [
    0x0e, 0x85, 0x98, 0x94, 0x00, 0x94, 0x81, 0x90, 0x85, 0x00, 0x89, 0x93, 0x4f, 0x00,
];

/// Longest name a tape header carries.
pub const TAPE_NAME_LEN: usize = 17;
/// Name terminator in a tape header.
pub const TAPE_NAME_END: u8 = 0x0d;

/// Map one character to its display code. Characters the screen has no glyph
/// for map to a blank.
pub fn ascii_to_display(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => 0x20 + (c - b'0'),
        b'A'..=b'Z' => c - 0x40,
        0x21..=0x29 => c + 0x40,
        0x2a => 0x6b,
        0x2b => 0x6a,
        0x2c => 0x2f,
        0x2d => 0x2a,
        0x2e => 0x2e,
        0x2f => 0x2d,
        0x3a => 0x4f,
        0x3b => 0x2c,
        0x3c => 0x51,
        0x3d => 0x2b,
        0x3e => 0x57,
        0x3f => 0x49,
        0x40 => 0x55,
        0x5b => 0x52,
        0x5c => 0x59,
        0x5d => 0x54,
        // Sharp ASCII lowercase
        0x92 => 0x85,
        0x96 => 0x94,
        0x97 => 0x87,
        0x98 => 0x88,
        0x9a => 0x82,
        0x9b => 0x98,
        0x9c => 0x84,
        0x9d => 0x92,
        0x9e => 0x90,
        0x9f => 0x83,
        0xa0 => 0x91,
        0xa1 => 0x81,
        0xa2 => 0x9a,
        0xa3 => 0x97,
        0xa4 => 0x93,
        0xa5 => 0x95,
        0xa6 => 0x89,
        0xa9 => 0x8b,
        0xaa => 0x86,
        0xab => 0x96,
        0xaf => 0x8a,
        0xb0 => 0x8e,
        0xb3 => 0x8d,
        0xb7 => 0x8f,
        0xb8 => 0x8c,
        0xbd => 0x99,
        0xff => 0x60,
        _ => DISPLAY_BLANK,
    }
}

/// Display codes for a tape name as stored in the header, stopping at the
/// terminator or after [TAPE_NAME_LEN] characters.
pub fn tape_name_to_display(name: &[u8]) -> Vec<u8> {
    name.iter()
        .take(TAPE_NAME_LEN)
        .take_while(|&&c| c != TAPE_NAME_END)
        .map(|&c| ascii_to_display(c))
        .collect()
}

/// The full "Next tape is: NAME" status line.
pub fn next_tape_line(name: &[u8]) -> Vec<u8> {
    let mut line = NEXT_TAPE_PREFIX.to_vec();
    line.extend(tape_name_to_display(name));
    line
}
