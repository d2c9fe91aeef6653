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

    tape.rs

    In-memory tape images. An MZ-80K tape file is a 128 byte header followed by
    the program body. The header carries the file attribute at offset 0, a
    name of up to 17 characters from offset 1 and the body length, little
    endian, at offsets 18 and 19. Nothing else in the header is interpreted
    here.
*/

use std::{fs::File, io::Read, path::Path};

use thiserror::Error;

pub const TAPE_HEADER_LEN: usize = 128;
/// The body has to fit in user RAM.
pub const TAPE_BODY_MAX: usize = 49152;

pub const HEADER_ATTRIBUTE: usize = 0;
pub const HEADER_NAME: usize = 1;
pub const HEADER_LENGTH_LSB: usize = 18;
pub const HEADER_LENGTH_MSB: usize = 19;

/// Machine code program attribute.
pub const ATTRIBUTE_OBJ: u8 = 0x01;

#[derive(Debug, Error)]
pub enum TapeError {
    #[error("Tape image has only {0} of 128 header bytes.")]
    HeaderTruncated(usize),
    #[error("Tape header declares a body of {0} bytes, more than fits in memory.")]
    BodyTooLarge(usize),
    #[error("Tape body truncated: header declares {expected} bytes, found {found}.")]
    BodyTruncated { expected: usize, found: usize },
    #[error("Cannot change tapes while the cassette motor is running.")]
    MotorRunning,
    #[error("Tape I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TapeImage {
    header: [u8; TAPE_HEADER_LEN],
    body: Vec<u8>,
}

impl Default for TapeImage {
    fn default() -> Self {
        Self::blank()
    }
}

impl TapeImage {
    /// An all-zero header declaring an empty body.
    pub fn blank() -> Self {
        Self {
            header: [0; TAPE_HEADER_LEN],
            body: Vec::new(),
        }
    }

    /// Build an image from a header and a body. The body must be exactly as
    /// long as the header says.
    pub fn new(header: [u8; TAPE_HEADER_LEN], body: Vec<u8>) -> Result<Self, TapeError> {
        let expected = declared_len(&header);
        if expected > TAPE_BODY_MAX {
            return Err(TapeError::BodyTooLarge(expected));
        }
        if body.len() != expected {
            return Err(TapeError::BodyTruncated {
                expected,
                found: body.len(),
            });
        }
        Ok(Self { header, body })
    }

    /// Parse an image from the contents of a tape file. Bytes past the end of
    /// the declared body are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TapeError> {
        if bytes.len() < TAPE_HEADER_LEN {
            return Err(TapeError::HeaderTruncated(bytes.len()));
        }
        let mut header = [0u8; TAPE_HEADER_LEN];
        header.copy_from_slice(&bytes[..TAPE_HEADER_LEN]);

        let expected = declared_len(&header);
        if expected > TAPE_BODY_MAX {
            return Err(TapeError::BodyTooLarge(expected));
        }
        let rest = &bytes[TAPE_HEADER_LEN..];
        if rest.len() < expected {
            return Err(TapeError::BodyTruncated {
                expected,
                found: rest.len(),
            });
        }
        if rest.len() > expected {
            log::debug!("Ignoring {} trailing bytes after tape body", rest.len() - expected);
        }
        Ok(Self {
            header,
            body: rest[..expected].to_vec(),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TapeError> {
        let mut bytes = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// Build an image for `body` with a header carrying `name` and `attribute`.
    /// Names longer than 16 characters are cut so the terminator always fits.
    pub fn with_body(name: &str, attribute: u8, body: &[u8]) -> Result<Self, TapeError> {
        if body.len() > TAPE_BODY_MAX {
            return Err(TapeError::BodyTooLarge(body.len()));
        }
        let mut header = [0u8; TAPE_HEADER_LEN];
        header[HEADER_ATTRIBUTE] = attribute;
        let name_bytes = name.as_bytes();
        let name_len = name_bytes.len().min(HEADER_LENGTH_LSB - HEADER_NAME - 1);
        header[HEADER_NAME..HEADER_NAME + name_len].copy_from_slice(&name_bytes[..name_len]);
        header[HEADER_NAME + name_len] = crate::charset::TAPE_NAME_END;
        header[HEADER_LENGTH_LSB] = (body.len() & 0xFF) as u8;
        header[HEADER_LENGTH_MSB] = (body.len() >> 8) as u8;
        Ok(Self {
            header,
            body: body.to_vec(),
        })
    }

    #[inline]
    pub fn header(&self) -> &[u8; TAPE_HEADER_LEN] {
        &self.header
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body length as declared by the header.
    pub fn body_len(&self) -> usize {
        declared_len(&self.header)
    }

    pub fn attribute(&self) -> u8 {
        self.header[HEADER_ATTRIBUTE]
    }

    /// Raw name bytes from the header, up to the terminator.
    pub fn name(&self) -> &[u8] {
        let field = &self.header[HEADER_NAME..HEADER_LENGTH_LSB];
        let end = field
            .iter()
            .position(|&c| c == crate::charset::TAPE_NAME_END)
            .unwrap_or(field.len());
        &field[..end]
    }

    /// Tape name for host-side messages.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name()).into_owned()
    }
}

fn declared_len(header: &[u8; TAPE_HEADER_LEN]) -> usize {
    (header[HEADER_LENGTH_MSB] as usize) << 8 | header[HEADER_LENGTH_LSB] as usize
}
