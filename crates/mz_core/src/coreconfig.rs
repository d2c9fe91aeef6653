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

    coreconfig.rs

    Machine level configuration consumed by the core. The frontend config crate
    reads this from the [machine] table of the configuration file.
*/

use std::time::Duration;

use serde_derive::Deserialize;

const fn _default_true() -> bool {
    true
}
const fn _default_sound_delay() -> u64 {
    16
}
const fn _default_tone_timeout() -> u64 {
    10_000
}

/// Read-side tape timing, in logical bits. A real tape leads with a 22000 bit
/// gap before the header, but the monitor accepts anything above about 100.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CassetteTiming {
    pub header_gap: u32,
    pub header_mark: u32,
    pub body_gap: u32,
    pub body_mark: u32,
}

impl Default for CassetteTiming {
    fn default() -> Self {
        Self {
            header_gap: 120,
            header_mark: 80,
            body_gap: 120,
            body_mark: 40,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CoreConfig {
    /// Stall applied to every read of the sound enable register.
    #[serde(default = "_default_sound_delay")]
    pub sound_register_delay_ms: u64,
    #[serde(default = "_default_tone_timeout")]
    pub tone_timeout_ms: u64,
    #[serde(default = "_default_true")]
    pub initial_motor_on: bool,
    #[serde(default = "_default_true")]
    pub initial_sense: bool,
    #[serde(default)]
    pub cassette: CassetteTiming,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            sound_register_delay_ms: _default_sound_delay(),
            tone_timeout_ms: _default_tone_timeout(),
            initial_motor_on: true,
            initial_sense: true,
            cassette: CassetteTiming::default(),
        }
    }
}

impl CoreConfig {
    pub fn sound_register_delay(&self) -> Duration {
        Duration::from_millis(self.sound_register_delay_ms)
    }

    pub fn tone_timeout(&self) -> Duration {
        Duration::from_millis(self.tone_timeout_ms)
    }
}
