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

    machine.rs

    This module assembles the MZ-80K's peripheral side: the bus and its devices,
    the display memory shared with the renderer, the key mapper and the tone
    generator. A Z80 core drives it through the CpuBus implementation on the
    bus.
*/

use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::{
    bus::{BusInterface, CpuBus},
    charset,
    clock::HostClock,
    coreconfig::CoreConfig,
    keys::{KeyAction, KeyMapper},
    sound::{ToneEvent, ToneGenerator, ToneHandle},
    tape::{TapeError, TapeImage},
    video::FrameBuffer,
};

/// Status area row used for the tape name.
pub const STATUS_ROW_TAPE: usize = 1;

pub struct Machine {
    config: CoreConfig,
    bus: BusInterface,
    keys: KeyMapper,
    tone: ToneHandle,
}

impl Machine {
    pub fn new(config: &CoreConfig, clock: Box<dyn HostClock>, tone_sender: Option<Sender<ToneEvent>>) -> Self {
        let tone = ToneGenerator::new(tone_sender);
        let handle = tone.handle();
        let frame = Arc::new(FrameBuffer::new());

        log::debug!("Creating machine with config: {:?}", config);
        Self {
            config: config.clone(),
            bus: BusInterface::new(config, clock, tone, frame),
            keys: KeyMapper::new(),
            tone: handle,
        }
    }

    #[inline]
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    #[inline]
    pub fn bus(&self) -> &BusInterface {
        &self.bus
    }

    #[inline]
    pub fn bus_mut(&mut self) -> &mut BusInterface {
        &mut self.bus
    }

    /// The bus as seen by a CPU core.
    pub fn cpu_bus(&mut self) -> &mut dyn CpuBus {
        &mut self.bus
    }

    pub fn frame(&self) -> Arc<FrameBuffer> {
        self.bus.frame().clone()
    }

    pub fn tone_handle(&self) -> ToneHandle {
        self.tone.clone()
    }

    /// Put a tape in the deck and show its name in the status area. A refused
    /// tape leaves the current one and the status area as they were.
    pub fn insert_tape(&mut self, image: TapeImage) -> Result<(), TapeError> {
        let line = charset::next_tape_line(image.name());
        let name = image.name_lossy();
        self.bus.ppi_mut().insert_tape(image)?;
        self.bus.frame().set_status_row(STATUS_ROW_TAPE, &line);
        log::info!("Tape '{}' ready", name);
        Ok(())
    }

    pub fn clear_status(&mut self) {
        self.bus.frame().clear_status();
    }

    /// Feed a burst of host terminal input. Key presses go to the keyboard
    /// matrix and the status clear key is handled here. The action is
    /// returned so the frontend can act on tape selection.
    pub fn key_input(&mut self, input: &[u8]) -> Option<KeyAction> {
        let port_c = self.bus.ppi().port_c_latch();
        let action = self.keys.map(input, port_c)?;
        match action {
            KeyAction::Keys(chord) => {
                let ppi = self.bus.ppi_mut();
                for (row, pressed) in chord.rows() {
                    ppi.press_keys(row, pressed);
                }
            }
            KeyAction::ClearStatus => self.clear_status(),
            KeyAction::NextTape => {}
        }
        Some(action)
    }

    /// Silence the speaker. Called when the emulator stops.
    pub fn power_off(&mut self) {
        if self.tone.stop() {
            log::debug!("Tone stopped at power off");
        }
    }
}
