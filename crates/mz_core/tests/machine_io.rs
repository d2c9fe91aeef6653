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

    tests::machine_io.rs

    Exercises the machine's peripherals through the CPU's view of the bus.
*/

use std::time::Duration;

use crossbeam_channel::unbounded;
use mz_core::{
    bus::{CpuBus, NO_IO_BYTE},
    charset::NEXT_TAPE_PREFIX,
    clock::{HostClock, ManualClock},
    coreconfig::CoreConfig,
    devices::{
        pit::{PIT_CHANNEL_0_DATA_PORT, PIT_CHANNEL_2_DATA_PORT, PIT_COMMAND_REGISTER, SOUND_ENABLE_PORT, SOUND_ON},
        ppi::{PPI_COMMAND_PORT, PPI_PORT_A, PPI_PORT_B},
    },
    interrupt::PIT_INTERRUPT_DATA,
    keys::KeyAction,
    machine::{Machine, STATUS_ROW_TAPE},
    sound::ToneEvent,
    tape::{TapeError, TapeImage, ATTRIBUTE_OBJ},
    video::DISPLAY_COLUMNS,
};

fn machine(clock: &ManualClock) -> Machine {
    Machine::new(&CoreConfig::default(), Box::new(clock.clone()), None)
}

fn bus_write_word(bus: &mut dyn CpuBus, address: u16, value: u16) {
    bus.mem_write(address, value as u8);
    bus.mem_write(address, (value >> 8) as u8);
}

fn bus_read_word(bus: &mut dyn CpuBus, address: u16) -> u16 {
    let lo = bus.mem_read(address) as u16;
    let hi = bus.mem_read(address) as u16;
    hi << 8 | lo
}

#[test]
fn clock_interrupt_reaches_the_cpu_once() {
    let clock = ManualClock::new();
    let mut machine = machine(&clock);
    let bus = machine.cpu_bus();

    // Monitor style setup: control word first, then the count.
    bus.mem_write(PIT_COMMAND_REGISTER, 0xB0);
    bus_write_word(bus, PIT_CHANNEL_2_DATA_PORT, 43200);
    assert_eq!(bus_read_word(bus, PIT_CHANNEL_2_DATA_PORT), 43200);

    clock.advance_secs(43200);
    assert_eq!(bus_read_word(bus, PIT_CHANNEL_2_DATA_PORT), 0);
    assert_eq!(bus.take_interrupt(), Some(PIT_INTERRUPT_DATA));

    clock.advance_secs(3600);
    assert_eq!(bus_read_word(bus, PIT_CHANNEL_2_DATA_PORT), 0);
    assert_eq!(bus.take_interrupt(), None);
}

#[test]
fn control_register_reads_as_no_device() {
    let clock = ManualClock::new();
    let mut machine = machine(&clock);
    assert_eq!(machine.cpu_bus().mem_read(PIT_COMMAND_REGISTER), NO_IO_BYTE);
    assert_eq!(machine.cpu_bus().mem_read(PPI_COMMAND_PORT), NO_IO_BYTE);
}

#[test]
fn tone_events_follow_sound_enable() {
    let clock = ManualClock::new();
    let (tx, rx) = unbounded();
    let mut machine = Machine::new(&CoreConfig::default(), Box::new(clock.clone()), Some(tx));
    let bus = machine.cpu_bus();

    bus_write_word(bus, PIT_CHANNEL_0_DATA_PORT, 2273);
    bus.mem_write(SOUND_ENABLE_PORT, SOUND_ON);
    match rx.try_recv() {
        Ok(ToneEvent::Start { frequency }) => assert!((frequency - 439.947).abs() < 0.01),
        other => panic!("expected tone start, got {:?}", other),
    }

    // The monitor waits out each note by polling the enable register.
    let before = clock.now();
    for _ in 0..4 {
        bus.mem_read(SOUND_ENABLE_PORT);
    }
    assert_eq!(clock.now() - before, Duration::from_millis(64));

    assert!(machine.tone_handle().is_playing());
    machine.power_off();
    assert_eq!(rx.try_recv(), Ok(ToneEvent::Stop));
    assert!(!machine.tone_handle().is_playing());
}

#[test]
fn typed_key_shows_on_next_scan() {
    let clock = ManualClock::new();
    let mut machine = machine(&clock);
    let action = machine.key_input(b"A");
    assert!(matches!(action, Some(KeyAction::Keys(_))));

    let bus = machine.cpu_bus();
    bus.mem_write(PPI_PORT_A, 0x09);
    assert_eq!(bus.mem_read(PPI_PORT_B), 0xFF);
    bus.mem_write(PPI_PORT_A, 0x04);
    assert_eq!(bus.mem_read(PPI_PORT_B), 0xFE);
    bus.mem_write(PPI_PORT_A, 0x08);
    assert_eq!(bus.mem_read(PPI_PORT_B), 0xFE);
    bus.mem_write(PPI_PORT_A, 0x00);
    assert_eq!(bus.mem_read(PPI_PORT_B), 0xFF);
}

#[test]
fn tape_status_line_shows_and_clears() {
    let clock = ManualClock::new();
    let mut machine = machine(&clock);
    let frame = machine.frame();
    let tape = TapeImage::with_body("GAME", ATTRIBUTE_OBJ, &[0x00]).unwrap();

    // Motor runs at power up, so the change is refused.
    assert!(matches!(machine.insert_tape(tape.clone()), Err(TapeError::MotorRunning)));
    assert!(frame.status_snapshot().iter().all(|&c| c == 0));

    machine.cpu_bus().mem_write(PPI_COMMAND_PORT, 0x07);
    machine.insert_tape(tape).unwrap();

    let status = frame.status_snapshot();
    let row = &status[STATUS_ROW_TAPE * DISPLAY_COLUMNS..(STATUS_ROW_TAPE + 1) * DISPLAY_COLUMNS];
    assert_eq!(&row[..NEXT_TAPE_PREFIX.len()], &NEXT_TAPE_PREFIX);
    assert_eq!(&row[NEXT_TAPE_PREFIX.len()..NEXT_TAPE_PREFIX.len() + 4], &[0x07, 0x01, 0x0D, 0x05]);

    assert_eq!(machine.key_input(b"|"), Some(KeyAction::ClearStatus));
    assert!(frame.status_snapshot().iter().all(|&c| c == 0));
    assert_eq!(machine.key_input(b"~"), Some(KeyAction::NextTape));
}
