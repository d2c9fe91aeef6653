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

    mzpico_headless::lib.rs

    Headless frontend. Builds the machine from the configuration file, manages
    the tape library and drives the keyboard from the terminal.
*/


//! MZ-Pico headless front-end main library component.

#![forbid(unsafe_code)]

mod tape_manager;
mod tape_verifier;

use std::{
    io::{self, BufRead},
    thread::{self, JoinHandle},
};

use anyhow::Error;
use colored::Colorize;
use crossbeam_channel::unbounded;

use mz_config::{ConfigFileParams, DEFAULT_CONFIG_FILE};
use mz_core::{
    clock::SystemClock,
    keys::KeyAction,
    machine::Machine,
    sound::{tone_event_loop, ToneEvent},
    video::{FrameBuffer, DISPLAY_COLUMNS, STATUS_ROWS},
};

pub use crate::{
    tape_manager::{TapeManager, TapeManagerError},
    tape_verifier::{dump_pulses, set_motor, verify_tape, VerifyReport},
};

const ESC: u8 = 0x1B;
const CR: u8 = 0x0D;

pub fn run() {
    env_logger::init();

    let config = match mz_config::read_config_file(DEFAULT_CONFIG_FILE) {
        Ok(config) => config,
        Err(e) => match e.downcast_ref::<std::io::Error>() {
            Some(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!(
                    "Configuration file not found! Please create {} in the emulator directory \
                               or provide the path to configuration file with --configfile.",
                    DEFAULT_CONFIG_FILE
                );
                std::process::exit(1);
            }
            Some(e) => {
                eprintln!("Unknown IO error reading configuration file:\n{}", e);
                std::process::exit(1);
            }
            None => {
                eprintln!(
                    "Failed to parse configuration file. There may be a typo or otherwise invalid toml:\n{}",
                    e
                );
                std::process::exit(1);
            }
        },
    };

    let (mut machine, tone_thread) = build_machine(&config);

    if let Some(rom_path) = &config.emulator.monitor_rom {
        let loaded = std::fs::read(rom_path)
            .map_err(Error::from)
            .and_then(|rom| machine.bus_mut().load_monitor_rom(&rom).map_err(Error::from));
        if let Err(e) = loaded {
            eprintln!("Failed to load monitor ROM {:?}: {}", rom_path, e);
            std::process::exit(1);
        }
    }

    let mut tape_manager = TapeManager::new();
    if let Err(e) = tape_manager.scan_dir(&config.emulator.tape_dir) {
        log::warn!("{}", e);
    }

    if config.emulator.verify {
        let failures = verify_all(&mut machine, &tape_manager);
        shutdown(machine, tone_thread);
        std::process::exit(if failures > 0 { 1 } else { 0 });
    }

    // The monitor stops the motor during reset. Do the same so the first tape
    // can go in.
    set_motor(machine.cpu_bus(), false);
    if tape_manager.count() > 0 {
        if let Err(e) = select_tape(&mut machine, &mut tape_manager, config.emulator.initial_tape) {
            eprintln!("Failed to load initial tape: {}", e);
        }
    }

    if let Some(count) = config.emulator.dump_pulses {
        match dump_pulses(machine.cpu_bus(), count) {
            Ok(dump) => println!("{}", dump),
            Err(e) => eprintln!("Pulse dump failed: {}", e),
        }
        // Put the tape back at the start.
        if let Some(idx) = tape_manager.current() {
            if let Err(e) = select_tape(&mut machine, &mut tape_manager, idx) {
                log::error!("Failed to rewind tape: {}", e);
            }
        }
    }

    if config.emulator.dump_status {
        print!("{}", status_dump(&machine.frame()));
    }

    console(&mut machine, &mut tape_manager);
    shutdown(machine, tone_thread);
}

fn build_machine(config: &ConfigFileParams) -> (Machine, Option<JoinHandle<()>>) {
    if !config.emulator.sound {
        let machine = Machine::new(&config.machine, Box::new(SystemClock::new()), None);
        return (machine, None);
    }

    let (sender, receiver) = unbounded();
    let machine = Machine::new(&config.machine, Box::new(SystemClock::new()), Some(sender));
    let handle = machine.tone_handle().downgrade();
    let timeout = config.machine.tone_timeout();

    let spawned = thread::Builder::new().name("tone".to_string()).spawn(move || {
        tone_event_loop(receiver, handle, timeout, |event| match event {
            ToneEvent::Start { frequency } => log::info!("Tone on: {:.1}Hz", frequency),
            ToneEvent::Stop => log::info!("Tone off"),
        })
    });

    match spawned {
        Ok(thread) => (machine, Some(thread)),
        Err(e) => {
            log::error!("Couldn't start tone thread: {}", e);
            (machine, None)
        }
    }
}

fn shutdown(mut machine: Machine, tone_thread: Option<JoinHandle<()>>) {
    machine.power_off();
    // Dropping the machine closes the tone channel.
    drop(machine);
    if let Some(thread) = tone_thread {
        if thread.join().is_err() {
            log::error!("Tone thread panicked");
        }
    }
}

/// Load tape `idx` and put it in the deck. On failure the previous tape stays.
pub fn select_tape(machine: &mut Machine, tape_manager: &mut TapeManager, idx: usize) -> Result<(), Error> {
    let image = tape_manager.load(idx)?;
    machine.insert_tape(image)?;
    tape_manager.set_current(idx);
    Ok(())
}

/// Advance to the next tape in the library, wrapping after the last one.
pub fn next_tape(machine: &mut Machine, tape_manager: &mut TapeManager) -> Result<usize, Error> {
    let idx = tape_manager.next_index()?;
    select_tape(machine, tape_manager, idx)?;
    Ok(idx)
}

fn verify_all(machine: &mut Machine, tape_manager: &TapeManager) -> usize {
    let mut failures = 0;
    for (idx, name) in tape_manager.image_names().iter().enumerate() {
        set_motor(machine.cpu_bus(), false);
        let result = tape_manager
            .load(idx)
            .map_err(Error::from)
            .and_then(|image| machine.insert_tape(image).map_err(Error::from))
            .and_then(|_| verify_tape(machine.cpu_bus()));

        match result {
            Ok(report) => println!("{} {:?}: {}", "PASS".green(), name, report),
            Err(e) => {
                failures += 1;
                println!("{} {:?}: {}", "FAIL".red(), name, e);
            }
        }
    }
    println!("{} tapes verified, {} failed", tape_manager.count(), failures);
    failures
}

/// Feed terminal input to the keyboard a line at a time. Ends at end of input.
fn console(machine: &mut Machine, tape_manager: &mut TapeManager) {
    let stdin = io::stdin();
    for line in stdin.lock().split(b'\n') {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Error reading terminal input: {}", e);
                break;
            }
        };

        for burst in key_bursts(&line) {
            match machine.key_input(burst) {
                Some(KeyAction::NextTape) => match next_tape(machine, tape_manager) {
                    Ok(idx) => println!("Tape {} selected", idx),
                    Err(e) => println!("Tape not changed: {}", e),
                },
                Some(KeyAction::ClearStatus) => println!("Status cleared"),
                Some(KeyAction::Keys(chord)) => log::debug!("Keys: {:?}", chord),
                None => {}
            }
        }
    }
}

/// Split a line of terminal input into the bursts a terminal would send for
/// single key presses. Escape sequences stay whole and the line ends in CR.
pub fn key_bursts(line: &[u8]) -> Vec<&[u8]> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let mut bursts = Vec::new();
    let mut i = 0;

    while i < line.len() {
        let len = if line[i] == ESC {
            // ESC, the introducer, then parameters up to a final byte.
            line[i..]
                .iter()
                .skip(2)
                .position(|c| (0x40..=0x7E).contains(c))
                .map_or(line.len() - i, |end| end + 3)
        }
        else {
            1
        };
        bursts.push(&line[i..i + len]);
        i += len;
    }
    bursts.push(std::slice::from_ref(&CR));
    bursts
}

/// The status area as rows of display codes in hex.
pub fn status_dump(frame: &FrameBuffer) -> String {
    let status = frame.status_snapshot();
    let mut out = String::new();
    for row in status.chunks(DISPLAY_COLUMNS).take(STATUS_ROWS) {
        let codes: Vec<String> = row.iter().map(|c| format!("{:02X}", c)).collect();
        out.push_str(&codes.join(" "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mz_core::{clock::ManualClock, coreconfig::CoreConfig, machine::STATUS_ROW_TAPE, tape::TapeImage};

    #[test]
    fn bursts_keep_escape_sequences_whole() {
        let bursts = key_bursts(b"ab\x1b[A\x1b[5~\x1bOF~\r");
        let expected: Vec<&[u8]> = vec![
            &b"a"[..],
            &b"b"[..],
            &b"\x1b[A"[..],
            &b"\x1b[5~"[..],
            &b"\x1bOF"[..],
            &b"~"[..],
            &b"\r"[..],
        ];
        assert_eq!(bursts, expected);

        let cut_short = key_bursts(b"\x1b[1");
        assert_eq!(cut_short, vec![&b"\x1b[1"[..], &b"\r"[..]]);
        assert_eq!(key_bursts(b""), vec![&b"\r"[..]]);
    }

    #[test]
    fn status_dump_shows_tape_row() {
        let mut machine = Machine::new(&CoreConfig::default(), Box::new(ManualClock::new()), None);
        set_motor(machine.cpu_bus(), false);
        machine
            .insert_tape(TapeImage::with_body("Z", 1, &[0]).unwrap())
            .unwrap();

        let dump = status_dump(&machine.frame());
        let rows: Vec<&str> = dump.lines().collect();
        assert_eq!(rows.len(), STATUS_ROWS);
        assert!(rows[0].split(' ').all(|c| c == "00"));
        assert!(rows[STATUS_ROW_TAPE].starts_with("0E 85 98 94 00"));
        assert_eq!(rows[STATUS_ROW_TAPE].split(' ').nth(14), Some("1A"));
    }
}
