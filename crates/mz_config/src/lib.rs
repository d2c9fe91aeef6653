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

    mz_config::lib.rs

    Configuration file and command line handling for MZ-Pico.
*/


//! The `mz_config` crate reads MZ-Pico's configuration file and overlays
//! command line arguments on top of it. Command line arguments always take
//! priority over the configuration file.
//!
//! Features:
//! - `use_bpaf`: Enable BPAF support for command line argument parsing.

mod bpaf_config;

use std::path::{Path, PathBuf};

#[cfg(feature = "use_bpaf")]
use bpaf_config::cli_args;
pub use bpaf_config::CmdLineArgs;

use cfg_if::cfg_if;
use mz_core::coreconfig::CoreConfig;
use serde_derive::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "mzpico.toml";

const fn _default_true() -> bool {
    true
}
fn _default_tape_dir() -> PathBuf {
    PathBuf::from("tapes")
}

#[derive(Debug, Deserialize)]
pub struct Emulator {
    #[serde(default = "_default_tape_dir")]
    pub tape_dir: PathBuf,
    pub monitor_rom: Option<PathBuf>,
    /// Tape to load at startup, as an index into the sorted tape directory.
    #[serde(default)]
    pub initial_tape: usize,
    #[serde(default)]
    pub verify: bool,
    pub dump_pulses: Option<usize>,
    #[serde(default)]
    pub dump_status: bool,
    #[serde(default = "_default_true")]
    pub sound: bool,
    #[serde(default)]
    pub warpspeed: bool,
}

impl Default for Emulator {
    fn default() -> Self {
        Self {
            tape_dir: _default_tape_dir(),
            monitor_rom: None,
            initial_tape: 0,
            verify: false,
            dump_pulses: None,
            dump_status: false,
            sound: true,
            warpspeed: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFileParams {
    #[serde(default)]
    pub emulator: Emulator,
    #[serde(default)]
    pub machine: CoreConfig,
}

impl ConfigFileParams {
    pub fn overlay(&mut self, shell_args: CmdLineArgs) {
        if let Some(tape_dir) = shell_args.tape_dir {
            self.emulator.tape_dir = tape_dir;
        }
        if let Some(rom) = shell_args.rom {
            self.emulator.monitor_rom = Some(rom);
        }
        if let Some(tape) = shell_args.tape {
            self.emulator.initial_tape = tape;
        }
        if let Some(pulses) = shell_args.dump_pulses {
            self.emulator.dump_pulses = Some(pulses);
        }

        self.emulator.verify |= shell_args.verify;
        self.emulator.warpspeed |= shell_args.warp;

        if shell_args.no_sound {
            self.emulator.sound = false;
        }
        if self.emulator.warpspeed {
            self.machine.sound_register_delay_ms = 0;
        }
    }
}

/// Parse the TOML configuration in `toml_string` and overlay `shell_args`.
pub fn read_config(toml_string: impl AsRef<str>, shell_args: CmdLineArgs) -> Result<ConfigFileParams, anyhow::Error> {
    let mut toml_args: ConfigFileParams = toml::from_str(toml_string.as_ref())?;

    log::debug!("toml_config: {:?}", toml_args);
    toml_args.overlay(shell_args);

    Ok(toml_args)
}

fn shell_args() -> CmdLineArgs {
    let shell_args: CmdLineArgs;

    cfg_if! {
        if #[cfg(feature = "use_bpaf")] {
            log::debug!("Reading command line arguments...");
            shell_args = cli_args().run();
        } else {
            log::debug!("Argument reading disabled...");
            shell_args = CmdLineArgs::default();
        }
    }

    shell_args
}

/// Read the command line, then the configuration file it names or
/// `default_path`, and combine the two.
pub fn read_config_file<P>(default_path: P) -> Result<ConfigFileParams, anyhow::Error>
where
    P: AsRef<Path>,
{
    let shell_args = shell_args();

    let toml_string = if let Some(configfile_path) = &shell_args.config_file {
        std::fs::read_to_string(configfile_path)?
    }
    else {
        std::fs::read_to_string(default_path)?
    };

    read_config(toml_string, shell_args)
}

/// Read the TOML configuration from a string, parse and overlay command line
/// arguments.
pub fn read_config_string(toml_string: impl AsRef<str>) -> Result<ConfigFileParams, anyhow::Error> {
    read_config(toml_string, shell_args())
}
