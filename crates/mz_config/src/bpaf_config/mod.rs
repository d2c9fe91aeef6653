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

    mz_config::bpaf_config::mod.rs

    Command line arguments. Every argument overrides the matching setting
    from the configuration file. Without the use_bpaf feature nothing is
    parsed and the defaults apply.
*/

use std::path::PathBuf;

#[cfg(feature = "use_bpaf")]
use bpaf::Bpaf;

#[cfg_attr(feature = "use_bpaf", derive(Bpaf))]
#[cfg_attr(feature = "use_bpaf", bpaf(options, version, generate(cli_args)))]
#[derive(Debug, Default)]
pub struct CmdLineArgs {
    #[cfg_attr(feature = "use_bpaf", bpaf(long("config_file"), long("configfile")))]
    pub config_file: Option<PathBuf>,

    #[cfg_attr(feature = "use_bpaf", bpaf(long("tape_dir"), long("tapedir")))]
    pub tape_dir: Option<PathBuf>,

    /// Monitor ROM image, 4096 bytes
    #[cfg_attr(feature = "use_bpaf", bpaf(long("rom")))]
    pub rom: Option<PathBuf>,

    /// Index of the tape to load first, in name order
    #[cfg_attr(feature = "use_bpaf", bpaf(long("tape")))]
    pub tape: Option<usize>,

    /// Play every tape through the deck and check it reads back
    #[cfg_attr(feature = "use_bpaf", bpaf(long, switch))]
    pub verify: bool,

    /// Log the first n pulses of the selected tape
    #[cfg_attr(feature = "use_bpaf", bpaf(long("dump_pulses")))]
    pub dump_pulses: Option<usize>,

    #[cfg_attr(feature = "use_bpaf", bpaf(long("no_sound"), long("nosound"), long("noaudio"), switch))]
    pub no_sound: bool,

    /// Don't stall on sound register reads
    #[cfg_attr(feature = "use_bpaf", bpaf(long("warp"), long("warpspeed"), switch))]
    pub warp: bool,
}
