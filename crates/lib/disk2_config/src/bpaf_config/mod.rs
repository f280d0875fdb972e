/*
    Disk2Emu

    Copyright 2025 The Disk2Emu Authors

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

    bpaf_config::mod.rs

    Command line arguments, parsed with bpaf.

    Every option here overrides its configuration file counterpart.
*/

use std::path::PathBuf;

use crate::TransportType;

use bpaf::Bpaf;

#[cfg_attr(feature = "use_bpaf", derive(Bpaf))]
#[cfg_attr(feature = "use_bpaf", bpaf(options, version, generate(cli_args)))]
#[derive(Debug, Default)]
pub struct CmdLineArgs {
    #[bpaf(long("config_file"), long("configfile"))]
    pub config_file: Option<PathBuf>,

    /// Disk image served to the external drive
    #[bpaf(long)]
    pub image: Option<PathBuf>,

    /// Image preloaded for the internal drive
    #[bpaf(long("internal_image"))]
    pub internal_image: Option<PathBuf>,

    #[bpaf(long)]
    pub volume: Option<u8>,

    /// Run for this many milliseconds, then dump status and exit
    #[bpaf(long("run_ticks"))]
    pub run_ticks: Option<u64>,

    #[bpaf(long)]
    pub transport: Option<TransportType>,

    #[bpaf(long("serial_port"))]
    pub serial_port: Option<String>,

    #[bpaf(long("whole_track"), switch)]
    pub whole_track: bool,

    #[bpaf(long("no_burst"), switch)]
    pub no_burst: bool,

    #[bpaf(long("trace_controller"), switch)]
    pub trace_controller: bool,

    #[bpaf(long("trace_track_change"), switch)]
    pub trace_track_change: bool,
}
