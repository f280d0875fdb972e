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

    coreconfig.rs

    Settings the core needs from whatever configuration store the frontend uses.

    The frontend deserializes its own file format and hands the core a CoreConfig. The
    section structs derive Deserialize so a frontend can embed them directly.
*/

use std::path::PathBuf;

use serde_derive::Deserialize;

use crate::{
    device_types::geometry::DEFAULT_VOLUME,
    fetch::client::DEFAULT_RETRY_LIMIT,
    scheduler::SchedulerConfig,
};

pub const DEFAULT_BURST_POLL_LIMIT: u32 = 5;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub retry_limit: u32,
    pub whole_track: bool,
    pub mirror_validated_tracks: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            whole_track: false,
            mirror_validated_tracks: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Keep feeding the active sector while the controller keeps draining bytes.
    pub burst: bool,
    pub burst_poll_limit: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            burst: true,
            burst_poll_limit: DEFAULT_BURST_POLL_LIMIT,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Log every change of the controller status register's upper bits.
    pub controller: bool,
    /// Log arm movement.
    pub track_change: bool,
    /// Record the raw fetch stream to this file.
    pub fetch_trace_file: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct CoreConfig {
    /// Volume announced by the internal drive.
    pub volume: u8,
    pub scheduler: SchedulerConfig,
    pub fetch: FetchConfig,
    pub drive: DriveConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            scheduler: Default::default(),
            fetch: Default::default(),
            drive: Default::default(),
            diagnostics: Default::default(),
        }
    }
}
