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

    lib.rs

    Configuration file and command line handling for Disk2Emu.

    The configuration is read from a TOML file, then command line arguments are overlaid on top
    of it. Command line arguments always take priority.
*/

//! The `disk2_config` crate reads Disk2Emu's configuration file and overlays command line
//! arguments on top of it.
//!
//! Features:
//! - `use_bpaf`: Enable BPAF support for command line argument parsing.

#[cfg(feature = "use_bpaf")]
mod bpaf_config;

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

#[cfg(feature = "use_bpaf")]
pub use bpaf_config::{cli_args, CmdLineArgs};

use disk2_core::{
    coreconfig::{CoreConfig, DiagnosticsConfig, DriveConfig, FetchConfig},
    device_types::geometry::DEFAULT_VOLUME,
    scheduler::SchedulerConfig,
};

use cfg_if::cfg_if;
use serde_derive::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "disk2emu.toml";
pub const DEFAULT_RUN_TICKS: u64 = 10_000;
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

const fn _default_volume() -> u8 {
    DEFAULT_VOLUME
}
const fn _default_run_ticks() -> u64 {
    DEFAULT_RUN_TICKS
}
const fn _default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

/// Without bpaf the only argument honored is the configuration file path, and it is never set.
#[cfg(not(feature = "use_bpaf"))]
#[derive(Debug, Default)]
pub struct CmdLineArgs {
    pub config_file: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    #[default]
    Loopback,
    Serial,
}

impl FromStr for TransportType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String>
    where
        Self: Sized,
    {
        match s.to_lowercase().as_str() {
            "loopback" => Ok(TransportType::Loopback),
            "serial" => Ok(TransportType::Serial),
            _ => Err("Bad value for transport".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Emulator {
    pub image: Option<PathBuf>,
    #[serde(default = "_default_volume")]
    pub volume: u8,
    pub internal_image: Option<PathBuf>,
    #[serde(default = "_default_run_ticks")]
    pub run_ticks: u64,
    #[serde(default)]
    pub transport: TransportType,
    pub serial_port: Option<String>,
    #[serde(default = "_default_baud_rate")]
    pub baud_rate: u32,
    pub crash_log: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ConfigFileParams {
    pub emulator: Emulator,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl ConfigFileParams {
    #[cfg(feature = "use_bpaf")]
    pub fn overlay(&mut self, shell_args: CmdLineArgs) {
        if let Some(image) = shell_args.image {
            self.emulator.image = Some(image);
        }
        if let Some(internal_image) = shell_args.internal_image {
            self.emulator.internal_image = Some(internal_image);
        }
        if let Some(volume) = shell_args.volume {
            self.emulator.volume = volume;
        }
        if let Some(run_ticks) = shell_args.run_ticks {
            self.emulator.run_ticks = run_ticks;
        }
        if let Some(transport) = shell_args.transport {
            self.emulator.transport = transport;
        }
        if let Some(serial_port) = shell_args.serial_port {
            self.emulator.serial_port = Some(serial_port);
            self.emulator.transport = TransportType::Serial;
        }

        self.fetch.whole_track |= shell_args.whole_track;
        self.drive.burst &= !shell_args.no_burst;
        self.diagnostics.controller |= shell_args.trace_controller;
        self.diagnostics.track_change |= shell_args.trace_track_change;
    }

    /// The subset of settings the emulation core consumes.
    pub fn core_config(&self) -> CoreConfig {
        CoreConfig {
            volume: self.emulator.volume,
            scheduler: self.scheduler.clone(),
            fetch: self.fetch.clone(),
            drive: self.drive.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

pub fn read_config(toml_string: impl AsRef<str>, shell_args: CmdLineArgs) -> Result<ConfigFileParams, anyhow::Error> {
    #[allow(unused_mut)]
    let mut toml_args: ConfigFileParams = toml::from_str(toml_string.as_ref())?;

    // Command line arguments override config file arguments
    cfg_if! {
        if #[cfg(feature = "use_bpaf")] {
            toml_args.overlay(shell_args);
        }
        else {
            let _ = shell_args;
        }
    }

    Ok(toml_args)
}

#[cfg(feature = "use_bpaf")]
fn shell_args() -> CmdLineArgs {
    log::debug!("Reading command line arguments...");
    cli_args().run()
}

#[cfg(not(feature = "use_bpaf"))]
fn shell_args() -> CmdLineArgs {
    log::debug!("Argument reading disabled...");
    CmdLineArgs::default()
}

/// Read the TOML configuration from a file path, parse and overlay command line arguments.
pub fn read_config_file<P>(default_path: P) -> Result<ConfigFileParams, anyhow::Error>
where
    P: AsRef<Path>,
{
    let args = shell_args();

    // Allow configuration file path to be overridden by command line argument 'config_file'
    let toml_string = if let Some(configfile_path) = args.config_file.as_ref() {
        std::fs::read_to_string(configfile_path)?
    }
    else {
        std::fs::read_to_string(default_path)?
    };

    read_config(toml_string, args)
}

/// Read the TOML configuration from a string, parse and overlay command line arguments.
pub fn read_config_string(toml_string: impl AsRef<str>) -> Result<ConfigFileParams, anyhow::Error> {
    read_config(toml_string, shell_args())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[emulator]
image = "disks/master.dsk"
"#;

    const FULL: &str = r#"
[emulator]
image = "disks/master.dsk"
volume = 17
internal_image = "disks/internal.dsk"
run_ticks = 2500
transport = "serial"
serial_port = "/dev/ttyUSB0"
baud_rate = 230400
crash_log = "crash.log"

[scheduler]
watchdog_max = 8000
yield_max = 2000
max_nesting = 4

[fetch]
retry_limit = 200
whole_track = true
mirror_validated_tracks = true

[drive]
burst = false
burst_poll_limit = 9

[diagnostics]
controller = true
track_change = true
fetch_trace_file = "fetch.trace"
"#;

    #[test]
    fn defaults_fill_missing_sections() {
        let config = read_config(MINIMAL, CmdLineArgs::default()).unwrap();
        assert_eq!(config.emulator.image, Some(PathBuf::from("disks/master.dsk")));
        assert_eq!(config.emulator.volume, DEFAULT_VOLUME);
        assert_eq!(config.emulator.run_ticks, DEFAULT_RUN_TICKS);
        assert_eq!(config.emulator.transport, TransportType::Loopback);

        let core = config.core_config();
        assert_eq!(core.scheduler.watchdog_max, 5000);
        assert_eq!(core.scheduler.yield_max, 1000);
        assert_eq!(core.fetch.retry_limit, 1000);
        assert!(core.drive.burst);
        assert_eq!(core.drive.burst_poll_limit, 5);
        assert!(core.diagnostics.fetch_trace_file.is_none());
    }

    #[test]
    fn every_section_is_read() {
        let config = read_config(FULL, CmdLineArgs::default()).unwrap();
        assert_eq!(config.emulator.transport, TransportType::Serial);
        assert_eq!(config.emulator.baud_rate, 230400);
        let core = config.core_config();
        assert_eq!(core.volume, 17);
        assert_eq!(core.scheduler.max_nesting, 4);
        assert!(core.fetch.whole_track && core.fetch.mirror_validated_tracks);
        assert_eq!(core.fetch.retry_limit, 200);
        assert!(!core.drive.burst);
        assert!(core.diagnostics.controller && core.diagnostics.track_change);
        assert_eq!(core.diagnostics.fetch_trace_file, Some(PathBuf::from("fetch.trace")));
    }

    #[test]
    fn missing_emulator_section_is_an_error() {
        assert!(read_config("[fetch]\nwhole_track = true\n", CmdLineArgs::default()).is_err());
    }

    #[test]
    fn transport_from_str() {
        assert_eq!("Serial".parse::<TransportType>(), Ok(TransportType::Serial));
        assert!("usb".parse::<TransportType>().is_err());
    }

    #[cfg(feature = "use_bpaf")]
    #[test]
    fn command_line_overrides_file() {
        let args = CmdLineArgs {
            volume: Some(3),
            run_ticks: Some(50),
            serial_port: Some("COM3".to_string()),
            whole_track: true,
            no_burst: true,
            trace_track_change: true,
            ..Default::default()
        };
        let config = read_config(MINIMAL, args).unwrap();
        assert_eq!(config.emulator.volume, 3);
        assert_eq!(config.emulator.run_ticks, 50);
        assert_eq!(config.emulator.transport, TransportType::Serial);
        let core = config.core_config();
        assert!(core.fetch.whole_track);
        assert!(!core.drive.burst);
        assert!(core.diagnostics.track_change);
        assert!(!core.diagnostics.controller);
    }
}
