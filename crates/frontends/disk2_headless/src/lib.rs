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

    Disk2Emu headless front-end main library component.
*/

#![forbid(unsafe_code)]

mod image_server;
mod run_headless;
mod sim_controller;

use disk2_config::DEFAULT_CONFIG_FILE;

use crate::run_headless::{run_emulation, RunSummary};

pub fn run() {
    env_logger::init();

    let config = match disk2_config::read_config_file(DEFAULT_CONFIG_FILE) {
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

    let summary = run_emulation(&config).unwrap_or_else(|e| {
        log::error!("Emulation failed: {:?}", e);
        std::process::exit(1);
    });

    print_summary(&summary);

    if summary.report.failed() || !summary.report.done {
        std::process::exit(2);
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Ran {} ticks in {:.2}s, {} reboot(s)",
        summary.ticks,
        summary.elapsed.as_secs_f64(),
        summary.reboots
    );
    println!("Sectors: {}", summary.report);
    if let Some(stats) = &summary.server_stats {
        println!(
            "Image server: {} requests, {} sectors, {} tracks, {} bad",
            stats.requests, stats.sectors_sent, stats.tracks_sent, stats.bad_requests
        );
    }

    println!("Status:");
    for line in &summary.status {
        println!("  {}", line);
    }

    println!("Tasks:");
    for task in &summary.task_stats {
        println!(
            "  {:<10} runs:{:<8} skipped:{:<6} time:{:?}",
            task.name, task.invocations, task.skipped, task.runtime
        );
    }

    if !summary.fetch_events.is_empty() {
        println!("Recent fetch events:");
        for event in &summary.fetch_events {
            println!("  {}", event);
        }
    }

    if !summary.crash_log.is_empty() {
        println!("Crash log:");
        for line in &summary.crash_log {
            println!("  {}", line);
        }
    }
}
