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

    run_headless.rs

    Headless run loop.

    Wires the simulated controller, the storage engine and the chosen transport into a disk system,
    then drives the scheduler from a tick loop that also services the transport link.
*/

use std::{cell::RefCell, rc::Rc, sync::Arc, time::Instant};

use anyhow::{anyhow, Error};

use disk2_config::{ConfigFileParams, TransportType};
use disk2_core::{
    device_types::geometry::{DriveId, TRACK_COUNT},
    internal_disk::INTERNAL_IMAGE_BASE,
    scheduler::{
        crashlog::{CrashLog, FileCrashStore},
        watchdog::new_timer,
        Scheduler,
        TaskStats,
    },
    storage::{MemStorage, DEFAULT_PAGE_SIZE},
    system::{DiskSystem, STORAGE_SIZE},
    tasks::new_scheduler,
    transport::{ring_pair, BidirectionalChannel, ChannelLink, Link, DEFAULT_RING_SIZE},
};

use crate::{
    image_server::{load_image, pattern_image, ImageServer, ImageServerStats},
    sim_controller::{SimController, SimReport},
};

/// Scheduler passes run per timer tick.
const PASSES_PER_TICK: u32 = 8;
/// Storage engine busy time after a page write, in service calls.
const STORAGE_BUSY_PASSES: u32 = 2;
/// Tracks read from each drive by the simulated controller.
const READ_TRACKS: u8 = 4;

pub struct RunSummary {
    pub ticks: u64,
    pub elapsed: std::time::Duration,
    pub report: SimReport,
    pub status: Vec<String>,
    pub task_stats: Vec<TaskStats>,
    pub crash_log: Vec<String>,
    pub fetch_events: Vec<String>,
    pub reboots: u32,
    pub server_stats: Option<ImageServerStats>,
}

type ServerHandle = std::thread::JoinHandle<ImageServerStats>;

fn open_link(config: &ConfigFileParams, image: &Arc<Vec<u8>>) -> Result<(Box<dyn Link>, Option<ServerHandle>), Error> {
    match config.emulator.transport {
        TransportType::Loopback => {
            let (near, far) = BidirectionalChannel::new_pair();
            let server = ImageServer::new(image.to_vec(), config.emulator.volume)?;
            let handle = server.spawn(far);
            log::info!("Started loopback image server, volume {}", config.emulator.volume);
            Ok((Box::new(ChannelLink::new(near)), Some(handle)))
        }
        TransportType::Serial => open_serial(config).map(|link| (link, None)),
    }
}

#[cfg(feature = "serial")]
fn open_serial(config: &ConfigFileParams) -> Result<Box<dyn Link>, Error> {
    let port = config
        .emulator
        .serial_port
        .as_deref()
        .ok_or_else(|| anyhow!("Serial transport selected but no serial_port configured"))?;
    let link = disk2_core::transport::serial::SerialLink::open(port, config.emulator.baud_rate)?;
    Ok(Box::new(link))
}

#[cfg(not(feature = "serial"))]
fn open_serial(_config: &ConfigFileParams) -> Result<Box<dyn Link>, Error> {
    Err(anyhow!("Serial transport requested, but serial support was not compiled in"))
}

fn crash_log(config: &ConfigFileParams) -> CrashLog {
    match &config.emulator.crash_log {
        Some(path) => CrashLog::new(Box::new(FileCrashStore::new(path))),
        None => CrashLog::default(),
    }
}

pub fn run_emulation(config: &ConfigFileParams) -> Result<RunSummary, Error> {
    let external = Arc::new(match &config.emulator.image {
        Some(path) => load_image(path)?,
        None => {
            log::info!("No image configured, serving a generated test pattern");
            pattern_image()
        }
    });
    let internal = match &config.emulator.internal_image {
        Some(path) => Some(Arc::new(load_image(path)?)),
        None => None,
    };

    let mut storage = MemStorage::new(STORAGE_SIZE, DEFAULT_PAGE_SIZE, STORAGE_BUSY_PASSES);
    if let Some(image) = &internal {
        storage = storage.with_contents(INTERNAL_IMAGE_BASE, image)?;
    }

    let (transport, mut isr) = ring_pair(DEFAULT_RING_SIZE);
    let (mut link, server) = open_link(config, &external)?;

    // The server side of a serial link is another machine; we can't check what it sends.
    let external_check = match config.emulator.transport {
        TransportType::Loopback => Some(external.clone()),
        TransportType::Serial => None,
    };

    let report = Rc::new(RefCell::new(SimReport::default()));
    let mut sim = SimController::new([external_check, internal.clone()], report.clone());
    sim.queue_tracks(DriveId::External, 0..READ_TRACKS.min(TRACK_COUNT as u8));
    if internal.is_some() {
        sim.queue_tracks(DriveId::Internal, 0..READ_TRACKS.min(TRACK_COUNT as u8));
    }

    let core = config.core_config();
    let (timer, watchdog, timer_isr) = new_timer(core.scheduler.watchdog_max);
    let crash_log = crash_log(config);
    for line in crash_log.previous() {
        log::warn!("Previous crash: {}", line);
    }

    let system = DiskSystem::new(core, Box::new(sim), Box::new(transport), Box::new(storage));
    let mut sched = new_scheduler(system, timer, watchdog, crash_log);

    let start = Instant::now();
    let mut ticks = 0;
    while ticks < config.emulator.run_ticks {
        timer_isr.tick();
        if let Err(e) = link.pump(&mut isr) {
            log::error!("{} link: {}", link.name(), e);
            break;
        }
        for _ in 0..PASSES_PER_TICK {
            sched.run_pass();
        }
        ticks += 1;
        if report.borrow().done {
            break;
        }
        // Give the image server thread a chance to answer.
        std::thread::yield_now();
    }

    let summary = summarize(&mut sched, ticks, start, report.borrow().clone());
    drop(sched);
    drop(link);

    let server_stats = server.and_then(|handle| handle.join().ok());
    Ok(RunSummary { server_stats, ..summary })
}

fn summarize(sched: &mut Scheduler<DiskSystem>, ticks: u64, start: Instant, report: SimReport) -> RunSummary {
    sched.context_mut().flush_trace();
    let system = sched.context();
    RunSummary {
        ticks,
        elapsed: start.elapsed(),
        report,
        status: system.status(),
        task_stats: sched.task_stats(),
        crash_log: sched.crash_log().dump(),
        fetch_events: system.fetch().event_log().as_vec(),
        reboots: sched.reboots(),
        server_stats: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_run_reads_every_sector() {
        let mut config = disk2_config::read_config("[emulator]\n", Default::default()).unwrap();
        config.emulator.run_ticks = 200_000;

        let summary = run_emulation(&config).unwrap();
        assert!(summary.report.done, "{}", summary.report);
        assert_eq!(summary.report.sectors_ok, READ_TRACKS as u64 * 16);
        assert!(!summary.report.failed());
        assert_eq!(summary.reboots, 0);
        assert!(summary.server_stats.map(|s| s.requests > 0).unwrap_or(false));
    }
}
