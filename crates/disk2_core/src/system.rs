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

    system.rs

    The shared context every scheduler task works on.

    DiskSystem owns the hardware handles (controller registers, transport, storage) and the
    emulation state built on them. Tasks borrow it through the scheduler one at a time.
*/

use std::collections::VecDeque;

use crate::{
    cache::TrackCache,
    controller::DriveController,
    coreconfig::CoreConfig,
    device_types::geometry::{DriveId, DISK_SIZE, DRIVE_COUNT, TRACK_SIZE},
    fetch::{client::ServiceOutcome, FetchClient},
    hal::{ByteTransport, DiskControllerRegs},
    head::FillRequester,
    internal_disk::{InternalDisk, INTERNAL_IMAGE_BASE},
    storage::{StorageContext, StorageEngine},
    tracelogger::TraceLogger,
};

/// Offset in storage where CRC-validated external tracks are mirrored.
pub const MIRROR_BASE: usize = INTERNAL_IMAGE_BASE + DISK_SIZE;
/// Storage needed for the internal image plus the mirror.
pub const STORAGE_SIZE: usize = MIRROR_BASE + DISK_SIZE;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FillTarget {
    pub track:  u8,
    pub volume: u8,
    pub sector: u8,
}

/// Fill requests raised by the head during a drive pass, dispatched once the pass is over.
/// Only the latest request per drive is kept.
#[derive(Debug, Default)]
pub struct FillQueue {
    requests: [Option<FillTarget>; DRIVE_COUNT],
}

impl FillQueue {
    pub fn take(&mut self, drive: DriveId) -> Option<FillTarget> {
        self.requests[drive.index()].take()
    }

    pub fn clear(&mut self) {
        self.requests = Default::default();
    }
}

impl FillRequester for FillQueue {
    fn request_fill(&mut self, drive: DriveId, track: u8, volume: u8, sector: u8) {
        self.requests[drive.index()] = Some(FillTarget { track, volume, sector });
    }
}

pub struct DiskSystem {
    config: CoreConfig,
    regs: Box<dyn DiskControllerRegs>,
    transport: Box<dyn ByteTransport>,
    storage: Box<dyn StorageEngine>,
    controller: DriveController,
    cache: TrackCache,
    fetch: FetchClient,
    internal: InternalDisk,
    fills: FillQueue,
    mirror_queue: VecDeque<u8>,
    tracks_mirrored: u64,
}

impl DiskSystem {
    pub fn new(
        config: CoreConfig,
        regs: Box<dyn DiskControllerRegs>,
        transport: Box<dyn ByteTransport>,
        storage: Box<dyn StorageEngine>,
    ) -> Self {
        let trace = match &config.diagnostics.fetch_trace_file {
            Some(path) => TraceLogger::from_filename(path),
            None => TraceLogger::None,
        };
        if storage.size() < STORAGE_SIZE {
            log::warn!(
                "Storage is {} bytes; the internal image and track mirror need {}",
                storage.size(),
                STORAGE_SIZE
            );
        }
        Self {
            controller: DriveController::new(config.volume, &config.drive, &config.diagnostics),
            cache: TrackCache::new(),
            fetch: FetchClient::new(config.fetch.retry_limit, config.fetch.whole_track, trace),
            internal: InternalDisk::new(INTERNAL_IMAGE_BASE),
            fills: Default::default(),
            mirror_queue: VecDeque::new(),
            tracks_mirrored: 0,
            config,
            regs,
            transport,
            storage,
        }
    }

    /// Bring emulation state back to power-on. Hardware handles are kept, and so is an inserted
    /// external disk.
    pub fn reinit(&mut self) {
        self.controller.reset();
        self.cache = TrackCache::new();
        self.fetch.restart();
        self.internal.cancel();
        self.fills.clear();
        self.mirror_queue.clear();
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn controller(&self) -> &DriveController {
        &self.controller
    }

    pub fn cache(&self) -> &TrackCache {
        &self.cache
    }

    pub fn fetch(&self) -> &FetchClient {
        &self.fetch
    }

    pub fn internal(&self) -> &InternalDisk {
        &self.internal
    }

    pub fn storage_engine(&self) -> &dyn StorageEngine {
        &*self.storage
    }

    pub fn tracks_mirrored(&self) -> u64 {
        self.tracks_mirrored
    }

    /// Poll the controller once, then pass on whatever the head asked for.
    pub fn drive_pass(&mut self) -> u32 {
        let written = self.controller.run_once(&mut *self.regs, &self.cache, &mut self.fills);
        self.dispatch_fills();
        written
    }

    fn dispatch_fills(&mut self) {
        if let Some(t) = self.fills.take(DriveId::External) {
            let request = self.fetch.request_for(t.sector);
            self.fetch
                .request_fill(&mut *self.transport, &mut self.cache, t.track, t.volume, request);
        }
        if let Some(t) = self.fills.take(DriveId::Internal) {
            self.internal.request(t.track, t.volume);
        }
    }

    /// Drain the external transport.
    pub fn fetch_pass(&mut self) -> ServiceOutcome {
        let outcome = self.fetch.service(
            &mut *self.transport,
            &mut self.cache,
            self.controller.drive_mut(DriveId::External),
        );

        if outcome.inserted && self.controller.head().active_drive() != Some(DriveId::Internal) {
            self.controller.reset_head();
        }
        if let Some(track) = outcome.validated_track {
            if self.config.fetch.mirror_validated_tracks {
                self.mirror_queue.push_back(track);
            }
        }
        outcome
    }

    pub fn internal_pass(&mut self) -> bool {
        self.internal.service(&mut *self.storage, &mut self.cache)
    }

    pub fn storage_pass(&mut self) {
        self.storage.service();
    }

    /// Next validated track to mirror: its storage offset and a copy of its data. Tracks that
    /// have since left the cache are skipped.
    pub fn take_mirror(&mut self) -> Option<(usize, Vec<u8>)> {
        while let Some(track) = self.mirror_queue.pop_front() {
            let line = self.cache.line(DriveId::External);
            if line.track() == Some(track) && line.validated() {
                return Some((MIRROR_BASE + track as usize * TRACK_SIZE, line.data().to_vec()));
            }
            log::debug!("Mirror: track {} no longer cached", track);
        }
        None
    }

    pub fn mirror_done(&mut self) {
        self.tracks_mirrored += 1;
    }

    pub fn flush_trace(&mut self) {
        self.fetch.flush_trace();
    }

    /// Human readable state for the status dump.
    pub fn status(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let head = self.controller.head();
        lines.push(format!(
            "head: {} drive {:?} at {} ({} bytes)",
            <&'static str>::from(head.state()),
            head.active_drive(),
            head.position(),
            head.bytes_sent()
        ));
        for drive in DriveId::all() {
            let ds = self.controller.drive(drive);
            let line = self.cache.line(drive);
            lines.push(format!(
                "{}: ht {} vol {} motor {} | cache t:{:?} v:{} bits {:04x}{}",
                drive,
                ds.half_track,
                ds.volume,
                ds.motor as u8,
                line.track(),
                line.volume(),
                line.sector_valid(),
                if line.validated() { " validated" } else { "" }
            ));
        }
        let cs = self.controller.stats();
        lines.push(format!(
            "controller: polls {} written {} fillers {} steps {} stops {} stalls {}",
            cs.polls, cs.bytes_written, cs.fillers, cs.steps, cs.stop_hits, cs.burst_stalls
        ));
        lines.push(format!("fetch ({}): {}", self.fetch.state(), self.fetch.stats()));
        let is = self.internal.stats();
        lines.push(format!(
            "internal: loaded {} busy {} errors {} | mirrored {}",
            is.tracks_loaded, is.busy_passes, is.read_errors, self.tracks_mirrored
        ));
        lines
    }
}

impl StorageContext for DiskSystem {
    fn storage(&mut self) -> &mut dyn StorageEngine {
        &mut *self.storage
    }
}
