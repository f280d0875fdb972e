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

    controller.rs

    The drive task body: polls the legacy controller and feeds it disk bytes.

    Each pass reads the status register once, latches the drive lines, applies the stepper
    phases and, if the controller wants a byte and has consumed the last one, writes the next
    byte from the head. In burst mode the rest of an active sector is streamed while the
    controller keeps up.
*/

use crate::{
    cache::TrackCache,
    coreconfig::{DiagnosticsConfig, DriveConfig},
    device_types::geometry::{DriveId, TrackSector, DRIVE_COUNT},
    drive::{DriveState, StepResult},
    hal::{ControllerStatus, DiskControllerRegs},
    head::{FillRequester, Head, HeadOutput},
};

#[derive(Clone, Debug, Default)]
pub struct ControllerStats {
    pub polls: u64,
    pub bytes_written: u64,
    pub fillers: u64,
    pub steps: u64,
    pub stop_hits: u64,
    /// Bursts that ended because the controller stopped draining bytes.
    pub burst_stalls: u64,
}

pub struct DriveController {
    drives: [DriveState; DRIVE_COUNT],
    head: Head,
    burst: bool,
    burst_poll_limit: u32,
    trace_status: bool,
    trace_track_change: bool,
    last_status: Option<ControllerStatus>,
    stats: ControllerStats,
}

impl DriveController {
    pub fn new(volume: u8, drive: &DriveConfig, diag: &DiagnosticsConfig) -> Self {
        Self {
            drives: [DriveState::new(volume), DriveState::new(volume)],
            head: Head::new(),
            burst: drive.burst,
            burst_poll_limit: drive.burst_poll_limit,
            trace_status: diag.controller,
            trace_track_change: diag.track_change,
            last_status: None,
            stats: Default::default(),
        }
    }

    pub fn drive(&self, drive: DriveId) -> &DriveState {
        &self.drives[drive.index()]
    }

    pub fn drive_mut(&mut self, drive: DriveId) -> &mut DriveState {
        &mut self.drives[drive.index()]
    }

    pub fn head(&self) -> &Head {
        &self.head
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    /// Restart the head at sector 0, as after a disk change.
    pub fn reset_head(&mut self) {
        self.head.reset(0);
    }

    /// Return both drives and the head to their power-on state. Inserted volumes are kept.
    pub fn reset(&mut self) {
        for drive in self.drives.iter_mut() {
            drive.reset();
        }
        self.head = Head::new();
        self.last_status = None;
        self.stats = Default::default();
    }

    /// One poll of the controller. Returns the number of bytes written to the data register.
    pub fn run_once(
        &mut self,
        regs: &mut dyn DiskControllerRegs,
        cache: &TrackCache,
        fill: &mut dyn FillRequester,
    ) -> u32 {
        let status = regs.read_status();
        self.stats.polls += 1;
        self.trace(status);

        let drive = DriveId::from_select(status.drive());
        let ds = &mut self.drives[drive.index()];
        ds.update_lines(&status);

        match ds.step(status.phase()) {
            StepResult::Idle => {}
            StepResult::Moved { from, to } => {
                self.stats.steps += 1;
                if self.trace_track_change {
                    log::debug!("{} {} {}", drive, if to > from { '>' } else { '<' }, to);
                }
                let track = ds.track();
                self.head.track_changed(track);
            }
            StepResult::HitStop => {
                self.stats.stop_hits += 1;
                self.head.reset(0);
            }
        }

        if !status.wanted() || status.pending() {
            return 0;
        }

        // Switching drives mid-sector tears it, like an arm move.
        if self.head.is_active() && self.head.active_drive() != Some(drive) {
            let sector = self.head.position().sector;
            self.head.reset(sector);
        }

        let hint = regs.sector_hint();
        self.write_next(regs, drive, cache, hint, fill);
        let mut written = 1;

        if self.burst {
            written += self.burst_sector(regs, status, drive, cache, fill);
        }
        written
    }

    fn write_next(
        &mut self,
        regs: &mut dyn DiskControllerRegs,
        drive: DriveId,
        cache: &TrackCache,
        hint: Option<TrackSector>,
        fill: &mut dyn FillRequester,
    ) {
        let out = self.head.next_byte(drive, &self.drives[drive.index()], cache, hint, fill);
        if let HeadOutput::Filler = out {
            self.stats.fillers += 1;
        }
        regs.write_data(out.byte());
        self.stats.bytes_written += 1;
    }

    /// Stream the remainder of the active sector. Stops when the sector completes, when the
    /// controller changes anything but the pending bit, or after `burst_poll_limit` polls in a
    /// row find the last byte still pending.
    fn burst_sector(
        &mut self,
        regs: &mut dyn DiskControllerRegs,
        first: ControllerStatus,
        drive: DriveId,
        cache: &TrackCache,
        fill: &mut dyn FillRequester,
    ) -> u32 {
        let mut written = 0;
        let mut idle_polls = 0;

        while self.head.is_active() {
            let status = regs.read_status();
            self.stats.polls += 1;
            if !status.wanted() || status.phase() != first.phase() || status.drive() != first.drive() {
                break;
            }
            if status.pending() {
                idle_polls += 1;
                if idle_polls >= self.burst_poll_limit {
                    self.stats.burst_stalls += 1;
                    break;
                }
                continue;
            }
            idle_polls = 0;
            self.write_next(regs, drive, cache, None, fill);
            written += 1;
        }
        written
    }

    fn trace(&mut self, status: ControllerStatus) {
        if self.trace_status {
            let changed = self
                .last_status
                .map_or(true, |last| last.to_byte() & 0xF0 != status.to_byte() & 0xF0);
            if changed {
                log::debug!("Controller: {:?}", status);
            }
        }
        self.last_status = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{decode_data_field, AddressField, DATA_FIELD_LEN, HEADER_STREAM_LEN, SYNC_BYTE},
        device_types::geometry::{logical_to_physical, SECTOR_SIZE},
    };
    use std::collections::VecDeque;

    /// A controller that always wants data and consumes each byte on the next status read.
    struct FakeRegs {
        phase: u8,
        drive: u8,
        wanted: bool,
        pending: bool,
        /// Status reads for which a written byte stays pending.
        latency: u32,
        wait: u32,
        written: Vec<u8>,
        hint: Option<TrackSector>,
        scripted: VecDeque<u8>,
    }

    impl FakeRegs {
        fn new() -> Self {
            FakeRegs {
                phase: 0,
                drive: 0,
                wanted: true,
                pending: false,
                latency: 0,
                wait: 0,
                written: Vec::new(),
                hint: None,
                scripted: VecDeque::new(),
            }
        }
    }

    impl DiskControllerRegs for FakeRegs {
        fn read_status(&mut self) -> ControllerStatus {
            if let Some(phase) = self.scripted.pop_front() {
                self.phase = phase;
            }
            if self.pending {
                if self.wait == 0 {
                    self.pending = false;
                }
                else {
                    self.wait -= 1;
                }
            }
            ControllerStatus::new()
                .with_phase(self.phase)
                .with_motor(true)
                .with_drive(self.drive)
                .with_wanted(self.wanted)
                .with_pending(self.pending)
        }

        fn write_data(&mut self, byte: u8) {
            self.written.push(byte);
            self.pending = true;
            self.wait = self.latency;
        }

        fn sector_hint(&self) -> Option<TrackSector> {
            self.hint
        }
    }

    #[derive(Default)]
    struct Fills(Vec<(DriveId, u8, u8)>);

    impl FillRequester for Fills {
        fn request_fill(&mut self, drive: DriveId, track: u8, _volume: u8, sector: u8) {
            self.0.push((drive, track, sector));
        }
    }

    fn controller(burst: bool) -> DriveController {
        let drive = DriveConfig {
            burst,
            ..Default::default()
        };
        DriveController::new(254, &drive, &Default::default())
    }

    #[test]
    fn empty_cache_sends_filler_and_requests() {
        let mut ctl = controller(true);
        let mut regs = FakeRegs::new();
        let cache = TrackCache::new();
        let mut fills = Fills::default();

        assert_eq!(ctl.run_once(&mut regs, &cache, &mut fills), 1);
        assert_eq!(regs.written, vec![SYNC_BYTE]);
        assert_eq!(fills.0, vec![(DriveId::External, 0, 0)]);
        assert_eq!(ctl.stats().fillers, 1);
    }

    #[test]
    fn pending_byte_is_not_overwritten() {
        let mut ctl = controller(false);
        let mut regs = FakeRegs::new();
        regs.latency = 3;
        let cache = TrackCache::new();
        let mut fills = Fills::default();

        ctl.run_once(&mut regs, &cache, &mut fills);
        for _ in 0..3 {
            assert_eq!(ctl.run_once(&mut regs, &cache, &mut fills), 0);
        }
        assert_eq!(ctl.run_once(&mut regs, &cache, &mut fills), 1);
        assert_eq!(regs.written.len(), 2);
    }

    #[test]
    fn burst_streams_a_whole_sector() {
        let mut ctl = controller(true);
        let mut regs = FakeRegs::new();
        let mut cache = TrackCache::new();
        let mut fills = Fills::default();
        cache.retag(DriveId::External, 0, 254);
        cache.commit_sector(DriveId::External, 0, &[0x5A; SECTOR_SIZE]);

        let n = ctl.run_once(&mut regs, &cache, &mut fills);
        assert_eq!(n as usize, HEADER_STREAM_LEN + DATA_FIELD_LEN);
        assert!(fills.0.is_empty());

        let field = AddressField::parse(&regs.written[..HEADER_STREAM_LEN]).unwrap();
        assert_eq!(field, AddressField::new(254, 0, logical_to_physical(0)));
        assert_eq!(decode_data_field(&regs.written[HEADER_STREAM_LEN..]), Ok([0x5A; SECTOR_SIZE]));
    }

    #[test]
    fn burst_gives_up_on_a_slow_controller() {
        let mut ctl = controller(true);
        let mut regs = FakeRegs::new();
        regs.latency = 10;
        let mut cache = TrackCache::new();
        cache.retag(DriveId::External, 0, 254);
        cache.commit_sector(DriveId::External, 0, &[0; SECTOR_SIZE]);

        assert_eq!(ctl.run_once(&mut regs, &cache, &mut Fills::default()), 1);
        assert_eq!(ctl.stats().burst_stalls, 1);
        assert!(ctl.head().is_active());
    }

    #[test]
    fn stepping_tracks_and_tears_sector() {
        let mut ctl = controller(false);
        let mut regs = FakeRegs::new();
        let mut cache = TrackCache::new();
        cache.retag(DriveId::External, 0, 254);
        cache.commit_sector(DriveId::External, 0, &[0; SECTOR_SIZE]);
        let mut fills = Fills::default();

        regs.phase = 0b0001;
        for _ in 0..20 {
            ctl.run_once(&mut regs, &cache, &mut fills);
        }
        assert!(ctl.head().is_active());

        // Phase 1 then phase 2: one whole track inward.
        regs.wanted = false;
        regs.scripted.extend([0b0010, 0b0100]);
        ctl.run_once(&mut regs, &cache, &mut fills);
        // Half track 1 is still track 0.
        assert!(ctl.head().is_active());
        ctl.run_once(&mut regs, &cache, &mut fills);
        assert!(!ctl.head().is_active());
        assert_eq!(ctl.drive(DriveId::External).half_track, 2);
        assert_eq!(ctl.drive(DriveId::External).track(), 1);
        assert_eq!(ctl.head().stats().torn_sectors, 1);
        assert_eq!(ctl.stats().steps, 2);
    }

    #[test]
    fn recalibrate_against_stop_resets_sector() {
        let mut ctl = controller(false);
        let mut regs = FakeRegs::new();
        regs.wanted = false;
        let cache = TrackCache::new();
        let mut fills = Fills::default();

        // Phase 3 from rest at phase 0 pulls the arm outward into the stop.
        regs.phase = 0b1000;
        ctl.run_once(&mut regs, &cache, &mut fills);
        assert_eq!(ctl.stats().stop_hits, 1);
        assert_eq!(ctl.head().position().sector, 0);
        assert_eq!(ctl.drive(DriveId::External).half_track, 0);
    }

    #[test]
    fn drive_select_routes_to_internal() {
        let mut ctl = controller(false);
        let mut regs = FakeRegs::new();
        regs.drive = 1;
        regs.hint = Some(TrackSector::new(0, 7));
        let cache = TrackCache::new();
        let mut fills = Fills::default();

        ctl.run_once(&mut regs, &cache, &mut fills);
        assert_eq!(fills.0, vec![(DriveId::Internal, 0, 7)]);
        assert_eq!(ctl.head().active_drive(), Some(DriveId::Internal));
    }
}
