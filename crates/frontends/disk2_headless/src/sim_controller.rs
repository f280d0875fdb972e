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

    sim_controller.rs

    A simulated legacy controller for headless runs.

    Plays the part of the host's disk routines: recalibrates each drive against the track 0 stop,
    seeks with single phase steps, hunts for address fields in the byte stream and decodes the
    data fields that follow, checking every sector against the source image.
*/

use std::{cell::RefCell, collections::VecDeque, fmt::Display, rc::Rc, sync::Arc};

use disk2_core::{
    codec::{AddressField, DataFieldDecoder, ADDRESS_EPILOGUE},
    device_types::geometry::{
        image_offset,
        physical_to_logical,
        DriveId,
        TrackSector,
        DRIVE_COUNT,
        SECTORS_PER_TRACK,
        SECTOR_SIZE,
    },
    hal::{ControllerStatus, DiskControllerRegs},
};

/// Half tracks stepped outward to guarantee the arm reaches the stop. A multiple of four so the
/// last phase energized is phase 0.
const RECALIBRATE_STEPS: i8 = 76;
/// Address fields seen without a match before a sector is given up on.
const MAX_HEADERS: u32 = 48;
/// Bytes accepted for one sector before giving up. Covers a long wait for a fill.
const MAX_JOB_BYTES: u64 = 500_000;
const MAX_RETRIES: u8 = 2;
const WINDOW_LEN: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SimJob {
    pub drive: DriveId,
    pub track: u8,
    /// Logical sector.
    pub sector: u8,
    retries: u8,
}

impl SimJob {
    pub fn new(drive: DriveId, track: u8, sector: u8) -> Self {
        Self {
            drive,
            track,
            sector,
            retries: 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SimReport {
    pub sectors_ok: u64,
    pub sectors_bad: u64,
    pub sectors_unverified: u64,
    pub not_found: u64,
    pub retries: u64,
    pub headers_seen: u64,
    pub bytes_seen: u64,
    pub seeks: u64,
    pub done: bool,
}

impl SimReport {
    pub fn failed(&self) -> bool {
        self.sectors_bad > 0 || self.not_found > 0
    }
}

impl Display for SimReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ok:{} bad:{} unverified:{} not found:{} retries:{} headers:{} bytes:{} seeks:{}",
            self.sectors_ok,
            self.sectors_bad,
            self.sectors_unverified,
            self.not_found,
            self.retries,
            self.headers_seen,
            self.bytes_seen,
            self.seeks
        )
    }
}

enum SimState {
    Idle,
    Recalibrate { pos: i8 },
    Seek { target: i8 },
    FindAddress { window: Vec<u8>, headers: u32 },
    ReadData { decoder: DataFieldDecoder },
    Done,
}

pub struct SimController {
    jobs: VecDeque<SimJob>,
    current: Option<SimJob>,
    state: SimState,
    drive: DriveId,
    /// Where we believe each arm is, in half tracks. None until recalibrated.
    arm: [Option<i8>; DRIVE_COUNT],
    phase_bits: u8,
    pending: bool,
    job_bytes: u64,
    images: [Option<Arc<Vec<u8>>>; DRIVE_COUNT],
    report: Rc<RefCell<SimReport>>,
}

impl SimController {
    pub fn new(images: [Option<Arc<Vec<u8>>>; DRIVE_COUNT], report: Rc<RefCell<SimReport>>) -> Self {
        Self {
            jobs: VecDeque::new(),
            current: None,
            state: SimState::Idle,
            drive: DriveId::External,
            arm: [None; DRIVE_COUNT],
            phase_bits: 0,
            pending: false,
            job_bytes: 0,
            images,
            report,
        }
    }

    pub fn queue(&mut self, job: SimJob) {
        self.jobs.push_back(job);
    }

    /// Queue every sector of `tracks` on `drive`, in logical order.
    pub fn queue_tracks(&mut self, drive: DriveId, tracks: impl IntoIterator<Item = u8>) {
        for track in tracks {
            for sector in 0..SECTORS_PER_TRACK as u8 {
                self.queue(SimJob::new(drive, track, sector));
            }
        }
    }

    fn wanted(&self) -> bool {
        matches!(self.state, SimState::FindAddress { .. } | SimState::ReadData { .. })
    }

    /// Advance seek work by one status read.
    fn advance(&mut self) {
        match &mut self.state {
            SimState::Idle => self.next_job(),
            SimState::Recalibrate { pos } => {
                *pos -= 1;
                self.phase_bits = 1 << pos.rem_euclid(4);
                if *pos == 0 {
                    self.arm[self.drive.index()] = Some(0);
                    self.start_seek();
                }
            }
            SimState::Seek { target } => {
                let target = *target;
                let Some(arm) = self.arm[self.drive.index()]
                else {
                    return;
                };
                if arm == target {
                    self.phase_bits = 0;
                    self.state = SimState::FindAddress {
                        window: Vec::with_capacity(WINDOW_LEN),
                        headers: 0,
                    };
                    return;
                }
                let next = if target > arm { arm + 1 } else { arm - 1 };
                self.arm[self.drive.index()] = Some(next);
                self.phase_bits = 1 << next.rem_euclid(4);
            }
            _ => {}
        }
    }

    fn next_job(&mut self) {
        let Some(job) = self.jobs.pop_front()
        else {
            if !matches!(self.state, SimState::Done) {
                log::debug!("Simulated controller: all jobs complete");
                self.report.borrow_mut().done = true;
            }
            self.state = SimState::Done;
            return;
        };

        self.current = Some(job);
        self.job_bytes = 0;
        self.drive = job.drive;
        if self.arm[job.drive.index()].is_none() {
            log::debug!("Simulated controller: recalibrating {} drive", job.drive);
            self.state = SimState::Recalibrate { pos: RECALIBRATE_STEPS };
        }
        else {
            self.start_seek();
        }
    }

    fn start_seek(&mut self) {
        let Some(job) = self.current
        else {
            self.state = SimState::Idle;
            return;
        };
        if self.arm[job.drive.index()] != Some(job.track as i8 * 2) {
            self.report.borrow_mut().seeks += 1;
        }
        self.state = SimState::Seek {
            target: job.track as i8 * 2,
        };
    }

    fn finish(&mut self, result: SectorResult) {
        let Some(job) = self.current.take()
        else {
            return;
        };
        let mut report = self.report.borrow_mut();
        match result {
            SectorResult::Ok => report.sectors_ok += 1,
            SectorResult::Unverified => report.sectors_unverified += 1,
            SectorResult::Bad | SectorResult::NotFound if job.retries < MAX_RETRIES => {
                log::debug!("Simulated controller: retrying {} {:?}", job.drive, TrackSector::new(job.track, job.sector));
                report.retries += 1;
                self.jobs.push_front(SimJob {
                    retries: job.retries + 1,
                    ..job
                });
            }
            SectorResult::Bad => {
                log::warn!(
                    "Simulated controller: {} track {} sector {} does not match the image",
                    job.drive,
                    job.track,
                    job.sector
                );
                report.sectors_bad += 1;
            }
            SectorResult::NotFound => {
                log::warn!(
                    "Simulated controller: {} track {} sector {} not found",
                    job.drive,
                    job.track,
                    job.sector
                );
                report.not_found += 1;
            }
        }
        self.state = SimState::Idle;
    }

    fn verify(&self, job: &SimJob, data: &[u8; SECTOR_SIZE]) -> SectorResult {
        match &self.images[job.drive.index()] {
            Some(image) => {
                let offset = image_offset(job.track, job.sector);
                if image.get(offset..offset + SECTOR_SIZE) == Some(&data[..]) {
                    SectorResult::Ok
                }
                else {
                    SectorResult::Bad
                }
            }
            None => SectorResult::Unverified,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SectorResult {
    Ok,
    Unverified,
    Bad,
    NotFound,
}

impl DiskControllerRegs for SimController {
    fn read_status(&mut self) -> ControllerStatus {
        self.advance();

        // The host picks up a written byte before its next status read.
        let pending = std::mem::replace(&mut self.pending, false);
        ControllerStatus::new()
            .with_phase(self.phase_bits)
            .with_motor(!matches!(self.state, SimState::Done | SimState::Idle))
            .with_drive(self.drive.index() as u8)
            .with_wanted(self.wanted())
            .with_pending(pending)
    }

    fn write_data(&mut self, byte: u8) {
        self.pending = true;
        self.report.borrow_mut().bytes_seen += 1;
        let Some(job) = self.current
        else {
            return;
        };

        self.job_bytes += 1;
        if self.job_bytes > MAX_JOB_BYTES {
            self.finish(SectorResult::NotFound);
            return;
        }

        match &mut self.state {
            SimState::FindAddress { window, headers } => {
                if window.len() == WINDOW_LEN {
                    window.remove(0);
                }
                window.push(byte);
                if !window.ends_with(&ADDRESS_EPILOGUE) {
                    return;
                }
                let Some(field) = AddressField::parse(window)
                else {
                    return;
                };
                window.clear();
                *headers += 1;
                self.report.borrow_mut().headers_seen += 1;

                if field.track == job.track && physical_to_logical(field.sector) == job.sector {
                    self.state = SimState::ReadData {
                        decoder: DataFieldDecoder::new(),
                    };
                }
                else if *headers > MAX_HEADERS {
                    self.finish(SectorResult::NotFound);
                }
            }
            SimState::ReadData { decoder } => {
                if let Some(result) = decoder.push(byte) {
                    let outcome = match result {
                        Ok(data) => self.verify(&job, &data),
                        Err(e) => {
                            log::debug!("Simulated controller: data field error: {}", e);
                            SectorResult::Bad
                        }
                    };
                    self.finish(outcome);
                }
            }
            _ => {}
        }
    }

    fn sector_hint(&self) -> Option<TrackSector> {
        match (&self.state, self.current) {
            (SimState::FindAddress { .. }, Some(job)) => Some(TrackSector::new(job.track, job.sector)),
            _ => None,
        }
    }
}
