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

    tests::common

    Test doubles for the controller registers and a harness around DiskSystem.
*/

#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use disk2_core::{
    coreconfig::CoreConfig,
    device_types::geometry::{DriveId, TrackSector},
    hal::{ControllerStatus, DiskControllerRegs},
    scheduler::{
        crashlog::CrashLog,
        watchdog::{new_timer, TimerIsr},
        Scheduler,
    },
    storage::MemStorage,
    system::{DiskSystem, STORAGE_SIZE},
    tasks::new_scheduler,
    transport::{ring_pair, TransportIsr, DEFAULT_RING_SIZE},
};

#[derive(Default)]
pub struct RegsState {
    pub phase: u8,
    pub drive: u8,
    pub wanted: bool,
    pub pending: bool,
    pub hint: Option<TrackSector>,
    pub written: Vec<u8>,
}

/// Controller registers whose host takes each written byte before the next status read.
#[derive(Clone, Default)]
pub struct TestRegs(pub Rc<RefCell<RegsState>>);

impl DiskControllerRegs for TestRegs {
    fn read_status(&mut self) -> ControllerStatus {
        let mut s = self.0.borrow_mut();
        s.pending = false;
        ControllerStatus::new()
            .with_phase(s.phase)
            .with_motor(true)
            .with_drive(s.drive)
            .with_wanted(s.wanted)
            .with_pending(s.pending)
    }

    fn write_data(&mut self, byte: u8) {
        let mut s = self.0.borrow_mut();
        s.written.push(byte);
        s.pending = true;
    }

    fn sector_hint(&self) -> Option<TrackSector> {
        self.0.borrow().hint
    }
}

pub struct Harness {
    pub sched: Scheduler<DiskSystem>,
    pub regs: TestRegs,
    pub isr: TransportIsr,
    pub timer: TimerIsr,
}

impl Harness {
    pub fn new(config: CoreConfig) -> Self {
        Self::with_parts(config, MemStorage::new(STORAGE_SIZE, 256, 0), CrashLog::default())
    }

    pub fn with_parts(config: CoreConfig, storage: MemStorage, crash_log: CrashLog) -> Self {
        let regs = TestRegs::default();
        let (transport, mut isr) = ring_pair(DEFAULT_RING_SIZE);
        isr.set_connected(true);
        let (timer, watchdog, timer_isr) = new_timer(config.scheduler.watchdog_max);
        let system = DiskSystem::new(config, Box::new(regs.clone()), Box::new(transport), Box::new(storage));
        Harness {
            sched: new_scheduler(system, timer, watchdog, crash_log),
            regs,
            isr,
            timer: timer_isr,
        }
    }

    pub fn system(&self) -> &DiskSystem {
        self.sched.context()
    }

    pub fn pass(&mut self) {
        self.timer.tick();
        self.sched.run_pass();
    }

    pub fn passes(&mut self, n: usize) {
        for _ in 0..n {
            self.pass();
        }
    }

    /// Everything the emulator has sent toward the image source.
    pub fn sent(&mut self) -> String {
        let mut buf = [0u8; 256];
        let mut out = String::new();
        loop {
            let n = self.isr.transmit(&mut buf);
            if n == 0 {
                break;
            }
            out.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
        out
    }

    pub fn reply(&mut self, text: &str) {
        assert_eq!(self.isr.receive(text.as_bytes()), text.len());
    }

    /// Deliver a long reply as the ring makes room, running a pass after each chunk.
    pub fn stream(&mut self, text: &str) {
        let mut bytes = text.as_bytes();
        while !bytes.is_empty() {
            let n = self.isr.receive(&bytes[..bytes.len().min(self.isr.rx_room())]);
            bytes = &bytes[n..];
            self.pass();
        }
    }

    pub fn insert(&mut self, volume: u8) {
        self.reply(&format!("@{:02x}\n", volume));
        self.pass();
    }

    /// Step the selected drive's arm to `track`, one phase per pass, with the data request
    /// line dropped.
    pub fn seek(&mut self, track: u8) {
        self.regs.0.borrow_mut().wanted = false;
        let target = track as i8 * 2;
        loop {
            let drive = DriveId::from_select(self.regs.0.borrow().drive);
            let ht = self.system().controller().drive(drive).half_track;
            if ht == target {
                break;
            }
            let dir = if target > ht { 1 } else { 3 };
            let phase = ((ht as u8).wrapping_add(dir)) & 0x03;
            self.regs.0.borrow_mut().phase = 1 << phase;
            self.pass();
        }
        self.regs.0.borrow_mut().phase = 0;
    }

    pub fn written(&self) -> Vec<u8> {
        self.regs.0.borrow().written.clone()
    }

    pub fn want(&mut self, wanted: bool) {
        self.regs.0.borrow_mut().wanted = wanted;
    }
}
