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

    tasks.rs

    The fixed task list, in run order.
*/

use crate::{
    error::StorageError,
    scheduler::{
        crashlog::CrashLog,
        watchdog::{SystemTimer, Watchdog},
        BootFn,
        Scheduler,
        Task,
    },
    storage::write_cooperative,
    system::DiskSystem,
};

pub struct DriveTask;

impl Task<DiskSystem> for DriveTask {
    fn name(&self) -> &'static str {
        "drive"
    }

    fn run(&mut self, sched: &mut Scheduler<DiskSystem>) {
        sched.context_mut().drive_pass();
    }
}

/// Services the external transport and mirrors validated tracks into storage. Mirroring waits
/// on the storage engine by yielding, so the drive keeps spinning meanwhile.
pub struct FetchTask;

impl Task<DiskSystem> for FetchTask {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn run(&mut self, sched: &mut Scheduler<DiskSystem>) {
        sched.context_mut().fetch_pass();

        while let Some((offset, data)) = sched.context_mut().take_mirror() {
            match write_cooperative(sched, offset, &data) {
                Ok(()) => sched.context_mut().mirror_done(),
                Err(StorageError::Interrupted) => return,
                Err(e) => log::warn!("Mirror write at {:06x} failed: {}", offset, e),
            }
        }
    }
}

pub struct InternalDiskTask;

impl Task<DiskSystem> for InternalDiskTask {
    fn name(&self) -> &'static str {
        "internal"
    }

    fn run(&mut self, sched: &mut Scheduler<DiskSystem>) {
        sched.context_mut().internal_pass();
    }
}

pub struct StorageTask;

impl Task<DiskSystem> for StorageTask {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn run(&mut self, sched: &mut Scheduler<DiskSystem>) {
        sched.context_mut().storage_pass();
    }
}

pub fn boot_tasks() -> Vec<Box<dyn Task<DiskSystem>>> {
    vec![
        Box::new(DriveTask),
        Box::new(FetchTask),
        Box::new(InternalDiskTask),
        Box::new(StorageTask),
    ]
}

/// Boot and reboot entry: reset the emulation state and hand back a fresh task list.
pub fn boot() -> BootFn<DiskSystem> {
    Box::new(|system: &mut DiskSystem| {
        system.reinit();
        boot_tasks()
    })
}

pub fn new_scheduler(
    system: DiskSystem,
    timer: SystemTimer,
    watchdog: Watchdog,
    crash_log: CrashLog,
) -> Scheduler<DiskSystem> {
    let config = system.config().scheduler.clone();
    Scheduler::new(config, system, timer, watchdog, crash_log, boot())
}
