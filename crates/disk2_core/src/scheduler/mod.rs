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

    scheduler::mod.rs

    Cooperative task scheduler with a watchdog.

    Every task runs to completion each pass. A task that has to wait calls yield_now(), which
    runs the other tasks from inside the waiting one; a task is never entered twice. If the
    watchdog is not fed within its limit the scheduler records a crash and reboots: the
    context is reinitialized and a fresh set of tasks installed.
*/

pub mod crashlog;
pub mod watchdog;

use std::time::{Duration, Instant};

use serde_derive::Deserialize;

use crate::scheduler::{
    crashlog::{CrashCause, CrashLog, CrashRecord},
    watchdog::{SystemTimer, Watchdog, DEFAULT_WATCHDOG_MAX, DEFAULT_YIELD_MAX},
};

pub const MAX_TASKS: usize = 32;
pub const DEFAULT_MAX_NESTING: usize = 8;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ticks without a yield before the watchdog fires.
    pub watchdog_max: u32,
    /// Ticks a pass may spend yielding before it is reported.
    pub yield_max: u32,
    /// Deepest allowed chain of nested yields.
    pub max_nesting: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            watchdog_max: DEFAULT_WATCHDOG_MAX,
            yield_max: DEFAULT_YIELD_MAX,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

pub trait Task<C> {
    fn name(&self) -> &'static str;
    fn run(&mut self, sched: &mut Scheduler<C>);
}

/// Reinitializes the context and returns the task list, in run order.
pub type BootFn<C> = Box<dyn FnMut(&mut C) -> Vec<Box<dyn Task<C>>>>;

#[derive(Clone, Debug, Default)]
pub struct TaskStats {
    pub name: &'static str,
    pub runtime: Duration,
    pub invocations: u64,
    /// Passes that found the task already running further up the stack.
    pub skipped: u64,
}

struct TaskSlot<C> {
    task:  Option<Box<dyn Task<C>>>,
    stats: TaskStats,
}

#[derive(Default)]
struct YieldLog {
    last_active: u32,
    count: u32,
    next_report: u32,
}

pub struct Scheduler<C> {
    config: SchedulerConfig,
    context: C,
    slots: Vec<TaskSlot<C>>,
    active: u32,
    generation: u64,
    depth: usize,
    timer: SystemTimer,
    watchdog: Watchdog,
    crash_log: CrashLog,
    boot: BootFn<C>,
    reboots: u32,
    yield_log: YieldLog,
    yield_deadline: u64,
    yield_timeouts: u64,
    nesting_overflows: u64,
}

impl<C> Scheduler<C> {
    pub fn new(
        config: SchedulerConfig,
        mut context: C,
        timer: SystemTimer,
        watchdog: Watchdog,
        crash_log: CrashLog,
        mut boot: BootFn<C>,
    ) -> Self {
        let tasks = boot(&mut context);
        let mut sched = Self {
            config,
            context,
            slots: Vec::new(),
            active: 0,
            generation: 0,
            depth: 0,
            timer,
            watchdog,
            crash_log,
            boot,
            reboots: 0,
            yield_log: Default::default(),
            yield_deadline: u64::MAX,
            yield_timeouts: 0,
            nesting_overflows: 0,
        };
        sched.install(tasks);
        sched.watchdog.feed();
        sched
    }

    fn install(&mut self, mut tasks: Vec<Box<dyn Task<C>>>) {
        if tasks.len() > MAX_TASKS {
            log::error!("Scheduler: {} tasks registered, only {} will run", tasks.len(), MAX_TASKS);
            tasks.truncate(MAX_TASKS);
        }
        self.slots = tasks
            .into_iter()
            .map(|task| TaskSlot {
                stats: TaskStats {
                    name: task.name(),
                    ..Default::default()
                },
                task:  Some(task),
            })
            .collect();
        self.active = 0;
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn timer(&self) -> &SystemTimer {
        &self.timer
    }

    pub fn crash_log(&self) -> &CrashLog {
        &self.crash_log
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reboots(&self) -> u32 {
        self.reboots
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn active_tasks(&self) -> u32 {
        self.active
    }

    pub fn yield_timeouts(&self) -> u64 {
        self.yield_timeouts
    }

    pub fn nesting_overflows(&self) -> u64 {
        self.nesting_overflows
    }

    pub fn task_stats(&self) -> Vec<TaskStats> {
        self.slots.iter().map(|s| s.stats.clone()).collect()
    }

    /// One iteration of the main loop.
    pub fn run_pass(&mut self) {
        if self.check_watchdog() {
            return;
        }
        self.watchdog.feed();
        self.yield_deadline = self.timer.now().saturating_add(self.config.yield_max as u64);
        self.run_all();
    }

    /// Run every task not already running, in registration order.
    pub fn run_all(&mut self) {
        let generation = self.generation;

        for i in 0..self.slots.len() {
            if self.generation != generation || self.check_watchdog() {
                return;
            }
            let bit = 1u32 << i;
            if self.active & bit != 0 {
                self.slots[i].stats.skipped += 1;
                continue;
            }
            let Some(mut task) = self.slots[i].task.take()
            else {
                continue;
            };

            self.active |= bit;
            let start = Instant::now();
            task.run(self);
            let elapsed = start.elapsed();

            // After a reboot the slot belongs to a new task; the old one is dropped.
            if self.generation == generation {
                self.active &= !bit;
                let slot = &mut self.slots[i];
                slot.stats.runtime += elapsed;
                slot.stats.invocations += 1;
                slot.task = Some(task);
            }
        }
    }

    /// Let other tasks run. Returns false if the system rebooted in the meantime, in which case
    /// the caller should give up whatever it was doing.
    pub fn yield_now(&mut self) -> bool {
        let generation = self.generation;
        if self.check_watchdog() {
            return false;
        }
        // A refused yield must not feed the watchdog.
        if self.depth >= self.config.max_nesting {
            self.nesting_overflows += 1;
            return true;
        }
        self.watchdog.feed();
        self.log_yield();

        if self.timer.now() > self.yield_deadline {
            self.yield_timeouts += 1;
            log::warn!(
                "Yield timeout: tasks [{}] still yielding after {} ticks",
                self.active_task_names(),
                self.config.yield_max
            );
            // Report once per pass.
            self.yield_deadline = u64::MAX;
        }

        self.depth += 1;
        self.run_all();
        self.depth -= 1;
        self.generation == generation
    }

    fn log_yield(&mut self) {
        let yl = &mut self.yield_log;
        if self.active != yl.last_active {
            yl.last_active = self.active;
            yl.count = 0;
            yl.next_report = 2;
        }
        yl.count += 1;
        if yl.count == yl.next_report {
            log::debug!("Yield: {:02x} {}", self.active, yl.count);
            yl.next_report = yl.next_report.saturating_mul(2);
        }
    }

    fn active_task_names(&self) -> String {
        self.slots
            .iter()
            .enumerate()
            .filter(|(i, _)| self.active & (1 << i) != 0)
            .map(|(_, s)| s.stats.name)
            .collect::<Vec<_>>()
            .join(",")
    }

    fn check_watchdog(&mut self) -> bool {
        if self.watchdog.expired() {
            self.crash(CrashCause::WatchdogTimeout);
            true
        }
        else {
            false
        }
    }

    /// Record a crash and reboot.
    pub fn crash(&mut self, cause: CrashCause) {
        let record = CrashRecord {
            tick: self.timer.now(),
            cause,
            location: self.active_task_names(),
            active_tasks: self.active,
            watchdog: self.watchdog.elapsed(),
        };
        log::error!("{}", record);
        self.crash_log.record(record);
        self.reboot_now();
    }

    pub fn reboot(&mut self) {
        self.crash(CrashCause::Requested);
    }

    fn reboot_now(&mut self) {
        self.generation += 1;
        self.reboots += 1;
        let tasks = (self.boot)(&mut self.context);
        self.install(tasks);
        self.yield_log = Default::default();
        self.yield_deadline = u64::MAX;
        self.watchdog.feed();
        log::info!("Rebooted ({})", self.reboots);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::watchdog::{new_timer, TimerIsr};

    #[derive(Default)]
    struct Ctx {
        trace: Vec<&'static str>,
        boots: u32,
        counter: u32,
        isr: Option<TimerIsr>,
    }

    struct Recorder(&'static str);

    impl Task<Ctx> for Recorder {
        fn name(&self) -> &'static str {
            self.0
        }
        fn run(&mut self, sched: &mut Scheduler<Ctx>) {
            sched.context_mut().trace.push(self.0);
            sched.context_mut().counter += 1;
        }
    }

    /// Yields once per run.
    struct Yielder;

    impl Task<Ctx> for Yielder {
        fn name(&self) -> &'static str {
            "yielder"
        }
        fn run(&mut self, sched: &mut Scheduler<Ctx>) {
            sched.context_mut().trace.push("y-in");
            sched.yield_now();
            sched.context_mut().trace.push("y-out");
        }
    }

    /// Spins for `ticks` without yielding.
    struct Hog(u32);

    impl Task<Ctx> for Hog {
        fn name(&self) -> &'static str {
            "hog"
        }
        fn run(&mut self, sched: &mut Scheduler<Ctx>) {
            if let Some(isr) = &sched.context().isr {
                isr.tick_n(self.0);
            }
        }
    }

    fn scheduler(config: SchedulerConfig, boot: BootFn<Ctx>) -> (Scheduler<Ctx>, TimerIsr) {
        let (timer, watchdog, isr) = new_timer(config.watchdog_max);
        let ctx = Ctx {
            isr: Some(isr.clone()),
            ..Default::default()
        };
        (Scheduler::new(config, ctx, timer, watchdog, CrashLog::default(), boot), isr)
    }

    fn boot_with(make: fn() -> Vec<Box<dyn Task<Ctx>>>) -> BootFn<Ctx> {
        Box::new(move |ctx: &mut Ctx| {
            ctx.boots += 1;
            ctx.counter = 0;
            ctx.trace.clear();
            make()
        })
    }

    #[test]
    fn tasks_run_in_order() {
        let (mut sched, _isr) = scheduler(
            Default::default(),
            boot_with(|| vec![Box::new(Recorder("a")), Box::new(Recorder("b"))]),
        );
        sched.run_pass();
        sched.run_pass();
        assert_eq!(sched.context().trace, vec!["a", "b", "a", "b"]);
        let stats = sched.task_stats();
        assert_eq!(stats[0].name, "a");
        assert_eq!(stats[1].invocations, 2);
    }

    #[test]
    fn yield_skips_running_task() {
        let (mut sched, _isr) = scheduler(
            Default::default(),
            boot_with(|| vec![Box::new(Recorder("a")), Box::new(Yielder), Box::new(Recorder("b"))]),
        );
        sched.run_pass();
        assert_eq!(sched.context().trace, vec!["a", "y-in", "a", "b", "y-out", "b"]);
        assert_eq!(sched.task_stats()[1].skipped, 1);
        assert_eq!(sched.active_tasks(), 0);
        assert_eq!(sched.depth(), 0);
    }

    struct DeepYielder;

    impl Task<Ctx> for DeepYielder {
        fn name(&self) -> &'static str {
            "deep"
        }
        fn run(&mut self, sched: &mut Scheduler<Ctx>) {
            for _ in 0..3 {
                sched.yield_now();
            }
        }
    }

    /// Yields from inside a nested yield.
    struct Nester;

    impl Task<Ctx> for Nester {
        fn name(&self) -> &'static str {
            "nester"
        }
        fn run(&mut self, sched: &mut Scheduler<Ctx>) {
            sched.context_mut().counter += 1;
            sched.yield_now();
        }
    }

    #[test]
    fn nesting_is_capped() {
        let config = SchedulerConfig {
            max_nesting: 1,
            ..Default::default()
        };
        let (mut sched, _isr) = scheduler(config, boot_with(|| vec![Box::new(DeepYielder), Box::new(Nester)]));
        sched.run_pass();
        // Each yield from "deep" runs "nester" one level down, where its own yield is refused.
        // Then "nester" yields at the top level and "deep" runs nested, refused three times.
        assert_eq!(sched.nesting_overflows(), 6);
        assert_eq!(sched.context().counter, 4);
        assert_eq!(sched.depth(), 0);
    }

    /// Waits in a yield loop for a flag that only "setter" raises.
    struct Waiter;

    impl Task<Ctx> for Waiter {
        fn name(&self) -> &'static str {
            "waiter"
        }
        fn run(&mut self, sched: &mut Scheduler<Ctx>) {
            for _ in 0..100_000 {
                if sched.context().counter > 0 {
                    sched.context_mut().trace.push("done");
                    return;
                }
                if let Some(isr) = &sched.context().isr {
                    isr.tick();
                }
                if !sched.yield_now() {
                    sched.context_mut().trace.push("gave up");
                    return;
                }
            }
        }
    }

    #[test]
    fn refused_yields_do_not_feed_the_watchdog() {
        let config = SchedulerConfig {
            max_nesting: 0,
            ..Default::default()
        };
        let (mut sched, _isr) = scheduler(
            config,
            boot_with(|| vec![Box::new(Waiter), Box::new(Recorder("setter"))]),
        );
        sched.run_pass();

        assert_eq!(sched.reboots(), 1);
        assert_eq!(sched.context().trace, vec!["gave up"]);
        assert!(sched.nesting_overflows() <= 5001);
        let record = sched.crash_log().records().last().cloned().unwrap();
        assert_eq!(record.cause, CrashCause::WatchdogTimeout);
        assert_eq!(record.location, "waiter");
    }

    #[test]
    fn watchdog_records_crash_and_reboots() {
        let (mut sched, _isr) = scheduler(
            Default::default(),
            boot_with(|| vec![Box::new(Recorder("a")), Box::new(Hog(5001))]),
        );
        sched.run_pass();
        assert_eq!(sched.context().boots, 1);
        assert_eq!(sched.context().counter, 1);

        // The hog ran past the limit; the next entry notices.
        sched.run_pass();
        assert_eq!(sched.reboots(), 1);
        assert_eq!(sched.context().boots, 2);
        assert_eq!(sched.context().counter, 0);
        assert_eq!(sched.task_stats()[0].invocations, 0);

        let record = sched.crash_log().records().last().cloned().unwrap();
        assert_eq!(record.cause, CrashCause::WatchdogTimeout);
        assert_eq!(record.watchdog, 5001);
        assert_eq!(sched.crash_log().records().len(), 1);
    }

    /// Hogs the CPU but yields in between.
    struct PoliteHog;

    impl Task<Ctx> for PoliteHog {
        fn name(&self) -> &'static str {
            "polite"
        }
        fn run(&mut self, sched: &mut Scheduler<Ctx>) {
            for _ in 0..4 {
                if let Some(isr) = &sched.context().isr {
                    isr.tick_n(3000);
                }
                sched.yield_now();
            }
        }
    }

    #[test]
    fn yielding_feeds_the_watchdog() {
        let (mut sched, _isr) = scheduler(
            Default::default(),
            boot_with(|| vec![Box::new(PoliteHog), Box::new(Recorder("a"))]),
        );
        sched.run_pass();
        sched.run_pass();
        assert_eq!(sched.reboots(), 0);
        // 12000 ticks of yielding in one pass is past the advisory limit.
        assert_eq!(sched.yield_timeouts(), 2);
    }

    /// Stalls inside a yield until the watchdog fires from the nested entry.
    struct StuckInYield;

    impl Task<Ctx> for StuckInYield {
        fn name(&self) -> &'static str {
            "stuck"
        }
        fn run(&mut self, sched: &mut Scheduler<Ctx>) {
            if let Some(isr) = &sched.context().isr {
                isr.tick_n(6000);
            }
            let survived = sched.yield_now();
            sched.context_mut().trace.push(if survived { "survived" } else { "rebooted" });
        }
    }

    #[test]
    fn reboot_inside_yield_unwinds() {
        let (mut sched, _isr) = scheduler(
            Default::default(),
            boot_with(|| vec![Box::new(StuckInYield), Box::new(Recorder("a"))]),
        );
        sched.run_pass();
        assert_eq!(sched.reboots(), 1);
        assert_eq!(sched.crash_log().records().last().map(|r| r.location.clone()), Some("stuck".to_string()));
        // The old task finished unwinding into the new boot's context; its slot was not restored
        // over the new task.
        assert_eq!(sched.context().trace, vec!["rebooted"]);
        assert_eq!(sched.active_tasks(), 0);
        assert_eq!(sched.task_stats()[0].invocations, 0);

        // The fresh tasks run normally.
        sched.context_mut().isr = None;
        sched.run_pass();
        assert_eq!(sched.task_stats()[0].invocations, 1);
    }
}
