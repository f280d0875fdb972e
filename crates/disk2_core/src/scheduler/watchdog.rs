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

    scheduler::watchdog.rs

    System tick counter and watchdog shared with the timer interrupt.

    The interrupt side only ever increments. The scheduler side reads, and clears the watchdog
    when a task yields. Both values are single atomics, so no read can be torn.
*/

use std::sync::{
    atomic::{AtomicU32, AtomicU64, Ordering},
    Arc,
};

pub const DEFAULT_WATCHDOG_MAX: u32 = 5000;
pub const DEFAULT_YIELD_MAX: u32 = 1000;

/// Millisecond tick counter.
#[derive(Clone, Debug, Default)]
pub struct SystemTimer {
    ticks: Arc<AtomicU64>,
}

impl SystemTimer {
    #[inline]
    pub fn now(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug)]
pub struct Watchdog {
    counter: Arc<AtomicU32>,
    max: u32,
}

impl Watchdog {
    pub fn max(&self) -> u32 {
        self.max
    }

    #[inline]
    pub fn feed(&self) {
        self.counter.store(0, Ordering::Release);
    }

    #[inline]
    pub fn elapsed(&self) -> u32 {
        self.counter.load(Ordering::Acquire)
    }

    #[inline]
    pub fn expired(&self) -> bool {
        self.elapsed() > self.max
    }
}

/// The timer interrupt's handle on the tick counter and watchdog.
#[derive(Clone, Debug)]
pub struct TimerIsr {
    ticks: Arc<AtomicU64>,
    watchdog: Arc<AtomicU32>,
}

impl TimerIsr {
    #[inline]
    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::AcqRel);
        self.watchdog.fetch_add(1, Ordering::AcqRel);
    }

    pub fn tick_n(&self, n: u32) {
        self.ticks.fetch_add(n as u64, Ordering::AcqRel);
        self.watchdog.fetch_add(n, Ordering::AcqRel);
    }
}

pub fn new_timer(watchdog_max: u32) -> (SystemTimer, Watchdog, TimerIsr) {
    let ticks = Arc::new(AtomicU64::new(0));
    let counter = Arc::new(AtomicU32::new(0));
    (
        SystemTimer { ticks: ticks.clone() },
        Watchdog {
            counter: counter.clone(),
            max: watchdog_max,
        },
        TimerIsr {
            ticks,
            watchdog: counter,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isr_advances_both_counters() {
        let (timer, watchdog, isr) = new_timer(3);
        isr.tick_n(3);
        assert_eq!(timer.now(), 3);
        assert!(!watchdog.expired());
        isr.tick();
        assert!(watchdog.expired());
        watchdog.feed();
        assert_eq!(watchdog.elapsed(), 0);
        assert_eq!(timer.now(), 4);
    }

    #[test]
    fn ticks_from_another_thread() {
        let (timer, _watchdog, isr) = new_timer(10);
        let handle = std::thread::spawn(move || {
            for _ in 0..1000 {
                isr.tick();
            }
        });
        handle.join().unwrap();
        assert_eq!(timer.now(), 1000);
    }
}
