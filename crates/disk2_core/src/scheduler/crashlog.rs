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

    scheduler::crashlog.rs

    Crash records that survive a reboot.
*/

use std::{
    fs::OpenOptions,
    io::{BufRead, BufReader, Write},
    path::PathBuf,
};

use anyhow::Error;
use disk2_common::HistoryBuffer;

pub const CRASH_LOG_LEN: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum CrashCause {
    #[strum(serialize = "Watchdog timeout")]
    WatchdogTimeout,
    #[strum(serialize = "Reboot requested")]
    Requested,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrashRecord {
    pub tick: u64,
    pub cause: CrashCause,
    /// Names of the tasks that were running.
    pub location: String,
    pub active_tasks: u32,
    pub watchdog: u32,
}

impl std::fmt::Display for CrashRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} in [{}] active {:02x} wd {}",
            self.tick, self.cause, self.location, self.active_tasks, self.watchdog
        )
    }
}

/// Where crash records are persisted.
pub trait CrashStore {
    fn append(&mut self, line: &str) -> Result<(), Error>;
    fn load(&mut self) -> Result<Vec<String>, Error>;
}

#[derive(Debug, Default)]
pub struct MemoryCrashStore {
    lines: Vec<String>,
}

impl CrashStore for MemoryCrashStore {
    fn append(&mut self, line: &str) -> Result<(), Error> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn load(&mut self) -> Result<Vec<String>, Error> {
        Ok(self.lines.clone())
    }
}

pub struct FileCrashStore {
    path: PathBuf,
}

impl FileCrashStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CrashStore for FileCrashStore {
    fn append(&mut self, line: &str) -> Result<(), Error> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn load(&mut self) -> Result<Vec<String>, Error> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let lines = BufReader::new(file).lines().collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }
}

pub struct CrashLog {
    records: HistoryBuffer<CrashRecord>,
    /// Lines found in the store at startup.
    previous: Vec<String>,
    store: Box<dyn CrashStore>,
}

impl CrashLog {
    pub fn new(mut store: Box<dyn CrashStore>) -> Self {
        let previous = store.load().unwrap_or_else(|e| {
            log::error!("Couldn't load crash log: {}", e);
            Vec::new()
        });
        Self {
            records: HistoryBuffer::new(CRASH_LOG_LEN),
            previous,
            store,
        }
    }

    pub fn record(&mut self, record: CrashRecord) {
        if let Err(e) = self.store.append(&record.to_string()) {
            log::error!("Couldn't persist crash record: {}", e);
        }
        self.records.push(record);
    }

    pub fn records(&self) -> &HistoryBuffer<CrashRecord> {
        &self.records
    }

    pub fn previous(&self) -> &[String] {
        &self.previous
    }

    pub fn dump(&self) -> Vec<String> {
        self.previous
            .iter()
            .cloned()
            .chain(self.records.iter().map(|r| r.to_string()))
            .collect()
    }
}

impl Default for CrashLog {
    fn default() -> Self {
        CrashLog::new(Box::new(MemoryCrashStore::default()))
    }
}
