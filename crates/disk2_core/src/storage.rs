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

    storage.rs

    Storage engine interface and an in-memory implementation.

    The storage engine models a flash device: a write is accepted a page at a time and leaves
    the device busy for a while. Callers that must wait do so by yielding to the scheduler.
*/

use crate::{
    error::StorageError,
    scheduler::Scheduler,
};

pub const DEFAULT_PAGE_SIZE: usize = 256;

pub trait StorageEngine {
    fn busy(&self) -> bool;

    /// Write as much of `src` as the device accepts at `offset`. Returns bytes accepted; zero
    /// while busy.
    fn write(&mut self, offset: usize, src: &[u8]) -> usize;

    /// Read into `dst` from `offset`. Returns bytes read; zero while busy.
    fn read(&self, offset: usize, dst: &mut [u8]) -> usize;

    /// Advance any program or erase in progress.
    fn service(&mut self);

    fn size(&self) -> usize;
}

/// Context types that own a storage engine.
pub trait StorageContext {
    fn storage(&mut self) -> &mut dyn StorageEngine;
}

#[derive(Clone, Debug)]
pub struct MemStorage {
    data: Vec<u8>,
    page_size: usize,
    /// Service calls a write keeps the device busy for.
    busy_passes: u32,
    busy_remaining: u32,
    writes: u64,
}

impl MemStorage {
    pub fn new(size: usize, page_size: usize, busy_passes: u32) -> Self {
        Self {
            data: vec![0xFF; size],
            page_size: page_size.max(1),
            busy_passes,
            busy_remaining: 0,
            writes: 0,
        }
    }

    pub fn with_contents(mut self, offset: usize, contents: &[u8]) -> Result<Self, StorageError> {
        let end = offset + contents.len();
        if end > self.data.len() {
            return Err(StorageError::OutOfRange {
                offset,
                len: contents.len(),
            });
        }
        self.data[offset..end].copy_from_slice(contents);
        Ok(self)
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }
}

impl StorageEngine for MemStorage {
    fn busy(&self) -> bool {
        self.busy_remaining > 0
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> usize {
        if self.busy() || offset >= self.data.len() {
            return 0;
        }
        // Never cross a page boundary in one program operation.
        let page_left = self.page_size - (offset % self.page_size);
        let n = src.len().min(page_left).min(self.data.len() - offset);
        self.data[offset..offset + n].copy_from_slice(&src[..n]);
        self.busy_remaining = self.busy_passes;
        self.writes += 1;
        n
    }

    fn read(&self, offset: usize, dst: &mut [u8]) -> usize {
        if self.busy() || offset >= self.data.len() {
            return 0;
        }
        let n = dst.len().min(self.data.len() - offset);
        dst[..n].copy_from_slice(&self.data[offset..offset + n]);
        n
    }

    fn service(&mut self) {
        self.busy_remaining = self.busy_remaining.saturating_sub(1);
    }

    fn size(&self) -> usize {
        self.data.len()
    }
}

/// Write `data` at `offset`, yielding to other tasks whenever the device is busy.
pub fn write_cooperative<C: StorageContext>(
    sched: &mut Scheduler<C>,
    offset: usize,
    data: &[u8],
) -> Result<(), StorageError> {
    if offset + data.len() > sched.context_mut().storage().size() {
        return Err(StorageError::OutOfRange { offset, len: data.len() });
    }

    let mut done = 0;
    while done < data.len() {
        while sched.context_mut().storage().busy() {
            if !sched.yield_now() {
                return Err(StorageError::Interrupted);
            }
        }
        let n = sched.context_mut().storage().write(offset + done, &data[done..]);
        if n == 0 && !sched.context_mut().storage().busy() {
            return Err(StorageError::ShortWrite {
                accepted:  done,
                requested: data.len(),
            });
        }
        done += n;
    }
    Ok(())
}
