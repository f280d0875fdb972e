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

    hal.rs

    Hardware abstraction for the legacy controller registers and the byte transport.

    The drive task and the fetch client only see these traits, so the same state machines run
    against the real controller, the simulated controller, or test doubles.
*/

use modular_bitfield::prelude::*;

use crate::device_types::geometry::TrackSector;

/// Controller status register. Bit layout is fixed by the controller hardware.
#[bitfield]
#[derive(Copy, Clone)]
pub struct ControllerStatus {
    pub phase: B4,
    pub motor: bool,
    pub drive: B1,
    pub wanted: bool,
    pub pending: bool,
}

impl ControllerStatus {
    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        ControllerStatus::from_bytes([byte])
    }

    #[inline]
    pub fn to_byte(&self) -> u8 {
        self.into_bytes()[0]
    }
}

impl std::fmt::Debug for ControllerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ph:{:04b} m:{} d:{} w:{} p:{}",
            self.phase(),
            self.motor() as u8,
            self.drive(),
            self.wanted() as u8,
            self.pending() as u8
        )
    }
}

pub trait DiskControllerRegs {
    fn read_status(&mut self) -> ControllerStatus;

    /// Write a byte to the data register. The controller sets `pending` until the host has
    /// consumed it.
    fn write_data(&mut self, byte: u8);

    /// Track and sector of the most recent operation the host's disk routines were asked to
    /// perform, if the controller can observe it.
    fn sector_hint(&self) -> Option<TrackSector> {
        None
    }
}

/// A byte oriented, non-blocking channel to the external image source.
pub trait ByteTransport {
    /// Number of received bytes that can be read without blocking.
    fn available(&self) -> usize;

    /// Read up to `buf.len()` bytes. Returns the count read.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Room in the transmit buffer, in bytes.
    fn write_available(&self) -> usize;

    /// Queue a string for transmission. Returns the number of bytes accepted.
    fn write_str(&mut self, s: &str) -> usize;

    fn write_char(&mut self, c: u8) -> bool;

    fn flush(&mut self);

    fn connected(&self) -> bool {
        true
    }
}
