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

    lib.rs

    Disk II controller and drive emulation core.

    Reproduces the 6-and-2 encoded bit stream a legacy 16-sector controller expects, fed from a
    per-drive track cache that is filled over a byte transport, all run by a cooperative
    scheduler under a watchdog.
*/

pub mod cache;
pub mod codec;
pub mod controller;
pub mod coreconfig;
pub mod device_types;
pub mod drive;
pub mod error;
pub mod fetch;
pub mod hal;
pub mod head;
pub mod internal_disk;
pub mod scheduler;
pub mod storage;
pub mod system;
pub mod tasks;
pub mod tracelogger;
pub mod transport;
