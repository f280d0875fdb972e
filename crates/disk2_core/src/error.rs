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

    error.rs

    Error types for the disk emulation core.

    None of these are fatal. Protocol and storage errors are logged, counted and the
    offending unit of work (a token, a sector, a transfer) is discarded.
*/

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Data field prologue not found")]
    MissingPrologue,
    #[error("Invalid disk byte {byte:02X} at offset {offset}")]
    InvalidDiskByte { byte: u8, offset: usize },
    #[error("Data field truncated after {0} bytes")]
    Truncated(usize),
    #[error("Data field checksum mismatch")]
    ChecksumMismatch,
    #[error("Data field epilogue not found")]
    MissingEpilogue,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Unexpected byte {0:02X} in fetch stream")]
    Framing(u8),
    #[error("Malformed '{token}' token at byte {byte:02X}")]
    MalformedToken { token: char, byte: u8 },
    #[error("Half-received payload nibble dropped")]
    DanglingNibble,
    #[error("Payload byte received outside of a sector")]
    Orphan,
    #[error("Sector payload overflow")]
    Overflow,
    #[error("Sector [t:{track} s:{sector}] ended after {received} bytes")]
    ShortSector { track: u8, sector: u8, received: usize },
    #[error("Sector [t:{track} s:{sector}] checksum mismatch: expected {expected:02X}, computed {actual:02X}")]
    SectorChecksum {
        track: u8,
        sector: u8,
        expected: u8,
        actual: u8,
    },
    #[error("Track {track} CRC mismatch: expected {expected:08X}, computed {actual:08X}")]
    TrackCrc { track: u8, expected: u32, actual: u32 },
    #[error("Transfer abandoned after {0} empty passes")]
    Timeout(u32),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Storage engine is busy")]
    Busy,
    #[error("Storage range {offset:#X}+{len:#X} is out of bounds")]
    OutOfRange { offset: usize, len: usize },
    #[error("Storage accepted {accepted} of {requested} bytes")]
    ShortWrite { accepted: usize, requested: usize },
    #[error("Storage operation interrupted by reboot")]
    Interrupted,
}
