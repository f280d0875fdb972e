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

    device_types::geometry.rs

    Geometry constants and sector addressing for 16-sector, 35-track
    5.25" media, and the DOS 3.3 sector interleave.
*/

use std::fmt::Display;

use strum::EnumCount;

pub const SECTOR_SIZE: usize = 256;
pub const SECTORS_PER_TRACK: usize = 16;
pub const TRACK_SIZE: usize = SECTORS_PER_TRACK * SECTOR_SIZE;
pub const TRACK_COUNT: usize = 35;
pub const DISK_SIZE: usize = TRACK_COUNT * TRACK_SIZE;

/// The stepper rests at twice the track resolution. Tracks 0-34 map to half-tracks 0-68.
pub const MAX_HALF_TRACK: i8 = (TRACK_COUNT as i8 - 1) * 2;

/// Bitmap value with one bit set for each sector of a track.
pub const ALL_SECTORS: u16 = 0xFFFF;

/// The volume number DOS 3.3 writes by default.
pub const DEFAULT_VOLUME: u8 = 254;

/// Physical to logical sector translation (DOS 3.3 interleave).
pub const INTERLEAVE_P2L: [u8; SECTORS_PER_TRACK] = [
    0x0, 0x7, 0xE, 0x6, 0xD, 0x5, 0xC, 0x4, 0xB, 0x3, 0xA, 0x2, 0x9, 0x1, 0x8, 0xF,
];

/// Logical to physical sector translation (DOS 3.3 interleave).
pub const INTERLEAVE_L2P: [u8; SECTORS_PER_TRACK] = [
    0x0, 0xD, 0xB, 0x9, 0x7, 0x5, 0x3, 0x1, 0xE, 0xC, 0xA, 0x8, 0x6, 0x4, 0x2, 0xF,
];

#[inline]
pub fn logical_to_physical(sector: u8) -> u8 {
    INTERLEAVE_L2P[(sector & 0x0F) as usize]
}

#[inline]
pub fn physical_to_logical(sector: u8) -> u8 {
    INTERLEAVE_P2L[(sector & 0x0F) as usize]
}

/// Byte offset of a logical sector within a linear (DOS-ordered) disk image.
#[inline]
pub fn image_offset(track: u8, sector: u8) -> usize {
    track as usize * TRACK_SIZE + (sector & 0x0F) as usize * SECTOR_SIZE
}

/// The two drive slots. The external drive is fed over the fetch protocol; the internal drive is
/// backed by the storage engine.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, strum_macros::EnumCount)]
pub enum DriveId {
    #[default]
    External,
    Internal,
}

pub const DRIVE_COUNT: usize = DriveId::COUNT;

impl DriveId {
    pub fn index(&self) -> usize {
        match self {
            DriveId::External => 0,
            DriveId::Internal => 1,
        }
    }

    /// Decode the drive select bit of the controller status register.
    pub fn from_select(bit: u8) -> Self {
        match bit & 1 {
            0 => DriveId::External,
            _ => DriveId::Internal,
        }
    }

    pub fn all() -> [DriveId; DRIVE_COUNT] {
        [DriveId::External, DriveId::Internal]
    }
}

impl Display for DriveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveId::External => write!(f, "external"),
            DriveId::Internal => write!(f, "internal"),
        }
    }
}

/// A track and logical sector pair.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TrackSector {
    pub track:  u8,
    pub sector: u8,
}

impl TrackSector {
    pub fn new(track: u8, sector: u8) -> Self {
        Self { track, sector }
    }
}

impl Display for TrackSector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[t:{:2} s:{:2}]", self.track, self.sector)
    }
}
