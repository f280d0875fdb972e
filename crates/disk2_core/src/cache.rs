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

    cache.rs

    Per-drive track cache.

    Each drive holds at most one track. A sector is only readable once its validity bit is set,
    which happens after its checksum has been verified.
*/

use crate::device_types::geometry::{DriveId, ALL_SECTORS, DRIVE_COUNT, SECTOR_SIZE, TRACK_SIZE};

#[derive(Clone)]
pub struct TrackCacheLine {
    track: Option<u8>,
    volume: u8,
    sector_valid: u16,
    validated: bool,
    last_crc: Option<u32>,
    data: Box<[u8; TRACK_SIZE]>,
}

impl Default for TrackCacheLine {
    fn default() -> Self {
        Self {
            track: None,
            volume: 0,
            sector_valid: 0,
            validated: false,
            last_crc: None,
            data: Box::new([0; TRACK_SIZE]),
        }
    }
}

impl TrackCacheLine {
    pub fn track(&self) -> Option<u8> {
        self.track
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn sector_valid(&self) -> u16 {
        self.sector_valid
    }

    pub fn validated(&self) -> bool {
        self.validated
    }

    pub fn last_crc(&self) -> Option<u32> {
        self.last_crc
    }

    pub fn matches(&self, track: u8, volume: u8) -> bool {
        self.track == Some(track) && self.volume == volume
    }

    pub fn is_complete(&self) -> bool {
        self.sector_valid == ALL_SECTORS
    }

    pub fn data(&self) -> &[u8; TRACK_SIZE] {
        &self.data
    }

    fn sector(&self, sector: u8) -> Option<&[u8; SECTOR_SIZE]> {
        let offset = (sector as usize & 0x0F) * SECTOR_SIZE;
        self.data[offset..offset + SECTOR_SIZE].try_into().ok()
    }

    fn invalidate(&mut self) {
        self.sector_valid = 0;
        self.validated = false;
        self.last_crc = None;
    }
}

#[derive(Clone, Default)]
pub struct TrackCache {
    lines: [TrackCacheLine; DRIVE_COUNT],
}

impl TrackCache {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn line(&self, drive: DriveId) -> &TrackCacheLine {
        &self.lines[drive.index()]
    }

    /// Return the sector's data if the line holds `track` of `volume` and the sector is valid.
    pub fn is_cached(&self, drive: DriveId, track: u8, volume: u8, sector: u8) -> Option<&[u8; SECTOR_SIZE]> {
        let line = &self.lines[drive.index()];
        if line.matches(track, volume) && line.sector_valid & (1 << (sector & 0x0F)) != 0 {
            line.sector(sector)
        }
        else {
            None
        }
    }

    /// Point the line at a new track or volume. Any mismatch clears every validity bit.
    /// Returns true if the line was invalidated.
    pub fn retag(&mut self, drive: DriveId, track: u8, volume: u8) -> bool {
        let line = &mut self.lines[drive.index()];
        if line.matches(track, volume) {
            return false;
        }
        log::debug!(
            "Cache {}: retag {:?}/{} -> {}/{}",
            drive,
            line.track,
            line.volume,
            track,
            volume
        );
        line.invalidate();
        line.track = Some(track);
        line.volume = volume;
        true
    }

    /// Copy a verified sector into the line and mark it valid.
    pub fn commit_sector(&mut self, drive: DriveId, sector: u8, data: &[u8; SECTOR_SIZE]) {
        let line = &mut self.lines[drive.index()];
        let offset = (sector as usize & 0x0F) * SECTOR_SIZE;
        line.data[offset..offset + SECTOR_SIZE].copy_from_slice(data);
        line.sector_valid |= 1 << (sector & 0x0F);
    }

    /// Forget the line entirely, as on a disk change.
    pub fn flush(&mut self, drive: DriveId) {
        let line = &mut self.lines[drive.index()];
        line.invalidate();
        line.track = None;
        line.volume = 0;
    }

    pub fn is_track_complete(&self, drive: DriveId) -> bool {
        self.lines[drive.index()].is_complete()
    }

    pub fn track_crc(&self, drive: DriveId) -> u32 {
        crc32fast::hash(&self.lines[drive.index()].data[..])
    }

    pub fn set_validated(&mut self, drive: DriveId, crc: u32) {
        let line = &mut self.lines[drive.index()];
        line.validated = true;
        line.last_crc = Some(crc);
    }

    pub fn set_last_crc(&mut self, drive: DriveId, crc: u32) {
        self.lines[drive.index()].last_crc = Some(crc);
    }
}
