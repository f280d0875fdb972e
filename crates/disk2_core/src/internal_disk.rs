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

    internal_disk.rs

    The internal drive, backed by an image held in the storage engine.
*/

use crate::{
    cache::TrackCache,
    device_types::geometry::{image_offset, DriveId, SECTORS_PER_TRACK, SECTOR_SIZE, TRACK_COUNT, TRACK_SIZE},
    storage::StorageEngine,
};

/// Offset of the internal drive's image in storage.
pub const INTERNAL_IMAGE_BASE: usize = 0;

#[derive(Clone, Debug, Default)]
pub struct InternalDiskStats {
    pub tracks_loaded: u64,
    pub busy_passes: u64,
    pub read_errors: u64,
}

#[derive(Debug, Default)]
pub struct InternalDisk {
    base: usize,
    pending: Option<(u8, u8)>,
    stats: InternalDiskStats,
}

impl InternalDisk {
    pub fn new(base: usize) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    pub fn stats(&self) -> &InternalDiskStats {
        &self.stats
    }

    pub fn pending(&self) -> Option<(u8, u8)> {
        self.pending
    }

    /// Note that the head wants `track`. The whole track is loaded on the next service pass.
    pub fn request(&mut self, track: u8, volume: u8) {
        if (track as usize) < TRACK_COUNT {
            self.pending = Some((track, volume));
        }
        else {
            log::warn!("Internal disk: request for track {} past end of media", track);
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Load a pending track into the cache once the storage engine is idle. Returns true if a
    /// track was loaded.
    pub fn service(&mut self, storage: &mut dyn StorageEngine, cache: &mut TrackCache) -> bool {
        let Some((track, volume)) = self.pending
        else {
            return false;
        };
        if storage.busy() {
            self.stats.busy_passes += 1;
            return false;
        }
        self.pending = None;

        let mut buf = vec![0u8; TRACK_SIZE];
        let offset = self.base + image_offset(track, 0);
        let n = storage.read(offset, &mut buf);
        if n < TRACK_SIZE {
            self.stats.read_errors += 1;
            log::warn!("Internal disk: short read of track {} ({} of {} bytes)", track, n, TRACK_SIZE);
            return false;
        }

        cache.retag(DriveId::Internal, track, volume);
        for (sector, chunk) in buf.chunks_exact(SECTOR_SIZE).enumerate().take(SECTORS_PER_TRACK) {
            if let Ok(data) = <&[u8; SECTOR_SIZE]>::try_from(chunk) {
                cache.commit_sector(DriveId::Internal, sector as u8, data);
            }
        }
        self.stats.tracks_loaded += 1;
        log::trace!("Internal disk: loaded track {}", track);
        true
    }
}
