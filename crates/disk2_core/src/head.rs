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

    head.rs

    Read/write head state machine.

    Feeds the controller one byte at a time: an address field, then the data field of the
    sector passing under the head, then the next sector in rotation. Sectors that are not yet
    cached produce sync bytes while a fill is requested.
*/

use crate::{
    cache::TrackCache,
    codec::{field::DataFieldDecoder, AddressField, DataFieldEncoder, HEADER_STREAM_LEN, SYNC_BYTE},
    device_types::geometry::{logical_to_physical, DriveId, TrackSector, SECTORS_PER_TRACK, SECTOR_SIZE},
    drive::DriveState,
    error::CodecError,
};

/// Something that can start fetching a sector that the head found missing from the cache.
pub trait FillRequester {
    fn request_fill(&mut self, drive: DriveId, track: u8, volume: u8, sector: u8);
}

#[derive(Clone, Debug, Default, strum_macros::IntoStaticStr)]
pub enum HeadState {
    #[default]
    Inactive,
    Header {
        offset:  usize,
        encoder: DataFieldEncoder,
    },
    Data {
        encoder: DataFieldEncoder,
    },
    Receiving {
        decoder: Box<DataFieldDecoder>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeadOutput {
    Byte(u8),
    /// Sector not available yet. A sync byte is sent so the controller stays in lock.
    Filler,
}

impl HeadOutput {
    pub fn byte(&self) -> u8 {
        match self {
            HeadOutput::Byte(b) => *b,
            HeadOutput::Filler => SYNC_BYTE,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct HeadStats {
    pub headers_sent: u64,
    pub sectors_sent: u64,
    pub fillers_sent: u64,
    pub torn_sectors: u64,
}

#[derive(Debug, Default)]
pub struct Head {
    state: HeadState,
    active_drive: Option<DriveId>,
    active_track: u8,
    /// Logical sector.
    active_sector: u8,
    header: [u8; HEADER_STREAM_LEN],
    stats: HeadStats,
}

impl Head {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn state(&self) -> &HeadState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, HeadState::Inactive)
    }

    pub fn active_drive(&self) -> Option<DriveId> {
        self.active_drive
    }

    pub fn position(&self) -> TrackSector {
        TrackSector::new(self.active_track, self.active_sector)
    }

    pub fn stats(&self) -> &HeadStats {
        &self.stats
    }

    /// Number of bytes of the current sector already sent, header included.
    pub fn bytes_sent(&self) -> usize {
        match &self.state {
            HeadState::Inactive => 0,
            HeadState::Header { offset, .. } => *offset,
            HeadState::Data { encoder } => HEADER_STREAM_LEN + encoder.position(),
            HeadState::Receiving { decoder } => decoder.bytes_received(),
        }
    }

    /// Drop any sector in progress and point the head at `sector`.
    pub fn reset(&mut self, sector: u8) {
        self.abandon();
        self.active_sector = sector & 0x0F;
    }

    /// The arm moved. A sector can't be finished from another track.
    pub fn track_changed(&mut self, track: u8) {
        if self.active_track != track && self.is_active() {
            log::trace!(
                "Head: arm moved {} -> {} after {} bytes",
                self.active_track,
                track,
                self.bytes_sent()
            );
            self.stats.torn_sectors += 1;
            self.state = HeadState::Inactive;
        }
    }

    fn abandon(&mut self) {
        if self.is_active() {
            self.stats.torn_sectors += 1;
        }
        self.state = HeadState::Inactive;
    }

    /// Produce the next byte passing under the head of `drive`.
    pub fn next_byte(
        &mut self,
        drive: DriveId,
        drive_state: &DriveState,
        cache: &TrackCache,
        hint: Option<TrackSector>,
        fill: &mut dyn FillRequester,
    ) -> HeadOutput {
        let track = drive_state.track();
        self.track_changed(track);

        if let HeadState::Inactive = self.state {
            if self.active_drive != Some(drive) || self.active_track != track {
                self.active_drive = Some(drive);
                self.active_track = track;
                if let Some(hint) = hint.filter(|h| h.track == track) {
                    self.active_sector = hint.sector & 0x0F;
                }
            }

            let Some(data) = cache.is_cached(drive, track, drive_state.volume, self.active_sector)
            else {
                fill.request_fill(drive, track, drive_state.volume, self.active_sector);
                self.stats.fillers_sent += 1;
                return HeadOutput::Filler;
            };

            let field = AddressField::new(drive_state.volume, track, logical_to_physical(self.active_sector));
            self.header = field.header_stream();
            self.state = HeadState::Header {
                offset:  0,
                encoder: DataFieldEncoder::new(data),
            };
            self.stats.headers_sent += 1;
        }

        match std::mem::take(&mut self.state) {
            HeadState::Header { offset, encoder } => {
                let byte = self.header[offset];
                self.state = if offset + 1 >= HEADER_STREAM_LEN {
                    HeadState::Data { encoder }
                }
                else {
                    HeadState::Header {
                        offset: offset + 1,
                        encoder,
                    }
                };
                HeadOutput::Byte(byte)
            }
            HeadState::Data { mut encoder } => {
                let byte = encoder.next().unwrap_or(SYNC_BYTE);
                if encoder.is_done() {
                    // Sectors pass under the head in descending logical order.
                    self.active_sector = self.active_sector.wrapping_sub(1) & (SECTORS_PER_TRACK as u8 - 1);
                    self.stats.sectors_sent += 1;
                }
                else {
                    self.state = HeadState::Data { encoder };
                }
                HeadOutput::Byte(byte)
            }
            state @ HeadState::Receiving { .. } => {
                self.state = state;
                HeadOutput::Filler
            }
            HeadState::Inactive => HeadOutput::Filler,
        }
    }

    /// Start accepting a data field written by the host.
    pub fn begin_write(&mut self) {
        self.abandon();
        self.state = HeadState::Receiving {
            decoder: Box::new(DataFieldDecoder::new()),
        };
    }

    /// Feed one byte written by the host. Returns the decoded sector once the data field is
    /// complete, after which the head goes inactive.
    pub fn receive(&mut self, byte: u8) -> Option<Result<[u8; SECTOR_SIZE], CodecError>> {
        let HeadState::Receiving { decoder } = &mut self.state
        else {
            return None;
        };
        let result = decoder.push(byte)?;
        self.state = HeadState::Inactive;
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_data_field, DATA_FIELD_LEN};

    #[derive(Default)]
    struct Requests(Vec<(DriveId, u8, u8, u8)>);

    impl FillRequester for Requests {
        fn request_fill(&mut self, drive: DriveId, track: u8, volume: u8, sector: u8) {
            self.0.push((drive, track, volume, sector));
        }
    }

    fn drive_on_track(track: u8) -> DriveState {
        DriveState {
            half_track: (track * 2) as i8,
            ..Default::default()
        }
    }

    fn pull(head: &mut Head, ds: &DriveState, cache: &TrackCache, n: usize) -> Vec<u8> {
        let mut req = Requests::default();
        (0..n)
            .map(|_| head.next_byte(DriveId::External, ds, cache, None, &mut req).byte())
            .collect()
    }

    #[test]
    fn missing_sector_sends_filler_and_requests() {
        let mut head = Head::new();
        let cache = TrackCache::new();
        let ds = drive_on_track(2);
        let mut req = Requests::default();
        let hint = Some(TrackSector::new(2, 5));

        let out = head.next_byte(DriveId::External, &ds, &cache, hint, &mut req);
        assert_eq!(out, HeadOutput::Filler);
        assert_eq!(out.byte(), 0xFF);
        assert_eq!(req.0, vec![(DriveId::External, 2, 254, 5)]);
        assert!(!head.is_active());

        // Keeps asking for the same sector.
        head.next_byte(DriveId::External, &ds, &cache, None, &mut req);
        assert_eq!(req.0[1], (DriveId::External, 2, 254, 5));
    }

    #[test]
    fn emits_header_then_data_and_rotates() {
        let mut head = Head::new();
        let mut cache = TrackCache::new();
        let ds = drive_on_track(1);
        cache.retag(DriveId::External, 1, 254);
        for s in 0..16u8 {
            cache.commit_sector(DriveId::External, s, &[s; SECTOR_SIZE]);
        }

        let stream = pull(&mut head, &ds, &cache, HEADER_STREAM_LEN + DATA_FIELD_LEN);
        let field = AddressField::parse(&stream[..HEADER_STREAM_LEN]).unwrap();
        assert_eq!(field, AddressField::new(254, 1, 0));
        assert_eq!(decode_data_field(&stream[HEADER_STREAM_LEN..]), Ok([0u8; SECTOR_SIZE]));
        assert!(!head.is_active());

        // Logical sector 15 follows sector 0.
        let stream = pull(&mut head, &ds, &cache, HEADER_STREAM_LEN + DATA_FIELD_LEN);
        let field = AddressField::parse(&stream).unwrap();
        assert_eq!(field.sector, logical_to_physical(15));
        assert_eq!(decode_data_field(&stream[HEADER_STREAM_LEN..]), Ok([15u8; SECTOR_SIZE]));
        assert_eq!(head.stats().sectors_sent, 2);
    }

    #[test]
    fn arm_movement_tears_sector() {
        let mut head = Head::new();
        let mut cache = TrackCache::new();
        cache.retag(DriveId::External, 3, 254);
        cache.commit_sector(DriveId::External, 0, &[0x11; SECTOR_SIZE]);

        let ds = drive_on_track(3);
        pull(&mut head, &ds, &cache, HEADER_STREAM_LEN + 40);
        assert!(matches!(head.state(), HeadState::Data { .. }));

        head.track_changed(4);
        assert!(!head.is_active());
        assert_eq!(head.bytes_sent(), 0);
        assert_eq!(head.stats().torn_sectors, 1);
    }

    #[test]
    fn new_track_starts_at_header_offset_zero() {
        let mut head = Head::new();
        let mut cache = TrackCache::new();
        cache.retag(DriveId::External, 3, 254);
        for s in 0..16u8 {
            cache.commit_sector(DriveId::External, s, &[0x22; SECTOR_SIZE]);
        }
        let ds = drive_on_track(3);
        pull(&mut head, &ds, &cache, HEADER_STREAM_LEN + 100);

        // Move while the drive cache still claims track 3; the head sees the new track on its
        // next byte and must not resume mid-field.
        let ds = drive_on_track(4);
        let mut req = Requests::default();
        let out = head.next_byte(DriveId::External, &ds, &cache, Some(TrackSector::new(4, 9)), &mut req);
        assert_eq!(out, HeadOutput::Filler);
        assert_eq!(req.0, vec![(DriveId::External, 4, 254, 9)]);
        assert_eq!(head.bytes_sent(), 0);

        cache.retag(DriveId::External, 4, 254);
        cache.commit_sector(DriveId::External, 9, &[0x33; SECTOR_SIZE]);
        let stream = pull(&mut head, &ds, &cache, HEADER_STREAM_LEN);
        assert_eq!(AddressField::parse(&stream), Some(AddressField::new(254, 4, logical_to_physical(9))));
    }

    #[test]
    fn write_path_decodes_host_data() {
        let mut head = Head::new();
        let sector = [0x7Eu8; SECTOR_SIZE];
        head.begin_write();
        let mut result = None;
        for byte in crate::codec::encode_data_field(&sector) {
            if let Some(r) = head.receive(byte) {
                result = Some(r);
                break;
            }
        }
        assert_eq!(result, Some(Ok(sector)));
        assert!(!head.is_active());
    }
}
