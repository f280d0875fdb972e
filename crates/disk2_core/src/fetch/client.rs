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

    fetch::client.rs

    Fetch client for the external drive.

    Issues fill requests when the head finds a sector missing and assembles the response stream
    into the track cache. A sector only becomes visible to the head after its checksum matches.
*/

use std::fmt::Display;

use disk2_common::{util::hex_dump, HistoryBuffer};

use crate::{
    cache::TrackCache,
    codec::sector_checksum,
    device_types::geometry::{DriveId, SECTOR_SIZE},
    drive::DriveState,
    error::ProtocolError,
    fetch::protocol::{format_request, StreamEvent, StreamParser},
    hal::ByteTransport,
    tracelogger::TraceLogger,
};

pub const DEFAULT_RETRY_LIMIT: u32 = 1000;
pub const EVENT_LOG_LEN: usize = 32;

/// Read at most this many bytes per service pass.
const RX_CHUNK: usize = 256;
/// Transmit room required for `<TT\n` and `<TTS\n`, plus one.
const WHOLE_TRACK_ROOM: usize = 5;
const SECTOR_ROOM: usize = 6;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum_macros::Display)]
pub enum ExternalDiskState {
    #[default]
    Disconnected,
    NoDisk,
    /// Disk present, no transfer in flight.
    Inserted,
    Seeking,
    Reading,
    Writing,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FillRequest {
    Sector(u8),
    WholeTrack,
}

#[derive(Clone, Debug, Default)]
pub struct FetchStats {
    pub requests: u64,
    pub bytes_received: u64,
    pub sectors_committed: u64,
    pub sectors_discarded: u64,
    pub checksum_failures: u64,
    pub framing_errors: u64,
    pub timeouts: u64,
    pub crc_mismatches: u64,
    pub tracks_validated: u64,
}

impl Display for FetchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "req:{} rx:{} ok:{} drop:{} cs:{} fr:{} to:{} crc:{} val:{}",
            self.requests,
            self.bytes_received,
            self.sectors_committed,
            self.sectors_discarded,
            self.checksum_failures,
            self.framing_errors,
            self.timeouts,
            self.crc_mismatches,
            self.tracks_validated
        )
    }
}

/// A sector being received. Bytes are staged here and only copied into the cache once the
/// checksum matches.
#[derive(Clone)]
pub struct PartialSectorAssembly {
    track: u8,
    sector: u8,
    offset: usize,
    buffer: [u8; SECTOR_SIZE],
    /// The cache moved to another track after the request was made. Consume and drop.
    discard: bool,
}

impl PartialSectorAssembly {
    fn new(track: u8, sector: u8, discard: bool) -> Self {
        Self {
            track,
            sector,
            offset: 0,
            buffer: [0; SECTOR_SIZE],
            discard,
        }
    }
}

/// Things the rest of the system must react to after a service pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceOutcome {
    /// A disk was inserted. The head must be reset.
    pub inserted: bool,
    /// A complete track passed its CRC check.
    pub validated_track: Option<u8>,
}

pub struct FetchClient {
    state: ExternalDiskState,
    parser: StreamParser,
    assembly: Option<PartialSectorAssembly>,
    retries: u32,
    retry_limit: u32,
    whole_track: bool,
    events: Vec<StreamEvent>,
    rx_buf: [u8; RX_CHUNK],
    stats: FetchStats,
    event_log: HistoryBuffer<String>,
    trace: TraceLogger,
}

impl Default for FetchClient {
    fn default() -> Self {
        Self {
            state: ExternalDiskState::Disconnected,
            parser: StreamParser::new(),
            assembly: None,
            retries: 0,
            retry_limit: DEFAULT_RETRY_LIMIT,
            whole_track: false,
            events: Vec::with_capacity(RX_CHUNK),
            rx_buf: [0; RX_CHUNK],
            stats: Default::default(),
            event_log: HistoryBuffer::new(EVENT_LOG_LEN),
            trace: TraceLogger::None,
        }
    }
}

impl FetchClient {
    pub fn new(retry_limit: u32, whole_track: bool, trace: TraceLogger) -> Self {
        Self {
            retry_limit,
            whole_track,
            trace,
            ..Default::default()
        }
    }

    pub fn state(&self) -> ExternalDiskState {
        self.state
    }

    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    pub fn event_log(&self) -> &HistoryBuffer<String> {
        &self.event_log
    }

    pub fn whole_track(&self) -> bool {
        self.whole_track
    }

    fn set_state(&mut self, state: ExternalDiskState) {
        if self.state != state {
            log::debug!("External disk: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    fn note(&mut self, msg: String) {
        log::trace!("Fetch: {}", msg);
        self.event_log.push(msg);
    }

    fn drop_transfer(&mut self) {
        self.assembly = None;
        self.parser.reset();
        self.retries = 0;
    }

    /// Ask the external source for a sector or a whole track of the external drive.
    ///
    /// Nothing is sent while a transfer is in flight, or if the transmit buffer lacks room; the
    /// head will ask again on its next pass. Returns true if the request went out.
    pub fn request_fill(
        &mut self,
        transport: &mut dyn ByteTransport,
        cache: &mut TrackCache,
        track: u8,
        volume: u8,
        request: FillRequest,
    ) -> bool {
        if self.state != ExternalDiskState::Inserted {
            return false;
        }

        cache.retag(DriveId::External, track, volume);

        let (command, room) = match request {
            FillRequest::WholeTrack => (format_request(track, None), WHOLE_TRACK_ROOM),
            FillRequest::Sector(s) => (format_request(track, Some(s)), SECTOR_ROOM),
        };
        if transport.write_available() < room {
            return false;
        }

        transport.write_str(&command);
        transport.flush();
        self.trace.bytes("> ", command.as_bytes());
        self.note(format!("request {}", command.trim_end()));

        self.stats.requests += 1;
        self.assembly = None;
        self.retries = 0;
        self.set_state(ExternalDiskState::Reading);
        true
    }

    /// Build a request for `sector` honoring the whole track setting.
    pub fn request_for(&self, sector: u8) -> FillRequest {
        if self.whole_track {
            FillRequest::WholeTrack
        }
        else {
            FillRequest::Sector(sector)
        }
    }

    /// Drain the transport and apply what arrived. Called once per scheduler pass.
    pub fn service(
        &mut self,
        transport: &mut dyn ByteTransport,
        cache: &mut TrackCache,
        drive: &mut DriveState,
    ) -> ServiceOutcome {
        let mut outcome = ServiceOutcome::default();

        if !transport.connected() {
            if self.state != ExternalDiskState::Disconnected {
                self.note("disconnected".to_string());
                self.drop_transfer();
                cache.flush(DriveId::External);
                self.set_state(ExternalDiskState::Disconnected);
            }
            return outcome;
        }
        if self.state == ExternalDiskState::Disconnected {
            self.set_state(ExternalDiskState::NoDisk);
        }

        let count = if transport.available() > 0 {
            transport.read(&mut self.rx_buf)
        }
        else {
            0
        };

        if count == 0 {
            if self.state == ExternalDiskState::Reading {
                self.retries += 1;
                if self.retries > self.retry_limit {
                    self.protocol_error(ProtocolError::Timeout(self.retries));
                    self.drop_transfer();
                    self.set_state(ExternalDiskState::Inserted);
                }
            }
            return outcome;
        }

        self.retries = 0;
        self.stats.bytes_received += count as u64;
        self.trace.bytes("< ", &self.rx_buf[..count]);

        let mut events = std::mem::take(&mut self.events);
        events.clear();
        self.parser.feed(&self.rx_buf[..count], &mut events);
        for event in events.drain(..) {
            self.apply(event, cache, drive, &mut outcome);
        }
        self.events = events;

        outcome
    }

    fn apply(&mut self, event: StreamEvent, cache: &mut TrackCache, drive: &mut DriveState, outcome: &mut ServiceOutcome) {
        match event {
            StreamEvent::SectorStart { track, sector } => {
                if let Some(prev) = self.assembly.take() {
                    if !prev.discard {
                        log::debug!(
                            "Fetch: sector [t:{} s:{}] abandoned after {} bytes",
                            prev.track,
                            prev.sector,
                            prev.offset
                        );
                    }
                }
                let discard = cache.line(DriveId::External).track() != Some(track);
                if discard {
                    self.stats.sectors_discarded += 1;
                    self.note(format!("discard #{:02x}{:x}", track, sector));
                }
                self.assembly = Some(PartialSectorAssembly::new(track, sector, discard));
            }
            StreamEvent::PayloadByte(byte) => match &mut self.assembly {
                Some(asm) if asm.offset < SECTOR_SIZE => {
                    asm.buffer[asm.offset] = byte;
                    asm.offset += 1;
                }
                Some(_) => self.protocol_error(ProtocolError::Overflow),
                None => self.protocol_error(ProtocolError::Orphan),
            },
            StreamEvent::SectorEnd { checksum } => {
                let Some(asm) = self.assembly.take()
                else {
                    self.protocol_error(ProtocolError::Orphan);
                    return;
                };
                if asm.discard {
                    return;
                }
                if asm.offset != SECTOR_SIZE {
                    self.protocol_error(ProtocolError::ShortSector {
                        track:    asm.track,
                        sector:   asm.sector,
                        received: asm.offset,
                    });
                    return;
                }
                let actual = sector_checksum(&asm.buffer);
                if actual == checksum {
                    cache.commit_sector(DriveId::External, asm.sector, &asm.buffer);
                    self.stats.sectors_committed += 1;
                    if cache.is_track_complete(DriveId::External) {
                        self.note(format!("track {} cached", asm.track));
                    }
                }
                else {
                    log::trace!("Fetch: rejected sector starts {}", hex_dump(&asm.buffer[..16]));
                    self.protocol_error(ProtocolError::SectorChecksum {
                        track: asm.track,
                        sector: asm.sector,
                        expected: checksum,
                        actual,
                    });
                }
            }
            StreamEvent::TransferEnd => {
                self.assembly = None;
                self.retries = 0;
                if self.state == ExternalDiskState::Reading {
                    self.set_state(ExternalDiskState::Inserted);
                }
            }
            StreamEvent::TrackCrc(crc) => {
                cache.set_last_crc(DriveId::External, crc);
                if cache.is_track_complete(DriveId::External) {
                    let actual = cache.track_crc(DriveId::External);
                    let track = cache.line(DriveId::External).track().unwrap_or(0);
                    if actual == crc {
                        cache.set_validated(DriveId::External, crc);
                        self.stats.tracks_validated += 1;
                        self.note(format!("track {} validated {:08x}", track, crc));
                        outcome.validated_track = Some(track);
                    }
                    else {
                        self.protocol_error(ProtocolError::TrackCrc {
                            track,
                            expected: crc,
                            actual,
                        });
                    }
                }
            }
            StreamEvent::Volume(volume) => {
                drive.volume = volume;
                if self.state != ExternalDiskState::Reading {
                    self.note(format!("inserted volume {}", volume));
                    log::info!("External disk inserted, volume {}", volume);
                    cache.flush(DriveId::External);
                    self.drop_transfer();
                    self.set_state(ExternalDiskState::Inserted);
                    outcome.inserted = true;
                }
            }
            StreamEvent::Error(e) => self.protocol_error(e),
        }
    }

    fn protocol_error(&mut self, err: ProtocolError) {
        match err {
            ProtocolError::SectorChecksum { .. } => self.stats.checksum_failures += 1,
            ProtocolError::TrackCrc { .. } => self.stats.crc_mismatches += 1,
            ProtocolError::Timeout(_) => self.stats.timeouts += 1,
            _ => self.stats.framing_errors += 1,
        }
        log::warn!("Fetch: {}", err);
        self.note(err.to_string());
    }

    /// Abandon whatever was in flight, as after a reboot. An inserted disk stays inserted since
    /// the source announces it only once.
    pub fn restart(&mut self) {
        self.drop_transfer();
        if matches!(
            self.state,
            ExternalDiskState::Seeking | ExternalDiskState::Reading | ExternalDiskState::Writing
        ) {
            self.set_state(ExternalDiskState::Inserted);
        }
    }

    pub fn flush_trace(&mut self) {
        self.trace.flush();
    }
}
