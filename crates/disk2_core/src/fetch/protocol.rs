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

    fetch::protocol.rs

    Text protocol spoken with the external image source.

    Requests:   <TT    whole track TT
                <TTS   sector S of track TT
    Responses:  #TTS   start of sector S of track TT
                XX..   payload, two hex digits per byte
                =CC    end of sector, CC is the XOR of the 256 payload bytes
                *[CRC] end of transfer, optionally followed by the CRC32 of the track
                @VV    volume of the inserted disk

    All hex is case-insensitive. Whitespace separates tokens and is otherwise ignored.
*/

use disk2_common::util::{hex_char, hex_digit};

use crate::{device_types::geometry::SECTOR_SIZE, error::ProtocolError};

pub const REQUEST_MARKER: u8 = b'<';
pub const SECTOR_MARKER: u8 = b'#';
pub const CHECKSUM_MARKER: u8 = b'=';
pub const END_MARKER: u8 = b'*';
pub const VOLUME_MARKER: u8 = b'@';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    SectorStart { track: u8, sector: u8 },
    PayloadByte(u8),
    SectorEnd { checksum: u8 },
    TransferEnd,
    TrackCrc(u32),
    Volume(u8),
    Error(ProtocolError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TokenKind {
    SectorStart,
    Checksum,
    Volume,
    Crc,
}

impl TokenKind {
    fn marker(&self) -> char {
        match self {
            TokenKind::SectorStart => SECTOR_MARKER as char,
            TokenKind::Checksum => CHECKSUM_MARKER as char,
            TokenKind::Volume => VOLUME_MARKER as char,
            TokenKind::Crc => END_MARKER as char,
        }
    }

    fn digits(&self) -> u8 {
        match self {
            TokenKind::SectorStart => 3,
            TokenKind::Checksum | TokenKind::Volume => 2,
            TokenKind::Crc => 8,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum ParseState {
    #[default]
    Idle,
    Token {
        kind:   TokenKind,
        digits: u8,
        value:  u32,
    },
}

/// Incremental tokenizer for the response stream.
///
/// Bursts may split a token anywhere; partial tokens and the half-received payload nibble are
/// carried over to the next call to [StreamParser::feed].
#[derive(Debug, Default)]
pub struct StreamParser {
    state: ParseState,
    half:  Option<u8>,
}

impl StreamParser {
    pub fn new() -> Self {
        Default::default()
    }

    /// Drop any partial token and nibble.
    pub fn reset(&mut self) {
        self.state = ParseState::Idle;
        self.half = None;
    }

    pub fn is_idle(&self) -> bool {
        self.state == ParseState::Idle && self.half.is_none()
    }

    pub fn feed(&mut self, bytes: &[u8], events: &mut Vec<StreamEvent>) {
        for &byte in bytes {
            self.feed_byte(byte, events);
        }
    }

    pub fn feed_byte(&mut self, byte: u8, events: &mut Vec<StreamEvent>) {
        if let ParseState::Token { kind, digits, value } = self.state {
            if let Some(d) = hex_digit(byte) {
                let value = (value << 4) | d as u32;
                let digits = digits + 1;
                if digits == kind.digits() {
                    self.state = ParseState::Idle;
                    events.push(Self::complete(kind, value));
                }
                else {
                    self.state = ParseState::Token { kind, digits, value };
                }
                return;
            }

            // A non-hex byte ends the token. Only a CRC may be cut short.
            self.state = ParseState::Idle;
            match kind {
                TokenKind::Crc if digits > 0 => events.push(StreamEvent::TrackCrc(value)),
                TokenKind::Crc => {}
                _ => events.push(StreamEvent::Error(ProtocolError::MalformedToken {
                    token: kind.marker(),
                    byte,
                })),
            }
            // Fall through and look at the byte again as the start of a new token.
        }

        match byte {
            SECTOR_MARKER => self.begin(TokenKind::SectorStart, events),
            CHECKSUM_MARKER => self.begin(TokenKind::Checksum, events),
            VOLUME_MARKER => self.begin(TokenKind::Volume, events),
            END_MARKER => {
                self.begin(TokenKind::Crc, events);
                events.push(StreamEvent::TransferEnd);
            }
            b' ' | b'\t' | b'\r' | b'\n' => {
                // An odd number of digits can't be padded; the digit is lost.
                if self.half.take().is_some() {
                    events.push(StreamEvent::Error(ProtocolError::DanglingNibble));
                }
            }
            _ => match hex_digit(byte) {
                Some(d) => match self.half.take() {
                    Some(high) => events.push(StreamEvent::PayloadByte((high << 4) | d)),
                    None => self.half = Some(d),
                },
                None => events.push(StreamEvent::Error(ProtocolError::Framing(byte))),
            },
        }
    }

    fn begin(&mut self, kind: TokenKind, events: &mut Vec<StreamEvent>) {
        if self.half.take().is_some() {
            events.push(StreamEvent::Error(ProtocolError::DanglingNibble));
        }
        self.state = ParseState::Token {
            kind,
            digits: 0,
            value: 0,
        };
    }

    fn complete(kind: TokenKind, value: u32) -> StreamEvent {
        match kind {
            TokenKind::SectorStart => StreamEvent::SectorStart {
                track:  (value >> 4) as u8,
                sector: (value & 0x0F) as u8,
            },
            TokenKind::Checksum => StreamEvent::SectorEnd { checksum: value as u8 },
            TokenKind::Volume => StreamEvent::Volume(value as u8),
            TokenKind::Crc => StreamEvent::TrackCrc(value),
        }
    }
}

/// Build a fill request. `None` asks for the whole track.
pub fn format_request(track: u8, sector: Option<u8>) -> String {
    match sector {
        Some(s) => format!("<{:02x}{:x}\n", track, s & 0x0F),
        None => format!("<{:02x}\n", track),
    }
}

/// Parse one request line as sent by [format_request].
pub fn parse_request(line: &str) -> Option<(u8, Option<u8>)> {
    let digits = line.trim().strip_prefix(REQUEST_MARKER as char)?.as_bytes();
    let nibble = |i: usize| digits.get(i).copied().and_then(hex_digit);
    let track = (nibble(0)? << 4) | nibble(1)?;
    match digits.len() {
        2 => Some((track, None)),
        3 => Some((track, Some(nibble(2)?))),
        _ => None,
    }
}

/// Encode one sector as a response: `#TTS`, the payload and `=CC`.
pub fn format_sector(track: u8, sector: u8, data: &[u8; SECTOR_SIZE]) -> String {
    let mut out = String::with_capacity(SECTOR_SIZE * 2 + 12);
    out.push_str(&format!("#{:02x}{:x}\n", track, sector & 0x0F));
    for (i, byte) in data.iter().enumerate() {
        out.push(hex_char(byte >> 4) as char);
        out.push(hex_char(byte & 0x0F) as char);
        if i % 32 == 31 {
            out.push('\n');
        }
    }
    out.push_str(&format!("={:02x}\n", crate::codec::sector_checksum(data)));
    out
}

pub fn format_transfer_end(crc: Option<u32>) -> String {
    match crc {
        Some(crc) => format!("*{:08x}\n", crc),
        None => "*\n".to_string(),
    }
}

pub fn format_volume(volume: u8) -> String {
    format!("@{:02x}\n", volume)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Vec<StreamEvent> {
        let mut parser = StreamParser::new();
        let mut events = Vec::new();
        parser.feed(input, &mut events);
        events
    }

    #[test]
    fn tokens_are_recognized() {
        let events = parse(b"@fe\n#020\nAAbb\n=11*");
        assert_eq!(
            events,
            vec![
                StreamEvent::Volume(0xFE),
                StreamEvent::SectorStart { track: 2, sector: 0 },
                StreamEvent::PayloadByte(0xAA),
                StreamEvent::PayloadByte(0xBB),
                StreamEvent::SectorEnd { checksum: 0x11 },
                StreamEvent::TransferEnd,
            ]
        );
    }

    #[test]
    fn crc_follows_end_marker() {
        assert_eq!(
            parse(b"*DEADBEEF"),
            vec![StreamEvent::TransferEnd, StreamEvent::TrackCrc(0xDEAD_BEEF)]
        );
        assert_eq!(
            parse(b"*1f\n"),
            vec![StreamEvent::TransferEnd, StreamEvent::TrackCrc(0x1F)]
        );
        assert_eq!(parse(b"*\n"), vec![StreamEvent::TransferEnd]);
    }

    #[test]
    fn tokens_survive_burst_boundaries() {
        let mut parser = StreamParser::new();
        let mut events = Vec::new();
        for chunk in [&b"#0"[..], b"3", b"7a", b"5=", b"a", b"5"] {
            parser.feed(chunk, &mut events);
        }
        assert_eq!(
            events,
            vec![
                StreamEvent::SectorStart { track: 3, sector: 7 },
                StreamEvent::PayloadByte(0xA5),
                StreamEvent::SectorEnd { checksum: 0xA5 },
            ]
        );
        assert!(parser.is_idle());
    }

    #[test]
    fn framing_errors_resynchronize() {
        let events = parse(b"#0x#011\nzz12");
        assert_eq!(
            events,
            vec![
                StreamEvent::Error(ProtocolError::MalformedToken { token: '#', byte: b'x' }),
                StreamEvent::Error(ProtocolError::Framing(b'x')),
                StreamEvent::SectorStart { track: 1, sector: 1 },
                StreamEvent::Error(ProtocolError::Framing(b'z')),
                StreamEvent::Error(ProtocolError::Framing(b'z')),
                StreamEvent::PayloadByte(0x12),
            ]
        );
    }

    #[test]
    fn dangling_nibble_is_dropped() {
        let events = parse(b"a b1");
        assert_eq!(
            events,
            vec![
                StreamEvent::Error(ProtocolError::DanglingNibble),
                StreamEvent::PayloadByte(0xB1),
            ]
        );
    }

    #[test]
    fn request_format() {
        assert_eq!(format_request(2, Some(0)), "<020\n");
        assert_eq!(format_request(0x22, None), "<22\n");
        assert_eq!(parse_request("<020\n"), Some((2, Some(0))));
        assert_eq!(parse_request("<1F"), Some((0x1F, None)));
        assert_eq!(parse_request("<1"), None);
        assert_eq!(parse_request("#020"), None);
    }

    #[test]
    fn sector_response_parses_back() {
        let mut data = [0u8; SECTOR_SIZE];
        data[0] = 0x12;
        data[255] = 0xEF;
        let text = format_sector(4, 9, &data);
        let events = parse(text.as_bytes());

        assert_eq!(events[0], StreamEvent::SectorStart { track: 4, sector: 9 });
        let payload: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::PayloadByte(b) => Some(*b),
                _ => None,
            })
            .collect();
        assert_eq!(payload, data.to_vec());
        assert_eq!(events.last(), Some(&StreamEvent::SectorEnd { checksum: 0x12 ^ 0xEF }));
    }
}
