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

    codec::field.rs

    Address and data field framing.

    An address field identifies the sector passing under the head; the data field that follows
    carries its 342 symbols, each XORed against its predecessor before translation.
*/

use std::fmt::Display;

use crate::{
    codec::gcr::{decode, encode, odd_even_decode, odd_even_encode, translate, untranslate, SYMBOL_COUNT},
    device_types::geometry::SECTOR_SIZE,
    error::CodecError,
};

pub const SYNC_BYTE: u8 = 0xFF;
pub const ADDRESS_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0x96];
pub const ADDRESS_EPILOGUE: [u8; 3] = [0xDE, 0xAA, 0xEB];
pub const DATA_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0xAD];
pub const DATA_EPILOGUE: [u8; 3] = [0xDE, 0xAA, 0xEB];

pub const ADDRESS_FIELD_LEN: usize = 14;
/// Two sync bytes followed by the address field.
pub const HEADER_STREAM_LEN: usize = ADDRESS_FIELD_LEN + 2;
/// Sync byte, prologue, symbols, checksum and epilogue.
pub const DATA_FIELD_LEN: usize = 1 + DATA_PROLOGUE.len() + SYMBOL_COUNT + 1 + DATA_EPILOGUE.len();

const SYMBOLS_START: usize = 1 + DATA_PROLOGUE.len();
const CHECKSUM_POS: usize = SYMBOLS_START + SYMBOL_COUNT;

/// Byte-wise XOR of a buffer. This is the sector checksum used by the fetch protocol.
pub fn sector_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressField {
    pub volume: u8,
    pub track:  u8,
    /// Physical sector number.
    pub sector: u8,
}

impl Display for AddressField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[v:{:3} t:{:2} ps:{:2}]", self.volume, self.track, self.sector)
    }
}

impl AddressField {
    pub fn new(volume: u8, track: u8, sector: u8) -> Self {
        Self { volume, track, sector }
    }

    pub fn checksum(&self) -> u8 {
        self.volume ^ self.track ^ self.sector
    }

    pub fn encode(&self) -> [u8; ADDRESS_FIELD_LEN] {
        let mut field = [0u8; ADDRESS_FIELD_LEN];
        field[0..3].copy_from_slice(&ADDRESS_PROLOGUE);
        field[3..5].copy_from_slice(&odd_even_encode(self.volume));
        field[5..7].copy_from_slice(&odd_even_encode(self.track));
        field[7..9].copy_from_slice(&odd_even_encode(self.sector));
        field[9..11].copy_from_slice(&odd_even_encode(self.checksum()));
        field[11..14].copy_from_slice(&ADDRESS_EPILOGUE);
        field
    }

    /// The bytes sent ahead of a data field: two sync bytes and the address field.
    pub fn header_stream(&self) -> [u8; HEADER_STREAM_LEN] {
        let mut stream = [SYNC_BYTE; HEADER_STREAM_LEN];
        stream[2..].copy_from_slice(&self.encode());
        stream
    }

    /// Scan a byte stream for an address field and return the first one with a valid checksum.
    pub fn parse(stream: &[u8]) -> Option<AddressField> {
        stream
            .windows(ADDRESS_PROLOGUE.len() + 8)
            .filter(|w| w[0..3] == ADDRESS_PROLOGUE)
            .find_map(|w| {
                let field = AddressField {
                    volume: odd_even_decode(w[3], w[4]),
                    track:  odd_even_decode(w[5], w[6]),
                    sector: odd_even_decode(w[7], w[8]),
                };
                (field.checksum() == odd_even_decode(w[9], w[10])).then_some(field)
            })
    }
}

/// Streams the data field of one sector a byte at a time.
///
/// The sector is nibblized once on construction; the running XOR is applied as bytes are
/// pulled so the encoder can be abandoned at any point.
#[derive(Clone, Debug)]
pub struct DataFieldEncoder {
    symbols: [u8; SYMBOL_COUNT],
    pos: usize,
    last_symbol: u8,
}

impl DataFieldEncoder {
    pub fn new(sector: &[u8; SECTOR_SIZE]) -> Self {
        Self {
            symbols: encode(sector),
            pos: 0,
            last_symbol: 0,
        }
    }

    /// Number of bytes emitted so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        DATA_FIELD_LEN.saturating_sub(self.pos)
    }

    pub fn is_done(&self) -> bool {
        self.pos >= DATA_FIELD_LEN
    }
}

impl Iterator for DataFieldEncoder {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let byte = match self.pos {
            0 => SYNC_BYTE,
            p if p < SYMBOLS_START => DATA_PROLOGUE[p - 1],
            p if p < CHECKSUM_POS => {
                let symbol = self.symbols[p - SYMBOLS_START];
                let out = translate(self.last_symbol ^ symbol);
                self.last_symbol = symbol;
                out
            }
            CHECKSUM_POS => translate(self.last_symbol),
            p if p < DATA_FIELD_LEN => DATA_EPILOGUE[p - CHECKSUM_POS - 1],
            _ => return None,
        };
        self.pos += 1;
        Some(byte)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl ExactSizeIterator for DataFieldEncoder {}

pub fn encode_data_field(sector: &[u8; SECTOR_SIZE]) -> Vec<u8> {
    DataFieldEncoder::new(sector).collect()
}

/// Decode a data field. Leading sync bytes or other noise before the prologue are skipped.
pub fn decode_data_field(stream: &[u8]) -> Result<[u8; SECTOR_SIZE], CodecError> {
    let start = stream
        .windows(DATA_PROLOGUE.len())
        .position(|w| w == DATA_PROLOGUE)
        .ok_or(CodecError::MissingPrologue)?
        + DATA_PROLOGUE.len();

    let body = &stream[start..];
    if body.len() < SYMBOL_COUNT + 1 {
        return Err(CodecError::Truncated(body.len()));
    }

    let mut symbols = [0u8; SYMBOL_COUNT];
    let mut last = 0u8;
    for (i, byte) in body[..SYMBOL_COUNT].iter().enumerate() {
        let value = untranslate(*byte).ok_or(CodecError::InvalidDiskByte {
            byte:   *byte,
            offset: start + i,
        })?;
        last ^= value;
        symbols[i] = last;
    }

    let checksum = body[SYMBOL_COUNT];
    match untranslate(checksum) {
        Some(c) if c == last => {}
        Some(_) => return Err(CodecError::ChecksumMismatch),
        None => {
            return Err(CodecError::InvalidDiskByte {
                byte:   checksum,
                offset: start + SYMBOL_COUNT,
            })
        }
    }

    // Only the first two epilogue bytes are significant; the third is often clipped.
    match body.get(SYMBOL_COUNT + 1..SYMBOL_COUNT + 3) {
        Some(e) if e == &DATA_EPILOGUE[..2] => Ok(decode(&symbols)),
        _ => Err(CodecError::MissingEpilogue),
    }
}

#[derive(Clone, Debug)]
enum DecoderState {
    Searching { window: [u8; 3] },
    Collecting,
}

/// Incremental data field decoder for bytes written by the host.
#[derive(Clone, Debug)]
pub struct DataFieldDecoder {
    state:  DecoderState,
    buffer: Vec<u8>,
}

impl Default for DataFieldDecoder {
    fn default() -> Self {
        Self {
            state:  DecoderState::Searching { window: [0; 3] },
            buffer: Vec::with_capacity(SYMBOL_COUNT + 3 + DATA_PROLOGUE.len()),
        }
    }
}

impl DataFieldDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn bytes_received(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one byte. Returns the decoded sector (or the decode error) once the field is complete.
    pub fn push(&mut self, byte: u8) -> Option<Result<[u8; SECTOR_SIZE], CodecError>> {
        if let DecoderState::Searching { window } = &mut self.state {
            window.rotate_left(1);
            window[2] = byte;
            if *window == DATA_PROLOGUE {
                self.buffer.clear();
                self.buffer.extend_from_slice(&DATA_PROLOGUE);
                self.state = DecoderState::Collecting;
            }
            return None;
        }

        // Prologue, symbols, checksum and the two significant epilogue bytes.
        self.buffer.push(byte);
        if self.buffer.len() == DATA_PROLOGUE.len() + SYMBOL_COUNT + 3 {
            let result = decode_data_field(&self.buffer);
            *self = Default::default();
            Some(result)
        }
        else {
            None
        }
    }
}
