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

    codec::gcr.rs

    Sector nibblization and the 6-bit to disk byte translation table.
*/

use crate::device_types::geometry::SECTOR_SIZE;

pub const PRIMARY_LEN: usize = SECTOR_SIZE;
pub const SECONDARY_LEN: usize = 86;
pub const SYMBOL_COUNT: usize = PRIMARY_LEN + SECONDARY_LEN;

/// Number of bytes folded into the secondary buffer. Three passes over 86 entries, so the
/// first two sector bytes are visited twice.
const FOLD_COUNT: usize = SECONDARY_LEN * 3;

/// 6-bit value to valid disk byte. Every entry has the high bit set and at most one pair of
/// adjacent zero bits.
#[rustfmt::skip]
pub const TRANSLATE: [u8; 64] = [
    0x96, 0x97, 0x9A, 0x9B, 0x9D, 0x9E, 0x9F, 0xA6,
    0xA7, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, 0xB2, 0xB3,
    0xB4, 0xB5, 0xB6, 0xB7, 0xB9, 0xBA, 0xBB, 0xBC,
    0xBD, 0xBE, 0xBF, 0xCB, 0xCD, 0xCE, 0xCF, 0xD3,
    0xD6, 0xD7, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE,
    0xDF, 0xE5, 0xE6, 0xE7, 0xE9, 0xEA, 0xEB, 0xEC,
    0xED, 0xEE, 0xEF, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6,
    0xF7, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF,
];

const INVALID: u8 = 0xFF;

const UNTRANSLATE: [u8; 256] = {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < TRANSLATE.len() {
        table[TRANSLATE[i] as usize] = i as u8;
        i += 1;
    }
    table
};

#[inline]
pub fn translate(value: u8) -> u8 {
    TRANSLATE[(value & 0x3F) as usize]
}

/// Map a disk byte back to its 6-bit value. Returns None for bytes outside the table.
#[inline]
pub fn untranslate(byte: u8) -> Option<u8> {
    match UNTRANSLATE[byte as usize] {
        INVALID => None,
        v => Some(v),
    }
}

/// Split a header value into two bytes carrying its odd and even bits respectively.
#[inline]
pub fn odd_even_encode(value: u8) -> [u8; 2] {
    [(value >> 1) | 0xAA, value | 0xAA]
}

#[inline]
pub fn odd_even_decode(odd: u8, even: u8) -> u8 {
    ((odd << 1) | 0x01) & even
}

/// A sector split into 6-bit primary values and the packed low bit pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nibblized {
    pub primary:   [u8; PRIMARY_LEN],
    pub secondary: [u8; SECONDARY_LEN],
}

impl Default for Nibblized {
    fn default() -> Self {
        Self {
            primary:   [0; PRIMARY_LEN],
            secondary: [0; SECONDARY_LEN],
        }
    }
}

#[inline]
fn swap_low_bits(value: u8) -> u8 {
    ((value & 0x02) >> 1) | ((value & 0x01) << 1)
}

/// Rotate the low two bits of each sector byte out into the secondary buffer.
///
/// The byte index runs downward from 0x101 and wraps at 8 bits, so bytes 1 and 0 are folded in
/// on the first pass and again on the last. Their first copies occupy bits 4-5 of secondary
/// entries 0 and 1 and are never read back.
pub fn prenibblize(sector: &[u8; SECTOR_SIZE]) -> Nibblized {
    let mut out = Nibblized::default();

    let mut index = FOLD_COUNT;
    while index > 0 {
        for x in 0..SECONDARY_LEN {
            index -= 1;
            let y = index & 0xFF;
            let a = sector[y];
            out.secondary[x] = (out.secondary[x] << 2) | swap_low_bits(a);
            out.primary[y] = a >> 2;
        }
    }

    for s in out.secondary.iter_mut() {
        *s &= 0x3F;
    }
    out
}

/// Inverse of [prenibblize].
pub fn postnibblize(nibbles: &Nibblized) -> [u8; SECTOR_SIZE] {
    let mut sector = [0u8; SECTOR_SIZE];
    let mut secondary = nibbles.secondary;

    let mut x = SECONDARY_LEN;
    for (y, byte) in sector.iter_mut().enumerate() {
        x = match x {
            0 => SECONDARY_LEN - 1,
            _ => x - 1,
        };
        *byte = (nibbles.primary[y] << 2) | swap_low_bits(secondary[x]);
        secondary[x] >>= 2;
    }
    sector
}

/// Produce the 342 6-bit symbols in the order they are written to disk: the secondary buffer
/// from its last entry to its first, then the primary buffer.
pub fn encode(sector: &[u8; SECTOR_SIZE]) -> [u8; SYMBOL_COUNT] {
    let nibbles = prenibblize(sector);
    let mut symbols = [0u8; SYMBOL_COUNT];

    for (i, s) in nibbles.secondary.iter().rev().enumerate() {
        symbols[i] = *s;
    }
    symbols[SECONDARY_LEN..].copy_from_slice(&nibbles.primary);
    symbols
}

pub fn decode(symbols: &[u8; SYMBOL_COUNT]) -> [u8; SECTOR_SIZE] {
    let mut nibbles = Nibblized::default();

    for (i, s) in symbols[..SECONDARY_LEN].iter().enumerate() {
        nibbles.secondary[SECONDARY_LEN - 1 - i] = *s & 0x3F;
    }
    for (p, s) in nibbles.primary.iter_mut().zip(symbols[SECONDARY_LEN..].iter()) {
        *p = *s & 0x3F;
    }
    postnibblize(&nibbles)
}
