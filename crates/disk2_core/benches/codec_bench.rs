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

    benches::codec_bench.rs

    Benchmarks for the sector codec and the head's byte stream.
*/

use disk2_core::{
    cache::TrackCache,
    codec::{decode_data_field, encode, encode_data_field, DataFieldEncoder},
    device_types::geometry::{DriveId, SECTOR_SIZE},
    drive::DriveState,
    head::{FillRequester, Head},
};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

struct NoFill;

impl FillRequester for NoFill {
    fn request_fill(&mut self, _drive: DriveId, _track: u8, _volume: u8, _sector: u8) {}
}

fn test_sector() -> [u8; SECTOR_SIZE] {
    let mut sector = [0u8; SECTOR_SIZE];
    for (i, b) in sector.iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(37) ^ 0xA5;
    }
    sector
}

pub fn codec_bench(c: &mut Criterion) {
    let sector = test_sector();

    c.bench_function("codec_bench_encode_symbols", |b| {
        b.iter(|| encode(black_box(&sector)));
    });

    c.bench_function("codec_bench_data_field_iter", |b| {
        b.iter(|| {
            let mut acc = 0u8;
            for byte in DataFieldEncoder::new(black_box(&sector)) {
                acc ^= byte;
            }
            acc
        });
    });

    let field = encode_data_field(&sector);
    c.bench_function("codec_bench_decode_data_field", |b| {
        b.iter(|| decode_data_field(black_box(&field)));
    });

    c.bench_function("codec_bench_head_full_track", |b| {
        let mut cache = TrackCache::new();
        cache.retag(DriveId::External, 0, 254);
        for s in 0..16 {
            cache.commit_sector(DriveId::External, s, &sector);
        }
        let drive = DriveState::default();
        let mut head = Head::new();

        b.iter(|| {
            // 16 sectors of header plus data field.
            for _ in 0..(16 * 366) {
                black_box(head.next_byte(DriveId::External, &drive, &cache, None, &mut NoFill));
            }
        });
    });
}

criterion_group!(benches, codec_bench);
criterion_main!(benches);
