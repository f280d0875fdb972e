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

    tests::drive_scenarios

    End to end runs of the drive, fetch and internal disk tasks.
*/

mod common;

use common::Harness;
use disk2_core::{
    codec::{decode_data_field, AddressField, DATA_FIELD_LEN, HEADER_STREAM_LEN},
    coreconfig::{CoreConfig, FetchConfig},
    device_types::geometry::{logical_to_physical, DriveId, TrackSector, DISK_SIZE, SECTOR_SIZE, TRACK_SIZE},
    fetch::{
        protocol::{format_sector, format_transfer_end},
        ExternalDiskState,
    },
    scheduler::crashlog::{CrashLog, FileCrashStore},
    storage::MemStorage,
    system::{MIRROR_BASE, STORAGE_SIZE},
};

const SECTOR_STREAM_LEN: usize = HEADER_STREAM_LEN + DATA_FIELD_LEN;

fn cached(h: &Harness, track: u8, sector: u8) -> bool {
    h.system().cache().is_cached(DriveId::External, track, 254, sector).is_some()
}

#[test]
fn empty_cache_fills_then_streams_without_filler() {
    let mut h = Harness::new(CoreConfig::default());
    h.insert(0xFE);
    assert_eq!(h.system().fetch().state(), ExternalDiskState::Inserted);

    h.seek(2);
    h.regs.0.borrow_mut().hint = Some(TrackSector::new(2, 0));
    h.want(true);
    h.pass();
    assert_eq!(h.written(), vec![0xFF]);
    assert_eq!(h.sent(), "<020\n");

    h.reply(&format!("#020\n{}\n=00\n*\n", "AA".repeat(SECTOR_SIZE)));
    for _ in 0..8 {
        if cached(&h, 2, 0) && h.system().fetch().state() == ExternalDiskState::Inserted {
            break;
        }
        h.pass();
    }
    assert!(cached(&h, 2, 0));
    assert_eq!(h.sent(), "", "no request while the sector is in flight");

    let fillers = h.system().controller().stats().fillers;
    let mark = h.written().len();
    h.pass();
    let stream = h.written()[mark..].to_vec();

    assert_eq!(h.system().controller().stats().fillers, fillers);
    assert_eq!(stream.len(), SECTOR_STREAM_LEN);
    assert_eq!(
        AddressField::parse(&stream[..HEADER_STREAM_LEN]),
        Some(AddressField::new(0xFE, 2, logical_to_physical(0)))
    );
    assert_eq!(decode_data_field(&stream[HEADER_STREAM_LEN..]), Ok([0xAA; SECTOR_SIZE]));
}

#[test]
fn bad_checksum_keeps_sending_filler() {
    let mut h = Harness::new(CoreConfig::default());
    h.insert(0xFE);
    h.want(true);
    h.pass();
    assert_eq!(h.sent(), "<000\n");

    h.reply(&format!("#000\n{}\n=01\n*\n", "AA".repeat(SECTOR_SIZE)));
    h.passes(6);
    assert!(!cached(&h, 0, 0));
    assert_eq!(h.system().fetch().stats().checksum_failures, 1);
    // Back to idle, so the head asks again.
    assert_eq!(h.sent(), "<000\n");
    assert!(h.written().iter().all(|&b| b == 0xFF));
}

#[test]
fn seeking_away_invalidates_the_line() {
    let mut h = Harness::new(CoreConfig::default());
    h.insert(0xFE);
    h.want(true);
    h.pass();
    h.sent();
    h.reply(&format_sector(0, 0, &[7; SECTOR_SIZE]));
    h.reply(&format_transfer_end(None));
    h.passes(4);
    assert_eq!(h.system().cache().line(DriveId::External).sector_valid(), 0x0001);

    h.seek(1);
    h.want(true);
    h.pass();
    assert!(h.sent().starts_with("<01"));
    let line = h.system().cache().line(DriveId::External);
    assert_eq!(line.track(), Some(1));
    assert_eq!(line.sector_valid(), 0);
}

#[test]
fn stalled_source_times_out_and_retries() {
    let config = CoreConfig {
        fetch: FetchConfig {
            retry_limit: 5,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut h = Harness::new(config);
    h.insert(0xFE);
    h.want(true);
    h.pass();
    assert_eq!(h.sent(), "<000\n");

    h.passes(7);
    assert_eq!(h.system().fetch().stats().timeouts, 1);
    assert_eq!(h.sent(), "<000\n");
}

#[test]
fn watchdog_crash_reboots_to_initial_state() {
    let path = std::env::temp_dir().join(format!("disk2_crash_{}.log", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let crash_log = CrashLog::new(Box::new(FileCrashStore::new(&path)));
    let mut h = Harness::with_parts(CoreConfig::default(), MemStorage::new(STORAGE_SIZE, 256, 0), crash_log);

    h.insert(0xFE);
    h.seek(3);
    h.want(true);
    h.pass();
    h.reply(&format_sector(3, 0, &[1; SECTOR_SIZE]));
    h.reply(&format_transfer_end(None));
    h.passes(4);
    assert!(cached(&h, 3, 0));

    // A task spun past the watchdog limit without yielding.
    h.timer.tick_n(6000);
    h.pass();

    assert_eq!(h.sched.reboots(), 1);
    let sys = h.system();
    assert_eq!(sys.cache().line(DriveId::External).track(), None);
    assert_eq!(sys.controller().drive(DriveId::External).half_track, 0);
    assert_eq!(sys.controller().stats().polls, 0);
    assert_eq!(sys.fetch().state(), ExternalDiskState::Inserted);
    assert_eq!(sys.controller().drive(DriveId::External).volume, 0xFE);

    let reloaded = CrashLog::new(Box::new(FileCrashStore::new(&path)));
    assert_eq!(reloaded.previous().len(), 1);
    assert!(reloaded.previous()[0].contains("Watchdog timeout"));
    let _ = std::fs::remove_file(&path);

    // The rebooted system runs normally.
    h.passes(3);
    assert_eq!(h.sched.reboots(), 1);
}

#[test]
fn internal_drive_reads_from_storage() {
    let image: Vec<u8> = (0..DISK_SIZE).map(|i| (i / SECTOR_SIZE) as u8 ^ 0x5A).collect();
    let storage = MemStorage::new(STORAGE_SIZE, 256, 0).with_contents(0, &image).unwrap();
    let mut h = Harness::with_parts(CoreConfig::default(), storage, CrashLog::default());

    h.regs.0.borrow_mut().drive = 1;
    h.seek(5);
    h.regs.0.borrow_mut().hint = Some(TrackSector::new(5, 9));
    h.want(true);
    h.pass();
    assert_eq!(h.written(), vec![0xFF]);
    assert_eq!(h.sent(), "");

    let mark = h.written().len();
    h.pass();
    let stream = h.written()[mark..].to_vec();
    assert_eq!(stream.len(), SECTOR_STREAM_LEN);
    let field = AddressField::parse(&stream).unwrap();
    assert_eq!(field, AddressField::new(254, 5, logical_to_physical(9)));
    let expected = (5 * 16 + 9) as u8 ^ 0x5A;
    assert_eq!(decode_data_field(&stream[HEADER_STREAM_LEN..]), Ok([expected; SECTOR_SIZE]));
}

#[test]
fn validated_tracks_are_mirrored_while_the_drive_runs() {
    let config = CoreConfig {
        fetch: FetchConfig {
            whole_track: true,
            mirror_validated_tracks: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let storage = MemStorage::new(STORAGE_SIZE, 256, 3);
    let mut h = Harness::with_parts(config, storage, CrashLog::default());
    h.insert(0xFE);
    h.seek(4);
    h.want(true);
    h.pass();
    assert_eq!(h.sent(), "<04\n");

    let mut track = vec![0u8; TRACK_SIZE];
    let mut reply = String::new();
    for s in 0..16u8 {
        let data = [s ^ 0xC3; SECTOR_SIZE];
        track[s as usize * SECTOR_SIZE..][..SECTOR_SIZE].copy_from_slice(&data);
        reply.push_str(&format_sector(4, s, &data));
    }
    reply.push_str(&format_transfer_end(Some(crc32fast::hash(&track))));
    h.stream(&reply);
    for _ in 0..200 {
        if h.system().tracks_mirrored() == 1 {
            break;
        }
        h.pass();
    }

    assert!(h.system().cache().line(DriveId::External).validated());
    assert_eq!(h.system().tracks_mirrored(), 1);
    let mut mirrored = vec![0u8; TRACK_SIZE];
    h.passes(4);
    assert_eq!(h.system().storage_engine().read(MIRROR_BASE + 4 * TRACK_SIZE, &mut mirrored), TRACK_SIZE);
    assert_eq!(mirrored, track);
    assert_eq!(h.sched.reboots(), 0);
    // The drive kept being served while the mirror write yielded.
    let stats = h.sched.task_stats();
    assert!(stats.iter().any(|t| t.name == "fetch" && t.invocations > 0));
    assert!(stats.iter().any(|t| t.name == "drive" && t.skipped == 0));
}
