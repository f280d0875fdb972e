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

    image_server.rs

    Loopback image server: the external side of the fetch protocol.

    Answers track and sector requests from a 140K image in DOS 3.3 order. Runs on its own thread
    and talks to the emulator over a crossbeam channel pair, standing in for the remote source.
*/

use std::{path::Path, thread::JoinHandle};

use anyhow::{anyhow, Error};

use disk2_core::{
    device_types::geometry::{image_offset, DISK_SIZE, SECTORS_PER_TRACK, SECTOR_SIZE, TRACK_COUNT, TRACK_SIZE},
    fetch::protocol::{format_sector, format_transfer_end, format_volume, parse_request},
    transport::BidirectionalChannel,
};

#[derive(Clone, Debug, Default)]
pub struct ImageServerStats {
    pub requests: u64,
    pub sectors_sent: u64,
    pub tracks_sent: u64,
    pub bad_requests: u64,
}

pub struct ImageServer {
    image: Vec<u8>,
    volume: u8,
    line: Vec<u8>,
    stats: ImageServerStats,
}

pub fn load_image(path: impl AsRef<Path>) -> Result<Vec<u8>, Error> {
    let path = path.as_ref();
    let image = std::fs::read(path).map_err(|e| anyhow!("Couldn't read image {}: {}", path.display(), e))?;
    if image.len() != DISK_SIZE {
        return Err(anyhow!(
            "Image {} is {} bytes, expected {}",
            path.display(),
            image.len(),
            DISK_SIZE
        ));
    }
    Ok(image)
}

/// A recognizable image for runs without a real disk: each sector is filled from its track and
/// sector number.
pub fn pattern_image() -> Vec<u8> {
    let mut image = vec![0u8; DISK_SIZE];
    for track in 0..TRACK_COUNT as u8 {
        for sector in 0..SECTORS_PER_TRACK as u8 {
            let offset = image_offset(track, sector);
            for (i, b) in image[offset..offset + SECTOR_SIZE].iter_mut().enumerate() {
                *b = track.wrapping_mul(16).wrapping_add(sector) ^ (i as u8);
            }
        }
    }
    image
}

impl ImageServer {
    pub fn new(image: Vec<u8>, volume: u8) -> Result<Self, Error> {
        if image.len() != DISK_SIZE {
            return Err(anyhow!("Image is {} bytes, expected {}", image.len(), DISK_SIZE));
        }
        Ok(Self {
            image,
            volume,
            line: Vec::new(),
            stats: Default::default(),
        })
    }

    pub fn stats(&self) -> &ImageServerStats {
        &self.stats
    }

    pub fn announce(&self) -> String {
        format_volume(self.volume)
    }

    /// Accept request bytes, returning a response for every complete line.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut responses = Vec::new();
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                if !self.line.is_empty() {
                    let line = String::from_utf8_lossy(&self.line).into_owned();
                    self.line.clear();
                    if let Some(response) = self.respond(&line) {
                        responses.push(response);
                    }
                }
            }
            else {
                self.line.push(byte);
            }
        }
        responses
    }

    pub fn respond(&mut self, line: &str) -> Option<String> {
        let Some((track, sector)) = parse_request(line)
        else {
            log::warn!("Image server: ignoring {:?}", line);
            self.stats.bad_requests += 1;
            return None;
        };
        self.stats.requests += 1;

        if track as usize >= TRACK_COUNT {
            log::warn!("Image server: track {} past end of image", track);
            self.stats.bad_requests += 1;
            return Some(format_transfer_end(None));
        }

        let mut out = String::new();
        match sector {
            Some(s) => {
                out.push_str(&format_sector(track, s, self.sector(track, s)));
                out.push_str(&format_transfer_end(None));
                self.stats.sectors_sent += 1;
            }
            None => {
                for s in 0..SECTORS_PER_TRACK as u8 {
                    out.push_str(&format_sector(track, s, self.sector(track, s)));
                }
                let start = image_offset(track, 0);
                let crc = crc32fast::hash(&self.image[start..start + TRACK_SIZE]);
                out.push_str(&format_transfer_end(Some(crc)));
                self.stats.sectors_sent += SECTORS_PER_TRACK as u64;
                self.stats.tracks_sent += 1;
            }
        }
        Some(out)
    }

    fn sector(&self, track: u8, sector: u8) -> &[u8; SECTOR_SIZE] {
        let offset = image_offset(track, sector);
        // Offsets come from in-range track and sector numbers, so the slice is always full.
        self.image[offset..offset + SECTOR_SIZE]
            .try_into()
            .unwrap_or(&[0; SECTOR_SIZE])
    }

    /// Serve requests on a new thread until the emulator side of the channel hangs up.
    pub fn spawn(mut self, channel: BidirectionalChannel<Vec<u8>>) -> JoinHandle<ImageServerStats> {
        std::thread::spawn(move || {
            if channel.send(self.announce().into_bytes()).is_err() {
                return self.stats;
            }
            while let Ok(bytes) = channel.recv() {
                for response in self.feed(&bytes) {
                    if channel.send(response.into_bytes()).is_err() {
                        return self.stats;
                    }
                }
            }
            log::debug!("Image server: link closed");
            self.stats
        })
    }
}
