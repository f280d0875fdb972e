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

    transport::ring.rs

    Lock-free receive and transmit rings shared with interrupt context.
*/

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use ringbuf::{Consumer, Producer, RingBuffer};

use crate::hal::ByteTransport;

pub const DEFAULT_RING_SIZE: usize = 1024;

/// Scheduler side of the transport.
pub struct RingTransport {
    rx: Consumer<u8>,
    tx: Producer<u8>,
    connected: Arc<AtomicBool>,
}

/// Interrupt side of the transport.
pub struct TransportIsr {
    rx: Producer<u8>,
    tx: Consumer<u8>,
    connected: Arc<AtomicBool>,
    /// Receive bytes dropped because the ring was full.
    pub overruns: u64,
}

pub fn ring_pair(size: usize) -> (RingTransport, TransportIsr) {
    let (rx_prod, rx_cons) = RingBuffer::<u8>::new(size).split();
    let (tx_prod, tx_cons) = RingBuffer::<u8>::new(size).split();
    let connected = Arc::new(AtomicBool::new(false));

    (
        RingTransport {
            rx: rx_cons,
            tx: tx_prod,
            connected: connected.clone(),
        },
        TransportIsr {
            rx: rx_prod,
            tx: tx_cons,
            connected,
            overruns: 0,
        },
    )
}

impl ByteTransport for RingTransport {
    fn available(&self) -> usize {
        self.rx.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.rx.pop_slice(buf)
    }

    fn write_available(&self) -> usize {
        self.tx.remaining()
    }

    fn write_str(&mut self, s: &str) -> usize {
        self.tx.push_slice(s.as_bytes())
    }

    fn write_char(&mut self, c: u8) -> bool {
        self.tx.push(c).is_ok()
    }

    fn flush(&mut self) {
        // The link drains the ring on every interrupt; nothing is held back.
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl TransportIsr {
    pub fn set_connected(&mut self, state: bool) {
        self.connected.store(state, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn rx_room(&self) -> usize {
        self.rx.remaining()
    }

    /// Deliver received bytes. Bytes that do not fit are dropped and counted.
    pub fn receive(&mut self, bytes: &[u8]) -> usize {
        let n = self.rx.push_slice(bytes);
        if n < bytes.len() {
            self.overruns += (bytes.len() - n) as u64;
        }
        n
    }

    /// Take bytes queued for transmission.
    pub fn transmit(&mut self, buf: &mut [u8]) -> usize {
        self.tx.pop_slice(buf)
    }

    pub fn tx_pending(&self) -> usize {
        self.tx.len()
    }
}
