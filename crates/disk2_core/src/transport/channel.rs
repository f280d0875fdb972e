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

    transport::channel.rs

    A pair of crossbeam channels forming a two-way link between threads,
    and a Link that carries transport bytes over it.
*/

use anyhow::{anyhow, Error};
use crossbeam_channel::TryRecvError;

use crate::transport::{Link, TransportIsr};

#[derive(Clone)]
pub struct BidirectionalChannel<T> {
    sender:   crossbeam_channel::Sender<T>,
    receiver: crossbeam_channel::Receiver<T>,
}

impl<T> BidirectionalChannel<T> {
    pub fn new_pair() -> (Self, Self) {
        let (sender_a, receiver_a) = crossbeam_channel::unbounded();
        let (sender_b, receiver_b) = crossbeam_channel::unbounded();
        (
            Self {
                sender:   sender_a,
                receiver: receiver_b,
            },
            Self {
                sender:   sender_b,
                receiver: receiver_a,
            },
        )
    }

    pub fn send(&self, value: T) -> Result<(), crossbeam_channel::SendError<T>> {
        self.sender.send(value)
    }

    pub fn recv(&self) -> Result<T, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<T, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }
}

const CHUNK: usize = 64;

/// Carries transport bytes to a peer thread, such as the loopback image server.
pub struct ChannelLink {
    channel: BidirectionalChannel<Vec<u8>>,
    /// Received data that did not fit in the ring yet.
    backlog: Vec<u8>,
}

impl ChannelLink {
    pub fn new(channel: BidirectionalChannel<Vec<u8>>) -> Self {
        Self {
            channel,
            backlog: Vec::new(),
        }
    }
}

impl Link for ChannelLink {
    fn pump(&mut self, isr: &mut TransportIsr) -> Result<(), Error> {
        isr.set_connected(true);

        let mut buf = [0u8; CHUNK];
        loop {
            let n = isr.transmit(&mut buf);
            if n == 0 {
                break;
            }
            if self.channel.send(buf[..n].to_vec()).is_err() {
                isr.set_connected(false);
                return Err(anyhow!("Link peer hung up"));
            }
        }

        while isr.rx_room() > 0 {
            if self.backlog.is_empty() {
                match self.channel.try_recv() {
                    Ok(data) => self.backlog = data,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        isr.set_connected(false);
                        return Err(anyhow!("Link peer hung up"));
                    }
                }
            }
            let n = isr.receive(&self.backlog[..self.backlog.len().min(isr.rx_room())]);
            self.backlog.drain(..n);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "loopback"
    }
}
