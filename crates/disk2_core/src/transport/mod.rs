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

    transport::mod.rs

    Byte transports between the emulator and the external image source.

    The scheduler side reads and writes a RingTransport. The interrupt side, a TransportIsr,
    moves bytes between the rings and whatever physical link is attached.
*/

pub mod channel;
pub mod ring;
#[cfg(feature = "serial")]
pub mod serial;

pub use channel::{BidirectionalChannel, ChannelLink};
pub use ring::{ring_pair, RingTransport, TransportIsr, DEFAULT_RING_SIZE};

use anyhow::Error;

/// A physical link serviced from interrupt context.
pub trait Link {
    /// Move whatever is ready in either direction. Must not block.
    fn pump(&mut self, isr: &mut TransportIsr) -> Result<(), Error>;

    fn name(&self) -> &str;
}
