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

    transport::serial.rs

    Serial port link to an image server running on another machine.
*/

use std::io::{Read, Write};

use anyhow::{anyhow, Error};
use serialport::ClearBuffer;

use crate::transport::{Link, TransportIsr};

const CHUNK: usize = 256;

pub struct SerialLink {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl SerialLink {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, Error> {
        let mut port = serialport::new(port_name, baud_rate)
            .timeout(std::time::Duration::from_millis(1))
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(|e| anyhow!("Error opening serial port {}: {}", port_name, e))?;

        port.clear(ClearBuffer::All)?;
        log::debug!("Opened serial port {} at {} baud", port_name, baud_rate);

        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }

    pub fn available_ports() -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                log::error!("Couldn't enumerate serial ports: {}", e);
                Vec::new()
            }
        }
    }
}

impl Link for SerialLink {
    fn pump(&mut self, isr: &mut TransportIsr) -> Result<(), Error> {
        isr.set_connected(true);
        let mut buf = [0u8; CHUNK];

        let n = isr.transmit(&mut buf);
        if n > 0 {
            if let Err(e) = self.port.write_all(&buf[..n]) {
                isr.set_connected(false);
                return Err(anyhow!("Serial write error: {}", e));
            }
        }

        let waiting = self.port.bytes_to_read()? as usize;
        let want = waiting.min(isr.rx_room()).min(CHUNK);
        if want > 0 {
            match self.port.read(&mut buf[..want]) {
                Ok(n) => {
                    isr.receive(&buf[..n]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    isr.set_connected(false);
                    return Err(anyhow!("Serial read error: {}", e));
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
