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

    drive.rs

    Drive mechanics: stepper phases, arm position and the motor and data request lines.
*/

use crate::{
    device_types::geometry::{DEFAULT_VOLUME, MAX_HALF_TRACK},
    hal::ControllerStatus,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepResult {
    /// No single phase energized, or the phase did not pull the arm.
    Idle,
    Moved { from: i8, to: i8 },
    /// The arm was driven into the track 0 stop.
    HitStop,
}

#[derive(Clone, Debug)]
pub struct DriveState {
    /// Arm position in half tracks.
    pub half_track: i8,
    /// Last energized stepper phase, 0-3.
    pub phase: u8,
    pub motor: bool,
    pub wanted: bool,
    pub volume: u8,
}

impl Default for DriveState {
    fn default() -> Self {
        Self {
            half_track: 0,
            phase: 0,
            motor: false,
            wanted: false,
            volume: DEFAULT_VOLUME,
        }
    }
}

impl DriveState {
    pub fn new(volume: u8) -> Self {
        Self {
            volume,
            ..Default::default()
        }
    }

    /// Return the drive to its power-on state. The inserted volume is kept.
    pub fn reset(&mut self) {
        *self = Self {
            volume: self.volume,
            ..Default::default()
        };
    }

    #[inline]
    pub fn track(&self) -> u8 {
        (self.half_track / 2) as u8
    }

    /// Latch the motor and data request lines from a status read.
    pub fn update_lines(&mut self, status: &ControllerStatus) {
        self.motor = status.motor();
        self.wanted = status.wanted();
    }

    /// Apply the stepper phase lines. A lone phase adjacent to the previous one pulls the arm a
    /// half track toward it; any other combination leaves the arm where it is.
    pub fn step(&mut self, phase_bits: u8) -> StepResult {
        let phase = match phase_bits & 0x0F {
            0b0001 => 0,
            0b0010 => 1,
            0b0100 => 2,
            0b1000 => 3,
            _ => return StepResult::Idle,
        };

        let delta: i8 = if (self.phase + 1) & 0x03 == phase {
            1
        }
        else if (phase + 1) & 0x03 == self.phase {
            -1
        }
        else {
            0
        };
        self.phase = phase;

        let from = self.half_track;
        let to = from + delta;
        if to < 0 {
            self.half_track = 0;
            return StepResult::HitStop;
        }
        self.half_track = to.min(MAX_HALF_TRACK);

        if self.half_track != from {
            StepResult::Moved {
                from,
                to: self.half_track,
            }
        }
        else {
            StepResult::Idle
        }
    }
}
