//! A simulated TM1637 bus for the unit tests: a [`Pins`] implementation with pull-ups on both
//! lines and a model of the controller that decodes what the host puts on the wire.

use std::vec::Vec;

use crate::bus::{Line, Pins};
use embedded_hal_1::delay::DelayNs;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LineState {
    Released,
    DrivenLow,
}

/// Controller model.  Decodes start/stop conditions, latches DIO on every rising CLK edge, and
/// pulls DIO low for the acknowledge clock after each byte.
#[derive(Default)]
struct Device {
    acknowledges: bool,
    pulling_data: bool,
    in_transaction: bool,
    bits: u8,
    byte: u8,
    acking: bool,
    ack_clocked: bool,
    current: Vec<u8>,
    transactions: Vec<Vec<u8>>,
    latched_bits: Vec<bool>,
}

impl Device {
    fn observe(&mut self, clock_before: bool, data_before: bool, clock: bool, data: bool) {
        if clock_before && clock {
            if data_before && !data {
                self.start();
            } else if !data_before && data {
                self.stop();
            }
        } else if !clock_before && clock {
            self.rising_edge(data);
        } else if clock_before && !clock {
            self.falling_edge();
        }
    }

    fn start(&mut self) {
        if self.in_transaction {
            self.stop();
        }
        self.in_transaction = true;
        self.reset_shift_register();
    }

    fn stop(&mut self) {
        if self.in_transaction {
            // A partial byte (the stop condition's own clock edge) is discarded
            self.transactions.push(core::mem::take(&mut self.current));
        }
        self.in_transaction = false;
        self.reset_shift_register();
    }

    fn rising_edge(&mut self, data: bool) {
        if !self.in_transaction {
            return;
        }

        if self.acking {
            if !self.ack_clocked {
                self.ack_clocked = true;
                self.current.push(self.byte);
            }
        } else if self.bits < 8 {
            self.latched_bits.push(data);
            if data {
                self.byte |= 1 << self.bits;
            }
            self.bits += 1;
        }
    }

    fn falling_edge(&mut self) {
        if !self.in_transaction {
            return;
        }

        if self.acking && self.ack_clocked {
            self.reset_shift_register();
        } else if !self.acking && self.bits == 8 {
            self.acking = true;
            self.pulling_data = self.acknowledges;
        }
    }

    fn reset_shift_register(&mut self) {
        self.bits = 0;
        self.byte = 0;
        self.acking = false;
        self.ack_clocked = false;
        self.pulling_data = false;
    }
}

/// Two pulled-up lines with a TM1637 attached
pub struct SimulatedBus {
    clock: LineState,
    data: LineState,
    device: Device,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self {
            clock: LineState::Released,
            data: LineState::Released,
            device: Device {
                acknowledges: true,
                ..Default::default()
            },
        }
    }

    /// A controller that never pulls DIO low to acknowledge (or isn't connected at all)
    pub fn without_acknowledge(mut self) -> Self {
        self.device.acknowledges = false;
        self
    }

    /// Completed transactions, each as the list of bytes received between start and stop
    pub fn transactions(&self) -> &[Vec<u8>] {
        &self.device.transactions
    }

    pub fn take_transactions(&mut self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.device.transactions)
    }

    /// Every data bit latched by the controller, in the order it was clocked in
    pub fn latched_bits(&self) -> &[bool] {
        &self.device.latched_bits
    }

    pub fn is_released(&self, line: Line) -> bool {
        self.state(line) == LineState::Released
    }

    /// Both lines released by the host and the controller not holding DIO
    pub fn is_idle(&self) -> bool {
        self.is_released(Line::Clock) && self.is_released(Line::Data) && !self.device.pulling_data
    }

    fn state(&self, line: Line) -> LineState {
        match line {
            Line::Clock => self.clock,
            Line::Data => self.data,
        }
    }

    fn level(&self, line: Line) -> bool {
        let pulled_by_device = line == Line::Data && self.device.pulling_data;
        self.state(line) == LineState::Released && !pulled_by_device
    }

    fn set(&mut self, line: Line, state: LineState) {
        let clock_before = self.level(Line::Clock);
        let data_before = self.level(Line::Data);

        match line {
            Line::Clock => self.clock = state,
            Line::Data => self.data = state,
        }

        let clock = self.level(Line::Clock);
        let data = self.level(Line::Data);
        self.device.observe(clock_before, data_before, clock, data);
    }
}

impl Pins for SimulatedBus {
    type Error = core::convert::Infallible;

    fn drive_low(&mut self, line: Line) -> Result<(), Self::Error> {
        self.set(line, LineState::DrivenLow);
        Ok(())
    }

    fn release(&mut self, line: Line) -> Result<(), Self::Error> {
        self.set(line, LineState::Released);
        Ok(())
    }

    fn sample(&mut self, line: Line) -> Result<bool, Self::Error> {
        Ok(self.level(line))
    }
}

/// Pins whose data line breaks when read
pub struct BrokenDataPin;

#[derive(Debug, PartialEq, Eq)]
pub struct PinFault;

impl Pins for BrokenDataPin {
    type Error = PinFault;

    fn drive_low(&mut self, _line: Line) -> Result<(), Self::Error> {
        Ok(())
    }

    fn release(&mut self, _line: Line) -> Result<(), Self::Error> {
        Ok(())
    }

    fn sample(&mut self, _line: Line) -> Result<bool, Self::Error> {
        Err(PinFault)
    }
}

/// Delay that returns immediately and keeps a tally of what it was asked to wait
#[derive(Default)]
pub struct RecordingDelay {
    calls: usize,
    total_us: u64,
    total_ns: u64,
}

impl RecordingDelay {
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn total_us(&self) -> u64 {
        self.total_us
    }

    pub fn total_ns(&self) -> u64 {
        self.total_ns
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.total_us += u64::from(us);
    }
}
