//! Module describing the [`Pins`] and [`BusDriver`] traits, the bit-banging implementation of the
//! TM1637 two-wire bus, and the platform-specific pin backings.

use embedded_hal_1::delay::DelayNs;
use strum::VariantArray;

/// Hold time, in microseconds, that must pass after every change of a bus line before the next
/// change or sample.  Used unless [`crate::Config::bit_delay_us`] says otherwise.
pub const DEFAULT_BIT_DELAY_US: u32 = 50;

/// The two lines of the TM1637 bus
#[derive(Copy, Clone, Debug, PartialEq, Eq, VariantArray)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    /// CLK
    Clock,
    /// DIO
    Data,
}

/// The value the controller put on the data line during the acknowledge clock at the end of a
/// byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack {
    /// The controller pulled DIO low
    Acknowledged,
    /// DIO stayed high; either nothing is listening or the controller missed the byte
    NotAcknowledged,
}

impl Ack {
    pub fn is_acknowledged(self) -> bool {
        self == Self::Acknowledged
    }

    /// Acknowledged only if both are
    pub fn and(self, other: Ack) -> Ack {
        if self.is_acknowledged() {
            other
        } else {
            Self::NotAcknowledged
        }
    }

    fn from_sampled_level(high: bool) -> Self {
        if high {
            Self::NotAcknowledged
        } else {
            Self::Acknowledged
        }
    }
}

/// Open-drain access to the clock and data lines.
///
/// The TM1637 bus is wired with pull-up resistors on both lines.  A line is either driven low by
/// the host, or released and left to the pull-up (or to the controller, which pulls DIO low to
/// acknowledge).  There is intentionally no way to drive a line high: every "high" on this bus
/// comes from the pull-up.
///
/// Implement this in terms of whatever your HAL offers.  Built-in implementations are
/// [`OpenDrainPins`] for any pair of `embedded-hal` pins already configured as open drain, and
/// `EmbassyRpPins` (feature `embassy-rp`) which toggles pin direction on the RP2040.
pub trait Pins {
    type Error;

    /// Pull the line low
    fn drive_low(&mut self, line: Line) -> Result<(), Self::Error>;

    /// Stop driving the line, so it floats up to the pull-up unless something else holds it low
    fn release(&mut self, line: Line) -> Result<(), Self::Error>;

    /// Read the current level of the line; `true` is high
    fn sample(&mut self, line: Line) -> Result<bool, Self::Error>;
}

impl<P: Pins + ?Sized> Pins for &mut P {
    type Error = P::Error;

    fn drive_low(&mut self, line: Line) -> Result<(), Self::Error> {
        P::drive_low(self, line)
    }

    fn release(&mut self, line: Line) -> Result<(), Self::Error> {
        P::release(self, line)
    }

    fn sample(&mut self, line: Line) -> Result<bool, Self::Error> {
        P::sample(self, line)
    }
}

/// This trait represents some low-level implementation of the TM1637 bus interface.
///
/// The TM1637 uses a two-wire bus that looks a lot like I2C but isn't: there is no device
/// address, the bit order is LSB first, and the framing is fixed.  This trait exposes a
/// transaction-level interface; [`BitBangingBusDriver`] implements it on top of [`Pins`], but
/// anything that can produce the same waveform (PIO, for example) can implement it instead.
///
/// Every method sends one transaction: a start condition, the command byte, any data bytes, and
/// a stop condition.  The bus must be idle (both lines released) when the method returns.
pub trait BusDriver {
    type Error;

    /// Send a single command, with no payload.
    ///
    /// Returns whether the controller acknowledged the byte.
    fn send_command(&mut self, command: u8) -> Result<Ack, Self::Error>;

    /// Send a command followed by a data payload within the same transaction.
    ///
    /// Returns [`Ack::Acknowledged`] only if every byte in the transaction was acknowledged.
    fn send_command_write_data(&mut self, command: u8, data: &[u8]) -> Result<Ack, Self::Error>;
}

/// Implementation of [`BusDriver`] which bit-bangs the protocol on a pair of [`Pins`], using a
/// [`DelayNs`] provider to hold each line state for the configured bit delay.
///
/// All waits are blocking.  One byte costs 28 bit delays; each transaction adds one for the start
/// condition and three for the stop condition.
pub struct BitBangingBusDriver<P, D> {
    pins: P,
    delay: D,
    bit_delay_us: u32,
}

impl<P: Pins, D: DelayNs> BitBangingBusDriver<P, D> {
    /// Create the driver with the default bit delay of [`DEFAULT_BIT_DELAY_US`].
    ///
    /// Both lines are released, which leaves the bus idle.  This is fallible if the underlying
    /// pin implementation is.
    pub fn new(pins: P, delay: D) -> Result<Self, P::Error> {
        Self::with_bit_delay(pins, delay, DEFAULT_BIT_DELAY_US)
    }

    /// Create the driver with an explicit hold time, in microseconds, for every line change.
    pub fn with_bit_delay(pins: P, delay: D, bit_delay_us: u32) -> Result<Self, P::Error> {
        let mut me = Self {
            pins,
            delay,
            bit_delay_us,
        };

        for line in Line::VARIANTS {
            me.pins.release(*line)?;
        }

        Ok(me)
    }

    pub fn bit_delay_us(&self) -> u32 {
        self.bit_delay_us
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Give back the pins and the delay provider.  The bus is left idle.
    pub fn into_parts(self) -> (P, D) {
        (self.pins, self.delay)
    }

    /// Shift one byte out on DIO, LSB first, then clock in the acknowledge bit.
    ///
    /// Assumes a start condition (or a previous byte) has already been sent.  On return CLK is
    /// driven low, and DIO is driven low if the byte was acknowledged.
    pub fn write_byte(&mut self, b: u8) -> Result<Ack, P::Error> {
        for bit in 0..8 {
            let mask = 1 << bit;

            self.pins.drive_low(Line::Clock)?;
            self.wait_bit();

            self.set_data((b & mask) != 0)?;
            self.wait_bit();

            // The controller latches DIO on this rising edge
            self.pins.release(Line::Clock)?;
            self.wait_bit();
        }

        // Hand DIO to the controller for the acknowledge clock
        self.pins.drive_low(Line::Clock)?;
        self.pins.release(Line::Data)?;
        self.wait_bit();

        self.pins.release(Line::Clock)?;
        self.wait_bit();

        let ack = Ack::from_sampled_level(self.pins.sample(Line::Data)?);
        if ack.is_acknowledged() {
            // Take DIO over from the controller before it lets go on the falling edge
            self.pins.drive_low(Line::Data)?;
        }
        self.wait_bit();

        self.pins.drive_low(Line::Clock)?;
        self.wait_bit();

        Ok(ack)
    }

    /// Start condition: DIO falls while CLK is high
    fn start(&mut self) -> Result<(), P::Error> {
        self.pins.drive_low(Line::Data)?;
        self.wait_bit();

        Ok(())
    }

    /// Stop condition: DIO rises while CLK is high.  Leaves both lines released.
    fn stop(&mut self) -> Result<(), P::Error> {
        self.pins.drive_low(Line::Data)?;
        self.wait_bit();
        self.pins.release(Line::Clock)?;
        self.wait_bit();
        self.pins.release(Line::Data)?;
        self.wait_bit();

        Ok(())
    }

    fn set_data(&mut self, high: bool) -> Result<(), P::Error> {
        if high {
            self.pins.release(Line::Data)
        } else {
            self.pins.drive_low(Line::Data)
        }
    }

    fn wait_bit(&mut self) {
        self.delay.delay_us(self.bit_delay_us);
    }
}

impl<P: Pins, D: DelayNs> BusDriver for BitBangingBusDriver<P, D> {
    type Error = P::Error;

    fn send_command(&mut self, command: u8) -> Result<Ack, Self::Error> {
        self.send_command_write_data(command, &[])
    }

    fn send_command_write_data(&mut self, command: u8, data: &[u8]) -> Result<Ack, Self::Error> {
        self.start()?;

        let mut ack = self.write_byte(command)?;
        for b in data {
            #[cfg(feature = "defmt")]
            defmt::trace!("data byte = {=u8:x}", *b);
            ack = ack.and(self.write_byte(*b)?);
        }

        self.stop()?;

        Ok(ack)
    }
}

/// [`Pins`] on top of two `embedded-hal` pins which the HAL has already configured as open-drain
/// outputs with input enabled.
///
/// On such pins `set_high` doesn't drive anything; it releases the line to the pull-up, which is
/// exactly what [`Pins::release`] needs.  Don't use this with push-pull pins: the controller
/// would fight the host when it acknowledges.
pub struct OpenDrainPins<CLK, DIO> {
    clock: CLK,
    dio: DIO,
}

impl<CLK, DIO> OpenDrainPins<CLK, DIO> {
    pub fn new(clock: CLK, dio: DIO) -> Self {
        Self { clock, dio }
    }

    pub fn into_inner(self) -> (CLK, DIO) {
        (self.clock, self.dio)
    }
}

impl<CLK, DIO> Pins for OpenDrainPins<CLK, DIO>
where
    CLK: embedded_hal_1::digital::OutputPin + embedded_hal_1::digital::InputPin,
    DIO: embedded_hal_1::digital::OutputPin
        + embedded_hal_1::digital::InputPin
        + embedded_hal_1::digital::ErrorType<Error = CLK::Error>,
{
    type Error = CLK::Error;

    fn drive_low(&mut self, line: Line) -> Result<(), Self::Error> {
        match line {
            Line::Clock => self.clock.set_low(),
            Line::Data => self.dio.set_low(),
        }
    }

    fn release(&mut self, line: Line) -> Result<(), Self::Error> {
        match line {
            Line::Clock => self.clock.set_high(),
            Line::Data => self.dio.set_high(),
        }
    }

    fn sample(&mut self, line: Line) -> Result<bool, Self::Error> {
        match line {
            Line::Clock => self.clock.is_high(),
            Line::Data => self.dio.is_high(),
        }
    }
}

#[cfg(feature = "embassy-rp")]
mod embassy_rp_pins {
    use core::convert::Infallible;
    use embassy_rp::gpio;

    use super::Line;

    /// Implementation of [`super::Pins`] that uses the Embassy RP HAL for the RP2040
    /// microcontroller.
    ///
    /// Each pin is a [`gpio::Flex`] with its output register held at low.  Releasing a line
    /// switches the pin to input; driving it low switches it to output.  The internal pulls are
    /// disabled since the TM1637 modules carry their own pull-up resistors.
    pub struct EmbassyRpPins<'a, ClockPin: gpio::Pin, DioPin: gpio::Pin> {
        clock: gpio::Flex<'a, ClockPin>,
        dio: gpio::Flex<'a, DioPin>,
    }

    impl<'a, ClockPin: gpio::Pin, DioPin: gpio::Pin> EmbassyRpPins<'a, ClockPin, DioPin> {
        pub fn new(clock: ClockPin, dio: DioPin) -> Self {
            let mut me = Self {
                clock: gpio::Flex::new(clock),
                dio: gpio::Flex::new(dio),
            };

            release_to_pull_up(&mut me.clock);
            release_to_pull_up(&mut me.dio);

            me
        }
    }

    fn release_to_pull_up<T: gpio::Pin>(pin: &mut gpio::Flex<'_, T>) {
        pin.set_pull(gpio::Pull::None);
        // The output register must read low before the pin is ever switched to output
        pin.set_low();
        pin.set_as_input();
    }

    impl<'a, ClockPin: gpio::Pin, DioPin: gpio::Pin> super::Pins
        for EmbassyRpPins<'a, ClockPin, DioPin>
    {
        type Error = Infallible;

        fn drive_low(&mut self, line: Line) -> Result<(), Self::Error> {
            match line {
                Line::Clock => {
                    self.clock.set_low();
                    self.clock.set_as_output();
                }
                Line::Data => {
                    self.dio.set_low();
                    self.dio.set_as_output();
                }
            }

            Ok(())
        }

        fn release(&mut self, line: Line) -> Result<(), Self::Error> {
            match line {
                Line::Clock => self.clock.set_as_input(),
                Line::Data => self.dio.set_as_input(),
            }

            Ok(())
        }

        fn sample(&mut self, line: Line) -> Result<bool, Self::Error> {
            Ok(match line {
                Line::Clock => self.clock.is_high(),
                Line::Data => self.dio.is_high(),
            })
        }
    }
}

#[cfg(feature = "embassy-rp")]
pub use embassy_rp_pins::EmbassyRpPins;
