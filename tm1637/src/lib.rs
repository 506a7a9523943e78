#![cfg_attr(not(test), no_std)]

mod bus;
mod font;
#[cfg(test)]
mod sim;

use core::fmt::Write;

use embedded_hal_1::delay::DelayNs;

pub use bus::*;
pub use font::*;

/// Brightness used until [`Tm1637::set_brightness`] is called: display on, brightest level
pub const DEFAULT_BRIGHTNESS: u8 = 0x0F;

/// Mask applied to the brightness before it goes into the display control command.  Bit 3
/// switches the display on; bits 0-2 select one of 8 brightness levels.
pub const BRIGHTNESS_MASK: u8 = 0x0F;

/// Mask applied to the start position of a segment write
pub const POSITION_MASK: u8 = 0x03;

/// Brightness bits that actually reach the controller; anything above the low nibble is dropped
pub fn mask_brightness(brightness: u8) -> u8 {
    brightness & BRIGHTNESS_MASK
}

/// Digit address that actually reaches the controller; positions wrap around the 4 digits
pub fn mask_position(position: u8) -> u8 {
    position & POSITION_MASK
}

/// How many segment masks of a write of `len` masks actually reach the controller
pub fn truncate_to_slots(len: usize) -> usize {
    len.min(DIGITS)
}

/// What to do when the controller doesn't acknowledge a byte
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckPolicy {
    /// Log it and carry on as if nothing happened.  A display that isn't plugged in is simply
    /// dark.
    #[default]
    Ignore,

    /// Finish the update anyway, then return [`Error::NotAcknowledged`] for the first
    /// transaction that wasn't acknowledged.
    Report,
}

/// Runtime configuration of a [`Tm1637`] and its bit-banging bus driver
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Hold time after every line change, in microseconds
    pub bit_delay_us: u32,

    /// Initial value for [`Tm1637::set_brightness`]
    pub brightness: u8,

    /// What to do when the controller doesn't acknowledge a byte
    pub ack_policy: AckPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bit_delay_us: DEFAULT_BIT_DELAY_US,
            brightness: DEFAULT_BRIGHTNESS,
            ack_policy: AckPolicy::default(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The bus driver (ultimately, the pins) failed
    Bus(E),

    /// Some byte of the transaction started by `command` was not acknowledged.  Only returned
    /// with [`AckPolicy::Report`].
    NotAcknowledged { command: u8 },
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Bus(e)
    }
}

pub struct Tm1637Builder;

impl Tm1637Builder {
    /// Use an arbitrary [`BusDriver`] implementation; nothing more needs to be specified!
    pub fn with_bus_driver<D: BusDriver>(self, driver: D) -> Tm1637Builder3<D> {
        Tm1637Builder3 {
            driver,
            config: Config::default(),
        }
    }

    /// Use an arbitrary [`DelayNs`] implementation to time the bus.
    pub fn with_delay<D: DelayNs>(self, delay: D) -> Tm1637Builder1<D> {
        Tm1637Builder1 { delay }
    }

    #[cfg(feature = "embassy-time")]
    /// Time the bus with the blocking [`embassy_time::Delay`]
    pub fn with_embassy_delay(self) -> Tm1637Builder1<embassy_time::Delay> {
        self.with_delay(embassy_time::Delay)
    }
}

pub struct Tm1637Builder1<D: DelayNs> {
    delay: D,
}

impl<D: DelayNs> Tm1637Builder1<D> {
    /// Use the bit-banging driver, with an arbitrary implementation of [`Pins`] specific to your
    /// target platform
    pub fn with_pins<P: Pins>(self, pins: P) -> Tm1637Builder2<P, D> {
        Tm1637Builder2 {
            pins,
            delay: self.delay,
            config: Config::default(),
        }
    }

    /// Use a bit-banging driver talking to the specified Embassy RP HAL pins
    #[cfg(feature = "embassy-rp")]
    pub fn with_embassy_rp_pins<'a, ClockPin: embassy_rp::gpio::Pin, DioPin: embassy_rp::gpio::Pin>(
        self,
        clock: ClockPin,
        dio: DioPin,
    ) -> Tm1637Builder2<EmbassyRpPins<'a, ClockPin, DioPin>, D> {
        self.with_pins(EmbassyRpPins::new(clock, dio))
    }
}

pub struct Tm1637Builder2<P: Pins, D: DelayNs> {
    pins: P,
    delay: D,
    config: Config,
}

impl<P: Pins, D: DelayNs> Tm1637Builder2<P, D> {
    pub fn with_config(self, config: Config) -> Self {
        Self { config, ..self }
    }

    /// Construct the [`Tm1637`] instance using the bit-banging driver.
    ///
    /// This is fallible if the underling I/O implementation is.
    pub fn build(self) -> Result<Tm1637<BitBangingBusDriver<P, D>>, P::Error> {
        let driver =
            BitBangingBusDriver::with_bit_delay(self.pins, self.delay, self.config.bit_delay_us)?;
        Ok(Tm1637::from_config(driver, &self.config))
    }
}

pub struct Tm1637Builder3<D: BusDriver> {
    driver: D,
    config: Config,
}

impl<D: BusDriver> Tm1637Builder3<D> {
    /// Only `brightness` and `ack_policy` apply; the bus timing is up to the driver.
    pub fn with_config(self, config: Config) -> Self {
        Self { config, ..self }
    }

    /// Construct the [`Tm1637`] instance using the selected driver.
    pub fn build(self) -> Tm1637<D> {
        Tm1637::from_config(self.driver, &self.config)
    }
}

/// Driver for TM1637 based 4-digit 7-segment display modules.
///
/// The implementation is generalized over the implementation of the underling bus protocol driver,
/// behind the [`BusDriver`] trait.  The [`BitBangingBusDriver`] works with any [`Pins`] and
/// [`DelayNs`] implementation, which covers most HALs.
///
/// The most straightforward way to instantiate this driver is using [`Self::builder`].  For
/// example, to use `embassy-time` for timing and the `embassy-rp` HAL for the RP2040:
///
/// ```
/// # #[cfg(all(feature = "embassy-time", feature = "embassy-rp"))]
/// # {
/// let p = embassy_rp::init(Default::default());
/// let mut display = tm1637::Tm1637::builder()
///     .with_embassy_delay()
///     .with_embassy_rp_pins(p.PIN_6, p.PIN_7)
///     .build()
///     .unwrap();
/// display.show_text("12.34").unwrap();
/// # }
/// ```
///
/// Every display update is a complete refresh: the data command, the digit data, and the display
/// control command (carrying the brightness) are all sent each time.
pub struct Tm1637<Driver> {
    driver: Driver,
    brightness: u8,
    ack_policy: AckPolicy,
}

impl Tm1637<()> {
    /// Return a builder pattern implementation to ease some of the type parameter complexity
    /// around creating the bus driver.
    ///
    /// This is not required; you can always instantiate the driver without a builder, but you
    /// might have to type more angle brackets to do so.
    pub fn builder() -> Tm1637Builder {
        Tm1637Builder
    }
}

impl<Driver: BusDriver> Tm1637<Driver> {
    pub fn new(driver: Driver) -> Self {
        Self::from_config(driver, &Config::default())
    }

    pub fn from_config(driver: Driver, config: &Config) -> Self {
        Self {
            driver,
            brightness: config.brightness,
            ack_policy: config.ack_policy,
        }
    }

    /// Set the brightness sent with the next update.
    ///
    /// Bit 3 turns the display on, bits 0-2 select the level (0 dimmest, 7 brightest).  Higher
    /// bits are ignored rather than rejected.  Nothing is sent to the controller until the next
    /// call that writes segments.
    pub fn set_brightness(&mut self, brightness: u8) {
        #[cfg(feature = "defmt")]
        if mask_brightness(brightness) != brightness {
            defmt::debug!(
                "brightness {=u8:x} masked to {=u8:x}",
                brightness,
                mask_brightness(brightness)
            );
        }

        self.brightness = brightness;
    }

    /// The brightness as last set, before masking
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn ack_policy(&self) -> AckPolicy {
        self.ack_policy
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn into_driver(self) -> Driver {
        self.driver
    }

    /// Render `text` and show it, left-aligned.
    ///
    /// `.`, `,`, `:` and `;` light the decimal point (or colon) of the digit before them instead
    /// of taking a digit of their own.  Characters without a glyph show as a blank digit, and
    /// anything past the 4th digit is dropped.  See [`char_to_segment`].
    pub fn show_text(&mut self, text: &str) -> Result<(), Error<Driver::Error>> {
        self.set_segments(&render_text(text.chars()), 0)
    }

    /// Same as [`Self::show_text`] for a byte buffer of ASCII characters.  A NUL byte ends the
    /// text.
    pub fn show_bytes(&mut self, text: &[u8]) -> Result<(), Error<Driver::Error>> {
        let chars = text
            .iter()
            .take_while(|b| **b != 0)
            .map(|b| char::from(*b));

        self.set_segments(&render_text(chars), 0)
    }

    /// Show `number` with exactly `decimal_places` digits after the decimal point.
    ///
    /// Goes through the same rendering as [`Self::show_text`], so a number that needs more than
    /// 4 digits loses its right-most digits.
    pub fn show_number(
        &mut self,
        number: f32,
        decimal_places: usize,
    ) -> Result<(), Error<Driver::Error>> {
        // `core::fmt` panics on a precision that doesn't fit in a u16
        let decimal_places = decimal_places.min(usize::from(u16::MAX));
        let mut writer = FrameWriter::new();

        // `FrameWriter` never fails, it drops what doesn't fit
        let _ = write!(writer, "{:.*}", decimal_places, number);

        self.set_segments(writer.frame(), 0)
    }

    /// Blank all 4 digits
    pub fn clear(&mut self) -> Result<(), Error<Driver::Error>> {
        self.set_segments(&BLANK_FRAME, 0)
    }

    /// Write raw segment masks starting at digit `position` (`0` is the left-most digit).
    ///
    /// Each mask's least significant 7 bits correspond to segments A-G, and the most significant
    /// bit to the decimal point / colon.
    ///
    /// At most 4 masks are sent; the rest are ignored.  `position` wraps around the 4 digits.
    /// The display control command with the current brightness is sent as part of every call.
    pub fn set_segments(
        &mut self,
        segments: &[u8],
        position: u8,
    ) -> Result<(), Error<Driver::Error>> {
        let segment_masks = &segments[..truncate_to_slots(segments.len())];

        #[cfg(feature = "defmt")]
        if segment_masks.len() != segments.len() || mask_position(position) != position {
            defmt::debug!(
                "{=usize} masks at position {=u8} truncated to {=usize} at {=u8}",
                segments.len(),
                position,
                segment_masks.len(),
                mask_position(position)
            );
        }

        let commands = [
            WriteCommand::SetIncrementalDisplayAddressing,
            WriteCommand::WriteDigits {
                start_position: position,
                segment_masks,
            },
            WriteCommand::DisplayControl {
                brightness: self.brightness,
            },
        ];

        let mut not_acknowledged = None;

        for command in &commands {
            let (command_byte, ack) = self.apply_write_command(command)?;

            if !ack.is_acknowledged() && not_acknowledged.is_none() {
                not_acknowledged = Some(command_byte);
            }
        }

        match (self.ack_policy, not_acknowledged) {
            (AckPolicy::Report, Some(command)) => Err(Error::NotAcknowledged { command }),
            _ => Ok(()),
        }
    }

    /// Apply the command to the controller, returning the command byte that was sent along with
    /// the acknowledgement
    fn apply_write_command(
        &mut self,
        command: &WriteCommand<'_>,
    ) -> Result<(u8, Ack), Driver::Error> {
        let (command_byte, data_bytes) = command.encode();

        #[cfg(feature = "defmt")]
        defmt::trace!("command byte = {=u8:x}", command_byte);

        let ack = if let Some(data_bytes) = data_bytes {
            self.driver
                .send_command_write_data(command_byte, data_bytes)?
        } else {
            self.driver.send_command(command_byte)?
        };

        #[cfg(feature = "defmt")]
        if !ack.is_acknowledged() {
            defmt::warn!("TM1637 did not acknowledge command {=u8:x}", command_byte);
        }

        Ok((command_byte, ack))
    }
}

/// Represents the commands sent to the TM1637 as Rust enums for greater readability.
enum WriteCommand<'a> {
    /// Data command: write to the display registers, incrementing the address after each byte
    SetIncrementalDisplayAddressing,

    /// Address command followed by the segment masks for consecutive digits.
    WriteDigits {
        /// The first digit written to; `0` is the left-most.  Wraps around the 4 digits.
        start_position: u8,

        /// Segment masks, at most 4
        segment_masks: &'a [u8],
    },

    /// Display control command
    DisplayControl {
        /// Bit 3 is display on/off, bits 0-2 are the brightness.  Higher bits are dropped.
        brightness: u8,
    },
}

impl<'a> WriteCommand<'a> {
    /// Convert this command into the appropriate byte sequence to send to the controller.
    ///
    /// Return value is a tuple consisting of the following:
    ///
    /// - Command byte to send to controller
    /// - (Optional) slice of data bytes to send along with command byte
    ///
    /// The command byte and data bytes (if any) are sent together, between one start and one
    /// stop condition.
    fn encode<'me>(&'me self) -> (u8, Option<&'me [u8]>)
    where
        'a: 'me,
    {
        match self {
            WriteCommand::SetIncrementalDisplayAddressing => (0b0100_0000, None),
            WriteCommand::WriteDigits {
                start_position,
                segment_masks,
            } => (
                0b1100_0000 | mask_position(*start_position),
                Some(*segment_masks),
            ),
            WriteCommand::DisplayControl { brightness } => {
                (0b1000_0000 | mask_brightness(*brightness), None)
            }
        }
    }
}
