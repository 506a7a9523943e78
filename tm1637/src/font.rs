//! Map characters to the segment masks of a 4-digit 7-segment display, folding decimal points
//! into the preceding digit.
//!
//! ```text
//!       A
//!      ---
//!   F |   | B
//!      -G-
//!   E |   | C
//!      ---
//!       D
//! ```
//!
//! Bit 0 is segment A through bit 6 for segment G; bit 7 drives the decimal point (or the colon,
//! depending on how the module is wired).

use core::fmt;

/// Number of digit slots on the display
pub const DIGITS: usize = 4;

/// One segment mask per digit slot, left-most digit first
pub type SegmentFrame = [u8; DIGITS];

/// A frame with every segment off
pub const BLANK_FRAME: SegmentFrame = [0; DIGITS];

/// The bit that lights the decimal point / colon of a digit
pub const DECIMAL_POINT: u8 = 0b1000_0000;

/// Segment masks for the decimal digits `0` through `9`
const DIGIT_MASKS: [u8; 10] = [
    0b0011_1111, // 0
    0b0000_0110, // 1
    0b0101_1011, // 2
    0b0100_1111, // 3
    0b0110_0110, // 4
    0b0110_1101, // 5
    0b0111_1101, // 6
    0b0000_0111, // 7
    0b0111_1111, // 8
    0b0110_1111, // 9
];

/// Characters that don't take a digit of their own, but light the decimal point of the digit
/// before them.
pub fn is_decimal_point(c: char) -> bool {
    matches!(c, '.' | ',' | ':' | ';')
}

/// Segment mask for a single character.
///
/// Only the decimal digits, the hex letters `A b C d E F` (in that case, the only one that's
/// legible for each) and `-` have a glyph.  Decimal-point characters map to [`DECIMAL_POINT`];
/// anything else is blank.
pub fn char_to_segment(c: char) -> u8 {
    match c {
        '0'..='9' => c
            .to_digit(10)
            .and_then(|digit| DIGIT_MASKS.get(digit as usize).copied())
            .unwrap_or(0),
        '-' => 0b0100_0000,
        'A' => 0b0111_0111,
        'b' => 0b0111_1100,
        'C' => 0b0011_1001,
        'd' => 0b0101_1110,
        'E' => 0b0111_1001,
        'F' => 0b0111_0001,
        c if is_decimal_point(c) => DECIMAL_POINT,
        _ => 0,
    }
}

/// Build a frame from a sequence of characters.
///
/// Each character takes the next digit slot, except decimal-point characters which are OR-ed into
/// the slot before them (and dropped if there is none yet).  Once a character doesn't fit, it and
/// everything after it is dropped.  Unused slots stay blank.
pub fn render_text<I: IntoIterator<Item = char>>(chars: I) -> SegmentFrame {
    let mut writer = FrameWriter::new();
    for c in chars {
        writer.push(c);
    }

    writer.into_frame()
}

/// Incremental version of [`render_text`].
///
/// Implements [`fmt::Write`], so formatted values can be rendered straight into a frame with
/// `write!` without a heap or an intermediate string buffer.  Writes never fail; whatever doesn't
/// fit is dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameWriter {
    frame: SegmentFrame,
    used: usize,
    overflowed: bool,
}

impl FrameWriter {
    pub const fn new() -> Self {
        Self {
            frame: BLANK_FRAME,
            used: 0,
            overflowed: false,
        }
    }

    pub fn push(&mut self, c: char) {
        if self.overflowed {
            return;
        }

        if is_decimal_point(c) {
            if let Some(previous) = self
                .used
                .checked_sub(1)
                .and_then(|index| self.frame.get_mut(index))
            {
                *previous |= DECIMAL_POINT;
            }
        } else if let Some(slot) = self.frame.get_mut(self.used) {
            *slot = char_to_segment(c);
            self.used += 1;
        } else {
            #[cfg(feature = "defmt")]
            defmt::debug!("text longer than {=usize} digits; dropping the rest", DIGITS);
            self.overflowed = true;
        }
    }

    /// Number of digit slots filled so far
    pub fn slots_used(&self) -> usize {
        self.used
    }

    /// Whether any character had to be dropped for lack of room
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn frame(&self) -> &SegmentFrame {
        &self.frame
    }

    pub fn into_frame(self) -> SegmentFrame {
        self.frame
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for FrameWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            self.push(c);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn documented_glyphs() {
        const GLYPHS: &[(char, u8)] = &[
            ('0', 0x3F),
            ('1', 0x06),
            ('2', 0x5B),
            ('3', 0x4F),
            ('4', 0x66),
            ('5', 0x6D),
            ('6', 0x7D),
            ('7', 0x07),
            ('8', 0x7F),
            ('9', 0x6F),
            ('A', 0x77),
            ('b', 0x7C),
            ('C', 0x39),
            ('d', 0x5E),
            ('E', 0x79),
            ('F', 0x71),
            ('-', 0x40),
        ];

        for (c, mask) in GLYPHS {
            assert_eq!(*mask, char_to_segment(*c), "glyph for {c:?}");
        }
    }

    #[test]
    fn everything_else_is_blank() {
        for c in [' ', 'a', 'B', 'c', 'D', 'e', 'f', 'G', 'z', '?', '_', '°', '\0'] {
            assert_eq!(0, char_to_segment(c), "glyph for {c:?}");
        }
    }

    #[test]
    fn decimal_point_class() {
        for c in ['.', ',', ':', ';'] {
            assert!(is_decimal_point(c));
            assert_eq!(DECIMAL_POINT, char_to_segment(c));
        }

        assert!(!is_decimal_point('-'));
        assert!(!is_decimal_point('\''));
    }

    #[test]
    fn decimal_point_folds_into_previous_digit() {
        assert_eq!([0x06 | DECIMAL_POINT, 0x5B, 0, 0], render_text("1.2".chars()));
        assert_eq!(
            [0x3F, 0x4F | DECIMAL_POINT, 0x66, 0x6D],
            render_text("03:45".chars())
        );
    }

    #[test]
    fn repeated_decimal_points_set_the_same_bit() {
        assert_eq!([0x06 | DECIMAL_POINT, 0, 0, 0], render_text("1.,;".chars()));
    }

    #[test]
    fn leading_decimal_point_is_dropped() {
        assert_eq!([0x7D, 0, 0, 0], render_text(".6".chars()));
        assert_eq!(BLANK_FRAME, render_text(":".chars()));
    }

    #[test]
    fn text_beyond_four_digits_is_dropped() {
        assert_eq!([0x06, 0x5B, 0x4F, 0x66], render_text("12345".chars()));

        // The 4th digit can still take its decimal point
        assert_eq!(
            [0x06, 0x5B, 0x4F, 0x66 | DECIMAL_POINT],
            render_text("1234.5".chars())
        );

        // ...but a decimal point belonging to a dropped digit is dropped with it
        assert_eq!([0x06, 0x5B, 0x4F, 0x66], render_text("12345.".chars()));
    }

    #[test]
    fn unknown_characters_still_take_a_slot() {
        assert_eq!([0, 0x06, 0, 0], render_text(" 1".chars()));
    }

    #[test]
    fn empty_text_is_blank() {
        assert_eq!(BLANK_FRAME, render_text("".chars()));
    }

    #[test]
    fn writer_tracks_usage() {
        let mut writer = FrameWriter::new();
        write!(writer, "{}", -7).unwrap();
        assert_eq!(2, writer.slots_used());
        assert!(!writer.overflowed());

        write!(writer, "{:.2}", 1.5f32).unwrap();
        assert_eq!(4, writer.slots_used());
        assert!(writer.overflowed());
        assert_eq!(&[0x40, 0x07, 0x06 | DECIMAL_POINT, 0x6D], writer.frame());
    }
}
