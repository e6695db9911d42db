use crate::base::color::Color;
use std::fmt;

/// Output brightness as an integer percentage.
///
/// Scaling is applied to the physical output only; the logical color a caller
/// selected is kept unscaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brightness(u8);

pub const FULL: Brightness = Brightness(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrightnessOutOfRange(pub i64);

impl std::error::Error for BrightnessOutOfRange {}

impl fmt::Display for BrightnessOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Brightness {} out of range, must be 0..=100", self.0)
    }
}

impl Brightness {
    pub fn new(percent: u8) -> Result<Brightness, BrightnessOutOfRange> {
        if percent <= 100 {
            Ok(Brightness(percent))
        } else {
            Err(BrightnessOutOfRange(i64::from(percent)))
        }
    }

    pub fn percent(&self) -> u8 {
        self.0
    }

    pub fn scale(&self, color: Color) -> Color {
        scale(color, self.0)
    }
}

impl TryFrom<i64> for Brightness {
    type Error = BrightnessOutOfRange;
    fn try_from(value: i64) -> Result<Brightness, BrightnessOutOfRange> {
        if (0..=100).contains(&value) {
            Ok(Brightness(value as u8))
        } else {
            Err(BrightnessOutOfRange(value))
        }
    }
}

/// Multiplicative brightness scaling, rounding each channel to nearest.
pub fn scale(color: Color, percent: u8) -> Color {
    let factor = f32::from(percent.min(100)) / 100.0;
    let ch = |v: u8| (f32::from(v) * factor).round() as u8;
    Color::new(ch(color.red), ch(color.green), ch(color.blue))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::color;

    #[test]
    fn full_scale_is_identity() {
        for c in [color::WHITE, color::WARM_YELLOW, color::BLACK, color::PINK] {
            assert_eq!(scale(c, 100), c);
        }
    }

    #[test]
    fn zero_scale_is_black() {
        for c in [color::WHITE, color::WARM_YELLOW, color::PINK] {
            assert_eq!(scale(c, 0), color::BLACK);
        }
    }

    #[test]
    fn half_scale_of_white_rounds_to_128() {
        assert_eq!(scale(color::WHITE, 50), Color::new(128, 128, 128));
    }

    #[test]
    fn range_is_validated() {
        assert!(Brightness::new(0).is_ok());
        assert!(Brightness::new(100).is_ok());
        assert_eq!(Brightness::new(101), Err(BrightnessOutOfRange(101)));
        assert_eq!(Brightness::try_from(-1), Err(BrightnessOutOfRange(-1)));
        assert_eq!(Brightness::try_from(350), Err(BrightnessOutOfRange(350)));
    }
}
