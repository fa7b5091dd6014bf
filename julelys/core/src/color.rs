//! RGBW Color Primitive
//!
//! The physical strings carry four channels per LED: red, green, blue and a
//! dedicated white die. [`Color`] is the immutable value every draw call
//! carries; fades are expressed as scalar multiplication.

use std::ops::Mul;

use serde::{Deserialize, Serialize};

/// A four-channel RGBW color
///
/// # Examples
///
/// ```
/// use julelys_core::color::Color;
///
/// let dimmed = Color::RED * 0.5;
/// assert_eq!(dimmed, Color::rgb(127, 0, 0));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel (0-255)
    pub red: u8,
    /// Green channel (0-255)
    pub green: u8,
    /// Blue channel (0-255)
    pub blue: u8,
    /// White channel (0-255)
    pub white: u8,
}

impl Color {
    /// All channels off
    pub const BLACK: Self = Self::rgbw(0, 0, 0, 0);
    /// The dedicated white die only
    pub const TRUE_WHITE: Self = Self::rgbw(0, 0, 0, 255);
    /// White mixed from the three color dies
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    /// Full red
    pub const RED: Self = Self::rgb(255, 0, 0);
    /// Full green
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    /// Full blue
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    /// Red and green at full
    pub const YELLOW: Self = Self::rgb(255, 255, 0);
    /// Red softened with half the white die
    pub const PINK: Self = Self::rgbw(255, 0, 0, 128);
    /// Half red and half blue
    pub const PURPLE: Self = Self::rgb(128, 0, 128);
    /// Red and blue at full
    pub const MAGENTA: Self = Self::rgb(255, 0, 255);
    /// Orange
    pub const ORANGE: Self = Self::rgb(255, 165, 0);

    /// Create a color with the white channel off
    #[must_use]
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self::rgbw(red, green, blue, 0)
    }

    /// Create a color from all four channels
    #[must_use]
    pub const fn rgbw(red: u8, green: u8, blue: u8, white: u8) -> Self {
        Self {
            red,
            green,
            blue,
            white,
        }
    }

    /// Check if every channel is off
    #[must_use]
    pub const fn is_black(&self) -> bool {
        self.red == 0 && self.green == 0 && self.blue == 0 && self.white == 0
    }

    /// Scale every channel by `factor`
    ///
    /// `factor <= 0` yields black, `factor >= 1` leaves the color untouched,
    /// anything in between scales each channel linearly and truncates.
    ///
    /// # Examples
    ///
    /// ```
    /// use julelys_core::color::Color;
    ///
    /// let c = Color::rgbw(200, 100, 50, 10);
    /// assert_eq!(c.scale(0.0), Color::BLACK);
    /// assert_eq!(c.scale(1.5), c);
    /// assert_eq!(c.scale(0.5), Color::rgbw(100, 50, 25, 5));
    /// ```
    #[must_use]
    pub fn scale(self, factor: f32) -> Self {
        if factor.is_nan() || factor <= 0.0 {
            return Self::BLACK;
        }
        if factor >= 1.0 {
            return self;
        }

        let channel = |value: u8| (f32::from(value) * factor) as u8;
        Self {
            red: channel(self.red),
            green: channel(self.green),
            blue: channel(self.blue),
            white: channel(self.white),
        }
    }

    /// Blend the white die into the color channels for RGB-only displays
    ///
    /// Each channel becomes `min(255, channel + white / 2)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use julelys_core::color::Color;
    ///
    /// assert_eq!(Color::TRUE_WHITE.to_rgb(), [127, 127, 127]);
    /// assert_eq!(Color::rgbw(250, 0, 0, 20).to_rgb(), [255, 10, 10]);
    /// ```
    #[must_use]
    pub fn to_rgb(self) -> [u8; 3] {
        let half_white = self.white / 2;
        [
            self.red.saturating_add(half_white),
            self.green.saturating_add(half_white),
            self.blue.saturating_add(half_white),
        ]
    }
}

impl Mul<f32> for Color {
    type Output = Color;

    fn mul(self, factor: f32) -> Color {
        self.scale(factor)
    }
}

/// Position on the classic 256-step color wheel
///
/// Red fades to green through 0-84, green to blue through 85-169 and blue
/// back to red through 170-255.
#[must_use]
pub fn wheel(position: u8) -> Color {
    match position {
        0..=84 => Color::rgb(position * 3, 255 - position * 3, 0),
        85..=169 => {
            let p = position - 85;
            Color::rgb(255 - p * 3, 0, p * 3)
        }
        _ => {
            let p = position - 170;
            Color::rgb(0, p * 3, 255 - p * 3)
        }
    }
}
