//! Wire encoding for RGBW strings
//!
//! Cells go out in linear-index order, which is column-major: the whole of
//! string 0 top to bottom, then string 1, and so on. Every cell is one
//! 4-byte quad, so an encoded frame is always `width * height * 4` bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::frame::Frame;

/// Bytes sent per cell
pub const BYTES_PER_CELL: usize = 4;

/// Serializes a frame into the byte layout a device expects
pub trait FrameEncoder: Send + Sync {
    /// Append the encoding of `frame` to `out`
    fn encode_into(&self, frame: &Frame, out: &mut Vec<u8>);

    /// Encode `frame` into a fresh buffer
    fn encode(&self, frame: &Frame) -> Vec<u8> {
        let mut out = Vec::with_capacity(frame.size().cell_count() * BYTES_PER_CELL);
        self.encode_into(frame, &mut out);
        out
    }
}

/// Byte order of one RGBW quad
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// Green, red, blue, white (SK6812 RGBW strings)
    #[default]
    Grbw,
    /// Red, green, blue, white
    Rgbw,
}

impl ChannelOrder {
    fn quad(self, color: Color) -> [u8; BYTES_PER_CELL] {
        match self {
            Self::Grbw => [color.green, color.red, color.blue, color.white],
            Self::Rgbw => [color.red, color.green, color.blue, color.white],
        }
    }
}

impl fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grbw => write!(f, "grbw"),
            Self::Rgbw => write!(f, "rgbw"),
        }
    }
}

impl FromStr for ChannelOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grbw" => Ok(Self::Grbw),
            "rgbw" => Ok(Self::Rgbw),
            other => Err(format!("unknown channel order '{other}' (expected grbw or rgbw)")),
        }
    }
}

/// Encoder emitting one quad per cell in a fixed channel order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelOrderEncoder {
    order: ChannelOrder,
}

impl ChannelOrderEncoder {
    /// Encoder for `order`
    #[must_use]
    pub const fn new(order: ChannelOrder) -> Self {
        Self { order }
    }

    /// Configured channel order
    #[must_use]
    pub const fn order(&self) -> ChannelOrder {
        self.order
    }
}

impl FrameEncoder for ChannelOrderEncoder {
    fn encode_into(&self, frame: &Frame, out: &mut Vec<u8>) {
        out.reserve(frame.cells().len() * BYTES_PER_CELL);
        for &cell in frame.cells() {
            out.extend_from_slice(&self.order.quad(cell));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{MatrixSize, Point};

    #[test]
    fn test_length_is_four_bytes_per_cell() {
        let frame = Frame::new(MatrixSize::new(8, 55));
        let bytes = ChannelOrderEncoder::default().encode(&frame);
        assert_eq!(bytes.len(), 8 * 55 * 4);
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_grbw_order() {
        let mut frame = Frame::new(MatrixSize::new(1, 1));
        frame.set(Point::new(0, 0), Color::rgbw(1, 2, 3, 4));
        assert_eq!(ChannelOrderEncoder::default().encode(&frame), vec![2, 1, 3, 4]);
        assert_eq!(
            ChannelOrderEncoder::new(ChannelOrder::Rgbw).encode(&frame),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_cells_follow_linear_index_order() {
        // 2 strings of 3: linear index 3 is the top of string 1
        let size = MatrixSize::new(2, 3);
        let mut frame = Frame::new(size);
        frame.set(Point::new(0, 1), Color::RED);

        let bytes = ChannelOrderEncoder::new(ChannelOrder::Rgbw).encode(&frame);
        let lit: Vec<usize> = bytes
            .chunks(BYTES_PER_CELL)
            .enumerate()
            .filter(|(_, quad)| quad[0] == 255)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(lit, vec![3]);
    }

    #[test]
    fn test_channel_order_parsing() {
        assert_eq!("GRBW".parse::<ChannelOrder>(), Ok(ChannelOrder::Grbw));
        assert_eq!("rgbw".parse::<ChannelOrder>(), Ok(ChannelOrder::Rgbw));
        assert!("bgr".parse::<ChannelOrder>().is_err());
        assert_eq!(ChannelOrder::Rgbw.to_string(), "rgbw");
    }
}
