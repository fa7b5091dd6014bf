//! Output Devices
//!
//! The transmission loop hands every encoded frame to an [`OutputDevice`].
//! The core treats the transport as opaque: a blocking `write(bytes)` that
//! either succeeds or fails. The daemon supplies the SPI implementation;
//! [`NullDevice`] backs headless mode and tests.

mod encoder;

pub use encoder::{ChannelOrder, ChannelOrderEncoder, FrameEncoder, BYTES_PER_CELL};

use std::io;

use thiserror::Error;

/// Errors raised by an output device write
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The underlying transport failed
    #[error("device I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The device accepted fewer bytes than the frame holds
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes the device accepted
        written: usize,
        /// Bytes in the frame
        expected: usize,
    },

    /// The device is gone
    #[error("device disconnected")]
    Disconnected,
}

/// A blocking sink for encoded frames
pub trait OutputDevice: Send {
    /// Write one encoded frame
    ///
    /// # Errors
    ///
    /// Returns a [`DeviceError`] if the transport rejects the write. The
    /// caller drops the frame and carries on.
    fn write(&mut self, bytes: &[u8]) -> Result<(), DeviceError>;

    /// Device name for logs
    fn name(&self) -> &str {
        "device"
    }
}

impl<D: OutputDevice + ?Sized> OutputDevice for Box<D> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
        (**self).write(bytes)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Discards every frame
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDevice;

impl OutputDevice for NullDevice {
    fn write(&mut self, _bytes: &[u8]) -> Result<(), DeviceError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}
